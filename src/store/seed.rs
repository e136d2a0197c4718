use crate::types::Permission;

const fn bits(perms: &[Permission]) -> Permission {
    let mut acc = 0;
    let mut i = 0;
    while i < perms.len() {
        acc |= perms[i].bits();
        i += 1;
    }
    Permission::new(acc)
}

/// Roles created by `admin init`: (name, description, permissions).
/// `superadmin` holds every bit, including permissions added later.
pub const DEFAULT_ROLES: &[(&str, &str, Permission)] = &[
    ("superadmin", "Full access to every module", Permission::new(u32::MAX)),
    (
        "data_collector",
        "Enters performance data and evidence",
        bits(&[
            Permission::MASTER_READ,
            Permission::INDICATOR_READ,
            Permission::DATA_WRITE,
            Permission::ASSESSMENT_READ,
            Permission::REPORT_READ,
        ]),
    ),
    (
        "assessor",
        "Validates data and scores assessments",
        bits(&[
            Permission::MASTER_READ,
            Permission::INDICATOR_READ,
            Permission::DATA_VALIDATE,
            Permission::ASSESSMENT_WRITE,
            Permission::REPORT_WRITE,
        ]),
    ),
    (
        "auditor",
        "Read-only access including the audit log",
        bits(&[
            Permission::MASTER_READ,
            Permission::INDICATOR_READ,
            Permission::DATA_READ,
            Permission::ASSESSMENT_READ,
            Permission::REPORT_READ,
            Permission::AUDIT_READ,
        ]),
    ),
    (
        "executive",
        "Reviews and approves assessments and reports",
        bits(&[
            Permission::MASTER_READ,
            Permission::INDICATOR_READ,
            Permission::DATA_READ,
            Permission::ASSESSMENT_APPROVE,
            Permission::REPORT_APPROVE,
        ]),
    ),
    (
        "government_agency",
        "Manages its own institution's plan and data",
        bits(&[
            Permission::MASTER_WRITE,
            Permission::INDICATOR_WRITE,
            Permission::DATA_WRITE,
            Permission::DATA_DELETE,
            Permission::ASSESSMENT_READ,
            Permission::REPORT_WRITE,
        ]),
    ),
];
