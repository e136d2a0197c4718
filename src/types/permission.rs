use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission represents a bitmask of granted capabilities. Roles carry one;
/// a user's effective permission is the union over their roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u32);

impl Permission {
    pub const MASTER_READ: Permission = Permission(1 << 0); // 1
    pub const MASTER_WRITE: Permission = Permission(1 << 1); // 2
    pub const INDICATOR_READ: Permission = Permission(1 << 2); // 4
    pub const INDICATOR_WRITE: Permission = Permission(1 << 3); // 8
    pub const DATA_READ: Permission = Permission(1 << 4); // 16
    pub const DATA_WRITE: Permission = Permission(1 << 5); // 32
    pub const DATA_VALIDATE: Permission = Permission(1 << 6); // 64
    pub const DATA_DELETE: Permission = Permission(1 << 7); // 128
    pub const ASSESSMENT_READ: Permission = Permission(1 << 8); // 256
    pub const ASSESSMENT_WRITE: Permission = Permission(1 << 9); // 512
    pub const ASSESSMENT_APPROVE: Permission = Permission(1 << 10); // 1024
    pub const REPORT_READ: Permission = Permission(1 << 11); // 2048
    pub const REPORT_WRITE: Permission = Permission(1 << 12); // 4096
    pub const REPORT_APPROVE: Permission = Permission(1 << 13); // 8192
    pub const AUDIT_READ: Permission = Permission(1 << 14); // 16384
    pub const USER_ADMIN: Permission = Permission(1 << 15); // 32768
    pub const SETTINGS_ADMIN: Permission = Permission(1 << 16); // 65536

    /// Every named permission with its wire name and a short description.
    pub const CATALOG: &'static [(&'static str, Permission, &'static str)] = &[
        ("master:read", Self::MASTER_READ, "View institutions, objectives, programs and activities"),
        ("master:write", Self::MASTER_WRITE, "Manage institutions, objectives, programs and activities"),
        ("indicator:read", Self::INDICATOR_READ, "View performance indicators and targets"),
        ("indicator:write", Self::INDICATOR_WRITE, "Manage performance indicators and targets"),
        ("data:read", Self::DATA_READ, "View performance data and evidence"),
        ("data:write", Self::DATA_WRITE, "Enter, edit and submit performance data"),
        ("data:validate", Self::DATA_VALIDATE, "Validate, reject or return performance data"),
        ("data:delete", Self::DATA_DELETE, "Delete performance data"),
        ("assessment:read", Self::ASSESSMENT_READ, "View assessments"),
        ("assessment:write", Self::ASSESSMENT_WRITE, "Create, score and submit assessments"),
        ("assessment:approve", Self::ASSESSMENT_APPROVE, "Approve or reject assessments"),
        ("report:read", Self::REPORT_READ, "View and export reports"),
        ("report:write", Self::REPORT_WRITE, "Create and submit reports"),
        ("report:approve", Self::REPORT_APPROVE, "Approve or reject reports"),
        ("audit:read", Self::AUDIT_READ, "View the audit log"),
        ("user:admin", Self::USER_ADMIN, "Manage users and roles"),
        ("settings:admin", Self::SETTINGS_ADMIN, "Manage application settings"),
    ];

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// All known permissions combined.
    #[must_use]
    pub fn all() -> Permission {
        Self::CATALOG
            .iter()
            .fold(Permission::default(), |acc, (_, p, _)| acc.union(*p))
    }

    /// Returns true if this permission bitmask contains the required permission.
    #[must_use]
    pub const fn has(self, required: Permission) -> bool {
        self.0 & required.0 == required.0
    }

    /// Combines two permission bitmasks.
    #[must_use]
    pub const fn union(self, other: Permission) -> Permission {
        Permission(self.0 | other.0)
    }

    /// Removes permissions from this bitmask.
    #[must_use]
    pub const fn difference(self, other: Permission) -> Permission {
        Permission(self.0 & !other.0)
    }

    /// Expands a permission bitmask to include implied permissions.
    /// write, validate, delete and approve each imply read of the same module.
    #[must_use]
    pub fn expand_implied(self) -> Permission {
        const IMPLIED: &[(Permission, Permission)] = &[
            (Permission::MASTER_WRITE, Permission::MASTER_READ),
            (Permission::INDICATOR_WRITE, Permission::INDICATOR_READ),
            (Permission::DATA_WRITE, Permission::DATA_READ),
            (Permission::DATA_VALIDATE, Permission::DATA_READ),
            (Permission::DATA_DELETE, Permission::DATA_READ),
            (Permission::ASSESSMENT_WRITE, Permission::ASSESSMENT_READ),
            (Permission::ASSESSMENT_APPROVE, Permission::ASSESSMENT_READ),
            (Permission::REPORT_WRITE, Permission::REPORT_READ),
            (Permission::REPORT_APPROVE, Permission::REPORT_READ),
        ];

        let mut result = self;
        for (granted, implied) in IMPLIED {
            if self.has(*granted) {
                result = result.union(*implied);
            }
        }
        result
    }

    /// Converts a permission string to its bitmask value.
    pub fn parse(s: &str) -> Option<Permission> {
        Self::CATALOG
            .iter()
            .find(|(name, _, _)| *name == s)
            .map(|(_, p, _)| *p)
    }

    /// Converts a slice of permission strings to a combined bitmask.
    pub fn parse_many<S: AsRef<str>>(strs: &[S]) -> Option<Permission> {
        let mut result = Permission::default();
        for s in strs {
            result = result.union(Self::parse(s.as_ref())?);
        }
        Some(result)
    }

    /// Returns the permission strings for this bitmask, in catalog order.
    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        Self::CATALOG
            .iter()
            .filter(|(_, p, _)| self.has(*p))
            .map(|(name, _, _)| *name)
            .collect()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}

impl From<u32> for Permission {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Permission> for u32 {
    fn from(p: Permission) -> Self {
        p.0
    }
}

impl From<i64> for Permission {
    fn from(bits: i64) -> Self {
        Self(bits as u32)
    }
}

impl From<Permission> for i64 {
    fn from(p: Permission) -> Self {
        p.0 as i64
    }
}
