//! Status transitions for performance data, assessments and reports.
//!
//! The store applies a transition with `UPDATE ... WHERE status IN (from)`,
//! so the `from` sets here are the single source of truth for who may move
//! where.

use crate::types::{DataStatus, ReviewStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S: 'static> {
    pub action: &'static str,
    pub from: &'static [S],
    pub to: S,
    /// Whether the caller must supply non-empty notes.
    pub requires_notes: bool,
}

impl<S: PartialEq + Copy> Transition<S> {
    #[must_use]
    pub fn allows(&self, current: S) -> bool {
        self.from.contains(&current)
    }
}

const EDITABLE_DATA: &[DataStatus] = &[
    DataStatus::Draft,
    DataStatus::Rejected,
    DataStatus::NeedsRevision,
];

pub const DATA_UPDATE: Transition<DataStatus> = Transition {
    action: "update",
    from: EDITABLE_DATA,
    to: DataStatus::Draft,
    requires_notes: false,
};

pub const DATA_SUBMIT: Transition<DataStatus> = Transition {
    action: "submit",
    from: EDITABLE_DATA,
    to: DataStatus::Submitted,
    requires_notes: false,
};

pub const DATA_VALIDATE: Transition<DataStatus> = Transition {
    action: "validate",
    from: &[DataStatus::Submitted],
    to: DataStatus::Validated,
    requires_notes: false,
};

pub const DATA_REJECT: Transition<DataStatus> = Transition {
    action: "reject",
    from: &[DataStatus::Submitted],
    to: DataStatus::Rejected,
    requires_notes: true,
};

pub const DATA_REQUEST_REVISION: Transition<DataStatus> = Transition {
    action: "request revision for",
    from: &[DataStatus::Submitted],
    to: DataStatus::NeedsRevision,
    requires_notes: true,
};

/// Any record that is not validated may be deleted.
#[must_use]
pub fn data_deletable(status: DataStatus) -> bool {
    status != DataStatus::Validated
}

const EDITABLE_REVIEW: &[ReviewStatus] = &[ReviewStatus::Draft, ReviewStatus::Rejected];

pub const REVIEW_UPDATE: Transition<ReviewStatus> = Transition {
    action: "update",
    from: EDITABLE_REVIEW,
    to: ReviewStatus::Draft,
    requires_notes: false,
};

pub const REVIEW_SUBMIT: Transition<ReviewStatus> = Transition {
    action: "submit",
    from: EDITABLE_REVIEW,
    to: ReviewStatus::Submitted,
    requires_notes: false,
};

pub const REVIEW_APPROVE: Transition<ReviewStatus> = Transition {
    action: "approve",
    from: &[ReviewStatus::Submitted],
    to: ReviewStatus::Approved,
    requires_notes: false,
};

pub const REVIEW_REJECT: Transition<ReviewStatus> = Transition {
    action: "reject",
    from: &[ReviewStatus::Submitted],
    to: ReviewStatus::Rejected,
    requires_notes: true,
};

/// Approved assessments and reports are kept as the record of review.
#[must_use]
pub fn review_deletable(status: ReviewStatus) -> bool {
    status != ReviewStatus::Approved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_transitions() {
        assert!(DATA_SUBMIT.allows(DataStatus::Draft));
        assert!(DATA_SUBMIT.allows(DataStatus::NeedsRevision));
        assert!(!DATA_SUBMIT.allows(DataStatus::Submitted));
        assert!(!DATA_SUBMIT.allows(DataStatus::Validated));

        for t in [DATA_VALIDATE, DATA_REJECT, DATA_REQUEST_REVISION] {
            assert!(t.allows(DataStatus::Submitted));
            assert!(!t.allows(DataStatus::Draft));
            assert!(!t.allows(DataStatus::Validated));
        }

        assert!(DATA_REJECT.requires_notes);
        assert!(!DATA_VALIDATE.requires_notes);
        assert!(!DATA_UPDATE.allows(DataStatus::Validated));
        assert!(!data_deletable(DataStatus::Validated));
        assert!(data_deletable(DataStatus::Rejected));
    }

    #[test]
    fn test_review_transitions() {
        assert!(REVIEW_SUBMIT.allows(ReviewStatus::Rejected));
        assert!(!REVIEW_APPROVE.allows(ReviewStatus::Draft));
        assert!(REVIEW_APPROVE.allows(ReviewStatus::Submitted));
        assert!(!REVIEW_UPDATE.allows(ReviewStatus::Approved));
        assert!(!review_deletable(ReviewStatus::Approved));
    }
}
