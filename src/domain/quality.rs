use chrono::Duration;
use serde::Serialize;

use super::period::Period;
use crate::types::{PerformanceData, PerformanceIndicator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityIssue {
    pub field: &'static str,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub is_valid: bool,
    pub severity: Severity,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    #[must_use]
    pub fn errors(&self) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }
}

/// Everything the quality check looks at besides the record itself.
pub struct QualityContext<'a> {
    pub indicator: &'a PerformanceIndicator,
    pub target_for_year: Option<f64>,
    pub evidence_count: usize,
    /// Achievement percentage above which a warning is raised.
    pub achievement_warning_threshold: f64,
    pub submission_deadline_days: i64,
}

#[must_use]
pub fn check(data: &PerformanceData, ctx: &QualityContext<'_>) -> QualityReport {
    let mut issues = Vec::new();
    let mut push = |field, severity, message: String| {
        issues.push(QualityIssue {
            field,
            severity,
            message,
        });
    };

    if data.actual_value < 0.0 {
        push(
            "actual_value",
            Severity::Error,
            "actual value cannot be negative".to_string(),
        );
    }

    if ctx.indicator.is_mandatory && ctx.evidence_count == 0 {
        push(
            "evidence",
            Severity::Error,
            "evidence is required for mandatory indicators".to_string(),
        );
    }

    if ctx.target_for_year.is_none() && data.target_value.is_none() {
        push(
            "target_value",
            Severity::Warning,
            format!("no target set for {}", data.year),
        );
    }

    if let Some(achievement) = data.achievement {
        if achievement > ctx.achievement_warning_threshold {
            push(
                "achievement",
                Severity::Warning,
                format!(
                    "achievement {achievement}% exceeds {}%; check the actual value",
                    ctx.achievement_warning_threshold
                ),
            );
        }
    }

    let deadline = data
        .period
        .parse::<Period>()
        .ok()
        .and_then(|p| p.end_date(data.year))
        .and_then(|end| {
            Duration::try_days(ctx.submission_deadline_days)
                .and_then(|days| end.checked_add_signed(days))
        });
    if let Some(deadline) = deadline {
        if data.created_at.date_naive() > deadline {
            push(
                "created_at",
                Severity::Warning,
                format!("entered after the submission deadline ({deadline})"),
            );
        }
    }

    let severity = issues
        .iter()
        .map(|i| i.severity)
        .max()
        .unwrap_or(Severity::None);

    QualityReport {
        is_valid: severity != Severity::Error,
        severity,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::types::*;

    fn indicator(mandatory: bool) -> PerformanceIndicator {
        let now = Utc::now();
        PerformanceIndicator {
            id: "ind-1".to_string(),
            institution_id: "inst-1".to_string(),
            objective_id: None,
            program_id: None,
            activity_id: None,
            code: "IK-01".to_string(),
            name: "Indeks kepuasan".to_string(),
            description: None,
            category: IndicatorCategory::Outcome,
            measurement_unit: "%".to_string(),
            measurement_type: MeasurementType::Percentage,
            frequency: Frequency::Quarterly,
            data_source: None,
            collection_method: CollectionMethod::Manual,
            formula: None,
            weight: 10.0,
            is_mandatory: mandatory,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn data(actual: f64, achievement: Option<f64>) -> PerformanceData {
        let created = Utc.with_ymd_and_hms(2025, 4, 3, 9, 0, 0).unwrap();
        PerformanceData {
            id: "pd-1".to_string(),
            indicator_id: "ind-1".to_string(),
            institution_id: "inst-1".to_string(),
            year: 2025,
            period: "Q1".to_string(),
            actual_value: actual,
            target_value: Some(80.0),
            achievement,
            data_source: None,
            collection_method: None,
            notes: None,
            status: DataStatus::Draft,
            submitted_at: None,
            validated_by: None,
            validated_at: None,
            validation_notes: None,
            created_by: "u".to_string(),
            updated_by: "u".to_string(),
            created_at: created,
            updated_at: created,
        }
    }

    fn ctx(indicator: &PerformanceIndicator, evidence_count: usize) -> QualityContext<'_> {
        QualityContext {
            indicator,
            target_for_year: Some(80.0),
            evidence_count,
            achievement_warning_threshold: 150.0,
            submission_deadline_days: 7,
        }
    }

    #[test]
    fn test_clean_record_is_valid() {
        let ind = indicator(false);
        let report = check(&data(72.0, Some(90.0)), &ctx(&ind, 0));
        assert!(report.is_valid);
        assert_eq!(report.severity, Severity::None);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_negative_value_and_missing_evidence_are_errors() {
        let ind = indicator(true);
        let report = check(&data(-1.0, None), &ctx(&ind, 0));
        assert!(!report.is_valid);
        assert_eq!(report.severity, Severity::Error);
        assert_eq!(report.errors().count(), 2);
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let ind = indicator(false);
        let mut record = data(200.0, Some(250.0));
        record.created_at = Utc.with_ymd_and_hms(2025, 5, 20, 0, 0, 0).unwrap();
        let report = check(&record, &ctx(&ind, 1));
        assert!(report.is_valid);
        assert_eq!(report.severity, Severity::Warning);
        let fields: Vec<_> = report.issues.iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["achievement", "created_at"]);
    }

    #[test]
    fn test_out_of_range_deadline_skips_late_check() {
        let ind = indicator(false);
        let mut context = ctx(&ind, 0);
        context.submission_deadline_days = 1_000_000_000;
        let report = check(&data(72.0, Some(90.0)), &context);
        assert!(report.is_valid);
        assert!(report.issues.iter().all(|i| i.field != "created_at"));

        context.submission_deadline_days = i64::MIN;
        let report = check(&data(72.0, Some(90.0)), &context);
        assert!(report.issues.iter().all(|i| i.field != "created_at"));
    }
}
