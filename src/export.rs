//! CSV and JSON renderings of performance data and reports.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::Period;
use crate::domain::achievement::{self, grade_for_score, level_for_score};
use crate::error::{Error, Result};
use crate::store::{DataFilter, Store};
use crate::types::{AchievementLevel, DataStatus, PerformanceData, PerformanceIndicator, Report};

fn write_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| Error::BadRequest(format!("failed to write CSV: {e}")))?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))
}

#[derive(Serialize)]
struct DataRow<'a> {
    indicator_code: &'a str,
    indicator_name: &'a str,
    year: i32,
    period: &'a str,
    actual_value: f64,
    target_value: Option<f64>,
    achievement: Option<f64>,
    status: DataStatus,
    notes: Option<&'a str>,
}

/// One CSV line per record; `indicators` maps indicator id to indicator.
pub fn performance_data_csv(
    records: &[PerformanceData],
    indicators: &HashMap<String, PerformanceIndicator>,
) -> Result<Vec<u8>> {
    write_csv(records.iter().map(|d| {
        let indicator = indicators.get(&d.indicator_id);
        DataRow {
            indicator_code: indicator.map_or("", |i| i.code.as_str()),
            indicator_name: indicator.map_or("", |i| i.name.as_str()),
            year: d.year,
            period: &d.period,
            actual_value: d.actual_value,
            target_value: d.target_value,
            achievement: d.achievement,
            status: d.status,
            notes: d.notes.as_deref(),
        }
    }))
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportLine {
    pub indicator_id: String,
    pub indicator_code: String,
    pub indicator_name: String,
    pub measurement_unit: String,
    pub target_value: Option<f64>,
    pub period: Option<String>,
    pub actual_value: Option<f64>,
    pub achievement: Option<f64>,
    pub achievement_level: Option<AchievementLevel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub report_id: String,
    pub title: String,
    pub institution_id: String,
    pub year: i32,
    pub lines: Vec<ReportLine>,
    pub average_achievement: Option<f64>,
    pub grade: Option<char>,
}

/// Latest validated record of the year, by period order.
fn latest_validated(store: &dyn Store, indicator_id: &str, year: i32) -> Result<Option<PerformanceData>> {
    let filter = DataFilter {
        indicator_id: Some(indicator_id.to_string()),
        year: Some(year),
        status: Some(DataStatus::Validated),
        ..DataFilter::default()
    };
    let records = store.list_performance_data(&filter, "", i32::MAX)?;

    Ok(records
        .into_iter()
        .filter_map(|d| d.period.parse::<Period>().ok().map(|p| (p, d)))
        .max_by_key(|(p, _)| *p)
        .map(|(_, d)| d))
}

/// Target, latest validated actual and achievement for each selected indicator.
pub fn summarize_report(store: &dyn Store, report: &Report) -> Result<ReportSummary> {
    let mut lines = Vec::with_capacity(report.indicator_ids.len());

    for indicator_id in &report.indicator_ids {
        let Some(indicator) = store.get_indicator(indicator_id)? else {
            tracing::warn!(
                "Report {} references missing indicator {indicator_id}",
                report.id
            );
            continue;
        };
        let target = store
            .get_target(&indicator.id, report.year)?
            .map(|t| t.target_value);
        let latest = latest_validated(store, &indicator.id, report.year)?;

        let achievement = latest.as_ref().and_then(|d| {
            d.achievement.or_else(|| {
                achievement::calculate(indicator.measurement_type, d.actual_value, target)
            })
        });

        lines.push(ReportLine {
            indicator_id: indicator.id,
            indicator_code: indicator.code,
            indicator_name: indicator.name,
            measurement_unit: indicator.measurement_unit,
            target_value: target,
            period: latest.as_ref().map(|d| d.period.clone()),
            actual_value: latest.as_ref().map(|d| d.actual_value),
            achievement,
            achievement_level: achievement.map(level_for_score),
        });
    }

    let scores: Vec<f64> = lines.iter().filter_map(|l| l.achievement).collect();
    let average_achievement = if scores.is_empty() {
        None
    } else {
        Some(achievement::round2(
            scores.iter().sum::<f64>() / scores.len() as f64,
        ))
    };

    Ok(ReportSummary {
        report_id: report.id.clone(),
        title: report.title.clone(),
        institution_id: report.institution_id.clone(),
        year: report.year,
        lines,
        average_achievement,
        grade: average_achievement.map(grade_for_score),
    })
}

pub fn report_csv(summary: &ReportSummary) -> Result<Vec<u8>> {
    write_csv(&summary.lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn indicator() -> PerformanceIndicator {
        let now = Utc::now();
        PerformanceIndicator {
            id: "ind-1".to_string(),
            institution_id: "inst-1".to_string(),
            objective_id: None,
            program_id: None,
            activity_id: None,
            code: "IK-001".to_string(),
            name: "Cakupan imunisasi".to_string(),
            description: None,
            category: crate::types::IndicatorCategory::Outcome,
            measurement_unit: "%".to_string(),
            measurement_type: crate::types::MeasurementType::Percentage,
            frequency: crate::types::Frequency::Quarterly,
            data_source: None,
            collection_method: crate::types::CollectionMethod::Manual,
            formula: None,
            weight: 10.0,
            is_mandatory: false,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_performance_data_csv() {
        let ind = indicator();
        let mut record = crate::import::draft_record(&ind, 2025, "Q2".to_string(), 40.0, Some(80.0), "u");
        record.notes = Some("catatan, dengan koma".to_string());
        let indicators = HashMap::from([(ind.id.clone(), ind)]);

        let body = String::from_utf8(performance_data_csv(&[record], &indicators).unwrap()).unwrap();
        let mut lines = body.lines();
        assert_eq!(
            lines.next(),
            Some(
                "indicator_code,indicator_name,year,period,actual_value,target_value,achievement,status,notes"
            )
        );
        assert_eq!(
            lines.next(),
            Some("IK-001,Cakupan imunisasi,2025,Q2,40.0,80.0,50.0,draft,\"catatan, dengan koma\"")
        );
    }

    #[test]
    fn test_report_csv_leaves_missing_values_empty() {
        let summary = ReportSummary {
            report_id: "rep-1".to_string(),
            title: "LKjIP".to_string(),
            institution_id: "inst-1".to_string(),
            year: 2025,
            lines: vec![ReportLine {
                indicator_id: "ind-1".to_string(),
                indicator_code: "IK-001".to_string(),
                indicator_name: "Cakupan".to_string(),
                measurement_unit: "%".to_string(),
                target_value: Some(80.0),
                period: None,
                actual_value: None,
                achievement: None,
                achievement_level: None,
            }],
            average_achievement: None,
            grade: None,
        };

        let body = String::from_utf8(report_csv(&summary).unwrap()).unwrap();
        assert!(body.lines().nth(1).unwrap().starts_with("ind-1,IK-001,Cakupan,%,80.0,,,,"));
    }
}
