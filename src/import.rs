//! Two-step CSV import of performance data.
//!
//! `preview` parses and checks an upload without writing any performance
//! data; the caller persists the result as an [`ImportSession`]. `confirm_rows`
//! turns a session's valid rows into draft records for a single batch insert.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::achievement;
use crate::domain::period::parse_for_frequency;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{
    DataStatus, ImportRow, ImportRowError, ImportSession, PerformanceData, PerformanceIndicator,
};

pub const COLUMNS: [&str; 4] = ["indicator_code", "period", "actual_value", "notes"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    indicator_code: String,
    #[serde(default)]
    period: String,
    #[serde(default)]
    actual_value: String,
    #[serde(default)]
    notes: Option<String>,
}

fn csv_error(e: csv::Error) -> Error {
    Error::BadRequest(format!("invalid CSV: {e}"))
}

/// The downloadable template: header plus one sample row.
pub fn template() -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS).map_err(csv_error)?;
    writer
        .write_record(["IK-001", "Q1", "85.5", "Data triwulan pertama"])
        .map_err(csv_error)?;
    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))
}

/// Parsed upload: rows that can be inserted and per-line problems.
#[derive(Debug, Default)]
pub struct Preview {
    pub rows: Vec<ImportRow>,
    pub errors: Vec<ImportRowError>,
}

impl Preview {
    fn reject(&mut self, line: usize, message: impl Into<String>) {
        self.errors.push(ImportRowError {
            line,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn into_session(self, user_id: &str, year: i32) -> ImportSession {
        ImportSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            year,
            rows: self.rows,
            errors: self.errors,
            created_at: Utc::now(),
        }
    }
}

/// Parses `data` as CSV and checks every row against the store.
/// `scope` restricts indicators to one institution.
pub fn preview(store: &dyn Store, data: &[u8], year: i32, scope: Option<&str>) -> Result<Preview> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers().map_err(csv_error)?.clone();
    for column in &COLUMNS[..3] {
        if !headers.iter().any(|h| h == *column) {
            return Err(Error::BadRequest(format!("missing column '{column}'")));
        }
    }

    let mut preview = Preview::default();
    let mut indicators: HashMap<String, Option<PerformanceIndicator>> = HashMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for (index, record) in reader.deserialize::<CsvRow>().enumerate() {
        // Line 1 is the header.
        let line = index + 2;
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                preview.reject(line, e.to_string());
                continue;
            }
        };

        if row.indicator_code.is_empty() {
            preview.reject(line, "indicator_code is required");
            continue;
        }

        if !indicators.contains_key(&row.indicator_code) {
            let found = store.get_indicator_by_code(&row.indicator_code)?;
            indicators.insert(row.indicator_code.clone(), found);
        }
        let Some(indicator) = indicators.get(&row.indicator_code).and_then(Option::as_ref) else {
            preview.reject(line, format!("unknown indicator '{}'", row.indicator_code));
            continue;
        };

        if scope.is_some_and(|inst| inst != indicator.institution_id) {
            preview.reject(
                line,
                format!("indicator '{}' belongs to another institution", indicator.code),
            );
            continue;
        }

        let period = match parse_for_frequency(&row.period, indicator.frequency) {
            Ok(period) => period.to_string(),
            Err(message) => {
                preview.reject(line, message);
                continue;
            }
        };

        let actual_value = match row.actual_value.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => v,
            Ok(_) => {
                preview.reject(line, "actual_value must be a non-negative number");
                continue;
            }
            Err(_) => {
                preview.reject(line, format!("'{}' is not a number", row.actual_value));
                continue;
            }
        };

        if !seen.insert((indicator.id.clone(), period.clone())) {
            preview.reject(
                line,
                format!("duplicate row for {} {period}", indicator.code),
            );
            continue;
        }

        if store
            .find_performance_data(&indicator.id, year, &period)?
            .is_some()
        {
            preview.reject(
                line,
                format!("data for {} {period} {year} already exists", indicator.code),
            );
            continue;
        }

        preview.rows.push(ImportRow {
            line,
            indicator_id: indicator.id.clone(),
            indicator_code: indicator.code.clone(),
            period,
            actual_value,
            notes: row.notes.filter(|n| !n.is_empty()),
        });
    }

    Ok(preview)
}

/// A new draft record with the target snapshot and achievement filled in.
#[must_use]
pub fn draft_record(
    indicator: &PerformanceIndicator,
    year: i32,
    period: String,
    actual_value: f64,
    target_value: Option<f64>,
    actor_id: &str,
) -> PerformanceData {
    let now = Utc::now();
    PerformanceData {
        id: Uuid::new_v4().to_string(),
        indicator_id: indicator.id.clone(),
        institution_id: indicator.institution_id.clone(),
        year,
        period,
        actual_value,
        target_value,
        achievement: achievement::calculate(indicator.measurement_type, actual_value, target_value),
        data_source: indicator.data_source.clone(),
        collection_method: Some(indicator.collection_method),
        notes: None,
        status: DataStatus::Draft,
        submitted_at: None,
        validated_by: None,
        validated_at: None,
        validation_notes: None,
        created_by: actor_id.to_string(),
        updated_by: actor_id.to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Builds draft records for every valid row in a session.
pub fn confirm_rows(
    store: &dyn Store,
    session: &ImportSession,
    actor_id: &str,
) -> Result<Vec<PerformanceData>> {
    let mut records = Vec::with_capacity(session.rows.len());

    for row in &session.rows {
        let indicator = store.get_indicator(&row.indicator_id)?.ok_or_else(|| {
            Error::BadRequest(format!(
                "indicator '{}' was deleted after the preview",
                row.indicator_code
            ))
        })?;
        let target = store
            .get_target(&indicator.id, session.year)?
            .map(|t| t.target_value);

        let mut record = draft_record(
            &indicator,
            session.year,
            row.period.clone(),
            row.actual_value,
            target,
            actor_id,
        );
        record.notes = row.notes.clone();
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();

        let now = Utc::now();
        for (id, code) in [("inst-1", "DINKES"), ("inst-2", "DISDIK")] {
            store
                .create_institution(&Institution {
                    id: id.to_string(),
                    code: code.to_string(),
                    name: code.to_string(),
                    address: None,
                    phone: None,
                    email: None,
                    website: None,
                    head_name: None,
                    head_nip: None,
                    status: RecordStatus::Aktif,
                    created_at: now,
                    updated_at: now,
                })
                .unwrap();
        }

        for (id, inst, code) in [("ind-1", "inst-1", "IK-001"), ("ind-2", "inst-2", "IK-002")] {
            store
                .create_indicator(
                    &PerformanceIndicator {
                        id: id.to_string(),
                        institution_id: inst.to_string(),
                        objective_id: None,
                        program_id: None,
                        activity_id: None,
                        code: code.to_string(),
                        name: code.to_string(),
                        description: None,
                        category: IndicatorCategory::Outcome,
                        measurement_unit: "%".to_string(),
                        measurement_type: MeasurementType::Percentage,
                        frequency: Frequency::Quarterly,
                        data_source: None,
                        collection_method: CollectionMethod::Manual,
                        formula: None,
                        weight: 10.0,
                        is_mandatory: false,
                        created_by: None,
                        created_at: now,
                        updated_at: now,
                    },
                    &[IndicatorTarget {
                        id: format!("t-{id}"),
                        indicator_id: id.to_string(),
                        year: 2025,
                        target_value: 80.0,
                        minimum_value: None,
                        justification: None,
                        created_at: now,
                        updated_at: now,
                    }],
                )
                .unwrap();
        }

        (temp, store)
    }

    #[test]
    fn test_template_has_header_and_sample() {
        let body = String::from_utf8(template().unwrap()).unwrap();
        let mut lines = body.lines();
        assert_eq!(lines.next(), Some("indicator_code,period,actual_value,notes"));
        assert!(lines.next().unwrap().starts_with("IK-001,Q1,"));
    }

    #[test]
    fn test_preview_sorts_rows_and_errors() {
        let (_temp, store) = setup();
        let csv = "indicator_code,period,actual_value,notes\n\
                   IK-001,q1,72,awal\n\
                   IK-001,Q1,75,\n\
                   IK-001,M01,10,\n\
                   IK-404,Q2,10,\n\
                   IK-002,Q2,10,\n\
                   IK-001,Q3,abc,\n\
                   IK-001,Q4,-1,\n\
                   ,Q2,5,\n";

        let preview = preview(&store, csv.as_bytes(), 2025, Some("inst-1")).unwrap();

        assert_eq!(preview.rows.len(), 1);
        assert_eq!(preview.rows[0].period, "Q1");
        assert_eq!(preview.rows[0].notes.as_deref(), Some("awal"));

        let lines: Vec<usize> = preview.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6, 7, 8, 9]);
        assert!(preview.errors[0].message.contains("duplicate"));
        assert!(preview.errors[3].message.contains("another institution"));
    }

    #[test]
    fn test_preview_detects_existing_rows() {
        let (_temp, store) = setup();
        let indicator = store.get_indicator("ind-1").unwrap().unwrap();
        store
            .create_performance_data(&draft_record(
                &indicator,
                2025,
                "Q1".to_string(),
                50.0,
                Some(80.0),
                "user-1",
            ))
            .unwrap();

        let csv = "indicator_code,period,actual_value\nIK-001,Q1,72\nIK-001,Q2,70\n";
        let preview = preview(&store, csv.as_bytes(), 2025, None).unwrap();
        assert_eq!(preview.rows.len(), 1);
        assert_eq!(preview.errors.len(), 1);
        assert!(preview.errors[0].message.contains("already exists"));
    }

    #[test]
    fn test_preview_requires_columns() {
        let (_temp, store) = setup();
        let result = preview(&store, b"code,value\nIK-001,1\n", 2025, None);
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_confirm_rows_snapshot_target() {
        let (_temp, store) = setup();
        let csv = "indicator_code,period,actual_value,notes\nIK-001,Q2,60,catatan\n";
        let session = preview(&store, csv.as_bytes(), 2025, None)
            .unwrap()
            .into_session("user-1", 2025);

        let records = confirm_rows(&store, &session, "user-1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_value, Some(80.0));
        assert_eq!(records[0].achievement, Some(75.0));
        assert_eq!(records[0].status, DataStatus::Draft);
        assert_eq!(records[0].notes.as_deref(), Some("catatan"));
    }
}
