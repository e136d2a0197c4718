use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::seed::DEFAULT_ROLES;
use super::{
    ActivityFilter, AssessmentFilter, AuditFilter, DataFilter, DataSummary, IndicatorFilter,
    ProgramFilter, ReportFilter, StatusChange, Store,
};
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::settings;
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn format_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn datetime_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    Ok(parse_datetime(&row.get::<_, String>(idx)?))
}

fn opt_datetime_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .map(|s| parse_datetime(&s)))
}

fn opt_date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        })
        .transpose()
}

fn json_at<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_json_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
            })
        })
        .transpose()
}

/// Maps constraint failures on INSERT/UPDATE: unique keys become
/// `AlreadyExists`, dangling references become `BadRequest`.
fn write_error(e: rusqlite::Error) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                Error::BadRequest("referenced record does not exist".to_string())
            } else {
                Error::AlreadyExists
            }
        }
        other => Error::from(other),
    }
}

/// Maps a foreign-key failure on DELETE to `Conflict`.
fn delete_error(e: rusqlite::Error) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Conflict("record still has dependent data".to_string())
        }
        other => Error::from(other),
    }
}

/// Renders a status set as a SQL `IN` list. Values come from fixed enum text.
fn status_list<S: std::fmt::Display>(statuses: &[S]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn current_status(conn: &Connection, table: &str, id: &str) -> Result<Option<String>> {
    conn.query_row(
        &format!("SELECT status FROM {table} WHERE id = ?1"),
        params![id],
        |row| row.get(0),
    )
    .optional()
    .map_err(Error::from)
}

/// Explains why a conditional update touched no rows.
fn transition_failure(conn: &Connection, table: &str, id: &str, action: &'static str) -> Error {
    match current_status(conn, table, id) {
        Ok(Some(from)) => Error::InvalidTransition { action, from },
        Ok(None) => Error::NotFound,
        Err(e) => e,
    }
}

const INSTITUTION_COLUMNS: &str =
    "id, code, name, address, phone, email, website, head_name, head_nip, status, created_at, updated_at";

fn institution_from_row(row: &Row<'_>) -> rusqlite::Result<Institution> {
    Ok(Institution {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        address: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        website: row.get(6)?,
        head_name: row.get(7)?,
        head_nip: row.get(8)?,
        status: row.get(9)?,
        created_at: datetime_at(row, 10)?,
        updated_at: datetime_at(row, 11)?,
    })
}

const OBJECTIVE_COLUMNS: &str =
    "id, instansi_id, code, name, description, status, created_at, updated_at";

fn objective_from_row(row: &Row<'_>) -> rusqlite::Result<StrategicObjective> {
    Ok(StrategicObjective {
        id: row.get(0)?,
        institution_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        created_at: datetime_at(row, 6)?,
        updated_at: datetime_at(row, 7)?,
    })
}

const PROGRAM_COLUMNS: &str = "id, instansi_id, sasaran_strategis_id, code, name, description, budget, \
     fiscal_year, status, responsible_person, created_at, updated_at";

fn program_from_row(row: &Row<'_>) -> rusqlite::Result<Program> {
    Ok(Program {
        id: row.get(0)?,
        institution_id: row.get(1)?,
        objective_id: row.get(2)?,
        code: row.get(3)?,
        name: row.get(4)?,
        description: row.get(5)?,
        budget: row.get(6)?,
        fiscal_year: row.get(7)?,
        status: row.get(8)?,
        responsible_person: row.get(9)?,
        created_at: datetime_at(row, 10)?,
        updated_at: datetime_at(row, 11)?,
    })
}

const ACTIVITY_COLUMNS: &str = "id, program_id, code, name, description, budget, realized_budget, \
     start_date, end_date, responsible_person, status, created_at, updated_at";

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: row.get(0)?,
        program_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        budget: row.get(5)?,
        realized_budget: row.get(6)?,
        start_date: opt_date_at(row, 7)?,
        end_date: opt_date_at(row, 8)?,
        responsible_person: row.get(9)?,
        status: row.get(10)?,
        created_at: datetime_at(row, 11)?,
        updated_at: datetime_at(row, 12)?,
    })
}

const INDICATOR_COLUMNS: &str = "id, instansi_id, sasaran_strategis_id, program_id, kegiatan_id, code, \
     name, description, category, measurement_unit, measurement_type, frequency, data_source, \
     collection_method, formula, weight, is_mandatory, created_by, created_at, updated_at";

fn indicator_from_row(row: &Row<'_>) -> rusqlite::Result<PerformanceIndicator> {
    Ok(PerformanceIndicator {
        id: row.get(0)?,
        institution_id: row.get(1)?,
        objective_id: row.get(2)?,
        program_id: row.get(3)?,
        activity_id: row.get(4)?,
        code: row.get(5)?,
        name: row.get(6)?,
        description: row.get(7)?,
        category: row.get(8)?,
        measurement_unit: row.get(9)?,
        measurement_type: row.get(10)?,
        frequency: row.get(11)?,
        data_source: row.get(12)?,
        collection_method: row.get(13)?,
        formula: row.get(14)?,
        weight: row.get(15)?,
        is_mandatory: row.get(16)?,
        created_by: row.get(17)?,
        created_at: datetime_at(row, 18)?,
        updated_at: datetime_at(row, 19)?,
    })
}

const TARGET_COLUMNS: &str =
    "id, indicator_id, year, target_value, minimum_value, justification, created_at, updated_at";

fn target_from_row(row: &Row<'_>) -> rusqlite::Result<IndicatorTarget> {
    Ok(IndicatorTarget {
        id: row.get(0)?,
        indicator_id: row.get(1)?,
        year: row.get(2)?,
        target_value: row.get(3)?,
        minimum_value: row.get(4)?,
        justification: row.get(5)?,
        created_at: datetime_at(row, 6)?,
        updated_at: datetime_at(row, 7)?,
    })
}

fn insert_targets(conn: &Connection, targets: &[IndicatorTarget]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO indicator_targets (id, indicator_id, year, target_value, minimum_value, justification, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for t in targets {
        stmt.execute(params![
            t.id,
            t.indicator_id,
            t.year,
            t.target_value,
            t.minimum_value,
            t.justification,
            format_datetime(&t.created_at),
            format_datetime(&t.updated_at),
        ])
        .map_err(write_error)?;
    }
    Ok(())
}

const DATA_COLUMNS: &str = "id, indicator_id, instansi_id, year, period, actual_value, target_value, \
     achievement, data_source, collection_method, notes, status, submitted_at, validated_by, \
     validated_at, validation_notes, created_by, updated_by, created_at, updated_at";

fn data_from_row(row: &Row<'_>) -> rusqlite::Result<PerformanceData> {
    Ok(PerformanceData {
        id: row.get(0)?,
        indicator_id: row.get(1)?,
        institution_id: row.get(2)?,
        year: row.get(3)?,
        period: row.get(4)?,
        actual_value: row.get(5)?,
        target_value: row.get(6)?,
        achievement: row.get(7)?,
        data_source: row.get(8)?,
        collection_method: row.get(9)?,
        notes: row.get(10)?,
        status: row.get(11)?,
        submitted_at: opt_datetime_at(row, 12)?,
        validated_by: row.get(13)?,
        validated_at: opt_datetime_at(row, 14)?,
        validation_notes: row.get(15)?,
        created_by: row.get(16)?,
        updated_by: row.get(17)?,
        created_at: datetime_at(row, 18)?,
        updated_at: datetime_at(row, 19)?,
    })
}

fn insert_data(conn: &Connection, d: &PerformanceData) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO performance_data ({DATA_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
        ),
        params![
            d.id,
            d.indicator_id,
            d.institution_id,
            d.year,
            d.period,
            d.actual_value,
            d.target_value,
            d.achievement,
            d.data_source,
            d.collection_method,
            d.notes,
            d.status,
            d.submitted_at.as_ref().map(format_datetime),
            d.validated_by,
            d.validated_at.as_ref().map(format_datetime),
            d.validation_notes,
            d.created_by,
            d.updated_by,
            format_datetime(&d.created_at),
            format_datetime(&d.updated_at),
        ],
    )
    .map_err(write_error)?;
    Ok(())
}

fn select_data(conn: &Connection, id: &str) -> Result<Option<PerformanceData>> {
    conn.query_row(
        &format!("SELECT {DATA_COLUMNS} FROM performance_data WHERE id = ?1"),
        params![id],
        data_from_row,
    )
    .optional()
    .map_err(Error::from)
}

const EVIDENCE_COLUMNS: &str = "id, performance_data_id, file_name, stored_path, content_type, \
     file_size, checksum, description, uploaded_by, created_at";

fn evidence_from_row(row: &Row<'_>) -> rusqlite::Result<EvidenceDocument> {
    Ok(EvidenceDocument {
        id: row.get(0)?,
        performance_data_id: row.get(1)?,
        file_name: row.get(2)?,
        stored_path: row.get(3)?,
        content_type: row.get(4)?,
        file_size: row.get(5)?,
        checksum: row.get(6)?,
        description: row.get(7)?,
        uploaded_by: row.get(8)?,
        created_at: datetime_at(row, 9)?,
    })
}

const ASSESSMENT_COLUMNS: &str = "id, indicator_id, performance_data_id, period, criteria, overall_score, \
     achievement_level, comments, recommendations, status, assessed_by, reviewed_by, reviewed_at, \
     review_notes, created_at, updated_at";

fn assessment_from_row(row: &Row<'_>) -> rusqlite::Result<Assessment> {
    Ok(Assessment {
        id: row.get(0)?,
        indicator_id: row.get(1)?,
        performance_data_id: row.get(2)?,
        period: row.get(3)?,
        criteria: json_at(row, 4)?,
        overall_score: row.get(5)?,
        achievement_level: row.get(6)?,
        comments: row.get(7)?,
        recommendations: row.get(8)?,
        status: row.get(9)?,
        assessed_by: row.get(10)?,
        reviewed_by: row.get(11)?,
        reviewed_at: opt_datetime_at(row, 12)?,
        review_notes: row.get(13)?,
        created_at: datetime_at(row, 14)?,
        updated_at: datetime_at(row, 15)?,
    })
}

fn select_assessment(conn: &Connection, id: &str) -> Result<Option<Assessment>> {
    conn.query_row(
        &format!("SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE id = ?1"),
        params![id],
        assessment_from_row,
    )
    .optional()
    .map_err(Error::from)
}

const REPORT_COLUMNS: &str = "id, instansi_id, title, report_type, category, year, period, format, \
     options, status, created_by, reviewed_by, reviewed_at, review_notes, created_at, updated_at";

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get(0)?,
        institution_id: row.get(1)?,
        title: row.get(2)?,
        report_type: row.get(3)?,
        category: row.get(4)?,
        year: row.get(5)?,
        period: row.get(6)?,
        indicator_ids: Vec::new(),
        format: row.get(7)?,
        options: json_at(row, 8)?,
        status: row.get(9)?,
        created_by: row.get(10)?,
        reviewed_by: row.get(11)?,
        reviewed_at: opt_datetime_at(row, 12)?,
        review_notes: row.get(13)?,
        created_at: datetime_at(row, 14)?,
        updated_at: datetime_at(row, 15)?,
    })
}

fn load_report_indicators(conn: &Connection, report: &mut Report) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT indicator_id FROM report_indicators WHERE report_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![report.id], |row| row.get(0))?;
    report.indicator_ids = rows.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(())
}

fn write_report_indicators(conn: &Connection, report: &Report) -> Result<()> {
    conn.execute(
        "DELETE FROM report_indicators WHERE report_id = ?1",
        params![report.id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO report_indicators (report_id, indicator_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, indicator_id) in report.indicator_ids.iter().enumerate() {
        stmt.execute(params![report.id, indicator_id, position as i64])
            .map_err(write_error)?;
    }
    Ok(())
}

fn select_report(conn: &Connection, id: &str) -> Result<Option<Report>> {
    let report = conn
        .query_row(
            &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1"),
            params![id],
            report_from_row,
        )
        .optional()?;

    match report {
        Some(mut report) => {
            load_report_indicators(conn, &mut report)?;
            Ok(Some(report))
        }
        None => Ok(None),
    }
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, instansi_id, is_active, created_at, updated_at, last_login_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        institution_id: row.get(4)?,
        is_active: row.get(5)?,
        created_at: datetime_at(row, 6)?,
        updated_at: datetime_at(row, 7)?,
        last_login_at: opt_datetime_at(row, 8)?,
    })
}

const ROLE_COLUMNS: &str = "id, name, description, permissions, created_at, updated_at";

fn role_from_row(row: &Row<'_>) -> rusqlite::Result<Role> {
    Ok(Role {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        permissions: Permission::from(row.get::<_, i64>(3)?),
        created_at: datetime_at(row, 4)?,
        updated_at: datetime_at(row, 5)?,
    })
}

const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at";

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        user_id: row.get(3)?,
        created_at: datetime_at(row, 4)?,
        expires_at: opt_datetime_at(row, 5)?,
        last_used_at: opt_datetime_at(row, 6)?,
    })
}

const AUDIT_COLUMNS: &str = "id, user_id, instansi_id, action, module, description, old_values, \
     new_values, ip_address, user_agent, created_at";

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditLog> {
    Ok(AuditLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        institution_id: row.get(2)?,
        action: row.get(3)?,
        module: row.get(4)?,
        description: row.get(5)?,
        old_values: opt_json_at(row, 6)?,
        new_values: opt_json_at(row, 7)?,
        ip_address: row.get(8)?,
        user_agent: row.get(9)?,
        created_at: datetime_at(row, 10)?,
    })
}

const SETTING_COLUMNS: &str = "key, value, type, description, updated_at";

fn setting_from_row(row: &Row<'_>) -> rusqlite::Result<Setting> {
    Ok(Setting {
        key: row.get(0)?,
        value: row.get(1)?,
        setting_type: row.get(2)?,
        description: row.get(3)?,
        updated_at: datetime_at(row, 4)?,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Error::from)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn seed_defaults(&self) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = format_datetime(&Utc::now());

        for (name, description, permissions) in DEFAULT_ROLES {
            tx.execute(
                "INSERT OR IGNORE INTO roles (id, name, description, permissions, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    name,
                    description,
                    i64::from(*permissions),
                    now,
                ],
            )?;
        }

        for (key, value, setting_type, description) in settings::DEFAULTS {
            tx.execute(
                "INSERT OR IGNORE INTO settings (key, value, type, description, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![key, value, setting_type, description, now],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // Institution operations

    fn create_institution(&self, inst: &Institution) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO instansi ({INSTITUTION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    inst.id,
                    inst.code,
                    inst.name,
                    inst.address,
                    inst.phone,
                    inst.email,
                    inst.website,
                    inst.head_name,
                    inst.head_nip,
                    inst.status,
                    format_datetime(&inst.created_at),
                    format_datetime(&inst.updated_at),
                ],
            )
            .map_err(write_error)?;
        Ok(())
    }

    fn get_institution(&self, id: &str) -> Result<Option<Institution>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {INSTITUTION_COLUMNS} FROM instansi WHERE id = ?1"),
            params![id],
            institution_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_institutions(
        &self,
        scope: Option<&str>,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Institution>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {INSTITUTION_COLUMNS} FROM instansi
             WHERE id > ?1 AND (?2 IS NULL OR id = ?2)
             ORDER BY id LIMIT ?3"
        ))?;

        let rows = stmt.query_map(params![cursor, scope, limit], institution_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_institution(&self, inst: &Institution) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE instansi SET code = ?1, name = ?2, address = ?3, phone = ?4, email = ?5,
                 website = ?6, head_name = ?7, head_nip = ?8, status = ?9, updated_at = ?10
                 WHERE id = ?11",
                params![
                    inst.code,
                    inst.name,
                    inst.address,
                    inst.phone,
                    inst.email,
                    inst.website,
                    inst.head_name,
                    inst.head_nip,
                    inst.status,
                    format_datetime(&inst.updated_at),
                    inst.id,
                ],
            )
            .map_err(write_error)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_institution(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM instansi WHERE id = ?1", params![id])
            .map_err(delete_error)?;
        Ok(rows > 0)
    }

    // Strategic objective operations

    fn create_objective(&self, obj: &StrategicObjective) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO sasaran_strategis ({OBJECTIVE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    obj.id,
                    obj.institution_id,
                    obj.code,
                    obj.name,
                    obj.description,
                    obj.status,
                    format_datetime(&obj.created_at),
                    format_datetime(&obj.updated_at),
                ],
            )
            .map_err(write_error)?;
        Ok(())
    }

    fn get_objective(&self, id: &str) -> Result<Option<StrategicObjective>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {OBJECTIVE_COLUMNS} FROM sasaran_strategis WHERE id = ?1"),
            params![id],
            objective_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_objectives(
        &self,
        institution_id: Option<&str>,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<StrategicObjective>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {OBJECTIVE_COLUMNS} FROM sasaran_strategis
             WHERE id > ?1 AND (?2 IS NULL OR instansi_id = ?2)
             ORDER BY id LIMIT ?3"
        ))?;

        let rows = stmt.query_map(params![cursor, institution_id, limit], objective_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_objective(&self, obj: &StrategicObjective) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE sasaran_strategis SET instansi_id = ?1, code = ?2, name = ?3,
                 description = ?4, status = ?5, updated_at = ?6 WHERE id = ?7",
                params![
                    obj.institution_id,
                    obj.code,
                    obj.name,
                    obj.description,
                    obj.status,
                    format_datetime(&obj.updated_at),
                    obj.id,
                ],
            )
            .map_err(write_error)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_objective(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sasaran_strategis WHERE id = ?1", params![id])
            .map_err(delete_error)?;
        Ok(rows > 0)
    }

    // Program operations

    fn create_program(&self, p: &Program) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO programs ({PROGRAM_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    p.id,
                    p.institution_id,
                    p.objective_id,
                    p.code,
                    p.name,
                    p.description,
                    p.budget,
                    p.fiscal_year,
                    p.status,
                    p.responsible_person,
                    format_datetime(&p.created_at),
                    format_datetime(&p.updated_at),
                ],
            )
            .map_err(write_error)?;
        Ok(())
    }

    fn get_program(&self, id: &str) -> Result<Option<Program>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PROGRAM_COLUMNS} FROM programs WHERE id = ?1"),
            params![id],
            program_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_programs(
        &self,
        filter: &ProgramFilter,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Program>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROGRAM_COLUMNS} FROM programs
             WHERE id > ?1
               AND (?2 IS NULL OR instansi_id = ?2)
               AND (?3 IS NULL OR sasaran_strategis_id = ?3)
             ORDER BY id LIMIT ?4"
        ))?;

        let rows = stmt.query_map(
            params![cursor, filter.institution_id, filter.objective_id, limit],
            program_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_program(&self, p: &Program) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE programs SET instansi_id = ?1, sasaran_strategis_id = ?2, code = ?3,
                 name = ?4, description = ?5, budget = ?6, fiscal_year = ?7, status = ?8,
                 responsible_person = ?9, updated_at = ?10 WHERE id = ?11",
                params![
                    p.institution_id,
                    p.objective_id,
                    p.code,
                    p.name,
                    p.description,
                    p.budget,
                    p.fiscal_year,
                    p.status,
                    p.responsible_person,
                    format_datetime(&p.updated_at),
                    p.id,
                ],
            )
            .map_err(write_error)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_program(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM programs WHERE id = ?1", params![id])
            .map_err(delete_error)?;
        Ok(rows > 0)
    }

    // Activity operations

    fn create_activity(&self, a: &Activity) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO kegiatan ({ACTIVITY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    a.id,
                    a.program_id,
                    a.code,
                    a.name,
                    a.description,
                    a.budget,
                    a.realized_budget,
                    a.start_date.as_ref().map(format_date),
                    a.end_date.as_ref().map(format_date),
                    a.responsible_person,
                    a.status,
                    format_datetime(&a.created_at),
                    format_datetime(&a.updated_at),
                ],
            )
            .map_err(write_error)?;
        Ok(())
    }

    fn get_activity(&self, id: &str) -> Result<Option<Activity>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ACTIVITY_COLUMNS} FROM kegiatan WHERE id = ?1"),
            params![id],
            activity_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_activities(
        &self,
        filter: &ActivityFilter,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Activity>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM kegiatan
             WHERE id > ?1
               AND (?2 IS NULL OR program_id IN (SELECT id FROM programs WHERE instansi_id = ?2))
               AND (?3 IS NULL OR program_id = ?3)
             ORDER BY id LIMIT ?4"
        ))?;

        let rows = stmt.query_map(
            params![cursor, filter.institution_id, filter.program_id, limit],
            activity_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_activity(&self, a: &Activity) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE kegiatan SET program_id = ?1, code = ?2, name = ?3, description = ?4,
                 budget = ?5, realized_budget = ?6, start_date = ?7, end_date = ?8,
                 responsible_person = ?9, status = ?10, updated_at = ?11 WHERE id = ?12",
                params![
                    a.program_id,
                    a.code,
                    a.name,
                    a.description,
                    a.budget,
                    a.realized_budget,
                    a.start_date.as_ref().map(format_date),
                    a.end_date.as_ref().map(format_date),
                    a.responsible_person,
                    a.status,
                    format_datetime(&a.updated_at),
                    a.id,
                ],
            )
            .map_err(write_error)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_activity(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM kegiatan WHERE id = ?1", params![id])
            .map_err(delete_error)?;
        Ok(rows > 0)
    }

    // Indicator operations

    fn create_indicator(
        &self,
        ind: &PerformanceIndicator,
        targets: &[IndicatorTarget],
    ) -> Result<()> {
        if targets.is_empty() {
            return Err(Error::BadRequest(
                "an indicator needs at least one target".to_string(),
            ));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO performance_indicators ({INDICATOR_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
            ),
            params![
                ind.id,
                ind.institution_id,
                ind.objective_id,
                ind.program_id,
                ind.activity_id,
                ind.code,
                ind.name,
                ind.description,
                ind.category,
                ind.measurement_unit,
                ind.measurement_type,
                ind.frequency,
                ind.data_source,
                ind.collection_method,
                ind.formula,
                ind.weight,
                ind.is_mandatory,
                ind.created_by,
                format_datetime(&ind.created_at),
                format_datetime(&ind.updated_at),
            ],
        )
        .map_err(write_error)?;

        insert_targets(&tx, targets)?;

        tx.commit()?;
        Ok(())
    }

    fn get_indicator(&self, id: &str) -> Result<Option<PerformanceIndicator>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {INDICATOR_COLUMNS} FROM performance_indicators WHERE id = ?1"),
            params![id],
            indicator_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_indicator_by_code(&self, code: &str) -> Result<Option<PerformanceIndicator>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {INDICATOR_COLUMNS} FROM performance_indicators WHERE code = ?1"),
            params![code],
            indicator_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_indicators(
        &self,
        filter: &IndicatorFilter,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<PerformanceIndicator>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {INDICATOR_COLUMNS} FROM performance_indicators
             WHERE id > ?1
               AND (?2 IS NULL OR instansi_id = ?2)
               AND (?3 IS NULL OR sasaran_strategis_id = ?3)
               AND (?4 IS NULL OR program_id = ?4)
               AND (?5 IS NULL OR kegiatan_id = ?5)
             ORDER BY id LIMIT ?6"
        ))?;

        let rows = stmt.query_map(
            params![
                cursor,
                filter.institution_id,
                filter.objective_id,
                filter.program_id,
                filter.activity_id,
                limit
            ],
            indicator_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_indicator(&self, ind: &PerformanceIndicator) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE performance_indicators SET instansi_id = ?1, sasaran_strategis_id = ?2,
                 program_id = ?3, kegiatan_id = ?4, code = ?5, name = ?6, description = ?7,
                 category = ?8, measurement_unit = ?9, measurement_type = ?10, frequency = ?11,
                 data_source = ?12, collection_method = ?13, formula = ?14, weight = ?15,
                 is_mandatory = ?16, updated_at = ?17 WHERE id = ?18",
                params![
                    ind.institution_id,
                    ind.objective_id,
                    ind.program_id,
                    ind.activity_id,
                    ind.code,
                    ind.name,
                    ind.description,
                    ind.category,
                    ind.measurement_unit,
                    ind.measurement_type,
                    ind.frequency,
                    ind.data_source,
                    ind.collection_method,
                    ind.formula,
                    ind.weight,
                    ind.is_mandatory,
                    format_datetime(&ind.updated_at),
                    ind.id,
                ],
            )
            .map_err(write_error)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_indicator(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute(
                "DELETE FROM performance_indicators WHERE id = ?1",
                params![id],
            )
            .map_err(delete_error)?;
        Ok(rows > 0)
    }

    // Indicator target operations

    fn list_targets(&self, indicator_id: &str) -> Result<Vec<IndicatorTarget>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TARGET_COLUMNS} FROM indicator_targets WHERE indicator_id = ?1 ORDER BY year"
        ))?;

        let rows = stmt.query_map(params![indicator_id], target_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn get_target(&self, indicator_id: &str, year: i32) -> Result<Option<IndicatorTarget>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {TARGET_COLUMNS} FROM indicator_targets WHERE indicator_id = ?1 AND year = ?2"
            ),
            params![indicator_id, year],
            target_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn replace_targets(&self, indicator_id: &str, targets: &[IndicatorTarget]) -> Result<()> {
        if targets.is_empty() {
            return Err(Error::BadRequest(
                "an indicator needs at least one target".to_string(),
            ));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM performance_indicators WHERE id = ?1)",
            params![indicator_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::NotFound);
        }

        tx.execute(
            "DELETE FROM indicator_targets WHERE indicator_id = ?1",
            params![indicator_id],
        )?;
        insert_targets(&tx, targets)?;

        tx.commit()?;
        Ok(())
    }

    // Performance data operations

    fn create_performance_data(&self, data: &PerformanceData) -> Result<()> {
        insert_data(&self.conn(), data)
    }

    fn create_performance_data_batch(&self, rows: &[PerformanceData]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for row in rows {
            insert_data(&tx, row)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_performance_data(&self, id: &str) -> Result<Option<PerformanceData>> {
        select_data(&self.conn(), id)
    }

    fn find_performance_data(
        &self,
        indicator_id: &str,
        year: i32,
        period: &str,
    ) -> Result<Option<PerformanceData>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {DATA_COLUMNS} FROM performance_data
                 WHERE indicator_id = ?1 AND year = ?2 AND period = ?3"
            ),
            params![indicator_id, year, period],
            data_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_performance_data(
        &self,
        filter: &DataFilter,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<PerformanceData>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DATA_COLUMNS} FROM performance_data
             WHERE id > ?1
               AND (?2 IS NULL OR instansi_id = ?2)
               AND (?3 IS NULL OR indicator_id = ?3)
               AND (?4 IS NULL OR year = ?4)
               AND (?5 IS NULL OR period = ?5)
               AND (?6 IS NULL OR status = ?6)
             ORDER BY id LIMIT ?7"
        ))?;

        let rows = stmt.query_map(
            params![
                cursor,
                filter.institution_id,
                filter.indicator_id,
                filter.year,
                filter.period,
                filter.status,
                limit
            ],
            data_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_performance_data(
        &self,
        d: &PerformanceData,
        from: &'static [DataStatus],
    ) -> Result<()> {
        let conn = self.conn();
        let rows = conn
            .execute(
                &format!(
                    "UPDATE performance_data SET year = ?1, period = ?2, actual_value = ?3,
                     target_value = ?4, achievement = ?5, data_source = ?6, collection_method = ?7,
                     notes = ?8, status = ?9, updated_by = ?10, updated_at = ?11
                     WHERE id = ?12 AND status IN ({})",
                    status_list(from)
                ),
                params![
                    d.year,
                    d.period,
                    d.actual_value,
                    d.target_value,
                    d.achievement,
                    d.data_source,
                    d.collection_method,
                    d.notes,
                    d.status,
                    d.updated_by,
                    format_datetime(&d.updated_at),
                    d.id,
                ],
            )
            .map_err(write_error)?;

        if rows == 0 {
            return Err(transition_failure(&conn, "performance_data", &d.id, "update"));
        }
        Ok(())
    }

    fn transition_performance_data(
        &self,
        change: &StatusChange<'_, DataStatus>,
    ) -> Result<PerformanceData> {
        let conn = self.conn();
        let at = format_datetime(&change.at);

        let sql = if change.to == DataStatus::Submitted {
            format!(
                "UPDATE performance_data SET status = ?1, submitted_at = ?2, updated_at = ?2,
                 updated_by = ?3, validated_by = NULL, validated_at = NULL,
                 validation_notes = COALESCE(?4, validation_notes)
                 WHERE id = ?5 AND status IN ({})",
                status_list(change.from)
            )
        } else {
            format!(
                "UPDATE performance_data SET status = ?1, validated_at = ?2, updated_at = ?2,
                 validated_by = ?3, validation_notes = ?4
                 WHERE id = ?5 AND status IN ({})",
                status_list(change.from)
            )
        };

        let rows = conn.execute(
            &sql,
            params![change.to, at, change.actor_id, change.notes, change.id],
        )?;

        if rows == 0 {
            return Err(transition_failure(
                &conn,
                "performance_data",
                change.id,
                change.action,
            ));
        }

        select_data(&conn, change.id)?.ok_or(Error::NotFound)
    }

    fn delete_performance_data(&self, id: &str) -> Result<bool> {
        let conn = self.conn();
        let rows = conn
            .execute(
                "DELETE FROM performance_data WHERE id = ?1 AND status != ?2",
                params![id, DataStatus::Validated],
            )
            .map_err(delete_error)?;

        if rows == 0 {
            return match current_status(&conn, "performance_data", id)? {
                Some(from) => Err(Error::InvalidTransition {
                    action: "delete",
                    from,
                }),
                None => Ok(false),
            };
        }
        Ok(true)
    }

    fn summarize_performance_data(
        &self,
        institution_id: Option<&str>,
        year: Option<i32>,
    ) -> Result<DataSummary> {
        let conn = self.conn();
        let mut summary = DataSummary {
            indicators: conn.query_row(
                "SELECT COUNT(*) FROM performance_indicators WHERE (?1 IS NULL OR instansi_id = ?1)",
                params![institution_id],
                |row| row.get(0),
            )?,
            ..DataSummary::default()
        };

        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM performance_data
             WHERE (?1 IS NULL OR instansi_id = ?1) AND (?2 IS NULL OR year = ?2)
             GROUP BY status",
        )?;
        let counts = stmt.query_map(params![institution_id, year], |row| {
            Ok((row.get::<_, DataStatus>(0)?, row.get::<_, i64>(1)?))
        })?;

        for count in counts {
            let (status, n) = count?;
            summary.total += n;
            match status {
                DataStatus::Draft => summary.draft += n,
                DataStatus::Submitted => summary.submitted += n,
                DataStatus::Validated => summary.validated += n,
                DataStatus::Rejected => summary.rejected += n,
                DataStatus::NeedsRevision => summary.needs_revision += n,
            }
        }

        summary.average_achievement = conn.query_row(
            "SELECT AVG(achievement) FROM performance_data
             WHERE (?1 IS NULL OR instansi_id = ?1) AND (?2 IS NULL OR year = ?2)
               AND status = ?3 AND achievement IS NOT NULL",
            params![institution_id, year, DataStatus::Validated],
            |row| row.get(0),
        )?;

        Ok(summary)
    }

    // Evidence document operations

    fn create_evidence(&self, docs: &[EvidenceDocument]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for doc in docs {
            tx.execute(
                &format!(
                    "INSERT INTO evidence_documents ({EVIDENCE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    doc.id,
                    doc.performance_data_id,
                    doc.file_name,
                    doc.stored_path,
                    doc.content_type,
                    doc.file_size,
                    doc.checksum,
                    doc.description,
                    doc.uploaded_by,
                    format_datetime(&doc.created_at),
                ],
            )
            .map_err(write_error)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_evidence(&self, id: &str) -> Result<Option<EvidenceDocument>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {EVIDENCE_COLUMNS} FROM evidence_documents WHERE id = ?1"),
            params![id],
            evidence_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_evidence(&self, performance_data_id: &str) -> Result<Vec<EvidenceDocument>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence_documents
             WHERE performance_data_id = ?1 ORDER BY created_at"
        ))?;

        let rows = stmt.query_map(params![performance_data_id], evidence_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_evidence(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM evidence_documents WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Assessment operations

    fn create_assessment(&self, a: &Assessment) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO assessments ({ASSESSMENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
                ),
                params![
                    a.id,
                    a.indicator_id,
                    a.performance_data_id,
                    a.period,
                    to_json(&a.criteria)?,
                    a.overall_score,
                    a.achievement_level,
                    a.comments,
                    a.recommendations,
                    a.status,
                    a.assessed_by,
                    a.reviewed_by,
                    a.reviewed_at.as_ref().map(format_datetime),
                    a.review_notes,
                    format_datetime(&a.created_at),
                    format_datetime(&a.updated_at),
                ],
            )
            .map_err(write_error)?;
        Ok(())
    }

    fn get_assessment(&self, id: &str) -> Result<Option<Assessment>> {
        select_assessment(&self.conn(), id)
    }

    fn list_assessments(
        &self,
        filter: &AssessmentFilter,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Assessment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM assessments
             WHERE id > ?1
               AND (?2 IS NULL OR indicator_id IN
                    (SELECT id FROM performance_indicators WHERE instansi_id = ?2))
               AND (?3 IS NULL OR indicator_id = ?3)
               AND (?4 IS NULL OR status = ?4)
             ORDER BY id LIMIT ?5"
        ))?;

        let rows = stmt.query_map(
            params![
                cursor,
                filter.institution_id,
                filter.indicator_id,
                filter.status,
                limit
            ],
            assessment_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_assessment(&self, a: &Assessment, from: &'static [ReviewStatus]) -> Result<()> {
        let conn = self.conn();
        let rows = conn
            .execute(
                &format!(
                    "UPDATE assessments SET indicator_id = ?1, performance_data_id = ?2, period = ?3,
                     criteria = ?4, overall_score = ?5, achievement_level = ?6, comments = ?7,
                     recommendations = ?8, status = ?9, updated_at = ?10
                     WHERE id = ?11 AND status IN ({})",
                    status_list(from)
                ),
                params![
                    a.indicator_id,
                    a.performance_data_id,
                    a.period,
                    to_json(&a.criteria)?,
                    a.overall_score,
                    a.achievement_level,
                    a.comments,
                    a.recommendations,
                    a.status,
                    format_datetime(&a.updated_at),
                    a.id,
                ],
            )
            .map_err(write_error)?;

        if rows == 0 {
            return Err(transition_failure(&conn, "assessments", &a.id, "update"));
        }
        Ok(())
    }

    fn transition_assessment(
        &self,
        change: &StatusChange<'_, ReviewStatus>,
    ) -> Result<Assessment> {
        let conn = self.conn();
        let rows = conn.execute(
            &review_transition_sql("assessments", change),
            params![
                change.to,
                format_datetime(&change.at),
                change.actor_id,
                change.notes,
                change.id
            ],
        )?;

        if rows == 0 {
            return Err(transition_failure(
                &conn,
                "assessments",
                change.id,
                change.action,
            ));
        }

        select_assessment(&conn, change.id)?.ok_or(Error::NotFound)
    }

    fn delete_assessment(&self, id: &str) -> Result<bool> {
        delete_unless_approved(&self.conn(), "assessments", id)
    }

    // Report operations

    fn create_report(&self, r: &Report) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO reports ({REPORT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                r.id,
                r.institution_id,
                r.title,
                r.report_type,
                r.category,
                r.year,
                r.period,
                r.format,
                to_json(&r.options)?,
                r.status,
                r.created_by,
                r.reviewed_by,
                r.reviewed_at.as_ref().map(format_datetime),
                r.review_notes,
                format_datetime(&r.created_at),
                format_datetime(&r.updated_at),
            ],
        )
        .map_err(write_error)?;
        write_report_indicators(&tx, r)?;

        tx.commit()?;
        Ok(())
    }

    fn get_report(&self, id: &str) -> Result<Option<Report>> {
        select_report(&self.conn(), id)
    }

    fn list_reports(&self, filter: &ReportFilter, cursor: &str, limit: i32) -> Result<Vec<Report>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports
             WHERE id > ?1
               AND (?2 IS NULL OR instansi_id = ?2)
               AND (?3 IS NULL OR year = ?3)
               AND (?4 IS NULL OR status = ?4)
             ORDER BY id LIMIT ?5"
        ))?;

        let rows = stmt.query_map(
            params![cursor, filter.institution_id, filter.year, filter.status, limit],
            report_from_row,
        )?;
        let mut reports = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        for report in &mut reports {
            load_report_indicators(&conn, report)?;
        }
        Ok(reports)
    }

    fn update_report(&self, r: &Report, from: &'static [ReviewStatus]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx
            .execute(
                &format!(
                    "UPDATE reports SET instansi_id = ?1, title = ?2, report_type = ?3, category = ?4,
                     year = ?5, period = ?6, format = ?7, options = ?8, status = ?9, updated_at = ?10
                     WHERE id = ?11 AND status IN ({})",
                    status_list(from)
                ),
                params![
                    r.institution_id,
                    r.title,
                    r.report_type,
                    r.category,
                    r.year,
                    r.period,
                    r.format,
                    to_json(&r.options)?,
                    r.status,
                    format_datetime(&r.updated_at),
                    r.id,
                ],
            )
            .map_err(write_error)?;

        if rows == 0 {
            return Err(transition_failure(&tx, "reports", &r.id, "update"));
        }

        write_report_indicators(&tx, r)?;
        tx.commit()?;
        Ok(())
    }

    fn transition_report(&self, change: &StatusChange<'_, ReviewStatus>) -> Result<Report> {
        let conn = self.conn();
        let rows = conn.execute(
            &review_transition_sql("reports", change),
            params![
                change.to,
                format_datetime(&change.at),
                change.actor_id,
                change.notes,
                change.id
            ],
        )?;

        if rows == 0 {
            return Err(transition_failure(&conn, "reports", change.id, change.action));
        }

        select_report(&conn, change.id)?.ok_or(Error::NotFound)
    }

    fn delete_report(&self, id: &str) -> Result<bool> {
        delete_unless_approved(&self.conn(), "reports", id)
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    user.id,
                    user.name,
                    user.email,
                    user.password_hash,
                    user.institution_id,
                    user.is_active,
                    format_datetime(&user.created_at),
                    format_datetime(&user.updated_at),
                    user.last_login_at.as_ref().map(format_datetime),
                ],
            )
            .map_err(write_error)?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
            params![email],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![cursor, limit], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE users SET name = ?1, email = ?2, password_hash = ?3, instansi_id = ?4,
                 is_active = ?5, updated_at = ?6 WHERE id = ?7",
                params![
                    user.name,
                    user.email,
                    user.password_hash,
                    user.institution_id,
                    user.is_active,
                    format_datetime(&user.updated_at),
                    user.id,
                ],
            )
            .map_err(write_error)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn update_user_last_login(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .map_err(delete_error)?;
        Ok(rows > 0)
    }

    fn count_users(&self) -> Result<i64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(Error::from)
    }

    // Role operations

    fn create_role(&self, role: &Role) -> Result<()> {
        self.conn()
            .execute(
                &format!("INSERT INTO roles ({ROLE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    role.id,
                    role.name,
                    role.description,
                    i64::from(role.permissions),
                    format_datetime(&role.created_at),
                    format_datetime(&role.updated_at),
                ],
            )
            .map_err(write_error)?;
        Ok(())
    }

    fn get_role(&self, id: &str) -> Result<Option<Role>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = ?1"),
            params![id],
            role_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = ?1"),
            params![name],
            role_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_roles(&self) -> Result<Vec<Role>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY name"))?;

        let rows = stmt.query_map([], role_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_role(&self, role: &Role) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE roles SET name = ?1, description = ?2, permissions = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    role.name,
                    role.description,
                    i64::from(role.permissions),
                    format_datetime(&role.updated_at),
                    role.id,
                ],
            )
            .map_err(write_error)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_role(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM roles WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_user_roles(&self, user_id: &str) -> Result<Vec<Role>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT r.id, r.name, r.description, r.permissions, r.created_at, r.updated_at
             FROM roles r
             INNER JOIN user_roles ur ON r.id = ur.role_id
             WHERE ur.user_id = ?1
             ORDER BY r.name",
        )?;

        let rows = stmt.query_map(params![user_id], role_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn set_user_roles(&self, user_id: &str, role_ids: &[String]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM user_roles WHERE user_id = ?1", params![user_id])?;
        for role_id in role_ids {
            tx.execute(
                "INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?1, ?2)",
                params![user_id, role_id],
            )
            .map_err(write_error)?;
        }

        tx.commit()?;
        Ok(())
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            &format!("INSERT INTO tokens ({TOKEN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
                token.last_used_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
                    && err.extended_code != rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                Err(Error::TokenLookupCollision)
            }
            Err(e) => Err(write_error(e)),
        }
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
            params![lookup],
            token_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Audit log operations

    fn create_audit_log(&self, e: &AuditLog) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO audit_logs ({AUDIT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                e.id,
                e.user_id,
                e.institution_id,
                e.action,
                e.module,
                e.description,
                e.old_values.as_ref().map(to_json).transpose()?,
                e.new_values.as_ref().map(to_json).transpose()?,
                e.ip_address,
                e.user_agent,
                format_datetime(&e.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_audit_log(&self, id: &str) -> Result<Option<AuditLog>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE id = ?1"),
            params![id],
            audit_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_audit_logs(
        &self,
        filter: &AuditFilter,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<AuditLog>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs
             WHERE id > ?1
               AND (?2 IS NULL OR user_id = ?2)
               AND (?3 IS NULL OR action = ?3)
               AND (?4 IS NULL OR module = ?4)
             ORDER BY id LIMIT ?5"
        ))?;

        let rows = stmt.query_map(
            params![cursor, filter.user_id, filter.action, filter.module, limit],
            audit_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Setting operations

    fn get_setting(&self, key: &str) -> Result<Option<Setting>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SETTING_COLUMNS} FROM settings WHERE key = ?1"),
            params![key],
            setting_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_settings(&self) -> Result<Vec<Setting>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {SETTING_COLUMNS} FROM settings ORDER BY key"))?;

        let rows = stmt.query_map([], setting_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn upsert_setting(&self, s: &Setting) -> Result<()> {
        self.conn().execute(
            "INSERT INTO settings (key, value, type, description, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               type = excluded.type,
               description = COALESCE(excluded.description, settings.description),
               updated_at = excluded.updated_at",
            params![
                s.key,
                s.value,
                s.setting_type,
                s.description,
                format_datetime(&s.updated_at),
            ],
        )?;
        Ok(())
    }

    fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    // Import session operations

    fn create_import_session(&self, session: &ImportSession) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO import_sessions (id, user_id, year, rows, errors, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session.id,
                    session.user_id,
                    session.year,
                    to_json(&session.rows)?,
                    to_json(&session.errors)?,
                    format_datetime(&session.created_at),
                ],
            )
            .map_err(write_error)?;
        Ok(())
    }

    fn get_import_session(&self, id: &str) -> Result<Option<ImportSession>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, user_id, year, rows, errors, created_at FROM import_sessions WHERE id = ?1",
            params![id],
            |row| {
                Ok(ImportSession {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    year: row.get(2)?,
                    rows: json_at(row, 3)?,
                    errors: json_at(row, 4)?,
                    created_at: datetime_at(row, 5)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_import_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM import_sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn review_transition_sql(table: &str, change: &StatusChange<'_, ReviewStatus>) -> String {
    let from = status_list(change.from);
    if change.to == ReviewStatus::Submitted {
        format!(
            "UPDATE {table} SET status = ?1, updated_at = ?2, reviewed_by = NULL,
             reviewed_at = NULL, review_notes = COALESCE(?4, review_notes)
             WHERE id = ?5 AND status IN ({from})"
        )
    } else {
        format!(
            "UPDATE {table} SET status = ?1, reviewed_at = ?2, updated_at = ?2,
             reviewed_by = ?3, review_notes = ?4
             WHERE id = ?5 AND status IN ({from})"
        )
    }
}

fn delete_unless_approved(conn: &Connection, table: &str, id: &str) -> Result<bool> {
    let rows = conn
        .execute(
            &format!("DELETE FROM {table} WHERE id = ?1 AND status != ?2"),
            params![id, ReviewStatus::Approved],
        )
        .map_err(delete_error)?;

    if rows == 0 {
        return match current_status(conn, table, id)? {
            Some(from) => Err(Error::InvalidTransition {
                action: "delete",
                from,
            }),
            None => Ok(false),
        };
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store.seed_defaults().unwrap();
        (temp, store)
    }

    fn institution(id: &str, code: &str) -> Institution {
        let now = Utc::now();
        Institution {
            id: id.to_string(),
            code: code.to_string(),
            name: format!("Dinas {code}"),
            address: None,
            phone: None,
            email: None,
            website: None,
            head_name: None,
            head_nip: None,
            status: RecordStatus::Aktif,
            created_at: now,
            updated_at: now,
        }
    }

    fn indicator(id: &str, inst: &str, code: &str) -> PerformanceIndicator {
        let now = Utc::now();
        PerformanceIndicator {
            id: id.to_string(),
            institution_id: inst.to_string(),
            objective_id: None,
            program_id: None,
            activity_id: None,
            code: code.to_string(),
            name: "Persentase layanan tepat waktu".to_string(),
            description: None,
            category: IndicatorCategory::Output,
            measurement_unit: "%".to_string(),
            measurement_type: MeasurementType::Percentage,
            frequency: Frequency::Quarterly,
            data_source: None,
            collection_method: CollectionMethod::Manual,
            formula: None,
            weight: 20.0,
            is_mandatory: false,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn target(indicator_id: &str, year: i32, value: f64) -> IndicatorTarget {
        let now = Utc::now();
        IndicatorTarget {
            id: Uuid::new_v4().to_string(),
            indicator_id: indicator_id.to_string(),
            year,
            target_value: value,
            minimum_value: None,
            justification: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn data(id: &str, indicator_id: &str, period: &str) -> PerformanceData {
        let now = Utc::now();
        PerformanceData {
            id: id.to_string(),
            indicator_id: indicator_id.to_string(),
            institution_id: "inst-1".to_string(),
            year: 2025,
            period: period.to_string(),
            actual_value: 75.0,
            target_value: Some(80.0),
            achievement: Some(93.75),
            data_source: None,
            collection_method: None,
            notes: None,
            status: DataStatus::Draft,
            submitted_at: None,
            validated_by: None,
            validated_at: None,
            validation_notes: None,
            created_by: "user-1".to_string(),
            updated_by: "user-1".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn seeded_with_indicator() -> (TempDir, SqliteStore) {
        let (temp, store) = open_store();
        store.create_institution(&institution("inst-1", "DISKOMINFO")).unwrap();
        store
            .create_indicator(
                &indicator("ind-1", "inst-1", "IK-01"),
                &[target("ind-1", 2025, 80.0)],
            )
            .unwrap();
        (temp, store)
    }

    fn change<'a>(
        id: &'a str,
        t: crate::domain::lifecycle::Transition<DataStatus>,
        notes: Option<&'a str>,
    ) -> StatusChange<'a, DataStatus> {
        StatusChange {
            id,
            action: t.action,
            from: t.from,
            to: t.to,
            actor_id: "user-2",
            notes,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = open_store();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "instansi",
            "sasaran_strategis",
            "programs",
            "kegiatan",
            "performance_indicators",
            "indicator_targets",
            "performance_data",
            "evidence_documents",
            "assessments",
            "reports",
            "report_indicators",
            "users",
            "roles",
            "user_roles",
            "tokens",
            "audit_logs",
            "settings",
            "import_sessions",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_seed_defaults_is_idempotent() {
        let (_temp, store) = open_store();
        store.seed_defaults().unwrap();

        let roles = store.list_roles().unwrap();
        assert_eq!(roles.len(), DEFAULT_ROLES.len());
        let superadmin = store.get_role_by_name("superadmin").unwrap().unwrap();
        assert!(superadmin.permissions.has(Permission::all()));

        let settings = store.list_settings().unwrap();
        assert_eq!(settings.len(), crate::settings::DEFAULTS.len());
    }

    #[test]
    fn test_institution_crud_and_unique_code() {
        let (_temp, store) = open_store();
        store.create_institution(&institution("inst-1", "BAPPEDA")).unwrap();

        let fetched = store.get_institution("inst-1").unwrap().unwrap();
        assert_eq!(fetched.code, "BAPPEDA");

        let dup = store.create_institution(&institution("inst-2", "BAPPEDA"));
        assert!(matches!(dup, Err(Error::AlreadyExists)));

        let mut updated = fetched.clone();
        updated.name = "Badan Perencanaan".to_string();
        store.update_institution(&updated).unwrap();
        assert_eq!(
            store.get_institution("inst-1").unwrap().unwrap().name,
            "Badan Perencanaan"
        );

        assert!(store.delete_institution("inst-1").unwrap());
        assert!(store.get_institution("inst-1").unwrap().is_none());
    }

    #[test]
    fn test_delete_institution_with_children_conflicts() {
        let (_temp, store) = seeded_with_indicator();
        let result = store.delete_institution("inst-1");
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_indicator_requires_targets() {
        let (_temp, store) = open_store();
        store.create_institution(&institution("inst-1", "DINKES")).unwrap();

        let result = store.create_indicator(&indicator("ind-1", "inst-1", "IK-01"), &[]);
        assert!(matches!(result, Err(Error::BadRequest(_))));
        assert!(store.get_indicator("ind-1").unwrap().is_none());
    }

    #[test]
    fn test_replace_targets() {
        let (_temp, store) = seeded_with_indicator();

        store
            .replace_targets(
                "ind-1",
                &[target("ind-1", 2025, 85.0), target("ind-1", 2026, 90.0)],
            )
            .unwrap();
        let targets = store.list_targets("ind-1").unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].target_value, 85.0);

        assert!(store.replace_targets("ind-1", &[]).is_err());
        assert_eq!(store.list_targets("ind-1").unwrap().len(), 2);

        let dup = store.replace_targets(
            "ind-1",
            &[target("ind-1", 2025, 1.0), target("ind-1", 2025, 2.0)],
        );
        assert!(matches!(dup, Err(Error::AlreadyExists)));
        assert_eq!(store.list_targets("ind-1").unwrap().len(), 2);
    }

    #[test]
    fn test_performance_data_unique_per_period() {
        let (_temp, store) = seeded_with_indicator();
        store.create_performance_data(&data("pd-1", "ind-1", "Q1")).unwrap();

        let dup = store.create_performance_data(&data("pd-2", "ind-1", "Q1"));
        assert!(matches!(dup, Err(Error::AlreadyExists)));

        let found = store.find_performance_data("ind-1", 2025, "Q1").unwrap();
        assert_eq!(found.unwrap().id, "pd-1");
    }

    #[test]
    fn test_evidence_batch_is_all_or_nothing() {
        let (_temp, store) = seeded_with_indicator();
        store.create_performance_data(&data("pd-1", "ind-1", "Q1")).unwrap();

        let doc = |id: &str| EvidenceDocument {
            id: id.to_string(),
            performance_data_id: "pd-1".to_string(),
            file_name: format!("{id}.pdf"),
            stored_path: format!("pd-1/{id}"),
            content_type: "application/pdf".to_string(),
            file_size: 10,
            checksum: "00".repeat(32),
            description: None,
            uploaded_by: "user-1".to_string(),
            created_at: Utc::now(),
        };

        let result = store.create_evidence(&[doc("ev-1"), doc("ev-2"), doc("ev-1")]);
        assert!(matches!(result, Err(Error::AlreadyExists)));
        assert!(store.list_evidence("pd-1").unwrap().is_empty());

        store.create_evidence(&[doc("ev-1"), doc("ev-2")]).unwrap();
        assert_eq!(store.list_evidence("pd-1").unwrap().len(), 2);
    }

    #[test]
    fn test_transitions_are_conditional() {
        use crate::domain::lifecycle::*;

        let (_temp, store) = seeded_with_indicator();
        store.create_performance_data(&data("pd-1", "ind-1", "Q1")).unwrap();

        let result = store.transition_performance_data(&change("pd-1", DATA_VALIDATE, None));
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));

        let submitted = store
            .transition_performance_data(&change("pd-1", DATA_SUBMIT, None))
            .unwrap();
        assert_eq!(submitted.status, DataStatus::Submitted);
        assert!(submitted.submitted_at.is_some());

        let validated = store
            .transition_performance_data(&change("pd-1", DATA_VALIDATE, Some("ok")))
            .unwrap();
        assert_eq!(validated.status, DataStatus::Validated);
        assert_eq!(validated.validated_by.as_deref(), Some("user-2"));

        // A second validator loses the race.
        let again = store.transition_performance_data(&change("pd-1", DATA_REJECT, Some("no")));
        assert!(matches!(
            again,
            Err(Error::InvalidTransition { ref from, .. }) if from == "validated"
        ));

        let delete = store.delete_performance_data("pd-1");
        assert!(matches!(delete, Err(Error::InvalidTransition { .. })));

        let missing = store.transition_performance_data(&change("nope", DATA_SUBMIT, None));
        assert!(matches!(missing, Err(Error::NotFound)));
    }

    #[test]
    fn test_update_performance_data_only_when_editable() {
        use crate::domain::lifecycle::*;

        let (_temp, store) = seeded_with_indicator();
        let mut record = data("pd-1", "ind-1", "Q1");
        store.create_performance_data(&record).unwrap();

        record.actual_value = 79.0;
        store.update_performance_data(&record, DATA_UPDATE.from).unwrap();
        assert_eq!(
            store.get_performance_data("pd-1").unwrap().unwrap().actual_value,
            79.0
        );

        store
            .transition_performance_data(&change("pd-1", DATA_SUBMIT, None))
            .unwrap();
        let result = store.update_performance_data(&record, DATA_UPDATE.from);
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
    }

    #[test]
    fn test_summary_counts() {
        use crate::domain::lifecycle::*;

        let (_temp, store) = seeded_with_indicator();
        store.create_performance_data(&data("pd-1", "ind-1", "Q1")).unwrap();
        store.create_performance_data(&data("pd-2", "ind-1", "Q2")).unwrap();
        store
            .transition_performance_data(&change("pd-1", DATA_SUBMIT, None))
            .unwrap();
        store
            .transition_performance_data(&change("pd-1", DATA_VALIDATE, None))
            .unwrap();

        let summary = store
            .summarize_performance_data(Some("inst-1"), Some(2025))
            .unwrap();
        assert_eq!(summary.indicators, 1);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.draft, 1);
        assert_eq!(summary.validated, 1);
        assert_eq!(summary.average_achievement, Some(93.75));
    }

    #[test]
    fn test_user_roles_and_tokens() {
        let (_temp, store) = open_store();
        let now = Utc::now();
        let user = User {
            id: "user-1".to_string(),
            name: "Admin".to_string(),
            email: "admin@example.go.id".to_string(),
            password_hash: "hash".to_string(),
            institution_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        store.create_user(&user).unwrap();
        assert!(
            store
                .get_user_by_email("ADMIN@example.go.id")
                .unwrap()
                .is_some()
        );

        let assessor = store.get_role_by_name("assessor").unwrap().unwrap();
        store
            .set_user_roles("user-1", &[assessor.id.clone()])
            .unwrap();
        let roles = store.list_user_roles("user-1").unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, "assessor");

        let unknown = store.set_user_roles("user-1", &["missing".to_string()]);
        assert!(matches!(unknown, Err(Error::BadRequest(_))));
        assert_eq!(store.list_user_roles("user-1").unwrap().len(), 1);

        let token = Token {
            id: "tok-1".to_string(),
            token_hash: "hash".to_string(),
            token_lookup: "abcd1234".to_string(),
            user_id: "user-1".to_string(),
            created_at: now,
            expires_at: None,
            last_used_at: None,
        };
        store.create_token(&token).unwrap();
        let collision = store.create_token(&Token {
            id: "tok-2".to_string(),
            ..token.clone()
        });
        assert!(matches!(collision, Err(Error::TokenLookupCollision)));

        assert!(store.delete_user("user-1").unwrap());
        assert!(store.get_token_by_lookup("abcd1234").unwrap().is_none());
    }

    #[test]
    fn test_report_indicators_round_trip() {
        let (_temp, store) = seeded_with_indicator();
        let now = Utc::now();
        let report = Report {
            id: "rep-1".to_string(),
            institution_id: "inst-1".to_string(),
            title: "LAKIP 2025".to_string(),
            report_type: ReportType::Annual,
            category: None,
            year: 2025,
            period: "Y".to_string(),
            indicator_ids: vec!["ind-1".to_string()],
            format: ReportFormat::Pdf,
            options: serde_json::json!({"include_charts": true}),
            status: ReviewStatus::Draft,
            created_by: "user-1".to_string(),
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            created_at: now,
            updated_at: now,
        };
        store.create_report(&report).unwrap();

        let fetched = store.get_report("rep-1").unwrap().unwrap();
        assert_eq!(fetched.indicator_ids, vec!["ind-1".to_string()]);
        assert_eq!(fetched.options["include_charts"], true);

        let listed = store
            .list_reports(&ReportFilter::default(), "", 10)
            .unwrap();
        assert_eq!(listed[0].indicator_ids.len(), 1);
    }

    #[test]
    fn test_settings_upsert_keeps_description() {
        let (_temp, store) = open_store();
        let before = store
            .get_setting(crate::settings::SUBMISSION_DEADLINE_DAYS)
            .unwrap()
            .unwrap();

        store
            .upsert_setting(&Setting {
                key: before.key.clone(),
                value: "14".to_string(),
                setting_type: SettingType::Integer,
                description: None,
                updated_at: Utc::now(),
            })
            .unwrap();

        let after = store.get_setting(&before.key).unwrap().unwrap();
        assert_eq!(after.value, "14");
        assert_eq!(after.description, before.description);
    }
}
