mod schema;
mod seed;
mod sqlite;

pub use seed::DEFAULT_ROLES;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

#[derive(Debug, Default, Clone)]
pub struct ProgramFilter {
    pub institution_id: Option<String>,
    pub objective_id: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ActivityFilter {
    pub institution_id: Option<String>,
    pub program_id: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct IndicatorFilter {
    pub institution_id: Option<String>,
    pub objective_id: Option<String>,
    pub program_id: Option<String>,
    pub activity_id: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct DataFilter {
    pub institution_id: Option<String>,
    pub indicator_id: Option<String>,
    pub year: Option<i32>,
    pub period: Option<String>,
    pub status: Option<DataStatus>,
}

#[derive(Debug, Default, Clone)]
pub struct AssessmentFilter {
    pub institution_id: Option<String>,
    pub indicator_id: Option<String>,
    pub status: Option<ReviewStatus>,
}

#[derive(Debug, Default, Clone)]
pub struct ReportFilter {
    pub institution_id: Option<String>,
    pub year: Option<i32>,
    pub status: Option<ReviewStatus>,
}

#[derive(Debug, Default, Clone)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub module: Option<String>,
}

/// A conditional status change: applied only while the record is in one of
/// `from`, otherwise the store reports `Error::InvalidTransition`.
#[derive(Debug, Clone)]
pub struct StatusChange<'a, S: 'static> {
    pub id: &'a str,
    pub action: &'static str,
    pub from: &'static [S],
    pub to: S,
    pub actor_id: &'a str,
    pub notes: Option<&'a str>,
    pub at: DateTime<Utc>,
}

/// Aggregate counts for the dashboard.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct DataSummary {
    pub indicators: i64,
    pub total: i64,
    pub draft: i64,
    pub submitted: i64,
    pub validated: i64,
    pub rejected: i64,
    pub needs_revision: i64,
    pub average_achievement: Option<f64>,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    /// Inserts the built-in roles and settings if they are missing.
    fn seed_defaults(&self) -> Result<()>;

    // Institution operations
    fn create_institution(&self, inst: &Institution) -> Result<()>;
    fn get_institution(&self, id: &str) -> Result<Option<Institution>>;
    fn list_institutions(
        &self,
        scope: Option<&str>,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Institution>>;
    fn update_institution(&self, inst: &Institution) -> Result<()>;
    fn delete_institution(&self, id: &str) -> Result<bool>;

    // Strategic objective operations
    fn create_objective(&self, obj: &StrategicObjective) -> Result<()>;
    fn get_objective(&self, id: &str) -> Result<Option<StrategicObjective>>;
    fn list_objectives(
        &self,
        institution_id: Option<&str>,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<StrategicObjective>>;
    fn update_objective(&self, obj: &StrategicObjective) -> Result<()>;
    fn delete_objective(&self, id: &str) -> Result<bool>;

    // Program operations
    fn create_program(&self, program: &Program) -> Result<()>;
    fn get_program(&self, id: &str) -> Result<Option<Program>>;
    fn list_programs(&self, filter: &ProgramFilter, cursor: &str, limit: i32)
    -> Result<Vec<Program>>;
    fn update_program(&self, program: &Program) -> Result<()>;
    fn delete_program(&self, id: &str) -> Result<bool>;

    // Activity (kegiatan) operations
    fn create_activity(&self, activity: &Activity) -> Result<()>;
    fn get_activity(&self, id: &str) -> Result<Option<Activity>>;
    fn list_activities(
        &self,
        filter: &ActivityFilter,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Activity>>;
    fn update_activity(&self, activity: &Activity) -> Result<()>;
    fn delete_activity(&self, id: &str) -> Result<bool>;

    // Indicator operations; targets are written in the same transaction
    fn create_indicator(
        &self,
        indicator: &PerformanceIndicator,
        targets: &[IndicatorTarget],
    ) -> Result<()>;
    fn get_indicator(&self, id: &str) -> Result<Option<PerformanceIndicator>>;
    fn get_indicator_by_code(&self, code: &str) -> Result<Option<PerformanceIndicator>>;
    fn list_indicators(
        &self,
        filter: &IndicatorFilter,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<PerformanceIndicator>>;
    fn update_indicator(&self, indicator: &PerformanceIndicator) -> Result<()>;
    fn delete_indicator(&self, id: &str) -> Result<bool>;

    // Indicator target operations
    fn list_targets(&self, indicator_id: &str) -> Result<Vec<IndicatorTarget>>;
    fn get_target(&self, indicator_id: &str, year: i32) -> Result<Option<IndicatorTarget>>;
    fn replace_targets(&self, indicator_id: &str, targets: &[IndicatorTarget]) -> Result<()>;

    // Performance data operations
    fn create_performance_data(&self, data: &PerformanceData) -> Result<()>;
    /// Inserts all rows or none.
    fn create_performance_data_batch(&self, rows: &[PerformanceData]) -> Result<()>;
    fn get_performance_data(&self, id: &str) -> Result<Option<PerformanceData>>;
    fn find_performance_data(
        &self,
        indicator_id: &str,
        year: i32,
        period: &str,
    ) -> Result<Option<PerformanceData>>;
    fn list_performance_data(
        &self,
        filter: &DataFilter,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<PerformanceData>>;
    /// Replaces the editable fields while the record is in one of `from`.
    fn update_performance_data(
        &self,
        data: &PerformanceData,
        from: &'static [DataStatus],
    ) -> Result<()>;
    fn transition_performance_data(
        &self,
        change: &StatusChange<'_, DataStatus>,
    ) -> Result<PerformanceData>;
    /// Deletes the record unless it is validated.
    fn delete_performance_data(&self, id: &str) -> Result<bool>;
    fn summarize_performance_data(
        &self,
        institution_id: Option<&str>,
        year: Option<i32>,
    ) -> Result<DataSummary>;

    // Evidence document operations
    /// Inserts all documents or none.
    fn create_evidence(&self, docs: &[EvidenceDocument]) -> Result<()>;
    fn get_evidence(&self, id: &str) -> Result<Option<EvidenceDocument>>;
    fn list_evidence(&self, performance_data_id: &str) -> Result<Vec<EvidenceDocument>>;
    fn delete_evidence(&self, id: &str) -> Result<bool>;

    // Assessment operations
    fn create_assessment(&self, assessment: &Assessment) -> Result<()>;
    fn get_assessment(&self, id: &str) -> Result<Option<Assessment>>;
    fn list_assessments(
        &self,
        filter: &AssessmentFilter,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Assessment>>;
    fn update_assessment(
        &self,
        assessment: &Assessment,
        from: &'static [ReviewStatus],
    ) -> Result<()>;
    fn transition_assessment(
        &self,
        change: &StatusChange<'_, ReviewStatus>,
    ) -> Result<Assessment>;
    fn delete_assessment(&self, id: &str) -> Result<bool>;

    // Report operations; selected indicators are stored alongside
    fn create_report(&self, report: &Report) -> Result<()>;
    fn get_report(&self, id: &str) -> Result<Option<Report>>;
    fn list_reports(&self, filter: &ReportFilter, cursor: &str, limit: i32) -> Result<Vec<Report>>;
    fn update_report(&self, report: &Report, from: &'static [ReviewStatus]) -> Result<()>;
    fn transition_report(&self, change: &StatusChange<'_, ReviewStatus>) -> Result<Report>;
    fn delete_report(&self, id: &str) -> Result<bool>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    fn update_user_last_login(&self, id: &str) -> Result<()>;
    fn delete_user(&self, id: &str) -> Result<bool>;
    fn count_users(&self) -> Result<i64>;

    // Role operations (many-to-many with users)
    fn create_role(&self, role: &Role) -> Result<()>;
    fn get_role(&self, id: &str) -> Result<Option<Role>>;
    fn get_role_by_name(&self, name: &str) -> Result<Option<Role>>;
    fn list_roles(&self) -> Result<Vec<Role>>;
    fn update_role(&self, role: &Role) -> Result<()>;
    fn delete_role(&self, id: &str) -> Result<bool>;
    fn list_user_roles(&self, user_id: &str) -> Result<Vec<Role>>;
    fn set_user_roles(&self, user_id: &str, role_ids: &[String]) -> Result<()>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;

    // Audit log operations
    fn create_audit_log(&self, entry: &AuditLog) -> Result<()>;
    fn get_audit_log(&self, id: &str) -> Result<Option<AuditLog>>;
    fn list_audit_logs(&self, filter: &AuditFilter, cursor: &str, limit: i32)
    -> Result<Vec<AuditLog>>;

    // Setting operations
    fn get_setting(&self, key: &str) -> Result<Option<Setting>>;
    fn list_settings(&self) -> Result<Vec<Setting>>;
    fn upsert_setting(&self, setting: &Setting) -> Result<()>;
    fn delete_setting(&self, key: &str) -> Result<bool>;

    // Import session operations
    fn create_import_session(&self, session: &ImportSession) -> Result<()>;
    fn get_import_session(&self, id: &str) -> Result<Option<ImportSession>>;
    fn delete_import_session(&self, id: &str) -> Result<bool>;

    fn close(&self) -> Result<()>;
}
