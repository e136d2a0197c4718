use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CriterionScore, IndicatorTarget, PerformanceIndicator, Permission, Role, User};

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Listing filter for resources that belong to an institution.
#[derive(Debug, Default, Deserialize)]
pub struct InstitutionParams {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default, alias = "institution_id")]
    pub instansi_id: Option<String>,
}

// Auth

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
    pub permissions: Vec<&'static str>,
}

impl UserResponse {
    #[must_use]
    pub fn new(user: User, roles: &[Role], permissions: Permission) -> Self {
        Self {
            user,
            roles: roles.iter().map(|r| r.name.clone()).collect(),
            permissions: permissions.to_strings(),
        }
    }
}

// Master data

#[derive(Debug, Default, Deserialize)]
pub struct InstitutionRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub head_name: Option<String>,
    #[serde(default)]
    pub head_nip: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectiveRequest {
    #[serde(default, alias = "instansi_id")]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProgramRequest {
    #[serde(default, alias = "instansi_id")]
    pub institution_id: Option<String>,
    #[serde(default, alias = "sasaran_strategis_id")]
    pub objective_id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub fiscal_year: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub responsible_person: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProgramParams {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default, alias = "institution_id")]
    pub instansi_id: Option<String>,
    #[serde(default, alias = "sasaran_strategis_id")]
    pub objective_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityRequest {
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub realized_budget: Option<f64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub responsible_person: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityParams {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default, alias = "institution_id")]
    pub instansi_id: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
}

// Indicators

#[derive(Debug, Default, Clone, Deserialize)]
pub struct TargetRequest {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub minimum_value: Option<f64>,
    #[serde(default)]
    pub justification: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndicatorRequest {
    #[serde(default, alias = "instansi_id")]
    pub institution_id: Option<String>,
    #[serde(default, alias = "sasaran_strategis_id")]
    pub objective_id: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default, alias = "kegiatan_id")]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub measurement_unit: Option<String>,
    #[serde(default)]
    pub measurement_type: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub collection_method: Option<String>,
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub is_mandatory: Option<bool>,
    /// Required on create; ignored on update (use the targets endpoint).
    #[serde(default)]
    pub targets: Option<Vec<TargetRequest>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndicatorParams {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default, alias = "institution_id")]
    pub instansi_id: Option<String>,
    #[serde(default, alias = "sasaran_strategis_id")]
    pub objective_id: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default, alias = "kegiatan_id")]
    pub activity_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TargetsRequest {
    #[serde(default)]
    pub targets: Option<Vec<TargetRequest>>,
}

#[derive(Debug, Serialize)]
pub struct IndicatorDetail {
    #[serde(flatten)]
    pub indicator: PerformanceIndicator,
    pub targets: Vec<IndicatorTarget>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodsParams {
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct PeriodResponse {
    pub code: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Whether a record already exists for this period and year.
    pub taken: bool,
}

// Performance data

#[derive(Debug, Default, Deserialize)]
pub struct PerformanceDataRequest {
    #[serde(default)]
    pub indicator_id: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub actual_value: Option<f64>,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub collection_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DataParams {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default, alias = "institution_id")]
    pub instansi_id: Option<String>,
    #[serde(default)]
    pub indicator_id: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    #[serde(default, alias = "validation_notes", alias = "review_notes")]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportPreviewResponse {
    pub session_id: String,
    pub year: i32,
    pub valid_rows: usize,
    pub rows: Vec<crate::types::ImportRow>,
    pub errors: Vec<crate::types::ImportRowError>,
}

#[derive(Debug, Serialize)]
pub struct ImportConfirmResponse {
    pub imported: usize,
}

// Assessments

#[derive(Debug, Default, Deserialize)]
pub struct AssessmentRequest {
    #[serde(default)]
    pub indicator_id: Option<String>,
    #[serde(default)]
    pub performance_data_id: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub criteria: Vec<CriterionScore>,
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub recommendations: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoAssessmentRequest {
    #[serde(default)]
    pub performance_data_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssessmentParams {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default, alias = "institution_id")]
    pub instansi_id: Option<String>,
    #[serde(default)]
    pub indicator_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// Reports

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    #[serde(default, alias = "instansi_id")]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub indicator_ids: Vec<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub options: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default, alias = "institution_id")]
    pub instansi_id: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub format: Option<String>,
}

// Dashboard

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    #[serde(default, alias = "institution_id")]
    pub instansi_id: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub total_indicators: i64,
    pub total_records: i64,
    pub status_counts: BTreeMap<&'static str, i64>,
    /// Share of records that left draft, in percent.
    pub submission_rate: f64,
    /// Share of submitted-or-later records that were validated, in percent.
    pub validation_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_achievement: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<char>,
}

// Admin

#[derive(Debug, Default, Deserialize)]
pub struct UserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Required on create; left unchanged on update when absent.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "instansi_id")]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub role_ids: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserRolesRequest {
    #[serde(default)]
    pub role_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub permissions: Vec<&'static str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
            permissions: role.permissions.to_strings(),
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SettingRequest {
    pub value: Value,
    /// Needed only when the key does not exist yet.
    #[serde(default, rename = "type", alias = "setting_type")]
    pub setting_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkSettingsRequest {
    pub settings: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub setting_type: crate::types::SettingType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::types::Setting> for SettingResponse {
    fn from(setting: crate::types::Setting) -> Self {
        Self {
            value: crate::settings::typed_value(&setting),
            key: setting.key,
            setting_type: setting.setting_type,
            description: setting.description,
            updated_at: setting.updated_at,
        }
    }
}
