use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::domain::achievement::{grade_for_score, round2};
use crate::server::AppState;
use crate::server::dto::{DashboardParams, DashboardResponse};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::store::DataSummary;
use crate::types::{DataStatus, Permission};

fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

fn build_response(
    institution_id: Option<String>,
    year: Option<i32>,
    summary: &DataSummary,
) -> DashboardResponse {
    let status_counts = BTreeMap::from([
        (DataStatus::Draft.as_str(), summary.draft),
        (DataStatus::Submitted.as_str(), summary.submitted),
        (DataStatus::Validated.as_str(), summary.validated),
        (DataStatus::Rejected.as_str(), summary.rejected),
        (DataStatus::NeedsRevision.as_str(), summary.needs_revision),
    ]);
    let reviewed_or_pending =
        summary.submitted + summary.validated + summary.rejected + summary.needs_revision;

    DashboardResponse {
        institution_id,
        year,
        total_indicators: summary.indicators,
        total_records: summary.total,
        status_counts,
        submission_rate: percent(summary.total - summary.draft, summary.total),
        validation_rate: percent(summary.validated, reviewed_or_pending),
        average_achievement: summary.average_achievement.map(round2),
        grade: summary.average_achievement.map(grade_for_score),
    }
}

/// Headline figures for one institution (or all, for unscoped users).
pub async fn dashboard(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<DashboardParams>,
) -> impl IntoResponse {
    auth.require(Permission::DATA_READ)?;
    let institution_id = auth.scoped_filter(params.instansi_id)?;

    let summary = state
        .store
        .summarize_performance_data(institution_id.as_deref(), params.year)
        .api_err("Failed to summarize performance data")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(build_response(
        institution_id,
        params.year,
        &summary,
    ))))
}
