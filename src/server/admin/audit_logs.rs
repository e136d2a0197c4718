use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::AuditParams;
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::store::AuditFilter;
use crate::types::Permission;

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Entries are paged by id; filters match exactly.
pub async fn list_audit_logs(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditParams>,
) -> impl IntoResponse {
    auth.require(Permission::AUDIT_READ)?;

    let filter = AuditFilter {
        user_id: non_blank(params.user_id),
        action: non_blank(params.action).map(|a| a.to_ascii_uppercase()),
        module: non_blank(params.module),
    };
    let cursor = params.cursor.as_deref().unwrap_or("");

    let entries = state
        .store
        .list_audit_logs(&filter, cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list audit logs")?;

    let (entries, next_cursor, has_more) =
        paginate(entries, DEFAULT_PAGE_SIZE as usize, |e| e.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(entries, next_cursor, has_more)))
}

pub async fn get_audit_log(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::AUDIT_READ)?;
    let entry = state
        .store
        .get_audit_log(&id)
        .api_err("Failed to get audit log")?
        .or_not_found("Audit log not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(entry)))
}
