use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::access::{non_empty, transition_notes};
use super::performance_data::csv_response;
use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::RequireAuth;
use crate::domain::lifecycle::{
    REVIEW_APPROVE, REVIEW_REJECT, REVIEW_SUBMIT, REVIEW_UPDATE, Transition, review_deletable,
};
use crate::export;
use crate::server::AppState;
use crate::server::dto::{ExportParams, NotesRequest, ReportParams, ReportRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::validation::{FieldErrors, MAX_CODE_LEN, MAX_NAME_LEN};
use crate::store::{ReportFilter, StatusChange, Store};
use crate::types::{Permission, Report, ReportFormat, ReportType, ReviewStatus};

const MODULE: &str = "report";

fn build(
    auth: &RequireAuth,
    store: &dyn Store,
    req: ReportRequest,
    existing: Option<&Report>,
) -> Result<Report, ApiError> {
    let mut errors = FieldErrors::new();

    let institution_id = errors.required("institution_id", req.institution_id.as_deref());
    if let Some(id) = &institution_id {
        auth.check_institution(id)?;
        if store
            .get_institution(id)
            .api_err("Failed to get institution")?
            .is_none()
        {
            errors.add("institution_id", "The selected institution_id is invalid.");
        }
    }

    let title = errors.required("title", req.title.as_deref());
    errors.max_len("title", title.as_deref(), MAX_NAME_LEN);
    let report_type = errors.parse::<ReportType>("report_type", req.report_type.as_deref());
    if req.report_type.as_deref().is_none_or(|t| t.trim().is_empty()) {
        errors.add("report_type", "The report_type field is required.");
    }
    errors.max_len("category", req.category.as_deref(), MAX_NAME_LEN);
    let year = errors.required_value("year", req.year);
    errors.year("year", year);
    let period = errors.required("period", req.period.as_deref());
    errors.max_len("period", period.as_deref(), MAX_CODE_LEN);
    let format = match req.format.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        None => Some(ReportFormat::Csv),
        Some(text) => errors.parse::<ReportFormat>("format", Some(text)),
    };

    let mut seen = HashSet::new();
    let mut indicator_ids = Vec::with_capacity(req.indicator_ids.len());
    if req.indicator_ids.is_empty() {
        errors.add("indicator_ids", "At least one indicator is required.");
    }
    for (i, id) in req.indicator_ids.into_iter().enumerate() {
        let field = format!("indicator_ids.{i}");
        if !seen.insert(id.clone()) {
            errors.add(&field, "The indicator is listed more than once.");
            continue;
        }
        match store.get_indicator(&id).api_err("Failed to get indicator")? {
            None => errors.add(&field, "The selected indicator is invalid."),
            Some(indicator)
                if institution_id
                    .as_ref()
                    .is_some_and(|inst| *inst != indicator.institution_id) =>
            {
                errors.add(&field, "The indicator belongs to another institution.")
            }
            Some(_) => indicator_ids.push(id),
        }
    }

    let options = match req.options {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value @ Value::Object(_)) => value,
        Some(_) => {
            errors.add("options", "The options must be an object.");
            Value::Null
        }
    };

    errors.finish()?;
    let (Some(institution_id), Some(title), Some(report_type), Some(year), Some(period), Some(format)) =
        (institution_id, title, report_type, year, period, format)
    else {
        return Err(ApiError::bad_request("Invalid report"));
    };

    let now = Utc::now();
    Ok(Report {
        id: existing.map_or_else(|| Uuid::new_v4().to_string(), |e| e.id.clone()),
        institution_id,
        title,
        report_type,
        category: non_empty(req.category),
        year,
        period,
        indicator_ids,
        format,
        options,
        status: ReviewStatus::Draft,
        created_by: existing.map_or_else(|| auth.user.id.clone(), |e| e.created_by.clone()),
        reviewed_by: None,
        reviewed_at: None,
        review_notes: existing.and_then(|e| e.review_notes.clone()),
        created_at: existing.map_or(now, |e| e.created_at),
        updated_at: now,
    })
}

fn load(
    auth: &RequireAuth,
    store: &dyn Store,
    id: &str,
    required: Permission,
) -> Result<Report, ApiError> {
    auth.require(required)?;
    let report = store
        .get_report(id)
        .api_err("Failed to get report")?
        .or_not_found("Report not found")?;
    auth.check_institution(&report.institution_id)?;
    Ok(report)
}

pub async fn list_reports(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> impl IntoResponse {
    auth.require(Permission::REPORT_READ)?;
    let mut errors = FieldErrors::new();
    let status = errors.parse::<ReviewStatus>("status", params.status.as_deref());
    errors.finish()?;

    let filter = ReportFilter {
        institution_id: auth.scoped_filter(params.instansi_id)?,
        year: params.year,
        status,
    };
    let cursor = params.cursor.as_deref().unwrap_or("");

    let reports = state
        .store
        .list_reports(&filter, cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list reports")?;

    let (reports, next_cursor, has_more) =
        paginate(reports, DEFAULT_PAGE_SIZE as usize, |r| r.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(reports, next_cursor, has_more)))
}

pub async fn create_report(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<ReportRequest>,
) -> impl IntoResponse {
    auth.require(Permission::REPORT_WRITE)?;
    let store = state.store.as_ref();

    let report = build(&auth, store, req, None)?;
    store.create_report(&report).api_err("Failed to create report")?;

    AuditEvent::new(
        audit::CREATE,
        MODULE,
        format!("Created report {}", report.title),
    )
    .institution(Some(&report.institution_id))
    .after(&report)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(report))))
}

pub async fn get_report(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let report = load(&auth, state.store.as_ref(), &id, Permission::REPORT_READ)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(report)))
}

pub async fn update_report(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<ReportRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let existing = load(&auth, store, &id, Permission::REPORT_WRITE)?;
    if !REVIEW_UPDATE.allows(existing.status) {
        return Err(ApiError::conflict(format!(
            "cannot update a report in status '{}'",
            existing.status
        )));
    }

    let mut report = build(&auth, store, req, Some(&existing))?;
    report.status = REVIEW_UPDATE.to;
    store
        .update_report(&report, REVIEW_UPDATE.from)
        .api_err("Failed to update report")?;

    AuditEvent::new(
        audit::UPDATE,
        MODULE,
        format!("Updated report {}", report.title),
    )
    .institution(Some(&report.institution_id))
    .before(&existing)
    .after(&report)
    .record(store, &auth.user.id, &client);

    Ok(Json(ApiResponse::success(report)))
}

pub async fn delete_report(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let report = load(&auth, store, &id, Permission::REPORT_WRITE)?;
    if !review_deletable(report.status) {
        return Err(ApiError::conflict("Approved reports cannot be deleted"));
    }

    store.delete_report(&report.id).api_err("Failed to delete report")?;

    AuditEvent::new(
        audit::DELETE,
        MODULE,
        format!("Deleted report {}", report.title),
    )
    .institution(Some(&report.institution_id))
    .before(&report)
    .record(store, &auth.user.id, &client);

    Ok(StatusCode::NO_CONTENT)
}

fn apply_transition(
    auth: &RequireAuth,
    store: &dyn Store,
    client: &ClientInfo,
    before: &Report,
    transition: Transition<ReviewStatus>,
    audit_action: &'static str,
    notes: Option<&str>,
) -> Result<Report, ApiError> {
    let after = store
        .transition_report(&StatusChange {
            id: &before.id,
            action: transition.action,
            from: transition.from,
            to: transition.to,
            actor_id: &auth.user.id,
            notes,
            at: Utc::now(),
        })
        .api_err("Failed to update report status")?;

    AuditEvent::new(
        audit_action,
        MODULE,
        format!(
            "Report {}: {} -> {}",
            after.title, before.status, after.status
        ),
    )
    .institution(Some(&after.institution_id))
    .before(before)
    .after(&after)
    .record(store, &auth.user.id, client);

    Ok(after)
}

pub async fn submit(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let report = load(&auth, store, &id, Permission::REPORT_WRITE)?;
    let after = apply_transition(
        &auth,
        store,
        &client,
        &report,
        REVIEW_SUBMIT,
        audit::SUBMIT,
        None,
    )?;

    Ok::<_, ApiError>(Json(ApiResponse::success(after)))
}

pub async fn approve(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    body: Option<Json<NotesRequest>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let report = load(&auth, store, &id, Permission::REPORT_APPROVE)?;
    let notes = transition_notes(&REVIEW_APPROVE, body.and_then(|Json(b)| b.notes))?;
    let after = apply_transition(
        &auth,
        store,
        &client,
        &report,
        REVIEW_APPROVE,
        audit::APPROVE,
        notes.as_deref(),
    )?;

    Ok::<_, ApiError>(Json(ApiResponse::success(after)))
}

pub async fn reject(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    body: Option<Json<NotesRequest>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let report = load(&auth, store, &id, Permission::REPORT_APPROVE)?;
    let notes = transition_notes(&REVIEW_REJECT, body.and_then(|Json(b)| b.notes))?;
    let after = apply_transition(
        &auth,
        store,
        &client,
        &report,
        REVIEW_REJECT,
        audit::REJECT,
        notes.as_deref(),
    )?;

    Ok::<_, ApiError>(Json(ApiResponse::success(after)))
}

/// Renders a report's indicator lines as CSV (default) or JSON.
pub async fn export_report(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();
    let report = load(&auth, store, &id, Permission::REPORT_READ)?;

    let format = params.format.as_deref().unwrap_or("csv").to_ascii_lowercase();
    if format != "csv" && format != "json" {
        return Err(ApiError::invalid_field(
            "format",
            "The format must be one of: csv, json.",
        ));
    }

    let summary =
        export::summarize_report(store, &report).api_err("Failed to summarize report")?;

    AuditEvent::new(
        audit::EXPORT,
        MODULE,
        format!("Exported report {} as {format}", report.title),
    )
    .institution(Some(&report.institution_id))
    .record(store, &auth.user.id, &client);

    if format == "json" {
        return Ok(Json(ApiResponse::success(summary)).into_response());
    }
    let csv = export::report_csv(&summary).api_err("Failed to render report")?;
    Ok(csv_response(csv, &format!("report-{}.csv", report.id)))
}
