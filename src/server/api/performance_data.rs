use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use super::access::{self, non_empty, transition_notes};
use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::RequireAuth;
use crate::domain::lifecycle::{
    self, DATA_REJECT, DATA_REQUEST_REVISION, DATA_SUBMIT, DATA_UPDATE, DATA_VALIDATE, Transition,
};
use crate::domain::{QualityContext, QualityReport, period, quality};
use crate::export;
use crate::import::draft_record;
use crate::server::AppState;
use crate::server::dto::{DataParams, NotesRequest, PerformanceDataRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, FieldMessages, PaginatedResponse, StoreOptionExt,
    StoreResultExt, paginate,
};
use crate::server::validation::{FieldErrors, MAX_TEXT_LEN};
use crate::settings;
use crate::store::{DataFilter, Store};
use crate::types::{
    CollectionMethod, DataStatus, PerformanceData, PerformanceIndicator, Permission,
};

pub(super) const MODULE: &str = "performance_data";

/// Fields shared by create and update, already checked.
struct DataInput {
    year: i32,
    period: String,
    actual_value: f64,
    target_value: Option<f64>,
    data_source: Option<String>,
    collection_method: Option<CollectionMethod>,
    notes: Option<String>,
}

fn validate_input(
    errors: &mut FieldErrors,
    indicator: Option<&PerformanceIndicator>,
    req: PerformanceDataRequest,
) -> Option<DataInput> {
    let year = errors.required_value("year", req.year);
    errors.year("year", year);
    let period = errors.required("period", req.period.as_deref());
    let actual_value = errors.required_value("actual_value", req.actual_value);
    if actual_value.is_some_and(|v| !v.is_finite()) {
        errors.add("actual_value", "The actual_value must be a number.");
    }
    errors.min("target_value", req.target_value, 0.0);
    let collection_method =
        errors.parse::<CollectionMethod>("collection_method", req.collection_method.as_deref());
    errors.max_len("notes", req.notes.as_deref(), MAX_TEXT_LEN);

    let period = match (period, indicator) {
        (Some(code), Some(indicator)) => {
            match period::parse_for_frequency(&code, indicator.frequency) {
                Ok(p) => Some(p.to_string()),
                Err(message) => {
                    errors.add("period", message);
                    None
                }
            }
        }
        _ => None,
    };

    Some(DataInput {
        year: year?,
        period: period?,
        actual_value: actual_value?,
        target_value: req.target_value,
        data_source: non_empty(req.data_source),
        collection_method,
        notes: non_empty(req.notes),
    })
}

/// Target snapshot: the explicit value, or the indicator's target for the year.
fn snapshot_target(
    store: &dyn Store,
    indicator_id: &str,
    year: i32,
    explicit: Option<f64>,
) -> Result<Option<f64>, ApiError> {
    match explicit {
        Some(value) => Ok(Some(value)),
        None => Ok(store
            .get_target(indicator_id, year)
            .api_err("Failed to get target")?
            .map(|t| t.target_value)),
    }
}

pub(super) fn quality_report(
    store: &dyn Store,
    data: &PerformanceData,
) -> Result<QualityReport, ApiError> {
    let indicator = store
        .get_indicator(&data.indicator_id)
        .api_err("Failed to get indicator")?
        .or_not_found("Indicator not found")?;
    let target_for_year = store
        .get_target(&indicator.id, data.year)
        .api_err("Failed to get target")?
        .map(|t| t.target_value);
    let evidence_count = store
        .list_evidence(&data.id)
        .api_err("Failed to list evidence")?
        .len();

    let ctx = QualityContext {
        indicator: &indicator,
        target_for_year,
        evidence_count,
        achievement_warning_threshold: settings::get_f64(
            store,
            settings::ACHIEVEMENT_WARNING_THRESHOLD,
            150.0,
        ),
        submission_deadline_days: settings::get_i64(store, settings::SUBMISSION_DEADLINE_DAYS, 7),
    };

    Ok(quality::check(data, &ctx))
}

fn data_filter(auth: &RequireAuth, params: DataParams) -> Result<(DataFilter, Option<String>), ApiError> {
    let mut errors = FieldErrors::new();
    let status = errors.parse::<DataStatus>("status", params.status.as_deref());
    errors.finish()?;

    let filter = DataFilter {
        institution_id: auth.scoped_filter(params.instansi_id)?,
        indicator_id: params.indicator_id,
        year: params.year,
        period: non_empty(params.period).map(|p| p.to_ascii_uppercase()),
        status,
    };
    Ok((filter, params.cursor))
}

pub async fn list_performance_data(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<DataParams>,
) -> impl IntoResponse {
    auth.require(Permission::DATA_READ)?;
    let (filter, cursor) = data_filter(&auth, params)?;
    let cursor = cursor.as_deref().unwrap_or("");

    let records = state
        .store
        .list_performance_data(&filter, cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list performance data")?;

    let (records, next_cursor, has_more) =
        paginate(records, DEFAULT_PAGE_SIZE as usize, |d| d.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(records, next_cursor, has_more)))
}

pub async fn create_performance_data(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<PerformanceDataRequest>,
) -> impl IntoResponse {
    auth.require(Permission::DATA_WRITE)?;
    let store = state.store.as_ref();

    let mut errors = FieldErrors::new();
    let indicator = match errors.required("indicator_id", req.indicator_id.as_deref()) {
        Some(id) => {
            let indicator = store.get_indicator(&id).api_err("Failed to get indicator")?;
            if indicator.is_none() {
                errors.add("indicator_id", "The selected indicator_id is invalid.");
            }
            indicator
        }
        None => None,
    };
    if let Some(indicator) = &indicator {
        auth.check_institution(&indicator.institution_id)?;
    }
    let input = validate_input(&mut errors, indicator.as_ref(), req);
    errors.finish()?;
    let (Some(indicator), Some(input)) = (indicator, input) else {
        return Err(ApiError::bad_request("Invalid performance data"));
    };

    if store
        .find_performance_data(&indicator.id, input.year, &input.period)
        .api_err("Failed to check existing performance data")?
        .is_some()
    {
        return Err(ApiError::conflict(format!(
            "Performance data for {} {} already exists",
            input.period, input.year
        )));
    }

    let target = snapshot_target(store, &indicator.id, input.year, input.target_value)?;
    let mut record = draft_record(
        &indicator,
        input.year,
        input.period,
        input.actual_value,
        target,
        &auth.user.id,
    );
    if input.data_source.is_some() {
        record.data_source = input.data_source;
    }
    if input.collection_method.is_some() {
        record.collection_method = input.collection_method;
    }
    record.notes = input.notes;

    store
        .create_performance_data(&record)
        .api_err("Failed to create performance data")?;

    AuditEvent::new(
        audit::CREATE,
        MODULE,
        format!(
            "Created performance data for {} {} {}",
            indicator.code, record.period, record.year
        ),
    )
    .institution(Some(&record.institution_id))
    .after(&record)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

pub async fn get_performance_data(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let data = access::performance_data(&auth, state.store.as_ref(), &id, Permission::DATA_READ)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(data)))
}

pub async fn update_performance_data(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<PerformanceDataRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let existing = access::performance_data(&auth, store, &id, Permission::DATA_WRITE)?;
    if !DATA_UPDATE.allows(existing.status) {
        return Err(ApiError::conflict(format!(
            "cannot update a record in status '{}'",
            existing.status
        )));
    }

    let indicator = store
        .get_indicator(&existing.indicator_id)
        .api_err("Failed to get indicator")?
        .or_not_found("Indicator not found")?;

    let mut errors = FieldErrors::new();
    if req
        .indicator_id
        .as_deref()
        .is_some_and(|i| !i.is_empty() && i != existing.indicator_id)
    {
        errors.add("indicator_id", "The indicator of a record cannot be changed.");
    }
    let input = validate_input(&mut errors, Some(&indicator), req);
    errors.finish()?;
    let Some(input) = input else {
        return Err(ApiError::bad_request("Invalid performance data"));
    };

    let target = snapshot_target(store, &indicator.id, input.year, input.target_value)?;
    let mut record = existing.clone();
    record.year = input.year;
    record.period = input.period;
    record.actual_value = input.actual_value;
    record.target_value = target;
    record.achievement =
        crate::domain::achievement::calculate(indicator.measurement_type, input.actual_value, target);
    record.data_source = input.data_source.or(indicator.data_source.clone());
    record.collection_method = input.collection_method.or(existing.collection_method);
    record.notes = input.notes;
    record.status = DATA_UPDATE.to;
    record.updated_by = auth.user.id.clone();
    record.updated_at = Utc::now();

    store
        .update_performance_data(&record, DATA_UPDATE.from)
        .api_err("Failed to update performance data")?;

    AuditEvent::new(
        audit::UPDATE,
        MODULE,
        format!(
            "Updated performance data for {} {} {}",
            indicator.code, record.period, record.year
        ),
    )
    .institution(Some(&record.institution_id))
    .before(&existing)
    .after(&record)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(Json(ApiResponse::success(record)))
}

pub async fn delete_performance_data(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let data = access::performance_data(&auth, store, &id, Permission::DATA_DELETE)?;
    if !lifecycle::data_deletable(data.status) {
        return Err(ApiError::conflict("Validated performance data cannot be deleted"));
    }

    let deleted = store
        .delete_performance_data(&data.id)
        .api_err("Failed to delete performance data")?;
    if !deleted {
        return Err(ApiError::not_found("Performance data not found"));
    }

    if let Err(e) = state.evidence.delete_all(&data.id).await {
        tracing::warn!("Failed to remove evidence files for {}: {e}", data.id);
    }

    AuditEvent::new(
        audit::DELETE,
        MODULE,
        format!("Deleted performance data {} {}", data.period, data.year),
    )
    .institution(Some(&data.institution_id))
    .before(&data)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

/// Applies a lifecycle transition as one conditional update and records it.
fn apply_transition(
    auth: &RequireAuth,
    store: &dyn Store,
    client: &ClientInfo,
    before: &PerformanceData,
    transition: Transition<DataStatus>,
    audit_action: &'static str,
    notes: Option<&str>,
) -> Result<PerformanceData, ApiError> {
    let after = store
        .transition_performance_data(&crate::store::StatusChange {
            id: &before.id,
            action: transition.action,
            from: transition.from,
            to: transition.to,
            actor_id: &auth.user.id,
            notes,
            at: Utc::now(),
        })
        .api_err("Failed to update performance data status")?;

    AuditEvent::new(
        audit_action,
        MODULE,
        format!(
            "Performance data {} {}: {} -> {}",
            after.period, after.year, before.status, after.status
        ),
    )
    .institution(Some(&after.institution_id))
    .before(before)
    .after(&after)
    .record(store, &auth.user.id, client);

    Ok(after)
}

fn notes_of(body: Option<Json<NotesRequest>>) -> Option<String> {
    body.and_then(|Json(b)| b.notes)
}

pub async fn submit(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    body: Option<Json<NotesRequest>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let data = access::performance_data(&auth, store, &id, Permission::DATA_WRITE)?;
    if !DATA_SUBMIT.allows(data.status) {
        return Err(ApiError::conflict(format!(
            "cannot submit a record in status '{}'",
            data.status
        )));
    }

    let report = quality_report(store, &data)?;
    if !report.is_valid {
        let mut fields = FieldMessages::new();
        for issue in report.errors() {
            fields
                .entry(issue.field.to_string())
                .or_default()
                .push(issue.message.clone());
        }
        return Err(ApiError::validation(fields));
    }

    let notes = transition_notes(&DATA_SUBMIT, notes_of(body))?;
    let after = apply_transition(
        &auth,
        store,
        &client,
        &data,
        DATA_SUBMIT,
        audit::SUBMIT,
        notes.as_deref(),
    )?;

    Ok(Json(ApiResponse::success(after)))
}

pub async fn validate(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    body: Option<Json<NotesRequest>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let data = access::performance_data(&auth, store, &id, Permission::DATA_VALIDATE)?;

    let notes = transition_notes(&DATA_VALIDATE, notes_of(body))?;
    let after = apply_transition(
        &auth,
        store,
        &client,
        &data,
        DATA_VALIDATE,
        audit::VALIDATE,
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
    let data = access::performance_data(&auth, store, &id, Permission::DATA_VALIDATE)?;
    let notes = transition_notes(&DATA_REJECT, notes_of(body))?;

    let after = apply_transition(
        &auth,
        store,
        &client,
        &data,
        DATA_REJECT,
        audit::REJECT,
        notes.as_deref(),
    )?;

    Ok::<_, ApiError>(Json(ApiResponse::success(after)))
}

pub async fn request_revision(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    body: Option<Json<NotesRequest>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let data = access::performance_data(&auth, store, &id, Permission::DATA_VALIDATE)?;
    let notes = transition_notes(&DATA_REQUEST_REVISION, notes_of(body))?;

    let after = apply_transition(
        &auth,
        store,
        &client,
        &data,
        DATA_REQUEST_REVISION,
        audit::REQUEST_REVISION,
        notes.as_deref(),
    )?;

    Ok::<_, ApiError>(Json(ApiResponse::success(after)))
}

pub async fn quality(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let data = access::performance_data(&auth, store, &id, Permission::DATA_READ)?;
    let report = quality_report(store, &data)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(report)))
}

/// CSV of every record matching the listing filters.
pub async fn export_performance_data(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<DataParams>,
) -> impl IntoResponse {
    auth.require(Permission::DATA_READ)?;
    let store = state.store.as_ref();
    let (filter, _) = data_filter(&auth, params)?;

    let mut records = Vec::new();
    let mut cursor = String::new();
    loop {
        let page = store
            .list_performance_data(&filter, &cursor, DEFAULT_PAGE_SIZE)
            .api_err("Failed to list performance data")?;
        let done = page.len() < DEFAULT_PAGE_SIZE as usize;
        if let Some(last) = page.last() {
            cursor = last.id.clone();
        }
        records.extend(page);
        if done {
            break;
        }
    }

    let mut indicators = HashMap::new();
    for record in &records {
        if !indicators.contains_key(&record.indicator_id) {
            if let Some(indicator) = store
                .get_indicator(&record.indicator_id)
                .api_err("Failed to get indicator")?
            {
                indicators.insert(indicator.id.clone(), indicator);
            }
        }
    }

    let csv = export::performance_data_csv(&records, &indicators)
        .api_err("Failed to render export")?;

    tracing::info!("Exported {} performance data records", records.len());

    Ok::<_, ApiError>(csv_response(csv, "performance-data.csv"))
}

pub(super) fn csv_response(body: Vec<u8>, file_name: &str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(header::CONTENT_LENGTH, body.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
