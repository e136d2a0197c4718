use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Datelike, Utc};
use uuid::Uuid;

use super::access::{self, non_empty};
use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::RequireAuth;
use crate::domain::Period;
use crate::server::AppState;
use crate::server::dto::{
    IndicatorDetail, IndicatorParams, IndicatorRequest, PeriodResponse, PeriodsParams,
    TargetRequest, TargetsRequest,
};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreResultExt, paginate,
};
use crate::server::validation::{FieldErrors, MAX_CODE_LEN, MAX_NAME_LEN, MAX_TEXT_LEN};
use crate::store::{DataFilter, IndicatorFilter, Store};
use crate::types::{
    CollectionMethod, Frequency, IndicatorCategory, IndicatorTarget, MeasurementType,
    PerformanceIndicator, Permission,
};

const MODULE: &str = "indicator";
const MAX_JUSTIFICATION_LEN: usize = 500;

/// Validates a target list; an indicator always keeps at least one target.
fn build_targets(
    errors: &mut FieldErrors,
    indicator_id: &str,
    targets: Option<Vec<TargetRequest>>,
) -> Vec<IndicatorTarget> {
    let targets = targets.unwrap_or_default();
    if targets.is_empty() {
        errors.add("targets", "At least one target is required.");
        return Vec::new();
    }

    let now = Utc::now();
    let mut years = HashSet::new();
    let mut built = Vec::with_capacity(targets.len());

    for (i, target) in targets.into_iter().enumerate() {
        let year_field = format!("targets.{i}.year");
        let value_field = format!("targets.{i}.target_value");

        let year = errors.required_value(&year_field, target.year);
        errors.year(&year_field, year);
        if year.is_some_and(|y| !years.insert(y)) {
            errors.add(&year_field, "Each year may only have one target.");
        }
        let target_value = errors.required_value(&value_field, target.target_value);
        errors.min(&value_field, target_value, 0.0);
        errors.min(&format!("targets.{i}.minimum_value"), target.minimum_value, 0.0);
        errors.max_len(
            &format!("targets.{i}.justification"),
            target.justification.as_deref(),
            MAX_JUSTIFICATION_LEN,
        );

        if let (Some(year), Some(target_value)) = (year, target_value) {
            built.push(IndicatorTarget {
                id: Uuid::new_v4().to_string(),
                indicator_id: indicator_id.to_string(),
                year,
                target_value,
                minimum_value: target.minimum_value,
                justification: non_empty(target.justification),
                created_at: now,
                updated_at: now,
            });
        }
    }

    built
}

/// Checks that the optional objective, program and activity all sit in
/// `institution_id`.
fn check_links(
    errors: &mut FieldErrors,
    store: &dyn Store,
    institution_id: Option<&str>,
    objective_id: Option<&str>,
    program_id: Option<&str>,
    activity_id: Option<&str>,
) -> Result<(), ApiError> {
    let mismatch = |owner: &str| Some(owner) != institution_id;

    if let Some(id) = objective_id {
        match store
            .get_objective(id)
            .api_err("Failed to get strategic objective")?
        {
            None => errors.add("objective_id", "The selected objective_id is invalid."),
            Some(o) if mismatch(&o.institution_id) => errors.add(
                "objective_id",
                "The strategic objective belongs to another institution.",
            ),
            Some(_) => {}
        }
    }

    if let Some(id) = program_id {
        match store.get_program(id).api_err("Failed to get program")? {
            None => errors.add("program_id", "The selected program_id is invalid."),
            Some(p) if mismatch(&p.institution_id) => {
                errors.add("program_id", "The program belongs to another institution.");
            }
            Some(_) => {}
        }
    }

    if let Some(id) = activity_id {
        match store.get_activity(id).api_err("Failed to get activity")? {
            None => errors.add("activity_id", "The selected activity_id is invalid."),
            Some(a) => {
                if program_id.is_some_and(|p| p != a.program_id) {
                    errors.add("activity_id", "The activity belongs to another program.");
                } else if let Some(program) =
                    store.get_program(&a.program_id).api_err("Failed to get program")?
                {
                    if mismatch(&program.institution_id) {
                        errors.add("activity_id", "The activity belongs to another institution.");
                    }
                }
            }
        }
    }

    Ok(())
}

fn build(
    auth: &RequireAuth,
    store: &dyn Store,
    req: IndicatorRequest,
    existing: Option<&PerformanceIndicator>,
) -> Result<(PerformanceIndicator, Option<Vec<IndicatorTarget>>), ApiError> {
    let mut errors = FieldErrors::new();

    let institution_id = errors.required("institution_id", req.institution_id.as_deref());
    if let Some(institution_id) = &institution_id {
        auth.check_institution(institution_id)?;
        if store
            .get_institution(institution_id)
            .api_err("Failed to get institution")?
            .is_none()
        {
            errors.add("institution_id", "The selected institution_id is invalid.");
        }
    }

    let objective_id = non_empty(req.objective_id);
    let program_id = non_empty(req.program_id);
    let activity_id = non_empty(req.activity_id);
    check_links(
        &mut errors,
        store,
        institution_id.as_deref(),
        objective_id.as_deref(),
        program_id.as_deref(),
        activity_id.as_deref(),
    )?;

    let code = errors.required("code", req.code.as_deref());
    errors.max_len("code", code.as_deref(), MAX_CODE_LEN);
    let name = errors.required("name", req.name.as_deref());
    errors.max_len("name", name.as_deref(), MAX_NAME_LEN);
    errors.max_len("description", req.description.as_deref(), MAX_TEXT_LEN);
    errors.max_len("formula", req.formula.as_deref(), MAX_TEXT_LEN);

    errors.required("category", req.category.as_deref());
    let category = errors.parse::<IndicatorCategory>("category", req.category.as_deref());
    let measurement_unit = errors.required("measurement_unit", req.measurement_unit.as_deref());
    errors.max_len("measurement_unit", measurement_unit.as_deref(), MAX_CODE_LEN);
    errors.required("measurement_type", req.measurement_type.as_deref());
    let measurement_type =
        errors.parse::<MeasurementType>("measurement_type", req.measurement_type.as_deref());
    errors.required("frequency", req.frequency.as_deref());
    let frequency = errors.parse::<Frequency>("frequency", req.frequency.as_deref());
    let collection_method =
        errors.parse::<CollectionMethod>("collection_method", req.collection_method.as_deref());
    errors.range("weight", req.weight, 0.0, 100.0);

    let id = existing.map_or_else(|| Uuid::new_v4().to_string(), |e| e.id.clone());
    let targets = match existing {
        None => Some(build_targets(&mut errors, &id, req.targets)),
        Some(_) => None,
    };

    errors.finish()?;
    let (
        Some(institution_id),
        Some(code),
        Some(name),
        Some(category),
        Some(measurement_unit),
        Some(measurement_type),
        Some(frequency),
    ) = (
        institution_id,
        code,
        name,
        category,
        measurement_unit,
        measurement_type,
        frequency,
    )
    else {
        return Err(ApiError::bad_request("Invalid indicator"));
    };

    let now = Utc::now();
    let indicator = PerformanceIndicator {
        id,
        institution_id,
        objective_id,
        program_id,
        activity_id,
        code,
        name,
        description: non_empty(req.description),
        category,
        measurement_unit,
        measurement_type,
        frequency,
        data_source: non_empty(req.data_source),
        collection_method: collection_method.unwrap_or(CollectionMethod::Manual),
        formula: non_empty(req.formula),
        weight: req.weight.unwrap_or(0.0),
        is_mandatory: req.is_mandatory.unwrap_or(false),
        created_by: existing.map_or_else(|| Some(auth.user.id.clone()), |e| e.created_by.clone()),
        created_at: existing.map_or(now, |e| e.created_at),
        updated_at: now,
    };

    Ok((indicator, targets))
}

pub async fn list_indicators(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<IndicatorParams>,
) -> impl IntoResponse {
    auth.require(Permission::INDICATOR_READ)?;
    let filter = IndicatorFilter {
        institution_id: auth.scoped_filter(params.instansi_id)?,
        objective_id: params.objective_id,
        program_id: params.program_id,
        activity_id: params.activity_id,
    };
    let cursor = params.cursor.as_deref().unwrap_or("");

    let indicators = state
        .store
        .list_indicators(&filter, cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list indicators")?;

    let (indicators, next_cursor, has_more) =
        paginate(indicators, DEFAULT_PAGE_SIZE as usize, |i| i.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(
        indicators,
        next_cursor,
        has_more,
    )))
}

pub async fn create_indicator(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<IndicatorRequest>,
) -> impl IntoResponse {
    auth.require(Permission::INDICATOR_WRITE)?;
    let store = state.store.as_ref();

    let (indicator, targets) = build(&auth, store, req, None)?;
    let targets = targets.unwrap_or_default();
    store
        .create_indicator(&indicator, &targets)
        .api_err("Failed to create indicator")?;

    let detail = IndicatorDetail { indicator, targets };
    AuditEvent::new(
        audit::CREATE,
        MODULE,
        format!("Created indicator {}", detail.indicator.code),
    )
    .institution(Some(&detail.indicator.institution_id))
    .after(&detail)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(detail))))
}

pub async fn get_indicator(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let indicator = access::indicator(&auth, store, &id, Permission::INDICATOR_READ)?;
    let targets = store
        .list_targets(&indicator.id)
        .api_err("Failed to list targets")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(IndicatorDetail {
        indicator,
        targets,
    })))
}

/// Records copy the indicator's institution and use its periods.
fn has_performance_data(store: &dyn Store, indicator_id: &str) -> Result<bool, ApiError> {
    let filter = DataFilter {
        indicator_id: Some(indicator_id.to_string()),
        ..Default::default()
    };
    let records = store
        .list_performance_data(&filter, "", 1)
        .api_err("Failed to check performance data")?;
    Ok(!records.is_empty())
}

pub async fn update_indicator(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<IndicatorRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let existing = access::indicator(&auth, store, &id, Permission::INDICATOR_WRITE)?;

    let (indicator, _) = build(&auth, store, req, Some(&existing))?;
    if (indicator.institution_id != existing.institution_id
        || indicator.frequency != existing.frequency)
        && has_performance_data(store, &existing.id)?
    {
        return Err(ApiError::conflict(
            "The institution and frequency of an indicator with performance data cannot be changed",
        ));
    }
    store
        .update_indicator(&indicator)
        .api_err("Failed to update indicator")?;

    AuditEvent::new(
        audit::UPDATE,
        MODULE,
        format!("Updated indicator {}", indicator.code),
    )
    .institution(Some(&indicator.institution_id))
    .before(&existing)
    .after(&indicator)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(Json(ApiResponse::success(indicator)))
}

pub async fn delete_indicator(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let indicator = access::indicator(&auth, store, &id, Permission::INDICATOR_WRITE)?;

    store
        .delete_indicator(&indicator.id)
        .api_err("Failed to delete indicator")?;

    AuditEvent::new(
        audit::DELETE,
        MODULE,
        format!("Deleted indicator {}", indicator.code),
    )
    .institution(Some(&indicator.institution_id))
    .before(&indicator)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_targets(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let indicator = access::indicator(&auth, store, &id, Permission::INDICATOR_READ)?;
    let targets = store
        .list_targets(&indicator.id)
        .api_err("Failed to list targets")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(targets)))
}

pub async fn replace_targets(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<TargetsRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let indicator = access::indicator(&auth, store, &id, Permission::INDICATOR_WRITE)?;

    let mut errors = FieldErrors::new();
    let targets = build_targets(&mut errors, &indicator.id, req.targets);
    errors.finish()?;

    let before = store
        .list_targets(&indicator.id)
        .api_err("Failed to list targets")?;
    store
        .replace_targets(&indicator.id, &targets)
        .api_err("Failed to replace targets")?;

    AuditEvent::new(
        audit::UPDATE,
        MODULE,
        format!("Replaced targets of indicator {}", indicator.code),
    )
    .institution(Some(&indicator.institution_id))
    .before(&before)
    .after(&targets)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(Json(ApiResponse::success(targets)))
}

/// Periods the indicator reports on in a year, marking those already filled.
pub async fn list_periods(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<PeriodsParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let indicator = access::indicator(&auth, store, &id, Permission::INDICATOR_READ)?;
    let year = params.year.unwrap_or_else(|| Utc::now().year());

    let filter = DataFilter {
        indicator_id: Some(indicator.id.clone()),
        year: Some(year),
        ..Default::default()
    };
    let existing: HashSet<String> = store
        .list_performance_data(&filter, "", 100)
        .api_err("Failed to list performance data")?
        .into_iter()
        .map(|d| d.period)
        .collect();

    let periods: Vec<PeriodResponse> = Period::all_for(indicator.frequency)
        .into_iter()
        .map(|p| {
            let code = p.to_string();
            PeriodResponse {
                taken: existing.contains(&code),
                label: p.label(),
                end_date: p.end_date(year),
                code,
            }
        })
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(periods)))
}
