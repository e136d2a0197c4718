use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use super::access::{self, non_empty, transition_notes};
use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::RequireAuth;
use crate::domain::achievement::{level_for_score, round2, weighted_score};
use crate::domain::lifecycle::{
    REVIEW_APPROVE, REVIEW_REJECT, REVIEW_SUBMIT, REVIEW_UPDATE, Transition, review_deletable,
};
use crate::server::AppState;
use crate::server::dto::{
    AssessmentParams, AssessmentRequest, AutoAssessmentRequest, NotesRequest,
};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::validation::{FieldErrors, MAX_CODE_LEN, MAX_NAME_LEN, MAX_TEXT_LEN};
use crate::store::{AssessmentFilter, StatusChange, Store};
use crate::types::{Assessment, DataStatus, PerformanceIndicator, Permission, ReviewStatus};

const MODULE: &str = "assessment";

fn build(
    auth: &RequireAuth,
    store: &dyn Store,
    req: AssessmentRequest,
    existing: Option<&Assessment>,
) -> Result<(Assessment, PerformanceIndicator), ApiError> {
    let mut errors = FieldErrors::new();

    let indicator = match errors.required("indicator_id", req.indicator_id.as_deref()) {
        Some(id) => {
            let found = store.get_indicator(&id).api_err("Failed to get indicator")?;
            if found.is_none() {
                errors.add("indicator_id", "The selected indicator_id is invalid.");
            }
            found
        }
        None => None,
    };
    if let Some(indicator) = &indicator {
        auth.check_institution(&indicator.institution_id)?;
    }

    let performance_data_id = non_empty(req.performance_data_id);
    if let Some(data_id) = &performance_data_id {
        match store
            .get_performance_data(data_id)
            .api_err("Failed to get performance data")?
        {
            None => errors.add(
                "performance_data_id",
                "The selected performance_data_id is invalid.",
            ),
            Some(d) if indicator.as_ref().is_some_and(|i| i.id != d.indicator_id) => errors.add(
                "performance_data_id",
                "The performance data belongs to another indicator.",
            ),
            Some(_) => {}
        }
    }

    let period = errors.required("period", req.period.as_deref());
    errors.max_len("period", period.as_deref(), MAX_CODE_LEN);

    for (i, criterion) in req.criteria.iter().enumerate() {
        if criterion.name.trim().is_empty() {
            errors.add(&format!("criteria.{i}.name"), "The criterion name is required.");
        }
        errors.max_len(&format!("criteria.{i}.name"), Some(&criterion.name), MAX_NAME_LEN);
        if !(criterion.weight.is_finite() && criterion.weight > 0.0) {
            errors.add(&format!("criteria.{i}.weight"), "The weight must be greater than 0.");
        }
        errors.range(&format!("criteria.{i}.score"), Some(criterion.score), 0.0, 100.0);
    }

    errors.range("overall_score", req.overall_score, 0.0, 100.0);
    let overall = req
        .overall_score
        .or_else(|| weighted_score(&req.criteria));
    if overall.is_none() {
        errors.add(
            "overall_score",
            "The overall_score field is required when no criteria are given.",
        );
    }
    errors.max_len("comments", req.comments.as_deref(), MAX_TEXT_LEN);
    errors.max_len("recommendations", req.recommendations.as_deref(), MAX_TEXT_LEN);

    errors.finish()?;
    let (Some(indicator), Some(period), Some(overall)) = (indicator, period, overall) else {
        return Err(ApiError::bad_request("Invalid assessment"));
    };

    let now = Utc::now();
    let overall = round2(overall);
    let assessment = Assessment {
        id: existing.map_or_else(|| Uuid::new_v4().to_string(), |e| e.id.clone()),
        indicator_id: indicator.id.clone(),
        performance_data_id,
        period,
        criteria: req.criteria,
        overall_score: overall,
        achievement_level: level_for_score(overall),
        comments: non_empty(req.comments),
        recommendations: non_empty(req.recommendations),
        status: ReviewStatus::Draft,
        assessed_by: existing.map_or_else(|| auth.user.id.clone(), |e| e.assessed_by.clone()),
        reviewed_by: None,
        reviewed_at: None,
        review_notes: existing.and_then(|e| e.review_notes.clone()),
        created_at: existing.map_or(now, |e| e.created_at),
        updated_at: now,
    };

    Ok((assessment, indicator))
}

/// Loads an assessment and scopes it through its indicator.
fn load(
    auth: &RequireAuth,
    store: &dyn Store,
    id: &str,
    required: Permission,
) -> Result<(Assessment, PerformanceIndicator), ApiError> {
    auth.require(required)?;
    let assessment = store
        .get_assessment(id)
        .api_err("Failed to get assessment")?
        .or_not_found("Assessment not found")?;
    let indicator = access::indicator(auth, store, &assessment.indicator_id, required)?;
    Ok((assessment, indicator))
}

pub async fn list_assessments(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<AssessmentParams>,
) -> impl IntoResponse {
    auth.require(Permission::ASSESSMENT_READ)?;
    let mut errors = FieldErrors::new();
    let status = errors.parse::<ReviewStatus>("status", params.status.as_deref());
    errors.finish()?;

    let filter = AssessmentFilter {
        institution_id: auth.scoped_filter(params.instansi_id)?,
        indicator_id: params.indicator_id,
        status,
    };
    let cursor = params.cursor.as_deref().unwrap_or("");

    let assessments = state
        .store
        .list_assessments(&filter, cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list assessments")?;

    let (assessments, next_cursor, has_more) =
        paginate(assessments, DEFAULT_PAGE_SIZE as usize, |a| a.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(
        assessments,
        next_cursor,
        has_more,
    )))
}

pub async fn create_assessment(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<AssessmentRequest>,
) -> impl IntoResponse {
    auth.require(Permission::ASSESSMENT_WRITE)?;
    let store = state.store.as_ref();

    let (assessment, indicator) = build(&auth, store, req, None)?;
    store
        .create_assessment(&assessment)
        .api_err("Failed to create assessment")?;

    AuditEvent::new(
        audit::CREATE,
        MODULE,
        format!("Assessed indicator {} for {}", indicator.code, assessment.period),
    )
    .institution(Some(&indicator.institution_id))
    .after(&assessment)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(assessment))))
}

/// Scores an assessment from a validated performance-data record.
pub async fn auto_assess(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<AutoAssessmentRequest>,
) -> impl IntoResponse {
    auth.require(Permission::ASSESSMENT_WRITE)?;
    let store = state.store.as_ref();

    let mut errors = FieldErrors::new();
    let data_id = errors.required("performance_data_id", req.performance_data_id.as_deref());
    errors.finish()?;
    let Some(data_id) = data_id else {
        return Err(ApiError::bad_request("Invalid request"));
    };

    let data = store
        .get_performance_data(&data_id)
        .api_err("Failed to get performance data")?
        .ok_or_else(|| {
            ApiError::invalid_field(
                "performance_data_id",
                "The selected performance_data_id is invalid.",
            )
        })?;
    let indicator = access::indicator(&auth, store, &data.indicator_id, Permission::ASSESSMENT_WRITE)?;

    if data.status != DataStatus::Validated {
        return Err(ApiError::invalid_field(
            "performance_data_id",
            "Only validated performance data can be assessed automatically.",
        ));
    }
    let Some(achievement) = data.achievement else {
        return Err(ApiError::invalid_field(
            "performance_data_id",
            "The performance data has no achievement to score.",
        ));
    };

    let overall = round2(achievement.min(100.0));
    let now = Utc::now();
    let assessment = Assessment {
        id: Uuid::new_v4().to_string(),
        indicator_id: indicator.id.clone(),
        performance_data_id: Some(data.id.clone()),
        period: format!("{} {}", data.period, data.year),
        criteria: Vec::new(),
        overall_score: overall,
        achievement_level: level_for_score(overall),
        comments: Some(format!("Scored from an achievement of {achievement}%")),
        recommendations: None,
        status: ReviewStatus::Draft,
        assessed_by: auth.user.id.clone(),
        reviewed_by: None,
        reviewed_at: None,
        review_notes: None,
        created_at: now,
        updated_at: now,
    };

    store
        .create_assessment(&assessment)
        .api_err("Failed to create assessment")?;

    AuditEvent::new(
        audit::CREATE,
        MODULE,
        format!(
            "Auto-assessed indicator {} for {}",
            indicator.code, assessment.period
        ),
    )
    .institution(Some(&indicator.institution_id))
    .after(&assessment)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(assessment))))
}

pub async fn get_assessment(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (assessment, _) = load(&auth, state.store.as_ref(), &id, Permission::ASSESSMENT_READ)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(assessment)))
}

pub async fn update_assessment(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<AssessmentRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let (existing, _) = load(&auth, store, &id, Permission::ASSESSMENT_WRITE)?;
    if !REVIEW_UPDATE.allows(existing.status) {
        return Err(ApiError::conflict(format!(
            "cannot update an assessment in status '{}'",
            existing.status
        )));
    }

    let (mut assessment, indicator) = build(&auth, store, req, Some(&existing))?;
    assessment.status = REVIEW_UPDATE.to;
    store
        .update_assessment(&assessment, REVIEW_UPDATE.from)
        .api_err("Failed to update assessment")?;

    AuditEvent::new(
        audit::UPDATE,
        MODULE,
        format!("Updated assessment of {} for {}", indicator.code, assessment.period),
    )
    .institution(Some(&indicator.institution_id))
    .before(&existing)
    .after(&assessment)
    .record(store, &auth.user.id, &client);

    Ok(Json(ApiResponse::success(assessment)))
}

pub async fn delete_assessment(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let (assessment, indicator) = load(&auth, store, &id, Permission::ASSESSMENT_WRITE)?;
    if !review_deletable(assessment.status) {
        return Err(ApiError::conflict("Approved assessments cannot be deleted"));
    }

    store
        .delete_assessment(&assessment.id)
        .api_err("Failed to delete assessment")?;

    AuditEvent::new(
        audit::DELETE,
        MODULE,
        format!("Deleted assessment of {} for {}", indicator.code, assessment.period),
    )
    .institution(Some(&indicator.institution_id))
    .before(&assessment)
    .record(store, &auth.user.id, &client);

    Ok(StatusCode::NO_CONTENT)
}

#[allow(clippy::too_many_arguments)]
fn transition(
    auth: &RequireAuth,
    store: &dyn Store,
    client: &ClientInfo,
    id: &str,
    required: Permission,
    transition: Transition<ReviewStatus>,
    audit_action: &'static str,
    notes: Option<&str>,
) -> Result<Assessment, ApiError> {
    let (before, indicator) = load(auth, store, id, required)?;

    let after = store
        .transition_assessment(&StatusChange {
            id: &before.id,
            action: transition.action,
            from: transition.from,
            to: transition.to,
            actor_id: &auth.user.id,
            notes,
            at: Utc::now(),
        })
        .api_err("Failed to update assessment status")?;

    AuditEvent::new(
        audit_action,
        MODULE,
        format!(
            "Assessment of {} for {}: {} -> {}",
            indicator.code, after.period, before.status, after.status
        ),
    )
    .institution(Some(&indicator.institution_id))
    .before(&before)
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
    let after = transition(
        &auth,
        state.store.as_ref(),
        &client,
        &id,
        Permission::ASSESSMENT_WRITE,
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
    let notes = transition_notes(&REVIEW_APPROVE, body.and_then(|Json(b)| b.notes))?;
    let after = transition(
        &auth,
        state.store.as_ref(),
        &client,
        &id,
        Permission::ASSESSMENT_APPROVE,
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
    auth.require(Permission::ASSESSMENT_APPROVE)?;
    let notes = transition_notes(&REVIEW_REJECT, body.and_then(|Json(b)| b.notes))?;
    let after = transition(
        &auth,
        state.store.as_ref(),
        &client,
        &id,
        Permission::ASSESSMENT_APPROVE,
        REVIEW_REJECT,
        audit::REJECT,
        notes.as_deref(),
    )?;

    Ok::<_, ApiError>(Json(ApiResponse::success(after)))
}
