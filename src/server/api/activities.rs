use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::access::{self, non_empty};
use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{ActivityParams, ActivityRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreResultExt, paginate,
};
use crate::server::validation::{FieldErrors, MAX_CODE_LEN, MAX_NAME_LEN, MAX_TEXT_LEN};
use crate::store::{ActivityFilter, Store};
use crate::types::{Activity, KegiatanStatus, Permission};

const MODULE: &str = "kegiatan";

/// Returns the activity and the institution it belongs to through its program.
fn build(
    auth: &RequireAuth,
    store: &dyn Store,
    req: ActivityRequest,
    id: String,
    created_at: DateTime<Utc>,
) -> Result<(Activity, String), ApiError> {
    let mut errors = FieldErrors::new();

    let program_id = errors.required("program_id", req.program_id.as_deref());
    let mut institution_id = None;
    if let Some(program_id) = &program_id {
        match store.get_program(program_id).api_err("Failed to get program")? {
            Some(program) => {
                auth.check_institution(&program.institution_id)?;
                institution_id = Some(program.institution_id);
            }
            None => errors.add("program_id", "The selected program_id is invalid."),
        }
    }

    let code = errors.required("code", req.code.as_deref());
    errors.max_len("code", code.as_deref(), MAX_CODE_LEN);
    let name = errors.required("name", req.name.as_deref());
    errors.max_len("name", name.as_deref(), MAX_NAME_LEN);
    errors.max_len("description", req.description.as_deref(), MAX_TEXT_LEN);
    errors.min("budget", req.budget, 0.0);
    errors.min("realized_budget", req.realized_budget, 0.0);

    let start_date = errors.date("start_date", req.start_date.as_deref());
    let end_date = errors.date("end_date", req.end_date.as_deref());
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            errors.add(
                "end_date",
                "The end_date must be a date after or equal to start_date.",
            );
        }
    }
    let status = errors.parse::<KegiatanStatus>("status", req.status.as_deref());

    errors.finish()?;
    let (Some(program_id), Some(institution_id), Some(code), Some(name)) =
        (program_id, institution_id, code, name)
    else {
        return Err(ApiError::bad_request("Invalid activity"));
    };

    let activity = Activity {
        id,
        program_id,
        code,
        name,
        description: non_empty(req.description),
        budget: req.budget,
        realized_budget: req.realized_budget,
        start_date,
        end_date,
        responsible_person: non_empty(req.responsible_person),
        status: status.unwrap_or(KegiatanStatus::Draft),
        created_at,
        updated_at: Utc::now(),
    };
    Ok((activity, institution_id))
}

pub async fn list_activities(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ActivityParams>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_READ)?;
    let filter = ActivityFilter {
        institution_id: auth.scoped_filter(params.instansi_id)?,
        program_id: params.program_id,
    };
    let cursor = params.cursor.as_deref().unwrap_or("");

    let activities = state
        .store
        .list_activities(&filter, cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list activities")?;

    let (activities, next_cursor, has_more) =
        paginate(activities, DEFAULT_PAGE_SIZE as usize, |a| a.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(
        activities,
        next_cursor,
        has_more,
    )))
}

pub async fn create_activity(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<ActivityRequest>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_WRITE)?;
    let store = state.store.as_ref();

    let (activity, institution_id) =
        build(&auth, store, req, Uuid::new_v4().to_string(), Utc::now())?;
    store
        .create_activity(&activity)
        .api_err("Failed to create activity")?;

    AuditEvent::new(audit::CREATE, MODULE, format!("Created activity {}", activity.code))
        .institution(Some(&institution_id))
        .after(&activity)
        .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(activity))))
}

pub async fn get_activity(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (activity, _) =
        access::activity(&auth, state.store.as_ref(), &id, Permission::MASTER_READ)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(activity)))
}

pub async fn update_activity(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<ActivityRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let (existing, _) = access::activity(&auth, store, &id, Permission::MASTER_WRITE)?;

    let (activity, institution_id) =
        build(&auth, store, req, existing.id.clone(), existing.created_at)?;
    store
        .update_activity(&activity)
        .api_err("Failed to update activity")?;

    AuditEvent::new(audit::UPDATE, MODULE, format!("Updated activity {}", activity.code))
        .institution(Some(&institution_id))
        .before(&existing)
        .after(&activity)
        .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(Json(ApiResponse::success(activity)))
}

pub async fn delete_activity(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let (activity, program) = access::activity(&auth, store, &id, Permission::MASTER_WRITE)?;

    store
        .delete_activity(&activity.id)
        .api_err("Failed to delete activity")?;

    AuditEvent::new(audit::DELETE, MODULE, format!("Deleted activity {}", activity.code))
        .institution(Some(&program.institution_id))
        .before(&activity)
        .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
