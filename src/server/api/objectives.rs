use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::access::non_empty;
use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{InstitutionParams, ObjectiveRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::validation::{FieldErrors, MAX_CODE_LEN, MAX_NAME_LEN, MAX_TEXT_LEN};
use crate::store::Store;
use crate::types::{Permission, RecordStatus, StrategicObjective};

const MODULE: &str = "sasaran_strategis";

fn build(
    auth: &RequireAuth,
    store: &dyn Store,
    req: ObjectiveRequest,
    id: String,
    created_at: DateTime<Utc>,
) -> Result<StrategicObjective, ApiError> {
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
    let code = errors.required("code", req.code.as_deref());
    errors.max_len("code", code.as_deref(), MAX_CODE_LEN);
    let name = errors.required("name", req.name.as_deref());
    errors.max_len("name", name.as_deref(), MAX_NAME_LEN);
    errors.max_len("description", req.description.as_deref(), MAX_TEXT_LEN);
    let status = errors.parse::<RecordStatus>("status", req.status.as_deref());

    errors.finish()?;
    let (Some(institution_id), Some(code), Some(name)) = (institution_id, code, name) else {
        return Err(ApiError::bad_request("Invalid strategic objective"));
    };

    Ok(StrategicObjective {
        id,
        institution_id,
        code,
        name,
        description: non_empty(req.description),
        status: status.unwrap_or(RecordStatus::Aktif),
        created_at,
        updated_at: Utc::now(),
    })
}

fn load(
    auth: &RequireAuth,
    store: &dyn Store,
    id: &str,
) -> Result<StrategicObjective, ApiError> {
    let objective = store
        .get_objective(id)
        .api_err("Failed to get strategic objective")?
        .or_not_found("Strategic objective not found")?;
    auth.check_institution(&objective.institution_id)?;
    Ok(objective)
}

pub async fn list_objectives(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<InstitutionParams>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_READ)?;
    let institution_id = auth.scoped_filter(params.instansi_id)?;
    let cursor = params.cursor.as_deref().unwrap_or("");

    let objectives = state
        .store
        .list_objectives(institution_id.as_deref(), cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list strategic objectives")?;

    let (objectives, next_cursor, has_more) =
        paginate(objectives, DEFAULT_PAGE_SIZE as usize, |o| o.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(
        objectives,
        next_cursor,
        has_more,
    )))
}

pub async fn create_objective(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<ObjectiveRequest>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_WRITE)?;
    let store = state.store.as_ref();

    let objective = build(&auth, store, req, Uuid::new_v4().to_string(), Utc::now())?;
    store
        .create_objective(&objective)
        .api_err("Failed to create strategic objective")?;

    AuditEvent::new(
        audit::CREATE,
        MODULE,
        format!("Created strategic objective {}", objective.code),
    )
    .institution(Some(&objective.institution_id))
    .after(&objective)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(objective))))
}

pub async fn get_objective(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_READ)?;
    let objective = load(&auth, state.store.as_ref(), &id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(objective)))
}

pub async fn update_objective(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<ObjectiveRequest>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_WRITE)?;
    let store = state.store.as_ref();

    let existing = load(&auth, store, &id)?;
    let objective = build(&auth, store, req, existing.id.clone(), existing.created_at)?;
    store
        .update_objective(&objective)
        .api_err("Failed to update strategic objective")?;

    AuditEvent::new(
        audit::UPDATE,
        MODULE,
        format!("Updated strategic objective {}", objective.code),
    )
    .institution(Some(&objective.institution_id))
    .before(&existing)
    .after(&objective)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(Json(ApiResponse::success(objective)))
}

pub async fn delete_objective(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_WRITE)?;
    let store = state.store.as_ref();

    let objective = load(&auth, store, &id)?;
    store
        .delete_objective(&objective.id)
        .api_err("Failed to delete strategic objective")?;

    AuditEvent::new(
        audit::DELETE,
        MODULE,
        format!("Deleted strategic objective {}", objective.code),
    )
    .institution(Some(&objective.institution_id))
    .before(&objective)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
