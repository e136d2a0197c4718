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
use crate::server::dto::{InstitutionRequest, PaginationParams};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::validation::{FieldErrors, MAX_CODE_LEN, MAX_NAME_LEN, MAX_TEXT_LEN};
use crate::types::{Institution, Permission, RecordStatus};

const MODULE: &str = "instansi";
const NIP_LENGTH: usize = 18;

fn build(
    req: InstitutionRequest,
    id: String,
    created_at: DateTime<Utc>,
) -> Result<Institution, ApiError> {
    let mut errors = FieldErrors::new();

    let code = errors.required("code", req.code.as_deref());
    errors.max_len("code", code.as_deref(), MAX_CODE_LEN);
    let name = errors.required("name", req.name.as_deref());
    errors.max_len("name", name.as_deref(), MAX_NAME_LEN);
    errors.max_len("address", req.address.as_deref(), MAX_TEXT_LEN);
    errors.max_len("head_name", req.head_name.as_deref(), MAX_NAME_LEN);

    let email = non_empty(req.email);
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        errors.add("email", "The email must be a valid email address.");
    }
    let head_nip = non_empty(req.head_nip);
    if head_nip
        .as_deref()
        .is_some_and(|nip| nip.len() != NIP_LENGTH || !nip.chars().all(|c| c.is_ascii_digit()))
    {
        errors.add("head_nip", format!("The head_nip must be {NIP_LENGTH} digits."));
    }
    let status = errors.parse::<RecordStatus>("status", req.status.as_deref());

    errors.finish()?;
    let (Some(code), Some(name)) = (code, name) else {
        return Err(ApiError::bad_request("Invalid institution"));
    };

    Ok(Institution {
        id,
        code,
        name,
        address: non_empty(req.address),
        phone: non_empty(req.phone),
        email,
        website: non_empty(req.website),
        head_name: non_empty(req.head_name),
        head_nip,
        status: status.unwrap_or(RecordStatus::Aktif),
        created_at,
        updated_at: Utc::now(),
    })
}

pub async fn list_institutions(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_READ)?;
    let cursor = params.cursor.as_deref().unwrap_or("");

    let institutions = state
        .store
        .list_institutions(auth.scope(), cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list institutions")?;

    let (institutions, next_cursor, has_more) =
        paginate(institutions, DEFAULT_PAGE_SIZE as usize, |i| i.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(
        institutions,
        next_cursor,
        has_more,
    )))
}

pub async fn create_institution(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<InstitutionRequest>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_WRITE)?;
    if auth.scope().is_some() {
        return Err(ApiError::forbidden(
            "Users bound to an institution cannot create institutions",
        ));
    }

    let now = Utc::now();
    let institution = build(req, Uuid::new_v4().to_string(), now)?;

    state
        .store
        .create_institution(&institution)
        .api_err("Failed to create institution")?;

    AuditEvent::new(
        audit::CREATE,
        MODULE,
        format!("Created institution {}", institution.code),
    )
    .institution(Some(&institution.id))
    .after(&institution)
    .record(state.store.as_ref(), &auth.user.id, &client);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(institution))))
}

pub async fn get_institution(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_READ)?;
    auth.check_institution(&id)?;

    let institution = state
        .store
        .get_institution(&id)
        .api_err("Failed to get institution")?
        .or_not_found("Institution not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(institution)))
}

pub async fn update_institution(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<InstitutionRequest>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_WRITE)?;
    auth.check_institution(&id)?;
    let store = state.store.as_ref();

    let existing = store
        .get_institution(&id)
        .api_err("Failed to get institution")?
        .or_not_found("Institution not found")?;

    let institution = build(req, existing.id.clone(), existing.created_at)?;
    store
        .update_institution(&institution)
        .api_err("Failed to update institution")?;

    AuditEvent::new(
        audit::UPDATE,
        MODULE,
        format!("Updated institution {}", institution.code),
    )
    .institution(Some(&institution.id))
    .before(&existing)
    .after(&institution)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(Json(ApiResponse::success(institution)))
}

pub async fn delete_institution(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_WRITE)?;
    auth.check_institution(&id)?;
    let store = state.store.as_ref();

    let institution = store
        .get_institution(&id)
        .api_err("Failed to get institution")?
        .or_not_found("Institution not found")?;

    store
        .delete_institution(&institution.id)
        .api_err("Failed to delete institution")?;

    AuditEvent::new(
        audit::DELETE,
        MODULE,
        format!("Deleted institution {}", institution.code),
    )
    .institution(Some(&institution.id))
    .before(&institution)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
