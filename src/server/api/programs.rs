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
use crate::server::dto::{ProgramParams, ProgramRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreResultExt, paginate,
};
use crate::server::validation::{FieldErrors, MAX_CODE_LEN, MAX_NAME_LEN, MAX_TEXT_LEN};
use crate::store::{ProgramFilter, Store};
use crate::types::{Permission, Program, ProgramStatus};

const MODULE: &str = "program";

fn build(
    auth: &RequireAuth,
    store: &dyn Store,
    req: ProgramRequest,
    id: String,
    created_at: DateTime<Utc>,
) -> Result<Program, ApiError> {
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
    if let Some(objective_id) = &objective_id {
        let objective = store
            .get_objective(objective_id)
            .api_err("Failed to get strategic objective")?;
        match objective {
            None => errors.add("objective_id", "The selected objective_id is invalid."),
            Some(o) if Some(&o.institution_id) != institution_id.as_ref() => errors.add(
                "objective_id",
                "The strategic objective belongs to another institution.",
            ),
            Some(_) => {}
        }
    }

    let code = errors.required("code", req.code.as_deref());
    errors.max_len("code", code.as_deref(), MAX_CODE_LEN);
    let name = errors.required("name", req.name.as_deref());
    errors.max_len("name", name.as_deref(), MAX_NAME_LEN);
    errors.max_len("description", req.description.as_deref(), MAX_TEXT_LEN);
    errors.min("budget", req.budget, 0.0);
    let fiscal_year = errors.required_value("fiscal_year", req.fiscal_year);
    errors.year("fiscal_year", fiscal_year);
    let status = errors.parse::<ProgramStatus>("status", req.status.as_deref());

    errors.finish()?;
    let (Some(institution_id), Some(code), Some(name), Some(fiscal_year)) =
        (institution_id, code, name, fiscal_year)
    else {
        return Err(ApiError::bad_request("Invalid program"));
    };

    Ok(Program {
        id,
        institution_id,
        objective_id,
        code,
        name,
        description: non_empty(req.description),
        budget: req.budget,
        fiscal_year,
        status: status.unwrap_or(ProgramStatus::Draft),
        responsible_person: non_empty(req.responsible_person),
        created_at,
        updated_at: Utc::now(),
    })
}

pub async fn list_programs(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProgramParams>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_READ)?;
    let filter = ProgramFilter {
        institution_id: auth.scoped_filter(params.instansi_id)?,
        objective_id: params.objective_id,
    };
    let cursor = params.cursor.as_deref().unwrap_or("");

    let programs = state
        .store
        .list_programs(&filter, cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list programs")?;

    let (programs, next_cursor, has_more) =
        paginate(programs, DEFAULT_PAGE_SIZE as usize, |p| p.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(programs, next_cursor, has_more)))
}

pub async fn create_program(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<ProgramRequest>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_WRITE)?;
    let store = state.store.as_ref();

    let program = build(&auth, store, req, Uuid::new_v4().to_string(), Utc::now())?;
    store
        .create_program(&program)
        .api_err("Failed to create program")?;

    AuditEvent::new(audit::CREATE, MODULE, format!("Created program {}", program.code))
        .institution(Some(&program.institution_id))
        .after(&program)
        .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(program))))
}

pub async fn get_program(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let program = access::program(&auth, state.store.as_ref(), &id, Permission::MASTER_READ)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(program)))
}

pub async fn update_program(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<ProgramRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let existing = access::program(&auth, store, &id, Permission::MASTER_WRITE)?;

    let program = build(&auth, store, req, existing.id.clone(), existing.created_at)?;
    store
        .update_program(&program)
        .api_err("Failed to update program")?;

    AuditEvent::new(audit::UPDATE, MODULE, format!("Updated program {}", program.code))
        .institution(Some(&program.institution_id))
        .before(&existing)
        .after(&program)
        .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(Json(ApiResponse::success(program)))
}

pub async fn delete_program(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let program = access::program(&auth, store, &id, Permission::MASTER_WRITE)?;

    store
        .delete_program(&program.id)
        .api_err("Failed to delete program")?;

    AuditEvent::new(audit::DELETE, MODULE, format!("Deleted program {}", program.code))
        .institution(Some(&program.institution_id))
        .before(&program)
        .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
