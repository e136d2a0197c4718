use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{PermissionResponse, RoleRequest, RoleResponse};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{FieldErrors, MAX_NAME_LEN, MAX_TEXT_LEN};
use crate::store::Store;
use crate::types::{Permission, Role};

const MODULE: &str = "role";

/// The role `admin init` grants; it cannot be removed.
const SUPERADMIN_ROLE: &str = "superadmin";

fn build(req: RoleRequest, existing: Option<&Role>) -> Result<Role, ApiError> {
    let mut errors = FieldErrors::new();

    let name = errors.required("name", req.name.as_deref());
    errors.max_len("name", name.as_deref(), MAX_NAME_LEN);
    errors.max_len("description", req.description.as_deref(), MAX_TEXT_LEN);

    let mut permissions = Permission::default();
    for (i, perm) in req.permissions.iter().enumerate() {
        match Permission::parse(perm.trim()) {
            Some(p) => permissions = permissions.union(p),
            None => errors.add(
                &format!("permissions.{i}"),
                format!("Unknown permission '{perm}'."),
            ),
        }
    }

    errors.finish()?;
    let Some(name) = name else {
        return Err(ApiError::bad_request("Invalid role"));
    };

    let now = Utc::now();
    Ok(Role {
        id: existing.map_or_else(|| Uuid::new_v4().to_string(), |e| e.id.clone()),
        name,
        description: req
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        permissions,
        created_at: existing.map_or(now, |e| e.created_at),
        updated_at: now,
    })
}

fn load(store: &dyn Store, id: &str) -> Result<Role, ApiError> {
    store
        .get_role(id)
        .api_err("Failed to get role")?
        .or_not_found("Role not found")
}

pub async fn list_roles(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let roles = state.store.list_roles().api_err("Failed to list roles")?;

    let roles: Vec<RoleResponse> = roles.into_iter().map(RoleResponse::from).collect();
    Ok::<_, ApiError>(Json(ApiResponse::success(roles)))
}

pub async fn create_role(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<RoleRequest>,
) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let store = state.store.as_ref();

    let role = build(req, None)?;
    store.create_role(&role).api_err("Failed to create role")?;

    let response = RoleResponse::from(role);
    AuditEvent::new(audit::CREATE, MODULE, format!("Created role {}", response.name))
        .after(&response)
        .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

pub async fn get_role(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let role = load(state.store.as_ref(), &id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(RoleResponse::from(role))))
}

pub async fn update_role(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<RoleRequest>,
) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let store = state.store.as_ref();
    let existing = load(store, &id)?;
    if existing.name == SUPERADMIN_ROLE {
        return Err(ApiError::conflict("The superadmin role cannot be modified"));
    }

    let role = build(req, Some(&existing))?;
    store.update_role(&role).api_err("Failed to update role")?;

    let before = RoleResponse::from(existing);
    let response = RoleResponse::from(role);
    AuditEvent::new(audit::UPDATE, MODULE, format!("Updated role {}", response.name))
        .before(&before)
        .after(&response)
        .record(store, &auth.user.id, &client);

    Ok(Json(ApiResponse::success(response)))
}

pub async fn delete_role(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let store = state.store.as_ref();
    let role = load(store, &id)?;
    if role.name == SUPERADMIN_ROLE {
        return Err(ApiError::conflict("The superadmin role cannot be deleted"));
    }

    store.delete_role(&role.id).api_err("Failed to delete role")?;

    let before = RoleResponse::from(role);
    AuditEvent::new(audit::DELETE, MODULE, format!("Deleted role {}", before.name))
        .before(&before)
        .record(store, &auth.user.id, &client);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_permissions(auth: RequireAuth) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let permissions: Vec<PermissionResponse> = Permission::CATALOG
        .iter()
        .map(|(name, _, description)| PermissionResponse { name, description })
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(permissions)))
}
