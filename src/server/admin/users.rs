use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::{MIN_PASSWORD_LENGTH, PasswordHasher, RequireAuth, effective_permissions};
use crate::server::AppState;
use crate::server::dto::{PaginationParams, UserRequest, UserResponse, UserRolesRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::validation::{FieldErrors, MAX_NAME_LEN};
use crate::store::Store;
use crate::types::{Permission, User};

const MODULE: &str = "user";

fn user_response(store: &dyn Store, user: User) -> Result<UserResponse, ApiError> {
    let roles = store
        .list_user_roles(&user.id)
        .api_err("Failed to list user roles")?;
    let permissions =
        effective_permissions(store, &user.id).api_err("Failed to resolve permissions")?;
    Ok(UserResponse::new(user, &roles, permissions))
}

fn check_roles(errors: &mut FieldErrors, store: &dyn Store, role_ids: &[String]) -> Result<(), ApiError> {
    for (i, id) in role_ids.iter().enumerate() {
        if store.get_role(id).api_err("Failed to get role")?.is_none() {
            errors.add(&format!("role_ids.{i}"), "The selected role is invalid.");
        }
    }
    Ok(())
}

fn build(
    store: &dyn Store,
    req: &UserRequest,
    existing: Option<&User>,
) -> Result<User, ApiError> {
    let mut errors = FieldErrors::new();

    let name = errors.required("name", req.name.as_deref());
    errors.max_len("name", name.as_deref(), MAX_NAME_LEN);

    let email = errors
        .required("email", req.email.as_deref())
        .map(|e| e.to_ascii_lowercase());
    errors.max_len("email", email.as_deref(), MAX_NAME_LEN);
    if let Some(email) = &email {
        if !email.contains('@') {
            errors.add("email", "The email must be a valid email address.");
        } else if let Some(other) = store
            .get_user_by_email(email)
            .api_err("Failed to check email")?
        {
            if existing.is_none_or(|e| e.id != other.id) {
                errors.add("email", "The email has already been taken.");
            }
        }
    }

    let password = req.password.as_deref().filter(|p| !p.is_empty());
    match password {
        None if existing.is_none() => errors.add("password", "The password field is required."),
        Some(p) if p.chars().count() < MIN_PASSWORD_LENGTH => errors.add(
            "password",
            format!("The password must be at least {MIN_PASSWORD_LENGTH} characters."),
        ),
        _ => {}
    }

    let institution_id = req
        .institution_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if let Some(id) = &institution_id {
        if store
            .get_institution(id)
            .api_err("Failed to get institution")?
            .is_none()
        {
            errors.add("institution_id", "The selected institution_id is invalid.");
        }
    }

    if let Some(role_ids) = &req.role_ids {
        check_roles(&mut errors, store, role_ids)?;
    }

    errors.finish()?;
    let (Some(name), Some(email)) = (name, email) else {
        return Err(ApiError::bad_request("Invalid user"));
    };

    let password_hash = match (password, existing) {
        (Some(p), _) => PasswordHasher::new()
            .hash(p)
            .api_err("Failed to hash password")?,
        (None, Some(e)) => e.password_hash.clone(),
        (None, None) => return Err(ApiError::bad_request("Invalid user")),
    };

    let now = Utc::now();
    Ok(User {
        id: existing.map_or_else(|| Uuid::new_v4().to_string(), |e| e.id.clone()),
        name,
        email,
        password_hash,
        institution_id,
        is_active: req
            .is_active
            .unwrap_or_else(|| existing.is_none_or(|e| e.is_active)),
        created_at: existing.map_or(now, |e| e.created_at),
        updated_at: now,
        last_login_at: existing.and_then(|e| e.last_login_at),
    })
}

fn load(store: &dyn Store, id: &str) -> Result<User, ApiError> {
    store
        .get_user(id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")
}

pub async fn list_users(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let store = state.store.as_ref();
    let cursor = params.cursor.as_deref().unwrap_or("");

    let users = store
        .list_users(cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list users")?;

    let (users, next_cursor, has_more) =
        paginate(users, DEFAULT_PAGE_SIZE as usize, |u| u.id.clone());
    let users = users
        .into_iter()
        .map(|u| user_response(store, u))
        .collect::<Result<Vec<_>, _>>()?;

    Ok::<_, ApiError>(Json(PaginatedResponse::new(users, next_cursor, has_more)))
}

pub async fn create_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<UserRequest>,
) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let store = state.store.as_ref();

    let user = build(store, &req, None)?;
    store.create_user(&user).api_err("Failed to create user")?;
    if let Some(role_ids) = &req.role_ids {
        store
            .set_user_roles(&user.id, role_ids)
            .api_err("Failed to assign roles")?;
    }

    let response = user_response(store, user)?;
    AuditEvent::new(
        audit::CREATE,
        MODULE,
        format!("Created user {}", response.user.email),
    )
    .institution(response.user.institution_id.as_deref())
    .after(&response)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

pub async fn get_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let store = state.store.as_ref();
    let user = load(store, &id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(user_response(store, user)?)))
}

pub async fn update_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<UserRequest>,
) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let store = state.store.as_ref();
    let existing = load(store, &id)?;

    let user = build(store, &req, Some(&existing))?;
    store.update_user(&user).api_err("Failed to update user")?;
    if let Some(role_ids) = &req.role_ids {
        store
            .set_user_roles(&user.id, role_ids)
            .api_err("Failed to assign roles")?;
    }

    let response = user_response(store, user)?;
    AuditEvent::new(
        audit::UPDATE,
        MODULE,
        format!("Updated user {}", response.user.email),
    )
    .institution(response.user.institution_id.as_deref())
    .before(&existing)
    .after(&response)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(Json(ApiResponse::success(response)))
}

pub async fn set_user_roles(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    Json(req): Json<UserRolesRequest>,
) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let store = state.store.as_ref();
    let user = load(store, &id)?;

    let mut errors = FieldErrors::new();
    check_roles(&mut errors, store, &req.role_ids)?;
    errors.finish()?;

    let before = store
        .list_user_roles(&user.id)
        .api_err("Failed to list user roles")?;
    store
        .set_user_roles(&user.id, &req.role_ids)
        .api_err("Failed to assign roles")?;

    let response = user_response(store, user)?;
    AuditEvent::new(
        audit::UPDATE,
        MODULE,
        format!("Changed roles of {}", response.user.email),
    )
    .institution(response.user.institution_id.as_deref())
    .before(&before)
    .after(&response.roles)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(Json(ApiResponse::success(response)))
}

pub async fn delete_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::USER_ADMIN)?;
    let store = state.store.as_ref();
    let user = load(store, &id)?;
    if user.id == auth.user.id {
        return Err(ApiError::conflict("You cannot delete your own account"));
    }

    store.delete_user(&user.id).api_err("Failed to delete user")?;

    AuditEvent::new(
        audit::DELETE,
        MODULE,
        format!("Deleted user {}", user.email),
    )
    .institution(user.institution_id.as_deref())
    .before(&user)
    .record(store, &auth.user.id, &client);

    Ok(StatusCode::NO_CONTENT)
}
