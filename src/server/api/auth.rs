use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};

use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::{PasswordHasher, RequireAuth, TokenGenerator};
use crate::server::AppState;
use crate::server::dto::{LoginRequest, LoginResponse, UserResponse};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::FieldErrors;

/// Lifetime of a token issued by login.
const SESSION_HOURS: i64 = 8;

pub async fn login(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let mut errors = FieldErrors::new();
    let email = errors.required("email", req.email.as_deref());
    let password = errors.required_value("password", req.password.as_deref());
    errors.finish()?;
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::bad_request("Missing credentials"));
    };

    let user = store
        .get_user_by_email(&email)
        .api_err("Failed to look up user")?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let verified = PasswordHasher::new()
        .verify(password, &user.password_hash)
        .unwrap_or_else(|e| {
            tracing::warn!("Unreadable password hash for user {}: {e}", user.id);
            false
        });
    if !verified {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }
    if !user.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    let expires_at = Utc::now() + Duration::hours(SESSION_HOURS);
    let (_, raw) = TokenGenerator::new()
        .issue(store, &user.id, Some(expires_at))
        .api_err("Failed to create token")?;

    if let Err(e) = store.update_user_last_login(&user.id) {
        tracing::warn!("Failed to update last login for {}: {e}", user.id);
    }

    let roles = store.list_user_roles(&user.id).api_err("Failed to load roles")?;
    let permissions = crate::auth::effective_permissions(store, &user.id)
        .api_err("Failed to load permissions")?;

    AuditEvent::new(audit::LOGIN, "auth", format!("{} logged in", user.email))
        .institution(user.institution_id.as_deref())
        .record(store, &user.id, &client);

    tracing::info!("User {} logged in", user.email);

    Ok(Json(ApiResponse::success(LoginResponse {
        token: raw,
        expires_at: Some(expires_at),
        user: UserResponse::new(user, &roles, permissions),
    })))
}

pub async fn logout(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    store
        .delete_token(&auth.token.id)
        .api_err("Failed to revoke token")?;

    AuditEvent::new(audit::LOGOUT, "auth", format!("{} logged out", auth.user.email))
        .institution(auth.scope())
        .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn me(auth: RequireAuth, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let roles = state
        .store
        .list_user_roles(&auth.user.id)
        .api_err("Failed to load roles")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(UserResponse::new(
        auth.user,
        &roles,
        auth.permissions,
    ))))
}
