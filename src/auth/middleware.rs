use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{TokenValidationError, extract_bearer_token, validate_token};
use crate::error::Result;
use crate::server::AppState;
use crate::server::response::ApiError;
use crate::store::Store;
use crate::types::{Permission, Token, User};

/// Extractor for an authenticated, active user with their effective
/// permissions resolved from roles.
pub struct RequireAuth {
    pub token: Token,
    pub user: User,
    pub permissions: Permission,
}

impl RequireAuth {
    /// Fails with 403 unless every bit of `required` is granted.
    pub fn require(&self, required: Permission) -> std::result::Result<(), ApiError> {
        if self.permissions.has(required) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "Missing permission: {required}"
            )))
        }
    }

    /// The institution this user is confined to, or `None` for users who
    /// may see every institution.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.user.institution_id.as_deref()
    }

    /// Narrows a requested institution filter to the user's scope.
    pub fn scoped_filter(
        &self,
        requested: Option<String>,
    ) -> std::result::Result<Option<String>, ApiError> {
        match (self.scope(), requested) {
            (None, requested) => Ok(requested),
            (Some(own), Some(requested)) if requested != own => Err(ApiError::forbidden(
                "Access to another institution is not allowed",
            )),
            (Some(own), _) => Ok(Some(own.to_string())),
        }
    }

    pub fn check_institution(&self, institution_id: &str) -> std::result::Result<(), ApiError> {
        match self.scope() {
            Some(own) if own != institution_id => Err(ApiError::forbidden(
                "Access to another institution is not allowed",
            )),
            _ => Ok(()),
        }
    }
}

/// Union of the user's role permissions, with implied reads added.
pub fn effective_permissions(store: &dyn Store, user_id: &str) -> Result<Permission> {
    let roles = store.list_user_roles(user_id)?;
    Ok(roles
        .iter()
        .fold(Permission::default(), |acc, role| acc.union(role.permissions))
        .expand_implied())
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    InactiveUser,
    InternalError,
}

impl From<TokenValidationError> for AuthError {
    fn from(e: TokenValidationError) -> Self {
        match e {
            TokenValidationError::InvalidScheme => AuthError::InvalidScheme,
            TokenValidationError::InvalidToken => AuthError::InvalidToken,
            TokenValidationError::TokenExpired => AuthError::TokenExpired,
            TokenValidationError::InactiveUser => AuthError::InactiveUser,
            TokenValidationError::InternalError => AuthError::InternalError,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
            AuthError::InactiveUser => (StatusCode::FORBIDDEN, "Account is deactivated"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"sakip\""),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let raw_token = extract_bearer_token(auth_header)?.ok_or(AuthError::MissingAuth)?;
        let validated = validate_token(state, raw_token)?;

        let permissions = effective_permissions(state.store.as_ref(), &validated.user.id)
            .map_err(|e| {
                tracing::error!("Failed to load roles for {}: {e}", validated.user.id);
                AuthError::InternalError
            })?;

        Ok(RequireAuth {
            token: validated.token,
            user: validated.user,
            permissions,
        })
    }
}
