mod audit_logs;
mod roles;
mod settings;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, put},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // User routes
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{id}/roles", put(users::set_user_roles))
        // Role routes
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route(
            "/roles/{id}",
            get(roles::get_role)
                .put(roles::update_role)
                .delete(roles::delete_role),
        )
        .route("/permissions", get(roles::list_permissions))
        // Audit log routes
        .route("/audit-logs", get(audit_logs::list_audit_logs))
        .route("/audit-logs/{id}", get(audit_logs::get_audit_log))
        // Setting routes
        .route(
            "/settings",
            get(settings::list_settings).put(settings::put_settings),
        )
        .route(
            "/settings/{key}",
            get(settings::get_setting)
                .put(settings::put_setting)
                .delete(settings::delete_setting),
        )
}
