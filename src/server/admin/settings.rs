use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{BulkSettingsRequest, SettingRequest, SettingResponse};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{FieldErrors, MAX_TEXT_LEN};
use crate::settings;
use crate::types::{Permission, Setting, SettingType};

const MODULE: &str = "setting";

pub async fn list_settings(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    auth.require(Permission::SETTINGS_ADMIN)?;
    let settings = state
        .store
        .list_settings()
        .api_err("Failed to list settings")?;

    let settings: Vec<SettingResponse> = settings.into_iter().map(SettingResponse::from).collect();
    Ok::<_, ApiError>(Json(ApiResponse::success(settings)))
}

pub async fn get_setting(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::SETTINGS_ADMIN)?;
    let setting = state
        .store
        .get_setting(&key)
        .api_err("Failed to get setting")?
        .or_not_found("Setting not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(SettingResponse::from(setting))))
}

/// Creates or replaces one setting. The value must match the stored type,
/// or the `type` given in the request for a new key.
pub async fn put_setting(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(key): Path<String>,
    Json(req): Json<SettingRequest>,
) -> impl IntoResponse {
    auth.require(Permission::SETTINGS_ADMIN)?;
    let store = state.store.as_ref();
    let existing = store.get_setting(&key).api_err("Failed to get setting")?;

    let mut errors = FieldErrors::new();
    if key.trim().is_empty() || key.chars().count() > 100 {
        errors.add("key", "The key must be between 1 and 100 characters.");
    }
    let requested = errors.parse::<SettingType>("type", req.setting_type.as_deref());
    let setting_type = requested
        .or(existing.as_ref().map(|s| s.setting_type))
        .unwrap_or(SettingType::String);
    errors.max_len("description", req.description.as_deref(), MAX_TEXT_LEN);
    errors.finish()?;

    let value = settings::serialize(&key, &req.value, setting_type)
        .api_err("Failed to store setting")?;

    let setting = Setting {
        key: key.clone(),
        value,
        setting_type,
        description: req
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .or_else(|| existing.as_ref().and_then(|s| s.description.clone())),
        updated_at: Utc::now(),
    };
    store
        .upsert_setting(&setting)
        .api_err("Failed to store setting")?;

    let response = SettingResponse::from(setting);
    let action = if existing.is_some() {
        audit::UPDATE
    } else {
        audit::CREATE
    };
    let mut event = AuditEvent::new(action, MODULE, format!("Set {key}")).after(&response);
    if let Some(before) = existing {
        event = event.before(&SettingResponse::from(before));
    }
    event.record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(Json(ApiResponse::success(response)))
}

/// Updates several existing settings at once; nothing is written if any
/// key is unknown or any value has the wrong type.
pub async fn put_settings(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<BulkSettingsRequest>,
) -> impl IntoResponse {
    auth.require(Permission::SETTINGS_ADMIN)?;
    let store = state.store.as_ref();

    let mut errors = FieldErrors::new();
    let mut pending = Vec::with_capacity(req.settings.len());
    for (key, value) in &req.settings {
        let field = format!("settings.{key}");
        let Some(existing) = store.get_setting(key).api_err("Failed to get setting")? else {
            errors.add(&field, "Unknown setting.");
            continue;
        };
        match settings::serialize(key, value, existing.setting_type) {
            Ok(raw) => pending.push((existing, raw)),
            Err(e) => errors.add(&field, e.to_string()),
        }
    }
    errors.finish()?;

    let now = Utc::now();
    let mut updated = Vec::with_capacity(pending.len());
    for (existing, raw) in pending {
        let setting = Setting {
            value: raw,
            updated_at: now,
            ..existing
        };
        store
            .upsert_setting(&setting)
            .api_err("Failed to store setting")?;
        updated.push(SettingResponse::from(setting));
    }

    AuditEvent::new(
        audit::UPDATE,
        MODULE,
        format!("Updated {} settings", updated.len()),
    )
    .after(&updated)
    .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(Json(ApiResponse::success(updated)))
}

pub async fn delete_setting(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(key): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::SETTINGS_ADMIN)?;
    let store = state.store.as_ref();
    let setting = store
        .get_setting(&key)
        .api_err("Failed to get setting")?
        .or_not_found("Setting not found")?;

    store
        .delete_setting(&setting.key)
        .api_err("Failed to delete setting")?;

    AuditEvent::new(audit::DELETE, MODULE, format!("Deleted {key}"))
        .before(&SettingResponse::from(setting))
        .record(store, &auth.user.id, &client);

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
