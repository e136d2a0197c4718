//! Audit trail: one row per state-changing request.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::store::Store;
use crate::types::AuditLog;

pub const CREATE: &str = "CREATE";
pub const UPDATE: &str = "UPDATE";
pub const DELETE: &str = "DELETE";
pub const SUBMIT: &str = "SUBMIT";
pub const VALIDATE: &str = "VALIDATE";
pub const REJECT: &str = "REJECT";
pub const REQUEST_REVISION: &str = "REQUEST_REVISION";
pub const APPROVE: &str = "APPROVE";
pub const UPLOAD: &str = "UPLOAD";
pub const IMPORT: &str = "IMPORT";
pub const EXPORT: &str = "EXPORT";
pub const LOGIN: &str = "LOGIN";
pub const LOGOUT: &str = "LOGOUT";

/// Caller address and agent, read from proxy headers.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip_address = header(parts, "x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .or_else(|| header(parts, "x-real-ip"));

        Ok(ClientInfo {
            ip_address,
            user_agent: header(parts, "user-agent"),
        })
    }
}

/// A pending audit row.
#[derive(Debug)]
pub struct AuditEvent {
    action: &'static str,
    module: &'static str,
    description: String,
    institution_id: Option<String>,
    old_values: Option<Value>,
    new_values: Option<Value>,
}

fn to_value<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value)
        .inspect_err(|e| tracing::warn!("Failed to serialize audit values: {e}"))
        .ok()
}

impl AuditEvent {
    #[must_use]
    pub fn new(action: &'static str, module: &'static str, description: impl Into<String>) -> Self {
        Self {
            action,
            module,
            description: description.into(),
            institution_id: None,
            old_values: None,
            new_values: None,
        }
    }

    #[must_use]
    pub fn institution(mut self, institution_id: Option<&str>) -> Self {
        self.institution_id = institution_id.map(str::to_string);
        self
    }

    #[must_use]
    pub fn before<T: Serialize>(mut self, value: &T) -> Self {
        self.old_values = to_value(value);
        self
    }

    #[must_use]
    pub fn after<T: Serialize>(mut self, value: &T) -> Self {
        self.new_values = to_value(value);
        self
    }

    /// Writes the row. A failed write is logged, never surfaced to the caller.
    pub fn record(self, store: &dyn Store, user_id: &str, client: &ClientInfo) {
        let entry = AuditLog {
            id: Uuid::new_v4().to_string(),
            user_id: Some(user_id.to_string()),
            institution_id: self.institution_id,
            action: self.action.to_string(),
            module: self.module.to_string(),
            description: self.description,
            old_values: self.old_values,
            new_values: self.new_values,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            created_at: Utc::now(),
        };

        if let Err(e) = store.create_audit_log(&entry) {
            tracing::error!(
                "Failed to write audit log {} {}: {e}",
                entry.action,
                entry.module
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn client_info(request: Request<()>) -> ClientInfo {
        let (mut parts, _) = request.into_parts();
        ClientInfo::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_client_info_prefers_forwarded_for() {
        let info = client_info(
            Request::builder()
                .header("x-forwarded-for", "10.0.0.7, 172.16.0.1")
                .header("x-real-ip", "192.168.1.1")
                .header("user-agent", "curl/8.5")
                .body(())
                .unwrap(),
        )
        .await;

        assert_eq!(info.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.5"));
    }

    #[tokio::test]
    async fn test_client_info_falls_back_to_real_ip() {
        let info = client_info(
            Request::builder()
                .header("x-real-ip", "192.168.1.1")
                .body(())
                .unwrap(),
        )
        .await;

        assert_eq!(info.ip_address.as_deref(), Some("192.168.1.1"));
        assert!(info.user_agent.is_none());
    }
}
