#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::Utc;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use sakip::auth::{PasswordHasher, TokenGenerator};
use sakip::config::ServerConfig;
use sakip::server::{AppState, create_router};
use sakip::store::{SqliteStore, Store};
use sakip::types::User;

pub const PASSWORD: &str = "rahasia-sekali";
const BOUNDARY: &str = "sakip-test-boundary";

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response is not JSON")
    }

    pub fn data(&self) -> Value {
        self.json()["data"].clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("response is not UTF-8")
    }
}

pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            file_name: None,
            data: value.as_bytes(),
        }
    }

    pub fn file(name: &'a str, file_name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            data,
        }
    }
}

/// An app instance over a fresh database, with a superadmin token.
pub struct TestApp {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub admin_token: String,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut ServerConfig)) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let mut config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        adjust(&mut config);

        let store = Arc::new(SqliteStore::new(config.db_path()).expect("open store"));
        store.initialize().expect("initialize schema");
        store.seed_defaults().expect("seed defaults");

        let state = Arc::new(AppState::new(store.clone(), config));
        let router = create_router(state);

        let mut app = Self {
            temp_dir,
            store,
            admin_token: String::new(),
            router,
        };
        let admin = app.create_user("admin@example.go.id", "superadmin", None);
        app.admin_token = app.token_for(&admin.id);
        app
    }

    /// Inserts an active user holding one seeded role.
    pub fn create_user(&self, email: &str, role: &str, institution_id: Option<&str>) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            password_hash: PasswordHasher::new().hash(PASSWORD).expect("hash password"),
            institution_id: institution_id.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        self.store.create_user(&user).expect("create user");

        let role = self
            .store
            .get_role_by_name(role)
            .expect("get role")
            .expect("role exists");
        self.store
            .set_user_roles(&user.id, &[role.id])
            .expect("assign role");
        user
    }

    pub fn token_for(&self, user_id: &str) -> String {
        let (_, raw) = TokenGenerator::new()
            .issue(self.store.as_ref(), user_id, None)
            .expect("issue token");
        raw
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body")
            .to_vec();

        Response {
            status,
            headers,
            body,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, Some(&self.admin_token), None)
            .await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response {
        self.request(Method::POST, uri, Some(&self.admin_token), Some(body))
            .await
    }

    pub async fn put(&self, uri: &str, body: Value) -> Response {
        self.request(Method::PUT, uri, Some(&self.admin_token), Some(body))
            .await
    }

    pub async fn multipart(&self, uri: &str, token: &str, parts: &[Part<'_>]) -> Response {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part.file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        part.name
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        part.name
                    )
                    .as_bytes(),
                ),
            }
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("build request");

        self.send(request).await
    }

    pub async fn create_institution(&self, code: &str) -> String {
        let resp = self
            .post(
                "/api/v1/instansi",
                serde_json::json!({ "code": code, "name": format!("Dinas {code}") }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
        resp.data()["id"].as_str().expect("institution id").to_string()
    }

    /// A quarterly percentage indicator with a 2024 target of `target`.
    pub async fn create_indicator(&self, institution_id: &str, code: &str, target: f64) -> String {
        let resp = self
            .post(
                "/api/v1/indicators",
                serde_json::json!({
                    "institution_id": institution_id,
                    "code": code,
                    "name": format!("Indikator {code}"),
                    "category": "output",
                    "measurement_unit": "%",
                    "measurement_type": "percentage",
                    "frequency": "quarterly",
                    "targets": [{ "year": 2024, "target_value": target }],
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
        resp.data()["id"].as_str().expect("indicator id").to_string()
    }

    pub async fn create_data(&self, indicator_id: &str, period: &str, actual: f64) -> Value {
        let resp = self
            .post(
                "/api/v1/performance-data",
                serde_json::json!({
                    "indicator_id": indicator_id,
                    "year": 2024,
                    "period": period,
                    "actual_value": actual,
                }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
        resp.data()
    }
}
