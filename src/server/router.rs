use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::admin::admin_router;
use super::api::api_router;
use super::lookup::lookup_router;
use crate::config::ServerConfig;
use crate::evidence::EvidenceStorage;
use crate::store::Store;

/// Evidence uploads may carry several files in one request.
const MAX_FILES_PER_UPLOAD: usize = 10;
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: ServerConfig,
    pub evidence: EvidenceStorage,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: ServerConfig) -> Self {
        let evidence = EvidenceStorage::new(&config.data_dir);
        Self {
            store,
            config,
            evidence,
        }
    }

    fn body_limit(&self) -> usize {
        let evidence = self
            .config
            .max_evidence_bytes
            .saturating_mul(MAX_FILES_PER_UPLOAD);
        evidence
            .max(self.config.max_import_bytes)
            .saturating_add(MULTIPART_OVERHEAD)
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        response.status().as_u16(),
        start.elapsed().as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.body_limit();

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", api_router())
        .nest("/sakip/api", lookup_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
