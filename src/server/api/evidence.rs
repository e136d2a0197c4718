use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::access;
use super::performance_data::MODULE;
use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::RequireAuth;
use crate::domain::lifecycle::DATA_UPDATE;
use crate::evidence::{EvidenceStorageError, detect_content_type};
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::MAX_TEXT_LEN;
use crate::settings;
use crate::types::{EvidenceDocument, PerformanceData, Permission};

const DEFAULT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "jpg", "jpeg", "png"];

struct Upload {
    file_name: String,
    content_type: &'static str,
    data: Vec<u8>,
}

fn ensure_editable(data: &PerformanceData) -> Result<(), ApiError> {
    if DATA_UPDATE.allows(data.status) {
        Ok(())
    } else {
        Err(ApiError::conflict(format!(
            "cannot change evidence of a record in status '{}'",
            data.status
        )))
    }
}

/// Keeps only the final path segment of a client-supplied file name.
fn clean_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Removes files written for an upload that did not complete.
async fn discard_files(state: &AppState, documents: &[EvidenceDocument]) {
    for document in documents {
        if let Err(e) = state.evidence.delete(&document.stored_path).await {
            tracing::warn!("Failed to remove orphaned evidence file: {e}");
        }
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::new(e.status(), format!("Failed to read multipart: {e}"))
}

pub async fn list_evidence(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let data = access::performance_data(&auth, store, &id, Permission::DATA_READ)?;
    let documents = store
        .list_evidence(&data.id)
        .api_err("Failed to list evidence")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(documents)))
}

pub async fn upload_evidence(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.as_ref();
    let data = access::performance_data(&auth, store, &id, Permission::DATA_WRITE)?;
    ensure_editable(&data)?;

    let max_bytes = settings::get_i64(
        store,
        settings::MAX_EVIDENCE_BYTES,
        state.config.max_evidence_bytes as i64,
    )
    .clamp(0, state.config.max_evidence_bytes as i64) as usize;
    let allowed = settings::get_string_list(store, settings::ALLOWED_EXTENSIONS, DEFAULT_EXTENSIONS);

    let mut uploads = Vec::new();
    let mut description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("files") | Some("files[]") | Some("file") => {
                let file_name = clean_file_name(field.file_name().unwrap_or_default());
                let bytes = field.bytes().await.map_err(multipart_error)?;

                if file_name.is_empty() {
                    return Err(ApiError::invalid_field("files", "Each file needs a name."));
                }
                if bytes.len() > max_bytes {
                    return Err(ApiError::payload_too_large(format!(
                        "{file_name} exceeds the maximum size of {max_bytes} bytes"
                    )));
                }

                let content_type =
                    detect_content_type(&file_name, &bytes, &allowed).map_err(|e| {
                        ApiError::invalid_field("files", format!("{file_name}: {e}"))
                    })?;

                uploads.push(Upload {
                    file_name,
                    content_type,
                    data: bytes.to_vec(),
                });
            }
            Some("description") => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                if text.chars().count() > MAX_TEXT_LEN {
                    return Err(ApiError::invalid_field(
                        "description",
                        format!("The description may not be greater than {MAX_TEXT_LEN} characters."),
                    ));
                }
                if !text.is_empty() {
                    description = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    if uploads.is_empty() {
        return Err(ApiError::invalid_field("files", "The files field is required."));
    }

    let mut documents = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let stored = match state.evidence.put(&data.id, &upload.data).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!("Failed to store evidence for {}: {e}", data.id);
                discard_files(&state, &documents).await;
                return Err(ApiError::internal("Failed to store evidence file"));
            }
        };

        documents.push(EvidenceDocument {
            id: Uuid::new_v4().to_string(),
            performance_data_id: data.id.clone(),
            file_name: upload.file_name,
            stored_path: stored.stored_path,
            content_type: upload.content_type.to_string(),
            file_size: stored.size,
            checksum: stored.checksum,
            description: description.clone(),
            uploaded_by: auth.user.id.clone(),
            created_at: Utc::now(),
        });
    }

    if let Err(e) = store.create_evidence(&documents) {
        discard_files(&state, &documents).await;
        return Err(ApiError::from_store(e, "Failed to save evidence"));
    }

    AuditEvent::new(
        audit::UPLOAD,
        MODULE,
        format!(
            "Uploaded {} evidence file(s) for {} {}",
            documents.len(),
            data.period,
            data.year
        ),
    )
    .institution(Some(&data.institution_id))
    .after(&documents)
    .record(store, &auth.user.id, &client);

    Ok((StatusCode::CREATED, Json(ApiResponse::success(documents))))
}

fn load_document(
    auth: &RequireAuth,
    state: &AppState,
    id: &str,
    required: Permission,
) -> Result<(EvidenceDocument, PerformanceData), ApiError> {
    let store = state.store.as_ref();
    let document = store
        .get_evidence(id)
        .api_err("Failed to get evidence")?
        .or_not_found("Evidence not found")?;
    let data = access::performance_data(auth, store, &document.performance_data_id, required)?;
    Ok((document, data))
}

pub async fn download_evidence(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (document, _) = load_document(&auth, &state, &id, Permission::DATA_READ)?;

    let (reader, size) = state
        .evidence
        .get(&document.stored_path)
        .await
        .map_err(|e| match e {
            EvidenceStorageError::NotFound => ApiError::not_found("Evidence file is missing"),
            e => {
                tracing::error!("Failed to open evidence {}: {e}", document.id);
                ApiError::internal("Failed to read evidence file")
            }
        })?;

    let body = Body::from_stream(ReaderStream::new(reader));
    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.file_name.replace(['"', '\\'], "_")
    );

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, document.content_type.as_str())
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header("X-Content-Type-Options", "nosniff")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

pub async fn delete_evidence(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let store = state.store.as_ref();
    let (document, data) = load_document(&auth, &state, &id, Permission::DATA_WRITE)?;
    ensure_editable(&data)?;

    store
        .delete_evidence(&document.id)
        .api_err("Failed to delete evidence")?;

    if let Err(e) = state.evidence.delete(&document.stored_path).await {
        tracing::warn!("Failed to remove evidence file {}: {e}", document.stored_path);
    }

    AuditEvent::new(
        audit::DELETE,
        "evidence",
        format!("Deleted evidence {}", document.file_name),
    )
    .institution(Some(&data.institution_id))
    .before(&document)
    .record(store, &auth.user.id, &client);

    Ok(StatusCode::NO_CONTENT)
}
