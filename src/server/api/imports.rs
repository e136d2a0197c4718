use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use super::performance_data::{MODULE, csv_response};
use crate::audit::{self, AuditEvent, ClientInfo};
use crate::auth::RequireAuth;
use crate::error::Error;
use crate::import;
use crate::server::AppState;
use crate::server::dto::{ImportConfirmResponse, ImportPreviewResponse};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::FieldErrors;
use crate::types::Permission;

pub async fn download_template(auth: RequireAuth) -> impl IntoResponse {
    auth.require(Permission::DATA_WRITE)?;
    let template = import::template().api_err("Failed to render template")?;

    Ok::<_, ApiError>(csv_response(template, "performance-data-template.csv"))
}

/// Parses the uploaded CSV and stores the result as an import session.
pub async fn preview(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Permission::DATA_WRITE)?;
    let store = state.store.as_ref();
    let max_bytes = state.config.max_import_bytes;

    let mut file: Option<Vec<u8>> = None;
    let mut year_text: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), format!("Failed to read multipart: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let is_csv = field
                    .file_name()
                    .and_then(|n| n.rsplit_once('.'))
                    .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("csv"));
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(e.status(), format!("Failed to read file: {e}")))?;

                if data.len() > max_bytes {
                    return Err(ApiError::payload_too_large(format!(
                        "Import file exceeds the maximum size of {max_bytes} bytes"
                    )));
                }
                if !is_csv {
                    return Err(ApiError::invalid_field("file", "The file must be a csv file."));
                }
                file = Some(data.to_vec());
            }
            Some("year") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::new(e.status(), format!("Failed to read year: {e}")))?;
                year_text = Some(text);
            }
            _ => {}
        }
    }

    let mut errors = FieldErrors::new();
    if file.is_none() {
        errors.add("file", "The file field is required.");
    }
    let year = match errors.required("year", year_text.as_deref()) {
        Some(text) => match text.parse::<i32>() {
            Ok(year) => Some(year),
            Err(_) => {
                errors.add("year", "The year must be an integer.");
                None
            }
        },
        None => None,
    };
    errors.year("year", year);
    errors.finish()?;
    let (Some(file), Some(year)) = (file, year) else {
        return Err(ApiError::bad_request("Invalid import request"));
    };

    let preview = import::preview(store, &file, year, auth.scope()).map_err(|e| match e {
        Error::BadRequest(message) => ApiError::invalid_field("file", message),
        e => ApiError::from_store(e, "Failed to parse import file"),
    })?;

    let session = preview.into_session(&auth.user.id, year);
    store
        .create_import_session(&session)
        .api_err("Failed to save import session")?;

    tracing::info!(
        "Import preview {}: {} valid rows, {} errors",
        session.id,
        session.rows.len(),
        session.errors.len()
    );

    Ok(Json(ApiResponse::success(ImportPreviewResponse {
        session_id: session.id,
        year: session.year,
        valid_rows: session.rows.len(),
        rows: session.rows,
        errors: session.errors,
    })))
}

/// Inserts every valid row of a previewed session as a draft, all or nothing.
pub async fn confirm(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::DATA_WRITE)?;
    let store = state.store.as_ref();

    let session = store
        .get_import_session(&session_id)
        .api_err("Failed to get import session")?
        .filter(|s| s.user_id == auth.user.id)
        .or_not_found("Import session not found")?;

    if session.rows.is_empty() {
        return Err(ApiError::invalid_field(
            "file",
            "The import has no valid rows to insert.",
        ));
    }

    let records =
        import::confirm_rows(store, &session, &auth.user.id).api_err("Failed to prepare import")?;
    for record in &records {
        auth.check_institution(&record.institution_id)?;
    }

    store
        .create_performance_data_batch(&records)
        .map_err(|e| match e {
            Error::AlreadyExists => ApiError::conflict(
                "Some periods were filled in after the preview; run the preview again",
            ),
            e => ApiError::from_store(e, "Failed to import performance data"),
        })?;

    if let Err(e) = store.delete_import_session(&session.id) {
        tracing::warn!("Failed to delete import session {}: {e}", session.id);
    }

    AuditEvent::new(
        audit::IMPORT,
        MODULE,
        format!("Imported {} performance data records", records.len()),
    )
    .institution(auth.scope())
    .after(&json!({
        "session_id": session.id,
        "year": session.year,
        "imported": records.len(),
        "skipped": session.errors.len(),
    }))
    .record(store, &auth.user.id, &client);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ImportConfirmResponse {
            imported: records.len(),
        })),
    ))
}
