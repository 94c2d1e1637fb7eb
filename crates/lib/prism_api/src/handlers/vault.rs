//! Admin vault handlers. Every route here sits behind `require_session`.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, HeaderValue};
use axum::response::{IntoResponse, Response};
use prism_core::vault::{SettingsUpdate, VaultPayload};
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::auth::AdminSession;
use crate::models::{
    SuccessResponse, UpdateVaultRequest, VaultFileResponse, VaultListItem, VaultListResponse,
    VaultQuery,
};

/// Upload provenance recorded on files posted through this API.
const UPLOAD_SOURCE: &str = "upload";

/// Turn released bytes into a response with content headers.
pub(crate) fn payload_response(payload: VaultPayload) -> AppResult<Response> {
    let mut response = payload.bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(payload.content_type));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("private, no-store"));
    if let Some(disposition) = payload.disposition {
        let value = HeaderValue::from_str(&disposition)
            .map_err(|e| AppError::Internal(format!("bad disposition header: {e}")))?;
        headers.insert(CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// `GET /vault`: list files, or `?file=X&action=preview` to stream one inline.
pub async fn get_vault_handler(
    State(state): State<AppState>,
    axum::Extension(session): axum::Extension<AdminSession>,
    ApiQuery(query): ApiQuery<VaultQuery>,
) -> AppResult<Response> {
    if let Some(file) = query.file {
        match query.action.as_deref() {
            None | Some("preview") => {}
            Some(other) => {
                return Err(AppError::Validation(format!("Unknown action '{other}'")));
            }
        }
        debug!(session_id = %session.session_id, file = %file, "vault preview");
        let payload = state.vault.preview(&file).await?;
        return payload_response(payload);
    }

    let files = state
        .vault
        .list()
        .await?
        .iter()
        .map(|r| VaultListItem::from_record(r, &state.config))
        .collect();
    Ok(Json(VaultListResponse {
        success: true,
        files,
    })
    .into_response())
}

/// `POST /vault`: multipart upload; the `file` field carries the bytes.
pub async fn upload_vault_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<VaultFileResponse>> {
    let mut multipart = multipart?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("File field has no filename".into()))?;
        let mime = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;

        let record = state
            .vault
            .upload(&name, &bytes, mime.as_deref(), Some(UPLOAD_SOURCE))
            .await?;
        return Ok(Json(VaultFileResponse {
            success: true,
            file: VaultListItem::from_record(&record, &state.config),
        }));
    }

    Err(AppError::Validation("No file provided".into()))
}

/// `PATCH /vault`: change visibility/access code, optionally sync the
/// inline fallback copy.
pub async fn update_vault_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UpdateVaultRequest>,
) -> AppResult<Json<VaultFileResponse>> {
    let record = state
        .vault
        .update_settings(
            &body.file_name,
            SettingsUpdate {
                visibility: body.visibility,
                access_code: body.access_code,
                sync_inline_copy: body.sync_to_db,
            },
        )
        .await?;
    Ok(Json(VaultFileResponse {
        success: true,
        file: VaultListItem::from_record(&record, &state.config),
    }))
}

/// `DELETE /vault?file=X`: remove blob and metadata.
pub async fn delete_vault_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<VaultQuery>,
) -> AppResult<Json<SuccessResponse>> {
    let file = query
        .file
        .ok_or_else(|| AppError::Validation("Missing 'file' parameter".into()))?;
    state.vault.delete(&file).await?;
    Ok(Json(SuccessResponse { success: true }))
}
