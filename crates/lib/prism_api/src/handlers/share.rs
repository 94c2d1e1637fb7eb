//! Public share handlers. No session required; protected files need the
//! access code.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use prism_core::vault::RetrievalMode;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::handlers::vault::payload_response;
use crate::models::{
    ShareMetadataResponse, ShareQuery, SharedFileInfo, SuccessResponse, VerifyCodeRequest,
};

/// `GET /vault/share?file=X&action=download|raw&code=`: bytes for
/// `download` (attachment) and `raw` (inline); metadata otherwise.
pub async fn get_share_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ShareQuery>,
) -> AppResult<Response> {
    let file = query
        .file
        .ok_or_else(|| AppError::Validation("Missing 'file' parameter".into()))?;

    let mode = match query.action.as_deref() {
        Some("download") => Some(RetrievalMode::Download),
        Some("raw") => Some(RetrievalMode::Inline),
        _ => None,
    };

    match mode {
        Some(mode) => {
            let payload = state
                .vault
                .retrieve(&file, query.code.as_deref(), mode)
                .await?;
            payload_response(payload)
        }
        None => {
            let record = state.vault.resolve(&file).await?;
            Ok(Json(ShareMetadataResponse {
                success: true,
                file: SharedFileInfo::from_record(&record),
            })
            .into_response())
        }
    }
}

/// `POST /vault/share`: check an access code without releasing bytes.
/// Both `filename` and `accessCode` must be present and non-empty.
pub async fn verify_share_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<VerifyCodeRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let (Some(filename), Some(code)) = (
        body.filename.filter(|f| !f.is_empty()),
        body.access_code.filter(|c| !c.is_empty()),
    ) else {
        return Err(AppError::Validation("Missing security credentials".into()));
    };
    state.vault.verify_code(&filename, &code).await?;
    Ok(Json(SuccessResponse { success: true }))
}
