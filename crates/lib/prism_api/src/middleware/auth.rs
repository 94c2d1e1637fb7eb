//! Session middleware: `Authorization: Bearer <session id>`.
//!
//! The bearer value is a session id minted by the QR handoff or a shared
//! link. It is accepted while the record it names is authenticated and not
//! expired, judged at request time. Shared-link sessions also need the
//! `X-Visitor-Id` of the browser the link is bound to.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use prism_core::models::session::SessionKind;
use prism_core::session::{Verdict, evaluate};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// Header carrying a shared-link visitor's id.
pub const VISITOR_HEADER: &str = "x-visitor-id";

/// The session that authorized a request, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub session_id: String,
    pub kind: SessionKind,
}

/// Axum middleware: resolves the bearer session in `sessions`, then
/// `shared_links`, and injects [`AdminSession`] into request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let session_id = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?
        .to_string();

    let visitor_id = request
        .headers()
        .get(VISITOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let now = Utc::now();
    for kind in [SessionKind::Direct, SessionKind::shared()] {
        let record = state.sessions.fetch(&kind, &session_id).await?;
        if record.is_none() {
            continue;
        }
        // A shared link's id travels in the URL; the bound visitor must
        // present itself too.
        let visitor = match (&kind, visitor_id.as_deref()) {
            (SessionKind::Shared { .. }, None) => {
                debug!("shared-link session without visitor id");
                return Err(AppError::Unauthorized("Missing visitor id".into()));
            }
            (_, visitor) => visitor,
        };
        match evaluate(&kind, record.as_ref(), visitor, now) {
            Verdict::Approved { .. } => {
                request
                    .extensions_mut()
                    .insert(AdminSession { session_id, kind });
                return Ok(next.run(request).await);
            }
            verdict => {
                debug!(?verdict, "bearer session rejected");
                return Err(AppError::Unauthorized("Invalid or expired session".into()));
            }
        }
    }

    Err(AppError::Unauthorized("Invalid or expired session".into()))
}
