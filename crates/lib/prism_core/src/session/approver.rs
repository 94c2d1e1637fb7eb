//! Approving-device operations.
//!
//! The approver is the trusted device that arms remote login, scans QR
//! challenges, grants or revokes sessions, and mints shared links.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use super::{Result, SessionError, SessionStore};
use crate::models::session::{
    AUTHENTICATE_ADMIN_ACTION, AccessConstraints, QrPayload, SessionKind, SessionRecord,
};
use crate::store::DocumentStore;

pub struct Approver {
    sessions: SessionStore,
}

impl Approver {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            sessions: SessionStore::new(docs),
        }
    }

    /// Arm or disarm QR login on the admin console.
    pub async fn arm_remote_login(&self, enabled: bool) -> Result<()> {
        self.sessions.set_remote_enabled(enabled).await?;
        info!(enabled, "remote login toggled");
        Ok(())
    }

    /// Approve the session named by scanned QR text.
    pub async fn approve_scan(&self, scanned: &str, ttl: Duration) -> Result<SessionRecord> {
        let payload =
            QrPayload::parse(scanned).map_err(|e| SessionError::InvalidPayload(e.to_string()))?;
        if payload.action != AUTHENTICATE_ADMIN_ACTION {
            return Err(SessionError::InvalidPayload(format!(
                "unexpected action '{}'",
                payload.action
            )));
        }
        self.approve(&SessionKind::Direct, &payload.id, ttl).await
    }

    /// Grant a session for `ttl` from now.
    pub async fn approve(
        &self,
        kind: &SessionKind,
        id: &str,
        ttl: Duration,
    ) -> Result<SessionRecord> {
        let expires_at = Utc::now() + ttl;
        self.sessions.approve(kind, id, expires_at).await?;
        info!(session_id = %id, shared = kind.is_shared(), %expires_at, "session approved");
        self.sessions
            .fetch(kind, id)
            .await?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Move the expiry of a live session.
    pub async fn extend(
        &self,
        kind: &SessionKind,
        id: &str,
        expires_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        self.sessions.set_expiry(kind, id, expires_at).await
    }

    /// Kill a session remotely.
    pub async fn revoke(&self, kind: &SessionKind, id: &str) -> Result<()> {
        self.sessions.delete(kind, id).await?;
        info!(session_id = %id, "session revoked");
        Ok(())
    }

    /// Mint a shared link for delegated access.
    pub async fn create_shared_link(
        &self,
        constraints: Option<AccessConstraints>,
    ) -> Result<SessionRecord> {
        self.sessions.create_shared_link(constraints).await
    }
}
