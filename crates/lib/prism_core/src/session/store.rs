//! Typed access to session records and the remote-login toggle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{Result, SessionError, mint_session_id};
use crate::models::session::{
    ADMIN_AUTH_TYPE, ADMIN_STATUS_ID, AccessConstraints, AdminStatus, CONFIG_COLLECTION,
    SHARED_LINKS_COLLECTION, SessionKind, SessionRecord, SessionStatus,
};
use crate::store::{
    Document, DocumentStore, StoreError, Subscription, fields, from_document, to_document,
};

/// Session records over a [`DocumentStore`].
#[derive(Clone)]
pub struct SessionStore {
    docs: Arc<dyn DocumentStore>,
}

impl SessionStore {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    /// Write a fresh pending direct session under a newly minted id.
    pub async fn create_pending(&self) -> Result<SessionRecord> {
        let record = SessionRecord {
            id: mint_session_id(),
            status: SessionStatus::Pending,
            created_at: Utc::now(),
            expires_at: None,
            record_type: Some(ADMIN_AUTH_TYPE.to_string()),
            user_type: None,
            access_type: None,
            visitor_id: None,
            requested_at: None,
        };
        self.put(&SessionKind::Direct, &record).await?;
        debug!(session_id = %record.id, "pending session created");
        Ok(record)
    }

    /// Write a fresh `active` shared link, optionally scoped by constraints.
    pub async fn create_shared_link(
        &self,
        constraints: Option<AccessConstraints>,
    ) -> Result<SessionRecord> {
        let (user_type, access_type) = match constraints {
            Some(c) => (Some(c.user_type), Some(c.access_type)),
            None => (None, None),
        };
        let record = SessionRecord {
            id: mint_session_id(),
            status: SessionStatus::Active,
            created_at: Utc::now(),
            expires_at: None,
            record_type: None,
            user_type,
            access_type,
            visitor_id: None,
            requested_at: None,
        };
        self.put(&SessionKind::shared(), &record).await?;
        debug!(link_id = %record.id, "shared link created");
        Ok(record)
    }

    async fn put(&self, kind: &SessionKind, record: &SessionRecord) -> Result<()> {
        let doc = to_document(record)?;
        self.docs.set(kind.collection(), &record.id, doc).await?;
        Ok(())
    }

    /// Read one session record.
    pub async fn fetch(&self, kind: &SessionKind, id: &str) -> Result<Option<SessionRecord>> {
        let snapshot = self.docs.get(kind.collection(), id).await?;
        Ok(decode(id, snapshot))
    }

    /// Subscribe to one session record.
    pub async fn watch(&self, kind: &SessionKind, id: &str) -> Result<SessionWatch> {
        let inner = self.docs.subscribe(kind.collection(), id).await?;
        Ok(SessionWatch {
            id: id.to_string(),
            inner,
        })
    }

    /// Mark a shared link as requested by `visitor_id`.
    ///
    /// This is the binding point. Concurrent requests are last-write-wins.
    pub async fn request_access(&self, link_id: &str, visitor_id: &str) -> Result<()> {
        let update = fields([
            ("status", json!(SessionStatus::AwaitingAuth)),
            ("requestedAt", json!(Utc::now())),
            ("visitorId", json!(visitor_id)),
        ]);
        self.docs
            .update(SHARED_LINKS_COLLECTION, link_id, update)
            .await
            .map_err(|e| not_found_as_session(e, link_id))
    }

    /// Flip a record to `authenticated` with the given expiry.
    pub async fn approve(
        &self,
        kind: &SessionKind,
        id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let update = fields([
            ("status", json!(SessionStatus::Authenticated)),
            ("expiresAt", json!(expires_at)),
        ]);
        self.docs
            .update(kind.collection(), id, update)
            .await
            .map_err(|e| not_found_as_session(e, id))
    }

    /// Move an existing record's expiry.
    pub async fn set_expiry(
        &self,
        kind: &SessionKind,
        id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.docs
            .update(kind.collection(), id, fields([("expiresAt", json!(expires_at))]))
            .await
            .map_err(|e| not_found_as_session(e, id))
    }

    /// Delete a record. Absent records are not an error.
    pub async fn delete(&self, kind: &SessionKind, id: &str) -> Result<()> {
        self.docs.delete(kind.collection(), id).await?;
        Ok(())
    }

    /// Current value of the remote-login toggle. Missing means disabled.
    pub async fn remote_enabled(&self) -> Result<bool> {
        let snapshot = self.docs.get(CONFIG_COLLECTION, ADMIN_STATUS_ID).await?;
        Ok(decode_status(snapshot))
    }

    /// Arm or disarm QR login.
    pub async fn set_remote_enabled(&self, enabled: bool) -> Result<()> {
        let status = AdminStatus {
            remote_enabled: enabled,
            updated_at: Utc::now(),
        };
        self.docs
            .set(CONFIG_COLLECTION, ADMIN_STATUS_ID, to_document(&status)?)
            .await?;
        debug!(enabled, "remote login toggle written");
        Ok(())
    }

    /// Subscribe to the remote-login toggle.
    pub async fn watch_remote_toggle(&self) -> Result<ToggleWatch> {
        let inner = self.docs.subscribe(CONFIG_COLLECTION, ADMIN_STATUS_ID).await?;
        Ok(ToggleWatch { inner })
    }
}

/// Live view of one session record.
pub struct SessionWatch {
    id: String,
    inner: Subscription,
}

impl SessionWatch {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next snapshot; `None` once the store is gone.
    ///
    /// An undecodable record is reported as absent.
    pub async fn next(&mut self) -> Option<Option<SessionRecord>> {
        let snapshot = self.inner.next().await?;
        Some(decode(&self.id, snapshot))
    }
}

/// Live view of the remote-login toggle.
pub struct ToggleWatch {
    inner: Subscription,
}

impl ToggleWatch {
    /// Next toggle value; `None` once the store is gone.
    pub async fn next(&mut self) -> Option<bool> {
        let snapshot = self.inner.next().await?;
        Some(decode_status(snapshot))
    }
}

fn decode(id: &str, snapshot: Option<Document>) -> Option<SessionRecord> {
    let doc = snapshot?;
    match from_document::<SessionRecord>(doc) {
        Ok(mut record) => {
            record.id = id.to_string();
            Some(record)
        }
        Err(e) => {
            warn!(session_id = %id, "undecodable session record: {e}");
            None
        }
    }
}

fn decode_status(snapshot: Option<Document>) -> bool {
    snapshot
        .and_then(|doc| doc.get("remoteEnabled").and_then(Value::as_bool))
        .unwrap_or(false)
}

fn not_found_as_session(e: StoreError, id: &str) -> SessionError {
    match e {
        StoreError::NotFound { .. } => SessionError::NotFound(id.to_string()),
        other => SessionError::Store(other),
    }
}
