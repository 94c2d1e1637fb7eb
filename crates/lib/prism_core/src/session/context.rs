//! Client-side session context.
//!
//! Owns the locally cached admin session id, the "shared session" flag, and the
//! tab-scoped visitor id. The id and flag are persisted through a
//! [`ContextBackend`]; the visitor id lives only as long as the context.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Result, SessionError, mint_visitor_id};
use crate::models::session::SessionKind;

/// The persisted part of the context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub shared: bool,
}

/// Where the persisted context is kept between runs.
#[async_trait]
pub trait ContextBackend: Send + Sync {
    async fn load(&self) -> Result<PersistedSession>;
    async fn save(&self, state: &PersistedSession) -> Result<()>;
}

/// Process-local backend.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<PersistedSession>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextBackend for MemoryBackend {
    async fn load(&self) -> Result<PersistedSession> {
        let state = self
            .state
            .lock()
            .map_err(|_| SessionError::Context("context lock poisoned".into()))?;
        Ok(state.clone())
    }

    async fn save(&self, state: &PersistedSession) -> Result<()> {
        let mut current = self
            .state
            .lock()
            .map_err(|_| SessionError::Context("context lock poisoned".into()))?;
        *current = state.clone();
        Ok(())
    }
}

/// JSON file backend. A missing file loads as an empty context.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContextBackend for FileBackend {
    async fn load(&self) -> Result<PersistedSession> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| SessionError::Context(format!("parse {}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedSession::default()),
            Err(e) => Err(SessionError::Context(format!(
                "read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, state: &PersistedSession) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| SessionError::Context(format!("encode context: {e}")))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::Context(format!("create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| SessionError::Context(format!("write {}: {e}", self.path.display())))
    }
}

/// Single owner of the client-side session cache.
///
/// Mutation is reserved to the session state machines in this module.
pub struct SessionContext {
    backend: Arc<dyn ContextBackend>,
    persisted: PersistedSession,
    visitor_id: Option<String>,
}

impl SessionContext {
    /// Initialise from persisted storage.
    pub async fn load(backend: Arc<dyn ContextBackend>) -> Result<Self> {
        let persisted = backend.load().await?;
        Ok(Self {
            backend,
            persisted,
            visitor_id: None,
        })
    }

    /// Cached admin session id, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.persisted.session_id.as_deref()
    }

    /// Kind of the cached session, if any.
    pub fn session_kind(&self) -> Option<SessionKind> {
        self.persisted
            .session_id
            .as_ref()
            .map(|_| SessionKind::from_shared_flag(self.persisted.shared))
    }

    /// This client's visitor id, minted on first use.
    pub fn visitor_id(&mut self) -> &str {
        self.visitor_id.get_or_insert_with(mint_visitor_id)
    }

    /// Record `id` as the active admin session.
    pub(crate) async fn promote(&mut self, id: &str, kind: &SessionKind) -> Result<()> {
        let next = PersistedSession {
            session_id: Some(id.to_string()),
            shared: kind.is_shared(),
        };
        self.backend.save(&next).await?;
        self.persisted = next;
        debug!(session_id = %id, shared = kind.is_shared(), "session context promoted");
        Ok(())
    }

    /// Forget the active admin session. The visitor id is kept.
    pub(crate) async fn clear(&mut self) -> Result<()> {
        self.persisted = PersistedSession::default();
        self.backend.save(&self.persisted).await
    }
}
