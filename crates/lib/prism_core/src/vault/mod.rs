//! Vault access control and storage failover.
//!
//! The metadata record in the `vault` collection is the only source of truth
//! for whether a file exists and who may read it. Bytes live in a
//! [`BlobStore`] under [`blob_key`]; a record may also carry a base64 inline
//! copy that is served when primary storage cannot answer.

pub mod mime;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::vault::{VAULT_COLLECTION, VaultFileRecord, Visibility};
use crate::storage::{BlobStore, StorageError, blob_key};
use crate::store::{DocumentStore, StoreError, fields, from_document, to_document};

/// Vault controller errors.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("File not found")]
    NotFound,

    #[error("Access denied")]
    Unauthorized,

    #[error("File content unavailable")]
    PayloadMissing,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// How retrieved bytes are meant to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    Inline,
    Download,
}

/// Which backend produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Primary,
    InlineCopy,
}

/// File bytes released to a caller.
#[derive(Debug, Clone)]
pub struct VaultPayload {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    /// `Content-Disposition` value, set only for downloads.
    pub disposition: Option<String>,
    pub source: PayloadSource,
}

/// Metadata mutation for an existing file.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub visibility: Option<Visibility>,
    /// `Some("")` clears the stored code.
    pub access_code: Option<String>,
    /// Copy the current primary bytes into the inline fallback.
    pub sync_inline_copy: bool,
}

/// Reject names that could escape the vault prefix or break headers.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VaultError::Validation("file name is empty".into()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(VaultError::Validation(
            "file name must not contain path separators".into(),
        ));
    }
    if name == "." || name == ".." {
        return Err(VaultError::Validation(format!(
            "'{name}' is not a file name"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(VaultError::Validation(
            "file name must not contain control characters".into(),
        ));
    }
    Ok(())
}

/// Stored `type` for a new upload: the extension, else the MIME subtype.
fn file_type_for(name: &str, mime: Option<&str>) -> String {
    mime::extension(name)
        .or_else(|| {
            mime.and_then(|m| m.split_once('/'))
                .map(|(_, sub)| sub.to_ascii_lowercase())
        })
        .unwrap_or_default()
}

/// Decides whether to release vault bytes and where to read them from.
#[derive(Clone)]
pub struct VaultController {
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

impl VaultController {
    pub fn new(docs: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { docs, blobs }
    }

    /// Look up a file's metadata. A blob without a record does not exist.
    pub async fn resolve(&self, name: &str) -> Result<VaultFileRecord> {
        validate_file_name(name)?;
        let doc = self
            .docs
            .get(VAULT_COLLECTION, name)
            .await?
            .ok_or(VaultError::NotFound)?;
        Ok(from_document(doc)?)
    }

    /// Check a caller-supplied code against a record.
    ///
    /// Protected files need an exact match with a non-empty stored code.
    pub fn authorize(record: &VaultFileRecord, code: Option<&str>) -> Result<()> {
        match record.visibility {
            Visibility::Public => Ok(()),
            Visibility::Protected => match (record.access_code.as_deref(), code) {
                (Some(stored), Some(given)) if !stored.is_empty() && stored == given => Ok(()),
                _ => Err(VaultError::Unauthorized),
            },
        }
    }

    /// Public retrieval: resolve, authorize, then read bytes.
    pub async fn retrieve(
        &self,
        name: &str,
        code: Option<&str>,
        mode: RetrievalMode,
    ) -> Result<VaultPayload> {
        let record = self.resolve(name).await?;
        Self::authorize(&record, code)?;
        self.load(&record, mode).await
    }

    /// Admin preview: the caller is already authenticated, so no code is
    /// checked.
    pub async fn preview(&self, name: &str) -> Result<VaultPayload> {
        let record = self.resolve(name).await?;
        self.load(&record, RetrievalMode::Inline).await
    }

    /// Verify a code without releasing bytes. The code must equal the stored
    /// one whatever the visibility; a file without a code never verifies.
    pub async fn verify_code(&self, name: &str, code: &str) -> Result<VaultFileRecord> {
        let record = self.resolve(name).await?;
        match record.access_code.as_deref() {
            Some(stored) if !stored.is_empty() && stored == code => Ok(record),
            _ => Err(VaultError::Unauthorized),
        }
    }

    /// All metadata records, ordered by name.
    pub async fn list(&self) -> Result<Vec<VaultFileRecord>> {
        let mut records = Vec::new();
        for (id, doc) in self.docs.list(VAULT_COLLECTION).await? {
            match from_document::<VaultFileRecord>(doc) {
                Ok(record) => records.push(record),
                Err(e) => warn!(file = %id, error = %e, "skipping malformed vault record"),
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Write bytes to primary storage and create or refresh the record.
    ///
    /// Overwriting keeps the existing visibility and access code and drops
    /// any inline copy, which would otherwise be stale.
    pub async fn upload(
        &self,
        name: &str,
        bytes: &[u8],
        mime: Option<&str>,
        source: Option<&str>,
    ) -> Result<VaultFileRecord> {
        validate_file_name(name)?;
        let existing = match self.docs.get(VAULT_COLLECTION, name).await? {
            Some(doc) => from_document::<VaultFileRecord>(doc).ok(),
            None => None,
        };

        self.blobs.put(&blob_key(name), bytes).await?;

        let record = VaultFileRecord {
            name: name.to_string(),
            size: bytes.len() as u64,
            file_type: file_type_for(name, mime),
            updated_at: Utc::now(),
            visibility: existing.as_ref().map(|r| r.visibility).unwrap_or_default(),
            access_code: existing.and_then(|r| r.access_code),
            content: None,
            source: source.map(str::to_string),
        };
        self.docs
            .set(VAULT_COLLECTION, name, to_document(&record)?)
            .await?;
        info!(file = name, size = record.size, "vault file uploaded");
        Ok(record)
    }

    /// Change visibility or access code, optionally refreshing the inline copy.
    pub async fn update_settings(
        &self,
        name: &str,
        update: SettingsUpdate,
    ) -> Result<VaultFileRecord> {
        let record = self.resolve(name).await?;

        let mut changes = fields([("updatedAt", Value::String(Utc::now().to_rfc3339()))]);
        if let Some(visibility) = update.visibility {
            let value = serde_json::to_value(visibility).map_err(StoreError::from)?;
            changes.insert("visibility".into(), value);
        }
        if let Some(code) = update.access_code {
            let value = if code.is_empty() {
                Value::Null
            } else {
                Value::String(code)
            };
            changes.insert("accessCode".into(), value);
        }
        if update.sync_inline_copy {
            let bytes = self.blobs.get(&blob_key(name)).await.map_err(|e| {
                warn!(file = name, error = %e, "inline sync could not read primary storage");
                match e {
                    StorageError::NotFound(_) => VaultError::PayloadMissing,
                    other => VaultError::Storage(other),
                }
            })?;
            changes.insert("content".into(), Value::String(STANDARD.encode(&bytes)));
            changes.insert("size".into(), Value::from(bytes.len() as u64));
            debug!(file = name, size = bytes.len(), "inline copy refreshed");
        }

        self.docs.update(VAULT_COLLECTION, name, changes).await?;
        info!(file = %record.name, "vault settings updated");
        self.resolve(name).await
    }

    /// Remove the blob and the record. Both are attempted; only the record
    /// deletion decides the outcome.
    pub async fn delete(&self, name: &str) -> Result<()> {
        validate_file_name(name)?;
        match self.blobs.delete(&blob_key(name)).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => debug!(file = name, "no blob to delete"),
            Err(e) => warn!(file = name, error = %e, "blob deletion failed"),
        }
        self.docs.delete(VAULT_COLLECTION, name).await?;
        info!(file = name, "vault file deleted");
        Ok(())
    }

    async fn load(&self, record: &VaultFileRecord, mode: RetrievalMode) -> Result<VaultPayload> {
        let (bytes, source) = match self.blobs.get(&blob_key(&record.name)).await {
            Ok(bytes) => (bytes, PayloadSource::Primary),
            Err(e) => {
                debug!(file = %record.name, error = %e, "primary storage miss, trying inline copy");
                (self.inline_copy(record)?, PayloadSource::InlineCopy)
            }
        };

        Ok(VaultPayload {
            name: record.name.clone(),
            bytes,
            content_type: mime::content_type_for(&record.name, &record.file_type),
            disposition: match mode {
                RetrievalMode::Inline => None,
                RetrievalMode::Download => Some(mime::attachment_disposition(&record.name)),
            },
            source,
        })
    }

    fn inline_copy(&self, record: &VaultFileRecord) -> Result<Vec<u8>> {
        let encoded = record.content.as_deref().ok_or(VaultError::PayloadMissing)?;
        STANDARD.decode(encoded).map_err(|e| {
            warn!(file = %record.name, error = %e, "inline copy is not valid base64");
            VaultError::PayloadMissing
        })
    }
}
