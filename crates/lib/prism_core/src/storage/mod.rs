//! Primary blob storage for vault files.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

/// Fixed prefix of every vault blob key.
pub const VAULT_PREFIX: &str = "vault/";

/// Deterministic blob key for a vault filename.
pub fn blob_key(file_name: &str) -> String {
    format!("{VAULT_PREFIX}{file_name}")
}

/// Blob storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for blob storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Key/value byte storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove a blob. Fails with [`StorageError::NotFound`] when absent.
    async fn delete(&self, key: &str) -> Result<()>;
}
