//! Vault file metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding one metadata record per vault file, keyed by filename.
pub const VAULT_COLLECTION: &str = "vault";

/// Who may retrieve a file's bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
}

/// Metadata record for a vault file. Its presence is what makes a file exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultFileRecord {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, rename = "type")]
    pub file_type: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
    /// Base64 copy of the bytes, used when primary storage cannot serve them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl VaultFileRecord {
    /// Whether a non-empty access code is stored, regardless of visibility.
    pub fn has_access_code(&self) -> bool {
        self.access_code.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Whether an inline fallback copy is present.
    pub fn has_inline_copy(&self) -> bool {
        self.content.is_some()
    }
}
