//! Request and response bodies.

use prism_core::models::vault::{VaultFileRecord, Visibility};
use serde::{Deserialize, Serialize};

use crate::config::{ApiConfig, preview_url};

/// Error envelope returned for every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Where a file's bytes can currently be served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageStatus {
    /// An inline copy exists in the metadata record.
    Db,
    /// Primary storage only.
    Local,
}

impl StorageStatus {
    pub fn of(record: &VaultFileRecord) -> Self {
        if record.has_inline_copy() {
            StorageStatus::Db
        } else {
            StorageStatus::Local
        }
    }
}

/// One row of `GET /vault`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultListItem {
    pub name: String,
    pub size: u64,
    pub updated_at: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub url: String,
    pub share_url: String,
    pub status: StorageStatus,
    pub visibility: Visibility,
    pub has_access_code: bool,
}

impl VaultListItem {
    pub fn from_record(record: &VaultFileRecord, config: &ApiConfig) -> Self {
        Self {
            name: record.name.clone(),
            size: record.size,
            updated_at: record.updated_at.to_rfc3339(),
            file_type: record.file_type.clone(),
            url: preview_url(&record.name),
            share_url: config.share_url(&record.name),
            status: StorageStatus::of(record),
            visibility: record.visibility,
            has_access_code: record.has_access_code(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VaultListResponse {
    pub success: bool,
    pub files: Vec<VaultListItem>,
}

/// Response of upload and settings changes.
#[derive(Debug, Serialize, Deserialize)]
pub struct VaultFileResponse {
    pub success: bool,
    pub file: VaultListItem,
}

/// `PATCH /vault` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVaultRequest {
    pub file_name: String,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub access_code: Option<String>,
    #[serde(default, rename = "syncToDB")]
    pub sync_to_db: bool,
}

/// `?file=&action=` query on the admin route.
#[derive(Debug, Deserialize)]
pub struct VaultQuery {
    pub file: Option<String>,
    pub action: Option<String>,
}

/// `?file=&action=&code=` query on the public share route.
#[derive(Debug, Deserialize)]
pub struct ShareQuery {
    pub file: Option<String>,
    pub action: Option<String>,
    pub code: Option<String>,
}

/// Public metadata for a shared file. Never carries the code or bytes.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFileInfo {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub file_type: String,
    pub updated_at: String,
    pub visibility: Visibility,
    pub has_access_code: bool,
    pub status: StorageStatus,
}

impl SharedFileInfo {
    pub fn from_record(record: &VaultFileRecord) -> Self {
        Self {
            name: record.name.clone(),
            size: record.size,
            file_type: record.file_type.clone(),
            updated_at: record.updated_at.to_rfc3339(),
            visibility: record.visibility,
            has_access_code: record.has_access_code(),
            status: StorageStatus::of(record),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareMetadataResponse {
    pub success: bool,
    pub file: SharedFileInfo,
}

/// `POST /vault/share` body. Both fields are required; they are optional
/// here so a missing one is reported by the handler.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub access_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub version: String,
}
