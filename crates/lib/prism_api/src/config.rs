//! API server configuration.

use std::path::PathBuf;

use url::Url;

/// Default upload ceiling: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// Root directory of the filesystem blob store.
    pub vault_dir: PathBuf,
    /// Origin used to build public share links.
    pub public_base_url: String,
    /// Largest accepted request body for uploads.
    pub max_upload_bytes: usize,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable           | Default                   |
    /// |--------------------|---------------------------|
    /// | `BIND_ADDR`        | `127.0.0.1:3100`          |
    /// | `VAULT_DIR`        | `./data/vault`            |
    /// | `PUBLIC_BASE_URL`  | `http://localhost:3100`   |
    /// | `MAX_UPLOAD_BYTES` | `52428800`                |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            vault_dir: std::env::var("VAULT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/vault")),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3100".into()),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }

    /// Public viewer link for a vault file: `{public_base_url}/v/{name}`.
    pub fn share_url(&self, file_name: &str) -> String {
        match Url::parse(&self.public_base_url) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push("v").push(file_name);
                }
                url.to_string()
            }
            Err(_) => format!(
                "{}/v/{}",
                self.public_base_url.trim_end_matches('/'),
                file_name
            ),
        }
    }
}

/// Admin preview link for a vault file.
pub fn preview_url(file_name: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("file", file_name)
        .append_pair("action", "preview")
        .finish();
    format!("/vault?{query}")
}
