//! Session handoff models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding direct admin QR sessions.
pub const SESSIONS_COLLECTION: &str = "sessions";

/// Collection holding delegated shared-link sessions.
pub const SHARED_LINKS_COLLECTION: &str = "shared_links";

/// Collection holding global configuration documents.
pub const CONFIG_COLLECTION: &str = "config";

/// Id of the remote-login toggle document inside [`CONFIG_COLLECTION`].
pub const ADMIN_STATUS_ID: &str = "admin_status";

/// Record type tag written on direct admin sessions.
pub const ADMIN_AUTH_TYPE: &str = "admin_auth";

/// Action tag embedded in the QR payload.
pub const AUTHENTICATE_ADMIN_ACTION: &str = "authenticate_admin";

/// Approval status of a session record.
///
/// Direct sessions use `pending → authenticated`; shared links use
/// `active → awaiting_auth → authenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Active,
    AwaitingAuth,
    Authenticated,
}

/// Scope granted to the approver of a shared link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConstraints {
    pub user_type: String,
    pub access_type: String,
}

/// Which handshake a session record belongs to.
///
/// Both kinds share one record schema and one state-machine evaluation; the
/// kind selects the collection and whether visitor binding applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    Direct,
    Shared { constraints: Option<AccessConstraints> },
}

impl SessionKind {
    /// Plain shared kind with constraints not yet known.
    pub fn shared() -> Self {
        SessionKind::Shared { constraints: None }
    }

    /// Rebuild a kind from the persisted "is shared" flag.
    pub fn from_shared_flag(shared: bool) -> Self {
        if shared {
            Self::shared()
        } else {
            SessionKind::Direct
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, SessionKind::Shared { .. })
    }

    /// Collection the kind's records live in.
    pub fn collection(&self) -> &'static str {
        match self {
            SessionKind::Direct => SESSIONS_COLLECTION,
            SessionKind::Shared { .. } => SHARED_LINKS_COLLECTION,
        }
    }

    /// Whether authentication is exclusive to the bound visitor.
    pub fn enforces_binding(&self) -> bool {
        self.is_shared()
    }
}

/// One authentication handshake attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Document key; also embedded in the QR payload. Not stored in the body.
    #[serde(skip)]
    pub id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Whether `expires_at` is set and has elapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Constraint fields, if the record carries a user type.
    pub fn constraints(&self) -> Option<AccessConstraints> {
        self.user_type.as_ref().map(|user_type| AccessConstraints {
            user_type: user_type.clone(),
            access_type: self.access_type.clone().unwrap_or_default(),
        })
    }
}

/// The `config/admin_status` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    pub remote_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

/// Payload rendered as the scannable QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    #[serde(rename = "qrId")]
    pub id: String,
    pub action: String,
}

impl QrPayload {
    pub fn authenticate_admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: AUTHENTICATE_ADMIN_ACTION.to_string(),
        }
    }

    /// JSON text encoded into the QR image.
    pub fn encode(&self) -> String {
        serde_json::json!({ "qrId": self.id, "action": self.action }).to_string()
    }

    /// Parse scanned QR text.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
