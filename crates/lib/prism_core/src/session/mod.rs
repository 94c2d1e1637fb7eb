//! Remote-approval session protocol.
//!
//! A requesting client writes a session record, an approving device flips its
//! status, and the requester's subscription observes the change. Direct admin
//! sessions and delegated shared links run through the same [`evaluate`]
//! function; [`SessionKind`] selects the collection and whether visitor
//! binding is enforced.
//!
//! Expiry is checked whenever a snapshot is observed. There is no background
//! timer, so a session whose `expiresAt` has passed stays apparently valid
//! until the next read or push reaches the client.

pub mod approver;
pub mod console;
pub mod context;
pub mod shared_link;
pub mod store;

use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use thiserror::Error;

use crate::models::session::{AccessConstraints, SessionKind, SessionRecord, SessionStatus};
use crate::store::StoreError;

pub use approver::Approver;
pub use console::{AdminConsole, ConsoleState, ConsoleView};
pub use context::{ContextBackend, FileBackend, MemoryBackend, PersistedSession, SessionContext};
pub use shared_link::{LinkState, SharedLinkVisitor};
pub use store::SessionStore;

/// Session protocol errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid QR payload: {0}")]
    InvalidPayload(String),

    #[error("No live subscriptions")]
    Detached,

    #[error("Context persistence failed: {0}")]
    Context(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Mint a session id: 24 random bytes, URL-safe base64 (192 bits).
pub fn mint_session_id() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Mint a per-client visitor id (UUID v4).
pub fn mint_visitor_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Outcome of observing one session snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The record does not exist (never created, or deleted).
    Missing,
    /// The record exists but is not approved yet, or no longer approved.
    Waiting(SessionStatus),
    /// Approved and usable by this observer.
    Approved {
        expires_at: Option<DateTime<Utc>>,
        constraints: Option<AccessConstraints>,
    },
    /// Approved, but `expiresAt` has elapsed.
    Expired,
    /// Approved for a different visitor.
    Denied,
}

/// Evaluate a session snapshot for one observer.
///
/// `visitor_id` is the observer's binding; it is checked only when the kind
/// enforces binding and an id is supplied. Expiry is judged against `now`.
pub fn evaluate(
    kind: &SessionKind,
    record: Option<&SessionRecord>,
    visitor_id: Option<&str>,
    now: DateTime<Utc>,
) -> Verdict {
    let Some(record) = record else {
        return Verdict::Missing;
    };

    if record.status != SessionStatus::Authenticated {
        return Verdict::Waiting(record.status);
    }

    if record.is_expired_at(now) {
        return Verdict::Expired;
    }

    if kind.enforces_binding() {
        if let Some(visitor) = visitor_id {
            if record.visitor_id.as_deref() != Some(visitor) {
                return Verdict::Denied;
            }
        }
    }

    Verdict::Approved {
        expires_at: record.expires_at,
        constraints: record.constraints(),
    }
}
