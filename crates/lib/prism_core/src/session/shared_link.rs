//! Shared-link visitor state machine.
//!
//! ```text
//! Loading ─┬─> NotFound | Expired            (terminal)
//!          └─> Active ─> AwaitingAuth ─┬─> Authenticated
//!                                      └─> AccessDenied
//! ```
//!
//! A link authenticates only the visitor whose id was written when access was
//! requested. Any other client observing the approved link is denied.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use super::store::SessionWatch;
use super::{Result, SessionContext, SessionStore, Verdict, evaluate};
use crate::models::session::{SessionKind, SessionRecord, SessionStatus};
use crate::store::DocumentStore;

/// Pause between a granted link and handing over to the admin console.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Loading,
    NotFound,
    Expired,
    Active,
    AwaitingAuth,
    Authenticated,
    AccessDenied,
}

impl LinkState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LinkState::NotFound | LinkState::Expired | LinkState::Authenticated
        )
    }
}

/// Drives one visitor through one shared link.
pub struct SharedLinkVisitor {
    sessions: SessionStore,
    context: SessionContext,
    link_id: String,
    state: LinkState,
    watch: Option<SessionWatch>,
}

impl SharedLinkVisitor {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        context: SessionContext,
        link_id: impl Into<String>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(docs),
            context,
            link_id: link_id.into(),
            state: LinkState::Loading,
            watch: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn link_id(&self) -> &str {
        &self.link_id
    }

    pub fn visitor_id(&mut self) -> &str {
        self.context.visitor_id()
    }

    /// Hand the context back, e.g. to open the admin console after a grant.
    pub fn into_context(self) -> SessionContext {
        self.context
    }

    /// How long to wait before redirecting, once access is granted.
    pub fn redirect_after(&self) -> Option<Duration> {
        (self.state == LinkState::Authenticated).then_some(REDIRECT_DELAY)
    }

    /// Fetch the link, settle the initial state, and start watching it.
    pub async fn load(&mut self) -> Result<LinkState> {
        self.state = LinkState::Loading;
        let kind = SessionKind::shared();

        let Some(record) = self.sessions.fetch(&kind, &self.link_id).await? else {
            self.state = LinkState::NotFound;
            return Ok(self.state);
        };

        if record.status == SessionStatus::Authenticated && record.is_expired_at(Utc::now()) {
            self.state = LinkState::Expired;
            return Ok(self.state);
        }

        self.apply(Some(record)).await?;
        if !self.state.is_terminal() {
            // The first push re-delivers the current snapshot, so nothing
            // written between the fetch and the subscribe is missed.
            self.watch = Some(self.sessions.watch(&kind, &self.link_id).await?);
        }
        Ok(self.state)
    }

    /// Ask the approver for access, binding the link to this visitor.
    pub async fn request_access(&mut self) -> Result<LinkState> {
        let visitor_id = self.context.visitor_id().to_string();
        self.sessions
            .request_access(&self.link_id, &visitor_id)
            .await?;
        self.state = LinkState::AwaitingAuth;
        info!(link_id = %self.link_id, visitor_id = %visitor_id, "shared link access requested");
        Ok(self.state)
    }

    /// Wait for the next push and apply it. `None` when no longer watching.
    pub async fn next_update(&mut self) -> Result<Option<LinkState>> {
        let Some(watch) = self.watch.as_mut() else {
            return Ok(None);
        };
        let Some(snapshot) = watch.next().await else {
            self.watch = None;
            return Ok(None);
        };
        self.apply(snapshot).await?;
        Ok(Some(self.state))
    }

    async fn apply(&mut self, snapshot: Option<SessionRecord>) -> Result<()> {
        let visitor_id = self.context.visitor_id().to_string();
        let verdict = evaluate(
            &SessionKind::shared(),
            snapshot.as_ref(),
            Some(&visitor_id),
            Utc::now(),
        );

        self.state = match verdict {
            Verdict::Missing => LinkState::NotFound,
            Verdict::Expired => LinkState::Expired,
            Verdict::Denied => LinkState::AccessDenied,
            Verdict::Waiting(SessionStatus::AwaitingAuth) => LinkState::AwaitingAuth,
            Verdict::Waiting(_) => LinkState::Active,
            Verdict::Approved { constraints, .. } => {
                let kind = SessionKind::Shared { constraints };
                self.context.promote(&self.link_id, &kind).await?;
                info!(link_id = %self.link_id, "shared link granted");
                LinkState::Authenticated
            }
        };

        if self.state.is_terminal() {
            self.watch = None;
        }
        debug!(link_id = %self.link_id, state = ?self.state, "shared link observed");
        Ok(())
    }
}
