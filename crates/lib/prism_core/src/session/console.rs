//! Admin console state machine.
//!
//! ```text
//! CheckingRemoteToggle ─┬─> Disabled
//!                       └─> QrGenerated ─> PendingApproval ─> Authenticated
//! Authenticated ─┬─> Expired ────┐
//!                ├─> Terminated ─┼─> (toggle disarmed) Disabled
//!                └─> Unauthenticated (user logout)
//! ```
//!
//! Three subscriptions feed the console: the remote-login toggle, a one-shot
//! watcher on the pending QR session, and a long-lived watcher on the active
//! session. The one-shot watcher is dropped on promotion; the long-lived one
//! forces logout on deletion, status change, or elapsed expiry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::store::{SessionWatch, ToggleWatch};
use super::{Result, SessionContext, SessionError, SessionStore, Verdict, evaluate};
use crate::models::session::{AccessConstraints, QrPayload, SessionKind, SessionRecord};
use crate::store::DocumentStore;

/// Observable console state.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleState {
    CheckingRemoteToggle,
    /// Remote login is disarmed and nobody is signed in.
    Disabled,
    /// A QR challenge was minted and written; not yet confirmed by the store.
    QrGenerated { payload: QrPayload },
    /// The pending record is live and waiting for an approver.
    PendingApproval { payload: QrPayload },
    Authenticated {
        session_id: String,
        kind: SessionKind,
        expires_at: Option<DateTime<Utc>>,
    },
    /// Forced logout: `expiresAt` elapsed.
    Expired,
    /// Forced logout: the record was deleted or its status changed.
    Terminated,
    /// User-initiated logout.
    Unauthenticated,
    /// QR generation failed; calling `generate_new_qr` again retries.
    QrFailed { reason: String },
}

impl ConsoleState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, ConsoleState::Authenticated { .. })
    }

    /// What the console renders for this state.
    ///
    /// Anything short of an authenticated session renders as "not found"; the
    /// QR challenge is shown only while one is live.
    pub fn view(&self) -> ConsoleView {
        match self {
            ConsoleState::CheckingRemoteToggle => ConsoleView::Loading,
            ConsoleState::QrGenerated { payload } | ConsoleState::PendingApproval { payload } => {
                ConsoleView::NotFoundWithQr(payload.clone())
            }
            ConsoleState::Authenticated { .. } => ConsoleView::Dashboard,
            _ => ConsoleView::NotFound,
        }
    }
}

/// Rendered surface of the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleView {
    Loading,
    NotFound,
    NotFoundWithQr(QrPayload),
    Dashboard,
}

struct PendingQr {
    payload: QrPayload,
    watch: SessionWatch,
}

enum Event {
    Toggle(bool),
    Approval(Option<SessionRecord>),
    Session(Option<SessionRecord>),
}

/// Desktop-side driver of the QR handoff.
pub struct AdminConsole {
    sessions: SessionStore,
    context: SessionContext,
    state: ConsoleState,
    remote_enabled: bool,
    constraints: Option<AccessConstraints>,
    toggle: Option<ToggleWatch>,
    pending: Option<PendingQr>,
    active: Option<(SessionKind, SessionWatch)>,
}

impl AdminConsole {
    pub fn new(docs: Arc<dyn DocumentStore>, context: SessionContext) -> Self {
        Self {
            sessions: SessionStore::new(docs),
            context,
            state: ConsoleState::CheckingRemoteToggle,
            remote_enabled: false,
            constraints: None,
            toggle: None,
            pending: None,
            active: None,
        }
    }

    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote_enabled
    }

    /// Constraints of a shared session, once observed.
    pub fn constraints(&self) -> Option<&AccessConstraints> {
        self.constraints.as_ref()
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Subscribe to the remote toggle, resume any cached session, and settle
    /// the initial state.
    pub async fn mount(&mut self) -> Result<&ConsoleState> {
        self.state = ConsoleState::CheckingRemoteToggle;

        let mut toggle = self.sessions.watch_remote_toggle().await?;
        let mut enabled = toggle.next().await.unwrap_or(false);
        self.toggle = Some(toggle);

        if let (Some(id), Some(kind)) = (
            self.context.session_id().map(str::to_string),
            self.context.session_kind(),
        ) {
            self.resume(&id, kind).await?;
            // A failed resume disarms the toggle; the value read above is stale.
            if !self.state.is_authenticated() {
                enabled = self.sessions.remote_enabled().await?;
            }
        }

        self.apply_toggle(enabled).await?;
        Ok(&self.state)
    }

    async fn resume(&mut self, id: &str, kind: SessionKind) -> Result<()> {
        debug!(session_id = %id, shared = kind.is_shared(), "resuming cached session");
        let mut watch = self.sessions.watch(&kind, id).await?;
        let snapshot = watch.next().await.flatten();
        self.active = Some((kind, watch));
        self.observe_active(snapshot).await
    }

    /// Mint a fresh QR challenge and start watching it.
    ///
    /// Any earlier pending challenge is abandoned; its record stays orphaned.
    /// On failure the console moves to [`ConsoleState::QrFailed`].
    pub async fn generate_new_qr(&mut self) -> Result<QrPayload> {
        self.pending = None;
        match self.open_challenge().await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                warn!("QR generation failed: {e}");
                self.state = ConsoleState::QrFailed {
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }

    async fn open_challenge(&mut self) -> Result<QrPayload> {
        let record = self.sessions.create_pending().await?;
        let payload = QrPayload::authenticate_admin(&record.id);
        self.state = ConsoleState::QrGenerated {
            payload: payload.clone(),
        };
        let watch = self.sessions.watch(&SessionKind::Direct, &record.id).await?;
        self.pending = Some(PendingQr {
            payload: payload.clone(),
            watch,
        });
        info!(session_id = %record.id, "QR challenge issued");
        Ok(payload)
    }

    /// Wait for the next push on any live subscription and apply it.
    pub async fn next_event(&mut self) -> Result<&ConsoleState> {
        let event = tokio::select! {
            Some(enabled) = next_toggle(&mut self.toggle) => Event::Toggle(enabled),
            Some(snapshot) = next_pending(&mut self.pending) => Event::Approval(snapshot),
            Some(snapshot) = next_active(&mut self.active) => Event::Session(snapshot),
            else => return Err(SessionError::Detached),
        };

        match event {
            Event::Toggle(enabled) => self.apply_toggle(enabled).await?,
            Event::Approval(snapshot) => self.observe_pending(snapshot).await?,
            Event::Session(snapshot) => self.observe_active(snapshot).await?,
        }
        Ok(&self.state)
    }

    async fn apply_toggle(&mut self, enabled: bool) -> Result<()> {
        self.remote_enabled = enabled;
        if self.state.is_authenticated() {
            return Ok(());
        }

        if enabled {
            if self.pending.is_none() {
                // Failure is recorded as QrFailed; the console stays mounted.
                let _ = self.generate_new_qr().await;
            }
        } else {
            self.pending = None;
            self.state = ConsoleState::Disabled;
        }
        Ok(())
    }

    async fn observe_pending(&mut self, snapshot: Option<SessionRecord>) -> Result<()> {
        let Some(payload) = self.pending.as_ref().map(|p| p.payload.clone()) else {
            return Ok(());
        };

        match evaluate(&SessionKind::Direct, snapshot.as_ref(), None, Utc::now()) {
            Verdict::Approved { expires_at, .. } => {
                // One-shot: drop the pending watcher before anything else.
                self.pending = None;
                self.promote(&payload.id, expires_at).await?;
            }
            Verdict::Expired => {
                self.pending = None;
                self.state = ConsoleState::Expired;
            }
            Verdict::Waiting(_) => {
                self.state = ConsoleState::PendingApproval { payload };
            }
            // A deleted pending record is simply never approved.
            Verdict::Missing | Verdict::Denied => {}
        }
        Ok(())
    }

    async fn promote(&mut self, id: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        let kind = SessionKind::Direct;
        self.context.promote(id, &kind).await?;
        let watch = self.sessions.watch(&kind, id).await?;
        self.active = Some((kind.clone(), watch));
        self.constraints = None;
        self.state = ConsoleState::Authenticated {
            session_id: id.to_string(),
            kind,
            expires_at,
        };
        info!(session_id = %id, "admin session authenticated");
        Ok(())
    }

    async fn observe_active(&mut self, snapshot: Option<SessionRecord>) -> Result<()> {
        let Some((kind, watch)) = self.active.as_ref() else {
            return Ok(());
        };
        let kind = kind.clone();
        let id = watch.id().to_string();

        match evaluate(&kind, snapshot.as_ref(), None, Utc::now()) {
            Verdict::Approved {
                expires_at,
                constraints,
            } => {
                self.constraints = constraints;
                self.state = ConsoleState::Authenticated {
                    session_id: id,
                    kind,
                    expires_at,
                };
                Ok(())
            }
            Verdict::Expired => {
                info!(session_id = %id, "admin session expired");
                if let Err(e) = self.sessions.delete(&kind, &id).await {
                    warn!(session_id = %id, "failed to delete expired session: {e}");
                }
                self.force_logout(ConsoleState::Expired).await
            }
            Verdict::Missing | Verdict::Waiting(_) | Verdict::Denied => {
                info!(session_id = %id, "admin session terminated remotely");
                self.force_logout(ConsoleState::Terminated).await
            }
        }
    }

    async fn force_logout(&mut self, terminal: ConsoleState) -> Result<()> {
        self.active = None;
        self.pending = None;
        self.constraints = None;
        self.state = terminal;
        self.context.clear().await?;
        self.disarm_remote().await;
        Ok(())
    }

    async fn disarm_remote(&mut self) {
        if let Err(e) = self.sessions.set_remote_enabled(false).await {
            warn!("failed to disarm remote login: {e}");
        }
    }

    /// User-initiated logout.
    ///
    /// Local state is torn down first; the record deletion error, if any, is
    /// returned after the remote toggle has been disarmed.
    pub async fn logout(&mut self) -> Result<()> {
        let cached = self
            .context
            .session_id()
            .map(str::to_string)
            .zip(self.context.session_kind());

        self.active = None;
        self.pending = None;
        self.constraints = None;
        self.state = ConsoleState::Unauthenticated;
        self.context.clear().await?;

        let deleted = match cached {
            Some((id, kind)) => {
                info!(session_id = %id, "admin logout");
                self.sessions.delete(&kind, &id).await
            }
            None => Ok(()),
        };
        self.sessions.set_remote_enabled(false).await?;
        deleted
    }

    /// Drop every subscription.
    pub fn unmount(&mut self) {
        self.toggle = None;
        self.pending = None;
        self.active = None;
    }

    /// Mount, then apply pushes until `cancel` fires, publishing each state.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
        states: watch::Sender<ConsoleState>,
    ) -> Result<()> {
        let mounted = self.mount().await?.clone();
        states.send_replace(mounted);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.next_event() => match result {
                    Ok(state) => {
                        states.send_replace(state.clone());
                    }
                    Err(SessionError::Detached) => break,
                    Err(e) => warn!("console event failed: {e}"),
                },
            }
        }

        self.unmount();
        debug!("console unmounted");
        Ok(())
    }
}

async fn next_toggle(toggle: &mut Option<ToggleWatch>) -> Option<bool> {
    toggle.as_mut()?.next().await
}

async fn next_pending(pending: &mut Option<PendingQr>) -> Option<Option<SessionRecord>> {
    pending.as_mut()?.watch.next().await
}

async fn next_active(
    active: &mut Option<(SessionKind, SessionWatch)>,
) -> Option<Option<SessionRecord>> {
    active.as_mut()?.1.next().await
}
