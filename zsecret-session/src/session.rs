//! Wallet session manager.
//!
//! Owns the authentication state machine, the balance view published for the
//! current session and the redirect intent. Every write happens under one
//! `RwLock`, and events go out while that lock is held so subscribers see
//! transitions in order.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use zsecret_common::{BalanceView, Completeness, ErrorKind, WalletAddress};

use crate::aggregator::BalanceAggregator;
use crate::config::SessionConfig;
use crate::connector::{SharedConnector, WalletKind};
use crate::error::SessionError;

const EVENT_CHANNEL_CAPACITY: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticated,
    Error,
}

/// Why a session ended up in `Error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// The current wallet connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSession {
    /// Unique per connection attempt; absent while disconnected.
    pub session_id: Option<Uuid>,
    pub state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<WalletAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_kind: Option<WalletKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionFailure>,
}

impl WalletSession {
    pub fn disconnected() -> Self {
        Self {
            session_id: None,
            state: SessionState::Disconnected,
            address: None,
            wallet_kind: None,
            connected_at: None,
            error: None,
        }
    }

    fn connecting(session_id: Uuid, wallet_kind: WalletKind) -> Self {
        Self {
            session_id: Some(session_id),
            state: SessionState::Connecting,
            wallet_kind: Some(wallet_kind),
            ..Self::disconnected()
        }
    }

    fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.state = SessionState::Error;
        self.error = Some(SessionFailure {
            kind,
            message: message.into(),
        });
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Whether `connected_at + ttl` is at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => connected_at + ttl <= now,
            Err(_) => false,
        }
    }
}

/// Published on every session transition and balance update, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    StateChanged(WalletSession),
    BalanceUpdated { session_id: Uuid, view: BalanceView },
}

/// Result of a successful `connect()`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOutcome {
    pub session: WalletSession,
    /// The recorded redirect intent, or the default landing path.
    pub resume_to: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

struct Attempt {
    id: Uuid,
    cancel: CancellationToken,
}

struct CachedView {
    address: WalletAddress,
    view: BalanceView,
}

struct Inner {
    session: WalletSession,
    view: Option<BalanceView>,
    intent: Option<String>,
    /// Last Full or Partial view, kept across reconnects of the same address.
    last_good: Option<CachedView>,
    attempt: Option<Attempt>,
    /// Generation of the newest balance cycle. Only that cycle may publish.
    cycle: u64,
    cycle_cancel: Option<CancellationToken>,
}

impl Inner {
    fn cancel_attempt(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            attempt.cancel.cancel();
        }
        self.cancel_cycle();
    }

    fn cancel_cycle(&mut self) {
        if let Some(cancel) = self.cycle_cancel.take() {
            cancel.cancel();
        }
    }

    /// Supersede the running cycle and hand out the next generation, with a
    /// token that also fires when `attempt` is cancelled.
    fn start_cycle(&mut self, attempt: &CancellationToken) -> (u64, CancellationToken) {
        self.cancel_cycle();
        self.cycle += 1;
        let cancel = attempt.child_token();
        self.cycle_cancel = Some(cancel.clone());
        (self.cycle, cancel)
    }

    fn is_current(&self, id: Uuid) -> bool {
        self.attempt.as_ref().is_some_and(|a| a.id == id)
    }

    fn last_good_for(&self, address: &WalletAddress) -> Option<BalanceView> {
        self.last_good
            .as_ref()
            .filter(|cached| &cached.address == address)
            .map(|cached| cached.view.clone())
    }
}

struct Shared {
    inner: RwLock<Inner>,
    events: broadcast::Sender<SessionEvent>,
    aggregator: BalanceAggregator,
    config: SessionConfig,
}

/// Cloneable handle to one browsing context's wallet session.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    pub fn new(aggregator: BalanceAggregator, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                inner: RwLock::new(Inner {
                    session: WalletSession::disconnected(),
                    view: None,
                    intent: None,
                    last_good: None,
                    attempt: None,
                    cycle: 0,
                    cycle_cancel: None,
                }),
                events,
                aggregator,
                config,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.shared.events.send(event);
    }

    pub async fn current_session(&self) -> WalletSession {
        self.shared.inner.read().await.session.clone()
    }

    pub async fn current_balance(&self) -> Option<BalanceView> {
        self.shared.inner.read().await.view.clone()
    }

    /// Balance for an authenticated session; the zero `NoData` view when no
    /// cycle has finished yet.
    pub async fn authenticated_balance(&self) -> Result<BalanceView, SessionError> {
        let inner = self.shared.inner.read().await;
        match inner.session.state {
            SessionState::Authenticated => Ok(inner
                .view
                .clone()
                .unwrap_or_else(|| BalanceView::unavailable(Vec::new()))),
            SessionState::Error
                if inner.session.error_kind() == Some(ErrorKind::SessionExpired) =>
            {
                Err(SessionError::SessionExpired)
            }
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONNECT / DISCONNECT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Connect through `connector`, superseding any attempt in flight.
    ///
    /// Resolves once the wallet answers; the first balance cycle runs in the
    /// background and is published through `subscribe()`. The attempt runs on
    /// its own task, so dropping this future still leaves the session in
    /// `Authenticated` or `Error` once the wallet answers or times out.
    pub async fn connect(
        &self,
        connector: SharedConnector,
    ) -> Result<ConnectOutcome, SessionError> {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let kind = connector.kind();

        {
            let mut inner = self.shared.inner.write().await;
            inner.cancel_cycle();
            if let Some(previous) = inner.attempt.replace(Attempt {
                id,
                cancel: cancel.clone(),
            }) {
                previous.cancel.cancel();
                tracing::info!(
                    superseded = %previous.id,
                    session_id = %id,
                    "superseding connection attempt"
                );
            }
            inner.session = WalletSession::connecting(id, kind);
            inner.view = None;
            tracing::info!(session_id = %id, wallet = kind.as_str(), "connecting wallet");
            self.emit(SessionEvent::StateChanged(inner.session.clone()));
        }

        let manager = self.clone();
        let attempt =
            tokio::spawn(async move { manager.resolve_attempt(id, connector, cancel).await });
        match attempt.await {
            Ok(result) => result,
            Err(err) => Err(self
                .fail_attempt(id, format!("{kind} connection aborted: {err}"))
                .await),
        }
    }

    async fn resolve_attempt(
        &self,
        id: Uuid,
        connector: SharedConnector,
        cancel: CancellationToken,
    ) -> Result<ConnectOutcome, SessionError> {
        let kind = connector.kind();
        let connecting = AssertUnwindSafe(connector.connect()).catch_unwind();
        let resolved = tokio::select! {
            _ = cancel.cancelled() => return Err(SessionError::Superseded),
            resolved = tokio::time::timeout(self.shared.config.connect_timeout, connecting) => {
                resolved
            }
        };
        let address = match resolved {
            Ok(Ok(Ok(address))) => address,
            Ok(Ok(Err(err))) => return Err(self.fail_attempt(id, err.to_string()).await),
            Ok(Err(_)) => {
                return Err(self
                    .fail_attempt(id, format!("{kind} connector failed unexpectedly"))
                    .await)
            }
            Err(_) => {
                return Err(self
                    .fail_attempt(id, format!("{kind} did not respond in time"))
                    .await)
            }
        };

        let (outcome, generation, cycle_cancel) = {
            let mut inner = self.shared.inner.write().await;
            if !inner.is_current(id) {
                tracing::debug!(session_id = %id, "wallet answered after being superseded");
                return Err(SessionError::Superseded);
            }

            inner.session = WalletSession {
                session_id: Some(id),
                state: SessionState::Authenticated,
                address: Some(address.clone()),
                wallet_kind: Some(kind),
                connected_at: Some(Utc::now()),
                error: None,
            };
            let resume_to = inner
                .intent
                .take()
                .unwrap_or_else(|| self.shared.config.routes.default_landing.clone());
            tracing::info!(
                session_id = %id,
                address = %address.short(),
                "wallet session authenticated"
            );
            self.emit(SessionEvent::StateChanged(inner.session.clone()));

            if let Some(cached) = inner.last_good_for(&address) {
                let stale = cached.into_stale();
                inner.view = Some(stale.clone());
                self.emit(SessionEvent::BalanceUpdated {
                    session_id: id,
                    view: stale,
                });
            }

            let (generation, cycle_cancel) = inner.start_cycle(&cancel);
            let outcome = ConnectOutcome {
                session: inner.session.clone(),
                resume_to,
            };
            (outcome, generation, cycle_cancel)
        };

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_cycle(id, generation, address, cycle_cancel).await;
        });

        Ok(outcome)
    }

    async fn fail_attempt(&self, id: Uuid, message: String) -> SessionError {
        let mut inner = self.shared.inner.write().await;
        if !inner.is_current(id) {
            return SessionError::Superseded;
        }
        inner.attempt = None;
        inner.session.fail(ErrorKind::ConnectFailed, message.clone());
        tracing::warn!(session_id = %id, error = %message, "wallet connection failed");
        self.emit(SessionEvent::StateChanged(inner.session.clone()));
        SessionError::ConnectFailed(message)
    }

    /// End the session, dropping its balance view, cache and redirect intent.
    pub async fn disconnect(&self) {
        let mut inner = self.shared.inner.write().await;
        inner.cancel_attempt();
        inner.view = None;
        inner.last_good = None;
        inner.intent = None;
        if let Some(id) = inner.session.session_id {
            tracing::info!(session_id = %id, "wallet disconnected");
        }
        inner.session = WalletSession::disconnected();
        self.emit(SessionEvent::StateChanged(inner.session.clone()));
    }

    /// Move an authenticated session past its TTL to `Error(SessionExpired)`.
    /// Returns whether it expired.
    pub async fn check_expiry(&self, now: DateTime<Utc>) -> bool {
        let mut inner = self.shared.inner.write().await;
        if !inner.session.is_authenticated()
            || !inner.session.is_expired_at(now, self.shared.config.session_ttl)
        {
            return false;
        }
        inner.cancel_attempt();
        inner
            .session
            .fail(ErrorKind::SessionExpired, "session expired, reconnect your wallet");
        tracing::info!(session_id = ?inner.session.session_id, "wallet session expired");
        self.emit(SessionEvent::StateChanged(inner.session.clone()));
        true
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BALANCE CYCLES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Re-run aggregation for the current session and wait for the result.
    /// The previous view is re-published as `Stale` while the cycle runs.
    pub async fn refresh(&self) -> Result<BalanceView, SessionError> {
        let (id, generation, address, cancel) = {
            let mut inner = self.shared.inner.write().await;
            match inner.session.state {
                SessionState::Authenticated => {}
                SessionState::Error
                    if inner.session.error_kind() == Some(ErrorKind::SessionExpired) =>
                {
                    return Err(SessionError::SessionExpired)
                }
                _ => return Err(SessionError::NotAuthenticated),
            }
            let (Some(id), Some(address), Some(attempt)) = (
                inner.session.session_id,
                inner.session.address.clone(),
                inner.attempt.as_ref(),
            ) else {
                return Err(SessionError::NotAuthenticated);
            };
            let attempt_cancel = attempt.cancel.clone();
            let (generation, cancel) = inner.start_cycle(&attempt_cancel);

            if let Some(view) = inner.view.take() {
                let stale = view.into_stale();
                inner.view = Some(stale.clone());
                self.emit(SessionEvent::BalanceUpdated {
                    session_id: id,
                    view: stale,
                });
            }
            (id, generation, address, cancel)
        };

        tracing::debug!(session_id = %id, generation, "refreshing balance");
        self.run_cycle(id, generation, address, cancel)
            .await
            .ok_or(SessionError::Superseded)
    }

    async fn run_cycle(
        &self,
        id: Uuid,
        generation: u64,
        address: WalletAddress,
        cancel: CancellationToken,
    ) -> Option<BalanceView> {
        let last_good = self.shared.inner.read().await.last_good_for(&address);
        let Some(view) = self
            .shared
            .aggregator
            .run(&address, last_good.as_ref(), &cancel)
            .await
        else {
            tracing::debug!(session_id = %id, generation, "balance cycle cancelled");
            return None;
        };
        self.publish_view(id, generation, address, view).await
    }

    /// Install `view` if `id` is still the authenticated session and
    /// `generation` is its newest cycle.
    async fn publish_view(
        &self,
        id: Uuid,
        generation: u64,
        address: WalletAddress,
        view: BalanceView,
    ) -> Option<BalanceView> {
        let mut inner = self.shared.inner.write().await;
        if !inner.is_current(id) || !inner.session.is_authenticated() {
            tracing::debug!(session_id = %id, "discarding balance for a superseded session");
            return None;
        }
        if inner.cycle != generation {
            tracing::debug!(
                session_id = %id,
                generation,
                newest = inner.cycle,
                "discarding balance from a superseded cycle"
            );
            return None;
        }
        inner.cycle_cancel = None;

        if view.completeness != Completeness::Stale {
            inner.last_good = Some(CachedView {
                address,
                view: view.clone(),
            });
        }
        tracing::info!(
            session_id = %id,
            balance = %view.balance,
            pending = %view.pending_balance,
            completeness = ?view.completeness,
            "balance updated"
        );
        inner.view = Some(view.clone());
        self.emit(SessionEvent::BalanceUpdated {
            session_id: id,
            view: view.clone(),
        });
        Some(view)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REDIRECT INTENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record the protected path a user tried to reach. The latest call wins.
    pub async fn remember_intent(&self, path: impl Into<String>) {
        self.shared.inner.write().await.intent = Some(path.into());
    }

    /// Take the recorded intent; a second call returns `None`.
    pub async fn take_intent(&self) -> Option<String> {
        self.shared.inner.write().await.intent.take()
    }
}
