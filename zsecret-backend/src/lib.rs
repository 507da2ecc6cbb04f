//! zsecret-backend
//!
//! HTTP surface of the wallet session core. Each browser holds an opaque
//! context id (sent in the `x-zsecret-context` header) that maps to its own
//! `SessionManager`; chain adapters are shared by every context.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, time::Instant};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;
use zsecret_chains::{build_adapters, SharedAdapter};
use zsecret_common::BalanceView;
use zsecret_session::{
    connector_for, BalanceAggregator, ConnectOutcome, GuardDecision, RouteGuard, SessionConfig,
    SessionError, SessionManager, WalletKind, WalletSession,
};

pub mod config;

pub use config::{ConfigError, ServiceConfig};

/// Header carrying the browsing-context id.
pub const CONTEXT_HEADER: &str = "x-zsecret-context";

const CODE_UNAUTHORIZED: &str = "UNAUTHORIZED";
const CODE_SESSION_EXPIRED: &str = "SESSION_EXPIRED";
const CODE_CONNECT_FAILED: &str = "CONNECT_FAILED";
const CODE_CONNECT_SUPERSEDED: &str = "CONNECT_SUPERSEDED";
const CODE_WALLET_UNKNOWN: &str = "WALLET_UNKNOWN";
const CODE_TOO_MANY_CONTEXTS: &str = "TOO_MANY_CONTEXTS";
const CODE_INTERNAL: &str = "INTERNAL_SERVER_ERROR";

/// Upper bound on live browsing contexts.
pub const MAX_CONTEXTS: usize = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("session registry poisoned")]
    Poisoned,
    #[error("too many browsing contexts, try again later")]
    Full,
}

struct ContextEntry {
    manager: SessionManager,
    last_seen: Instant,
}

/// Browsing contexts and their session managers.
///
/// A context untouched for `idle_ttl` is dropped the next time it is looked
/// up or a new context is created.
#[derive(Clone)]
pub struct SessionRegistry {
    aggregator: BalanceAggregator,
    config: SessionConfig,
    idle_ttl: Duration,
    max_contexts: usize,
    contexts: Arc<RwLock<HashMap<Uuid, ContextEntry>>>,
}

impl SessionRegistry {
    /// Contexts idle for longer than the session TTL are dropped.
    pub fn new(aggregator: BalanceAggregator, config: SessionConfig) -> Self {
        let idle_ttl = config.session_ttl;
        Self::with_limits(aggregator, config, idle_ttl, MAX_CONTEXTS)
    }

    pub fn with_limits(
        aggregator: BalanceAggregator,
        config: SessionConfig,
        idle_ttl: Duration,
        max_contexts: usize,
    ) -> Self {
        Self {
            aggregator,
            config,
            idle_ttl,
            max_contexts,
            contexts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn create(&self) -> Result<Uuid, RegistryError> {
        let now = Instant::now();
        let mut contexts = self.contexts.write().map_err(|_| RegistryError::Poisoned)?;
        let before = contexts.len();
        contexts.retain(|_, entry| now.duration_since(entry.last_seen) < self.idle_ttl);
        if contexts.len() < before {
            tracing::debug!(evicted = before - contexts.len(), "idle browsing contexts dropped");
        }
        if contexts.len() >= self.max_contexts {
            tracing::warn!(contexts = contexts.len(), "browsing context limit reached");
            return Err(RegistryError::Full);
        }

        let id = Uuid::new_v4();
        let manager = SessionManager::new(self.aggregator.clone(), self.config.clone());
        contexts.insert(
            id,
            ContextEntry {
                manager,
                last_seen: now,
            },
        );
        Ok(id)
    }

    /// Look up a context and mark it as seen.
    pub fn get(&self, id: &Uuid) -> Option<SessionManager> {
        let now = Instant::now();
        let mut contexts = self.contexts.write().ok()?;
        let entry = contexts.get_mut(id)?;
        if now.duration_since(entry.last_seen) >= self.idle_ttl {
            contexts.remove(id);
            tracing::debug!(context_id = %id, "idle browsing context dropped");
            return None;
        }
        entry.last_seen = now;
        Some(entry.manager.clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionManager> {
        self.contexts
            .write()
            .ok()?
            .remove(id)
            .map(|entry| entry.manager)
    }

    pub fn len(&self) -> usize {
        self.contexts.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct AppState {
    registry: SessionRegistry,
    guard: RouteGuard,
}

impl AppState {
    pub fn new(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let adapters = build_adapters(&config.chains)?;
        if config.demo_mode {
            tracing::warn!("demo mode: balances come from scripted adapters");
        }
        Ok(Self::with_components(adapters, config.session.clone()))
    }

    pub fn with_components(adapters: Vec<SharedAdapter>, session: SessionConfig) -> Self {
        let aggregator = BalanceAggregator::new(adapters, session.aggregation_deadline);
        Self {
            guard: RouteGuard::new(session.routes.clone()),
            registry: SessionRegistry::new(aggregator, session),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    fn context(&self, headers: &HeaderMap) -> Result<(Uuid, SessionManager), ApiError> {
        let id = headers
            .get(CONTEXT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                ApiError::unauthorized(format!("missing or malformed {CONTEXT_HEADER} header"))
            })?;
        let manager = self
            .registry
            .get(&id)
            .ok_or_else(|| ApiError::unauthorized("unknown browsing context"))?;
        Ok((id, manager))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, CODE_UNAUTHORIZED, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, CODE_INTERNAL, message)
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::ConnectFailed(_) => {
                Self::new(StatusCode::BAD_GATEWAY, CODE_CONNECT_FAILED, message)
            }
            SessionError::Superseded => {
                Self::new(StatusCode::CONFLICT, CODE_CONNECT_SUPERSEDED, message)
            }
            SessionError::SessionExpired => {
                Self::new(StatusCode::UNAUTHORIZED, CODE_SESSION_EXPIRED, message)
            }
            SessionError::NotAuthenticated => Self::unauthorized(message),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Full => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                CODE_TOO_MANY_CONTEXTS,
                err.to_string(),
            ),
            RegistryError::Poisoned => Self::internal(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTER
// ═══════════════════════════════════════════════════════════════════════════════

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/session",
            post(create_context).get(get_session).delete(delete_context),
        )
        .route("/api/session/connect", post(connect_wallet))
        .route("/api/session/disconnect", post(disconnect_wallet))
        .route("/api/guard", get(guard_decision))
        .route("/api/balance", get(get_balance))
        .route("/api/balance/refresh", post(refresh_balance))
        .with_state(state)
}

/// Bind `config.bind_addr` and serve until `shutdown` resolves.
pub async fn serve(
    config: &ServiceConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = app_router(AppState::new(config)?)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        chains = config.chains.len(),
        "balance service listening"
    );
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextResponse {
    context_id: Uuid,
}

async fn create_context(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ContextResponse>), ApiError> {
    let context_id = state.registry.create()?;
    tracing::debug!(context_id = %context_id, "browsing context created");
    Ok((StatusCode::CREATED, Json(ContextResponse { context_id })))
}

async fn delete_context(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let (id, manager) = state.context(&headers)?;
    manager.disconnect().await;
    state.registry.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<WalletSession>, ApiError> {
    let (_, manager) = state.context(&headers)?;
    manager.check_expiry(Utc::now()).await;
    Ok(Json(manager.current_session().await))
}

#[derive(Deserialize)]
struct ConnectRequest {
    wallet: String,
}

async fn connect_wallet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ConnectOutcome>, ApiError> {
    let (_, manager) = state.context(&headers)?;
    let kind: WalletKind = req
        .wallet
        .parse()
        .map_err(|msg: String| ApiError::new(StatusCode::BAD_REQUEST, CODE_WALLET_UNKNOWN, msg))?;

    let outcome = manager.connect(connector_for(kind)).await?;
    Ok(Json(outcome))
}

async fn disconnect_wallet(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<WalletSession>, ApiError> {
    let (_, manager) = state.context(&headers)?;
    manager.disconnect().await;
    Ok(Json(manager.current_session().await))
}

#[derive(Deserialize)]
struct GuardQuery {
    path: String,
}

async fn guard_decision(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GuardQuery>,
) -> Result<Json<GuardDecision>, ApiError> {
    let (_, manager) = state.context(&headers)?;
    manager.check_expiry(Utc::now()).await;
    Ok(Json(state.guard.evaluate(&manager, &query.path).await))
}

async fn get_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BalanceView>, ApiError> {
    let (_, manager) = state.context(&headers)?;
    manager.check_expiry(Utc::now()).await;
    Ok(Json(manager.authenticated_balance().await?))
}

async fn refresh_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BalanceView>, ApiError> {
    let (_, manager) = state.context(&headers)?;
    manager.check_expiry(Utc::now()).await;
    Ok(Json(manager.refresh().await?))
}
