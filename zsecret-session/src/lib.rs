//! zsecret-session
//!
//! The wallet session core: connectors resolve a wallet into an address, the
//! [`SessionManager`] runs the connect/disconnect state machine and drives
//! the [`BalanceAggregator`], and the [`RouteGuard`] decides what a protected
//! view may show.

pub mod aggregator;
pub mod config;
pub mod connector;
pub mod error;
pub mod guard;
pub mod session;

pub use aggregator::{aggregate, merge, BalanceAggregator};
pub use config::{RouteConfig, SessionConfig};
pub use connector::{
    connector_for, DemoConnector, SharedConnector, UnavailableConnector, WalletConnector,
    WalletKind,
};
pub use error::{ConnectError, SessionError};
pub use guard::{GuardDecision, RouteGuard};
pub use session::{
    ConnectOutcome, SessionEvent, SessionFailure, SessionManager, SessionState, WalletSession,
};
