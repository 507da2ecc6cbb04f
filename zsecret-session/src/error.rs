use thiserror::Error;
use zsecret_common::ErrorKind;

use crate::connector::WalletKind;

/// Failure reported by a wallet connector.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("{0} integration coming soon")]
    Unavailable(WalletKind),

    #[error("wallet rejected the connection: {0}")]
    Rejected(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("wallet connection failed: {0}")]
    ConnectFailed(String),

    /// A newer `connect()` or a `disconnect()` replaced this attempt.
    #[error("connection attempt superseded")]
    Superseded,

    #[error("wallet session expired, reconnect to continue")]
    SessionExpired,

    #[error("no authenticated wallet session")]
    NotAuthenticated,
}

impl SessionError {
    /// The user-facing error kind, for errors that have one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SessionError::ConnectFailed(_) => Some(ErrorKind::ConnectFailed),
            SessionError::SessionExpired => Some(ErrorKind::SessionExpired),
            SessionError::Superseded | SessionError::NotAuthenticated => None,
        }
    }
}
