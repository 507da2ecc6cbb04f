//! Error types for the chain adapters.
//!
//! These never escape an adapter's `fetch`: they are folded into a failed
//! `ChainBalance` at the adapter boundary.

use thiserror::Error;
use zsecret_common::{AdapterErrorKind, AmountError};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        /// Structured cause name, when the node reports one (NEAR does).
        cause: Option<String>,
    },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChainError {
    pub fn kind(&self) -> AdapterErrorKind {
        match self {
            ChainError::Timeout => AdapterErrorKind::Timeout,
            ChainError::Transport(_) | ChainError::InvalidConfig(_) => AdapterErrorKind::Transport,
            ChainError::Rpc { .. } => AdapterErrorKind::Rpc,
            ChainError::InvalidData(_) => AdapterErrorKind::InvalidData,
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChainError::Timeout
        } else if err.is_decode() {
            ChainError::InvalidData(err.to_string())
        } else {
            ChainError::Transport(err.to_string())
        }
    }
}

impl From<AmountError> for ChainError {
    fn from(err: AmountError) -> Self {
        ChainError::InvalidData(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::InvalidData(err.to_string())
    }
}
