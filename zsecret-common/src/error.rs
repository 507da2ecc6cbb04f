//! User-facing error kinds shared by every layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error kinds surfaced to the UI layer.
///
/// Adapter kinds are recovered into partial or stale balance views; the
/// session kinds move the session into `Error` and ask the user to reconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Wallet connection rejected or unavailable.
    ConnectFailed,
    /// A chain was unreachable within the aggregation deadline.
    AdapterTimeout,
    /// A chain answered with an error or with unusable data.
    AdapterError,
    /// The authenticated session is no longer valid.
    SessionExpired,
    /// No chain answered and there is no cached view to fall back on.
    NoData,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::ConnectFailed => "CONNECT_FAILED",
            Self::AdapterTimeout => "ADAPTER_TIMEOUT",
            Self::AdapterError => "ADAPTER_ERROR",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::NoData => "NO_DATA",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
