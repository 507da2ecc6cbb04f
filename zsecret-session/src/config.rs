//! Session and routing settings.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const AGGREGATION_DEADLINE_ENV: &str = "ZSECRET_AGGREGATION_DEADLINE_MS";
const CONNECT_TIMEOUT_ENV: &str = "ZSECRET_CONNECT_TIMEOUT_SECS";
const SESSION_TTL_ENV: &str = "ZSECRET_SESSION_TTL_SECS";
const DEFAULT_LANDING_ENV: &str = "ZSECRET_DEFAULT_LANDING";
const CONNECT_PATH_ENV: &str = "ZSECRET_CONNECT_PATH";

const DEFAULT_AGGREGATION_DEADLINE_MS: u64 = 5_000;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Paths the route guard works with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Where unauthenticated users are sent.
    #[serde(default = "default_connect_path")]
    pub connect_path: String,
    /// Where users land after connecting when no intent was recorded.
    #[serde(default = "default_landing")]
    pub default_landing: String,
    #[serde(default = "default_protected_prefixes")]
    pub protected_prefixes: Vec<String>,
}

fn default_connect_path() -> String {
    "/connect-wallet".into()
}

fn default_landing() -> String {
    "/dashboard".into()
}

fn default_protected_prefixes() -> Vec<String> {
    vec!["/dashboard".into(), "/freelancer".into(), "/client".into()]
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            connect_path: default_connect_path(),
            default_landing: default_landing(),
            protected_prefixes: default_protected_prefixes(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Shared deadline for one aggregation cycle.
    pub aggregation_deadline: Duration,
    /// Upper bound on a wallet connector's `connect()`.
    pub connect_timeout: Duration,
    /// How long an authenticated session stays valid.
    pub session_ttl: Duration,
    pub routes: RouteConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            aggregation_deadline: Duration::from_millis(DEFAULT_AGGREGATION_DEADLINE_MS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            routes: RouteConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let aggregation_deadline_ms =
            env_u64(AGGREGATION_DEADLINE_ENV, DEFAULT_AGGREGATION_DEADLINE_MS);
        let connect_timeout_secs = env_u64(CONNECT_TIMEOUT_ENV, DEFAULT_CONNECT_TIMEOUT_SECS);
        let session_ttl_secs = env_u64(SESSION_TTL_ENV, DEFAULT_SESSION_TTL_SECS);

        let routes = RouteConfig {
            connect_path: env::var(CONNECT_PATH_ENV).unwrap_or_else(|_| default_connect_path()),
            default_landing: env::var(DEFAULT_LANDING_ENV).unwrap_or_else(|_| default_landing()),
            protected_prefixes: default_protected_prefixes(),
        };

        Self {
            aggregation_deadline: Duration::from_millis(aggregation_deadline_ms),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            session_ttl: Duration::from_secs(session_ttl_secs),
            routes,
        }
    }
}

fn env_u64(var: &str, default: u64) -> u64 {
    match env::var(var) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var, value = %raw, default, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}
