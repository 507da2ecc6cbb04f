//! Configuration types for the chain adapters.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zsecret_common::{Amount, ChainId};

use crate::error::ChainError;
use crate::mock::{MockAdapter, MockScript};
use crate::near::NearAdapter;
use crate::zcash::ZcashAdapter;
use crate::SharedAdapter;

// ═══════════════════════════════════════════════════════════════════════════════
// ENVIRONMENT VARIABLES
// ═══════════════════════════════════════════════════════════════════════════════

const ZCASH_NETWORK_ENV: &str = "ZCASH_NETWORK";
const ZCASH_RPC_URL_ENV: &str = "ZCASH_RPC_URL";
const ZCASH_RPC_USER_ENV: &str = "ZCASH_RPC_USER";
const ZCASH_RPC_PASSWORD_ENV: &str = "ZCASH_RPC_PASSWORD";
const ZCASH_API_KEY_ENV: &str = "ZCASH_API_KEY";
const ZCASH_CONFIRMATION_THRESHOLD_ENV: &str = "ZCASH_CONFIRMATION_THRESHOLD";
const NEAR_NETWORK_ENV: &str = "NEAR_NETWORK";
const NEAR_RPC_URL_ENV: &str = "NEAR_RPC_URL";
const NEAR_API_KEY_ENV: &str = "NEAR_API_KEY";

/// Confirmations before a Zcash note counts as confirmed rather than pending.
pub const DEFAULT_CONFIRMATION_THRESHOLD: u32 = 10;

// ═══════════════════════════════════════════════════════════════════════════════
// NETWORK ENVIRONMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Network environment (mainnet vs testnet).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkEnvironment {
    /// Production mainnet.
    #[default]
    Mainnet,
    /// Test networks.
    Testnet,
}

impl NetworkEnvironment {
    fn from_env(var: &str) -> Self {
        match env::var(var).as_deref() {
            Ok("testnet") | Ok("test") => Self::Testnet,
            _ => Self::Mainnet,
        }
    }

    pub fn zcash_chain(self) -> ChainId {
        match self {
            Self::Mainnet => ChainId::ZcashMainnet,
            Self::Testnet => ChainId::ZcashTestnet,
        }
    }

    pub fn near_chain(self) -> ChainId {
        match self {
            Self::Mainnet => ChainId::NearMainnet,
            Self::Testnet => ChainId::NearTestnet,
        }
    }

    /// zcashd's default RPC port for the network.
    pub fn default_zcash_rpc_url(self) -> &'static str {
        match self {
            Self::Mainnet => "http://127.0.0.1:8232",
            Self::Testnet => "http://127.0.0.1:18232",
        }
    }

    pub fn default_near_rpc_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://rpc.mainnet.near.org",
            Self::Testnet => "https://rpc.testnet.near.org",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADAPTER CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Credentials for an RPC endpoint. Never logged.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Chain endpoint types.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainEndpoint {
    /// zcashd-compatible JSON-RPC endpoint.
    ZcashRpc {
        url: String,
        #[serde(default = "default_confirmation_threshold")]
        confirmation_threshold: u32,
    },
    /// NEAR RPC endpoint.
    NearRpc { url: String },
    /// Scripted endpoint for demo mode and tests.
    Mock {
        #[serde(default)]
        transparent: Amount,
        #[serde(default)]
        shielded: Option<Amount>,
        #[serde(default)]
        pending: Amount,
        #[serde(default)]
        delay_ms: u64,
    },
}

fn default_confirmation_threshold() -> u32 {
    DEFAULT_CONFIRMATION_THRESHOLD
}

/// Configuration for a single chain adapter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainAdapterConfig {
    pub chain_id: ChainId,
    /// Whether this adapter is enabled.
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub endpoint: ChainEndpoint,
    #[serde(default)]
    pub credentials: Credentials,
    /// Per-request HTTP timeout; the aggregation deadline still wins if shorter.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn bool_true() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl ChainAdapterConfig {
    /// Zcash adapter settings from `ZCASH_*` environment variables.
    pub fn zcash_from_env() -> Self {
        let network = NetworkEnvironment::from_env(ZCASH_NETWORK_ENV);
        let url = env::var(ZCASH_RPC_URL_ENV)
            .unwrap_or_else(|_| network.default_zcash_rpc_url().to_string());
        let confirmation_threshold = env::var(ZCASH_CONFIRMATION_THRESHOLD_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CONFIRMATION_THRESHOLD);

        Self {
            chain_id: network.zcash_chain(),
            enabled: true,
            endpoint: ChainEndpoint::ZcashRpc {
                url,
                confirmation_threshold,
            },
            credentials: Credentials {
                username: env::var(ZCASH_RPC_USER_ENV).ok(),
                password: env::var(ZCASH_RPC_PASSWORD_ENV).ok(),
                api_key: env::var(ZCASH_API_KEY_ENV).ok(),
            },
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    /// NEAR adapter settings from `NEAR_*` environment variables.
    pub fn near_from_env() -> Self {
        let network = NetworkEnvironment::from_env(NEAR_NETWORK_ENV);
        let url = env::var(NEAR_RPC_URL_ENV)
            .unwrap_or_else(|_| network.default_near_rpc_url().to_string());

        Self {
            chain_id: network.near_chain(),
            enabled: true,
            endpoint: ChainEndpoint::NearRpc { url },
            credentials: Credentials {
                api_key: env::var(NEAR_API_KEY_ENV).ok(),
                ..Default::default()
            },
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    /// Demo-mode adapters: a shielded Zcash balance and a plain NEAR account.
    pub fn demo() -> Vec<Self> {
        let mock = |chain_id, transparent, shielded, pending| Self {
            chain_id,
            enabled: true,
            endpoint: ChainEndpoint::Mock {
                transparent,
                shielded,
                pending,
                delay_ms: 150,
            },
            credentials: Credentials::default(),
            request_timeout_ms: default_request_timeout_ms(),
        };
        vec![
            mock(
                ChainId::ZcashTestnet,
                Amount::ZERO,
                Some(Amount::from_zatoshi(525_000_000)),
                Amount::from_zatoshi(150_000_000),
            ),
            // 245.5 NEAR, the demo wallet's account balance.
            mock(
                ChainId::NearTestnet,
                Amount::from_zatoshi(24_550_000_000),
                None,
                Amount::ZERO,
            ),
        ]
    }

    pub fn build(&self) -> Result<SharedAdapter, ChainError> {
        let timeout = Duration::from_millis(self.request_timeout_ms);
        let adapter: SharedAdapter = match &self.endpoint {
            ChainEndpoint::ZcashRpc {
                url,
                confirmation_threshold,
            } => Arc::new(ZcashAdapter::new(
                self.chain_id.clone(),
                url,
                self.credentials.clone(),
                *confirmation_threshold,
                timeout,
            )?),
            ChainEndpoint::NearRpc { url } => Arc::new(NearAdapter::new(
                self.chain_id.clone(),
                url,
                self.credentials.clone(),
                timeout,
            )?),
            ChainEndpoint::Mock {
                transparent,
                shielded,
                pending,
                delay_ms,
            } => Arc::new(
                MockAdapter::new(
                    self.chain_id.clone(),
                    MockScript::Balance {
                        transparent: *transparent,
                        shielded: *shielded,
                        pending: *pending,
                    },
                )
                .with_delay(Duration::from_millis(*delay_ms)),
            ),
        };
        Ok(adapter)
    }
}

/// Build every enabled adapter. Duplicate chain ids are rejected.
pub fn build_adapters(configs: &[ChainAdapterConfig]) -> Result<Vec<SharedAdapter>, ChainError> {
    let mut adapters: Vec<SharedAdapter> = Vec::with_capacity(configs.len());
    for config in configs {
        if !config.enabled {
            tracing::info!(chain = %config.chain_id, "chain adapter disabled, skipping");
            continue;
        }
        if adapters.iter().any(|a| a.chain_id() == &config.chain_id) {
            return Err(ChainError::InvalidConfig(format!(
                "duplicate chain_id {}",
                config.chain_id
            )));
        }
        adapters.push(config.build()?);
        tracing::info!(chain = %config.chain_id, "chain adapter configured");
    }
    Ok(adapters)
}
