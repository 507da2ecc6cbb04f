use std::{env, fs, net::SocketAddr};

use thiserror::Error;
use zsecret_chains::{ChainAdapterConfig, ChainError};
use zsecret_session::SessionConfig;

const BIND_ADDR_ENV: &str = "ZSECRET_BIND_ADDR";
const PORT_ENV: &str = "PORT";
const CHAINS_CONFIG_ENV: &str = "ZSECRET_CHAINS_CONFIG";
const DEMO_MODE_ENV: &str = "ZSECRET_DEMO_MODE";
const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a socket address: {value}")]
    BindAddr { var: &'static str, value: String },

    #[error("failed to read chain config {path}: {source}")]
    ChainsRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse chain config {path}: {source}")]
    ChainsParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("chain adapter setup failed: {0}")]
    Chains(#[from] ChainError),
}

/// Process configuration for the balance service.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub demo_mode: bool,
    pub chains: Vec<ChainAdapterConfig>,
    pub session: SessionConfig,
}

impl ServiceConfig {
    /// Read the configuration from the environment.
    ///
    /// Chain adapters come from `ZSECRET_CHAINS_CONFIG` when set, the demo
    /// mocks when `ZSECRET_DEMO_MODE` is on, and the `ZCASH_*` / `NEAR_*`
    /// variables otherwise.
    pub fn from_env() -> Result<Self, ConfigError> {
        let demo_mode = env::var(DEMO_MODE_ENV)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        let chains = match env::var(CHAINS_CONFIG_ENV) {
            Ok(path) => load_chains(&path)?,
            Err(_) if demo_mode => ChainAdapterConfig::demo(),
            Err(_) => vec![
                ChainAdapterConfig::zcash_from_env(),
                ChainAdapterConfig::near_from_env(),
            ],
        };

        Ok(Self {
            bind_addr: bind_addr_from_env()?,
            demo_mode,
            chains,
            session: SessionConfig::from_env(),
        })
    }
}

fn bind_addr_from_env() -> Result<SocketAddr, ConfigError> {
    if let Ok(value) = env::var(BIND_ADDR_ENV) {
        return value.parse().map_err(|_| ConfigError::BindAddr {
            var: BIND_ADDR_ENV,
            value,
        });
    }
    let port = match env::var(PORT_ENV) {
        Ok(value) => value.parse().map_err(|_| ConfigError::BindAddr {
            var: PORT_ENV,
            value,
        })?,
        Err(_) => DEFAULT_PORT,
    };
    Ok(SocketAddr::from(([0, 0, 0, 0], port)))
}

fn load_chains(path: &str) -> Result<Vec<ChainAdapterConfig>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::ChainsRead {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::ChainsParse {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_config_file_is_loaded() {
        let path = env::temp_dir().join(format!("zsecret-chains-{}.json", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            r#"[{"chain_id": "near_testnet", "endpoint": {"type": "mock", "transparent": "1"}}]"#,
        )
        .unwrap();

        let chains = load_chains(path.to_str().unwrap()).unwrap();
        assert_eq!(chains.len(), 1);
        fs::remove_file(&path).unwrap();

        assert!(matches!(
            load_chains("/nonexistent/zsecret.json"),
            Err(ConfigError::ChainsRead { .. })
        ));
    }
}
