//! Wallet connectors: resolve a wallet integration into a `WalletAddress`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zsecret_common::{ChainFamily, WalletAddress};

use crate::error::ConnectError;

/// Wallet integrations offered by the wallet picker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletKind {
    #[serde(rename = "zcash-demo")]
    ZcashDemo,
    #[serde(rename = "zcash-ywallet")]
    ZcashYwallet,
    #[serde(rename = "zcash-zingo")]
    ZcashZingo,
    #[serde(rename = "zcash-zashi")]
    ZcashZashi,
    #[serde(rename = "near")]
    Near,
}

impl WalletKind {
    pub const ALL: [WalletKind; 5] = [
        WalletKind::ZcashDemo,
        WalletKind::ZcashYwallet,
        WalletKind::ZcashZingo,
        WalletKind::ZcashZashi,
        WalletKind::Near,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WalletKind::ZcashDemo => "zcash-demo",
            WalletKind::ZcashYwallet => "zcash-ywallet",
            WalletKind::ZcashZingo => "zcash-zingo",
            WalletKind::ZcashZashi => "zcash-zashi",
            WalletKind::Near => "near",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            WalletKind::ZcashDemo => "Demo Wallet",
            WalletKind::ZcashYwallet => "YWallet",
            WalletKind::ZcashZingo => "Zingo",
            WalletKind::ZcashZashi => "Zashi",
            WalletKind::Near => "NEAR Wallet",
        }
    }

    /// Whether a working connector exists for this kind.
    pub fn is_available(self) -> bool {
        matches!(self, WalletKind::ZcashDemo)
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for WalletKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WalletKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown wallet '{s}'"))
    }
}

#[async_trait]
pub trait WalletConnector: Send + Sync {
    fn kind(&self) -> WalletKind;

    /// Prompt the wallet and return the address it exposes.
    async fn connect(&self) -> Result<WalletAddress, ConnectError>;
}

pub type SharedConnector = Arc<dyn WalletConnector>;

/// Demo wallet: a generated shielded address plus a NEAR account alias.
#[derive(Clone, Debug)]
pub struct DemoConnector {
    near_account: String,
    delay: Duration,
}

impl Default for DemoConnector {
    fn default() -> Self {
        Self {
            near_account: "demo.near".into(),
            delay: Duration::ZERO,
        }
    }
}

impl DemoConnector {
    pub fn with_near_account(mut self, account: impl Into<String>) -> Self {
        self.near_account = account.into();
        self
    }

    /// Simulated wallet prompt latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn generate_address() -> String {
        format!(
            "zs1demo{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        )
    }
}

#[async_trait]
impl WalletConnector for DemoConnector {
    fn kind(&self) -> WalletKind {
        WalletKind::ZcashDemo
    }

    async fn connect(&self) -> Result<WalletAddress, ConnectError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let address = WalletAddress::new(Self::generate_address())
            .with_alias(ChainFamily::Near, self.near_account.clone());
        tracing::debug!(address = %address.short(), "demo wallet connected");
        Ok(address)
    }
}

/// Placeholder for wallets that are listed but not wired up yet.
#[derive(Clone, Copy, Debug)]
pub struct UnavailableConnector(pub WalletKind);

#[async_trait]
impl WalletConnector for UnavailableConnector {
    fn kind(&self) -> WalletKind {
        self.0
    }

    async fn connect(&self) -> Result<WalletAddress, ConnectError> {
        Err(ConnectError::Unavailable(self.0))
    }
}

/// Connector for `kind`.
pub fn connector_for(kind: WalletKind) -> SharedConnector {
    match kind {
        WalletKind::ZcashDemo => Arc::new(DemoConnector::default()),
        other => Arc::new(UnavailableConnector(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsecret_chains::ZcashPool;

    #[test]
    fn wallet_kind_wire_names() {
        assert_eq!("zcash-zashi".parse::<WalletKind>(), Ok(WalletKind::ZcashZashi));
        assert!("metamask".parse::<WalletKind>().is_err());
        assert_eq!(
            serde_json::to_string(&WalletKind::ZcashDemo).unwrap(),
            "\"zcash-demo\""
        );
    }

    #[tokio::test]
    async fn demo_connector_yields_shielded_address_with_near_alias() {
        let address = connector_for(WalletKind::ZcashDemo).connect().await.unwrap();

        assert_eq!(ZcashPool::classify(&address.primary), Some(ZcashPool::Shielded));
        assert_eq!(address.for_family(ChainFamily::Near), "demo.near");
    }

    #[tokio::test]
    async fn demo_addresses_are_unique() {
        let connector = DemoConnector::default();
        let a = connector.connect().await.unwrap();
        let b = connector.connect().await.unwrap();
        assert_ne!(a.primary, b.primary);
    }

    #[tokio::test]
    async fn unwired_wallets_fail_with_coming_soon() {
        let err = connector_for(WalletKind::ZcashZingo).connect().await.unwrap_err();
        assert_eq!(err, ConnectError::Unavailable(WalletKind::ZcashZingo));
        assert_eq!(err.to_string(), "Zingo integration coming soon");
    }
}
