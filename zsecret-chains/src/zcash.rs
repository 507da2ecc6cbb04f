//! zcashd JSON-RPC adapter.
//!
//! Confirmed and total balances are read with two `z_getbalance` calls (one at
//! the confirmation threshold, one at `minconf = 0`); whatever is in the total
//! but not yet confirmed is reported as pending.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;
use zsecret_common::{Amount, ChainBalance, ChainId, WalletAddress};

use crate::config::Credentials;
use crate::error::ChainError;
use crate::rpc::JsonRpcClient;
use crate::{fetch_within, ChainAdapter, RawBalance};

/// Value pool an address draws from, judged by its encoding prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZcashPool {
    Transparent,
    Shielded,
}

impl ZcashPool {
    const TRANSPARENT_PREFIXES: &'static [&'static str] =
        &["t1", "t3", "tm", "t2", "tex1", "textest1"];
    const SHIELDED_PREFIXES: &'static [&'static str] =
        &["zs1", "ztestsapling1", "u1", "utest1", "zc", "zt"];

    pub fn classify(address: &str) -> Option<Self> {
        if Self::SHIELDED_PREFIXES.iter().any(|p| address.starts_with(p)) {
            Some(Self::Shielded)
        } else if Self::TRANSPARENT_PREFIXES.iter().any(|p| address.starts_with(p)) {
            Some(Self::Transparent)
        } else {
            None
        }
    }
}

pub struct ZcashAdapter {
    chain_id: ChainId,
    rpc: JsonRpcClient,
    confirmation_threshold: u32,
}

impl ZcashAdapter {
    pub fn new(
        chain_id: ChainId,
        url: &str,
        credentials: Credentials,
        confirmation_threshold: u32,
        request_timeout: Duration,
    ) -> Result<Self, ChainError> {
        Ok(Self {
            chain_id,
            rpc: JsonRpcClient::new(url, credentials, request_timeout)?,
            confirmation_threshold,
        })
    }

    async fn balance_at(&self, address: &str, minconf: u32) -> Result<Amount, ChainError> {
        // inZat = true: the node answers in integer zatoshi.
        let zats: u64 = self
            .rpc
            .call("z_getbalance", json!([address, minconf, true]))
            .await?;
        Ok(Amount::from_zatoshi(zats))
    }

    async fn query(&self, address: &str) -> Result<RawBalance, ChainError> {
        let pool = ZcashPool::classify(address).ok_or_else(|| {
            ChainError::InvalidData(format!("unrecognised Zcash address '{address}'"))
        })?;

        let (confirmed, total) = tokio::try_join!(
            self.balance_at(address, self.confirmation_threshold),
            self.balance_at(address, 0),
        )?;
        let pending = total.saturating_sub(confirmed);

        tracing::debug!(
            chain = %self.chain_id,
            pool = ?pool,
            confirmed = %confirmed,
            pending = %pending,
            "zcash balance"
        );

        Ok(match pool {
            ZcashPool::Transparent => RawBalance {
                transparent: confirmed,
                shielded: None,
                pending,
            },
            ZcashPool::Shielded => RawBalance {
                transparent: Amount::ZERO,
                shielded: Some(confirmed),
                pending,
            },
        })
    }
}

#[async_trait]
impl ChainAdapter for ZcashAdapter {
    fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    async fn fetch(&self, address: &WalletAddress, deadline: Instant) -> ChainBalance {
        let account = address.for_chain(&self.chain_id);
        fetch_within(&self.chain_id, deadline, self.query(account)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_rpc_stub, spawn_rpc_stub_with_delay};
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use zsecret_common::AdapterErrorKind;

    const SAPLING: &str = "zs1z7rejlpsa98s2rrrfkwmaxu53e4ue0ulcrw0h4x5g8jl04tak0d3mm47vdtahatqrlkngh9sly";

    fn balances(
        confirmed: u64,
        total: u64,
    ) -> impl Fn(Value) -> (StatusCode, Value) + Clone + Send + Sync + 'static {
        move |req: Value| {
            let minconf = req["params"][1].as_u64().unwrap_or_default();
            let zats = if minconf == 0 { total } else { confirmed };
            (StatusCode::OK, json!({"result": zats, "error": null, "id": req["id"]}))
        }
    }

    fn adapter(url: &str) -> ZcashAdapter {
        ZcashAdapter::new(
            ChainId::ZcashTestnet,
            url,
            Credentials::default(),
            10,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn classifies_address_pools() {
        assert_eq!(ZcashPool::classify(SAPLING), Some(ZcashPool::Shielded));
        assert_eq!(ZcashPool::classify("utest1abcdef"), Some(ZcashPool::Shielded));
        assert_eq!(ZcashPool::classify("ztestsapling1xyz"), Some(ZcashPool::Shielded));
        assert_eq!(
            ZcashPool::classify("t1Hsc1LR8yKnbbe3twRp88p6vFfC5t7DLbs"),
            Some(ZcashPool::Transparent)
        );
        assert_eq!(
            ZcashPool::classify("tmBsTi2xWTjUdEXnuTceL7fecEQKeWaPDJd"),
            Some(ZcashPool::Transparent)
        );
        assert_eq!(ZcashPool::classify("demo.near"), None);
    }

    #[tokio::test]
    async fn shielded_balance_with_pending() {
        let url = spawn_rpc_stub(balances(525_000_000, 675_000_000)).await;
        let balance = adapter(&url)
            .fetch(&WalletAddress::new(SAPLING), Instant::now() + Duration::from_secs(5))
            .await;

        assert!(balance.is_ok(), "{balance:?}");
        assert_eq!(balance.transparent_amount(), Some(Amount::ZERO));
        assert_eq!(balance.shielded_amount().unwrap().to_string(), "5.25");
        assert_eq!(balance.pending_amount().unwrap().to_string(), "1.5");
    }

    #[tokio::test]
    async fn transparent_balance_has_no_shielded_pool() {
        let url = spawn_rpc_stub(balances(100_000_000, 100_000_000)).await;
        let balance = adapter(&url)
            .fetch(
                &WalletAddress::new("tmBsTi2xWTjUdEXnuTceL7fecEQKeWaPDJd"),
                Instant::now() + Duration::from_secs(5),
            )
            .await;

        assert_eq!(balance.transparent_amount().unwrap().to_string(), "1");
        assert_eq!(balance.shielded_amount(), None);
        assert_eq!(balance.pending_amount(), Some(Amount::ZERO));
    }

    #[tokio::test]
    async fn rpc_error_is_reported_as_data() {
        let url = spawn_rpc_stub(|req: Value| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "result": null,
                    "error": {"code": -5, "message": "Invalid from address, should be a taddr or zaddr."},
                    "id": req["id"]
                }),
            )
        })
        .await;
        let balance = adapter(&url)
            .fetch(&WalletAddress::new(SAPLING), Instant::now() + Duration::from_secs(5))
            .await;

        assert_eq!(balance.error_kind(), Some(AdapterErrorKind::Rpc));
    }

    #[tokio::test]
    async fn unknown_address_format_is_invalid_data() {
        // Nothing listens here; classification fails before any request.
        let balance = adapter("http://127.0.0.1:9")
            .fetch(&WalletAddress::new("not-an-address"), Instant::now() + Duration::from_secs(5))
            .await;

        assert_eq!(balance.error_kind(), Some(AdapterErrorKind::InvalidData));
    }

    #[tokio::test]
    async fn slow_node_times_out_at_deadline() {
        let url = spawn_rpc_stub_with_delay(Duration::from_secs(5), balances(1, 1)).await;
        let started = Instant::now();
        let balance = adapter(&url)
            .fetch(&WalletAddress::new(SAPLING), started + Duration::from_millis(200))
            .await;

        assert_eq!(balance.error_kind(), Some(AdapterErrorKind::Timeout));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
