//! NEAR RPC adapter.
//!
//! NEAR has no privacy pool, so `shielded` is always absent. The settled
//! balance is read at `final` finality and the pending delta is whatever the
//! `optimistic` view adds on top of it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use zsecret_common::{Amount, ChainBalance, ChainId, WalletAddress};

use crate::config::Credentials;
use crate::error::ChainError;
use crate::rpc::JsonRpcClient;
use crate::{fetch_within, ChainAdapter, RawBalance};

const UNKNOWN_ACCOUNT: &str = "UNKNOWN_ACCOUNT";

#[derive(Deserialize)]
struct ViewAccount {
    /// Liquid balance in yoctoNEAR, as a decimal string.
    #[serde(default)]
    amount: Option<String>,
    /// Older nodes report query failures inside `result`.
    #[serde(default)]
    error: Option<String>,
}

/// Whether `id` is a valid NEAR account id (named or implicit).
pub fn is_valid_account_id(id: &str) -> bool {
    if id.len() < 2 || id.len() > 64 {
        return false;
    }
    let mut prev_separator = true;
    for c in id.chars() {
        match c {
            'a'..='z' | '0'..='9' => prev_separator = false,
            '-' | '_' | '.' => {
                if prev_separator {
                    return false;
                }
                prev_separator = true;
            }
            _ => return false,
        }
    }
    !prev_separator
}

pub struct NearAdapter {
    chain_id: ChainId,
    rpc: JsonRpcClient,
}

impl NearAdapter {
    pub fn new(
        chain_id: ChainId,
        url: &str,
        credentials: Credentials,
        request_timeout: Duration,
    ) -> Result<Self, ChainError> {
        Ok(Self {
            chain_id,
            rpc: JsonRpcClient::new(url, credentials, request_timeout)?,
        })
    }

    async fn view_account(&self, account_id: &str, finality: &str) -> Result<Amount, ChainError> {
        let params = json!({
            "request_type": "view_account",
            "finality": finality,
            "account_id": account_id,
        });
        let view: ViewAccount = self.rpc.call("query", params).await.map_err(|err| match err {
            ChainError::Rpc {
                cause: Some(ref cause),
                ..
            } if cause == UNKNOWN_ACCOUNT => {
                ChainError::InvalidData(format!("account {account_id} does not exist"))
            }
            other => other,
        })?;

        if let Some(error) = view.error {
            return Err(ChainError::InvalidData(error));
        }
        let yocto: u128 = view
            .amount
            .ok_or_else(|| ChainError::InvalidData("view_account result has no amount".into()))?
            .parse()
            .map_err(|_| ChainError::InvalidData("amount is not an integer".into()))?;
        Ok(Amount::from_yocto(yocto)?)
    }

    async fn query(&self, account_id: &str) -> Result<RawBalance, ChainError> {
        if !is_valid_account_id(account_id) {
            return Err(ChainError::InvalidData(format!(
                "'{account_id}' is not a NEAR account id"
            )));
        }

        let (settled, optimistic) = tokio::try_join!(
            self.view_account(account_id, "final"),
            self.view_account(account_id, "optimistic"),
        )?;

        Ok(RawBalance {
            transparent: settled,
            shielded: None,
            pending: optimistic.saturating_sub(settled),
        })
    }
}

#[async_trait]
impl ChainAdapter for NearAdapter {
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
    use crate::test_support::spawn_rpc_stub;
    use axum::http::StatusCode;
    use serde_json::Value;
    use zsecret_common::{AdapterErrorKind, ChainFamily};

    fn adapter(url: &str) -> NearAdapter {
        NearAdapter::new(
            ChainId::NearTestnet,
            url,
            Credentials::default(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[test]
    fn account_id_rules() {
        assert!(is_valid_account_id("demo.near"));
        assert!(is_valid_account_id("alice-bob_1.testnet"));
        assert!(is_valid_account_id(
            "98793cd91a3f870fb126f66285808c7e094afcfc4eda8a970f6648cdf0dbd6de"
        ));
        assert!(!is_valid_account_id("a"));
        assert!(!is_valid_account_id("Demo.near"));
        assert!(!is_valid_account_id("demo..near"));
        assert!(!is_valid_account_id(".demo"));
        assert!(!is_valid_account_id("demo."));
    }

    #[tokio::test]
    async fn final_and_optimistic_views() {
        let url = spawn_rpc_stub(|req: Value| {
            let amount = match req["params"]["finality"].as_str() {
                Some("final") => "245500000000000000000000000",
                _ => "246000000000000000000000000",
            };
            (
                StatusCode::OK,
                json!({"jsonrpc": "2.0", "id": req["id"], "result": {
                    "amount": amount,
                    "locked": "0",
                    "storage_usage": 182,
                    "block_height": 17795474
                }}),
            )
        })
        .await;

        let address = WalletAddress::new("zs1unused").with_alias(ChainFamily::Near, "demo.near");
        let balance = adapter(&url).fetch(&address, deadline()).await;

        assert_eq!(balance.transparent_amount().unwrap().to_string(), "245.5");
        assert_eq!(balance.pending_amount().unwrap().to_string(), "0.5");
        assert_eq!(balance.shielded_amount(), None);
    }

    #[tokio::test]
    async fn unknown_account_is_invalid_data() {
        let url = spawn_rpc_stub(|req: Value| {
            (
                StatusCode::OK,
                json!({"jsonrpc": "2.0", "id": req["id"], "error": {
                    "name": "HANDLER_ERROR",
                    "cause": {"name": "UNKNOWN_ACCOUNT", "info": {"requested_account_id": "ghost.near"}},
                    "code": -32000,
                    "message": "Server error"
                }}),
            )
        })
        .await;

        let balance = adapter(&url)
            .fetch(&WalletAddress::new("ghost.near"), deadline())
            .await;
        assert_eq!(balance.error_kind(), Some(AdapterErrorKind::InvalidData));
    }

    #[tokio::test]
    async fn unreachable_node_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let balance = adapter(&url)
            .fetch(&WalletAddress::new("demo.near"), deadline())
            .await;
        assert_eq!(balance.error_kind(), Some(AdapterErrorKind::Transport));
    }
}
