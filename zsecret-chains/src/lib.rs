//! zsecret-chains
//!
//! Chain adapters: one uniform `fetch(address, deadline)` per chain that
//! always returns a `ChainBalance`. Timeouts, transport failures and bad
//! payloads come back as data (`ChainOutcome::Failed`), never as an `Err` or a
//! hung future, so the aggregator can keep going when one chain is down.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;
use zsecret_common::{Amount, ChainBalance, ChainId, WalletAddress};

pub mod config;
pub mod error;
pub mod mock;
pub mod near;
pub mod rpc;
pub mod zcash;

#[cfg(test)]
mod test_support;

pub use config::{
    build_adapters, ChainAdapterConfig, ChainEndpoint, Credentials, NetworkEnvironment,
};
pub use error::ChainError;
pub use mock::{MockAdapter, MockScript};
pub use near::NearAdapter;
pub use zcash::{ZcashAdapter, ZcashPool};

/// Shared handle to an adapter.
pub type SharedAdapter = Arc<dyn ChainAdapter>;

/// Uniform balance source for one chain.
///
/// Implementations must return by `deadline` and must report every failure as
/// a failed `ChainBalance`. Adapters hold no per-session state.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain_id(&self) -> &ChainId;

    async fn fetch(&self, address: &WalletAddress, deadline: Instant) -> ChainBalance;
}

/// Balance figures an adapter pulled off the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawBalance {
    pub transparent: Amount,
    pub shielded: Option<Amount>,
    pub pending: Amount,
}

/// Run an adapter's fetch under `deadline` and fold the result into a
/// `ChainBalance`.
pub async fn fetch_within<F>(chain_id: &ChainId, deadline: Instant, fetch: F) -> ChainBalance
where
    F: Future<Output = Result<RawBalance, ChainError>>,
{
    match tokio::time::timeout_at(deadline, fetch).await {
        Ok(Ok(raw)) => {
            tracing::debug!(chain = %chain_id, "balance fetched");
            ChainBalance::ok(
                chain_id.clone(),
                raw.transparent,
                raw.shielded,
                raw.pending,
                Utc::now(),
            )
        }
        Ok(Err(err)) => {
            tracing::warn!(chain = %chain_id, error = %err, "balance fetch failed");
            ChainBalance::failed(chain_id.clone(), err.kind(), err.to_string())
        }
        Err(_) => {
            tracing::warn!(chain = %chain_id, "balance fetch hit the deadline");
            ChainBalance::timeout(chain_id.clone())
        }
    }
}
