//! Balance aggregation: concurrent fan-out to every chain adapter under one
//! shared deadline, merged into a single `BalanceView`.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use zsecret_chains::SharedAdapter;
use zsecret_common::{
    AdapterErrorKind, Amount, BalanceView, ChainBalance, ChainOutcome, ChainStatus, Completeness,
    WalletAddress,
};

// ═══════════════════════════════════════════════════════════════════════════════
// FAN-OUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Fetch from all `adapters` concurrently and merge the results.
///
/// `last_good` is returned (re-tagged `Stale`) when no chain answers.
pub async fn aggregate(
    address: &WalletAddress,
    adapters: &[SharedAdapter],
    deadline: Instant,
    last_good: Option<&BalanceView>,
) -> BalanceView {
    let fetches = adapters
        .iter()
        .map(|adapter| fetch_guarded(adapter, address, deadline));
    let results = join_all(fetches).await;
    merge(results, last_good)
}

/// One adapter fetch that always yields a `ChainBalance` by `deadline`, even
/// if the adapter hangs or panics.
async fn fetch_guarded(
    adapter: &SharedAdapter,
    address: &WalletAddress,
    deadline: Instant,
) -> ChainBalance {
    let chain_id = adapter.chain_id().clone();
    let fetch = AssertUnwindSafe(adapter.fetch(address, deadline)).catch_unwind();

    match tokio::time::timeout_at(deadline, fetch).await {
        Ok(Ok(mut balance)) => {
            if balance.chain_id != chain_id {
                tracing::warn!(
                    chain = %chain_id,
                    reported = %balance.chain_id,
                    "adapter reported a foreign chain id"
                );
                balance.chain_id = chain_id;
            }
            balance
        }
        Ok(Err(_)) => {
            tracing::error!(chain = %chain_id, "chain adapter panicked");
            ChainBalance::failed(chain_id, AdapterErrorKind::InvalidData, "adapter panicked")
        }
        Err(_) => ChainBalance::timeout(chain_id),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MERGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Merge per-chain results into a view.
///
/// Pure: the same inputs always give the same view, whatever their order.
pub fn merge(mut results: Vec<ChainBalance>, last_good: Option<&BalanceView>) -> BalanceView {
    results.sort_by(|a, b| a.chain_id.cmp(&b.chain_id));

    let mut chains: Vec<ChainStatus> = Vec::with_capacity(results.len());
    let mut balance = Amount::ZERO;
    let mut pending_balance = Amount::ZERO;
    let mut shielded = false;
    let mut as_of = None;
    let mut contributed = 0usize;

    for result in &results {
        let ChainOutcome::Ok {
            transparent,
            shielded: shielded_amount,
            pending,
        } = &result.outcome
        else {
            chains.push(result.status());
            continue;
        };

        let sums = transparent
            .checked_add(shielded_amount.unwrap_or(Amount::ZERO))
            .and_then(|confirmed| balance.checked_add(confirmed))
            .zip(pending_balance.checked_add(*pending));
        let Some((next_balance, next_pending)) = sums else {
            tracing::warn!(
                chain = %result.chain_id,
                "balance overflows the merged total, dropping chain"
            );
            chains.push(ChainStatus {
                chain_id: result.chain_id.clone(),
                ok: false,
                error_kind: Some(AdapterErrorKind::InvalidData),
            });
            continue;
        };

        balance = next_balance;
        pending_balance = next_pending;
        shielded |= result.has_shielded_funds();
        as_of = as_of.max(Some(result.fetched_at));
        contributed += 1;
        chains.push(result.status());
    }

    let failed = chains.len() - contributed;
    if contributed == 0 {
        return match last_good {
            Some(previous) => BalanceView {
                chains,
                ..previous.clone().into_stale()
            },
            None => BalanceView::unavailable(chains),
        };
    }

    BalanceView {
        balance,
        pending_balance,
        shielded,
        completeness: if failed == 0 {
            Completeness::Full
        } else {
            Completeness::Partial
        },
        unavailable: None,
        chains,
        as_of,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AGGREGATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// The configured adapter set plus the per-cycle deadline.
#[derive(Clone)]
pub struct BalanceAggregator {
    adapters: Vec<SharedAdapter>,
    deadline: Duration,
}

impl BalanceAggregator {
    pub fn new(adapters: Vec<SharedAdapter>, deadline: Duration) -> Self {
        Self { adapters, deadline }
    }

    pub fn adapters(&self) -> &[SharedAdapter] {
        &self.adapters
    }

    /// Run one cycle. Returns `None` if `cancel` fires first; in-flight
    /// fetches are dropped with it.
    pub async fn run(
        &self,
        address: &WalletAddress,
        last_good: Option<&BalanceView>,
        cancel: &CancellationToken,
    ) -> Option<BalanceView> {
        let deadline = Instant::now() + self.deadline;
        tokio::select! {
            _ = cancel.cancelled() => None,
            view = aggregate(address, &self.adapters, deadline, last_good) => Some(view),
        }
    }
}
