//! Per-chain balance snapshots and the merged, user-facing balance view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::chain::ChainId;
use crate::error::ErrorKind;

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN BALANCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a chain adapter could not produce a balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    /// The shared deadline passed before the chain answered.
    Timeout,
    /// The endpoint could not be reached or the HTTP exchange failed.
    Transport,
    /// The node answered with an RPC-level error.
    Rpc,
    /// The node answered but the payload was unusable.
    InvalidData,
    /// The fetch was abandoned because its session went away.
    Cancelled,
}

impl AdapterErrorKind {
    pub fn as_error_kind(self) -> ErrorKind {
        match self {
            Self::Timeout => ErrorKind::AdapterTimeout,
            _ => ErrorKind::AdapterError,
        }
    }
}

/// Result of one fetch, as data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainOutcome {
    Ok {
        transparent: Amount,
        /// Absent when the chain has no privacy pool.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shielded: Option<Amount>,
        pending: Amount,
    },
    Failed {
        error_kind: AdapterErrorKind,
        message: String,
    },
}

/// Raw balance snapshot returned by one chain adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBalance {
    pub chain_id: ChainId,
    pub fetched_at: DateTime<Utc>,
    pub outcome: ChainOutcome,
}

impl ChainBalance {
    pub fn ok(
        chain_id: ChainId,
        transparent: Amount,
        shielded: Option<Amount>,
        pending: Amount,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            chain_id,
            fetched_at,
            outcome: ChainOutcome::Ok {
                transparent,
                shielded,
                pending,
            },
        }
    }

    pub fn failed(
        chain_id: ChainId,
        error_kind: AdapterErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            chain_id,
            fetched_at: Utc::now(),
            outcome: ChainOutcome::Failed {
                error_kind,
                message: message.into(),
            },
        }
    }

    pub fn timeout(chain_id: ChainId) -> Self {
        Self::failed(chain_id, AdapterErrorKind::Timeout, "deadline exceeded")
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, ChainOutcome::Ok { .. })
    }

    pub fn error_kind(&self) -> Option<AdapterErrorKind> {
        match &self.outcome {
            ChainOutcome::Ok { .. } => None,
            ChainOutcome::Failed { error_kind, .. } => Some(*error_kind),
        }
    }

    pub fn transparent_amount(&self) -> Option<Amount> {
        match &self.outcome {
            ChainOutcome::Ok { transparent, .. } => Some(*transparent),
            ChainOutcome::Failed { .. } => None,
        }
    }

    pub fn shielded_amount(&self) -> Option<Amount> {
        match &self.outcome {
            ChainOutcome::Ok { shielded, .. } => *shielded,
            ChainOutcome::Failed { .. } => None,
        }
    }

    pub fn pending_amount(&self) -> Option<Amount> {
        match &self.outcome {
            ChainOutcome::Ok { pending, .. } => Some(*pending),
            ChainOutcome::Failed { .. } => None,
        }
    }

    /// Whether the chain reported non-zero funds in a privacy pool.
    pub fn has_shielded_funds(&self) -> bool {
        self.shielded_amount().is_some_and(|a| !a.is_zero())
    }

    pub fn status(&self) -> ChainStatus {
        ChainStatus {
            chain_id: self.chain_id.clone(),
            ok: self.is_ok(),
            error_kind: self.error_kind(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BALANCE VIEW
// ═══════════════════════════════════════════════════════════════════════════════

/// How much of the configured chains' live data a view reflects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    /// Every adapter answered within the deadline.
    Full,
    /// Some adapters failed, at least one answered.
    Partial,
    /// A cached view (or a zero placeholder) shown while live data is missing.
    Stale,
}

/// Per-chain status for the cycle that produced a view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub chain_id: ChainId,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<AdapterErrorKind>,
}

/// Merged balance across all configured chains.
///
/// `completeness` travels with `balance` everywhere the view is serialized,
/// so a partial or stale figure can never pass for a full one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub balance: Amount,
    pub pending_balance: Amount,
    pub shielded: bool,
    pub completeness: Completeness,
    /// Set to `NoData` on the zero placeholder used when nothing was ever fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<ErrorKind>,
    #[serde(default)]
    pub chains: Vec<ChainStatus>,
    /// Latest fetch time among contributing chains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
}

impl BalanceView {
    /// Zero-valued placeholder for "balance unavailable".
    pub fn unavailable(chains: Vec<ChainStatus>) -> Self {
        Self {
            balance: Amount::ZERO,
            pending_balance: Amount::ZERO,
            shielded: false,
            completeness: Completeness::Stale,
            unavailable: Some(ErrorKind::NoData),
            chains,
            as_of: None,
        }
    }

    /// The same figures, re-tagged as stale.
    pub fn into_stale(mut self) -> Self {
        self.completeness = Completeness::Stale;
        self
    }

    pub fn is_full(&self) -> bool {
        self.completeness == Completeness::Full
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable.is_some()
    }
}
