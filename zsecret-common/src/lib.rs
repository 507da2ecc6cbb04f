//! zsecret-common
//!
//! Types shared by the chain adapters, the session core and the HTTP service:
//! fixed-precision amounts, chain identifiers, wallet addresses, per-chain
//! balance snapshots and the merged `BalanceView`.

pub mod amount;
pub mod balance;
pub mod chain;
pub mod error;

pub use amount::{Amount, AmountError, NEAR_SCALE, ZATOSHI_SCALE};
pub use balance::{
    AdapterErrorKind, BalanceView, ChainBalance, ChainOutcome, ChainStatus, Completeness,
};
pub use chain::{ChainFamily, ChainId, WalletAddress};
pub use error::ErrorKind;
