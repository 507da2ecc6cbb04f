//! Chain identifiers and wallet addresses.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Chain identifier for the balance sources.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChainId {
    /// Zcash mainnet
    ZcashMainnet,
    /// Zcash testnet
    ZcashTestnet,
    /// NEAR mainnet
    NearMainnet,
    /// NEAR testnet
    NearTestnet,
    /// Custom chain with string identifier
    Custom(String),
}

impl ChainId {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ZcashMainnet => "zcash_mainnet",
            Self::ZcashTestnet => "zcash_testnet",
            Self::NearMainnet => "near_mainnet",
            Self::NearTestnet => "near_testnet",
            Self::Custom(s) => s,
        }
    }

    fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            Self::ZcashMainnet | Self::ZcashTestnet => ChainFamily::Zcash,
            Self::NearMainnet | Self::NearTestnet => ChainFamily::Near,
            Self::Custom(_) => ChainFamily::Other,
        }
    }
}

impl From<String> for ChainId {
    fn from(value: String) -> Self {
        match value.as_str() {
            "zcash_mainnet" => Self::ZcashMainnet,
            "zcash_testnet" => Self::ZcashTestnet,
            "near_mainnet" => Self::NearMainnet,
            "near_testnet" => Self::NearTestnet,
            _ => Self::Custom(value),
        }
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Ordered by wire name so merges walk chains in a stable order. A `Custom`
// id spelled like a built-in one sorts after it, keeping `Ord` consistent
// with `Eq`.
impl Ord for ChainId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str()
            .cmp(other.as_str())
            .then_with(|| self.is_custom().cmp(&other.is_custom()))
    }
}

impl PartialOrd for ChainId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Chain family, used to pick the right account for a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Zcash,
    Near,
    Other,
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALLET ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Address of a connected wallet.
///
/// A wallet names one primary address; a multi-chain wallet can also carry
/// per-family aliases (a Zcash address plus a NEAR account, say). Adapters
/// resolve the account they query through [`WalletAddress::for_family`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddress {
    pub primary: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<ChainFamily, String>,
}

impl WalletAddress {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            aliases: BTreeMap::new(),
        }
    }

    pub fn with_alias(mut self, family: ChainFamily, account: impl Into<String>) -> Self {
        self.aliases.insert(family, account.into());
        self
    }

    pub fn for_family(&self, family: ChainFamily) -> &str {
        self.aliases
            .get(&family)
            .map(String::as_str)
            .unwrap_or(&self.primary)
    }

    pub fn for_chain(&self, chain: &ChainId) -> &str {
        self.for_family(chain.family())
    }

    /// Truncated form for display, e.g. `zs1abc...wxyz`.
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.primary.chars().collect();
        if chars.len() <= 10 {
            return self.primary.clone();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.primary)
    }
}
