//! Fixed-precision, non-negative amounts.
//!
//! Balances coming back from different chains are summed, so they must never
//! go through floating point. `Amount` wraps a `rust_decimal::Decimal` whose
//! additions are exact and order-independent for every value this crate can
//! construct.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Decimal places of a zatoshi-denominated Zcash amount.
pub const ZATOSHI_SCALE: u32 = 8;

/// Decimal places kept for NEAR amounts.
///
/// yoctoNEAR has 24 decimal places, which would leave only ~79k NEAR of
/// headroom in a 96-bit mantissa. Amounts are truncated to 12 places instead.
pub const NEAR_SCALE: u32 = 12;

/// yoctoNEAR digits dropped when converting to [`NEAR_SCALE`].
pub const YOCTO_TRUNCATION: u32 = 24 - NEAR_SCALE;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount must not be negative: {0}")]
    Negative(String),

    #[error("amount overflows the fixed-precision range")]
    Overflow,

    #[error("invalid amount '{0}'")]
    Parse(String),
}

/// A non-negative decimal amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() {
            if !value.is_zero() {
                return Err(AmountError::Negative(value.to_string()));
            }
            return Ok(Self::ZERO);
        }
        Ok(Self(value))
    }

    /// Build an amount from an integer count of base units (zatoshi, etc).
    pub fn from_base_units(units: u128, scale: u32) -> Result<Self, AmountError> {
        let mantissa = i128::try_from(units).map_err(|_| AmountError::Overflow)?;
        Decimal::try_from_i128_with_scale(mantissa, scale)
            .map(Self)
            .map_err(|_| AmountError::Overflow)
    }

    /// Convert zatoshi into ZEC.
    pub fn from_zatoshi(zats: u64) -> Self {
        Self(Decimal::from_i128_with_scale(zats as i128, ZATOSHI_SCALE))
    }

    /// Convert yoctoNEAR into NEAR, truncated to [`NEAR_SCALE`] places.
    pub fn from_yocto(yocto: u128) -> Result<Self, AmountError> {
        Self::from_base_units(yocto / 10u128.pow(YOCTO_TRUNCATION), NEAR_SCALE)
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// `self - other`, floored at zero.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        if other.0 >= self.0 {
            return Amount::ZERO;
        }
        Amount(self.0 - other.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|_| AmountError::Parse(s.to_string()))?;
        Self::new(value)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
