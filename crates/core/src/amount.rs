//! AmountCents - strictly positive integer minor units
//!
//! Every monetary amount in chainbank is a 64-bit signed integer count of
//! minor units (cents). Ledger entries carry strictly positive amounts;
//! this is enforced at the type level. Balances may of course be negative,
//! but a balance is a sum, not an `AmountCents`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur when constructing amounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount_cents must be > 0, got {0}")]
    NonPositive(i64),

    #[error("amount_cents overflow")]
    Overflow,
}

/// A strictly positive amount in minor units (cents).
///
/// # Invariant
/// The inner value is always > 0. This is enforced by the constructor.
///
/// # Example
/// ```
/// use chainbank_core::AmountCents;
///
/// let amount = AmountCents::new(2500).unwrap();
/// assert_eq!(amount.cents(), 2500);
///
/// // Zero and negative amounts are rejected
/// assert!(AmountCents::new(0).is_err());
/// assert!(AmountCents::new(-1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct AmountCents(i64);

impl AmountCents {
    /// Create a new amount from minor units.
    ///
    /// Returns an error unless the value is strictly positive.
    pub fn new(cents: i64) -> Result<Self, AmountError> {
        if cents <= 0 {
            Err(AmountError::NonPositive(cents))
        } else {
            Ok(Self(cents))
        }
    }

    /// Get the inner minor-unit count
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Checked addition - returns None on overflow
    pub fn checked_add(&self, other: AmountCents) -> Option<AmountCents> {
        self.0.checked_add(other.0).map(AmountCents)
    }
}

impl fmt::Display for AmountCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for AmountCents {
    type Error = AmountError;

    fn try_from(cents: i64) -> Result<Self, Self::Error> {
        Self::new(cents)
    }
}

impl From<AmountCents> for i64 {
    fn from(amount: AmountCents) -> Self {
        amount.0
    }
}
