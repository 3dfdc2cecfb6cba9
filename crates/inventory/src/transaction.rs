//! Stock ledger entries.
//!
//! A [`Transaction`] is one observation for a single (location, product) pair,
//! positioned in time by its age relative to the estimation reference point.
//! [`StockTransaction`] is the timestamped form callers usually persist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_core::error::ensure_non_negative;
use stockwise_core::{DomainError, DomainResult, LocationId, ProductId, ValueObject};

/// Milliseconds in one day, used to turn timestamp deltas into fractional ages.
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Kind of ledger entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Absolute on-hand count at that instant.
    StockOnHand,
    /// Quantity received since the prior observation.
    Receipt,
    /// Quantity consumed since the prior observation (informational).
    Consumption,
    /// An on-hand count of zero. Voids the periods on both sides of it.
    Stockout,
}

/// One observed event for a single (location, product) pair.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub quantity: f64,
    /// Days elapsed between this entry and "now".
    pub age_in_days: f64,
}

impl ValueObject for Transaction {}

impl Transaction {
    pub fn new(kind: TransactionKind, quantity: f64, age_in_days: f64) -> Self {
        Self {
            kind,
            quantity,
            age_in_days,
        }
    }

    pub fn stock_on_hand(quantity: f64, age_in_days: f64) -> Self {
        Self::new(TransactionKind::StockOnHand, quantity, age_in_days)
    }

    pub fn receipt(quantity: f64, age_in_days: f64) -> Self {
        Self::new(TransactionKind::Receipt, quantity, age_in_days)
    }

    pub fn consumption(quantity: f64, age_in_days: f64) -> Self {
        Self::new(TransactionKind::Consumption, quantity, age_in_days)
    }

    pub fn stockout(age_in_days: f64) -> Self {
        Self::new(TransactionKind::Stockout, 0.0, age_in_days)
    }

    /// Convert a timestamped entry into an age relative to `as_of`.
    ///
    /// Entries that occur after `as_of` are rejected.
    pub fn from_stock_transaction(
        tx: &StockTransaction,
        as_of: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let elapsed = as_of.signed_duration_since(tx.occurred_at);
        if elapsed < chrono::Duration::zero() {
            return Err(DomainError::validation(format!(
                "transaction at {} occurs after the as-of time {}",
                tx.occurred_at, as_of
            )));
        }
        let age_in_days = elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY;
        let t = Self::new(tx.kind, tx.quantity, age_in_days);
        t.validate()?;
        Ok(t)
    }

    /// A stockout, explicit or as a zero stock-on-hand count.
    pub fn is_stockout(&self) -> bool {
        match self.kind {
            TransactionKind::Stockout => true,
            TransactionKind::StockOnHand => self.quantity == 0.0,
            TransactionKind::Receipt | TransactionKind::Consumption => false,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        ensure_non_negative("quantity", self.quantity)?;
        ensure_non_negative("age_in_days", self.age_in_days)?;
        if self.kind == TransactionKind::Stockout && self.quantity != 0.0 {
            return Err(DomainError::validation(format!(
                "stockout must carry a zero quantity (got {})",
                self.quantity
            )));
        }
        Ok(())
    }
}

/// A timestamped ledger entry, as recorded by the surrounding system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub location_id: LocationId,
    pub product_id: ProductId,
    pub kind: TransactionKind,
    pub quantity: f64,
    pub occurred_at: DateTime<Utc>,
}
