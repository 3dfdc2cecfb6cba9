//! Multi-ledger store and batch estimation.
//!
//! Groups timestamped entries per (location, product) and runs one independent
//! estimation per pair. No state is shared between estimations, so callers may
//! also fan the pairs out across threads themselves.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use stockwise_core::{DomainResult, LocationId, ProductId};

use crate::config::ConsumptionConfig;
use crate::consumption::{DailyRate, estimate};
use crate::transaction::{StockTransaction, Transaction};

/// Ledger key: one product at one location.
pub type LedgerKey = (LocationId, ProductId);

#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    entries: BTreeMap<LedgerKey, Vec<StockTransaction>>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Entries sharing a timestamp keep their recording order.
    pub fn record(&mut self, tx: StockTransaction) {
        self.entries
            .entry((tx.location_id, tx.product_id))
            .or_default()
            .push(tx);
    }

    pub fn keys(&self) -> impl Iterator<Item = &LedgerKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest-first transactions for one pair, aged relative to `as_of`.
    ///
    /// Entries recorded after `as_of` are left out.
    pub fn transactions_as_of(
        &self,
        key: &LedgerKey,
        as_of: DateTime<Utc>,
    ) -> DomainResult<Vec<Transaction>> {
        let Some(entries) = self.entries.get(key) else {
            return Ok(Vec::new());
        };

        let mut visible: Vec<&StockTransaction> =
            entries.iter().filter(|tx| tx.occurred_at <= as_of).collect();
        // Stable: same-instant entries keep recording order.
        visible.sort_by_key(|tx| tx.occurred_at);

        visible
            .into_iter()
            .map(|tx| Transaction::from_stock_transaction(tx, as_of))
            .collect()
    }

    pub fn estimate(
        &self,
        key: &LedgerKey,
        as_of: DateTime<Utc>,
        config: &ConsumptionConfig,
    ) -> DomainResult<Option<DailyRate>> {
        config.validate()?;
        let transactions = self.transactions_as_of(key, as_of)?;
        estimate(&transactions, config.window_length_days(), &config.options())
    }

    /// Estimate every pair in the ledger.
    ///
    /// A failure for one pair is reported in its slot and does not affect the others.
    pub fn estimate_all(
        &self,
        as_of: DateTime<Utc>,
        config: &ConsumptionConfig,
    ) -> BTreeMap<LedgerKey, DomainResult<Option<DailyRate>>> {
        let results: BTreeMap<_, _> = self
            .entries
            .keys()
            .map(|key| (*key, self.estimate(key, as_of, config)))
            .collect();

        let estimated = results.values().filter(|r| matches!(r, Ok(Some(_)))).count();
        tracing::info!(
            ledgers = results.len(),
            estimated,
            %as_of,
            "batch consumption estimation finished"
        );
        results
    }
}
