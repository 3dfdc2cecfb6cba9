//! Inventory consumption inference.
//!
//! Estimates a daily consumption rate for one product at one location from an
//! irregular ledger of stock-on-hand counts, receipts, consumption reports and
//! stockouts. Pure, deterministic domain logic: no IO, no storage, no shared state.

pub mod config;
pub mod consumption;
pub mod ledger;
pub mod period;
pub mod transaction;

pub use config::ConsumptionConfig;
pub use consumption::{DailyRate, EstimateOptions, estimate, rate_from_summary};
pub use ledger::{LedgerKey, StockLedger};
pub use period::{AnomalyPolicy, ConsumptionSummary, Exclusion, Period, Segmentation, segment};
pub use transaction::{StockTransaction, Transaction, TransactionKind};
