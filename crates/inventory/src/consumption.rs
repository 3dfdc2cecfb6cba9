//! Daily consumption estimation.
//!
//! Reduces a [`Segmentation`] to a single units-per-day figure, applying the
//! insufficient-data rules and the caller's confidence thresholds.

use serde::{Deserialize, Serialize};

use stockwise_core::error::ensure_non_negative;
use stockwise_core::{DomainResult, ValueObject};

use crate::period::{AnomalyPolicy, ConsumptionSummary, segment};
use crate::transaction::Transaction;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Days per month used for monthly projections.
pub const DAYS_PER_MONTH: f64 = 30.0;

/// Fewer whole days of valid periods than this yields no estimate.
pub const MIN_WHOLE_DAYS: f64 = 2.0;

/// Per-call estimation thresholds.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateOptions {
    /// Minimum number of accepted periods.
    pub min_periods: usize,
    /// Minimum in-window days covered by accepted periods.
    pub min_window: f64,
    pub anomaly_policy: AnomalyPolicy,
}

impl EstimateOptions {
    pub fn with_min_periods(mut self, min_periods: usize) -> Self {
        self.min_periods = min_periods;
        self
    }

    pub fn with_min_window(mut self, min_window: f64) -> Self {
        self.min_window = min_window;
        self
    }

    pub fn with_anomaly_policy(mut self, anomaly_policy: AnomalyPolicy) -> Self {
        self.anomaly_policy = anomaly_policy;
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        ensure_non_negative("min_window", self.min_window)
    }
}

/// Estimated consumption in units per day.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyRate(f64);

impl ValueObject for DailyRate {}

impl DailyRate {
    pub fn per_day(&self) -> f64 {
        self.0
    }

    pub fn monthly(&self) -> f64 {
        self.0 * DAYS_PER_MONTH
    }

    /// Rate rounded to `places` decimal places, for display.
    pub fn rounded(&self, places: u32) -> f64 {
        let scale = 10f64.powi(places as i32);
        (self.0 * scale).round() / scale
    }
}

impl core::fmt::Display for DailyRate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/day", self.0)
    }
}

/// Estimate the daily consumption rate of one (location, product) ledger.
///
/// Returns `Ok(None)` when the ledger does not hold enough evidence: no accepted
/// period, under two whole days of accepted time, or a threshold in `options`
/// not met. Callers must treat `None` as "unknown", not as zero.
pub fn estimate(
    transactions: &[Transaction],
    window_length_days: f64,
    options: &EstimateOptions,
) -> DomainResult<Option<DailyRate>> {
    options.validate()?;
    let segmentation = segment(transactions, window_length_days, options.anomaly_policy)?;
    Ok(rate_from_summary(&segmentation.summarize(), options))
}

/// Apply the insufficient-data rules and thresholds to an aggregate.
pub fn rate_from_summary(
    summary: &ConsumptionSummary,
    options: &EstimateOptions,
) -> Option<DailyRate> {
    if summary.periods == 0 || summary.total_days.floor() < MIN_WHOLE_DAYS {
        tracing::debug!(
            periods = summary.periods,
            total_days = summary.total_days,
            "insufficient data for consumption estimate"
        );
        return None;
    }
    if summary.periods < options.min_periods {
        tracing::debug!(
            periods = summary.periods,
            min_periods = options.min_periods,
            "consumption estimate below period threshold"
        );
        return None;
    }
    if summary.total_days < options.min_window {
        tracing::debug!(
            total_days = summary.total_days,
            min_window = options.min_window,
            "consumption estimate below window threshold"
        );
        return None;
    }

    let total_seconds = summary.total_days * SECONDS_PER_DAY;
    let rate = (summary.total_consumption / total_seconds).abs() * SECONDS_PER_DAY;
    tracing::debug!(
        periods = summary.periods,
        total_days = summary.total_days,
        rate,
        "consumption estimated"
    );
    Some(DailyRate(rate))
}
