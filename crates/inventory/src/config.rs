//! Per-deployment consumption configuration.
//!
//! Loaded from JSON by the surrounding system and passed explicitly to each
//! estimation; there are no process-wide defaults.

use serde::{Deserialize, Serialize};

use stockwise_core::error::{ensure_non_negative, ensure_positive};
use stockwise_core::{DomainError, DomainResult};

use crate::consumption::EstimateOptions;
use crate::period::AnomalyPolicy;

/// Default lookback window, in days.
pub const DEFAULT_OPTIMAL_WINDOW_DAYS: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumptionConfig {
    /// Minimum number of accepted periods before an estimate is trusted.
    pub min_periods: usize,
    /// Minimum days of accepted periods before an estimate is trusted.
    pub min_window: f64,
    /// Lookback window length in days.
    pub optimal_window: f64,
    pub anomaly_policy: AnomalyPolicy,
}

impl Default for ConsumptionConfig {
    fn default() -> Self {
        Self {
            min_periods: 0,
            min_window: 0.0,
            optimal_window: DEFAULT_OPTIMAL_WINDOW_DAYS,
            anomaly_policy: AnomalyPolicy::Exclude,
        }
    }
}

impl ConsumptionConfig {
    pub fn from_json(raw: &str) -> DomainResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| DomainError::validation(format!("consumption config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DomainResult<()> {
        ensure_positive("optimal_window", self.optimal_window)?;
        ensure_non_negative("min_window", self.min_window)?;
        if self.min_window > self.optimal_window {
            return Err(DomainError::validation(format!(
                "min_window ({}) cannot exceed optimal_window ({})",
                self.min_window, self.optimal_window
            )));
        }
        Ok(())
    }

    pub fn window_length_days(&self) -> f64 {
        self.optimal_window
    }

    pub fn options(&self) -> EstimateOptions {
        EstimateOptions::default()
            .with_min_periods(self.min_periods)
            .with_min_window(self.min_window)
            .with_anomaly_policy(self.anomaly_policy)
    }
}
