//! Tracing/logging setup shared by binaries and test harnesses.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{LogFormat, ObservabilityConfig};

/// Initialize process-wide tracing with JSON output and `RUST_LOG` filtering.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    crate::tracing::init_with(&ObservabilityConfig::default());
}

/// Initialize process-wide tracing from an explicit configuration.
pub fn init_with(config: &ObservabilityConfig) {
    crate::tracing::init_with(config);
}
