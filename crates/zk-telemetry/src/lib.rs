//! # ZK Telemetry
//!
//! Observability for the pooled prover.
//!
//! ## Components
//!
//! - **Logging**: `tracing` subscriber with env filter, pretty or JSON output
//! - **Metrics**: Prometheus counters, gauges and histograms for transport and pool
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zk_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ZK_LOG_LEVEL` | `info` | Log level filter |
//! | `ZK_JSON_LOGS` | `false` | JSON log lines |
//! | `ZK_SERVICE_NAME` | `zk-prover` | Service name in logs |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::{parse_flag, TelemetryConfig};
pub use metrics::{
    encode_metrics, register_metrics, OpTimer, FRAMES_DROPPED, POOLED_OP_DURATION,
    POOL_SLOTS_LIVE, REQUESTS_SENT, REQUEST_FAILURES, SUBTASK_FAILURES,
};
pub use tracing_setup::{init_tracing, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize metrics and the global tracing subscriber.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    let tracing_guard = init_tracing(&config)?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_inc_macro() {
        let before = SUBTASK_FAILURES.with_label_values(&["macro-test"]).get();
        metric_inc!(SUBTASK_FAILURES, &["macro-test"]);
        assert_eq!(SUBTASK_FAILURES.with_label_values(&["macro-test"]).get(), before + 1.0);
    }
}
