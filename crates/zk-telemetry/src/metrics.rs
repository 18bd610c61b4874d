//! Prometheus metrics for the pooled prover.
//!
//! All metrics follow the naming convention: `zk_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., requests_sent_total)
//! - **Gauge**: Value that can go up or down (e.g., pool_slots_live)
//! - **Histogram**: Distribution of values (e.g., pooled_op_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Gauge, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::sync::Once;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // TRANSPORT METRICS
    // =========================================================================

    /// Requests sent to execution contexts
    pub static ref REQUESTS_SENT: CounterVec = CounterVec::new(
        Opts::new("zk_transport_requests_sent_total", "Requests sent to execution contexts"),
        &["op"]
    ).expect("metric creation failed");

    /// Requests that completed with a failure, by kind
    pub static ref REQUEST_FAILURES: CounterVec = CounterVec::new(
        Opts::new("zk_transport_request_failures_total", "Failed requests by failure kind"),
        &["kind"]  // kind: closed/timeout/remote/codec
    ).expect("metric creation failed");

    /// Inbound frames dropped (malformed or uncorrelated)
    pub static ref FRAMES_DROPPED: IntCounter = IntCounter::new(
        "zk_transport_frames_dropped_total",
        "Inbound frames dropped because they were malformed or matched no pending request"
    ).expect("metric creation failed");

    // =========================================================================
    // POOL METRICS
    // =========================================================================

    /// Live execution contexts across all pools
    pub static ref POOL_SLOTS_LIVE: Gauge = Gauge::new(
        "zk_pool_slots_live",
        "Number of execution contexts currently alive"
    ).expect("metric creation failed");

    /// Pooled operation duration
    pub static ref POOLED_OP_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "zk_pool_pooled_op_duration_seconds",
            "Wall time of partitioned operations, including reduction"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("valid buckets")),
        &["op"]  // op: pippenger/fft
    ).expect("metric creation failed");

    /// Failed sub-tasks of partitioned operations
    pub static ref SUBTASK_FAILURES: CounterVec = CounterVec::new(
        Opts::new("zk_pool_subtask_failures_total", "Failed sub-tasks by operation"),
        &["op"]
    ).expect("metric creation failed");
}

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Safe to call more than once; only the first call registers.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let mut result = Ok(());
    REGISTER.call_once(|| {
        let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(REQUESTS_SENT.clone()),
            Box::new(REQUEST_FAILURES.clone()),
            Box::new(FRAMES_DROPPED.clone()),
            Box::new(POOL_SLOTS_LIVE.clone()),
            Box::new(POOLED_OP_DURATION.clone()),
            Box::new(SUBTASK_FAILURES.clone()),
        ];

        for metric in metrics {
            if let Err(e) = REGISTRY.register(metric) {
                result = Err(TelemetryError::MetricsInit(e.to_string()));
                return;
            }
        }
    });
    result
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct OpTimer {
    histogram: prometheus::Histogram,
    start: std::time::Instant,
}

impl OpTimer {
    /// Start timing a pooled operation.
    pub fn start(op: &str) -> Self {
        Self {
            histogram: POOLED_OP_DURATION.with_label_values(&[op]),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for OpTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_encode_contains_registered_metric() {
        register_metrics().unwrap();
        FRAMES_DROPPED.inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("zk_transport_frames_dropped_total"));
    }

    #[test]
    fn test_op_timer_observes_on_drop() {
        let before = POOLED_OP_DURATION.with_label_values(&["test-op"]).get_sample_count();
        {
            let _timer = OpTimer::start("test-op");
        }
        let after = POOLED_OP_DURATION.with_label_values(&["test-op"]).get_sample_count();
        assert_eq!(after, before + 1);
    }
}
