//! Prometheus metrics for page storage operations
//!
//! - Operation counts by name and outcome
//! - Operation latency
//! - Batch chunks and items submitted to the table

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Once;
use std::time::Instant;
use tracing::error;

lazy_static::lazy_static! {
    /// Crate metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref OPERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pagestore_operations_total", "Total number of page storage operations"),
        &["operation", "status"]
    ).unwrap();

    pub static ref OPERATION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "pagestore_operation_duration_seconds",
            "Page storage operation duration in seconds"
        ).buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["operation"]
    ).unwrap();

    pub static ref BATCH_CHUNKS_TOTAL: IntCounter = IntCounter::new(
        "pagestore_batch_chunks_total",
        "Batch write chunks committed"
    ).unwrap();

    pub static ref BATCH_ITEMS_TOTAL: IntCounter = IntCounter::new(
        "pagestore_batch_items_total",
        "Requests committed through batch writes"
    ).unwrap();
}

static INIT: Once = Once::new();

/// Registers all collectors with [`METRICS_REGISTRY`]. Safe to call repeatedly.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(OPERATIONS_TOTAL.clone()),
            Box::new(OPERATION_DURATION.clone()),
            Box::new(BATCH_CHUNKS_TOTAL.clone()),
            Box::new(BATCH_ITEMS_TOTAL.clone()),
        ];
        for collector in collectors {
            if let Err(e) = METRICS_REGISTRY.register(collector) {
                error!(error = %e, "Failed to register metric");
            }
        }
    });
}

/// Prometheus text exposition of the registry.
pub fn export_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&METRICS_REGISTRY.gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Records outcome and duration of one operation.
pub struct OperationTimer {
    operation: &'static str,
    started: Instant,
}

impl OperationTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            started: Instant::now(),
        }
    }

    pub fn finish<T, E>(self, result: &std::result::Result<T, E>) {
        let status = if result.is_ok() { "ok" } else { "error" };
        OPERATIONS_TOTAL
            .with_label_values(&[self.operation, status])
            .inc();
        OPERATION_DURATION
            .with_label_values(&[self.operation])
            .observe(self.started.elapsed().as_secs_f64());
    }
}
