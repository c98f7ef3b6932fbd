//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
    Encoder, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use tracing::error;

/// Trait for recording auth controller metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records a controller operation (sign_in, sign_up, ...) with its outcome.
    fn record_operation(&self, operation: &str, result: &str);

    /// Records how long a controller operation took, including queueing.
    fn record_operation_duration(&self, operation: &str, duration_secs: f64);

    /// Records the outcome of an admin-privilege lookup: ok, error or timeout.
    fn record_admin_check(&self, result: &str);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    operations_total: CounterVec,
    operation_duration_seconds: HistogramVec,
    admin_checks_total: CounterVec,
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    ///
    /// Metric names are static, so registration into a fresh registry cannot collide.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let operations_total = register_counter_vec_with_registry!(
            Opts::new("auth_operations_total", "Auth controller operations by outcome"),
            &["operation", "result"],
            registry.clone()
        )
        .expect("Failed to register auth_operations_total");

        let operation_duration_seconds = register_histogram_vec_with_registry!(
            "auth_operation_duration_seconds",
            "Auth controller operation duration in seconds",
            &["operation"],
            vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            registry.clone()
        )
        .expect("Failed to register auth_operation_duration_seconds");

        let admin_checks_total = register_counter_vec_with_registry!(
            Opts::new("admin_check_total", "Admin privilege lookups by outcome"),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register admin_check_total");

        Metrics {
            registry,
            operations_total,
            operation_duration_seconds,
            admin_checks_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder for Metrics {
    fn record_operation(&self, operation: &str, result: &str) {
        self.operations_total
            .with_label_values(&[operation, result])
            .inc();
    }

    fn record_operation_duration(&self, operation: &str, duration_secs: f64) {
        self.operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    fn record_admin_check(&self, result: &str) {
        self.admin_checks_total.with_label_values(&[result]).inc();
    }
}
