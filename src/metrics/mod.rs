//! Metrics collection and exposition for Prometheus.
//!
//! Counts auth controller operations and admin-privilege lookups.

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};
