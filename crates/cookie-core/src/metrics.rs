//! Stock [`MetricsSink`] implementations.

use crate::store::MetricsSink;

/// Emits every sample as a `debug` event on the `metrics` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
  fn record(&self, name: &str, value: f64) {
    tracing::debug!(target: "metrics", metric = name, value, "metric recorded");
  }
}

/// Discards every sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
  fn record(&self, _name: &str, _value: f64) {}
}
