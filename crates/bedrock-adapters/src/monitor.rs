//! In-memory metric storage.

use bedrock_core::codes::monitoring;
use bedrock_core::{
    ErrorInfo, HealthCheckResult, HealthStatus, MetricValue, MetricsSnapshot, Monitor, Result, VoidResult,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, warn};

const MODULE: &str = "monitoring";

/// Default sample capacity of [`InMemoryMonitor`].
pub const DEFAULT_MAX_SAMPLES: usize = 10_000;

/// [`Monitor`] keeping samples in a bounded in-memory buffer.
///
/// Health turns `Degraded` once the buffer is at least 90% full and
/// `Unhealthy` when it is full; new samples are rejected with
/// `STORAGE_FULL` until [`reset`](Monitor::reset) is called.
#[derive(Debug)]
pub struct InMemoryMonitor {
    source_id: String,
    max_samples: usize,
    samples: RwLock<Vec<MetricValue>>,
}

impl InMemoryMonitor {
    #[must_use]
    pub fn new(source_id: impl Into<String>) -> Self {
        Self::with_capacity(source_id, DEFAULT_MAX_SAMPLES)
    }

    #[must_use]
    pub fn with_capacity(source_id: impl Into<String>, max_samples: usize) -> Self {
        Self {
            source_id: source_id.into(),
            max_samples,
            samples: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.read().len()
    }

    fn push(&self, sample: MetricValue) -> VoidResult {
        if sample.name.trim().is_empty() {
            return Err(ErrorInfo::invalid_argument("metric name must not be empty", MODULE));
        }

        let mut samples = self.samples.write();
        if samples.len() >= self.max_samples {
            warn!(source = %self.source_id, capacity = self.max_samples, "Metric storage full");
            return Err(ErrorInfo::new(
                monitoring::STORAGE_FULL,
                format!("metric storage full ({} samples)", self.max_samples),
                MODULE,
            ));
        }
        samples.push(sample);
        Ok(())
    }
}

impl Default for InMemoryMonitor {
    fn default() -> Self {
        Self::new("bedrock")
    }
}

impl Monitor for InMemoryMonitor {
    fn record_metric(&self, name: &str, value: f64) -> VoidResult {
        self.push(MetricValue::new(name, value))
    }

    fn record_metric_with_tags(&self, name: &str, value: f64, tags: &BTreeMap<String, String>) -> VoidResult {
        self.push(MetricValue::new(name, value).with_tags(tags.clone()))
    }

    fn metrics(&self) -> Result<MetricsSnapshot> {
        let mut snapshot = MetricsSnapshot::new(self.source_id.clone());
        snapshot.metrics = self.samples.read().clone();
        Ok(snapshot)
    }

    fn check_health(&self) -> Result<HealthCheckResult> {
        let started = Instant::now();
        let used = self.sample_count();

        let mut result = if used >= self.max_samples {
            HealthCheckResult::new(HealthStatus::Unhealthy, "metric storage full")
        } else if used.saturating_mul(10) >= self.max_samples.saturating_mul(9) {
            HealthCheckResult::new(HealthStatus::Degraded, "metric storage nearly full")
        } else {
            HealthCheckResult::healthy("metric storage available")
        };

        result.metadata.insert("samples".to_string(), used.to_string());
        result.metadata.insert("capacity".to_string(), self.max_samples.to_string());
        result.check_duration = started.elapsed();
        Ok(result)
    }

    fn reset(&self) -> VoidResult {
        let cleared = std::mem::take(&mut *self.samples.write()).len();
        debug!(source = %self.source_id, cleared, "Metrics reset");
        Ok(())
    }
}

/// [`Monitor`] that records nothing. Used when monitoring is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMonitor;

impl Monitor for NullMonitor {
    fn record_metric(&self, _name: &str, _value: f64) -> VoidResult {
        Ok(())
    }

    fn record_metric_with_tags(&self, _name: &str, _value: f64, _tags: &BTreeMap<String, String>) -> VoidResult {
        Ok(())
    }

    fn metrics(&self) -> Result<MetricsSnapshot> {
        Ok(MetricsSnapshot::new("null"))
    }

    fn check_health(&self) -> Result<HealthCheckResult> {
        Ok(HealthCheckResult::new(HealthStatus::Unknown, "monitoring disabled"))
    }

    fn reset(&self) -> VoidResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bedrock_core::codes::common;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_records_and_snapshots() {
        let monitor = InMemoryMonitor::new("orders");
        monitor.record_metric("latency_ms", 12.5).unwrap();
        monitor.record_metric("latency_ms", 14.0).unwrap();

        let mut tags = BTreeMap::new();
        tags.insert("region".to_string(), "eu".to_string());
        monitor.record_metric_with_tags("requests", 1.0, &tags).unwrap();

        let snapshot = monitor.metrics().unwrap();
        assert_eq!(snapshot.source_id, "orders");
        assert_eq!(snapshot.metrics.len(), 3);
        assert!((snapshot.get("latency_ms").unwrap().value - 14.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.get("requests").unwrap().tags["region"], "eu");
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = InMemoryMonitor::default().record_metric("  ", 1.0).unwrap_err();
        assert_eq!(err.code(), common::INVALID_ARGUMENT);
    }

    #[test]
    fn test_capacity_and_health() {
        let monitor = InMemoryMonitor::with_capacity("small", 10);
        assert!(monitor.check_health().unwrap().is_healthy());

        for i in 0..9 {
            monitor.record_metric("m", f64::from(i)).unwrap();
        }
        let health = monitor.check_health().unwrap();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert!(health.is_operational());

        monitor.record_metric("m", 9.0).unwrap();
        let err = monitor.record_metric("m", 10.0).unwrap_err();
        assert_eq!(err.code(), monitoring::STORAGE_FULL);
        let health = monitor.check_health().unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.metadata["samples"], "10");

        monitor.reset().unwrap();
        assert_eq!(monitor.sample_count(), 0);
        assert!(monitor.check_health().unwrap().is_healthy());
    }

    #[test]
    fn test_concurrent_recording() {
        let monitor = Arc::new(InMemoryMonitor::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let monitor = Arc::clone(&monitor);
                thread::spawn(move || {
                    for i in 0..100 {
                        monitor.record_metric(&format!("thread_{t}"), f64::from(i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(monitor.sample_count(), 800);
    }

    #[test]
    fn test_null_monitor() {
        let monitor: Arc<dyn Monitor> = Arc::new(NullMonitor);
        monitor.record_metric("ignored", 1.0).unwrap();
        assert!(monitor.metrics().unwrap().metrics.is_empty());
        let health = monitor.check_health().unwrap();
        assert_eq!(health.status, HealthStatus::Unknown);
        assert!(!health.is_operational());
    }
}
