//! Observability for the admission path
//!
//! Provides:
//! - Prometheus metrics (resolution latency, overrides applied, limits capped, errors)
//! - Structured JSON logging with tracing

use crate::models::ContainerToAnnotationsMap;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Buckets for resolution latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

static GLOBAL_METRICS: OnceLock<AdmissionMetricsInner> = OnceLock::new();

struct AdmissionMetricsInner {
    resolution_latency_seconds: Histogram,
    pods_resolved: IntCounter,
    overrides_applied: IntCounter,
    limits_capped: IntCounter,
    resolution_errors: IntCounterVec,
}

impl AdmissionMetricsInner {
    fn new() -> Self {
        Self {
            resolution_latency_seconds: register_histogram!(
                "vpa_admission_resolution_latency_seconds",
                "Time spent resolving container resources for a pod",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register resolution_latency_seconds"),

            pods_resolved: register_int_counter!(
                "vpa_admission_pods_resolved_total",
                "Pods for which container resources were resolved"
            )
            .expect("Failed to register pods_resolved"),

            overrides_applied: register_int_counter!(
                "vpa_admission_overrides_applied_total",
                "Resolutions where override annotations amended the recommendation"
            )
            .expect("Failed to register overrides_applied"),

            limits_capped: register_int_counter!(
                "vpa_admission_limits_capped_total",
                "Container limits adjusted by a namespace bound or the int64 cap"
            )
            .expect("Failed to register limits_capped"),

            resolution_errors: register_int_counter_vec!(
                "vpa_admission_resolution_errors_total",
                "Failed resolutions by error kind",
                &["kind"]
            )
            .expect("Failed to register resolution_errors"),
        }
    }
}

/// Handle to the process-wide admission metrics.
///
/// Clones share the same registered collectors.
#[derive(Clone)]
pub struct AdmissionMetrics {
    _private: (),
}

impl Default for AdmissionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AdmissionMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AdmissionMetricsInner {
        GLOBAL_METRICS.get_or_init(AdmissionMetricsInner::new)
    }

    pub fn observe_resolution_latency(&self, duration_secs: f64) {
        self.inner().resolution_latency_seconds.observe(duration_secs);
    }

    pub fn inc_pods_resolved(&self) {
        self.inner().pods_resolved.inc();
    }

    pub fn inc_overrides_applied(&self) {
        self.inner().overrides_applied.inc();
    }

    /// Count limits adjusted by a namespace bound or the int64 cap
    pub fn add_limits_capped(&self, count: usize) {
        self.inner().limits_capped.inc_by(count as u64);
    }

    pub fn inc_resolution_errors(&self, kind: &str) {
        self.inner()
            .resolution_errors
            .with_label_values(&[kind])
            .inc();
    }
}

/// Structured logger for admission events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, limit_range_namespaces: usize) {
        info!(
            event = "admission_started",
            instance = %self.instance,
            version = %version,
            limit_range_namespaces = limit_range_namespaces,
            "VPA admission controller started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "admission_shutdown",
            instance = %self.instance,
            reason = %reason,
            "VPA admission controller shutting down"
        );
    }

    pub fn log_resolution(
        &self,
        pod_name: &str,
        namespace: &str,
        containers: usize,
        annotations: &ContainerToAnnotationsMap,
    ) {
        if annotations.is_empty() {
            info!(
                event = "resources_resolved",
                instance = %self.instance,
                pod_name = %pod_name,
                namespace = %namespace,
                containers = containers,
                "Resolved container resources"
            );
        } else {
            info!(
                event = "resources_resolved",
                instance = %self.instance,
                pod_name = %pod_name,
                namespace = %namespace,
                containers = containers,
                annotations = ?annotations,
                "Resolved container resources with adjustments"
            );
        }
    }

    pub fn log_resolution_failure(&self, pod_name: &str, namespace: &str, kind: &str, error: &str) {
        warn!(
            event = "resolution_failed",
            instance = %self.instance,
            pod_name = %pod_name,
            namespace = %namespace,
            kind = %kind,
            error = %error,
            "Failed to resolve container resources"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_metrics_shared_handle() {
        let metrics = AdmissionMetrics::new();
        let other = metrics.clone();

        metrics.observe_resolution_latency(0.0004);
        metrics.inc_pods_resolved();
        other.inc_overrides_applied();
        other.inc_resolution_errors("invalid_override");

        let before = metrics.inner().limits_capped.get();
        metrics.add_limits_capped(2);
        assert!(metrics.inner().limits_capped.get() >= before + 2);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("admission-0");
        assert_eq!(logger.instance, "admission-0");
    }
}
