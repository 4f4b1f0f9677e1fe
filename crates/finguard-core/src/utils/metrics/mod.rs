//! In-process metrics with Prometheus text export
//!
//! Every metric is a family of series keyed by label set. Passing an empty
//! label slice gives the plain, unlabeled series.

mod histogram;
mod labeled;
mod registry;

pub use histogram::{HistogramSnapshot, LATENCY_BUCKETS};
pub use labeled::{LabelKey, LabeledCounter, LabeledGauge, LabeledHistogram};
pub use registry::MetricsRegistry;

/// Process-wide registry for components that are not handed one
pub mod global {
    use super::MetricsRegistry;
    use std::sync::OnceLock;

    static REGISTRY: OnceLock<MetricsRegistry> = OnceLock::new();

    /// The shared registry, created on first use
    pub fn registry() -> &'static MetricsRegistry {
        REGISTRY.get_or_init(MetricsRegistry::new)
    }

    /// Prometheus text for the shared registry
    pub fn export_prometheus() -> String {
        registry().export_prometheus()
    }
}
