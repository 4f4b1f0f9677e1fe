//! Pipeline metrics
//!
//! Names and label sets of the metrics the resilient client records.

use std::sync::Arc;
use std::time::Duration;

use finguard_core::{
    CircuitState, LabeledCounter, LabeledGauge, LabeledHistogram, MetricsRegistry,
    StateChangeHook,
};

/// Per-attempt latency histogram, labels `provider`, `method`, `status`
pub const REQUEST_DURATION: &str = "finguard_http_request_duration_seconds";
/// Failed attempts, labels `provider`, `type`
pub const API_ERRORS: &str = "finguard_external_api_errors_total";
/// Breaker state gauge, label `name`
pub const BREAKER_STATE: &str = "finguard_circuit_breaker_state";
/// Calls abandoned while waiting for a token, label `provider`
pub const RATE_LIMIT_REJECTIONS: &str = "finguard_rate_limit_rejections_total";

/// Outcome of one attempt, used as the `status` label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    /// The source returned a price
    Success,
    /// The source returned an error
    Error,
    /// The breaker rejected the attempt
    Rejected,
    /// The caller cancelled mid-attempt
    Cancelled,
}

impl AttemptStatus {
    /// Label value
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Error => "error",
            AttemptStatus::Rejected => "rejected",
            AttemptStatus::Cancelled => "cancelled",
        }
    }
}

/// Handles to the pipeline metrics in one registry
#[derive(Debug, Clone)]
pub struct ResilienceMetrics {
    registry: MetricsRegistry,
    request_duration: LabeledHistogram,
    api_errors: LabeledCounter,
    breaker_state: LabeledGauge,
    rate_limit_rejections: LabeledCounter,
}

impl Default for ResilienceMetrics {
    fn default() -> Self {
        Self::new(&MetricsRegistry::new())
    }
}

impl ResilienceMetrics {
    /// Register the pipeline metrics in `registry`
    pub fn new(registry: &MetricsRegistry) -> Self {
        registry.describe(
            REQUEST_DURATION,
            "Duration of external API requests in seconds",
        );
        registry.describe(API_ERRORS, "Total number of external API errors");
        registry.describe(
            BREAKER_STATE,
            "Current state of the circuit breaker (0: Closed, 1: Open, 2: Half-Open)",
        );
        registry.describe(
            RATE_LIMIT_REJECTIONS,
            "Total number of calls cancelled while waiting for a rate limit token",
        );

        Self {
            registry: registry.clone(),
            request_duration: registry.labeled_histogram(REQUEST_DURATION),
            api_errors: registry.labeled_counter(API_ERRORS),
            breaker_state: registry.labeled_gauge(BREAKER_STATE),
            rate_limit_rejections: registry.labeled_counter(RATE_LIMIT_REJECTIONS),
        }
    }

    /// Metrics in the process-wide registry
    pub fn global() -> Self {
        Self::new(finguard_core::metrics_global::registry())
    }

    /// The backing registry
    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    /// Record the duration of one attempt
    pub fn observe_attempt(
        &self,
        provider: &str,
        method: &str,
        status: AttemptStatus,
        elapsed: Duration,
    ) {
        self.request_duration.observe(
            &[
                ("provider", provider),
                ("method", method),
                ("status", status.as_str()),
            ],
            elapsed.as_secs_f64(),
        );
    }

    /// Count a failed attempt
    pub fn record_error(&self, provider: &str, error_type: &str) {
        self.api_errors
            .inc(&[("provider", provider), ("type", error_type)]);
    }

    /// Count a call abandoned at the rate limiter
    pub fn record_rate_limit_rejection(&self, provider: &str) {
        self.rate_limit_rejections.inc(&[("provider", provider)]);
    }

    /// Publish a breaker state
    pub fn set_breaker_state(&self, name: &str, state: CircuitState) {
        self.breaker_state.set(&[("name", name)], state.as_gauge());
    }

    /// Hook that keeps the breaker gauge in sync with transitions
    pub fn state_change_hook(&self) -> StateChangeHook {
        let gauge = self.breaker_state.clone();
        Arc::new(move |name, _from, to| {
            gauge.set(&[("name", name)], to.as_gauge());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_updates_gauge() {
        let metrics = ResilienceMetrics::default();
        let hook = metrics.state_change_hook();
        hook("market-api", CircuitState::Closed, CircuitState::Open);

        let output = metrics.registry().export_prometheus();
        assert!(output.contains("finguard_circuit_breaker_state{name=\"market-api\"} 1"));
    }

    #[test]
    fn test_attempt_labels() {
        let metrics = ResilienceMetrics::default();
        metrics.observe_attempt(
            "simulated",
            "get_price",
            AttemptStatus::Rejected,
            Duration::from_millis(1),
        );
        metrics.record_error("simulated", "circuit_open");
        metrics.record_rate_limit_rejection("simulated");

        let output = metrics.registry().export_prometheus();
        assert!(output.contains("# HELP finguard_external_api_errors_total"));
        assert!(output.contains(
            "finguard_http_request_duration_seconds_count{provider=\"simulated\",method=\"get_price\",status=\"rejected\"} 1"
        ));
        assert!(output.contains(
            "finguard_external_api_errors_total{provider=\"simulated\",type=\"circuit_open\"} 1"
        ));
        assert!(output.contains("finguard_rate_limit_rejections_total{provider=\"simulated\"} 1"));
    }
}
