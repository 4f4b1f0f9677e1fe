//! Circuit Breaker pattern implementation
//!
//! Provides fault tolerance by preventing cascading failures.
//! The circuit breaker has three states:
//! - Closed: Normal operation, requests pass through
//! - Open: Failure ratio exceeded threshold, requests are rejected
//! - HalfOpen: Testing if the service has recovered, one trial at a time
//!
//! Every transition resets the counts and bumps a generation counter. A
//! result reported against an older generation is dropped, so a slow call
//! that started before a transition can never drive the next one.
//!
//! The state lock covers only bookkeeping. The wrapped operation runs with
//! no lock held, and state-change hooks run after the lock is released.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failures exceeded threshold - requests are rejected
    Open,
    /// Testing recovery - a single trial request passes through
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used by the breaker state gauge
    #[must_use]
    pub fn as_gauge(self) -> i64 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Request and failure counts since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Requests admitted
    pub requests: u32,
    /// Failed requests
    pub total_failures: u32,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Successes since the last failure
    pub consecutive_successes: u32,
}

impl Counts {
    /// Fraction of admitted requests that failed (0 when none were admitted)
    #[must_use]
    pub fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            f64::from(self.total_failures) / f64::from(self.requests)
        }
    }

    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}

/// Configuration for circuit breaker
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// How long the circuit stays open before allowing a trial request
    pub timeout: Duration,
    /// Minimum requests since the last reset before the breaker may trip
    pub min_request_threshold: u32,
    /// Failure ratio at or above which the breaker trips
    pub failure_ratio_threshold: f64,
    /// Clear the closed-state counts this often (None = only on transitions)
    pub count_interval: Option<Duration>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            min_request_threshold: 3,
            failure_ratio_threshold: 0.4,
            count_interval: None,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open-state timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the minimum request count for tripping
    #[must_use]
    pub fn with_min_request_threshold(mut self, threshold: u32) -> Self {
        self.min_request_threshold = threshold;
        self
    }

    /// Set the failure ratio for tripping
    #[must_use]
    pub fn with_failure_ratio_threshold(mut self, ratio: f64) -> Self {
        self.failure_ratio_threshold = ratio;
        self
    }

    /// Periodically clear the closed-state counts
    #[must_use]
    pub fn with_count_interval(mut self, interval: Duration) -> Self {
        self.count_interval = Some(interval);
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> crate::Result<()> {
        if self.min_request_threshold == 0 {
            return Err(crate::Error::invalid_config(
                "min_request_threshold",
                "must be at least 1",
            ));
        }
        let ratio = self.failure_ratio_threshold;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(crate::Error::invalid_config(
                "failure_ratio_threshold",
                format!("must be in (0, 1], got {}", ratio),
            ));
        }
        if self.count_interval.is_some_and(|i| i.is_zero()) {
            return Err(crate::Error::invalid_config(
                "count_interval",
                "must be greater than zero when set",
            ));
        }
        Ok(())
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        counts.requests >= self.min_request_threshold
            && counts.failure_ratio() >= self.failure_ratio_threshold
    }
}

/// Callback invoked with `(name, from, to)` after every state transition
pub type StateChangeHook = Arc<dyn Fn(&str, CircuitState, CircuitState) + Send + Sync>;

/// Error returned by [`CircuitBreaker::execute`]
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The call was rejected without invoking the operation
    #[error("circuit breaker '{name}' is open")]
    Open {
        /// Breaker name
        name: String,
    },

    /// The operation ran and failed
    #[error("{0}")]
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Whether the breaker rejected the call
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    counts: Counts,
    generation: u64,
    opened_at: Option<Instant>,
    counts_expire_at: Option<Instant>,
    trial_in_flight: bool,
}

type Transition = (CircuitState, CircuitState);

/// Circuit breaker for fault tolerance
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    on_state_change: Option<StateChangeHook>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("inner", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let counts_expire_at = config.count_interval.map(|i| Instant::now() + i);
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                counts: Counts::default(),
                generation: 0,
                opened_at: None,
                counts_expire_at,
                trial_in_flight: false,
            }),
            on_state_change: None,
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Register a callback for state transitions.
    ///
    /// The hook runs synchronously after the state lock is released. A
    /// panicking hook is logged and never reaches the triggering call.
    #[must_use]
    pub fn with_state_change_hook(mut self, hook: StateChangeHook) -> Self {
        self.on_state_change = Some(hook);
        self
    }

    /// Get the circuit breaker name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state, applying a due Open -> HalfOpen transition
    pub fn state(&self) -> CircuitState {
        self.snapshot().0
    }

    /// Snapshot of the counts since the last reset
    pub fn counts(&self) -> Counts {
        self.snapshot().1
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.snapshot().2
    }

    fn snapshot(&self) -> (CircuitState, Counts, u64) {
        let mut transitions = Vec::new();
        let snapshot = {
            let mut inner = self.lock();
            self.refresh(&mut inner, Instant::now(), &mut transitions);
            (inner.state, inner.counts, inner.generation)
        };
        self.notify(&transitions);
        snapshot
    }

    /// Run `operation` through the breaker.
    ///
    /// Returns [`BreakerError::Open`] without calling `operation` when the
    /// circuit is open or a half-open trial is already in flight.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_unless(operation, |_| false).await
    }

    /// Like [`execute`](Self::execute), except an error for which
    /// `is_abandoned` returns `true` is recorded as neither success nor
    /// failure, exactly as if the call had been dropped.
    pub async fn execute_unless<T, E, F, Fut>(
        &self,
        operation: F,
        is_abandoned: impl FnOnce(&E) -> bool,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(admission) = self.before_request() else {
            return Err(BreakerError::Open {
                name: self.name.clone(),
            });
        };

        let result = operation().await;
        match &result {
            Err(e) if is_abandoned(e) => drop(admission),
            _ => admission.complete(result.is_ok()),
        }
        result.map_err(BreakerError::Operation)
    }

    /// Reset the circuit breaker to closed state with cleared counts
    pub fn reset(&self) {
        let mut transitions = Vec::new();
        {
            let mut inner = self.lock();
            let now = Instant::now();
            if inner.state == CircuitState::Closed {
                self.new_generation(&mut inner, now);
            } else {
                self.set_state(&mut inner, CircuitState::Closed, now, &mut transitions);
            }
        }
        self.notify(&transitions);
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn before_request(&self) -> Option<Admission<'_>> {
        let mut transitions = Vec::new();
        let admission = {
            let mut inner = self.lock();
            self.refresh(&mut inner, Instant::now(), &mut transitions);

            match inner.state {
                CircuitState::Open => None,
                CircuitState::HalfOpen if inner.trial_in_flight => None,
                CircuitState::HalfOpen => {
                    inner.trial_in_flight = true;
                    inner.counts.on_request();
                    Some((inner.generation, true))
                }
                CircuitState::Closed => {
                    inner.counts.on_request();
                    Some((inner.generation, false))
                }
            }
        };
        self.notify(&transitions);

        match admission {
            Some((generation, trial)) => Some(Admission {
                breaker: self,
                generation,
                trial,
                completed: false,
            }),
            None => {
                debug!(name = %self.name, "Circuit breaker rejected request");
                None
            }
        }
    }

    fn after_request(&self, generation: u64, trial: bool, success: bool) {
        let mut transitions = Vec::new();
        {
            let mut inner = self.lock();
            let now = Instant::now();
            self.refresh(&mut inner, now, &mut transitions);

            if inner.generation != generation {
                debug!(
                    name = %self.name,
                    result_generation = generation,
                    current_generation = inner.generation,
                    "Discarding result from stale generation"
                );
            } else {
                if trial {
                    inner.trial_in_flight = false;
                }
                if success {
                    self.on_success(&mut inner, now, &mut transitions);
                } else {
                    self.on_failure(&mut inner, now, &mut transitions);
                }
            }
        }
        self.notify(&transitions);
    }

    fn release_trial(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.trial_in_flight = false;
        }
    }

    fn on_success(
        &self,
        inner: &mut BreakerInner,
        now: Instant,
        transitions: &mut Vec<Transition>,
    ) {
        inner.counts.on_success();
        if inner.state == CircuitState::HalfOpen {
            self.set_state(inner, CircuitState::Closed, now, transitions);
        }
    }

    fn on_failure(
        &self,
        inner: &mut BreakerInner,
        now: Instant,
        transitions: &mut Vec<Transition>,
    ) {
        inner.counts.on_failure();
        match inner.state {
            CircuitState::Closed => {
                debug!(
                    name = %self.name,
                    requests = inner.counts.requests,
                    failures = inner.counts.total_failures,
                    "Circuit breaker failure recorded"
                );
                if self.config.ready_to_trip(&inner.counts) {
                    self.set_state(inner, CircuitState::Open, now, transitions);
                }
            }
            CircuitState::HalfOpen => {
                self.set_state(inner, CircuitState::Open, now, transitions);
            }
            CircuitState::Open => {}
        }
    }

    /// Apply time-driven changes: Open -> HalfOpen after the timeout, and
    /// the periodic closed-state count reset
    fn refresh(&self, inner: &mut BreakerInner, now: Instant, transitions: &mut Vec<Transition>) {
        match inner.state {
            CircuitState::Open => {
                let due = inner
                    .opened_at
                    .map_or(true, |at| now.saturating_duration_since(at) >= self.config.timeout);
                if due {
                    self.set_state(inner, CircuitState::HalfOpen, now, transitions);
                }
            }
            CircuitState::Closed => {
                if inner.counts_expire_at.is_some_and(|at| at <= now) {
                    self.new_generation(inner, now);
                }
            }
            CircuitState::HalfOpen => {}
        }
    }

    fn set_state(
        &self,
        inner: &mut BreakerInner,
        to: CircuitState,
        now: Instant,
        transitions: &mut Vec<Transition>,
    ) {
        let from = inner.state;
        if from == to {
            return;
        }

        if to == CircuitState::Open {
            warn!(
                name = %self.name,
                from = %from,
                requests = inner.counts.requests,
                failures = inner.counts.total_failures,
                "Circuit breaker opened"
            );
        } else {
            info!(name = %self.name, from = %from, to = %to, "Circuit breaker state changed");
        }

        inner.state = to;
        inner.opened_at = (to == CircuitState::Open).then_some(now);
        self.new_generation(inner, now);
        transitions.push((from, to));
    }

    fn new_generation(&self, inner: &mut BreakerInner, now: Instant) {
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.trial_in_flight = false;
        inner.counts_expire_at = match inner.state {
            CircuitState::Closed => self.config.count_interval.map(|i| now + i),
            _ => None,
        };
    }

    fn notify(&self, transitions: &[Transition]) {
        let Some(hook) = &self.on_state_change else {
            return;
        };
        for &(from, to) in transitions {
            let outcome = catch_unwind(AssertUnwindSafe(|| hook(&self.name, from, to)));
            if outcome.is_err() {
                warn!(name = %self.name, from = %from, to = %to, "State change hook panicked");
            }
        }
    }
}

/// Ticket for one admitted request
///
/// Dropping it without [`Admission::complete`] (the caller's future was
/// cancelled mid-operation, or the result was abandoned) records nothing but
/// frees a half-open trial slot.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    completed: bool,
}

impl Admission<'_> {
    fn complete(mut self, success: bool) {
        self.completed = true;
        self.breaker
            .after_request(self.generation, self.trial, success);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.completed && self.trial {
            self.breaker.release_trial(self.generation);
        }
    }
}

#[cfg(test)]
mod tests;
