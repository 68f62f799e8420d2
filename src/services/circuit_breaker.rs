use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub name: String,
    /// Probes allowed while half-open, and consecutive probe successes
    /// needed to close again.
    pub max_requests: u32,
    /// Period after which closed-state counts are cleared. Zero disables it.
    pub interval: Duration,
    /// Time spent open before probing.
    pub timeout: Duration,
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_success(&mut self) {
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BreakerRejection {
    #[error("circuit breaker is open")]
    Open,
    #[error("too many requests while half-open")]
    TooManyRequests,
}

struct BreakerInner {
    state: CircuitBreakerState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

/// Per-processor failure tracker.
///
/// All transitions happen under one mutex, never held across the wrapped
/// call. Results of calls that started in an earlier generation (before a
/// transition or an interval reset) are discarded.
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(mut settings: BreakerSettings) -> Self {
        settings.max_requests = settings.max_requests.max(1);
        settings.failure_threshold = settings.failure_threshold.max(1);

        let now = Instant::now();
        let breaker = Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitBreakerState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry: None,
            }),
            settings,
        };
        breaker.new_generation(&mut breaker.inner.lock(), now);
        breaker
    }

    pub fn state(&self) -> CircuitBreakerState {
        let mut inner = self.inner.lock();
        self.current_state(&mut inner, Instant::now()).0
    }

    pub fn counts(&self) -> Counts {
        self.inner.lock().counts
    }

    /// Runs `call` unless the breaker rejects it. A rejected call never
    /// polls the future, so no side effect of `call` happens.
    pub async fn execute<F, Fut, T, E>(&self, call: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<BreakerRejection>,
    {
        let generation = self.before_request()?;
        let result = call().await;
        self.after_request(generation, result.is_ok());
        result
    }

    fn before_request(&self) -> Result<u64, BreakerRejection> {
        let mut inner = self.inner.lock();
        let (state, generation) = self.current_state(&mut inner, Instant::now());

        match state {
            CircuitBreakerState::Open => Err(BreakerRejection::Open),
            CircuitBreakerState::HalfOpen
                if inner.counts.requests >= self.settings.max_requests =>
            {
                Err(BreakerRejection::TooManyRequests)
            }
            _ => {
                inner.counts.requests += 1;
                Ok(generation)
            }
        }
    }

    fn after_request(&self, before: u64, success: bool) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let (state, generation) = self.current_state(&mut inner, now);
        if generation != before {
            return;
        }

        if success {
            inner.counts.on_success();
            if state == CircuitBreakerState::HalfOpen
                && inner.counts.consecutive_successes >= self.settings.max_requests
            {
                self.set_state(&mut inner, CircuitBreakerState::Closed, now);
            }
        } else {
            match state {
                CircuitBreakerState::Closed => {
                    inner.counts.on_failure();
                    if inner.counts.consecutive_failures >= self.settings.failure_threshold {
                        self.set_state(&mut inner, CircuitBreakerState::Open, now);
                    }
                }
                CircuitBreakerState::HalfOpen => {
                    self.set_state(&mut inner, CircuitBreakerState::Open, now);
                }
                CircuitBreakerState::Open => {}
            }
        }
    }

    fn current_state(&self, inner: &mut BreakerInner, now: Instant) -> (CircuitBreakerState, u64) {
        let expired = inner.expiry.is_some_and(|expiry| expiry <= now);
        let state = inner.state;
        match state {
            CircuitBreakerState::Closed if expired => self.new_generation(inner, now),
            CircuitBreakerState::Open if expired => {
                self.set_state(inner, CircuitBreakerState::HalfOpen, now)
            }
            _ => {}
        }
        (inner.state, inner.generation)
    }

    fn set_state(&self, inner: &mut BreakerInner, state: CircuitBreakerState, now: Instant) {
        if inner.state == state {
            return;
        }
        let previous = inner.state;
        inner.state = state;
        self.new_generation(inner, now);

        match state {
            CircuitBreakerState::Open => {
                warn!(breaker = %self.settings.name, from = ?previous, "circuit breaker opened")
            }
            _ => info!(
                breaker = %self.settings.name,
                from = ?previous,
                to = ?state,
                "circuit breaker transition"
            ),
        }
    }

    fn new_generation(&self, inner: &mut BreakerInner, now: Instant) {
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.expiry = match inner.state {
            CircuitBreakerState::Closed if self.settings.interval.is_zero() => None,
            CircuitBreakerState::Closed => Some(now + self.settings.interval),
            CircuitBreakerState::Open => Some(now + self.settings.timeout),
            CircuitBreakerState::HalfOpen => None,
        };
    }
}
