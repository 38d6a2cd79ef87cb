//! Per-key circuit breakers that fail fast once a tier keeps failing for a
//! retailer.
//!
//! Each breaker is a Closed → Open → HalfOpen state machine guarded by one
//! mutex. Callers acquire a [`BreakerPermit`] before doing work and resolve
//! it with the outcome; a permit dropped without an outcome (for example when
//! the surrounding future is cancelled) frees its half-open probe slot and
//! leaves the state untouched.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use pricewatch_core::AppConfig;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures in Closed that open the circuit.
    pub failure_threshold: u32,
    /// Consecutive HalfOpen successes that close it again.
    pub success_threshold: u32,
    /// How long the circuit stays Open before allowing a probe.
    pub open_timeout: Duration,
    /// Concurrent probes allowed while HalfOpen.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(60),
            half_open_max_calls: 1,
        }
    }
}

impl BreakerConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            failure_threshold: config.breaker_failure_threshold,
            success_threshold: config.breaker_success_threshold,
            open_timeout: Duration::from_secs(config.breaker_open_timeout_secs),
            half_open_max_calls: config.breaker_half_open_max_calls,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        })
    }
}

/// Returned when a breaker refuses a call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("circuit breaker {name} is {state}; call rejected")]
pub struct BreakerOpen {
    pub name: String,
    pub state: CircuitState,
}

/// Error from [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error(transparent)]
    Open(#[from] BreakerOpen),

    #[error("{0}")]
    Inner(E),
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    /// Bumped on every entry into HalfOpen so stale probes cannot touch the
    /// in-flight count of a later half-open period.
    generation: u64,
}

impl BreakerState {
    fn release_probe(&mut self, probe: Option<u64>) {
        if let Some(generation) = probe {
            if self.state == CircuitState::HalfOpen && self.generation == generation {
                self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
            }
        }
    }
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerState>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                half_open_in_flight: 0,
                generation: 0,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    /// Current state. An Open breaker whose timeout has elapsed still reports
    /// Open until the next acquisition moves it to HalfOpen.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // Plain counters; still consistent after a panic elsewhere.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Asks for permission to make one call.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerOpen`] while the circuit is Open and its timeout has
    /// not elapsed, or when HalfOpen already has the maximum number of
    /// probes in flight.
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, BreakerOpen> {
        let mut inner = self.lock();

        if inner.state == CircuitState::Open {
            let elapsed = inner
                .opened_at
                .is_none_or(|opened| opened.elapsed() >= self.config.open_timeout);
            if !elapsed {
                return Err(self.rejected(CircuitState::Open));
            }
            inner.state = CircuitState::HalfOpen;
            inner.consecutive_successes = 0;
            inner.half_open_in_flight = 0;
            inner.generation += 1;
            tracing::warn!(breaker = %self.name, "circuit breaker half-open; probing");
        }

        match inner.state {
            CircuitState::Closed => Ok(BreakerPermit::new(self, None)),
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight >= self.config.half_open_max_calls {
                    return Err(self.rejected(CircuitState::HalfOpen));
                }
                inner.half_open_in_flight += 1;
                Ok(BreakerPermit::new(self, Some(inner.generation)))
            }
            CircuitState::Open => Err(self.rejected(CircuitState::Open)),
        }
    }

    fn rejected(&self, state: CircuitState) -> BreakerOpen {
        tracing::debug!(breaker = %self.name, %state, "circuit breaker rejected call");
        BreakerOpen {
            name: self.name.clone(),
            state,
        }
    }

    /// Runs `operation` under a permit and records its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] without running `operation` when the
    /// breaker rejects the call, or [`BreakerError::Inner`] with the
    /// operation's own error.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire()?;
        match operation().await {
            Ok(value) => {
                permit.record_success();
                Ok(value)
            }
            Err(err) => {
                permit.record_failure();
                Err(BreakerError::Inner(err))
            }
        }
    }

    fn on_success(&self, probe: Option<u64>) {
        let mut inner = self.lock();
        inner.release_probe(probe);
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.opened_at = None;
                    inner.half_open_in_flight = 0;
                    tracing::warn!(breaker = %self.name, "circuit breaker closed");
                }
            }
            // A call admitted before the circuit opened finished late.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, probe: Option<u64>) {
        let mut inner = self.lock();
        inner.release_probe(probe);
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
                inner.half_open_in_flight = 0;
                tracing::warn!(breaker = %self.name, "half-open probe failed; circuit breaker re-opened");
            }
            CircuitState::Open => {}
        }
    }
}

/// Permission for one call through a [`CircuitBreaker`].
#[must_use = "a permit should be resolved with record_success or record_failure"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    /// Half-open generation when this permit is a probe.
    probe: Option<u64>,
    resolved: bool,
}

impl<'a> BreakerPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: Option<u64>) -> Self {
        Self {
            breaker,
            probe,
            resolved: false,
        }
    }

    pub fn record_success(mut self) {
        self.resolved = true;
        self.breaker.on_success(self.probe);
    }

    pub fn record_failure(mut self) {
        self.resolved = true;
        self.breaker.on_failure(self.probe);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.breaker.lock().release_probe(self.probe);
        }
    }
}

/// Point-in-time view of one breaker, for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

/// Lazily-populated map of named breakers shared by every extraction.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    default_config: BreakerConfig,
    overrides: Vec<(String, BreakerConfig)>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    #[must_use]
    pub fn new(default_config: BreakerConfig) -> Self {
        Self {
            default_config,
            overrides: Vec::new(),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Uses `config` for every breaker whose name starts with `prefix`. The
    /// longest matching prefix wins.
    #[must_use]
    pub fn with_override(mut self, prefix: impl Into<String>, config: BreakerConfig) -> Self {
        self.overrides.push((prefix.into(), config));
        self
    }

    fn config_for(&self, name: &str) -> BreakerConfig {
        self.overrides
            .iter()
            .filter(|(prefix, _)| name.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(self.default_config, |(_, config)| *config)
    }

    /// Returns the breaker for `name`, creating it on first use.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self
            .breakers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(existing) = breakers.get(name) {
            return Arc::clone(existing);
        }
        let breaker = Arc::new(CircuitBreaker::new(name, self.config_for(name)));
        breakers.insert(name.to_owned(), Arc::clone(&breaker));
        breaker
    }

    /// All breakers created so far, sorted by name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> = self
            .breakers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut snapshot: Vec<BreakerSnapshot> = breakers
            .iter()
            .map(|b| {
                let inner = b.lock();
                BreakerSnapshot {
                    name: b.name.clone(),
                    state: inner.state,
                    consecutive_failures: inner.consecutive_failures,
                }
            })
            .collect();
        snapshot.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot
    }
}

#[cfg(test)]
#[path = "breaker_test.rs"]
mod tests;
