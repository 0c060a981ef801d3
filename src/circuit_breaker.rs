//! # Circuit Breaker Module
//!
//! This module implements the circuit breaker pattern for language-model
//! calls. It stops hammering the API when calls fail repeatedly and lets it
//! recover before trying again.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RecoveryConfig;

/// Circuit breaker for language-model calls
///
/// # State Machine
///
/// - **Closed**: Normal operation, requests pass through
/// - **Open**: Failure threshold exceeded, requests fail fast
/// - **Half-Open**: Reset time elapsed, the next request is let through
///
/// # Configuration
///
/// Uses `RecoveryConfig` for:
/// - `circuit_breaker_threshold`: Consecutive failures before opening (default: 5)
/// - `circuit_breaker_reset_secs`: Time before attempting reset (default: 60s)
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    threshold: u32,
    reset_after: Duration,
}

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rental_scout::config::RecoveryConfig;
    /// use rental_scout::circuit_breaker::CircuitBreaker;
    ///
    /// let circuit_breaker = CircuitBreaker::new(&RecoveryConfig::default());
    /// assert!(!circuit_breaker.is_open());
    /// ```
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            threshold: config.circuit_breaker_threshold,
            reset_after: Duration::from_secs(config.circuit_breaker_reset_secs),
        }
    }

    /// Check if the circuit is open (blocking requests)
    ///
    /// Automatically closes again once the reset timeout has elapsed.
    pub fn is_open(&self) -> bool {
        let mut state = self.lock_state();

        if state.failure_count >= self.threshold {
            if let Some(last_time) = state.last_failure_time {
                if last_time.elapsed() < self.reset_after {
                    return true;
                }
                *state = BreakerState::default();
            }
        }
        false
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.lock_state();
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
    }

    /// Record a successful call, closing the circuit
    pub fn record_success(&self) {
        *self.lock_state() = BreakerState::default();
    }

    pub fn failure_count(&self) -> u32 {
        self.lock_state().failure_count
    }

    // A poisoned lock only means another thread panicked mid-update; the
    // counters are still usable.
    fn lock_state(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
