//! Circuit breaker guarding the primary LLM provider.
//!
//! ```text
//! Closed   -> Open:     failure_count reaches threshold
//! Open     -> HalfOpen: reset_timeout elapsed since the last failure (one probe)
//! HalfOpen -> Closed:   probe succeeded
//! HalfOpen -> Open:     probe failed
//! ```
//!
//! This type is a plain state machine with no I/O and no interior locking.
//! Callers that share it across tasks wrap it in a mutex so the Open->HalfOpen
//! transition is taken by exactly one caller.

use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BreakerStatus {
    pub state: BreakerState,
    pub open: bool,
    pub failure_count: u32,
}

impl CircuitBreaker {
    /// `failure_threshold` and `reset_timeout` are clamped to at least 1 / 1ms.
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure: None,
            failure_threshold: failure_threshold.max(1),
            reset_timeout: reset_timeout.max(Duration::from_millis(1)),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Open while tripped or while a probe is outstanding.
    pub fn is_open(&self) -> bool {
        self.state != BreakerState::Closed
    }

    pub fn status(&self) -> BreakerStatus {
        BreakerStatus {
            state: self.state,
            open: self.is_open(),
            failure_count: self.failure_count,
        }
    }

    /// Decide whether this call may go to the primary provider.
    ///
    /// Returning true from the Open state moves the breaker to HalfOpen; the
    /// caller holding that answer owns the single probe.
    pub fn should_use_primary(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => false,
            BreakerState::Open => {
                let elapsed = self
                    .last_failure
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.reset_timeout {
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.state = BreakerState::Closed;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure = Some(now);

        match self.state {
            BreakerState::HalfOpen => self.state = BreakerState::Open,
            BreakerState::Closed if self.failure_count >= self.failure_threshold => {
                self.state = BreakerState::Open;
            }
            _ => {}
        }
    }
}
