use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::services::circuit_breaker::{BreakerState, BreakerStatus, CircuitBreaker};
use crate::services::llm::{LlmProvider, Prompt, ProviderError};

/// Routes completions to a primary provider guarded by a circuit breaker,
/// falling back to a backup whenever the primary is skipped or fails.
///
/// The breaker is shared by every job in the process. Its lock is a plain
/// mutex and is never held across an `.await`.
pub struct ResilientInvoker {
    primary: Arc<dyn LlmProvider>,
    backup: Option<Arc<dyn LlmProvider>>,
    breaker: Mutex<CircuitBreaker>,
}

impl ResilientInvoker {
    pub fn new(
        primary: Arc<dyn LlmProvider>,
        backup: Option<Arc<dyn LlmProvider>>,
        failure_threshold: u32,
        reset_timeout: Duration,
    ) -> Self {
        Self::with_breaker(
            primary,
            backup,
            CircuitBreaker::new(failure_threshold, reset_timeout),
        )
    }

    pub fn with_breaker(
        primary: Arc<dyn LlmProvider>,
        backup: Option<Arc<dyn LlmProvider>>,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            primary,
            backup,
            breaker: Mutex::new(breaker),
        }
    }

    pub fn backup_configured(&self) -> bool {
        self.backup.is_some()
    }

    pub fn breaker_status(&self) -> BreakerStatus {
        self.breaker().status()
    }

    fn breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        lock_breaker(&self.breaker)
    }

    /// Fails only when both providers fail (or the primary fails with no backup).
    pub async fn invoke(&self, prompt: &Prompt) -> Result<String, ProviderExhaustedError> {
        let (use_primary, probing) = {
            let mut breaker = self.breaker();
            let use_primary = breaker.should_use_primary(Instant::now());
            (use_primary, breaker.state() == BreakerState::HalfOpen)
        };

        let primary_error = if use_primary {
            let pending = PendingCall::new(&self.breaker, self.primary.name(), probing);
            let outcome = self.primary.complete(prompt).await;
            pending.resolve();

            match outcome {
                Ok(text) => {
                    self.breaker().record_success();
                    return Ok(text);
                }
                Err(e) => {
                    let mut breaker = self.breaker();
                    breaker.record_failure(Instant::now());
                    metrics::counter!("llm_primary_failures_total").increment(1);
                    warn!(
                        provider = self.primary.name(),
                        error = %e,
                        failure_count = breaker.failure_count(),
                        breaker_open = breaker.is_open(),
                        "Primary provider failed, falling back"
                    );
                    Some(e)
                }
            }
        } else {
            debug!(provider = self.primary.name(), "Circuit open, skipping primary provider");
            None
        };

        let Some(backup) = &self.backup else {
            metrics::counter!("llm_exhausted_total").increment(1);
            return Err(ProviderExhaustedError {
                primary: primary_error,
                backup: ProviderError::NotConfigured,
            });
        };

        metrics::counter!("llm_fallback_total").increment(1);
        match backup.complete(prompt).await {
            Ok(text) => Ok(text),
            Err(e) => {
                metrics::counter!("llm_exhausted_total").increment(1);
                warn!(provider = backup.name(), error = %e, "Backup provider failed");
                Err(ProviderExhaustedError {
                    primary: primary_error,
                    backup: e,
                })
            }
        }
    }
}

fn lock_breaker(breaker: &Mutex<CircuitBreaker>) -> MutexGuard<'_, CircuitBreaker> {
    breaker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tracks an in-flight primary call. If a half-open probe is dropped before
/// it resolves, the probe counts as failed so the breaker reopens instead of
/// staying half-open forever.
struct PendingCall<'a> {
    breaker: &'a Mutex<CircuitBreaker>,
    provider: &'a str,
    probe: bool,
    resolved: bool,
}

impl<'a> PendingCall<'a> {
    fn new(breaker: &'a Mutex<CircuitBreaker>, provider: &'a str, probe: bool) -> Self {
        Self {
            breaker,
            provider,
            probe,
            resolved: false,
        }
    }

    fn resolve(mut self) {
        self.resolved = true;
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if self.resolved || !self.probe {
            return;
        }
        let mut breaker = lock_breaker(self.breaker);
        if breaker.state() == BreakerState::HalfOpen {
            breaker.record_failure(Instant::now());
            warn!(provider = self.provider, "Half-open probe was cancelled, reopening circuit");
        }
    }
}

/// Both providers failed for one invocation.
///
/// `primary` is `None` when the breaker routed the call straight to backup.
#[derive(Debug, thiserror::Error)]
#[error("All LLM providers failed (primary: {}; backup: {backup})", describe_primary(.primary))]
pub struct ProviderExhaustedError {
    pub primary: Option<ProviderError>,
    pub backup: ProviderError,
}

fn describe_primary(primary: &Option<ProviderError>) -> String {
    match primary {
        Some(e) => e.to_string(),
        None => "skipped, circuit open".to_string(),
    }
}
