//! Retry policy for model calls
//!
//! The retry loop is a small state machine driven by [`RetryPolicy::step`]:
//!
//! ```text
//! Attempting(n) --ok--------------------------> Success
//! Attempting(n) --fatal-----------------------> Failed(Fatal)
//! Attempting(n) --transient, n <  max---------> Attempting(n+1) after delay(n)
//! Attempting(n) --transient, n == max---------> Failed(ExhaustedRetries)
//! ```
//!
//! `delay(n) = base_delay * backoff_factor^(n-1)`. The step function is
//! pure, so the whole policy is testable without a network or a clock.

use crate::config::PipelineConfig;
use crate::error::ModelError;
use std::time::Duration;

/// Where a retry loop currently is
#[derive(Debug, Clone, PartialEq)]
pub enum RetryState {
    /// About to make attempt `n` (1-based)
    Attempting(u32),
    Success,
    Failed,
}

/// What the caller should do after an attempt settles
#[derive(Debug, PartialEq)]
pub enum RetryStep<T> {
    /// Attempt succeeded
    Done(T),
    /// Sleep for `delay`, then make attempt `next_attempt`
    Retry {
        next_attempt: u32,
        delay: Duration,
        error: ModelError,
    },
    /// Stop; the call failed
    GiveUp(ModelError),
}

impl<T> RetryStep<T> {
    /// State the loop moves to after this step
    pub fn next_state(&self) -> RetryState {
        match self {
            RetryStep::Done(_) => RetryState::Success,
            RetryStep::Retry { next_attempt, .. } => RetryState::Attempting(*next_attempt),
            RetryStep::GiveUp(_) => RetryState::Failed,
        }
    }
}

/// Exponential backoff policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first call included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_factor: backoff_factor.max(1.0),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay, config.backoff_factor)
    }

    /// Delay to wait after failed attempt `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let multiplier = self.backoff_factor.powi(exponent);
        let secs = self.base_delay.as_secs_f64() * multiplier;
        // Clamp absurd values instead of panicking in from_secs_f64
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Decide what follows attempt `attempt` given its outcome
    pub fn step<T>(&self, attempt: u32, outcome: Result<T, ModelError>) -> RetryStep<T> {
        match outcome {
            Ok(value) => RetryStep::Done(value),
            Err(error) if error.is_transient() => {
                if attempt >= self.max_attempts {
                    RetryStep::GiveUp(ModelError::ExhaustedRetries {
                        attempts: attempt,
                        last: Box::new(error),
                    })
                } else {
                    RetryStep::Retry {
                        next_attempt: attempt + 1,
                        delay: self.delay_for_attempt(attempt),
                        error,
                    }
                }
            }
            Err(error) => RetryStep::GiveUp(error),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(100), 2.0)
    }

    fn transient() -> Result<(), ModelError> {
        Err(ModelError::Transient("503".to_string()))
    }

    #[test]
    fn test_delay_follows_formula() {
        let p = policy(5);
        assert_eq!(p.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(p.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(p.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(p.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn test_delays_are_non_decreasing() {
        let p = RetryPolicy::new(20, Duration::from_millis(7), 1.5);
        let delays: Vec<Duration> = (1..20).map(|a| p.delay_for_attempt(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_factor_one_gives_constant_delay() {
        let p = RetryPolicy::new(4, Duration::from_millis(50), 1.0);
        assert_eq!(p.delay_for_attempt(1), p.delay_for_attempt(3));
    }

    #[test]
    fn test_huge_exponent_saturates() {
        let p = RetryPolicy::new(u32::MAX, Duration::from_secs(1), 10.0);
        assert_eq!(p.delay_for_attempt(10_000), Duration::MAX);
    }

    #[test]
    fn test_success_stops() {
        let step = policy(3).step(1, Ok("text"));
        assert_eq!(step.next_state(), RetryState::Success);
        assert_eq!(step, RetryStep::Done("text"));
    }

    #[test]
    fn test_transient_retries_until_limit() {
        let p = policy(3);

        let step = p.step(1, transient());
        assert_eq!(step.next_state(), RetryState::Attempting(2));

        let step = p.step(2, transient());
        assert!(matches!(
            step,
            RetryStep::Retry { next_attempt: 3, delay, .. } if delay == Duration::from_millis(200)
        ));

        let step = p.step(3, transient());
        match step {
            RetryStep::GiveUp(ModelError::ExhaustedRetries { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(*last, ModelError::Transient("503".to_string()));
            }
            other => panic!("expected exhausted retries, got {:?}", other),
        }
    }

    #[test]
    fn test_fatal_gives_up_immediately() {
        let step = policy(5).step::<()>(1, Err(ModelError::Fatal("401".to_string())));
        assert_eq!(step, RetryStep::GiveUp(ModelError::Fatal("401".to_string())));
        assert_eq!(step.next_state(), RetryState::Failed);
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let step = policy(1).step(1, transient());
        assert!(matches!(
            step,
            RetryStep::GiveUp(ModelError::ExhaustedRetries { attempts: 1, .. })
        ));
    }
}
