// Retry logic for failed step attempts
use crate::domain::StepRun;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the step (with backoff delay in ms)
    Retry(i64),
    /// Do not retry, the step has failed permanently
    Failed,
}

/// Retry policy
///
/// Determines if a step should be retried based on:
/// - Attempts already made
/// - Maximum attempts allowed
/// - Backoff factor for exponential delay
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay_ms: i64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `base_delay_ms` - Delay before the first retry (default: 1000)
    pub fn new(base_delay_ms: i64) -> Self {
        Self {
            base_delay_ms: base_delay_ms.max(0),
        }
    }

    /// Determine if a step should be retried after its latest attempt failed
    ///
    /// Backoff formula:
    /// delay = base_delay * (backoff_factor ^ (attempts - 1)) * jitter
    ///
    /// # Example
    /// ```text
    /// match policy.should_retry(&step) {
    ///     RetryDecision::Retry(delay_ms) => println!("Retry after {} ms", delay_ms),
    ///     RetryDecision::Failed => println!("Max attempts reached"),
    /// }
    /// ```
    pub fn should_retry(&self, step: &StepRun) -> RetryDecision {
        if step.attempts >= step.max_attempts {
            if step.max_attempts > 1 {
                warn!(
                    step = %step.label(),
                    attempts = %step.attempts,
                    max_attempts = %step.max_attempts,
                    "Max retry attempts reached"
                );
            }
            return RetryDecision::Failed;
        }

        let exponent = step.attempts.saturating_sub(1) as i32;
        let base_delay_ms = self.base_delay_ms as f64 * step.backoff_factor.powi(exponent);

        // ±10% jitter, seeded by the step-run id so each run is deterministic
        let jitter_seed = step.id.chars().map(|c| c as u32).sum::<u32>();
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0);

        let delay_ms = (base_delay_ms * jitter_factor) as i64;

        info!(
            step = %step.label(),
            attempt = %step.attempts,
            max_attempts = %step.max_attempts,
            delay_ms = %delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(crate::application::constants::DEFAULT_RETRY_BASE_DELAY_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_after(attempts: u32, max_attempts: u32) -> StepRun {
        let mut step =
            StepRun::new("step-7", "run-1", 0, "sort_bam_task", None).with_max_attempts(max_attempts);
        step.attempts = attempts;
        step
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let policy = RetryPolicy::new(1000);
        assert_eq!(policy.should_retry(&step_after(1, 1)), RetryDecision::Failed);
    }

    #[test]
    fn test_exponential_backoff_within_jitter() {
        let policy = RetryPolicy::new(1000);

        let RetryDecision::Retry(first) = policy.should_retry(&step_after(1, 3)) else {
            panic!("expected retry");
        };
        assert!((900..=1100).contains(&first), "first delay {}", first);

        let RetryDecision::Retry(second) = policy.should_retry(&step_after(2, 3)) else {
            panic!("expected retry");
        };
        assert!((1800..=2200).contains(&second), "second delay {}", second);

        assert_eq!(policy.should_retry(&step_after(3, 3)), RetryDecision::Failed);
    }

    #[test]
    fn test_jitter_is_deterministic() {
        let policy = RetryPolicy::new(500);
        assert_eq!(
            policy.should_retry(&step_after(1, 2)),
            policy.should_retry(&step_after(1, 2))
        );
    }
}
