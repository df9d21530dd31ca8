use std::time;

use rand::Rng;

use crate::error::ErrorKind;
use crate::policy::PropagationPolicy;

/// Backoff calculator derived from a job's `PropagationPolicy`: exponential
/// growth from `base_backoff`, capped at `max_backoff`, elongated for
/// resource exhaustion, and jittered to avoid thundering-herd retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base_backoff: time::Duration,
    max_backoff: time::Duration,
}

impl RetryPolicy {
    pub fn from_policy(policy: &PropagationPolicy) -> Self {
        Self {
            base_backoff: policy.base_backoff,
            max_backoff: policy.max_backoff,
        }
    }

    /// Compute the delay to sleep before attempt `k + 1`, given the
    /// classification of the error that caused attempt `k` to fail.
    ///
    /// `base_backoff * 2^k`, capped at `max_backoff`, multiplied by an
    /// elongation factor for resource exhaustion, then jittered by ±20%.
    pub fn delay_for(&self, attempt: u32, kind: ErrorKind) -> time::Duration {
        let exponent = attempt.min(32);
        let candidate = self
            .base_backoff
            .checked_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX))
            .unwrap_or(self.max_backoff);

        let elongated = if kind == ErrorKind::ResourceExhausted {
            candidate.checked_mul(3).unwrap_or(self.max_backoff)
        } else {
            candidate
        };

        let capped = std::cmp::min(elongated, self.max_backoff);
        jitter(capped)
    }
}

/// Apply ±20% uniform jitter to a duration.
fn jitter(duration: time::Duration) -> time::Duration {
    let mut rng = rand::thread_rng();
    let factor = rng.gen_range(0.8..=1.2);
    duration.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, max_ms: u64) -> PropagationPolicy {
        PropagationPolicy {
            base_backoff: time::Duration::from_millis(base_ms),
            max_backoff: time::Duration::from_millis(max_ms),
            ..Default::default()
        }
    }

    #[test]
    fn doubles_each_attempt_within_jitter_band() {
        let retry = RetryPolicy::from_policy(&policy(50, 10_000));

        for attempt in 0..4 {
            let expected = 50u64 * 2u64.pow(attempt);
            let delay = retry.delay_for(attempt, ErrorKind::ExecuteTransient);
            let lower = (expected as f64 * 0.79) as u64;
            let upper = (expected as f64 * 1.21) as u64;
            let got = delay.as_millis() as u64;
            assert!(
                got >= lower && got <= upper,
                "attempt {attempt}: expected ~{expected}ms, got {got}ms"
            );
        }
    }

    #[test]
    fn caps_at_maximum_interval() {
        let retry = RetryPolicy::from_policy(&policy(1000, 2000));
        let delay = retry.delay_for(10, ErrorKind::ExecuteTransient);
        assert!(delay <= time::Duration::from_millis(2000));
    }

    #[test]
    fn resource_exhaustion_is_elongated() {
        let retry = RetryPolicy::from_policy(&policy(100, 100_000));
        let transient = retry.delay_for(1, ErrorKind::ExecuteTransient).as_millis();
        let exhausted = retry
            .delay_for(1, ErrorKind::ResourceExhausted)
            .as_millis();
        assert!(exhausted > transient);
    }
}
