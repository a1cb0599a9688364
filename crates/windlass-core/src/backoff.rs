//! Retry delay computation: exponential backoff with additive jitter.
//!
//! The delay for the `attempt`-th failure is
//! `min(base * multiplier^(attempt-1), max)` plus a uniform random jitter of
//! up to +20% of the capped value. Jitter spreads retries of executions that
//! failed together so they do not hammer a shared downstream dependency in
//! lockstep.

use rand::Rng;
use windlass_types::definition::RetryPolicy;

/// Upper bound of the additive jitter, as a fraction of the capped delay.
pub const JITTER_FRACTION: f64 = 0.2;

/// Compute the delay in milliseconds before the next attempt.
///
/// `attempt` is the 1-based index of the failure just observed; values <= 0
/// are normalized to 1 (attempt is unsigned here, so only 0 needs the
/// normalization).
pub fn next_delay_ms(attempt: u32, policy: &RetryPolicy) -> u64 {
    let jitter = rand::thread_rng().gen_range(0.0..JITTER_FRACTION);
    next_delay_ms_with_jitter(attempt, policy, jitter)
}

/// Deterministic core of [`next_delay_ms`]: `jitter_frac` is the sampled
/// fraction in `[0, JITTER_FRACTION)`.
pub fn next_delay_ms_with_jitter(attempt: u32, policy: &RetryPolicy, jitter_frac: f64) -> u64 {
    let attempt = attempt.max(1);
    let exp = policy.base_delay_ms as f64 * policy.backoff_multiplier.powi(attempt as i32 - 1);
    let capped = exp.min(policy.max_delay_ms as f64);
    (capped + jitter_frac * capped).floor() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base: u64, max: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: base,
            backoff_multiplier: 2.0,
            max_delay_ms: max,
        }
    }

    #[test]
    fn test_exponential_growth_without_jitter() {
        let p = policy(100, 30_000);
        assert_eq!(next_delay_ms_with_jitter(1, &p, 0.0), 100);
        assert_eq!(next_delay_ms_with_jitter(2, &p, 0.0), 200);
        assert_eq!(next_delay_ms_with_jitter(3, &p, 0.0), 400);
        assert_eq!(next_delay_ms_with_jitter(4, &p, 0.0), 800);
    }

    #[test]
    fn test_cap_applies_before_jitter() {
        let p = policy(1000, 2500);
        // 1000 * 2^3 = 8000, capped to 2500
        assert_eq!(next_delay_ms_with_jitter(4, &p, 0.0), 2500);
        // Jitter is relative to the capped value
        assert_eq!(next_delay_ms_with_jitter(4, &p, 0.2), 3000);
    }

    #[test]
    fn test_attempt_zero_normalized() {
        let p = policy(100, 30_000);
        assert_eq!(
            next_delay_ms_with_jitter(0, &p, 0.0),
            next_delay_ms_with_jitter(1, &p, 0.0)
        );
    }

    #[test]
    fn test_sampled_delay_within_bounds() {
        let p = policy(100, 30_000);
        for attempt in 1..=8 {
            let floor = next_delay_ms_with_jitter(attempt, &p, 0.0);
            let ceil = (floor as f64 * (1.0 + JITTER_FRACTION)) as u64;
            for _ in 0..50 {
                let sampled = next_delay_ms(attempt, &p);
                assert!(
                    sampled >= floor && sampled <= ceil,
                    "attempt {attempt}: {sampled} not in [{floor}, {ceil}]"
                );
            }
        }
    }

    #[test]
    fn test_custom_multiplier() {
        let p = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 10,
            backoff_multiplier: 3.0,
            max_delay_ms: 100_000,
        };
        assert_eq!(next_delay_ms_with_jitter(3, &p, 0.0), 90);
    }
}
