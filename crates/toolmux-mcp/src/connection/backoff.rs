//! Reconnection backoff.
//!
//! Pure decision function, no clocks or I/O, so the schedule can be tested
//! exhaustively.

use std::time::Duration;

use toolmux_core::BackoffPolicy;

use super::ConnectionError;

/// What to do after a failed (re)connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Wait `delay`, then make attempt number `attempt`.
    Retry { attempt: u32, delay: Duration },
    GiveUp(GiveUpReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// The error will not go away by retrying.
    NotRetryable,
    /// `attempts` retries were made without success.
    RetriesExhausted { attempts: u32 },
}

/// Delay before retry number `attempt` (1-based): `initial * multiplier^(attempt-1)`, capped.
pub fn delay_for(policy: &BackoffPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let factor = u64::from(policy.multiplier.max(1)).saturating_pow(exponent);
    let ms = policy
        .initial_delay_ms
        .saturating_mul(factor)
        .min(policy.max_delay_ms);
    Duration::from_millis(ms)
}

/// Decide whether to make retry number `attempt` after `last_error`.
pub fn decide(policy: &BackoffPolicy, attempt: u32, last_error: &ConnectionError) -> BackoffDecision {
    if !last_error.is_retryable() {
        return BackoffDecision::GiveUp(GiveUpReason::NotRetryable);
    }
    if attempt == 0 || attempt > policy.max_retries {
        return BackoffDecision::GiveUp(GiveUpReason::RetriesExhausted {
            attempts: attempt.saturating_sub(1),
        });
    }
    BackoffDecision::Retry {
        attempt,
        delay: delay_for(policy, attempt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exited() -> ConnectionError {
        ConnectionError::ProcessExited {
            server: "calc".into(),
            detail: "exit status: 1".into(),
        }
    }

    #[test]
    fn test_delays_grow_and_cap() {
        let policy = BackoffPolicy {
            initial_delay_ms: 500,
            max_delay_ms: 3_000,
            multiplier: 2,
            max_retries: 10,
        };
        let delays: Vec<u64> = (1..=5)
            .map(|n| u64::try_from(delay_for(&policy, n).as_millis()).unwrap())
            .collect();
        assert_eq!(delays, [500, 1_000, 2_000, 3_000, 3_000]);
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = BackoffPolicy::default();
        assert_eq!(delay_for(&policy, u32::MAX), Duration::from_millis(policy.max_delay_ms));
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let policy = BackoffPolicy {
            max_retries: 2,
            ..BackoffPolicy::default()
        };
        assert!(matches!(decide(&policy, 1, &exited()), BackoffDecision::Retry { attempt: 1, .. }));
        assert!(matches!(decide(&policy, 2, &exited()), BackoffDecision::Retry { attempt: 2, .. }));
        assert_eq!(
            decide(&policy, 3, &exited()),
            BackoffDecision::GiveUp(GiveUpReason::RetriesExhausted { attempts: 2 })
        );
    }

    #[test]
    fn test_terminal_errors_give_up_immediately() {
        let error = ConnectionError::IncompatibleVersion {
            server: "calc".into(),
            offered: "1999-01-01".into(),
        };
        assert_eq!(
            decide(&BackoffPolicy::default(), 1, &error),
            BackoffDecision::GiveUp(GiveUpReason::NotRetryable)
        );
    }

    #[test]
    fn test_zero_retries_never_retries() {
        let policy = BackoffPolicy {
            max_retries: 0,
            ..BackoffPolicy::default()
        };
        assert!(matches!(decide(&policy, 1, &exited()), BackoffDecision::GiveUp(_)));
    }
}
