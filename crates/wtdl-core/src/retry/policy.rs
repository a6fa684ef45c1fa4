use std::time::Duration;

/// What went wrong with a request, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No answer in time.
    Timeout,
    /// Could not connect, or the connection broke mid-transfer.
    Connection,
    /// 429 or 503: the server wants fewer requests.
    Throttled,
    /// Any other 5xx.
    ServerError,
    /// Retrying cannot help (4xx, local disk, bad URL, TLS).
    Permanent,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Permanent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Bounded attempts with doubling backoff.
///
/// The default makes a single attempt; `[network.retry]` in config.toml raises it.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per request, the first one included.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for each one after.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay)
    }

    /// Whether to try again after attempt number `attempt` (1-based) failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts || !kind.is_retryable() {
            RetryDecision::NoRetry
        } else {
            RetryDecision::RetryAfter(self.backoff(attempt))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempts(n: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: n,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn default_never_retries() {
        let p = RetryPolicy::default();
        for kind in [ErrorKind::Timeout, ErrorKind::Connection, ErrorKind::ServerError] {
            assert_eq!(p.decide(1, kind), RetryDecision::NoRetry);
        }
    }

    #[test]
    fn permanent_errors_stop_immediately() {
        assert_eq!(attempts(5).decide(1, ErrorKind::Permanent), RetryDecision::NoRetry);
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let p = attempts(30);
        assert_eq!(p.backoff(1), Duration::from_millis(250));
        assert_eq!(p.backoff(2), Duration::from_millis(500));
        assert_eq!(p.backoff(4), Duration::from_secs(2));
        assert_eq!(p.backoff(12), p.max_delay);
        assert_eq!(p.backoff(u32::MAX), p.max_delay);
    }

    #[test]
    fn last_attempt_is_final() {
        let p = attempts(3);
        assert!(matches!(p.decide(1, ErrorKind::Throttled), RetryDecision::RetryAfter(_)));
        assert!(matches!(p.decide(2, ErrorKind::Throttled), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(3, ErrorKind::Throttled), RetryDecision::NoRetry);
    }
}
