//! Blocking retry loop around one request.

use super::classify::classify;
use super::error::TransferError;
use super::policy::{RetryDecision, RetryPolicy};

/// Call `f` until it succeeds or `policy` gives up, sleeping between attempts.
/// The error of the last attempt is returned.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, mut f: F) -> Result<T, TransferError>
where
    F: FnMut() -> Result<T, TransferError>,
{
    let mut attempt = 0u32;
    loop {
        attempt = attempt.saturating_add(1);
        let err = match f() {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        match policy.decide(attempt, classify(&err)) {
            RetryDecision::NoRetry => return Err(err),
            RetryDecision::RetryAfter(wait) => {
                tracing::debug!(attempt, error = %err, "retrying in {:?}", wait);
                std::thread::sleep(wait);
            }
        }
    }
}
