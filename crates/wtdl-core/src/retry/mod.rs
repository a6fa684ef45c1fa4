//! Retry and backoff shared by the API crawl and the asset downloads.
//!
//! Both loops classify a failed request the same way and ask the same
//! [`RetryPolicy`] whether to try again.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::TransferError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
