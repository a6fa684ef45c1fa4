//! Transfer error type for retry classification.

use std::fmt;

/// Error returned by a single HTTP transfer (curl failure, HTTP status, or local write failure).
/// Kept separate from anyhow so callers can classify it before deciding to retry or skip.
#[derive(Debug)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, TLS, etc.).
    Curl(curl::Error),
    /// The server answered, but not with the status we wanted.
    Http(u32),
    /// Writing the body to disk failed (disk full, permission denied). Not retried.
    Storage(std::io::Error),
}

impl TransferError {
    /// True when the failure happened below HTTP: nothing usable came back from the server.
    pub fn is_transport(&self) -> bool {
        matches!(self, TransferError::Curl(_))
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Curl(e) => write!(f, "{}", e),
            TransferError::Http(code) => write!(f, "HTTP {}", code),
            TransferError::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Curl(e) => Some(e),
            TransferError::Storage(e) => Some(e),
            TransferError::Http(_) => None,
        }
    }
}

impl From<curl::Error> for TransferError {
    fn from(e: curl::Error) -> Self {
        TransferError::Curl(e)
    }
}
