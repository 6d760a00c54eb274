use thiserror::Error;

/// Why the remote record list could not be loaded.
///
/// Carried inside the load-state cell, so it is `Clone + PartialEq` and keeps
/// transport details as text rather than holding the client's error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server responded with status {status}")]
    Status { status: u16 },
    #[error("malformed response body: {0}")]
    Decode(String),
    #[error("load did not settle within {timeout_ms} ms")]
    TimedOut { timeout_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location unavailable: {0}")]
    Unavailable(String),
    #[error("location request timed out")]
    Timeout,
}
