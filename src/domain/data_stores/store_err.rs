use thiserror::Error;

/// Failure talking to the shared key-value store.
///
/// Never returned from the public session operations: callers see the
/// degraded behaviour instead, and the error is logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("error while connecting to store instance: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0} ms")]
    Timeout(u64),

    #[error("error while performing store command: {0}")]
    Backend(String),

    #[error("stored value could not be decoded: {0}")]
    Corrupt(String),
}
