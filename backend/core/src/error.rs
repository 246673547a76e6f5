use std::time::Duration;

use thiserror::Error;

/// Failure reported by a [`PresenceStore`](crate::PresenceStore) adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation `{op}` timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    #[error("key `{0}` holds a value of the wrong type")]
    WrongType(String),

    #[error("could not decode value at `{key}`: {message}")]
    Decode { key: String, message: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Top-level error type for Pulse startup paths.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_names_the_operation() {
        let err = StoreError::Timeout { op: "scard", timeout: Duration::from_millis(5) };
        assert_eq!(err.to_string(), "store operation `scard` timed out after 5ms");
    }

    #[test]
    fn test_store_error_converts_into_pulse_error() {
        let err: PulseError = StoreError::Backend("boom".into()).into();
        assert_eq!(err.to_string(), "store backend error: boom");
    }
}
