//! Error types for spacesync wire types.

use thiserror::Error;

/// Errors that can occur when building or decoding spacesync types.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// A delta violated its structural invariants
    #[error("invalid delta: {0}")]
    InvalidDelta(String),

    /// Invalid identifier
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::InvalidDelta("empty operations".into());
        assert_eq!(err.to_string(), "invalid delta: empty operations");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
