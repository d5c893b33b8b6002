//! Error types for ragstore storage operations.
//!
//! Configuration problems are the only errors that abort an operation outright.
//! Everything else (I/O, decode, alignment) is reported through [`StoreError`]
//! so the owning process can keep serving from memory.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by the vector and keyword stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid or inconsistent configuration (missing threshold, dimension mismatch, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// The embedding function returned a different number of vectors than texts requested.
    #[error("embedding count mismatch: expected {expected} vectors, got {actual}")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    /// The embedding function itself failed.
    #[error("embedding function failed: {0}")]
    Embedding(String),

    /// A single record's stored vector could not be decoded.
    #[error("failed to decode vector for record '{id}': {reason}")]
    Decode { id: String, reason: String },

    /// File-system failure on a store file.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON or bincode (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Keyword snapshot failed its CRC32 integrity check.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for errors that must abort the whole operation.
    pub fn is_config(&self) -> bool {
        matches!(self, StoreError::Config(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_mismatch_message() {
        let err = StoreError::EmbeddingCountMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "embedding count mismatch: expected 3 vectors, got 2"
        );
        assert!(!err.is_config());
    }

    #[test]
    fn test_checksum_message_is_hex() {
        let err = StoreError::ChecksumMismatch {
            expected: 0xdeadbeef,
            actual: 1,
        };
        assert!(err.to_string().contains("0xdeadbeef"));
        assert!(err.to_string().contains("0x00000001"));
    }

    #[test]
    fn test_config_is_config() {
        assert!(StoreError::Config("missing threshold".into()).is_config());
    }
}
