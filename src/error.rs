//! Error types for the sealstream engine.
//!
//! One variant per failure condition, so callers can match on the class of
//! failure without parsing messages. Decryption deliberately reports tag
//! mismatch and decompression failure as the same [`EngineError::IncorrectKey`]
//! condition.

use thiserror::Error;

/// Main error type for all engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input ended before the container was fully read.
    #[error("premature end of encrypted data")]
    PrematureEnd,

    /// A caller-supplied parameter is outside its documented range.
    #[error("invalid {field}: {reason}")]
    Parameter {
        /// Name of the offending parameter.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Key-derivation working memory could not be allocated.
    ///
    /// Distinct from [`EngineError::Parameter`] so callers can retry with
    /// smaller KDF parameters.
    #[error("insufficient memory for key derivation")]
    InsufficientMemory,

    /// The container header or a wire-level field is malformed.
    #[error("invalid container format or header")]
    InvalidFormat,

    /// The container's header version falls outside the accepted interval.
    #[error("unsupported header version {found} (accepted {min}..={max})")]
    UnsupportedVersion {
        /// Version found in the container.
        found: u16,
        /// Lowest accepted version.
        min: u16,
        /// Highest accepted version.
        max: u16,
    },

    /// The decoded cipher selector does not name a known cipher.
    #[error("unrecognised cipher id {0}")]
    UnknownCipher(u16),

    /// Decryption failed. The key may be incorrect or the data corrupted.
    ///
    /// Covers both authentication-tag mismatch and payload decompression
    /// failure; the two are never distinguished.
    #[error("decryption failed; the key may be incorrect or the data corrupted")]
    IncorrectKey,

    /// A progress observer requested cancellation.
    #[error("operation cancelled")]
    Cancelled,

    /// Failed to persist a temporary file during an atomic write.
    #[error("failed to persist temporary file: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),

    /// Output file path is invalid.
    #[error("output file path is invalid")]
    InvalidOutputPath,

    /// Internal failure that should not occur in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Type alias for Results using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_error_display() {
        let err = EngineError::Parameter {
            field: "cost",
            reason: "must be between 1 and 24".to_string(),
        };
        assert_eq!(err.to_string(), "invalid cost: must be between 1 and 24");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EngineError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_incorrect_key_message_is_unified() {
        let err = EngineError::IncorrectKey;
        let msg = err.to_string();
        assert!(msg.contains("incorrect"));
        assert!(!msg.contains("tag"), "message must not name the sub-cause");
        assert!(!msg.contains("decompress"), "message must not name the sub-cause");
    }

    #[test]
    fn test_unsupported_version_display() {
        let err = EngineError::UnsupportedVersion {
            found: 9,
            min: 1,
            max: 3,
        };
        assert_eq!(
            err.to_string(),
            "unsupported header version 9 (accepted 1..=3)"
        );
    }
}
