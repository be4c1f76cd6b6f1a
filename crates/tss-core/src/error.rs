//! Error types for TSS primitives and protocol math

use thiserror::Error;

/// Result type alias for TSS core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing or combining TSS values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Encoded value has the wrong width
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Bytes of the right width that do not decode to a valid element
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Threshold outside `1..=size`
    #[error("Invalid threshold: t={threshold} n={size}")]
    InvalidThreshold { threshold: u64, size: u64 },

    /// Member ID outside the group or duplicated
    #[error("Invalid member ID: {0}")]
    InvalidMemberId(u64),

    /// Proof or signature check failed
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Round data does not line up with the group shape
    #[error("Invalid round data: {0}")]
    InvalidRoundData(String),

    /// Cryptographic backend failure
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
