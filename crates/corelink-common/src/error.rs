// ============================================
// File: crates/corelink-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Base error shared by every corelink crate. Crate-specific errors wrap
//! it with `#[from]` so `?` works across crate boundaries.
//!
//! ## Main Functionality
//! - `CommonError`: identity, timestamp, length and I/O failures
//! - `Result<T>`: Type alias using `CommonError`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never put key material into an error message
//! - Keep variants coarse; crate errors add the detail
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use crate::time::TimestampError;
use crate::types::PeerIdError;

/// Common result type.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Failures shared by the corelink crates.
///
/// # Example
/// ```
/// use corelink_common::error::{CommonError, Result};
/// use corelink_common::PeerId;
///
/// fn parse(text: &str) -> Result<PeerId> {
///     Ok(text.parse::<PeerId>()?)
/// }
/// assert!(matches!(parse("@@"), Err(CommonError::PeerId(_))));
/// ```
#[derive(Error, Debug)]
pub enum CommonError {
    /// A peer identity could not be parsed.
    #[error("Bad peer identity: {0}")]
    PeerId(#[from] PeerIdError),

    /// A wire timestamp was rejected.
    #[error("Bad timestamp: {0}")]
    Timestamp(#[from] TimestampError),

    /// A fixed-size field had the wrong length.
    #[error("{field}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Field being read
        field: &'static str,
        /// Required length
        expected: usize,
        /// Length found
        actual: usize,
    },

    /// Text or binary input could not be decoded.
    #[error("Decoding {context} failed: {details}")]
    Decoding {
        /// What was being decoded
        context: String,
        /// Decoder message
        details: String,
    },

    /// File or socket I/O failed.
    #[error("I/O error while {context}")]
    Io {
        /// Operation in progress
        context: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl CommonError {
    /// Creates an `InvalidLength` error.
    #[must_use]
    pub const fn invalid_length(field: &'static str, expected: usize, actual: usize) -> Self {
        Self::InvalidLength {
            field,
            expected,
            actual,
        }
    }

    /// Creates a `Decoding` error.
    pub fn decoding(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Decoding {
            context: context.into(),
            details: details.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// `true` if retrying may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// `true` if the input itself is bad.
    #[must_use]
    pub const fn is_malformed_input(&self) -> bool {
        !self.is_retryable()
    }
}

impl From<base64::DecodeError> for CommonError {
    fn from(err: base64::DecodeError) -> Self {
        Self::decoding("base64", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PeerId;

    #[test]
    fn test_peer_id_error_converts() {
        let err: CommonError = "!!".parse::<PeerId>().unwrap_err().into();
        assert!(matches!(err, CommonError::PeerId(_)));
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_length_error_names_field() {
        let err = CommonError::invalid_length("session key", 32, 31);
        assert!(err.to_string().contains("session key"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_io_is_retryable() {
        let err = CommonError::io("reading key file", std::io::Error::other("boom"));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("reading key file"));
    }
}
