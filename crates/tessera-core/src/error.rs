//! Error types for compression operations.

use thiserror::Error;

/// Result type alias for compression operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Compression error types.
#[derive(Debug, Error)]
pub enum Error {
    /// Input data is corrupted or invalid.
    #[error("corrupted data: {message}")]
    CorruptedData {
        message: String,
        /// Byte position in the input where the problem was detected.
        offset: Option<usize>,
    },

    /// Buffer too small for output.
    #[error("buffer too small: need {required} bytes, got {provided}")]
    BufferTooSmall { required: usize, provided: usize },

    /// A caller-supplied argument is outside its supported range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid compression level specified.
    #[error("invalid compression level {level}: must be in range [{min}, {max}]")]
    InvalidLevel { level: i32, min: i32, max: i32 },

    /// Checksum verification failed.
    #[error("checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// I/O error from underlying file or stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported feature or format.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Create a corrupted data error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Error::CorruptedData {
            message: message.into(),
            offset: None,
        }
    }

    /// Create a corrupted data error with offset context.
    pub fn corrupted_at(message: impl Into<String>, offset: usize) -> Self {
        Error::CorruptedData {
            message: format!("{} at offset {}", message.into(), offset),
            offset: Some(offset),
        }
    }

    /// Create a buffer too small error.
    pub fn buffer_too_small(required: usize, provided: usize) -> Self {
        Error::BufferTooSmall { required, provided }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: u32, actual: u32) -> Self {
        Error::ChecksumMismatch { expected, actual }
    }

    /// Create an unsupported feature error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported(message.into())
    }

    /// Whether the error was caused by the input data itself rather than
    /// by the caller's arguments or the environment.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::CorruptedData { .. } | Error::ChecksumMismatch { .. }
        )
    }

    /// Check if error is recoverable (can retry with different parameters).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::BufferTooSmall { .. })
    }

    /// Get error category for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::CorruptedData { .. } | Error::ChecksumMismatch { .. } => "malformed_input",
            Error::BufferTooSmall { .. }
            | Error::InvalidArgument(_)
            | Error::InvalidLevel { .. } => "invalid_argument",
            Error::Unsupported(_) => "unsupported_feature",
            Error::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupted_at_records_offset() {
        let err = Error::corrupted_at("bad table", 17);
        match err {
            Error::CorruptedData { ref message, offset } => {
                assert_eq!(offset, Some(17));
                assert!(message.contains("offset 17"));
            }
            _ => panic!("unexpected variant"),
        }
        assert!(err.is_malformed());
        assert_eq!(err.category(), "malformed_input");
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::buffer_too_small(10, 5).category(), "invalid_argument");
        assert_eq!(Error::invalid_argument("x").category(), "invalid_argument");
        assert_eq!(Error::unsupported("dict").category(), "unsupported_feature");
        assert_eq!(Error::checksum_mismatch(1, 2).category(), "malformed_input");
    }

    #[test]
    fn test_display() {
        let err = Error::checksum_mismatch(0xdeadbeef, 0x1234);
        assert_eq!(
            err.to_string(),
            "checksum mismatch: expected 0xdeadbeef, got 0x00001234"
        );
        assert!(Error::buffer_too_small(8, 4).is_recoverable());
        assert!(!Error::unsupported("v0.7").is_recoverable());
    }
}
