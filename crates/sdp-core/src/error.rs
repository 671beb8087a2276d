//! Error types for SDP processing

use thiserror::Error;

/// Result type for SDP processing operations
pub type Result<T> = std::result::Result<T, SdpError>;

/// Errors produced by an [`SdpProcessor`](crate::SdpProcessor)
///
/// The two variants are deliberately asymmetric. [`SdpError::Parse`] is caused by
/// input the application handed in and is reported back to it. [`SdpError::Internal`]
/// means the processor itself misbehaved; callers log it and never surface it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdpError {
    /// The SDP text or candidate line is malformed
    #[error("SDP parse error: {0}")]
    Parse(String),

    /// The processor failed for a reason unrelated to its input
    #[error("Internal SDP processor error: {0} (this is a bug, please report it)")]
    Internal(String),
}

impl SdpError {
    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error was caused by the caller's input
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

impl From<serde_json::Error> for SdpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(format!("JSON: {}", err))
    }
}

impl From<std::num::ParseIntError> for SdpError {
    fn from(err: std::num::ParseIntError) -> Self {
        Self::Parse(format!("invalid number: {}", err))
    }
}
