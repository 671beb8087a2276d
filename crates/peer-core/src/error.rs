//! Error types for the negotiation engine
//!
//! Operations that the application drives (`create_offer`, `set_remote_description`,
//! ...) resolve with one of these errors. [`PeerConnectionError::Internal`] is the
//! exception: it describes SDP processor failures that are logged and never
//! delivered to the application.

use rtcpeer_sdp_core::SdpError;
use thiserror::Error;

/// Result type for negotiation operations
pub type Result<T> = std::result::Result<T, PeerConnectionError>;

/// Errors produced by a [`PeerConnection`](crate::PeerConnection)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerConnectionError {
    /// The operation is not permitted in the current signaling state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A wire session description failed to parse
    #[error("Invalid session description: {0}")]
    InvalidDescription(String),

    /// A wire ICE candidate failed to parse
    #[error("Invalid ICE candidate: {0}")]
    InvalidCandidate(String),

    /// The media endpoint or the described media rejected the operation
    #[error("Operation failed: {0}")]
    OperationError(String),

    /// The supplied configuration is not acceptable
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The SDP processor failed on its own (logged, never surfaced)
    #[error("Internal error: {0} (this is a bug, please report it)")]
    Internal(String),
}

impl PeerConnectionError {
    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Create an operation error
    pub fn operation(message: impl Into<String>) -> Self {
        Self::OperationError(message.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Classify a processor error raised while parsing a session description
    pub fn from_description_error(err: SdpError) -> Self {
        match err {
            SdpError::Parse(message) => Self::InvalidDescription(message),
            SdpError::Internal(message) => Self::Internal(message),
        }
    }

    /// Classify a processor error raised while parsing a candidate line
    pub fn from_candidate_error(err: SdpError) -> Self {
        match err {
            SdpError::Parse(message) => Self::InvalidCandidate(message),
            SdpError::Internal(message) => Self::Internal(message),
        }
    }

    /// Whether this error must stay out of the application's sight
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_error_classification() {
        let parse = PeerConnectionError::from_description_error(SdpError::parse("bad m= line"));
        assert_eq!(parse, PeerConnectionError::InvalidDescription("bad m= line".into()));
        assert!(!parse.is_internal());

        let candidate = PeerConnectionError::from_candidate_error(SdpError::parse("too short"));
        assert!(matches!(candidate, PeerConnectionError::InvalidCandidate(_)));

        let internal = PeerConnectionError::from_description_error(SdpError::internal("oops"));
        assert!(internal.is_internal());
    }
}
