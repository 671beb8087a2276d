//! The SDP processor contract
//!
//! The negotiation engine never touches SDP text directly. It hands wire
//! descriptions and candidate lines to an [`SdpProcessor`] and works on the
//! structured [`SessionConfiguration`] it gets back. Any implementation must
//! satisfy `parse(generate(c)) == c` for configurations it produced.
//!
//! Errors follow a strict split:
//!
//! * [`SdpError::Parse`] - the input is malformed; the engine reports it to
//!   the application
//! * [`SdpError::Internal`] - the processor failed on its own; the engine logs
//!   it and abandons the operation
//!
//! [`SdpError::Parse`]: crate::SdpError::Parse
//! [`SdpError::Internal`]: crate::SdpError::Internal

use tracing::trace;

use crate::candidate::IceCandidate;
use crate::configuration::SessionConfiguration;
use crate::error::Result;
use crate::{parser, writer};

/// Converts between SDP text and structured configurations
pub trait SdpProcessor: Send {
    /// Parse a complete SDP blob
    fn parse(&self, sdp: &str) -> Result<SessionConfiguration>;

    /// Generate SDP text from a configuration
    fn generate(&self, configuration: &SessionConfiguration) -> Result<String>;

    /// Parse a single `candidate:` line
    fn parse_candidate_line(&self, line: &str) -> Result<IceCandidate>;

    /// Generate a single `candidate:` line
    fn generate_candidate_line(&self, candidate: &IceCandidate) -> Result<String>;
}

/// Native SDP text processor
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSdpProcessor;

impl DefaultSdpProcessor {
    /// Create a processor
    pub fn new() -> Self {
        Self
    }
}

impl SdpProcessor for DefaultSdpProcessor {
    fn parse(&self, sdp: &str) -> Result<SessionConfiguration> {
        let config = parser::parse_session(sdp)?;
        trace!("Parsed SDP with {} media lines", config.len());
        Ok(config)
    }

    fn generate(&self, configuration: &SessionConfiguration) -> Result<String> {
        writer::write_session(configuration)
    }

    fn parse_candidate_line(&self, line: &str) -> Result<IceCandidate> {
        parser::parse_candidate(line)
    }

    fn generate_candidate_line(&self, candidate: &IceCandidate) -> Result<String> {
        writer::write_candidate(candidate)
    }
}

impl<P: SdpProcessor + Sync + ?Sized> SdpProcessor for std::sync::Arc<P> {
    fn parse(&self, sdp: &str) -> Result<SessionConfiguration> {
        (**self).parse(sdp)
    }

    fn generate(&self, configuration: &SessionConfiguration) -> Result<String> {
        (**self).generate(configuration)
    }

    fn parse_candidate_line(&self, line: &str) -> Result<IceCandidate> {
        (**self).parse_candidate_line(line)
    }

    fn generate_candidate_line(&self, candidate: &IceCandidate) -> Result<String> {
        (**self).generate_candidate_line(candidate)
    }
}
