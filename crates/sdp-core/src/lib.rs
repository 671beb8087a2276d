//! Session configuration model and SDP processing.
//!
//! This crate holds the structured representation of a negotiated session
//! ([`SessionConfiguration`] with one [`PeerMediaDescription`] per media line),
//! the [`SdpProcessor`] contract used by the negotiation engine to convert
//! between that structure and SDP text, and a native implementation of it
//! ([`DefaultSdpProcessor`]).
//!
//! # Example
//!
//! ```
//! use rtcpeer_sdp_core::prelude::*;
//!
//! let processor = DefaultSdpProcessor::new();
//! let mut config = SessionConfiguration::with_session_id(1);
//! let mut audio = PeerMediaDescription::new("1", MediaKind::Audio);
//! audio.payloads.push(MediaPayload::new(111, "OPUS", 48000, 2));
//! config.media_descriptions.push(audio);
//!
//! let sdp = processor.generate(&config).unwrap();
//! assert_eq!(processor.parse(&sdp).unwrap(), config);
//! ```

// Error handling
pub mod error;

// Data model
pub mod candidate;
pub mod configuration;
pub mod media;
pub mod payload;

// SDP text processing
pub mod parser;
pub mod processor;
pub mod writer;

// JSON interchange
pub mod json;

pub use candidate::{CandidateTransport, CandidateType, IceCandidate, TcpType};
pub use configuration::{
    PeerMediaDescription, SessionConfiguration, DEFAULT_FINGERPRINT_HASH, PLACEHOLDER_ADDRESS,
    PLACEHOLDER_PORT,
};
pub use error::{Result, SdpError};
pub use media::{DtlsSetup, MediaDirection, MediaKind};
pub use payload::MediaPayload;
pub use processor::{DefaultSdpProcessor, SdpProcessor};

/// Re-export of common types
pub mod prelude {
    pub use super::{
        CandidateTransport, CandidateType, DefaultSdpProcessor, DtlsSetup, IceCandidate,
        MediaDirection, MediaKind, MediaPayload, PeerMediaDescription, SdpError, SdpProcessor,
        SessionConfiguration,
    };
}
