//! Structured session configuration
//!
//! A [`SessionConfiguration`] is the negotiation engine's view of one SDP blob:
//! a session id, a version, and an ordered list of [`PeerMediaDescription`]s.
//! Cloning is a deep copy, which is what the engine relies on when it snapshots
//! the current local description before building a new offer or answer.

use serde::{Deserialize, Serialize};

use crate::candidate::IceCandidate;
use crate::media::{DtlsSetup, MediaDirection, MediaKind};
use crate::payload::MediaPayload;

/// Port advertised on freshly created media lines before any candidate is known
pub const PLACEHOLDER_PORT: u16 = 9;

/// Address advertised on freshly created media lines
pub const PLACEHOLDER_ADDRESS: &str = "0.0.0.0";

/// Hash function used for DTLS fingerprints
pub const DEFAULT_FINGERPRINT_HASH: &str = "sha-256";

/// Negotiated state of one media line (`m=` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMediaDescription {
    /// Media identification tag (`a=mid`)
    pub mid: String,

    /// Media kind
    #[serde(rename = "type")]
    pub kind: MediaKind,

    /// Transport port; 0 means the line is rejected or disabled
    pub port: u16,

    /// Connection address (`c=`)
    pub address: String,

    /// RTCP port (`a=rtcp`), 0 when unknown
    #[serde(default)]
    pub rtcp_port: u16,

    /// RTCP address, empty when unknown
    #[serde(default)]
    pub rtcp_address: String,

    /// Media direction
    #[serde(rename = "mode")]
    pub direction: MediaDirection,

    /// Codecs in preference order
    pub payloads: Vec<MediaPayload>,

    /// RTP and RTCP share one transport
    pub rtcp_mux: bool,

    /// Stream id from `a=msid`
    #[serde(default)]
    pub media_stream_id: String,

    /// Track id from `a=msid`
    #[serde(default)]
    pub media_stream_track_id: String,

    /// DTLS role
    pub dtls_setup: DtlsSetup,

    /// Hash function of the DTLS fingerprint
    pub dtls_fingerprint_hash_function: String,

    /// DTLS certificate fingerprint
    pub dtls_fingerprint: String,

    /// Synchronization sources
    #[serde(default)]
    pub ssrcs: Vec<u32>,

    /// RTCP canonical name
    #[serde(default)]
    pub cname: String,

    /// ICE username fragment
    pub ice_ufrag: String,

    /// ICE password
    pub ice_password: String,

    /// Candidates gathered or received for this line
    #[serde(default)]
    pub ice_candidates: Vec<IceCandidate>,

    /// Set once candidate gathering for this line finished
    #[serde(default)]
    pub ice_candidate_gathering_done: bool,

    /// Id of the local media source bound to this line, if any
    #[serde(skip)]
    pub source_id: Option<String>,
}

impl PeerMediaDescription {
    /// Create an empty media line of the given kind
    ///
    /// The line starts on the placeholder port and address with RTCP muxing
    /// enabled, an `actpass` DTLS role and the default fingerprint hash.
    pub fn new(mid: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            mid: mid.into(),
            kind,
            port: PLACEHOLDER_PORT,
            address: PLACEHOLDER_ADDRESS.to_string(),
            rtcp_port: 0,
            rtcp_address: String::new(),
            direction: MediaDirection::SendRecv,
            payloads: Vec::new(),
            rtcp_mux: true,
            media_stream_id: String::new(),
            media_stream_track_id: String::new(),
            dtls_setup: DtlsSetup::ActPass,
            dtls_fingerprint_hash_function: DEFAULT_FINGERPRINT_HASH.to_string(),
            dtls_fingerprint: String::new(),
            ssrcs: Vec::new(),
            cname: String::new(),
            ice_ufrag: String::new(),
            ice_password: String::new(),
            ice_candidates: Vec::new(),
            ice_candidate_gathering_done: false,
            source_id: None,
        }
    }

    /// Whether the line has been rejected (port 0)
    pub fn is_rejected(&self) -> bool {
        self.port == 0
    }

    /// Look up a payload by payload type
    pub fn payload(&self, payload_type: u8) -> Option<&MediaPayload> {
        self.payloads.iter().find(|p| p.payload_type == payload_type)
    }
}

/// One parsed or generated session description in structured form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfiguration {
    /// Session id from the `o=` line
    pub session_id: u64,

    /// Session version from the `o=` line
    pub session_version: u64,

    /// Media lines in SDP order
    pub media_descriptions: Vec<PeerMediaDescription>,
}

impl SessionConfiguration {
    /// Create an empty configuration with a random session id
    pub fn new() -> Self {
        Self::with_session_id(generate_session_id())
    }

    /// Create an empty configuration for an existing session
    pub fn with_session_id(session_id: u64) -> Self {
        Self {
            session_id,
            session_version: 0,
            media_descriptions: Vec::new(),
        }
    }

    /// Number of media lines
    pub fn len(&self) -> usize {
        self.media_descriptions.len()
    }

    /// Whether there are no media lines
    pub fn is_empty(&self) -> bool {
        self.media_descriptions.is_empty()
    }

    /// Find a media line by mid
    pub fn media_by_mid(&self, mid: &str) -> Option<&PeerMediaDescription> {
        self.media_descriptions.iter().find(|m| m.mid == mid)
    }

    /// Find a media line by mid, mutably
    pub fn media_by_mid_mut(&mut self, mid: &str) -> Option<&mut PeerMediaDescription> {
        self.media_descriptions.iter_mut().find(|m| m.mid == mid)
    }

    /// Position of the media line carrying `mid`
    pub fn index_of_mid(&self, mid: &str) -> Option<usize> {
        self.media_descriptions.iter().position(|m| m.mid == mid)
    }
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

/// Random session id that fits the 63 bits SDP origin lines allow
pub fn generate_session_id() -> u64 {
    rand::random::<u64>() >> 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::MediaPayload;

    #[test]
    fn test_new_media_line_defaults() {
        let line = PeerMediaDescription::new("0", MediaKind::Audio);
        assert_eq!(line.port, PLACEHOLDER_PORT);
        assert_eq!(line.address, PLACEHOLDER_ADDRESS);
        assert!(line.rtcp_mux);
        assert_eq!(line.dtls_setup, DtlsSetup::ActPass);
        assert_eq!(line.dtls_fingerprint_hash_function, "sha-256");
        assert!(!line.is_rejected());
    }

    #[test]
    fn test_clone_is_deep() {
        let mut original = SessionConfiguration::with_session_id(42);
        let mut line = PeerMediaDescription::new("a1", MediaKind::Audio);
        line.payloads.push(MediaPayload::new(111, "OPUS", 48000, 2));
        original.media_descriptions.push(line);

        let mut copy = original.clone();
        copy.media_descriptions[0].payloads.clear();
        copy.media_descriptions[0].mid = "changed".into();

        assert_eq!(original.media_descriptions[0].payloads.len(), 1);
        assert_eq!(original.media_descriptions[0].mid, "a1");
    }

    #[test]
    fn test_session_id_fits_63_bits() {
        for _ in 0..32 {
            assert!(generate_session_id() <= i64::MAX as u64);
        }
    }

    #[test]
    fn test_lookup_by_mid() {
        let mut config = SessionConfiguration::with_session_id(1);
        config.media_descriptions.push(PeerMediaDescription::new("x", MediaKind::Audio));
        config.media_descriptions.push(PeerMediaDescription::new("y", MediaKind::Video));
        assert_eq!(config.index_of_mid("y"), Some(1));
        assert_eq!(config.media_by_mid("x").map(|m| m.kind.clone()), Some(MediaKind::Audio));
        assert!(config.media_by_mid("z").is_none());
    }
}
