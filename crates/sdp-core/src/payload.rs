//! RTP payload (codec) descriptions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Format parameter naming the payload type an RTX payload repairs
pub const PARAM_APT: &str = "apt";

/// Format parameter carrying the RTX retransmission window in milliseconds
pub const PARAM_RTX_TIME: &str = "rtx-time";

/// H.264 packetization mode format parameter
pub const PARAM_PACKETIZATION_MODE: &str = "packetization-mode";

/// One codec offered or accepted on a media line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    /// RTP payload type number
    #[serde(rename = "type")]
    pub payload_type: u8,

    /// Encoding name as it appears in `a=rtpmap` (e.g. `OPUS`, `VP8`)
    pub encoding_name: String,

    /// RTP clock rate in Hz
    pub clock_rate: u32,

    /// Number of audio channels (1 for video)
    pub channels: u16,

    /// Supports RTCP codec control FIR (`a=rtcp-fb:<pt> ccm fir`)
    #[serde(default)]
    pub ccmfir: bool,

    /// Supports picture loss indication (`a=rtcp-fb:<pt> nack pli`)
    #[serde(default)]
    pub nack_pli: bool,

    /// Supports generic NACK (`a=rtcp-fb:<pt> nack`)
    #[serde(default)]
    pub nack: bool,

    /// Named integer format parameters (`a=fmtp`)
    #[serde(default)]
    pub parameters: BTreeMap<String, u32>,
}

impl MediaPayload {
    /// Create a payload without feedback mechanisms or parameters
    pub fn new(payload_type: u8, encoding_name: impl Into<String>, clock_rate: u32, channels: u16) -> Self {
        Self {
            payload_type,
            encoding_name: encoding_name.into(),
            clock_rate,
            channels,
            ccmfir: false,
            nack_pli: false,
            nack: false,
            parameters: BTreeMap::new(),
        }
    }

    /// Enable every RTCP feedback mechanism
    pub fn with_feedback(mut self, ccmfir: bool, nack_pli: bool, nack: bool) -> Self {
        self.ccmfir = ccmfir;
        self.nack_pli = nack_pli;
        self.nack = nack;
        self
    }

    /// Add a format parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: u32) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Look up a format parameter
    pub fn parameter(&self, name: &str) -> Option<u32> {
        self.parameters.get(name).copied()
    }

    /// Encoding names compare case-insensitively
    pub fn matches_encoding(&self, other: &MediaPayload) -> bool {
        self.encoding_name.eq_ignore_ascii_case(&other.encoding_name)
    }

    /// Whether this is a retransmission payload
    pub fn is_rtx(&self) -> bool {
        self.encoding_name.eq_ignore_ascii_case("rtx")
    }

    /// Whether this payload carries any RTCP feedback attribute
    pub fn has_feedback(&self) -> bool {
        self.ccmfir || self.nack_pli || self.nack
    }
}

/// Find the RTX payload that repairs `payload_type`
pub fn rtx_for(payloads: &[MediaPayload], payload_type: u8) -> Option<&MediaPayload> {
    payloads
        .iter()
        .find(|p| p.is_rtx() && p.parameter(PARAM_APT) == Some(payload_type as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_match_is_case_insensitive() {
        let a = MediaPayload::new(111, "OPUS", 48000, 2);
        let b = MediaPayload::new(109, "opus", 48000, 2);
        assert!(a.matches_encoding(&b));
        assert!(!a.matches_encoding(&MediaPayload::new(0, "PCMU", 8000, 1)));
    }

    #[test]
    fn test_rtx_lookup() {
        let payloads = vec![
            MediaPayload::new(100, "VP8", 90000, 1),
            MediaPayload::new(120, "RTX", 90000, 1)
                .with_parameter(PARAM_APT, 100)
                .with_parameter(PARAM_RTX_TIME, 200),
        ];
        let rtx = rtx_for(&payloads, 100).expect("RTX for VP8");
        assert_eq!(rtx.payload_type, 120);
        assert_eq!(rtx.parameter(PARAM_RTX_TIME), Some(200));
        assert!(rtx_for(&payloads, 96).is_none());
    }
}
