//! Session descriptions
//!
//! Two forms exist side by side:
//!
//! * [`RtcSessionDescription`] - the wire form the application sees: a type and
//!   SDP text. It is a shared handle so the engine can refresh the text of the
//!   very object the application passed in.
//! * [`SessionDescription`] - the engine's form: a type and a structured
//!   [`SessionConfiguration`], optionally remembering the wire handle it was
//!   created from.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use rtcpeer_sdp_core::{SdpError, SdpProcessor, SessionConfiguration};
use serde::{Deserialize, Serialize};

use crate::error::PeerConnectionError;

/// Type of a session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

impl SdpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpType::Offer => "offer",
            SdpType::Pranswer => "pranswer",
            SdpType::Answer => "answer",
            SdpType::Rollback => "rollback",
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SdpType {
    type Err = PeerConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer" => Ok(SdpType::Offer),
            "pranswer" => Ok(SdpType::Pranswer),
            "answer" => Ok(SdpType::Answer),
            "rollback" => Ok(SdpType::Rollback),
            _ => Err(PeerConnectionError::InvalidDescription(format!("unknown description type '{}'", s))),
        }
    }
}

#[derive(Debug)]
struct RtcSessionDescriptionInner {
    sdp_type: SdpType,
    sdp: RwLock<String>,
}

/// Application-facing session description
///
/// Clones share the same underlying description; [`RtcSessionDescription::ptr_eq`]
/// tells whether two handles are the same object.
#[derive(Debug, Clone)]
pub struct RtcSessionDescription {
    inner: Arc<RtcSessionDescriptionInner>,
}

impl RtcSessionDescription {
    pub fn new(sdp_type: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RtcSessionDescriptionInner {
                sdp_type,
                sdp: RwLock::new(sdp.into()),
            }),
        }
    }

    pub fn offer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::Offer, sdp)
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::Answer, sdp)
    }

    pub fn pranswer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::Pranswer, sdp)
    }

    /// A rollback request carries no SDP
    pub fn rollback() -> Self {
        Self::new(SdpType::Rollback, String::new())
    }

    pub fn sdp_type(&self) -> SdpType {
        self.inner.sdp_type
    }

    /// Current SDP text
    pub fn sdp(&self) -> String {
        self.inner.sdp.read().clone()
    }

    pub(crate) fn set_sdp(&self, sdp: String) {
        *self.inner.sdp.write() = sdp;
    }

    /// Whether two handles refer to the same description object
    pub fn ptr_eq(a: &RtcSessionDescription, b: &RtcSessionDescription) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

/// Engine-side session description
#[derive(Debug, Clone)]
pub struct SessionDescription {
    sdp_type: SdpType,
    configuration: SessionConfiguration,
    origin: Option<RtcSessionDescription>,
}

impl SessionDescription {
    pub fn new(sdp_type: SdpType, configuration: SessionConfiguration) -> Self {
        Self {
            sdp_type,
            configuration,
            origin: None,
        }
    }

    /// Parse a wire description, remembering the handle
    pub fn from_rtc(
        description: &RtcSessionDescription,
        processor: &dyn SdpProcessor,
    ) -> Result<Self, SdpError> {
        let configuration = processor.parse(&description.sdp())?;
        Ok(Self {
            sdp_type: description.sdp_type(),
            configuration,
            origin: Some(description.clone()),
        })
    }

    /// Produce the wire form
    ///
    /// If this description was created from a wire handle, that handle's text
    /// is regenerated in place and the same handle is returned.
    pub fn to_rtc(&self, processor: &dyn SdpProcessor) -> Result<RtcSessionDescription, SdpError> {
        let sdp = processor.generate(&self.configuration)?;
        match &self.origin {
            Some(origin) => {
                origin.set_sdp(sdp);
                Ok(origin.clone())
            }
            None => Ok(RtcSessionDescription::new(self.sdp_type, sdp)),
        }
    }

    pub fn sdp_type(&self) -> SdpType {
        self.sdp_type
    }

    pub fn configuration(&self) -> &SessionConfiguration {
        &self.configuration
    }

    pub fn configuration_mut(&mut self) -> &mut SessionConfiguration {
        &mut self.configuration
    }

    /// Whether this description supersedes `other` (always true without one)
    pub fn is_later_than(&self, other: Option<&SessionDescription>) -> bool {
        match other {
            Some(other) => self.configuration.session_version > other.configuration.session_version,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcpeer_sdp_core::{DefaultSdpProcessor, MediaKind, PeerMediaDescription};

    fn config(version: u64) -> SessionConfiguration {
        let mut config = SessionConfiguration::with_session_id(9);
        config.session_version = version;
        config
    }

    #[test]
    fn test_is_later_than() {
        let older = SessionDescription::new(SdpType::Offer, config(1));
        let newer = SessionDescription::new(SdpType::Offer, config(2));
        assert!(newer.is_later_than(Some(&older)));
        assert!(!older.is_later_than(Some(&newer)));
        assert!(!older.is_later_than(Some(&older)));
        assert!(older.is_later_than(None));
    }

    #[test]
    fn test_to_rtc_preserves_identity() {
        let processor = DefaultSdpProcessor::new();
        let mut source = config(1);
        source.media_descriptions.push(PeerMediaDescription::new("1", MediaKind::Audio));
        let sdp = processor.generate(&source).unwrap();

        let wire = RtcSessionDescription::offer(sdp);
        let mut description = SessionDescription::from_rtc(&wire, &processor).unwrap();
        description.configuration_mut().media_descriptions[0].port = 4242;

        let refreshed = description.to_rtc(&processor).unwrap();
        assert!(RtcSessionDescription::ptr_eq(&wire, &refreshed));
        assert!(wire.sdp().contains("m=audio 4242 "));
    }

    #[test]
    fn test_fresh_description_gets_new_handle() {
        let processor = DefaultSdpProcessor::new();
        let description = SessionDescription::new(SdpType::Answer, config(3));
        let wire = description.to_rtc(&processor).unwrap();
        assert_eq!(wire.sdp_type(), SdpType::Answer);
        assert!(wire.sdp().contains("o=- 9 3 IN IP4"));
    }

    #[test]
    fn test_type_tokens() {
        assert_eq!("pranswer".parse::<SdpType>().unwrap(), SdpType::Pranswer);
        assert!("provisional".parse::<SdpType>().is_err());
    }
}
