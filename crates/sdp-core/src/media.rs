//! Closed enumerations used on media lines
//!
//! Every value that travels as a free-form token in SDP (`audio`, `sendrecv`,
//! `actpass`, ...) is modelled here as an enum. Conversion to and from the wire
//! token happens only through `as_str()` and `FromStr`, so the rest of the stack
//! never compares strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SdpError;

/// Kind of media carried on a media line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MediaKind {
    /// Audio media (`m=audio`)
    Audio,
    /// Video media (`m=video`)
    Video,
    /// Any other media type, kept verbatim (e.g. `application`)
    Other(String),
}

impl MediaKind {
    /// Wire token for this kind
    pub fn as_str(&self) -> &str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Other(kind) => kind.as_str(),
        }
    }

    /// Whether this is audio or video
    pub fn is_audio_or_video(&self) -> bool {
        matches!(self, MediaKind::Audio | MediaKind::Video)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MediaKind {
    fn from(s: &str) -> Self {
        match s {
            "audio" => MediaKind::Audio,
            "video" => MediaKind::Video,
            other => MediaKind::Other(other.to_string()),
        }
    }
}

impl From<String> for MediaKind {
    fn from(s: String) -> Self {
        MediaKind::from(s.as_str())
    }
}

impl From<MediaKind> for String {
    fn from(kind: MediaKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Media direction of a line or transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaDirection {
    /// Send and receive
    #[default]
    SendRecv,
    /// Send only
    SendOnly,
    /// Receive only
    RecvOnly,
    /// Neither send nor receive
    Inactive,
}

impl MediaDirection {
    /// Wire token for this direction
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaDirection::SendRecv => "sendrecv",
            MediaDirection::SendOnly => "sendonly",
            MediaDirection::RecvOnly => "recvonly",
            MediaDirection::Inactive => "inactive",
        }
    }

    /// Whether media is sent in this direction
    pub fn sends(&self) -> bool {
        matches!(self, MediaDirection::SendRecv | MediaDirection::SendOnly)
    }

    /// Whether media is received in this direction
    pub fn receives(&self) -> bool {
        matches!(self, MediaDirection::SendRecv | MediaDirection::RecvOnly)
    }

    /// Build a direction from its send and receive halves
    pub fn from_parts(sends: bool, receives: bool) -> Self {
        match (sends, receives) {
            (true, true) => MediaDirection::SendRecv,
            (true, false) => MediaDirection::SendOnly,
            (false, true) => MediaDirection::RecvOnly,
            (false, false) => MediaDirection::Inactive,
        }
    }

    /// The same direction seen from the other peer
    pub fn reversed(&self) -> Self {
        Self::from_parts(self.receives(), self.sends())
    }

    /// Direction to put in an answer
    ///
    /// The answerer sends only if it wants to and the offerer is willing to
    /// receive. It receives only if it wants to and the offerer sends.
    pub fn answer_for(local: MediaDirection, remote: MediaDirection) -> Self {
        Self::from_parts(
            local.sends() && remote.receives(),
            local.receives() && remote.sends(),
        )
    }
}

impl fmt::Display for MediaDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaDirection {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sendrecv" => Ok(MediaDirection::SendRecv),
            "sendonly" => Ok(MediaDirection::SendOnly),
            "recvonly" => Ok(MediaDirection::RecvOnly),
            "inactive" => Ok(MediaDirection::Inactive),
            _ => Err(SdpError::parse(format!("unknown media direction '{}'", s))),
        }
    }
}

/// DTLS role negotiation value (`a=setup:`), RFC 4145
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DtlsSetup {
    /// Initiates the DTLS handshake
    Active,
    /// Waits for the handshake
    Passive,
    /// Either role, offerer default
    #[default]
    ActPass,
    /// Connection on hold
    HoldConn,
}

impl DtlsSetup {
    /// Wire token for this role
    pub fn as_str(&self) -> &'static str {
        match self {
            DtlsSetup::Active => "active",
            DtlsSetup::Passive => "passive",
            DtlsSetup::ActPass => "actpass",
            DtlsSetup::HoldConn => "holdconn",
        }
    }

    /// Role an answerer takes when the remote side declared `self`
    ///
    /// `active` and `passive` swap. A remote `actpass` leaves the choice to us
    /// and we take `passive`.
    pub fn answer_role(&self) -> Self {
        match self {
            DtlsSetup::Active => DtlsSetup::Passive,
            DtlsSetup::Passive => DtlsSetup::Active,
            DtlsSetup::ActPass => DtlsSetup::Passive,
            DtlsSetup::HoldConn => DtlsSetup::HoldConn,
        }
    }
}

impl fmt::Display for DtlsSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DtlsSetup {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DtlsSetup::Active),
            "passive" => Ok(DtlsSetup::Passive),
            "actpass" => Ok(DtlsSetup::ActPass),
            "holdconn" => Ok(DtlsSetup::HoldConn),
            _ => Err(SdpError::parse(format!("invalid setup value '{}'", s))),
        }
    }
}
