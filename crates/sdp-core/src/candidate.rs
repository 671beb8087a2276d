//! ICE candidate model
//!
//! Candidates are stored on media lines in structured form. The textual
//! `candidate:` grammar (RFC 8839 section 5.1) lives in the processor; this
//! module only maps the closed enums to their wire tokens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SdpError;

/// ICE candidate type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateType {
    /// Host candidate (local interface address)
    #[serde(rename = "host")]
    Host,
    /// Server reflexive candidate (public address seen by a STUN server)
    #[serde(rename = "srflx")]
    Srflx,
    /// Peer reflexive candidate (learned during connectivity checks)
    #[serde(rename = "prflx")]
    Prflx,
    /// Relayed candidate (TURN allocation)
    #[serde(rename = "relay")]
    Relay,
}

impl CandidateType {
    /// Wire token for this type
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateType::Host => "host",
            CandidateType::Srflx => "srflx",
            CandidateType::Prflx => "prflx",
            CandidateType::Relay => "relay",
        }
    }
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateType {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(CandidateType::Host),
            "srflx" => Ok(CandidateType::Srflx),
            "prflx" => Ok(CandidateType::Prflx),
            "relay" => Ok(CandidateType::Relay),
            _ => Err(SdpError::parse(format!("invalid candidate type '{}'", s))),
        }
    }
}

/// Transport protocol of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CandidateTransport {
    #[default]
    #[serde(rename = "UDP")]
    Udp,
    #[serde(rename = "TCP")]
    Tcp,
}

impl CandidateTransport {
    /// Wire token for this transport
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateTransport::Udp => "UDP",
            CandidateTransport::Tcp => "TCP",
        }
    }
}

impl fmt::Display for CandidateTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateTransport {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("udp") {
            Ok(CandidateTransport::Udp)
        } else if s.eq_ignore_ascii_case("tcp") {
            Ok(CandidateTransport::Tcp)
        } else {
            Err(SdpError::parse(format!("invalid candidate transport '{}'", s)))
        }
    }
}

/// TCP candidate type (RFC 6544)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TcpType {
    Active,
    Passive,
    So,
}

impl TcpType {
    /// Wire token for this TCP type
    pub fn as_str(&self) -> &'static str {
        match self {
            TcpType::Active => "active",
            TcpType::Passive => "passive",
            TcpType::So => "so",
        }
    }
}

impl FromStr for TcpType {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TcpType::Active),
            "passive" => Ok(TcpType::Passive),
            "so" => Ok(TcpType::So),
            _ => Err(SdpError::parse(format!("invalid tcptype '{}'", s))),
        }
    }
}

/// A single ICE candidate attached to a media line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// Candidate type
    #[serde(rename = "type")]
    pub candidate_type: CandidateType,

    /// Foundation
    pub foundation: String,

    /// Component ID (1 = RTP, 2 = RTCP)
    pub component_id: u32,

    /// Transport protocol
    pub transport: CandidateTransport,

    /// Priority
    pub priority: u32,

    /// Connection address (IP literal or hostname)
    pub address: String,

    /// Connection port
    pub port: u16,

    /// TCP candidate type, only for TCP candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_type: Option<TcpType>,

    /// Related address for reflexive and relayed candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_address: Option<String>,

    /// Related port for reflexive and relayed candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_port: Option<u16>,
}

impl IceCandidate {
    /// Create a host candidate for the RTP component
    pub fn host(foundation: impl Into<String>, priority: u32, address: impl Into<String>, port: u16) -> Self {
        Self {
            candidate_type: CandidateType::Host,
            foundation: foundation.into(),
            component_id: 1,
            transport: CandidateTransport::Udp,
            priority,
            address: address.into(),
            port,
            tcp_type: None,
            related_address: None,
            related_port: None,
        }
    }

    /// Whether this candidate belongs to the RTP component
    pub fn is_rtp(&self) -> bool {
        self.component_id == 1
    }

    /// Whether the address is an IPv6 literal
    pub fn is_ipv6(&self) -> bool {
        self.address.contains(':')
    }
}
