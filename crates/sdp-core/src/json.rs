//! JSON interchange form
//!
//! Some SDP processors live outside the process (a scripting engine, a
//! signalling server) and exchange session configurations as JSON instead of
//! Rust values. Keys are camelCase and enums use their SDP tokens, so
//! `"mode": "sendrecv"` or `"type": "srflx"`.

use crate::candidate::IceCandidate;
use crate::configuration::SessionConfiguration;
use crate::error::Result;

/// Serialize a configuration to JSON
pub fn to_json(configuration: &SessionConfiguration) -> Result<String> {
    Ok(serde_json::to_string(configuration)?)
}

/// Deserialize a configuration from JSON
pub fn from_json(json: &str) -> Result<SessionConfiguration> {
    Ok(serde_json::from_str(json)?)
}

/// Serialize a candidate to JSON
pub fn candidate_to_json(candidate: &IceCandidate) -> Result<String> {
    Ok(serde_json::to_string(candidate)?)
}

/// Deserialize a candidate from JSON
pub fn candidate_from_json(json: &str) -> Result<IceCandidate> {
    Ok(serde_json::from_str(json)?)
}
