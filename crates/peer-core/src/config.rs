//! Peer connection configuration
//!
//! [`PeerConnectionConfig`] is what the application hands to the connection at
//! construction time and through [`PeerConnection::set_configuration`]. The
//! engine validates it and passes it on to the media endpoint untouched; ICE
//! servers and policies are the endpoint's business.
//!
//! ```
//! use rtcpeer_peer_core::config::{IceServer, IceTransportPolicy, PeerConnectionConfig};
//!
//! let config = PeerConnectionConfig::new()
//!     .with_ice_server(IceServer::new("stun:stun.example.org:3478"))
//!     .with_ice_transport_policy(IceTransportPolicy::All);
//! assert!(config.validate().is_ok());
//!
//! let parsed = PeerConnectionConfig::from_json(
//!     r#"{"iceServers":[{"urls":["stun:stun.example.org"]}],"bundlePolicy":"max-bundle"}"#,
//! ).unwrap();
//! assert_eq!(parsed.ice_servers.len(), 1);
//! ```
//!
//! [`PeerConnection::set_configuration`]: crate::PeerConnection::set_configuration

use serde::{Deserialize, Serialize};

use crate::error::{PeerConnectionError, Result};

/// A STUN or TURN server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    /// Server URLs (`stun:`, `stuns:`, `turn:` or `turns:`)
    pub urls: Vec<String>,

    /// Username for TURN servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Credential for TURN servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// Create a server entry with a single URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    /// Attach TURN credentials
    pub fn with_credentials(mut self, username: impl Into<String>, credential: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.credential = Some(credential.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.urls.is_empty() {
            return Err(PeerConnectionError::invalid_configuration("ICE server without URLs"));
        }

        for url in &self.urls {
            let scheme = url.split(':').next().unwrap_or_default().to_ascii_lowercase();
            match scheme.as_str() {
                "stun" | "stuns" => {}
                "turn" | "turns" => {
                    if self.username.is_none() || self.credential.is_none() {
                        return Err(PeerConnectionError::invalid_configuration(format!(
                            "TURN server {} requires a username and credential",
                            url
                        )));
                    }
                }
                _ => {
                    return Err(PeerConnectionError::invalid_configuration(format!(
                        "unsupported ICE server URL {}",
                        url
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Which candidates ICE may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportPolicy {
    /// Any candidate
    #[default]
    All,
    /// Relayed candidates only
    Relay,
}

/// How media lines are bundled onto transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundlePolicy {
    #[default]
    Balanced,
    MaxCompat,
    MaxBundle,
}

/// Configuration of a peer connection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeerConnectionConfig {
    /// STUN/TURN servers
    pub ice_servers: Vec<IceServer>,

    /// Candidate filter
    pub ice_transport_policy: IceTransportPolicy,

    /// Bundle policy
    pub bundle_policy: BundlePolicy,
}

impl PeerConnectionConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ICE server
    pub fn with_ice_server(mut self, server: IceServer) -> Self {
        self.ice_servers.push(server);
        self
    }

    /// Set the ICE transport policy
    pub fn with_ice_transport_policy(mut self, policy: IceTransportPolicy) -> Self {
        self.ice_transport_policy = policy;
        self
    }

    /// Set the bundle policy
    pub fn with_bundle_policy(mut self, policy: BundlePolicy) -> Self {
        self.bundle_policy = policy;
        self
    }

    /// Parse a configuration from its JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PeerConnectionError::invalid_configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for unusable entries
    pub fn validate(&self) -> Result<()> {
        for server in &self.ice_servers {
            server.validate()?;
        }
        if self.ice_transport_policy == IceTransportPolicy::Relay
            && !self.ice_servers.iter().any(|s| {
                s.urls.iter().any(|u| u.starts_with("turn:") || u.starts_with("turns:"))
            })
        {
            return Err(PeerConnectionError::invalid_configuration(
                "relay-only policy without any TURN server",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PeerConnectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_turn_requires_credentials() {
        let config = PeerConnectionConfig::new().with_ice_server(IceServer::new("turn:turn.example.org"));
        assert!(matches!(config.validate(), Err(PeerConnectionError::InvalidConfiguration(_))));

        let config = PeerConnectionConfig::new()
            .with_ice_server(IceServer::new("turn:turn.example.org").with_credentials("user", "pass"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_scheme_and_empty_urls() {
        let config = PeerConnectionConfig::new().with_ice_server(IceServer::new("http://example.org"));
        assert!(config.validate().is_err());

        let mut server = IceServer::new("stun:example.org");
        server.urls.clear();
        assert!(PeerConnectionConfig::new().with_ice_server(server).validate().is_err());
    }

    #[test]
    fn test_relay_policy_needs_turn() {
        let config = PeerConnectionConfig::new()
            .with_ice_server(IceServer::new("stun:stun.example.org"))
            .with_ice_transport_policy(IceTransportPolicy::Relay);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_form() {
        let config = PeerConnectionConfig::from_json(
            r#"{"iceServers":[{"urls":["turns:t.example.org"],"username":"u","credential":"c"}],"iceTransportPolicy":"relay","bundlePolicy":"max-compat"}"#,
        )
        .unwrap();
        assert_eq!(config.ice_transport_policy, IceTransportPolicy::Relay);
        assert_eq!(config.bundle_policy, BundlePolicy::MaxCompat);
        assert_eq!(config.ice_servers[0].username.as_deref(), Some("u"));

        assert!(PeerConnectionConfig::from_json(r#"{"iceTransportPolicy":"sometimes"}"#).is_err());
        assert_eq!(PeerConnectionConfig::from_json("{}").unwrap(), PeerConnectionConfig::default());
    }
}
