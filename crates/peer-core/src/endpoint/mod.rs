//! Media endpoint contract
//!
//! The media endpoint is the backend that owns ICE agents, DTLS transports and
//! RTP sessions. The negotiation engine drives it through the [`MediaEndpoint`]
//! trait and learns about asynchronous progress through [`EndpointEvent`]s
//! sent on a [`MediaEndpointClient`].
//!
//! ```text
//!   PeerConnection ──── MediaEndpoint trait calls ────▶ backend
//!        ▲                                                 │
//!        └──────────── EndpointEvent channel ◀─────────────┘
//!                      (MediaEndpointClient)
//! ```
//!
//! Calls made after [`MediaEndpoint::stop`] must have no effect.

pub mod mock;

use std::collections::HashMap;

use rtcpeer_sdp_core::payload::{PARAM_APT, PARAM_PACKETIZATION_MODE, PARAM_RTX_TIME};
use rtcpeer_sdp_core::{IceCandidate, MediaKind, MediaPayload, SessionConfiguration};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::PeerConnectionConfig;
use crate::ice::IceTransportState;
use crate::media::MediaSource;

pub use mock::{MockEndpointHandle, MockMediaEndpoint};

/// Outcome of pushing a configuration into the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateResult {
    #[default]
    Success,
    /// Applied, and the ICE agent restarted gathering
    SuccessWithIceRestart,
    Failed,
}

/// Local sources to send, keyed by mid
pub type SourceMap = HashMap<String, MediaSource>;

/// Backend that realizes negotiated sessions
pub trait MediaEndpoint: Send {
    /// Apply ICE servers and policies
    fn set_configuration(&mut self, configuration: &PeerConnectionConfig);

    /// Start generating the DTLS certificate
    ///
    /// Completion is reported with [`EndpointEvent::DtlsFingerprint`].
    fn generate_dtls_info(&mut self);

    /// Audio codecs this endpoint can handle, in preference order
    fn default_audio_payloads(&self) -> Vec<MediaPayload>;

    /// Video codecs this endpoint can handle, in preference order
    fn default_video_payloads(&self) -> Vec<MediaPayload>;

    /// Reduce a remote payload list to what this endpoint supports
    ///
    /// Remote payloads are kept, in remote order, when their encoding name
    /// matches one of `defaults` (case-insensitively) and, if both sides carry
    /// a packetization mode, the modes agree.
    fn filter_payloads(&self, remote: &[MediaPayload], defaults: &[MediaPayload]) -> Vec<MediaPayload> {
        remote
            .iter()
            .filter(|payload| {
                defaults.iter().any(|default| {
                    default.matches_encoding(payload)
                        && match (
                            default.parameter(PARAM_PACKETIZATION_MODE),
                            payload.parameter(PARAM_PACKETIZATION_MODE),
                        ) {
                            (Some(a), Some(b)) => a == b,
                            _ => true,
                        }
                })
            })
            .cloned()
            .collect()
    }

    /// Prepare to receive the media described by the local configuration
    fn update_receive_configuration(
        &mut self,
        configuration: &SessionConfiguration,
        is_initiator: bool,
    ) -> UpdateResult;

    /// Prepare to send to the remote peer described by the remote configuration
    fn update_send_configuration(
        &mut self,
        configuration: &SessionConfiguration,
        sources: &SourceMap,
        is_initiator: bool,
    ) -> UpdateResult;

    /// Hand a remote candidate to the ICE agent of `mid`
    fn add_remote_candidate(&mut self, candidate: &IceCandidate, mid: &str, ufrag: &str, password: &str);

    /// Create a muted placeholder for remote media on `mid`
    fn create_muted_remote_source(&mut self, mid: &str, kind: &MediaKind) -> MediaSource;

    /// Start sending `source` on `mid`
    fn replace_send_source(&mut self, source: &MediaSource, mid: &str);

    /// Release every resource; later calls must have no effect
    fn stop(&mut self);
}

/// Asynchronous notifications from the endpoint to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    /// The DTLS certificate is ready
    DtlsFingerprint { fingerprint: String, hash_function: String },

    /// A local candidate was gathered for `mid`
    IceCandidate { mid: String, candidate: IceCandidate },

    /// Candidate gathering for `mid` finished
    GatheringDone { mid: String },

    /// The ICE transport of `mid` changed state
    IceTransportStateChanged { mid: String, state: IceTransportState },
}

/// Handle an endpoint uses to report back to its connection
#[derive(Debug, Clone)]
pub struct MediaEndpointClient {
    tx: mpsc::UnboundedSender<EndpointEvent>,
}

impl MediaEndpointClient {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<EndpointEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: EndpointEvent) {
        if self.tx.send(event).is_err() {
            debug!("Peer connection dropped, discarding endpoint event");
        }
    }

    pub fn got_dtls_fingerprint(&self, fingerprint: impl Into<String>, hash_function: impl Into<String>) {
        self.send(EndpointEvent::DtlsFingerprint {
            fingerprint: fingerprint.into(),
            hash_function: hash_function.into(),
        });
    }

    pub fn got_ice_candidate(&self, mid: impl Into<String>, candidate: IceCandidate) {
        self.send(EndpointEvent::IceCandidate {
            mid: mid.into(),
            candidate,
        });
    }

    pub fn done_gathering_candidates(&self, mid: impl Into<String>) {
        self.send(EndpointEvent::GatheringDone { mid: mid.into() });
    }

    pub fn ice_transport_state_changed(&self, mid: impl Into<String>, state: IceTransportState) {
        self.send(EndpointEvent::IceTransportStateChanged {
            mid: mid.into(),
            state,
        });
    }
}

/// Audio codecs of the reference backend: Opus, PCMA, PCMU
pub fn default_audio_payloads() -> Vec<MediaPayload> {
    vec![
        MediaPayload::new(111, "OPUS", 48000, 2),
        MediaPayload::new(8, "PCMA", 8000, 1),
        MediaPayload::new(0, "PCMU", 8000, 1),
    ]
}

/// Video codecs of the reference backend: VP8 with feedback, and RTX for it
pub fn default_video_payloads() -> Vec<MediaPayload> {
    vec![
        MediaPayload::new(100, "VP8", 90000, 1).with_feedback(true, true, true),
        MediaPayload::new(120, "RTX", 90000, 1)
            .with_parameter(PARAM_APT, 100)
            .with_parameter(PARAM_RTX_TIME, 200),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(remote: &[MediaPayload], defaults: &[MediaPayload]) -> Vec<MediaPayload> {
        let (client, _rx) = MediaEndpointClient::channel();
        MockMediaEndpoint::new(client).filter_payloads(remote, defaults)
    }

    #[test]
    fn test_filter_keeps_supported_in_remote_order() {
        let remote = vec![
            MediaPayload::new(0, "PCMU", 8000, 1),
            MediaPayload::new(9, "G722", 8000, 1),
            MediaPayload::new(109, "opus", 48000, 2),
        ];
        let filtered = filter(&remote, &default_audio_payloads());
        let types: Vec<u8> = filtered.iter().map(|p| p.payload_type).collect();
        assert_eq!(types, vec![0, 109]);
    }

    #[test]
    fn test_filter_checks_packetization_mode() {
        let defaults = vec![MediaPayload::new(126, "H264", 90000, 1).with_parameter(PARAM_PACKETIZATION_MODE, 1)];
        let remote = vec![
            MediaPayload::new(97, "H264", 90000, 1).with_parameter(PARAM_PACKETIZATION_MODE, 0),
            MediaPayload::new(98, "H264", 90000, 1).with_parameter(PARAM_PACKETIZATION_MODE, 1),
            MediaPayload::new(99, "H264", 90000, 1),
        ];
        let types: Vec<u8> = filter(&remote, &defaults).iter().map(|p| p.payload_type).collect();
        assert_eq!(types, vec![98, 99]);
    }

    #[test]
    fn test_default_video_has_rtx_for_vp8() {
        let video = default_video_payloads();
        let rtx = rtcpeer_sdp_core::payload::rtx_for(&video, 100).expect("RTX for VP8");
        assert_eq!(rtx.parameter(PARAM_RTX_TIME), Some(200));
        assert!(video[0].has_feedback());
    }

    #[test]
    fn test_client_events_reach_receiver() {
        let (client, mut rx) = MediaEndpointClient::channel();
        client.done_gathering_candidates("1");
        client.ice_transport_state_changed("1", IceTransportState::Checking);
        assert_eq!(rx.try_recv().unwrap(), EndpointEvent::GatheringDone { mid: "1".into() });
        assert_eq!(
            rx.try_recv().unwrap(),
            EndpointEvent::IceTransportStateChanged { mid: "1".into(), state: IceTransportState::Checking }
        );
    }
}
