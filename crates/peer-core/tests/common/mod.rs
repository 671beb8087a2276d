//! Shared helpers for peer connection integration tests

#![allow(dead_code)]

use rtcpeer_peer_core::logging::{init_logging, LoggingConfig};
use rtcpeer_peer_core::prelude::*;
use rtcpeer_peer_core::EventReceiver;
use rtcpeer_sdp_core::{DefaultSdpProcessor, MediaPayload, PeerMediaDescription, SdpProcessor, SessionConfiguration};

/// A connection together with its event stream and mock backend
pub struct TestPeer {
    pub pc: PeerConnection,
    pub events: EventReceiver,
    pub endpoint: MockEndpointHandle,
}

impl TestPeer {
    /// Connection whose fingerprint has already been delivered
    pub fn ready() -> Self {
        let mut peer = Self::with_handle(MockEndpointHandle::new());
        peer.pc.process_endpoint_events();
        peer
    }

    /// Connection still waiting for its fingerprint
    pub fn waiting() -> Self {
        Self::with_handle(MockEndpointHandle::without_auto_fingerprint())
    }

    fn with_handle(endpoint: MockEndpointHandle) -> Self {
        // Only the first peer in a test binary installs the subscriber
        let _ = init_logging(&LoggingConfig::for_tests());

        let handle = endpoint.clone();
        let (pc, events) = PeerConnection::new(PeerConnectionConfig::default(), move |client| {
            MockMediaEndpoint::with_handle(client, handle)
        })
        .expect("default configuration is valid");
        Self { pc, events, endpoint }
    }

    /// Every event raised since the last call
    pub fn drain_events(&mut self) -> Vec<PeerConnectionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Signaling states reported since the last drain
    pub fn signaling_changes(&mut self) -> Vec<SignalingState> {
        self.drain_events()
            .into_iter()
            .filter_map(|event| match event {
                PeerConnectionEvent::SignalingStateChange(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    /// Apply pending endpoint callbacks
    pub fn pump(&mut self) {
        self.pc.process_endpoint_events();
    }
}

/// Run a complete offer/answer exchange
pub async fn negotiate(caller: &mut TestPeer, callee: &mut TestPeer) {
    let offer = caller.pc.create_offer(OfferOptions::default()).await.unwrap().unwrap();
    caller.pc.set_local_description(offer.clone()).await.unwrap().unwrap();
    callee.pc.set_remote_description(offer).await.unwrap().unwrap();

    let answer = callee.pc.create_answer(AnswerOptions::default()).await.unwrap().unwrap();
    callee.pc.set_local_description(answer.clone()).await.unwrap().unwrap();
    caller.pc.set_remote_description(answer).await.unwrap().unwrap();
}

pub fn parse(description: &RtcSessionDescription) -> SessionConfiguration {
    DefaultSdpProcessor::new().parse(&description.sdp()).expect("generated SDP parses")
}

/// A remote media line as another implementation would send it
pub fn remote_line(mid: &str, kind: MediaKind, stream_id: &str, track_id: &str) -> PeerMediaDescription {
    let mut line = PeerMediaDescription::new(mid, kind.clone());
    line.payloads = match kind {
        MediaKind::Audio => vec![MediaPayload::new(111, "opus", 48000, 2)],
        _ => vec![MediaPayload::new(96, "VP8", 90000, 1)],
    };
    line.media_stream_id = stream_id.to_string();
    line.media_stream_track_id = track_id.to_string();
    line.dtls_fingerprint = "AB:CD:EF".to_string();
    line.cname = "remote-cname".to_string();
    line.ssrcs = vec![1234];
    line.ice_ufrag = "rmtu".to_string();
    line.ice_password = "remote-password-0123456".to_string();
    line
}

/// Wire offer carrying `lines`
pub fn remote_offer(lines: Vec<PeerMediaDescription>) -> RtcSessionDescription {
    let mut config = SessionConfiguration::with_session_id(4242);
    config.session_version = 1;
    config.media_descriptions = lines;
    RtcSessionDescription::offer(DefaultSdpProcessor::new().generate(&config).expect("valid remote offer"))
}
