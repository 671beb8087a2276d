//! The negotiation engine
//!
//! [`PeerConnection`] implements JSEP offer/answer on top of a pluggable
//! [`MediaEndpoint`] and [`SdpProcessor`]. It owns all negotiation state:
//! the signaling state, the four description slots, the transceivers and the
//! ICE state aggregates.
//!
//! # Operation model
//!
//! Every mutating operation returns a [`PendingResult`] and runs through a
//! [`DeferredTaskQueue`]. The queue stays closed until the media endpoint
//! reports the local DTLS fingerprint, because every media line we generate
//! must carry it. Operations submitted before that point wait; everything
//! afterwards runs synchronously inside the call.
//!
//! ```text
//!   create_offer() ──▶ DeferredTaskQueue ──(fingerprint known)──▶ Negotiator
//!        │                                                           │
//!        └──────────────────── PendingResult ◀───────────────────────┘
//! ```
//!
//! The engine is single threaded. Endpoint callbacks arrive on a channel and
//! are applied by [`PeerConnection::process_endpoint_events`] (or the async
//! [`PeerConnection::next_endpoint_event`]), or by calling the callback
//! methods directly.
//!
//! # Example
//!
//! ```
//! use rtcpeer_peer_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut pc, _events) = PeerConnection::new(PeerConnectionConfig::default(), MockMediaEndpoint::new).unwrap();
//! pc.process_endpoint_events(); // DTLS fingerprint arrives
//!
//! pc.add_transceiver(MediaKind::Audio, TransceiverInit::default()).unwrap();
//! let offer = pc.create_offer(OfferOptions::default()).await.unwrap().unwrap();
//! pc.set_local_description(offer).await.unwrap().unwrap();
//! assert_eq!(pc.signaling_state(), SignalingState::HaveLocalOffer);
//! # }
//! ```

mod apply;
mod callbacks;
mod offer_answer;
mod pending;
mod tracks;

pub use pending::PendingResult;

use rtcpeer_sdp_core::{
    DefaultSdpProcessor, MediaKind, MediaPayload, PeerMediaDescription, SdpProcessor, SessionConfiguration,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, Span};

use crate::config::PeerConnectionConfig;
use crate::credentials;
use crate::description::{RtcSessionDescription, SessionDescription};
use crate::endpoint::{EndpointEvent, MediaEndpoint, MediaEndpointClient, UpdateResult};
use crate::error::{PeerConnectionError, Result};
use crate::events::{EventReceiver, EventSender, PeerConnectionEvent, RtcIceCandidate};
use crate::ice::{IceConnectionState, IceGatheringState, IceTransportState};
use crate::logging;
use crate::media::{MediaStream, MediaStreamTrack};
use crate::queue::DeferredTaskQueue;
use crate::state::SignalingState;
use crate::transceiver::{
    RtpReceiver, RtpSender, RtpTransceiver, TransceiverDirection, TransceiverId, TransceiverInit,
    TransceiverRegistry,
};

/// Options for [`PeerConnection::create_offer`]
#[derive(Debug, Clone, Copy, Default)]
pub struct OfferOptions {
    /// Put fresh ICE credentials on every media line of the offer
    pub ice_restart: bool,
}

/// Options for [`PeerConnection::create_answer`]
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct AnswerOptions {}

/// Builder for [`PeerConnection`]
pub struct PeerConnectionBuilder {
    config: PeerConnectionConfig,
    sdp_processor: Option<Box<dyn SdpProcessor>>,
}

impl PeerConnectionBuilder {
    pub fn new() -> Self {
        Self {
            config: PeerConnectionConfig::default(),
            sdp_processor: None,
        }
    }

    /// Set the connection configuration
    pub fn with_config(mut self, config: PeerConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom SDP processor instead of [`DefaultSdpProcessor`]
    pub fn with_sdp_processor(mut self, processor: impl SdpProcessor + 'static) -> Self {
        self.sdp_processor = Some(Box::new(processor));
        self
    }

    /// Build the connection around the endpoint produced by `create_endpoint`
    ///
    /// The factory receives the [`MediaEndpointClient`] the endpoint uses to
    /// report back. The returned receiver yields the connection's events.
    pub fn build<F, E>(self, create_endpoint: F) -> Result<(PeerConnection, EventReceiver)>
    where
        F: FnOnce(MediaEndpointClient) -> E,
        E: MediaEndpoint + 'static,
    {
        self.config.validate()?;

        let (client, endpoint_events) = MediaEndpointClient::channel();
        let mut endpoint: Box<dyn MediaEndpoint> = Box::new(create_endpoint(client));
        let (events, event_rx) = mpsc::unbounded_channel();

        endpoint.set_configuration(&self.config);
        let default_audio_payloads = endpoint.default_audio_payloads();
        let default_video_payloads = endpoint.default_video_payloads();

        let session_id = rtcpeer_sdp_core::configuration::generate_session_id();
        let span = logging::connection_span(session_id);
        let negotiator = Negotiator {
            config: self.config,
            endpoint,
            sdp: self
                .sdp_processor
                .unwrap_or_else(|| Box::new(DefaultSdpProcessor::new())),
            events,
            transceivers: TransceiverRegistry::new(),
            signaling_state: SignalingState::Stable,
            ice_gathering_state: IceGatheringState::New,
            ice_connection_state: IceConnectionState::New,
            current_local: None,
            pending_local: None,
            current_remote: None,
            pending_remote: None,
            session_id,
            offer_version: 0,
            answer_version: 0,
            cname: credentials::generate_cname(),
            ice_ufrag: credentials::generate_ice_ufrag(),
            ice_password: credentials::generate_ice_password(),
            dtls_fingerprint: String::new(),
            dtls_fingerprint_function: String::new(),
            default_audio_payloads,
            default_video_payloads,
            negotiation_needed: false,
            remote_streams: Vec::new(),
            span,
        };

        let mut pc = PeerConnection {
            negotiator,
            queue: DeferredTaskQueue::new(),
            endpoint_events,
        };
        pc.in_span(|pc| {
            pc.negotiator.endpoint.generate_dtls_info();
            info!("Created peer connection");
        });

        Ok((pc, event_rx))
    }
}

impl Default for PeerConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// State mutated by queued operations and endpoint callbacks
pub(crate) struct Negotiator {
    config: PeerConnectionConfig,
    endpoint: Box<dyn MediaEndpoint>,
    sdp: Box<dyn SdpProcessor>,
    events: EventSender,
    transceivers: TransceiverRegistry,
    signaling_state: SignalingState,
    ice_gathering_state: IceGatheringState,
    ice_connection_state: IceConnectionState,
    current_local: Option<SessionDescription>,
    pending_local: Option<SessionDescription>,
    current_remote: Option<SessionDescription>,
    pending_remote: Option<SessionDescription>,
    session_id: u64,
    offer_version: u64,
    answer_version: u64,
    cname: String,
    ice_ufrag: String,
    ice_password: String,
    dtls_fingerprint: String,
    dtls_fingerprint_function: String,
    default_audio_payloads: Vec<MediaPayload>,
    default_video_payloads: Vec<MediaPayload>,
    negotiation_needed: bool,
    remote_streams: Vec<MediaStream>,
    span: Span,
}

impl Negotiator {
    fn is_closed(&self) -> bool {
        self.signaling_state == SignalingState::Closed
    }

    fn emit(&self, event: PeerConnectionEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped, discarding event");
        }
    }

    /// Pending local description if any, otherwise the current one
    fn internal_local_description(&self) -> Option<&SessionDescription> {
        self.pending_local.as_ref().or(self.current_local.as_ref())
    }

    fn internal_local_description_mut(&mut self) -> Option<&mut SessionDescription> {
        self.pending_local.as_mut().or(self.current_local.as_mut())
    }

    /// Pending remote description if any, otherwise the current one
    fn internal_remote_description(&self) -> Option<&SessionDescription> {
        self.pending_remote.as_ref().or(self.current_remote.as_ref())
    }

    fn internal_remote_description_mut(&mut self) -> Option<&mut SessionDescription> {
        self.pending_remote.as_mut().or(self.current_remote.as_mut())
    }

    fn set_signaling_state(&mut self, state: SignalingState) {
        if self.signaling_state != state {
            debug!("Signaling state {} -> {}", self.signaling_state, state);
            self.signaling_state = state;
            self.emit(PeerConnectionEvent::SignalingStateChange(state));
        }
    }

    fn set_ice_gathering_state(&mut self, state: IceGatheringState) {
        if self.ice_gathering_state != state {
            debug!("ICE gathering state {} -> {}", self.ice_gathering_state, state);
            self.ice_gathering_state = state;
            self.emit(PeerConnectionEvent::IceGatheringStateChange(state));
        }
    }

    fn set_ice_connection_state(&mut self, state: IceConnectionState) {
        if self.ice_connection_state != state {
            debug!("ICE connection state {} -> {}", self.ice_connection_state, state);
            self.ice_connection_state = state;
            self.emit(PeerConnectionEvent::IceConnectionStateChange(state));
        }
    }

    /// Flag that a new offer/answer exchange is needed
    ///
    /// The notification goes out right away in `stable`, otherwise once the
    /// connection returns to `stable`.
    fn mark_as_needing_negotiation(&mut self) {
        if self.negotiation_needed {
            return;
        }
        self.negotiation_needed = true;
        self.fire_negotiation_needed_if_stable();
    }

    fn fire_negotiation_needed_if_stable(&self) {
        if self.negotiation_needed && self.signaling_state == SignalingState::Stable {
            self.emit(PeerConnectionEvent::NegotiationNeeded);
        }
    }

    fn next_offer_version(&mut self) -> u64 {
        let version = self.offer_version;
        self.offer_version += 1;
        version
    }

    fn next_answer_version(&mut self) -> u64 {
        let version = self.answer_version;
        self.answer_version += 1;
        version
    }

    /// Deep copy of the latest local configuration, or an empty one
    fn local_configuration_snapshot(&self) -> SessionConfiguration {
        match self.internal_local_description() {
            Some(description) => description.configuration().clone(),
            None => SessionConfiguration::with_session_id(self.session_id),
        }
    }

    fn default_payloads(&self, kind: &MediaKind) -> Vec<MediaPayload> {
        match kind {
            MediaKind::Audio => self.default_audio_payloads.clone(),
            MediaKind::Video => self.default_video_payloads.clone(),
            MediaKind::Other(_) => Vec::new(),
        }
    }

    /// A fresh local media line for `sender`
    fn new_local_line(
        &self,
        mid: &str,
        kind: MediaKind,
        direction: TransceiverDirection,
        sender: &RtpSender,
    ) -> PeerMediaDescription {
        let mut line = PeerMediaDescription::new(mid, kind);
        line.payloads = self.default_payloads(&line.kind);
        line.direction = direction;
        line.media_stream_id = sender.media_stream_id().to_string();
        line.media_stream_track_id = sender.track_id().to_string();
        line.source_id = sender.track().map(|t| t.source().id().to_string());
        line.dtls_fingerprint_hash_function = self.dtls_fingerprint_function.clone();
        line.dtls_fingerprint = self.dtls_fingerprint.clone();
        line.cname = self.cname.clone();
        line.ssrcs.push(rand::random());
        line.ice_ufrag = self.ice_ufrag.clone();
        line.ice_password = self.ice_password.clone();
        line
    }

    /// Map an endpoint update result; `Ok(true)` means ICE restarted
    fn check_update(result: UpdateResult, what: &str) -> Result<bool> {
        match result {
            UpdateResult::Success => Ok(false),
            UpdateResult::SuccessWithIceRestart => Ok(true),
            UpdateResult::Failed => Err(PeerConnectionError::operation(format!(
                "media endpoint rejected the {} configuration",
                what
            ))),
        }
    }

    /// Apply an ICE restart, or the first move out of `new`, after a commit
    fn update_gathering_after_commit(&mut self, ice_restarted: bool, configuration_len: usize) {
        if ice_restarted {
            self.set_ice_gathering_state(IceGatheringState::Gathering);
        } else if self.ice_gathering_state == IceGatheringState::New && configuration_len > 0 {
            self.set_ice_gathering_state(IceGatheringState::Gathering);
        }
    }

    /// Wire form of a stored description; processor failures are logged
    fn wire_description(&self, description: Option<&SessionDescription>) -> Option<RtcSessionDescription> {
        let description = description?;
        match description.to_rtc(self.sdp.as_ref()) {
            Ok(wire) => Some(wire),
            Err(err) => {
                error!("Failed to generate SDP for stored description: {}", err);
                None
            }
        }
    }

    /// Release the media endpoint
    fn stop(&mut self) {
        self.endpoint.stop();
    }
}

/// A WebRTC peer connection driving JSEP negotiation
pub struct PeerConnection {
    negotiator: Negotiator,
    queue: DeferredTaskQueue<Negotiator>,
    endpoint_events: mpsc::UnboundedReceiver<EndpointEvent>,
}

impl PeerConnection {
    /// Create a connection with the default SDP processor
    pub fn new<F, E>(config: PeerConnectionConfig, create_endpoint: F) -> Result<(Self, EventReceiver)>
    where
        F: FnOnce(MediaEndpointClient) -> E,
        E: MediaEndpoint + 'static,
    {
        PeerConnectionBuilder::new().with_config(config).build(create_endpoint)
    }

    pub fn builder() -> PeerConnectionBuilder {
        PeerConnectionBuilder::new()
    }

    /// Whether the DTLS fingerprint is known and operations run immediately
    pub fn is_ready(&self) -> bool {
        self.queue.is_open()
    }

    /// Run `f` inside this connection's span
    fn in_span<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let span = self.negotiator.span.clone();
        let _entered = span.enter();
        f(self)
    }

    fn enqueue<T, F>(&mut self, operation: &'static str, run: F) -> PendingResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Negotiator) -> Result<T> + Send + 'static,
    {
        let (completer, pending) = PendingResult::channel();
        self.in_span(|pc| {
            pc.queue.submit(
                &mut pc.negotiator,
                Box::new(move |negotiator: &mut Negotiator| {
                    if negotiator.is_closed() {
                        debug!("{} dropped, connection is closed", operation);
                        return;
                    }
                    pending::settle(operation, completer, run(negotiator));
                }),
            );
        });
        pending
    }

    /// Produce an offer describing every live transceiver
    pub fn create_offer(&mut self, options: OfferOptions) -> PendingResult<RtcSessionDescription> {
        self.enqueue("create_offer", move |n| n.create_offer(options))
    }

    /// Produce an answer to the remote description
    pub fn create_answer(&mut self, _options: AnswerOptions) -> PendingResult<RtcSessionDescription> {
        self.enqueue("create_answer", |n| n.create_answer())
    }

    /// Apply a local offer, answer, provisional answer or rollback
    pub fn set_local_description(&mut self, description: RtcSessionDescription) -> PendingResult<()> {
        self.enqueue("set_local_description", move |n| n.set_local_description(description))
    }

    /// Apply a remote offer, answer, provisional answer or rollback
    pub fn set_remote_description(&mut self, description: RtcSessionDescription) -> PendingResult<()> {
        self.enqueue("set_remote_description", move |n| n.set_remote_description(description))
    }

    /// Add a remote ICE candidate (an empty candidate marks end of candidates)
    pub fn add_ice_candidate(&mut self, candidate: RtcIceCandidate) -> PendingResult<()> {
        self.enqueue("add_ice_candidate", move |n| n.add_ice_candidate(candidate))
    }

    /// Swap the track a transceiver's sender transmits
    ///
    /// Senders that are not negotiated yet swap synchronously; otherwise the
    /// media endpoint is told to send the new source on the sender's mid.
    pub fn replace_track(&mut self, transceiver: TransceiverId, track: Option<MediaStreamTrack>) -> PendingResult<()> {
        if self.negotiator.is_closed() {
            return PendingResult::abandoned();
        }

        let Some(existing) = self.negotiator.transceivers.get_mut(transceiver) else {
            return PendingResult::ready(Err(PeerConnectionError::operation(format!(
                "{} does not belong to this connection",
                transceiver
            ))));
        };

        if let Some(track) = &track {
            if track.kind() != existing.kind() {
                return PendingResult::ready(Err(PeerConnectionError::operation(format!(
                    "cannot send a {} track on a {} sender",
                    track.kind(),
                    existing.kind()
                ))));
            }
        }

        if existing.mid().is_none() {
            existing.sender_mut().set_track(track);
            return PendingResult::ready(Ok(()));
        }

        self.enqueue("replace_track", move |n| n.replace_track(transceiver, track))
    }

    /// Add a transceiver of `kind` without a track
    pub fn add_transceiver(&mut self, kind: MediaKind, init: TransceiverInit) -> Result<TransceiverId> {
        self.in_span(|pc| pc.negotiator.add_transceiver(kind, None, init))
    }

    /// Add a transceiver that sends `track`
    pub fn add_transceiver_with_track(
        &mut self,
        track: MediaStreamTrack,
        init: TransceiverInit,
    ) -> Result<TransceiverId> {
        let kind = track.kind().clone();
        self.in_span(|pc| pc.negotiator.add_transceiver(kind, Some(track), init))
    }

    /// Start sending `track`
    ///
    /// Reuses a live transceiver of the same kind whose sender never had a
    /// track (for example one created by a remote offer), else adds a
    /// `sendrecv` transceiver.
    pub fn add_track(&mut self, track: MediaStreamTrack, stream_ids: Vec<String>) -> Result<TransceiverId> {
        self.in_span(|pc| pc.negotiator.add_track(track, stream_ids))
    }

    /// Change a transceiver's preferred direction
    pub fn set_transceiver_direction(
        &mut self,
        transceiver: TransceiverId,
        direction: TransceiverDirection,
    ) -> Result<()> {
        self.in_span(|pc| pc.negotiator.set_transceiver_direction(transceiver, direction))
    }

    /// Replace the configuration and forward it to the media endpoint
    pub fn set_configuration(&mut self, config: PeerConnectionConfig) -> Result<()> {
        if self.negotiator.is_closed() {
            return Err(PeerConnectionError::invalid_state("connection is closed"));
        }
        config.validate()?;
        self.negotiator.endpoint.set_configuration(&config);
        self.negotiator.config = config;
        Ok(())
    }

    pub fn configuration(&self) -> &PeerConnectionConfig {
        &self.negotiator.config
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.negotiator.signaling_state
    }

    pub fn ice_gathering_state(&self) -> IceGatheringState {
        self.negotiator.ice_gathering_state
    }

    pub fn ice_connection_state(&self) -> IceConnectionState {
        self.negotiator.ice_connection_state
    }

    /// Whether a negotiation-needed condition is outstanding
    pub fn is_negotiation_needed(&self) -> bool {
        self.negotiator.negotiation_needed
    }

    pub fn transceivers(&self) -> impl Iterator<Item = &RtpTransceiver> {
        self.negotiator.transceivers.iter()
    }

    pub fn transceiver(&self, id: TransceiverId) -> Option<&RtpTransceiver> {
        self.negotiator.transceivers.get(id)
    }

    pub fn senders(&self) -> Vec<&RtpSender> {
        self.negotiator.transceivers.iter().map(|t| t.sender()).collect()
    }

    pub fn receivers(&self) -> Vec<&RtpReceiver> {
        self.negotiator.transceivers.iter().map(|t| t.receiver()).collect()
    }

    /// Remote streams in the order they were first seen
    pub fn remote_streams(&self) -> &[MediaStream] {
        &self.negotiator.remote_streams
    }

    /// Pending local description if any, otherwise the current one
    pub fn local_description(&self) -> Option<RtcSessionDescription> {
        self.negotiator
            .wire_description(self.negotiator.internal_local_description())
    }

    pub fn current_local_description(&self) -> Option<RtcSessionDescription> {
        self.negotiator.wire_description(self.negotiator.current_local.as_ref())
    }

    pub fn pending_local_description(&self) -> Option<RtcSessionDescription> {
        self.negotiator.wire_description(self.negotiator.pending_local.as_ref())
    }

    /// Pending remote description if any, otherwise the current one
    pub fn remote_description(&self) -> Option<RtcSessionDescription> {
        self.negotiator
            .wire_description(self.negotiator.internal_remote_description())
    }

    pub fn current_remote_description(&self) -> Option<RtcSessionDescription> {
        self.negotiator.wire_description(self.negotiator.current_remote.as_ref())
    }

    pub fn pending_remote_description(&self) -> Option<RtcSessionDescription> {
        self.negotiator.wire_description(self.negotiator.pending_remote.as_ref())
    }

    /// Apply every endpoint event that is already waiting; returns how many
    pub fn process_endpoint_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.endpoint_events.try_recv() {
            self.handle_endpoint_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next endpoint event and apply it
    ///
    /// Returns `false` once the endpoint dropped its client.
    pub async fn next_endpoint_event(&mut self) -> bool {
        match self.endpoint_events.recv().await {
            Some(event) => {
                self.handle_endpoint_event(event);
                true
            }
            None => false,
        }
    }

    /// Dispatch one endpoint event to its callback
    pub fn handle_endpoint_event(&mut self, event: EndpointEvent) {
        match event {
            EndpointEvent::DtlsFingerprint { fingerprint, hash_function } => {
                self.got_dtls_fingerprint(fingerprint, hash_function)
            }
            EndpointEvent::IceCandidate { mid, candidate } => self.got_ice_candidate(&mid, candidate),
            EndpointEvent::GatheringDone { mid } => self.done_gathering_candidates(&mid),
            EndpointEvent::IceTransportStateChanged { mid, state } => self.ice_transport_state_changed(&mid, state),
        }
    }

    /// The local DTLS certificate is ready; held operations run now
    pub fn got_dtls_fingerprint(&mut self, fingerprint: impl Into<String>, hash_function: impl Into<String>) {
        self.negotiator.dtls_fingerprint = fingerprint.into();
        self.negotiator.dtls_fingerprint_function = hash_function.into();
        self.in_span(|pc| {
            debug!("DTLS fingerprint available, opening operation queue");
            pc.queue.open(&mut pc.negotiator);
        });
    }

    /// A local candidate was gathered for `mid`
    pub fn got_ice_candidate(&mut self, mid: &str, candidate: rtcpeer_sdp_core::IceCandidate) {
        self.in_span(|pc| pc.negotiator.got_ice_candidate(mid, candidate));
    }

    /// Candidate gathering finished for `mid`
    pub fn done_gathering_candidates(&mut self, mid: &str) {
        self.in_span(|pc| pc.negotiator.done_gathering_candidates(mid));
    }

    /// The ICE transport of `mid` changed state
    pub fn ice_transport_state_changed(&mut self, mid: &str, state: IceTransportState) {
        self.in_span(|pc| pc.negotiator.ice_transport_state_changed(mid, state));
    }

    /// Close the connection and stop the media endpoint
    ///
    /// Queued and later operations are dropped without settling their results.
    pub fn close(&mut self) {
        let span = self.negotiator.span.clone();
        let _entered = span.enter();
        let negotiator = &mut self.negotiator;
        if negotiator.is_closed() {
            return;
        }
        info!("Closing peer connection");

        negotiator.signaling_state = SignalingState::Closed;
        negotiator.ice_connection_state = IceConnectionState::Closed;
        for transceiver in negotiator.transceivers.iter_mut() {
            transceiver.stop();
            transceiver.set_ice_transport_state(IceTransportState::Closed);
        }
        negotiator.stop();
    }

    pub fn is_closed(&self) -> bool {
        self.negotiator.is_closed()
    }
}

impl Drop for PeerConnection {
    fn drop(&mut self) {
        if !self.negotiator.is_closed() {
            self.negotiator.stop();
        }
    }
}
