//! RTP transceivers and their registry
//!
//! A transceiver pairs one [`RtpSender`] with one [`RtpReceiver`] and is bound
//! to at most one media line through its mid. Until a local description that
//! contains it is applied, a transceiver only has a *provisional* mid; that is
//! the value written into offers. The registry owns the mid generator and
//! remembers every mid seen in a description, so a provisional mid never
//! collides with a mid the remote peer picked.

use std::collections::HashSet;
use std::fmt;

use rtcpeer_sdp_core::{MediaDirection, MediaKind};
use tracing::debug;

use crate::ice::IceTransportState;
use crate::media::MediaStreamTrack;

/// Direction preference of a transceiver (same token set as a media line's mode)
pub type TransceiverDirection = MediaDirection;

/// Stable handle to a transceiver within one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransceiverId(usize);

impl TransceiverId {
    pub(crate) fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TransceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transceiver-{}", self.0)
    }
}

/// Monotonic source of provisional mids
#[derive(Debug, Clone, Default)]
pub struct MidGenerator {
    last: u64,
}

impl MidGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused mid (`"1"`, `"2"`, ...)
    pub fn next_mid(&mut self) -> String {
        self.last += 1;
        self.last.to_string()
    }

    /// Next mid for which `taken` is false
    pub fn next_free_mid(&mut self, taken: impl Fn(&str) -> bool) -> String {
        loop {
            let mid = self.next_mid();
            if !taken(&mid) {
                return mid;
            }
        }
    }
}

/// Sending half of a transceiver
#[derive(Debug, Clone)]
pub struct RtpSender {
    kind: MediaKind,
    track: Option<MediaStreamTrack>,
    stream_ids: Vec<String>,
}

impl RtpSender {
    pub fn new(kind: MediaKind, track: Option<MediaStreamTrack>, stream_ids: Vec<String>) -> Self {
        Self { kind, track, stream_ids }
    }

    pub fn kind(&self) -> &MediaKind {
        &self.kind
    }

    pub fn track(&self) -> Option<&MediaStreamTrack> {
        self.track.as_ref()
    }

    pub fn stream_ids(&self) -> &[String] {
        &self.stream_ids
    }

    /// Stream id advertised in `a=msid`, empty without a stream
    pub fn media_stream_id(&self) -> &str {
        self.stream_ids.first().map(String::as_str).unwrap_or("")
    }

    /// Track id advertised in `a=msid`, empty without a track
    pub fn track_id(&self) -> &str {
        self.track.as_ref().map(|t| t.id()).unwrap_or("")
    }

    pub(crate) fn set_track(&mut self, track: Option<MediaStreamTrack>) {
        self.track = track;
    }

    pub(crate) fn set_stream_ids(&mut self, stream_ids: Vec<String>) {
        self.stream_ids = stream_ids;
    }
}

/// Receiving half of a transceiver
#[derive(Debug, Clone)]
pub struct RtpReceiver {
    track: MediaStreamTrack,
}

impl RtpReceiver {
    pub fn new(track: MediaStreamTrack) -> Self {
        Self { track }
    }

    pub fn track(&self) -> &MediaStreamTrack {
        &self.track
    }
}

/// Options for adding a transceiver
#[derive(Debug, Clone, Default)]
pub struct TransceiverInit {
    /// Initial direction
    pub direction: TransceiverDirection,
    /// Stream ids the sender's track belongs to
    pub stream_ids: Vec<String>,
}

impl TransceiverInit {
    pub fn new(direction: TransceiverDirection) -> Self {
        Self {
            direction,
            stream_ids: Vec::new(),
        }
    }

    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_ids.push(stream_id.into());
        self
    }
}

/// A sender/receiver pair bound to at most one media line
#[derive(Debug, Clone)]
pub struct RtpTransceiver {
    id: TransceiverId,
    mid: Option<String>,
    provisional_mid: String,
    direction: TransceiverDirection,
    sender: RtpSender,
    receiver: RtpReceiver,
    stopped: bool,
    ice_transport_state: IceTransportState,
}

impl RtpTransceiver {
    pub fn id(&self) -> TransceiverId {
        self.id
    }

    /// Negotiated mid, `None` until associated with a media line
    pub fn mid(&self) -> Option<&str> {
        self.mid.as_deref()
    }

    /// Mid used when this transceiver is first offered
    pub fn provisional_mid(&self) -> &str {
        &self.provisional_mid
    }

    pub fn direction(&self) -> TransceiverDirection {
        self.direction
    }

    pub fn sender(&self) -> &RtpSender {
        &self.sender
    }

    pub fn receiver(&self) -> &RtpReceiver {
        &self.receiver
    }

    /// Media kind (the sender and receiver always agree)
    pub fn kind(&self) -> &MediaKind {
        self.sender.kind()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn ice_transport_state(&self) -> IceTransportState {
        self.ice_transport_state
    }

    pub(crate) fn set_direction(&mut self, direction: TransceiverDirection) {
        self.direction = direction;
    }

    pub(crate) fn set_mid(&mut self, mid: impl Into<String>) {
        self.mid = Some(mid.into());
    }

    pub(crate) fn sender_mut(&mut self) -> &mut RtpSender {
        &mut self.sender
    }

    pub(crate) fn stop(&mut self) {
        self.stopped = true;
    }

    pub(crate) fn set_ice_transport_state(&mut self, state: IceTransportState) {
        self.ice_transport_state = state;
    }
}

/// Ordered collection of a connection's transceivers
#[derive(Debug, Default)]
pub struct TransceiverRegistry {
    transceivers: Vec<RtpTransceiver>,
    mids: MidGenerator,
    /// Mids that appeared in a local or remote description
    reserved: HashSet<String>,
}

fn mid_taken(transceivers: &[RtpTransceiver], reserved: &HashSet<String>, mid: &str) -> bool {
    reserved.contains(mid)
        || transceivers
            .iter()
            .any(|t| t.mid() == Some(mid) || t.provisional_mid == mid)
}

impl TransceiverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transceiver and hand out its provisional mid
    pub fn add(
        &mut self,
        sender: RtpSender,
        receiver: RtpReceiver,
        direction: TransceiverDirection,
    ) -> TransceiverId {
        let id = TransceiverId(self.transceivers.len());
        let provisional_mid = self.allocate_mid();
        self.transceivers.push(RtpTransceiver {
            id,
            mid: None,
            provisional_mid,
            direction,
            sender,
            receiver,
            stopped: false,
            ice_transport_state: IceTransportState::New,
        });
        id
    }

    /// The provisional mid the next [`add`](Self::add) will hand out
    pub fn peek_next_mid(&self) -> String {
        let mut mids = self.mids.clone();
        mids.next_free_mid(|mid| mid_taken(&self.transceivers, &self.reserved, mid))
    }

    fn allocate_mid(&mut self) -> String {
        let Self {
            transceivers,
            mids,
            reserved,
        } = self;
        mids.next_free_mid(|mid| mid_taken(transceivers, reserved, mid))
    }

    /// Record mids used by a description
    ///
    /// Unassociated transceivers whose provisional mid is among them move to a
    /// fresh provisional mid.
    pub fn reserve_mids<'a>(&mut self, mids: impl IntoIterator<Item = &'a str>) {
        self.reserved.extend(mids.into_iter().map(str::to_string));

        let conflicting: Vec<usize> = self
            .transceivers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.mid.is_none() && self.reserved.contains(&t.provisional_mid))
            .map(|(index, _)| index)
            .collect();
        for index in conflicting {
            let fresh = self.allocate_mid();
            let transceiver = &mut self.transceivers[index];
            debug!(
                "Moving {} from provisional mid '{}' to '{}'",
                transceiver.id, transceiver.provisional_mid, fresh
            );
            transceiver.provisional_mid = fresh;
        }
    }

    pub fn get(&self, id: TransceiverId) -> Option<&RtpTransceiver> {
        self.transceivers.get(id.index())
    }

    pub fn get_mut(&mut self, id: TransceiverId) -> Option<&mut RtpTransceiver> {
        self.transceivers.get_mut(id.index())
    }

    pub fn find_by_mid(&self, mid: &str) -> Option<&RtpTransceiver> {
        self.transceivers.iter().find(|t| t.mid() == Some(mid))
    }

    pub fn find_by_mid_mut(&mut self, mid: &str) -> Option<&mut RtpTransceiver> {
        self.transceivers.iter_mut().find(|t| t.mid() == Some(mid))
    }

    /// Unassociated transceiver that was offered under `mid`
    ///
    /// `None` once another transceiver already owns `mid`.
    pub fn find_by_provisional_mid_mut(&mut self, mid: &str) -> Option<&mut RtpTransceiver> {
        if self.find_by_mid(mid).is_some() {
            return None;
        }
        self.transceivers
            .iter_mut()
            .find(|t| t.mid.is_none() && t.provisional_mid == mid)
    }

    /// First live, unassociated transceiver of the given kind
    pub fn find_unassociated_mut(&mut self, kind: &MediaKind) -> Option<&mut RtpTransceiver> {
        self.transceivers
            .iter_mut()
            .find(|t| t.mid.is_none() && !t.stopped && t.kind() == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RtpTransceiver> {
        self.transceivers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RtpTransceiver> {
        self.transceivers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.transceivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transceivers.is_empty()
    }

    /// Whether any live transceiver still lacks a mid
    pub fn has_unassociated(&self) -> bool {
        self.transceivers.iter().any(|t| t.mid.is_none() && !t.stopped)
    }
}
