//! Events raised by a peer connection
//!
//! Events are delivered on the unbounded channel returned when the connection
//! is built. Sending never blocks the engine; if the application dropped the
//! receiver the event is discarded.

use tokio::sync::mpsc;

use crate::ice::{IceConnectionState, IceGatheringState};
use crate::media::{MediaStream, MediaStreamTrack};
use crate::state::SignalingState;
use crate::transceiver::{RtpReceiver, TransceiverId};

/// Wire form of an ICE candidate as exchanged with the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcIceCandidate {
    /// The `candidate:` line
    pub candidate: String,
    /// Mid of the media line the candidate belongs to
    pub sdp_mid: Option<String>,
    /// Index of the media line the candidate belongs to
    pub sdp_m_line_index: Option<usize>,
}

impl RtcIceCandidate {
    pub fn new(candidate: impl Into<String>, sdp_mid: Option<String>, sdp_m_line_index: Option<usize>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid,
            sdp_m_line_index,
        }
    }

    /// Candidate addressed to a media line by mid
    pub fn for_mid(candidate: impl Into<String>, mid: impl Into<String>) -> Self {
        Self::new(candidate, Some(mid.into()), None)
    }

    /// Candidate addressed to a media line by position
    pub fn for_index(candidate: impl Into<String>, index: usize) -> Self {
        Self::new(candidate, None, Some(index))
    }
}

/// Notifications from the negotiation engine
#[derive(Debug, Clone)]
pub enum PeerConnectionEvent {
    /// The signaling state changed
    SignalingStateChange(SignalingState),

    /// The connection-wide ICE gathering state changed
    IceGatheringStateChange(IceGatheringState),

    /// The aggregated ICE connection state changed
    IceConnectionStateChange(IceConnectionState),

    /// A new offer/answer exchange is needed
    NegotiationNeeded,

    /// A local candidate was gathered; `None` marks the end of candidates
    IceCandidate(Option<RtcIceCandidate>),

    /// A remote track became available on a transceiver
    Track {
        transceiver: TransceiverId,
        receiver: RtpReceiver,
        track: MediaStreamTrack,
        streams: Vec<MediaStream>,
    },

    /// A remote stream was seen for the first time
    AddStream(MediaStream),
}

/// Sending side of the event channel
pub type EventSender = mpsc::UnboundedSender<PeerConnectionEvent>;

/// Receiving side of the event channel
pub type EventReceiver = mpsc::UnboundedReceiver<PeerConnectionEvent>;
