//! JSEP offer/answer negotiation engine.
//!
//! This crate implements the session-negotiation core of a WebRTC peer
//! connection: the signaling state machine, the current and pending session
//! descriptions, RTP transceivers, ICE candidate exchange and the aggregation
//! of per-transport ICE states into one connection state.
//!
//! Media work is delegated to a [`MediaEndpoint`] backend and SDP text to an
//! [`SdpProcessor`](rtcpeer_sdp_core::SdpProcessor). [`MockMediaEndpoint`]
//! records every call and is what the tests drive the engine with.
//!
//! # Example
//!
//! ```
//! use rtcpeer_peer_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut caller, _) = PeerConnection::new(PeerConnectionConfig::default(), MockMediaEndpoint::new).unwrap();
//! let (mut callee, _) = PeerConnection::new(PeerConnectionConfig::default(), MockMediaEndpoint::new).unwrap();
//! caller.process_endpoint_events();
//! callee.process_endpoint_events();
//!
//! caller.add_transceiver(MediaKind::Audio, TransceiverInit::default()).unwrap();
//! let offer = caller.create_offer(OfferOptions::default()).await.unwrap().unwrap();
//! caller.set_local_description(offer.clone()).await.unwrap().unwrap();
//! callee.set_remote_description(offer).await.unwrap().unwrap();
//!
//! let answer = callee.create_answer(AnswerOptions::default()).await.unwrap().unwrap();
//! callee.set_local_description(answer.clone()).await.unwrap().unwrap();
//! caller.set_remote_description(answer).await.unwrap().unwrap();
//!
//! assert_eq!(caller.signaling_state(), SignalingState::Stable);
//! assert_eq!(callee.signaling_state(), SignalingState::Stable);
//! # }
//! ```

// Error handling
pub mod error;

// Configuration and logging
pub mod config;
pub mod logging;

// Session model
pub mod credentials;
pub mod description;
pub mod dtls;
pub mod media;
pub mod state;
pub mod transceiver;

// ICE
pub mod ice;

// Media backend contract
pub mod endpoint;

// Engine
pub mod events;
pub mod peer_connection;
pub mod queue;

pub use config::{BundlePolicy, IceServer, IceTransportPolicy, PeerConnectionConfig};
pub use description::{RtcSessionDescription, SdpType, SessionDescription};
pub use endpoint::{
    EndpointEvent, MediaEndpoint, MediaEndpointClient, MockEndpointHandle, MockMediaEndpoint, SourceMap,
    UpdateResult,
};
pub use error::{PeerConnectionError, Result};
pub use events::{EventReceiver, PeerConnectionEvent, RtcIceCandidate};
pub use ice::{aggregate_ice_connection_state, IceConnectionState, IceGatheringState, IceTransportState};
pub use media::{MediaSource, MediaStream, MediaStreamTrack};
pub use peer_connection::{AnswerOptions, OfferOptions, PeerConnection, PeerConnectionBuilder, PendingResult};
pub use queue::DeferredTaskQueue;
pub use state::SignalingState;
pub use transceiver::{
    RtpReceiver, RtpSender, RtpTransceiver, TransceiverDirection, TransceiverId, TransceiverInit,
    TransceiverRegistry,
};

/// Re-export of common types
pub mod prelude {
    pub use super::{
        AnswerOptions, IceConnectionState, IceGatheringState, IceServer, IceTransportState, MediaEndpoint,
        MediaSource, MediaStream, MediaStreamTrack, MockEndpointHandle, MockMediaEndpoint, OfferOptions,
        PeerConnection, PeerConnectionConfig, PeerConnectionError, PeerConnectionEvent, RtcIceCandidate,
        RtcSessionDescription, SdpType, SignalingState, TransceiverDirection, TransceiverId, TransceiverInit,
    };
    pub use rtcpeer_sdp_core::{IceCandidate, MediaDirection, MediaKind};
}
