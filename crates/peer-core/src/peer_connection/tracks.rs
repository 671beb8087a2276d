//! Application-driven transceiver changes

use rtcpeer_sdp_core::{MediaDirection, MediaKind};
use tracing::debug;

use super::Negotiator;
use crate::error::{PeerConnectionError, Result};
use crate::media::MediaStreamTrack;
use crate::transceiver::{RtpReceiver, RtpSender, TransceiverDirection, TransceiverId, TransceiverInit};

impl Negotiator {
    pub(super) fn add_transceiver(
        &mut self,
        kind: MediaKind,
        track: Option<MediaStreamTrack>,
        init: TransceiverInit,
    ) -> Result<TransceiverId> {
        if self.is_closed() {
            return Err(PeerConnectionError::invalid_state("connection is closed"));
        }

        let mid = self.transceivers.peek_next_mid();
        let source = self.endpoint.create_muted_remote_source(&mid, &kind);
        let receiver = RtpReceiver::new(MediaStreamTrack::new(source));
        let sender = RtpSender::new(kind, track, init.stream_ids);

        let id = self.transceivers.add(sender, receiver, init.direction);
        debug!("Added {} with provisional mid '{}'", id, mid);
        self.mark_as_needing_negotiation();
        Ok(id)
    }

    pub(super) fn add_track(&mut self, track: MediaStreamTrack, stream_ids: Vec<String>) -> Result<TransceiverId> {
        if self.is_closed() {
            return Err(PeerConnectionError::invalid_state("connection is closed"));
        }
        if self
            .transceivers
            .iter()
            .any(|t| !t.is_stopped() && t.sender().track().is_some_and(|existing| existing == &track))
        {
            return Err(PeerConnectionError::operation(format!("track {} is already being sent", track.id())));
        }

        let kind = track.kind().clone();
        let reusable = self
            .transceivers
            .iter_mut()
            .find(|t| !t.is_stopped() && t.kind() == &kind && t.sender().track().is_none());

        let Some(transceiver) = reusable else {
            let init = TransceiverInit {
                direction: MediaDirection::SendRecv,
                stream_ids,
            };
            return self.add_transceiver(kind, Some(track), init);
        };

        let direction = MediaDirection::from_parts(true, transceiver.direction().receives());
        transceiver.set_direction(direction);
        transceiver.sender_mut().set_track(Some(track));
        transceiver.sender_mut().set_stream_ids(stream_ids);
        let id = transceiver.id();

        debug!("Reusing {} to send a {} track", id, kind);
        self.mark_as_needing_negotiation();
        Ok(id)
    }

    pub(super) fn set_transceiver_direction(
        &mut self,
        id: TransceiverId,
        direction: TransceiverDirection,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(PeerConnectionError::invalid_state("connection is closed"));
        }
        let Some(transceiver) = self.transceivers.get_mut(id) else {
            return Err(PeerConnectionError::operation(format!("{} does not belong to this connection", id)));
        };
        if transceiver.direction() == direction {
            return Ok(());
        }

        transceiver.set_direction(direction);
        self.mark_as_needing_negotiation();
        Ok(())
    }

    /// Swap the sender's track on an associated transceiver
    pub(super) fn replace_track(&mut self, id: TransceiverId, track: Option<MediaStreamTrack>) -> Result<()> {
        let Some(transceiver) = self.transceivers.get_mut(id) else {
            return Err(PeerConnectionError::operation(format!("{} does not belong to this connection", id)));
        };

        if let (Some(mid), Some(track)) = (transceiver.mid(), &track) {
            debug!("Replacing send source on '{}' with {}", mid, track.source().id());
            self.endpoint.replace_send_source(track.source(), mid);
        }
        transceiver.sender_mut().set_track(track);
        Ok(())
    }
}
