//! Applying descriptions and remote candidates
//!
//! Every fallible step runs before the first mutation, so a rejected
//! description leaves the signaling state and the description slots untouched.

use rtcpeer_sdp_core::{MediaDirection, MediaKind, PeerMediaDescription};
use tracing::{debug, trace};
use uuid::Uuid;

use super::Negotiator;
use crate::description::{RtcSessionDescription, SdpType, SessionDescription};
use crate::endpoint::SourceMap;
use crate::error::{PeerConnectionError, Result};
use crate::events::{PeerConnectionEvent, RtcIceCandidate};
use crate::media::{MediaStream, MediaStreamTrack};
use crate::state::SignalingState;
use crate::transceiver::{RtpReceiver, RtpSender, TransceiverId};

impl Negotiator {
    pub(super) fn set_local_description(&mut self, description: RtcSessionDescription) -> Result<()> {
        let sdp_type = description.sdp_type();
        if !self.signaling_state.accepts_local(sdp_type) {
            return Err(PeerConnectionError::invalid_state(format!(
                "cannot apply a local {} in state {}",
                sdp_type, self.signaling_state
            )));
        }

        if sdp_type == SdpType::Rollback {
            debug!("Rolling back pending local description");
            self.pending_local = None;
            self.finish_commit(SignalingState::Stable);
            return Ok(());
        }

        let new = SessionDescription::from_rtc(&description, self.sdp.as_ref())
            .map_err(PeerConnectionError::from_description_error)?;
        let previous_len = self.internal_local_description().map_or(0, |d| d.configuration().len());
        let len = new.configuration().len();

        let is_initiator = sdp_type == SdpType::Offer;
        let mut ice_restarted = false;
        if len > previous_len {
            let result = self
                .endpoint
                .update_receive_configuration(new.configuration(), is_initiator);
            ice_restarted = Self::check_update(result, "receive")?;
        }

        let remote = self.pending_remote.as_ref().or(self.current_remote.as_ref());
        if let Some(remote) = remote {
            let sources = self.send_sources();
            let result = self
                .endpoint
                .update_send_configuration(remote.configuration(), &sources, is_initiator);
            Self::check_update(result, "send")?;
        }

        for line in &new.configuration().media_descriptions[previous_len.min(len)..] {
            if let Some(transceiver) = self.transceivers.find_by_provisional_mid_mut(&line.mid) {
                transceiver.set_mid(line.mid.clone());
            }
        }
        self.transceivers
            .reserve_mids(new.configuration().media_descriptions.iter().map(|m| m.mid.as_str()));

        let represented = self
            .transceivers
            .iter()
            .filter(|t| !t.is_stopped())
            .all(|t| new.configuration().media_by_mid(t.mid().unwrap_or(t.provisional_mid())).is_some());
        if represented {
            self.negotiation_needed = false;
        }

        if sdp_type == SdpType::Offer {
            self.adopt_ice_credentials(&new);
        }
        if !new.is_later_than(self.internal_local_description()) {
            trace!("Applying local {} that does not advance the session version", sdp_type);
        }

        match sdp_type {
            SdpType::Answer => {
                self.current_local = Some(new);
                if let Some(remote) = self.pending_remote.take() {
                    self.current_remote = Some(remote);
                }
                self.pending_local = None;
            }
            _ => self.pending_local = Some(new),
        }

        self.finish_commit(SignalingState::after_local(sdp_type));
        self.update_gathering_after_commit(ice_restarted, len);
        Ok(())
    }

    pub(super) fn set_remote_description(&mut self, description: RtcSessionDescription) -> Result<()> {
        let sdp_type = description.sdp_type();
        if !self.signaling_state.accepts_remote(sdp_type) {
            return Err(PeerConnectionError::invalid_state(format!(
                "cannot apply a remote {} in state {}",
                sdp_type, self.signaling_state
            )));
        }

        if sdp_type == SdpType::Rollback {
            debug!("Rolling back pending remote description");
            self.pending_remote = None;
            self.finish_commit(SignalingState::Stable);
            return Ok(());
        }

        let mut new = SessionDescription::from_rtc(&description, self.sdp.as_ref())
            .map_err(PeerConnectionError::from_description_error)?;
        for line in new.configuration_mut().media_descriptions.iter_mut() {
            let defaults = match line.kind {
                MediaKind::Audio => &self.default_audio_payloads,
                MediaKind::Video => &self.default_video_payloads,
                MediaKind::Other(_) => continue,
            };
            line.payloads = self.endpoint.filter_payloads(&line.payloads, defaults);
        }

        let previous_len = self.internal_remote_description().map_or(0, |d| d.configuration().len());
        let len = new.configuration().len();

        let mut ice_restarted = false;
        let mut media_events = Vec::new();
        if len > previous_len {
            let sources = self.send_sources();
            let result = self
                .endpoint
                .update_send_configuration(new.configuration(), &sources, sdp_type == SdpType::Answer);
            ice_restarted = Self::check_update(result, "send")?;
            self.transceivers
                .reserve_mids(new.configuration().media_descriptions.iter().map(|m| m.mid.as_str()));
            media_events = self.receive_remote_lines(&new.configuration().media_descriptions[previous_len..]);
        }

        match sdp_type {
            SdpType::Answer => {
                self.current_remote = Some(new);
                if let Some(local) = self.pending_local.take() {
                    self.current_local = Some(local);
                }
                self.pending_remote = None;
            }
            _ => self.pending_remote = Some(new),
        }

        self.set_signaling_state(SignalingState::after_remote(sdp_type));
        for event in media_events {
            self.emit(event);
        }
        self.fire_negotiation_needed_if_stable();
        self.update_gathering_after_commit(ice_restarted, len);
        Ok(())
    }

    pub(super) fn add_ice_candidate(&mut self, candidate: RtcIceCandidate) -> Result<()> {
        let index = self.remote_line_index(&candidate)?;

        if candidate.candidate.trim().is_empty() {
            if let Some(line) = self.remote_line_mut(index) {
                debug!("Remote end of candidates for '{}'", line.mid);
                line.ice_candidate_gathering_done = true;
            }
            return Ok(());
        }

        let parsed = self
            .sdp
            .parse_candidate_line(&candidate.candidate)
            .map_err(PeerConnectionError::from_candidate_error)?;

        let Some(line) = self.remote_line_mut(index) else {
            return Err(PeerConnectionError::operation("remote media line disappeared"));
        };
        line.ice_candidates.push(parsed.clone());
        let mid = line.mid.clone();
        let ufrag = line.ice_ufrag.clone();
        let password = line.ice_password.clone();

        trace!("Adding remote candidate {}:{} for '{}'", parsed.address, parsed.port, mid);
        self.endpoint.add_remote_candidate(&parsed, &mid, &ufrag, &password);
        Ok(())
    }

    /// Signaling change plus a pending negotiation-needed notification
    fn finish_commit(&mut self, state: SignalingState) {
        self.set_signaling_state(state);
        self.fire_negotiation_needed_if_stable();
    }

    /// Keep restarted ICE credentials for the lines created afterwards
    fn adopt_ice_credentials(&mut self, description: &SessionDescription) {
        let Some(line) = description.configuration().media_descriptions.first() else {
            return;
        };
        if !line.ice_ufrag.is_empty() && line.ice_ufrag != self.ice_ufrag {
            debug!("Adopting restarted ICE credentials");
            self.ice_ufrag = line.ice_ufrag.clone();
            self.ice_password = line.ice_password.clone();
        }
    }

    /// Local sources to send, keyed by the mid they will be sent on
    fn send_sources(&self) -> SourceMap {
        self.transceivers
            .iter()
            .filter(|t| !t.is_stopped())
            .filter_map(|t| {
                let track = t.sender().track()?;
                let mid = t.mid().unwrap_or(t.provisional_mid());
                Some((mid.to_string(), track.source().clone()))
            })
            .collect()
    }

    /// Bind new remote lines to transceivers and collect the media events
    ///
    /// Every live audio or video line gets a transceiver so the answer can
    /// describe it, but only lines the remote side sends on surface a track.
    /// A remote stream is built the first time its id is seen; later tracks
    /// of the same stream join it.
    fn receive_remote_lines(&mut self, lines: &[PeerMediaDescription]) -> Vec<PeerConnectionEvent> {
        let mut received: Vec<(TransceiverId, String)> = Vec::new();
        let mut new_stream_ids: Vec<String> = Vec::new();

        for line in lines {
            if !line.kind.is_audio_or_video() || line.is_rejected() {
                continue;
            }

            let id = self.transceiver_for_remote_line(line);
            if !line.direction.sends() {
                continue;
            }
            let Some(transceiver) = self.transceivers.get(id) else {
                continue;
            };
            let track = transceiver.receiver().track().clone();

            if !line.media_stream_id.is_empty() {
                match self.remote_streams.iter_mut().find(|s| s.id() == line.media_stream_id) {
                    Some(stream) => stream.add_track(track),
                    None => {
                        let mut stream = MediaStream::new(line.media_stream_id.clone());
                        stream.add_track(track);
                        self.remote_streams.push(stream);
                        new_stream_ids.push(line.media_stream_id.clone());
                    }
                }
            }
            received.push((id, line.media_stream_id.clone()));
        }

        let mut events = Vec::new();
        for (id, stream_id) in received {
            let Some(transceiver) = self.transceivers.get(id) else {
                continue;
            };
            let streams: Vec<MediaStream> = self
                .remote_streams
                .iter()
                .filter(|s| !stream_id.is_empty() && s.id() == stream_id)
                .cloned()
                .collect();
            events.push(PeerConnectionEvent::Track {
                transceiver: id,
                receiver: transceiver.receiver().clone(),
                track: transceiver.receiver().track().clone(),
                streams,
            });
        }
        for stream_id in new_stream_ids {
            if let Some(stream) = self.remote_streams.iter().find(|s| s.id() == stream_id) {
                events.push(PeerConnectionEvent::AddStream(stream.clone()));
            }
        }
        events
    }

    /// Transceiver that receives a remote line, binding or creating one
    fn transceiver_for_remote_line(&mut self, line: &PeerMediaDescription) -> TransceiverId {
        if let Some(transceiver) = self.transceivers.find_by_mid(&line.mid) {
            return transceiver.id();
        }

        if let Some(transceiver) = self.transceivers.find_unassociated_mut(&line.kind) {
            debug!("Binding {} to remote media line '{}'", transceiver.id(), line.mid);
            transceiver.set_mid(line.mid.clone());
            return transceiver.id();
        }

        let source = self.endpoint.create_muted_remote_source(&line.mid, &line.kind);
        let track_id = if line.media_stream_track_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            line.media_stream_track_id.clone()
        };
        let receiver = RtpReceiver::new(MediaStreamTrack::with_id(track_id, source));
        let sender = RtpSender::new(line.kind.clone(), None, Vec::new());

        let id = self.transceivers.add(sender, receiver, MediaDirection::RecvOnly);
        if let Some(transceiver) = self.transceivers.get_mut(id) {
            transceiver.set_mid(line.mid.clone());
        }
        debug!("Created {} for remote media line '{}'", id, line.mid);
        id
    }

    /// Position of the remote line a candidate is addressed to
    fn remote_line_index(&self, candidate: &RtcIceCandidate) -> Result<usize> {
        let Some(remote) = self.internal_remote_description() else {
            return Err(PeerConnectionError::invalid_state(
                "cannot add a candidate without a remote description",
            ));
        };
        let config = remote.configuration();

        match (candidate.sdp_mid.as_deref(), candidate.sdp_m_line_index) {
            (Some(mid), _) if !mid.is_empty() => config
                .index_of_mid(mid)
                .ok_or_else(|| PeerConnectionError::operation(format!("no media line with mid '{}'", mid))),
            (_, Some(index)) if index < config.len() => Ok(index),
            (_, Some(index)) => Err(PeerConnectionError::operation(format!(
                "media line index {} out of range",
                index
            ))),
            _ => Err(PeerConnectionError::operation(
                "candidate names neither a mid nor a media line index",
            )),
        }
    }

    fn remote_line_mut(&mut self, index: usize) -> Option<&mut PeerMediaDescription> {
        self.internal_remote_description_mut()?
            .configuration_mut()
            .media_descriptions
            .get_mut(index)
    }
}
