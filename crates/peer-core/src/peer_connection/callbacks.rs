//! Media endpoint callbacks

use rtcpeer_sdp_core::{IceCandidate, PLACEHOLDER_ADDRESS};
use tracing::{debug, error, warn};

use super::Negotiator;
use crate::events::{PeerConnectionEvent, RtcIceCandidate};
use crate::ice::{aggregate_ice_connection_state, IceGatheringState, IceTransportState};

impl Negotiator {
    pub(super) fn got_ice_candidate(&mut self, mid: &str, candidate: IceCandidate) {
        if self.is_closed() {
            return;
        }

        let line_text = match self.sdp.generate_candidate_line(&candidate) {
            Ok(text) => text,
            Err(err) => {
                error!("Failed to generate candidate line for '{}': {}", mid, err);
                return;
            }
        };

        let Some(description) = self.internal_local_description_mut() else {
            warn!("Gathered candidate for '{}' without a local description", mid);
            return;
        };
        let config = description.configuration_mut();
        let Some(index) = config.index_of_mid(mid) else {
            warn!("Gathered candidate for unknown media line '{}'", mid);
            return;
        };
        let Some(line) = config.media_descriptions.get_mut(index) else {
            return;
        };

        if !candidate.is_ipv6() && !line.is_rejected() {
            if candidate.is_rtp() {
                if line.address.is_empty() || line.address == PLACEHOLDER_ADDRESS {
                    line.address = candidate.address.clone();
                    line.port = candidate.port;
                }
            } else if line.rtcp_address.is_empty() {
                line.rtcp_address = candidate.address.clone();
                line.rtcp_port = candidate.port;
            }
        }
        line.ice_candidates.push(candidate);

        self.emit(PeerConnectionEvent::IceCandidate(Some(RtcIceCandidate::new(
            line_text,
            Some(mid.to_string()),
            Some(index),
        ))));
    }

    pub(super) fn done_gathering_candidates(&mut self, mid: &str) {
        if self.is_closed() {
            return;
        }

        let Some(description) = self.internal_local_description_mut() else {
            warn!("Gathering finished for '{}' without a local description", mid);
            return;
        };
        match description.configuration_mut().media_by_mid_mut(mid) {
            Some(line) => line.ice_candidate_gathering_done = true,
            None => {
                warn!("Gathering finished for unknown media line '{}'", mid);
                return;
            }
        }
        debug!("Candidate gathering done for '{}'", mid);

        if self.all_lines_done_gathering() && self.ice_gathering_state != IceGatheringState::Complete {
            self.set_ice_gathering_state(IceGatheringState::Complete);
            self.emit(PeerConnectionEvent::IceCandidate(None));
        }
    }

    /// Whether every associated live transceiver's local line finished gathering
    fn all_lines_done_gathering(&self) -> bool {
        let Some(local) = self.internal_local_description() else {
            return false;
        };
        let config = local.configuration();
        let mut associated = self
            .transceivers
            .iter()
            .filter(|t| !t.is_stopped())
            .filter_map(|t| t.mid())
            .peekable();
        if associated.peek().is_none() {
            return false;
        }
        associated.all(|mid| config.media_by_mid(mid).is_some_and(|l| l.ice_candidate_gathering_done))
    }

    pub(super) fn ice_transport_state_changed(&mut self, mid: &str, state: IceTransportState) {
        if self.is_closed() {
            return;
        }

        let Some(transceiver) = self.transceivers.find_by_mid_mut(mid) else {
            warn!("ICE transport state for unknown media line '{}'", mid);
            return;
        };
        transceiver.set_ice_transport_state(state);

        let states: Vec<IceTransportState> = self.transceivers.iter().map(|t| t.ice_transport_state()).collect();
        self.set_ice_connection_state(aggregate_ice_connection_state(&states));
    }
}
