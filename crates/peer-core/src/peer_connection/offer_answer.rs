//! Offer and answer generation
//!
//! Both operations work on a deep copy of the latest local configuration and
//! never touch committed state; only `set_local_description` commits.

use std::collections::HashSet;

use rtcpeer_sdp_core::{DtlsSetup, MediaDirection};
use tracing::{debug, warn};

use super::{Negotiator, OfferOptions};
use crate::credentials;
use crate::description::{RtcSessionDescription, SdpType, SessionDescription};
use crate::error::{PeerConnectionError, Result};

impl Negotiator {
    pub(super) fn create_offer(&mut self, options: OfferOptions) -> Result<RtcSessionDescription> {
        let mut config = self.local_configuration_snapshot();
        config.session_id = self.session_id;
        config.session_version = self.next_offer_version();

        let mut matched = HashSet::new();
        for line in config.media_descriptions.iter_mut().filter(|line| !line.is_rejected()) {
            let Some(transceiver) = self.transceivers.find_by_mid(&line.mid) else {
                continue;
            };
            if transceiver.is_stopped() {
                continue;
            }
            matched.insert(transceiver.id());

            line.direction = transceiver.direction();
            if transceiver.direction().sends() {
                let sender = transceiver.sender();
                line.media_stream_id = sender.media_stream_id().to_string();
                line.media_stream_track_id = sender.track_id().to_string();
                line.source_id = sender.track().map(|t| t.source().id().to_string());
            }
        }

        let mut added = Vec::new();
        for transceiver in self.transceivers.iter() {
            if transceiver.is_stopped() || matched.contains(&transceiver.id()) {
                continue;
            }
            let mid = transceiver.mid().unwrap_or(transceiver.provisional_mid());
            if config.media_by_mid(mid).is_some() {
                continue;
            }
            added.push(self.new_local_line(
                mid,
                transceiver.kind().clone(),
                transceiver.direction(),
                transceiver.sender(),
            ));
        }
        config.media_descriptions.extend(added);

        if options.ice_restart {
            let ufrag = credentials::generate_ice_ufrag();
            let password = credentials::generate_ice_password();
            for line in config.media_descriptions.iter_mut() {
                line.ice_ufrag = ufrag.clone();
                line.ice_password = password.clone();
            }
        }

        debug!(
            "Created offer v{} with {} media lines",
            config.session_version,
            config.len()
        );
        SessionDescription::new(SdpType::Offer, config)
            .to_rtc(self.sdp.as_ref())
            .map_err(PeerConnectionError::from_description_error)
    }

    pub(super) fn create_answer(&mut self) -> Result<RtcSessionDescription> {
        let Some(remote) = self.internal_remote_description() else {
            return Err(PeerConnectionError::invalid_state(
                "cannot create an answer without a remote description",
            ));
        };
        let remote_lines = remote.configuration().media_descriptions.clone();

        let mut config = self.local_configuration_snapshot();
        config.session_id = self.session_id;
        config.session_version = self.next_answer_version();

        for remote_line in &remote_lines {
            let Some(transceiver) = self.transceivers.find_by_mid(&remote_line.mid) else {
                warn!("No transceiver for remote media line '{}', skipping", remote_line.mid);
                continue;
            };

            if config.media_by_mid(&remote_line.mid).is_none() {
                let line = self.new_local_line(
                    &remote_line.mid,
                    remote_line.kind.clone(),
                    transceiver.direction(),
                    transceiver.sender(),
                );
                config.media_descriptions.push(line);
            }
            let Some(line) = config.media_by_mid_mut(&remote_line.mid) else {
                continue;
            };

            let direction = MediaDirection::answer_for(transceiver.direction(), remote_line.direction);
            line.direction = direction;
            if direction.sends() {
                let sender = transceiver.sender();
                line.media_stream_id = sender.media_stream_id().to_string();
                line.media_stream_track_id = sender.track_id().to_string();
                line.source_id = sender.track().map(|t| t.source().id().to_string());
            }

            if line.dtls_setup == DtlsSetup::ActPass {
                line.dtls_setup = remote_line.dtls_setup.answer_role();
            }
            line.payloads = remote_line.payloads.clone();
            line.rtcp_mux = remote_line.rtcp_mux;
            if line.ssrcs.is_empty() {
                line.ssrcs.push(rand::random());
            }
            if remote_line.is_rejected() {
                line.port = 0;
            }
        }

        if self.transceivers.has_unassociated() {
            self.mark_as_needing_negotiation();
        }

        debug!(
            "Created answer v{} with {} media lines",
            config.session_version,
            config.len()
        );
        SessionDescription::new(SdpType::Answer, config)
            .to_rtc(self.sdp.as_ref())
            .map_err(PeerConnectionError::from_description_error)
    }
}

#[cfg(test)]
mod tests {
    use rtcpeer_sdp_core::{DefaultSdpProcessor, MediaKind, SdpProcessor};

    use crate::endpoint::MockMediaEndpoint;
    use crate::peer_connection::{OfferOptions, PeerConnection};
    use crate::transceiver::TransceiverInit;
    use crate::PeerConnectionConfig;

    fn ready_connection() -> PeerConnection {
        let (mut pc, _events) = PeerConnection::new(PeerConnectionConfig::default(), MockMediaEndpoint::new).unwrap();
        pc.process_endpoint_events();
        pc
    }

    #[tokio::test]
    async fn test_offer_describes_each_transceiver() {
        let mut pc = ready_connection();
        pc.add_transceiver(MediaKind::Audio, TransceiverInit::default()).unwrap();
        pc.add_transceiver(MediaKind::Video, TransceiverInit::default()).unwrap();

        let offer = pc.create_offer(OfferOptions::default()).await.unwrap().unwrap();
        let config = DefaultSdpProcessor::new().parse(&offer.sdp()).unwrap();

        let mids: Vec<&str> = config.media_descriptions.iter().map(|m| m.mid.as_str()).collect();
        assert_eq!(mids, vec!["1", "2"]);
        let audio = &config.media_descriptions[0];
        assert_eq!(audio.payloads.len(), 3);
        assert_eq!(audio.ssrcs.len(), 1);
        assert!(!audio.dtls_fingerprint.is_empty());
        assert_eq!(audio.ice_ufrag, config.media_descriptions[1].ice_ufrag);
    }

    #[tokio::test]
    async fn test_repeated_offers_bump_version_only() {
        let mut pc = ready_connection();
        pc.add_transceiver(MediaKind::Audio, TransceiverInit::default()).unwrap();

        let processor = DefaultSdpProcessor::new();
        let first = pc.create_offer(OfferOptions::default()).await.unwrap().unwrap();
        let second = pc.create_offer(OfferOptions::default()).await.unwrap().unwrap();
        let first = processor.parse(&first.sdp()).unwrap();
        let second = processor.parse(&second.sdp()).unwrap();

        assert!(second.session_version > first.session_version);
        assert_eq!(first.session_id, second.session_id);
        assert_eq!(first.media_descriptions[0].mid, second.media_descriptions[0].mid);
        assert!(pc.local_description().is_none());
    }

    #[tokio::test]
    async fn test_ice_restart_changes_credentials() {
        let mut pc = ready_connection();
        pc.add_transceiver(MediaKind::Audio, TransceiverInit::default()).unwrap();

        let processor = DefaultSdpProcessor::new();
        let normal = pc.create_offer(OfferOptions::default()).await.unwrap().unwrap();
        let restart = pc.create_offer(OfferOptions { ice_restart: true }).await.unwrap().unwrap();
        let normal = processor.parse(&normal.sdp()).unwrap();
        let restart = processor.parse(&restart.sdp()).unwrap();

        assert_ne!(normal.media_descriptions[0].ice_ufrag, restart.media_descriptions[0].ice_ufrag);
        assert_ne!(normal.media_descriptions[0].ice_password, restart.media_descriptions[0].ice_password);
    }

    #[tokio::test]
    async fn test_answer_requires_remote_description() {
        let mut pc = ready_connection();
        let result = pc.create_answer(Default::default()).await.unwrap();
        assert!(matches!(result, Err(crate::PeerConnectionError::InvalidState(_))));
    }
}
