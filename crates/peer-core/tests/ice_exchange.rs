//! ICE candidate exchange, gathering and connection state tests

mod common;

use pretty_assertions::assert_eq;
use rtcpeer_peer_core::prelude::*;
use rtcpeer_peer_core::UpdateResult;

use common::{negotiate, parse, remote_line, remote_offer, TestPeer};

const HOST_CANDIDATE: &str = "candidate:1 1 udp 2130706431 192.168.1.20 50000 typ host";

async fn negotiated_pair(kinds: &[MediaKind]) -> (TestPeer, TestPeer) {
    let mut caller = TestPeer::ready();
    let mut callee = TestPeer::ready();
    for kind in kinds {
        caller.pc.add_transceiver(kind.clone(), TransceiverInit::default()).unwrap();
    }
    negotiate(&mut caller, &mut callee).await;
    caller.drain_events();
    callee.drain_events();
    (caller, callee)
}

#[tokio::test]
async fn test_add_ice_candidate_by_mid() {
    let (mut caller, callee) = negotiated_pair(&[MediaKind::Audio]).await;
    let callee_line = parse(&callee.pc.local_description().unwrap()).media_descriptions.remove(0);

    caller
        .pc
        .add_ice_candidate(RtcIceCandidate::for_mid(HOST_CANDIDATE, "1"))
        .await
        .unwrap()
        .unwrap();

    let forwarded = caller.endpoint.remote_candidates();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].mid, "1");
    assert_eq!(forwarded[0].ufrag, callee_line.ice_ufrag);
    assert_eq!(forwarded[0].password, callee_line.ice_password);
    assert_eq!(forwarded[0].candidate.address, "192.168.1.20");

    let remote = parse(&caller.pc.remote_description().unwrap());
    assert_eq!(remote.media_descriptions[0].ice_candidates.len(), 1);
}

#[tokio::test]
async fn test_add_ice_candidate_by_index() {
    let (mut caller, _callee) = negotiated_pair(&[MediaKind::Audio, MediaKind::Video]).await;

    caller
        .pc
        .add_ice_candidate(RtcIceCandidate::for_index(HOST_CANDIDATE, 1))
        .await
        .unwrap()
        .unwrap();

    let forwarded = caller.endpoint.remote_candidates();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].mid, "2");
}

#[tokio::test]
async fn test_add_ice_candidate_errors() {
    let mut lonely = TestPeer::ready();
    let result = lonely.pc.add_ice_candidate(RtcIceCandidate::for_mid(HOST_CANDIDATE, "1")).await.unwrap();
    assert!(matches!(result, Err(PeerConnectionError::InvalidState(_))));

    let (mut caller, _callee) = negotiated_pair(&[MediaKind::Audio]).await;

    let unknown_mid = caller.pc.add_ice_candidate(RtcIceCandidate::for_mid(HOST_CANDIDATE, "9")).await.unwrap();
    assert!(matches!(unknown_mid, Err(PeerConnectionError::OperationError(_))));

    let out_of_range = caller.pc.add_ice_candidate(RtcIceCandidate::for_index(HOST_CANDIDATE, 5)).await.unwrap();
    assert!(matches!(out_of_range, Err(PeerConnectionError::OperationError(_))));

    let unaddressed = caller.pc.add_ice_candidate(RtcIceCandidate::new(HOST_CANDIDATE, None, None)).await.unwrap();
    assert!(matches!(unaddressed, Err(PeerConnectionError::OperationError(_))));

    let malformed = caller.pc.add_ice_candidate(RtcIceCandidate::for_mid("candidate:1 1 udp", "1")).await.unwrap();
    assert!(matches!(malformed, Err(PeerConnectionError::InvalidCandidate(_))));

    assert!(caller.endpoint.remote_candidates().is_empty());
}

#[tokio::test]
async fn test_empty_candidate_marks_remote_gathering_done() {
    let (mut caller, _callee) = negotiated_pair(&[MediaKind::Audio]).await;

    caller.pc.add_ice_candidate(RtcIceCandidate::for_mid("", "1")).await.unwrap().unwrap();

    assert!(caller.endpoint.remote_candidates().is_empty());
    let remote = parse(&caller.pc.remote_description().unwrap());
    assert!(remote.media_descriptions[0].ice_candidate_gathering_done);
}

#[tokio::test]
async fn test_gathered_candidate_is_announced() {
    let mut peer = TestPeer::ready();
    peer.pc.add_transceiver(MediaKind::Audio, TransceiverInit::default()).unwrap();
    let offer = peer.pc.create_offer(OfferOptions::default()).await.unwrap().unwrap();
    peer.pc.set_local_description(offer).await.unwrap().unwrap();
    peer.drain_events();

    let client = peer.endpoint.client().expect("endpoint attached");
    client.got_ice_candidate("1", IceCandidate::host("1", 2130706431, "192.168.1.10", 50000));
    peer.pump();

    let announced: Vec<RtcIceCandidate> = peer
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            PeerConnectionEvent::IceCandidate(candidate) => candidate,
            _ => None,
        })
        .collect();
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].sdp_mid.as_deref(), Some("1"));
    assert_eq!(announced[0].sdp_m_line_index, Some(0));
    assert!(announced[0].candidate.starts_with("candidate:"));

    let line = parse(&peer.pc.local_description().unwrap()).media_descriptions.remove(0);
    assert_eq!(line.address, "192.168.1.10");
    assert_eq!(line.port, 50000);
    assert_eq!(line.ice_candidates.len(), 1);
}

#[tokio::test]
async fn test_rtcp_candidate_sets_rtcp_address() {
    let mut peer = TestPeer::ready();
    peer.pc.add_transceiver(MediaKind::Audio, TransceiverInit::default()).unwrap();
    let offer = peer.pc.create_offer(OfferOptions::default()).await.unwrap().unwrap();
    peer.pc.set_local_description(offer).await.unwrap().unwrap();

    let mut rtcp = IceCandidate::host("1", 2130706430, "192.168.1.10", 50001);
    rtcp.component_id = 2;
    let mut ipv6 = IceCandidate::host("2", 2130706429, "fe80::1", 50002);
    ipv6.component_id = 1;
    peer.pc.got_ice_candidate("1", rtcp);
    peer.pc.got_ice_candidate("1", ipv6);

    let line = parse(&peer.pc.local_description().unwrap()).media_descriptions.remove(0);
    assert_eq!(line.rtcp_address, "192.168.1.10");
    assert_eq!(line.rtcp_port, 50001);
    assert_eq!(line.address, "0.0.0.0");
    assert_eq!(line.ice_candidates.len(), 2);
}

#[tokio::test]
async fn test_gathering_completes_after_every_line() {
    let (mut caller, _callee) = negotiated_pair(&[MediaKind::Audio, MediaKind::Video]).await;
    assert_eq!(caller.pc.ice_gathering_state(), IceGatheringState::Gathering);

    caller.pc.done_gathering_candidates("1");
    assert_eq!(caller.pc.ice_gathering_state(), IceGatheringState::Gathering);
    assert!(caller.drain_events().is_empty());

    caller.pc.done_gathering_candidates("2");
    assert_eq!(caller.pc.ice_gathering_state(), IceGatheringState::Complete);

    let events = caller.drain_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        PeerConnectionEvent::IceGatheringStateChange(IceGatheringState::Complete)
    ));
    assert!(matches!(events[1], PeerConnectionEvent::IceCandidate(None)));

    let local = parse(&caller.pc.local_description().unwrap());
    assert!(local.media_descriptions.iter().all(|m| m.ice_candidate_gathering_done));
}

#[tokio::test]
async fn test_endpoint_ice_restart_reenters_gathering() {
    let (mut caller, mut callee) = negotiated_pair(&[MediaKind::Audio]).await;
    caller.pc.done_gathering_candidates("1");
    assert_eq!(caller.pc.ice_gathering_state(), IceGatheringState::Complete);

    caller.endpoint.set_receive_result(UpdateResult::SuccessWithIceRestart);
    caller.pc.add_transceiver(MediaKind::Video, TransceiverInit::default()).unwrap();
    let offer = caller.pc.create_offer(OfferOptions { ice_restart: true }).await.unwrap().unwrap();
    caller.pc.set_local_description(offer.clone()).await.unwrap().unwrap();
    assert_eq!(caller.pc.ice_gathering_state(), IceGatheringState::Gathering);

    callee.pc.set_remote_description(offer).await.unwrap().unwrap();
    let restarted = parse(&callee.pc.remote_description().unwrap());
    assert_eq!(restarted.media_descriptions.len(), 2);
    assert_eq!(restarted.media_descriptions[0].ice_ufrag, restarted.media_descriptions[1].ice_ufrag);
}

#[tokio::test]
async fn test_ice_connection_state_follows_transports() {
    let (mut caller, _callee) = negotiated_pair(&[MediaKind::Audio, MediaKind::Video]).await;
    let client = caller.endpoint.client().expect("endpoint attached");

    let mut observed = Vec::new();
    let mut report = |caller: &mut TestPeer, mid: &str, state: IceTransportState| {
        client.ice_transport_state_changed(mid, state);
        caller.pump();
        for event in caller.drain_events() {
            if let PeerConnectionEvent::IceConnectionStateChange(state) = event {
                observed.push(state);
            }
        }
    };

    report(&mut caller, "1", IceTransportState::Checking);
    report(&mut caller, "1", IceTransportState::Connected);
    report(&mut caller, "2", IceTransportState::Checking);
    report(&mut caller, "2", IceTransportState::Connected);
    report(&mut caller, "2", IceTransportState::Failed);

    assert_eq!(
        observed,
        vec![
            IceConnectionState::Checking,
            IceConnectionState::New,
            IceConnectionState::Checking,
            IceConnectionState::Connected,
            IceConnectionState::Failed,
        ]
    );
    assert_eq!(caller.pc.ice_connection_state(), IceConnectionState::Failed);
}

#[tokio::test]
async fn test_callbacks_for_unknown_mids_are_ignored() {
    let (mut caller, _callee) = negotiated_pair(&[MediaKind::Audio]).await;

    caller.pc.got_ice_candidate("7", IceCandidate::host("1", 1, "10.0.0.1", 4000));
    caller.pc.done_gathering_candidates("7");
    caller.pc.ice_transport_state_changed("7", IceTransportState::Failed);

    assert!(caller.drain_events().is_empty());
    assert_eq!(caller.pc.ice_connection_state(), IceConnectionState::New);
}

#[tokio::test]
async fn test_remote_offer_without_local_description_ignores_candidates() {
    let mut callee = TestPeer::ready();
    let offer = remote_offer(vec![remote_line("a", MediaKind::Audio, "s", "t")]);
    callee.pc.set_remote_description(offer).await.unwrap().unwrap();
    callee.drain_events();

    callee.pc.got_ice_candidate("a", IceCandidate::host("1", 1, "10.0.0.1", 4000));
    assert!(callee.drain_events().is_empty());
}
