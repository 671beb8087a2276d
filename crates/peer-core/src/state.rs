//! Signaling state machine

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::description::SdpType;

/// JSEP signaling state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalingState {
    #[default]
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPrAnswer,
    HaveRemotePrAnswer,
    Closed,
}

impl SignalingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalingState::Stable => "stable",
            SignalingState::HaveLocalOffer => "have-local-offer",
            SignalingState::HaveRemoteOffer => "have-remote-offer",
            SignalingState::HaveLocalPrAnswer => "have-local-pranswer",
            SignalingState::HaveRemotePrAnswer => "have-remote-pranswer",
            SignalingState::Closed => "closed",
        }
    }

    /// Whether a local description of type `sdp_type` may be applied
    pub fn accepts_local(&self, sdp_type: SdpType) -> bool {
        use SdpType::*;
        use SignalingState::*;
        match (self, sdp_type) {
            (Stable | HaveLocalOffer, Offer) => true,
            (HaveRemoteOffer | HaveLocalPrAnswer, Answer | Pranswer) => true,
            (HaveLocalOffer | HaveLocalPrAnswer, Rollback) => true,
            _ => false,
        }
    }

    /// Whether a remote description of type `sdp_type` may be applied
    pub fn accepts_remote(&self, sdp_type: SdpType) -> bool {
        use SdpType::*;
        use SignalingState::*;
        match (self, sdp_type) {
            (Stable | HaveRemoteOffer, Offer) => true,
            (HaveLocalOffer | HaveRemotePrAnswer, Answer | Pranswer) => true,
            (HaveRemoteOffer | HaveRemotePrAnswer, Rollback) => true,
            _ => false,
        }
    }

    /// State reached after applying a local description of type `sdp_type`
    pub fn after_local(sdp_type: SdpType) -> Self {
        match sdp_type {
            SdpType::Offer => SignalingState::HaveLocalOffer,
            SdpType::Pranswer => SignalingState::HaveLocalPrAnswer,
            SdpType::Answer | SdpType::Rollback => SignalingState::Stable,
        }
    }

    /// State reached after applying a remote description of type `sdp_type`
    pub fn after_remote(sdp_type: SdpType) -> Self {
        match sdp_type {
            SdpType::Offer => SignalingState::HaveRemoteOffer,
            SdpType::Pranswer => SignalingState::HaveRemotePrAnswer,
            SdpType::Answer | SdpType::Rollback => SignalingState::Stable,
        }
    }
}

impl fmt::Display for SignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SdpType::*;
    use SignalingState::*;

    const ALL_STATES: [SignalingState; 6] =
        [Stable, HaveLocalOffer, HaveRemoteOffer, HaveLocalPrAnswer, HaveRemotePrAnswer, Closed];

    #[test]
    fn test_local_transition_table() {
        let accepted: Vec<(SignalingState, SdpType)> = ALL_STATES
            .iter()
            .flat_map(|s| [Offer, Pranswer, Answer].into_iter().map(move |t| (*s, t)))
            .filter(|(s, t)| s.accepts_local(*t))
            .collect();
        assert_eq!(
            accepted,
            vec![
                (Stable, Offer),
                (HaveLocalOffer, Offer),
                (HaveRemoteOffer, Pranswer),
                (HaveRemoteOffer, Answer),
                (HaveLocalPrAnswer, Pranswer),
                (HaveLocalPrAnswer, Answer),
            ]
        );
    }

    #[test]
    fn test_remote_transition_table() {
        let accepted: Vec<(SignalingState, SdpType)> = ALL_STATES
            .iter()
            .flat_map(|s| [Offer, Pranswer, Answer].into_iter().map(move |t| (*s, t)))
            .filter(|(s, t)| s.accepts_remote(*t))
            .collect();
        assert_eq!(
            accepted,
            vec![
                (Stable, Offer),
                (HaveLocalOffer, Pranswer),
                (HaveLocalOffer, Answer),
                (HaveRemoteOffer, Offer),
                (HaveRemotePrAnswer, Pranswer),
                (HaveRemotePrAnswer, Answer),
            ]
        );
    }

    #[test]
    fn test_rollback_only_with_pending_side() {
        assert!(HaveLocalOffer.accepts_local(Rollback));
        assert!(!Stable.accepts_local(Rollback));
        assert!(!HaveRemoteOffer.accepts_local(Rollback));
        assert!(HaveRemoteOffer.accepts_remote(Rollback));
        assert!(!Closed.accepts_remote(Rollback));
    }
}
