//! ICE state model and aggregation
//!
//! The media endpoint reports one [`IceTransportState`] per transceiver. The
//! connection exposes a single [`IceConnectionState`] derived from all of
//! them by [`aggregate_ice_connection_state`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the ICE transport underneath one transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportState {
    #[default]
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

/// Connection-wide ICE state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    /// No transport has started checking yet
    #[default]
    New,
    /// Connectivity checks are running
    Checking,
    /// Every transport is usable
    Connected,
    /// Every transport finished checking
    Completed,
    /// At least one transport failed
    Failed,
    /// At least one transport lost connectivity
    Disconnected,
    /// Every transport is closed
    Closed,
}

impl fmt::Display for IceConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IceConnectionState::New => "new",
            IceConnectionState::Checking => "checking",
            IceConnectionState::Connected => "connected",
            IceConnectionState::Completed => "completed",
            IceConnectionState::Failed => "failed",
            IceConnectionState::Disconnected => "disconnected",
            IceConnectionState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// Connection-wide candidate gathering state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceGatheringState {
    #[default]
    New,
    Gathering,
    Complete,
}

impl fmt::Display for IceGatheringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IceGatheringState::New => "new",
            IceGatheringState::Gathering => "gathering",
            IceGatheringState::Complete => "complete",
        };
        write!(f, "{}", s)
    }
}

/// Derive the connection state from the per-transceiver transport states
///
/// Rules are tried in order, the first match wins:
///
/// 1. some `New`, none `Checking`/`Failed`/`Disconnected` -> `New`
/// 2. some `Checking`, none `Failed`/`Disconnected` -> `Checking`
/// 3. all `Connected`/`Completed`/`Closed`, some `Connected` -> `Connected`
/// 4. all `Completed`/`Closed`, some `Completed` -> `Completed`
/// 5. some `Failed` -> `Failed`
/// 6. some `Disconnected` -> `Disconnected`
/// 7. all `Closed` -> `Closed`
///
/// Without any transport the connection is `New`.
pub fn aggregate_ice_connection_state(states: &[IceTransportState]) -> IceConnectionState {
    use IceTransportState as T;

    if states.is_empty() {
        return IceConnectionState::New;
    }

    let count = |wanted: T| states.iter().filter(|s| **s == wanted).count();
    let new = count(T::New);
    let checking = count(T::Checking);
    let connected = count(T::Connected);
    let completed = count(T::Completed);
    let failed = count(T::Failed);
    let disconnected = count(T::Disconnected);
    let closed = count(T::Closed);
    let total = states.len();

    if new > 0 && checking == 0 && failed == 0 && disconnected == 0 {
        IceConnectionState::New
    } else if checking > 0 && failed == 0 && disconnected == 0 {
        IceConnectionState::Checking
    } else if connected + completed + closed == total && connected > 0 {
        IceConnectionState::Connected
    } else if completed + closed == total && completed > 0 {
        IceConnectionState::Completed
    } else if failed > 0 {
        IceConnectionState::Failed
    } else if disconnected > 0 {
        IceConnectionState::Disconnected
    } else if closed == total {
        IceConnectionState::Closed
    } else {
        IceConnectionState::New
    }
}
