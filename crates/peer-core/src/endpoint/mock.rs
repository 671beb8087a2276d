//! In-memory media endpoint for tests
//!
//! [`MockMediaEndpoint`] records every call the engine makes and lets a test
//! script the outcome of configuration updates. All state lives behind a
//! [`MockEndpointHandle`] that the test keeps after the endpoint has been moved
//! into the connection.
//!
//! ```
//! use rtcpeer_peer_core::endpoint::{MockEndpointHandle, MockMediaEndpoint};
//! use rtcpeer_peer_core::{PeerConnection, PeerConnectionConfig};
//!
//! let handle = MockEndpointHandle::new();
//! let endpoint_handle = handle.clone();
//! let (mut pc, _events) = PeerConnection::new(PeerConnectionConfig::default(), move |client| {
//!     MockMediaEndpoint::with_handle(client, endpoint_handle)
//! })
//! .unwrap();
//! pc.process_endpoint_events();
//! assert_eq!(handle.dtls_requests(), 1);
//! assert!(pc.is_ready());
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use rtcpeer_sdp_core::{IceCandidate, MediaKind, MediaPayload, SessionConfiguration};
use tracing::debug;
use uuid::Uuid;

use super::{
    default_audio_payloads, default_video_payloads, MediaEndpoint, MediaEndpointClient, SourceMap,
    UpdateResult,
};
use crate::config::PeerConnectionConfig;
use crate::dtls;
use crate::media::MediaSource;

/// A recorded `update_receive_configuration` call
#[derive(Debug, Clone)]
pub struct ReceiveUpdate {
    pub configuration: SessionConfiguration,
    pub is_initiator: bool,
}

/// A recorded `update_send_configuration` call
#[derive(Debug, Clone)]
pub struct SendUpdate {
    pub configuration: SessionConfiguration,
    /// Mids present in the source map, sorted
    pub source_mids: Vec<String>,
    pub is_initiator: bool,
}

/// A recorded `add_remote_candidate` call
#[derive(Debug, Clone)]
pub struct RemoteCandidate {
    pub candidate: IceCandidate,
    pub mid: String,
    pub ufrag: String,
    pub password: String,
}

#[derive(Debug)]
struct MockState {
    client: Option<MediaEndpointClient>,
    auto_fingerprint: bool,
    configuration: Option<PeerConnectionConfig>,
    certificate_pem: Option<String>,
    fingerprint: Option<String>,
    dtls_requests: usize,
    receive_result: UpdateResult,
    send_result: UpdateResult,
    receive_updates: Vec<ReceiveUpdate>,
    send_updates: Vec<SendUpdate>,
    remote_candidates: Vec<RemoteCandidate>,
    muted_sources: Vec<(String, MediaKind)>,
    replaced_sources: Vec<(String, String)>,
    stopped: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            client: None,
            auto_fingerprint: true,
            configuration: None,
            certificate_pem: None,
            fingerprint: None,
            dtls_requests: 0,
            receive_result: UpdateResult::Success,
            send_result: UpdateResult::Success,
            receive_updates: Vec::new(),
            send_updates: Vec::new(),
            remote_candidates: Vec::new(),
            muted_sources: Vec::new(),
            replaced_sources: Vec::new(),
            stopped: false,
        }
    }
}

/// Inspection and scripting handle for a [`MockMediaEndpoint`]
#[derive(Debug, Clone, Default)]
pub struct MockEndpointHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockEndpointHandle {
    /// Handle for an endpoint that reports its fingerprint right away
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for an endpoint that waits for [`MockEndpointHandle::emit_fingerprint`]
    pub fn without_auto_fingerprint() -> Self {
        let handle = Self::default();
        handle.state.lock().auto_fingerprint = false;
        handle
    }

    /// Result returned by subsequent receive configuration updates
    pub fn set_receive_result(&self, result: UpdateResult) {
        self.state.lock().receive_result = result;
    }

    /// Result returned by subsequent send configuration updates
    pub fn set_send_result(&self, result: UpdateResult) {
        self.state.lock().send_result = result;
    }

    /// The client the endpoint reports through, once attached
    pub fn client(&self) -> Option<MediaEndpointClient> {
        self.state.lock().client.clone()
    }

    /// Report the certificate fingerprint to the connection
    ///
    /// Returns the fingerprint, or `None` if no certificate was requested yet.
    pub fn emit_fingerprint(&self) -> Option<String> {
        let state = self.state.lock();
        let fingerprint = state.fingerprint.clone()?;
        if let Some(client) = &state.client {
            client.got_dtls_fingerprint(fingerprint.clone(), dtls::FINGERPRINT_HASH_FUNCTION);
        }
        Some(fingerprint)
    }

    pub fn fingerprint(&self) -> Option<String> {
        self.state.lock().fingerprint.clone()
    }

    pub fn certificate_pem(&self) -> Option<String> {
        self.state.lock().certificate_pem.clone()
    }

    pub fn configuration(&self) -> Option<PeerConnectionConfig> {
        self.state.lock().configuration.clone()
    }

    pub fn dtls_requests(&self) -> usize {
        self.state.lock().dtls_requests
    }

    pub fn receive_updates(&self) -> Vec<ReceiveUpdate> {
        self.state.lock().receive_updates.clone()
    }

    pub fn send_updates(&self) -> Vec<SendUpdate> {
        self.state.lock().send_updates.clone()
    }

    pub fn remote_candidates(&self) -> Vec<RemoteCandidate> {
        self.state.lock().remote_candidates.clone()
    }

    /// `(mid, kind)` of every muted remote source created
    pub fn muted_sources(&self) -> Vec<(String, MediaKind)> {
        self.state.lock().muted_sources.clone()
    }

    /// `(source id, mid)` of every send source replacement
    pub fn replaced_sources(&self) -> Vec<(String, String)> {
        self.state.lock().replaced_sources.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }
}

/// Media endpoint that performs no media work
#[derive(Debug)]
pub struct MockMediaEndpoint {
    handle: MockEndpointHandle,
}

impl MockMediaEndpoint {
    /// Create an endpoint with a fresh handle
    pub fn new(client: MediaEndpointClient) -> Self {
        Self::with_handle(client, MockEndpointHandle::new())
    }

    /// Create an endpoint backed by an existing handle
    pub fn with_handle(client: MediaEndpointClient, handle: MockEndpointHandle) -> Self {
        handle.state.lock().client = Some(client);
        Self { handle }
    }

    pub fn handle(&self) -> &MockEndpointHandle {
        &self.handle
    }
}

impl MediaEndpoint for MockMediaEndpoint {
    fn set_configuration(&mut self, configuration: &PeerConnectionConfig) {
        let mut state = self.handle.state.lock();
        if state.stopped {
            return;
        }
        state.configuration = Some(configuration.clone());
    }

    fn generate_dtls_info(&mut self) {
        let mut state = self.handle.state.lock();
        if state.stopped {
            return;
        }

        let der = dtls::random_certificate_der();
        let fingerprint = dtls::fingerprint_bytes(&der);
        state.certificate_pem = Some(dtls::to_pem("CERTIFICATE", &der));
        state.fingerprint = Some(fingerprint.clone());
        state.dtls_requests += 1;

        if state.auto_fingerprint {
            if let Some(client) = &state.client {
                client.got_dtls_fingerprint(fingerprint, dtls::FINGERPRINT_HASH_FUNCTION);
            }
        }
    }

    fn default_audio_payloads(&self) -> Vec<MediaPayload> {
        default_audio_payloads()
    }

    fn default_video_payloads(&self) -> Vec<MediaPayload> {
        default_video_payloads()
    }

    fn update_receive_configuration(
        &mut self,
        configuration: &SessionConfiguration,
        is_initiator: bool,
    ) -> UpdateResult {
        let mut state = self.handle.state.lock();
        if state.stopped {
            return UpdateResult::Failed;
        }
        state.receive_updates.push(ReceiveUpdate {
            configuration: configuration.clone(),
            is_initiator,
        });
        state.receive_result
    }

    fn update_send_configuration(
        &mut self,
        configuration: &SessionConfiguration,
        sources: &SourceMap,
        is_initiator: bool,
    ) -> UpdateResult {
        let mut state = self.handle.state.lock();
        if state.stopped {
            return UpdateResult::Failed;
        }
        let mut source_mids: Vec<String> = sources.keys().cloned().collect();
        source_mids.sort();
        state.send_updates.push(SendUpdate {
            configuration: configuration.clone(),
            source_mids,
            is_initiator,
        });
        state.send_result
    }

    fn add_remote_candidate(&mut self, candidate: &IceCandidate, mid: &str, ufrag: &str, password: &str) {
        let mut state = self.handle.state.lock();
        if state.stopped {
            return;
        }
        state.remote_candidates.push(RemoteCandidate {
            candidate: candidate.clone(),
            mid: mid.to_string(),
            ufrag: ufrag.to_string(),
            password: password.to_string(),
        });
    }

    fn create_muted_remote_source(&mut self, mid: &str, kind: &MediaKind) -> MediaSource {
        let mut state = self.handle.state.lock();
        if !state.stopped {
            state.muted_sources.push((mid.to_string(), kind.clone()));
        }
        MediaSource::muted_remote(format!("mock-{}-{}", mid, Uuid::new_v4()), kind.clone())
    }

    fn replace_send_source(&mut self, source: &MediaSource, mid: &str) {
        let mut state = self.handle.state.lock();
        if state.stopped {
            return;
        }
        state.replaced_sources.push((source.id().to_string(), mid.to_string()));
    }

    fn stop(&mut self) {
        let mut state = self.handle.state.lock();
        if !state.stopped {
            debug!("Mock media endpoint stopped");
            state.stopped = true;
        }
    }
}
