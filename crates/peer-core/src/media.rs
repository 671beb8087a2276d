//! Media sources, tracks and streams
//!
//! These are thin handles. Sources are owned by the media endpoint; the engine
//! only moves them between senders, receivers and the endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rtcpeer_sdp_core::MediaKind;
use uuid::Uuid;

#[derive(Debug)]
struct MediaSourceInner {
    id: String,
    kind: MediaKind,
    remote: bool,
    muted: AtomicBool,
}

/// Shared handle to a realtime media source
///
/// Clones refer to the same source. Remote sources start muted and are
/// unmuted by the media endpoint once media arrives.
#[derive(Debug, Clone)]
pub struct MediaSource {
    inner: Arc<MediaSourceInner>,
}

impl MediaSource {
    /// A local capture source
    pub fn local(id: impl Into<String>, kind: MediaKind) -> Self {
        Self::build(id.into(), kind, false, false)
    }

    /// A muted placeholder for media that will arrive from the remote peer
    pub fn muted_remote(id: impl Into<String>, kind: MediaKind) -> Self {
        Self::build(id.into(), kind, true, true)
    }

    fn build(id: String, kind: MediaKind, remote: bool, muted: bool) -> Self {
        Self {
            inner: Arc::new(MediaSourceInner {
                id,
                kind,
                remote,
                muted: AtomicBool::new(muted),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> &MediaKind {
        &self.inner.kind
    }

    pub fn is_remote(&self) -> bool {
        self.inner.remote
    }

    pub fn is_muted(&self) -> bool {
        self.inner.muted.load(Ordering::Acquire)
    }

    pub fn set_muted(&self, muted: bool) {
        self.inner.muted.store(muted, Ordering::Release);
    }

    /// Whether two handles refer to the same source
    pub fn ptr_eq(a: &MediaSource, b: &MediaSource) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

/// A media track backed by a [`MediaSource`]
#[derive(Debug, Clone)]
pub struct MediaStreamTrack {
    id: String,
    kind: MediaKind,
    source: MediaSource,
}

impl MediaStreamTrack {
    /// Create a track with a generated id
    pub fn new(source: MediaSource) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), source)
    }

    /// Create a track with an explicit id
    pub fn with_id(id: impl Into<String>, source: MediaSource) -> Self {
        Self {
            id: id.into(),
            kind: source.kind().clone(),
            source,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &MediaKind {
        &self.kind
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn is_remote(&self) -> bool {
        self.source.is_remote()
    }
}

impl PartialEq for MediaStreamTrack {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && MediaSource::ptr_eq(&self.source, &other.source)
    }
}

/// A group of tracks sharing a stream id
#[derive(Debug, Clone, PartialEq)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaStreamTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaStreamTrack] {
        &self.tracks
    }

    /// Add a track unless it is already part of the stream
    pub fn add_track(&mut self, track: MediaStreamTrack) {
        if !self.tracks.iter().any(|t| t.id() == track.id()) {
            self.tracks.push(track);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_source_starts_muted() {
        let source = MediaSource::muted_remote("r1", MediaKind::Audio);
        assert!(source.is_remote());
        assert!(source.is_muted());

        let shared = source.clone();
        shared.set_muted(false);
        assert!(!source.is_muted());
        assert!(MediaSource::ptr_eq(&source, &shared));
    }

    #[test]
    fn test_track_takes_kind_from_source() {
        let track = MediaStreamTrack::new(MediaSource::local("cam", MediaKind::Video));
        assert_eq!(track.kind(), &MediaKind::Video);
        assert!(!track.is_remote());
        assert!(!track.id().is_empty());
    }

    #[test]
    fn test_stream_ignores_duplicate_tracks() {
        let track = MediaStreamTrack::with_id("t1", MediaSource::local("mic", MediaKind::Audio));
        let mut stream = MediaStream::new("s1");
        stream.add_track(track.clone());
        stream.add_track(track);
        assert_eq!(stream.tracks().len(), 1);
    }
}
