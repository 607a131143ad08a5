//! Metadata provider trait and in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use domain::Track;
use retry::{ClassifiedError, TransportKind};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A track as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseTrack {
    pub title: String,
    pub length_ms: Option<u64>,
}

/// One medium (disc, side set) of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medium {
    pub format: Option<String>,
    pub tracks: Vec<ReleaseTrack>,
}

/// Release metadata fetched by mbid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    pub title: String,
    pub genre: Option<String>,
    pub media: Vec<Medium>,
}

impl ReleaseMetadata {
    /// Flattens every medium into one tracklist numbered from 1.
    pub fn tracklist(&self) -> Vec<Track> {
        self.media
            .iter()
            .flat_map(|medium| medium.tracks.iter())
            .zip(1u32..)
            .map(|(track, position)| Track {
                position,
                title: track.title.clone(),
                length_ms: track.length_ms,
            })
            .collect()
    }
}

/// Source of release metadata keyed by mbid.
///
/// Implementations classify their own failures so the retry engine can
/// decide whether to try again.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetches a release by its mbid.
    async fn get_release_by_id(&self, mbid: &str) -> Result<ReleaseMetadata, ClassifiedError>;
}

#[async_trait]
impl<T: MetadataProvider + ?Sized> MetadataProvider for Arc<T> {
    async fn get_release_by_id(&self, mbid: &str) -> Result<ReleaseMetadata, ClassifiedError> {
        (**self).get_release_by_id(mbid).await
    }
}

/// A scripted failure for [`InMemoryMetadataProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    Status(u16),
    Transport(TransportKind),
}

impl ScriptedFailure {
    fn into_error(self) -> ClassifiedError {
        match self {
            ScriptedFailure::Status(status) => {
                ClassifiedError::from_status(status, Some(format!("scripted status {status}")))
            }
            ScriptedFailure::Transport(kind) => {
                ClassifiedError::transport(kind, format!("scripted {kind:?}"))
            }
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryProviderState {
    releases: HashMap<String, ReleaseMetadata>,
    failures: VecDeque<ScriptedFailure>,
}

/// In-memory metadata provider for testing.
///
/// Unknown mbids answer with a 404. Scripted failures are consumed one per
/// call before any lookup happens.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataProvider {
    state: Arc<RwLock<InMemoryProviderState>>,
    calls: Arc<AtomicU32>,
}

impl InMemoryMetadataProvider {
    /// Creates a new provider with no releases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a release under `mbid`.
    pub async fn insert(&self, mbid: impl Into<String>, release: ReleaseMetadata) {
        self.state.write().await.releases.insert(mbid.into(), release);
    }

    /// Makes the next call fail with `failure`. Calls queue up.
    pub async fn push_failure(&self, failure: ScriptedFailure) {
        self.state.write().await.failures.push_back(failure);
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for InMemoryMetadataProvider {
    async fn get_release_by_id(&self, mbid: &str) -> Result<ReleaseMetadata, ClassifiedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;

        if let Some(failure) = state.failures.pop_front() {
            return Err(failure.into_error());
        }

        state.releases.get(mbid).cloned().ok_or_else(|| {
            ClassifiedError::from_status(404, Some(format!("release {mbid} not found")))
        })
    }
}
