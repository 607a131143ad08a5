//! MusicBrainz web service client.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use retry::{ClassifiedError, TransportKind};
use serde::Deserialize;

use crate::provider::{Medium, MetadataProvider, ReleaseMetadata, ReleaseTrack};

/// Public MusicBrainz web service root.
pub const DEFAULT_BASE_URL: &str = "https://musicbrainz.org/ws/2";

const USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " (record catalog)"
);

#[derive(Debug, Deserialize)]
struct MbRelease {
    title: String,
    #[serde(default)]
    genres: Vec<MbGenre>,
    #[serde(default)]
    media: Vec<MbMedium>,
}

#[derive(Debug, Deserialize)]
struct MbGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MbMedium {
    format: Option<String>,
    #[serde(default)]
    tracks: Vec<MbTrack>,
}

#[derive(Debug, Deserialize)]
struct MbTrack {
    title: String,
    length: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MbError {
    error: String,
}

impl From<MbRelease> for ReleaseMetadata {
    fn from(release: MbRelease) -> Self {
        Self {
            title: release.title,
            genre: release.genres.into_iter().next().map(|g| g.name),
            media: release
                .media
                .into_iter()
                .map(|medium| Medium {
                    format: medium.format,
                    tracks: medium
                        .tracks
                        .into_iter()
                        .map(|track| ReleaseTrack {
                            title: track.title,
                            length_ms: track.length,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Classifies a reqwest failure for the retry engine.
fn classify(err: reqwest::Error) -> ClassifiedError {
    let message = err.to_string();

    if err.is_timeout() {
        return ClassifiedError::transport(TransportKind::Timeout, message).with_source(err);
    }
    if err.is_connect() {
        let kind = match io_kind(&err) {
            Some(TransportKind::Other) | None if chain_mentions(&err, "dns error") => {
                TransportKind::NameNotResolved
            }
            Some(TransportKind::Other) | None => TransportKind::ConnectionRefused,
            Some(kind) => kind,
        };
        return ClassifiedError::transport(kind, message).with_source(err);
    }
    if let Some(status) = err.status() {
        return ClassifiedError::from_status(status.as_u16(), None).with_source(err);
    }
    if err.is_decode() {
        return ClassifiedError::fatal(message).with_source(err);
    }
    match io_kind(&err) {
        Some(kind) => ClassifiedError::transport(kind, message).with_source(err),
        None => ClassifiedError::other(message).with_source(err),
    }
}

fn io_kind(err: &reqwest::Error) -> Option<TransportKind> {
    let mut source = err.source();
    while let Some(current) = source {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            return Some(TransportKind::from_io_kind(io.kind()));
        }
        source = current.source();
    }
    None
}

fn chain_mentions(err: &reqwest::Error, needle: &str) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if current.to_string().contains(needle) {
            return true;
        }
        source = current.source();
    }
    false
}

/// Metadata provider backed by the MusicBrainz JSON web service.
#[derive(Debug, Clone)]
pub struct MusicBrainzProvider {
    client: reqwest::Client,
    base_url: String,
}

impl MusicBrainzProvider {
    /// Creates a provider against `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn release_url(&self, mbid: &str) -> String {
        format!("{}/release/{}", self.base_url, urlencoding::encode(mbid))
    }
}

#[async_trait]
impl MetadataProvider for MusicBrainzProvider {
    #[tracing::instrument(skip(self))]
    async fn get_release_by_id(&self, mbid: &str) -> Result<ReleaseMetadata, ClassifiedError> {
        let response = self
            .client
            .get(self.release_url(mbid))
            .query(&[("inc", "recordings genres"), ("fmt", "json")])
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|err| {
                tracing::debug!(error = %err, "failed to read metadata provider error body");
                String::new()
            });
            let upstream_message = serde_json::from_str::<MbError>(&body)
                .ok()
                .map(|e| e.error);
            tracing::debug!(status = status.as_u16(), "metadata provider returned an error");
            return Err(
                ClassifiedError::from_status(status.as_u16(), upstream_message).with_payload(body),
            );
        }

        let release: MbRelease = response.json().await.map_err(classify)?;
        Ok(release.into())
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, extract::Path, http::StatusCode, response::IntoResponse, routing::get};

    use super::*;

    async fn release(Path(mbid): Path<String>) -> impl IntoResponse {
        match mbid.as_str() {
            "good" => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "title": "Blue Train",
                    "genres": [{"name": "hard bop"}],
                    "media": [{
                        "format": "12\" Vinyl",
                        "tracks": [
                            {"title": "Blue Train", "length": 643000},
                            {"title": "Moment's Notice", "length": null}
                        ]
                    }]
                })),
            ),
            "busy" => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"error": "rate limited"})),
            ),
            _ => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "Not Found"})),
            ),
        }
    }

    async fn serve() -> String {
        let app = Router::new().route("/ws/2/release/{mbid}", get(release));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/ws/2/")
    }

    #[tokio::test]
    async fn fetches_and_maps_release() {
        let provider = MusicBrainzProvider::new(serve().await, Duration::from_secs(5)).unwrap();

        let release = provider.get_release_by_id("good").await.unwrap();

        assert_eq!(release.title, "Blue Train");
        assert_eq!(release.genre.as_deref(), Some("hard bop"));
        let tracks = release.tracklist();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].length_ms, Some(643_000));
        assert_eq!(tracks[1].position, 2);
    }

    #[tokio::test]
    async fn not_found_is_fatal_with_upstream_message() {
        let provider = MusicBrainzProvider::new(serve().await, Duration::from_secs(5)).unwrap();

        let err = provider.get_release_by_id("missing").await.unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(!err.is_retryable());
        assert_eq!(err.message(), "Not Found");
    }

    #[tokio::test]
    async fn unavailable_is_retryable() {
        let provider = MusicBrainzProvider::new(serve().await, Duration::from_secs(5)).unwrap();

        let err = provider.get_release_by_id("busy").await.unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn truncated_error_body_still_reports_the_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(
                    b"HTTP/1.1 500 Internal Server Error\r\n\
                      content-type: application/json\r\n\
                      content-length: 64\r\n\r\n{\"err",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });
        let provider =
            MusicBrainzProvider::new(format!("http://{addr}"), Duration::from_secs(5)).unwrap();

        let err = provider.get_release_by_id("good").await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert!(!err.is_retryable());
        assert_eq!(err.message(), "Unknown error occurred");
    }

    #[tokio::test]
    async fn refused_connection_is_a_retryable_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let provider =
            MusicBrainzProvider::new(format!("http://{addr}"), Duration::from_secs(5)).unwrap();

        let err = provider.get_release_by_id("good").await.unwrap_err();

        assert!(err.is_retryable());
        assert!(err.transport_kind().is_some());
        assert_eq!(err.status(), None);
    }
}
