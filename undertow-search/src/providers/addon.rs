//! Provider reading Stremio-style addon stream endpoints.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use undertow_core::release::parse_size;

use super::{ProviderResponse, StreamProvider};
use crate::errors::AggregationError;
use crate::types::{BehaviorHints, ContentType, StreamCandidate};

static SEEDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"👤\s*(\d+)").unwrap_or_else(|e| panic!("invalid seeds pattern: {e}"))
});

static SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)💾\s*([\d.,]+\s*[KMGT]i?B)")
        .unwrap_or_else(|e| panic!("invalid size pattern: {e}"))
});

/// Addon serving `{base}/stream/{type}/{id}.json`.
///
/// Seed counts and sizes are scraped from the `👤 N` and `💾 X GB` markers
/// addons put in stream titles.
#[derive(Debug)]
pub struct AddonProvider {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    #[serde(default)]
    streams: Vec<AddonStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddonStream {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    info_hash: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    behavior_hints: Option<BehaviorHints>,
}

impl AddonProvider {
    /// Creates a provider for the addon rooted at `base_url`.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn stream_url(&self, content_type: ContentType, id: &str) -> String {
        let id = urlencoding::encode(id).replace("%3A", ":");
        format!("{}/stream/{}/{id}.json", self.base_url, content_type.as_str())
    }

    fn unavailable(&self, reason: impl ToString) -> AggregationError {
        AggregationError::ProviderUnavailable {
            provider: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn to_candidate(&self, stream: AddonStream) -> StreamCandidate {
        let text = stream
            .title
            .or(stream.description)
            .unwrap_or_default();
        let title = text.lines().next().unwrap_or_default().trim().to_string();
        let seeds = SEEDS
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());
        let size_bytes = SIZE
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| parse_size(m.as_str()))
            .or_else(|| stream.behavior_hints.as_ref().and_then(|h| h.video_size));
        let url = stream.url.filter(|url| url.starts_with("magnet:"));
        let description = match stream.name {
            Some(name) if !name.trim().is_empty() => Some(format!("{}\n{text}", name.trim())),
            _ => Some(text).filter(|t| !t.is_empty()),
        };

        StreamCandidate {
            provider: self.name.clone(),
            title,
            url,
            info_hash: stream.info_hash,
            seeds,
            leechers: None,
            size_bytes,
            languages: Vec::new(),
            description,
            behavior_hints: stream.behavior_hints,
        }
    }
}

#[async_trait]
impl StreamProvider for AddonProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self, limit: Duration) -> Option<bool> {
        let url = format!("{}/manifest.json", self.base_url);
        let alive = match self.client.get(&url).timeout(limit).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Probe of {} failed: {e}", self.name);
                false
            }
        };
        Some(alive)
    }

    async fn fetch_streams(
        &self,
        content_type: ContentType,
        id: &str,
        limit: Duration,
    ) -> Result<ProviderResponse, AggregationError> {
        let url = self.stream_url(content_type, id);
        debug!("Fetching streams from {url}");

        let response = self
            .client
            .get(&url)
            .timeout(limit)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AggregationError::ProviderTimeout {
                        provider: self.name.clone(),
                        timeout_ms: limit.as_millis(),
                    }
                } else {
                    self.unavailable(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("status {status}")));
        }

        let body: StreamsResponse = response.json().await.map_err(|e| self.unavailable(e))?;
        let streams = body
            .streams
            .into_iter()
            .map(|stream| self.to_candidate(stream))
            .collect();
        Ok(ProviderResponse::ok(self.name.clone(), streams))
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn addon_router() -> Router {
        Router::new()
            .route("/manifest.json", get(|| async { Json(json!({"id": "fake"})) }))
            .route(
                "/stream/movie/tt0133093.json",
                get(|| async {
                    Json(json!({
                        "streams": [
                            {
                                "name": "Fake\n2160p",
                                "title": "The.Matrix.1999.2160p.BluRay.x265-GRP\n👤 152 💾 18.4 GB ⚙️ Site",
                                "infoHash": "c12fe1c06bba254a9dc9f519b335aa7c1367a88a",
                                "behaviorHints": {"bingeGroup": "fake-2160p"}
                            },
                            {
                                "title": "Direct link",
                                "url": "https://cdn.example/file.mkv"
                            }
                        ]
                    }))
                }),
            )
    }

    #[tokio::test]
    async fn test_fetch_extracts_markers() {
        let addr = serve(addon_router()).await;
        let provider = AddonProvider::new("fake", format!("http://{addr}/"));

        let response = provider
            .fetch_streams(ContentType::Movie, "tt0133093", Duration::from_secs(2))
            .await
            .unwrap();
        assert!(response.ok);
        assert_eq!(response.streams.len(), 2);

        let first = &response.streams[0];
        assert_eq!(first.title, "The.Matrix.1999.2160p.BluRay.x265-GRP");
        assert_eq!(first.seeds, Some(152));
        assert_eq!(first.size_bytes, Some((18.4 * (1u64 << 30) as f64).round() as u64));
        assert!(first.description.as_deref().unwrap().starts_with("Fake\n2160p\n"));

        // Non-magnet URLs are not kept.
        assert_eq!(response.streams[1].url, None);
    }

    #[tokio::test]
    async fn test_probe_and_missing_route() {
        let addr = serve(addon_router()).await;
        let provider = AddonProvider::new("fake", format!("http://{addr}"));
        assert_eq!(provider.probe(Duration::from_secs(2)).await, Some(true));

        let err = provider
            .fetch_streams(ContentType::Series, "tt1:1:2", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err.tag(), "provider_unavailable");
    }

    #[test]
    fn test_series_ids_keep_colons() {
        let provider = AddonProvider::new("a", "http://addon.example");
        assert_eq!(
            provider.stream_url(ContentType::Series, "tt0944947:1:2"),
            "http://addon.example/stream/series/tt0944947:1:2.json"
        );
    }
}
