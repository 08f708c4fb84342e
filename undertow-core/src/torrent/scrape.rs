//! BEP 48 HTTP scrape client for live seed/leecher counts.
//!
//! Scraping is strictly best-effort: [`SwarmSource::scrape_swarm`] tries each
//! HTTP(S) announce URL in order under a per-URL timeout and yields `None`
//! when none of them answers with usable statistics.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use super::InfoHash;
use super::bencode::{self, Value};
use crate::config::ScrapeConfig;

/// Swarm size reported by a tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmStats {
    pub seeds: u32,
    pub leechers: u32,
}

/// Why a single announce URL yielded no statistics.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Scrape of {url} failed: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Malformed scrape response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("Announce URL cannot be scraped over HTTP: {url}")]
    Unsupported { url: String },

    #[error("Invalid info hash: {value}")]
    InvalidInfoHash { value: String },
}

impl ScrapeError {
    /// Stable observability tag.
    pub fn tag(&self) -> &'static str {
        match self {
            ScrapeError::Unreachable { .. } => "scrape_unreachable",
            ScrapeError::Malformed { .. } => "scrape_malformed",
            ScrapeError::Unsupported { .. } => "scrape_unsupported",
            ScrapeError::InvalidInfoHash { .. } => "invalid_info_hash",
        }
    }
}

/// Source of live swarm statistics.
#[async_trait]
pub trait SwarmSource: Send + Sync {
    /// Returns statistics from the first announce URL that answers.
    ///
    /// Never fails: any problem yields `None`. Each URL is given at most
    /// `limit` before moving on.
    async fn scrape_swarm(
        &self,
        info_hash: &str,
        announce: &[String],
        limit: Duration,
    ) -> Option<SwarmStats>;
}

/// Derives the BEP 48 scrape URL for an HTTP(S) announce URL.
///
/// A last path segment starting with `announce` has that word replaced by
/// `scrape` (`/announce.php` becomes `/scrape.php`); otherwise `/scrape` is
/// appended. Query strings such as passkeys are kept. Returns `None` for
/// non-HTTP schemes and unparseable input.
pub fn scrape_url(announce: &str) -> Option<String> {
    let mut url = Url::parse(announce.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let path = url.path().to_string();
    let (dir, last) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
    let scrape_path = match last.strip_prefix("announce") {
        Some(rest) => format!("{dir}/scrape{rest}"),
        None => format!("{}/scrape", path.trim_end_matches('/')),
    };
    url.set_path(&scrape_path);
    Some(url.into())
}

/// Percent-encodes every byte, as trackers expect for binary parameters.
fn url_encode_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| format!("%{b:02X}")).collect()
}

/// Extracts `files[<info_hash>].{complete,incomplete}` from a scrape body.
///
/// # Errors
///
/// - `ScrapeError::Malformed` - Invalid bencode or missing entry for the hash
pub fn parse_scrape_response(
    url: &str,
    body: &[u8],
    info_hash: &InfoHash,
) -> Result<SwarmStats, ScrapeError> {
    let malformed = |reason: String| ScrapeError::Malformed {
        url: url.to_string(),
        reason,
    };

    let root = bencode::decode(body).map_err(|e| malformed(e.to_string()))?;
    if let Some(reason) = root.get(b"failure reason").and_then(Value::as_bytes) {
        return Err(malformed(String::from_utf8_lossy(reason).into_owned()));
    }

    let entry = root
        .get(b"files")
        .and_then(|files| files.get(info_hash.as_bytes()))
        .ok_or_else(|| malformed(format!("no entry for {info_hash}")))?;

    let count = |key: &[u8]| -> Result<u32, ScrapeError> {
        let value = entry
            .get(key)
            .and_then(Value::as_integer)
            .ok_or_else(|| malformed(format!("missing {}", String::from_utf8_lossy(key))))?;
        u32::try_from(value.max(0)).map_err(|_| malformed(format!("count out of range: {value}")))
    };

    Ok(SwarmStats {
        seeds: count(b"complete")?,
        leechers: count(b"incomplete")?,
    })
}

/// HTTP scrape client.
pub struct SwarmScraper {
    client: reqwest::Client,
}

impl SwarmScraper {
    /// Creates a scraper following at most three redirects.
    pub fn new(config: &ScrapeConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {e}");
                reqwest::Client::new()
            });
        Self { client }
    }

    /// Scrapes one announce URL.
    ///
    /// # Errors
    ///
    /// - `ScrapeError::Unsupported` - Not an HTTP(S) announce URL
    /// - `ScrapeError::Unreachable` - Network failure, timeout or error status
    /// - `ScrapeError::Malformed` - Body is not a usable scrape response
    pub async fn scrape_one(
        &self,
        info_hash: &InfoHash,
        announce: &str,
        limit: Duration,
    ) -> Result<SwarmStats, ScrapeError> {
        let base = scrape_url(announce).ok_or_else(|| ScrapeError::Unsupported {
            url: announce.to_string(),
        })?;
        let separator = if base.contains('?') { '&' } else { '?' };
        let request_url = format!(
            "{base}{separator}info_hash={}",
            url_encode_bytes(info_hash.as_bytes())
        );

        let unreachable = |reason: String| ScrapeError::Unreachable {
            url: announce.to_string(),
            reason,
        };

        let fetch = async {
            let response = self
                .client
                .get(&request_url)
                .timeout(limit)
                .send()
                .await
                .map_err(|e| unreachable(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(unreachable(format!("status {status}")));
            }
            response
                .bytes()
                .await
                .map_err(|e| unreachable(e.to_string()))
        };

        let body = timeout(limit, fetch)
            .await
            .map_err(|_| unreachable(format!("timed out after {}ms", limit.as_millis())))??;

        parse_scrape_response(announce, &body, info_hash)
    }
}

impl Default for SwarmScraper {
    fn default() -> Self {
        Self::new(&ScrapeConfig::default())
    }
}

#[async_trait]
impl SwarmSource for SwarmScraper {
    async fn scrape_swarm(
        &self,
        info_hash: &str,
        announce: &[String],
        limit: Duration,
    ) -> Option<SwarmStats> {
        let hash = match InfoHash::parse(info_hash) {
            Ok(hash) => hash,
            Err(_) => {
                let e = ScrapeError::InvalidInfoHash {
                    value: info_hash.to_string(),
                };
                debug!("Not scraping: {e}");
                return None;
            }
        };

        for url in announce {
            if scrape_url(url).is_none() {
                continue;
            }
            match self.scrape_one(&hash, url, limit).await {
                Ok(stats) => {
                    debug!(
                        "Scraped {hash} from {url}: {} seeds, {} leechers",
                        stats.seeds, stats.leechers
                    );
                    return Some(stats);
                }
                Err(e) => debug!("Scrape attempt failed ({}): {e}", e.tag()),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Instant;

    use axum::Router;
    use axum::extract::RawQuery;
    use axum::http::StatusCode;
    use axum::routing::get;

    use super::*;

    const HASH: [u8; 20] = [0xAB; 20];

    fn scrape_body(hash: &[u8; 20], seeds: i64, leechers: i64) -> Vec<u8> {
        let mut body = b"d5:filesd20:".to_vec();
        body.extend_from_slice(hash);
        body.extend_from_slice(
            format!("d8:completei{seeds}e10:downloadedi0e10:incompletei{leechers}eeee").as_bytes(),
        );
        body
    }

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    #[test]
    fn test_scrape_url_derivation() {
        assert_eq!(
            scrape_url("http://t.example/announce").as_deref(),
            Some("http://t.example/scrape")
        );
        assert_eq!(
            scrape_url("https://t.example/x/announce.php?passkey=1").as_deref(),
            Some("https://t.example/x/scrape.php?passkey=1")
        );
        assert_eq!(
            scrape_url("http://t.example:8080").as_deref(),
            Some("http://t.example:8080/scrape")
        );
        assert_eq!(
            scrape_url("http://t.example/tracker/").as_deref(),
            Some("http://t.example/tracker/scrape")
        );
        assert_eq!(scrape_url("udp://t.example:80/announce"), None);
        assert_eq!(scrape_url("nonsense"), None);
    }

    #[test]
    fn test_parse_scrape_response() {
        let hash = InfoHash::new(HASH);
        let stats = parse_scrape_response("u", &scrape_body(&HASH, 12, 3), &hash).unwrap();
        assert_eq!(stats, SwarmStats { seeds: 12, leechers: 3 });

        let other = InfoHash::new([0x01; 20]);
        let err = parse_scrape_response("u", &scrape_body(&HASH, 1, 1), &other).unwrap_err();
        assert_eq!(err.tag(), "scrape_malformed");

        let err = parse_scrape_response("u", b"<html>", &hash).unwrap_err();
        assert_eq!(err.tag(), "scrape_malformed");

        let err =
            parse_scrape_response("u", b"d14:failure reason6:bannede", &hash).unwrap_err();
        assert!(err.to_string().contains("banned"));
    }

    #[tokio::test]
    async fn test_scrape_swarm_against_fake_tracker() {
        let expected_query = format!("info_hash={}", "%AB".repeat(20));
        let router = Router::new().route(
            "/scrape",
            get(move |RawQuery(query): RawQuery| {
                let expected = expected_query.clone();
                async move {
                    if query.as_deref() == Some(expected.as_str()) {
                        (StatusCode::OK, scrape_body(&HASH, 42, 7))
                    } else {
                        (StatusCode::BAD_REQUEST, Vec::new())
                    }
                }
            }),
        );
        let addr = serve(router).await;
        let scraper = SwarmScraper::default();

        let announce = vec![
            "udp://ignored.example:80/announce".to_string(),
            format!("http://{addr}/missing/announce"),
            format!("http://{addr}/announce"),
        ];
        let stats = scraper
            .scrape_swarm(&hex::encode(HASH), &announce, Duration::from_secs(2))
            .await;
        assert_eq!(stats, Some(SwarmStats { seeds: 42, leechers: 7 }));
    }

    #[tokio::test]
    async fn test_unreachable_tracker_returns_none_within_timeout() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let scraper = SwarmScraper::default();
        let started = Instant::now();
        let stats = scraper
            .scrape_swarm(
                &hex::encode(HASH),
                &[format!("http://{addr}/announce")],
                Duration::from_millis(200),
            )
            .await;

        assert_eq!(stats, None);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_invalid_hash_returns_none() {
        let scraper = SwarmScraper::default();
        let stats = scraper
            .scrape_swarm("xyz", &["http://127.0.0.1:1/announce".into()], Duration::from_millis(50))
            .await;
        assert_eq!(stats, None);
    }
}
