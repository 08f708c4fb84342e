//! Network primitives behind a tracker check.
//!
//! The validator only decides *what* to check; [`TrackerProbe`] does the I/O
//! so tests can script outcomes without touching the network.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use super::error::TrackerError;
use super::udp;

/// Low level reachability checks.
#[async_trait]
pub trait TrackerProbe: Send + Sync {
    /// Resolves `host:port` to at least one socket address.
    ///
    /// # Errors
    ///
    /// - `TrackerError::Dns` - Lookup failed, returned nothing, or timed out
    async fn resolve(
        &self,
        host: &str,
        port: u16,
        limit: Duration,
    ) -> Result<Vec<SocketAddr>, TrackerError>;

    /// HEAD `url`, falling back to GET; any 2xx or 3xx status passes.
    ///
    /// # Errors
    ///
    /// - `TrackerError::Http` - Both requests failed or returned 4xx/5xx
    async fn http_reachable(&self, url: &str, limit: Duration) -> Result<(), TrackerError>;

    /// Performs the BEP 15 connect handshake against `addr`.
    ///
    /// # Errors
    ///
    /// - `TrackerError::Udp` - No matching reply within `limit`
    async fn udp_handshake(
        &self,
        url: &str,
        addr: SocketAddr,
        limit: Duration,
    ) -> Result<(), TrackerError>;
}

/// Probe backed by the system resolver, reqwest and real UDP sockets.
pub struct NetworkProbe {
    client: reqwest::Client,
}

impl NetworkProbe {
    /// Creates a probe sending `user_agent` on HTTP checks.
    ///
    /// Redirects are not followed: a 3xx answer already proves the tracker
    /// host is up.
    pub fn new(user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {e}");
                reqwest::Client::new()
            });
        Self { client }
    }

    async fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        limit: Duration,
    ) -> Result<reqwest::StatusCode, String> {
        let response = self
            .client
            .request(method, url)
            .timeout(limit)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Ok(response.status())
    }
}

impl Default for NetworkProbe {
    fn default() -> Self {
        Self::new(concat!("undertow/", env!("CARGO_PKG_VERSION")))
    }
}

fn passes(status: reqwest::StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

#[async_trait]
impl TrackerProbe for NetworkProbe {
    async fn resolve(
        &self,
        host: &str,
        port: u16,
        limit: Duration,
    ) -> Result<Vec<SocketAddr>, TrackerError> {
        let dns_error = |reason: String| TrackerError::Dns {
            host: host.to_string(),
            reason,
        };

        let addrs: Vec<SocketAddr> = timeout(limit, tokio::net::lookup_host((host, port)))
            .await
            .map_err(|_| dns_error("timed out".into()))?
            .map_err(|e| dns_error(e.to_string()))?
            .collect();

        if addrs.is_empty() {
            return Err(dns_error("no addresses".into()));
        }
        Ok(addrs)
    }

    async fn http_reachable(&self, url: &str, limit: Duration) -> Result<(), TrackerError> {
        let head = self.request(reqwest::Method::HEAD, url, limit).await;
        if matches!(head, Ok(status) if passes(status)) {
            return Ok(());
        }

        let reason = match self.request(reqwest::Method::GET, url, limit).await {
            Ok(status) if passes(status) => return Ok(()),
            Ok(status) => format!("status {status}"),
            Err(e) => e,
        };
        Err(TrackerError::Http {
            url: url.to_string(),
            reason,
        })
    }

    async fn udp_handshake(
        &self,
        url: &str,
        addr: SocketAddr,
        limit: Duration,
    ) -> Result<(), TrackerError> {
        udp::handshake(url, addr, limit).await
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    use super::*;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_resolve_localhost() {
        let probe = NetworkProbe::default();
        let addrs = probe
            .resolve("localhost", 6969, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(addrs.iter().all(|a| a.port() == 6969));
    }

    #[tokio::test]
    async fn test_http_status_classes() {
        let router = Router::new()
            .route("/announce", get(|| async { "ok" }))
            .route("/moved", get(|| async { (StatusCode::FOUND, [("location", "/announce")]) }))
            .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let addr = serve(router).await;
        let probe = NetworkProbe::default();
        let limit = Duration::from_secs(2);

        assert!(probe.http_reachable(&format!("http://{addr}/announce"), limit).await.is_ok());
        assert!(probe.http_reachable(&format!("http://{addr}/moved"), limit).await.is_ok());

        let err = probe
            .http_reachable(&format!("http://{addr}/broken"), limit)
            .await
            .unwrap_err();
        assert_eq!(err.tag(), "http");
    }
}
