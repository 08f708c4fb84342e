//! Tracker check failures

use thiserror::Error;

/// Why a tracker was judged unhealthy.
///
/// Every variant is a degraded outcome for the batch, never a fatal one.
/// The short [`tag`](TrackerError::tag) is what ends up in
/// `HealthRecord::last_error`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("DNS resolution failed for {host}: {reason}")]
    Dns { host: String, reason: String },

    #[error("HTTP probe failed for {url}: {reason}")]
    Http { url: String, reason: String },

    #[error("UDP handshake failed for {url}: {reason}")]
    Udp { url: String, reason: String },

    #[error("Tracker URL has no host: {url}")]
    NoHost { url: String },

    #[error("UDP check budget exhausted")]
    RateLimited,

    #[error("Unsupported tracker scheme: {scheme}")]
    UnsupportedScheme { scheme: String },
}

impl TrackerError {
    /// Stable observability tag.
    pub fn tag(&self) -> &'static str {
        match self {
            TrackerError::Dns { .. } => "dns",
            TrackerError::Http { .. } => "http",
            TrackerError::Udp { .. } => "udp",
            TrackerError::NoHost { .. } => "no-host",
            TrackerError::RateLimited => "rate-limited",
            TrackerError::UnsupportedScheme { .. } => "scheme",
        }
    }

    /// Whether the failure says nothing about the tracker itself.
    pub fn is_local(&self) -> bool {
        matches!(self, TrackerError::RateLimited)
    }
}
