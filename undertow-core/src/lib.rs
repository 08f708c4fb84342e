//! Undertow Core - Tracker health, swarm statistics and magnet handling
//!
//! This crate provides the protocol-level building blocks for augmenting
//! torrent-backed media streams: magnet URI handling, release name parsing,
//! tracker reachability validation (DNS, HTTP and BEP 15 UDP), BEP 48 scrape
//! support, and the TTL cache stores shared by the higher level aggregator.

pub mod cache;
pub mod config;
pub mod release;
pub mod torrent;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use cache::{CacheEntry, CacheStore, Freshness, MemoryStore, StaleCache};
pub use config::UndertowConfig;
pub use release::ReleaseInfo;
pub use torrent::bencode::BencodeError;
pub use torrent::scrape::{ScrapeError, SwarmScraper, SwarmSource, SwarmStats};
pub use torrent::tracker::{
    HealthRecord, HealthStore, MemoryHealthStore, NetworkProbe, TrackerError, TrackerProbe,
    TrackerValidator, UdpRateLimiter, ValidationMode, ValidationProgress, unique,
};
pub use torrent::{InfoHash, magnet};

/// Core errors that can bubble up from any Undertow subsystem.
///
/// The batch operations never surface these; they appear on the lower level
/// helpers and at the command-line edge.
#[derive(Debug, thiserror::Error)]
pub enum UndertowError {
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Bencode error: {0}")]
    Bencode(#[from] BencodeError),

    #[error("Invalid info hash: {value}")]
    InvalidInfoHash { value: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UndertowError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            UndertowError::Tracker(e) => format!("Tracker check failed ({})", e.tag()),
            UndertowError::Scrape(e) => format!("Swarm statistics unavailable ({})", e.tag()),
            UndertowError::Bencode(_) => "Malformed tracker response".to_string(),
            UndertowError::InvalidInfoHash { value } => {
                format!("Not a 40-char hex or 32-char base32 info hash: {value}")
            }
            UndertowError::Configuration { reason } => format!("Configuration error: {reason}"),
            UndertowError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            UndertowError::Configuration { .. } | UndertowError::InvalidInfoHash { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, UndertowError>;
