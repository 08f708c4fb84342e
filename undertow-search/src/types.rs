//! Data types exchanged with providers and returned to callers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of content streams are requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Feature film, id is a bare IMDb id
    Movie,
    /// Episodic content, id is `<imdb>:<season>:<episode>`
    Series,
}

impl ContentType {
    /// Wire name used in addon routes and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Series => "series",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(ContentType::Movie),
            "series" | "tv" | "show" => Ok(ContentType::Series),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

/// Player hints attached to a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorHints {
    /// Groups streams of the same quality across episodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binge_group: Option<String>,
    /// Total size of the video file in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_size: Option<u64>,
    /// File name inside the torrent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Raw offering returned by a provider.
///
/// A usable candidate carries a magnet `url`, an `info_hash`, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCandidate {
    /// Name of the provider that produced the candidate
    #[serde(default)]
    pub provider: String,
    /// Release title, possibly several lines
    #[serde(default)]
    pub title: String,
    /// Magnet URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 40 hex or 32 base32 info hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    /// Seeders reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeds: Option<u32>,
    /// Leechers reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leechers: Option<u32>,
    /// Declared size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Audio/subtitle languages declared by the provider
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    /// Provider's own description text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Provider's player hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_hints: Option<BehaviorHints>,
}

/// Final, ranked stream handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedStream {
    /// Short label shown in the stream picker
    pub name: String,
    /// Release title
    pub title: String,
    /// Multi-line human readable details
    pub description: String,
    /// Lowercase hex info hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    /// Magnet URI with the attached trackers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Peer discovery sources, `tracker:<url>` and `dht:<hash>`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    /// Player hints
    pub behavior_hints: BehaviorHints,
}
