//! Human readable stream descriptions.

use undertow_core::release::format_size;
use undertow_core::{ReleaseInfo, SwarmStats};

/// Inputs for one description.
#[derive(Debug, Clone, Copy)]
pub struct DescriptionParts<'a> {
    /// First line of the release title
    pub title: &'a str,
    /// Parsed release details
    pub info: &'a ReleaseInfo,
    /// Seeders and leechers, when known
    pub swarm: Option<SwarmStats>,
    /// Seeders only, when leechers are unknown
    pub seeds: Option<u32>,
    /// Size in bytes
    pub size_bytes: Option<u64>,
    /// Languages to list
    pub languages: &'a [String],
    /// Provider that offered the stream
    pub provider: &'a str,
    /// Provider's own text
    pub original: Option<&'a str>,
}

/// Builds the multi-line description shown under a stream.
///
/// With `require_details` set and nothing quality-related parsed from the
/// title, the provider's original text is returned verbatim (or an empty
/// string).
pub fn build_description(parts: &DescriptionParts<'_>, require_details: bool) -> String {
    let info = parts.info;
    if require_details && !info.has_details() {
        return parts.original.unwrap_or_default().to_string();
    }

    let mut lines = Vec::new();
    if !parts.title.is_empty() {
        lines.push(parts.title.to_string());
    }

    let quality: Vec<&str> = [&info.resolution, &info.source, &info.codec, &info.hdr, &info.audio]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .collect();
    if !quality.is_empty() {
        lines.push(format!("🎞 {}", quality.join(" | ")));
    }

    let mut stats = Vec::new();
    match (parts.swarm, parts.seeds) {
        (Some(swarm), _) => {
            stats.push(format!("👤 {}", swarm.seeds));
            stats.push(format!("⬇ {}", swarm.leechers));
        }
        (None, Some(seeds)) => stats.push(format!("👤 {seeds}")),
        (None, None) => {}
    }
    if let Some(size) = parts.size_bytes {
        stats.push(format!("💾 {}", format_size(size)));
    }
    if let Some(group) = &info.group {
        stats.push(format!("🏷 {group}"));
    }
    if !stats.is_empty() {
        lines.push(stats.join("  "));
    }

    if !parts.languages.is_empty() {
        lines.push(format!("🌐 {}", parts.languages.join(" / ")));
    }
    if !parts.provider.is_empty() {
        lines.push(format!("🔗 {}", parts.provider));
    }

    lines.join("\n")
}
