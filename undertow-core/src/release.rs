//! Release name parsing.
//!
//! Pulls resolution, source, codec, HDR format, audio, release group, size
//! and languages out of a torrent title using ordered patterns. Each field is
//! independent; parsing never fails, unmatched fields stay `None`.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Structured metadata extracted from a release title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// `2160P`, `1080P`, `720P` or `480P`
    pub resolution: Option<String>,
    /// Upper-cased source tag, e.g. `BLURAY`, `WEB-DL`
    pub source: Option<String>,
    /// `HEVC x265`, `x264`, `AV1`, `VP9` or `MPEG4`
    pub codec: Option<String>,
    /// `HDR10+`, `DV`, `HDR10` or `HDR`
    pub hdr: Option<String>,
    /// Upper-cased audio tag, e.g. `ATMOS`, `DTS-HD MA`, `DDP`
    pub audio: Option<String>,
    /// Release group
    pub group: Option<String>,
    pub size_bytes: Option<u64>,
    /// Canonical display names in first-seen order
    pub languages: Vec<String>,
}

/// An ordered pattern and the canonical value it yields.
struct Rule {
    pattern: Regex,
    canonical: &'static str,
}

impl Rule {
    fn new(pattern: &str, canonical: &'static str) -> Self {
        Self {
            pattern: insensitive(pattern),
            canonical,
        }
    }

    fn apply(&self, text: &str) -> Option<String> {
        self.pattern
            .is_match(text)
            .then(|| self.canonical.to_string())
    }
}

fn insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|e| panic!("invalid release pattern {pattern}: {e}"))
}

fn first_match(rules: &[Rule], text: &str) -> Option<String> {
    rules.iter().find_map(|rule| rule.apply(text))
}

// Release names use '.', '_', '-' and spaces interchangeably, so word
// boundaries are spelled out instead of relying on \b around digits.
const L: &str = r"(?:^|[^A-Za-z0-9])";
const R: &str = r"(?:$|[^A-Za-z0-9])";

fn bounded(core: &str) -> String {
    format!("{L}(?:{core}){R}")
}

static RESOLUTION: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(&bounded("2160p|4k|uhd"), "2160P"),
        Rule::new(&bounded("1080[pi]"), "1080P"),
        Rule::new(&bounded("720p"), "720P"),
        Rule::new(&bounded("480p|576p"), "480P"),
    ]
});

static SOURCE: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(&bounded(r"web[-. ]?dl"), "WEB-DL"),
        Rule::new(&bounded("webrip"), "WEBRIP"),
        Rule::new(&bounded("blu[-. ]?ray|remux"), "BLURAY"),
        Rule::new(&bounded("bdrip"), "BDRIP"),
        Rule::new(&bounded("brrip"), "BRRIP"),
        Rule::new(&bounded("hdrip"), "HDRIP"),
        Rule::new(&bounded("dvdrip"), "DVDRIP"),
        Rule::new(&bounded("hdtv"), "HDTV"),
        Rule::new(&bounded("hdcam|cam"), "CAM"),
        Rule::new(&bounded("telesync|hdts|ts"), "TS"),
    ]
});

static CODEC: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(&bounded(r"hevc|[xh][. ]?265"), "HEVC x265"),
        Rule::new(&bounded(r"[xh][. ]?264|avc"), "x264"),
        Rule::new(&bounded("av1"), "AV1"),
        Rule::new(&bounded("vp9"), "VP9"),
        Rule::new(&bounded("xvid|divx|mpeg-?4"), "MPEG4"),
    ]
});

static HDR: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(&format!(r"{L}hdr10(?:\+|plus){R}"), "HDR10+"),
        Rule::new(&bounded(r"dolby[. ]?vision|dovi|dv"), "DV"),
        Rule::new(&bounded("hdr10"), "HDR10"),
        Rule::new(&bounded("hdr"), "HDR"),
    ]
});

static AUDIO: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(&bounded("atmos"), "ATMOS"),
        Rule::new(&bounded("truehd"), "TRUEHD"),
        Rule::new(&bounded(r"dts[-. ]?hd[-. ]?ma"), "DTS-HD MA"),
        Rule::new(&bounded(r"dts[-. ]?hd"), "DTS-HD"),
        Rule::new(&bounded("dts"), "DTS"),
        Rule::new(
            &format!(r"{L}(?:ddp|dd\+|e-?ac-?3)(?:[. ]?[257][. ]?[01])?{R}"),
            "DDP",
        ),
        Rule::new(&bounded(r"ac-?3|dd[. ]?[257][. ]?[01]"), "AC3"),
        Rule::new(&bounded(r"aac(?:[. ]?[1-7][. ]?[01])?"), "AAC"),
        Rule::new(&bounded("opus"), "OPUS"),
    ]
});

static GROUP_TRAILING: LazyLock<Regex> =
    LazyLock::new(|| insensitive(r"-([A-Za-z0-9]+)(?:\.(?:mkv|mp4|avi))?\s*$"));
static GROUP_BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| insensitive(r"\[([A-Za-z0-9][A-Za-z0-9 ._-]*)\]\s*$"));
static SIZE: LazyLock<Regex> =
    LazyLock::new(|| insensitive(r"(\d+(?:[.,]\d+)?)\s*(tib|gib|mib|kib|tb|gb|mb|kb)\b"));

/// Language tokens and the display names they map to, in display order.
const LANGUAGES: &[(&str, &str)] = &[
    ("multi|dual[. -]?audio", "Multi"),
    ("eng|english", "English"),
    ("ita|italian", "Italian"),
    ("fre|french|truefrench|vff|vf2", "French"),
    ("ger|german|deu", "German"),
    ("spa|spanish|esp|castellano|latino", "Spanish"),
    ("por|portuguese|pt-br|dublado", "Portuguese"),
    ("rus|russian", "Russian"),
    ("jap|jpn|japanese", "Japanese"),
    ("kor|korean", "Korean"),
    ("chi|chinese|mandarin", "Chinese"),
    ("hin|hindi", "Hindi"),
    ("ara|arabic", "Arabic"),
    ("pol|polish", "Polish"),
    ("dut|dutch|nld", "Dutch"),
    ("tur|turkish", "Turkish"),
];

static LANGUAGE_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    LANGUAGES
        .iter()
        .map(|(tokens, name)| (insensitive(&bounded(tokens)), *name))
        .collect()
});

impl ReleaseInfo {
    /// Parses `text` into a [`ReleaseInfo`].
    pub fn parse(text: &str) -> Self {
        Self {
            resolution: first_match(&RESOLUTION, text),
            source: first_match(&SOURCE, text),
            codec: first_match(&CODEC, text),
            hdr: first_match(&HDR, text),
            audio: first_match(&AUDIO, text),
            group: parse_group(text),
            size_bytes: parse_size(text),
            languages: parse_languages(text),
        }
    }

    /// Whether any quality-related field was recognised.
    pub fn has_details(&self) -> bool {
        self.resolution.is_some()
            || self.source.is_some()
            || self.codec.is_some()
            || self.hdr.is_some()
            || self.audio.is_some()
            || self.size_bytes.is_some()
    }

    /// Vertical resolution in pixels, if known.
    pub fn height(&self) -> Option<u32> {
        self.resolution
            .as_deref()
            .and_then(|r| r.trim_end_matches('P').parse().ok())
    }
}

/// Tags spelled with a hyphen; their tail is not a release group.
const HYPHENATED_TAGS: &[&str] = &[
    "web-dl", "dts-hd", "ac-3", "e-ac-3", "h-264", "h-265", "x-264", "x-265", "mpeg-4", "dd-5",
    "pt-br",
];

fn parse_group(text: &str) -> Option<String> {
    let line = text.lines().next().unwrap_or_default().trim();
    if let Some(group) = GROUP_BRACKETED.captures(line).and_then(|caps| caps.get(1)) {
        return Some(group.as_str().trim().to_string()).filter(|group| !group.is_empty());
    }

    let group = GROUP_TRAILING.captures(line)?.get(1)?;
    let before = &line[..group.start() - 1];
    let head = before
        .rsplit(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .next()
        .unwrap_or_default();
    let tag = format!("{head}-{}", group.as_str()).to_ascii_lowercase();
    if HYPHENATED_TAGS.iter().any(|known| tag.ends_with(known)) {
        return None;
    }
    Some(group.as_str().to_string())
}

/// Parses the first `<number> <unit>` in `text` into bytes (binary units).
pub fn parse_size(text: &str) -> Option<u64> {
    let caps = SIZE.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().replace(',', ".").parse().ok()?;
    let multiplier: u64 = match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
        "tb" | "tib" => 1 << 40,
        "gb" | "gib" => 1 << 30,
        "mb" | "mib" => 1 << 20,
        "kb" | "kib" => 1 << 10,
        _ => return None,
    };
    Some((value * multiplier as f64).round() as u64)
}

fn parse_languages(text: &str) -> Vec<String> {
    LANGUAGE_RULES
        .iter()
        .filter(|(pattern, _)| pattern.is_match(text))
        .map(|(_, name)| (*name).to_string())
        .collect()
}

/// Formats a byte count the way stream descriptions show it.
pub fn format_size(bytes: u64) -> String {
    const GB: u64 = 1 << 30;
    const MB: u64 = 1 << 20;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}
