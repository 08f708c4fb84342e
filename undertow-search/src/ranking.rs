//! Multi-field stream ranking.
//!
//! Every field maps a candidate to an optional sort key. Fields are compared
//! in configured order, each one breaking ties of the previous. A missing key
//! is "unmeasured" and sorts after every measured one in both directions.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use undertow_core::ReleaseInfo;

/// Field streams can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    /// Vertical resolution in pixels
    Resolution,
    /// Seeder count
    Peers,
    /// Size in bytes
    Size,
    /// AV1 > HEVC > x264 > VP9 > MPEG4
    Codec,
    /// BluRay > WEB-DL > WEBRip > HDRip > HDTV > DVDRip > CAM/TS
    Source,
    /// Dolby Vision > HDR10+ > HDR10/HDR
    Hdr,
    /// Atmos/TrueHD > DTS-HD > DTS > DDP > AC3 > AAC/Opus
    Audio,
    /// First language, alphabetical
    Language,
}

impl SortField {
    /// Name used in configuration and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Resolution => "resolution",
            SortField::Peers => "peers",
            SortField::Size => "size",
            SortField::Codec => "codec",
            SortField::Source => "source",
            SortField::Hdr => "hdr",
            SortField::Audio => "audio",
            SortField::Language => "language",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resolution" | "quality" => Ok(SortField::Resolution),
            "peers" | "seeds" | "seeders" => Ok(SortField::Peers),
            "size" => Ok(SortField::Size),
            "codec" => Ok(SortField::Codec),
            "source" => Ok(SortField::Source),
            "hdr" => Ok(SortField::Hdr),
            "audio" => Ok(SortField::Audio),
            "language" | "lang" => Ok(SortField::Language),
            other => Err(format!("unknown sort field: {other}")),
        }
    }
}

/// Sort direction applied to every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Smallest first
    Asc,
    /// Largest first
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sort direction: {other}")),
        }
    }
}

/// Field order and direction for ranking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortConfig {
    /// Fields in priority order
    pub fields: Vec<SortField>,
    /// Direction shared by all fields
    pub direction: SortDirection,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            fields: vec![SortField::Resolution, SortField::Peers, SortField::Size],
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for SortConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields.iter().map(SortField::as_str).collect();
        let direction = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{}:{direction}", fields.join(","))
    }
}

/// What ranking looks at for one candidate.
#[derive(Debug, Clone, Default)]
pub struct RankInput<'a> {
    /// Parsed release details
    pub info: Option<&'a ReleaseInfo>,
    /// Seeder count
    pub seeds: Option<u32>,
    /// Size in bytes
    pub size_bytes: Option<u64>,
    /// Languages, most relevant first
    pub languages: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Number(i64),
    Text(String),
}

fn codec_rank(codec: &str) -> Option<i64> {
    match codec {
        "AV1" => Some(5),
        "HEVC x265" => Some(4),
        "x264" => Some(3),
        "VP9" => Some(2),
        "MPEG4" => Some(1),
        _ => None,
    }
}

fn source_rank(source: &str) -> Option<i64> {
    match source {
        "BLURAY" | "BDRIP" | "BRRIP" => Some(7),
        "WEB-DL" => Some(6),
        "WEBRIP" => Some(5),
        "HDRIP" => Some(4),
        "HDTV" => Some(3),
        "DVDRIP" => Some(2),
        "CAM" | "TS" => Some(1),
        _ => None,
    }
}

fn hdr_rank(hdr: &str) -> Option<i64> {
    match hdr {
        "DV" => Some(3),
        "HDR10+" => Some(2),
        "HDR10" | "HDR" => Some(1),
        _ => None,
    }
}

fn audio_rank(audio: &str) -> Option<i64> {
    match audio {
        "ATMOS" | "TRUEHD" => Some(6),
        "DTS-HD MA" | "DTS-HD" => Some(5),
        "DTS" => Some(4),
        "DDP" => Some(3),
        "AC3" => Some(2),
        "AAC" | "OPUS" => Some(1),
        _ => None,
    }
}

fn key(field: SortField, input: &RankInput<'_>) -> Option<SortKey> {
    let info = input.info;
    let ranked = |value: Option<&String>, rank: fn(&str) -> Option<i64>| {
        value.and_then(|v| rank(v)).map(SortKey::Number)
    };

    match field {
        SortField::Resolution => info
            .and_then(ReleaseInfo::height)
            .map(|h| SortKey::Number(i64::from(h))),
        SortField::Peers => input.seeds.map(|s| SortKey::Number(i64::from(s))),
        SortField::Size => input
            .size_bytes
            .map(|s| SortKey::Number(i64::try_from(s).unwrap_or(i64::MAX))),
        SortField::Codec => ranked(info.and_then(|i| i.codec.as_ref()), codec_rank),
        SortField::Source => ranked(info.and_then(|i| i.source.as_ref()), source_rank),
        SortField::Hdr => ranked(info.and_then(|i| i.hdr.as_ref()), hdr_rank),
        SortField::Audio => ranked(info.and_then(|i| i.audio.as_ref()), audio_rank),
        SortField::Language => input
            .languages
            .first()
            .map(|lang| SortKey::Text(lang.to_lowercase())),
    }
}

/// Compares two candidates under `config`.
pub fn compare(config: &SortConfig, a: &RankInput<'_>, b: &RankInput<'_>) -> Ordering {
    for &field in &config.fields {
        let ordering = match (key(field, a), key(field, b)) {
            (Some(x), Some(y)) => match config.direction {
                SortDirection::Asc => x.cmp(&y),
                SortDirection::Desc => y.cmp(&x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable sort of `items` by the inputs `rank_input` derives from them.
pub fn sort_by_config<T, F>(items: &mut [T], config: &SortConfig, rank_input: F)
where
    F: for<'a> Fn(&'a T) -> RankInput<'a>,
{
    items.sort_by(|a, b| compare(config, &rank_input(a), &rank_input(b)));
}
