//! Validation modes, health records and progress events

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TrackerError;

/// How thoroughly trackers are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Every URL is healthy, no network I/O
    Off,
    /// DNS for every scheme plus HEAD/GET for http(s)
    Basic,
    /// BEP 15 connect for udp, longer HTTP timeout for http(s)
    Aggressive,
}

impl ValidationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMode::Off => "off",
            ValidationMode::Basic => "basic",
            ValidationMode::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(ValidationMode::Off),
            "basic" => Ok(ValidationMode::Basic),
            "aggressive" => Ok(ValidationMode::Aggressive),
            other => Err(format!("unknown validation mode: {other}")),
        }
    }
}

/// Outcome of the latest check of one tracker URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub url: String,
    pub ok: bool,
    pub checked_at: DateTime<Utc>,
    /// Error tag of the last failed attempt, if the check failed
    pub last_error: Option<String>,
}

impl HealthRecord {
    pub fn healthy(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ok: true,
            checked_at: Utc::now(),
            last_error: None,
        }
    }

    pub fn unhealthy(url: impl Into<String>, error: &TrackerError) -> Self {
        Self {
            url: url.into(),
            ok: false,
            checked_at: Utc::now(),
            last_error: Some(error.tag().to_string()),
        }
    }
}

/// Running totals sent after every completed check of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationProgress {
    /// URL whose check just completed
    pub url: String,
    pub ok: bool,
    /// Checks completed so far in this batch
    pub checked: usize,
    /// Healthy trackers found so far in this batch
    pub healthy: usize,
    /// Number of distinct URLs submitted
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Aggressive".parse(), Ok(ValidationMode::Aggressive));
        assert_eq!(" basic ".parse(), Ok(ValidationMode::Basic));
        assert_eq!("off".parse(), Ok(ValidationMode::Off));
        assert!("paranoid".parse::<ValidationMode>().is_err());
        assert_eq!(ValidationMode::Aggressive.to_string(), "aggressive");
    }

    #[test]
    fn test_unhealthy_record_carries_tag() {
        let record = HealthRecord::unhealthy(
            "udp://t:80",
            &TrackerError::Udp {
                url: "udp://t:80".into(),
                reason: "timeout".into(),
            },
        );
        assert!(!record.ok);
        assert_eq!(record.last_error.as_deref(), Some("udp"));
    }
}
