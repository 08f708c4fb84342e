//! Centralized configuration for Undertow.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::str::FromStr;
use std::time::Duration;

use crate::torrent::tracker::ValidationMode;

/// Central configuration for all Undertow components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct UndertowConfig {
    /// Tracker health validation
    pub validator: ValidatorConfig,
    /// Swarm scraping
    pub scrape: ScrapeConfig,
    /// Stream aggregation
    pub aggregator: AggregatorConfig,
}

/// Tracker health validation configuration.
///
/// Controls worker pool size, retry policy, per-protocol timeouts, the health
/// cache lifetime and the process-wide UDP budget.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Validation mode used when the caller does not pick one
    pub default_mode: ValidationMode,
    /// Maximum concurrent tracker checks
    pub workers: usize,
    /// Total attempts per check (initial attempt included)
    pub max_attempts: u32,
    /// Backoff before retry `n` is `backoff_base * 2^n`
    pub backoff_base: Duration,
    /// DNS resolution timeout
    pub dns_timeout: Duration,
    /// HEAD/GET timeout in basic mode
    pub http_timeout: Duration,
    /// HEAD/GET timeout for the aggressive second pass
    pub aggressive_http_timeout: Duration,
    /// BEP 15 connect response timeout
    pub udp_timeout: Duration,
    /// Lifetime of a cached health verdict
    pub health_ttl: Duration,
    /// Maximum health records kept in memory
    pub health_capacity: usize,
    /// UDP checks allowed per window
    pub udp_budget: u32,
    /// Length of the UDP budget window
    pub udp_window: Duration,
    /// User agent for HTTP probes
    pub user_agent: &'static str,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            default_mode: ValidationMode::Basic,
            workers: 8,
            max_attempts: 3,
            backoff_base: Duration::from_millis(300),
            dns_timeout: Duration::from_millis(2000),
            http_timeout: Duration::from_millis(2500),
            aggressive_http_timeout: Duration::from_millis(4000),
            udp_timeout: Duration::from_millis(3000),
            health_ttl: Duration::from_secs(24 * 60 * 60),
            health_capacity: 4096,
            udp_budget: 20,
            udp_window: Duration::from_secs(60),
            user_agent: "undertow/0.1.0",
        }
    }
}

/// BEP 48 scrape configuration.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Timeout applied to each announce URL
    pub timeout: Duration,
    /// User agent for scrape requests
    pub user_agent: &'static str,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            user_agent: "undertow/0.1.0",
        }
    }
}

/// Stream aggregation configuration.
///
/// Controls result caching, provider budgets and swarm enrichment policy.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Freshness lifetime of an aggregated result list
    pub cache_ttl: Duration,
    /// How long past `cache_ttl` a stale list is still served
    pub stale_window: Duration,
    /// Maximum cached result lists
    pub cache_capacity: usize,
    /// Budget handed to each provider fetch
    pub provider_timeout: Duration,
    /// Budget for optional provider liveness probes
    pub probe_timeout: Duration,
    /// Number of top ranked candidates eligible for swarm enrichment
    pub swarm_top_n: usize,
    /// Scrape budget per enriched candidate
    pub swarm_timeout: Duration,
    /// Only enrich candidates lacking seed/leech data
    pub swarm_only_missing: bool,
    /// Fall back to the provider description when nothing was parsed
    pub require_details: bool,
    /// Label shown as the stream name prefix
    pub label: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(90),
            stale_window: Duration::from_secs(10 * 60),
            cache_capacity: 512,
            provider_timeout: Duration::from_secs(8),
            probe_timeout: Duration::from_millis(1500),
            swarm_top_n: 5,
            swarm_timeout: Duration::from_millis(2000),
            swarm_only_missing: true,
            require_details: false,
            label: "Undertow".to_string(),
        }
    }
}

impl UndertowConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Validator overrides
        if let Some(mode) = parse_var::<ValidationMode>(&lookup, "UNDERTOW_VALIDATION_MODE") {
            config.validator.default_mode = mode;
        }
        if let Some(workers) = parse_var::<usize>(&lookup, "UNDERTOW_VALIDATION_WORKERS") {
            config.validator.workers = workers.max(1);
        }
        if let Some(budget) = parse_var::<u32>(&lookup, "UNDERTOW_UDP_BUDGET") {
            config.validator.udp_budget = budget;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "UNDERTOW_UDP_TIMEOUT_MS") {
            config.validator.udp_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "UNDERTOW_HTTP_TIMEOUT_MS") {
            config.validator.http_timeout = Duration::from_millis(ms);
        }

        // Scrape overrides
        if let Some(ms) = parse_var::<u64>(&lookup, "UNDERTOW_SCRAPE_TIMEOUT_MS") {
            config.scrape.timeout = Duration::from_millis(ms);
        }

        // Aggregator overrides
        if let Some(secs) = parse_var::<u64>(&lookup, "UNDERTOW_CACHE_TTL_SECS") {
            config.aggregator.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "UNDERTOW_STALE_WINDOW_SECS") {
            config.aggregator.stale_window = Duration::from_secs(secs);
        }
        if let Some(top_n) = parse_var::<usize>(&lookup, "UNDERTOW_SWARM_TOP_N") {
            config.aggregator.swarm_top_n = top_n;
        }
        if let Some(flag) = parse_var::<bool>(&lookup, "UNDERTOW_REQUIRE_DETAILS") {
            config.aggregator.require_details = flag;
        }
        if let Some(label) = lookup("UNDERTOW_LABEL").filter(|l| !l.trim().is_empty()) {
            config.aggregator.label = label.trim().to_string();
        }

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}
