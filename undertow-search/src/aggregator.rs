//! Multi-provider stream aggregation.
//!
//! Pipeline per request: cache lookup, optional provider probing, concurrent
//! all-settled fetch, dedup, magnet construction with healthy trackers,
//! best-effort swarm enrichment, description building, ranking, caching and
//! one telemetry event.

use std::sync::Arc;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use undertow_core::cache::{CacheStore, Freshness, MemoryStore, StaleCache};
use undertow_core::config::{AggregatorConfig, UndertowConfig};
use undertow_core::{ReleaseInfo, SwarmScraper, SwarmSource, SwarmStats, ValidationMode, magnet};

use crate::dedup::{dedupe, identity_hash};
use crate::description::{DescriptionParts, build_description};
use crate::errors::AggregationError;
use crate::providers::StreamProvider;
use crate::ranking::{RankInput, SortConfig, sort_by_config};
use crate::telemetry::{TelemetryEvent, TelemetrySink, TracingTelemetry};
use crate::types::{AggregatedStream, BehaviorHints, ContentType, StreamCandidate};

/// How the attached tracker list was produced, for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerReport {
    /// Validation mode the trackers went through
    pub mode: ValidationMode,
    /// Limit requested from validation (0 = none)
    pub limit: usize,
    /// Trackers submitted before validation
    pub total: usize,
}

impl Default for TrackerReport {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Off,
            limit: 0,
            total: 0,
        }
    }
}

/// Per-request aggregation options.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Ranking fields and direction
    pub sort: SortConfig,
    /// Trackers attached per magnet (0 = all)
    pub max_trackers: usize,
    /// Skip providers whose liveness probe fails
    pub probe_providers: bool,
    /// Scrape swarm statistics for the top candidates
    pub enrich_swarm: bool,
    /// Provenance of the tracker list
    pub tracker_report: TrackerReport,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            sort: SortConfig::default(),
            max_trackers: 0,
            probe_providers: false,
            enrich_swarm: true,
            tracker_report: TrackerReport::default(),
        }
    }
}

/// Splits `tt123:1:2` into the base id, season and episode.
pub fn parse_series_id(id: &str) -> (&str, Option<u32>, Option<u32>) {
    let mut parts = id.split(':');
    let base = parts.next().unwrap_or(id);
    let season = parts.next().and_then(|s| s.parse().ok());
    let episode = parts.next().and_then(|e| e.parse().ok());
    (base, season, episode)
}

/// Candidate that resolved to an info hash and magnet.
struct Resolved {
    candidate: StreamCandidate,
    info: ReleaseInfo,
    hash: String,
    magnet: String,
    swarm: Option<SwarmStats>,
}

impl Resolved {
    fn seeds(&self) -> Option<u32> {
        self.swarm.map(|s| s.seeds).or(self.candidate.seeds)
    }

    fn size_bytes(&self) -> Option<u64> {
        self.candidate.size_bytes.or(self.info.size_bytes)
    }

    fn languages(&self) -> &[String] {
        if self.candidate.languages.is_empty() {
            &self.info.languages
        } else {
            &self.candidate.languages
        }
    }

    fn rank_input(&self) -> RankInput<'_> {
        RankInput {
            info: Some(&self.info),
            seeds: self.seeds(),
            size_bytes: self.size_bytes(),
            languages: self.languages(),
        }
    }
}

/// Merges, ranks and caches streams from many providers.
pub struct StreamAggregator {
    config: AggregatorConfig,
    cache: StaleCache<Vec<AggregatedStream>>,
    swarm: Option<Arc<dyn SwarmSource>>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl StreamAggregator {
    /// Creates an aggregator with an in-memory LRU result cache, HTTP swarm
    /// scraping with the default [`ScrapeConfig`](undertow_core::config::ScrapeConfig)
    /// and `tracing` telemetry.
    pub fn new(config: AggregatorConfig) -> Self {
        let store = Arc::new(MemoryStore::with_capacity(config.cache_capacity));
        Self {
            cache: StaleCache::new(store, config.cache_ttl, config.stale_window),
            swarm: Some(Arc::new(SwarmScraper::default())),
            telemetry: Arc::new(TracingTelemetry),
            config,
        }
    }

    /// Like [`new`](Self::new), with the swarm scraper built from `config.scrape`.
    pub fn from_config(config: &UndertowConfig) -> Self {
        Self::new(config.aggregator.clone())
            .with_swarm_source(Some(Arc::new(SwarmScraper::new(&config.scrape))))
    }

    /// Replaces the result cache backing store.
    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore<Vec<AggregatedStream>>>) -> Self {
        self.cache = StaleCache::new(store, self.config.cache_ttl, self.config.stale_window);
        self
    }

    /// Uses `swarm` for enrichment; `None` disables it.
    pub fn with_swarm_source(mut self, swarm: Option<Arc<dyn SwarmSource>>) -> Self {
        self.swarm = swarm;
        self
    }

    /// Sends telemetry to `telemetry`.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Aggregates streams for `id` from `providers`.
    ///
    /// Never fails: unreachable providers and malformed candidates only
    /// shrink the result, and an empty list means nothing is available.
    /// `trackers` should already be validated; the first `max_trackers` of
    /// them are attached to every magnet.
    pub async fn aggregate(
        &self,
        content_type: ContentType,
        id: &str,
        providers: &[Arc<dyn StreamProvider>],
        trackers: &[String],
        options: &AggregateOptions,
    ) -> Vec<AggregatedStream> {
        let key = cache_key(content_type, id, providers, &options.sort);
        if let Some((streams, freshness)) = self.cache.lookup(&key) {
            match freshness {
                Freshness::Fresh => debug!("Serving cached streams for {key}"),
                Freshness::Stale => debug!("Serving stale cached streams for {key}"),
            }
            return streams;
        }

        let live = self.live_providers(providers, options.probe_providers).await;
        let candidates = self.fetch_all(&live, content_type, id).await;
        let fetched = candidates.len();
        let candidates = dedupe(candidates);

        let attach = match options.max_trackers {
            0 => trackers,
            max => &trackers[..max.min(trackers.len())],
        };
        let mut resolved: Vec<Resolved> = candidates
            .into_iter()
            .filter_map(|candidate| resolve(candidate, attach))
            .collect();

        sort_by_config(&mut resolved, &options.sort, Resolved::rank_input);
        if options.enrich_swarm && self.enrich(&mut resolved).await {
            sort_by_config(&mut resolved, &options.sort, Resolved::rank_input);
        }

        let streams: Vec<AggregatedStream> = resolved.iter().map(|r| self.to_stream(r)).collect();
        info!(
            "Aggregated {} streams for {content_type} {id} ({fetched} fetched from {} providers)",
            streams.len(),
            live.len()
        );

        self.cache.insert(key, streams.clone());
        self.emit_telemetry(content_type, id, &resolved, attach.len(), &options.tracker_report);
        streams
    }

    async fn live_providers(
        &self,
        providers: &[Arc<dyn StreamProvider>],
        probe: bool,
    ) -> Vec<Arc<dyn StreamProvider>> {
        if !probe {
            return providers.to_vec();
        }

        let limit = self.config.probe_timeout;
        let verdicts = join_all(providers.iter().map(|provider| async move {
            // A hung probe counts as dead.
            timeout(limit, provider.probe(limit))
                .await
                .unwrap_or(Some(false))
        }))
        .await;

        providers
            .iter()
            .zip(verdicts)
            .filter_map(|(provider, alive)| {
                if alive == Some(false) {
                    debug!("Skipping provider {} after failed probe", provider.name());
                    None
                } else {
                    Some(Arc::clone(provider))
                }
            })
            .collect()
    }

    async fn fetch_all(
        &self,
        providers: &[Arc<dyn StreamProvider>],
        content_type: ContentType,
        id: &str,
    ) -> Vec<StreamCandidate> {
        let limit = self.config.provider_timeout;
        let results = join_all(providers.iter().map(|provider| async move {
            let outcome = match timeout(limit, provider.fetch_streams(content_type, id, limit)).await
            {
                Ok(result) => result,
                Err(_) => Err(AggregationError::ProviderTimeout {
                    provider: provider.name().to_string(),
                    timeout_ms: limit.as_millis(),
                }),
            };

            match outcome {
                Ok(response) if response.ok => {
                    debug!("{} returned {} candidates", provider.name(), response.streams.len());
                    response
                        .streams
                        .into_iter()
                        .map(|mut candidate| {
                            if candidate.provider.is_empty() {
                                candidate.provider = provider.name().to_string();
                            }
                            candidate
                        })
                        .collect()
                }
                Ok(_) => {
                    warn!("Provider {} reported failure", provider.name());
                    Vec::new()
                }
                Err(e) => {
                    warn!("Provider fetch failed ({}): {e}", e.tag());
                    Vec::new()
                }
            }
        }))
        .await;

        results.into_iter().flatten().collect()
    }

    /// Scrapes swarm statistics for the top candidates. Returns whether any
    /// candidate gained statistics.
    async fn enrich(&self, resolved: &mut [Resolved]) -> bool {
        let Some(swarm) = &self.swarm else {
            return false;
        };
        let limit = self.config.swarm_timeout;
        let only_missing = self.config.swarm_only_missing;

        let targets: Vec<(usize, String, Vec<String>)> = resolved
            .iter()
            .enumerate()
            .take(self.config.swarm_top_n)
            .filter(|(_, r)| !only_missing || r.candidate.seeds.is_none())
            .map(|(index, r)| (index, r.hash.clone(), magnet::trackers_from_magnet(&r.magnet)))
            .collect();
        if targets.is_empty() {
            return false;
        }

        let stats = join_all(targets.iter().map(|(_, hash, announce)| async move {
            timeout(limit, swarm.scrape_swarm(hash, announce, limit))
                .await
                .ok()
                .flatten()
        }))
        .await;

        let mut enriched = false;
        for ((index, _, _), stats) in targets.into_iter().zip(stats) {
            if let Some(stats) = stats {
                resolved[index].swarm = Some(stats);
                enriched = true;
            }
        }
        enriched
    }

    fn to_stream(&self, resolved: &Resolved) -> AggregatedStream {
        let label = &self.config.label;
        let candidate = &resolved.candidate;
        let resolution = resolved.info.resolution.as_deref();

        let name = match resolution {
            Some(resolution) => format!("{label} {resolution}"),
            None => label.clone(),
        };

        let title = first_line(&candidate.title).to_string();
        let description = build_description(
            &DescriptionParts {
                title: &title,
                info: &resolved.info,
                swarm: resolved.swarm,
                seeds: candidate.seeds,
                size_bytes: resolved.size_bytes(),
                languages: resolved.languages(),
                provider: &candidate.provider,
                original: candidate.description.as_deref(),
            },
            self.config.require_details,
        );

        let mut sources: Vec<String> = magnet::trackers_from_magnet(&resolved.magnet)
            .into_iter()
            .map(|tracker| format!("tracker:{tracker}"))
            .collect();
        sources.push(format!("dht:{}", resolved.hash));

        let provided = candidate.behavior_hints.clone().unwrap_or_default();
        let behavior_hints = BehaviorHints {
            binge_group: provided.binge_group.or_else(|| {
                Some(format!("{}-{}", label, resolution.unwrap_or("unknown")).to_lowercase())
            }),
            video_size: provided.video_size.or(resolved.size_bytes()),
            filename: provided.filename,
        };

        AggregatedStream {
            name,
            title,
            description,
            info_hash: Some(resolved.hash.clone()),
            url: Some(resolved.magnet.clone()),
            sources,
            behavior_hints,
        }
    }

    fn emit_telemetry(
        &self,
        content_type: ContentType,
        id: &str,
        resolved: &[Resolved],
        healthy: usize,
        report: &TrackerReport,
    ) {
        let (base, season, episode) = match content_type {
            ContentType::Series => parse_series_id(id),
            ContentType::Movie => (id, None, None),
        };
        let top = resolved.first();

        let title = match (season, episode) {
            (Some(season), Some(episode)) => format!("{base} S{season:02}E{episode:02}"),
            _ => top
                .map(|r| first_line(&r.candidate.title))
                .filter(|t| !t.is_empty())
                .unwrap_or(base)
                .to_string(),
        };

        self.telemetry.push(TelemetryEvent {
            mode: report.mode.to_string(),
            limit: report.limit,
            healthy,
            total: report.total.max(healthy),
            source: top.map_or_else(|| "none".to_string(), |r| r.candidate.provider.clone()),
            content_type: content_type.to_string(),
            id: id.to_string(),
            title,
            season,
            episode,
        });
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

/// Cache key over the provider set, content and sort configuration.
fn cache_key(
    content_type: ContentType,
    id: &str,
    providers: &[Arc<dyn StreamProvider>],
    sort: &SortConfig,
) -> String {
    let mut names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
    names.sort_unstable();
    names.dedup();
    format!("{}|{content_type}|{id}|{sort}", names.join(","))
}

/// Attaches trackers, or drops the candidate when no info hash identifies it.
fn resolve(candidate: StreamCandidate, trackers: &[String]) -> Option<Resolved> {
    // A magnet without a btih hash names no torrent.
    let Some(hash) = identity_hash(&candidate) else {
        let e = AggregationError::MalformedCandidate {
            provider: candidate.provider.clone(),
            reason: format!("no info hash for {:?}", first_line(&candidate.title)),
        };
        debug!("Dropping candidate ({}): {e}", e.tag());
        return None;
    };

    let existing = candidate
        .url
        .as_deref()
        .filter(|url| magnet::info_hash_from_magnet(url).is_some());
    let magnet = match existing {
        Some(url) => magnet::append_trackers(url, trackers),
        None => magnet::build(&hash, first_line(&candidate.title), trackers),
    };

    let text = match &candidate.description {
        Some(description) => format!("{}\n{description}", candidate.title),
        None => candidate.title.clone(),
    };
    Some(Resolved {
        info: ReleaseInfo::parse(&text),
        candidate,
        hash,
        magnet,
        swarm: None,
    })
}
