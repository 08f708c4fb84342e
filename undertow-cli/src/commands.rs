//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use serde::Serialize;
use tokio::fs;
use tokio::sync::mpsc;
use tracing::info;
use undertow_core::config::UndertowConfig;
use undertow_core::{
    InfoHash, ReleaseInfo, SwarmScraper, TrackerValidator, ValidationMode, ValidationProgress,
    magnet,
};
use undertow_search::{
    AddonProvider, AggregateOptions, ContentType, FixedProvider, SortConfig, SortDirection,
    SortField, StreamAggregator, StreamCandidate, StreamProvider, TrackerReport,
};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check tracker reachability and print the healthy ones
    Validate {
        /// Tracker announce URLs
        trackers: Vec<String>,
        /// File with one tracker URL per line
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Validation mode
        #[arg(short, long, value_enum)]
        mode: Option<ValidationMode>,
        /// Stop after this many healthy trackers (0 = no limit)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Print a line per completed check
        #[arg(long)]
        progress: bool,
    },
    /// Fetch seeders and leechers from HTTP trackers
    Scrape {
        /// Info hash (40 hex or 32 base32 characters)
        info_hash: String,
        /// Announce URLs to try in order
        #[arg(required = true)]
        announce: Vec<String>,
    },
    /// Parse quality details out of a release title
    Parse {
        /// Release title
        title: String,
    },
    /// Magnet URI helpers
    Magnet {
        #[command(subcommand)]
        action: MagnetAction,
    },
    /// Aggregate streams for a content id
    Aggregate {
        /// `movie` or `series`
        content_type: ContentType,
        /// Content id, `tt1234567` or `tt1234567:1:2`
        id: String,
        /// Base URL of a stream addon (repeatable)
        #[arg(long = "addon")]
        addons: Vec<String>,
        /// JSON file with an array of stream candidates
        #[arg(long)]
        candidates: Option<PathBuf>,
        /// Tracker URL to attach (repeatable)
        #[arg(long = "tracker")]
        trackers: Vec<String>,
        /// Validation mode for the attached trackers
        #[arg(short, long, value_enum)]
        mode: Option<ValidationMode>,
        /// Healthy tracker limit handed to validation (0 = no limit)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Comma separated sort fields
        #[arg(long, default_value = "resolution,peers,size")]
        sort: String,
        /// Sort direction, `asc` or `desc`
        #[arg(long, default_value = "desc")]
        direction: SortDirection,
        /// Trackers attached per magnet (0 = all)
        #[arg(long, default_value = "0")]
        max_trackers: usize,
        /// Skip addons whose manifest is unreachable
        #[arg(long)]
        probe: bool,
        /// Do not scrape swarm statistics
        #[arg(long)]
        no_swarm: bool,
    },
}

/// Magnet subcommands
#[derive(Subcommand)]
pub enum MagnetAction {
    /// Strip trackers for comparison
    Normalize {
        /// Magnet URI
        magnet: String,
    },
    /// Add trackers to a magnet
    Append {
        /// Magnet URI
        magnet: String,
        /// Trackers to add
        trackers: Vec<String>,
    },
    /// Build a magnet from an info hash
    Build {
        /// Info hash (40 hex or 32 base32 characters)
        info_hash: String,
        /// Display name
        #[arg(short, long, default_value = "")]
        name: String,
        /// Trackers to attach
        trackers: Vec<String>,
    },
    /// Show the hash, name and trackers of a magnet
    Inspect {
        /// Magnet URI
        magnet: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the failure of the command that ran
pub async fn handle_command(command: Commands) -> Result<()> {
    let config = UndertowConfig::from_env();
    match command {
        Commands::Validate {
            trackers,
            file,
            mode,
            limit,
            progress,
        } => {
            let urls = collect_trackers(trackers, file).await?;
            let mode = mode.unwrap_or(config.validator.default_mode);
            validate_trackers(config, &urls, mode, limit, progress).await
        }
        Commands::Scrape {
            info_hash,
            announce,
        } => scrape_swarm(config, &info_hash, &announce).await,
        Commands::Parse { title } => print_json(&ReleaseInfo::parse(&title)),
        Commands::Magnet { action } => handle_magnet(action),
        Commands::Aggregate {
            content_type,
            id,
            addons,
            candidates,
            trackers,
            mode,
            limit,
            sort,
            direction,
            max_trackers,
            probe,
            no_swarm,
        } => {
            let providers = build_providers(addons, candidates).await?;
            let sort = SortConfig {
                fields: parse_sort_fields(&sort)?,
                direction,
            };
            let mode = mode.unwrap_or(config.validator.default_mode);
            let validator = TrackerValidator::new(config.validator.clone());
            let healthy = validator.filter_by_health(&trackers, mode, limit).await;
            info!("Attaching {} of {} trackers ({mode})", healthy.len(), trackers.len());

            let options = AggregateOptions {
                sort,
                max_trackers,
                probe_providers: probe,
                enrich_swarm: !no_swarm,
                tracker_report: TrackerReport {
                    mode,
                    limit,
                    total: trackers.len(),
                },
            };
            let aggregator = StreamAggregator::from_config(&config);
            let streams = aggregator
                .aggregate(content_type, &id, &providers, &healthy, &options)
                .await;
            print_json(&streams)
        }
    }
}

/// Validate trackers and print the healthy list as JSON
///
/// # Errors
/// - Output could not be serialized
pub async fn validate_trackers(
    config: UndertowConfig,
    urls: &[String],
    mode: ValidationMode,
    limit: usize,
    progress: bool,
) -> Result<()> {
    let validator = TrackerValidator::new(config.validator);

    let healthy = if progress {
        let (tx, mut rx) = mpsc::unbounded_channel::<ValidationProgress>();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let verdict = if event.ok { "ok" } else { "FAIL" };
                eprintln!(
                    "[{}/{}] {verdict} {} ({} healthy)",
                    event.checked, event.total, event.url, event.healthy
                );
            }
        });
        let healthy = validator
            .filter_by_health_with_progress(urls, mode, limit, Some(&tx))
            .await;
        drop(tx);
        printer.await.context("progress printer panicked")?;
        healthy
    } else {
        validator.filter_by_health(urls, mode, limit).await
    };

    eprintln!("{} of {} trackers healthy ({mode})", healthy.len(), urls.len());
    print_json(&healthy)
}

/// Scrape swarm statistics for one info hash
///
/// # Errors
/// - Invalid info hash
/// - No announce URL answered with usable statistics
pub async fn scrape_swarm(config: UndertowConfig, info_hash: &str, announce: &[String]) -> Result<()> {
    let hash = InfoHash::parse(info_hash)?;
    let scraper = SwarmScraper::new(&config.scrape);

    for url in announce {
        match scraper.scrape_one(&hash, url, config.scrape.timeout).await {
            Ok(stats) => return print_json(&stats),
            Err(e) => eprintln!("{url}: {e}"),
        }
    }
    bail!("no tracker returned statistics for {hash}")
}

fn handle_magnet(action: MagnetAction) -> Result<()> {
    let output = match action {
        MagnetAction::Normalize { magnet } => magnet::normalize(&magnet),
        MagnetAction::Append { magnet, trackers } => magnet::append_trackers(&magnet, &trackers),
        MagnetAction::Build {
            info_hash,
            name,
            trackers,
        } => magnet::build(&info_hash, &name, &trackers),
        MagnetAction::Inspect { magnet } => {
            return print_json(&MagnetSummary {
                info_hash: magnet::info_hash_from_magnet(&magnet),
                name: magnet::display_name_from_magnet(&magnet),
                trackers: magnet::trackers_from_magnet(&magnet),
            });
        }
    };

    if output.is_empty() {
        bail!("input cannot be represented as a magnet URI");
    }
    println!("{output}");
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MagnetSummary {
    info_hash: Option<String>,
    name: Option<String>,
    trackers: Vec<String>,
}

async fn collect_trackers(mut urls: Vec<String>, file: Option<PathBuf>) -> Result<Vec<String>> {
    if let Some(path) = file {
        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        urls.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    if urls.is_empty() {
        bail!("no trackers given");
    }
    Ok(urls)
}

async fn build_providers(
    addons: Vec<String>,
    candidates: Option<PathBuf>,
) -> Result<Vec<Arc<dyn StreamProvider>>> {
    let mut providers: Vec<Arc<dyn StreamProvider>> = Vec::new();
    for (index, base_url) in addons.into_iter().enumerate() {
        providers.push(Arc::new(AddonProvider::new(format!("addon{}", index + 1), base_url)));
    }

    if let Some(path) = candidates {
        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let streams: Vec<StreamCandidate> = serde_json::from_str(&text)
            .with_context(|| format!("parsing candidates in {}", path.display()))?;
        let name = path
            .file_stem()
            .map_or_else(|| "file".to_string(), |stem| stem.to_string_lossy().into_owned());
        providers.push(Arc::new(FixedProvider::new(name, streams)));
    }

    if providers.is_empty() {
        bail!("give at least one --addon or --candidates source");
    }
    Ok(providers)
}

fn parse_sort_fields(raw: &str) -> Result<Vec<SortField>> {
    raw.split(',')
        .filter(|field| !field.trim().is_empty())
        .map(|field| field.parse::<SortField>().map_err(anyhow::Error::msg))
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sort_fields() {
        assert_eq!(
            parse_sort_fields("resolution, seeds,size").unwrap(),
            vec![SortField::Resolution, SortField::Peers, SortField::Size]
        );
        assert!(parse_sort_fields("resolution,colour").is_err());
    }

    #[tokio::test]
    async fn test_collect_trackers_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trackers.txt");
        std::fs::write(&path, "# list\nudp://a:1\n\nhttp://b/announce\n").unwrap();

        let urls = collect_trackers(vec!["udp://c:2".into()], Some(path))
            .await
            .unwrap();
        assert_eq!(urls, vec!["udp://c:2", "udp://a:1", "http://b/announce"]);
        assert!(collect_trackers(Vec::new(), None).await.is_err());
    }

    #[tokio::test]
    async fn test_candidates_file_becomes_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        std::fs::write(
            &path,
            r#"[{"title": "Movie 1080p", "infoHash": "c12fe1c06bba254a9dc9f519b335aa7c1367a88a"}]"#,
        )
        .unwrap();

        let providers = build_providers(Vec::new(), Some(path)).await.unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name(), "local");
        assert!(build_providers(Vec::new(), None).await.is_err());
    }

    #[test]
    fn test_magnet_build_rejects_bad_hash() {
        let action = MagnetAction::Build {
            info_hash: "nope".into(),
            name: String::new(),
            trackers: Vec::new(),
        };
        assert!(handle_magnet(action).is_err());
    }
}
