//! Undertow Search - Multi-provider stream aggregation
//!
//! Fans a content request out to every configured stream provider, merges
//! the answers by torrent identity, attaches healthy trackers to each magnet,
//! enriches the best candidates with live swarm counts and ranks the result.

#![deny(missing_docs)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]

pub mod aggregator;
pub mod dedup;
pub mod description;
pub mod errors;
pub mod providers;
pub mod ranking;
pub mod telemetry;
pub mod types;

// Re-export main types
pub use aggregator::{AggregateOptions, StreamAggregator, TrackerReport, parse_series_id};
pub use errors::AggregationError;
pub use providers::{AddonProvider, FixedProvider, ProviderResponse, StreamProvider};
pub use ranking::{SortConfig, SortDirection, SortField};
pub use telemetry::{ChannelTelemetry, RecordingTelemetry, TelemetryEvent, TelemetrySink, TracingTelemetry};
pub use types::{AggregatedStream, BehaviorHints, ContentType, StreamCandidate};

/// Convenience type alias for Results with AggregationError.
pub type Result<T> = std::result::Result<T, AggregationError>;
