//! Stream provider contract and the bundled implementations.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::AggregationError;
use crate::types::{ContentType, StreamCandidate};

pub mod addon;
pub mod fixed;

pub use addon::AddonProvider;
pub use fixed::FixedProvider;

/// Answer of a single provider fetch.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    /// Whether the provider considers the fetch successful
    pub ok: bool,
    /// Name of the answering provider
    pub provider: String,
    /// Candidates offered
    pub streams: Vec<StreamCandidate>,
}

impl ProviderResponse {
    /// Successful response carrying `streams`.
    pub fn ok(provider: impl Into<String>, streams: Vec<StreamCandidate>) -> Self {
        Self {
            ok: true,
            provider: provider.into(),
            streams,
        }
    }
}

/// Source of stream candidates for a content id.
///
/// Implementations must honour `limit` themselves where they can; the
/// aggregator additionally races every call against the same budget.
#[async_trait]
pub trait StreamProvider: Send + Sync + std::fmt::Debug {
    /// Stable provider name, used in cache keys and logs.
    fn name(&self) -> &str;

    /// Cheap liveness check.
    ///
    /// `None` means the provider offers no probe and is always queried.
    async fn probe(&self, _limit: Duration) -> Option<bool> {
        None
    }

    /// Fetches candidates for `id`.
    ///
    /// # Errors
    /// - `AggregationError::ProviderUnavailable` - Network or decoding failure
    /// - `AggregationError::ProviderTimeout` - Budget exceeded
    async fn fetch_streams(
        &self,
        content_type: ContentType,
        id: &str,
        limit: Duration,
    ) -> Result<ProviderResponse, AggregationError>;
}
