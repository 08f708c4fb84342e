//! Provider serving a fixed candidate list.
//!
//! Backs offline aggregation from a JSON file in the CLI and stands in for
//! real providers in tests.

use std::time::Duration;

use async_trait::async_trait;

use super::{ProviderResponse, StreamProvider};
use crate::errors::AggregationError;
use crate::types::{ContentType, StreamCandidate};

/// Provider answering every request with the same candidates.
#[derive(Debug, Clone)]
pub struct FixedProvider {
    name: String,
    streams: Vec<StreamCandidate>,
    delay: Duration,
    failing: bool,
    alive: Option<bool>,
}

impl FixedProvider {
    /// Creates a provider named `name` serving `streams`.
    pub fn new(name: impl Into<String>, streams: Vec<StreamCandidate>) -> Self {
        Self {
            name: name.into(),
            streams,
            delay: Duration::ZERO,
            failing: false,
            alive: None,
        }
    }

    /// Waits `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes every fetch fail.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Offers a liveness probe answering `alive`.
    pub fn with_probe(mut self, alive: bool) -> Self {
        self.alive = Some(alive);
        self
    }
}

#[async_trait]
impl StreamProvider for FixedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self, _limit: Duration) -> Option<bool> {
        self.alive
    }

    async fn fetch_streams(
        &self,
        _content_type: ContentType,
        _id: &str,
        limit: Duration,
    ) -> Result<ProviderResponse, AggregationError> {
        if !self.delay.is_zero() {
            if self.delay > limit {
                tokio::time::sleep(limit).await;
                return Err(AggregationError::ProviderTimeout {
                    provider: self.name.clone(),
                    timeout_ms: limit.as_millis(),
                });
            }
            tokio::time::sleep(self.delay).await;
        }

        if self.failing {
            return Err(AggregationError::ProviderUnavailable {
                provider: self.name.clone(),
                reason: "configured to fail".to_string(),
            });
        }

        let streams = self
            .streams
            .iter()
            .cloned()
            .map(|mut candidate| {
                if candidate.provider.is_empty() {
                    candidate.provider = self.name.clone();
                }
                candidate
            })
            .collect();
        Ok(ProviderResponse::ok(self.name.clone(), streams))
    }
}
