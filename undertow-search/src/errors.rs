//! Error types for stream aggregation.

use thiserror::Error;

/// Failures the aggregator absorbs while building a result list.
///
/// None of these abort an aggregation: a failing provider contributes no
/// candidates and a malformed candidate is dropped.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// Provider could not be reached or answered with an error.
    #[error("Provider {provider} unavailable: {reason}")]
    ProviderUnavailable {
        /// Name of the failing provider
        provider: String,
        /// The reason for the failure
        reason: String,
    },

    /// Provider did not answer within its budget.
    #[error("Provider {provider} timed out after {timeout_ms}ms")]
    ProviderTimeout {
        /// Name of the slow provider
        provider: String,
        /// Budget the provider exceeded
        timeout_ms: u128,
    },

    /// Candidate cannot be represented as a magnet or info hash.
    #[error("Malformed candidate from {provider}: {reason}")]
    MalformedCandidate {
        /// Provider that returned the candidate
        provider: String,
        /// What was wrong with it
        reason: String,
    },
}

impl AggregationError {
    /// Stable observability tag.
    pub fn tag(&self) -> &'static str {
        match self {
            AggregationError::ProviderUnavailable { .. } => "provider_unavailable",
            AggregationError::ProviderTimeout { .. } => "provider_timeout",
            AggregationError::MalformedCandidate { .. } => "malformed_candidate",
        }
    }
}
