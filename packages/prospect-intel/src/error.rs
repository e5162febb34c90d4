//! Typed errors for the research engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Inner components surface
//! these; only the orchestrator is allowed to swallow them (after logging)
//! and degrade to a partial record.

use std::time::Duration;

use thiserror::Error;

use crate::gateway::ProviderKind;

/// Errors that can occur during research operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A provider call failed after the gateway's retry budget
    #[error("provider call failed: {0}")]
    Provider(#[from] ProviderError),

    /// Cache operation failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Errors surfaced by external provider calls.
///
/// The gateway classifies failures into these variants so that credential
/// rotation and retry can react to throttling and revocation differently
/// from plain network trouble.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider responded with a throttling status
    #[error("{provider} rate limited")]
    RateLimited {
        provider: ProviderKind,
        retry_after: Option<Duration>,
    },

    /// Credential was rejected (expired, revoked, wrong scope)
    #[error("{provider} rejected credential")]
    Unauthorized { provider: ProviderKind },

    /// Call exceeded the per-call timeout
    #[error("{provider} call timed out after {elapsed:?}")]
    Timeout {
        provider: ProviderKind,
        elapsed: Duration,
    },

    /// HTTP or transport failure
    #[error("{provider} request failed: {source}")]
    Http {
        provider: ProviderKind,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Provider returned a payload we could not interpret
    #[error("malformed {provider} response: {reason}")]
    Malformed {
        provider: ProviderKind,
        reason: String,
    },

    /// No credential available for this provider (all invalid or none configured)
    #[error("no credential available for {provider}")]
    NoCredential { provider: ProviderKind },

    /// Retry budget spent without a successful call
    #[error("{provider} attempts exhausted after {attempts}")]
    AttemptsExhausted {
        provider: ProviderKind,
        attempts: usize,
    },
}

impl ProviderError {
    /// Whether the gateway should rotate credentials and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Unauthorized { .. }
                | ProviderError::Timeout { .. }
                | ProviderError::Http { .. }
        )
    }
}

/// Errors that can occur in the tiered cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Durable tier storage failure
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Payload could not be (de)serialized
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for research operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Result type alias for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        let rate_limited = ProviderError::RateLimited {
            provider: ProviderKind::Search,
            retry_after: None,
        };
        assert!(rate_limited.is_retryable());

        let exhausted = ProviderError::AttemptsExhausted {
            provider: ProviderKind::Search,
            attempts: 3,
        };
        assert!(!exhausted.is_retryable());

        let no_credential = ProviderError::NoCredential {
            provider: ProviderKind::Reasoning,
        };
        assert!(!no_credential.is_retryable());
    }

    #[test]
    fn provider_error_converts_to_engine_error() {
        let err: EngineError = ProviderError::Unauthorized {
            provider: ProviderKind::Extraction,
        }
        .into();
        assert!(matches!(err, EngineError::Provider(_)));
    }
}
