//! Uniform call wrapper around every external provider.
//!
//! Caching, credential rotation, timeout, and retry logic live here once,
//! so the search, extraction, and reasoning providers all get identical
//! treatment. The wrapped operation receives an API token and does nothing
//! but the actual call; everything around it is the gateway's job.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::TieredCache;
use crate::config::EngineConfig;
use crate::credentials::{Acquired, CredentialPool};
use crate::error::{ProviderError, ProviderResult};

/// Cooldown applied when a provider throttles without a Retry-After hint.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// The three external provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Web-search provider
    Search,

    /// Content-extraction ("scrape") provider
    Extraction,

    /// Reasoning/synthesis provider
    Reasoning,
}

impl ProviderKind {
    /// Stable label for cache keys and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Search => "search",
            ProviderKind::Extraction => "extraction",
            ProviderKind::Reasoning => "reasoning",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call gateway options.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Cache key; `None` disables caching for this call
    pub cache_key: Option<String>,

    /// TTL used when storing a fresh response
    pub ttl: Duration,
}

impl CallOptions {
    /// Cache the response under `key` for `ttl`.
    pub fn cached(key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache_key: Some(key.into()),
            ttl,
        }
    }

    /// Skip the cache entirely.
    pub fn uncached() -> Self {
        Self {
            cache_key: None,
            ttl: Duration::ZERO,
        }
    }
}

/// The shared provider-call wrapper.
pub struct ProviderGateway {
    cache: Arc<TieredCache>,
    pool: Arc<CredentialPool>,
    call_timeout: Duration,
    max_attempts: usize,
}

impl ProviderGateway {
    /// Create a gateway over the given cache and credential pool.
    pub fn new(cache: Arc<TieredCache>, pool: Arc<CredentialPool>, config: &EngineConfig) -> Self {
        Self {
            cache,
            pool,
            call_timeout: config.call_timeout,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Run a provider operation with caching, rotation, timeout, and retry.
    ///
    /// - Cache hit (when a key is supplied): the network is never touched.
    /// - Rate-limit response: credential cools down, retry with the next one.
    /// - Authorization failure: credential retired, retry with the next one.
    /// - Timeout / transport failure: retried within the attempt budget.
    /// - Non-retryable failures (malformed payload) surface immediately.
    pub async fn call<T, F, Fut>(
        &self,
        provider: ProviderKind,
        opts: CallOptions,
        op: F,
    ) -> ProviderResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(String) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        if let Some(key) = &opts.cache_key {
            if let Some(payload) = self.cache.get(key).await {
                match serde_json::from_value(payload) {
                    Ok(value) => {
                        tracing::debug!(provider = %provider, key = %key, "served from cache");
                        return Ok(value);
                    }
                    Err(e) => {
                        // Entry written by an older shape of T; treat as a miss.
                        tracing::warn!(provider = %provider, key = %key, error = %e, "cached payload unusable");
                    }
                }
            }
        }

        for attempt in 1..=self.max_attempts {
            let acquired = self.pool.acquire(provider)?;
            let lease = acquired.lease().clone();
            if let Acquired::Cooling { until, .. } = &acquired {
                tracing::debug!(provider = %provider, until = %until, "calling with a cooling credential");
            }

            let token = lease.token.expose().to_string();
            let result = match tokio::time::timeout(self.call_timeout, op(token)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    provider,
                    elapsed: self.call_timeout,
                }),
            };

            match result {
                Ok(value) => {
                    if let Some(key) = &opts.cache_key {
                        match serde_json::to_value(&value) {
                            Ok(payload) => self.cache.set(key, payload, opts.ttl).await,
                            Err(e) => {
                                tracing::warn!(provider = %provider, error = %e, "response not cacheable")
                            }
                        }
                    }
                    return Ok(value);
                }
                Err(err) => {
                    match &err {
                        ProviderError::RateLimited { retry_after, .. } => {
                            let cooldown = retry_after.unwrap_or(DEFAULT_COOLDOWN);
                            let until = Utc::now()
                                + chrono::Duration::from_std(cooldown)
                                    .unwrap_or_else(|_| chrono::Duration::seconds(60));
                            self.pool.report_rate_limited(&lease, until);
                        }
                        ProviderError::Unauthorized { .. } => {
                            self.pool.report_invalid(&lease);
                        }
                        _ => {}
                    }

                    if !err.is_retryable() {
                        return Err(err);
                    }

                    tracing::warn!(
                        provider = %provider,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "provider call failed"
                    );

                    if attempt == self.max_attempts {
                        return Err(ProviderError::AttemptsExhausted {
                            provider,
                            attempts: self.max_attempts,
                        });
                    }
                }
            }
        }

        Err(ProviderError::AttemptsExhausted {
            provider,
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PROBE_TTL;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gateway(tokens: &[&str], max_attempts: usize) -> ProviderGateway {
        let cache = Arc::new(TieredCache::in_memory(None));
        let pool = Arc::new(
            CredentialPool::new().with_credentials(ProviderKind::Search, tokens.iter().copied()),
        );
        let config = EngineConfig::new()
            .with_max_attempts(max_attempts)
            .with_call_timeout(Duration::from_millis(200));
        ProviderGateway::new(cache, pool, &config)
    }

    #[tokio::test]
    async fn cache_hit_skips_the_provider() {
        let gateway = gateway(&["k1"], 3);
        let calls = AtomicUsize::new(0);

        let opts = CallOptions::cached("search:test", PROBE_TTL);
        let first: String = gateway
            .call(ProviderKind::Search, opts.clone(), |_token| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("answer".to_string()) }
            })
            .await
            .unwrap();

        let second: String = gateway
            .call(ProviderKind::Search, opts, |_token| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("different".to_string()) }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn rate_limit_rotates_to_next_credential() {
        let gateway = gateway(&["throttled", "fresh"], 3);
        let calls = AtomicUsize::new(0);

        let result: String = gateway
            .call(ProviderKind::Search, CallOptions::uncached(), |token| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if token == "throttled" {
                        Err(ProviderError::RateLimited {
                            provider: ProviderKind::Search,
                            retry_after: None,
                        })
                    } else {
                        Ok(format!("via {token}"))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "via fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unauthorized_retires_credential_and_retries() {
        let cache = Arc::new(TieredCache::in_memory(None));
        let pool = Arc::new(
            CredentialPool::new().with_credentials(ProviderKind::Search, ["revoked", "good"]),
        );
        let gateway = ProviderGateway::new(cache, pool.clone(), &EngineConfig::new());

        let result: String = gateway
            .call(ProviderKind::Search, CallOptions::uncached(), |token| async move {
                if token == "revoked" {
                    Err(ProviderError::Unauthorized {
                        provider: ProviderKind::Search,
                    })
                } else {
                    Ok(token)
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "good");
        assert_eq!(pool.active_count(ProviderKind::Search), 1);
    }

    #[tokio::test]
    async fn malformed_response_is_not_retried() {
        let gateway = gateway(&["k1", "k2"], 3);
        let calls = AtomicUsize::new(0);

        let result: ProviderResult<String> = gateway
            .call(ProviderKind::Search, CallOptions::uncached(), |_token| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ProviderError::Malformed {
                        provider: ProviderKind::Search,
                        reason: "not json".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Malformed { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_surfaces_typed_failure() {
        let gateway = gateway(&["k1"], 2);
        let calls = AtomicUsize::new(0);

        let result: ProviderResult<String> = gateway
            .call(ProviderKind::Search, CallOptions::uncached(), |_token| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ProviderError::Http {
                        provider: ProviderKind::Search,
                        source: "connection reset".into(),
                    })
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(ProviderError::AttemptsExhausted { attempts: 2, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let gateway = gateway(&["k1"], 1);

        let result: ProviderResult<String> = gateway
            .call(ProviderKind::Search, CallOptions::uncached(), |_token| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("too late".to_string())
            })
            .await;

        // One attempt only, so the exhaustion wrapper reports it.
        assert!(matches!(
            result,
            Err(ProviderError::AttemptsExhausted { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn no_credential_surfaces_immediately() {
        let gateway = gateway(&[], 3);

        let result: ProviderResult<String> = gateway
            .call(ProviderKind::Search, CallOptions::uncached(), |_token| async {
                Ok("unreachable".to_string())
            })
            .await;

        assert!(matches!(result, Err(ProviderError::NoCredential { .. })));
    }
}
