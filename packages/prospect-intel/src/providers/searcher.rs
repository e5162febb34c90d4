//! Web-search provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};
use crate::gateway::ProviderKind;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result title
    pub title: String,

    /// Result URL
    pub url: String,

    /// Snippet/description from the search results
    pub snippet: String,

    /// Relevance score if the API provides one
    #[serde(default)]
    pub score: Option<f32>,
}

impl SearchHit {
    /// Create a hit with the required fields.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            score: None,
        }
    }

    /// Attach a relevance score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// Web search abstraction.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Search the web, returning up to `max_results` hits.
    async fn search(
        &self,
        api_key: &str,
        query: &str,
        max_results: usize,
    ) -> ProviderResult<Vec<SearchHit>>;
}

/// Tavily-backed web searcher.
pub struct TavilySearcher {
    client: reqwest::Client,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: Option<f32>,
}

impl TavilySearcher {
    /// Create a searcher with a 30s request timeout.
    pub fn new() -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Http {
                provider: ProviderKind::Search,
                source: Box::new(e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    async fn search(
        &self,
        api_key: &str,
        query: &str,
        max_results: usize,
    ) -> ProviderResult<Vec<SearchHit>> {
        let provider = ProviderKind::Search;
        let request = TavilyRequest {
            query,
            search_depth: "basic",
            max_results,
        };

        let response = self
            .client
            .post(TAVILY_API_URL)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                provider,
                source: Box::new(e),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited {
                provider,
                retry_after,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Unauthorized { provider });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                provider,
                source: format!("search API error {status}: {body}").into(),
            });
        }

        let parsed: TavilyResponse =
            response.json().await.map_err(|e| ProviderError::Malformed {
                provider,
                reason: e.to_string(),
            })?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title.unwrap_or_else(|| r.url.clone()),
                url: r.url,
                snippet: r.content.unwrap_or_default(),
                score: r.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tavily_response_maps_to_hits() {
        let json = r#"{
            "results": [
                {"url": "https://janedoedental.com", "title": "Jane Doe Dental", "content": "Family dentistry", "score": 0.92},
                {"url": "https://example.com/no-title"}
            ]
        }"#;
        let parsed: TavilyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].title.as_deref(), Some("Jane Doe Dental"));
        assert!(parsed.results[1].title.is_none());
    }

    #[test]
    fn hit_builder() {
        let hit = SearchHit::new("t", "https://a.com", "s").with_score(0.5);
        assert_eq!(hit.score, Some(0.5));
    }
}
