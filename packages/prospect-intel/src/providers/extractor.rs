//! Content-extraction provider.
//!
//! [`FirecrawlExtractor`] is the primary path (JavaScript rendering,
//! markdown conversion). [`HttpExtractor`] is the free fallback for
//! cooperative sites. [`FallbackExtractor`] composes the two: the primary's
//! transient failures degrade to a plain fetch instead of losing the source.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};
use crate::gateway::ProviderKind;

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// Extracted page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    /// Page URL
    pub url: String,

    /// Content as markdown/plain text
    pub markdown: String,

    /// Page title if available
    #[serde(default)]
    pub title: Option<String>,
}

/// Content extraction abstraction.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Fetch and extract one page.
    async fn extract(&self, api_key: &str, url: &str) -> ProviderResult<ExtractedPage>;

    /// Extractor name for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}

// Request/response types for the Firecrawl scrape endpoint

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: Vec<&'a str>,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
struct PageMetadata {
    title: Option<String>,
}

/// Firecrawl-based extractor for JavaScript-heavy sites.
pub struct FirecrawlExtractor {
    client: reqwest::Client,
}

impl FirecrawlExtractor {
    /// Create an extractor with a 60s request timeout.
    pub fn new() -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::Http {
                provider: ProviderKind::Extraction,
                source: Box::new(e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageExtractor for FirecrawlExtractor {
    async fn extract(&self, api_key: &str, url: &str) -> ProviderResult<ExtractedPage> {
        let provider = ProviderKind::Extraction;
        let request = ScrapeRequest {
            url,
            formats: vec!["markdown"],
        };

        let response = self
            .client
            .post(format!("{FIRECRAWL_API_URL}/scrape"))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                provider,
                source: Box::new(e),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                provider,
                retry_after: None,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Unauthorized { provider });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                provider,
                source: format!("scrape API error {status}: {body}").into(),
            });
        }

        let parsed: ScrapeResponse =
            response.json().await.map_err(|e| ProviderError::Malformed {
                provider,
                reason: e.to_string(),
            })?;

        if !parsed.success {
            return Err(ProviderError::Malformed {
                provider,
                reason: "scrape reported failure".to_string(),
            });
        }

        let data = parsed.data.ok_or_else(|| ProviderError::Malformed {
            provider,
            reason: "no data in scrape response".to_string(),
        })?;
        let markdown = data.markdown.ok_or_else(|| ProviderError::Malformed {
            provider,
            reason: "no markdown in scrape response".to_string(),
        })?;

        Ok(ExtractedPage {
            url: url.to_string(),
            markdown,
            title: data.metadata.and_then(|m| m.title),
        })
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}

/// Plain-HTTP extractor for cooperative sites.
///
/// Ignores the API token. Strips markup with regex; good enough as a
/// degraded path, not a substitute for real rendering.
pub struct HttpExtractor {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpExtractor {
    /// Create an extractor with a 30s request timeout.
    pub fn new() -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Http {
                provider: ProviderKind::Extraction,
                source: Box::new(e),
            })?;
        Ok(Self {
            client,
            user_agent: "ProspectIntelBot/1.0".to_string(),
        })
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn html_to_text(html: &str) -> String {
        let script_pattern = regex::Regex::new(r"(?s)<script[^>]*>.*?</script>").unwrap();
        let style_pattern = regex::Regex::new(r"(?s)<style[^>]*>.*?</style>").unwrap();
        let tag_pattern = regex::Regex::new(r"<[^>]+>").unwrap();
        let multi_newline = regex::Regex::new(r"\n{3,}").unwrap();

        let text = script_pattern.replace_all(html, "");
        let text = style_pattern.replace_all(&text, "");
        let text = tag_pattern.replace_all(&text, "\n");
        let text = multi_newline.replace_all(&text, "\n\n");
        text.trim().to_string()
    }

    fn extract_title(html: &str) -> Option<String> {
        let title_pattern = regex::Regex::new(r"(?s)<title[^>]*>(.*?)</title>").ok()?;
        title_pattern
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[async_trait]
impl PageExtractor for HttpExtractor {
    async fn extract(&self, _api_key: &str, url: &str) -> ProviderResult<ExtractedPage> {
        let provider = ProviderKind::Extraction;

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                provider,
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                provider,
                source: format!("fetch failed with {status} for {url}").into(),
            });
        }

        let html = response.text().await.map_err(|e| ProviderError::Http {
            provider,
            source: Box::new(e),
        })?;

        Ok(ExtractedPage {
            url: url.to_string(),
            title: Self::extract_title(&html),
            markdown: Self::html_to_text(&html),
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Extractor that tries a primary and falls back on transient failures.
///
/// Rate-limit and authorization failures propagate so the gateway can
/// rotate credentials; everything else degrades to the fallback.
pub struct FallbackExtractor<P: PageExtractor, F: PageExtractor> {
    primary: P,
    fallback: F,
}

impl<P: PageExtractor, F: PageExtractor> FallbackExtractor<P, F> {
    /// Compose a primary and a fallback extractor.
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    fn should_fall_back(error: &ProviderError) -> bool {
        !matches!(
            error,
            ProviderError::RateLimited { .. } | ProviderError::Unauthorized { .. }
        )
    }
}

#[async_trait]
impl<P: PageExtractor, F: PageExtractor> PageExtractor for FallbackExtractor<P, F> {
    async fn extract(&self, api_key: &str, url: &str) -> ProviderResult<ExtractedPage> {
        match self.primary.extract(api_key, url).await {
            Ok(page) => Ok(page),
            Err(e) if Self::should_fall_back(&e) => {
                tracing::warn!(
                    url = %url,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "primary extractor failed, falling back"
                );
                self.fallback.extract(api_key, url).await
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn html_to_text_strips_markup() {
        let html = r#"<html><head><title> Jane Doe Dental </title>
            <script>var x = 1;</script><style>body {}</style></head>
            <body><h1>Welcome</h1><p>Family dentistry since 1998.</p></body></html>"#;

        let text = HttpExtractor::html_to_text(html);
        assert!(text.contains("Welcome"));
        assert!(text.contains("Family dentistry since 1998."));
        assert!(!text.contains("var x"));
        assert!(!text.contains("<p>"));

        assert_eq!(
            HttpExtractor::extract_title(html).as_deref(),
            Some("Jane Doe Dental")
        );
    }

    #[test]
    fn missing_title_is_none() {
        assert!(HttpExtractor::extract_title("<html><body>no title</body></html>").is_none());
    }

    struct ScriptedExtractor {
        outcome: fn() -> ProviderResult<ExtractedPage>,
        calls: AtomicUsize,
        label: &'static str,
    }

    #[async_trait]
    impl PageExtractor for ScriptedExtractor {
        async fn extract(&self, _api_key: &str, _url: &str) -> ProviderResult<ExtractedPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    fn page() -> ExtractedPage {
        ExtractedPage {
            url: "https://example.com".to_string(),
            markdown: "content".to_string(),
            title: None,
        }
    }

    #[tokio::test]
    async fn fallback_engages_on_transient_failure() {
        let extractor = FallbackExtractor::new(
            ScriptedExtractor {
                outcome: || {
                    Err(ProviderError::Http {
                        provider: ProviderKind::Extraction,
                        source: "boom".into(),
                    })
                },
                calls: AtomicUsize::new(0),
                label: "primary",
            },
            ScriptedExtractor {
                outcome: || Ok(page()),
                calls: AtomicUsize::new(0),
                label: "fallback",
            },
        );

        let result = extractor.extract("key", "https://example.com").await.unwrap();
        assert_eq!(result.markdown, "content");
        assert_eq!(extractor.fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_propagates_without_fallback() {
        let extractor = FallbackExtractor::new(
            ScriptedExtractor {
                outcome: || {
                    Err(ProviderError::RateLimited {
                        provider: ProviderKind::Extraction,
                        retry_after: None,
                    })
                },
                calls: AtomicUsize::new(0),
                label: "primary",
            },
            ScriptedExtractor {
                outcome: || Ok(page()),
                calls: AtomicUsize::new(0),
                label: "fallback",
            },
        );

        let result = extractor.extract("key", "https://example.com").await;
        assert!(matches!(result, Err(ProviderError::RateLimited { .. })));
        assert_eq!(extractor.fallback.calls.load(Ordering::SeqCst), 0);
    }
}
