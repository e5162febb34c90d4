//! Testing utilities: scripted provider mocks and a collecting progress
//! sink.
//!
//! The mocks return deterministic, configurable responses and track their
//! calls for assertions, so pipeline logic is testable without real
//! provider traffic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use crate::error::{ProviderError, ProviderResult};
use crate::gateway::ProviderKind;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::providers::{ExtractedPage, PageExtractor, Reasoner, SearchHit, WebSearcher};

/// Scripted web searcher.
///
/// Returns the hits seeded for a query, or nothing. Queries are matched
/// exactly.
#[derive(Default)]
pub struct MockSearcher {
    results: RwLock<HashMap<String, Vec<SearchHit>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockSearcher {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed hits for a query.
    pub fn with_results(self, query: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        self.results.write().unwrap().insert(query.into(), hits);
        self
    }

    /// Seed `(title, url, snippet)` tuples for a query.
    pub fn with_hits(self, query: impl Into<String>, hits: &[(&str, &str, &str)]) -> Self {
        let hits = hits
            .iter()
            .map(|(title, url, snippet)| SearchHit::new(*title, *url, *snippet))
            .collect();
        self.with_results(query, hits)
    }

    /// Queries issued so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Number of search calls made.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(
        &self,
        _api_key: &str,
        query: &str,
        max_results: usize,
    ) -> ProviderResult<Vec<SearchHit>> {
        self.calls.write().unwrap().push(query.to_string());
        let mut hits = self
            .results
            .read()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default();
        hits.truncate(max_results);
        Ok(hits)
    }
}

/// Scripted page extractor. Unknown URLs fail like a fetch would.
#[derive(Default)]
pub struct MockExtractor {
    pages: RwLock<HashMap<String, ExtractedPage>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockExtractor {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a page for a URL.
    pub fn with_page(
        self,
        url: impl Into<String>,
        title: impl Into<String>,
        markdown: impl Into<String>,
    ) -> Self {
        let url = url.into();
        self.pages.write().unwrap().insert(
            url.clone(),
            ExtractedPage {
                url,
                markdown: markdown.into(),
                title: Some(title.into()),
            },
        );
        self
    }

    /// URLs extracted so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl PageExtractor for MockExtractor {
    async fn extract(&self, _api_key: &str, url: &str) -> ProviderResult<ExtractedPage> {
        self.calls.write().unwrap().push(url.to_string());
        self.pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::Http {
                provider: ProviderKind::Extraction,
                source: format!("no scripted page for {url}").into(),
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Scripted reasoner.
///
/// Responses are selected by prompt content: the first seeded marker found
/// inside the prompt wins, falling back to the default response (or an
/// error when none is set). Prompts are recorded for assertions.
#[derive(Default)]
pub struct MockReasoner {
    responses: RwLock<Vec<(String, String)>>,
    default_response: RwLock<Option<String>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockReasoner {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a response for prompts containing `marker`.
    pub fn with_response_for(
        self,
        marker: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.responses
            .write()
            .unwrap()
            .push((marker.into(), response.into()));
        self
    }

    /// Seed the response used when no marker matches.
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        *self.default_response.write().unwrap() = Some(response.into());
        self
    }

    /// Prompts received so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Number of completion calls made.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl Reasoner for MockReasoner {
    async fn complete(&self, _api_key: &str, prompt: &str) -> ProviderResult<String> {
        self.calls.write().unwrap().push(prompt.to_string());

        for (marker, response) in self.responses.read().unwrap().iter() {
            if prompt.contains(marker.as_str()) {
                return Ok(response.clone());
            }
        }

        self.default_response
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| ProviderError::Http {
                provider: ProviderKind::Reasoning,
                source: "no scripted response for prompt".into(),
            })
    }
}

/// Progress sink that records every event for assertions.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
