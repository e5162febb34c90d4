//! Concurrent source gathering.
//!
//! Executes everything the strategy planned (candidate-site extraction,
//! review probes, follow-up query probes, competitor probes) as one
//! parallel join. There is deliberately no concurrency cap at this layer:
//! credential cooldowns are what apply real back-pressure, and latency wins
//! over burst-smoothing for a single research request. Each task catches
//! its own failure and contributes zero sources rather than aborting the
//! gather.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use crate::cache::cache_key;
use crate::config::{EngineConfig, PROBE_TTL, SCRAPE_TTL};
use crate::error::ProviderResult;
use crate::gateway::{CallOptions, ProviderGateway, ProviderKind};
use crate::progress::{ProgressSink, StepStatus};
use crate::providers::{ExtractedPage, PageExtractor, SearchHit, WebSearcher};
use crate::types::{ResearchStrategy, ReviewDepth, Source, SourceKind};

/// Gathers typed sources for one request, fanning out over the gateway.
pub struct SourceAggregator {
    gateway: Arc<ProviderGateway>,
    searcher: Arc<dyn WebSearcher>,
    extractor: Arc<dyn PageExtractor>,
    query_results: usize,
}

impl SourceAggregator {
    /// Create an aggregator over the shared gateway and providers.
    pub fn new(
        gateway: Arc<ProviderGateway>,
        searcher: Arc<dyn WebSearcher>,
        extractor: Arc<dyn PageExtractor>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            gateway,
            searcher,
            extractor,
            query_results: config.query_results,
        }
    }

    /// Execute the strategy's planned fetches concurrently.
    ///
    /// Returns sources in deterministic task order (site, reviews, queries,
    /// competitors); failed tasks contribute nothing.
    pub async fn gather(
        &self,
        subject: &str,
        goal: &str,
        strategy: &ResearchStrategy,
        sink: &dyn ProgressSink,
    ) -> Vec<Source> {
        let completed = AtomicUsize::new(0);
        let mut tasks: Vec<BoxFuture<'_, Vec<Source>>> = Vec::new();

        if let Some(site) = strategy
            .candidate_site
            .as_ref()
            .filter(|_| !strategy.skip_site_extraction)
        {
            let url = site.to_string();
            tasks.push(
                self.run_task(sink, &completed, "source:practice-site", async move {
                    self.extract_site(&url).await
                })
                .boxed(),
            );
        }

        if strategy.review_depth != ReviewDepth::Skip {
            let queries = review_queries(subject, goal, strategy.review_depth);
            tasks.push(
                self.run_task(sink, &completed, "source:review-site", async move {
                    self.probe_reviews(&queries).await
                })
                .boxed(),
            );
        }

        for (idx, query) in strategy.queries.iter().enumerate() {
            let query = query.clone();
            let kind = query_kind(&query, goal);
            let step_id = format!("source:query-{idx}");
            tasks.push(
                self.run_task_owned(sink, &completed, step_id, async move {
                    self.probe_query(&query, kind).await
                })
                .boxed(),
            );
        }

        for competitor in &strategy.known_competitors {
            let query = format!("{subject} {competitor}");
            let competitor = competitor.clone();
            let step_id = format!("source:competitor-{}", competitor.to_lowercase().replace(' ', "-"));
            tasks.push(
                self.run_task_owned(sink, &completed, step_id, async move {
                    self.probe_competitor(&query, &competitor).await
                })
                .boxed(),
            );
        }

        let planned = tasks.len();
        tracing::info!(tasks = planned, "gathering sources");

        let gathered: Vec<Source> = join_all(tasks).await.into_iter().flatten().collect();

        tracing::info!(
            tasks = planned,
            sources = gathered.len(),
            "gather complete"
        );
        gathered
    }

    async fn run_task<'a>(
        &'a self,
        sink: &'a dyn ProgressSink,
        completed: &'a AtomicUsize,
        step_id: &'a str,
        task: impl std::future::Future<Output = ProviderResult<Vec<Source>>> + Send + 'a,
    ) -> Vec<Source> {
        self.run_task_owned(sink, completed, step_id.to_string(), task)
            .await
    }

    async fn run_task_owned<'a>(
        &'a self,
        sink: &'a dyn ProgressSink,
        completed: &'a AtomicUsize,
        step_id: String,
        task: impl std::future::Future<Output = ProviderResult<Vec<Source>>> + Send + 'a,
    ) -> Vec<Source> {
        sink.update_step(&step_id, StepStatus::Active, None);

        let sources = match task.await {
            Ok(sources) => sources,
            Err(e) => {
                // A single failed fetch degrades to nothing; the request
                // carries on with whatever the other tasks find.
                tracing::warn!(step = %step_id, error = %e, "gather task failed");
                Vec::new()
            }
        };

        let status = if sources.is_empty() {
            StepStatus::Completed
        } else {
            StepStatus::Found
        };
        sink.update_step(&step_id, status, Some(&format!("{} sources", sources.len())));
        let done = completed.fetch_add(sources.len(), Ordering::SeqCst) + sources.len();
        sink.update_sources(done);

        sources
    }

    async fn extract_site(&self, url: &str) -> ProviderResult<Vec<Source>> {
        let key = cache_key("extraction", &[url]);
        let extractor = self.extractor.clone();
        let url_owned = url.to_string();

        let page: ExtractedPage = self
            .gateway
            .call(
                ProviderKind::Extraction,
                CallOptions::cached(key, SCRAPE_TTL),
                move |token| {
                    let extractor = extractor.clone();
                    let url = url_owned.clone();
                    async move { extractor.extract(&token, &url).await }
                },
            )
            .await?;

        let title = page
            .title
            .clone()
            .unwrap_or_else(|| page.url.clone());
        Ok(vec![Source::new(
            SourceKind::PracticeSite,
            title,
            page.url,
            page.markdown,
        )])
    }

    async fn probe_reviews(&self, queries: &[String]) -> ProviderResult<Vec<Source>> {
        let mut sources = Vec::new();
        for query in queries {
            let hits = self.search(query, self.query_results).await?;
            if let Some(source) = hits_to_source(SourceKind::ReviewSite, query, &hits) {
                sources.push(source);
            }
        }
        Ok(sources)
    }

    async fn probe_query(&self, query: &str, kind: SourceKind) -> ProviderResult<Vec<Source>> {
        let hits = self.search(query, self.query_results).await?;
        Ok(hits_to_source(kind, query, &hits).into_iter().collect())
    }

    async fn probe_competitor(&self, query: &str, competitor: &str) -> ProviderResult<Vec<Source>> {
        let hits = self.search(query, self.query_results).await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }
        let mut source = hits_to_source(SourceKind::CompetitorData, query, &hits);
        if let Some(s) = &mut source {
            s.title = format!("Mentions of {competitor}");
        }
        Ok(source.into_iter().collect())
    }

    async fn search(&self, query: &str, max_results: usize) -> ProviderResult<Vec<SearchHit>> {
        let key = cache_key("search", &[query, &max_results.to_string()]);
        let searcher = self.searcher.clone();
        let query_owned = query.to_string();

        self.gateway
            .call(
                ProviderKind::Search,
                CallOptions::cached(key, PROBE_TTL),
                move |token| {
                    let searcher = searcher.clone();
                    let query = query_owned.clone();
                    async move { searcher.search(&token, &query, max_results).await }
                },
            )
            .await
    }
}

/// Review query set for the given depth.
fn review_queries(subject: &str, goal: &str, depth: ReviewDepth) -> Vec<String> {
    match depth {
        ReviewDepth::Skip => Vec::new(),
        ReviewDepth::Reduced => vec![format!("{subject} reviews")],
        ReviewDepth::Full => vec![
            format!("{subject} reviews"),
            format!("{subject} patient reviews"),
            format!("{subject} {goal} reviews"),
        ],
    }
}

/// Classify a planner query by what it is after.
fn query_kind(query: &str, goal: &str) -> SourceKind {
    if query.to_lowercase().contains(&goal.to_lowercase()) {
        SourceKind::ProductData
    } else {
        SourceKind::Directory
    }
}

/// Fold search hits into one source; `None` when there were no hits.
fn hits_to_source(kind: SourceKind, query: &str, hits: &[SearchHit]) -> Option<Source> {
    if hits.is_empty() {
        return None;
    }
    let content = hits
        .iter()
        .map(|h| format!("{} — {}\n{}", h.title, h.url, h.snippet))
        .collect::<Vec<_>>()
        .join("\n\n");
    Some(Source::new(
        kind,
        format!("Results for \"{query}\""),
        format!("search:{query}"),
        content,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TieredCache;
    use crate::credentials::CredentialPool;
    use crate::progress::NoopSink;
    use crate::testing::{CollectingSink, MockExtractor, MockSearcher};
    use crate::types::FocusArea;
    use url::Url;

    fn strategy() -> ResearchStrategy {
        ResearchStrategy {
            queries: vec!["Jane Doe ScanTech".to_string()],
            skip_site_extraction: false,
            review_depth: ReviewDepth::Reduced,
            focus_areas: vec![FocusArea::CurrentTechnology],
            key_questions: vec![],
            candidate_site: Some(Url::parse("https://janedoedental.com").unwrap()),
            known_competitors: vec!["OldScan".to_string()],
        }
    }

    fn aggregator(searcher: MockSearcher, extractor: MockExtractor) -> SourceAggregator {
        let cache = Arc::new(TieredCache::in_memory(None));
        let pool = Arc::new(
            CredentialPool::new()
                .with_credentials(ProviderKind::Search, ["sk"])
                .with_credentials(ProviderKind::Extraction, ["ek"]),
        );
        let gateway = Arc::new(ProviderGateway::new(cache, pool, &EngineConfig::new()));
        SourceAggregator::new(
            gateway,
            Arc::new(searcher),
            Arc::new(extractor),
            &EngineConfig::new(),
        )
    }

    fn seeded_searcher() -> MockSearcher {
        MockSearcher::new()
            .with_hits(
                "Jane Doe reviews",
                &[("Reviews", "https://reviews.example.com/jane", "4.8 stars")],
            )
            .with_hits(
                "Jane Doe ScanTech",
                &[("ScanTech mention", "https://news.example.com", "uses imaging")],
            )
            .with_hits(
                "Jane Doe OldScan",
                &[("OldScan install", "https://oldscan.example.com", "installed 2019")],
            )
    }

    #[tokio::test]
    async fn gathers_all_planned_task_kinds() {
        let aggregator = aggregator(
            seeded_searcher(),
            MockExtractor::new().with_page(
                "https://janedoedental.com/",
                "Jane Doe Dental",
                "# Welcome to Jane Doe Dental",
            ),
        );

        let sources = aggregator
            .gather("Jane Doe", "ScanTech", &strategy(), &NoopSink)
            .await;

        assert_eq!(sources.len(), 4);
        let kinds: Vec<SourceKind> = sources.iter().map(|s| s.kind).collect();
        assert!(kinds.contains(&SourceKind::PracticeSite));
        assert!(kinds.contains(&SourceKind::ReviewSite));
        assert!(kinds.contains(&SourceKind::ProductData));
        assert!(kinds.contains(&SourceKind::CompetitorData));

        // Every source carries an origin and timestamp by construction.
        assert!(sources.iter().all(|s| !s.origin.is_empty()));
    }

    #[tokio::test]
    async fn failed_extraction_degrades_to_fewer_sources() {
        // Extractor knows no pages, so the site task errors out.
        let aggregator = aggregator(seeded_searcher(), MockExtractor::new());

        let sources = aggregator
            .gather("Jane Doe", "ScanTech", &strategy(), &NoopSink)
            .await;

        assert_eq!(sources.len(), 3);
        assert!(!sources.iter().any(|s| s.kind == SourceKind::PracticeSite));
    }

    #[tokio::test]
    async fn skip_flags_suppress_tasks() {
        let mut strategy = strategy();
        strategy.skip_site_extraction = true;
        strategy.review_depth = ReviewDepth::Skip;
        strategy.known_competitors.clear();

        let aggregator = aggregator(seeded_searcher(), MockExtractor::new());
        let sources = aggregator
            .gather("Jane Doe", "ScanTech", &strategy, &NoopSink)
            .await;

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].kind, SourceKind::ProductData);
    }

    #[tokio::test]
    async fn emits_progress_per_task() {
        let sink = CollectingSink::new();
        let aggregator = aggregator(
            seeded_searcher(),
            MockExtractor::new().with_page("https://janedoedental.com/", "t", "content"),
        );

        aggregator
            .gather("Jane Doe", "ScanTech", &strategy(), &sink)
            .await;

        let events = sink.events();
        // 4 tasks × (active + terminal) step events, plus source counts.
        let step_events = events
            .iter()
            .filter(|e| matches!(e, crate::progress::ProgressEvent::Step { .. }))
            .count();
        assert_eq!(step_events, 8);
        let count_events = events
            .iter()
            .filter(|e| matches!(e, crate::progress::ProgressEvent::Sources { .. }))
            .count();
        assert_eq!(count_events, 4);
    }

    #[tokio::test]
    async fn empty_hits_produce_no_source() {
        let aggregator = aggregator(MockSearcher::new(), MockExtractor::new());
        let mut strategy = strategy();
        strategy.skip_site_extraction = true;

        let sources = aggregator
            .gather("Jane Doe", "ScanTech", &strategy, &NoopSink)
            .await;
        assert!(sources.is_empty());
    }
}
