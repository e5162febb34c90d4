//! The public entry point: sequences probe → plan → gather → synthesize →
//! score and guarantees a best-effort record is always returned.
//!
//! This is the only component allowed to swallow errors (after logging).
//! Everything inner surfaces typed failures; here they collapse into the
//! best available partial record (probe-only data, base confidence,
//! templated brief) rather than propagating to the caller.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use super::aggregator::SourceAggregator;
use super::planner::StrategyPlanner;
use super::prompts::format_probe;
use super::scorer::ConfidenceScorer;
use super::synthesis::SynthesisEngine;
use crate::cache::{cache_key, TieredCache};
use crate::config::{EngineConfig, PROBE_TTL};
use crate::credentials::CredentialPool;
use crate::error::{ProviderResult, Result};
use crate::gateway::{CallOptions, ProviderGateway, ProviderKind};
use crate::progress::{steps, NoopSink, ProgressSink, StepStatus};
use crate::providers::{PageExtractor, Reasoner, SearchHit, WebSearcher};
use crate::types::{IntelligenceRecord, ResearchStrategy, Source, SourceKind};

/// Per-request options.
#[derive(Default)]
pub struct ResearchOptions {
    /// Observer for progress events; `None` drops them
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl ResearchOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a progress observer.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }
}

/// Orchestrates one research request end to end.
///
/// All collaborators (cache, credential pool, providers) are
/// constructor-injected, so tests run isolated instances and multiple
/// configurations can coexist in one process.
pub struct ResearchOrchestrator {
    config: EngineConfig,
    gateway: Arc<ProviderGateway>,
    searcher: Arc<dyn WebSearcher>,
    planner: StrategyPlanner,
    aggregator: SourceAggregator,
    synthesis: SynthesisEngine,
    scorer: ConfidenceScorer,
}

impl ResearchOrchestrator {
    /// Create an orchestrator with the default configuration.
    pub fn new(
        cache: Arc<TieredCache>,
        pool: Arc<CredentialPool>,
        searcher: Arc<dyn WebSearcher>,
        extractor: Arc<dyn PageExtractor>,
        reasoner: Arc<dyn Reasoner>,
    ) -> Self {
        Self::with_config(cache, pool, searcher, extractor, reasoner, EngineConfig::default())
    }

    /// Create an orchestrator with a custom configuration.
    pub fn with_config(
        cache: Arc<TieredCache>,
        pool: Arc<CredentialPool>,
        searcher: Arc<dyn WebSearcher>,
        extractor: Arc<dyn PageExtractor>,
        reasoner: Arc<dyn Reasoner>,
        config: EngineConfig,
    ) -> Self {
        let gateway = Arc::new(ProviderGateway::new(cache, pool, &config));
        let planner = StrategyPlanner::new(gateway.clone(), reasoner.clone());
        let aggregator =
            SourceAggregator::new(gateway.clone(), searcher.clone(), extractor, &config);
        let synthesis = SynthesisEngine::new(gateway.clone(), reasoner);
        let scorer = ConfidenceScorer::new(config.identity_verified);

        Self {
            config,
            gateway,
            searcher,
            planner,
            aggregator,
            synthesis,
            scorer,
        }
    }

    /// The engine configuration in effect.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Research a subject for a goal. Always returns a structurally valid
    /// record; quality degrades gracefully instead of the call failing.
    pub async fn research(
        &self,
        subject: &str,
        goal: &str,
        options: ResearchOptions,
    ) -> IntelligenceRecord {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let sink: Arc<dyn ProgressSink> = options.progress.unwrap_or_else(|| Arc::new(NoopSink));

        tracing::info!(%request_id, subject, goal, "research started");

        sink.update_stage("Locating subject");
        sink.update_step(steps::PROBE, StepStatus::Active, None);
        let probe = match self.probe(subject, goal).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(%request_id, error = %e, "initial probe failed");
                Vec::new()
            }
        };
        sink.update_step(
            steps::PROBE,
            StepStatus::Completed,
            Some(&format!("{} results", probe.len())),
        );

        let stages = self.run_stages(subject, goal, &probe, sink.as_ref());
        let record = match tokio::time::timeout(self.config.overall_deadline, stages).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                tracing::error!(%request_id, error = %e, "pipeline failed, returning partial record");
                self.partial_record(subject, goal, &probe)
            }
            Err(_) => {
                tracing::warn!(
                    %request_id,
                    deadline = ?self.config.overall_deadline,
                    "deadline elapsed, returning partial record"
                );
                self.partial_record(subject, goal, &probe)
            }
        };

        let record = record.with_elapsed_ms(started.elapsed().as_millis() as u64);
        sink.update_confidence(record.confidence_score);
        sink.update_stage("Research complete");

        tracing::info!(
            %request_id,
            confidence = record.confidence_score,
            sources = record.sources.len(),
            elapsed_ms = record.elapsed_ms,
            synthesized = record.synthesized,
            "research finished"
        );
        record
    }

    async fn run_stages(
        &self,
        subject: &str,
        goal: &str,
        probe: &[SearchHit],
        sink: &dyn ProgressSink,
    ) -> Result<IntelligenceRecord> {
        sink.update_stage("Planning research");
        sink.update_step(steps::PLAN, StepStatus::Active, None);
        let strategy = self.planner.plan(subject, goal, probe).await;
        sink.update_step(
            steps::PLAN,
            StepStatus::Completed,
            Some(&format!("{} queries", strategy.queries.len())),
        );

        sink.update_stage("Gathering sources");
        sink.update_step(steps::GATHER, StepStatus::Active, None);
        let mut sources = Vec::new();
        sources.extend(probe_source(subject, goal, probe));
        sources.extend(self.aggregator.gather(subject, goal, &strategy, sink).await);
        sink.update_step(
            steps::GATHER,
            StepStatus::Completed,
            Some(&format!("{} sources", sources.len())),
        );
        sink.update_sources(sources.len());

        sink.update_stage("Synthesizing intelligence");
        sink.update_step(steps::SYNTHESIZE, StepStatus::Active, None);
        let synthesis = self
            .synthesis
            .synthesize(subject, goal, &strategy, &sources)
            .await;
        sink.update_step(
            steps::SYNTHESIZE,
            StepStatus::Completed,
            synthesis.from_fallback.then_some("fallback template"),
        );

        sink.update_step(steps::SCORE, StepStatus::Active, None);
        let report = self.scorer.score(&sources, &strategy, &synthesis.draft);
        sink.update_step(steps::SCORE, StepStatus::Completed, None);

        let mut record = IntelligenceRecord::new(subject, goal, synthesis.draft)
            .with_sources(sources)
            .with_confidence(report.score, report.factors);
        if synthesis.from_fallback {
            record = record.mark_fallback();
        }
        Ok(record)
    }

    /// Minimal valid record built from whatever the probe found.
    fn partial_record(
        &self,
        subject: &str,
        goal: &str,
        probe: &[SearchHit],
    ) -> IntelligenceRecord {
        let strategy = ResearchStrategy::fallback(subject, goal);
        let sources: Vec<Source> = probe_source(subject, goal, probe).into_iter().collect();
        let draft = SynthesisEngine::fallback_draft(subject, goal, &strategy, &sources);
        let report = self.scorer.score(&sources, &strategy, &draft);

        IntelligenceRecord::new(subject, goal, draft)
            .with_sources(sources)
            .with_confidence(report.score, report.factors)
            .mark_fallback()
    }

    async fn probe(&self, subject: &str, goal: &str) -> ProviderResult<Vec<SearchHit>> {
        let query = format!("{subject} {goal}");
        let max_results = self.config.probe_results;
        let key = cache_key("search", &[&query, &max_results.to_string()]);
        let searcher = self.searcher.clone();

        self.gateway
            .call(
                ProviderKind::Search,
                CallOptions::cached(key, PROBE_TTL),
                move |token| {
                    let searcher = searcher.clone();
                    let query = query.clone();
                    async move { searcher.search(&token, &query, max_results).await }
                },
            )
            .await
    }
}

/// Fold probe hits into a probe source; nothing when the probe was empty.
fn probe_source(subject: &str, goal: &str, probe: &[SearchHit]) -> Option<Source> {
    if probe.is_empty() {
        return None;
    }
    Some(Source::new(
        SourceKind::Probe,
        format!("Initial probe for {subject}"),
        format!("search:{subject} {goal}"),
        format_probe(probe),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_source_requires_hits() {
        assert!(probe_source("Jane Doe", "ScanTech", &[]).is_none());

        let hits = vec![SearchHit::new("t", "https://a.com", "s")];
        let source = probe_source("Jane Doe", "ScanTech", &hits).unwrap();
        assert_eq!(source.kind, SourceKind::Probe);
        assert_eq!(source.origin, "search:Jane Doe ScanTech");
        assert!(source.content.contains("https://a.com"));
    }
}
