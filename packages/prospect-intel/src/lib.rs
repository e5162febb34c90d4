//! Adaptive Research Orchestration & Caching Engine
//!
//! Turns a subject (a person or practice name) and a goal (a product name)
//! into a structured intelligence record by combining a web-search
//! provider, a content-extraction provider, and a reasoning provider,
//! without redundant external calls and without ever failing the caller.
//!
//! # Design Philosophy
//!
//! - Probe cheap, fetch deliberately: a low-cost search probe drives the
//!   plan for which costlier fetches are worth running
//! - Degrade, don't fail: every stage has a deterministic fallback; the
//!   caller always receives a structurally valid record
//! - Cache first: a tiered cache sits in front of every provider call
//! - Back-pressure through credentials: rotation and cooldowns throttle
//!   outbound traffic, not reduced concurrency
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prospect_intel::{
//!     CredentialPool, ProviderKind, ResearchOptions, ResearchOrchestrator, TieredCache,
//! };
//!
//! let cache = Arc::new(TieredCache::in_memory(Some(512)));
//! let pool = Arc::new(
//!     CredentialPool::new()
//!         .with_credentials(ProviderKind::Search, [tavily_key])
//!         .with_credentials(ProviderKind::Extraction, [firecrawl_key])
//!         .with_credentials(ProviderKind::Reasoning, [openai_key]),
//! );
//!
//! let orchestrator = ResearchOrchestrator::new(cache, pool, searcher, extractor, reasoner);
//! let record = orchestrator
//!     .research("Jane Doe", "ScanTech", ResearchOptions::new())
//!     .await;
//! println!("{} ({}% confidence)", record.draft.sales_brief, record.confidence_score);
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Tiered cache (volatile + durable, read-through promotion)
//! - [`credentials`] - Rotating credential pool with cooldowns
//! - [`gateway`] - Uniform provider-call wrapper (cache, rotate, retry)
//! - [`providers`] - Search, extraction, and reasoning clients
//! - [`pipeline`] - Planner, aggregator, scorer, synthesis, orchestrator
//! - [`progress`] - Fire-and-forget progress events
//! - [`testing`] - Scripted mocks for tests

pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod progress;
pub mod providers;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use cache::{cache_key, CacheEntry, DurableCache, MemoryDurable, TieredCache};
pub use config::{EngineConfig, PROBE_TTL, SCRAPE_TTL, SYNTHESIS_TTL};
pub use credentials::{Acquired, Credential, CredentialPool, Lease, SecretString};
pub use error::{CacheError, EngineError, ProviderError};
pub use gateway::{CallOptions, ProviderGateway, ProviderKind};
pub use progress::{HubSink, NoopSink, ProgressEvent, ProgressHub, ProgressSink, StepStatus};
pub use providers::{
    ExtractedPage, FallbackExtractor, FirecrawlExtractor, HttpExtractor, OpenAiReasoner,
    PageExtractor, Reasoner, SearchHit, TavilySearcher, WebSearcher,
};
pub use types::{
    ApproachPlan, FocusArea, IntelligenceRecord, ProspectProfile, RecordDraft, ResearchStrategy,
    ReviewDepth, ScoreFactor, Source, SourceKind,
};

#[cfg(feature = "sqlite")]
pub use cache::SqliteCache;

// Re-export pipeline components
pub use pipeline::{
    candidate_site, is_directory_domain, ConfidenceReport, ConfidenceScorer, ResearchOptions,
    ResearchOrchestrator, SourceAggregator, StrategyPlanner, SynthesisEngine, SynthesisOutcome,
    SynthesisResult,
};

// Re-export testing utilities
pub use testing::{CollectingSink, MockExtractor, MockReasoner, MockSearcher};
