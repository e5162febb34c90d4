//! End-to-end research demo wired with scripted mock providers.
//!
//! Shows the full orchestration (probe, plan, gather, synthesize, score)
//! with progress streamed through a `ProgressHub`, without touching real
//! provider APIs.
//!
//! ```bash
//! cargo run --example research_demo
//! ```

use std::sync::Arc;

use prospect_intel::{
    CredentialPool, MockExtractor, MockReasoner, MockSearcher, ProgressHub, ProviderKind,
    ResearchOptions, ResearchOrchestrator, TieredCache,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let searcher = MockSearcher::new()
        .with_hits(
            "Jane Doe ScanTech",
            &[
                (
                    "Jane Doe Dental",
                    "https://janedoedental.com",
                    "Family dental practice in Springfield, now open in a second location",
                ),
                (
                    "Dr. Jane Doe — reviews",
                    "https://reviews.example.com/jane-doe",
                    "4.9 stars from 120 patient reviews",
                ),
            ],
        )
        .with_hits(
            "Jane Doe reviews",
            &[(
                "Patient reviews",
                "https://reviews.example.com/jane-doe",
                "Patients praise the staff but mention long imaging appointments",
            )],
        );

    let extractor = MockExtractor::new().with_page(
        "https://janedoedental.com/",
        "Jane Doe Dental",
        "# Jane Doe Dental\nFamily dentistry. Online booking. Two locations in Springfield.",
    );

    let reasoner = MockReasoner::new()
        .with_response_for(
            "Initial web search results",
            "Jane Doe runs a growing two-location dental practice with its own website.",
        )
        .with_response_for(
            "Propose the follow-up fetches",
            "Scrape the practice site; reviews are worth one probe.",
        )
        .with_response_for(
            "Finalize the research plan",
            r#"{
                "queries": ["Jane Doe reviews"],
                "key_questions": ["What imaging equipment does the practice run today?"],
                "review_priority": "low",
                "skip_site_extraction": false,
                "competitors": []
            }"#,
        )
        .with_response_for(
            "Distill sales-relevant insights",
            "Growing practice; imaging appointments are a known bottleneck.",
        )
        .with_response_for(
            "Recommend a sales approach",
            "Open with the second location and imaging chair time.",
        )
        .with_response_for(
            "Assemble the final intelligence record",
            r#"{
                "profile": {"name": "Jane Doe", "organization": "Jane Doe Dental", "location": "Springfield"},
                "technology": ["online booking", "legacy imaging equipment"],
                "technology_gaps": ["digital intraoral scanning"],
                "buying_signals": ["second location opened"],
                "pain_points": ["long imaging appointments"],
                "approach": {
                    "opening_angle": "Congratulate the expansion and ask about imaging throughput",
                    "talking_points": ["chair-time savings", "two-location workflow"],
                    "likely_objections": ["capital just spent on the new location"]
                },
                "decision_makers": ["Jane Doe"],
                "sales_brief": "Jane Doe Dental just opened a second Springfield location while patients still mention long imaging appointments, so ScanTech lands on a live pain point with a growth story attached."
            }"#,
        );

    let cache = Arc::new(TieredCache::in_memory(Some(512)));
    let pool = Arc::new(
        CredentialPool::new()
            .with_credentials(ProviderKind::Search, ["demo-search-key"])
            .with_credentials(ProviderKind::Extraction, ["demo-extract-key"])
            .with_credentials(ProviderKind::Reasoning, ["demo-reason-key"]),
    );

    let orchestrator = ResearchOrchestrator::new(
        cache,
        pool,
        Arc::new(searcher),
        Arc::new(extractor),
        Arc::new(reasoner),
    );

    // Stream progress out of band, the way a UI collaborator would.
    let hub = ProgressHub::new();
    let mut events = hub.subscribe("research:demo");
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("  [progress] {event:?}");
        }
    });

    let record = orchestrator
        .research(
            "Jane Doe",
            "ScanTech",
            ResearchOptions::new().with_progress(Arc::new(hub.sink_for("research:demo"))),
        )
        .await;

    drop(hub);
    let _ = printer.await;

    println!();
    println!(
        "=== Intelligence record for {} (goal: {}) ===",
        record.subject, record.goal
    );
    println!("confidence: {}%", record.confidence_score);
    for factor in &record.confidence_factors {
        println!("  +{:<4} {}", factor.points, factor.label);
    }
    println!("sources: {}", record.sources.len());
    for source in &record.sources {
        println!("  [{}] {}", source.kind, source.origin);
    }
    println!("elapsed: {}ms", record.elapsed_ms);
    println!();
    println!("{}", record.draft.sales_brief);
}
