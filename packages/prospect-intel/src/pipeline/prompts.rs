//! Reasoning-provider prompts for planning and synthesis.
//!
//! Templates use `{placeholder}` markers filled by the `format_*` helpers.
//! `prompt_hash` feeds cache keys so a reworded prompt never serves a stale
//! cached completion.

use sha2::{Digest, Sha256};

use crate::providers::SearchHit;
use crate::types::{ResearchStrategy, Source};

/// Pass 1: digest what the probe already tells us.
pub const PROBE_DIGEST_PROMPT: &str = r#"You are researching a sales prospect.

Subject: {subject}
Product being sold: {goal}

Initial web search results:
{probe}

Summarize what these results establish about the subject: who they are,
where they operate, any practice website, any technology or growth signals.
Note explicitly what is still unknown. Plain text, under 250 words."#;

/// Pass 2: extend the digest into a fetch plan.
pub const FETCH_PLAN_PROMPT: &str = r#"Continue the research below.

What we know so far:
{digest}

Propose the follow-up fetches that are worth their cost:
- search queries that would fill the gaps (most valuable first)
- whether scraping the subject's own website would add anything
- competitor vendors that might already be in the account
- the key questions a sales brief must answer

Plain text."#;

/// Pass 3: extend the plan into skip decisions and emit structured output.
pub const SKIP_DECISION_PROMPT: &str = r#"Finalize the research plan below into decisions.

Draft plan:
{plan}

Decide what to actually run and what to skip. Reviews are low priority when
the plan suggests reputation adds little; competitor probes are pointless
without named competitors.

Output JSON only:
{
    "queries": ["follow-up search query", ...],
    "key_questions": ["question the brief must answer", ...],
    "review_priority": "skip" | "low" | "normal",
    "skip_site_extraction": true | false,
    "competitors": ["vendor name", ...]
}"#;

/// Synthesis pass 1: distill insights from the gathered evidence.
pub const INSIGHT_PROMPT: &str = r#"Distill sales-relevant insights from the evidence below.

Subject: {subject}
Product being sold: {goal}
Research focus: {focus}

Evidence:
{sources}

Cover: current technology, operational pain points, buying signals, and who
likely makes purchase decisions. Ground every insight in the evidence; say
"unknown" rather than invent. Plain text."#;

/// Synthesis pass 2: turn insights into an approach recommendation.
pub const APPROACH_PROMPT: &str = r#"Recommend a sales approach.

Subject: {subject}
Product being sold: {goal}

Insights:
{insights}

Cover: the opening angle, talking points in priority order, and likely
objections with handling. Plain text."#;

/// Synthesis pass 3: emit the full record as JSON matching the schema.
pub const RECORD_PROMPT: &str = r#"Assemble the final intelligence record.

Subject: {subject}
Product being sold: {goal}

Insights:
{insights}

Recommended approach:
{approach}

Output a single JSON object conforming exactly to this schema, with no
surrounding prose or code fences:

{schema}"#;

/// Hash a prompt for cache keying (first 16 hex chars of SHA-256).
pub fn prompt_hash(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Render probe hits for prompt embedding.
pub fn format_probe(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "(no results)".to_string();
    }
    hits.iter()
        .map(|h| format!("- {} — {}\n  {}", h.title, h.url, h.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render gathered sources for prompt embedding.
pub fn format_sources(sources: &[Source]) -> String {
    if sources.is_empty() {
        return "(no sources gathered)".to_string();
    }
    sources
        .iter()
        .map(|s| format!("[{}] {} ({})\n{}", s.kind, s.title, s.origin, s.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn format_probe_digest_prompt(subject: &str, goal: &str, probe: &str) -> String {
    PROBE_DIGEST_PROMPT
        .replace("{subject}", subject)
        .replace("{goal}", goal)
        .replace("{probe}", probe)
}

pub fn format_fetch_plan_prompt(digest: &str) -> String {
    FETCH_PLAN_PROMPT.replace("{digest}", digest)
}

pub fn format_skip_decision_prompt(plan: &str) -> String {
    SKIP_DECISION_PROMPT.replace("{plan}", plan)
}

pub fn format_insight_prompt(
    subject: &str,
    goal: &str,
    strategy: &ResearchStrategy,
    sources: &str,
) -> String {
    let focus = if strategy.focus_areas.is_empty() {
        "general".to_string()
    } else {
        strategy
            .focus_areas
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    INSIGHT_PROMPT
        .replace("{subject}", subject)
        .replace("{goal}", goal)
        .replace("{focus}", &focus)
        .replace("{sources}", sources)
}

pub fn format_approach_prompt(subject: &str, goal: &str, insights: &str) -> String {
    APPROACH_PROMPT
        .replace("{subject}", subject)
        .replace("{goal}", goal)
        .replace("{insights}", insights)
}

pub fn format_record_prompt(
    subject: &str,
    goal: &str,
    insights: &str,
    approach: &str,
    schema: &str,
) -> String {
    RECORD_PROMPT
        .replace("{subject}", subject)
        .replace("{goal}", goal)
        .replace("{insights}", insights)
        .replace("{approach}", approach)
        .replace("{schema}", schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_hash_is_stable_and_short() {
        let a = prompt_hash("same prompt");
        let b = prompt_hash("same prompt");
        let c = prompt_hash("different prompt");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn placeholders_are_filled() {
        let prompt = format_probe_digest_prompt("Jane Doe", "ScanTech", "- hit");
        assert!(prompt.contains("Jane Doe"));
        assert!(prompt.contains("ScanTech"));
        assert!(prompt.contains("- hit"));
        assert!(!prompt.contains("{subject}"));
    }

    #[test]
    fn empty_probe_renders_placeholder() {
        assert_eq!(format_probe(&[]), "(no results)");
    }
}
