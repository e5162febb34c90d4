//! Strategy planner: decides which follow-up fetches are worth their cost.
//!
//! Runs three sequential reasoning passes over the probe result, each pass
//! textually extending the previous one ("what do we know" → "what should
//! we fetch" → "what can we skip"). Heuristics run locally regardless:
//! focus areas come from goal/probe keyword rules and the candidate site
//! comes from denylist filtering; those never depend on the LLM. Any pass
//! that fails or parses badly drops the whole chain to the hand-authored
//! fallback strategy; the pipeline never blocks on planner failure.

use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use super::prompts::{
    format_fetch_plan_prompt, format_probe, format_probe_digest_prompt,
    format_skip_decision_prompt, prompt_hash,
};
use super::strip_code_fences;
use crate::cache::cache_key;
use crate::config::SYNTHESIS_TTL;
use crate::error::Result;
use crate::gateway::{CallOptions, ProviderGateway, ProviderKind};
use crate::providers::{Reasoner, SearchHit};
use crate::types::{FocusArea, ResearchStrategy, ReviewDepth};

/// Directory/aggregator domains that are never the subject's own site.
const DIRECTORY_DOMAINS: &[&str] = &[
    "yelp.com",
    "yellowpages.com",
    "healthgrades.com",
    "zocdoc.com",
    "ratemds.com",
    "vitals.com",
    "bbb.org",
    "mapquest.com",
    "linkedin.com",
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "youtube.com",
    "wikipedia.org",
    "google.com",
];

/// Goal keywords that put technology and workflow in focus.
const SOFTWARE_CUES: &[&str] = &["software", "saas", "platform", "app", "system", "suite", "cloud"];

/// Probe-text keywords that signal growth.
const GROWTH_CUES: &[&str] = &[
    "expanding",
    "expansion",
    "hiring",
    "new location",
    "now open",
    "opening",
    "growing",
];

/// Probe-text keywords that signal existing technology adoption.
const TECH_CUES: &[&str] = &[
    "online booking",
    "patient portal",
    "digital",
    "automated",
    "paperless",
];

/// Structured output expected from the third planner pass.
#[derive(Debug, Deserialize)]
struct PlannerResponse {
    #[serde(default)]
    queries: Vec<String>,

    #[serde(default)]
    key_questions: Vec<String>,

    #[serde(default)]
    review_priority: Option<String>,

    #[serde(default)]
    skip_site_extraction: Option<bool>,

    #[serde(default)]
    competitors: Vec<String>,
}

/// Plans one request's follow-up fetches from the probe result.
pub struct StrategyPlanner {
    gateway: Arc<ProviderGateway>,
    reasoner: Arc<dyn Reasoner>,
}

impl StrategyPlanner {
    /// Create a planner over the shared gateway.
    pub fn new(gateway: Arc<ProviderGateway>, reasoner: Arc<dyn Reasoner>) -> Self {
        Self { gateway, reasoner }
    }

    /// Build the strategy for one request. Never fails: reasoning trouble
    /// degrades to [`ResearchStrategy::fallback`].
    pub async fn plan(&self, subject: &str, goal: &str, probe: &[SearchHit]) -> ResearchStrategy {
        let mut strategy = match self.reasoned_plan(subject, goal, probe).await {
            Ok(strategy) => strategy,
            Err(e) => {
                tracing::warn!(error = %e, "planner passes failed, using fallback strategy");
                ResearchStrategy::fallback(subject, goal)
            }
        };

        // Local heuristics apply on top of whatever the passes produced.
        let probe_text = probe_text(probe);
        for focus in focus_areas_for(goal, &probe_text) {
            strategy.add_focus(focus);
        }

        // The candidate site is always computed locally; an explicit skip
        // from the reasoner stands, but an absent candidate forces one.
        match candidate_site(subject, probe) {
            Some(site) => strategy.candidate_site = Some(site),
            None => {
                strategy.candidate_site = None;
                strategy.skip_site_extraction = true;
            }
        }

        tracing::info!(
            queries = strategy.queries.len(),
            focus_areas = strategy.focus_areas.len(),
            candidate_site = strategy.candidate_site.as_ref().map(|u| u.as_str()),
            review_depth = ?strategy.review_depth,
            "strategy planned"
        );

        strategy
    }

    async fn reasoned_plan(
        &self,
        subject: &str,
        goal: &str,
        probe: &[SearchHit],
    ) -> Result<ResearchStrategy> {
        let digest = self
            .reason(
                "plan-digest",
                format_probe_digest_prompt(subject, goal, &format_probe(probe)),
            )
            .await?;
        let fetch_plan = self
            .reason("plan-fetches", format_fetch_plan_prompt(&digest))
            .await?;
        let decisions = self
            .reason("plan-skips", format_skip_decision_prompt(&fetch_plan))
            .await?;

        let parsed: PlannerResponse = serde_json::from_str(strip_code_fences(&decisions))?;
        Ok(self.build_strategy(subject, goal, parsed, &fetch_plan))
    }

    fn build_strategy(
        &self,
        subject: &str,
        goal: &str,
        parsed: PlannerResponse,
        plan_text: &str,
    ) -> ResearchStrategy {
        let fallback = ResearchStrategy::fallback(subject, goal);

        let queries = if parsed.queries.is_empty() {
            fallback.queries.clone()
        } else {
            parsed.queries
        };

        let key_questions = if parsed.key_questions.is_empty() {
            fallback.key_questions.clone()
        } else {
            parsed.key_questions
        };

        let plan_lowered = plan_text.to_lowercase();
        let review_depth = match parsed.review_priority.as_deref() {
            Some("skip") => ReviewDepth::Skip,
            Some("low") => ReviewDepth::Reduced,
            Some(_) => ReviewDepth::Full,
            None if plan_lowered.contains("reviews are low priority")
                || plan_lowered.contains("skip reviews") =>
            {
                ReviewDepth::Reduced
            }
            None => ReviewDepth::Full,
        };

        ResearchStrategy {
            queries,
            skip_site_extraction: parsed.skip_site_extraction.unwrap_or(false),
            review_depth,
            focus_areas: Vec::new(),
            key_questions,
            candidate_site: None,
            known_competitors: parsed.competitors,
        }
    }

    async fn reason(&self, label: &str, prompt: String) -> Result<String> {
        let key = cache_key("reasoning", &[label, &prompt_hash(&prompt)]);
        let reasoner = self.reasoner.clone();
        let text = self
            .gateway
            .call(
                ProviderKind::Reasoning,
                CallOptions::cached(key, SYNTHESIS_TTL),
                move |token| {
                    let reasoner = reasoner.clone();
                    let prompt = prompt.clone();
                    async move { reasoner.complete(&token, &prompt).await }
                },
            )
            .await?;
        Ok(text)
    }
}

/// Whether a URL belongs to a known directory/aggregator domain.
pub fn is_directory_domain(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    DIRECTORY_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

/// Pick the best-guess subject website from probe hits.
///
/// Directory domains are excluded outright; among the rest, URLs whose host
/// or title textually matches the subject's name win, falling back to the
/// first non-directory hit.
pub fn candidate_site(subject: &str, probe: &[SearchHit]) -> Option<Url> {
    let tokens: Vec<String> = subject
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect();

    let mut best: Option<(usize, Url)> = None;
    for hit in probe {
        let Ok(url) = Url::parse(&hit.url) else {
            continue;
        };
        if is_directory_domain(&url) {
            continue;
        }

        let host = url.host_str().unwrap_or_default().to_lowercase();
        let title = hit.title.to_lowercase();
        let score = tokens
            .iter()
            .map(|t| {
                let host_token = t.replace('-', "");
                usize::from(host.contains(&host_token)) * 2 + usize::from(title.contains(t))
            })
            .sum::<usize>();

        match &best {
            Some((best_score, _)) if *best_score >= score => {}
            _ => best = Some((score, url)),
        }
    }

    best.map(|(_, url)| url)
}

/// Focus areas from goal keywords and probe-text cues.
pub fn focus_areas_for(goal: &str, probe_text: &str) -> Vec<FocusArea> {
    let goal_lowered = goal.to_lowercase();
    let probe_lowered = probe_text.to_lowercase();
    let mut areas: Vec<FocusArea> = Vec::new();
    let add = |areas: &mut Vec<FocusArea>, area: FocusArea| {
        if !areas.contains(&area) {
            areas.push(area);
        }
    };

    if SOFTWARE_CUES.iter().any(|cue| goal_lowered.contains(cue)) {
        add(&mut areas, FocusArea::CurrentTechnology);
        add(&mut areas, FocusArea::WorkflowEfficiency);
    }
    if TECH_CUES.iter().any(|cue| probe_lowered.contains(cue)) {
        add(&mut areas, FocusArea::CurrentTechnology);
    }
    if GROWTH_CUES.iter().any(|cue| probe_lowered.contains(cue)) {
        add(&mut areas, FocusArea::Growth);
    }
    if probe_lowered.contains("review") || probe_lowered.contains("rating") {
        add(&mut areas, FocusArea::Reputation);
    }

    areas
}

fn probe_text(probe: &[SearchHit]) -> String {
    probe
        .iter()
        .map(|h| format!("{} {}", h.title, h.snippet))
        .collect::<Vec<_>>()
        .join(" ")
}
