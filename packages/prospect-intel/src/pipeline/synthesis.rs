//! Record synthesis: merges sources + strategy into the final draft.
//!
//! Two chained reasoning passes (insight distillation, approach
//! recommendation) feed one structured-output call that must emit the full
//! record shape. The output is parsed into a tagged
//! [`SynthesisOutcome`] (`Parsed` or `Malformed`) instead of relying on
//! exceptions-as-control-flow; a malformed payload drops deterministically
//! to the templated fallback record. The fallback path is first-class,
//! tested behavior, not an error state.

use std::sync::Arc;

use super::prompts::{
    format_approach_prompt, format_insight_prompt, format_record_prompt, format_sources,
    prompt_hash,
};
use super::strip_code_fences;
use crate::cache::cache_key;
use crate::config::SYNTHESIS_TTL;
use crate::error::Result;
use crate::gateway::{CallOptions, ProviderGateway, ProviderKind};
use crate::providers::Reasoner;
use crate::types::{ApproachPlan, ProspectProfile, RecordDraft, ResearchStrategy, Source};

/// Tagged result of parsing the structured-output call.
#[derive(Debug)]
pub enum SynthesisOutcome {
    /// The provider emitted a well-formed record
    Parsed(RecordDraft),

    /// The provider emitted something else; raw text kept for logging
    Malformed { raw: String },
}

/// Parse the reasoning provider's structured output.
///
/// The payload is trimmed of any enclosing code fence and must open with
/// the expected structural start token (`{`).
pub fn parse_record_response(text: &str) -> SynthesisOutcome {
    let cleaned = strip_code_fences(text);
    if !cleaned.starts_with('{') {
        return SynthesisOutcome::Malformed {
            raw: text.to_string(),
        };
    }
    match serde_json::from_str::<RecordDraft>(cleaned) {
        Ok(draft) => SynthesisOutcome::Parsed(draft),
        Err(e) => {
            tracing::debug!(error = %e, "record payload did not parse");
            SynthesisOutcome::Malformed {
                raw: text.to_string(),
            }
        }
    }
}

/// A draft plus how it was produced.
pub struct SynthesisResult {
    /// The record content
    pub draft: RecordDraft,

    /// True when the deterministic template produced the draft
    pub from_fallback: bool,
}

/// Synthesizes the final record through the reasoning provider.
pub struct SynthesisEngine {
    gateway: Arc<ProviderGateway>,
    reasoner: Arc<dyn Reasoner>,
}

impl SynthesisEngine {
    /// Create an engine over the shared gateway.
    pub fn new(gateway: Arc<ProviderGateway>, reasoner: Arc<dyn Reasoner>) -> Self {
        Self { gateway, reasoner }
    }

    /// Produce the record draft. Never fails: reasoning or parse trouble
    /// degrades to [`SynthesisEngine::fallback_draft`].
    pub async fn synthesize(
        &self,
        subject: &str,
        goal: &str,
        strategy: &ResearchStrategy,
        sources: &[Source],
    ) -> SynthesisResult {
        match self.reasoned_record(subject, goal, strategy, sources).await {
            Ok(SynthesisOutcome::Parsed(mut draft)) => {
                if draft.profile.name.trim().is_empty() {
                    draft.profile.name = subject.to_string();
                }
                if draft.sales_brief.trim().is_empty() {
                    draft.sales_brief = fallback_brief(subject, goal, strategy, sources);
                }
                SynthesisResult {
                    draft,
                    from_fallback: false,
                }
            }
            Ok(SynthesisOutcome::Malformed { raw }) => {
                tracing::warn!(
                    raw_length = raw.len(),
                    "synthesis output malformed, using fallback record"
                );
                SynthesisResult {
                    draft: Self::fallback_draft(subject, goal, strategy, sources),
                    from_fallback: true,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "synthesis passes failed, using fallback record");
                SynthesisResult {
                    draft: Self::fallback_draft(subject, goal, strategy, sources),
                    from_fallback: true,
                }
            }
        }
    }

    async fn reasoned_record(
        &self,
        subject: &str,
        goal: &str,
        strategy: &ResearchStrategy,
        sources: &[Source],
    ) -> Result<SynthesisOutcome> {
        let digest = format_sources(sources);

        let insights = self
            .reason(
                "synth-insights",
                format_insight_prompt(subject, goal, strategy, &digest),
            )
            .await?;
        let approach = self
            .reason(
                "synth-approach",
                format_approach_prompt(subject, goal, &insights),
            )
            .await?;

        let schema = record_schema_json()?;
        let raw = self
            .reason(
                "synth-record",
                format_record_prompt(subject, goal, &insights, &approach, &schema),
            )
            .await?;

        Ok(parse_record_response(&raw))
    }

    /// Deterministic record used whenever synthesis cannot produce one.
    pub fn fallback_draft(
        subject: &str,
        goal: &str,
        strategy: &ResearchStrategy,
        sources: &[Source],
    ) -> RecordDraft {
        RecordDraft {
            profile: ProspectProfile {
                name: subject.to_string(),
                website: strategy.candidate_site.as_ref().map(|u| u.to_string()),
                ..Default::default()
            },
            approach: ApproachPlan {
                opening_angle: format!(
                    "Introduce {goal} around the workflow questions the research left open."
                ),
                talking_points: strategy.key_questions.clone(),
                likely_objections: Vec::new(),
            },
            sales_brief: fallback_brief(subject, goal, strategy, sources),
            ..Default::default()
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

/// Pretty-printed JSON schema for the record shape, embedded in the
/// structured-output prompt.
fn record_schema_json() -> Result<String> {
    let schema = schemars::schema_for!(RecordDraft);
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// Three fixed sections: overview, opportunity, recommended approach.
fn fallback_brief(
    subject: &str,
    goal: &str,
    strategy: &ResearchStrategy,
    sources: &[Source],
) -> String {
    let questions = if strategy.key_questions.is_empty() {
        format!("- How {goal} would fit the current workflow\n")
    } else {
        strategy
            .key_questions
            .iter()
            .map(|q| format!("- {q}\n"))
            .collect()
    };

    let site_line = match &strategy.candidate_site {
        Some(site) => format!("Their website appears to be {site}."),
        None => "No dedicated website was confirmed during research.".to_string(),
    };

    format!(
        "## Overview\n\
         {subject} was researched as a prospect for {goal}. {site_line} \
         {} source(s) of evidence were collected.\n\n\
         ## Opportunity\n\
         The conversation should establish:\n{questions}\n\
         ## Recommended approach\n\
         Open with a short discovery call framed around {goal}. Confirm the \
         points above directly with {subject} before proposing next steps.",
        sources.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TieredCache;
    use crate::config::EngineConfig;
    use crate::credentials::CredentialPool;
    use crate::testing::MockReasoner;
    use crate::types::SourceKind;

    fn engine(reasoner: MockReasoner) -> SynthesisEngine {
        let cache = Arc::new(TieredCache::in_memory(None));
        let pool = Arc::new(
            CredentialPool::new().with_credentials(ProviderKind::Reasoning, ["rk-test"]),
        );
        let gateway = Arc::new(ProviderGateway::new(cache, pool, &EngineConfig::new()));
        SynthesisEngine::new(gateway, Arc::new(reasoner))
    }

    fn strategy() -> ResearchStrategy {
        ResearchStrategy::fallback("Jane Doe", "ScanTech")
    }

    #[test]
    fn parse_accepts_fenced_json() {
        let outcome = parse_record_response(
            "```json\n{\"profile\": {\"name\": \"Jane Doe\"}, \"sales_brief\": \"ok\"}\n```",
        );
        match outcome {
            SynthesisOutcome::Parsed(draft) => assert_eq!(draft.profile.name, "Jane Doe"),
            SynthesisOutcome::Malformed { .. } => panic!("expected parse"),
        }
    }

    #[test]
    fn parse_rejects_prose_and_bad_json() {
        assert!(matches!(
            parse_record_response("Here is your record: it went great."),
            SynthesisOutcome::Malformed { .. }
        ));
        assert!(matches!(
            parse_record_response("{\"profile\": "),
            SynthesisOutcome::Malformed { .. }
        ));
    }

    #[tokio::test]
    async fn well_formed_output_synthesizes() {
        let reasoner = MockReasoner::new()
            .with_response_for("Distill sales-relevant insights", "They use old scanners.")
            .with_response_for("Recommend a sales approach", "Lead with imaging upgrades.")
            .with_response_for(
                "Assemble the final intelligence record",
                r#"{
                    "profile": {"name": "Jane Doe", "organization": "Jane Doe Dental"},
                    "technology": ["legacy imaging software"],
                    "sales_brief": "Jane Doe runs a practice ready for ScanTech."
                }"#,
            );
        let engine = engine(reasoner);

        let result = engine
            .synthesize("Jane Doe", "ScanTech", &strategy(), &[])
            .await;

        assert!(!result.from_fallback);
        assert_eq!(
            result.draft.profile.organization.as_deref(),
            Some("Jane Doe Dental")
        );
    }

    #[tokio::test]
    async fn malformed_output_falls_back_deterministically() {
        let reasoner =
            MockReasoner::new().with_default_response("Sorry, I can't produce JSON right now.");
        let engine = engine(reasoner);

        let sources = vec![Source::new(SourceKind::Probe, "p", "search", "text")];
        let result = engine
            .synthesize("Jane Doe", "ScanTech", &strategy(), &sources)
            .await;

        assert!(result.from_fallback);
        assert!(result.draft.sales_brief.contains("Jane Doe"));
        assert!(result.draft.sales_brief.contains("ScanTech"));
        assert!(result.draft.sales_brief.contains("## Overview"));
        assert!(result.draft.sales_brief.contains("## Opportunity"));
        assert!(result.draft.sales_brief.contains("## Recommended approach"));
    }

    #[tokio::test]
    async fn parsed_output_with_empty_name_is_repaired() {
        let reasoner = MockReasoner::new()
            .with_response_for("Distill sales-relevant insights", "insights")
            .with_response_for("Recommend a sales approach", "approach")
            .with_response_for(
                "Assemble the final intelligence record",
                r#"{"profile": {"name": ""}, "sales_brief": ""}"#,
            );
        let engine = engine(reasoner);

        let result = engine
            .synthesize("Jane Doe", "ScanTech", &strategy(), &[])
            .await;

        assert!(!result.from_fallback);
        assert_eq!(result.draft.profile.name, "Jane Doe");
        assert!(result.draft.sales_brief.contains("ScanTech"));
    }

    #[test]
    fn schema_embeds_record_fields() {
        let schema = record_schema_json().unwrap();
        assert!(schema.contains("sales_brief"));
        assert!(schema.contains("technology_gaps"));
    }
}
