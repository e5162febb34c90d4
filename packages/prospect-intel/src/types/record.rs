//! The final intelligence record and the draft shape the reasoning
//! provider must emit.
//!
//! `RecordDraft` is what the structured-output call parses into; it derives
//! `JsonSchema` so the synthesis prompt can embed the exact expected shape.
//! `IntelligenceRecord` is the draft plus everything the pipeline measured
//! around it (sources, confidence, timing).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::source::Source;

/// Who the subject is, as far as research could establish.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProspectProfile {
    /// Subject name as researched
    pub name: String,

    /// Practice or organization name
    #[serde(default)]
    pub organization: Option<String>,

    /// City/region if discovered
    #[serde(default)]
    pub location: Option<String>,

    /// Specialty or vertical
    #[serde(default)]
    pub specialty: Option<String>,

    /// Website if confirmed
    #[serde(default)]
    pub website: Option<String>,
}

/// Recommended way to open and run the sales conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ApproachPlan {
    /// The angle to open with
    #[serde(default)]
    pub opening_angle: String,

    /// Talking points in priority order
    #[serde(default)]
    pub talking_points: Vec<String>,

    /// Objections to expect, with suggested handling
    #[serde(default)]
    pub likely_objections: Vec<String>,
}

/// The shape the reasoning provider must emit from the structured call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RecordDraft {
    /// Practice profile
    pub profile: ProspectProfile,

    /// Technology the subject appears to run today
    #[serde(default)]
    pub technology: Vec<String>,

    /// Gaps where the goal product could land
    #[serde(default)]
    pub technology_gaps: Vec<String>,

    /// Signals suggesting readiness to buy
    #[serde(default)]
    pub buying_signals: Vec<String>,

    /// Operational pain points surfaced by the evidence
    #[serde(default)]
    pub pain_points: Vec<String>,

    /// Approach strategy
    #[serde(default)]
    pub approach: ApproachPlan,

    /// Best guesses at who makes the buying decision
    #[serde(default)]
    pub decision_makers: Vec<String>,

    /// Natural-language sales brief
    #[serde(default)]
    pub sales_brief: String,
}

/// One contribution to the confidence score, for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreFactor {
    /// What earned the points
    pub label: String,

    /// Points contributed (post-cap)
    pub points: f32,
}

/// The final output of a research request. Created once, never mutated
/// after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceRecord {
    /// Subject the research was about
    pub subject: String,

    /// Product/goal the research was for
    pub goal: String,

    /// Synthesized content
    pub draft: RecordDraft,

    /// 0-100 confidence in the record
    pub confidence_score: u8,

    /// Breakdown of how the score was earned
    pub confidence_factors: Vec<ScoreFactor>,

    /// Evidence the record was built from, in collection order
    pub sources: Vec<Source>,

    /// Wall-clock duration of the request
    pub elapsed_ms: u64,

    /// False when the sales brief came from the deterministic fallback
    /// template rather than the reasoning provider
    pub synthesized: bool,

    /// When the record was produced
    pub generated_at: DateTime<Utc>,
}

impl IntelligenceRecord {
    /// Assemble a record from its parts.
    pub fn new(subject: impl Into<String>, goal: impl Into<String>, draft: RecordDraft) -> Self {
        Self {
            subject: subject.into(),
            goal: goal.into(),
            draft,
            confidence_score: 0,
            confidence_factors: Vec::new(),
            sources: Vec::new(),
            elapsed_ms: 0,
            synthesized: true,
            generated_at: Utc::now(),
        }
    }

    /// Attach the collected sources.
    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    /// Attach the confidence result.
    pub fn with_confidence(mut self, score: u8, factors: Vec<ScoreFactor>) -> Self {
        self.confidence_score = score;
        self.confidence_factors = factors;
        self
    }

    /// Record the elapsed time.
    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    /// Mark the record as built from the fallback template.
    pub fn mark_fallback(mut self) -> Self {
        self.synthesized = false;
        self
    }
}
