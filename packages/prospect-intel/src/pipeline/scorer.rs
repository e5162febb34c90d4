//! Confidence scoring for the assembled record.
//!
//! The subject's identity arrives pre-verified from a registry lookup
//! upstream, so the base is 80, not 50: evidence bonuses refine an
//! already-trusted identity rather than establish one. Bonuses are additive
//! and individually capped; adding a qualifying signal can never lower the
//! score (the clamp keeps that monotone too).

use std::collections::HashSet;

use crate::types::{RecordDraft, ResearchStrategy, ScoreFactor, Source, SourceKind};

/// Base score when identity came from a verified registry lookup.
const BASE_VERIFIED: f32 = 80.0;

/// Base score without upstream verification.
const BASE_UNVERIFIED: f32 = 50.0;

/// Bonus when the candidate site was actually fetched.
const SITE_FETCH_BONUS: f32 = 8.0;

/// Bonus when review sources were found.
const REVIEW_BONUS: f32 = 5.0;

/// Bonus when competitor/vendor mentions were found.
const COMPETITOR_BONUS: f32 = 3.0;

/// Bonus when the strategy carries nonempty focus areas.
const FOCUS_BONUS: f32 = 2.0;

/// Per-distinct-source-kind diversity bonus, capped.
const DIVERSITY_PER_KIND: f32 = 1.5;
const DIVERSITY_CAP: f32 = 8.0;

/// Cap for the key-question-coverage bonus.
const QUESTION_CAP: f32 = 8.0;

/// Bonus when the sales brief exceeds the minimum useful length.
const BRIEF_BONUS: f32 = 3.0;
const MIN_BRIEF_LEN: usize = 400;

/// Bonus when synthesized technology intersects domain keywords.
const TECH_BONUS: f32 = 5.0;
const TECH_KEYWORDS: &[&str] = &[
    "software",
    "scanner",
    "imaging",
    "crm",
    "cloud",
    "digital",
    "platform",
    "scheduling",
    "workflow",
];

/// Clamp range with verified identity: identity confidence dominates.
const VERIFIED_MIN: f32 = 85.0;
const VERIFIED_MAX: f32 = 98.0;

/// Clamp ceiling without verification.
const UNVERIFIED_MAX: f32 = 95.0;

/// The score plus the factor breakdown that produced it.
#[derive(Debug, Clone)]
pub struct ConfidenceReport {
    /// Final 0-100 score
    pub score: u8,

    /// What earned points, in evaluation order
    pub factors: Vec<ScoreFactor>,
}

/// Computes record confidence from sources, strategy, and synthesis output.
pub struct ConfidenceScorer {
    identity_verified: bool,
}

impl ConfidenceScorer {
    /// Create a scorer; `identity_verified` selects base and clamp range.
    pub fn new(identity_verified: bool) -> Self {
        Self { identity_verified }
    }

    /// Score the record.
    pub fn score(
        &self,
        sources: &[Source],
        strategy: &ResearchStrategy,
        draft: &RecordDraft,
    ) -> ConfidenceReport {
        let mut factors = Vec::new();
        let mut total = if self.identity_verified {
            factors.push(factor("verified identity base", BASE_VERIFIED));
            BASE_VERIFIED
        } else {
            factors.push(factor("unverified base", BASE_UNVERIFIED));
            BASE_UNVERIFIED
        };

        let add = |factors: &mut Vec<ScoreFactor>, label: &str, points: f32| {
            if points > 0.0 {
                factors.push(factor(label, points));
            }
            points
        };

        if sources.iter().any(|s| s.kind == SourceKind::PracticeSite) {
            total += add(&mut factors, "candidate site fetched", SITE_FETCH_BONUS);
        }
        if sources.iter().any(|s| s.kind == SourceKind::ReviewSite) {
            total += add(&mut factors, "review sources found", REVIEW_BONUS);
        }
        if sources.iter().any(|s| s.kind == SourceKind::CompetitorData) {
            total += add(&mut factors, "competitor mentions found", COMPETITOR_BONUS);
        }
        if !strategy.focus_areas.is_empty() {
            total += add(&mut factors, "focus areas identified", FOCUS_BONUS);
        }

        let distinct_kinds: HashSet<SourceKind> = sources.iter().map(|s| s.kind).collect();
        let diversity = (distinct_kinds.len() as f32 * DIVERSITY_PER_KIND).min(DIVERSITY_CAP);
        total += add(&mut factors, "source diversity", diversity);

        let coverage = question_coverage(&strategy.key_questions, draft);
        total += add(
            &mut factors,
            "key questions answered",
            coverage * QUESTION_CAP,
        );

        if draft.sales_brief.len() > MIN_BRIEF_LEN {
            total += add(&mut factors, "substantial sales brief", BRIEF_BONUS);
        }

        let tech_text = draft.technology.join(" ").to_lowercase();
        if TECH_KEYWORDS.iter().any(|k| tech_text.contains(k)) {
            total += add(&mut factors, "relevant technology identified", TECH_BONUS);
        }

        let clamped = if self.identity_verified {
            total.clamp(VERIFIED_MIN, VERIFIED_MAX)
        } else {
            total.clamp(0.0, UNVERIFIED_MAX)
        };

        ConfidenceReport {
            score: clamped.round() as u8,
            factors,
        }
    }
}

fn factor(label: &str, points: f32) -> ScoreFactor {
    ScoreFactor {
        label: label.to_string(),
        points,
    }
}

/// Fraction of key questions whose content words appear in the synthesis.
fn question_coverage(questions: &[String], draft: &RecordDraft) -> f32 {
    if questions.is_empty() {
        return 0.0;
    }

    let haystack = format!(
        "{} {} {} {} {}",
        draft.sales_brief,
        draft.technology.join(" "),
        draft.pain_points.join(" "),
        draft.buying_signals.join(" "),
        draft.approach.talking_points.join(" "),
    )
    .to_lowercase();

    let answered = questions
        .iter()
        .filter(|q| {
            let words: Vec<String> = q
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| w.len() > 3)
                .map(|w| w.to_string())
                .collect();
            if words.is_empty() {
                return false;
            }
            let matched = words.iter().filter(|w| haystack.contains(w.as_str())).count();
            matched * 2 >= words.len()
        })
        .count();

    answered as f32 / questions.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FocusArea, ReviewDepth};
    use proptest::prelude::*;

    fn strategy() -> ResearchStrategy {
        ResearchStrategy {
            queries: vec![],
            skip_site_extraction: false,
            review_depth: ReviewDepth::Full,
            focus_areas: vec![FocusArea::CurrentTechnology],
            key_questions: vec!["What imaging technology do they use today?".to_string()],
            candidate_site: None,
            known_competitors: vec![],
        }
    }

    fn source(kind: SourceKind) -> Source {
        Source::new(kind, "title", "origin", "content")
    }

    fn rich_draft() -> RecordDraft {
        RecordDraft {
            technology: vec!["legacy imaging software".to_string()],
            sales_brief: "x".repeat(MIN_BRIEF_LEN + 1),
            ..Default::default()
        }
    }

    #[test]
    fn verified_score_lands_in_verified_range() {
        let scorer = ConfidenceScorer::new(true);
        let report = scorer.score(&[], &strategy(), &RecordDraft::default());
        assert!(report.score >= 85 && report.score <= 98, "{}", report.score);
    }

    #[test]
    fn bonuses_accumulate_within_cap() {
        let scorer = ConfidenceScorer::new(true);
        let sources = vec![
            source(SourceKind::Probe),
            source(SourceKind::PracticeSite),
            source(SourceKind::ReviewSite),
            source(SourceKind::CompetitorData),
            source(SourceKind::ProductData),
        ];
        let report = scorer.score(&sources, &strategy(), &rich_draft());
        assert_eq!(report.score, 98); // sum exceeds the verified ceiling
        assert!(report.factors.len() > 5);
    }

    #[test]
    fn unverified_uses_lower_base_and_ceiling() {
        let scorer = ConfidenceScorer::new(false);
        let report = scorer.score(&[], &strategy(), &RecordDraft::default());
        assert!(report.score < 85);

        let sources: Vec<Source> = [
            SourceKind::Probe,
            SourceKind::PracticeSite,
            SourceKind::ReviewSite,
            SourceKind::CompetitorData,
            SourceKind::ProductData,
            SourceKind::Directory,
        ]
        .into_iter()
        .map(source)
        .collect();
        let high = ConfidenceScorer::new(false).score(&sources, &strategy(), &rich_draft());
        assert!(high.score <= 95);
    }

    #[test]
    fn site_fetch_adds_its_bonus_before_clamp() {
        let scorer = ConfidenceScorer::new(false); // unclamped region
        let without = scorer.score(&[], &strategy(), &RecordDraft::default());
        let with = scorer.score(
            &[source(SourceKind::PracticeSite)],
            &strategy(),
            &RecordDraft::default(),
        );
        // +8 site + 1.5 diversity (one distinct kind), modulo rounding
        let delta = i16::from(with.score) - i16::from(without.score);
        assert!((9..=10).contains(&delta), "delta {delta}");

        let site_factor = with
            .factors
            .iter()
            .find(|f| f.label == "candidate site fetched")
            .unwrap();
        assert_eq!(site_factor.points, SITE_FETCH_BONUS);
    }

    #[test]
    fn question_coverage_detects_answers() {
        let strategy = strategy();
        let mut draft = RecordDraft::default();
        assert_eq!(question_coverage(&strategy.key_questions, &draft), 0.0);

        draft.sales_brief =
            "They currently use outdated imaging technology from 2015.".to_string();
        assert_eq!(question_coverage(&strategy.key_questions, &draft), 1.0);
    }

    proptest! {
        /// Adding a qualifying source never decreases the score.
        #[test]
        fn adding_a_source_is_monotone(
            kinds in proptest::collection::vec(0usize..6, 0..8),
            extra in 0usize..6,
            verified in proptest::bool::ANY,
        ) {
            let all = [
                SourceKind::Directory,
                SourceKind::PracticeSite,
                SourceKind::ReviewSite,
                SourceKind::ProductData,
                SourceKind::CompetitorData,
                SourceKind::Probe,
            ];
            let scorer = ConfidenceScorer::new(verified);
            let strategy = strategy();
            let draft = rich_draft();

            let base_sources: Vec<Source> = kinds.iter().map(|&k| source(all[k])).collect();
            let mut more_sources = base_sources.clone();
            more_sources.push(source(all[extra]));

            let before = scorer.score(&base_sources, &strategy, &draft);
            let after = scorer.score(&more_sources, &strategy, &draft);
            prop_assert!(after.score >= before.score);
        }
    }
}
