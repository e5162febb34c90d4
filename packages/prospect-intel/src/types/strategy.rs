//! Research strategy built once per request by the planner.
//!
//! The strategy is pure data: which queries to run, what to skip, and what
//! the synthesis should focus on. The planner builds it; everything
//! downstream reads it.

use serde::{Deserialize, Serialize};
use url::Url;

/// Angle the research should emphasize, derived from the goal and probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusArea {
    /// What tools/systems the subject already runs
    CurrentTechnology,

    /// Day-to-day operational bottlenecks
    WorkflowEfficiency,

    /// Expansion, hiring, new-location signals
    Growth,

    /// Public reviews and reputation
    Reputation,

    /// Competing vendors already in the account
    Competition,
}

impl FocusArea {
    /// Stable label for prompts and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusArea::CurrentTechnology => "current-technology",
            FocusArea::WorkflowEfficiency => "workflow-efficiency",
            FocusArea::Growth => "growth",
            FocusArea::Reputation => "reputation",
            FocusArea::Competition => "competition",
        }
    }
}

impl std::fmt::Display for FocusArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How deep to probe review sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDepth {
    /// Don't probe reviews at all
    Skip,

    /// Single reduced query (planner judged reviews low priority)
    Reduced,

    /// Full review query set
    Full,
}

/// The planned follow-up fetches and skip decisions for one request.
///
/// Built once by [`StrategyPlanner`](crate::pipeline::StrategyPlanner),
/// read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchStrategy {
    /// Follow-up search queries, in planner priority order
    pub queries: Vec<String>,

    /// Skip extracting the candidate site (set when none was found,
    /// or the planner judged extraction not worth the cost)
    pub skip_site_extraction: bool,

    /// Review probe depth
    pub review_depth: ReviewDepth,

    /// Angles synthesis should emphasize
    pub focus_areas: Vec<FocusArea>,

    /// Questions the final record should answer
    pub key_questions: Vec<String>,

    /// Best guess at the subject's own website
    pub candidate_site: Option<Url>,

    /// Competitor vendor names worth probing for
    pub known_competitors: Vec<String>,
}

impl ResearchStrategy {
    /// Hand-authored default used whenever a planner pass cannot be parsed.
    ///
    /// Fixed query templates from subject/goal, all skip flags false,
    /// generic focus areas. The pipeline never blocks on planner failure.
    pub fn fallback(subject: &str, goal: &str) -> Self {
        Self {
            queries: vec![
                format!("{subject} practice"),
                format!("{subject} reviews"),
                format!("{subject} {goal}"),
            ],
            skip_site_extraction: false,
            review_depth: ReviewDepth::Full,
            focus_areas: vec![FocusArea::Reputation, FocusArea::CurrentTechnology],
            key_questions: vec![
                format!("What does {subject} currently use where {goal} would fit?"),
                format!("Who decides purchases for {subject}?"),
            ],
            candidate_site: None,
            known_competitors: Vec::new(),
        }
    }

    /// Set the candidate site and clear the extraction skip flag.
    pub fn with_candidate_site(mut self, site: Url) -> Self {
        self.candidate_site = Some(site);
        self.skip_site_extraction = false;
        self
    }

    /// Add a focus area if not already present.
    pub fn add_focus(&mut self, focus: FocusArea) {
        if !self.focus_areas.contains(&focus) {
            self.focus_areas.push(focus);
        }
    }

    /// Number of fetch tasks this strategy will spawn.
    pub fn planned_task_count(&self) -> usize {
        let site = usize::from(self.candidate_site.is_some() && !self.skip_site_extraction);
        let reviews = usize::from(self.review_depth != ReviewDepth::Skip);
        site + reviews + self.queries.len() + self.known_competitors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_mentions_subject_and_goal() {
        let strategy = ResearchStrategy::fallback("Jane Doe", "ScanTech");
        assert!(strategy.queries.iter().any(|q| q.contains("Jane Doe")));
        assert!(strategy.queries.iter().any(|q| q.contains("ScanTech")));
        assert!(!strategy.skip_site_extraction);
        assert_eq!(strategy.review_depth, ReviewDepth::Full);
    }

    #[test]
    fn candidate_site_clears_skip_flag() {
        let strategy = ResearchStrategy::fallback("Jane Doe", "ScanTech")
            .with_candidate_site(Url::parse("https://janedoedental.com").unwrap());
        assert!(!strategy.skip_site_extraction);
        assert!(strategy.candidate_site.is_some());
    }

    #[test]
    fn add_focus_deduplicates() {
        let mut strategy = ResearchStrategy::fallback("s", "g");
        let before = strategy.focus_areas.len();
        strategy.add_focus(FocusArea::Reputation);
        assert_eq!(strategy.focus_areas.len(), before);
        strategy.add_focus(FocusArea::Growth);
        assert_eq!(strategy.focus_areas.len(), before + 1);
    }

    #[test]
    fn task_count_tracks_flags() {
        let mut strategy = ResearchStrategy::fallback("s", "g");
        let base = strategy.planned_task_count();
        strategy.review_depth = ReviewDepth::Skip;
        assert_eq!(strategy.planned_task_count(), base - 1);
    }
}
