//! Evidence sources collected during a research request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum stored content length per source, in bytes.
///
/// Scraped pages can run to hundreds of kilobytes; everything past this
/// bound adds cost to synthesis prompts without adding signal.
pub const MAX_SOURCE_CONTENT: usize = 8_000;

/// What kind of evidence a source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Listing on a directory/aggregator site
    Directory,

    /// The subject's own practice website
    PracticeSite,

    /// Review platform results
    ReviewSite,

    /// Information about the product being sold
    ProductData,

    /// Mentions of competing vendors
    CompetitorData,

    /// The cheap initial search probe
    Probe,
}

impl SourceKind {
    /// Stable label used in progress step ids and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Directory => "directory",
            SourceKind::PracticeSite => "practice-site",
            SourceKind::ReviewSite => "review-site",
            SourceKind::ProductData => "product-data",
            SourceKind::CompetitorData => "competitor-data",
            SourceKind::Probe => "probe",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of evidence contributing to the final record.
///
/// Sources are immutable once created and accumulate in per-request order.
/// Every source carries an `origin` (URI or logical name) and `observed_at`;
/// the constructor makes both unavoidable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Evidence category
    pub kind: SourceKind,

    /// Human-readable title
    pub title: String,

    /// URI or logical name of where the evidence came from
    pub origin: String,

    /// Bounded text/snapshot of the evidence
    pub content: String,

    /// How much this source should sway confidence (0-100)
    pub confidence_weight: u8,

    /// When the evidence was observed
    pub observed_at: DateTime<Utc>,
}

impl Source {
    /// Create a new source. Content is truncated to [`MAX_SOURCE_CONTENT`].
    pub fn new(
        kind: SourceKind,
        title: impl Into<String>,
        origin: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut content = content.into();
        if content.len() > MAX_SOURCE_CONTENT {
            let mut cut = MAX_SOURCE_CONTENT;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content.truncate(cut);
        }
        Self {
            kind,
            title: title.into(),
            origin: origin.into(),
            content,
            confidence_weight: default_weight(kind),
            observed_at: Utc::now(),
        }
    }

    /// Override the confidence weight (clamped to 100).
    pub fn with_weight(mut self, weight: u8) -> Self {
        self.confidence_weight = weight.min(100);
        self
    }

    /// Whether the source carries any usable content.
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Default confidence weight per source kind.
fn default_weight(kind: SourceKind) -> u8 {
    match kind {
        SourceKind::PracticeSite => 80,
        SourceKind::Directory => 60,
        SourceKind::ReviewSite => 55,
        SourceKind::ProductData => 50,
        SourceKind::CompetitorData => 40,
        SourceKind::Probe => 35,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_bounded() {
        let long = "x".repeat(MAX_SOURCE_CONTENT * 2);
        let source = Source::new(SourceKind::PracticeSite, "Site", "https://example.com", long);
        assert_eq!(source.content.len(), MAX_SOURCE_CONTENT);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut long = "é".repeat(MAX_SOURCE_CONTENT / 2);
        long.push_str("trailing");
        let source = Source::new(SourceKind::Probe, "Probe", "search", long);
        assert!(source.content.len() <= MAX_SOURCE_CONTENT);
        // Must not panic and must still be valid UTF-8 (guaranteed by String)
        assert!(source.content.starts_with('é'));
    }

    #[test]
    fn weight_is_clamped() {
        let source =
            Source::new(SourceKind::Probe, "p", "search", "text").with_weight(200);
        assert_eq!(source.confidence_weight, 100);
    }

    #[test]
    fn empty_content_detected() {
        let source = Source::new(SourceKind::ReviewSite, "r", "reviews", "   ");
        assert!(!source.has_content());
    }
}
