//! Domain data types: sources, strategies, and the intelligence record.

pub mod record;
pub mod source;
pub mod strategy;

pub use record::{
    ApproachPlan, IntelligenceRecord, ProspectProfile, RecordDraft, ScoreFactor,
};
pub use source::{Source, SourceKind, MAX_SOURCE_CONTENT};
pub use strategy::{FocusArea, ResearchStrategy, ReviewDepth};
