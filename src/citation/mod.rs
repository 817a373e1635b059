//! Citation network analysis: traversal, scoring, recommendations, impact
//! and paper comparison.

mod compare;
mod engine;
mod impact;
mod scoring;

pub use compare::{
    ComparisonAspect, ComparisonReport, FieldComparison, ImpactComparison, LookupFailure,
    TimelineComparison, MAX_COMPARED, MIN_COMPARED,
};
pub use engine::{CitationGraphEngine, TraversalLimits, MAX_DEPTH, MIN_DEPTH};
pub use impact::{ImpactInsight, ImpactLevel, ImpactReport};
pub use scoring::{rank_suggestions, recommend, score_graph, Recommendation, Strategy, StrategyWeights};
