//! Core data models for research papers, search requests and citation graphs.

mod citation;
mod paper;
mod search;

pub use citation::{CitationEdge, CitationGraph, CitationNode, Direction, Expansion, GraphState};
pub use paper::{PaperBuilder, PaperKey, PaperMetrics, PaperRecord, SourceType};
pub use search::{DateRange, Ranking, SearchFilters, SearchQuery};
