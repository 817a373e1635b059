//! Multi-source search: concurrent fan-out, then merge.
//!
//! [`SearchOrchestrator`] sends one query to every selected source and waits
//! for all of them; [`ResultMerger`] deduplicates and ranks what came back.

mod merge;
mod orchestrator;

pub use merge::{ResultMerger, SearchReport};
pub use orchestrator::{
    FailureReason, FanOut, SearchOrchestrator, SourceBatch, SourceOutcome, SourceStatus,
    DEFAULT_SOURCE_TIMEOUT,
};
