//! Request-level errors.
//!
//! These abort a request before (or instead of) returning data. Failures of a
//! single source during a fan-out never become a `ResearchError`; they are
//! reported per source in the search status list.

use std::time::Duration;

use crate::sources::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    /// The selector names no registered source
    #[error("Unknown source '{name}' (available: {})", .available.join(", "))]
    UnknownSource { name: String, available: Vec<String> },

    /// Malformed filters or parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Paper not found: {0}")]
    NotFound(String),

    /// No open-access PDF
    #[error("PDF unavailable: {0}")]
    Unavailable(String),

    /// A single-source call ran past the per-source timeout
    #[error("Source '{source_id}' timed out after {}s", .after.as_secs())]
    Timeout { source_id: String, after: Duration },

    /// Any other failure reported by the source
    #[error("Source error: {0}")]
    Source(SourceError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<SourceError> for ResearchError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound(id) => ResearchError::NotFound(id),
            SourceError::Unavailable(id) => ResearchError::Unavailable(id),
            other => ResearchError::Source(other),
        }
    }
}
