//! Research source adapters with a trait-based architecture.
//!
//! Every provider is wrapped in a [`SourceAdapter`], which normalizes its
//! payloads into [`PaperRecord`]s. Adapters are registered once in an
//! [`AdapterRegistry`] and never change afterwards.
//!
//! # Feature Flags
//!
//! Built-in adapters can be excluded at compile time:
//!
//! - `pubmed` - PubMed via NCBI E-utilities (default: enabled)
//! - `biorxiv` - bioRxiv and medRxiv (default: enabled)
//! - `arxiv` - arXiv Atom API (default: enabled)
//! - `semantic` - Semantic Scholar Graph API (default: enabled)
//!
//! # Runtime Source Configuration
//!
//! The `[sources]` config section (or `RESEARCH_ATLAS__SOURCES__ENABLED` /
//! `RESEARCH_ATLAS__SOURCES__DISABLED`) narrows which compiled-in adapters are
//! registered. `disabled` always wins over `enabled`.

#[cfg(feature = "source-arxiv")]
mod arxiv;
#[cfg(feature = "source-biorxiv")]
mod biorxiv;
#[cfg(feature = "source-pubmed")]
mod pubmed;
mod registry;
#[cfg(feature = "source-semantic")]
mod semantic;

pub mod mock;

pub use mock::{make_paper, MockSource};

pub use registry::{AdapterDescriptor, AdapterRegistry, RegistryBuilder, SourceCapabilities, ALL_SOURCES};

#[cfg(feature = "source-arxiv")]
pub use arxiv::ArxivSource;
#[cfg(feature = "source-biorxiv")]
pub use biorxiv::{BiorxivSource, ServerType};
#[cfg(feature = "source-pubmed")]
pub use pubmed::PubMedSource;
#[cfg(feature = "source-semantic")]
pub use semantic::SemanticScholarSource;

use crate::models::{DateRange, PaperRecord, SearchFilters};
use async_trait::async_trait;

/// Parsed date bounds of `filters`, `None` when neither bound is set
pub(crate) fn requested_dates(filters: &SearchFilters) -> Result<Option<DateRange>, SourceError> {
    filters
        .date_range()
        .map_err(|err| SourceError::InvalidRequest(err.to_string()))
}

/// The interface every research provider implements.
///
/// # Implementing a New Source
///
/// 1. Create a struct that implements `SourceAdapter`
/// 2. Implement `id`, `name`, `capabilities` and `search_by_keywords`
/// 3. Override the optional methods the provider supports; the defaults
///    return the typed "unsupported" error for each operation
/// 4. Register it with [`RegistryBuilder::register`]
///
/// Adapters hold no per-request state, so every call can be retried on its own.
#[async_trait]
pub trait SourceAdapter: Send + Sync + std::fmt::Debug {
    /// Registry key, e.g. "pubmed" or "semantic_scholar"
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    fn supports_advanced_search(&self) -> bool {
        self.capabilities()
            .contains(SourceCapabilities::ADVANCED_SEARCH)
    }

    // ========== SEARCH METHODS ==========

    /// Free-text search. No matches is `Ok(vec![])`, never an error.
    async fn search_by_keywords(
        &self,
        keywords: &str,
        limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError>;

    /// Field-filtered search
    async fn search_advanced(
        &self,
        _filters: &SearchFilters,
        _limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        Err(SourceError::UnsupportedFilter(format!(
            "{} has no field-filtered search",
            self.name()
        )))
    }

    // ========== LOOKUP METHODS ==========

    /// Full record for one provider-scoped identifier
    async fn get_metadata(&self, _identifier: &str) -> Result<PaperRecord, SourceError> {
        Err(SourceError::NotImplemented("metadata lookup"))
    }

    /// Open-access PDF bytes
    async fn download_pdf(&self, identifier: &str) -> Result<Vec<u8>, SourceError> {
        Err(SourceError::Unavailable(format!(
            "{} does not serve PDFs ({identifier})",
            self.name()
        )))
    }

    // ========== CITATION METHODS ==========

    /// Papers that cite `identifier`
    async fn get_citations(
        &self,
        identifier: &str,
        _limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        Err(SourceError::CitationDataUnavailable(identifier.to_string()))
    }

    /// Papers cited by `identifier`
    async fn get_references(
        &self,
        identifier: &str,
        _limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        Err(SourceError::CitationDataUnavailable(identifier.to_string()))
    }

    /// Provider-side recommendations for papers like `identifier`
    async fn get_recommendations(
        &self,
        _identifier: &str,
        _limit: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        Err(SourceError::NotImplemented("recommendations"))
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not supported by this source: {0}")]
    NotImplemented(&'static str),

    /// Transport failure or server-side error
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider is throttling us
    #[error("Rate limited by provider: {0}")]
    ProviderRateLimited(String),

    /// A filter combination the provider cannot honor
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("Paper not found: {0}")]
    NotFound(String),

    /// No open-access copy exists
    #[error("PDF unavailable: {0}")]
    Unavailable(String),

    /// The provider has no citation links for this paper
    #[error("Citation data unavailable for {0}")]
    CitationDataUnavailable(String),

    /// Parsing error (XML, JSON, Atom)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SourceError {
    /// Failures worth retrying inside the adapter
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::ProviderUnavailable(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(reqwest::StatusCode::TOO_MANY_REQUESTS) => {
                SourceError::ProviderRateLimited(err.to_string())
            }
            Some(reqwest::StatusCode::NOT_FOUND) => SourceError::NotFound(err.to_string()),
            _ if err.is_decode() => SourceError::Parse(err.to_string()),
            _ => SourceError::ProviderUnavailable(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}
