//! # Research Atlas
//!
//! Concurrent search over several scholarly sources, with cross-source
//! deduplication and citation-network analysis.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (PaperRecord, SearchFilters, CitationGraph)
//! - [`sources`]: Source adapters behind one trait, plus the adapter registry
//! - [`search`]: Fan-out to every selected source, then merge and rank
//! - [`citation`]: Breadth-first citation traversal, scoring and recommendations
//! - [`service`]: The operations a front end calls
//! - [`utils`]: HTTP client, retry, deduplication and date helpers
//! - [`config`]: Configuration management
//!
//! ```rust,no_run
//! use research_atlas::{config::Config, ResearchService};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), research_atlas::ResearchError> {
//! let service = ResearchService::from_config(&Config::default())?;
//! let report = service.search("CRISPR gene editing", "all", 10).await?;
//! for paper in &report.papers {
//!     println!("{} ({})", paper.title, paper.source.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod citation;
pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod service;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use error::ResearchError;
pub use models::{CitationGraph, PaperRecord, SearchFilters};
pub use service::ResearchService;
pub use sources::{AdapterRegistry, SourceAdapter, SourceError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
