//! Utility modules supporting research operations.
//!
//! - [`find_duplicate_groups`] / [`pick_survivor`]: cross-source duplicate
//!   detection by canonical identifier and title similarity
//! - [`HttpClient`]: shared HTTP client mapping status codes onto [`SourceError`](crate::sources::SourceError)
//! - [`RetryConfig`] / [`with_retry`]: bounded retry of transient transport failures
//! - [`parse_flexible_date`] / [`parse_query_date`] / [`parse_query_end_date`]: date normalization
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use research_atlas::utils::{api_retry_config, with_retry};
//! use research_atlas::sources::SourceError;
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let result = with_retry(api_retry_config(), || async { fetch_data().await }).await?;
//! # Ok(())
//! # }
//! ```

mod date;
mod dedup;
mod http;
mod retry;

pub use date::{iso_format, parse_flexible_date, parse_query_date, parse_query_end_date, pubmed_format};
pub use dedup::{find_duplicate_groups, normalize_arxiv_id, normalize_doi, pick_survivor};
pub use http::{check_status, HttpClient};
pub use retry::{api_retry_config, with_retry, RetryConfig};
