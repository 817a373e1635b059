//! Concurrent fan-out of one query to many sources.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn, Instrument};

use crate::config::SearchConfig;
use crate::error::ResearchError;
use crate::models::{PaperRecord, SearchQuery};
use crate::sources::{AdapterRegistry, SourceAdapter, SourceError};

/// Default per-source deadline
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a source contributed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    ProviderUnavailable,
    ProviderRateLimited,
    UnsupportedFilter,
    /// The search task itself died
    Internal,
}

impl From<&SourceError> for FailureReason {
    fn from(err: &SourceError) -> Self {
        match err {
            SourceError::ProviderRateLimited(_) => FailureReason::ProviderRateLimited,
            SourceError::UnsupportedFilter(_) | SourceError::NotImplemented(_) => {
                FailureReason::UnsupportedFilter
            }
            _ => FailureReason::ProviderUnavailable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Succeeded {
        count: usize,
        /// The journal filter was dropped after the source rejected it
        relaxed_filters: bool,
    },
    Failed {
        reason: FailureReason,
        message: String,
    },
}

/// Per-source line of the status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub source: String,
    pub outcome: SourceOutcome,
    pub elapsed_ms: u64,
}

impl SourceStatus {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Succeeded { .. })
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match &self.outcome {
            SourceOutcome::Failed { reason, .. } => Some(*reason),
            SourceOutcome::Succeeded { .. } => None,
        }
    }
}

/// What one source returned, in that source's own order
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: String,
    pub papers: Vec<PaperRecord>,
}

/// Raw fan-out result: one batch and one status per source, in dispatch order
#[derive(Debug, Clone)]
pub struct FanOut {
    pub batches: Vec<SourceBatch>,
    pub statuses: Vec<SourceStatus>,
}

/// Dispatches a query to every selected source at once and waits for all of
/// them, each bounded by its own deadline.
#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    registry: Arc<AdapterRegistry>,
    source_timeout: Duration,
    relax_unsupported_filters: bool,
}

impl SearchOrchestrator {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            relax_unsupported_filters: true,
        }
    }

    pub fn from_config(registry: Arc<AdapterRegistry>, config: &SearchConfig) -> Self {
        Self::new(registry)
            .with_timeout(config.source_timeout())
            .relax_unsupported_filters(config.relax_unsupported_filters)
    }

    pub fn with_timeout(mut self, source_timeout: Duration) -> Self {
        self.source_timeout = source_timeout;
        self
    }

    pub fn relax_unsupported_filters(mut self, relax: bool) -> Self {
        self.relax_unsupported_filters = relax;
        self
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn source_timeout(&self) -> Duration {
        self.source_timeout
    }

    /// Run `query` against the sources named by `selector`.
    ///
    /// Fails only before dispatch (`UnknownSource`, `InvalidQuery`). After
    /// that every source ends up in the status list, succeeded or not, and
    /// nothing is returned until all of them have finished or timed out.
    pub async fn fan_out(
        &self,
        query: SearchQuery,
        selector: &str,
        limit: usize,
    ) -> Result<FanOut, ResearchError> {
        if limit == 0 {
            return Err(ResearchError::InvalidQuery(
                "limit must be at least 1".to_string(),
            ));
        }
        query.validate()?;
        let query = Arc::new(query.normalize());
        let descriptors = self.registry.resolve(selector)?;

        info!(
            "Dispatching search to {} sources: {:?}",
            descriptors.len(),
            descriptors.iter().map(|d| d.name()).collect::<Vec<_>>()
        );

        let mut names = Vec::with_capacity(descriptors.len());
        let mut tasks = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let adapter = descriptor.adapter().clone();
            let query = query.clone();
            let deadline = self.source_timeout;
            let relax = self.relax_unsupported_filters;
            let span = tracing::info_span!("source_search", source = %descriptor.name());

            let task = tokio::spawn(
                async move {
                    let started = Instant::now();
                    // On expiry the unit's future is dropped with its in-flight request
                    let result = timeout(deadline, run_unit(adapter, query, limit, relax)).await;
                    (result, started.elapsed())
                }
                .instrument(span),
            );

            names.push(descriptor.name().to_string());
            tasks.push(task);
        }

        let joined = join_all(tasks).await;

        let mut batches = Vec::with_capacity(names.len());
        let mut statuses = Vec::with_capacity(names.len());
        for (source, joined) in names.into_iter().zip(joined) {
            let (papers, outcome, elapsed) = match joined {
                Ok((Ok(Ok((papers, relaxed_filters))), elapsed)) => {
                    info!("Source {} returned {} results", source, papers.len());
                    let count = papers.len();
                    (papers, SourceOutcome::Succeeded { count, relaxed_filters }, elapsed)
                }
                Ok((Ok(Err(error)), elapsed)) => {
                    warn!("Source {} failed: {}", source, error);
                    let outcome = SourceOutcome::Failed {
                        reason: FailureReason::from(&error),
                        message: error.to_string(),
                    };
                    (Vec::new(), outcome, elapsed)
                }
                Ok((Err(_), elapsed)) => {
                    warn!("Source {} timed out after {:?}", source, self.source_timeout);
                    let outcome = SourceOutcome::Failed {
                        reason: FailureReason::Timeout,
                        message: format!(
                            "no response within {}s",
                            self.source_timeout.as_secs_f64()
                        ),
                    };
                    (Vec::new(), outcome, elapsed)
                }
                Err(error) => {
                    warn!("Search task for {} failed: {}", source, error);
                    let outcome = SourceOutcome::Failed {
                        reason: FailureReason::Internal,
                        message: error.to_string(),
                    };
                    (Vec::new(), outcome, Duration::ZERO)
                }
            };

            statuses.push(SourceStatus {
                source: source.clone(),
                outcome,
                elapsed_ms: elapsed.as_millis() as u64,
            });
            batches.push(SourceBatch { source, papers });
        }

        info!(
            "Fan-out finished: {}/{} sources succeeded",
            statuses.iter().filter(|s| s.is_success()).count(),
            statuses.len()
        );

        Ok(FanOut { batches, statuses })
    }
}

/// One source's share of the work
async fn run_unit(
    adapter: Arc<dyn SourceAdapter>,
    query: Arc<SearchQuery>,
    limit: usize,
    relax: bool,
) -> Result<(Vec<PaperRecord>, bool), SourceError> {
    let (mut papers, relaxed) = match query.as_ref() {
        SearchQuery::Keywords(keywords) => (adapter.search_by_keywords(keywords, limit).await?, false),
        SearchQuery::Advanced(filters) => match adapter.search_advanced(filters, limit).await {
            Ok(papers) => (papers, false),
            Err(SourceError::UnsupportedFilter(reason)) if relax => match filters.without_journal() {
                Some(reduced) => {
                    debug!("Retrying {} without journal filter ({})", adapter.id(), reason);
                    (adapter.search_advanced(&reduced, limit).await?, true)
                }
                None => return Err(SourceError::UnsupportedFilter(reason)),
            },
            Err(error) => return Err(error),
        },
    };
    papers.truncate(limit);
    Ok((papers, relaxed))
}
