//! The request surface: every operation a front end can invoke.
//!
//! [`ResearchService`] wires the registry, the search orchestrator, the
//! merger and the citation engine together. It holds no per-request state,
//! so one instance can serve concurrent requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::citation::{
    rank_suggestions, recommend, CitationGraphEngine, ComparisonAspect, ComparisonReport,
    ImpactReport, LookupFailure, Recommendation, Strategy, TraversalLimits, MAX_COMPARED,
    MIN_COMPARED,
};
use crate::config::Config;
use crate::error::ResearchError;
use crate::models::{CitationGraph, PaperRecord, SearchFilters, SearchQuery};
use crate::search::{ResultMerger, SearchOrchestrator, SearchReport};
use crate::sources::{AdapterRegistry, SourceAdapter, SourceCapabilities, ALL_SOURCES};

/// Traversal depth used to collect recommendation candidates
pub const RECOMMENDATION_DEPTH: u8 = 2;

/// A registered source and what it can do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub name: String,
    pub display_name: String,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResearchService {
    registry: Arc<AdapterRegistry>,
    orchestrator: SearchOrchestrator,
    merger: ResultMerger,
    engine: CitationGraphEngine,
    call_timeout: Duration,
    max_limit: usize,
}

impl ResearchService {
    pub fn new(registry: Arc<AdapterRegistry>, config: &Config) -> Self {
        let call_timeout = config.search.source_timeout();
        let orchestrator = SearchOrchestrator::from_config(Arc::clone(&registry), &config.search);
        let engine = CitationGraphEngine::new(Arc::clone(&registry))
            .with_limits(TraversalLimits::from_config(&config.citations, call_timeout));

        Self {
            registry,
            orchestrator,
            merger: ResultMerger::new(),
            engine,
            call_timeout,
            max_limit: config.search.max_limit.max(1),
        }
    }

    /// Build the registry from `config` and wrap it
    pub fn from_config(config: &Config) -> Result<Self, ResearchError> {
        let registry = AdapterRegistry::from_config(config)?;
        Ok(Self::new(Arc::new(registry), config))
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Free-text search across `source` (a source name or `"all"`)
    pub async fn search(
        &self,
        keywords: &str,
        source: &str,
        limit: usize,
    ) -> Result<SearchReport, ResearchError> {
        self.run_search(SearchQuery::keywords(keywords), source, limit)
            .await
    }

    /// Field-filtered search across `source`
    pub async fn search_advanced(
        &self,
        filters: SearchFilters,
        source: &str,
        limit: usize,
    ) -> Result<SearchReport, ResearchError> {
        self.run_search(SearchQuery::advanced(filters), source, limit)
            .await
    }

    async fn run_search(
        &self,
        query: SearchQuery,
        source: &str,
        limit: usize,
    ) -> Result<SearchReport, ResearchError> {
        let ranking = query.ranking();
        let limit = limit.min(self.max_limit);
        let fan_out = self.orchestrator.fan_out(query, source, limit).await?;
        let report = self.merger.merge(fan_out, ranking);

        let failed = report.failed_sources().count();
        info!(
            "Search finished: {} papers, {} of {} sources failed",
            report.papers.len(),
            failed,
            report.statuses.len()
        );
        Ok(report)
    }

    pub async fn get_metadata(
        &self,
        identifier: &str,
        source: &str,
    ) -> Result<PaperRecord, ResearchError> {
        let identifier = require_identifier(identifier)?;
        let adapter = self.single_source(source)?;
        self.call(source, adapter.get_metadata(identifier)).await
    }

    /// Raw PDF bytes of an open-access copy
    pub async fn download_pdf(
        &self,
        identifier: &str,
        source: &str,
    ) -> Result<Vec<u8>, ResearchError> {
        let identifier = require_identifier(identifier)?;
        let adapter = self.single_source(source)?;
        let bytes = self.call(source, adapter.download_pdf(identifier)).await?;
        debug!("Downloaded {} bytes for {} from {}", bytes.len(), identifier, source);
        Ok(bytes)
    }

    /// Registered source names in registration order
    pub fn list_sources(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn describe_sources(&self) -> Vec<SourceInfo> {
        self.registry
            .iter()
            .map(|descriptor| SourceInfo {
                name: descriptor.name().to_string(),
                display_name: descriptor.adapter().name().to_string(),
                capabilities: descriptor
                    .capabilities()
                    .iter_names()
                    .map(|(name, _)| name.to_lowercase())
                    .collect(),
            })
            .collect()
    }

    pub async fn analyze_citation_network(
        &self,
        paper_id: &str,
        source: &str,
        max_depth: u8,
    ) -> Result<CitationGraph, ResearchError> {
        self.engine.build_graph(paper_id, source, max_depth).await
    }

    /// Rank papers related to `paper_id`.
    ///
    /// Candidates come from a two-level citation graph. When the graph holds
    /// fewer than `count` candidates and the source offers recommendations,
    /// its suggestions fill the remaining slots after the graph candidates.
    pub async fn recommend_related(
        &self,
        paper_id: &str,
        source: &str,
        count: usize,
        strategy: Strategy,
    ) -> Result<Vec<Recommendation>, ResearchError> {
        if count == 0 {
            return Err(ResearchError::InvalidQuery(
                "count must be at least 1".to_string(),
            ));
        }

        let graph = self
            .engine
            .build_graph(paper_id, source, RECOMMENDATION_DEPTH)
            .await?;
        let mut recommendations = recommend(&graph, strategy, count);

        let missing = count - recommendations.len();
        let descriptor = self.registry.get(source)?;
        if missing > 0 && descriptor.supports(SourceCapabilities::RECOMMENDATIONS) {
            let seed_id = graph.seed.identifier.clone();
            let adapter = descriptor.adapter();
            match self
                .call(source, adapter.get_recommendations(&seed_id, count))
                .await
            {
                Ok(papers) => {
                    let suggested = rank_suggestions(&graph, strategy, papers, missing);
                    debug!("{} provider suggestions added for {}", suggested.len(), seed_id);
                    recommendations.extend(suggested);
                }
                Err(err) => warn!("Provider recommendations from {} failed: {}", source, err),
            }
        }

        info!(
            "{} recommendations for {} ({} strategy)",
            recommendations.len(),
            paper_id,
            strategy
        );
        Ok(recommendations)
    }

    /// Citation-based impact assessment of one paper
    pub async fn evaluate_impact(
        &self,
        paper_id: &str,
        source: &str,
    ) -> Result<ImpactReport, ResearchError> {
        let record = self.get_metadata(paper_id, source).await?;
        Ok(ImpactReport::evaluate(&record, Utc::now().date_naive()))
    }

    /// Compare several papers from one source on the given aspects (all when empty).
    ///
    /// Lookups run concurrently; a paper that fails to resolve is reported in
    /// `failures` and the rest are still compared.
    pub async fn compare_papers(
        &self,
        paper_ids: &[String],
        source: &str,
        aspects: &[ComparisonAspect],
    ) -> Result<ComparisonReport, ResearchError> {
        if !(MIN_COMPARED..=MAX_COMPARED).contains(&paper_ids.len()) {
            return Err(ResearchError::InvalidQuery(format!(
                "compare needs {MIN_COMPARED} to {MAX_COMPARED} papers, got {}",
                paper_ids.len()
            )));
        }
        let ids = paper_ids
            .iter()
            .map(|id| require_identifier(id))
            .collect::<Result<Vec<_>, _>>()?;
        let adapter = self.single_source(source)?;
        let aspects = if aspects.is_empty() {
            ComparisonAspect::ALL.to_vec()
        } else {
            aspects.to_vec()
        };

        let lookups = ids.iter().map(|id| self.call(source, adapter.get_metadata(id)));
        let results = join_all(lookups).await;

        let mut papers = Vec::new();
        let mut failures = Vec::new();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(record) => papers.push(record),
                Err(err) => {
                    warn!("Comparison lookup of {} on {} failed: {}", id, source, err);
                    failures.push(LookupFailure {
                        identifier: id.to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            "Compared {} papers from {} ({} lookups failed)",
            papers.len(),
            source,
            failures.len()
        );
        Ok(ComparisonReport::build(&aspects, papers, failures))
    }

    fn single_source(&self, source: &str) -> Result<Arc<dyn SourceAdapter>, ResearchError> {
        if source == ALL_SOURCES {
            return Err(ResearchError::InvalidQuery(
                "this operation needs a single source, not 'all'".to_string(),
            ));
        }
        Ok(self.registry.get(source)?.adapter().clone())
    }

    /// Run one adapter call under the per-source deadline
    async fn call<T, F>(&self, source: &str, future: F) -> Result<T, ResearchError>
    where
        F: Future<Output = Result<T, crate::sources::SourceError>>,
    {
        match timeout(self.call_timeout, future).await {
            Ok(result) => result.map_err(ResearchError::from),
            Err(_) => {
                warn!("Source {} timed out after {:?}", source, self.call_timeout);
                Err(ResearchError::Timeout {
                    source_id: source.to_string(),
                    after: self.call_timeout,
                })
            }
        }
    }
}

fn require_identifier(identifier: &str) -> Result<&str, ResearchError> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(ResearchError::InvalidQuery(
            "identifier must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
