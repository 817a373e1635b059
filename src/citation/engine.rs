//! Bounded breadth-first traversal of the citation relation.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::CitationConfig;
use crate::error::ResearchError;
use crate::models::{CitationGraph, Direction, Expansion, GraphState, PaperKey, PaperRecord, SourceType};
use crate::sources::{AdapterRegistry, SourceAdapter, SourceCapabilities, SourceError, ALL_SOURCES};

use super::scoring::score_graph;

/// Allowed traversal depths
pub const MIN_DEPTH: u8 = 1;
pub const MAX_DEPTH: u8 = 3;

/// Knobs bounding one traversal
#[derive(Debug, Clone, Copy)]
pub struct TraversalLimits {
    /// Neighbors requested per node and direction
    pub per_node_limit: usize,
    /// Discovery stops once the graph holds this many nodes
    pub max_nodes: usize,
    /// Concurrent provider calls within one frontier
    pub max_concurrent_requests: usize,
    /// Deadline for each provider call
    pub call_timeout: Duration,
}

impl Default for TraversalLimits {
    fn default() -> Self {
        Self {
            per_node_limit: 20,
            max_nodes: 500,
            max_concurrent_requests: 10,
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl TraversalLimits {
    pub fn from_config(config: &CitationConfig, call_timeout: Duration) -> Self {
        Self {
            per_node_limit: config.per_node_limit.max(1),
            max_nodes: config.max_nodes.max(1),
            max_concurrent_requests: config.max_concurrent_requests.max(1),
            call_timeout,
        }
    }
}

/// Neighbors of one frontier node, or why they could not be fetched
type Neighbors = Result<(Vec<PaperRecord>, Vec<PaperRecord>), String>;

/// Builds citation neighborhoods level by level.
///
/// Levels are strictly sequential; calls within a level run concurrently.
/// A node whose lookups fail is kept as a leaf and the traversal goes on.
#[derive(Debug, Clone)]
pub struct CitationGraphEngine {
    registry: Arc<AdapterRegistry>,
    limits: TraversalLimits,
}

impl CitationGraphEngine {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            limits: TraversalLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: TraversalLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &TraversalLimits {
        &self.limits
    }

    /// Expand the citation neighborhood of `paper_id` up to `max_depth` hops.
    pub async fn build_graph(
        &self,
        paper_id: &str,
        source: &str,
        max_depth: u8,
    ) -> Result<CitationGraph, ResearchError> {
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&max_depth) {
            return Err(ResearchError::InvalidQuery(format!(
                "max_depth must be between {MIN_DEPTH} and {MAX_DEPTH}, got {max_depth}"
            )));
        }
        let paper_id = paper_id.trim();
        if paper_id.is_empty() {
            return Err(ResearchError::InvalidQuery("paper_id must not be empty".to_string()));
        }
        if source == ALL_SOURCES {
            return Err(ResearchError::InvalidQuery(
                "citation analysis needs a single source".to_string(),
            ));
        }

        let descriptor = self.registry.get(source)?;
        let adapter = descriptor.adapter().clone();
        if !descriptor.supports(SourceCapabilities::CITATIONS) {
            warn!("Source {} has no citation data; graph will hold only the seed", source);
        }

        let seed = self
            .fetch_seed(adapter.as_ref(), paper_id, descriptor.supports(SourceCapabilities::METADATA))
            .await?;
        let mut graph = CitationGraph::seeded(seed, max_depth);
        debug!("Citation graph seeded with {}", graph.seed);

        let mut frontier = vec![graph.seed.clone()];
        let mut depth: u8 = 0;
        loop {
            if frontier.is_empty() {
                graph.state = GraphState::Complete;
                break;
            }
            if depth >= max_depth {
                graph.state = GraphState::Bounded;
                break;
            }

            graph.state = GraphState::Expanding;
            debug!("Expanding {} nodes at depth {}", frontier.len(), depth);

            let fetched: Vec<(PaperKey, Neighbors)> = stream::iter(frontier.iter().cloned())
                .map(|key| self.fetch_neighbors(adapter.as_ref(), key))
                .buffered(self.limits.max_concurrent_requests.max(1))
                .collect()
                .await;

            let mut next = Vec::new();
            let mut capped = false;
            for (key, neighbors) in fetched {
                match neighbors {
                    Err(reason) => {
                        debug!("{} kept as a leaf: {}", key, reason);
                        if let Some(node) = graph.node_mut(&key) {
                            node.expansion = Expansion::Leaf { reason };
                        }
                    }
                    Ok((citing, cited)) => {
                        if let Some(node) = graph.node_mut(&key) {
                            node.expansion = Expansion::Expanded;
                        }
                        for record in citing {
                            capped |= self.attach(&mut graph, &key, record, Direction::CitedBy, depth + 1, &mut next);
                        }
                        for record in cited {
                            capped |= self.attach(&mut graph, &key, record, Direction::References, depth + 1, &mut next);
                        }
                    }
                }
            }

            frontier = next;
            depth += 1;

            if capped {
                info!("Citation graph hit the {} node limit", self.limits.max_nodes);
                graph.state = GraphState::Bounded;
                break;
            }
        }

        score_graph(&mut graph);

        info!(
            "Citation graph for {}: {} nodes, {} edges, {:?}",
            graph.seed,
            graph.node_count(),
            graph.edge_count(),
            graph.state
        );
        Ok(graph)
    }

    async fn fetch_seed(
        &self,
        adapter: &dyn SourceAdapter,
        paper_id: &str,
        has_metadata: bool,
    ) -> Result<PaperRecord, ResearchError> {
        let stub = || PaperRecord::stub(paper_id, SourceType::from_id(adapter.id()));
        if !has_metadata {
            return Ok(stub());
        }

        match timeout(self.limits.call_timeout, adapter.get_metadata(paper_id)).await {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(SourceError::NotFound(id))) => Err(ResearchError::NotFound(id)),
            Ok(Err(error)) => {
                warn!("Seed metadata for {} unavailable: {}", paper_id, error);
                Ok(stub())
            }
            Err(_) => {
                warn!("Seed metadata for {} timed out", paper_id);
                Ok(stub())
            }
        }
    }

    /// Citations and references of one node, each call under its own deadline.
    /// A node counts as expanded when at least one direction answered.
    async fn fetch_neighbors(&self, adapter: &dyn SourceAdapter, key: PaperKey) -> (PaperKey, Neighbors) {
        let deadline = self.limits.call_timeout;
        let limit = self.limits.per_node_limit;
        let (citing, cited) = tokio::join!(
            timeout(deadline, adapter.get_citations(&key.identifier, limit)),
            timeout(deadline, adapter.get_references(&key.identifier, limit)),
        );

        let flatten = |r: Result<Result<Vec<PaperRecord>, SourceError>, _>| match r {
            Ok(Ok(papers)) => Ok(papers),
            Ok(Err(error)) => Err(error.to_string()),
            Err(_) => Err(format!("no response within {}s", deadline.as_secs_f64())),
        };

        let result = match (flatten(citing), flatten(cited)) {
            (Err(a), Err(b)) if a == b => Err(a),
            (Err(a), Err(b)) => Err(format!("{a}; {b}")),
            (citing, cited) => Ok((citing.unwrap_or_default(), cited.unwrap_or_default())),
        };
        (key, result)
    }

    /// Link `record` to `from`, adding it as a node if unseen.
    /// Returns true when the node limit prevented an insertion.
    fn attach(
        &self,
        graph: &mut CitationGraph,
        from: &PaperKey,
        record: PaperRecord,
        direction: Direction,
        depth: u8,
        next: &mut Vec<PaperKey>,
    ) -> bool {
        let key = record.key();
        if &key == from || key.identifier.is_empty() {
            return false;
        }

        if !graph.contains(&key) {
            if graph.node_count() >= self.limits.max_nodes {
                return true;
            }
            if graph.insert_node(record, depth, direction) {
                next.push(key.clone());
            }
        }

        match direction {
            Direction::CitedBy => graph.insert_edge(key, from.clone(), direction),
            Direction::References => graph.insert_edge(from.clone(), key, direction),
        };
        false
    }
}
