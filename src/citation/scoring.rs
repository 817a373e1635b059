//! Impact scores and recommendation ranking over a built citation graph.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResearchError;
use crate::models::{CitationGraph, CitationNode, Direction, PaperKey, PaperRecord};

/// How candidates from the citation neighborhood are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Papers directly linked to the seed
    Citations,
    /// Papers sharing neighbors with the seed
    Similar,
    /// Highly cited papers anywhere in the neighborhood
    Influential,
    #[default]
    Comprehensive,
}

/// Relative weight of each ranking feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyWeights {
    pub citations: f64,
    pub centrality: f64,
    pub proximity: f64,
    pub similarity: f64,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Citations,
        Strategy::Similar,
        Strategy::Influential,
        Strategy::Comprehensive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Citations => "citations",
            Strategy::Similar => "similar",
            Strategy::Influential => "influential",
            Strategy::Comprehensive => "comprehensive",
        }
    }

    pub fn weights(&self) -> StrategyWeights {
        match self {
            Strategy::Citations => StrategyWeights {
                citations: 0.1,
                centrality: 0.3,
                proximity: 0.6,
                similarity: 0.0,
            },
            Strategy::Similar => StrategyWeights {
                citations: 0.1,
                centrality: 0.0,
                proximity: 0.2,
                similarity: 0.7,
            },
            Strategy::Influential => StrategyWeights {
                citations: 0.8,
                centrality: 0.2,
                proximity: 0.0,
                similarity: 0.0,
            },
            Strategy::Comprehensive => StrategyWeights {
                citations: 0.25,
                centrality: 0.25,
                proximity: 0.25,
                similarity: 0.25,
            },
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == wanted)
            .ok_or_else(|| {
                ResearchError::InvalidQuery(format!(
                    "unknown strategy '{s}' (expected citations, similar, influential or comprehensive)"
                ))
            })
    }
}

/// One ranked candidate
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub paper: PaperRecord,
    pub score: f64,
    /// Distance from the seed; `None` when suggested by the provider directly
    pub depth: Option<u8>,
    pub direction: Option<Direction>,
}

/// Normalizers shared by every node of one graph
struct GraphStats {
    max_log_citations: f64,
    max_in_degree: usize,
}

impl GraphStats {
    fn of(graph: &CitationGraph) -> Self {
        let max_citations = graph
            .nodes()
            .iter()
            .filter_map(|n| n.record.citation_count())
            .max()
            .unwrap_or(0);
        Self {
            max_log_citations: (1.0 + f64::from(max_citations)).ln(),
            max_in_degree: graph.nodes().iter().map(|n| n.in_degree).max().unwrap_or(0),
        }
    }

    fn citations(&self, node: &CitationNode) -> f64 {
        match node.record.citation_count() {
            Some(c) if self.max_log_citations > 0.0 => (1.0 + f64::from(c)).ln() / self.max_log_citations,
            _ => 0.0,
        }
    }

    fn centrality(&self, node: &CitationNode) -> f64 {
        if self.max_in_degree == 0 {
            0.0
        } else {
            node.in_degree as f64 / self.max_in_degree as f64
        }
    }
}

/// Fill in `in_degree` and `impact_score` for every node.
///
/// The score blends log-normalized citation count (60%) with normalized
/// in-degree inside the subgraph (40%), scaled to 0..=100. Nodes without a
/// citation count score 0.
pub fn score_graph(graph: &mut CitationGraph) {
    let in_degrees: Vec<(PaperKey, usize)> = graph
        .nodes()
        .iter()
        .map(|node| {
            let key = node.key();
            let count = graph.edges().iter().filter(|e| e.to == key).count();
            (key, count)
        })
        .collect();
    for (key, count) in in_degrees {
        if let Some(node) = graph.node_mut(&key) {
            node.in_degree = count;
        }
    }

    let stats = GraphStats::of(graph);
    let scores: Vec<f64> = graph
        .nodes()
        .iter()
        .map(|node| match node.record.citation_count() {
            None => 0.0,
            Some(_) => 100.0 * (0.6 * stats.citations(node) + 0.4 * stats.centrality(node)),
        })
        .collect();
    for (node, score) in graph.nodes_mut().zip(scores) {
        node.impact_score = score;
    }
}

fn jaccard(a: &HashSet<&PaperKey>, b: &HashSet<&PaperKey>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        a.intersection(b).count() as f64 / union as f64
    }
}

/// Rank every non-seed node of `graph` and return the best `count`.
///
/// Ties go to the shallower node, then to discovery order.
pub fn recommend(graph: &CitationGraph, strategy: Strategy, count: usize) -> Vec<Recommendation> {
    let weights = strategy.weights();
    let stats = GraphStats::of(graph);

    let seed_neighbors = graph.neighbors(&graph.seed);

    let mut ranked: Vec<(usize, Recommendation)> = graph
        .nodes()
        .iter()
        .enumerate()
        .filter(|(_, node)| node.key() != graph.seed)
        .map(|(order, node)| {
            let key = node.key();
            let similarity = if weights.similarity > 0.0 {
                let mut own = graph.neighbors(&key);
                own.remove(&graph.seed);
                let mut theirs = seed_neighbors.clone();
                theirs.remove(&key);
                jaccard(&own, &theirs)
            } else {
                0.0
            };
            let proximity = 1.0 / f64::from(node.depth.max(1));

            let score = weights.citations * stats.citations(node)
                + weights.centrality * stats.centrality(node)
                + weights.proximity * proximity
                + weights.similarity * similarity;

            (
                order,
                Recommendation {
                    paper: node.record.clone(),
                    score,
                    depth: Some(node.depth),
                    direction: node.direction,
                },
            )
        })
        .collect();

    ranked.sort_by(|(oa, a), (ob, b)| {
        b.score
            .total_cmp(&a.score)
            .then(a.depth.cmp(&b.depth))
            .then(oa.cmp(ob))
    });

    ranked.into_iter().take(count).map(|(_, rec)| rec).collect()
}

/// Score provider-suggested papers that the traversal never reached.
///
/// Only the citation feature is known for them, normalized against the graph
/// (values above the graph maximum clamp to 1). Papers already in the graph
/// and repeated suggestions are skipped.
pub fn rank_suggestions(
    graph: &CitationGraph,
    strategy: Strategy,
    papers: Vec<PaperRecord>,
    count: usize,
) -> Vec<Recommendation> {
    let weights = strategy.weights();
    let stats = GraphStats::of(graph);
    let mut seen: HashSet<PaperKey> = HashSet::new();

    let mut ranked: Vec<Recommendation> = papers
        .into_iter()
        .filter(|paper| !graph.contains(&paper.key()) && seen.insert(paper.key()))
        .map(|paper| {
            let citations = match paper.citation_count() {
                Some(c) => {
                    let log = (1.0 + f64::from(c)).ln();
                    if stats.max_log_citations > 0.0 {
                        (log / stats.max_log_citations).min(1.0)
                    } else if c > 0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                None => 0.0,
            };
            Recommendation {
                score: weights.citations * citations,
                paper,
                depth: None,
                direction: None,
            }
        })
        .collect();

    // Stable sort keeps the provider's order among ties
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(count);
    ranked
}
