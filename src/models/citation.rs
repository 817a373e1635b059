//! Citation graph model produced by the traversal engine.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::paper::{PaperKey, PaperRecord};

/// Which side of the citation relation a node was reached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The node cites the paper it was expanded from
    CitedBy,
    /// The paper it was expanded from cites the node
    References,
}

/// Traversal lifecycle. `Bounded` and `Complete` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphState {
    Seeded,
    Expanding,
    /// Stopped at the depth or node limit with work left
    Bounded,
    /// Frontier emptied before any limit was hit
    Complete,
}

/// What happened when a node's neighbors were requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Expansion {
    /// Not expanded because the traversal stopped first
    Unexpanded,
    Expanded,
    /// Neighbor lookup failed; the node is kept as a leaf
    Leaf { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationNode {
    pub record: PaperRecord,
    /// Minimum BFS distance from the seed
    pub depth: u8,
    /// `None` for the seed
    pub direction: Option<Direction>,
    pub expansion: Expansion,
    /// Edges pointing at this node within the retrieved subgraph
    pub in_degree: usize,
    pub impact_score: f64,
}

impl CitationNode {
    pub fn key(&self) -> PaperKey {
        self.record.key()
    }
}

/// `from` cites `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitationEdge {
    pub from: PaperKey,
    pub to: PaperKey,
    pub direction: Direction,
}

/// A bounded citation neighborhood around one seed paper
#[derive(Debug, Clone, Serialize)]
pub struct CitationGraph {
    pub seed: PaperKey,
    pub max_depth: u8,
    pub state: GraphState,
    nodes: Vec<CitationNode>,
    edges: Vec<CitationEdge>,
    #[serde(skip)]
    index: HashMap<PaperKey, usize>,
    #[serde(skip)]
    edge_set: HashSet<CitationEdge>,
}

impl CitationGraph {
    /// Start a graph holding only the seed at depth 0
    pub fn seeded(seed: PaperRecord, max_depth: u8) -> Self {
        let key = seed.key();
        let mut graph = Self {
            seed: key,
            max_depth,
            state: GraphState::Seeded,
            nodes: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
            edge_set: HashSet::new(),
        };
        graph.push_node(seed, 0, None);
        graph
    }

    fn push_node(&mut self, record: PaperRecord, depth: u8, direction: Option<Direction>) {
        self.index.insert(record.key(), self.nodes.len());
        self.nodes.push(CitationNode {
            record,
            depth,
            direction,
            expansion: Expansion::Unexpanded,
            in_degree: 0,
            impact_score: 0.0,
        });
    }

    /// Add a node unless its key is already present.
    ///
    /// Returns true when the node is new. Callers expand level by level, so the
    /// first insertion is always at the minimum depth.
    pub fn insert_node(&mut self, record: PaperRecord, depth: u8, direction: Direction) -> bool {
        if depth > self.max_depth || self.index.contains_key(&record.key()) {
            return false;
        }
        self.push_node(record, depth, Some(direction));
        true
    }

    /// Add an edge between two present nodes; self loops and repeats are ignored
    pub fn insert_edge(&mut self, from: PaperKey, to: PaperKey, direction: Direction) -> bool {
        if from == to || !self.index.contains_key(&from) || !self.index.contains_key(&to) {
            return false;
        }
        let edge = CitationEdge { from, to, direction };
        if self.edge_set.contains(&edge) {
            return false;
        }
        // One citation relation regardless of which side discovered it
        let mirrored = CitationEdge {
            direction: match edge.direction {
                Direction::CitedBy => Direction::References,
                Direction::References => Direction::CitedBy,
            },
            ..edge.clone()
        };
        if self.edge_set.contains(&mirrored) {
            return false;
        }
        self.edge_set.insert(edge.clone());
        self.edges.push(edge);
        true
    }

    pub fn contains(&self, key: &PaperKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn node(&self, key: &PaperKey) -> Option<&CitationNode> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    pub(crate) fn node_mut(&mut self, key: &PaperKey) -> Option<&mut CitationNode> {
        match self.index.get(key) {
            Some(&i) => self.nodes.get_mut(i),
            None => None,
        }
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut CitationNode> {
        self.nodes.iter_mut()
    }

    /// Nodes in discovery order, seed first
    pub fn nodes(&self) -> &[CitationNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[CitationEdge] {
        &self.edges
    }

    pub fn seed_node(&self) -> Option<&CitationNode> {
        self.node(&self.seed)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Keys adjacent to `key` in either direction
    pub fn neighbors(&self, key: &PaperKey) -> HashSet<&PaperKey> {
        self.edges
            .iter()
            .filter_map(|e| {
                if &e.from == key {
                    Some(&e.to)
                } else if &e.to == key {
                    Some(&e.from)
                } else {
                    None
                }
            })
            .collect()
    }
}
