
/*!
This module provides the PoaGraph, an append-only partial order graph of single-symbol nodes.
Nodes are stored in an arena and addressed by their index, which never changes once assigned.
Sequences are added by applying an `EditScript` produced by the alignment engine, and the consensus is the heaviest weighted path through the graph.

# Example usage
```rust
use poa_con::graph_alignment::EditScript;
use poa_con::poa_graph::PoaGraph;

let sequence = b"ACGT";
let mut graph = PoaGraph::new();
graph.insert_aligned(sequence, None, &EditScript::trivial(sequence.len())).unwrap();
assert_eq!(graph.num_nodes(), 4);
assert_eq!(graph.consensus(1).unwrap(), sequence.to_vec());
```
*/

use log::trace;
use priority_queue::PriorityQueue;
use rustc_hash::FxHashMap as HashMap;
use std::cmp::Reverse;

use crate::errors::PoaError;
use crate::graph_alignment::{EditOp, EditScript};

/// Index of a node in the graph arena
pub type NodeId = usize;

/// A directed, weighted transition between two nodes
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Edge {
    /// The node this edge leaves
    source: NodeId,
    /// The node this edge enters
    target: NodeId,
    /// Cumulative traversal weight, used for consensus scoring
    weight: u64,
    /// Number of sequences that traversed this edge
    support: u64
}

impl Edge {
    // Getters
    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }

    pub fn support(&self) -> u64 {
        self.support
    }
}

/// A single symbol in the graph along with its connectivity
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GraphNode {
    /// Stable identifier, equal to the arena index
    id: NodeId,
    /// The symbol for this node
    symbol: u8,
    /// Indices into the edge arena for incoming edges
    in_edges: Vec<usize>,
    /// Indices into the edge arena for outgoing edges
    out_edges: Vec<usize>,
    /// Nodes occupying the same alignment column with a different symbol
    aligned_nodes: Vec<NodeId>,
    /// Number of sequences threaded through this node
    coverage: u64
}

impl GraphNode {
    fn new(id: NodeId, symbol: u8) -> GraphNode {
        GraphNode {
            id,
            symbol,
            in_edges: vec![],
            out_edges: vec![],
            aligned_nodes: vec![],
            coverage: 0
        }
    }

    // Getters
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn symbol(&self) -> u8 {
        self.symbol
    }

    pub fn in_edges(&self) -> &[usize] {
        &self.in_edges
    }

    pub fn out_edges(&self) -> &[usize] {
        &self.out_edges
    }

    pub fn aligned_nodes(&self) -> &[NodeId] {
        &self.aligned_nodes
    }

    pub fn coverage(&self) -> u64 {
        self.coverage
    }
}

/// The partial order graph, which owns every node and edge created during one consensus run.
#[derive(Clone, Debug, Default)]
pub struct PoaGraph {
    /// Node arena, indexed by NodeId
    nodes: Vec<GraphNode>,
    /// Edge arena, referenced by index from the nodes
    edges: Vec<Edge>,
    /// Lookup from (source, target) to the index in the edge arena
    edge_lookup: HashMap<(NodeId, NodeId), usize>,
    /// Number of sequences inserted so far
    num_sequences: usize,
    /// Cached topological order, refreshed after every insertion
    topological_order: Vec<NodeId>
}

impl PoaGraph {
    /// Creates a new empty graph
    pub fn new() -> PoaGraph {
        Default::default()
    }

    /// Applies an edit script to the graph, threading `sequence` through existing and new nodes.
    /// This is the only operation that mutates the graph, and it never removes anything.
    /// # Arguments
    /// * `sequence` - the sequence that was aligned
    /// * `weights` - optional per-symbol weights; if None, each traversal adds 1 to an edge, otherwise it adds the weight of both endpoints
    /// * `edit_script` - the alignment of `sequence` to this graph
    /// # Errors
    /// * if the sequence is empty
    /// * if `weights` and `sequence` have different lengths
    /// * if the edit script does not cover the sequence in order or references unknown nodes
    /// * if the nodes visited by the edit script do not follow the topological order of the graph
    pub fn insert_aligned(&mut self, sequence: &[u8], weights: Option<&[u32]>, edit_script: &EditScript) -> Result<(), PoaError> {
        self.validate_script(sequence, weights, edit_script)?;

        let nodes_before = self.nodes.len();
        let mut previous: Option<(NodeId, u64)> = None;
        for &op in edit_script.operations().iter() {
            let (node_id, position) = match op {
                // deleted nodes are skipped over, the next visited node links from the previous one
                EditOp::Deletion(_) => continue,
                EditOp::Insertion(position) => (self.add_node(sequence[position]), position),
                EditOp::Match(target, position) |
                EditOp::Mismatch(target, position) => (self.aligned_node(target, sequence[position]), position)
            };

            let base_weight = weights.map_or(1, |w| w[position] as u64);
            self.nodes[node_id].coverage += 1;
            if let Some((previous_id, previous_weight)) = previous {
                let increment = if weights.is_some() {
                    (previous_weight + base_weight).max(1)
                } else {
                    1
                };
                self.add_edge(previous_id, node_id, increment);
            }
            previous = Some((node_id, base_weight));
        }

        self.num_sequences += 1;
        self.topological_order = self.topological_sort();
        trace!("Inserted sequence {} ({} bp): {} new nodes, {} total nodes, {} total edges",
            self.num_sequences, sequence.len(), self.nodes.len() - nodes_before, self.nodes.len(), self.edges.len());
        Ok(())
    }

    /// Checks that an edit script can be applied for the given sequence.
    fn validate_script(&self, sequence: &[u8], weights: Option<&[u32]>, edit_script: &EditScript) -> Result<(), PoaError> {
        if sequence.is_empty() {
            return Err(PoaError::InvalidInput("cannot insert an empty sequence".to_string()));
        }

        if let Some(w) = weights {
            if w.len() != sequence.len() {
                return Err(PoaError::MismatchedLengths { sequence_len: sequence.len(), quality_len: w.len() });
            }
        }

        let ranks = self.topological_ranks();
        let mut expected_position = 0;
        let mut previous_node: Option<NodeId> = None;
        for &op in edit_script.operations().iter() {
            if let Some(node_id) = op.node() {
                if node_id >= self.nodes.len() {
                    return Err(PoaError::InvalidInput(format!("edit script references unknown node {node_id}")));
                }
            }
            if let Some(position) = op.position() {
                if position != expected_position || position >= sequence.len() {
                    return Err(PoaError::InvalidInput(format!("edit script position {position} is out of order, expected {expected_position}")));
                }
                expected_position += 1;
            }

            // every existing node the sequence passes through must come strictly after the previous one
            if let EditOp::Match(target, position) | EditOp::Mismatch(target, position) = op {
                if let Some(node_id) = self.column_node(target, sequence[position]) {
                    if let Some(previous_id) = previous_node {
                        if ranks[previous_id] >= ranks[node_id] {
                            return Err(PoaError::InvalidInput(format!("edit script visits node {node_id} after node {previous_id}, which breaks the topological order")));
                        }
                    }
                    previous_node = Some(node_id);
                }
            }
        }

        if expected_position != sequence.len() {
            return Err(PoaError::InvalidInput(format!("edit script covers {expected_position} of {} positions", sequence.len())));
        }
        Ok(())
    }

    /// Appends a new, unconnected node to the arena.
    fn add_node(&mut self, symbol: u8) -> NodeId {
        let node_id = self.nodes.len();
        self.nodes.push(GraphNode::new(node_id, symbol));
        node_id
    }

    /// Returns the node that represents `symbol` in the alignment column of `target`.
    /// If neither `target` nor anything aligned to it carries `symbol`, a new node is added to the column.
    fn aligned_node(&mut self, target: NodeId, symbol: u8) -> NodeId {
        if let Some(node_id) = self.column_node(target, symbol) {
            return node_id;
        }

        // new column member, every existing member needs to know about it
        let new_id = self.add_node(symbol);
        let mut column = self.nodes[target].aligned_nodes.clone();
        column.push(target);
        for &member in column.iter() {
            self.nodes[member].aligned_nodes.push(new_id);
        }
        self.nodes[new_id].aligned_nodes = column;
        new_id
    }

    /// Returns the existing node in the column of `target` that carries `symbol`, if any.
    fn column_node(&self, target: NodeId, symbol: u8) -> Option<NodeId> {
        if self.nodes[target].symbol == symbol {
            return Some(target);
        }
        self.nodes[target].aligned_nodes.iter()
            .copied()
            .find(|&a| self.nodes[a].symbol == symbol)
    }

    /// Adds `increment` to the edge from `source` to `target`, creating the edge if needed.
    fn add_edge(&mut self, source: NodeId, target: NodeId, increment: u64) {
        match self.edge_lookup.get(&(source, target)) {
            Some(&edge_index) => {
                let edge = &mut self.edges[edge_index];
                edge.weight += increment;
                edge.support += 1;
            },
            None => {
                let edge_index = self.edges.len();
                self.edges.push(Edge {
                    source,
                    target,
                    weight: increment,
                    support: 1
                });
                self.edge_lookup.insert((source, target), edge_index);
                self.nodes[source].out_edges.push(edge_index);
                self.nodes[target].in_edges.push(edge_index);
            }
        }
    }

    /// Position of every node in the cached topological order, indexed by NodeId.
    fn topological_ranks(&self) -> Vec<usize> {
        let mut ranks = vec![0; self.nodes.len()];
        for (rank, &node_id) in self.topological_order.iter().enumerate() {
            ranks[node_id] = rank;
        }
        ranks
    }

    /// Kahn's algorithm, where ready nodes are always released lowest id first so the order is reproducible.
    fn topological_sort(&self) -> Vec<NodeId> {
        let mut in_degree: Vec<usize> = self.nodes.iter()
            .map(|n| n.in_edges.len())
            .collect();

        // the queue is a max-heap, so reverse the ids to pop the smallest
        let mut ready: PriorityQueue<NodeId, Reverse<NodeId>> = PriorityQueue::new();
        for (node_id, &degree) in in_degree.iter().enumerate() {
            if degree == 0 {
                ready.push(node_id, Reverse(node_id));
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some((node_id, _priority)) = ready.pop() {
            order.push(node_id);
            for &edge_index in self.nodes[node_id].out_edges.iter() {
                let target = self.edges[edge_index].target;
                in_degree[target] -= 1;
                if in_degree[target] == 0 {
                    ready.push(target, Reverse(target));
                }
            }
        }

        assert_eq!(order.len(), self.nodes.len(), "partial order graph contains a cycle");
        order
    }

    /// Finds the heaviest bundle through the graph, returned as node ids from the first to the last node.
    /// Each node keeps only its heaviest incoming edge, so a branch shared by a minority of sequences cannot outweigh the edge taken by the majority.
    /// Ties between incoming edges go to the heavier predecessor, then to edges backed by at least `min_support` sequences, then to the lowest source id.
    /// The path ends at the best scoring node and is then extended along the heaviest outgoing edges until it reaches a sink.
    /// # Arguments
    /// * `min_support` - coverage used to break ties; equally heavy choices backed by at least this many sequences are preferred, then the lowest node id
    /// # Errors
    /// * if nothing has been inserted into the graph
    pub fn heaviest_path(&self, min_support: u64) -> Result<Vec<NodeId>, PoaError> {
        if self.nodes.is_empty() {
            return Err(PoaError::EmptyGraph);
        }

        let num_nodes = self.nodes.len();
        let mut scores: Vec<u64> = vec![0; num_nodes];
        let mut best_edges: Vec<Option<usize>> = vec![None; num_nodes];
        for &node_id in self.topological_order.iter() {
            let best_edge = self.nodes[node_id].in_edges.iter()
                .copied()
                .max_by_key(|&e| {
                    let edge = &self.edges[e];
                    (edge.weight, scores[edge.source], edge.support >= min_support, Reverse(edge.source))
                });
            if let Some(edge_index) = best_edge {
                let edge = &self.edges[edge_index];
                scores[node_id] = scores[edge.source] + edge.weight;
                best_edges[node_id] = Some(edge_index);
            }
        }

        let best_node = (0..num_nodes)
            .max_by_key(|&node_id| (scores[node_id], self.nodes[node_id].coverage >= min_support, Reverse(node_id)))
            .ok_or(PoaError::EmptyGraph)?;

        let mut path = vec![best_node];
        let mut current = best_node;
        while let Some(edge_index) = best_edges[current] {
            current = self.edges[edge_index].source;
            path.push(current);
        }
        path.reverse();

        // successors of the best node may have preferred a different incoming edge, so it is not always a sink
        let mut current = best_node;
        while let Some(edge_index) = self.heaviest_out_edge(current, min_support) {
            current = self.edges[edge_index].target;
            path.push(current);
        }

        trace!("Heaviest path: {} nodes, best node {best_node} with score {}", path.len(), scores[best_node]);
        Ok(path)
    }

    /// Returns the heaviest edge out of `node_id`, ties go to edges meeting `min_support`, then the lowest target id.
    fn heaviest_out_edge(&self, node_id: NodeId, min_support: u64) -> Option<usize> {
        self.nodes[node_id].out_edges.iter()
            .copied()
            .max_by_key(|&e| {
                let edge = &self.edges[e];
                (edge.weight, edge.support >= min_support, Reverse(edge.target))
            })
    }

    /// Returns the symbols along the heaviest path, see `heaviest_path(...)`.
    /// # Arguments
    /// * `min_support` - coverage used to break ties between equally heavy paths
    /// # Errors
    /// * if nothing has been inserted into the graph
    pub fn consensus(&self, min_support: u64) -> Result<Vec<u8>, PoaError> {
        let path = self.heaviest_path(min_support)?;
        Ok(path.iter()
            .map(|&node_id| self.nodes[node_id].symbol)
            .collect())
    }

    /// Returns the ids of the nodes with an edge into `node_id`, in edge creation order.
    pub fn predecessors(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[node_id].in_edges.iter()
            .map(|&e| self.edges[e].source)
    }

    /// Returns the edge from `source` to `target` if it exists.
    pub fn edge_between(&self, source: NodeId, target: NodeId) -> Option<&Edge> {
        self.edge_lookup.get(&(source, target))
            .map(|&e| &self.edges[e])
    }

    // getters
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, node_id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(node_id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_sequences(&self) -> usize {
        self.num_sequences
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn topological_order(&self) -> &[NodeId] {
        &self.topological_order
    }
}
