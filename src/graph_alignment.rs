
/*!
This module provides local alignment of a sequence against a PoaGraph.
The alignment is a read-only computation that produces an `EditScript`, which can later be applied to the graph with `PoaGraph::insert_aligned(...)`.

# Example usage
```rust
use poa_con::graph_alignment::{AlignmentEngine, EditOp, EditScript};
use poa_con::poa_graph::PoaGraph;

let mut graph = PoaGraph::new();
graph.insert_aligned(b"ACGTACGT", None, &EditScript::trivial(8)).unwrap();

let engine = AlignmentEngine::default();
let script = engine.align(b"ACGTCCGT", &graph).unwrap();
assert_eq!(script.score(), 5);
assert_eq!(script.operations()[4], EditOp::Mismatch(4, 4));
```
*/

use itertools::Itertools;
use log::trace;

use crate::errors::PoaError;
use crate::poa_graph::{NodeId, PoaGraph};
use crate::scoring::ScoringModel;

/// A single step of an alignment between a sequence and the graph
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EditOp {
    /// Graph node and sequence position carry the same symbol
    Match(NodeId, usize),
    /// Graph node and sequence position carry different symbols
    Mismatch(NodeId, usize),
    /// Sequence position with no graph counterpart
    Insertion(usize),
    /// Graph node with no sequence counterpart
    Deletion(NodeId)
}

impl EditOp {
    /// Returns the graph node consumed by this operation, if any
    pub fn node(&self) -> Option<NodeId> {
        match *self {
            EditOp::Match(node_id, _) |
            EditOp::Mismatch(node_id, _) |
            EditOp::Deletion(node_id) => Some(node_id),
            EditOp::Insertion(_) => None
        }
    }

    /// Returns the sequence position consumed by this operation, if any
    pub fn position(&self) -> Option<usize> {
        match *self {
            EditOp::Match(_, position) |
            EditOp::Mismatch(_, position) |
            EditOp::Insertion(position) => Some(position),
            EditOp::Deletion(_) => None
        }
    }
}

/// The ordered result of aligning one sequence to the graph.
/// Every sequence position shows up exactly once and in order; positions outside of the local alignment are insertions.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EditScript {
    /// The operations, ordered by sequence position
    operations: Vec<EditOp>,
    /// The local alignment score that generated the operations
    score: i32
}

impl EditScript {
    /// Constructor
    pub fn new(operations: Vec<EditOp>, score: i32) -> EditScript {
        EditScript {
            operations,
            score
        }
    }

    /// Creates a script that inserts every position of a sequence, which is the only alignment possible against an empty graph.
    /// # Arguments
    /// * `sequence_len` - the length of the sequence
    pub fn trivial(sequence_len: usize) -> EditScript {
        EditScript {
            operations: (0..sequence_len).map(EditOp::Insertion).collect(),
            score: 0
        }
    }

    /// Returns true if nothing in the script touches an existing graph node
    pub fn is_trivial(&self) -> bool {
        self.operations.iter().all(|op| matches!(op, EditOp::Insertion(_)))
    }

    /// Returns the number of (matches, mismatches, insertions, deletions) in the script
    pub fn op_counts(&self) -> (usize, usize, usize, usize) {
        let counts = self.operations.iter()
            .counts_by(|op| match op {
                EditOp::Match(_, _) => 0,
                EditOp::Mismatch(_, _) => 1,
                EditOp::Insertion(_) => 2,
                EditOp::Deletion(_) => 3
            });
        let get = |key: usize| counts.get(&key).copied().unwrap_or(0);
        (get(0), get(1), get(2), get(3))
    }

    // Getters
    pub fn operations(&self) -> &[EditOp] {
        &self.operations
    }

    pub fn score(&self) -> i32 {
        self.score
    }
}

/// Traceback pointer for a single cell; predecessor values are rows in the matrix
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Trace {
    /// Local alignment starts here
    Stop,
    /// Came from a predecessor row and the previous column
    Diagonal(usize),
    /// Came from a predecessor row in the same column, skipping the graph node
    Deletion(usize),
    /// Came from the same row and the previous column, skipping the sequence symbol
    Insertion
}

/// Local (Smith-Waterman style) aligner between a sequence and a partial order graph
#[derive(Clone, Debug, Default)]
pub struct AlignmentEngine {
    /// The scoring for each step of the alignment
    scoring: ScoringModel
}

impl AlignmentEngine {
    /// Constructor
    /// # Arguments
    /// * `scoring` - the scoring model to align with
    pub fn new(scoring: ScoringModel) -> AlignmentEngine {
        AlignmentEngine {
            scoring
        }
    }

    /// Computes the best local alignment of `sequence` to `graph`.
    /// The graph is treated as the second sequence, so each row in the matrix is a node (in topological order) and every predecessor of that node is considered.
    /// Predecessors are tested in ascending node id and the last one tested wins a tie.
    /// On equal scores, a diagonal step is preferred over a deletion, which is preferred over an insertion.
    /// # Arguments
    /// * `sequence` - the sequence to align, must be non-empty
    /// * `graph` - the current graph, if empty every position is an insertion
    /// # Errors
    /// * if `sequence` is empty
    pub fn align(&self, sequence: &[u8], graph: &PoaGraph) -> Result<EditScript, PoaError> {
        if sequence.is_empty() {
            return Err(PoaError::InvalidInput("cannot align an empty sequence".to_string()));
        }
        if graph.is_empty() {
            return Ok(EditScript::trivial(sequence.len()));
        }

        let order = graph.topological_order();
        let num_rows = order.len() + 1;
        let num_cols = sequence.len() + 1;

        // row 0 is the virtual start, every node row is offset by 1
        let mut node_rows: Vec<usize> = vec![0; graph.num_nodes()];
        for (rank, &node_id) in order.iter().enumerate() {
            node_rows[node_id] = rank + 1;
        }

        // flattened matrices, row-major
        let mut scores: Vec<i32> = vec![0; num_rows * num_cols];
        let mut traceback: Vec<Trace> = vec![Trace::Stop; num_rows * num_cols];
        let mut best_score: i32 = 0;
        let mut best_cell: (usize, usize) = (0, 0);
        let gap = self.scoring.gap();

        for (rank, &node_id) in order.iter().enumerate() {
            let row = rank + 1;
            let symbol = graph.nodes()[node_id].symbol();

            // sources hang off of the virtual start row
            let predecessor_rows: Vec<usize> = {
                let predecessors: Vec<NodeId> = graph.predecessors(node_id).sorted().collect();
                if predecessors.is_empty() {
                    vec![0]
                } else {
                    predecessors.iter().map(|&p| node_rows[p]).collect()
                }
            };

            for col in 1..num_cols {
                let substitution = self.scoring.substitution(symbol, sequence[col - 1]);

                // best diagonal and deletion among the predecessors, last tested wins ties
                let mut diagonal: Option<(i32, usize)> = None;
                let mut deletion: Option<(i32, usize)> = None;
                for &pred_row in predecessor_rows.iter() {
                    let diagonal_score = scores[pred_row * num_cols + col - 1] + substitution;
                    if diagonal.map_or(true, |(s, _)| diagonal_score >= s) {
                        diagonal = Some((diagonal_score, pred_row));
                    }
                    let deletion_score = scores[pred_row * num_cols + col] + gap;
                    if deletion.map_or(true, |(s, _)| deletion_score >= s) {
                        deletion = Some((deletion_score, pred_row));
                    }
                }
                let insertion_score = scores[row * num_cols + col - 1] + gap;

                // local alignment, so nothing goes below zero
                let mut cell_score = 0;
                let mut cell_trace = Trace::Stop;
                if let Some((s, pred_row)) = diagonal {
                    if s > cell_score {
                        cell_score = s;
                        cell_trace = Trace::Diagonal(pred_row);
                    }
                }
                if let Some((s, pred_row)) = deletion {
                    if s > cell_score {
                        cell_score = s;
                        cell_trace = Trace::Deletion(pred_row);
                    }
                }
                if insertion_score > cell_score {
                    cell_score = insertion_score;
                    cell_trace = Trace::Insertion;
                }

                let index = row * num_cols + col;
                scores[index] = cell_score;
                traceback[index] = cell_trace;
                if cell_score > best_score {
                    best_score = cell_score;
                    best_cell = (row, col);
                }
            }
        }

        // walk back from the best cell until the local alignment starts
        let (mut row, mut col) = best_cell;
        let end_col = col;
        let mut aligned_ops: Vec<EditOp> = vec![];
        while row > 0 && col > 0 && scores[row * num_cols + col] > 0 {
            let node_id = order[row - 1];
            match traceback[row * num_cols + col] {
                Trace::Diagonal(pred_row) => {
                    let position = col - 1;
                    if graph.nodes()[node_id].symbol() == sequence[position] {
                        aligned_ops.push(EditOp::Match(node_id, position));
                    } else {
                        aligned_ops.push(EditOp::Mismatch(node_id, position));
                    }
                    row = pred_row;
                    col -= 1;
                },
                Trace::Deletion(pred_row) => {
                    aligned_ops.push(EditOp::Deletion(node_id));
                    row = pred_row;
                },
                Trace::Insertion => {
                    aligned_ops.push(EditOp::Insertion(col - 1));
                    col -= 1;
                },
                Trace::Stop => break
            }
        }
        let start_col = col;

        // unaligned flanks become insertions
        let operations: Vec<EditOp> = (0..start_col).map(EditOp::Insertion)
            .chain(aligned_ops.into_iter().rev())
            .chain((end_col..sequence.len()).map(EditOp::Insertion))
            .collect();

        trace!("Aligned {} bp to {} nodes, score {} over positions {}..{}", sequence.len(), order.len(), best_score, start_col, end_col);
        Ok(EditScript::new(operations, best_score))
    }

    // Getters
    pub fn scoring(&self) -> &ScoringModel {
        &self.scoring
    }
}
