/*!
# poa_con
This library generates a single consensus sequence from a set of highly similar reads (e.g., repeated passes over the same molecule) using partial order alignment.

Key points:
* Each read is locally aligned to a partial order graph built from all of the previous reads, then threaded into it
* The consensus is the heaviest weighted path through the final graph
* Reads are folded in strictly in the order provided, so changing the order can change the result

Performance notes:
* Alignment is a full dynamic programming pass over (graph nodes x read length) for every read, so cost grows with read length and graph complexity
* Reads within one consensus are processed sequentially; independent consensus runs can be spread across threads

# Example usage
```rust
use poa_con::consensus::PoaConsensus;

let sequences = [
    b"ACGT".to_vec(),
    b"ACGT".to_vec(), // this should be the consensus
    b"ACTT".to_vec()
];

// add all the sequences
let mut poa: PoaConsensus = Default::default();
for s in sequences.iter() {
    poa.add_sequence(s).unwrap();
}

// run consensus and check the results
let consensus = poa.consensus().unwrap();
assert_eq!(consensus.sequence(), sequences[0]);
assert_eq!(consensus.coverage(), &[3, 3, 2, 2]);
```
*/

/// Main functionality for the consensus pipeline
pub mod consensus;
/// Error types shared across the crate
pub mod errors;
/// Utility for generating examples
pub mod example_gen;
/// Local alignment of a sequence to a partial order graph
pub mod graph_alignment;
/// Configuration for PoaConsensus
pub mod poa_config;
/// The partial order graph and heaviest path extraction
pub mod poa_graph;
/// FASTQ input and FASTA output for reads and consensus records
pub mod read_collection;
/// Linear alignment scoring
pub mod scoring;
