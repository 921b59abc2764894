
/*!
This module provides access to the PoaConsensus, which generates the single best-supported consensus for a set of reads.
Reads are folded into a partial order graph one at a time, in the order they were added, and the consensus is the heaviest path through the final graph.

# Example usage
```rust
use poa_con::consensus::PoaConsensus;

let sequences = [
    b"ACGTACGTAC".to_vec(),
    b"ACGTACGTAC".to_vec(), // this should be the consensus
    b"ACGTTCGTAC".to_vec()
];

// add all the sequences
let mut poa: PoaConsensus = Default::default();
for s in sequences.iter() {
    poa.add_sequence(s).unwrap();
}

// run consensus and check the results
let consensus = poa.consensus().unwrap();
assert_eq!(consensus.name(), "consensus");
assert_eq!(consensus.sequence(), sequences[0]);
assert_eq!(consensus.coverage(), &[3, 3, 3, 3, 2, 3, 3, 3, 3, 3]);
```
*/

use log::{debug, trace};

use crate::errors::PoaError;
use crate::graph_alignment::AlignmentEngine;
use crate::poa_config::PoaConfig;
use crate::poa_graph::PoaGraph;
use crate::read_collection::ReadRecord;

/// Contains a final consensus result
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Consensus {
    /// The name for the output record
    name: String,
    /// The generated consensus
    sequence: Vec<u8>,
    /// For each consensus base, the number of reads that were aligned through it
    coverage: Vec<u64>
}

impl Consensus {
    /// Constructor, `coverage` must have one entry per consensus symbol
    pub(crate) fn new(name: String, sequence: Vec<u8>, coverage: Vec<u64>) -> Consensus {
        assert_eq!(sequence.len(), coverage.len());
        Consensus {
            name,
            sequence,
            coverage
        }
    }

    // Getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn coverage(&self) -> &[u64] {
        &self.coverage
    }
}

/// Core utility that will generate a consensus sequence using partial order alignment.
/// The order that reads are added matters, since each read is aligned against the graph built from all of the reads before it.
#[derive(Debug, Default)]
pub struct PoaConsensus<'a> {
    /// Contains all the sequences that have been added to this consensus so far.
    sequences: Vec<&'a [u8]>,
    /// Optional qualities for each sequence, same length as the sequence when present.
    qualities: Vec<Option<&'a [u8]>>,
    /// The config for this consensus run
    config: PoaConfig
}

impl<'a> PoaConsensus<'a> {
    /// Creates a new instance of PoaConsensus.
    /// # Arguments
    /// * `config` - the scoring and output options
    /// # Errors
    /// * None so far
    pub fn with_config(config: PoaConfig) -> Result<PoaConsensus<'a>, PoaError> {
        Ok(PoaConsensus {
            sequences: vec![],
            qualities: vec![],
            config
        })
    }

    /// Adds a new sequence without qualities.
    /// # Arguments
    /// * `sequence` - the new sequence to add
    /// # Errors
    /// * None so far
    pub fn add_sequence(&mut self, sequence: &'a [u8]) -> Result<(), PoaError> {
        self.push_read(sequence, None);
        Ok(())
    }

    /// Adds a new sequence along with its qualities.
    /// # Arguments
    /// * `sequence` - the new sequence to add
    /// * `quality` - the per-base qualities, encoded with `quality_offset`
    /// # Errors
    /// * if the sequence and quality lengths differ
    pub fn add_read(&mut self, sequence: &'a [u8], quality: &'a [u8]) -> Result<(), PoaError> {
        if sequence.len() != quality.len() {
            return Err(PoaError::MismatchedLengths {
                sequence_len: sequence.len(),
                quality_len: quality.len()
            });
        }
        self.push_read(sequence, Some(quality));
        Ok(())
    }

    /// Adds a validated read record, see `add_read(...)`.
    /// # Arguments
    /// * `record` - the record to add
    /// # Errors
    /// * if the sequence and quality lengths differ
    pub fn add_record(&mut self, record: &'a ReadRecord) -> Result<(), PoaError> {
        self.add_read(record.sequence(), record.quality())
    }

    fn push_read(&mut self, sequence: &'a [u8], quality: Option<&'a [u8]>) {
        self.sequences.push(sequence);
        self.qualities.push(quality);
    }

    /// Builds the partial order graph from all of the reads.
    /// The first read seeds the graph; every following read is aligned to the current graph and then inserted.
    /// # Errors
    /// * if no reads were added
    /// * if any read is empty
    pub fn build_graph(&self) -> Result<PoaGraph, PoaError> {
        if self.sequences.is_empty() {
            return Err(PoaError::NoReads);
        }

        let engine = AlignmentEngine::new(self.config.scoring());
        let mut graph = PoaGraph::new();
        for (read_index, (&sequence, &quality)) in self.sequences.iter().zip(self.qualities.iter()).enumerate() {
            // against an empty graph, this is the trivial all-insertion script
            let edit_script = engine.align(sequence, &graph)?;
            let weights = self.base_weights(sequence, quality);
            graph.insert_aligned(sequence, weights.as_deref(), &edit_script)?;
            trace!("Read {read_index}: score = {}, ops (M, X, I, D) = {:?}", edit_script.score(), edit_script.op_counts());
        }

        debug!("Graph built from {} reads: {} nodes, {} edges", graph.num_sequences(), graph.num_nodes(), graph.num_edges());
        Ok(graph)
    }

    /// The core function that gets called after adding all the reads we care about.
    /// # Errors
    /// * if no reads were added
    /// * if any read is empty
    pub fn consensus(&self) -> Result<Consensus, PoaError> {
        let graph = self.build_graph()?;
        let min_support = self.min_support();
        let path = graph.heaviest_path(min_support)?;

        let (sequence, coverage): (Vec<u8>, Vec<u64>) = path.iter()
            .map(|&node_id| {
                let node = &graph.nodes()[node_id];
                (node.symbol(), node.coverage())
            })
            .unzip();

        debug!("Consensus \"{}\": {} bp from {} reads, min_support = {min_support}", self.config.record_name(), sequence.len(), self.sequences.len());
        Ok(Consensus::new(self.config.record_name().to_string(), sequence, coverage))
    }

    /// Converts qualities into edge weights when quality weighting is enabled.
    /// Reads without qualities get a weight of 1 per base, so they count for little next to Phred-scale weights.
    fn base_weights(&self, sequence: &[u8], quality: Option<&[u8]>) -> Option<Vec<u32>> {
        if !self.config.quality_weighted {
            return None;
        }
        let weights = match quality {
            Some(q) => q.iter()
                .map(|&b| b.saturating_sub(self.config.quality_offset) as u32)
                .collect(),
            None => vec![1; sequence.len()]
        };
        Some(weights)
    }

    /// Coverage preferred when breaking ties, half the reads rounded down and at least 1
    pub fn min_support(&self) -> u64 {
        ((self.sequences.len() / 2) as u64).max(1)
    }

    // getters
    pub fn sequences(&self) -> &[&'a [u8]] {
        &self.sequences
    }

    pub fn config(&self) -> &PoaConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use crate::example_gen::generate_reads;
    use crate::poa_config::PoaConfigBuilder;

    /// Helper that runs the default consensus over a set of sequences
    fn run_consensus(sequences: &[&[u8]]) -> Consensus {
        let mut poa = PoaConsensus::default();
        for &sequence in sequences.iter() {
            poa.add_sequence(sequence).unwrap();
        }
        poa.consensus().unwrap()
    }

    #[test]
    fn test_single_sequence() {
        let sequence = b"AAAA";
        let mut poa = PoaConsensus::default();
        poa.add_sequence(sequence).unwrap();
        assert_eq!(poa.sequences().len(), 1);

        // now check that the consensus is the same as our sequence
        let consensus = poa.consensus().unwrap();
        assert_eq!(consensus, Consensus {
            name: "consensus".to_string(),
            sequence: sequence.to_vec(),
            coverage: vec![1; 4]
        });
    }

    #[test]
    fn test_round_trip() {
        for sequence in [b"A".to_vec(), b"ACGTACGTACGT".to_vec(), b"GATTACA".to_vec(), b"ttgcaNNNacg".to_vec()].iter() {
            let consensus = run_consensus(&[sequence.as_slice()]);
            assert_eq!(consensus.sequence(), sequence.as_slice());
        }
    }

    #[test]
    fn test_identical_sequences() {
        let sequence: &[u8] = b"ACGTACGTACGTTTGACA";
        let consensus = run_consensus(&[sequence; 5]);
        assert_eq!(consensus.sequence(), sequence);
        assert_eq!(consensus.coverage(), &[5; 18]);
    }

    #[test]
    fn test_majority_vote() {
        let sequences: [&[u8]; 3] = [b"ACGT", b"ACGT", b"ACTT"];
        let mut poa = PoaConsensus::default();
        for &s in sequences.iter() {
            poa.add_sequence(s).unwrap();
        }
        assert_eq!(poa.min_support(), 1);

        let consensus = poa.consensus().unwrap();
        assert_eq!(consensus.sequence(), b"ACGT");
        assert_eq!(consensus.coverage(), &[3, 3, 2, 2]);
    }

    #[test]
    fn test_majority_vote_internal() {
        let expected = b"ACGTACGTACGT";
        let sequences: [&[u8]; 5] = [
            b"ACGTACGTACGT",
            b"ACGTTCGTACGT",
            b"ACGTACGTACGT",
            b"ACGTACGAACGT",
            b"ACGTACGTACGT"
        ];
        let consensus = run_consensus(&sequences);
        assert_eq!(consensus.sequence(), expected);
    }

    #[test]
    fn test_indels() {
        let expected = b"AAAACCCCGGGGTTTT";
        let sequences: [&[u8]; 5] = [
            b"AAAACCCCGGGGTTTT",
            // insertion
            b"AAAACCCCAGGGGTTTT",
            b"AAAACCCCGGGGTTTT",
            // deletion
            b"AAAACCCGGGGTTTT",
            b"AAAACCCCGGGGTTTT",
        ];
        let consensus = run_consensus(&sequences);
        assert_eq!(consensus.sequence(), expected);
    }

    #[test]
    fn test_shared_minority_insertion() {
        // 2 of 5 reads carry the same extra A
        let expected = b"AAAACCCCGGGGTTTT";
        let sequences: [&[u8]; 5] = [
            b"AAAACCCCGGGGTTTT",
            b"AAAACCCCAGGGGTTTT",
            b"AAAACCCCGGGGTTTT",
            b"AAAACCCCAGGGGTTTT",
            b"AAAACCCCGGGGTTTT",
        ];
        let consensus = run_consensus(&sequences);
        assert_eq!(consensus.sequence(), expected);
        assert_eq!(consensus.coverage(), &[5; 16]);
    }

    #[test]
    fn test_majority_deletion() {
        // 3 of 5 reads drop the A, including the second read
        let sequences: [&[u8]; 5] = [b"CCCCAGGGG", b"CCCCGGGG", b"CCCCAGGGG", b"CCCCGGGG", b"CCCCGGGG"];
        let consensus = run_consensus(&sequences);
        assert_eq!(consensus.sequence(), b"CCCCGGGG");
    }

    #[test]
    fn test_majority_over_first_read() {
        // the first read carries the minority allele, 3 of 5 reads disagree with it
        let a: &[u8] = b"ACGTAGCATGA";
        let b: &[u8] = b"ACGTACCATGA";
        let consensus = run_consensus(&[b, a, a, a, b]);
        assert_eq!(consensus.sequence(), a);
        assert_eq!(consensus.coverage()[5], 3);
    }

    #[test]
    fn test_even_split() {
        // 2 vs 2 with min_support = 2, both alleles qualify and the lowest node id wins, which is the first read's allele
        let a: &[u8] = b"ACGTAGCATGA";
        let b: &[u8] = b"ACGTACCATGA";

        let mut poa = PoaConsensus::default();
        for &s in [a, b, b, a].iter() {
            poa.add_sequence(s).unwrap();
        }
        assert_eq!(poa.min_support(), 2);
        let consensus = poa.consensus().unwrap();
        assert_eq!(consensus.sequence(), a);
        assert_eq!(consensus.coverage()[5], 2);

        let consensus = run_consensus(&[b, a, a, b]);
        assert_eq!(consensus.sequence(), b);
    }

    #[test]
    fn test_order_sensitivity() {
        // every read disagrees at the same site, so each read order keeps its first variant
        let a: &[u8] = b"ACGTAGCATGA";
        let b: &[u8] = b"ACGTACCATGA";
        let c: &[u8] = b"ACGTATCATGA";

        let forward = run_consensus(&[a, b, c]);
        let reverse = run_consensus(&[c, b, a]);
        assert_eq!(forward.sequence(), a);
        assert_eq!(reverse.sequence(), c);
        assert_ne!(forward.sequence(), reverse.sequence());
    }

    #[test]
    fn test_no_reads() {
        let poa = PoaConsensus::default();
        assert!(matches!(poa.consensus(), Err(PoaError::NoReads)));
        assert!(matches!(poa.build_graph(), Err(PoaError::NoReads)));
    }

    #[test]
    fn test_empty_read() {
        // the first read being empty fails
        let mut poa = PoaConsensus::default();
        poa.add_sequence(b"").unwrap();
        poa.add_sequence(b"ACGT").unwrap();
        assert!(matches!(poa.consensus(), Err(PoaError::InvalidInput(_))));

        // so does any later read
        let mut poa = PoaConsensus::default();
        poa.add_sequence(b"ACGT").unwrap();
        poa.add_sequence(b"").unwrap();
        let err = poa.consensus().err().unwrap();
        assert_eq!(err.to_string(), "invalid input: cannot align an empty sequence");
    }

    #[test]
    fn test_mismatched_lengths() {
        let mut poa = PoaConsensus::default();
        let result = poa.add_read(b"ACGT", b"III");
        assert!(matches!(result, Err(PoaError::MismatchedLengths { sequence_len: 4, quality_len: 3 })));
        assert!(poa.sequences().is_empty());
    }

    #[test]
    fn test_records() {
        let fastq = "@r1\nACGTAGCATGA\n+\nIIIIIIIIIII\n@r2\nACGTACCATGA\n+\nIIIIIIIIIII\n@r3\nACGTAGCATGA\n+\nIIIIIIIIIII\n";
        let records = crate::read_collection::load_reads(std::io::Cursor::new(fastq)).unwrap();
        let mut poa = PoaConsensus::default();
        for record in records.iter() {
            poa.add_record(record).unwrap();
        }
        assert_eq!(poa.sequences().len(), 3);
        assert_eq!(poa.consensus().unwrap().sequence(), b"ACGTAGCATGA");
    }

    #[test]
    fn test_record_name() {
        let config = PoaConfigBuilder::default()
            .record_name(Some("m64011_190830_220126/1/ccs".to_string()))
            .build().unwrap();
        let mut poa = PoaConsensus::with_config(config).unwrap();
        poa.add_read(b"ACGT", b"IIII").unwrap();
        let consensus = poa.consensus().unwrap();
        assert_eq!(consensus.name(), "m64011_190830_220126/1/ccs");
        assert_eq!(consensus.sequence(), b"ACGT");
    }

    #[test]
    fn test_quality_weighted() {
        // one confident read against two reads with low qualities around the variant site
        let sequences: [&[u8]; 3] = [b"ACGTAGCATGA", b"ACGTACCATGA", b"ACGTACCATGA"];
        let qualities: [&[u8]; 3] = [b"IIIIIIIIIII", b"IIII###IIII", b"IIII###IIII"];

        // counts alone favor the C
        let mut poa = PoaConsensus::default();
        for (s, q) in sequences.iter().zip(qualities.iter()) {
            poa.add_read(s, q).unwrap();
        }
        assert_eq!(poa.consensus().unwrap().sequence(), b"ACGTACCATGA");

        // qualities favor the G
        let config = PoaConfigBuilder::default()
            .quality_weighted(true)
            .build().unwrap();
        let mut poa = PoaConsensus::with_config(config).unwrap();
        for (s, q) in sequences.iter().zip(qualities.iter()) {
            poa.add_read(s, q).unwrap();
        }
        assert_eq!(poa.consensus().unwrap().sequence(), b"ACGTAGCATGA");
    }

    #[test]
    fn test_graph_shape() {
        let mut poa = PoaConsensus::default();
        poa.add_sequence(b"ACGTAGCATGA").unwrap();
        poa.add_sequence(b"ACGTACCATGA").unwrap();
        let graph = poa.build_graph().unwrap();
        assert_eq!(graph.num_sequences(), 2);
        assert_eq!(graph.num_nodes(), 12);
        assert_eq!(graph.num_edges(), 12);
    }

    /// Plain edit distance, only used to sanity check simulated results
    fn edit_distance(v1: &[u8], v2: &[u8]) -> usize {
        let mut previous: Vec<usize> = (0..=v2.len()).collect();
        for (i, &c1) in v1.iter().enumerate() {
            let mut current = vec![i + 1; v2.len() + 1];
            for (j, &c2) in v2.iter().enumerate() {
                let substitution = previous[j] + usize::from(c1 != c2);
                current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
            }
            previous = current;
        }
        previous[v2.len()]
    }

    #[test_log::test]
    fn test_simulated_exact() {
        let simulated = generate_reads(b"ACGT", 200, 8, 0.0);
        let mut poa = PoaConsensus::default();
        for s in simulated.reads.iter() {
            poa.add_sequence(s).unwrap();
        }
        let consensus = poa.consensus().unwrap();
        assert_eq!(consensus.sequence(), simulated.consensus.as_slice());
        assert!(consensus.coverage().iter().all(|&c| c == 8));
    }

    #[test_log::test]
    fn test_simulated_errors() {
        let simulated = generate_reads(b"ACGT", 200, 15, 0.01);
        let mut poa = PoaConsensus::default();
        for (s, q) in simulated.reads.iter().zip(simulated.qualities.iter()) {
            poa.add_read(s, q).unwrap();
        }
        let consensus = poa.consensus().unwrap();

        // errors in the first read at the very ends can survive local alignment, interior errors should not
        let ed = edit_distance(consensus.sequence(), &simulated.consensus);
        assert!(ed <= 4, "edit distance {ed} is too large");
    }

    #[derive(Debug, serde::Deserialize)]
    struct ReadRow {
        role: String,
        sequence: String
    }

    /// Wrapper test function that loads a test from a csv file.
    /// Expected columns are "role" ("consensus" or "read") and "sequence" (String).
    /// Returns a tuple of (reads, expected consensus).
    /// # Arguments
    /// * `filename` - the file path to load
    fn load_csv_test(filename: &std::path::Path) -> (Vec<Vec<u8>>, Vec<u8>) {
        let mut reads = vec![];
        let mut expected = None;

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(filename)
            .unwrap();
        for row in csv_reader.deserialize() {
            let record: ReadRow = row.unwrap();
            let sequence = record.sequence.as_bytes().to_vec();
            match record.role.as_str() {
                "consensus" => {
                    assert!(expected.is_none());
                    expected = Some(sequence);
                },
                "read" => reads.push(sequence),
                other => panic!("unknown role: {other}")
            }
        }
        (reads, expected.unwrap())
    }

    /// Entry point for the file-based tests
    /// # Arguments
    /// * `filename` - the test file to load, will be a csv
    fn run_test_file(filename: &str) {
        let (reads, expected_consensus) = load_csv_test(&PathBuf::from(filename));
        let mut poa = PoaConsensus::default();
        for read in reads.iter() {
            poa.add_sequence(read).unwrap();
        }

        let consensus = poa.consensus().unwrap();
        assert_eq!(consensus.sequence(), expected_consensus.as_slice());
    }

    #[test]
    fn test_csv_majority_001() {
        run_test_file("./tests/majority_001.csv");
    }

    #[test]
    fn test_csv_indel_001() {
        run_test_file("./tests/indel_001.csv");
    }
}
