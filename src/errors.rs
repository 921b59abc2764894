
/// All of the failure modes for building a consensus.
/// Every error aborts the consensus for the current batch of reads, there is no partial output.
#[derive(Debug, thiserror::Error)]
pub enum PoaError {
    /// A sequence or edit script cannot be used as provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Consensus was requested before any sequence was inserted
    #[error("cannot generate a consensus from an empty graph")]
    EmptyGraph,

    /// The pipeline was run without any reads
    #[error("no reads were provided for consensus")]
    NoReads,

    /// A record's sequence and quality lengths differ
    #[error("sequence and qualities must have the same length: {sequence_len} != {quality_len}")]
    MismatchedLengths { sequence_len: usize, quality_len: usize },

    /// A FASTQ record could not be parsed
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
