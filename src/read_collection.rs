
/*!
Boundary helpers for getting reads into a consensus and the result back out.
Records are validated here so that sequence and quality lengths always agree before anything reaches the graph.

# Example usage
```rust
use std::io::Cursor;
use poa_con::consensus::PoaConsensus;
use poa_con::read_collection::{load_reads, write_fasta};

let fastq = "@read1\nACGTACGTAC\n+\nIIIIIIIIII\n@read2\nACGTACGTAC\n+\nIIIIIIIIII\n";
let records = load_reads(Cursor::new(fastq)).unwrap();
assert_eq!(records.len(), 2);

let mut poa = PoaConsensus::default();
for record in records.iter() {
    poa.add_record(record).unwrap();
}
let consensus = poa.consensus().unwrap();

let mut output: Vec<u8> = vec![];
write_fasta(&mut output, &consensus).unwrap();
assert_eq!(output, b">consensus\nACGTACGTAC\n");
```
*/

use std::io::{BufRead, Write};

use crate::consensus::Consensus;
use crate::errors::PoaError;

/// A single named read with its qualities
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadRecord {
    /// The record name
    name: String,
    /// The read symbols
    sequence: Vec<u8>,
    /// FASTQ-encoded qualities, one per symbol
    quality: Vec<u8>
}

impl ReadRecord {
    /// Constructor
    /// # Arguments
    /// * `name` - the record name
    /// * `sequence` - the read symbols
    /// * `quality` - the FASTQ-encoded qualities
    /// # Errors
    /// * if the sequence and quality have different lengths
    pub fn new(name: String, sequence: Vec<u8>, quality: Vec<u8>) -> Result<ReadRecord, PoaError> {
        if sequence.len() != quality.len() {
            return Err(PoaError::MismatchedLengths {
                sequence_len: sequence.len(),
                quality_len: quality.len()
            });
        }
        Ok(ReadRecord {
            name,
            sequence,
            quality
        })
    }

    // Getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn quality(&self) -> &[u8] {
        &self.quality
    }
}

/// Streaming reader for four-line FASTQ records.
/// Blank lines between records are ignored.
pub struct FastqReader<R: BufRead> {
    /// The underlying reader
    reader: R,
    /// Number of lines consumed so far
    line_number: usize,
    /// Reusable line buffer
    buffer: String
}

impl<R: BufRead> FastqReader<R> {
    /// Wraps a buffered reader
    pub fn new(reader: R) -> FastqReader<R> {
        FastqReader {
            reader,
            line_number: 0,
            buffer: String::new()
        }
    }

    /// Returns the next line without its line ending, or None at end of input.
    fn next_line(&mut self) -> Result<Option<String>, PoaError> {
        self.buffer.clear();
        let bytes_read = self.reader.read_line(&mut self.buffer)?;
        if bytes_read == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(self.buffer.trim_end_matches(&['\n', '\r'][..]).to_string()))
    }

    /// Returns the next line of a record that has already started.
    fn required_line(&mut self, field: &str) -> Result<String, PoaError> {
        self.next_line()?
            .ok_or_else(|| PoaError::MalformedRecord {
                line: self.line_number + 1,
                reason: format!("missing {field} line")
            })
    }

    /// Parses the next full record, or returns None at end of input.
    fn read_record(&mut self) -> Result<Option<ReadRecord>, PoaError> {
        let header = loop {
            match self.next_line()? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line
            }
        };

        let name = match header.strip_prefix('@') {
            // only the first token is the name, the rest is a free-form comment
            Some(h) => h.split_whitespace().next().unwrap_or_default().to_string(),
            None => return Err(PoaError::MalformedRecord {
                line: self.line_number,
                reason: format!("expected a header starting with '@', found {header:?}")
            })
        };

        let sequence = self.required_line("sequence")?;
        let separator = self.required_line("separator")?;
        if !separator.starts_with('+') {
            return Err(PoaError::MalformedRecord {
                line: self.line_number,
                reason: format!("expected a separator starting with '+', found {separator:?}")
            });
        }
        let quality = self.required_line("quality")?;

        ReadRecord::new(name, sequence.into_bytes(), quality.into_bytes()).map(Some)
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<ReadRecord, PoaError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Loads every FASTQ record from a reader, in file order.
/// # Arguments
/// * `reader` - the FASTQ source
/// # Errors
/// * if any record is malformed or has mismatched sequence and quality lengths
/// * if the reader fails
pub fn load_reads<R: BufRead>(reader: R) -> Result<Vec<ReadRecord>, PoaError> {
    FastqReader::new(reader).collect()
}

/// Writes a consensus as a single unwrapped FASTA record.
/// # Arguments
/// * `writer` - the output sink
/// * `consensus` - the record to write
/// # Errors
/// * if the writer fails
pub fn write_fasta<W: Write>(writer: &mut W, consensus: &Consensus) -> Result<(), PoaError> {
    writeln!(writer, ">{}", consensus.name())?;
    writer.write_all(consensus.sequence())?;
    writeln!(writer)?;
    Ok(())
}
