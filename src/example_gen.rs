
use rand::distributions::Uniform;
use rand::{Rng, SeedableRng};

/// FASTQ quality for a simulated base that matches the true sequence
pub const HIGH_QUALITY: u8 = b'I';
/// FASTQ quality for a simulated substitution or insertion
pub const LOW_QUALITY: u8 = b'#';

/// A simulated set of reads from a single true sequence
#[derive(Clone, Debug)]
pub struct SimulatedReads {
    /// The true sequence the reads were sampled from
    pub consensus: Vec<u8>,
    /// The reads, each with independent errors
    pub reads: Vec<Vec<u8>>,
    /// FASTQ-encoded qualities for each read; error bases get `LOW_QUALITY`
    pub qualities: Vec<Vec<u8>>
}

/// Creates a test set with a known answer, using a fixed seed so results are reproducible.
/// # Arguments
/// * `alphabet` - the symbols to sample from, e.g. for DNA it's b"ACGT"
/// * `seq_len` - the length of the true sequence
/// * `num_samples` - the number of reads to generate from the true sequence
/// * `error_rate` - overall error rate, assumes mismatch, insertion, and deletion are equally likely sub-components of this error rate
pub fn generate_reads(alphabet: &[u8], seq_len: usize, num_samples: usize, error_rate: f64) -> SimulatedReads {
    assert!(alphabet.len() > 1);
    assert!((0.0..=1.0).contains(&error_rate));

    let alphabet_size = alphabet.len();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let base_distribution = Uniform::new(0, alphabet_size);
    let basem1_distribution = Uniform::new(1, alphabet_size);
    let error_distribution = Uniform::new(0.0, 1.0);
    let error_type_distribution = Uniform::new(0, 3);

    let consensus_indices: Vec<usize> = (0..seq_len)
        .map(|_i| rng.sample(base_distribution))
        .collect();

    let mut reads = Vec::with_capacity(num_samples);
    let mut qualities = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        let mut read = vec![];
        let mut quality = vec![];
        let mut con_index = 0;
        while con_index < consensus_indices.len() {
            let c = consensus_indices[con_index];
            let is_error = rng.sample(error_distribution) < error_rate;
            if is_error {
                match rng.sample(error_type_distribution) {
                    0 => {
                        // substitution, always to a different symbol
                        let alt_c = (c + rng.sample(basem1_distribution)) % alphabet_size;
                        read.push(alphabet[alt_c]);
                        quality.push(LOW_QUALITY);
                        con_index += 1;
                    },
                    1 => {
                        // deletion
                        con_index += 1;
                    },
                    2 => {
                        // insertion
                        read.push(alphabet[rng.sample(base_distribution)]);
                        quality.push(LOW_QUALITY);
                    },
                    _ => panic!("no impl")
                }
            } else {
                read.push(alphabet[c]);
                quality.push(HIGH_QUALITY);
                con_index += 1;
            }
        }
        reads.push(read);
        qualities.push(quality);
    }

    SimulatedReads {
        consensus: consensus_indices.iter().map(|&c| alphabet[c]).collect(),
        reads,
        qualities
    }
}
