
/// Linear scoring model used for sequence-to-graph alignment.
/// All values are signed scores that get added to an alignment, so penalties are typically negative.
/// # Examples
/// ```rust
/// use poa_con::scoring::ScoringModel;
/// let scoring = ScoringModel::default();
/// assert_eq!(scoring.substitution(b'A', b'A'), 1);
/// assert_eq!(scoring.substitution(b'A', b'C'), -2);
/// assert_eq!(scoring.gap(), -2);
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ScoringModel {
    /// Reward for identical symbols
    match_score: i32,
    /// Score for differing symbols
    mismatch_penalty: i32,
    /// Score for inserting or deleting a single symbol
    gap_penalty: i32
}

impl Default for ScoringModel {
    fn default() -> Self {
        // conventional local alignment defaults
        Self {
            match_score: 1,
            mismatch_penalty: -2,
            gap_penalty: -2
        }
    }
}

impl ScoringModel {
    /// Constructor
    /// # Arguments
    /// * `match_score` - the reward for identical symbols
    /// * `mismatch_penalty` - the score for differing symbols
    /// * `gap_penalty` - the score for a single inserted or deleted symbol
    pub fn new(match_score: i32, mismatch_penalty: i32, gap_penalty: i32) -> ScoringModel {
        ScoringModel {
            match_score,
            mismatch_penalty,
            gap_penalty
        }
    }

    /// Returns the score for aligning symbol `a` against symbol `b`.
    pub fn substitution(&self, a: u8, b: u8) -> i32 {
        if a == b {
            self.match_score
        } else {
            self.mismatch_penalty
        }
    }

    /// Returns the score for aligning any symbol against a gap.
    pub fn gap(&self) -> i32 {
        self.gap_penalty
    }

    // Getters
    pub fn match_score(&self) -> i32 {
        self.match_score
    }

    pub fn mismatch_penalty(&self) -> i32 {
        self.mismatch_penalty
    }

    pub fn gap_penalty(&self) -> i32 {
        self.gap_penalty
    }
}
