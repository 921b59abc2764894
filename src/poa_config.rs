
/*!
Contains configuration information for the POA consensus.
Typical usage is to the use the builder to construct the config, e.g.
```
use poa_con::poa_config::{PoaConfig, PoaConfigBuilder};
let config: PoaConfig = PoaConfigBuilder::default()
    .mismatch_penalty(-4)
    .record_name(Some("molecule_1".to_string()))
    .build()
    .unwrap();
assert_eq!(config.record_name(), "molecule_1");
```
*/

use crate::scoring::ScoringModel;

/// The record name reported when the user does not provide one
pub const DEFAULT_RECORD_NAME: &str = "consensus";

/**
Contains configuration information for the POA consensus.
Typical usage is to the use the builder to construct the config, e.g.
```
use poa_con::poa_config::{PoaConfig, PoaConfigBuilder};
let config: PoaConfig = PoaConfigBuilder::default()
    .quality_weighted(true)
    .build()
    .unwrap();
assert_eq!(config.scoring().match_score(), 1);
```
*/
#[derive(derive_builder::Builder, Clone, Debug)]
#[builder(default)]
pub struct PoaConfig {
    /// Reward for identical symbols during alignment
    pub match_score: i32,
    /// Score for differing symbols during alignment, typically negative
    pub mismatch_penalty: i32,
    /// Score for an inserted or deleted symbol during alignment, typically negative
    pub gap_penalty: i32,
    /// If true, edges are weighted by base qualities instead of read counts.
    /// Reads added without qualities then contribute a weight of 1 per base, far below typical Phred values, so mixing them with quality-scored reads down-weights them.
    pub quality_weighted: bool,
    /// The offset subtracted from each quality byte to get the Phred value
    pub quality_offset: u8,
    /// Optional name for the output record
    pub record_name: Option<String>
}

impl Default for PoaConfig {
    fn default() -> Self {
        let scoring = ScoringModel::default();
        Self {
            match_score: scoring.match_score(),
            mismatch_penalty: scoring.mismatch_penalty(),
            gap_penalty: scoring.gap_penalty(),
            // read counts are easier to reason about; qualities are opt-in
            quality_weighted: false,
            // FASTQ standard
            quality_offset: 33,
            record_name: None
        }
    }
}

impl PoaConfig {
    /// Returns the scoring model described by this config
    pub fn scoring(&self) -> ScoringModel {
        ScoringModel::new(self.match_score, self.mismatch_penalty, self.gap_penalty)
    }

    /// Returns the output record name, falling back to the default placeholder
    pub fn record_name(&self) -> &str {
        self.record_name.as_deref().unwrap_or(DEFAULT_RECORD_NAME)
    }
}
