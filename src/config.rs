use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::{MapperError, Result};

/// What to do with a reference byte outside the residue alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum DisallowedPolicy {
    /// Fail the corpus build with `InvalidSequence`.
    Reject,
    /// Replace the byte with the unknown residue `X`.
    #[value(name = "x")]
    MapToUnknown,
}

/// How query and corpus residues are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum MatchingType {
    /// Every symbol matches only itself.
    String,
    /// Ambiguity symbols match the residues they stand for.
    AminoAcid,
    /// As `AminoAcid`, with I and L interchangeable.
    Indistinguishable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub max_sequence_len: usize,
    pub disallowed: DisallowedPolicy,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self { max_sequence_len: 100_000, disallowed: DisallowedPolicy::MapToUnknown }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Every `sa_sample_rate`-th text position keeps its suffix array entry.
    pub sa_sample_rate: u32,
    /// Distance between Occ checkpoints in the BWT.
    pub occ_interval: u32,
    /// Upper bound on the concatenated corpus length, sentinels included.
    pub max_corpus_len: usize,
}

/// Hard ceiling: text positions and ranks are stored as `u32`.
pub const INDEX_CAPACITY: usize = u32::MAX as usize - 1;

impl Default for IndexConfig {
    fn default() -> Self {
        Self { sa_sample_rate: 16, occ_interval: 64, max_corpus_len: INDEX_CAPACITY }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sa_sample_rate == 0 {
            return Err(MapperError::InvalidConfig("sa_sample_rate must be positive".into()));
        }
        if self.occ_interval == 0 {
            return Err(MapperError::InvalidConfig("occ_interval must be positive".into()));
        }
        Ok(())
    }

    /// The effective length ceiling, never above what `u32` positions can address.
    pub fn capacity(&self) -> usize {
        self.max_corpus_len.min(INDEX_CAPACITY)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_query_len: usize,
    pub max_substitutions: u32,
    /// Matches whose share of `X` positions is above this are dropped.
    pub max_x_fraction: Option<f64>,
    pub matching: MatchingType,
    /// `None` disables the query cache.
    pub cache_capacity: Option<NonZeroUsize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_query_len: 1_000,
            max_substitutions: 4,
            max_x_fraction: Some(0.25),
            matching: MatchingType::Indistinguishable,
            cache_capacity: NonZeroUsize::new(10_000),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_query_len == 0 {
            return Err(MapperError::InvalidConfig("max_query_len must be positive".into()));
        }
        if let Some(f) = self.max_x_fraction {
            if !(0.0..=1.0).contains(&f) {
                return Err(MapperError::InvalidConfig(format!(
                    "max_x_fraction must be within [0, 1], got {}",
                    f
                )));
            }
        }
        Ok(())
    }
}
