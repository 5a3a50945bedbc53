use std::time::Instant;

use tracing::{debug, info};

use super::corpus::SequenceCorpus;
use super::fm::{FmIndex, Protein};
use super::{bwt, sa};
use crate::config::IndexConfig;
use crate::error::{MapperError, Result};
use crate::util::residue::SIGMA;

/// Builds an [`FmIndex`] from a frozen corpus: SA -> BWT -> Occ + sampled SA.
///
/// The result depends only on the corpus and the sampling parameters, so two
/// builds of the same input serialize to identical bytes.
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    config: IndexConfig,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn build(&self, corpus: &SequenceCorpus) -> Result<FmIndex> {
        self.config.validate()?;
        let n = corpus.text().len();
        let max = self.config.capacity();
        if n > max {
            return Err(MapperError::CorpusTooLarge { len: n, max });
        }

        info!(
            sequences = corpus.num_sequences(),
            residues = corpus.residue_count(),
            "building FM index"
        );
        let start = Instant::now();

        let text = corpus.text().to_vec();
        let proteins: Vec<Protein> = corpus
            .sequences()
            .iter()
            .map(|e| Protein { name: e.id.clone(), len: e.len as u32, offset: e.offset as u32 })
            .collect();

        let sa_arr = sa::build_sa(&text);
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "suffix array done");
        let bwt_arr = bwt::build_bwt(&text, &sa_arr);
        let fm = FmIndex::build(
            text,
            bwt_arr,
            &sa_arr,
            proteins,
            SIGMA as u8,
            self.config.occ_interval as usize,
            self.config.sa_sample_rate,
        );

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = fm.size_in_bytes(),
            "FM index built"
        );
        Ok(fm)
    }
}
