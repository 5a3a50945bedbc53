use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{CorpusConfig, DisallowedPolicy};
use crate::error::{MapperError, Result};
use crate::util::residue;

/// One reference sequence inside the concatenated corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceEntry {
    pub id: String,
    pub offset: usize,
    pub len: usize,
}

/// All reference sequences as one residue-coded buffer.
///
/// Layout is `seq0 $ seq1 $ ... seqN $`: every sequence is followed by exactly
/// one sentinel and no sequence contains one.
#[derive(Debug, Clone)]
pub struct SequenceCorpus {
    text: Vec<u8>,
    sequences: Vec<SequenceEntry>,
}

impl SequenceCorpus {
    pub fn builder(config: CorpusConfig) -> CorpusBuilder {
        CorpusBuilder::new(config)
    }

    /// Build a corpus from `(identifier, raw sequence)` pairs, in order.
    pub fn from_records<I, S, T>(records: I, config: CorpusConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: AsRef<[u8]>,
    {
        let mut b = CorpusBuilder::new(config);
        for (id, seq) in records {
            b.push(id.as_ref(), seq.as_ref())?;
        }
        Ok(b.finish())
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn sequences(&self) -> &[SequenceEntry] {
        &self.sequences
    }

    pub fn num_sequences(&self) -> usize {
        self.sequences.len()
    }

    /// Total residues, sentinels excluded.
    pub fn residue_count(&self) -> usize {
        self.text.len() - self.sequences.len()
    }

    /// Residue codes of sequence `i`.
    pub fn sequence(&self, i: usize) -> &[u8] {
        let e = &self.sequences[i];
        &self.text[e.offset..e.offset + e.len]
    }
}

pub struct CorpusBuilder {
    config: CorpusConfig,
    text: Vec<u8>,
    sequences: Vec<SequenceEntry>,
    seen: HashSet<String>,
    replaced: usize,
}

impl CorpusBuilder {
    pub fn new(config: CorpusConfig) -> Self {
        Self { config, text: Vec::new(), sequences: Vec::new(), seen: HashSet::new(), replaced: 0 }
    }

    /// Validate, normalize and append one sequence.
    ///
    /// On error the builder is left unchanged.
    pub fn push(&mut self, id: &str, raw: &[u8]) -> Result<()> {
        if raw.is_empty() {
            return Err(MapperError::invalid_sequence(id, "sequence is empty"));
        }
        if raw.len() > self.config.max_sequence_len {
            return Err(MapperError::invalid_sequence(
                id,
                format!("length {} exceeds maximum {}", raw.len(), self.config.max_sequence_len),
            ));
        }

        let mut codes = Vec::with_capacity(raw.len());
        let mut replaced = 0usize;
        for (i, &b) in raw.iter().enumerate() {
            match residue::to_code(b) {
                Some(c) => codes.push(c),
                None => match self.config.disallowed {
                    DisallowedPolicy::Reject => {
                        return Err(MapperError::invalid_sequence(
                            id,
                            format!("disallowed symbol {:?} at position {}", b as char, i),
                        ));
                    }
                    DisallowedPolicy::MapToUnknown => {
                        codes.push(residue::UNKNOWN);
                        replaced += 1;
                    }
                },
            }
        }

        if !self.seen.insert(id.to_string()) {
            warn!(id, "duplicate sequence identifier");
        }
        if replaced > 0 {
            debug!(id, replaced, "mapped disallowed symbols to X");
            self.replaced += replaced;
        }

        let offset = self.text.len();
        self.text.extend_from_slice(&codes);
        // sentinel after every sequence
        self.text.push(residue::SENTINEL);
        self.sequences.push(SequenceEntry { id: id.to_string(), offset, len: codes.len() });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn finish(self) -> SequenceCorpus {
        if self.replaced > 0 {
            warn!(replaced = self.replaced, "corpus contained disallowed symbols");
        }
        SequenceCorpus { text: self.text, sequences: self.sequences }
    }
}
