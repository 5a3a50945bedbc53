use crate::config::MatchingType;
use crate::error::{MapperError, Result};
use crate::util::residue::{self, SIGMA};

/// Substitution-equivalence policy as a lookup table.
///
/// Every symbol has a class, the set of symbols it may stand for. A query
/// residue and a corpus residue are equivalent when their classes intersect,
/// which makes the relation symmetric for query-side and corpus-side
/// ambiguity alike. The pairwise relation is precomputed into one bitmask per
/// symbol so the search hot path is a shift and a mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalencePolicy {
    classes: [u32; SIGMA],
    compat: [u32; SIGMA],
}

impl EquivalencePolicy {
    /// Every symbol matches only itself, ambiguity codes included.
    pub fn exact() -> Self {
        let mut classes = [0u32; SIGMA];
        for (c, class) in classes.iter_mut().enumerate().skip(1) {
            *class = 1 << c;
        }
        Self::from_classes(classes)
    }

    /// Ambiguity codes (B, J, Z, X) match every residue they stand for.
    pub fn amino_acid() -> Self {
        let mut classes = [0u32; SIGMA];
        for (c, class) in classes.iter_mut().enumerate().skip(1) {
            *class = residue::expansion_mask(c as u8);
        }
        Self::from_classes(classes)
    }

    /// As [`amino_acid`](Self::amino_acid), with isoleucine and leucine
    /// treated as the same residue (they share a mass).
    pub fn indistinguishable() -> Self {
        Self::amino_acid().merged(b'I', b'L')
    }

    pub fn for_matching(matching: MatchingType) -> Self {
        match matching {
            MatchingType::String => Self::exact(),
            MatchingType::AminoAcid => Self::amino_acid(),
            MatchingType::Indistinguishable => Self::indistinguishable(),
        }
    }

    /// Make two symbols equivalent in both directions.
    pub fn with_equivalence(self, a: u8, b: u8) -> Result<Self> {
        code_of(a)?;
        code_of(b)?;
        Ok(self.merged(a, b))
    }

    /// Replace the class of `symbol` with `members`.
    pub fn with_class(mut self, symbol: u8, members: &[u8]) -> Result<Self> {
        let s = code_of(symbol)?;
        let mut mask = 0u32;
        for &m in members {
            mask |= 1 << code_of(m)?;
        }
        self.classes[s as usize] = mask;
        Ok(Self::from_classes(self.classes))
    }

    /// Whether query residue `q` matches corpus residue `c` at no cost.
    #[inline]
    pub fn is_equivalent(&self, q: u8, c: u8) -> bool {
        (self.compat[q as usize] >> c) & 1 == 1
    }

    /// Bitmask of the corpus codes `q` matches at no cost.
    #[inline]
    pub fn compatible(&self, q: u8) -> u32 {
        self.compat[q as usize]
    }

    fn merged(mut self, a: u8, b: u8) -> Self {
        let (Some(a), Some(b)) = (residue::to_code(a), residue::to_code(b)) else {
            return self;
        };
        let union = self.classes[a as usize] | self.classes[b as usize];
        self.classes[a as usize] = union;
        self.classes[b as usize] = union;
        Self::from_classes(self.classes)
    }

    fn from_classes(classes: [u32; SIGMA]) -> Self {
        let mut compat = [0u32; SIGMA];
        // the sentinel (code 0) keeps an empty class and never matches
        for q in 1..SIGMA {
            for c in 1..SIGMA {
                if classes[q] & classes[c] != 0 {
                    compat[q] |= 1 << c;
                }
            }
        }
        Self { classes, compat }
    }
}

impl Default for EquivalencePolicy {
    fn default() -> Self {
        Self::indistinguishable()
    }
}

fn code_of(symbol: u8) -> Result<u8> {
    residue::to_code(symbol).ok_or_else(|| {
        MapperError::InvalidConfig(format!("symbol {:?} is not in the residue alphabet", symbol as char))
    })
}
