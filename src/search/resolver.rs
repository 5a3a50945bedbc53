use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::engine::HitRange;
use crate::index::fm::FmIndex;
use crate::util::residue::{self, UNKNOWN};

/// A resolved occurrence of a query in one reference sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Match {
    pub sequence_index: usize,
    pub offset: u32,
    pub sequence_id: String,
    pub substitutions: u32,
    /// Zero-based query positions that needed a substitution.
    pub substitution_positions: Vec<usize>,
    /// The reference residues at the matched location.
    pub matched: String,
}

/// What a post-filter sees about a candidate match.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub sequence_index: usize,
    pub sequence_id: &'a str,
    pub offset: u32,
    pub len: usize,
    /// Residue codes of the whole reference sequence.
    pub sequence: &'a [u8],
}

impl MatchContext<'_> {
    pub fn residue_before(&self) -> Option<u8> {
        (self.offset as usize).checked_sub(1).map(|i| residue::from_code(self.sequence[i]))
    }

    pub fn residue_after(&self) -> Option<u8> {
        self.sequence.get(self.offset as usize + self.len).map(|&c| residue::from_code(c))
    }

    pub fn first_residue(&self) -> Option<u8> {
        self.sequence.get(self.offset as usize).map(|&c| residue::from_code(c))
    }

    pub fn last_residue(&self) -> Option<u8> {
        let end = (self.offset as usize + self.len).checked_sub(1)?;
        self.sequence.get(end).map(|&c| residue::from_code(c))
    }
}

/// A pure predicate deciding whether a match is kept.
pub trait PostFilter: Send + Sync {
    fn accept(&self, ctx: &MatchContext<'_>) -> bool;
}

impl<F> PostFilter for F
where
    F: Fn(&MatchContext<'_>) -> bool + Send + Sync,
{
    fn accept(&self, ctx: &MatchContext<'_>) -> bool {
        self(ctx)
    }
}

/// Enzymatic boundary check: the match must start at a cleavage site.
#[derive(Debug, Clone)]
pub struct CleavageFilter {
    cleave_after: Vec<u8>,
    blocked_by: Vec<u8>,
    check_c_term: bool,
}

impl CleavageFilter {
    pub fn new(cleave_after: &[u8], blocked_by: &[u8]) -> Self {
        Self {
            cleave_after: cleave_after.to_ascii_uppercase(),
            blocked_by: blocked_by.to_ascii_uppercase(),
            check_c_term: false,
        }
    }

    /// Cleaves after K or R unless followed by P.
    pub fn trypsin() -> Self {
        Self::new(b"KR", b"P")
    }

    /// Also require the match to end at a cleavage site or the sequence end.
    pub fn with_c_term(mut self) -> Self {
        self.check_c_term = true;
        self
    }

    fn is_site(&self, before: u8, after: Option<u8>) -> bool {
        self.cleave_after.contains(&before) && after.map_or(true, |a| !self.blocked_by.contains(&a))
    }
}

impl PostFilter for CleavageFilter {
    fn accept(&self, ctx: &MatchContext<'_>) -> bool {
        let n_term = match ctx.residue_before() {
            None => true,
            // initiator methionine removal
            Some(b'M') if ctx.offset == 1 => true,
            Some(b) => self.is_site(b, ctx.first_residue()),
        };
        if !n_term {
            return false;
        }
        if !self.check_c_term {
            return true;
        }
        match (ctx.last_residue(), ctx.residue_after()) {
            (_, None) => true,
            (Some(last), after) => self.is_site(last, after),
            (None, Some(_)) => false,
        }
    }
}

/// Turns hit ranges into deduplicated, filtered [`Match`]es.
#[derive(Clone, Default)]
pub struct MatchResolver {
    filters: Vec<Arc<dyn PostFilter>>,
    max_x_fraction: Option<f64>,
}

impl fmt::Debug for MatchResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchResolver")
            .field("filters", &self.filters.len())
            .field("max_x_fraction", &self.max_x_fraction)
            .finish()
    }
}

impl MatchResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl PostFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn with_max_x_fraction(mut self, limit: Option<f64>) -> Self {
        self.max_x_fraction = limit;
        self
    }

    /// Expand, locate, deduplicate and filter. One match per
    /// (sequence, offset), keeping the smallest substitution count.
    pub fn resolve(&self, index: &FmIndex, query: &[u8], hits: &[HitRange]) -> Vec<Match> {
        let mut best: BTreeMap<(usize, u32), &HitRange> = BTreeMap::new();
        for hit in hits {
            if self.too_many_x(query, &hit.residues) {
                continue;
            }
            for row in hit.range.lo..hit.range.hi {
                // rows on a sentinel only arise from the empty query
                let Some(key) = index.resolve(row) else {
                    continue;
                };
                match best.entry(key) {
                    Entry::Vacant(e) => {
                        e.insert(hit);
                    }
                    Entry::Occupied(mut e) => {
                        if hit.substitutions < e.get().substitutions {
                            e.insert(hit);
                        }
                    }
                }
            }
        }

        best.into_iter()
            .filter(|&((si, offset), hit)| {
                let ctx = MatchContext {
                    sequence_index: si,
                    sequence_id: &index.proteins()[si].name,
                    offset,
                    len: hit.residues.len(),
                    sequence: index.sequence(si),
                };
                self.filters.iter().all(|f| f.accept(&ctx))
            })
            .map(|((si, offset), hit)| Match {
                sequence_index: si,
                offset,
                sequence_id: index.proteins()[si].name.clone(),
                substitutions: hit.substitutions,
                substitution_positions: hit.substitution_positions.clone(),
                matched: residue::decode(&hit.residues),
            })
            .collect()
    }

    fn too_many_x(&self, query: &[u8], residues: &[u8]) -> bool {
        let Some(limit) = self.max_x_fraction else {
            return false;
        };
        if query.is_empty() {
            return false;
        }
        let xs = query
            .iter()
            .zip(residues)
            .filter(|&(&q, &r)| q == UNKNOWN || r == UNKNOWN)
            .count();
        xs as f64 / query.len() as f64 > limit
    }
}
