use tracing::trace;

use super::policy::EquivalencePolicy;
use crate::error::{MapperError, Result};
use crate::index::fm::{FmIndex, SaRange};
use crate::util::cancel::CancellationToken;
use crate::util::residue::SIGMA;

/// One successful path through the backward search.
///
/// Every row in `range` has `residues` (corpus codes, left to right) as the
/// prefix of its suffix. `substitution_positions` are query indices where the
/// chosen corpus residue is not equivalent to the query residue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitRange {
    pub range: SaRange,
    pub substitutions: u32,
    pub residues: Vec<u8>,
    pub substitution_positions: Vec<usize>,
}

/// Explicit DFS frame: the range reached after placing `residue` at query
/// position `remaining` (positions `remaining..` are matched).
#[derive(Debug, Clone, Copy)]
struct Frame {
    range: SaRange,
    remaining: usize,
    budget: u32,
    substitutions: u32,
    residue: u8,
    substituted: bool,
}

/// Bounded-substitution backward search over an [`FmIndex`].
///
/// Holds only shared references; all per-search state lives in `search`, so
/// one engine may serve any number of threads.
#[derive(Debug, Clone, Copy)]
pub struct ApproximateSearchEngine<'a> {
    index: &'a FmIndex,
    policy: &'a EquivalencePolicy,
    /// Codes that occur in the corpus; other codes can never extend a range.
    present: u32,
}

impl<'a> ApproximateSearchEngine<'a> {
    pub fn new(index: &'a FmIndex, policy: &'a EquivalencePolicy) -> Self {
        let mut present = 0u32;
        let sigma = (index.sigma() as usize).min(SIGMA);
        // code 0 is the sentinel and is never branched on
        for c in 1..sigma as u8 {
            if !index.narrow(index.full_range(), c).is_empty() {
                present |= 1 << c;
            }
        }
        Self { index, policy, present }
    }

    pub fn index(&self) -> &'a FmIndex {
        self.index
    }

    pub fn policy(&self) -> &'a EquivalencePolicy {
        self.policy
    }

    /// All hit ranges for `query` (residue codes) within `max_substitutions`.
    ///
    /// The query is consumed right to left. At each position every corpus
    /// residue is tried: equivalent residues are free, any other residue costs
    /// one unit of budget. Branches whose range becomes empty are dropped.
    /// An empty query yields the full range.
    pub fn search(
        &self,
        query: &[u8],
        max_substitutions: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<HitRange>> {
        let m = query.len();
        debug_assert!(query.iter().all(|&q| q != 0 && (q as usize) < SIGMA));

        let mut hits = Vec::new();
        let mut path = vec![0u8; m];
        let mut substituted = vec![false; m];
        let mut stack = vec![Frame {
            range: self.index.full_range(),
            remaining: m,
            budget: max_substitutions,
            substitutions: 0,
            residue: 0,
            substituted: false,
        }];
        let mut explored = 0usize;

        while let Some(f) = stack.pop() {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(MapperError::SearchCancelled);
            }
            explored += 1;
            if f.remaining < m {
                // deeper entries of `path` still hold this frame's ancestors
                path[f.remaining] = f.residue;
                substituted[f.remaining] = f.substituted;
            }
            if f.remaining == 0 {
                hits.push(HitRange {
                    range: f.range,
                    substitutions: f.substitutions,
                    residues: path.clone(),
                    substitution_positions: (0..m).filter(|&i| substituted[i]).collect(),
                });
                continue;
            }

            let j = f.remaining - 1;
            let free = self.policy.compatible(query[j]) & self.present;
            let candidates = if f.budget > 0 { self.present } else { free };
            // push in descending code order so children pop in ascending order
            for c in (1..SIGMA as u8).rev() {
                if (candidates >> c) & 1 == 0 {
                    continue;
                }
                let range = self.index.narrow(f.range, c);
                if range.is_empty() {
                    continue;
                }
                let is_free = (free >> c) & 1 == 1;
                stack.push(Frame {
                    range,
                    remaining: j,
                    budget: if is_free { f.budget } else { f.budget - 1 },
                    substitutions: if is_free { f.substitutions } else { f.substitutions + 1 },
                    residue: c,
                    substituted: !is_free,
                });
            }
        }

        trace!(query_len = m, explored, hits = hits.len(), "backward search finished");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorpusConfig, IndexConfig};
    use crate::index::{IndexBuilder, SequenceCorpus};
    use crate::util::residue::{decode, encode_query};

    fn index(records: &[(&str, &str)]) -> FmIndex {
        let corpus = SequenceCorpus::from_records(records.iter().copied(), CorpusConfig::default()).unwrap();
        IndexBuilder::new(IndexConfig { sa_sample_rate: 4, occ_interval: 8, ..IndexConfig::default() })
            .build(&corpus)
            .unwrap()
    }

    fn run(fm: &FmIndex, policy: &EquivalencePolicy, q: &str, k: u32) -> Vec<HitRange> {
        let engine = ApproximateSearchEngine::new(fm, policy);
        engine.search(&encode_query(q.as_bytes()).unwrap(), k, None).unwrap()
    }

    #[test]
    fn exact_search_has_no_branching() {
        let fm = index(&[("P1", "MKVLAA"), ("P2", "AAVLMK")]);
        let hits = run(&fm, &EquivalencePolicy::exact(), "MKV", 0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].substitutions, 0);
        assert_eq!(hits[0].range.len(), 1);
        assert_eq!(decode(&hits[0].residues), "MKV");
    }

    #[test]
    fn one_substitution_is_reported_with_position() {
        let fm = index(&[("P1", "MKVLAA"), ("P2", "AAVLMK")]);
        let hits = run(&fm, &EquivalencePolicy::exact(), "MKA", 1);
        let mkv = hits.iter().find(|h| decode(&h.residues) == "MKV").unwrap();
        assert_eq!(mkv.substitutions, 1);
        assert_eq!(mkv.substitution_positions, vec![2]);
        assert!(hits.iter().all(|h| h.substitutions <= 1));
    }

    #[test]
    fn empty_query_returns_full_range() {
        let fm = index(&[("P1", "MKV")]);
        let hits = run(&fm, &EquivalencePolicy::exact(), "", 2);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].range, fm.full_range());
    }

    #[test]
    fn long_query_yields_nothing() {
        let fm = index(&[("P1", "MKV"), ("P2", "AAV")]);
        assert!(run(&fm, &EquivalencePolicy::exact(), "MKVAAV", 2).is_empty());
    }

    #[test]
    fn matches_never_cross_sentinels() {
        let fm = index(&[("P1", "MK"), ("P2", "VL")]);
        // "KV" would only exist across the boundary
        assert!(run(&fm, &EquivalencePolicy::exact(), "KV", 0).is_empty());
    }

    #[test]
    fn ambiguity_in_query_and_corpus() {
        let fm = index(&[("P1", "MKBLAA"), ("P2", "PEPTIDE")]);
        let p = EquivalencePolicy::amino_acid();
        // corpus B stands for D or N
        let hits = run(&fm, &p, "KDL", 0);
        assert_eq!(hits.len(), 1);
        assert_eq!(decode(&hits[0].residues), "KBL");
        // query J stands for I or L
        let hits = run(&fm, &p, "PTJD", 0);
        assert_eq!(hits.len(), 1);
        assert_eq!(decode(&hits[0].residues), "PTID");
        // query X matches anything
        let hits = run(&fm, &p, "PXP", 0);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn cancellation_is_observed() {
        let fm = index(&[("P1", "MKVLAA")]);
        let policy = EquivalencePolicy::exact();
        let engine = ApproximateSearchEngine::new(&fm, &policy);
        let token = CancellationToken::new();
        token.cancel();
        let res = engine.search(&encode_query(b"MKV").unwrap(), 1, Some(&token));
        assert!(matches!(res, Err(MapperError::SearchCancelled)));
    }

    #[test]
    fn cancellation_from_another_thread_stops_a_running_search() {
        use std::sync::Barrier;
        use std::thread;
        use std::time::Duration;

        let residues = b"ACDEFGHIKLMNPQRSTVWY";
        let mut x: u32 = 7;
        let proteins: Vec<(String, String)> = (0..30)
            .map(|i| {
                let seq: String = (0..1_000)
                    .map(|_| {
                        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                        residues[(x >> 16) as usize % residues.len()] as char
                    })
                    .collect();
                (format!("P{}", i), seq)
            })
            .collect();
        let records: Vec<(&str, &str)> = proteins.iter().map(|(id, s)| (id.as_str(), s.as_str())).collect();
        let fm = index(&records);
        let policy = EquivalencePolicy::exact();
        let engine = ApproximateSearchEngine::new(&fm, &policy);
        let query = encode_query(&proteins[3].1.as_bytes()[100..160]).unwrap();

        let token = CancellationToken::new();
        let started = Barrier::new(2);
        let res = thread::scope(|s| {
            s.spawn(|| {
                started.wait();
                thread::sleep(Duration::from_millis(5));
                token.cancel();
            });
            started.wait();
            engine.search(&query, 10, Some(&token))
        });
        assert!(matches!(res, Err(MapperError::SearchCancelled)));
        assert!(token.is_cancelled());
    }
}
