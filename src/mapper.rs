use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::{MapperError, Result};
use crate::index::fm::FmIndex;
use crate::search::{
    ApproximateSearchEngine, CacheStats, EquivalencePolicy, Match, MatchResolver, PostFilter, QueryCache,
};
use crate::util::cancel::CancellationToken;
use crate::util::residue;

/// Maps peptide queries against a shared, immutable [`FmIndex`].
///
/// `search` validates the query, runs the bounded-substitution backward
/// search, resolves the hits and memoizes the result per (query, budget).
pub struct PeptideMapper {
    index: Arc<FmIndex>,
    policy: EquivalencePolicy,
    resolver: MatchResolver,
    config: SearchConfig,
    cache: Option<QueryCache>,
}

impl PeptideMapper {
    pub fn new(index: Arc<FmIndex>, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            policy: EquivalencePolicy::for_matching(config.matching),
            resolver: MatchResolver::new().with_max_x_fraction(config.max_x_fraction),
            cache: config.cache_capacity.map(QueryCache::new),
            index,
            config,
        })
    }

    /// Replace the equivalence policy chosen from `config.matching`.
    pub fn with_policy(mut self, policy: EquivalencePolicy) -> Self {
        self.policy = policy;
        self.reset_cache();
        self
    }

    pub fn with_filter(mut self, filter: impl PostFilter + 'static) -> Self {
        self.resolver = self.resolver.with_filter(filter);
        self.reset_cache();
        self
    }

    fn reset_cache(&mut self) {
        if let Some(c) = &self.cache {
            c.clear();
        }
    }

    pub fn index(&self) -> &Arc<FmIndex> {
        &self.index
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn policy(&self) -> &EquivalencePolicy {
        &self.policy
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(QueryCache::stats)
    }

    /// All matches of `query` with at most `max_substitutions` substitutions,
    /// ordered by (sequence, offset).
    pub fn search(&self, query: &str, max_substitutions: u32) -> Result<Arc<Vec<Match>>> {
        self.search_inner(query, max_substitutions, None)
    }

    /// As [`search`](Self::search), aborting with `SearchCancelled` once
    /// `cancel` is set.
    pub fn search_with_cancel(
        &self,
        query: &str,
        max_substitutions: u32,
        cancel: &CancellationToken,
    ) -> Result<Arc<Vec<Match>>> {
        self.search_inner(query, max_substitutions, Some(cancel))
    }

    /// Runs the search without consulting or filling the cache.
    pub fn search_uncached(
        &self,
        query: &str,
        max_substitutions: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Match>> {
        let codes = self.prepare(query, max_substitutions)?;
        self.compute(&codes, max_substitutions, cancel)
    }

    /// Search many queries in parallel on the current rayon pool. Results are
    /// in input order; one failing query does not affect the others.
    pub fn search_batch<Q>(&self, queries: &[Q], max_substitutions: u32) -> Vec<Result<Arc<Vec<Match>>>>
    where
        Q: AsRef<str> + Sync,
    {
        queries.par_iter().map(|q| self.search(q.as_ref(), max_substitutions)).collect()
    }

    fn search_inner(
        &self,
        query: &str,
        max_substitutions: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<Arc<Vec<Match>>> {
        // validation happens before the cache so invalid queries never occupy a slot
        let codes = self.prepare(query, max_substitutions)?;
        match &self.cache {
            Some(cache) => cache.get_or_compute(query, max_substitutions, || {
                self.compute(&codes, max_substitutions, cancel)
            }),
            None => self.compute(&codes, max_substitutions, cancel).map(Arc::new),
        }
    }

    fn compute(&self, codes: &[u8], max_substitutions: u32, cancel: Option<&CancellationToken>) -> Result<Vec<Match>> {
        let engine = ApproximateSearchEngine::new(&self.index, &self.policy);
        let hits = engine.search(codes, max_substitutions, cancel)?;
        let matches = self.resolver.resolve(&self.index, codes, &hits);
        debug!(
            query = %residue::decode(codes),
            k = max_substitutions,
            ranges = hits.len(),
            matches = matches.len(),
            "query mapped"
        );
        Ok(matches)
    }

    fn prepare(&self, query: &str, max_substitutions: u32) -> Result<Vec<u8>> {
        if query.is_empty() {
            return Err(MapperError::InvalidQuery("empty query".into()));
        }
        if query.len() > self.config.max_query_len {
            return Err(MapperError::InvalidQuery(format!(
                "query length {} exceeds maximum {}",
                query.len(),
                self.config.max_query_len
            )));
        }
        if max_substitutions > self.config.max_substitutions {
            return Err(MapperError::InvalidQuery(format!(
                "substitution budget {} exceeds maximum {}",
                max_substitutions, self.config.max_substitutions
            )));
        }
        residue::encode_query(query.as_bytes()).map_err(|(pos, b)| {
            MapperError::InvalidQuery(format!("symbol {:?} at position {} is not a residue", b as char, pos))
        })
    }
}

impl std::fmt::Debug for PeptideMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeptideMapper")
            .field("proteins", &self.index.proteins().len())
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorpusConfig, IndexConfig, MatchingType};
    use crate::index::{IndexBuilder, SequenceCorpus};

    fn mapper(config: SearchConfig) -> PeptideMapper {
        let corpus =
            SequenceCorpus::from_records([("P1", "MKVLAA"), ("P2", "AAVLMK")], CorpusConfig::default()).unwrap();
        let fm = IndexBuilder::new(IndexConfig::default()).build(&corpus).unwrap();
        PeptideMapper::new(Arc::new(fm), config).unwrap()
    }

    fn string_config() -> SearchConfig {
        SearchConfig { matching: MatchingType::String, ..SearchConfig::default() }
    }

    #[test]
    fn rejects_bad_queries() {
        let m = mapper(string_config());
        assert!(matches!(m.search("MK1", 0), Err(MapperError::InvalidQuery(_))));
        assert!(matches!(m.search("", 0), Err(MapperError::InvalidQuery(_))));
        assert!(matches!(m.search("MKV", 99), Err(MapperError::InvalidQuery(_))));
        let long = "A".repeat(2_000);
        assert!(matches!(m.search(&long, 0), Err(MapperError::InvalidQuery(_))));
        // nothing was cached for invalid queries
        assert_eq!(m.cache_stats().unwrap().entries, 0);
    }

    #[test]
    fn lowercase_queries_are_accepted() {
        let m = mapper(string_config());
        let r = m.search("mkv", 0).unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].matched, "MKV");
    }

    #[test]
    fn cached_and_uncached_agree() {
        let m = mapper(string_config());
        let cached = m.search("VLA", 1).unwrap();
        let again = m.search("VLA", 1).unwrap();
        let plain = m.search_uncached("VLA", 1, None).unwrap();
        assert_eq!(*cached, plain);
        assert!(Arc::ptr_eq(&cached, &again));
        assert_eq!(m.cache_stats().unwrap().computations, 1);
    }

    #[test]
    fn without_cache() {
        let m = mapper(SearchConfig { cache_capacity: None, ..string_config() });
        assert!(m.cache_stats().is_none());
        assert_eq!(m.search("LMK", 0).unwrap().len(), 1);
    }

    #[test]
    fn cancelled_search_is_not_cached() {
        let m = mapper(string_config());
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(m.search_with_cancel("MKV", 1, &token), Err(MapperError::SearchCancelled)));
        assert_eq!(m.search("MKV", 1).unwrap().iter().filter(|x| x.substitutions == 0).count(), 1);
    }

    #[test]
    fn batch_preserves_order() {
        let m = mapper(string_config());
        let res = m.search_batch(&["MKV", "W", "LMK", "?"], 0);
        assert_eq!(res.len(), 4);
        assert_eq!(res[0].as_ref().unwrap()[0].sequence_id, "P1");
        assert!(res[1].as_ref().unwrap().is_empty());
        assert_eq!(res[2].as_ref().unwrap()[0].sequence_id, "P2");
        assert!(res[3].is_err());
    }

    #[test]
    fn custom_filter_applies() {
        let m = mapper(string_config()).with_filter(|ctx: &crate::search::MatchContext<'_>| ctx.offset > 0);
        assert!(m.search("MKV", 0).unwrap().is_empty());
        assert_eq!(m.search("VLM", 0).unwrap().len(), 1);
    }
}
