use std::ops::Deref;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::error::Result;
use crate::index::{FmIndex, IndexBuilder, SequenceCorpus};
use crate::mapper::PeptideMapper;

type MapperFactory = dyn Fn(Arc<FmIndex>) -> Result<PeptideMapper> + Send + Sync;

/// A published index version together with its mapper and cache.
#[derive(Debug)]
pub struct Snapshot {
    version: u64,
    mapper: PeptideMapper,
}

impl Snapshot {
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl Deref for Snapshot {
    type Target = PeptideMapper;

    fn deref(&self) -> &PeptideMapper {
        &self.mapper
    }
}

/// Shared entry point that survives index rebuilds.
///
/// Searches take a [`Snapshot`] and keep using it until they finish, so a
/// rebuild never tears an in-flight search. A rebuild constructs the new
/// index and a fresh cache completely before publishing them; a failed
/// rebuild leaves the current snapshot in place.
pub struct IndexHandle {
    builder: IndexBuilder,
    factory: Box<MapperFactory>,
    current: RwLock<Arc<Snapshot>>,
    rebuild: Mutex<()>,
}

impl IndexHandle {
    pub fn new<F>(builder: IndexBuilder, corpus: &SequenceCorpus, factory: F) -> Result<Self>
    where
        F: Fn(Arc<FmIndex>) -> Result<PeptideMapper> + Send + Sync + 'static,
    {
        let index = Arc::new(builder.build(corpus)?);
        let mapper = factory(index)?;
        Ok(Self {
            builder,
            factory: Box::new(factory),
            current: RwLock::new(Arc::new(Snapshot { version: 1, mapper })),
            rebuild: Mutex::new(()),
        })
    }

    /// Pin the current index version.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Build an index for `corpus` and publish it. Returns the new version.
    pub fn rebuild(&self, corpus: &SequenceCorpus) -> Result<u64> {
        let _serial = self.rebuild.lock();
        let index = Arc::new(self.builder.build(corpus)?);
        let mapper = (self.factory)(index)?;
        let version = self.version() + 1;
        *self.current.write() = Arc::new(Snapshot { version, mapper });
        info!(version, "published rebuilt index");
        Ok(version)
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle").field("version", &self.version()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorpusConfig, MatchingType, SearchConfig};
    use crate::error::MapperError;

    fn corpus(records: &[(&str, &str)]) -> SequenceCorpus {
        SequenceCorpus::from_records(records.iter().copied(), CorpusConfig::default()).unwrap()
    }

    fn handle() -> IndexHandle {
        IndexHandle::new(IndexBuilder::default(), &corpus(&[("P1", "MKVLAA")]), |fm| {
            PeptideMapper::new(fm, SearchConfig { matching: MatchingType::String, ..SearchConfig::default() })
        })
        .unwrap()
    }

    #[test]
    fn snapshot_pins_version_across_rebuild() {
        let h = handle();
        let old = h.snapshot();
        assert_eq!(old.version(), 1);
        assert_eq!(old.search("MKV", 0).unwrap().len(), 1);

        let v = h.rebuild(&corpus(&[("Q1", "PEPTIDE")])).unwrap();
        assert_eq!(v, 2);
        // pinned snapshot still answers from the old index
        assert_eq!(old.search("MKV", 0).unwrap().len(), 1);
        let new = h.snapshot();
        assert_eq!(new.version(), 2);
        assert!(new.search("MKV", 0).unwrap().is_empty());
        assert_eq!(new.search("TIDE", 0).unwrap()[0].sequence_id, "Q1");
        // the new version started with an empty cache
        assert_eq!(new.cache_stats().unwrap().computations, 2);
    }

    #[test]
    fn failed_rebuild_keeps_current_index() {
        let h = IndexHandle::new(IndexBuilder::default(), &corpus(&[("P1", "MKV")]), |fm| {
            if fm.proteins().len() > 1 {
                Err(MapperError::InvalidConfig("single protein only".into()))
            } else {
                PeptideMapper::new(fm, SearchConfig::default())
            }
        })
        .unwrap();
        assert!(h.rebuild(&corpus(&[("A", "MK"), ("B", "VL")])).is_err());
        assert_eq!(h.version(), 1);
        assert_eq!(h.snapshot().search("MKV", 0).unwrap().len(), 1);
    }
}
