//! Approximate search: equivalence policy, bounded-substitution backward
//! search, match resolution and the per-query cache.

pub mod cache;
pub mod engine;
pub mod policy;
pub mod resolver;

pub use cache::{CacheStats, QueryCache};
pub use engine::{ApproximateSearchEngine, HitRange};
pub use policy::EquivalencePolicy;
pub use resolver::{CleavageFilter, Match, MatchContext, MatchResolver, PostFilter};
