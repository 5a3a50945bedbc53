//! 索引构建：蛋白序列拼接、后缀数组、BWT、Occ 采样表、稀疏 SA 与 FM 索引。

pub mod builder;
pub mod bwt;
pub mod corpus;
pub mod fm;
pub mod occ;
pub mod sa;
pub mod sampled_sa;

pub use builder::IndexBuilder;
pub use corpus::{SequenceCorpus, SequenceEntry};
pub use fm::{FmIndex, IndexMeta, Protein, SaRange};
