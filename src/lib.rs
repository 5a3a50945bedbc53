//! # pepmap
//!
//! 基于 FM 索引的肽段 → 蛋白质映射库。
//!
//! 本 crate 提供：
//!
//! - **序列拼接**：将蛋白序列规范化、编码并以哨兵分隔拼接（[`index::corpus`]）
//! - **索引构建**：后缀数组 + BWT + Occ 采样 + 稀疏 SA（[`index`]）
//! - **近似搜索**：允许有限次替换、支持歧义残基（B/J/Z/X）与 I/L 等价的反向搜索（[`search`]）
//! - **结果解析**：命中区间 → (蛋白, 偏移)，去重与后置过滤（[`search::resolver`]）
//! - **查询缓存**：按 (肽段, 替换预算) 的 LRU 缓存，并发下每个键只计算一次（[`search::cache`]）
//!
//! ## 快速示例
//!
//! ```rust
//! use std::sync::Arc;
//! use pepmap::config::{CorpusConfig, IndexConfig, SearchConfig};
//! use pepmap::index::{IndexBuilder, SequenceCorpus};
//! use pepmap::PeptideMapper;
//!
//! let corpus = SequenceCorpus::from_records(
//!     [("P1", "MKVLAA"), ("P2", "AAVLMK")],
//!     CorpusConfig::default(),
//! ).unwrap();
//! let fm = IndexBuilder::new(IndexConfig::default()).build(&corpus).unwrap();
//! let mapper = PeptideMapper::new(Arc::new(fm), SearchConfig::default()).unwrap();
//!
//! let matches = mapper.search("MKA", 1).unwrap();
//! assert!(matches.iter().any(|m| m.sequence_id == "P1" && m.offset == 0 && m.substitutions == 1));
//! ```
//!
//! ## 模块说明
//!
//! - [`io`] — 蛋白 FASTA 与肽段列表读取
//! - [`index`] — FM 索引构建与查询原语（`narrow` / `locate` / `resolve`）
//! - [`search`] — 等价策略、近似搜索、结果解析、查询缓存
//! - [`mapper`] — 查询入口 [`PeptideMapper`]
//! - [`service`] — 支持重建的版本化索引句柄
//! - [`util`] — 残基编码、取消令牌

pub mod config;
pub mod error;
pub mod index;
pub mod io;
pub mod mapper;
pub mod search;
pub mod service;
pub mod util;

pub use error::{MapperError, Result};
pub use index::{FmIndex, IndexBuilder, SequenceCorpus};
pub use mapper::PeptideMapper;
pub use search::Match;
pub use service::IndexHandle;
pub use util::cancel::CancellationToken;
