use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::occ::OccTable;
use super::sampled_sa::SampledSuffixArray;
use crate::error::{MapperError, Result};
use crate::util::residue::{self, SENTINEL};

/// 蛋白序列元信息（名称、长度、在拼接文本中的起始偏移）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Protein {
    pub name: String,
    pub len: u32,
    pub offset: u32,
}

/// 索引构建信息，随索引一起序列化
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IndexMeta {
    pub reference_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// SA 行区间 [lo, hi)，即命中区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SaRange {
    pub lo: usize,
    pub hi: usize,
}

impl SaRange {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lo >= self.hi
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hi.saturating_sub(self.lo)
    }
}

/// 蛋白质 FM 索引：
/// - 字母以 [0..sigma) 编码（0 预留为 $，同时用作蛋白之间的分隔符）。
/// - Occ 采用定长分块采样（块内顺扫补偿），见 [`OccTable`]。
/// - SA 按文本位置稀疏采样，未采样的行通过 LF 映射回溯，见 [`SampledSuffixArray`]。
/// - 保留原始编码文本，供后置过滤器和侧翼残基查询使用。
///
/// 构建完成后不可变，可在多线程间共享只读访问。
#[derive(Debug, Serialize, Deserialize)]
pub struct FmIndex {
    sigma: u8,
    /// C[i] = 文本中字母 < i 的累计数量
    c: Vec<u32>,
    text: Vec<u8>,
    /// BWT 序列（与文本同长度）
    bwt: Vec<u8>,
    occ: OccTable,
    ssa: SampledSuffixArray,
    proteins: Vec<Protein>,
    meta: IndexMeta,
}

impl FmIndex {
    /// 由后缀数组和 BWT 组装索引。完整 SA 只在构建期间使用，之后仅保留采样。
    pub fn build(
        text: Vec<u8>,
        bwt: Vec<u8>,
        sa: &[u32],
        proteins: Vec<Protein>,
        sigma: u8,
        occ_interval: usize,
        sa_rate: u32,
    ) -> Self {
        let sigma_us = sigma as usize;
        // 计算 C 表
        let freq = super::bwt::symbol_counts(&bwt, sigma_us);
        let mut c = vec![0u32; sigma_us + 1];
        for i in 0..sigma_us {
            c[i + 1] = c[i] + freq[i];
        }
        let occ = OccTable::build(&bwt, sigma_us, occ_interval);
        let ssa = SampledSuffixArray::build(&text, sa, sa_rate);
        Self { sigma, c, text, bwt, occ, ssa, proteins, meta: IndexMeta::default() }
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn sigma(&self) -> u8 {
        self.sigma
    }

    /// 文本长度（含哨兵）
    pub fn len(&self) -> usize {
        self.bwt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    pub fn bwt(&self) -> &[u8] {
        &self.bwt
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn proteins(&self) -> &[Protein] {
        &self.proteins
    }

    /// 编码后的第 i 条蛋白序列
    pub fn sequence(&self, i: usize) -> &[u8] {
        let p = &self.proteins[i];
        &self.text[p.offset as usize..(p.offset + p.len) as usize]
    }

    #[inline]
    pub fn full_range(&self) -> SaRange {
        SaRange { lo: 0, hi: self.bwt.len() }
    }

    #[inline]
    pub fn occ(&self, c: u8, pos: usize) -> u32 {
        self.occ.rank(&self.bwt, c, pos)
    }

    /// 在区间 range 左侧扩展字母 c，返回新区间（可能为空）
    #[inline]
    pub fn narrow(&self, range: SaRange, c: u8) -> SaRange {
        let c0 = self.c[c as usize] as usize;
        let lo = c0 + self.occ(c, range.lo) as usize;
        let hi = c0 + self.occ(c, range.hi) as usize;
        SaRange { lo, hi }
    }

    /// 反向搜索精确匹配，pat 已经是编码后的字母表（不应包含 0）
    pub fn backward_search(&self, pat: &[u8]) -> Option<SaRange> {
        if self.bwt.is_empty() {
            return None;
        }
        let mut range = self.full_range();
        for &a in pat.iter().rev() {
            range = self.narrow(range, a);
            if range.is_empty() {
                return None;
            }
        }
        Some(range)
    }

    /// LF 映射：行 row 对应后缀向左移动一个位置后所在的行
    #[inline]
    fn lf(&self, row: usize) -> usize {
        let ch = self.bwt[row];
        self.c[ch as usize] as usize + self.occ(ch, row) as usize
    }

    /// 行 → 文本位置。未采样的行沿 LF 回溯至最近的采样行，步数不超过采样间隔。
    pub fn locate(&self, row: usize) -> u32 {
        let mut row = row;
        let mut steps = 0u32;
        loop {
            if let Some(p) = self.ssa.get(row) {
                return p + steps;
            }
            row = self.lf(row);
            steps += 1;
        }
    }

    /// 行 → (蛋白编号, 蛋白内偏移)。落在哨兵上时返回 None。
    pub fn resolve(&self, row: usize) -> Option<(usize, u32)> {
        self.map_text_pos(self.locate(row))
    }

    /// 将文本位置映射到 (protein_index, protein_offset)。若落在分隔符($)位置，则返回 None。
    pub fn map_text_pos(&self, pos: u32) -> Option<(usize, u32)> {
        if self.proteins.is_empty() {
            return None;
        }
        let mut lo = 0usize;
        let mut hi = self.proteins.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let p = &self.proteins[mid];
            if pos < p.offset {
                hi = mid;
            } else if pos >= p.offset + p.len {
                lo = mid + 1;
            } else {
                return Some((mid, pos - p.offset));
            }
        }
        None
    }

    /// 匹配区域两侧的残基（ASCII），到达蛋白边界时为 None
    pub fn flanking(&self, protein: usize, offset: u32, len: usize) -> (Option<u8>, Option<u8>) {
        let seq = self.sequence(protein);
        let start = offset as usize;
        let before = start.checked_sub(1).map(|i| residue::from_code(seq[i]));
        let after = seq.get(start + len).map(|&c| residue::from_code(c));
        (before, after)
    }

    /// 索引主要结构的内存占用（字节）
    pub fn size_in_bytes(&self) -> usize {
        self.text.len() + self.bwt.len() + self.occ.size_in_bytes() + self.ssa.size_in_bytes()
    }

    pub fn sa_sample_rate(&self) -> u32 {
        self.ssa.rate()
    }

    pub fn occ_interval(&self) -> usize {
        self.occ.interval()
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let f = std::fs::File::create(path)?;
        bincode::serialize_into(BufWriter::new(f), self)?;
        Ok(())
    }

    /// 读取索引并做一致性检查，损坏的文件返回 `CorruptIndex` 而不是在查询时 panic
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        let idx: Self = bincode::deserialize_from(BufReader::new(f))?;
        idx.validate()?;
        Ok(idx)
    }

    /// 校验各组成部分的长度与取值范围是否相互一致
    pub fn validate(&self) -> Result<()> {
        self.check_parts().map_err(MapperError::CorruptIndex)
    }

    fn check_parts(&self) -> std::result::Result<(), String> {
        let sigma = self.sigma as usize;
        let n = self.bwt.len();
        if sigma == 0 || sigma > residue::SIGMA {
            return Err(format!("alphabet size {} out of range", sigma));
        }
        if self.text.len() != n {
            return Err(format!("text length {} != BWT length {}", self.text.len(), n));
        }
        if self.c.len() != sigma + 1 || self.c[0] != 0 || self.c[sigma] as usize != n {
            return Err("C table does not match the BWT".into());
        }
        if self.c.windows(2).any(|w| w[0] > w[1]) {
            return Err("C table is not monotone".into());
        }
        if self.bwt.iter().chain(&self.text).any(|&ch| ch as usize >= sigma) {
            return Err("symbol outside the alphabet".into());
        }
        self.occ.check(n, sigma)?;
        self.ssa.check(n)?;
        let mut next = 0usize;
        for p in &self.proteins {
            let (start, end) = (p.offset as usize, p.offset as usize + p.len as usize);
            if start < next || end >= n || self.text[end] != SENTINEL {
                return Err(format!("protein '{}' has an invalid extent", p.name));
            }
            next = end + 1;
        }
        Ok(())
    }
}
