use serde::{Deserialize, Serialize};

use crate::util::residue::SENTINEL;

/// 稀疏后缀数组：按文本位置采样。
///
/// 保留 SA 值满足以下任一条件的行：
/// - 文本位置是 `rate` 的倍数；
/// - 文本位置是某条序列的起点（位置 0 或紧跟哨兵）。
///
/// 第二条保证沿 LF 映射回溯时永远不会跨越哨兵（多个哨兵的 LF 映射不可靠），
/// 并且任一行最多回溯 `rate - 1` 步即可到达采样行。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledSuffixArray {
    rate: u32,
    /// 行是否被采样的位向量
    marks: Vec<u64>,
    /// marks[..w] 中 1 的累计个数
    word_ranks: Vec<u32>,
    /// 按行顺序存储的采样值
    values: Vec<u32>,
}

impl SampledSuffixArray {
    pub fn build(text: &[u8], sa: &[u32], rate: u32) -> Self {
        let n = sa.len();
        let mut marks = vec![0u64; (n + 63) / 64];
        let mut values = Vec::with_capacity(n / rate as usize + 1);
        for (row, &p) in sa.iter().enumerate() {
            let pos = p as usize;
            let seq_start = pos == 0 || text[pos - 1] == SENTINEL;
            if p % rate == 0 || seq_start {
                marks[row / 64] |= 1u64 << (row % 64);
                values.push(p);
            }
        }
        let mut word_ranks = Vec::with_capacity(marks.len());
        let mut acc = 0u32;
        for w in &marks {
            word_ranks.push(acc);
            acc += w.count_ones();
        }
        Self { rate, marks, word_ranks, values }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// 若该行被采样，返回其文本位置
    #[inline]
    pub fn get(&self, row: usize) -> Option<u32> {
        let word = self.marks[row / 64];
        let bit = 1u64 << (row % 64);
        if word & bit == 0 {
            return None;
        }
        let idx = self.word_ranks[row / 64] + (word & (bit - 1)).count_ones();
        Some(self.values[idx as usize])
    }

    pub fn num_samples(&self) -> usize {
        self.values.len()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.marks.len() * 8 + self.word_ranks.len() * 4 + self.values.len() * 4
    }

    /// 检查位向量、累计秩与采样值的长度是否匹配 `n` 行
    pub(crate) fn check(&self, n: usize) -> std::result::Result<(), String> {
        if self.rate == 0 {
            return Err("sampling rate is zero".into());
        }
        if self.marks.len() != (n + 63) / 64 || self.word_ranks.len() != self.marks.len() {
            return Err(format!("sampled SA bitvector does not cover {} rows", n));
        }
        let ones: usize = self.marks.iter().map(|w| w.count_ones() as usize).sum();
        if ones != self.values.len() {
            return Err(format!("{} marked rows but {} sampled values", ones, self.values.len()));
        }
        let mut acc = 0u32;
        for (w, &r) in self.marks.iter().zip(&self.word_ranks) {
            if r != acc {
                return Err("sampled SA word ranks are inconsistent".into());
            }
            acc += w.count_ones();
        }
        if self.values.iter().any(|&p| p as usize >= n) {
            return Err("sampled SA value out of range".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::sa::build_sa;

    #[test]
    fn sampled_rows_return_sa_values() {
        // 两条序列：MKVLAA$ AAVLMK$
        let text = [13u8, 11, 22, 12, 1, 1, 0, 1, 1, 22, 12, 13, 11, 0];
        let sa = build_sa(&text);
        let ssa = SampledSuffixArray::build(&text, &sa, 4);
        for (row, &p) in sa.iter().enumerate() {
            match ssa.get(row) {
                Some(v) => assert_eq!(v, p),
                None => {
                    assert_ne!(p % 4, 0);
                    assert_ne!(text[p as usize - 1], SENTINEL);
                }
            }
        }
        // 第二条序列的起点（位置 7）必须被采样
        let row7 = sa.iter().position(|&p| p == 7).unwrap();
        assert_eq!(ssa.get(row7), Some(7));
    }

    #[test]
    fn rate_one_samples_everything() {
        let text = [2u8, 1, 2, 1, 0];
        let sa = build_sa(&text);
        let ssa = SampledSuffixArray::build(&text, &sa, 1);
        assert_eq!(ssa.num_samples(), text.len());
    }
}
