use rayon::prelude::*;

/// 构建后缀数组（基于倍增法，O(n log n) 排序）。
/// 输入为数值化的文本（0:$, 1..=26:A..Z）。
/// 允许文本中包含多个 0 作为不同蛋白序列的分隔符；较短的后缀（到达文本末尾）排在前面。
/// 调用方需保证 n 不超过 u32 可寻址范围（见 `IndexBuilder`）。
pub fn build_sa(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sa: Vec<u32> = (0..n as u32).collect();
    // rank 从 1 开始，0 表示越过文本末尾
    let mut rank: Vec<u32> = text.iter().map(|&b| b as u32 + 1).collect();
    let mut tmp: Vec<u32> = vec![0; n];

    let mut k = 1usize;
    loop {
        let key = |i: u32| -> u64 {
            let i = i as usize;
            let next = if i + k < n { rank[i + k] } else { 0 };
            ((rank[i] as u64) << 32) | next as u64
        };
        sa.par_sort_unstable_by_key(|&i| key(i));

        tmp[sa[0] as usize] = 1;
        for w in 1..n {
            let a = sa[w - 1];
            let b = sa[w];
            tmp[b as usize] = tmp[a as usize] + u32::from(key(a) != key(b));
        }

        // 复制回 rank
        rank.copy_from_slice(&tmp);
        if rank[sa[n - 1] as usize] as usize == n || k >= n {
            break;
        }
        k <<= 1;
    }

    sa
}
