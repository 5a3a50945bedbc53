/// 根据后缀数组构建 BWT：bwt[i] = text[sa[i] - 1]，sa[i] == 0 时回绕到文本末尾（哨兵）。
/// text 为数值化字母表（0..SIGMA），以哨兵结尾。
pub fn build_bwt(text: &[u8], sa: &[u32]) -> Vec<u8> {
    let n = text.len();
    debug_assert_eq!(n, sa.len());
    sa.iter()
        .map(|&p| match p as usize {
            0 => text[n - 1],
            i => text[i - 1],
        })
        .collect()
}

/// 各字母在 BWT 中的出现次数，用于 C 表。
pub fn symbol_counts(bwt: &[u8], sigma: usize) -> Vec<u32> {
    let mut freq = vec![0u32; sigma];
    for &ch in bwt {
        freq[ch as usize] += 1;
    }
    freq
}
