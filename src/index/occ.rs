use serde::{Deserialize, Serialize};

/// Occ 采样表（定长分块，块内顺扫补偿）。
///
/// `samples[b * sigma + c]` = BWT[0 .. b*interval) 中字母 c 的出现次数。
/// 共保存 `num_blocks + 1` 个检查点，最后一个检查点即全文计数，
/// 因此查询时可以从较近的一侧检查点开始扫描，最多扫描 interval/2 个字母。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccTable {
    sigma: u32,
    interval: u32,
    samples: Vec<u32>,
}

impl OccTable {
    pub fn build(bwt: &[u8], sigma: usize, interval: usize) -> Self {
        let n = bwt.len();
        let num_blocks = (n + interval - 1) / interval;
        let mut samples = Vec::with_capacity((num_blocks + 1) * sigma);
        let mut running = vec![0u32; sigma];
        for bi in 0..=num_blocks {
            // 记录到块起始位置的累计
            samples.extend_from_slice(&running);
            let start = (bi * interval).min(n);
            let end = ((bi + 1) * interval).min(n);
            for &ch in &bwt[start..end] {
                running[ch as usize] += 1;
            }
        }
        Self { sigma: sigma as u32, interval: interval as u32, samples }
    }

    pub fn interval(&self) -> usize {
        self.interval as usize
    }

    /// 返回 BWT[0..pos) 中 c 的出现次数
    #[inline]
    pub fn rank(&self, bwt: &[u8], c: u8, pos: usize) -> u32 {
        let interval = self.interval as usize;
        let sigma = self.sigma as usize;
        let bi = pos / interval;
        let start = bi * interval;
        let next = start + interval;
        if pos - start <= interval / 2 || next > bwt.len() {
            let base = self.samples[bi * sigma + c as usize];
            base + count(&bwt[start..pos], c)
        } else {
            let base = self.samples[(bi + 1) * sigma + c as usize];
            base - count(&bwt[pos..next], c)
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<u32>()
    }

    /// 检查反序列化得到的采样表与 BWT 长度、字母表大小是否一致
    pub(crate) fn check(&self, bwt_len: usize, sigma: usize) -> std::result::Result<(), String> {
        if self.sigma as usize != sigma {
            return Err(format!("occ table sigma {} != index sigma {}", self.sigma, sigma));
        }
        if self.interval == 0 {
            return Err("occ interval is zero".into());
        }
        let interval = self.interval as usize;
        let expected = ((bwt_len + interval - 1) / interval + 1) * sigma;
        if self.samples.len() != expected {
            return Err(format!("occ table has {} samples, expected {}", self.samples.len(), expected));
        }
        Ok(())
    }
}

#[inline]
fn count(slice: &[u8], c: u8) -> u32 {
    slice.iter().filter(|&&ch| ch == c).count() as u32
}
