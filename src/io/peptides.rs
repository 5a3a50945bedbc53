use std::io::BufRead;

use crate::error::Result;

/// Reads one query per line: blank lines and `#` comments are skipped, and
/// only the first comma or tab separated column is used.
pub struct PeptideReader<R: BufRead> {
    reader: R,
    buf: String,
    line_no: usize,
}

impl<R: BufRead> PeptideReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), line_no: 0 }
    }

    /// Next query with its 1-based line number.
    pub fn next_peptide(&mut self) -> Result<Option<(usize, String)>> {
        loop {
            self.buf.clear();
            let n = self.reader.read_line(&mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.buf.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let first = line.split([',', '\t']).next().unwrap_or("").trim();
            if first.is_empty() {
                continue;
            }
            return Ok(Some((self.line_no, first.to_string())));
        }
    }

    pub fn read_all(mut self) -> Result<Vec<(usize, String)>> {
        let mut out = Vec::new();
        while let Some(p) = self.next_peptide()? {
            out.push(p);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn skips_comments_and_takes_first_column() {
        let data = b"# peptides\nMKV\n\nLMK,1,2\r\nPEP\tTIDE\n";
        let peps = PeptideReader::new(Cursor::new(&data[..])).read_all().unwrap();
        assert_eq!(
            peps,
            vec![(2, "MKV".to_string()), (4, "LMK".to_string()), (5, "PEP".to_string())]
        );
    }
}
