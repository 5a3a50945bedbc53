use std::io::BufRead;
use std::path::Path;

use tracing::info;

use crate::config::CorpusConfig;
use crate::error::{MapperError, Result};
use crate::index::corpus::SequenceCorpus;

#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

impl FastaRecord {
    /// UniProt style `db|ACCESSION|NAME` identifiers yield the accession,
    /// anything else the full identifier.
    pub fn accession(&self) -> &str {
        let mut parts = self.id.split('|');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(acc), Some(_)) if !acc.is_empty() => acc,
            _ => &self.id,
        }
    }
}

/// Streaming protein FASTA reader.
///
/// Accepts multi-line records, CRLF line endings and `;` comment lines. A
/// trailing `*` stop marker is dropped; any other symbol is passed through
/// for the corpus to accept, map or reject.
pub struct FastaReader<R: BufRead> {
    reader: R,
    line: String,
    pending: Option<String>,
    eof: bool,
}

enum Line<'a> {
    Header(&'a str),
    Residues(&'a str),
    Skip,
}

fn classify(line: &str) -> Line<'_> {
    let line = line.trim_matches(|c: char| c.is_whitespace() || c.is_control());
    match line.as_bytes().first() {
        None | Some(b';') => Line::Skip,
        Some(b'>') => Line::Header(&line[1..]),
        Some(_) => Line::Residues(line),
    }
}

/// Split a header into identifier and description. Control characters
/// (stray `\r`, tabs) never end up in the identifier.
fn split_header(header: &str) -> (String, Option<String>) {
    let header = header.trim();
    let (id, rest) = match header.find(|c: char| c.is_whitespace() || c.is_control()) {
        Some(i) => (&header[..i], Some(&header[i..])),
        None => (header, None),
    };
    let desc = rest
        .map(|d| d.split(|c: char| c.is_control()).collect::<Vec<_>>().join(" ").trim().to_string())
        .filter(|d| !d.is_empty());
    (id.to_string(), desc)
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: String::new(), pending: None, eof: false }
    }

    /// Reads the next line into the buffer; `false` at end of input.
    fn advance(&mut self) -> Result<bool> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            self.eof = true;
        }
        Ok(!self.eof)
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        let header = match self.pending.take() {
            Some(h) => h,
            None => loop {
                if self.eof || !self.advance()? {
                    return Ok(None);
                }
                // residue lines before the first header are ignored
                if let Line::Header(h) = classify(&self.line) {
                    break h.to_string();
                }
            },
        };
        let (id, desc) = split_header(&header);

        let mut seq = Vec::new();
        while !self.eof && self.advance()? {
            match classify(&self.line) {
                Line::Header(h) => {
                    self.pending = Some(h.to_string());
                    break;
                }
                Line::Residues(r) => {
                    seq.extend(r.bytes().filter(|b| !b.is_ascii_whitespace()).map(|b| b.to_ascii_uppercase()));
                }
                Line::Skip => {}
            }
        }
        if seq.last() == Some(&b'*') {
            seq.pop();
        }

        Ok(Some(FastaRecord { id, desc, seq }))
    }
}

/// Read every record of a protein FASTA file into a corpus, keyed by accession.
pub fn read_corpus(path: impl AsRef<Path>, config: CorpusConfig) -> Result<SequenceCorpus> {
    let path = path.as_ref();
    let fh = std::fs::File::open(path)?;
    let mut reader = FastaReader::new(std::io::BufReader::new(fh));
    let mut builder = SequenceCorpus::builder(config);
    while let Some(rec) = reader.next_record()? {
        builder.push(rec.accession(), &rec.seq)?;
    }
    if builder.is_empty() {
        return Err(MapperError::invalid_sequence(&path.display().to_string(), "FASTA file contains no sequences"));
    }
    info!(path = %path.display(), sequences = builder.len(), "read reference proteins");
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn parse_simple_fasta() {
        let data = b">sp|P12345|TEST_HUMAN first protein\nMKvL\nAA*\n>P2\nAAVLMK\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.id, "sp|P12345|TEST_HUMAN");
        assert_eq!(r1.accession(), "P12345");
        assert_eq!(r1.desc.as_deref(), Some("first protein"));
        assert_eq!(r1.seq, b"MKVLAA");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.accession(), "P2");
        assert_eq!(r2.desc, None);
        assert_eq!(r2.seq, b"AAVLMK");

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn parse_fasta_with_crlf_and_leading_blank_lines() {
        let data = b"\n\n>P1 desc\r\nMK v\r\n la\r\n>P2 \r\n W \r\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));
        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.id, "P1");
        assert_eq!(r1.seq, b"MKVLA");
        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.id, "P2");
        assert_eq!(r2.seq, b"W");
        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn read_corpus_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, ">P1\nMKVLAA\n>P2\nAAVLMK").unwrap();
        let c = read_corpus(f.path(), CorpusConfig::default()).unwrap();
        assert_eq!(c.num_sequences(), 2);
        assert_eq!(c.sequences()[1].id, "P2");
    }

    #[test]
    fn empty_record_is_an_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, ">P1\n>P2\nAAVLMK").unwrap();
        let err = read_corpus(f.path(), CorpusConfig::default()).unwrap_err();
        assert!(matches!(err, MapperError::InvalidSequence { ref id, .. } if id == "P1"));
    }

    #[test]
    fn header_noise_and_comments_are_dropped() {
        let data = b">sp|Q9XYZ1|ABC_YEAST\r\tputative\r\n; old-style comment\nMKV*\r\n\n>tr|A0A1|B_MOUSE\rLMK\nLL\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.id, "sp|Q9XYZ1|ABC_YEAST");
        assert_eq!(r1.accession(), "Q9XYZ1");
        assert_eq!(r1.desc.as_deref(), Some("putative"));
        assert_eq!(r1.seq, b"MKV");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.id, "tr|A0A1|B_MOUSE");
        assert_eq!(r2.desc.as_deref(), Some("LMK"));
        assert_eq!(r2.seq, b"LL");
        assert!(r.next_record().unwrap().is_none());
    }
}
