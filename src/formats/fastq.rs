//! FASTQ parsing and writing (spec §4.D, §4.E, §6).

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use seq_io::fastq::{Reader, Record as _};

use crate::compression::open_file;
use crate::error::GenotypeError;
use crate::quality::{self, QualityEncoding};

use super::{LimitedBuffer, ReaderOptions};

/// A single FASTQ record (spec §3). `quality_encoding` records what the
/// bytes in `quality` were interpreted as at parse time; it travels with
/// the record so later stages (trim, stats, write) never have to re-detect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    pub id: String,
    pub description: Option<String>,
    pub sequence: Vec<u8>,
    pub quality: Vec<u8>,
    pub quality_encoding: QualityEncodingTag,
    pub line_number: Option<u64>,
}

/// `QualityEncoding` plus an `Unknown` state for before detection runs,
/// since `FastqRecord` must be constructible without forcing detection.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum QualityEncodingTag {
    Phred33,
    Phred64,
    Solexa,
    Unknown,
}

impl From<QualityEncoding> for QualityEncodingTag {
    fn from(e: QualityEncoding) -> Self {
        match e {
            QualityEncoding::Phred33 => QualityEncodingTag::Phred33,
            QualityEncoding::Phred64 => QualityEncodingTag::Phred64,
            QualityEncoding::Solexa => QualityEncodingTag::Solexa,
        }
    }
}

impl QualityEncodingTag {
    pub fn resolved(self) -> Option<QualityEncoding> {
        match self {
            QualityEncodingTag::Phred33 => Some(QualityEncoding::Phred33),
            QualityEncodingTag::Phred64 => Some(QualityEncoding::Phred64),
            QualityEncodingTag::Solexa => Some(QualityEncoding::Solexa),
            QualityEncodingTag::Unknown => None,
        }
    }
}

impl FastqRecord {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Converts raw Phred scores out of this record's quality string,
    /// detecting the encoding first if it hasn't been resolved yet.
    pub fn phred_scores(&self) -> Result<Vec<i32>, GenotypeError> {
        let encoding = self.quality_encoding.resolved().unwrap_or_else(|| {
            quality::detect_encoding(&self.quality)
                .map(|d| d.encoding)
                .unwrap_or(QualityEncoding::Phred33)
        });
        quality::to_phred_scores(&self.quality, encoding)
    }
}

fn split_header(head: &[u8]) -> (String, Option<String>) {
    match head.iter().position(|&b| b == b' ' || b == b'\t') {
        Some(pos) => (
            String::from_utf8_lossy(&head[..pos]).into_owned(),
            Some(String::from_utf8_lossy(&head[pos + 1..]).into_owned()),
        ),
        None => (String::from_utf8_lossy(head).into_owned(), None),
    }
}

fn validate_record(record: &FastqRecord, line: Option<u64>) -> Result<(), GenotypeError> {
    if record.id.is_empty() {
        return Err(GenotypeError::parse("FASTQ record has an empty id", line));
    }
    if record.sequence.len() != record.quality.len() {
        return Err(GenotypeError::quality(
            format!(
                "FASTQ record '{}' has {} sequence bases but {} quality scores",
                record.id,
                record.sequence.len(),
                record.quality.len()
            ),
            line,
        ));
    }
    Ok(())
}

/// A lazy, single-pass iterator of FASTQ records, bounded by the largest
/// single record rather than the whole file (spec §2).
pub struct FastqParser<R: Read> {
    inner: Reader<R, LimitedBuffer>,
    opts: ReaderOptions,
    line_no: u64,
    detected_encoding: Option<QualityEncoding>,
    tag_encoding: bool,
}

impl<R: Read> FastqParser<R> {
    pub fn new(reader: R, opts: ReaderOptions) -> Self {
        let policy = LimitedBuffer::capped_at(opts.max_line_length);
        Self {
            inner: Reader::with_capacity(reader, super::DEFAULT_IO_BUFSIZE).set_policy(policy),
            opts,
            line_no: 0,
            detected_encoding: None,
            tag_encoding: true,
        }
    }

    /// Disables per-record encoding detection (e.g. when the caller already
    /// knows and supplies the encoding downstream); records then carry
    /// `QualityEncodingTag::Unknown`.
    pub fn detect_encoding(mut self, detect: bool) -> Self {
        self.tag_encoding = detect;
        self
    }
}

impl<R: Read> Iterator for FastqParser<R> {
    type Item = Result<FastqRecord, GenotypeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.opts.cancellation.is_cancelled() {
            return None;
        }
        let rec = match self.inner.next()? {
            Ok(r) => r,
            Err(e) => return Some(Err(GenotypeError::parse(e.to_string(), Some(self.line_no)))),
        };
        self.line_no += 4;
        let (id, description) = split_header(rec.head());
        let sequence = rec.seq().to_vec();
        let quality = rec.qual().to_vec();

        let encoding_tag = if self.tag_encoding {
            let encoding = *self.detected_encoding.get_or_insert_with(|| {
                quality::detect_encoding(&quality).map(|d| d.encoding).unwrap_or(QualityEncoding::Phred33)
            });
            QualityEncodingTag::from(encoding)
        } else {
            QualityEncodingTag::Unknown
        };

        let record = FastqRecord {
            id,
            description,
            sequence,
            quality,
            quality_encoding: encoding_tag,
            line_number: Some(self.line_no),
        };
        if let Err(e) = validate_record(&record, Some(self.line_no)) {
            return Some(Err(e));
        }
        Some(Ok(record))
    }
}

pub fn parse_string(s: &str, opts: ReaderOptions) -> FastqParser<&[u8]> {
    FastqParser::new(s.as_bytes(), opts)
}

pub fn parse_stream<R: Read>(reader: R, opts: ReaderOptions) -> FastqParser<R> {
    FastqParser::new(reader, opts)
}

pub fn parse_file(path: &Path, opts: ReaderOptions) -> Result<FastqParser<Box<dyn Read>>, GenotypeError> {
    let (reader, _detection) = open_file(path)?;
    Ok(FastqParser::new(reader, opts))
}

/// Inverse of [`FastqParser`]: serializes records back to FASTQ text,
/// reusing the id on the `+` separator line the way most tools don't (spec
/// §4.E leaves this optional; we omit it to match common practice).
pub struct FastqWriter<W: Write> {
    writer: W,
    bytes_written: u64,
}

impl<W: Write> FastqWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, bytes_written: 0 }
    }

    pub fn write_record(&mut self, record: &FastqRecord) -> Result<(), GenotypeError> {
        self.write_record_inner(record).map_err(|e| {
            GenotypeError::File(crate::error::FileError {
                message: format!("failed writing FASTQ record '{}': {}", record.id, e),
                bytes_written: Some(self.bytes_written),
                source: Some(e),
            })
        })
    }

    fn write_record_inner(&mut self, record: &FastqRecord) -> io::Result<()> {
        let mut n = self.writer.write(b"@")?;
        n += self.writer.write(record.id.as_bytes())?;
        if let Some(desc) = &record.description {
            n += self.writer.write(b" ")?;
            n += self.writer.write(desc.as_bytes())?;
        }
        n += self.writer.write(b"\n")?;
        n += self.writer.write(&record.sequence)?;
        n += self.writer.write(b"\n+\n")?;
        n += self.writer.write(&record.quality)?;
        n += self.writer.write(b"\n")?;
        self.bytes_written += n as u64;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub fn write_file(path: &Path, records: impl Iterator<Item = FastqRecord>) -> Result<(), GenotypeError> {
    let file = File::create(path)?;
    let mut writer = FastqWriter::new(BufWriter::new(file));
    for record in records {
        writer.write_record(&record)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_record() {
        let input = "@s1 desc\nACGT\n+\nIIII\n";
        let records: Vec<_> = parse_string(input, ReaderOptions::default())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "s1");
        assert_eq!(records[0].description.as_deref(), Some("desc"));
        assert_eq!(records[0].sequence, b"ACGT");
        assert_eq!(records[0].quality, b"IIII");
    }

    #[test]
    fn detects_phred33_encoding() {
        let input = "@s1\nACGT\n+\n!!!!\n";
        let records: Vec<_> = parse_string(input, ReaderOptions::default())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records[0].quality_encoding, QualityEncodingTag::Phred33);
    }

    #[test]
    fn rejects_length_mismatch() {
        let input = "@s1\nACGT\n+\nII\n";
        let result: Result<Vec<_>, _> = parse_string(input, ReaderOptions::default()).collect();
        assert!(result.is_err());
    }

    #[test]
    fn phred_scores_from_record() {
        let input = "@s1\nACGT\n+\n!'+5\n";
        let records: Vec<_> = parse_string(input, ReaderOptions::default())
            .collect::<Result<_, _>>()
            .unwrap();
        let scores = records[0].phred_scores().unwrap();
        assert_eq!(scores, vec![0, 6, 10, 20]);
    }

    #[test]
    fn writer_roundtrips_record() {
        let record = FastqRecord {
            id: "s1".to_string(),
            description: None,
            sequence: b"ACGT".to_vec(),
            quality: b"IIII".to_vec(),
            quality_encoding: QualityEncodingTag::Phred33,
            line_number: None,
        };
        let mut buf = Vec::new();
        {
            let mut writer = FastqWriter::new(&mut buf);
            writer.write_record(&record).unwrap();
        }
        assert_eq!(buf, b"@s1\nACGT\n+\nIIII\n");
    }
}
