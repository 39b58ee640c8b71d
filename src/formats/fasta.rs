//! FASTA parsing and writing (spec §4.D, §4.E, §6).
//!
//! Records start at a `>` header line, split at the first whitespace into
//! id and optional description; subsequent non-header lines concatenate
//! (whitespace stripped) until the next `>` or EOF.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use seq_io::fasta::{Reader, Record as _};

use crate::compression::open_file;
use crate::error::GenotypeError;
use crate::seq::iupac::is_iupac;

use super::{LimitedBuffer, ReaderOptions};

/// A single FASTA record (spec §3): immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub description: Option<String>,
    pub sequence: Vec<u8>,
}

impl FastaRecord {
    pub fn new(id: impl Into<String>, description: Option<String>, sequence: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            description,
            sequence,
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
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

fn strip_whitespace(seq: &[u8]) -> Vec<u8> {
    seq.iter().filter(|&&b| !b.is_ascii_whitespace()).copied().collect()
}

/// Validation applied when `ReaderOptions::validate` is set: every
/// sequence character must be a valid IUPAC code (spec §4.D).
fn validate_record(record: &FastaRecord, opts: &ReaderOptions, line: Option<u64>) -> Result<(), GenotypeError> {
    if record.id.is_empty() {
        return Err(GenotypeError::parse("FASTA record has an empty id", line));
    }
    if record.id.chars().any(|c| c.is_whitespace()) {
        return Err(GenotypeError::parse(
            format!("FASTA id '{}' contains whitespace", record.id),
            line,
        ));
    }
    if record.sequence.is_empty() {
        return Err(GenotypeError::validation(format!(
            "FASTA record '{}' has an empty sequence",
            record.id
        )));
    }
    if opts.validate && !is_iupac(&record.sequence) {
        return Err(GenotypeError::sequence(
            format!("FASTA record '{}' contains non-IUPAC characters", record.id),
            line,
        ));
    }
    Ok(())
}

/// A lazy, single-pass iterator of FASTA records. Memory is bounded by the
/// largest single record (spec §2), never the whole file.
pub struct FastaParser<R: Read> {
    inner: Reader<R, LimitedBuffer>,
    opts: ReaderOptions,
    line_no: u64,
    allow_empty: bool,
}

impl<R: Read> FastaParser<R> {
    pub fn new(reader: R, opts: ReaderOptions) -> Self {
        let policy = LimitedBuffer::capped_at(opts.max_line_length);
        Self {
            inner: Reader::with_capacity(reader, super::DEFAULT_IO_BUFSIZE).set_policy(policy),
            opts,
            line_no: 0,
            allow_empty: false,
        }
    }

    /// Accept empty sequences instead of rejecting them (spec §9 open
    /// question: rejected by default, see SPEC_FULL.md).
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }
}

impl<R: Read> Iterator for FastaParser<R> {
    type Item = Result<FastaRecord, GenotypeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.opts.cancellation.is_cancelled() {
            return None;
        }
        let rec = match self.inner.next()? {
            Ok(r) => r,
            Err(e) => return Some(Err(GenotypeError::parse(e.to_string(), Some(self.line_no)))),
        };
        self.line_no += 1 + rec.num_seq_lines() as u64;
        let (id, description) = split_header(rec.head());
        let sequence = strip_whitespace(rec.seq());
        let record = FastaRecord::new(id, description, sequence);
        if record.sequence.is_empty() && self.allow_empty {
            return Some(Ok(record));
        }
        if let Err(e) = validate_record(&record, &self.opts, Some(self.line_no)) {
            return Some(Err(e));
        }
        Some(Ok(record))
    }
}

pub fn parse_string(s: &str, opts: ReaderOptions) -> FastaParser<&[u8]> {
    FastaParser::new(s.as_bytes(), opts)
}

pub fn parse_stream<R: Read>(reader: R, opts: ReaderOptions) -> FastaParser<R> {
    FastaParser::new(reader, opts)
}

pub fn parse_file(path: &Path, opts: ReaderOptions) -> Result<FastaParser<Box<dyn Read>>, GenotypeError> {
    let (reader, _detection) = open_file(path)?;
    Ok(FastaParser::new(reader, opts))
}

/// Inverse of [`FastaParser`]: serializes records back to FASTA text,
/// optionally line-wrapping the sequence (spec §4.E).
pub struct FastaWriter<W: Write> {
    writer: W,
    wrap: Option<usize>,
    bytes_written: u64,
}

impl<W: Write> FastaWriter<W> {
    pub fn new(writer: W, wrap: Option<usize>) -> Self {
        Self {
            writer,
            wrap,
            bytes_written: 0,
        }
    }

    pub fn write_record(&mut self, record: &FastaRecord) -> Result<(), GenotypeError> {
        self.write_record_inner(record).map_err(|e| {
            GenotypeError::File(crate::error::FileError {
                message: format!("failed writing FASTA record '{}': {}", record.id, e),
                bytes_written: Some(self.bytes_written),
                source: Some(e),
            })
        })
    }

    fn write_record_inner(&mut self, record: &FastaRecord) -> io::Result<()> {
        let mut n = self.writer.write(b">")?;
        n += self.writer.write(record.id.as_bytes())?;
        if let Some(desc) = &record.description {
            n += self.writer.write(b" ")?;
            n += self.writer.write(desc.as_bytes())?;
        }
        n += self.writer.write(b"\n")?;
        match self.wrap {
            Some(width) if width > 0 => {
                for chunk in record.sequence.chunks(width) {
                    n += self.writer.write(chunk)?;
                    n += self.writer.write(b"\n")?;
                }
            }
            _ => {
                n += self.writer.write(&record.sequence)?;
                n += self.writer.write(b"\n")?;
            }
        }
        self.bytes_written += n as u64;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub fn write_file(path: &Path, records: impl Iterator<Item = FastaRecord>, wrap: Option<usize>) -> Result<(), GenotypeError> {
    let file = File::create(path)?;
    let mut writer = FastaWriter::new(BufWriter::new(file), wrap);
    for record in records {
        writer.write_record(&record)?;
    }
    Ok(())
}
