//! Delimiter-separated value parsing and writing: CSV, TSV, PSV, SSV and
//! anything else `csv::ReaderBuilder` can be pointed at (spec §4.D, §4.E).

use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::compression::open_file;
use crate::error::GenotypeError;

use super::ReaderOptions;

const CANDIDATE_DELIMITERS: &[u8] = b",\t|; ";

/// Guards against unbounded memory growth from a single pathological field
/// or row (spec §4.D "100 MB field / 500 MB row").
pub const MAX_FIELD_BYTES: usize = 100 * 1024 * 1024;
pub const MAX_ROW_BYTES: usize = 500 * 1024 * 1024;

/// Keywords whose presence in a candidate header row is strong evidence
/// it's actually a header, not data (spec §4.D header auto-detection).
const HEADER_KEYWORDS: &[&str] = &["id", "gene", "chr", "chrom", "pos", "name", "start", "end", "type", "value", "count", "sample"];

/// How a row with a different field count than the header should be
/// handled (spec §4.D "ragged rows: error | pad-empty | truncate | ignore").
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RaggedRowMode {
    /// Reject the row with a `DsvParseError`.
    Error,
    /// Pad a short row with empty strings up to the header count.
    PadEmpty,
    /// Drop any fields beyond the header count; short rows pass through.
    Truncate,
    /// Keep the row exactly as parsed, regardless of its length.
    Ignore,
}

/// Compares a candidate header row against the row that follows it and
/// decides whether the first row is actually a header line (spec §4.D:
/// "first-row non-numeric density and keyword membership... against the
/// second row; headers are present iff first looks like headers AND second
/// has >= as many numeric fields").
pub fn detect_headers(first_row: &[&str], second_row: &[&str]) -> bool {
    if first_row.is_empty() {
        return false;
    }
    let is_numeric = |f: &&str| f.trim().parse::<f64>().is_ok();
    let first_numeric = first_row.iter().filter(is_numeric).count();
    let non_numeric_density = (first_row.len() - first_numeric) as f64 / first_row.len() as f64;
    let has_keyword = first_row.iter().any(|f| HEADER_KEYWORDS.contains(&f.trim().to_ascii_lowercase().as_str()));
    let looks_like_headers = non_numeric_density >= 0.5 || has_keyword;
    if !looks_like_headers {
        return false;
    }
    let second_numeric = second_row.iter().filter(is_numeric).count();
    second_numeric >= first_numeric
}

/// Strips a leading byte-order mark, transcoding UTF-16 BE/LE input to
/// UTF-8 as it does since `csv::Reader` only understands UTF-8 (spec §4.D
/// "a BOM on the first line is stripped (UTF-8, UTF-16 BE/LE)"). UTF-16
/// input is read to completion and transcoded up front; UTF-8 and
/// BOM-less input stream through unchanged.
fn strip_bom<'a, R: Read + 'a>(mut reader: R) -> io::Result<Box<dyn Read + 'a>> {
    let mut head = [0u8; 3];
    let mut filled = 0;
    while filled < head.len() {
        let n = reader.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    if filled >= 3 && head == [0xEF, 0xBB, 0xBF] {
        return Ok(Box::new(reader));
    }
    if filled >= 2 && head[..2] == [0xFE, 0xFF] {
        let mut rest = head[2..filled].to_vec();
        reader.read_to_end(&mut rest)?;
        return Ok(Box::new(Cursor::new(utf16_to_utf8(&rest, true))));
    }
    if filled >= 2 && head[..2] == [0xFF, 0xFE] {
        let mut rest = head[2..filled].to_vec();
        reader.read_to_end(&mut rest)?;
        return Ok(Box::new(Cursor::new(utf16_to_utf8(&rest, false))));
    }
    Ok(Box::new(Cursor::new(head[..filled].to_vec()).chain(reader)))
}

fn utf16_to_utf8(bytes: &[u8], big_endian: bool) -> Vec<u8> {
    let units = bytes.chunks(2).filter(|c| c.len() == 2).map(|c| {
        if big_endian {
            u16::from_be_bytes([c[0], c[1]])
        } else {
            u16::from_le_bytes([c[0], c[1]])
        }
    });
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect::<String>()
        .into_bytes()
}

/// Result of sniffing a delimiter from a text sample (spec §4.D "DSV
/// dialect auto-detected from a sample"). `confidence` is 0.0 when the
/// sample was too small to be trustworthy (fewer than 5 lines), in which
/// case `delimiter` falls back to comma.
#[derive(Debug, Clone, Copy)]
pub struct DelimiterDetection {
    pub delimiter: u8,
    pub confidence: f64,
}

/// Counts, for each candidate delimiter, how consistent its per-line
/// occurrence count is across the sample; the most consistent wins.
pub fn detect_delimiter(sample: &str) -> DelimiterDetection {
    let lines: Vec<&str> = sample.lines().filter(|l| !l.is_empty()).take(50).collect();
    if lines.len() < 5 {
        return DelimiterDetection {
            delimiter: b',',
            confidence: 0.0,
        };
    }
    let mut best = (b',', 0.0f64);
    for &delim in CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = lines.iter().map(|l| memchr::memchr_iter(delim, l.as_bytes()).count()).collect();
        if counts.iter().all(|&c| c == 0) {
            continue;
        }
        let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        if mean == 0.0 {
            continue;
        }
        let variance = counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / counts.len() as f64;
        let consistency = 1.0 / (1.0 + variance);
        if consistency > best.1 {
            best = (delim, consistency);
        }
    }
    DelimiterDetection {
        delimiter: best.0,
        confidence: best.1,
    }
}

/// A single DSV row (spec §3): values keep the order of `headers`, which
/// is shared (via `Arc`) across every record from the same reader rather
/// than duplicated per row.
#[derive(Debug, Clone, PartialEq)]
pub struct DsvRecord {
    pub headers: Arc<Vec<String>>,
    pub values: Vec<String>,
    pub line_number: Option<u64>,
}

impl DsvRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == name)?;
        self.values.get(idx).map(String::as_str)
    }
}

/// Shared dialect configuration for a DSV reader/writer (spec §4.D).
#[derive(Debug, Clone)]
pub struct DsvDialect {
    pub delimiter: u8,
    pub has_headers: bool,
    pub quote: u8,
    pub ragged_rows: RaggedRowMode,
}

impl Default for DsvDialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
            quote: b'"',
            ragged_rows: RaggedRowMode::Ignore,
        }
    }
}

/// A lazy, single-pass DSV reader built on `csv::Reader`, which already
/// implements the RFC 4180 quoting/escaping state machine (spec §4.D).
pub struct DsvParser<'a> {
    inner: csv::Reader<Box<dyn Read + 'a>>,
    headers: Arc<Vec<String>>,
    ragged_rows: RaggedRowMode,
    opts: ReaderOptions,
    line_no: u64,
}

impl<'a> DsvParser<'a> {
    pub fn new<R: Read + 'a>(reader: R, dialect: &DsvDialect, opts: ReaderOptions) -> Result<Self, GenotypeError> {
        let stripped = strip_bom(reader)?;
        let ragged_rows = if opts.strict { RaggedRowMode::Error } else { dialect.ragged_rows };
        let mut inner = csv::ReaderBuilder::new()
            .delimiter(dialect.delimiter)
            .quote(dialect.quote)
            .has_headers(dialect.has_headers)
            .flexible(true)
            .from_reader(stripped);
        let headers = if dialect.has_headers {
            inner.headers()?.iter().map(str::to_string).collect()
        } else {
            Vec::new()
        };
        Ok(Self {
            inner,
            headers: Arc::new(headers),
            ragged_rows,
            opts,
            line_no: if dialect.has_headers { 1 } else { 0 },
        })
    }
}

impl<'a> Iterator for DsvParser<'a> {
    type Item = Result<DsvRecord, GenotypeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.opts.cancellation.is_cancelled() {
            return None;
        }
        let mut record = csv::StringRecord::new();
        match self.inner.read_record(&mut record) {
            Ok(false) => None,
            Ok(true) => {
                self.line_no += 1;
                let row_len: usize = record.iter().map(str::len).sum();
                if row_len > MAX_ROW_BYTES {
                    return Some(Err(GenotypeError::Dsv(crate::error::DsvParseError {
                        message: format!("row exceeds the maximum of {} bytes", MAX_ROW_BYTES),
                        line: Some(self.line_no),
                        field: None,
                    })));
                }
                if row_len > self.opts.max_line_length {
                    return Some(Err(GenotypeError::Dsv(crate::error::DsvParseError {
                        message: format!("row length {} exceeds the configured maximum of {}", row_len, self.opts.max_line_length),
                        line: Some(self.line_no),
                        field: None,
                    })));
                }
                if let Some(field) = record.iter().find(|f| f.len() > MAX_FIELD_BYTES) {
                    return Some(Err(GenotypeError::Dsv(crate::error::DsvParseError {
                        message: format!("field of {} bytes exceeds the maximum of {}", field.len(), MAX_FIELD_BYTES),
                        line: Some(self.line_no),
                        field: None,
                    })));
                }

                let mut values: Vec<String> = record.iter().map(str::to_string).collect();
                if !self.headers.is_empty() && values.len() != self.headers.len() {
                    match self.ragged_rows {
                        RaggedRowMode::Error => {
                            return Some(Err(GenotypeError::Dsv(crate::error::DsvParseError {
                                message: format!("row has {} fields but header declares {}", values.len(), self.headers.len()),
                                line: Some(self.line_no),
                                field: None,
                            })));
                        }
                        RaggedRowMode::PadEmpty => {
                            if values.len() < self.headers.len() {
                                values.resize(self.headers.len(), String::new());
                            }
                        }
                        RaggedRowMode::Truncate => {
                            if values.len() > self.headers.len() {
                                values.truncate(self.headers.len());
                            }
                        }
                        RaggedRowMode::Ignore => {}
                    }
                }
                Some(Ok(DsvRecord {
                    headers: self.headers.clone(),
                    values,
                    line_number: Some(self.line_no),
                }))
            }
            Err(e) => Some(Err(GenotypeError::Dsv(crate::error::DsvParseError {
                message: e.to_string(),
                line: Some(self.line_no + 1),
                field: None,
            }))),
        }
    }
}

pub fn parse_string<'a>(s: &'a str, dialect: &DsvDialect, opts: ReaderOptions) -> Result<DsvParser<'a>, GenotypeError> {
    DsvParser::new(s.as_bytes(), dialect, opts)
}

pub fn parse_stream<'a, R: Read + 'a>(reader: R, dialect: &DsvDialect, opts: ReaderOptions) -> Result<DsvParser<'a>, GenotypeError> {
    DsvParser::new(reader, dialect, opts)
}

pub fn parse_file(path: &Path, dialect: &DsvDialect, opts: ReaderOptions) -> Result<DsvParser<'static>, GenotypeError> {
    let (reader, _detection) = open_file(path)?;
    DsvParser::new(reader, dialect, opts)
}

/// Prefixes values Excel would otherwise interpret as a formula (leading
/// `=`, `+`, `-` or `@`) with a single quote, matching the de facto
/// mitigation for CSV-injection when a DSV file might be opened in a
/// spreadsheet (spec §4.E "writer must neutralize formula-triggering cells").
fn excel_protect(value: &str) -> String {
    if value.starts_with(['=', '+', '-', '@']) {
        format!("'{}", value)
    } else {
        value.to_string()
    }
}

/// Serializes `DsvRecord`s back to delimited text via `csv::Writer`.
pub struct DsvWriter<W: Write> {
    inner: csv::Writer<W>,
    wrote_headers: bool,
    protect_formulas: bool,
}

impl<W: Write> DsvWriter<W> {
    pub fn new(writer: W, dialect: &DsvDialect, protect_formulas: bool) -> Self {
        let inner = csv::WriterBuilder::new().delimiter(dialect.delimiter).quote(dialect.quote).from_writer(writer);
        Self {
            inner,
            wrote_headers: !dialect.has_headers,
            protect_formulas,
        }
    }

    pub fn write_record(&mut self, record: &DsvRecord) -> Result<(), GenotypeError> {
        if !self.wrote_headers {
            self.inner.write_record(record.headers.iter())?;
            self.wrote_headers = true;
        }
        let values: Vec<String> = if self.protect_formulas {
            record.values.iter().map(|v| excel_protect(v)).collect()
        } else {
            record.values.clone()
        };
        self.inner.write_record(&values)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), GenotypeError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W, GenotypeError> {
        self.inner.into_inner().map_err(|e| GenotypeError::Other(e.to_string()))
    }
}

pub fn write_file(
    path: &Path,
    dialect: &DsvDialect,
    protect_formulas: bool,
    records: impl Iterator<Item = DsvRecord>,
) -> Result<(), GenotypeError> {
    let file = File::create(path)?;
    let mut writer = DsvWriter::new(io::BufWriter::new(file), dialect, protect_formulas);
    for record in records {
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
