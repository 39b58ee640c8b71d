//! SAM (Sequence Alignment/Map) parsing and writing (spec §4.D, §4.E, §6).
//!
//! Text SAM only: tab-delimited, `@`-prefixed header block followed by one
//! alignment per line. BAM's binary encoding is out of scope (spec Non-goals).

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::compression::open_file;
use crate::error::{GenotypeError, SamError};

use super::{check_line_length, ReaderOptions};

/// Standard SAM FLAG bits (spec §4.D "SAM flags decoded into named booleans").
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct SamFlag(pub u16);

impl SamFlag {
    pub const PAIRED: u16 = 0x1;
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE_STRAND: u16 = 0x10;
    pub const MATE_REVERSE_STRAND: u16 = 0x20;
    pub const FIRST_IN_PAIR: u16 = 0x40;
    pub const SECOND_IN_PAIR: u16 = 0x80;
    pub const SECONDARY: u16 = 0x100;
    pub const QC_FAIL: u16 = 0x200;
    pub const DUPLICATE: u16 = 0x400;
    pub const SUPPLEMENTARY: u16 = 0x800;

    fn has(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    pub fn is_paired(self) -> bool {
        self.has(Self::PAIRED)
    }
    pub fn is_proper_pair(self) -> bool {
        self.has(Self::PROPER_PAIR)
    }
    pub fn is_unmapped(self) -> bool {
        self.has(Self::UNMAPPED)
    }
    pub fn is_mate_unmapped(self) -> bool {
        self.has(Self::MATE_UNMAPPED)
    }
    pub fn is_reverse_strand(self) -> bool {
        self.has(Self::REVERSE_STRAND)
    }
    pub fn is_mate_reverse_strand(self) -> bool {
        self.has(Self::MATE_REVERSE_STRAND)
    }
    pub fn is_first_in_pair(self) -> bool {
        self.has(Self::FIRST_IN_PAIR)
    }
    pub fn is_second_in_pair(self) -> bool {
        self.has(Self::SECOND_IN_PAIR)
    }
    pub fn is_secondary(self) -> bool {
        self.has(Self::SECONDARY)
    }
    pub fn is_qc_fail(self) -> bool {
        self.has(Self::QC_FAIL)
    }
    pub fn is_duplicate(self) -> bool {
        self.has(Self::DUPLICATE)
    }
    pub fn is_supplementary(self) -> bool {
        self.has(Self::SUPPLEMENTARY)
    }
}

/// A single optional SAM tag value (spec §4.D "typed optional fields").
#[derive(Debug, Clone, PartialEq)]
pub enum SamTagValue {
    Char(char),
    Int(i64),
    Float(f64),
    Str(String),
    Hex(String),
    Array(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamTag {
    pub tag: [u8; 2],
    pub value: SamTagValue,
}

fn parse_tag(field: &str, line: Option<u64>) -> Result<SamTag, GenotypeError> {
    let mut parts = field.splitn(3, ':');
    let (Some(tag_str), Some(type_char), Some(value_str)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(GenotypeError::Sam(SamError {
            message: format!("malformed optional field '{}'", field),
            qname: None,
            line,
        }));
    };
    if tag_str.len() != 2 {
        return Err(GenotypeError::Sam(SamError {
            message: format!("optional field tag '{}' must be 2 characters", tag_str),
            qname: None,
            line,
        }));
    }
    let tag_bytes = tag_str.as_bytes();
    let tag = [tag_bytes[0], tag_bytes[1]];
    let value = match type_char {
        "A" => SamTagValue::Char(value_str.chars().next().ok_or_else(|| {
            GenotypeError::Sam(SamError {
                message: format!("empty 'A' tag value for '{}'", tag_str),
                qname: None,
                line,
            })
        })?),
        "i" => SamTagValue::Int(value_str.parse::<i64>()?),
        "f" => SamTagValue::Float(value_str.parse::<f64>()?),
        "Z" => SamTagValue::Str(value_str.to_string()),
        "H" => SamTagValue::Hex(value_str.to_string()),
        "B" => SamTagValue::Array(value_str.to_string()),
        other => {
            return Err(GenotypeError::Sam(SamError {
                message: format!("unknown optional field type '{}'", other),
                qname: None,
                line,
            }))
        }
    };
    Ok(SamTag { tag, value })
}

/// A parsed `@SQ` reference-sequence header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamSequence {
    pub name: String,
    pub length: u64,
}

/// Accumulated `@`-prefixed header lines, with `@SQ` entries parsed out
/// for convenience (spec §4.D).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamHeader {
    pub lines: Vec<String>,
    pub sequences: Vec<SamSequence>,
}

impl SamHeader {
    fn push_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
        if let Some(rest) = line.strip_prefix("@SQ") {
            let mut name = None;
            let mut length = None;
            for field in rest.split('\t').filter(|f| !f.is_empty()) {
                if let Some(sn) = field.strip_prefix("SN:") {
                    name = Some(sn.to_string());
                } else if let Some(ln) = field.strip_prefix("LN:") {
                    length = ln.parse::<u64>().ok();
                }
            }
            if let (Some(name), Some(length)) = (name, length) {
                self.sequences.push(SamSequence { name, length });
            }
        }
    }
}

/// A single alignment record (spec §3). `seq`/`qual` are `None` when the
/// file uses `*` to signal "not available".
#[derive(Debug, Clone, PartialEq)]
pub struct SamAlignment {
    pub qname: String,
    pub flag: SamFlag,
    pub rname: String,
    pub pos: u64,
    pub mapq: u8,
    pub cigar: String,
    pub rnext: String,
    pub pnext: u64,
    pub tlen: i64,
    pub seq: Option<Vec<u8>>,
    pub qual: Option<Vec<u8>>,
    pub tags: Vec<SamTag>,
    pub line_number: Option<u64>,
}

const CIGAR_OPS: &[u8] = b"MIDNSHP=X";

/// Checks that `cigar` is either `*` or a sequence of `<digits><op>` pairs
/// using only the nine standard operation characters (spec §4.D).
pub fn validate_cigar(cigar: &str) -> bool {
    if cigar == "*" {
        return true;
    }
    let bytes = cigar.as_bytes();
    let mut i = 0;
    let mut saw_any = false;
    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == start || i >= bytes.len() || !CIGAR_OPS.contains(&bytes[i]) {
            return false;
        }
        i += 1;
        saw_any = true;
    }
    saw_any
}

fn parse_alignment_line(line: &str, line_no: u64) -> Result<SamAlignment, GenotypeError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 11 {
        return Err(GenotypeError::Sam(SamError {
            message: format!("expected at least 11 mandatory fields, found {}", fields.len()),
            qname: None,
            line: Some(line_no),
        }));
    }
    let qname = fields[0].to_string();
    let err = |msg: String| -> GenotypeError {
        GenotypeError::Sam(SamError {
            message: msg,
            qname: Some(qname.clone()),
            line: Some(line_no),
        })
    };
    let flag_val: u16 = atoi::atoi(fields[1].as_bytes()).ok_or_else(|| err(format!("invalid FLAG '{}'", fields[1])))?;
    let pos: u64 = atoi::atoi(fields[3].as_bytes()).ok_or_else(|| err(format!("invalid POS '{}'", fields[3])))?;
    let mapq: u8 = atoi::atoi(fields[4].as_bytes()).ok_or_else(|| err(format!("invalid MAPQ '{}'", fields[4])))?;
    if !validate_cigar(fields[5]) {
        return Err(err(format!("invalid CIGAR '{}'", fields[5])));
    }
    let pnext: u64 = atoi::atoi(fields[7].as_bytes()).ok_or_else(|| err(format!("invalid PNEXT '{}'", fields[7])))?;
    let tlen: i64 = atoi::atoi(fields[8].as_bytes()).ok_or_else(|| err(format!("invalid TLEN '{}'", fields[8])))?;
    let seq = if fields[9] == "*" { None } else { Some(fields[9].as_bytes().to_vec()) };
    let qual = if fields[10] == "*" { None } else { Some(fields[10].as_bytes().to_vec()) };
    if let (Some(s), Some(q)) = (&seq, &qual) {
        if s.len() != q.len() {
            return Err(err(format!("SEQ length {} does not match QUAL length {}", s.len(), q.len())));
        }
    }
    let mut tags = Vec::with_capacity(fields.len().saturating_sub(11));
    for field in &fields[11..] {
        if field.is_empty() {
            continue;
        }
        tags.push(parse_tag(field, Some(line_no)).map_err(|e| match e {
            GenotypeError::Sam(mut s) => {
                s.qname = Some(qname.clone());
                GenotypeError::Sam(s)
            }
            other => other,
        })?);
    }
    Ok(SamAlignment {
        qname,
        flag: SamFlag(flag_val),
        rname: fields[2].to_string(),
        pos,
        mapq,
        cigar: fields[5].to_string(),
        rnext: fields[6].to_string(),
        pnext,
        tlen,
        seq,
        qual,
        tags,
        line_number: Some(line_no),
    })
}

/// A lazy, single-pass SAM reader: consumes the header block up front
/// (bounded, since headers are never large in practice) then yields
/// alignments one line at a time.
pub struct SamParser<R: BufRead> {
    lines: io::Lines<R>,
    opts: ReaderOptions,
    line_no: u64,
    pending: Option<(String, u64)>,
    pub header: SamHeader,
}

impl<R: BufRead> SamParser<R> {
    pub fn new(reader: R, opts: ReaderOptions) -> Result<Self, GenotypeError> {
        let mut lines = reader.lines();
        let mut header = SamHeader::default();
        let mut line_no = 0u64;
        let mut pending = None;
        for line in &mut lines {
            let line = line?;
            line_no += 1;
            check_line_length(&line, &opts, line_no)?;
            if line.starts_with('@') {
                header.push_line(&line);
            } else {
                pending = Some((line, line_no));
                break;
            }
        }
        Ok(Self {
            lines,
            opts,
            line_no,
            pending,
            header,
        })
    }
}

impl<R: BufRead> Iterator for SamParser<R> {
    type Item = Result<SamAlignment, GenotypeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.opts.cancellation.is_cancelled() {
            return None;
        }
        let (line, line_no) = if let Some(pending) = self.pending.take() {
            pending
        } else {
            let line = match self.lines.next()? {
                Ok(l) => l,
                Err(e) => return Some(Err(GenotypeError::from(e))),
            };
            self.line_no += 1;
            (line, self.line_no)
        };
        if line.is_empty() {
            return self.next();
        }
        if let Err(e) = check_line_length(&line, &self.opts, line_no) {
            return Some(Err(e));
        }
        Some(parse_alignment_line(&line, line_no))
    }
}

pub fn parse_string(s: &str, opts: ReaderOptions) -> Result<SamParser<BufReader<&[u8]>>, GenotypeError> {
    SamParser::new(BufReader::new(s.as_bytes()), opts)
}

pub fn parse_stream<R: Read>(reader: R, opts: ReaderOptions) -> Result<SamParser<BufReader<R>>, GenotypeError> {
    SamParser::new(BufReader::new(reader), opts)
}

pub fn parse_file(path: &Path, opts: ReaderOptions) -> Result<SamParser<BufReader<Box<dyn Read>>>, GenotypeError> {
    let (reader, _detection) = open_file(path)?;
    SamParser::new(BufReader::new(reader), opts)
}

/// Writes a header followed by one alignment per line (spec §4.E).
pub struct SamWriter<W: Write> {
    writer: W,
    bytes_written: u64,
}

impl<W: Write> SamWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, bytes_written: 0 }
    }

    pub fn write_header(&mut self, header: &SamHeader) -> Result<(), GenotypeError> {
        for line in &header.lines {
            self.writer.write_all(line.as_bytes())?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn write_alignment(&mut self, rec: &SamAlignment) -> Result<(), GenotypeError> {
        self.write_alignment_inner(rec).map_err(|e| {
            GenotypeError::File(crate::error::FileError {
                message: format!("failed writing SAM record '{}': {}", rec.qname, e),
                bytes_written: Some(self.bytes_written),
                source: Some(e),
            })
        })
    }

    fn write_alignment_inner(&mut self, rec: &SamAlignment) -> io::Result<()> {
        let seq = rec.seq.as_deref().map(|s| String::from_utf8_lossy(s).into_owned()).unwrap_or_else(|| "*".to_string());
        let qual = rec.qual.as_deref().map(|q| String::from_utf8_lossy(q).into_owned()).unwrap_or_else(|| "*".to_string());
        let mut line = format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            rec.qname, rec.flag.0, rec.rname, rec.pos, rec.mapq, rec.cigar, rec.rnext, rec.pnext, rec.tlen, seq, qual
        );
        for tag in &rec.tags {
            line.push('\t');
            line.push_str(&format_tag(tag));
        }
        line.push('\n');
        let n = self.writer.write(line.as_bytes())?;
        self.bytes_written += n as u64;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn format_tag(tag: &SamTag) -> String {
    let tag_str = String::from_utf8_lossy(&tag.tag);
    match &tag.value {
        SamTagValue::Char(c) => format!("{}:A:{}", tag_str, c),
        SamTagValue::Int(i) => format!("{}:i:{}", tag_str, i),
        SamTagValue::Float(f) => format!("{}:f:{}", tag_str, f),
        SamTagValue::Str(s) => format!("{}:Z:{}", tag_str, s),
        SamTagValue::Hex(h) => format!("{}:H:{}", tag_str, h),
        SamTagValue::Array(a) => format!("{}:B:{}", tag_str, a),
    }
}

pub fn write_file(path: &Path, header: &SamHeader, records: impl Iterator<Item = SamAlignment>) -> Result<(), GenotypeError> {
    let file = File::create(path)?;
    let mut writer = SamWriter::new(BufWriter::new(file));
    writer.write_header(header)?;
    for record in records {
        writer.write_alignment(&record)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> &'static str {
        "@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chr1\tLN:248956422\nread1\t0\tchr1\t100\t60\t4M\t*\t0\t0\tACGT\tIIII\tNM:i:0\tAS:i:4\n"
    }

    #[test]
    fn parses_header_sequences() {
        let parser = parse_stream(sample().as_bytes(), ReaderOptions::default()).unwrap();
        assert_eq!(parser.header.sequences.len(), 1);
        assert_eq!(parser.header.sequences[0].name, "chr1");
        assert_eq!(parser.header.sequences[0].length, 248956422);
    }

    #[test]
    fn validates_cigar_strings() {
        assert!(validate_cigar("4M"));
        assert!(validate_cigar("10M2I3D"));
        assert!(validate_cigar("*"));
        assert!(!validate_cigar(""));
        assert!(!validate_cigar("M4"));
        assert!(!validate_cigar("4Q"));
    }

    #[test]
    fn flag_bits_decode() {
        let flag = SamFlag(0x1 | 0x10 | 0x40);
        assert!(flag.is_paired());
        assert!(flag.is_reverse_strand());
        assert!(flag.is_first_in_pair());
        assert!(!flag.is_secondary());
    }

    #[test]
    fn parses_optional_tags() {
        let line = "read1\t0\tchr1\t100\t60\t4M\t*\t0\t0\tACGT\tIIII\tNM:i:0\tAS:i:4";
        let rec = parse_alignment_line(line, 3).unwrap();
        assert_eq!(rec.tags.len(), 2);
        assert_eq!(rec.tags[0].tag, *b"NM");
        assert_eq!(rec.tags[0].value, SamTagValue::Int(0));
    }

    #[test]
    fn rejects_seq_qual_length_mismatch() {
        let line = "read1\t0\tchr1\t100\t60\t4M\t*\t0\t0\tACGT\tII";
        assert!(parse_alignment_line(line, 3).is_err());
    }

    #[test]
    fn writer_roundtrips_alignment() {
        let rec = SamAlignment {
            qname: "read1".to_string(),
            flag: SamFlag(0),
            rname: "chr1".to_string(),
            pos: 100,
            mapq: 60,
            cigar: "4M".to_string(),
            rnext: "*".to_string(),
            pnext: 0,
            tlen: 0,
            seq: Some(b"ACGT".to_vec()),
            qual: Some(b"IIII".to_vec()),
            tags: vec![SamTag {
                tag: *b"NM",
                value: SamTagValue::Int(0),
            }],
            line_number: None,
        };
        let mut buf = Vec::new();
        {
            let mut writer = SamWriter::new(&mut buf);
            writer.write_alignment(&rec).unwrap();
        }
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "read1\t0\tchr1\t100\t60\t4M\t*\t0\t0\tACGT\tIIII\tNM:i:0\n"
        );
    }
}
