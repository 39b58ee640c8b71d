//! BED interval parsing and writing (spec §4.D, §4.E, §6).
//!
//! Tab-delimited, 0-based half-open coordinates. Column count varies
//! between BED3 and BED12 (plus arbitrary trailing extra columns); the
//! variant actually present is inferred per line rather than fixed up front.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::compression::open_file;
use crate::error::{BedError, GenotypeError};

use super::{check_line_length, ReaderOptions};

/// Which BED column set a line actually populated (spec §4.D "variant
/// inferred from column count").
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BedVariant {
    Bed3,
    Bed4,
    Bed5,
    Bed6,
    Bed9,
    Bed12,
}

impl BedVariant {
    fn from_field_count(n: usize) -> Option<Self> {
        match n {
            3 => Some(BedVariant::Bed3),
            4 => Some(BedVariant::Bed4),
            5 => Some(BedVariant::Bed5),
            6..=8 => Some(BedVariant::Bed6),
            9..=11 => Some(BedVariant::Bed9),
            n if n >= 12 => Some(BedVariant::Bed12),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

/// A single BED interval (spec §3). Optional columns are `None` when the
/// line's variant didn't populate them.
#[derive(Debug, Clone, PartialEq)]
pub struct BedInterval {
    pub chrom: String,
    pub chrom_start: u64,
    pub chrom_end: u64,
    pub name: Option<String>,
    pub score: Option<f64>,
    pub strand: Option<Strand>,
    pub thick_start: Option<u64>,
    pub thick_end: Option<u64>,
    pub item_rgb: Option<String>,
    pub block_count: Option<u32>,
    pub block_sizes: Option<Vec<u32>>,
    pub block_starts: Option<Vec<u32>>,
    pub extra_fields: Vec<String>,
    pub variant: BedVariant,
    pub line_number: Option<u64>,
}

impl BedInterval {
    pub fn len(&self) -> u64 {
        self.chrom_end.saturating_sub(self.chrom_start)
    }

    pub fn is_empty(&self) -> bool {
        self.chrom_end <= self.chrom_start
    }
}

fn parse_strand(s: &str) -> Option<Strand> {
    match s {
        "+" => Some(Strand::Forward),
        "-" => Some(Strand::Reverse),
        "." => Some(Strand::Unknown),
        _ => None,
    }
}

fn parse_comma_list(s: &str) -> Result<Vec<u32>, std::num::ParseIntError> {
    s.trim_end_matches(',').split(',').map(|x| x.parse::<u32>()).collect()
}

fn parse_line(line: &str, line_no: u64) -> Result<BedInterval, GenotypeError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let variant = BedVariant::from_field_count(fields.len()).ok_or_else(|| {
        GenotypeError::Bed(BedError {
            message: format!("expected at least 3 columns, found {}", fields.len()),
            chromosome: None,
            line: Some(line_no),
        })
    })?;
    let chrom = fields[0].to_string();
    let err = |msg: String| -> GenotypeError {
        GenotypeError::Bed(BedError {
            message: msg,
            chromosome: Some(chrom.clone()),
            line: Some(line_no),
        })
    };
    let chrom_start: u64 = atoi::atoi(fields[1].as_bytes()).ok_or_else(|| err(format!("invalid chromStart '{}'", fields[1])))?;
    let chrom_end: u64 = atoi::atoi(fields[2].as_bytes()).ok_or_else(|| err(format!("invalid chromEnd '{}'", fields[2])))?;
    if chrom_end < chrom_start {
        return Err(err(format!(
            "chromEnd {} is before chromStart {}",
            chrom_end, chrom_start
        )));
    }

    let get = |i: usize| fields.get(i).copied();

    let name = get(3).filter(|s| !s.is_empty()).map(str::to_string);
    let score = match get(4) {
        Some(s) if !s.is_empty() => Some(s.parse::<f64>().map_err(|_| err(format!("invalid score '{}'", s)))?),
        _ => None,
    };
    let strand = match get(5) {
        Some(s) if !s.is_empty() => Some(parse_strand(s).ok_or_else(|| err(format!("invalid strand '{}'", s)))?),
        _ => None,
    };
    let thick_start = match get(6) {
        Some(s) if !s.is_empty() => Some(s.parse::<u64>().map_err(|_| err(format!("invalid thickStart '{}'", s)))?),
        _ => None,
    };
    let thick_end = match get(7) {
        Some(s) if !s.is_empty() => Some(s.parse::<u64>().map_err(|_| err(format!("invalid thickEnd '{}'", s)))?),
        _ => None,
    };
    let item_rgb = get(8).filter(|s| !s.is_empty()).map(str::to_string);
    let block_count = match get(9) {
        Some(s) if !s.is_empty() => Some(s.parse::<u32>().map_err(|_| err(format!("invalid blockCount '{}'", s)))?),
        _ => None,
    };
    let block_sizes = match get(10) {
        Some(s) if !s.is_empty() => Some(parse_comma_list(s).map_err(|_| err(format!("invalid blockSizes '{}'", s)))?),
        _ => None,
    };
    let block_starts = match get(11) {
        Some(s) if !s.is_empty() => Some(parse_comma_list(s).map_err(|_| err(format!("invalid blockStarts '{}'", s)))?),
        _ => None,
    };
    let extra_fields = fields.get(12..).map(|rest| rest.iter().map(|s| s.to_string()).collect()).unwrap_or_default();

    Ok(BedInterval {
        chrom,
        chrom_start,
        chrom_end,
        name,
        score,
        strand,
        thick_start,
        thick_end,
        item_rgb,
        block_count,
        block_sizes,
        block_starts,
        extra_fields,
        variant,
        line_number: Some(line_no),
    })
}

/// A lazy, single-pass BED reader. Lines starting with `track`, `browser`
/// or `#` are skipped as headers/comments (spec §4.D).
pub struct BedParser<R: BufRead> {
    lines: io::Lines<R>,
    opts: ReaderOptions,
    line_no: u64,
}

impl<R: BufRead> BedParser<R> {
    pub fn new(reader: R, opts: ReaderOptions) -> Self {
        Self {
            lines: reader.lines(),
            opts,
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for BedParser<R> {
    type Item = Result<BedInterval, GenotypeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.opts.cancellation.is_cancelled() {
                return None;
            }
            let line = match self.lines.next()? {
                Ok(l) => l,
                Err(e) => return Some(Err(GenotypeError::from(e))),
            };
            self.line_no += 1;
            if line.is_empty() || line.starts_with("track") || line.starts_with("browser") || line.starts_with('#') {
                continue;
            }
            if let Err(e) = check_line_length(&line, &self.opts, self.line_no) {
                return Some(Err(e));
            }
            return Some(parse_line(&line, self.line_no));
        }
    }
}

pub fn parse_string(s: &str, opts: ReaderOptions) -> BedParser<BufReader<&[u8]>> {
    BedParser::new(BufReader::new(s.as_bytes()), opts)
}

pub fn parse_stream<R: Read>(reader: R, opts: ReaderOptions) -> BedParser<BufReader<R>> {
    BedParser::new(BufReader::new(reader), opts)
}

pub fn parse_file(path: &Path, opts: ReaderOptions) -> Result<BedParser<BufReader<Box<dyn Read>>>, GenotypeError> {
    let (reader, _detection) = open_file(path)?;
    Ok(BedParser::new(BufReader::new(reader), opts))
}

/// Writes one interval per line, emitting only the columns its own
/// variant populated (spec §4.E).
pub struct BedWriter<W: Write> {
    writer: W,
    bytes_written: u64,
}

impl<W: Write> BedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, bytes_written: 0 }
    }

    pub fn write_interval(&mut self, rec: &BedInterval) -> Result<(), GenotypeError> {
        self.write_interval_inner(rec).map_err(|e| {
            GenotypeError::File(crate::error::FileError {
                message: format!("failed writing BED interval for '{}': {}", rec.chrom, e),
                bytes_written: Some(self.bytes_written),
                source: Some(e),
            })
        })
    }

    fn write_interval_inner(&mut self, rec: &BedInterval) -> io::Result<()> {
        let mut cols = vec![rec.chrom.clone(), rec.chrom_start.to_string(), rec.chrom_end.to_string()];
        if let Some(name) = &rec.name {
            cols.push(name.clone());
        }
        if let Some(score) = rec.score {
            cols.push(score.to_string());
        }
        if let Some(strand) = rec.strand {
            cols.push(
                match strand {
                    Strand::Forward => "+",
                    Strand::Reverse => "-",
                    Strand::Unknown => ".",
                }
                .to_string(),
            );
        }
        if let Some(v) = rec.thick_start {
            cols.push(v.to_string());
        }
        if let Some(v) = rec.thick_end {
            cols.push(v.to_string());
        }
        if let Some(v) = &rec.item_rgb {
            cols.push(v.clone());
        }
        if let Some(v) = rec.block_count {
            cols.push(v.to_string());
        }
        if let Some(v) = &rec.block_sizes {
            cols.push(v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",") + ",");
        }
        if let Some(v) = &rec.block_starts {
            cols.push(v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",") + ",");
        }
        cols.extend(rec.extra_fields.iter().cloned());
        let line = cols.join("\t") + "\n";
        let n = self.writer.write(line.as_bytes())?;
        self.bytes_written += n as u64;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub fn write_file(path: &Path, records: impl Iterator<Item = BedInterval>) -> Result<(), GenotypeError> {
    let file = File::create(path)?;
    let mut writer = BedWriter::new(BufWriter::new(file));
    for record in records {
        writer.write_interval(&record)?;
    }
    Ok(())
}
