//! Minimal GTF/GFF2 feature parsing, used only to resolve `subseq`'s
//! `gtf_features` region source. Unlike the other format modules this
//! isn't a first-class streaming reader/writer pair -- it exists purely
//! as a region source, so only the columns `subseq` needs (`seqname`,
//! `start`, `end`, `strand`) are parsed.

use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::compression::open_file;
use crate::error::GenotypeError;

use super::bed::Strand;

/// A single GTF/GFF2 record's coordinates, 1-based inclusive on read
/// (converted to 0-based half-open by the caller, matching BED).
#[derive(Debug, Clone, PartialEq)]
pub struct GtfFeature {
    pub seqname: String,
    pub feature: String,
    pub start: u64,
    pub end: u64,
    pub strand: Option<Strand>,
}

fn parse_line(line: &str, line_no: u64) -> Result<Option<GtfFeature>, GenotypeError> {
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 8 {
        return Err(GenotypeError::parse(
            format!("GTF line has {} fields, expected at least 8", fields.len()),
            Some(line_no),
        ));
    }
    let start = fields[3]
        .parse::<u64>()
        .map_err(|_| GenotypeError::parse(format!("invalid GTF start '{}'", fields[3]), Some(line_no)))?;
    let end = fields[4]
        .parse::<u64>()
        .map_err(|_| GenotypeError::parse(format!("invalid GTF end '{}'", fields[4]), Some(line_no)))?;
    let strand = match fields[6] {
        "+" => Some(Strand::Forward),
        "-" => Some(Strand::Reverse),
        _ => Some(Strand::Unknown),
    };
    Ok(Some(GtfFeature {
        seqname: fields[0].to_string(),
        feature: fields[2].to_string(),
        start,
        end,
        strand,
    }))
}

fn parse_reader(reader: impl BufRead) -> Result<Vec<GtfFeature>, GenotypeError> {
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(feature) = parse_line(&line, i as u64 + 1)? {
            out.push(feature);
        }
    }
    Ok(out)
}

pub fn parse_string(s: &str) -> Result<Vec<GtfFeature>, GenotypeError> {
    parse_reader(BufReader::new(s.as_bytes()))
}

pub fn parse_file(path: &Path) -> Result<Vec<GtfFeature>, GenotypeError> {
    let (reader, _) = open_file(path)?;
    parse_reader(BufReader::new(reader))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_gtf_line() {
        let input = "chr1\tsource\tgene\t101\t200\t.\t+\t.\tgene_id \"g1\"\n";
        let features = parse_string(input).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].seqname, "chr1");
        assert_eq!(features[0].start, 101);
        assert_eq!(features[0].end, 200);
        assert_eq!(features[0].strand, Some(Strand::Forward));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let input = "# header\n\nchr1\tsrc\texon\t1\t10\t.\t-\t.\tgene_id \"g\"\n";
        let features = parse_string(input).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].strand, Some(Strand::Reverse));
    }
}
