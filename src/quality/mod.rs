//! Phred+33/Phred+64/Solexa quality-string codec, encoding detection,
//! summary statistics and sliding-window trimming (spec §4.B).
//!
//! See also <https://www.ncbi.nlm.nih.gov/pmc/articles/PMC2847217/pdf/gkp1137.pdf>.

use std::cmp::{max, min};

use crate::error::{GenotypeError, QualityError};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum QualityEncoding {
    /// Sanger, Illumina 1.8+: offset 33, scores 0..93.
    Phred33,
    /// Illumina 1.3-1.7: offset 64, scores 0..62.
    Phred64,
    /// Solexa: offset 64, scores -5..62, logarithmic relation to Phred.
    Solexa,
}

impl QualityEncoding {
    fn offset(self) -> i32 {
        match self {
            QualityEncoding::Phred33 => 33,
            QualityEncoding::Phred64 | QualityEncoding::Solexa => 64,
        }
    }
}

/// A detection result together with a confidence flag callers can act on
/// (§4.B: "Warnings must be emitted for ambiguous detections").
#[derive(Debug, Clone, Copy)]
pub struct DetectionResult {
    pub encoding: QualityEncoding,
    pub confident: bool,
}

/// Scans the min/max ASCII code of `qual` and guesses the encoding
/// following the ranges from spec §4.B.
pub fn detect_encoding(qual: &[u8]) -> Option<DetectionResult> {
    if qual.is_empty() {
        return None;
    }
    let min_b = *qual.iter().min().unwrap();
    let max_b = *qual.iter().max().unwrap();

    // Solexa's distinguishing range (';' .. '?') only occurs in Solexa or
    // very early Illumina 1.3 data; treat it as confident Solexa evidence.
    if (59..=63).contains(&min_b) {
        return Some(DetectionResult {
            encoding: QualityEncoding::Solexa,
            confident: true,
        });
    }
    if min_b >= 64 && max_b <= 104 {
        return Some(DetectionResult {
            encoding: QualityEncoding::Phred64,
            confident: true,
        });
    }
    if (33..=73).contains(&min_b) && max_b <= 126 {
        // Overlapping range: still works as Phred+33, but not confidently
        // distinguishable from other encodings if max_b is high.
        let confident = max_b <= 73;
        return Some(DetectionResult {
            encoding: QualityEncoding::Phred33,
            confident,
        });
    }
    // Ambiguous: default to Phred+33 with a low-confidence warning, as the
    // spec mandates a default rather than a hard failure.
    Some(DetectionResult {
        encoding: QualityEncoding::Phred33,
        confident: false,
    })
}

/// Converts a quality string to raw Phred scores (i8, since Solexa scores
/// may be negative).
pub fn to_phred_scores(qual: &[u8], encoding: QualityEncoding) -> Result<Vec<i32>, GenotypeError> {
    qual.iter()
        .map(|&q| quality_byte_to_phred(q, encoding))
        .collect()
}

fn quality_byte_to_phred(q: u8, encoding: QualityEncoding) -> Result<i32, GenotypeError> {
    let offset = encoding.offset();
    let raw = q as i32 - offset;
    match encoding {
        QualityEncoding::Phred33 => {
            if !(0..=93).contains(&raw) {
                return Err(out_of_range(q, encoding));
            }
            Ok(raw)
        }
        QualityEncoding::Phred64 => {
            if !(0..=62).contains(&raw) {
                return Err(out_of_range(q, encoding));
            }
            Ok(raw)
        }
        QualityEncoding::Solexa => {
            if !(-5..=62).contains(&raw) {
                return Err(out_of_range(q, encoding));
            }
            Ok(solexa_to_phred(raw))
        }
    }
}

fn out_of_range(q: u8, encoding: QualityEncoding) -> GenotypeError {
    GenotypeError::quality(
        format!(
            "quality byte {} (ASCII '{}') is out of range for {:?}",
            q, q as char, encoding
        ),
        None,
    )
}

/// `P = 10*log10(10^(S/10) + 1)`, per spec §4.B.
fn solexa_to_phred(s: i32) -> i32 {
    (10.0 * ((10f64.powf(s as f64 / 10.0) + 1.0).log10())).round() as i32
}

fn phred_to_solexa(p: i32) -> i32 {
    if p == 0 {
        return -5;
    }
    let s = (10.0 * (10f64.powf(p as f64 / 10.0) - 1.0).log10()).round() as i32;
    min(62, max(-5, s))
}

/// Encodes raw Phred scores back into ASCII quality bytes for `encoding`.
pub fn from_phred_scores(scores: &[i32], encoding: QualityEncoding) -> Result<Vec<u8>, GenotypeError> {
    scores
        .iter()
        .map(|&p| {
            let (value, max_score) = match encoding {
                QualityEncoding::Phred33 => (p, 93),
                QualityEncoding::Phred64 => (p, 62),
                QualityEncoding::Solexa => (phred_to_solexa(p), 62),
            };
            if value < encoding.min_raw() || value > max_score {
                return Err(GenotypeError::quality(
                    format!("Phred score {} cannot be represented in {:?}", p, encoding),
                    None,
                ));
            }
            Ok((value + encoding.offset()) as u8)
        })
        .collect()
}

impl QualityEncoding {
    fn min_raw(self) -> i32 {
        match self {
            QualityEncoding::Solexa => -5,
            _ => 0,
        }
    }
}

/// Converts a quality string directly from one encoding to another.
pub fn convert(qual: &[u8], from: QualityEncoding, to: QualityEncoding) -> Result<Vec<u8>, GenotypeError> {
    if from == to {
        return Ok(qual.to_vec());
    }
    let scores = to_phred_scores(qual, from)?;
    from_phred_scores(&scores, to)
}

/// Summary statistics over a numeric Phred-score vector (spec §4.B).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityStats {
    pub mean: f64,
    pub median: f64,
    pub min: i32,
    pub max: i32,
    pub q25: f64,
    pub q75: f64,
    /// Fraction of bases with score >= 20.
    pub q20_fraction: f64,
    /// Fraction of bases with score >= 30.
    pub q30_fraction: f64,
}

pub fn stats(scores: &[i32]) -> Result<QualityStats, GenotypeError> {
    if scores.is_empty() {
        return Err(GenotypeError::quality("cannot compute stats of an empty quality vector", None));
    }
    let mut sorted = scores.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    let sum: i64 = sorted.iter().map(|&s| s as i64).sum();
    let mean = sum as f64 / n as f64;
    let median = percentile(&sorted, 0.5);
    let q25 = percentile(&sorted, 0.25);
    let q75 = percentile(&sorted, 0.75);
    let q20 = sorted.iter().filter(|&&s| s >= 20).count() as f64 / n as f64;
    let q30 = sorted.iter().filter(|&&s| s >= 30).count() as f64 / n as f64;
    Ok(QualityStats {
        mean,
        median,
        min: sorted[0],
        max: sorted[n - 1],
        q25,
        q75,
        q20_fraction: q20,
        q30_fraction: q30,
    })
}

/// Interpolated percentile over an already-sorted slice (linear
/// interpolation between the two bracketing ranks, as used for the median
/// of an even-length vector).
fn percentile(sorted: &[i32], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0] as f64;
    }
    let rank = p * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower] as f64
    } else {
        let frac = rank - lower as f64;
        sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
    }
}

/// Scans `q` in non-overlapping chunks of `window` scores starting at 0 and
/// returns the start offset of the first chunk whose average meets
/// `threshold`; if no chunk qualifies, returns `q.len()` (trimming
/// everything). A partial chunk at the end (shorter than `window`) is never
/// considered good.
pub fn trim_start(q: &[i32], threshold: f64, window: usize) -> usize {
    if window == 0 || q.len() < window {
        return q.len();
    }
    let mut i = 0;
    while i + window <= q.len() {
        let sum: i64 = q[i..i + window].iter().map(|&s| s as i64).sum();
        if sum as f64 / window as f64 >= threshold {
            return i;
        }
        i += window;
    }
    q.len()
}

/// Symmetric right-to-left scan: returns the exclusive end index beyond
/// which the sequence should be trimmed.
pub fn trim_end(q: &[i32], threshold: f64, window: usize) -> usize {
    if window == 0 || q.len() < window {
        return 0;
    }
    let rev: Vec<i32> = q.iter().rev().copied().collect();
    let from_end = trim_start(&rev, threshold, window);
    q.len() - from_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use QualityEncoding::*;

    #[test]
    fn detects_phred33() {
        let d = detect_encoding(b"!!!IIIII").unwrap();
        assert_eq!(d.encoding, Phred33);
    }

    #[test]
    fn detects_phred64() {
        let d = detect_encoding(b"hhhh").unwrap();
        assert_eq!(d.encoding, Phred64);
    }

    #[test]
    fn detects_solexa() {
        let d = detect_encoding(b";<=").unwrap();
        assert_eq!(d.encoding, Solexa);
    }

    #[test]
    fn roundtrip_phred33_scores() {
        let qual = b"!'+5?IIIII";
        let scores = to_phred_scores(qual, Phred33).unwrap();
        let back = from_phred_scores(&scores, Phred33).unwrap();
        assert_eq!(back, qual);
    }

    #[test]
    fn convert_phred33_to_phred64() {
        let out = convert(b"!", Phred33, Phred64).unwrap();
        assert_eq!(out, b"@");
    }

    #[test]
    fn stats_on_simple_vector() {
        let s = stats(&[10, 20, 30, 40]).unwrap();
        assert_eq!(s.min, 10);
        assert_eq!(s.max, 40);
        assert!((s.mean - 25.0).abs() < 1e-9);
        assert!((s.median - 25.0).abs() < 1e-9);
    }

    #[test]
    fn stats_empty_is_error() {
        assert!(stats(&[]).is_err());
    }

    #[test]
    fn trim_start_finds_first_good_window() {
        // '!' = Q0, 'I' = Q40; the [0..4) chunk averages 10, the [4..8) chunk
        // averages 40, so the first qualifying chunk starts at 4.
        let scores = to_phred_scores(b"!!!IIIII", Phred33).unwrap();
        let i = trim_start(&scores, 20.0, 4);
        assert_eq!(i, 4);
    }

    #[test]
    fn trim_end_scans_from_the_right() {
        let scores = to_phred_scores(b"IIIII!!!", Phred33).unwrap();
        let end = trim_end(&scores, 20.0, 4);
        assert_eq!(end, 4);
    }

    #[test]
    fn solexa_roundtrips_for_moderate_scores() {
        for q in 12..62 {
            let s = phred_to_solexa(q);
            assert_eq!(solexa_to_phred(s), q);
        }
    }
}
