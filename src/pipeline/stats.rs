//! Streaming summary statistics over a sequence stream (spec §4.F `stats`
//! terminal stage): length distribution, N50-family metrics, GC% and
//! quality-score aggregates, all computed in a single pass.

use crate::quality::QualityEncoding;
use crate::seq;

/// Accumulates counts and a length list in one pass; N50/N90/L50 need the
/// full sorted length list, so it is kept rather than discarded (bounded
/// by record count, not sequence size, since only `usize` lengths are kept).
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    count: u64,
    total_length: u64,
    min_length: Option<usize>,
    max_length: Option<usize>,
    lengths: Vec<usize>,
    gc_weighted_sum: f64,
    gc_countable_bases: f64,
    gap_bases: u64,
    composition: std::collections::BTreeMap<u8, u64>,
    q20_bases: u64,
    q30_bases: u64,
    quality_bases: u64,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sequence(&mut self, seq_bytes: &[u8]) {
        self.count += 1;
        let len = seq_bytes.len();
        self.total_length += len as u64;
        self.min_length = Some(self.min_length.map_or(len, |m| m.min(len)));
        self.max_length = Some(self.max_length.map_or(len, |m| m.max(len)));
        self.lengths.push(len);

        if let Some(gc) = seq::gc_content(seq_bytes) {
            // gc_content returns a percentage over countable bases; recover
            // the weighted sum/denominator to combine correctly across records.
            let countable = seq_bytes.iter().filter(|&&b| b != b'-' && b != b'.').count() as f64;
            self.gc_weighted_sum += gc / 100.0 * countable;
            self.gc_countable_bases += countable;
        }
        self.gap_bases += seq_bytes.iter().filter(|&&b| b == b'-' || b == b'.').count() as u64;
        for (base, count) in seq::composition(seq_bytes) {
            *self.composition.entry(base).or_insert(0) += count as u64;
        }
    }

    pub fn add_quality(&mut self, qual_bytes: &[u8], encoding: QualityEncoding) {
        let Ok(scores) = crate::quality::to_phred_scores(qual_bytes, encoding) else {
            return;
        };
        for score in scores {
            self.quality_bases += 1;
            if score >= 20 {
                self.q20_bases += 1;
            }
            if score >= 30 {
                self.q30_bases += 1;
            }
        }
    }

    pub fn finish(mut self) -> SeqStats {
        self.lengths.sort_unstable();
        let n50_family = n_metrics(&self.lengths, self.total_length);
        let avg_length = if self.count == 0 {
            0.0
        } else {
            self.total_length as f64 / self.count as f64
        };
        SeqStats {
            count: self.count,
            total_length: self.total_length,
            min_length: self.min_length.unwrap_or(0),
            max_length: self.max_length.unwrap_or(0),
            avg_length,
            n50: n50_family.n50,
            n90: n50_family.n90,
            l50: n50_family.l50,
            gc_percent: if self.gc_countable_bases > 0.0 {
                Some(100.0 * self.gc_weighted_sum / self.gc_countable_bases)
            } else {
                None
            },
            gap_percent: if self.total_length > 0 {
                100.0 * self.gap_bases as f64 / self.total_length as f64
            } else {
                0.0
            },
            composition: self.composition,
            q20_percent: if self.quality_bases > 0 {
                Some(100.0 * self.q20_bases as f64 / self.quality_bases as f64)
            } else {
                None
            },
            q30_percent: if self.quality_bases > 0 {
                Some(100.0 * self.q30_bases as f64 / self.quality_bases as f64)
            } else {
                None
            },
        }
    }
}

struct NMetrics {
    n50: usize,
    n90: usize,
    l50: usize,
}

/// `lengths` must be sorted ascending. N50 (resp. N90) is the length L
/// such that the sequences of length >= L cover at least 50% (90%) of the
/// total length, taken from the largest sequences down; L50 is how many
/// sequences were needed to reach the N50 threshold.
fn n_metrics(lengths: &[usize], total_length: u64) -> NMetrics {
    if lengths.is_empty() || total_length == 0 {
        return NMetrics { n50: 0, n90: 0, l50: 0 };
    }
    let target_50 = (total_length as f64 * 0.5).ceil() as u64;
    let target_90 = (total_length as f64 * 0.9).ceil() as u64;
    let mut running = 0u64;
    let mut n50 = 0;
    let mut n90 = 0;
    let mut l50 = 0;
    let mut reached_50 = false;
    for (i, &len) in lengths.iter().rev().enumerate() {
        running += len as u64;
        if !reached_50 && running >= target_50 {
            n50 = len;
            l50 = i + 1;
            reached_50 = true;
        }
        if running >= target_90 {
            n90 = len;
            break;
        }
    }
    NMetrics { n50, n90, l50 }
}

/// The final, immutable report produced by [`StatsAccumulator::finish`]
/// (spec §4.F "stats produces length, N50-family, GC% and quality
/// aggregates in one pass").
#[derive(Debug, Clone, PartialEq)]
pub struct SeqStats {
    pub count: u64,
    pub total_length: u64,
    pub min_length: usize,
    pub max_length: usize,
    pub avg_length: f64,
    pub n50: usize,
    pub n90: usize,
    pub l50: usize,
    pub gc_percent: Option<f64>,
    pub gap_percent: f64,
    pub composition: std::collections::BTreeMap<u8, u64>,
    pub q20_percent: Option<f64>,
    pub q30_percent: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_length_stats() {
        let mut acc = StatsAccumulator::new();
        acc.add_sequence(b"ACGT");
        acc.add_sequence(b"ACGTACGT");
        let stats = acc.finish();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_length, 12);
        assert_eq!(stats.min_length, 4);
        assert_eq!(stats.max_length, 8);
        assert_eq!(stats.avg_length, 6.0);
    }

    #[test]
    fn n50_of_uniform_lengths_is_that_length() {
        let mut acc = StatsAccumulator::new();
        for _ in 0..10 {
            acc.add_sequence(b"AAAA");
        }
        let stats = acc.finish();
        assert_eq!(stats.n50, 4);
    }

    #[test]
    fn n50_weights_toward_longer_sequences() {
        let mut acc = StatsAccumulator::new();
        acc.add_sequence(&vec![b'A'; 100]);
        acc.add_sequence(&vec![b'A'; 1]);
        acc.add_sequence(&vec![b'A'; 1]);
        let stats = acc.finish();
        assert_eq!(stats.n50, 100);
        assert_eq!(stats.l50, 1);
    }

    #[test]
    fn gc_percent_aggregates_across_records() {
        let mut acc = StatsAccumulator::new();
        acc.add_sequence(b"GGGG");
        acc.add_sequence(b"AAAA");
        let stats = acc.finish();
        assert_eq!(stats.gc_percent, Some(50.0));
    }

    #[test]
    fn quality_percentages_from_phred33() {
        let mut acc = StatsAccumulator::new();
        acc.add_sequence(b"ACGT");
        acc.add_quality(b"!!II", QualityEncoding::Phred33);
        let stats = acc.finish();
        assert_eq!(stats.q20_percent, Some(50.0));
    }

    #[test]
    fn empty_accumulator_has_no_gc_or_quality() {
        let stats = StatsAccumulator::new().finish();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.gc_percent, None);
        assert_eq!(stats.q20_percent, None);
    }
}
