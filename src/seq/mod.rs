//! Sequence calculus: content ratios, composition, reverse complement,
//! translation and pattern matching (spec §4.C).

pub mod iupac;
pub mod pattern;
pub mod translate;

pub use iupac::{complement, reverse_complement, reverse_complement_strict, to_dna, to_rna};

use std::collections::BTreeMap;

/// GC/AT weighting for a single base, per spec §4.C:
/// - `{G,C,S}` count fully as GC
/// - `{A,T,U,W}` count fully as AT
/// - `{R,Y,K,M}` (two-way ambiguities spanning one GC + one AT base) count
///   as 0.5 GC
/// - `{N,B,D,H,V}` count as 0.5 GC
/// Gaps (`-`, `.`) are excluded from the denominator entirely.
fn gc_weight(b: u8) -> Option<f64> {
    match b.to_ascii_uppercase() {
        b'G' | b'C' | b'S' => Some(1.0),
        b'A' | b'T' | b'U' | b'W' => Some(0.0),
        b'R' | b'Y' | b'K' | b'M' => Some(0.5),
        b'N' | b'B' | b'D' | b'H' | b'V' => Some(0.5),
        _ => None,
    }
}

/// GC content as a percentage (0-100) of the counted bases. Returns `None`
/// if the sequence has no countable bases (e.g. all gaps).
pub fn gc_content(seq: &[u8]) -> Option<f64> {
    let mut total = 0.0;
    let mut gc = 0.0;
    for &b in seq {
        if let Some(w) = gc_weight(b) {
            total += 1.0;
            gc += w;
        }
    }
    if total == 0.0 {
        None
    } else {
        Some(100.0 * gc / total)
    }
}

/// Fraction (0-100) of `seq` made up of any of `bases` (case-insensitive),
/// relative to the full sequence length (gaps and all), for arbitrary
/// user-specified base sets (spec §4.C "arbitrary base sets").
pub fn content_ratio(seq: &[u8], bases: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let upper_set: Vec<u8> = bases.iter().map(|b| b.to_ascii_uppercase()).collect();
    let count = seq
        .iter()
        .filter(|&&b| upper_set.contains(&b.to_ascii_uppercase()))
        .count();
    100.0 * count as f64 / seq.len() as f64
}

/// Base-composition histogram: count of each distinct byte (case folded to
/// uppercase) in the sequence.
pub fn composition(seq: &[u8]) -> BTreeMap<u8, usize> {
    let mut counts = BTreeMap::new();
    for &b in seq {
        *counts.entry(b.to_ascii_uppercase()).or_insert(0) += 1;
    }
    counts
}

/// Fraction (0-100) of gap characters (`-`, `.`) in the sequence.
pub fn gap_fraction(seq: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let gaps = seq.iter().filter(|&&b| b == b'-' || b == b'.').count();
    100.0 * gaps as f64 / seq.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gc_content_of_simple_sequence() {
        // 4 GC / 8 total = 50%
        assert_eq!(gc_content(b"AACCGGTT"), Some(50.0));
    }

    #[test]
    fn gc_content_weighs_ambiguous_codes() {
        // R contributes 0.5, total bases = 2
        let gc = gc_content(b"AR").unwrap();
        assert!((gc - 25.0).abs() < 1e-9);
    }

    #[test]
    fn gc_content_excludes_gaps_from_denominator() {
        assert_eq!(gc_content(b"GC--"), Some(100.0));
    }

    #[test]
    fn gc_content_of_empty_is_none() {
        assert_eq!(gc_content(b""), None);
        assert_eq!(gc_content(b"--"), None);
    }

    #[test]
    fn content_ratio_arbitrary_bases() {
        assert_eq!(content_ratio(b"AAGGCC", b"AG"), 200.0 / 3.0);
    }

    #[test]
    fn composition_counts_bases() {
        let c = composition(b"AAGGc");
        assert_eq!(c[&b'A'], 2);
        assert_eq!(c[&b'G'], 2);
        assert_eq!(c[&b'C'], 1);
    }

    #[test]
    fn gap_fraction_counts_dashes_and_dots() {
        assert_eq!(gap_fraction(b"AC-G."), 40.0);
    }
}
