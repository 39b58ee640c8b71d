//! Pattern matching over sequences: exact, IUPAC-ambiguous, fuzzy
//! (bounded mismatches) and palindrome finding (spec §4.C).

use std::collections::HashMap;

use bio::pattern_matching::myers::{BitVec, Myers, MyersBuilder};

use super::iupac::reverse_complement;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Strand {
    Forward,
    Reverse,
}

/// A single pattern occurrence, carrying enough context to build a
/// `MotifLocation` record (spec §4.F `locate` stage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub start: usize,
    pub end: usize,
    pub strand: Strand,
    pub mismatches: u8,
}

/// Exact substring search using the classic bad-character Boyer-Moore-Horspool
/// skip table -- O(n/m) average case, the algorithm spec §4.C names for
/// literal patterns.
pub fn find_exact(text: &[u8], pattern: &[u8]) -> Vec<usize> {
    if pattern.is_empty() || pattern.len() > text.len() {
        return Vec::new();
    }
    let m = pattern.len();
    let mut skip = [m; 256];
    for (i, &b) in pattern[..m - 1].iter().enumerate() {
        skip[b as usize] = m - 1 - i;
    }
    let mut matches = Vec::new();
    let mut i = 0;
    while i + m <= text.len() {
        let mut j = m;
        while j > 0 && text[i + j - 1] == pattern[j - 1] {
            j -= 1;
        }
        if j == 0 {
            matches.push(i);
            i += 1;
        } else {
            let last = text[i + m - 1];
            i += skip[last as usize].max(1);
        }
    }
    matches
}

/// Knuth-Morris-Pratt search, suited to streaming text one chunk at a
/// time (spec §4.C "KMP for streaming"); here exposed in its single-pass
/// form over a fully buffered record, which is how every call site in the
/// pipeline uses it (records are bounded by the largest single record, not
/// the file).
pub fn find_kmp(text: &[u8], pattern: &[u8]) -> Vec<usize> {
    if pattern.is_empty() || pattern.len() > text.len() {
        return Vec::new();
    }
    let m = pattern.len();
    let mut lps = vec![0usize; m];
    let mut len = 0;
    let mut i = 1;
    while i < m {
        if pattern[i] == pattern[len] {
            len += 1;
            lps[i] = len;
            i += 1;
        } else if len != 0 {
            len = lps[len - 1];
        } else {
            lps[i] = 0;
            i += 1;
        }
    }
    let mut matches = Vec::new();
    let mut i = 0;
    let mut j = 0;
    while i < text.len() {
        if text[i] == pattern[j] {
            i += 1;
            j += 1;
            if j == m {
                matches.push(i - j);
                j = lps[j - 1];
            }
        } else if j != 0 {
            j = lps[j - 1];
        } else {
            i += 1;
        }
    }
    matches
}

/// Rabin-Karp rolling-hash search for multiple patterns of equal length in
/// one pass over `text` (spec §4.C "Rabin-Karp for multiple patterns").
pub fn find_rabin_karp_multi(text: &[u8], patterns: &[&[u8]]) -> HashMap<usize, Vec<usize>> {
    let mut results: HashMap<usize, Vec<usize>> = HashMap::new();
    let Some(&first) = patterns.first() else {
        return results;
    };
    let m = first.len();
    if m == 0 || m > text.len() || patterns.iter().any(|p| p.len() != m) {
        return results;
    }
    const BASE: u64 = 257;
    const MODULUS: u64 = 1_000_000_007;
    let high_order = (0..m - 1).fold(1u64, |acc, _| (acc * BASE) % MODULUS);

    let hash_of = |bytes: &[u8]| -> u64 {
        bytes.iter().fold(0u64, |acc, &b| (acc * BASE + b as u64) % MODULUS)
    };
    let pattern_hashes: Vec<u64> = patterns.iter().map(|p| hash_of(p)).collect();

    let mut window_hash = hash_of(&text[0..m]);
    let mut pos = 0;
    loop {
        for (pi, &ph) in pattern_hashes.iter().enumerate() {
            if ph == window_hash && &text[pos..pos + m] == patterns[pi] {
                results.entry(pi).or_default().push(pos);
            }
        }
        if pos + m >= text.len() {
            break;
        }
        window_hash = (window_hash + MODULUS - (text[pos] as u64 * high_order) % MODULUS) % MODULUS;
        window_hash = (window_hash * BASE + text[pos + m] as u64) % MODULUS;
        pos += 1;
    }
    results
}

/// Builds a Myers bit-parallel matcher that treats IUPAC ambiguity codes
/// in `pattern` as matching all of their expansions, per spec §4.C
/// "bit-parallel for IUPAC-aware". `max_dist` bounds the edit distance
/// ("bounded dynamic programming for <=k mismatches").
pub fn find_fuzzy_iupac(text: &[u8], pattern: &[u8], max_dist: u8, ambiguous: bool) -> Vec<PatternMatch> {
    let mut builder = MyersBuilder::new();
    if ambiguous {
        for &(code, expansions) in super::translate::IUPAC_MYERS_TABLE {
            builder.ambig(code, expansions);
        }
    }
    let mut myers: Myers<u64> = builder.build(pattern);
    myers
        .find_all(text, max_dist)
        .map(|(start, end, dist)| PatternMatch {
            start,
            end,
            strand: Strand::Forward,
            mismatches: dist,
        })
        .collect()
}

/// Searches both strands, returning matches tagged with the strand they
/// were found on (forward coordinates are kept relative to the original
/// `text` in both cases).
pub fn find_fuzzy_both_strands(text: &[u8], pattern: &[u8], max_dist: u8, ambiguous: bool) -> Vec<PatternMatch> {
    let mut matches = find_fuzzy_iupac(text, pattern, max_dist, ambiguous);
    let rc_pattern = reverse_complement(pattern);
    let rev_matches = find_fuzzy_iupac(text, &rc_pattern, max_dist, ambiguous);
    matches.extend(rev_matches.into_iter().map(|m| PatternMatch {
        strand: Strand::Reverse,
        ..m
    }));
    matches
}

/// Drops overlapping matches from a sorted-by-start match list, keeping
/// only the first (leftmost) of each overlapping group -- used when
/// `allowOverlaps` is false on the `locate` stage.
pub fn remove_overlaps(mut matches: Vec<PatternMatch>) -> Vec<PatternMatch> {
    matches.sort_by_key(|m| m.start);
    let mut out: Vec<PatternMatch> = Vec::with_capacity(matches.len());
    for m in matches.drain(..) {
        if out.last().map(|last| m.start >= last.end).unwrap_or(true) {
            out.push(m);
        }
    }
    out
}

/// A found palindrome: reverse-complementary window in `seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palindrome {
    pub start: usize,
    pub length: usize,
}

/// Slides an even-length window `w` in `[min_width, max_width]` over `seq`
/// and reports every position where the window equals its own reverse
/// complement (spec §4.C "Palindromes found by sliding a window of even
/// length w").
pub fn find_palindromes(seq: &[u8], min_width: usize, max_width: usize) -> Vec<Palindrome> {
    let min_width = min_width.max(4) / 2 * 2;
    let max_width = max_width.min(20);
    let mut out = Vec::new();
    let mut w = min_width;
    while w <= max_width {
        if w > seq.len() {
            break;
        }
        for start in 0..=(seq.len() - w) {
            let window = &seq[start..start + w];
            if window == reverse_complement(window).as_slice() {
                out.push(Palindrome { start, length: w });
            }
        }
        w += 2;
    }
    out
}
