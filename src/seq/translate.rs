//! Codon translation using the NCBI genetic code tables (spec §4.C).
//!
//! Codons are indexed 0..64 in the conventional NCBI ordering (first base
//! varies slowest, bases ordered T,C,A,G): index = b1*16 + b2*4 + b3.
//! Each alternative genetic code is expressed as a small set of
//! differences against the standard code (table 1), matching how NCBI
//! itself documents them (https://www.ncbi.nlm.nih.gov/Taxonomy/Utils/wprintgc.cgi).

use std::collections::HashMap;

use crate::error::GenotypeError;

const BASES: [u8; 4] = [b'T', b'C', b'A', b'G'];

/// Standard (table 1) amino acid for each of the 64 codons, in TCAG order.
const STANDARD: &[u8; 64] = b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

fn base_index(b: u8) -> Option<usize> {
    BASES.iter().position(|&x| x == b.to_ascii_uppercase())
}

/// Codon -> table-1 index, handling the unambiguous 4^3 codons only;
/// ambiguous codons are resolved by the caller via [`expand_ambiguous`].
fn codon_index(codon: [u8; 3]) -> Option<usize> {
    let a = base_index(codon[0])?;
    let b = base_index(codon[1])?;
    let c = base_index(codon[2])?;
    Some(a * 16 + b * 4 + c)
}

/// Differences from the standard code, as `(codon_index, amino_acid)`
/// pairs. An empty diff set (genetic code 11) is bit-identical to the
/// standard code -- it differs from it only in allowed start codons.
fn diffs_for_code(code: u8) -> Option<&'static [(usize, u8)]> {
    // codon indices referenced below (TCAG ordering):
    // TTA=2 TCA=6 TAA=10 TAG=11 TGA=14  CTT=16 CTC=17 CTA=18 CTG=19
    // ATA=34 AAA=42 AGA=46 AGG=47
    Some(match code {
        1 => &[],
        2 => &[(14, b'W'), (46, b'*'), (47, b'*'), (34, b'M')],
        3 => &[
            (14, b'W'),
            (34, b'M'),
            (16, b'T'),
            (17, b'T'),
            (18, b'T'),
            (19, b'T'),
        ],
        4 => &[(14, b'W')],
        5 => &[(14, b'W'), (34, b'M'), (46, b'S'), (47, b'S')],
        6 => &[(10, b'Q'), (11, b'Q')],
        9 => &[(14, b'W'), (42, b'N'), (46, b'S'), (47, b'S')],
        10 => &[(14, b'C')],
        11 => &[],
        12 => &[(19, b'S')],
        13 => &[(14, b'W'), (34, b'M'), (46, b'G'), (47, b'G')],
        14 => &[(14, b'W'), (42, b'N'), (46, b'S'), (47, b'S'), (10, b'Y')],
        15 => &[(11, b'Q')],
        16 => &[(11, b'L')],
        21 => &[(14, b'W'), (34, b'M'), (42, b'N'), (46, b'S'), (47, b'S')],
        22 => &[(6, b'*'), (11, b'L')],
        23 => &[(2, b'*'), (14, b'W')],
        24 => &[(14, b'W'), (46, b'S'), (47, b'K')],
        25 => &[(14, b'G')],
        26 => &[(19, b'A')],
        27 => &[(10, b'Q'), (11, b'Q')],
        28 => &[(10, b'Q'), (11, b'Q'), (14, b'W')],
        29 => &[(10, b'Y'), (11, b'Y')],
        30 => &[(10, b'E'), (11, b'E')],
        31 => &[(10, b'E'), (11, b'E'), (14, b'W')],
        33 => &[(14, b'W'), (46, b'S'), (47, b'K')],
        _ => return None,
    })
}

/// A single genetic code table, resolved once and cached for repeated
/// codon lookups.
#[derive(Debug, Clone)]
pub struct GeneticCode {
    table: [u8; 64],
    id: u8,
}

impl GeneticCode {
    pub fn new(id: u8) -> Result<Self, GenotypeError> {
        let diffs = diffs_for_code(id)
            .ok_or_else(|| GenotypeError::validation(format!("unknown NCBI genetic code {}", id)))?;
        let mut table = *STANDARD;
        for &(idx, aa) in diffs {
            table[idx] = aa;
        }
        Ok(Self { id, table })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Translates a single unambiguous codon; returns `None` for anything
    /// containing a non-ACGT/U base (ambiguous codons are handled by
    /// [`translate_codon`]).
    fn translate_unambiguous(&self, codon: [u8; 3]) -> Option<u8> {
        codon_index(codon).map(|i| self.table[i])
    }

    /// True if `codon` (translated) is a stop codon in this table.
    pub fn is_stop(&self, codon: [u8; 3]) -> bool {
        self.translate_unambiguous(codon) == Some(b'*')
    }

    /// True if `codon` is among this table's alternative start codons
    /// (spec §4.C "alternative-start set {CTG,TTG,GTG}"), or the universal
    /// ATG start.
    pub fn is_start(&self, codon: [u8; 3], allow_alternative: bool) -> bool {
        let upper = [
            codon[0].to_ascii_uppercase(),
            codon[1].to_ascii_uppercase(),
            codon[2].to_ascii_uppercase(),
        ];
        if upper == *b"ATG" {
            return true;
        }
        allow_alternative && matches!(&upper, b"CTG" | b"TTG" | b"GTG")
    }
}

const IUPAC_EXPANSIONS: &[(u8, &[u8])] = &[
    (b'R', &[b'A', b'G']),
    (b'Y', &[b'C', b'T']),
    (b'S', &[b'G', b'C']),
    (b'W', &[b'A', b'T']),
    (b'K', &[b'G', b'T']),
    (b'M', &[b'A', b'C']),
    (b'B', &[b'C', b'G', b'T']),
    (b'D', &[b'A', b'G', b'T']),
    (b'H', &[b'A', b'C', b'T']),
    (b'V', &[b'A', b'C', b'G']),
    (b'N', &[b'A', b'C', b'G', b'T']),
];

/// IUPAC ambiguity -> expansion table in the shape `MyersBuilder::ambig`
/// expects, reused by the fuzzy/IUPAC-aware pattern matcher.
pub const IUPAC_MYERS_TABLE: &[(u8, &[u8])] = IUPAC_EXPANSIONS;

fn expand_base(b: u8) -> Vec<u8> {
    let upper = b.to_ascii_uppercase();
    for &(code, variants) in IUPAC_EXPANSIONS {
        if code == upper {
            return variants.to_vec();
        }
    }
    vec![upper]
}

/// Translates a single codon, resolving ambiguous IUPAC bases by cartesian
/// expansion: if every expansion yields the same amino acid, that amino
/// acid is returned; otherwise `unknown_char` (spec §4.C).
pub fn translate_codon(code: &GeneticCode, codon: &[u8], unknown_char: u8) -> u8 {
    if codon.len() != 3 {
        return unknown_char;
    }
    if let Some(aa) = code.translate_unambiguous([codon[0], codon[1], codon[2]]) {
        return aa;
    }
    let expansions_0 = expand_base(codon[0]);
    let expansions_1 = expand_base(codon[1]);
    let expansions_2 = expand_base(codon[2]);
    let mut result: Option<u8> = None;
    for &b0 in &expansions_0 {
        for &b1 in &expansions_1 {
            for &b2 in &expansions_2 {
                let aa = match code.translate_unambiguous([b0, b1, b2]) {
                    Some(aa) => aa,
                    None => return unknown_char,
                };
                match result {
                    None => result = Some(aa),
                    Some(prev) if prev == aa => {}
                    Some(_) => return unknown_char,
                }
            }
        }
    }
    result.unwrap_or(unknown_char)
}

#[derive(Debug, Clone, Copy)]
pub struct TranslateOptions {
    pub convert_start_codons: bool,
    pub trim_at_first_stop: bool,
    pub remove_stop_codons: bool,
    pub allow_alternative_starts: bool,
    pub stop_codon_char: u8,
    pub unknown_codon_char: u8,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            convert_start_codons: false,
            trim_at_first_stop: false,
            remove_stop_codons: false,
            allow_alternative_starts: false,
            stop_codon_char: b'*',
            unknown_codon_char: b'X',
        }
    }
}

/// Translates `seq` (a single reading frame, already sliced to start at
/// the frame offset) into protein using `code` and `opts`.
pub fn translate(seq: &[u8], code: &GeneticCode, opts: &TranslateOptions) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len() / 3 + 1);
    for (i, codon) in seq.chunks(3).enumerate() {
        if codon.len() < 3 {
            break;
        }
        let mut aa = translate_codon(code, codon, opts.unknown_codon_char);
        if aa == b'*' {
            if opts.trim_at_first_stop {
                break;
            }
            if opts.remove_stop_codons {
                continue;
            }
            aa = opts.stop_codon_char;
        } else if i == 0 && opts.convert_start_codons {
            let c = [codon[0], codon[1], codon[2]];
            if code.is_start(c, opts.allow_alternative_starts) {
                aa = b'M';
            }
        }
        out.push(aa);
    }
    out
}

/// Six reading frames: +1,+2,+3 on the forward strand, -1,-2,-3 on the
/// reverse complement (offsets 0,1,2 of each).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Frame {
    Fwd1,
    Fwd2,
    Fwd3,
    Rev1,
    Rev2,
    Rev3,
}

impl Frame {
    pub fn label(self) -> &'static str {
        match self {
            Frame::Fwd1 => "+1",
            Frame::Fwd2 => "+2",
            Frame::Fwd3 => "+3",
            Frame::Rev1 => "-1",
            Frame::Rev2 => "-2",
            Frame::Rev3 => "-3",
        }
    }
}

/// Slices `seq` to the reading frame `frame`, reverse-complementing first
/// when needed.
pub fn frame_sequence(seq: &[u8], frame: Frame) -> Vec<u8> {
    match frame {
        Frame::Fwd1 => seq[0.min(seq.len())..].to_vec(),
        Frame::Fwd2 => seq[1.min(seq.len())..].to_vec(),
        Frame::Fwd3 => seq[2.min(seq.len())..].to_vec(),
        Frame::Rev1 => super::reverse_complement(seq),
        Frame::Rev2 => {
            let rc = super::reverse_complement(seq);
            rc[1.min(rc.len())..].to_vec()
        }
        Frame::Rev3 => {
            let rc = super::reverse_complement(seq);
            rc[2.min(rc.len())..].to_vec()
        }
    }
}

/// A single open reading frame, start/end given in nucleotide coordinates
/// of the original (forward-strand) sequence.
#[derive(Debug, Clone)]
pub struct Orf {
    pub start: usize,
    pub end: usize,
    pub frame: Frame,
    pub protein: Vec<u8>,
}

/// Finds all ORFs (start codon .. first in-frame stop) at least
/// `min_length` amino acids long, in the given frame.
pub fn find_orfs(seq: &[u8], frame: Frame, code: &GeneticCode, min_length: usize, allow_alt_start: bool) -> Vec<Orf> {
    let framed = frame_sequence(seq, frame);
    let mut orfs = Vec::new();
    let mut i = 0;
    while i + 3 <= framed.len() {
        let codon = [framed[i], framed[i + 1], framed[i + 2]];
        if code.is_start(codon, allow_alt_start) {
            let mut protein = vec![b'M'];
            let mut j = i + 3;
            let mut found_stop = false;
            while j + 3 <= framed.len() {
                let c = [framed[j], framed[j + 1], framed[j + 2]];
                if code.is_stop(c) {
                    found_stop = true;
                    break;
                }
                protein.push(translate_codon(code, &framed[j..j + 3], b'X'));
                j += 3;
            }
            if found_stop && protein.len() >= min_length {
                orfs.push(Orf {
                    start: i,
                    end: j + 3,
                    frame,
                    protein,
                });
            }
        }
        i += 3;
    }
    orfs
}

/// Lazily-constructed, cached genetic code tables for repeated lookups
/// across many records sharing the same code.
#[derive(Debug, Default)]
pub struct CodeCache(HashMap<u8, GeneticCode>);

impl CodeCache {
    pub fn get(&mut self, id: u8) -> Result<&GeneticCode, GenotypeError> {
        if !self.0.contains_key(&id) {
            self.0.insert(id, GeneticCode::new(id)?);
        }
        Ok(self.0.get(&id).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_code_translates_atg_gcc() {
        let code = GeneticCode::new(1).unwrap();
        let opts = TranslateOptions::default();
        assert_eq!(translate(b"ATGGCC", &code, &opts), b"MA");
    }

    #[test]
    fn standard_code_stop_codons() {
        let code = GeneticCode::new(1).unwrap();
        assert!(code.is_stop(*b"TAA"));
        assert!(code.is_stop(*b"TAG"));
        assert!(code.is_stop(*b"TGA"));
        assert!(!code.is_stop(*b"ATG"));
    }

    #[test]
    fn vertebrate_mito_reassigns_tga_to_trp() {
        let code = GeneticCode::new(2).unwrap();
        assert!(!code.is_stop(*b"TGA"));
        assert_eq!(translate_codon(&code, b"TGA", b'X'), b'W');
    }

    #[test]
    fn bacterial_code_11_matches_standard() {
        let standard = GeneticCode::new(1).unwrap();
        let bacterial = GeneticCode::new(11).unwrap();
        assert_eq!(standard.table, bacterial.table);
    }

    #[test]
    fn ambiguous_codon_resolves_when_synonymous() {
        let code = GeneticCode::new(1).unwrap();
        // CTN all encode Leu regardless of N
        assert_eq!(translate_codon(&code, b"CTN", b'X'), b'L');
    }

    #[test]
    fn ambiguous_codon_is_x_when_not_synonymous() {
        let code = GeneticCode::new(1).unwrap();
        // ATH = ATT/ATC/ATA -> Ile (all same), ATN includes ATG -> Met: ambiguous
        assert_eq!(translate_codon(&code, b"ATN", b'X'), b'X');
    }

    #[test]
    fn trim_at_first_stop_stops_translation() {
        let code = GeneticCode::new(1).unwrap();
        let opts = TranslateOptions {
            trim_at_first_stop: true,
            ..Default::default()
        };
        assert_eq!(translate(b"ATGTAAGCC", &code, &opts), b"M");
    }

    #[test]
    fn remove_stop_codons_skips_them() {
        let code = GeneticCode::new(1).unwrap();
        let opts = TranslateOptions {
            remove_stop_codons: true,
            ..Default::default()
        };
        assert_eq!(translate(b"ATGTAAGCC", &code, &opts), b"MA");
    }

    #[test]
    fn six_frame_translation_lengths() {
        let seq = b"ATGGCCTAG";
        for frame in [
            Frame::Fwd1,
            Frame::Fwd2,
            Frame::Fwd3,
            Frame::Rev1,
            Frame::Rev2,
            Frame::Rev3,
        ] {
            let framed = frame_sequence(seq, frame);
            assert!(framed.len() <= seq.len());
        }
    }

    #[test]
    fn unknown_genetic_code_errors() {
        assert!(GeneticCode::new(7).is_err());
        assert!(GeneticCode::new(100).is_err());
    }

    #[test]
    fn orf_detection_finds_start_to_stop() {
        let code = GeneticCode::new(1).unwrap();
        let orfs = find_orfs(b"CCCATGGCCGCCTAACCC", Frame::Fwd1, &code, 1, false);
        assert_eq!(orfs.len(), 1);
        assert_eq!(orfs[0].protein, b"MAA");
    }
}
