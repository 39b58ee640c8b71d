//! IUPAC ambiguity alphabet and the complement table it induces (spec
//! §4.C, GLOSSARY "IUPAC code").

/// Complement of a single IUPAC base, case-preserving. `bio::alphabets::dna`
/// already maps the full IUPAC ambiguity alphabet (`A,C,G,T,R,Y,S,W,K,M,B,
/// D,H,V,N`, both cases) to its complement and passes unrecognized bytes
/// through unchanged; `U` (RNA uracil) isn't in that table, so it's handled
/// here before falling through, complementing to `A` per spec §4.C
/// ("U -> A (RNA)").
pub fn complement_base(b: u8) -> u8 {
    match b {
        b'U' => b'A',
        b'u' => b'a',
        other => bio::alphabets::dna::complement(other),
    }
}

/// Returns true iff every byte in `seq` is a valid IUPAC nucleotide code
/// (case-insensitive), ignoring gap characters `-`/`.`.
pub fn is_iupac(seq: &[u8]) -> bool {
    seq.iter().all(|&b| {
        matches!(
            b.to_ascii_uppercase(),
            b'A' | b'C' | b'G' | b'T' | b'U' | b'R' | b'Y' | b'S' | b'W' | b'K' | b'M' | b'B'
                | b'V' | b'D' | b'H' | b'N' | b'-' | b'.'
        )
    })
}

/// Reverses and complements a sequence in one pass, preserving case.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement_base(b)).collect()
}

/// Strict reverse complement: fails on any non-IUPAC byte instead of
/// passing it through unchanged (spec §4.C "strict mode").
pub fn reverse_complement_strict(seq: &[u8]) -> Result<Vec<u8>, crate::error::GenotypeError> {
    if let Some(&bad) = seq.iter().find(|&&b| !is_iupac(&[b])) {
        return Err(crate::error::GenotypeError::sequence(
            format!("non-IUPAC character '{}' encountered in strict mode", bad as char),
            None,
        ));
    }
    Ok(reverse_complement(seq))
}

pub fn complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| complement_base(b)).collect()
}

pub fn to_rna(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .map(|&b| match b {
            b'T' => b'U',
            b't' => b'u',
            other => other,
        })
        .collect()
}

pub fn to_dna(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .map(|&b| match b {
            b'U' => b'T',
            b'u' => b't',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complements_standard_bases() {
        assert_eq!(complement_base(b'A'), b'T');
        assert_eq!(complement_base(b'G'), b'C');
        assert_eq!(complement_base(b'a'), b't');
    }

    #[test]
    fn complements_ambiguity_codes() {
        assert_eq!(complement_base(b'R'), b'Y');
        assert_eq!(complement_base(b'S'), b'S');
        assert_eq!(complement_base(b'K'), b'M');
        assert_eq!(complement_base(b'N'), b'N');
    }

    #[test]
    fn reverse_complement_is_an_involution() {
        let seq = b"ACGTRYSWKMBDHVN";
        let rc = reverse_complement(seq);
        let rc2 = reverse_complement(&rc);
        assert_eq!(rc2, seq);
    }

    #[test]
    fn reverse_complement_of_palindrome() {
        assert_eq!(reverse_complement(b"AACCGGTT"), b"AACCGGTT");
    }

    #[test]
    fn strict_mode_rejects_non_iupac() {
        assert!(reverse_complement_strict(b"ACGTX").is_err());
        assert!(reverse_complement_strict(b"ACGT").is_ok());
    }

    #[test]
    fn rna_dna_roundtrip() {
        let dna = b"ACGT";
        let rna = to_rna(dna);
        assert_eq!(rna, b"ACGU");
        assert_eq!(to_dna(&rna), dna);
    }
}
