//! End-to-end FASTA parse -> pipeline -> write scenarios.

use seqflow::cancel::CancellationToken;
use seqflow::diagnostics::ErrorPolicy;
use seqflow::formats::fasta::{self, FastaWriter};
use seqflow::formats::ReaderOptions;
use seqflow::pipeline::{GrepOptions, SubseqOptions, SubseqRegion, ValidateAction, ValidateMode, ValidateOptions};
use seqflow::pipeline::SeqOps;
use seqflow::seq::pattern::Strand;

fn ops(input: &'static str) -> SeqOps<seqflow::formats::fasta::FastaRecord> {
    let parser = fasta::parse_string(input, ReaderOptions::default());
    SeqOps::new(parser, CancellationToken::new(), ErrorPolicy::Throw)
}

#[test]
fn reverse_complement_of_a_palindrome_is_itself() {
    // AGCT is its own reverse complement.
    let out = ops(">p\nAGCT\n").reverse_complement().collect().unwrap();
    assert_eq!(out[0].sequence, b"AGCT");
}

#[test]
fn validate_sequence_fixes_non_iupac_characters() {
    let out = ops(">s\nACxGT\n")
        .validate_sequence(ValidateOptions {
            mode: ValidateMode::Normal,
            action: ValidateAction::Fix,
            fix_char: b'N',
        })
        .collect()
        .unwrap();
    assert_eq!(out[0].sequence, b"ACNGT");
}

#[test]
fn validate_sequence_drops_invalid_records_by_default() {
    let out = ops(">a\nACxGT\n>b\nACGT\n").validate_sequence(ValidateOptions::default()).collect().unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "b");
}

#[test]
fn subseq_then_write_roundtrips_through_a_buffer() {
    let records = ops(">a\nACGTACGTACGT\n")
        .subseq(SubseqOptions {
            regions: vec![SubseqRegion { start: 0, end: 4, strand: Strand::Forward }],
            ..Default::default()
        })
        .collect()
        .unwrap();
    let mut buf = Vec::new();
    {
        let mut writer = FastaWriter::new(&mut buf, None);
        for rec in &records {
            writer.write_record(rec).unwrap();
        }
    }
    assert_eq!(buf, b">a\nACGT\n");
}

#[test]
fn multi_record_file_stats_match_manual_counts() {
    let stats = ops(">a\nACGT\n>b\nGGGGCCCC\n>c\nTTTT\n").stats().unwrap();
    assert_eq!(stats.count, 3);
    assert_eq!(stats.total_length, 16);
    assert_eq!(stats.min_length, 4);
    assert_eq!(stats.max_length, 8);
}

#[test]
fn grep_then_head_composes_across_stages() {
    let out = ops(">a\nACGTACGT\n>b\nTTTTTTTT\n>c\nACGTTTTT\n")
        .grep(GrepOptions::sequence(b"ACGT".to_vec()))
        .head(1)
        .collect()
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "a");
}
