//! End-to-end FASTQ quality-aware pipeline scenarios.

use seqflow::cancel::CancellationToken;
use seqflow::diagnostics::ErrorPolicy;
use seqflow::formats::fastq::{self, QualityEncodingTag};
use seqflow::formats::ReaderOptions;
use seqflow::pipeline::SeqOps;
use seqflow::quality::QualityEncoding;

fn ops(input: &'static str) -> SeqOps<seqflow::formats::fastq::FastqRecord> {
    let parser = fastq::parse_string(input, ReaderOptions::default());
    SeqOps::new(parser, CancellationToken::new(), ErrorPolicy::Throw)
}

#[test]
fn quality_trim_and_mean_filter_compose() {
    // Low quality at both ends, high quality in the middle.
    let out = ops("@r1\nNNNNACGTNNNN\n+\n!!!!IIII!!!!\n")
        .quality_trim(20.0, 2)
        .filter_mean_quality(20.0)
        .collect()
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].sequence, b"ACGT");
}

#[test]
fn filter_mean_quality_drops_only_the_low_quality_record() {
    let out = ops("@good\nACGT\n+\nIIII\n@bad\nACGT\n+\n!!!!\n").filter_mean_quality(20.0).collect().unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "good");
}

#[test]
fn convert_quality_changes_encoding_and_bytes() {
    let out = ops("@r1\nACGT\n+\n!'+5\n").convert_quality(QualityEncoding::Phred64).collect().unwrap();
    assert_eq!(out[0].quality_encoding, QualityEncodingTag::Phred64);
    // Phred64 re-encodes the same scores (0,6,10,20) with a '@' offset.
    assert_eq!(out[0].quality, b"@FJT");
}

#[test]
fn write_fastq_round_trips_through_a_file() {
    let path = std::env::temp_dir().join(format!("seqflow_write_fastq_test_{}.fastq", std::process::id()));
    let n = ops("@r1\nACGT\n+\nIIII\n").write_fastq(&path).unwrap();
    assert_eq!(n, 1);
    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, b"@r1\nACGT\n+\nIIII\n");
    let _ = std::fs::remove_file(&path);
}
