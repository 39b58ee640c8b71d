//! End-to-end SAM header/alignment parsing and writing scenarios.

use seqflow::cancel::CancellationToken;
use seqflow::diagnostics::ErrorPolicy;
use seqflow::formats::sam::{self, SamAlignment, SamFlag, SamTagValue, SamWriter};
use seqflow::formats::ReaderOptions;
use seqflow::pipeline::SeqOps;

fn sample() -> &'static str {
    "@HD\tVN:1.6\tSO:coordinate\n\
     @SQ\tSN:chr1\tLN:248956422\n\
     @SQ\tSN:chr2\tLN:242193529\n\
     read1\t99\tchr1\t100\t60\t4M\t=\t200\t104\tACGT\tIIII\tNM:i:0\tAS:i:4\n\
     read2\t4\tchr1\t0\t0\t*\t*\t0\t0\t*\t*\n"
}

#[test]
fn header_sequences_are_collected_in_order() {
    let parser = sam::parse_stream(sample().as_bytes(), ReaderOptions::default()).unwrap();
    assert_eq!(parser.header.sequences.len(), 2);
    assert_eq!(parser.header.sequences[0].name, "chr1");
    assert_eq!(parser.header.sequences[1].length, 242193529);
    assert_eq!(parser.header.lines.len(), 3);
}

#[test]
fn first_alignment_decodes_paired_proper_flags() {
    let parser = sam::parse_stream(sample().as_bytes(), ReaderOptions::default()).unwrap();
    let records: Vec<SamAlignment> = parser.collect::<Result<_, _>>().unwrap();
    assert_eq!(records.len(), 2);

    let r1 = &records[0];
    assert_eq!(r1.qname, "read1");
    assert!(r1.flag.is_paired());
    assert!(r1.flag.is_proper_pair());
    assert!(r1.flag.is_first_in_pair());
    assert!(!r1.flag.is_unmapped());
    assert_eq!(r1.pos, 100);
    assert_eq!(r1.tags.len(), 2);
    assert_eq!(r1.tags[1].tag, *b"AS");
    assert_eq!(r1.tags[1].value, SamTagValue::Int(4));
}

#[test]
fn unmapped_record_has_star_seq_and_qual() {
    let parser = sam::parse_stream(sample().as_bytes(), ReaderOptions::default()).unwrap();
    let records: Vec<SamAlignment> = parser.collect::<Result<_, _>>().unwrap();
    let r2 = &records[1];
    assert!(r2.flag.is_unmapped());
    assert!(r2.seq.is_none());
    assert!(r2.qual.is_none());
}

#[test]
fn invalid_cigar_is_rejected() {
    let bad = "@HD\tVN:1.6\nread1\t0\tchr1\t1\t60\t4Q\t*\t0\t0\tACGT\tIIII\n";
    let parser = sam::parse_stream(bad.as_bytes(), ReaderOptions::default()).unwrap();
    let records: Vec<_> = parser.collect();
    assert!(records[0].is_err());
}

#[test]
fn header_and_alignments_roundtrip_through_a_writer() {
    let parser = sam::parse_stream(sample().as_bytes(), ReaderOptions::default()).unwrap();
    let header = parser.header.clone();
    let records: Vec<SamAlignment> = parser.collect::<Result<_, _>>().unwrap();

    let mut buf = Vec::new();
    {
        let mut writer = SamWriter::new(&mut buf);
        writer.write_header(&header).unwrap();
        for rec in &records {
            writer.write_alignment(rec).unwrap();
        }
    }
    let out = String::from_utf8(buf).unwrap();
    assert!(out.starts_with("@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chr1\tLN:248956422\n"));
    assert!(out.contains("read1\t99\tchr1\t100\t60\t4M\t=\t200\t104\tACGT\tIIII\tNM:i:0\tAS:i:4\n"));
    assert!(out.contains("read2\t4\tchr1\t0\t0\t*\t*\t0\t0\t*\t*\n"));
}

#[test]
fn seqops_write_sam_round_trips_through_a_file() {
    let parser = sam::parse_stream(sample().as_bytes(), ReaderOptions::default()).unwrap();
    let header = parser.header.clone();
    let ops: SeqOps<SamAlignment> = SeqOps::new(parser, CancellationToken::new(), ErrorPolicy::Throw);

    let path = std::env::temp_dir().join(format!("seqflow_write_sam_test_{}.sam", std::process::id()));
    let n = ops.write_sam(&path, &header).unwrap();
    assert_eq!(n, 2);

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("@HD\tVN:1.6\tSO:coordinate\n"));
    assert!(written.contains("read1\t99\tchr1\t100\t60\t4M\t=\t200\t104\tACGT\tIIII\tNM:i:0\tAS:i:4\n"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn flag_constant_combination_decodes_all_set_bits() {
    let flag = SamFlag(SamFlag::PAIRED | SamFlag::MATE_UNMAPPED | SamFlag::SECOND_IN_PAIR);
    assert!(flag.is_paired());
    assert!(flag.is_mate_unmapped());
    assert!(flag.is_second_in_pair());
    assert!(!flag.is_duplicate());
}
