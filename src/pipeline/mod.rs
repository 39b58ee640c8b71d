//! `SeqOps`: a lazy, composable pipeline over a record stream (spec §4.F).
//! Every combinator consumes `self` and returns a new `SeqOps`, so a
//! pipeline reads top-to-bottom as the sequence of operations applied to
//! each record, and nothing runs until a terminal stage (`collect`,
//! `stats`, `write_*`) pulls records through.

pub mod dedup;
pub mod sample;
pub mod sort;
pub mod stats;

use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::cancel::CancellationToken;
use crate::compression::create_file;
use crate::diagnostics::{Diagnostics, ErrorPolicy};
use crate::error::GenotypeError;
use crate::formats::bed::{self, BedInterval, BedWriter};
use crate::formats::dsv::{DsvDialect, DsvRecord, DsvWriter};
use crate::formats::fasta::{FastaRecord, FastaWriter};
use crate::formats::fastq::{FastqRecord, FastqWriter, QualityEncodingTag};
use crate::formats::gtf::GtfFeature;
use crate::formats::sam::{SamAlignment, SamHeader, SamWriter};
use crate::quality;
use crate::seq;
use crate::seq::pattern::{self, PatternMatch};
use crate::seq::translate::{Frame, GeneticCode, TranslateOptions};

/// Anything `SeqOps` can run sequence-level stages over: a byte sequence
/// identified by an id, optionally carrying quality scores.
pub trait SeqRecord {
    fn record_id(&self) -> &str;
    fn set_record_id(&mut self, id: String);
    fn sequence(&self) -> &[u8];
    fn set_sequence(&mut self, seq: Vec<u8>);
    fn quality_bytes(&self) -> Option<&[u8]>;
}

impl SeqRecord for FastaRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
    fn set_record_id(&mut self, id: String) {
        self.id = id;
    }
    fn sequence(&self) -> &[u8] {
        &self.sequence
    }
    fn set_sequence(&mut self, seq: Vec<u8>) {
        self.sequence = seq;
    }
    fn quality_bytes(&self) -> Option<&[u8]> {
        None
    }
}

impl SeqRecord for FastqRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
    fn set_record_id(&mut self, id: String) {
        self.id = id;
    }
    fn sequence(&self) -> &[u8] {
        &self.sequence
    }
    fn set_sequence(&mut self, seq: Vec<u8>) {
        self.sequence = seq;
    }
    fn quality_bytes(&self) -> Option<&[u8]> {
        Some(&self.quality)
    }
}

impl SeqRecord for SamAlignment {
    fn record_id(&self) -> &str {
        &self.qname
    }
    fn set_record_id(&mut self, id: String) {
        self.qname = id;
    }
    fn sequence(&self) -> &[u8] {
        self.seq.as_deref().unwrap_or(&[])
    }
    fn set_sequence(&mut self, seq: Vec<u8>) {
        self.seq = Some(seq);
    }
    fn quality_bytes(&self) -> Option<&[u8]> {
        self.qual.as_deref()
    }
}

type BoxedIter<T> = Box<dyn Iterator<Item = Result<T, GenotypeError>>>;

/// A lazy pipeline over `T`-typed records. `diagnostics` is shared (via
/// `Rc<RefCell<_>>`) with every stage spawned from this pipeline, since
/// error/warning accounting must survive across `Box<dyn Iterator>`
/// boundaries that ordinary iterator combinators can't close over by
/// mutable reference.
pub struct SeqOps<T> {
    inner: BoxedIter<T>,
    diagnostics: Rc<RefCell<Diagnostics>>,
    cancellation: CancellationToken,
}

impl<T: 'static> SeqOps<T> {
    pub fn new(inner: impl Iterator<Item = Result<T, GenotypeError>> + 'static, cancellation: CancellationToken, policy: ErrorPolicy) -> Self {
        Self {
            inner: Box::new(inner),
            diagnostics: Rc::new(RefCell::new(Diagnostics::new(policy))),
            cancellation,
        }
    }

    /// Consumes `self` in one move (so no field is ever partially moved
    /// out from under a still-live `self`) and hands back its three parts
    /// for a combinator to rebuild around a new `inner`.
    fn into_parts(self) -> (BoxedIter<T>, Rc<RefCell<Diagnostics>>, CancellationToken) {
        (self.inner, self.diagnostics, self.cancellation)
    }

    fn from_parts(inner: BoxedIter<T>, diagnostics: Rc<RefCell<Diagnostics>>, cancellation: CancellationToken) -> Self {
        Self {
            inner,
            diagnostics,
            cancellation,
        }
    }

    /// Drops records for which `pred` returns `false`. Errors already in
    /// the stream pass through untouched (a stage can't judge a record it
    /// failed to parse).
    pub fn filter(self, pred: impl Fn(&T) -> bool + 'static) -> Self {
        let (inner, diagnostics, cancellation) = self.into_parts();
        let inner: BoxedIter<T> = Box::new(inner.filter(move |r| match r {
            Ok(item) => pred(item),
            Err(_) => true,
        }));
        Self::from_parts(inner, diagnostics, cancellation)
    }

    /// Applies `f` to every successfully-parsed record in place.
    pub fn map(self, f: impl Fn(T) -> T + 'static) -> Self {
        let (inner, diagnostics, cancellation) = self.into_parts();
        let inner: BoxedIter<T> = Box::new(inner.map(move |r| r.map(&f)));
        Self::from_parts(inner, diagnostics, cancellation)
    }

    /// Like [`map`](Self::map), but yields zero or more output records per
    /// input (spec §4.F `flatMap`: translate-all-frames, subseq with
    /// multiple regions, locate, split).
    pub fn flat_map<U: 'static>(self, f: impl Fn(T) -> Vec<U> + 'static) -> SeqOps<U> {
        let (inner, diagnostics, cancellation) = self.into_parts();
        let new_inner: BoxedIter<U> = Box::new(inner.flat_map(move |r| -> Vec<Result<U, GenotypeError>> {
            match r {
                Ok(item) => f(item).into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            }
        }));
        SeqOps::from_parts(new_inner, diagnostics, cancellation)
    }

    /// Runs a fallible transform/validator over each record; what happens
    /// to a record whose closure fails is governed by the pipeline's
    /// `ErrorPolicy` (spec §4.F "validate/clean honor the stage's error
    /// policy, not a hardcoded throw").
    pub fn try_map(self, f: impl Fn(T) -> Result<T, GenotypeError> + 'static) -> Self {
        let (inner, diagnostics, cancellation) = self.into_parts();
        let diag_for_closure = diagnostics.clone();
        let new_inner: BoxedIter<T> = Box::new(inner.filter_map(move |r| match r {
            Ok(item) => match f(item) {
                Ok(item) => Some(Ok(item)),
                Err(e) => match diag_for_closure.borrow_mut().handle_error(e) {
                    Ok(()) => None,
                    Err(e) => Some(Err(e)),
                },
            },
            Err(e) => Some(Err(e)),
        }));
        Self::from_parts(new_inner, diagnostics, cancellation)
    }

    /// Alias for [`try_map`](Self::try_map) used for schema/content checks
    /// that don't change the record, only accept or reject it.
    pub fn validate(self, validator: impl Fn(&T) -> Result<(), GenotypeError> + 'static) -> Self {
        self.try_map(move |item| validator(&item).map(|()| item))
    }

    /// Stops pulling once `n` records have been yielded.
    pub fn head(self, n: usize) -> Self {
        let (inner, diagnostics, cancellation) = self.into_parts();
        let inner: BoxedIter<T> = Box::new(inner.take(n));
        Self::from_parts(inner, diagnostics, cancellation)
    }

    /// Reservoir/Bernoulli/systematic/weighted sampling (spec §4.F
    /// `sample`). Reservoir and weighted sampling must see every record
    /// before they can decide what to keep, so those strategies are not
    /// lazy despite the rest of the pipeline being so; they still run in
    /// bounded memory (the reservoir, not the whole stream).
    pub fn sample(self, strategy: sample::SampleStrategy, seed: Option<u64>) -> Result<Self, GenotypeError>
    where
        T: Clone,
    {
        let (inner, diagnostics, cancellation) = self.into_parts();
        let (ok_items, errs): (Vec<T>, Vec<GenotypeError>) = partition_results(inner)?;
        let sampled = match strategy {
            sample::SampleStrategy::Reservoir { size } => sample::reservoir_sample(ok_items.into_iter(), size, seed),
            sample::SampleStrategy::Bernoulli { probability } => sample::bernoulli_sample(ok_items.into_iter(), probability, seed).collect(),
            sample::SampleStrategy::Systematic { interval } => sample::systematic_sample(ok_items.into_iter(), interval).collect(),
            sample::SampleStrategy::Weighted { size } => {
                return Err(GenotypeError::validation(format!(
                    "weighted sampling (size {}) requires a weight function; use sample_weighted instead",
                    size
                )))
            }
        };
        for err in errs {
            diagnostics.borrow_mut().handle_error(err)?;
        }
        Ok(Self::from_parts(Box::new(sampled.into_iter().map(Ok)), diagnostics, cancellation))
    }

    /// Weighted reservoir sampling, taking an explicit per-record weight.
    pub fn sample_weighted(self, size: usize, weight_fn: impl Fn(&T) -> f64, seed: Option<u64>) -> Result<Self, GenotypeError>
    where
        T: Clone,
    {
        let (inner, diagnostics, cancellation) = self.into_parts();
        let (ok_items, errs) = partition_results(inner)?;
        for err in errs {
            diagnostics.borrow_mut().handle_error(err)?;
        }
        let sampled = sample::weighted_sample(ok_items.into_iter(), size, weight_fn, seed);
        Ok(Self::from_parts(Box::new(sampled.into_iter().map(Ok)), diagnostics, cancellation))
    }

    /// Exact dedup keyed by `key_fn`, preserving the first occurrence of
    /// each key and dropping the rest (spec §4.F `rmdup`).
    pub fn rmdup_exact<K: std::hash::Hash + Eq + 'static>(self, key_fn: impl Fn(&T) -> K + 'static) -> Self {
        let (inner, diagnostics, cancellation) = self.into_parts();
        let mut dedup = dedup::ExactDedup::new();
        let new_inner: BoxedIter<T> = Box::new(inner.filter(move |r| match r {
            Ok(item) => dedup.insert(key_fn(item)),
            Err(_) => true,
        }));
        Self::from_parts(new_inner, diagnostics, cancellation)
    }

    /// Approximate dedup via a scalable Bloom filter, trading a bounded
    /// false-positive rate for memory that doesn't grow with distinct-key
    /// count (spec §4.F `rmdup` "bounded-memory alternative").
    pub fn rmdup_approximate(self, key_fn: impl Fn(&T) -> Vec<u8> + 'static, initial_capacity: usize, fp_rate: f64) -> Self {
        let (inner, diagnostics, cancellation) = self.into_parts();
        let mut filter = dedup::ScalableBloomFilter::new(initial_capacity, fp_rate);
        let new_inner: BoxedIter<T> = Box::new(inner.filter(move |r| match r {
            Ok(item) => filter.insert(&key_fn(item)),
            Err(_) => true,
        }));
        Self::from_parts(new_inner, diagnostics, cancellation)
    }

    /// External merge sort by a comparator, spilling to disk once more
    /// than `threshold` records have been buffered (spec §4.F `sort`).
    pub fn sort(
        self,
        threshold: usize,
        compare: fn(&T, &T) -> std::cmp::Ordering,
        encode: fn(&T) -> Vec<u8>,
        decode: fn(&[u8]) -> T,
    ) -> Result<Self, GenotypeError> {
        let (inner, diagnostics, cancellation) = self.into_parts();
        let (ok_items, errs) = partition_results(inner)?;
        for err in errs {
            diagnostics.borrow_mut().handle_error(err)?;
        }
        let sorter = sort::ExternalSort::new(threshold, compare, encode, decode);
        let sorted = sorter.sort(ok_items.into_iter())?;
        Ok(Self::from_parts(sorted, diagnostics, cancellation))
    }

    /// Consumes the pipeline into a `Vec`, propagating the first error
    /// not already absorbed by the configured error policy.
    pub fn collect(self) -> Result<Vec<T>, GenotypeError> {
        let cancellation = self.cancellation;
        let mut out = Vec::new();
        for item in self.inner {
            if cancellation.is_cancelled() {
                break;
            }
            out.push(item?);
        }
        Ok(out)
    }

    pub fn diagnostics(&self) -> std::cell::Ref<Diagnostics> {
        self.diagnostics.borrow()
    }
}

fn partition_results<T>(iter: BoxedIter<T>) -> Result<(Vec<T>, Vec<GenotypeError>), GenotypeError> {
    let mut ok_items = Vec::new();
    let mut errs = Vec::new();
    for r in iter {
        match r {
            Ok(item) => ok_items.push(item),
            Err(e) => errs.push(e),
        }
    }
    Ok((ok_items, errs))
}

/// Options for [`SeqOps::clean`] (spec §4.F `clean`). Gap characters are
/// `{-,.}`; "ambiguous" means anything outside `{A,C,G,T,U}` (case folded).
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    pub remove_gaps: bool,
    pub replace_ambiguous: bool,
    pub replace_char: u8,
    pub trim_whitespace: bool,
}

impl CleanOptions {
    fn effective_replace_char(&self) -> u8 {
        if self.replace_char == 0 {
            b'N'
        } else {
            self.replace_char
        }
    }
}

fn is_unambiguous_base(b: u8) -> bool {
    matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'U')
}

fn is_gap_byte(b: u8) -> bool {
    b == b'-' || b == b'.'
}

/// Validation mode/action for [`SeqOps::validate_sequence`] (spec §4.F
/// `validate`).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ValidateMode {
    Strict,
    Normal,
    Permissive,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ValidateAction {
    Reject,
    Fix,
    Warn,
}

#[derive(Debug, Clone, Copy)]
pub struct ValidateOptions {
    pub mode: ValidateMode,
    pub action: ValidateAction,
    pub fix_char: u8,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            mode: ValidateMode::Normal,
            action: ValidateAction::Reject,
            fix_char: b'N',
        }
    }
}

/// What a `grep` stage matches against (spec §4.F `grep`).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GrepTarget {
    Id,
    Description,
    Sequence,
}

#[derive(Debug, Clone)]
pub struct GrepOptions {
    pub pattern: Vec<u8>,
    pub target: GrepTarget,
    pub ignore_case: bool,
}

impl GrepOptions {
    pub fn sequence(pattern: Vec<u8>) -> Self {
        Self {
            pattern,
            target: GrepTarget::Sequence,
            ignore_case: false,
        }
    }
}

/// Length/GC bounds for [`SeqOps::filter_by`] (spec §4.F `filter`); `None`
/// leaves that bound unconstrained.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterBounds {
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub min_gc: Option<f64>,
    pub max_gc: Option<f64>,
}

impl<T: SeqRecord + 'static> SeqOps<T> {
    /// Masks or drops non-IUPAC characters, trims gaps/whitespace, and
    /// replaces ambiguous bases, per the structured option set named in
    /// spec §4.F `clean`.
    pub fn clean(self, opts: CleanOptions) -> Self {
        let replace_char = opts.effective_replace_char();
        self.map(move |mut item| {
            let mut seq: Vec<u8> = item.sequence().to_vec();
            if opts.trim_whitespace {
                seq.retain(|b| !b.is_ascii_whitespace());
            }
            if opts.remove_gaps {
                seq.retain(|&b| !is_gap_byte(b));
            }
            if opts.replace_ambiguous {
                for b in seq.iter_mut() {
                    if !is_unambiguous_base(*b) && !is_gap_byte(*b) {
                        *b = replace_char;
                    }
                }
            }
            item.set_sequence(seq);
            item
        })
    }

    /// Keeps, drops, or fixes records against the IUPAC alphabet depending
    /// on `mode`/`action` (spec §4.F `validate`). `warn` never drops a
    /// record; it only pushes a diagnostics warning.
    pub fn validate_sequence(self, opts: ValidateOptions) -> Self {
        let mode = opts.mode;
        let action = opts.action;
        let fix_char = opts.fix_char;
        let diagnostics = self.diagnostics.clone();
        self.try_map(move |mut item| {
            let invalid_positions: Vec<usize> = item
                .sequence()
                .iter()
                .enumerate()
                .filter(|&(_, &b)| match mode {
                    ValidateMode::Permissive => false,
                    ValidateMode::Normal => !seq::iupac::is_iupac(&[b]),
                    ValidateMode::Strict => !is_unambiguous_base(b) && !is_gap_byte(b),
                })
                .map(|(i, _)| i)
                .collect();
            if invalid_positions.is_empty() {
                return Ok(item);
            }
            match action {
                ValidateAction::Reject => Err(GenotypeError::sequence(
                    format!("record '{}' has {} invalid character(s)", item.record_id(), invalid_positions.len()),
                    None,
                )),
                ValidateAction::Fix => {
                    let mut seq = item.sequence().to_vec();
                    for pos in invalid_positions {
                        seq[pos] = fix_char;
                    }
                    item.set_sequence(seq);
                    Ok(item)
                }
                ValidateAction::Warn => {
                    diagnostics.borrow_mut().push_warning(
                        format!("record '{}' has {} invalid character(s)", item.record_id(), invalid_positions.len()),
                        None,
                    );
                    Ok(item)
                }
            }
        })
    }

    /// Keeps only records matching `opts.pattern` as a literal substring
    /// against the chosen `target` (spec §4.F `grep`, literal-pattern
    /// form). `target: Sequence` uses exact Boyer-Moore-Horspool matching;
    /// `Id`/`Description` fold case by default when `ignore_case` is set.
    pub fn grep(self, opts: GrepOptions) -> Self {
        let GrepOptions { pattern, target, ignore_case } = opts;
        self.filter(move |item| match target {
            GrepTarget::Sequence => !pattern::find_exact(item.sequence(), &pattern).is_empty(),
            GrepTarget::Id | GrepTarget::Description => {
                let haystack = item.record_id().as_bytes();
                if ignore_case {
                    let needle = pattern.to_ascii_lowercase();
                    let hay = haystack.to_ascii_lowercase();
                    !pattern::find_exact(&hay, &needle).is_empty()
                } else {
                    !pattern::find_exact(haystack, &pattern).is_empty()
                }
            }
        })
    }

    /// Keeps only records whose sequence matches `pattern` as a regular
    /// expression (spec §4.F `grep`, regex variant), compiled against raw
    /// bytes so it runs directly over sequence data without a UTF-8 check.
    #[cfg(feature = "regex-fast")]
    pub fn grep_regex(self, pattern: &str) -> Result<Self, GenotypeError> {
        let re = regex::bytes::Regex::new(pattern).map_err(|e| GenotypeError::validation(format!("invalid grep pattern '{}': {}", pattern, e)))?;
        Ok(self.filter(move |item| re.is_match(item.sequence())))
    }

    /// Keeps records satisfying every supplied bound in `bounds`,
    /// AND-ed together, evaluated after an optional `predicate` (spec §4.F
    /// `filter`).
    pub fn filter_by<F: Fn(&T) -> bool + 'static>(self, bounds: FilterBounds, predicate: Option<F>) -> Self {
        let ops = self.filter(move |item| {
            let len = item.sequence().len();
            if let Some(min) = bounds.min_len {
                if len < min {
                    return false;
                }
            }
            if let Some(max) = bounds.max_len {
                if len > max {
                    return false;
                }
            }
            if bounds.min_gc.is_some() || bounds.max_gc.is_some() {
                let gc = seq::gc_content(item.sequence()).unwrap_or(0.0);
                if let Some(min) = bounds.min_gc {
                    if gc < min {
                        return false;
                    }
                }
                if let Some(max) = bounds.max_gc {
                    if gc > max {
                        return false;
                    }
                }
            }
            true
        });
        match predicate {
            Some(p) => ops.filter(p),
            None => ops,
        }
    }

    /// Finds every occurrence of `opts.pattern` in each record's
    /// sequence, honoring mismatch tolerance, strand, overlap and
    /// match-count caps, and output shape (spec §4.F `locate`). Unlike the
    /// rest of `SeqOps`, this is a terminal stage: the match coordinates
    /// are tied to records, not further records.
    pub fn locate(self, opts: LocateOptions) -> Result<LocateResult<T>, GenotypeError> {
        let mut hits = Vec::new();
        for item in self.collect()? {
            let mut matches = if opts.search_both_strands {
                pattern::find_fuzzy_both_strands(item.sequence(), &opts.pattern, opts.allow_mismatches, opts.ambiguous)
            } else {
                pattern::find_fuzzy_iupac(item.sequence(), &opts.pattern, opts.allow_mismatches, opts.ambiguous)
            };
            if !opts.allow_overlaps {
                matches = pattern::remove_overlaps(matches);
            }
            if let Some(max) = opts.max_matches {
                matches.truncate(max);
            }
            hits.push((item, matches));
        }
        Ok(match opts.output_format {
            LocateOutputFormat::Default => LocateResult::Records(hits),
            LocateOutputFormat::Bed => {
                let intervals = hits
                    .iter()
                    .flat_map(|(item, matches)| {
                        matches.iter().map(move |m| BedInterval {
                            chrom: item.record_id().to_string(),
                            chrom_start: m.start as u64,
                            chrom_end: m.end as u64,
                            name: Some(item.record_id().to_string()),
                            score: Some(m.mismatches as f64),
                            strand: Some(match m.strand {
                                pattern::Strand::Forward => bed::Strand::Forward,
                                pattern::Strand::Reverse => bed::Strand::Reverse,
                            }),
                            thick_start: None,
                            thick_end: None,
                            item_rgb: None,
                            block_count: None,
                            block_sizes: None,
                            block_starts: None,
                            extra_fields: Vec::new(),
                            variant: bed::BedVariant::Bed6,
                            line_number: None,
                        })
                    })
                    .collect();
                LocateResult::Bed(intervals)
            }
        })
    }

    /// Replaces each record's sequence with the region(s) named by `opts`
    /// (spec §4.F `subseq`). A region string is `"start:end"` (0-based by
    /// default, 1-based when `one_based`), with negative indices counting
    /// from the end (`-1` = last); `circular` lets `start > end` wrap
    /// around; `:-`/`:+ ` suffixes on a region string select the reverse
    /// complement strand. Multiple regions yield one record per region
    /// unless `concatenate`.
    pub fn subseq(self, opts: SubseqOptions) -> Self
    where
        T: Clone,
    {
        let regions = opts.regions.clone();
        let circular = opts.circular;
        if regions.is_empty() {
            return self;
        }
        if opts.concatenate || regions.len() == 1 {
            self.map(move |mut item| {
                let seq = item.sequence();
                let pieces: Vec<u8> = regions.iter().flat_map(|r| r.extract(seq, circular)).collect();
                item.set_sequence(pieces);
                item
            })
        } else {
            self.flat_map(move |item| {
                regions
                    .iter()
                    .map(|region| {
                        let mut out = item.clone();
                        let sliced = region.extract(item.sequence(), circular);
                        out.set_sequence(sliced);
                        out
                    })
                    .collect()
            })
        }
    }

    /// `subseq` variant sourcing its regions from BED intervals whose
    /// `chrom` matches a record's id (spec §4.F `subseq` `bedRegions`).
    /// Records with no matching interval are dropped.
    pub fn subseq_by_bed(self, regions: Vec<BedInterval>, flank: FlankOptions) -> Self
    where
        T: Clone,
    {
        self.flat_map(move |item| {
            regions
                .iter()
                .filter(|r| r.chrom == item.record_id())
                .map(|r| {
                    let strand = match r.strand {
                        Some(bed::Strand::Reverse) => pattern::Strand::Reverse,
                        _ => pattern::Strand::Forward,
                    };
                    let region = resolve_external_region(r.chrom_start as i64, r.chrom_end as i64, strand, &flank);
                    let mut out = item.clone();
                    out.set_sequence(region.extract(item.sequence(), false));
                    out
                })
                .collect()
        })
    }

    /// `subseq` variant sourcing its regions from GTF features whose
    /// `seqname` matches a record's id (spec §4.F `subseq` `gtfFeatures`).
    pub fn subseq_by_gtf(self, features: Vec<GtfFeature>, flank: FlankOptions) -> Self
    where
        T: Clone,
    {
        self.flat_map(move |item| {
            features
                .iter()
                .filter(|f| f.seqname == item.record_id())
                .map(|f| {
                    let strand = match f.strand {
                        Some(bed::Strand::Reverse) => pattern::Strand::Reverse,
                        _ => pattern::Strand::Forward,
                    };
                    // GTF coordinates are 1-based inclusive; convert to 0-based half-open.
                    let region = resolve_external_region(f.start as i64 - 1, f.end as i64, strand, &flank);
                    let mut out = item.clone();
                    out.set_sequence(region.extract(item.sequence(), false));
                    out
                })
                .collect()
        })
    }

    /// In-place reverse complement (spec §4.C/§4.F).
    pub fn reverse_complement(self) -> Self {
        self.map(|mut item| {
            let rc = seq::reverse_complement(item.sequence());
            item.set_sequence(rc);
            item
        })
    }

    /// Translates each record's sequence using NCBI genetic code
    /// `table_id` in a single reading frame.
    /// For translating multiple frames or extracting ORFs in one pass,
    /// see [`translate_frames`](Self::translate_frames).
    pub fn translate(self, table_id: u8, frame: Frame) -> Self {
        self.try_map(move |mut item| {
            let code = GeneticCode::new(table_id)?;
            let framed = seq::translate::frame_sequence(item.sequence(), frame);
            let opts = TranslateOptions::default();
            let protein = seq::translate::translate(&framed, &code, &opts);
            item.set_sequence(protein);
            Ok(item)
        })
    }

    /// Translates each record in every frame named by `opts` (spec §4.F
    /// `translate`, `frames`/`allFrames`/`orfsOnly` forms), yielding one
    /// output record per translated frame (or per qualifying ORF when
    /// `orfs_only`) -- see spec §8 scenario 6.
    pub fn translate_frames(self, table_id: u8, opts: TranslateFramesOptions) -> Result<SeqOps<T>, GenotypeError>
    where
        T: Clone,
    {
        let code = GeneticCode::new(table_id)?;
        let frames = if opts.all_frames {
            vec![Frame::Fwd1, Frame::Fwd2, Frame::Fwd3, Frame::Rev1, Frame::Rev2, Frame::Rev3]
        } else {
            opts.frames.clone()
        };
        let orfs_only = opts.orfs_only;
        let min_orf_length = opts.min_orf_length;
        let allow_alt = opts.allow_alternative_starts;
        let include_frame_in_id = opts.include_frame_in_id;
        let translate_opts = opts.options;
        Ok(self.flat_map(move |item| {
            let mut out = Vec::new();
            for &frame in &frames {
                if orfs_only {
                    for orf in seq::translate::find_orfs(item.sequence(), frame, &code, min_orf_length, allow_alt) {
                        let mut rec = item.clone();
                        rec.set_sequence(orf.protein);
                        if include_frame_in_id {
                            rec.set_record_id(format!("{}_frame_{}", item.record_id(), frame.label()));
                        }
                        out.push(rec);
                    }
                } else {
                    let framed = seq::translate::frame_sequence(item.sequence(), frame);
                    let protein = seq::translate::translate(&framed, &code, &translate_opts);
                    let mut rec = item.clone();
                    rec.set_sequence(protein);
                    if include_frame_in_id {
                        rec.set_record_id(format!("{}_frame_{}", item.record_id(), frame.label()));
                    }
                    out.push(rec);
                }
            }
            out
        }))
    }

    /// Streams every record through a [`stats::StatsAccumulator`] and
    /// returns the finished report -- the canonical terminal stage for
    /// summarizing a dataset without materializing it (spec §4.F `stats`).
    pub fn stats(self) -> Result<stats::SeqStats, GenotypeError> {
        let mut acc = stats::StatsAccumulator::new();
        for item in self.collect()? {
            acc.add_sequence(item.sequence());
            if let Some(q) = item.quality_bytes() {
                if let Some(d) = quality::detect_encoding(q) {
                    acc.add_quality(q, d.encoding);
                }
            }
        }
        Ok(acc.finish())
    }

    /// Splits records into multiple output files (spec §4.F `split`, a
    /// terminal stage). `write_one` serializes a single record into the
    /// format this pipeline carries; callers normally reach this through
    /// a format-specific wrapper (see `impl SeqOps<FastaRecord>::split`)
    /// rather than calling it directly.
    pub fn split_with(self, opts: SplitOptions, mut write_one: impl FnMut(&mut dyn Write, &T) -> Result<(), GenotypeError>) -> Result<SplitSummary, GenotypeError>
    where
        T: Clone,
    {
        std::fs::create_dir_all(&opts.output_dir)?;
        let prefix = opts.file_prefix.clone().unwrap_or_else(|| "part".to_string());
        let ext = opts.file_extension.clone().unwrap_or_else(|| "fasta".to_string());
        let output_dir = opts.output_dir.clone();
        let mode = opts.mode.clone();

        let records = self.collect()?;
        let mut files = Vec::new();
        let mut sequences_per_file = Vec::new();

        let mut write_chunk = |index: usize, chunk: &[T]| -> Result<(), GenotypeError> {
            if chunk.is_empty() {
                return Ok(());
            }
            let path = output_dir.join(format!("{}_{}.{}", prefix, index, ext));
            let mut writer = create_file(&path)?;
            for rec in chunk {
                write_one(writer.as_mut(), rec)?;
            }
            files.push(path.display().to_string());
            sequences_per_file.push(chunk.len() as u64);
            Ok(())
        };

        match mode {
            SplitMode::BySize(n) => {
                for (i, chunk) in records.chunks(n.max(1)).enumerate() {
                    write_chunk(i, chunk)?;
                }
            }
            SplitMode::ByLength(max_bases) => {
                let mut index = 0;
                let mut current: Vec<T> = Vec::new();
                let mut current_len = 0usize;
                for rec in &records {
                    let len = rec.sequence().len();
                    if current_len + len > max_bases && !current.is_empty() {
                        write_chunk(index, &current)?;
                        index += 1;
                        current = Vec::new();
                        current_len = 0;
                    }
                    current_len += len;
                    current.push(rec.clone());
                }
                write_chunk(index, &current)?;
            }
            SplitMode::ByParts(k) => {
                let k = k.max(1);
                let per = (records.len() + k - 1) / k;
                for (i, chunk) in records.chunks(per.max(1)).enumerate() {
                    write_chunk(i, chunk)?;
                }
            }
            SplitMode::ById(pattern) => {
                #[cfg(feature = "regex-fast")]
                {
                    let re = regex::Regex::new(&pattern).map_err(|e| GenotypeError::validation(format!("invalid split id pattern '{}': {}", pattern, e)))?;
                    let mut groups: std::collections::BTreeMap<String, Vec<T>> = std::collections::BTreeMap::new();
                    for rec in records {
                        let key = re
                            .captures(rec.record_id())
                            .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
                            .unwrap_or_else(|| "unmatched".to_string());
                        groups.entry(key).or_default().push(rec);
                    }
                    for (i, (_, chunk)) in groups.into_iter().enumerate() {
                        write_chunk(i, &chunk)?;
                    }
                }
                #[cfg(not(feature = "regex-fast"))]
                {
                    let _ = pattern;
                    return Err(GenotypeError::validation("split by-id requires the `regex-fast` feature"));
                }
            }
            SplitMode::ByRegion(labels) => {
                let mut groups: Vec<Vec<T>> = vec![Vec::new(); labels.len() + 1];
                for rec in records {
                    let idx = labels.iter().position(|l| rec.record_id().contains(l.as_str())).unwrap_or(labels.len());
                    groups[idx].push(rec);
                }
                for (i, chunk) in groups.iter().enumerate() {
                    write_chunk(i, chunk)?;
                }
            }
        }

        let total_sequences = sequences_per_file.iter().sum();
        Ok(SplitSummary {
            files,
            total_sequences,
            sequences_per_file,
        })
    }
}

/// Strand-aware, 0-based-by-default region over a sequence, as produced
/// by parsing a `"start:end"` (optionally `:-`/`:+`-suffixed) region
/// string (spec §4.F `subseq`).
#[derive(Debug, Clone, Copy)]
pub struct SubseqRegion {
    pub start: i64,
    pub end: i64,
    pub strand: pattern::Strand,
}

impl SubseqRegion {
    /// Parses a region string of the form `"start:end"`, `"start:end:+"`
    /// or `"start:end:-"`.
    pub fn parse(s: &str) -> Result<Self, GenotypeError> {
        let invalid = || GenotypeError::validation(format!("invalid subseq region '{}': expected 'start:end'", s));
        let mut parts = s.split(':');
        let start_str = parts.next().ok_or_else(invalid)?;
        let end_str = parts.next().ok_or_else(invalid)?;
        let strand = match parts.next() {
            Some("-") => pattern::Strand::Reverse,
            Some("+") | None => pattern::Strand::Forward,
            Some(_) => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        let start = start_str.parse::<i64>().map_err(|_| invalid())?;
        let end = end_str.parse::<i64>().map_err(|_| invalid())?;
        Ok(Self { start, end, strand })
    }

    /// Resolves negative/relative indices against `len` and slices `seq`,
    /// wrapping around the end when `circular` and `start > end`.
    fn extract(&self, seq: &[u8], circular: bool) -> Vec<u8> {
        let len = seq.len() as i64;
        let resolve = |v: i64, is_end: bool| -> i64 {
            if v >= 0 {
                v
            } else {
                len + v + if is_end { 1 } else { 0 }
            }
        };
        let start = resolve(self.start, false);
        let end = resolve(self.end, true);
        let sliced = if circular && start > end && len > 0 {
            let s = start.rem_euclid(len) as usize;
            let e = end.rem_euclid(len) as usize;
            let mut v = seq[s.min(seq.len())..].to_vec();
            v.extend_from_slice(&seq[..e.min(seq.len())]);
            v
        } else {
            let s = start.clamp(0, len) as usize;
            let e = end.clamp(s as i64, len) as usize;
            seq[s..e].to_vec()
        };
        match self.strand {
            pattern::Strand::Reverse => seq::reverse_complement(&sliced),
            pattern::Strand::Forward => sliced,
        }
    }
}

/// Extra flanking bases to pull around a BED/GTF-sourced region (spec
/// §4.F `subseq`'s `upstream`/`downstream`/`onlyFlank`/`oneBased`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FlankOptions {
    pub upstream: u64,
    pub downstream: u64,
    pub only_flank: bool,
    pub one_based: bool,
}

/// Expands a 0-based half-open `[start, end)` interval by strand-aware
/// upstream/downstream flanks. When `only_flank`, only one side is kept
/// (upstream if requested, else downstream) instead of the whole extended
/// span. Behavior when both flanks are requested with `only_flank`
/// simultaneously is underspecified upstream; see DESIGN.md for the
/// interpretation used here.
fn resolve_external_region(start: i64, end: i64, strand: pattern::Strand, flank: &FlankOptions) -> SubseqRegion {
    let start = if flank.one_based { start + 1 } else { start };
    let (up, down) = match strand {
        pattern::Strand::Reverse => (flank.downstream as i64, flank.upstream as i64),
        pattern::Strand::Forward => (flank.upstream as i64, flank.downstream as i64),
    };
    let (s, e) = if flank.only_flank {
        if up > 0 {
            (start - up, start)
        } else {
            (end, end + down)
        }
    } else {
        (start - up, end + down)
    };
    SubseqRegion { start: s, end: e, strand }
}

#[derive(Debug, Clone, Default)]
pub struct SubseqOptions {
    pub regions: Vec<SubseqRegion>,
    pub circular: bool,
    pub concatenate: bool,
}

/// `locate`'s mismatch/strand/overlap/cap/output options (spec §4.F
/// `locate`).
#[derive(Debug, Clone)]
pub struct LocateOptions {
    pub pattern: Vec<u8>,
    pub allow_mismatches: u8,
    pub ambiguous: bool,
    pub search_both_strands: bool,
    pub allow_overlaps: bool,
    pub max_matches: Option<usize>,
    pub output_format: LocateOutputFormat,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            pattern: Vec::new(),
            allow_mismatches: 0,
            ambiguous: false,
            search_both_strands: false,
            allow_overlaps: true,
            max_matches: None,
            output_format: LocateOutputFormat::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum LocateOutputFormat {
    #[default]
    Default,
    Bed,
}

/// `locate`'s result shape: either the matched records paired with their
/// `PatternMatch`es, or (when `outputFormat: bed`) the matches rendered
/// as `MotifLocation`-equivalent BED intervals (spec §4.F `locate`).
pub enum LocateResult<T> {
    Records(Vec<(T, Vec<PatternMatch>)>),
    Bed(Vec<BedInterval>),
}

/// Frame selection and ORF options for [`SeqOps::translate_frames`] (spec
/// §4.F `translate`).
#[derive(Debug, Clone)]
pub struct TranslateFramesOptions {
    pub frames: Vec<Frame>,
    pub all_frames: bool,
    pub orfs_only: bool,
    pub min_orf_length: usize,
    pub allow_alternative_starts: bool,
    pub include_frame_in_id: bool,
    pub options: TranslateOptions,
}

impl Default for TranslateFramesOptions {
    fn default() -> Self {
        Self {
            frames: vec![Frame::Fwd1],
            all_frames: false,
            orfs_only: false,
            min_orf_length: 0,
            allow_alternative_starts: false,
            include_frame_in_id: false,
            options: TranslateOptions::default(),
        }
    }
}

/// `split`'s partitioning strategy (spec §4.F `split`).
#[derive(Debug, Clone)]
pub enum SplitMode {
    BySize(usize),
    ByLength(usize),
    ByParts(usize),
    /// Regex with a capturing group naming each output file.
    ById(String),
    /// Groups records by the first region label (matched against the
    /// record id) found in the list; unmatched records land in a final
    /// residual file.
    ByRegion(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub mode: SplitMode,
    pub output_dir: PathBuf,
    pub file_prefix: Option<String>,
    pub file_extension: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SplitSummary {
    pub files: Vec<String>,
    pub total_sequences: u64,
    pub sequences_per_file: Vec<u64>,
}

impl SeqOps<FastqRecord> {
    /// Sliding-window quality trim from both ends (spec §4.B/§4.F).
    pub fn quality_trim(self, threshold: f64, window: usize) -> Self {
        self.try_map(move |mut rec| {
            let scores = rec.phred_scores()?;
            let start = quality::trim_start(&scores, threshold, window);
            let end = quality::trim_end(&scores, threshold, window);
            let end = end.max(start);
            rec.sequence = rec.sequence[start..end].to_vec();
            rec.quality = rec.quality[start..end].to_vec();
            Ok(rec)
        })
    }

    /// Drops records whose mean Phred score is below `min_mean_quality`.
    pub fn filter_mean_quality(self, min_mean_quality: f64) -> Self {
        self.filter(move |rec| match rec.phred_scores() {
            Ok(scores) if !scores.is_empty() => {
                let mean = scores.iter().sum::<i32>() as f64 / scores.len() as f64;
                mean >= min_mean_quality
            }
            _ => false,
        })
    }

    /// Re-encodes every record's quality string into `to`.
    pub fn convert_quality(self, to: quality::QualityEncoding) -> Self {
        self.try_map(move |mut rec| {
            let from = rec.quality_encoding.resolved().unwrap_or(quality::QualityEncoding::Phred33);
            rec.quality = quality::convert(&rec.quality, from, to)?;
            rec.quality_encoding = QualityEncodingTag::from(to);
            Ok(rec)
        })
    }

    /// Streams every record to `path`, inferring compression from its
    /// extension (spec §4.F `writeFastq(path)`).
    pub fn write_fastq(self, path: &Path) -> Result<u64, GenotypeError> {
        let writer = create_file(path)?;
        let mut w = FastqWriter::new(writer);
        let mut n = 0u64;
        for rec in self.collect()? {
            w.write_record(&rec)?;
            n += 1;
        }
        Ok(n)
    }

    pub fn split(self, opts: SplitOptions) -> Result<SplitSummary, GenotypeError> {
        self.split_with(opts, |w, rec| {
            let mut writer = FastqWriter::new(w);
            writer.write_record(rec)
        })
    }
}

impl SeqOps<FastaRecord> {
    /// Streams every record to `path`, inferring compression from its
    /// extension (spec §4.F `writeFasta(path)`).
    pub fn write_fasta(self, path: &Path, wrap: Option<usize>) -> Result<u64, GenotypeError> {
        let writer = create_file(path)?;
        let mut w = FastaWriter::new(writer, wrap);
        let mut n = 0u64;
        for rec in self.collect()? {
            w.write_record(&rec)?;
            n += 1;
        }
        Ok(n)
    }

    pub fn split(self, opts: SplitOptions, wrap: Option<usize>) -> Result<SplitSummary, GenotypeError> {
        self.split_with(opts, move |w, rec| {
            let mut writer = FastaWriter::new(w, wrap);
            writer.write_record(rec)
        })
    }
}

impl SeqOps<BedInterval> {
    /// Streams every interval to `path`, inferring compression from its
    /// extension (spec §4.F `writeBed(path)`).
    pub fn write_bed(self, path: &Path) -> Result<u64, GenotypeError> {
        let writer = create_file(path)?;
        let mut w = BedWriter::new(writer);
        let mut n = 0u64;
        for rec in self.collect()? {
            w.write_interval(&rec)?;
            n += 1;
        }
        Ok(n)
    }
}

impl SeqOps<DsvRecord> {
    /// Streams every row to `path` using the given dialect (CSV, TSV, or
    /// any other delimiter share the same dialect-driven writer), inferring
    /// compression from the path extension.
    pub fn write_dsv(self, path: &Path, dialect: &DsvDialect, protect_formulas: bool) -> Result<u64, GenotypeError> {
        let writer = create_file(path)?;
        let mut w = DsvWriter::new(writer, dialect, protect_formulas);
        let mut n = 0u64;
        for rec in self.collect()? {
            w.write_record(&rec)?;
            n += 1;
        }
        w.flush()?;
        Ok(n)
    }
}

impl SeqOps<SamAlignment> {
    /// Streams every alignment to `path` under `header`, inferring
    /// compression from the path extension (spec §4.F `writeSam(path)`).
    /// SAM carries header state outside any single record, so (unlike
    /// the other `write_*` methods) a header must be supplied explicitly.
    pub fn write_sam(self, path: &Path, header: &SamHeader) -> Result<u64, GenotypeError> {
        let writer = create_file(path)?;
        let mut w = SamWriter::new(writer);
        w.write_header(header)?;
        let mut n = 0u64;
        for rec in self.collect()? {
            w.write_alignment(&rec)?;
            n += 1;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ReaderOptions;

    fn fasta_ops(input: &'static str) -> SeqOps<FastaRecord> {
        let parser = crate::formats::fasta::parse_string(input, ReaderOptions::default());
        SeqOps::new(parser, CancellationToken::new(), ErrorPolicy::Throw)
    }

    #[test]
    fn filter_keeps_matching_records() {
        let ops = fasta_ops(">a\nACGT\n>b\nTTTT\n");
        let out = ops.filter(|r| r.sequence.contains(&b'C')).collect().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn reverse_complement_applies_to_every_record() {
        let ops = fasta_ops(">a\nACGT\n");
        let out = ops.reverse_complement().collect().unwrap();
        assert_eq!(out[0].sequence, b"ACGT");
    }

    #[test]
    fn grep_filters_by_substring() {
        let ops = fasta_ops(">a\nACGTACGT\n>b\nTTTTTTTT\n");
        let out = ops.grep(GrepOptions::sequence(b"CGTA".to_vec())).collect().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn grep_by_id_is_case_insensitive() {
        let ops = fasta_ops(">Sample1\nACGT\n>other\nTTTT\n");
        let out = ops
            .grep(GrepOptions {
                pattern: b"sample".to_vec(),
                target: GrepTarget::Id,
                ignore_case: true,
            })
            .collect()
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "Sample1");
    }

    #[test]
    fn head_limits_record_count() {
        let ops = fasta_ops(">a\nAAAA\n>b\nCCCC\n>c\nGGGG\n");
        let out = ops.head(2).collect().unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn rmdup_exact_drops_repeated_sequences() {
        let ops = fasta_ops(">a\nACGT\n>b\nACGT\n>c\nTTTT\n");
        let out = ops.rmdup_exact(|r: &FastaRecord| r.sequence.clone()).collect().unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn stats_reports_record_count() {
        let ops = fasta_ops(">a\nACGT\n>b\nGGGG\n");
        let stats = ops.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_length, 8);
    }

    #[test]
    fn sample_reservoir_respects_size() {
        let ops = fasta_ops(">a\nAAAA\n>b\nCCCC\n>c\nGGGG\n>d\nTTTT\n");
        let out = ops
            .sample(sample::SampleStrategy::Reservoir { size: 2 }, Some(1))
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn subseq_slices_sequence_by_explicit_region() {
        let ops = fasta_ops(">a\nACGTACGT\n");
        let out = ops
            .subseq(SubseqOptions {
                regions: vec![SubseqRegion { start: 2, end: 5, strand: pattern::Strand::Forward }],
                ..Default::default()
            })
            .collect()
            .unwrap();
        assert_eq!(out[0].sequence, b"GTA");
    }

    #[test]
    fn subseq_region_string_supports_negative_end() {
        let region = SubseqRegion::parse("0:-1").unwrap();
        let out = region.extract(b"ACGTACGT", false);
        assert_eq!(out, b"ACGTACG");
    }

    #[test]
    fn subseq_circular_region_wraps() {
        let region = SubseqRegion { start: 6, end: 2, strand: pattern::Strand::Forward };
        let out = region.extract(b"ACGTACGT", true);
        assert_eq!(out, b"GTAC");
    }

    #[test]
    fn subseq_reverse_strand_complements() {
        let region = SubseqRegion { start: 0, end: 4, strand: pattern::Strand::Reverse };
        let out = region.extract(b"ACGT", false);
        assert_eq!(out, b"ACGT");
    }

    #[test]
    fn subseq_multiple_regions_yield_one_record_each() {
        let ops = fasta_ops(">a\nACGTACGT\n");
        let out = ops
            .subseq(SubseqOptions {
                regions: vec![
                    SubseqRegion { start: 0, end: 2, strand: pattern::Strand::Forward },
                    SubseqRegion { start: 4, end: 6, strand: pattern::Strand::Forward },
                ],
                ..Default::default()
            })
            .collect()
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].sequence, b"AC");
        assert_eq!(out[1].sequence, b"AC");
    }

    #[test]
    fn subseq_concatenate_joins_into_one_record() {
        let ops = fasta_ops(">a\nACGTACGT\n");
        let out = ops
            .subseq(SubseqOptions {
                regions: vec![
                    SubseqRegion { start: 0, end: 2, strand: pattern::Strand::Forward },
                    SubseqRegion { start: 4, end: 6, strand: pattern::Strand::Forward },
                ],
                concatenate: true,
                ..Default::default()
            })
            .collect()
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sequence, b"ACAC");
    }

    #[test]
    fn translate_frames_all_frames_yields_six_records() {
        let ops = fasta_ops(">s1\nATGGCC\n");
        let out = ops
            .translate_frames(1, TranslateFramesOptions { all_frames: true, ..Default::default() })
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(out[0].sequence, b"MA");
    }

    #[test]
    fn translate_frames_includes_frame_label_in_id() {
        let ops = fasta_ops(">s1\nATGGCC\n");
        let out = ops
            .translate_frames(
                1,
                TranslateFramesOptions {
                    frames: vec![Frame::Fwd1],
                    include_frame_in_id: true,
                    ..Default::default()
                },
            )
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(out[0].id, "s1_frame_+1");
    }

    #[test]
    fn clean_replaces_ambiguous_bases() {
        let ops = fasta_ops(">a\nACGTRYKM\n");
        let out = ops
            .clean(CleanOptions {
                replace_ambiguous: true,
                replace_char: b'N',
                ..Default::default()
            })
            .collect()
            .unwrap();
        assert_eq!(out[0].sequence, b"ACGTNNNN");
    }

    #[test]
    fn clean_removes_gaps() {
        let ops = fasta_ops(">a\nAC-GT.AC\n");
        let out = ops.clean(CleanOptions { remove_gaps: true, ..Default::default() }).collect().unwrap();
        assert_eq!(out[0].sequence, b"ACGTAC");
    }

    #[test]
    fn validate_sequence_rejects_invalid_by_default() {
        let ops = fasta_ops(">a\nACGTXYZ\n>b\nACGT\n");
        let out = ops.validate_sequence(ValidateOptions::default()).collect().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "b");
    }

    #[test]
    fn validate_sequence_fix_replaces_invalid_chars() {
        let ops = fasta_ops(">a\nACGTX\n");
        let out = ops
            .validate_sequence(ValidateOptions {
                mode: ValidateMode::Normal,
                action: ValidateAction::Fix,
                fix_char: b'N',
            })
            .collect()
            .unwrap();
        assert_eq!(out[0].sequence, b"ACGTN");
    }

    #[test]
    fn filter_by_bounds_filters_on_length_and_gc() {
        let ops = fasta_ops(">a\nACGT\n>b\nAAAA\n");
        let out = ops
            .filter_by::<fn(&FastaRecord) -> bool>(FilterBounds { min_gc: Some(10.0), ..Default::default() }, None)
            .collect()
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn locate_reports_matches_with_overlap_removal() {
        let ops = fasta_ops(">a\nAAAAA\n");
        let result = ops
            .locate(LocateOptions {
                pattern: b"AA".to_vec(),
                allow_overlaps: false,
                ..Default::default()
            })
            .unwrap();
        match result {
            LocateResult::Records(hits) => {
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].1.len(), 2);
            }
            LocateResult::Bed(_) => panic!("expected record output"),
        }
    }

    #[test]
    fn locate_bed_output_format_yields_intervals() {
        let ops = fasta_ops(">a\nACGTACGT\n");
        let result = ops
            .locate(LocateOptions {
                pattern: b"ACGT".to_vec(),
                output_format: LocateOutputFormat::Bed,
                ..Default::default()
            })
            .unwrap();
        match result {
            LocateResult::Bed(intervals) => {
                assert_eq!(intervals.len(), 2);
                assert_eq!(intervals[0].chrom, "a");
            }
            LocateResult::Records(_) => panic!("expected bed output"),
        }
    }

    fn fastq_ops(input: &'static str) -> SeqOps<FastqRecord> {
        let parser = crate::formats::fastq::parse_string(input, ReaderOptions::default());
        SeqOps::new(parser, CancellationToken::new(), ErrorPolicy::Throw)
    }

    #[test]
    fn quality_trim_removes_low_quality_ends() {
        let ops = fastq_ops("@r1\nACGTACGT\n+\n!!IIIIII\n");
        let out = ops.quality_trim(20.0, 2).collect().unwrap();
        assert!(out[0].sequence.len() < 8);
    }

    #[test]
    fn filter_mean_quality_drops_low_quality_records() {
        let ops = fastq_ops("@r1\nACGT\n+\n!!!!\n@r2\nACGT\n+\nIIII\n");
        let out = ops.filter_mean_quality(20.0).collect().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "r2");
    }

    #[test]
    fn split_by_size_writes_expected_chunk_sizes() {
        let dir = std::env::temp_dir().join(format!("seqflow_split_test_{}", std::process::id()));
        let ops = fasta_ops(">a\nAAAA\n>b\nCCCC\n>c\nGGGG\n");
        let summary = ops
            .split(
                SplitOptions {
                    mode: SplitMode::BySize(2),
                    output_dir: dir.clone(),
                    file_prefix: Some("chunk".to_string()),
                    file_extension: Some("fasta".to_string()),
                },
                None,
            )
            .unwrap();
        assert_eq!(summary.total_sequences, 3);
        assert_eq!(summary.sequences_per_file, vec![2, 1]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
