//! Streaming format parsers and writers (spec §4.D, §4.E): FASTA, FASTQ,
//! SAM, BED and DSV (CSV/TSV/PSV/SSV).

pub mod bed;
pub mod dsv;
pub mod fasta;
pub mod fastq;
pub mod gtf;
pub mod sam;

use crate::cancel::CancellationToken;
use crate::diagnostics::{Diagnostics, ErrorPolicy};

/// Default cap on a single logical line, shared by every parser (spec
/// §4.D "max line length default 1e6").
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1_000_000;

/// Default buffer size for reader/writer I/O (4 MiB).
pub const DEFAULT_IO_BUFSIZE: usize = 1 << 22;

/// Shared construction options for every format reader (spec §4.D:
/// "a constructor taking options: validation strictness, max line length,
/// signal for cancellation, error and warning callbacks, line-number
/// tracking").
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub max_line_length: usize,
    pub validate: bool,
    pub strict: bool,
    pub error_policy: ErrorPolicy,
    pub cancellation: CancellationToken,
    pub track_line_numbers: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            validate: false,
            strict: false,
            error_policy: ErrorPolicy::Throw,
            cancellation: CancellationToken::new(),
            track_line_numbers: true,
        }
    }
}

impl ReaderOptions {
    pub fn new_diagnostics(&self) -> Diagnostics {
        Diagnostics::new(self.error_policy)
    }
}

/// A `seq_io` buffer-growth policy that refuses to grow a record's buffer
/// past `limit` bytes, turning a pathological over-long line/record into a
/// parse error instead of unbounded memory growth (spec §4.D "max line
/// length default 1e6"; memory is bounded by the largest single record,
/// never by file size).
#[derive(Debug, Clone, Copy)]
pub struct LimitedBuffer {
    pub double_until: usize,
    pub limit: usize,
}

impl LimitedBuffer {
    pub fn capped_at(limit: usize) -> Self {
        Self {
            double_until: DEFAULT_IO_BUFSIZE,
            limit,
        }
    }
}

impl seq_io::policy::BufPolicy for LimitedBuffer {
    fn grow_to(&mut self, current_size: usize) -> Option<usize> {
        if current_size < self.double_until {
            Some(current_size * 2)
        } else if current_size < self.limit {
            Some(current_size + self.double_until)
        } else {
            None
        }
    }
}

/// Checks a single already-read physical line against `opts.max_line_length`,
/// used by the line-oriented parsers (SAM, BED) that read via
/// `BufRead::lines` rather than through `seq_io`'s buffer policy.
pub(crate) fn check_line_length(line: &str, opts: &ReaderOptions, line_no: u64) -> Result<(), crate::error::GenotypeError> {
    if line.len() > opts.max_line_length {
        return Err(crate::error::GenotypeError::parse(
            format!("line length {} exceeds the configured maximum of {}", line.len(), opts.max_line_length),
            Some(line_no),
        ));
    }
    Ok(())
}
