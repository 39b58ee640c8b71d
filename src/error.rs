use std::error;
use std::fmt;
use std::io;
use std::num::{ParseFloatError, ParseIntError};
use std::str::Utf8Error;
use std::string::FromUtf8Error;

/// Result alias used throughout the crate.
pub type GenotypeResult<T> = Result<T, GenotypeError>;

/// A line number or record offset attached to an error, 1-based.
pub type LineNumber = Option<u64>;

/// Structural failure while parsing a record (missing delimiter, truncated
/// record, wrong field count, ...).
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: LineNumber,
    pub suggestion: Option<String>,
}

/// Alphabet or length violation on a sequence.
#[derive(Debug, Clone)]
pub struct SequenceError {
    pub message: String,
    pub line: LineNumber,
}

/// Quality-encoding or sequence/quality length mismatch.
#[derive(Debug, Clone)]
pub struct QualityError {
    pub message: String,
    pub line: LineNumber,
}

/// An option or schema was invalid (e.g. contradictory filter bounds).
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

/// I/O, size-limit or permission failure. Carries the number of bytes a
/// writer managed to flush before failing, per spec §7.
#[derive(Debug)]
pub struct FileError {
    pub message: String,
    pub bytes_written: Option<u64>,
    pub source: Option<io::Error>,
}

/// Magic-byte detection or inflate/decompress failure.
#[derive(Debug, Clone)]
pub struct CompressionError {
    pub format: crate::compression::CompressionFormat,
    pub phase: CompressionPhase,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CompressionPhase {
    Detect,
    Inflate,
    Deflate,
}

/// RFC 4180 violation, with accumulated row/field context.
#[derive(Debug, Clone)]
pub struct DsvParseError {
    pub message: String,
    pub line: LineNumber,
    pub field: Option<usize>,
}

/// Per-field SAM error, optionally naming the QNAME it occurred in.
#[derive(Debug, Clone)]
pub struct SamError {
    pub message: String,
    pub qname: Option<String>,
    pub line: LineNumber,
}

/// Per-coordinate BED error, optionally naming the chromosome.
#[derive(Debug, Clone)]
pub struct BedError {
    pub message: String,
    pub chromosome: Option<String>,
    pub line: LineNumber,
}

/// Top-level error type all fallible operations in this crate return.
/// Named after the taxonomy's base case in spec §7 ("GenotypeError, base
/// for all"); every other error kind converts into it via `From`.
#[derive(Debug)]
pub enum GenotypeError {
    Parse(ParseError),
    Sequence(SequenceError),
    Quality(QualityError),
    Validation(ValidationError),
    File(FileError),
    Compression(CompressionError),
    Dsv(DsvParseError),
    Sam(SamError),
    Bed(BedError),
    Io(io::Error),
    Other(String),
}

impl GenotypeError {
    pub fn line(&self) -> LineNumber {
        match self {
            GenotypeError::Parse(e) => e.line,
            GenotypeError::Sequence(e) => e.line,
            GenotypeError::Quality(e) => e.line,
            GenotypeError::Dsv(e) => e.line,
            GenotypeError::Sam(e) => e.line,
            GenotypeError::Bed(e) => e.line,
            _ => None,
        }
    }

    pub fn parse(message: impl Into<String>, line: LineNumber) -> Self {
        GenotypeError::Parse(ParseError {
            message: message.into(),
            line,
            suggestion: None,
        })
    }

    pub fn sequence(message: impl Into<String>, line: LineNumber) -> Self {
        GenotypeError::Sequence(SequenceError {
            message: message.into(),
            line,
        })
    }

    pub fn quality(message: impl Into<String>, line: LineNumber) -> Self {
        GenotypeError::Quality(QualityError {
            message: message.into(),
            line,
        })
    }

    pub fn validation(message: impl Into<String>) -> Self {
        GenotypeError::Validation(ValidationError {
            message: message.into(),
        })
    }
}

impl fmt::Display for GenotypeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenotypeError::Parse(e) => write_with_line(f, &e.message, e.line),
            GenotypeError::Sequence(e) => write_with_line(f, &e.message, e.line),
            GenotypeError::Quality(e) => write_with_line(f, &e.message, e.line),
            GenotypeError::Validation(e) => f.write_str(&e.message),
            GenotypeError::File(e) => f.write_str(&e.message),
            GenotypeError::Compression(e) => write!(f, "{:?} error ({:?}): {}", e.format, e.phase, e.message),
            GenotypeError::Dsv(e) => write_with_line(f, &e.message, e.line),
            GenotypeError::Sam(e) => {
                if let Some(q) = &e.qname {
                    write!(f, "[{}] ", q)?;
                }
                write_with_line(f, &e.message, e.line)
            }
            GenotypeError::Bed(e) => {
                if let Some(c) = &e.chromosome {
                    write!(f, "[{}] ", c)?;
                }
                write_with_line(f, &e.message, e.line)
            }
            GenotypeError::Io(e) => e.fmt(f),
            GenotypeError::Other(s) => f.write_str(s),
        }
    }
}

fn write_with_line(f: &mut fmt::Formatter, message: &str, line: LineNumber) -> fmt::Result {
    if let Some(l) = line {
        write!(f, "line {}: {}", l, message)
    } else {
        f.write_str(message)
    }
}

impl error::Error for GenotypeError {}

impl From<io::Error> for GenotypeError {
    fn from(err: io::Error) -> Self {
        GenotypeError::Io(err)
    }
}

impl From<&str> for GenotypeError {
    fn from(err: &str) -> Self {
        GenotypeError::Other(err.to_owned())
    }
}

impl From<String> for GenotypeError {
    fn from(err: String) -> Self {
        GenotypeError::Other(err)
    }
}

macro_rules! from_err {
    ($e:ty) => {
        impl From<$e> for GenotypeError {
            fn from(err: $e) -> GenotypeError {
                GenotypeError::Other(format!("{}", err))
            }
        }
    };
}

from_err!(fmt::Error);
from_err!(Utf8Error);
from_err!(FromUtf8Error);
from_err!(ParseIntError);
from_err!(ParseFloatError);
from_err!(csv::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_line_number() {
        let e = GenotypeError::parse("missing '+' separator", Some(4));
        assert_eq!(e.to_string(), "line 4: missing '+' separator");
        assert_eq!(e.line(), Some(4));
    }

    #[test]
    fn validation_has_no_line() {
        let e = GenotypeError::validation("minLen > maxLen");
        assert_eq!(e.line(), None);
        assert_eq!(e.to_string(), "minLen > maxLen");
    }
}
