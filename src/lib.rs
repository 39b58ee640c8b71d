//! Streaming, format-agnostic handling of biological sequence data:
//! FASTA, FASTQ, SAM and BED parsing/writing, DSV metadata tables, and a
//! composable lazy pipeline (`SeqOps`) tying them together.
//!
//! Every reader in this crate processes records one at a time; memory use
//! is bounded by the largest single record, never by file size.

pub mod cancel;
pub mod compression;
pub mod diagnostics;
pub mod error;
pub mod formats;
pub mod pipeline;
pub mod quality;
pub mod seq;

pub use cancel::CancellationToken;
pub use diagnostics::{Diagnostics, ErrorPolicy, Warning};
pub use error::{GenotypeError, GenotypeResult};
pub use formats::ReaderOptions;
pub use pipeline::SeqOps;
