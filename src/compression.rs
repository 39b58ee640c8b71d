//! Magic-byte compression detection and transparent decompression (spec
//! §4.A). A peekable buffer sits in front of the byte source so detection
//! never consumes bytes the downstream reader still needs.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{CompressionError, CompressionPhase, GenotypeError};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CompressionFormat {
    None,
    Gzip,
    Zstd,
}

impl CompressionFormat {
    /// Format implied by a file extension, used only as a fallback when no
    /// magic bytes are available (spec §4.A: "extension match -> 0.7").
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Some(match ext {
            "gz" | "gzip" => CompressionFormat::Gzip,
            "zst" | "zstd" => CompressionFormat::Zstd,
            _ => return None,
        })
    }
}

/// Detection outcome, carried alongside the stream until it is consumed
/// (spec §3 "CompressionDetection").
#[derive(Debug, Clone, Copy)]
pub struct CompressionDetection {
    pub format: CompressionFormat,
    pub confidence: f32,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Detects the compression format from up to the first 4 bytes of `peeked`,
/// without requiring the whole buffer to be present.
pub fn detect_from_bytes(peeked: &[u8]) -> CompressionDetection {
    if peeked.len() >= 2 && peeked[0..2] == GZIP_MAGIC {
        return CompressionDetection {
            format: CompressionFormat::Gzip,
            confidence: 1.0,
        };
    }
    if peeked.len() >= 4 && peeked[0..4] == ZSTD_MAGIC {
        return CompressionDetection {
            format: CompressionFormat::Zstd,
            confidence: 1.0,
        };
    }
    if peeked.len() < 2 {
        return CompressionDetection {
            format: CompressionFormat::None,
            confidence: 0.0,
        };
    }
    CompressionDetection {
        format: CompressionFormat::None,
        confidence: 0.0,
    }
}

/// A stream wrapper that buffers the first few bytes read for detection,
/// then replays them before handing over to the inner reader. Detection
/// itself never blocks on more than 4 bytes.
pub struct PeekableStream<R: Read> {
    peeked: Vec<u8>,
    pos: usize,
    inner: R,
}

impl<R: Read> PeekableStream<R> {
    pub fn new(mut inner: R) -> io::Result<(Self, CompressionDetection)> {
        let mut peeked = vec![0u8; 4];
        let mut filled = 0;
        while filled < peeked.len() {
            let n = inner.read(&mut peeked[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        peeked.truncate(filled);
        let detection = detect_from_bytes(&peeked);
        Ok((
            Self {
                peeked,
                pos: 0,
                inner,
            },
            detection,
        ))
    }
}

impl<R: Read> Read for PeekableStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.peeked.len() {
            let remaining = &self.peeked[self.pos..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            Ok(n)
        } else {
            self.inner.read(buf)
        }
    }
}

/// Wraps an already-peeked stream in the decoder `format` calls for.
/// `None` and unsupported formats (bzip2, xz) are returned unwrapped; only
/// gzip/zstd decoding is built in (§1, §6).
fn wrap_for_format<'a, R: Read + 'a>(stream: R, format: CompressionFormat) -> Result<Box<dyn Read + 'a>, GenotypeError> {
    Ok(match format {
        CompressionFormat::Gzip => Box::new(flate2::read::MultiGzDecoder::new(stream)),
        CompressionFormat::Zstd => {
            cfg_if::cfg_if! {
                if #[cfg(feature = "zstd")] {
                    Box::new(zstd::stream::Decoder::new(io::BufReader::new(stream)).map_err(|e| {
                        GenotypeError::Compression(CompressionError {
                            format: CompressionFormat::Zstd,
                            phase: CompressionPhase::Inflate,
                            message: e.to_string(),
                        })
                    })?)
                } else {
                    return Err(GenotypeError::Compression(CompressionError {
                        format: CompressionFormat::Zstd,
                        phase: CompressionPhase::Detect,
                        message: "zstd support not compiled in (enable the `zstd` feature)".into(),
                    }));
                }
            }
        }
        CompressionFormat::None => Box::new(stream),
    })
}

/// Wraps a byte source in transparent decompression based on detected
/// magic bytes.
pub fn open_transparent<'a, R: Read + 'a>(
    reader: R,
) -> Result<(Box<dyn Read + 'a>, CompressionDetection), GenotypeError> {
    let (stream, detection) = PeekableStream::new(reader)?;
    let boxed = wrap_for_format(stream, detection.format)?;
    Ok((boxed, detection))
}

/// Opens a path for reading, transparently decompressing based on magic
/// bytes. When magic-byte sniffing comes back `None` (empty or too-short
/// file, or a format this crate doesn't sniff) but the file extension
/// names a known compression format, that extension is used as a
/// lower-confidence fallback (spec §4.A "extension match -> 0.7") and the
/// file is reopened and wrapped accordingly.
pub fn open_file(path: &Path) -> Result<(Box<dyn Read + 'static>, CompressionDetection), GenotypeError> {
    let file = File::open(path)?;
    let (boxed, detection) = open_transparent(BufReader::new(file))?;
    if detection.format == CompressionFormat::None {
        if let Some(format) = CompressionFormat::from_extension(path) {
            let file = File::open(path)?;
            let wrapped = wrap_for_format(BufReader::new(file), format)?;
            return Ok((
                wrapped,
                CompressionDetection {
                    format,
                    confidence: 0.7,
                },
            ));
        }
    }
    Ok((boxed, detection))
}

/// Wraps a writer in the encoder `format` calls for. `None` passes the
/// writer through unwrapped.
fn wrap_writer_for_format<'a, W: Write + 'a>(writer: W, format: CompressionFormat) -> Result<Box<dyn Write + 'a>, GenotypeError> {
    Ok(match format {
        CompressionFormat::Gzip => Box::new(flate2::write::GzEncoder::new(writer, flate2::Compression::default())),
        CompressionFormat::Zstd => {
            cfg_if::cfg_if! {
                if #[cfg(feature = "zstd")] {
                    Box::new(zstd::stream::Encoder::new(writer, 0).map_err(|e| {
                        GenotypeError::Compression(CompressionError {
                            format: CompressionFormat::Zstd,
                            phase: CompressionPhase::Deflate,
                            message: e.to_string(),
                        })
                    })?.auto_finish())
                } else {
                    return Err(GenotypeError::Compression(CompressionError {
                        format: CompressionFormat::Zstd,
                        phase: CompressionPhase::Detect,
                        message: "zstd support not compiled in (enable the `zstd` feature)".into(),
                    }));
                }
            }
        }
        CompressionFormat::None => Box::new(writer),
    })
}

/// Opens a path for writing, inferring compression from the extension
/// (spec §4.F "compression inferred from path extension"). Unrecognized
/// extensions write plain, uncompressed output.
pub fn create_file(path: &Path) -> Result<Box<dyn Write + 'static>, GenotypeError> {
    let file = File::create(path)?;
    let format = CompressionFormat::from_extension(path).unwrap_or(CompressionFormat::None);
    wrap_writer_for_format(BufWriter::new(file), format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_gzip_magic() {
        let d = detect_from_bytes(&[0x1f, 0x8b, 0x08, 0x00]);
        assert_eq!(d.format, CompressionFormat::Gzip);
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn detects_zstd_magic() {
        let d = detect_from_bytes(&[0x28, 0xb5, 0x2f, 0xfd]);
        assert_eq!(d.format, CompressionFormat::Zstd);
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn too_few_bytes_is_low_confidence_none() {
        let d = detect_from_bytes(&[0x1f]);
        assert_eq!(d.format, CompressionFormat::None);
        assert_eq!(d.confidence, 0.0);
    }

    #[test]
    fn plain_text_is_none() {
        let d = detect_from_bytes(b">seq1\nACGT\n");
        assert_eq!(d.format, CompressionFormat::None);
    }

    #[test]
    fn peekable_stream_replays_peeked_bytes() {
        let data = b">s1\nACGT\n".to_vec();
        let (mut stream, detection) = PeekableStream::new(&data[..]).unwrap();
        assert_eq!(detection.format, CompressionFormat::None);
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn gzip_roundtrip_via_open_transparent() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b">s1\nACGT\n").unwrap();
        let compressed = enc.finish().unwrap();

        let (mut reader, detection) = open_transparent(&compressed[..]).unwrap();
        assert_eq!(detection.format, CompressionFormat::Gzip);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b">s1\nACGT\n");
    }
}
