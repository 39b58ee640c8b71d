//! External merge sort (spec §4.F `sort` stage): sorts in memory below a
//! record-count threshold, otherwise spills sorted runs to temp files and
//! merges them with a min-heap, so total memory stays bounded regardless
//! of input size.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tempfile::NamedTempFile;

use crate::error::GenotypeError;

/// A comparator plus the encode/decode pair needed to spill records to
/// disk; all three must be free functions or non-capturing closures so
/// they can be stored cheaply inside every merge-heap entry.
pub struct ExternalSort<T> {
    threshold: usize,
    compare: fn(&T, &T) -> Ordering,
    encode: fn(&T) -> Vec<u8>,
    decode: fn(&[u8]) -> T,
}

impl<T: 'static> ExternalSort<T> {
    pub fn new(threshold: usize, compare: fn(&T, &T) -> Ordering, encode: fn(&T) -> Vec<u8>, decode: fn(&[u8]) -> T) -> Self {
        Self {
            threshold: threshold.max(1),
            compare,
            encode,
            decode,
        }
    }

    /// Consumes `items`, sorting in memory if they fit within `threshold`
    /// records, otherwise spilling sorted chunks to temp files and
    /// returning a lazily-merging iterator over them.
    pub fn sort(&self, items: impl Iterator<Item = T>) -> Result<Box<dyn Iterator<Item = Result<T, GenotypeError>>>, GenotypeError> {
        let mut buffer = Vec::with_capacity(self.threshold);
        let mut runs: Vec<NamedTempFile> = Vec::new();
        let mut iter = items;

        loop {
            buffer.clear();
            for item in iter.by_ref().take(self.threshold) {
                buffer.push(item);
            }
            if buffer.is_empty() {
                break;
            }
            let is_last_chunk = buffer.len() < self.threshold;
            if runs.is_empty() && is_last_chunk {
                // Entire input fit in one chunk: no spill needed.
                buffer.sort_by(self.compare);
                let sorted = std::mem::take(&mut buffer);
                return Ok(Box::new(sorted.into_iter().map(Ok)));
            }
            buffer.sort_by(self.compare);
            runs.push(spill_run(&buffer, self.encode)?);
            if is_last_chunk {
                break;
            }
        }

        Ok(Box::new(MergeIter::new(runs, self.compare, self.decode)?))
    }
}

fn spill_run<T>(sorted: &[T], encode: fn(&T) -> Vec<u8>) -> Result<NamedTempFile, GenotypeError> {
    let file = NamedTempFile::new().map_err(GenotypeError::from)?;
    {
        let mut writer = BufWriter::new(file.reopen().map_err(GenotypeError::from)?);
        for item in sorted {
            let bytes = encode(item);
            writer.write_u32::<LittleEndian>(bytes.len() as u32)?;
            writer.write_all(&bytes)?;
        }
        writer.flush()?;
    }
    Ok(file)
}

struct RunReader<T> {
    reader: BufReader<File>,
    decode: fn(&[u8]) -> T,
}

impl<T> RunReader<T> {
    fn next_item(&mut self) -> io::Result<Option<T>> {
        let len = match self.reader.read_u32::<LittleEndian>() {
            Ok(l) => l,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut buf = vec![0u8; len as usize];
        self.reader.read_exact(&mut buf)?;
        Ok(Some((self.decode)(&buf)))
    }
}

struct HeapEntry<T> {
    item: T,
    run: usize,
    compare: fn(&T, &T) -> Ordering,
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.compare)(&self.item, &other.item) == Ordering::Equal
    }
}
impl<T> Eq for HeapEntry<T> {}
impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.compare)(&self.item, &other.item)
    }
}

/// Merges already-sorted runs with a min-heap keyed by `compare`, reading
/// one record ahead per run so total memory is O(number of runs).
struct MergeIter<T> {
    runs: Vec<RunReader<T>>,
    heap: BinaryHeap<Reverse<HeapEntry<T>>>,
    compare: fn(&T, &T) -> Ordering,
}

impl<T> MergeIter<T> {
    fn new(files: Vec<NamedTempFile>, compare: fn(&T, &T) -> Ordering, decode: fn(&[u8]) -> T) -> Result<Self, GenotypeError> {
        let mut runs = Vec::with_capacity(files.len());
        let mut heap = BinaryHeap::with_capacity(files.len());
        for (i, file) in files.into_iter().enumerate() {
            let mut run = RunReader {
                reader: BufReader::new(file.reopen().map_err(GenotypeError::from)?),
                decode,
            };
            if let Some(item) = run.next_item()? {
                heap.push(Reverse(HeapEntry { item, run: i, compare }));
            }
            runs.push(run);
        }
        Ok(Self { runs, heap, compare })
    }
}

impl<T> Iterator for MergeIter<T> {
    type Item = Result<T, GenotypeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse(entry) = self.heap.pop()?;
        match self.runs[entry.run].next_item() {
            Ok(Some(next_item)) => {
                self.heap.push(Reverse(HeapEntry {
                    item: next_item,
                    run: entry.run,
                    compare: self.compare,
                }));
            }
            Ok(None) => {}
            Err(e) => return Some(Err(GenotypeError::from(e))),
        }
        Some(Ok(entry.item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare_u32(a: &u32, b: &u32) -> Ordering {
        a.cmp(b)
    }
    fn encode_u32(v: &u32) -> Vec<u8> {
        v.to_le_bytes().to_vec()
    }
    fn decode_u32(b: &[u8]) -> u32 {
        u32::from_le_bytes(b.try_into().unwrap())
    }

    #[test]
    fn sorts_small_input_in_memory() {
        let sorter = ExternalSort::new(1000, compare_u32, encode_u32, decode_u32);
        let input = vec![5u32, 3, 1, 4, 2];
        let out: Vec<u32> = sorter.sort(input.into_iter()).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn sorts_with_spilled_runs() {
        let sorter = ExternalSort::new(4, compare_u32, encode_u32, decode_u32);
        let input: Vec<u32> = (0..50).rev().collect();
        let out: Vec<u32> = sorter.sort(input.into_iter()).unwrap().collect::<Result<_, _>>().unwrap();
        let expected: Vec<u32> = (0..50).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn empty_input_sorts_to_empty() {
        let sorter = ExternalSort::new(10, compare_u32, encode_u32, decode_u32);
        let out: Vec<u32> = sorter.sort(std::iter::empty()).unwrap().collect::<Result<_, _>>().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn exact_threshold_boundary_spills_one_run() {
        let sorter = ExternalSort::new(5, compare_u32, encode_u32, decode_u32);
        let input: Vec<u32> = vec![5, 4, 3, 2, 1];
        let out: Vec<u32> = sorter.sort(input.into_iter()).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }
}
