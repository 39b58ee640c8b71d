//! Deduplication (spec §4.F `rmdup` stage): exact hash-set dedup, or a
//! scalable Bloom filter when false positives are an acceptable trade for
//! bounded memory on very large streams.

use std::collections::HashSet;

use ahash::RandomState;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Exact, order-preserving dedup keyed by an arbitrary projection of each
/// record (e.g. its sequence bytes, or `(id, sequence)`).
pub struct ExactDedup<K> {
    seen: HashSet<K, RandomState>,
}

impl<K: std::hash::Hash + Eq> Default for ExactDedup<K> {
    fn default() -> Self {
        Self {
            seen: HashSet::with_hasher(RandomState::new()),
        }
    }
}

impl<K: std::hash::Hash + Eq> ExactDedup<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `key` is seen, `false` on every
    /// subsequent occurrence.
    pub fn insert(&mut self, key: K) -> bool {
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// A scalable Bloom filter: a growing chain of fixed-size bit arrays, each
/// sized and hashed to keep the false-positive rate at or below `fp_rate`
/// as more items are inserted than the previous slice could support
/// (Almeida et al., "Scalable Bloom Filters"), used when exact dedup's
/// O(n) memory is not acceptable (spec §4.F "bounded-memory alternative").
pub struct ScalableBloomFilter {
    fp_rate: f64,
    growth_ratio: f64,
    initial_capacity: usize,
    slices: Vec<BloomSlice>,
}

struct BloomSlice {
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: u32,
    capacity: usize,
    count: usize,
}

impl BloomSlice {
    fn new(capacity: usize, fp_rate: f64) -> Self {
        let capacity = capacity.max(1);
        let num_bits = optimal_num_bits(capacity, fp_rate);
        let num_hashes = optimal_num_hashes(num_bits, capacity);
        Self {
            bits: vec![0u64; num_bits.div_ceil(64)],
            num_bits,
            num_hashes,
            capacity,
            count: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.count >= self.capacity
    }

    fn bit_positions(&self, item: &[u8]) -> impl Iterator<Item = usize> + '_ {
        let h1 = xxh3_64_with_seed(item, 0);
        let h2 = xxh3_64_with_seed(item, 1);
        (0..self.num_hashes).map(move |i| {
            let combined = h1.wrapping_add((i as u64).wrapping_mul(h2));
            (combined % self.num_bits as u64) as usize
        })
    }

    fn contains(&self, item: &[u8]) -> bool {
        self.bit_positions(item).all(|pos| self.bits[pos / 64] & (1 << (pos % 64)) != 0)
    }

    fn insert(&mut self, item: &[u8]) {
        for pos in self.bit_positions(item).collect::<Vec<_>>() {
            self.bits[pos / 64] |= 1 << (pos % 64);
        }
        self.count += 1;
    }
}

fn optimal_num_bits(capacity: usize, fp_rate: f64) -> usize {
    let n = capacity as f64;
    let m = -(n * fp_rate.ln()) / (std::f64::consts::LN_2.powi(2));
    m.ceil().max(64.0) as usize
}

fn optimal_num_hashes(num_bits: usize, capacity: usize) -> u32 {
    let k = (num_bits as f64 / capacity as f64) * std::f64::consts::LN_2;
    k.round().clamp(1.0, 16.0) as u32
}

impl ScalableBloomFilter {
    pub fn new(initial_capacity: usize, fp_rate: f64) -> Self {
        Self {
            fp_rate,
            growth_ratio: 2.0,
            initial_capacity: initial_capacity.max(64),
            slices: Vec::new(),
        }
    }

    fn tightened_fp_rate(&self, slice_index: usize) -> f64 {
        self.fp_rate * 0.9f64.powi(slice_index as i32)
    }

    /// Returns `true` the first time `item` is seen (with the filter's
    /// false-positive probability), `false` if it was probably seen before.
    pub fn insert(&mut self, item: &[u8]) -> bool {
        for slice in &self.slices {
            if slice.contains(item) {
                return false;
            }
        }
        let needs_new_slice = match self.slices.last() {
            Some(last) => last.is_full(),
            None => true,
        };
        if needs_new_slice {
            let capacity = self.initial_capacity as f64 * self.growth_ratio.powi(self.slices.len() as i32);
            let fp = self.tightened_fp_rate(self.slices.len());
            self.slices.push(BloomSlice::new(capacity as usize, fp));
        }
        self.slices.last_mut().unwrap().insert(item);
        true
    }

    pub fn approximate_count(&self) -> usize {
        self.slices.iter().map(|s| s.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_dedup_flags_first_occurrence_only() {
        let mut dedup = ExactDedup::new();
        assert!(dedup.insert("ACGT"));
        assert!(!dedup.insert("ACGT"));
        assert!(dedup.insert("TTTT"));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn bloom_filter_flags_first_occurrence_only() {
        let mut filter = ScalableBloomFilter::new(100, 0.01);
        assert!(filter.insert(b"ACGT"));
        assert!(!filter.insert(b"ACGT"));
        assert!(filter.insert(b"TTTT"));
    }

    #[test]
    fn bloom_filter_grows_across_slices() {
        let mut filter = ScalableBloomFilter::new(8, 0.01);
        for i in 0..1000u32 {
            filter.insert(&i.to_le_bytes());
        }
        assert!(filter.slices.len() > 1);
        assert_eq!(filter.approximate_count(), 1000);
    }

    #[test]
    fn bloom_filter_has_bounded_false_positive_rate() {
        let mut filter = ScalableBloomFilter::new(1000, 0.01);
        for i in 0..1000u32 {
            filter.insert(&i.to_le_bytes());
        }
        let mut false_positives = 0;
        for i in 1000..2000u32 {
            if !filter.insert(&i.to_le_bytes()) {
                false_positives += 1;
            }
        }
        assert!(false_positives < 100);
    }
}
