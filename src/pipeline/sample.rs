//! Seeded, reproducible record sampling (spec §4.F `sample` stage):
//! reservoir, Bernoulli, systematic and weighted strategies.

use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// How `sample` should pick records out of a stream (spec §4.F).
#[derive(Debug, Clone)]
pub enum SampleStrategy {
    /// Exactly `size` records, uniformly, via reservoir sampling
    /// (Vitter's Algorithm R) -- the only strategy that needs a fixed
    /// output size from a stream of unknown length.
    Reservoir { size: usize },
    /// Each record independently kept with probability `probability`.
    Bernoulli { probability: f64 },
    /// Every `interval`-th record, starting at the first.
    Systematic { interval: usize },
    /// Exactly `size` records, weighted by a per-record weight function
    /// (Efraimidis-Spirakis A-Res: keeps the `size` largest `u^(1/w)` keys).
    Weighted { size: usize },
}

fn rng_from_seed(seed: Option<u64>) -> Xoshiro256PlusPlus {
    match seed {
        Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
        None => Xoshiro256PlusPlus::from_entropy(),
    }
}

/// Reservoir sampling (Algorithm R): keeps exactly `size` items chosen
/// uniformly at random from a stream of unknown length, in one pass.
pub fn reservoir_sample<T>(items: impl Iterator<Item = T>, size: usize, seed: Option<u64>) -> Vec<T> {
    let mut rng = rng_from_seed(seed);
    let mut reservoir: Vec<T> = Vec::with_capacity(size);
    if size == 0 {
        return reservoir;
    }
    for (i, item) in items.enumerate() {
        if i < size {
            reservoir.push(item);
        } else {
            let j = rng.gen_range(0..=i);
            if j < size {
                reservoir[j] = item;
            }
        }
    }
    reservoir
}

/// Independently keeps each record with probability `probability`, lazily
/// (no buffering -- can run forever on an unbounded stream).
pub fn bernoulli_sample<T>(items: impl Iterator<Item = T>, probability: f64, seed: Option<u64>) -> impl Iterator<Item = T> {
    let mut rng = rng_from_seed(seed);
    items.filter(move |_| rng.gen_bool(probability.clamp(0.0, 1.0)))
}

/// Keeps every `interval`-th record (1-based: positions 0, interval,
/// 2*interval, ...). `interval == 0` is treated as 1 (keep everything).
pub fn systematic_sample<T>(items: impl Iterator<Item = T>, interval: usize) -> impl Iterator<Item = T> {
    let step = interval.max(1);
    items.enumerate().filter_map(move |(i, item)| if i % step == 0 { Some(item) } else { None })
}

struct WeightedKey<T> {
    key: OrderedFloat<f64>,
    item: T,
}

impl<T> PartialEq for WeightedKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl<T> Eq for WeightedKey<T> {}
impl<T> PartialOrd for WeightedKey<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for WeightedKey<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so the heap is a min-heap on key: BinaryHeap::pop yields
        // the smallest key, which is the one to evict when the heap overflows.
        other.key.cmp(&self.key)
    }
}

/// Weighted reservoir sampling without replacement: keeps the `size` items
/// with the largest `u^(1/weight)` key, `u` uniform in `(0, 1]` per item.
pub fn weighted_sample<T>(
    items: impl Iterator<Item = T>,
    size: usize,
    weight_fn: impl Fn(&T) -> f64,
    seed: Option<u64>,
) -> Vec<T> {
    let mut rng = rng_from_seed(seed);
    if size == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<WeightedKey<T>> = BinaryHeap::with_capacity(size);
    for item in items {
        let w = weight_fn(&item).max(f64::MIN_POSITIVE);
        let u: f64 = rng.gen_range(f64::MIN_POSITIVE..=1.0);
        let key = OrderedFloat(u.ln() / w);
        if heap.len() < size {
            heap.push(WeightedKey { key, item });
        } else if let Some(smallest) = heap.peek() {
            if key > smallest.key {
                heap.pop();
                heap.push(WeightedKey { key, item });
            }
        }
    }
    heap.into_sorted_vec().into_iter().map(|wk| wk.item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservoir_sample_keeps_exact_size() {
        let out = reservoir_sample(0..1000, 10, Some(42));
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn reservoir_sample_is_deterministic_for_same_seed() {
        let a = reservoir_sample(0..1000, 10, Some(7));
        let b = reservoir_sample(0..1000, 10, Some(7));
        assert_eq!(a, b);
    }

    #[test]
    fn reservoir_sample_smaller_than_stream_returns_all() {
        let out = reservoir_sample(0..5, 10, Some(1));
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn bernoulli_with_probability_zero_keeps_nothing() {
        let out: Vec<_> = bernoulli_sample(0..100, 0.0, Some(1)).collect();
        assert!(out.is_empty());
    }

    #[test]
    fn bernoulli_with_probability_one_keeps_everything() {
        let out: Vec<_> = bernoulli_sample(0..100, 1.0, Some(1)).collect();
        assert_eq!(out.len(), 100);
    }

    #[test]
    fn systematic_sample_keeps_every_nth() {
        let out: Vec<_> = systematic_sample(0..10, 3).collect();
        assert_eq!(out, vec![0, 3, 6, 9]);
    }

    #[test]
    fn weighted_sample_keeps_exact_size() {
        let items: Vec<(usize, f64)> = (0..100).map(|i| (i, 1.0)).collect();
        let out = weighted_sample(items.into_iter(), 10, |(_, w)| *w, Some(3));
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn weighted_sample_favors_higher_weight() {
        let mut heavy_count = 0;
        for seed in 0..20 {
            let items = vec![("light", 1.0), ("heavy", 1000.0)];
            let out = weighted_sample(items.into_iter(), 1, |(_, w)| *w, Some(seed));
            if out[0].0 == "heavy" {
                heavy_count += 1;
            }
        }
        assert!(heavy_count >= 15);
    }
}
