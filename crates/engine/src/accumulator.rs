//! Thread-safe change-matrix accumulator with a mutable-to-frozen lifecycle

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use gridshift_core::{Error, Result};

use crate::domain::ClassDomain;

/// One (reference, current) class-pair bucket.
///
/// The area sum is an f64 stored as raw bits so both fields stay lock-free;
/// addition goes through a compare-exchange loop.
struct PairBucket {
    pixels: AtomicU64,
    area_bits: AtomicU64,
}

impl PairBucket {
    fn new() -> Self {
        Self {
            pixels: AtomicU64::new(0),
            area_bits: AtomicU64::new(0.0f64.to_bits()),
        }
    }

    fn add(&self, weight: f64) {
        self.pixels.fetch_add(1, Ordering::Relaxed);

        let mut current = self.area_bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + weight).to_bits();
            match self.area_bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Accumulates pixel counts and area sums per ordered class pair.
///
/// The accumulator has two states. While OPEN, any number of worker
/// threads may call [`increment`](Self::increment) concurrently; reads are
/// rejected. [`freeze`](Self::freeze) flips it one-way to FROZEN, after
/// which the accumulator is read-only and safe to share with any number of
/// readers. The scheduler must only freeze after all producers have
/// completed (its join barrier provides that ordering).
///
/// Buckets form a dense |domain|² table indexed by
/// `ref_index * n + cur_index`, so concurrent increments on different
/// pairs never contend and increments on the same pair are single atomic
/// adds, keeping the per-pixel hot path free of any global lock.
pub struct ChangeMatrixAccumulator {
    domain: ClassDomain,
    buckets: Vec<PairBucket>,
    frozen: AtomicBool,
}

impl ChangeMatrixAccumulator {
    /// Create an OPEN accumulator covering `domain` x `domain`
    pub fn new(domain: ClassDomain) -> Self {
        let n = domain.len();
        let buckets = (0..n * n).map(|_| PairBucket::new()).collect();
        Self {
            domain,
            buckets,
            frozen: AtomicBool::new(false),
        }
    }

    /// The class domain this accumulator counts over
    pub fn domain(&self) -> &ClassDomain {
        &self.domain
    }

    /// Whether [`freeze`](Self::freeze) has been called
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    fn bucket_index(&self, ref_class: u16, cur_class: u16) -> Result<usize> {
        let ref_idx = self
            .domain
            .index_of(ref_class)
            .ok_or(Error::UnknownClass { class: ref_class })?;
        let cur_idx = self
            .domain
            .index_of(cur_class)
            .ok_or(Error::UnknownClass { class: cur_class })?;
        Ok(ref_idx * self.domain.len() + cur_idx)
    }

    /// Record one pixel transitioning from `ref_class` to `cur_class`,
    /// contributing `weight` to the pair's area sum.
    ///
    /// Thread-safe while OPEN. Fails with [`Error::IllegalState`] once the
    /// accumulator is frozen and with [`Error::UnknownClass`] for labels
    /// outside the domain.
    pub fn increment(&self, ref_class: u16, cur_class: u16, weight: f64) -> Result<()> {
        if self.frozen.load(Ordering::Relaxed) {
            return Err(Error::IllegalState(
                "increment on a frozen change-matrix accumulator",
            ));
        }
        let idx = self.bucket_index(ref_class, cur_class)?;
        self.buckets[idx].add(weight);
        Ok(())
    }

    /// Transition OPEN -> FROZEN.
    ///
    /// One-way: a second call is an [`Error::IllegalState`]. Must only be
    /// called after every producer task has completed.
    pub fn freeze(&self) -> Result<()> {
        if self.frozen.swap(true, Ordering::Release) {
            return Err(Error::IllegalState(
                "change-matrix accumulator is already frozen",
            ));
        }
        Ok(())
    }

    fn require_frozen(&self) -> Result<()> {
        if !self.frozen.load(Ordering::Acquire) {
            return Err(Error::IllegalState(
                "read from a change-matrix accumulator before freeze",
            ));
        }
        Ok(())
    }

    /// Pixel count for (ref_class, cur_class); 0 for pairs never seen.
    ///
    /// Only legal after [`freeze`](Self::freeze).
    pub fn pair_count(&self, ref_class: u16, cur_class: u16) -> Result<u64> {
        self.require_frozen()?;
        let idx = self.bucket_index(ref_class, cur_class)?;
        Ok(self.buckets[idx].pixels.load(Ordering::Relaxed))
    }

    /// Accumulated area for (ref_class, cur_class); 0.0 for pairs never
    /// seen. Only legal after [`freeze`](Self::freeze).
    pub fn pair_area(&self, ref_class: u16, cur_class: u16) -> Result<f64> {
        self.require_frozen()?;
        let idx = self.bucket_index(ref_class, cur_class)?;
        Ok(f64::from_bits(self.buckets[idx].area_bits.load(Ordering::Relaxed)))
    }

    /// Sum of all pair pixel counts. Only legal after freeze.
    pub fn total_pixels(&self) -> Result<u64> {
        self.require_frozen()?;
        Ok(self
            .buckets
            .iter()
            .map(|b| b.pixels.load(Ordering::Relaxed))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn domain() -> ClassDomain {
        ClassDomain::new([1, 2, 3]).unwrap()
    }

    #[test]
    fn test_increment_and_read() {
        let acc = ChangeMatrixAccumulator::new(domain());
        acc.increment(1, 2, 2.5).unwrap();
        acc.increment(1, 2, 0.5).unwrap();
        acc.increment(3, 3, 1.0).unwrap();
        acc.freeze().unwrap();

        assert_eq!(acc.pair_count(1, 2).unwrap(), 2);
        assert!((acc.pair_area(1, 2).unwrap() - 3.0).abs() < 1e-12);
        assert_eq!(acc.pair_count(3, 3).unwrap(), 1);
        assert_eq!(acc.pair_count(2, 1).unwrap(), 0, "unseen pairs read as 0");
        assert_eq!(acc.total_pixels().unwrap(), 3);
    }

    #[test]
    fn test_unknown_class_rejected() {
        let acc = ChangeMatrixAccumulator::new(domain());
        assert!(matches!(
            acc.increment(9, 1, 1.0),
            Err(Error::UnknownClass { class: 9 })
        ));
    }

    #[test]
    fn test_no_read_before_freeze() {
        let acc = ChangeMatrixAccumulator::new(domain());
        acc.increment(1, 1, 1.0).unwrap();
        assert!(matches!(acc.pair_count(1, 1), Err(Error::IllegalState(_))));
        assert!(matches!(acc.pair_area(1, 1), Err(Error::IllegalState(_))));
        assert!(matches!(acc.total_pixels(), Err(Error::IllegalState(_))));
    }

    #[test]
    fn test_no_mutation_after_freeze() {
        let acc = ChangeMatrixAccumulator::new(domain());
        acc.freeze().unwrap();
        assert!(matches!(
            acc.increment(1, 1, 1.0),
            Err(Error::IllegalState(_))
        ));
    }

    #[test]
    fn test_freeze_is_one_way() {
        let acc = ChangeMatrixAccumulator::new(domain());
        acc.freeze().unwrap();
        assert!(matches!(acc.freeze(), Err(Error::IllegalState(_))));
    }

    #[test]
    fn test_concurrent_increments() {
        let acc = Arc::new(ChangeMatrixAccumulator::new(domain()));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let acc = Arc::clone(&acc);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        acc.increment(2, 3, 0.25).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        acc.freeze().unwrap();

        assert_eq!(acc.pair_count(2, 3).unwrap(), 8000);
        assert!((acc.pair_area(2, 3).unwrap() - 2000.0).abs() < 1e-9);
    }
}
