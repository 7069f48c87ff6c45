//! Scan-segment representation (spec.md §4.B).
//!
//! Two views exist: a dense, fixed-length [`Segment`] centered on a
//! candidate m/z (the input to every learned component), and a
//! [`SparseScan`], the mutable residual full-scan vector that the §4.H
//! per-scan loop decimates as it subtracts matched clusters. Grounded in
//! the teacher's sparse-vector-over-a-hashed-axis shape used by
//! `rustyms`'s comb-filter-adjacent binary search helpers, generalized to
//! an explicit hash map since a full scan's bucket space (`mz_max * G` ~=
//! 1.5M buckets) is far sparser than its dense size.

use std::collections::BTreeMap;

use crate::scan::{Point, Spectrum};

/// `hash(mz) = round(mz * granularity)`, deterministic and branch-free.
pub fn hash(mz: f64, granularity: f64) -> i64 {
    (mz * granularity).round() as i64
}

/// `unhash(bucket) = bucket / granularity`.
pub fn unhash(bucket: i64, granularity: f64) -> f64 {
    bucket as f64 / granularity
}

/// A dense vector of length `L = 2*radius_buckets + 1`, centered on a
/// candidate m/z at index `radius_buckets` (the "center bucket").
#[derive(Debug, Clone)]
pub struct Segment {
    values: Vec<f64>,
    /// Index of the center bucket within `values`.
    pub center: usize,
    /// The hashed bucket address of the center, in full-scan coordinates.
    pub center_bucket: i64,
    /// Buckets per m/z unit used to build this segment.
    pub granularity: f64,
}

impl Segment {
    /// Extract a dense segment of radius `radius_buckets` around `center_mz`
    /// from a sparse spectrum (spec.md §4.B `extract`).
    pub fn extract(spectrum: &Spectrum, center_mz: f64, radius_buckets: i64, granularity: f64) -> Self {
        let center_bucket = hash(center_mz, granularity);
        let len = (2 * radius_buckets + 1) as usize;
        let mut values = vec![0.0; len];
        let lo_mz = unhash(center_bucket - radius_buckets - 1, granularity);
        let hi_mz = unhash(center_bucket + radius_buckets + 1, granularity);
        for point in spectrum.range(lo_mz, hi_mz) {
            let bucket = hash(point.mz, granularity);
            let offset = bucket - (center_bucket - radius_buckets);
            if offset >= 0 && (offset as usize) < len {
                let slot = &mut values[offset as usize];
                *slot = slot.max(point.intensity);
            }
        }
        Self {
            values,
            center: radius_buckets as usize,
            center_bucket,
            granularity,
        }
    }

    /// Build a segment directly from dense values (used by synthetic
    /// fixtures and by the disambiguator, which produces a cleaned copy).
    pub fn from_values(values: Vec<f64>, center: usize, center_bucket: i64, granularity: f64) -> Self {
        Self {
            values,
            center,
            center_bucket,
            granularity,
        }
    }

    /// Length of the segment (`L` in spec.md §3).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the segment has no buckets (never true in practice; kept
    /// for the boundary-behavior tests in spec.md §8).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw dense values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access, used by the disambiguator to build a cleaned copy.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Value at the center bucket.
    pub fn center_value(&self) -> f64 {
        self.values[self.center]
    }

    /// Largest value in the segment.
    pub fn max(&self) -> f64 {
        self.values.iter().cloned().fold(0.0, f64::max)
    }

    /// True if every bucket is exactly zero (spec.md §4.C "degenerate input").
    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// The m/z a given index within this segment corresponds to.
    pub fn mz_at(&self, index: usize) -> f64 {
        unhash(self.center_bucket + index as i64 - self.center as i64, self.granularity)
    }
}

/// The mutable residual full-scan vector for one scan iteration
/// (spec.md §3 "a per-scan residual spectrum ... mutated during the scan
/// loop then discarded"). Exclusively owned by one scan iteration
/// (spec.md §5, §9).
#[derive(Debug, Clone, Default)]
pub struct SparseScan {
    buckets: BTreeMap<i64, f64>,
    pub granularity: f64,
}

impl SparseScan {
    /// Build the full residual scan from a spectrum (spec.md §4.H step 2).
    pub fn from_spectrum(spectrum: &Spectrum, granularity: f64) -> Self {
        let mut buckets = BTreeMap::new();
        for point in spectrum.points() {
            let bucket = hash(point.mz, granularity);
            let slot = buckets.entry(bucket).or_insert(0.0);
            *slot = slot.max(point.intensity);
        }
        Self { buckets, granularity }
    }

    /// Value at a given bucket, or 0 if absent.
    pub fn get(&self, bucket: i64) -> f64 {
        self.buckets.get(&bucket).copied().unwrap_or(0.0)
    }

    /// Subtract a sparse decimator from this scan, clamp negatives to 0,
    /// and prune zeros (spec.md §4.H step 4d).
    pub fn subtract(&mut self, decimator: &BTreeMap<i64, f64>) {
        for (bucket, value) in decimator {
            if let Some(slot) = self.buckets.get_mut(bucket) {
                *slot = (*slot - value).max(0.0);
            }
        }
        self.buckets.retain(|_, v| *v > 0.0);
    }

    /// Extract a dense segment around `center_mz` from the current residual.
    pub fn extract_segment(&self, center_mz: f64, radius_buckets: i64) -> Segment {
        let center_bucket = hash(center_mz, self.granularity);
        let len = (2 * radius_buckets + 1) as usize;
        let mut values = vec![0.0; len];
        for (offset, slot) in values.iter_mut().enumerate() {
            let bucket = center_bucket - radius_buckets + offset as i64;
            *slot = self.get(bucket);
        }
        Segment::from_values(values, radius_buckets as usize, center_bucket, self.granularity)
    }

    /// Reconstruct the points still present in the residual, as a spectrum.
    pub fn to_spectrum(&self) -> Spectrum {
        Spectrum::new(
            self.buckets
                .iter()
                .map(|(bucket, intensity)| Point::new(unhash(*bucket, self.granularity), *intensity))
                .collect(),
        )
    }

    /// Number of nonzero buckets remaining.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True if the residual has been fully subtracted away.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_unhash_roundtrip() {
        let granularity = 500.0;
        let mz = 751.880;
        let bucket = hash(mz, granularity);
        assert!((unhash(bucket, granularity) - mz).abs() < 1.0 / granularity);
    }

    #[test]
    fn extract_centers_on_candidate() {
        let spectrum = Spectrum::new(vec![Point::new(751.88, 100.0)]);
        let seg = Segment::extract(&spectrum, 751.88, 8, 500.0);
        assert_eq!(seg.center_value(), 100.0);
    }

    #[test]
    fn subtraction_is_isolated_per_scan() {
        let spectrum = Spectrum::new(vec![Point::new(100.0, 10.0)]);
        let mut a = SparseScan::from_spectrum(&spectrum, 500.0);
        let b = SparseScan::from_spectrum(&spectrum, 500.0);
        let mut dec = BTreeMap::new();
        dec.insert(hash(100.0, 500.0), 10.0);
        a.subtract(&dec);
        assert!(a.is_empty());
        assert_eq!(b.get(hash(100.0, 500.0)), 10.0);
    }
}
