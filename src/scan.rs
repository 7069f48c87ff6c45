//! The data model for a single MS1 scan (spec.md §3 "Point", "Scan").

use serde::{Deserialize, Serialize};

use crate::system::{min, Mass, MassOverCharge, Time};

/// An `(m/z, intensity)` pair. `m/z >= 0`, `intensity >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Mass-to-charge ratio.
    pub mz: f64,
    /// Observed intensity (arbitrary instrument units).
    pub intensity: f64,
}

impl Point {
    /// Construct a new point, clamping negative values to zero (vendor
    /// readers occasionally emit small negative baselines).
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self {
            mz: mz.max(0.0),
            intensity: intensity.max(0.0),
        }
    }

    /// This point's m/z as a dimensioned quantity.
    pub fn mz_quantity(self) -> MassOverCharge {
        crate::system::mz_value(self.mz)
    }
}

/// An ordered sequence of [`Point`]s sorted by m/z — a single MS1 spectrum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    points: Vec<Point>,
}

impl Spectrum {
    /// Build a spectrum from points, sorting by m/z.
    pub fn new(mut points: Vec<Point>) -> Self {
        points.sort_by(|a, b| a.mz.partial_cmp(&b.mz).unwrap());
        Self { points }
    }

    /// The points, in m/z order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of points in this spectrum.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the spectrum has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Largest m/z present, or 0.0 if empty.
    pub fn max_mz(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.mz)
    }

    /// Keep the top-`n` points by intensity, then re-sort by m/z
    /// (spec.md §4.H step 1 / §9 open question: this order is load-bearing
    /// because the NN charge model was trained on segments produced this way).
    pub fn truncate_by_intensity(&self, n: usize) -> Self {
        if self.points.len() <= n {
            return self.clone();
        }
        let mut by_intensity = self.points.clone();
        by_intensity.sort_by(|a, b| b.intensity.partial_cmp(&a.intensity).unwrap());
        by_intensity.truncate(n);
        Self::new(by_intensity)
    }

    /// Binary-search the smallest index whose m/z is >= `mz`.
    pub fn lower_bound(&self, mz: f64) -> usize {
        self.points.partition_point(|p| p.mz < mz)
    }

    /// All points with m/z in `[lo, hi]`.
    pub fn range(&self, lo: f64, hi: f64) -> &[Point] {
        let start = self.lower_bound(lo);
        let end = self.points.partition_point(|p| p.mz <= hi);
        &self.points[start..end]
    }
}

/// Immutable per-scan metadata as reported by the vendor reader
/// (spec.md §6 "Inbound — vendor reader").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanInfo {
    /// The vendor's own scan number (foreign key to the source file).
    pub vendor_scan_number: u64,
    /// Retention time, minutes.
    pub retention_time_minutes: f64,
    /// MS level; the core consumes `1` only.
    pub scan_level: u8,
}

/// An immutable MS1 scan record (spec.md §3 "Scan").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    /// Zero-based dense index into the ordered run.
    pub scan_index: usize,
    /// The vendor's own scan number.
    pub vendor_scan_number: u64,
    /// Retention time, minutes.
    pub retention_time_minutes: f64,
    /// MS level; only `1` is processed by the core.
    pub ms_level: u8,
    /// The centroided spectrum.
    pub spectrum: Spectrum,
}

impl Scan {
    /// Retention time as a dimensioned quantity.
    pub fn rt(&self) -> Time {
        min(self.retention_time_minutes)
    }

    /// True if this is an MS1 scan the core should process.
    pub fn is_ms1(&self) -> bool {
        self.ms_level == 1
    }
}

/// `mw = (mz * charge) - charge*m_H - mono_offset*m_H` (spec.md §3 invariant).
pub fn monoisotopic_mass(mz: f64, charge: u8, mono_offset: u8) -> Mass {
    crate::system::da(
        mz * f64::from(charge)
            - f64::from(charge) * crate::system::PROTON_MASS
            - f64::from(mono_offset) * crate::system::PROTON_MASS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_sorts_by_mz() {
        let s = Spectrum::new(vec![Point::new(5.0, 1.0), Point::new(1.0, 2.0)]);
        assert_eq!(s.points()[0].mz, 1.0);
        assert_eq!(s.points()[1].mz, 5.0);
    }

    #[test]
    fn truncate_then_resort_keeps_mz_order() {
        let s = Spectrum::new(vec![
            Point::new(1.0, 1.0),
            Point::new(2.0, 100.0),
            Point::new(3.0, 50.0),
        ]);
        let t = s.truncate_by_intensity(2);
        assert_eq!(t.len(), 2);
        assert!(t.points()[0].mz < t.points()[1].mz);
        assert_eq!(t.points()[0].mz, 2.0);
        assert_eq!(t.points()[1].mz, 3.0);
    }

    #[test]
    fn monoisotopic_mass_matches_scenario_1() {
        // spec.md §8 scenario 1: mz=751.88, charge=2, offset=0.
        let mw = monoisotopic_mass(751.88, 2, 0);
        assert!((mw.value - 1501.745_447).abs() < 1e-3);
    }
}
