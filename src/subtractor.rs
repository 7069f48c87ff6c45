//! Spectra Subtractor (spec.md §4.F).
//!
//! Grounded in
//! `original_source/common_core_mini/src/algo/SpectraSubtractomatic.cpp`:
//! build a theoretical cluster ("decimator") from the averagine row for
//! the candidate's neutral mass, scaled to slightly overshoot the observed
//! peak so nothing positive is left behind after subtraction, then score
//! how well the observed segment matches that theoretical shape.

use std::collections::BTreeMap;

use crate::averagine::AveragineTable;
use crate::config::ImmutableParameters;
use crate::monoisotope::pearson;
use crate::segment::{hash, Segment};

/// The result of building a decimator for one candidate.
pub struct Decimator {
    /// The theoretical cluster, in full-scan bucket coordinates, ready to
    /// be subtracted from a [`crate::segment::SparseScan`].
    pub full: BTreeMap<i64, f64>,
    /// Pearson correlation between the observed segment and the
    /// theoretical averagine row, over the truncated isotope range.
    pub correlation: f64,
    /// Count of observed isotopes above the 5%-of-max threshold.
    pub isotope_count: usize,
}

/// Build the decimator for a candidate `(segment, center_mz, charge,
/// mono_offset)` and score it against the averagine model
/// (spec.md §4.F).
///
/// `precise` selects the broadening radius: 2 buckets when the segment has
/// already been cleaned by the Disambigutron, or the default `error_range`
/// radius otherwise.
pub fn build_decimator(
    segment: &Segment,
    center_mz: f64,
    charge: u8,
    mono_offset: u8,
    averagine: &AveragineTable,
    params: &ImmutableParameters,
    min_isotope_count: usize,
    precise: bool,
) -> Decimator {
    let granularity = segment.granularity;
    let row_mass = center_mz * f64::from(charge);
    let row = averagine.fractions(row_mass);

    let radius = if precise {
        2
    } else {
        hash(params.error_range, granularity)
    };

    let mut full: BTreeMap<i64, f64> = BTreeMap::new();
    for (k, fraction) in row.iter().enumerate() {
        let iso_mz = center_mz + (k as f64 - f64::from(mono_offset)) / f64::from(charge.max(1));
        let iso_bucket = hash(iso_mz, granularity);
        for b in (iso_bucket - radius)..=(iso_bucket + radius) {
            let slot = full.entry(b).or_insert(0.0);
            *slot = slot.max(*fraction);
        }
    }

    let center_value = full.get(&segment.center_bucket).copied().unwrap_or(0.0);
    if center_value > 0.0 {
        let scale = params.augment_factor * segment.center_value() / center_value;
        for v in full.values_mut() {
            *v *= scale;
        }
    }

    let truncate_len = if charge < 4 {
        (usize::from(charge) + 2).min(row.len())
    } else {
        row.len()
    };

    let mut observed = Vec::with_capacity(truncate_len);
    let mut theoretical = Vec::with_capacity(truncate_len);
    for k in 0..truncate_len {
        let iso_mz = center_mz + (k as f64 - f64::from(mono_offset)) / f64::from(charge.max(1));
        let iso_bucket = hash(iso_mz, granularity);
        let segment_index = iso_bucket - (segment.center_bucket - segment.center as i64);
        let observed_value = if segment_index >= 0 && (segment_index as usize) < segment.len() {
            segment.values()[segment_index as usize]
        } else {
            0.0
        };
        observed.push(observed_value);
        theoretical.push(row[k]);
    }

    let max_observed = observed.iter().cloned().fold(0.0, f64::max);
    let mut isotope_count = observed
        .iter()
        .filter(|v| max_observed > 0.0 && **v >= 0.05 * max_observed)
        .count();
    if max_observed <= 0.0 {
        isotope_count = 0;
    }

    let mut correlation = pearson(&observed, &theoretical);
    if charge > 1 && isotope_count < min_isotope_count {
        correlation = 0.0;
    }

    Decimator {
        full,
        correlation,
        isotope_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::averagine::AveragineParams;
    use crate::scan::{Point, Spectrum};

    #[test]
    fn decimator_subtracts_without_positive_residue() {
        let params = ImmutableParameters::default();
        let averagine = AveragineTable::build(100.0, 90, AveragineParams::accurate());
        let center_mz = 751.88;
        let charge = 2u8;
        let spectrum = Spectrum::new(vec![
            Point::new(751.88, 1.583e8),
            Point::new(752.38, 1.196e8),
            Point::new(752.88, 5.525e7),
        ]);
        let half_width = (crate::charge::SEARCH_RADIUS_MZ * params.vector_granularity).round() as i64;
        let segment = Segment::extract(&spectrum, center_mz, half_width, params.vector_granularity);
        let decimator = build_decimator(&segment, center_mz, charge, 0, &averagine, &params, 3, false);

        assert!(decimator.correlation > 0.9, "correlation was {}", decimator.correlation);

        let mut scan = crate::segment::SparseScan::from_spectrum(&spectrum, params.vector_granularity);
        scan.subtract(&decimator.full);
        for (_, v) in scan.to_spectrum().points().iter().map(|p| (p.mz, p.intensity)) {
            assert!(v <= 1.0, "residue left: {v}");
        }
    }

    #[test]
    fn low_isotope_count_zeroes_correlation_for_multiply_charged() {
        let params = ImmutableParameters::default();
        let averagine = AveragineTable::build(100.0, 90, AveragineParams::accurate());
        let spectrum = Spectrum::new(vec![Point::new(751.88, 1.0)]);
        let half_width = (crate::charge::SEARCH_RADIUS_MZ * params.vector_granularity).round() as i64;
        let segment = Segment::extract(&spectrum, 751.88, half_width, params.vector_granularity);
        let decimator = build_decimator(&segment, 751.88, 2, 0, &averagine, &params, 3, false);
        assert_eq!(decimator.correlation, 0.0);
    }
}
