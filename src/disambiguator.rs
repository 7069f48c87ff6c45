//! Spectra Disambigutron (spec.md §4.E).
//!
//! Named (verbatim tooth-narrowing behavior) after
//! `original_source/common_core_mini/src/algo/SpectraDisambigutron.cpp`:
//! for overlapping charge clusters, each comb tooth is narrowed down to
//! the single closest observed peak so the decimator doesn't straddle two
//! clusters sharing one m/z bin.

use crate::config::ImmutableParameters;
use crate::segment::{hash, Segment};

/// Small bucket radius `E` around each expected isotope tooth
/// (spec.md §4.E: "hash of 0.02 Da").
pub fn tooth_radius_buckets(params: &ImmutableParameters) -> i64 {
    hash(params.error_range, params.vector_granularity)
}

/// Narrow each comb tooth of `segment` to at most one peak, keeping the
/// bucket closest to the theoretical tooth center when more than one
/// nonzero bucket is present and that bucket holds at least 5% of the
/// previous tooth's kept intensity; otherwise keep everything observed.
pub fn remove_overlapping_ions(segment: &Segment, charge: u8, params: &ImmutableParameters) -> Segment {
    let tooth_radius = tooth_radius_buckets(params);
    let charge_distance = hash(crate::system::PROTON_MASS / f64::from(charge.max(1)), params.vector_granularity);
    let center = segment.center as i64;

    let mut cleaned = vec![0.0; segment.len()];
    let mut previous_kept_intensity = segment.center_value();

    let teeth = i64::from(charge.min(params.comb_filter_teeth_charge_max));
    for tooth in -teeth..=teeth {
        let tooth_center = center + tooth * charge_distance;
        let lo = (tooth_center - tooth_radius).max(0);
        let hi = (tooth_center + tooth_radius).min(segment.len() as i64 - 1);
        if lo > hi {
            continue;
        }
        let window: Vec<(usize, f64)> = (lo..=hi)
            .map(|i| i as usize)
            .filter(|i| segment.values()[*i] > 0.0)
            .map(|i| (i, segment.values()[i]))
            .collect();

        if window.len() <= 1 {
            for (i, v) in window {
                cleaned[i] = v;
            }
        } else {
            let threshold = 0.05 * previous_kept_intensity;
            let closest = window
                .iter()
                .filter(|(_, v)| *v >= threshold)
                .min_by_key(|(i, _)| (*i as i64 - tooth_center).abs())
                .or_else(|| window.iter().min_by_key(|(i, _)| (*i as i64 - tooth_center).abs()));
            if let Some((i, v)) = closest {
                cleaned[*i] = *v;
                previous_kept_intensity = *v;
            }
        }
    }

    Segment::from_values(cleaned, segment.center, segment.center_bucket, segment.granularity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bucket_tooth_is_untouched() {
        let params = ImmutableParameters::default();
        let half_width = (crate::charge::SEARCH_RADIUS_MZ * params.vector_granularity).round() as usize;
        let mut values = vec![0.0; 2 * half_width + 1];
        values[half_width] = 100.0;
        let seg = Segment::from_values(values, half_width, 0, params.vector_granularity);
        let cleaned = remove_overlapping_ions(&seg, 2, &params);
        assert_eq!(cleaned.center_value(), 100.0);
    }

    #[test]
    fn at_most_one_peak_per_tooth() {
        let params = ImmutableParameters::default();
        let half_width = (crate::charge::SEARCH_RADIUS_MZ * params.vector_granularity).round() as usize;
        let mut values = vec![0.0; 2 * half_width + 1];
        let charge_distance = hash(crate::system::PROTON_MASS / 2.0, params.vector_granularity);
        let tooth_center = half_width as i64 + charge_distance;
        values[half_width] = 100.0;
        // Two overlapping peaks within the same tooth window.
        values[(tooth_center - 1) as usize] = 40.0;
        values[(tooth_center + 1) as usize] = 38.0;
        let seg = Segment::from_values(values, half_width, 0, params.vector_granularity);
        let cleaned = remove_overlapping_ions(&seg, 2, &params);
        let tooth_radius = tooth_radius_buckets(&params);
        let lo = (tooth_center - tooth_radius).max(0) as usize;
        let hi = (tooth_center + tooth_radius).min(cleaned.len() as i64 - 1) as usize;
        let nonzero = cleaned.values()[lo..=hi].iter().filter(|v| **v > 0.0).count();
        assert!(nonzero <= 1);
    }
}
