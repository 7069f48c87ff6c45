//! Charge Determinator (spec.md §4.C).
//!
//! The neural variant's comb-filter construction is ported directly from
//! `original_source/common_core_mini/src/algo/ChargeDeterminatorNN.cpp`
//! (`buildSuccessiveCombFilters`): per charge, a row per comb tooth plus,
//! for charges 1–3, an interleaved dimer-offset negative row; each row is
//! reduced against the segment as a sum (`comb . segment`), the resulting
//! vector is normalized by its own global max, and the per-charge
//! reductions are concatenated into one feature vector for the net.

use crate::config::ImmutableParameters;
use crate::nn::{comb_row_dot, CombRow, FeedForwardNet};
use crate::scan::{Point, Spectrum};
use crate::segment::{hash, Segment};

/// Search radius in m/z used to build a candidate's scan segment
/// (spec.md §3 "R ... fixed, ~4 Th").
pub const SEARCH_RADIUS_MZ: f64 = 4.0;

/// `W = round(R * G)`, the segment half-width in buckets.
pub fn segment_half_width(params: &ImmutableParameters) -> i64 {
    (SEARCH_RADIUS_MZ * params.vector_granularity).round() as i64
}

/// The comb filter rows for a single charge state.
pub type ChargeCombFilter = Vec<CombRow>;

/// Build the per-charge comb filters used by the neural charge determinator.
pub fn build_charge_comb_filters(params: &ImmutableParameters) -> Vec<ChargeCombFilter> {
    let half_width = segment_half_width(params);
    let error_range_hashed = hash(params.error_range, params.vector_granularity);
    let center_index = half_width;

    (1..=params.max_charge_state)
        .map(|charge| {
            let charge = i64::from(charge);
            let charge_distance = hash(crate::system::PROTON_MASS / charge as f64, params.vector_granularity);
            let is_dimer_charge = (1..=3).contains(&charge);
            let dimer_charge_distance = if is_dimer_charge {
                hash(1.0 / (charge as f64 * 2.0), params.vector_granularity)
            } else {
                0
            };
            let teeth = charge.min(i64::from(params.comb_filter_teeth_charge_max));

            let mut rows = Vec::new();
            for tooth in -teeth..=teeth {
                let tooth_index = center_index + tooth * charge_distance;
                let lo = tooth_index - error_range_hashed;
                let hi = tooth_index + error_range_hashed;
                if lo > 0 && hi < 2 * half_width {
                    let row: CombRow = (lo..=hi).filter_map(|i| usize::try_from(i).ok().map(|i| (i, 1.0))).collect();
                    rows.push(row);
                    if is_dimer_charge && tooth < teeth {
                        let dimer_lo = tooth_index + dimer_charge_distance - error_range_hashed;
                        let dimer_hi = tooth_index + dimer_charge_distance + error_range_hashed;
                        let dimer_row: CombRow = (dimer_lo..=dimer_hi)
                            .filter_map(|i| usize::try_from(i).ok().map(|i| (i, -1.0)))
                            .collect();
                        rows.push(dimer_row);
                    }
                }
            }
            rows
        })
        .collect()
}

/// Feature vector for the charge net: per charge, every comb row reduced
/// against the segment as a dot product (spec.md §4.C "`r = comb . segment`")
/// and then normalized by that charge's own max.
fn charge_feature_vector(segment: &Segment, combs: &[ChargeCombFilter]) -> Vec<f64> {
    let mut features = Vec::new();
    for comb in combs {
        let raw: Vec<f64> = comb.iter().map(|row| comb_row_dot(row, segment.values())).collect();
        let max = raw.iter().cloned().fold(0.0, f64::max);
        if max > 0.0 {
            features.extend(raw.iter().map(|v| v / max));
        } else {
            features.extend(std::iter::repeat(0.0).take(raw.len()));
        }
    }
    features
}

/// Determine the charge state of a candidate using the learned comb-filter
/// + feed-forward net pipeline (spec.md §4.C, neural variant).
///
/// Returns `0` on degenerate (all-zero) input; never panics.
pub fn determine_charge(segment: &Segment, net: &FeedForwardNet, combs: &[ChargeCombFilter]) -> u8 {
    if segment.is_all_zero() {
        return 0;
    }
    let features = charge_feature_vector(segment, combs);
    (net.argmax(&features) + 1) as u8
}

/// The classical, non-learned charge determinator used for averagine
/// round-trip tests (spec.md §4.C, classical variant): for each charge,
/// sum intensities within a small tolerance of `center_mz + k/charge` for
/// a handful of `k`, weighted by tooth count; largest wins, ties broken by
/// the smaller charge.
pub fn determine_charge_classical(
    spectrum: &Spectrum,
    center_mz: f64,
    max_charge: u8,
    tolerance_mz: f64,
) -> u8 {
    let mut best_charge = 0u8;
    let mut best_score = 0.0f64;
    for charge in 1..=max_charge {
        let mut score = 0.0;
        let mut teeth_matched = 0u32;
        for k in 0..=4i32 {
            let target = center_mz + f64::from(k) / f64::from(charge);
            let matched = nearest_intensity(spectrum, target, tolerance_mz);
            if let Some(intensity) = matched {
                score += intensity;
                teeth_matched += 1;
            }
        }
        if teeth_matched == 0 {
            continue;
        }
        let weighted = score * f64::from(teeth_matched);
        if weighted > best_score {
            best_score = weighted;
            best_charge = charge;
        }
    }
    best_charge
}

fn nearest_intensity(spectrum: &Spectrum, target_mz: f64, tolerance_mz: f64) -> Option<f64> {
    spectrum
        .range(target_mz - tolerance_mz, target_mz + tolerance_mz)
        .iter()
        .copied()
        .max_by(|a, b| a.intensity.partial_cmp(&b.intensity).unwrap())
        .map(|p| p.intensity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_segment_returns_zero() {
        let params = ImmutableParameters::default();
        let combs = build_charge_comb_filters(&params);
        let half_width = segment_half_width(&params) as usize;
        let seg = Segment::from_values(vec![0.0; 2 * half_width + 1], half_width, 0, params.vector_granularity);
        // A net that would always say "charge 3" if it got a chance.
        let w = crate::nn::Matrix::new(1, 1, vec![1.0]);
        let b = crate::nn::Matrix::new(1, 1, vec![0.0]);
        let net = FeedForwardNet::from_layers(vec![w.clone(), b.clone(), w.clone(), b.clone(), w, b]).unwrap();
        assert_eq!(determine_charge(&seg, &net, &combs), 0);
    }

    #[test]
    fn classical_recovers_charge_two_scenario_1() {
        // spec.md §8 scenario 1.
        let spectrum = Spectrum::new(vec![
            Point::new(751.88, 1.583e8),
            Point::new(752.38, 1.196e8),
            Point::new(752.88, 5.525e7),
        ]);
        let charge = determine_charge_classical(&spectrum, 751.88, 6, 0.02);
        assert_eq!(charge, 2);
    }

    #[test]
    fn classical_recovers_charge_four_scenario_2() {
        // spec.md §8 scenario 2: three isotopes of a charge-4 cluster
        // whose monoisotopic peak sits at 611.608.
        let spectrum = Spectrum::new(vec![
            Point::new(611.858, 8.33e6),
            Point::new(612.108, 6.25e6),
            Point::new(612.358, 3.55e6),
        ]);
        let charge = determine_charge_classical(&spectrum, 611.858, 6, 0.02);
        assert_eq!(charge, 4);
    }

    #[test]
    fn one_point_spectrum_has_no_charge_support() {
        let spectrum = Spectrum::new(vec![Point::new(500.0, 100.0)]);
        let charge = determine_charge_classical(&spectrum, 500.0, 10, 0.02);
        // A single peak with no higher isotopes still matches the k=0 tooth
        // for every charge; tie-break picks the smallest.
        assert_eq!(charge, 1);
    }
}
