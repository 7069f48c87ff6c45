//! Monoisotope Determinator (spec.md §4.D).
//!
//! The neural comb-filter construction is ported from
//! `original_source/common_core_mini/src/algo/MonoisotopeDeterminatorNN.cpp`
//! (`buildSuccessiveCombFiltersMono`): per charge, one comb matrix per
//! trial offset `roll`, each row summed (not maxed) against the segment
//! normalized by its own center-bucket value, with a scalar `mw` term
//! prepended to the feature vector ahead of the three-layer net.

use crate::averagine::AveragineTable;
use crate::config::ImmutableParameters;
use crate::nn::{comb_row_dot, CombRow, FeedForwardNet};
use crate::segment::{hash, Segment};

/// The comb filter rows for one trial offset, for one charge.
pub type MonoCombFilter = Vec<CombRow>;

/// Build, for every charge `1..=max_charge_state`, the set of comb
/// matrices indexed by trial offset `roll in 0..=charge+1`.
pub fn build_monoisotope_comb_filters(params: &ImmutableParameters) -> Vec<Vec<MonoCombFilter>> {
    let error_range_hashed = hash(params.error_range, params.vector_granularity);
    let center_index = (crate::charge::SEARCH_RADIUS_MZ * params.vector_granularity).round() as i64;

    (1..=params.max_charge_state)
        .map(|charge| {
            let charge_i = i64::from(charge);
            let charge_distance = hash(1.0 / f64::from(charge), params.vector_granularity);
            let teeth = charge_i + 1;

            (0..=charge_i + 1)
                .map(|roll| {
                    let mut rows: MonoCombFilter = Vec::new();
                    for tooth in -teeth..=0 {
                        let tooth_index = center_index + charge_distance * (tooth + roll);
                        let lo = tooth_index - error_range_hashed;
                        let hi = tooth_index + error_range_hashed;
                        if lo > 0 && hi <= 2 * center_index {
                            if tooth == -teeth {
                                let neg_lo = lo - charge_distance;
                                let neg_hi = hi - charge_distance;
                                let neg_row: CombRow = (neg_lo..=neg_hi)
                                    .filter_map(|i| usize::try_from(i).ok().map(|i| (i, -1.0)))
                                    .collect();
                                rows.push(neg_row);
                            }
                            let row: CombRow =
                                (lo..=hi).filter_map(|i| usize::try_from(i).ok().map(|i| (i, 1.0))).collect();
                            rows.push(row);
                        }
                    }
                    rows
                })
                .collect()
        })
        .collect()
}

/// Feature vector for the monoisotope net of a given charge: the scaled
/// `mw` scalar, then every roll's comb rows summed against the
/// center-normalized segment.
fn monoisotope_feature_vector(segment: &Segment, center_mz: f64, charge: u8, combs: &[MonoCombFilter]) -> Vec<f64> {
    const MW_SCALING: f64 = 100.0;
    let center = segment.center_value();
    let normalized: Vec<f64> = if center > 0.0 {
        segment.values().iter().map(|v| v / center).collect()
    } else {
        segment.values().to_vec()
    };

    let mw = f64::from(charge) * center_mz / MW_SCALING;
    let mut features = vec![mw / MW_SCALING];
    for comb in combs {
        // comb[0] is the negative-tooth row built to shape training input;
        // the net itself never sees it (original_source
        // MonoisotopeDeterminatorNN.cpp starts its push loop at i = 1).
        for row in comb.iter().skip(1) {
            features.push(comb_row_dot(row, &normalized));
        }
    }
    features
}

/// Determine the monoisotope offset using the learned comb-filter +
/// feed-forward net pipeline (spec.md §4.D, neural variant). `charge` must
/// be in `1..=max_charge_state`.
pub fn determine_monoisotope_offset(
    segment: &Segment,
    center_mz: f64,
    charge: u8,
    net: &FeedForwardNet,
    combs: &[MonoCombFilter],
) -> u8 {
    if segment.is_all_zero() || charge == 0 {
        return 0;
    }
    let features = monoisotope_feature_vector(segment, center_mz, charge, combs);
    net.argmax(&features) as u8
}

/// A "bent comb": leftmost tooth coefficient `-4`, remaining teeth `+1`
/// (spec.md §4.D, classical variant).
fn bent_comb(offset_index: i64, num_teeth: u8) -> Vec<(i64, f64)> {
    (0..num_teeth)
        .map(|tooth| {
            let position = offset_index + i64::from(tooth);
            let coeff = if tooth == 0 { -4.0 } else { 1.0 };
            (position, coeff)
        })
        .collect()
}

/// The classical monoisotope determinator used for averagine round-trip
/// tests (spec.md §4.D, classical variant): roll a bent comb across
/// candidate offsets, correlate against the averagine row for
/// `m = round(center_mz * charge)`, return the offset of maximum Pearson
/// correlation and that correlation's score.
pub fn determine_monoisotope_offset_classical(
    isotope_intensities: &[f64],
    charge: u8,
    averagine: &AveragineTable,
    center_mz: f64,
    max_offset: u8,
) -> (u8, f64) {
    let row_mass = center_mz * f64::from(charge);
    let reference = averagine.fractions(row_mass);
    let num_teeth = reference.len().max(3) as u8;

    let mut best_offset = 0u8;
    let mut best_score = f64::MIN;
    for offset in 0..=max_offset {
        let comb = bent_comb(i64::from(offset), num_teeth);
        let rolled: Vec<f64> = comb
            .iter()
            .map(|(idx, coeff)| {
                let i = *idx as usize;
                isotope_intensities.get(i).copied().unwrap_or(0.0) * coeff
            })
            .collect();
        let score = pearson(&rolled, reference);
        if score > best_score {
            best_score = score;
            best_offset = offset;
        }
    }
    (best_offset, best_score.max(-1.0))
}

/// Pearson correlation coefficient between two equal-length (or
/// shorter-truncated) slices. Returns 0.0 for degenerate (zero-variance)
/// input rather than NaN (spec.md §7 "Data" — NaN from a degenerate
/// correlation is treated as 0).
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let a = &a[..n];
    let b = &b[..n];
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    let r = cov / (var_a.sqrt() * var_b.sqrt());
    if r.is_nan() {
        0.0
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::averagine::AveragineParams;

    #[test]
    fn pearson_of_identical_vectors_is_one() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_of_constant_vector_is_zero_not_nan() {
        let v = [1.0, 1.0, 1.0];
        let w = [2.0, 3.0, 4.0];
        assert_eq!(pearson(&v, &w), 0.0);
    }

    #[test]
    fn classical_prefers_zero_offset_on_exact_monoisotopic_peak() {
        let table = AveragineTable::build(100.0, 30, AveragineParams::accurate());
        let reference = table.fractions(1500.0).to_vec();
        let (offset, score) = determine_monoisotope_offset_classical(&reference, 1, &table, 750.0, 4);
        assert_eq!(offset, 0);
        assert!(score > 0.5);
    }
}
