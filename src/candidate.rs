//! Candidate Selector (spec.md §4.G).
//!
//! Grounded in
//! `original_source/common_core_mini/src/algo/FindMzToProcess.cpp`
//! (`searchFullScanForMzIterators`): compute a noise floor from the quiet
//! lower 80% of a scan's intensities, group everything above it into
//! charge clusters with a one-pass m/z-sorted DBSCAN, then for each
//! cluster of size > 1, iteratively pick the cluster's current
//! max-intensity point, determine its charge with the same neural charge
//! determinator the per-candidate loop uses, walk isotope-spaced positions
//! across the cluster's m/z span, pull a local intensity max out of each
//! position's small window, and keep the ones that are themselves local
//! maxima of that sequence. Extracted windows are zeroed out of the
//! cluster's working copy before the next iteration, so a cluster's
//! support is never double-counted; the cluster is abandoned once fewer
//! than 2 ions remain or the charge determinator gives up (charge 0).

use std::collections::BTreeMap;

use crate::charge::{self, ChargeCombFilter};
use crate::config::ImmutableParameters;
use crate::dbscan::{cluster, linear_scan_neighbors};
use crate::nn::FeedForwardNet;
use crate::scan::{Point, Spectrum};
use crate::segment::{hash, unhash, SparseScan};

/// One m/z position selected for full per-candidate processing
/// (spec.md §4.G, §4.H step 4a).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// The m/z a per-candidate segment should be centered on.
    pub center_mz: f64,
    /// The candidate peak's observed intensity.
    pub max_intensity: f64,
    /// The noise floor of the scan this candidate was selected from.
    pub scan_noise_floor: f64,
}

/// The DBSCAN m/z radius used to group raw peaks into charge-cluster
/// candidates (spec.md §4.G).
pub const CANDIDATE_EPS_MZ: f64 = 1.05;
/// Minimum points (inclusive of the point itself) to seed a cluster.
pub const CANDIDATE_MIN_POINTS: usize = 2;
/// Fraction of the lowest-intensity points used to estimate the noise floor.
const NOISE_FLOOR_QUANTILE: f64 = 0.8;

/// Median + `k * stdev` over the lowest 80% of a scan's intensities
/// (spec.md §4.G "noise floor").
pub fn noise_floor(spectrum: &Spectrum, noise_factor_multiplier: f64) -> f64 {
    let mut intensities: Vec<f64> = spectrum.points().iter().map(|p| p.intensity).collect();
    if intensities.is_empty() {
        return 0.0;
    }
    intensities.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let quiet_len = ((intensities.len() as f64) * NOISE_FLOOR_QUANTILE).ceil() as usize;
    let quiet_len = quiet_len.max(1).min(intensities.len());
    let quiet = &intensities[..quiet_len];

    let median = quiet[quiet.len() / 2];
    let mean: f64 = quiet.iter().sum::<f64>() / quiet.len() as f64;
    let variance: f64 = quiet.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / quiet.len() as f64;
    let stdev = variance.sqrt();

    median + noise_factor_multiplier * stdev
}

/// Select, sort and cap candidate m/z positions for one scan
/// (spec.md §4.G, §4.H step 3-4a). `full_scan` is the un-decimated residual
/// for this scan iteration (nothing has been subtracted from it yet); the
/// charge determinator reads its segments from there, exactly as
/// `FindMzToProcess` reads from the full scan rather than the
/// floor-filtered point list used only to seed clusters.
pub fn select_candidates(
    spectrum: &Spectrum,
    full_scan: &SparseScan,
    noise_factor_multiplier: f64,
    max_ion_count: usize,
    charge_net: &FeedForwardNet,
    charge_combs: &[ChargeCombFilter],
    params: &ImmutableParameters,
) -> Vec<Candidate> {
    let floor = noise_floor(spectrum, noise_factor_multiplier);
    let above_floor: Vec<Point> = spectrum.points().iter().copied().filter(|p| p.intensity > floor).collect();
    if above_floor.is_empty() {
        return Vec::new();
    }

    let labels = cluster(above_floor.len(), CANDIDATE_MIN_POINTS, |i| {
        linear_scan_neighbors(&above_floor, i, CANDIDATE_EPS_MZ, |a, b| (a.mz - b.mz).abs())
    });

    let mut cluster_members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        if let Some(cluster_id) = label {
            cluster_members.entry(*cluster_id).or_default().push(i);
        }
    }

    let granularity = params.vector_granularity;
    let half_width = charge::segment_half_width(params);
    let error_range_hashed = hash(params.error_range, granularity);

    let mut candidates = Vec::new();
    for members in cluster_members.values() {
        if members.len() < 2 {
            continue;
        }
        let cluster_lo_mz = above_floor[*members.iter().min().unwrap()].mz;
        let cluster_hi_mz = above_floor[*members.iter().max().unwrap()].mz;
        let lo_bucket = hash(cluster_lo_mz, granularity);
        let hi_bucket = hash(cluster_hi_mz, granularity);

        let mut working: BTreeMap<i64, f64> = BTreeMap::new();
        for bucket in lo_bucket..=hi_bucket {
            let value = full_scan.get(bucket);
            if value > 0.0 {
                working.insert(bucket, value);
            }
        }

        while working.len() >= 2 {
            let (&max_bucket, _) = working.iter().max_by(|a, b| a.1.partial_cmp(b.1).unwrap()).unwrap();
            let temp_mz = unhash(max_bucket, granularity);

            let segment = full_scan.extract_segment(temp_mz, half_width);
            let charge = charge::determine_charge(&segment, charge_net, charge_combs);
            if charge == 0 {
                break;
            }
            let charge_distance = 1.0 / f64::from(charge);

            let mut positions = Vec::new();
            let mut k = 0i64;
            loop {
                let mz = temp_mz - k as f64 * charge_distance;
                if mz < cluster_lo_mz {
                    break;
                }
                positions.push(mz);
                k += 1;
            }
            let mut k = 1i64;
            loop {
                let mz = temp_mz + k as f64 * charge_distance;
                if mz > cluster_hi_mz {
                    break;
                }
                positions.push(mz);
                k += 1;
            }
            positions.sort_by(|a, b| a.partial_cmp(b).unwrap());

            let mut extracted: Vec<(f64, Option<i64>)> = Vec::with_capacity(positions.len());
            for position in &positions {
                let center_bucket = hash(*position, granularity);
                let lo = center_bucket - error_range_hashed;
                let hi = center_bucket + error_range_hashed;
                let mut best = (0.0, None);
                for (&bucket, &value) in working.range(lo..=hi) {
                    if value > best.0 {
                        best = (value, Some(bucket));
                    }
                }
                extracted.push(best);
                for bucket in lo..=hi {
                    working.remove(&bucket);
                }
            }

            let sequence: Vec<f64> = extracted.iter().map(|(value, _)| *value).collect();
            for index in local_maxima_indices(&sequence) {
                if let (value, Some(bucket)) = extracted[index] {
                    candidates.push(Candidate {
                        center_mz: unhash(bucket, granularity),
                        max_intensity: value,
                        scan_noise_floor: floor,
                    });
                }
            }
        }
    }

    candidates.sort_by(|a, b| b.max_intensity.partial_cmp(&a.max_intensity).unwrap());
    candidates.truncate(max_ion_count);
    candidates
}

/// Indices of strict local maxima in a sequence, zero-padded at both ends
/// (spec.md §4.G; `findLocalMaxima` in
/// `original_source/common_core_mini/src/algo/FindMzToProcess.cpp`).
fn local_maxima_indices(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    (0..n)
        .filter(|&i| {
            let left = if i == 0 { 0.0 } else { values[i - 1] };
            let right = if i + 1 == n { 0.0 } else { values[i + 1] };
            values[i] > left && values[i] > right
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImmutableParameters;
    use crate::nn::Matrix;

    /// A net with enough inputs to accept any reasonably sized feature
    /// vector and that always favors a fixed output index, so tests don't
    /// need real trained weights.
    fn passthrough_charge_net(max_charge_state: u8, favored_charge: u8) -> FeedForwardNet {
        let output_len = usize::from(max_charge_state);
        let hidden = 4;
        let w1 = Matrix::new(1, hidden, vec![0.0; hidden]);
        let b1 = Matrix::new(1, hidden, vec![0.0; hidden]);
        let w2 = Matrix::new(hidden, hidden, vec![0.0; hidden * hidden]);
        let b2 = Matrix::new(1, hidden, vec![0.0; hidden]);
        let mut b3 = vec![-10.0; output_len];
        b3[usize::from(favored_charge) - 1] = 10.0;
        let w3 = Matrix::new(hidden, output_len, vec![0.0; hidden * output_len]);
        let b3 = Matrix::new(1, output_len, b3);
        FeedForwardNet::from_layers(vec![w1, b1, w2, b2, w3, b3]).unwrap()
    }

    #[test]
    fn empty_spectrum_has_no_candidates() {
        let params = ImmutableParameters::default();
        let combs = charge::build_charge_comb_filters(&params);
        let net = passthrough_charge_net(params.max_charge_state, 2);
        let spectrum = Spectrum::new(vec![]);
        let full_scan = SparseScan::from_spectrum(&spectrum, params.vector_granularity);
        assert!(select_candidates(&spectrum, &full_scan, 3.0, 1000, &net, &combs, &params).is_empty());
    }

    #[test]
    fn one_isotope_cluster_becomes_one_candidate() {
        // Monoisotopic peak plus one isotope 0.5 Th away (charge 2), well
        // within the 1.05 Da clustering radius; the charge net always
        // answers "charge 2".
        let params = ImmutableParameters::default();
        let combs = charge::build_charge_comb_filters(&params);
        let net = passthrough_charge_net(params.max_charge_state, 2);

        let background: Vec<Point> = (0..40).map(|i| Point::new(100.0 + i as f64 * 0.01, 1.0)).collect();
        let mut all = background;
        all.push(Point::new(751.88, 1.0e8));
        all.push(Point::new(752.38, 0.8e8));
        let spectrum = Spectrum::new(all);
        let full_scan = SparseScan::from_spectrum(&spectrum, params.vector_granularity);

        let candidates = select_candidates(&spectrum, &full_scan, 3.0, 1000, &net, &combs, &params);
        assert!(!candidates.is_empty());
        assert!(candidates.iter().any(|c| (c.center_mz - 751.88).abs() < 0.01));
    }

    #[test]
    fn candidates_sorted_by_descending_intensity() {
        let params = ImmutableParameters::default();
        let combs = charge::build_charge_comb_filters(&params);
        let net = passthrough_charge_net(params.max_charge_state, 2);

        let background: Vec<Point> = (0..40).map(|i| Point::new(100.0 + i as f64 * 0.01, 1.0)).collect();
        let mut all = background;
        all.push(Point::new(500.0, 5.0e6));
        all.push(Point::new(500.5, 4.0e6));
        all.push(Point::new(900.0, 9.0e6));
        all.push(Point::new(900.5, 7.0e6));
        let spectrum = Spectrum::new(all);
        let full_scan = SparseScan::from_spectrum(&spectrum, params.vector_granularity);

        let candidates = select_candidates(&spectrum, &full_scan, 3.0, 1000, &net, &combs, &params);
        assert!(candidates.windows(2).all(|w| w[0].max_intensity >= w[1].max_intensity));
    }

    #[test]
    fn max_ion_count_truncates() {
        let params = ImmutableParameters::default();
        let combs = charge::build_charge_comb_filters(&params);
        let net = passthrough_charge_net(params.max_charge_state, 1);

        let points: Vec<Point> = (0..20).map(|i| Point::new(200.0 + i as f64 * 0.3, 1.0e6 + i as f64)).collect();
        let spectrum = Spectrum::new(points);
        let full_scan = SparseScan::from_spectrum(&spectrum, params.vector_granularity);

        let candidates = select_candidates(&spectrum, &full_scan, 0.0, 5, &net, &combs, &params);
        assert!(candidates.len() <= 5);
    }

    #[test]
    fn single_point_never_clusters() {
        // DBSCAN with min_points=2 can't form a cluster from one point, so
        // it's dropped as noise and the charge net is never consulted.
        let params = ImmutableParameters::default();
        let combs = charge::build_charge_comb_filters(&params);
        let net = passthrough_charge_net(params.max_charge_state, 1);
        let spectrum = Spectrum::new(vec![Point::new(500.0, 10.0)]);
        let full_scan = SparseScan::from_spectrum(&spectrum, params.vector_granularity);
        let candidates = select_candidates(&spectrum, &full_scan, 0.0, 1000, &net, &combs, &params);
        assert!(candidates.is_empty());
    }
}
