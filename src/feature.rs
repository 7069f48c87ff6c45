//! Charge-cluster records and collated features (spec.md §3, §4.I).
//!
//! Grounded in
//! `original_source/src/CollateChargeClustersToFeatures.cpp`: charge
//! clusters seen across neighboring scans are grouped into features by
//! DBSCAN in `(scan_index, mw * S)` space, where `S` makes mass
//! differences and scan-index differences commensurable.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::ImmutableParameters;
use crate::dbscan::cluster;

/// One charge-determined isotope cluster observed in a single scan
/// (spec.md §3 "ChargeClusterRecord").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargeClusterRecord {
    /// Zero-based scan index this record was observed in.
    pub scan_index: usize,
    /// The vendor's own scan number.
    pub vendor_scan_number: u64,
    /// Retention time, minutes.
    pub retention_time_minutes: f64,
    /// The candidate m/z the segment was centered on.
    pub mz_found: f64,
    /// Observed intensity at `mz_found`.
    pub max_intensity: f64,
    /// Neutral monoisotopic mass, Da.
    pub mw_monoisotopic: f64,
    /// Isotope offset from the observed peak to the monoisotopic peak.
    pub mono_offset: u8,
    /// Pearson correlation between observed and theoretical isotope envelope.
    pub correlation: f64,
    /// Determined charge state.
    pub charge: u8,
    /// Count of observed isotopes above the cluster's cutoff.
    pub isotope_count: usize,
    /// The noise floor of the scan this record was observed in.
    pub scan_noise_floor: f64,
}

/// A charge cluster's trajectory across scans, collated into one feature
/// (spec.md §3 "Feature").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Retention time of the first member record, minutes.
    pub xic_start_rt: f64,
    /// Retention time of the last member record, minutes.
    pub xic_end_rt: f64,
    /// Retention time of the most intense member record, minutes.
    pub apex_rt: f64,
    /// Neutral monoisotopic mass at the apex, Da.
    pub mw_monoisotopic: f64,
    /// Correlation at the apex.
    pub max_corr: f64,
    /// Intensity at the apex.
    pub max_intensity: f64,
    /// Number of member charge-cluster records.
    pub ion_count: usize,
    /// Distinct charge states observed across the member records, in the
    /// order they first appear when members are sorted by decreasing
    /// intensity.
    pub charge_order: Vec<u8>,
    /// Isotope count at the apex.
    pub max_isotope_count: usize,
}

impl Feature {
    fn from_members(members: &[ChargeClusterRecord]) -> Self {
        let mut by_rt: Vec<&ChargeClusterRecord> = members.iter().collect();
        by_rt.sort_by(|a, b| a.retention_time_minutes.partial_cmp(&b.retention_time_minutes).unwrap());

        let xic_start_rt = by_rt.first().unwrap().retention_time_minutes;
        let xic_end_rt = by_rt.last().unwrap().retention_time_minutes;
        let apex = members
            .iter()
            .max_by(|a, b| a.max_intensity.partial_cmp(&b.max_intensity).unwrap())
            .unwrap();

        let mut by_intensity: Vec<&ChargeClusterRecord> = members.iter().collect();
        by_intensity.sort_by(|a, b| b.max_intensity.partial_cmp(&a.max_intensity).unwrap());
        let mut charge_order: Vec<u8> = Vec::new();
        for record in &by_intensity {
            if !charge_order.contains(&record.charge) {
                charge_order.push(record.charge);
            }
        }

        Self {
            xic_start_rt,
            xic_end_rt,
            apex_rt: apex.retention_time_minutes,
            mw_monoisotopic: apex.mw_monoisotopic,
            max_corr: apex.correlation,
            max_intensity: apex.max_intensity,
            ion_count: members.len(),
            charge_order,
            max_isotope_count: apex.isotope_count,
        }
    }
}

/// Collate charge-cluster records into features by DBSCAN in
/// `(scan_index, mw_monoisotopic * dbscan_multiple)` space (spec.md §4.I).
/// `min_scan_count` is used directly as DBSCAN's `min_points`: a feature
/// must be supported by at least that many scans.
pub fn collate(records: &[ChargeClusterRecord], params: &ImmutableParameters, min_scan_count: usize) -> Vec<Feature> {
    if records.is_empty() {
        return Vec::new();
    }
    let eps = params.epsilon_dbscan;
    let scale = params.dbscan_multiple;

    let distance = |a: &ChargeClusterRecord, b: &ChargeClusterRecord| -> f64 {
        let dscan = a.scan_index as f64 - b.scan_index as f64;
        let dmass = (a.mw_monoisotopic - b.mw_monoisotopic) * scale;
        (dscan * dscan + dmass * dmass).sqrt()
    };

    let labels = cluster(records.len(), min_scan_count, |i| {
        (0..records.len()).filter(|&j| distance(&records[i], &records[j]) <= eps).collect()
    });

    let by_cluster: std::collections::HashMap<usize, Vec<ChargeClusterRecord>> = labels
        .iter()
        .enumerate()
        .filter_map(|(i, label)| label.map(|cluster_id| (cluster_id, records[i])))
        .into_group_map();

    let mut features: Vec<Feature> = by_cluster.values().map(|members| Feature::from_members(members)).collect();
    features.sort_by(|a, b| b.max_intensity.partial_cmp(&a.max_intensity).unwrap());
    features
}
