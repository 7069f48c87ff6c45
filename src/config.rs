//! Settable and immutable parameters (spec.md §6).
//!
//! `Settings` holds the user-tunable knobs and is serialized the way the
//! teacher crate serializes its own configuration-shaped types: plain
//! `#[derive(Serialize, Deserialize)]` structs, no builder macros.

use serde::{Deserialize, Serialize};

use crate::error::{FeatureFinderError, Result};

/// User-settable parameters (spec.md §6 "Settable parameters").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Minimum Pearson correlation between observed and theoretical
    /// isotope envelope for a charge-cluster record to be emitted.
    pub averagine_correlation_cutoff: f64,
    /// Minimum monoisotopic mass (Da) for an emitted charge-cluster record.
    pub min_feature_mass: f64,
    /// Maximum monoisotopic mass (Da) considered.
    pub max_feature_mass: f64,
    /// Minimum peak width, in minutes, for a feature's XIC window.
    pub min_peak_width_minutes: f64,
    /// Minimum number of scans a charge cluster must span to become a feature.
    pub min_scan_count: usize,
    /// Minimum observed isotope count for a charge-cluster record.
    pub min_isotope_count: usize,
    /// Multiplier `k` on the noise-floor standard deviation term.
    pub noise_factor_multiplier: f64,
    /// ppm mass tolerance for cross-sample grouping.
    pub ppm: f64,
    /// Whether the optional Byonic MS2-match enrichment step runs.
    pub enable_ms2_matching: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            averagine_correlation_cutoff: 0.75,
            min_feature_mass: 500.0,
            max_feature_mass: 8000.0,
            min_peak_width_minutes: 0.0,
            min_scan_count: 3,
            min_isotope_count: 3,
            noise_factor_multiplier: 3.0,
            ppm: 15.0,
            enable_ms2_matching: false,
        }
    }
}

impl Settings {
    /// Validate ranges before a run begins (spec.md §7 "Config" errors are
    /// fatal before the run begins, never mid-run).
    pub fn validate(&self) -> Result<()> {
        let check = |cond: bool, msg: &str| {
            if cond {
                Ok(())
            } else {
                Err(FeatureFinderError::Config(msg.to_string()))
            }
        };
        check(
            (0.0..=1.0).contains(&self.averagine_correlation_cutoff),
            "averagine_correlation_cutoff must be within [0, 1]",
        )?;
        check(
            self.min_feature_mass >= 0.0,
            "min_feature_mass must be non-negative",
        )?;
        check(
            self.min_feature_mass < self.max_feature_mass,
            "min_feature_mass must be less than max_feature_mass",
        )?;
        check(
            self.min_peak_width_minutes >= 0.0,
            "min_peak_width_minutes must be non-negative",
        )?;
        check(self.min_scan_count >= 1, "min_scan_count must be at least 1")?;
        check(
            self.min_isotope_count >= 1,
            "min_isotope_count must be at least 1",
        )?;
        check(
            self.noise_factor_multiplier >= 0.0,
            "noise_factor_multiplier must be non-negative",
        )?;
        check(self.ppm > 0.0, "ppm must be positive")?;
        Ok(())
    }

    /// Parse settings from a JSON document (spec.md §6 "Settable
    /// parameters" are expected to live in an ordinary config file).
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| FeatureFinderError::Config(format!("invalid settings JSON: {e}")))
    }

    /// Serialize settings to a JSON document.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| FeatureFinderError::Config(format!("could not serialize settings: {e}")))
    }
}

/// Parameters that are recorded for reproducibility but not user-facing
/// (spec.md §6 "Immutable parameters").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImmutableParameters {
    /// Buckets per m/z unit (`G` in spec.md §3).
    pub vector_granularity: f64,
    /// Half-width in Da of a comb-filter tooth's acceptance window.
    pub error_range: f64,
    /// Overshoot factor applied when building a decimator (§4.F).
    pub augment_factor: f64,
    /// Largest m/z bucketed by the dense full-scan representation.
    pub mz_max: f64,
    /// Radius in Da used to extract a uniform-intensity segment for charge
    /// clustering in candidate selection (§4.G).
    pub apex_charge_clustering: f64,
    /// Largest charge state considered.
    pub max_charge_state: u8,
    /// Comb-filter tooth count cap for charges above this value.
    pub comb_filter_teeth_charge_max: u8,
    /// DBSCAN epsilon for the feature collator (§4.I), in `(scan_index,
    /// mw*scale)` space.
    pub epsilon_dbscan: f64,
    /// Cap on ions processed per scan before truncation.
    pub max_ion_count: usize,
    /// Coarse RT tolerance, minutes, used for pivot-relative cropping.
    pub max_time_tolerance_coarse: f64,
    /// Warped-RT tolerance, minutes, used by the cross-sample collator.
    pub max_time_tolerance_warped: f64,
    /// Isotope intensity cutoff, as a fraction of the cluster max, below
    /// which an isotope position is not counted.
    pub isotope_cut_off_cluster_percent: f64,
    /// Scale factor `S` applied to mass before DBSCAN in the feature
    /// collator, so that mass and scan-index units are commensurable.
    pub dbscan_multiple: f64,
}

impl Default for ImmutableParameters {
    fn default() -> Self {
        Self {
            vector_granularity: 500.0,
            error_range: 0.02,
            augment_factor: 1.3,
            mz_max: 3100.0,
            apex_charge_clustering: 4.0,
            max_charge_state: 10,
            comb_filter_teeth_charge_max: 4,
            epsilon_dbscan: 5.01,
            max_ion_count: 1000,
            max_time_tolerance_coarse: 2.0,
            max_time_tolerance_warped: 0.08,
            isotope_cut_off_cluster_percent: 0.05,
            dbscan_multiple: 50.0,
        }
    }
}
