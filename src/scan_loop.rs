//! Per-scan loop (spec.md §4.H): Load -> HashToSparse -> SelectCandidates
//! -> PerCandidate -> Done.
//!
//! Grounded in
//! `original_source/src/ScanIterator.cpp` and
//! `original_source/src/utils/MultiSampleScanFeatureFinder.cpp`: one
//! [`ScanProcessor`] is built once per run (it owns the comb filters and
//! nets, which are immutable and shared across every scan) and then drives
//! components A-G for every candidate in a scan, always subtracting a
//! candidate's decimator from the residual regardless of whether it
//! clears the emission thresholds, so a rejected candidate's peaks are
//! never reconsidered as a fresh candidate later in the same scan.

use tracing::{debug, trace};

use crate::averagine::{AveragineParams, AveragineTable};
use crate::candidate::select_candidates;
use crate::charge::{self, ChargeCombFilter};
use crate::config::{ImmutableParameters, Settings};
use crate::disambiguator::remove_overlapping_ions;
use crate::error::Result;
use crate::feature::ChargeClusterRecord;
use crate::monoisotope::{self, MonoCombFilter};
use crate::nn::{FeedForwardNet, WeightsStore};
use crate::scan::{monoisotopic_mass, Scan};
use crate::segment::SparseScan;

/// NN weights model id for the charge determinator (spec.md §6).
pub const CHARGE_MODEL_ID: u32 = 1;

/// NN weights model id for the monoisotope determinator of a given charge
/// (spec.md §6: "models 2..=11 are the per-charge monoisotope determinators").
pub fn monoisotope_model_id(charge: u8) -> u32 {
    u32::from(charge) + 1
}

/// Da per row of the shared averagine table, and enough rows to cover
/// every mass up to `max_feature_mass`'s usual range.
const AVERAGINE_TABLE_STEP: f64 = 100.0;
const AVERAGINE_TABLE_ROWS: usize = 400;

/// Owns everything that is built once per run and shared read-only across
/// every scan iteration: the comb filters, the loaded nets, and the
/// averagine table (spec.md §5, §9 "shared, read-only across scan
/// iterations").
pub struct ScanProcessor {
    params: ImmutableParameters,
    charge_net: FeedForwardNet,
    charge_combs: Vec<ChargeCombFilter>,
    mono_nets: Vec<FeedForwardNet>,
    mono_combs: Vec<Vec<MonoCombFilter>>,
    averagine: AveragineTable,
}

impl ScanProcessor {
    /// Build a processor, loading the charge net (model 1) and one
    /// monoisotope net per charge state (models 2..=max_charge_state+1)
    /// from `weights`.
    pub fn new(weights: &dyn WeightsStore, params: ImmutableParameters, averagine_params: AveragineParams) -> Result<Self> {
        let charge_net = FeedForwardNet::from_layers(weights.get_weights(CHARGE_MODEL_ID)?)?;
        let mut mono_nets = Vec::with_capacity(usize::from(params.max_charge_state));
        for charge in 1..=params.max_charge_state {
            let layers = weights.get_weights(monoisotope_model_id(charge))?;
            mono_nets.push(FeedForwardNet::from_layers(layers)?);
        }

        let charge_combs = charge::build_charge_comb_filters(&params);
        let mono_combs = monoisotope::build_monoisotope_comb_filters(&params);
        let averagine = AveragineTable::build(AVERAGINE_TABLE_STEP, AVERAGINE_TABLE_ROWS, averagine_params);

        Ok(Self {
            params,
            charge_net,
            charge_combs,
            mono_nets,
            mono_combs,
            averagine,
        })
    }

    /// Run components A-G over one MS1 scan, emitting the charge-cluster
    /// records that clear the emission thresholds (spec.md §4.H).
    ///
    /// Per spec.md §7, a single candidate's failure to resolve never fails
    /// the scan: it is skipped and the loop continues.
    pub fn process_scan(&self, scan: &Scan, settings: &Settings) -> Vec<ChargeClusterRecord> {
        if !scan.is_ms1() {
            return Vec::new();
        }

        let truncated = scan.spectrum.truncate_by_intensity(self.params.max_ion_count);
        let mut residual = SparseScan::from_spectrum(&truncated, self.params.vector_granularity);

        let candidates = select_candidates(
            &truncated,
            &residual,
            settings.noise_factor_multiplier,
            self.params.max_ion_count,
            &self.charge_net,
            &self.charge_combs,
            &self.params,
        );
        trace!(scan_index = scan.scan_index, candidates = candidates.len(), "selected candidates");

        let half_width = charge::segment_half_width(&self.params);
        let mut records = Vec::new();

        for candidate in candidates {
            let segment = residual.extract_segment(candidate.center_mz, half_width);
            let charge = charge::determine_charge(&segment, &self.charge_net, &self.charge_combs);
            if charge == 0 || usize::from(charge) > self.mono_nets.len() {
                continue;
            }

            let cleaned = remove_overlapping_ions(&segment, charge, &self.params);
            let mono_net = &self.mono_nets[usize::from(charge) - 1];
            let mono_combs_for_charge = &self.mono_combs[usize::from(charge) - 1];
            let mono_offset =
                monoisotope::determine_monoisotope_offset(&cleaned, candidate.center_mz, charge, mono_net, mono_combs_for_charge);

            let decimator = crate::subtractor::build_decimator(
                &cleaned,
                candidate.center_mz,
                charge,
                mono_offset,
                &self.averagine,
                &self.params,
                settings.min_isotope_count,
                true,
            );

            // Always subtract, whether or not the candidate is emitted, so
            // its peaks are not reconsidered later in the same scan.
            residual.subtract(&decimator.full);

            let mw = monoisotopic_mass(candidate.center_mz, charge, mono_offset).value;
            if mw < settings.min_feature_mass || mw > settings.max_feature_mass {
                continue;
            }
            if decimator.correlation < settings.averagine_correlation_cutoff {
                continue;
            }

            records.push(ChargeClusterRecord {
                scan_index: scan.scan_index,
                vendor_scan_number: scan.vendor_scan_number,
                retention_time_minutes: scan.retention_time_minutes,
                mz_found: candidate.center_mz,
                max_intensity: candidate.max_intensity,
                mw_monoisotopic: mw,
                mono_offset,
                correlation: decimator.correlation,
                charge,
                isotope_count: decimator.isotope_count,
                scan_noise_floor: candidate.scan_noise_floor,
            });
        }

        debug!(scan_index = scan.scan_index, emitted = records.len(), "scan processed");
        records
    }
}

impl std::fmt::Debug for ScanProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanProcessor")
            .field("params", &self.params)
            .field("charge_states", &self.mono_nets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{InMemoryWeightsStore, Matrix};
    use crate::scan::{Point, Spectrum};

    fn passthrough_net(output_len: usize, favored: usize) -> Vec<Matrix> {
        // A net with enough inputs to accept any reasonably sized feature
        // vector and that always favors a fixed output index, used to make
        // scan-loop tests deterministic without real trained weights.
        let hidden = 4;
        let w1 = Matrix::new(1, hidden, vec![0.0; hidden]);
        let b1 = Matrix::new(1, hidden, vec![0.0; hidden]);
        let w2 = Matrix::new(hidden, hidden, vec![0.0; hidden * hidden]);
        let b2 = Matrix::new(1, hidden, vec![0.0; hidden]);
        let mut b3 = vec![-10.0; output_len];
        b3[favored] = 10.0;
        let w3 = Matrix::new(hidden, output_len, vec![0.0; hidden * output_len]);
        let b3 = Matrix::new(1, output_len, b3);
        vec![w1, b1, w2, b2, w3, b3]
    }

    #[test]
    fn empty_scan_yields_no_records() {
        let params = ImmutableParameters::default();
        let mut store = InMemoryWeightsStore::default();
        store.insert(CHARGE_MODEL_ID, passthrough_net(params.max_charge_state as usize, 0));
        for charge in 1..=params.max_charge_state {
            store.insert(monoisotope_model_id(charge), passthrough_net(usize::from(charge) + 2, 0));
        }
        let processor = ScanProcessor::new(&store, params, AveragineParams::accurate()).unwrap();
        let scan = Scan {
            scan_index: 0,
            vendor_scan_number: 1,
            retention_time_minutes: 1.0,
            ms_level: 1,
            spectrum: Spectrum::new(vec![]),
        };
        let settings = Settings::default();
        assert!(processor.process_scan(&scan, &settings).is_empty());
    }

    #[test]
    fn ms2_scans_are_skipped() {
        let params = ImmutableParameters::default();
        let mut store = InMemoryWeightsStore::default();
        store.insert(CHARGE_MODEL_ID, passthrough_net(params.max_charge_state as usize, 1));
        for charge in 1..=params.max_charge_state {
            store.insert(monoisotope_model_id(charge), passthrough_net(usize::from(charge) + 2, 0));
        }
        let processor = ScanProcessor::new(&store, params, AveragineParams::accurate()).unwrap();
        let scan = Scan {
            scan_index: 0,
            vendor_scan_number: 1,
            retention_time_minutes: 1.0,
            ms_level: 2,
            spectrum: Spectrum::new(vec![Point::new(751.88, 1.0e8)]),
        };
        let settings = Settings::default();
        assert!(processor.process_scan(&scan, &settings).is_empty());
    }
}
