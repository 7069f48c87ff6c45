//! Top-level orchestration (spec.md §4.H integration, §4.J/§4.K,
//! §5 "Concurrency & Resource Model").
//!
//! Grounded in
//! `original_source/src/utils/MultiSampleScanFeatureFinder.cpp`: one
//! sample is processed scan-by-scan, sequentially, because each scan's
//! [`crate::segment::SparseScan`] owns the previous scan's residual state;
//! cross-sample collation is the one stage that is embarrassingly
//! parallel (every sample's alignment is independent once its features
//! exist), so it is the one stage built on `rayon`, mirroring the
//! teacher's own optional `rayon` feature for its own batch-oriented work.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{info, info_span, warn};

use crate::averagine::AveragineParams;
use crate::config::{ImmutableParameters, Settings};
use crate::cross_sample::{collate_cross_sample, MasterFeature, SampleFeatures};
use crate::error::Result;
use crate::feature::{self, ChargeClusterRecord, Feature};
use crate::interfaces::{CrossSampleSink, TabularSink, VendorReader};
use crate::nn::WeightsStore;
use crate::scan_loop::ScanProcessor;
use crate::warp::{self, Landmark, TimeWarp};

/// Aggregate counters and per-sample status for one run
/// (spec.md §6 "RunSummary").
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub scans_processed: usize,
    pub candidates_considered: usize,
    pub clusters_emitted: usize,
    pub features_emitted: usize,
    pub master_features_emitted: usize,
    pub sample_outcomes: Vec<SampleOutcome>,
}

/// Whether one sample's processing succeeded, and why not if it didn't
/// (spec.md §7: a sample's own Input/Config/Transient error ends that
/// sample but never the whole batch).
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub sample_id: usize,
    pub ok: bool,
    pub reason: Option<String>,
}

/// Run components A-I over every MS1 scan of one sample (spec.md §4.H),
/// writing charge-cluster records and collated features to `sink` as they
/// are produced. `cancel` is polled at each scan boundary so a caller can
/// stop a long run between scans without tearing down mid-scan state.
pub fn run_sample(
    reader: &mut dyn VendorReader,
    weights: &dyn WeightsStore,
    params: ImmutableParameters,
    settings: &Settings,
    averagine_params: AveragineParams,
    sink: &mut dyn TabularSink,
    cancel: &AtomicBool,
) -> Result<(RunSummary, Vec<ChargeClusterRecord>, Vec<Feature>)> {
    settings.validate()?;
    reader.open()?;

    let scan_infos = reader.scan_info_list()?;
    let processor = ScanProcessor::new(weights, params, averagine_params)?;

    let mut all_records = Vec::new();
    let mut scans_processed = 0usize;

    for (scan_index, info) in scan_infos.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            info!(scan_index, "run cancelled at scan boundary");
            break;
        }
        if info.scan_level != 1 {
            continue;
        }

        let scan = reader.scan_data(scan_index)?;
        let span = info_span!("scan", scan_index);
        let _enter = span.enter();

        let records = processor.process_scan(&scan, settings);
        scans_processed += 1;
        for record in &records {
            sink.write_charge_cluster(record)?;
        }
        all_records.extend(records);
    }

    reader.close()?;

    let features = feature::collate(&all_records, &params, settings.min_scan_count);
    for f in &features {
        sink.write_feature(f)?;
    }
    sink.finish()?;

    let summary = RunSummary {
        scans_processed,
        candidates_considered: all_records.len(),
        clusters_emitted: all_records.len(),
        features_emitted: features.len(),
        master_features_emitted: 0,
        sample_outcomes: Vec::new(),
    };
    Ok((summary, all_records, features))
}

/// Run `run_sample` over every sample, tolerating per-sample failures
/// (spec.md §7 "Transient"/"Input"/"Config" errors end a sample, never the
/// batch), then collate every sample's features into master features
/// (spec.md §4.J, §4.K).
#[allow(clippy::too_many_arguments)]
pub fn run_study(
    samples: &mut [(usize, &mut dyn VendorReader, &mut dyn TabularSink)],
    weights: &dyn WeightsStore,
    params: ImmutableParameters,
    settings: &Settings,
    averagine_params: AveragineParams,
    cross_sink: &mut dyn CrossSampleSink,
    cancel: &AtomicBool,
) -> Result<(RunSummary, Vec<MasterFeature>)> {
    let mut outcomes = Vec::with_capacity(samples.len());
    let mut per_sample_features: Vec<(usize, Vec<Feature>)> = Vec::with_capacity(samples.len());
    let mut total = RunSummary::default();

    for (sample_id, reader, sink) in samples.iter_mut() {
        match run_sample(*reader, weights, params, settings, averagine_params, *sink, cancel) {
            Ok((summary, _records, features)) => {
                total.scans_processed += summary.scans_processed;
                total.candidates_considered += summary.candidates_considered;
                total.clusters_emitted += summary.clusters_emitted;
                total.features_emitted += summary.features_emitted;
                per_sample_features.push((*sample_id, features));
                outcomes.push(SampleOutcome {
                    sample_id: *sample_id,
                    ok: true,
                    reason: None,
                });
            }
            Err(err) => {
                warn!(sample_id, error = %err, "sample failed, continuing with remaining samples");
                outcomes.push(SampleOutcome {
                    sample_id: *sample_id,
                    ok: false,
                    reason: Some(err.reason()),
                });
            }
        }
    }

    let (cross_summary, masters) = run_cross_sample(&per_sample_features, settings, &params, cross_sink)?;
    total.master_features_emitted = cross_summary.master_features_emitted;
    total.sample_outcomes = outcomes;

    Ok((total, masters))
}

/// Collate multiple samples' features into master features
/// (spec.md §4.J "time-warp builder", §4.K "cross-sample collator").
/// Pivot selection and alignment happen once per sample and are
/// independent of each other, so they run in parallel via `rayon`.
pub fn run_cross_sample(
    samples: &[(usize, Vec<Feature>)],
    settings: &Settings,
    params: &ImmutableParameters,
    sink: &mut dyn CrossSampleSink,
) -> Result<(RunSummary, Vec<MasterFeature>)> {
    if samples.is_empty() {
        sink.finish()?;
        return Ok((RunSummary::default(), Vec::new()));
    }

    let landmark_lists: Vec<Vec<Landmark>> = samples
        .iter()
        .map(|(_, features)| {
            features
                .iter()
                .map(|f| Landmark {
                    rt: f.apex_rt,
                    mz: f.mw_monoisotopic,
                    intensity: f.max_intensity,
                })
                .collect()
        })
        .collect();

    let pivot_index = warp::select_pivot(&landmark_lists, 200);

    let warps: Vec<TimeWarp> = (0..samples.len())
        .into_par_iter()
        .map(|i| {
            if i == pivot_index {
                TimeWarp::identity()
            } else {
                warp::align_to_pivot(&landmark_lists[pivot_index], &landmark_lists[i], settings.ppm)
            }
        })
        .collect();

    let sample_features: Vec<SampleFeatures> = samples
        .iter()
        .zip(warps)
        .map(|((sample_id, features), warp)| SampleFeatures {
            sample_id: *sample_id,
            features: features.clone(),
            warp,
        })
        .collect();

    let masters = collate_cross_sample(&sample_features, settings.ppm, params.max_time_tolerance_warped, true);
    for master in &masters {
        sink.write_master_feature(master)?;
    }
    sink.finish()?;

    let summary = RunSummary {
        master_features_emitted: masters.len(),
        ..RunSummary::default()
    };
    Ok((summary, masters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::InMemoryWeightsStore;
    use crate::scan::Spectrum;

    struct EmptyReader {
        opened: bool,
    }

    impl VendorReader for EmptyReader {
        fn open(&mut self) -> Result<()> {
            self.opened = true;
            Ok(())
        }

        fn scan_info_list(&self) -> Result<Vec<crate::scan::ScanInfo>> {
            Ok(Vec::new())
        }

        fn scan_data(&self, _scan_index: usize) -> Result<crate::scan::Scan> {
            Ok(crate::scan::Scan {
                scan_index: 0,
                vendor_scan_number: 0,
                retention_time_minutes: 0.0,
                ms_level: 1,
                spectrum: Spectrum::new(vec![]),
            })
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct NullSink;
    impl TabularSink for NullSink {
        fn write_charge_cluster(&mut self, _record: &ChargeClusterRecord) -> Result<()> {
            Ok(())
        }
        fn write_feature(&mut self, _feature: &Feature) -> Result<()> {
            Ok(())
        }
        fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct NullCrossSink;
    impl CrossSampleSink for NullCrossSink {
        fn write_master_feature(&mut self, _master: &MasterFeature) -> Result<()> {
            Ok(())
        }
        fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn store_with_identity_nets(params: &ImmutableParameters) -> InMemoryWeightsStore {
        let mut store = InMemoryWeightsStore::default();
        let make = |output_len: usize| {
            let hidden = 2;
            vec![
                crate::nn::Matrix::new(1, hidden, vec![0.0; hidden]),
                crate::nn::Matrix::new(1, hidden, vec![0.0; hidden]),
                crate::nn::Matrix::new(hidden, hidden, vec![0.0; hidden * hidden]),
                crate::nn::Matrix::new(1, hidden, vec![0.0; hidden]),
                crate::nn::Matrix::new(hidden, output_len, vec![0.0; hidden * output_len]),
                crate::nn::Matrix::new(1, output_len, vec![0.0; output_len]),
            ]
        };
        store.insert(crate::scan_loop::CHARGE_MODEL_ID, make(params.max_charge_state as usize));
        for charge in 1..=params.max_charge_state {
            store.insert(crate::scan_loop::monoisotope_model_id(charge), make(usize::from(charge) + 2));
        }
        store
    }

    #[test]
    fn run_sample_on_an_empty_reader_emits_nothing() {
        let params = ImmutableParameters::default();
        let settings = Settings::default();
        let store = store_with_identity_nets(&params);
        let mut reader = EmptyReader { opened: false };
        let mut sink = NullSink;
        let cancel = AtomicBool::new(false);
        let (summary, records, features) =
            run_sample(&mut reader, &store, params, &settings, AveragineParams::accurate(), &mut sink, &cancel).unwrap();
        assert!(reader.opened);
        assert_eq!(summary.scans_processed, 0);
        assert!(records.is_empty());
        assert!(features.is_empty());
    }

    #[test]
    fn run_cross_sample_with_no_samples_is_empty() {
        let params = ImmutableParameters::default();
        let settings = Settings::default();
        let mut sink = NullCrossSink;
        let (summary, masters) = run_cross_sample(&[], &settings, &params, &mut sink).unwrap();
        assert_eq!(summary.master_features_emitted, 0);
        assert!(masters.is_empty());
    }
}
