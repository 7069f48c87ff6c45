//! Smoke-run one synthetic sample end to end: a single in-memory MS1 scan,
//! a pass-through weights store, and an insilico CSV sink over stdout.
//!
//! Not part of the library surface — a runnable sanity check in the style
//! of a vendor integration's own example binaries, using `anyhow::Result`
//! at the `main` boundary the way a CLI entry point usually does, rather
//! than the crate's own `thiserror` enum (that enum is for library callers
//! who need to match on a *kind*; a one-shot demo just needs `?` to work).

use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use lcms_feature_finder::{ImmutableParameters, Settings};

use lcms_feature_finder::averagine::AveragineParams;
use lcms_feature_finder::interfaces::{TabularSink, VendorReader};
use lcms_feature_finder::insilico::InsilicoCsvSink;
use lcms_feature_finder::nn::{InMemoryWeightsStore, Matrix};
use lcms_feature_finder::pipeline::run_sample;
use lcms_feature_finder::scan::{Point, Scan, ScanInfo, Spectrum};

/// A reader with one MS1 scan holding a doubly-charged 4-isotope cluster
/// around m/z 751.88 (spec.md §8 scenario 1), plus some flat baseline.
struct OneScanReader;

impl VendorReader for OneScanReader {
    fn open(&mut self) -> lcms_feature_finder::error::Result<()> {
        Ok(())
    }

    fn scan_info_list(&self) -> lcms_feature_finder::error::Result<Vec<ScanInfo>> {
        Ok(vec![ScanInfo {
            vendor_scan_number: 1,
            retention_time_minutes: 10.0,
            scan_level: 1,
        }])
    }

    fn scan_data(&self, scan_index: usize) -> lcms_feature_finder::error::Result<Scan> {
        let points = vec![
            Point::new(751.88, 2.0e7),
            Point::new(752.38, 1.4e7),
            Point::new(752.88, 6.0e6),
            Point::new(753.38, 1.8e6),
            Point::new(400.10, 2.0e4),
            Point::new(900.50, 1.5e4),
        ];
        Ok(Scan {
            scan_index,
            vendor_scan_number: 1,
            retention_time_minutes: 10.0,
            ms_level: 1,
            spectrum: Spectrum::new(points),
        })
    }

    fn close(&mut self) -> lcms_feature_finder::error::Result<()> {
        Ok(())
    }
}

/// Build a weights store whose nets are a no-op identity through two ReLU
/// layers and a sigmoid output, just enough shape to exercise the forward
/// pass without asserting anything about a trained model's actual output.
fn pass_through_store(params: &ImmutableParameters) -> InMemoryWeightsStore {
    let mut store = InMemoryWeightsStore::default();
    let layers_for = |output_len: usize| {
        let hidden = 2;
        vec![
            Matrix::new(1, hidden, vec![0.0; hidden]),
            Matrix::new(1, hidden, vec![0.0; hidden]),
            Matrix::new(hidden, hidden, vec![0.0; hidden * hidden]),
            Matrix::new(1, hidden, vec![0.0; hidden]),
            Matrix::new(hidden, output_len, vec![0.0; hidden * output_len]),
            Matrix::new(1, output_len, vec![0.0; output_len]),
        ]
    };
    store.insert(lcms_feature_finder::scan_loop::CHARGE_MODEL_ID, layers_for(params.max_charge_state as usize));
    for charge in 1..=params.max_charge_state {
        store.insert(lcms_feature_finder::scan_loop::monoisotope_model_id(charge), layers_for(usize::from(charge) + 2));
    }
    store
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let params = ImmutableParameters::default();
    let settings = Settings::default();
    let store = pass_through_store(&params);

    let mut reader = OneScanReader;
    let mut sink = InsilicoCsvSink::new(std::io::stdout()).context("opening stdout CSV sink")?;
    let cancel = AtomicBool::new(false);

    let (summary, _records, features) = run_sample(
        &mut reader,
        &store,
        params,
        &settings,
        AveragineParams::accurate(),
        &mut sink,
        &cancel,
    )
    .context("running the sample through the feature finder")?;

    eprintln!(
        "scans_processed={} clusters_emitted={} features_emitted={}",
        summary.scans_processed,
        summary.clusters_emitted,
        features.len()
    );
    Ok(())
}
