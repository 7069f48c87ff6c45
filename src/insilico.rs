//! The insilico CSV sink (spec.md §6 "Outbound — insilico CSV").
//!
//! The one concrete outbound artifact this crate owns end-to-end, using
//! the `csv` crate the way `filiprumenovski-mzpeak-rs` writes its own
//! tabular outputs: a `csv::Writer` over `serde`-derived row structs, one
//! `write_feature` call per row, flushed on `finish`.

use std::io::Write;

use serde::Serialize;

use crate::error::{FeatureFinderError, Result};
use crate::feature::{ChargeClusterRecord, Feature};
use crate::interfaces::TabularSink;
use crate::system::PROTON_MASS;

/// One row of the insilico CSV output.
#[derive(Debug, Clone, Serialize)]
struct InsilicoRow {
    sequence: String,
    retention_time_minutes: f64,
    dominant_mz: f64,
    mw_monoisotopic: f64,
    charge: u8,
    max_intensity: f64,
    max_corr: f64,
    max_isotope_count: usize,
    ion_count: usize,
}

/// `m/z` for the feature's most commonly observed charge state
/// (spec.md §6 "DominantMz"): `(mw + z * m_H) / z`.
fn dominant_mz(feature: &Feature) -> f64 {
    let charge = feature.charge_order.first().copied().unwrap_or(1).max(1);
    (feature.mw_monoisotopic + f64::from(charge) * PROTON_MASS) / f64::from(charge)
}

/// Writes collated features to the insilico CSV schema. Per-scan
/// charge-cluster records aren't part of this artifact, so
/// [`TabularSink::write_charge_cluster`] is a no-op for this sink; callers
/// that also need the per-scan table should pair this with a second
/// `TabularSink` of their own.
pub struct InsilicoCsvSink<W: Write> {
    writer: csv::Writer<W>,
    next_feature_id: usize,
}

impl<W: Write> InsilicoCsvSink<W> {
    /// Wrap a writer, emitting the CSV header immediately.
    pub fn new(inner: W) -> Result<Self> {
        let writer = csv::Writer::from_writer(inner);
        Ok(Self { writer, next_feature_id: 0 })
    }
}

impl<W: Write> TabularSink for InsilicoCsvSink<W> {
    fn write_charge_cluster(&mut self, _record: &ChargeClusterRecord) -> Result<()> {
        Ok(())
    }

    fn write_feature(&mut self, feature: &Feature) -> Result<()> {
        // No peptide identification is performed by this crate
        // (spec.md Non-goals), so every row gets a placeholder sequence
        // keyed by the order features were written in.
        let sequence = format!("UNKNOWN_{}", self.next_feature_id);
        self.next_feature_id += 1;

        let row = InsilicoRow {
            sequence,
            retention_time_minutes: feature.apex_rt,
            dominant_mz: dominant_mz(feature),
            mw_monoisotopic: feature.mw_monoisotopic,
            charge: feature.charge_order.first().copied().unwrap_or(0),
            max_intensity: feature.max_intensity,
            max_corr: feature.max_corr,
            max_isotope_count: feature.max_isotope_count,
            ion_count: feature.ion_count,
        };
        self.writer
            .serialize(row)
            .map_err(|e| FeatureFinderError::Data(format!("insilico CSV write failed: {e}")))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| FeatureFinderError::Data(format!("insilico CSV flush failed: {e}")))
    }
}
