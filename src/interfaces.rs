//! External interface boundaries (spec.md §6).
//!
//! These traits are the seams a caller implements to plug in a vendor raw
//! file reader and to receive the two emitted tables, mirroring how the
//! teacher crate keeps its own I/O-facing contracts (readers, writers) as
//! narrow traits rather than concrete types threaded through the core.

use crate::error::Result;
use crate::feature::{ChargeClusterRecord, Feature};
use crate::scan::{Scan, ScanInfo};

/// Inbound — a vendor's raw scan data, opened once per sample
/// (spec.md §6 "Inbound — vendor reader").
pub trait VendorReader {
    /// Open the underlying raw file or stream. Implementations may treat
    /// this as a no-op if already open.
    fn open(&mut self) -> Result<()>;

    /// List every scan's immutable metadata, in acquisition order.
    fn scan_info_list(&self) -> Result<Vec<ScanInfo>>;

    /// Fetch one scan's full record (metadata plus centroided spectrum) by
    /// its dense, zero-based index into `scan_info_list`.
    fn scan_data(&self, scan_index: usize) -> Result<Scan>;

    /// Release any underlying file handles or connections.
    fn close(&mut self) -> Result<()>;
}

/// Outbound — a sink for per-sample charge-cluster records and collated
/// features (spec.md §6 "Outbound — tabular sinks").
pub trait TabularSink {
    /// Receive one charge-cluster record as it is emitted by the per-scan
    /// loop (spec.md §4.H).
    fn write_charge_cluster(&mut self, record: &ChargeClusterRecord) -> Result<()>;

    /// Receive one collated feature (spec.md §4.I).
    fn write_feature(&mut self, feature: &Feature) -> Result<()>;

    /// Flush and finalize the sink once a sample's run completes.
    fn finish(&mut self) -> Result<()>;
}

/// Outbound — a sink for cross-sample master features (spec.md §6
/// "Outbound — cross-sample sink").
pub trait CrossSampleSink {
    /// Receive one master feature joining one or more per-sample features.
    fn write_master_feature(&mut self, master: &crate::cross_sample::MasterFeature) -> Result<()>;

    /// Flush and finalize the sink once cross-sample collation completes.
    fn finish(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_sample::MasterFeature;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink {
        clusters: RefCell<Vec<ChargeClusterRecord>>,
        features: RefCell<Vec<Feature>>,
        finished: RefCell<bool>,
    }

    impl TabularSink for RecordingSink {
        fn write_charge_cluster(&mut self, record: &ChargeClusterRecord) -> Result<()> {
            self.clusters.borrow_mut().push(*record);
            Ok(())
        }

        fn write_feature(&mut self, feature: &Feature) -> Result<()> {
            self.features.borrow_mut().push(feature.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            *self.finished.borrow_mut() = true;
            Ok(())
        }
    }

    #[test]
    fn recording_sink_captures_writes() {
        let mut sink = RecordingSink::default();
        let record = ChargeClusterRecord {
            scan_index: 0,
            vendor_scan_number: 1,
            retention_time_minutes: 1.0,
            mz_found: 500.0,
            max_intensity: 1.0e6,
            mw_monoisotopic: 998.0,
            mono_offset: 0,
            correlation: 0.9,
            charge: 2,
            isotope_count: 4,
            scan_noise_floor: 10.0,
        };
        sink.write_charge_cluster(&record).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.clusters.borrow().len(), 1);
        assert!(*sink.finished.borrow());
    }

    struct CountingCrossSampleSink {
        count: usize,
    }

    impl CrossSampleSink for CountingCrossSampleSink {
        fn write_master_feature(&mut self, _master: &MasterFeature) -> Result<()> {
            self.count += 1;
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn cross_sample_sink_counts_master_features() {
        let mut sink = CountingCrossSampleSink { count: 0 };
        let master = MasterFeature {
            mw_monoisotopic: 1500.0,
            apex_rt_warped: 10.0,
            max_intensity: 1.0e7,
            members: vec![(0, 0)],
        };
        sink.write_master_feature(&master).unwrap();
        assert_eq!(sink.count, 1);
    }
}
