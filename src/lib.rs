#![doc = "A label-free LC-MS feature finder: per-scan deconvolution, charge-cluster assembly, and cross-sample alignment."]
#![warn(clippy::all, clippy::pedantic, missing_docs)]
#![allow(
    clippy::must_use_candidate,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::wildcard_imports,
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::too_many_arguments
)]

pub mod averagine;
pub mod candidate;
pub mod charge;
pub mod config;
pub mod cross_sample;
pub mod dbscan;
pub mod disambiguator;
pub mod elements;
pub mod error;
pub mod feature;
pub mod insilico;
pub mod interfaces;
pub mod monoisotope;
pub mod nn;
pub mod pipeline;
pub mod scan;
pub mod scan_loop;
pub mod segment;
pub mod subtractor;
pub mod system;
pub mod warp;

pub use config::{ImmutableParameters, Settings};
pub use error::FeatureFinderError;
pub use feature::{ChargeClusterRecord, Feature};
pub use pipeline::{run_cross_sample, run_sample, RunSummary};
pub use scan::{Point, Scan, ScanInfo, Spectrum};

#[macro_use]
extern crate uom;
