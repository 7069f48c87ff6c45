//! Error kinds and propagation for the feature-finding pipeline.
//!
//! Follows spec.md §7: four error kinds map onto the enum variants below,
//! each tagged with which of them may cross a public function boundary as
//! an `Err` and which only ever contribute to a [`crate::pipeline::RunSummary`]
//! counter. Grounded in the `thiserror`-per-subsystem idiom used throughout
//! `filiprumenovski-mzpeak-rs` (`dataset/error.rs`, `mzml/streamer/error.rs`):
//! one enum, `#[from]` conversions at the boundaries that need them, a
//! `Display` message per variant.

use thiserror::Error;

/// Errors that can surface from the feature-finding pipeline.
///
/// Per spec.md §7, only [`Self::Input`], [`Self::Transient`] and
/// [`Self::Config`] are meant to propagate out of [`crate::pipeline::run_sample`]
/// as an `Err`; [`Self::Data`] and [`Self::Capacity`] conditions are
/// swallowed at the point they occur and folded into run counters instead.
#[derive(Debug, Error)]
pub enum FeatureFinderError {
    /// The vendor reader, weights store, or a required table could not be
    /// opened or was missing required content. Fatal before a run begins.
    #[error("input error: {0}")]
    Input(String),

    /// A data-quality condition encountered mid-run: an empty spectrum, an
    /// all-zero segment, or a degenerate (NaN) correlation. These are
    /// swallowed by the caller (logged, counted) and never returned as an
    /// `Err` from a public entry point; the variant exists so internal
    /// helpers have a uniform `Result` to return.
    #[error("data error: {0}")]
    Data(String),

    /// A capacity condition, handled by truncation rather than failure
    /// (`candidate count > max_ion_count`). Never returned as an `Err`;
    /// exists for internal uniformity only.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// A transient failure in an external collaborator — most notably a
    /// tabular sink commit. Surfaced to the caller; the sample in progress
    /// is abandoned, but other samples continue.
    #[error("transient failure: {0}")]
    Transient(String),

    /// A settable parameter was rejected before the run began.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FeatureFinderError {
    /// The short, user-visible reason string for a failed sample
    /// (spec.md §7 "a short reason").
    pub fn reason(&self) -> String {
        match self {
            Self::Input(m) | Self::Transient(m) | Self::Config(m) => m.clone(),
            Self::Data(m) => format!("data: {m}"),
            Self::Capacity(m) => format!("capacity: {m}"),
        }
    }

    /// True for the kinds that are allowed to propagate as an `Err` out of
    /// a public pipeline entry point (spec.md §7).
    pub const fn propagates(&self) -> bool {
        matches!(self, Self::Input(_) | Self::Transient(_) | Self::Config(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FeatureFinderError>;
