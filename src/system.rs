//! The measurement system used in this crate.
//!
//! A redefinition of the SI units relevant to LC-MS in a more sensible base
//! unit than the SI default, following the same `uom::quantity!`/`system!`
//! pattern the teacher crate uses for its own `Mass`/`Time` quantities, but
//! trimmed to the four quantities this crate touches: mass (Da), retention
//! time (minutes), mass-over-charge, and dimensionless ratios (ppm).
#![allow(clippy::non_canonical_clone_impl, clippy::ignored_unit_patterns)]

use serde::{Deserialize, Serialize};
use uom::*;

pub use self::f64::*;

/// Mass in dalton.
#[macro_use]
pub mod mass {
    use uom::*;

    quantity! {
        /// Mass in dalton
        quantity: Mass; "mass";
        /// Mass
        dimension: Q<P1, Z0, Z0>;
        units {
            @millidalton: 0.001; "mDa", "millidalton", "millidaltons";
            @dalton: 1.0; "Da", "dalton", "daltons";
            @kilodalton: 1_000.0; "kDa", "kilodalton", "kilodaltons";
        }
    }
}

/// Retention time, in minutes by default (vendor files report RT in minutes).
#[macro_use]
pub mod time {
    use uom::*;

    quantity! {
        /// Time (min)
        quantity: Time; "time";
        /// Time
        dimension: Q<Z0, Z0, P1>;
        units {
            @second: 1.0 / 60.0; "s", "second", "seconds";
            @minute: 1.0; "min", "minute", "minutes";
        }
    }
}

/// Charge in elementary charge units, used only as the base dimension that
/// `MassOverCharge` is derived from (the teacher's `system.rs` keeps the
/// same separation of `Charge` from `MassOverCharge`).
#[macro_use]
pub mod charge {
    use uom::*;

    quantity! {
        /// Charge in elementary charge units
        quantity: Charge; "charge";
        /// Charge
        dimension: Q<Z0, P1, Z0>;
        units {
            @e: 1.0; "e", "atomic_unit_of_charge", "atomic_units_of_charge";
        }
    }
}

/// Mass over charge, the native axis of a centroided MS1 spectrum.
#[macro_use]
pub mod mass_over_charge {
    use uom::*;

    quantity! {
        /// Mass over charge (da/e)
        quantity: MassOverCharge; "mass_over_charge";
        /// Mass over charge
        dimension: Q<P1, N1, Z0>;
        units {
            @mz: 1.0; "mz", "mass_over_charge", "mass_over_charge";
        }
    }
}

/// A unitless quantity, used for ppm tolerances and correlation scores.
#[macro_use]
pub mod ratio {
    use uom::*;

    quantity! {
        /// Unitless quantity for general calculations
        quantity: Ratio; "ratio";
        /// Unitless quantity for general calculations
        dimension: Q<Z0, Z0, Z0>;
        units {
            @fraction: 1.0; "⅟", "fraction", "fraction";
            @ppm: 0.000_001; "ppm", "ppm", "ppm";
        }
    }
}

system! {
    /// Quantities
    #[doc(hidden)]
    quantities: Q {
        mass: dalton, M;
        charge: e, C;
        time: minute, T;
    }

    /// Units
    units: U {
        mod mass::Mass,
        mod charge::Charge,
        mod time::Time,
        mod mass_over_charge::MassOverCharge,
        mod ratio::Ratio,
    }
}

/// The whole system with `f64` as storage type.
#[allow(unused_imports)]
pub mod f64 {
    mod mks {
        pub use super::super::*;
    }

    Q!(self::mks, f64);

    pub use super::mass::dalton;
    pub use super::mass_over_charge::mz;
    pub use super::ratio::fraction;
    pub use super::time::minute;

    /// Annotate the given number as being in Da.
    pub fn da(v: f64) -> Mass {
        Mass::new::<super::mass::dalton>(v)
    }

    /// Annotate the given number as being in minutes.
    pub fn min(v: f64) -> Time {
        Time::new::<super::time::minute>(v)
    }

    /// Annotate the given number as being an m/z value.
    pub fn mz_value(v: f64) -> MassOverCharge {
        MassOverCharge::new::<super::mass_over_charge::mz>(v)
    }
}

impl MassOverCharge {
    /// Absolute ppm error between this m/z and another.
    pub fn ppm(self, b: Self) -> Ratio {
        Ratio::new::<crate::system::ratio::ppm>(((self - b).abs() / self.abs()).value * 1e6)
    }
}

impl Mass {
    /// Absolute ppm error between this mass and another.
    pub fn ppm(self, b: Self) -> Ratio {
        Ratio::new::<crate::system::ratio::ppm>(((self - b).abs() / self.abs()).value * 1e6)
    }
}

/// Mass of a proton (`m_H` in spec.md), the charge-carrier offset used
/// throughout neutral-mass reconstruction: `mw = mz * z - z * m_H - offset * m_H`.
pub const PROTON_MASS: f64 = 1.007_276_466_9;

/// Plain-`f64` ppm difference between two masses/m/z values, for call sites
/// that compare many pairs per scan and don't need a dimensioned `Ratio`.
pub fn ppm_difference(a: f64, b: f64) -> f64 {
    if a == 0.0 && b == 0.0 {
        return 0.0;
    }
    ((a - b).abs() / a.abs().max(b.abs())) * 1e6
}

/// Orderable, hashable wrapper for a mass value, mirroring the teacher's
/// `OrderedMass` pattern (`ordered_float::OrderedFloat` over the raw Da value).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedMass(pub ordered_float::OrderedFloat<f64>);

impl From<Mass> for OrderedMass {
    fn from(m: Mass) -> Self {
        Self(ordered_float::OrderedFloat(m.value))
    }
}

impl Eq for OrderedMass {}
impl PartialOrd for OrderedMass {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrderedMass {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}
