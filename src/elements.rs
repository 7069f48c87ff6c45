//! Isotope masses and natural abundances for the five elements the
//! averagine model is built from.
//!
//! The teacher crate generates a full periodic table at build time from
//! parsed IUPAC/CIAAW data files (`rustyms/src/element.rs` + `build.rs`).
//! A feature finder only ever needs the CHNOS quintet, so this module
//! hardcodes the CIAAW isotope masses/abundances for those five elements
//! directly rather than carrying the teacher's ontology-parsing build
//! script (dropped; see DESIGN.md).

use crate::system::{da, Mass};

/// One of the elements considered by the averagine model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    /// Hydrogen
    H,
    /// Carbon
    C,
    /// Nitrogen
    N,
    /// Oxygen
    O,
    /// Sulfur
    S,
}

impl Element {
    /// All isotopes of this element with non-zero natural abundance,
    /// ordered lightest first, as `(mass, abundance)` pairs. Abundances
    /// sum to (approximately) 1.
    pub fn isotopes(self) -> &'static [(f64, f64)] {
        match self {
            // 1H, 2H
            Self::H => &[(1.007_825_032, 0.999_885), (2.014_101_778, 0.000_115)],
            // 12C, 13C
            Self::C => &[(12.0, 0.9893), (13.003_354_835, 0.0107)],
            // 14N, 15N
            Self::N => &[(14.003_074_004, 0.996_37), (15.000_108_898, 0.003_63)],
            // 16O, 17O, 18O
            Self::O => &[
                (15.994_914_619, 0.997_57),
                (16.999_131_757, 0.000_38),
                (17.999_159_613, 0.002_05),
            ],
            // 32S, 33S, 34S, 36S
            Self::S => &[
                (31.972_071_174, 0.9499),
                (32.971_458_910, 0.0075),
                (33.967_867_011, 0.0425),
                (35.967_080_712, 0.0001),
            ],
        }
    }

    /// Monoisotopic mass of this element (mass of its lightest isotope).
    pub fn monoisotopic_mass(self) -> Mass {
        da(self.isotopes()[0].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abundances_sum_to_one() {
        for element in [Element::H, Element::C, Element::N, Element::O, Element::S] {
            let sum: f64 = element.isotopes().iter().map(|(_, a)| a).sum();
            assert!((sum - 1.0).abs() < 1e-3, "{element:?} sums to {sum}");
        }
    }
}
