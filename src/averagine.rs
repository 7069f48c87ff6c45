//! Averagine isotope table (spec.md §4.A).
//!
//! For a representative neutral mass, the averagine model assumes a
//! hypothetical "average amino acid" elemental composition scaled to that
//! mass and computes the isotopologue intensity envelope by convolving the
//! per-element isotope distributions of C, H, N, O, S. The convolution
//! itself is grounded directly in `rustyms/src/isotopes.rs`'s
//! `MolecularFormula::isotopic_distribution`: a running `Array1<f64>`
//! convolved one element at a time via a `probability::distribution::Binomial`
//! per extra isotope, generalized here from a fixed peptide formula to a
//! composition that varies with the row's mass.

use ndarray::{arr1, concatenate, s, Array1, Axis};
use probability::distribution::{Binomial, Discrete};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::elements::Element;

/// The classic Senko/averagine per-Dalton elemental composition ratios,
/// and the two pruning thresholds applied while/after convolving
/// (spec.md §3 "Averagine Entry").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragineParams {
    /// Carbon atoms per Dalton of neutral mass.
    pub c_per_da: f64,
    /// Hydrogen atoms per Dalton.
    pub h_per_da: f64,
    /// Nitrogen atoms per Dalton.
    pub n_per_da: f64,
    /// Oxygen atoms per Dalton.
    pub o_per_da: f64,
    /// Sulfur atoms per Dalton.
    pub s_per_da: f64,
    /// Isotopologues below this fraction of the running sum are dropped
    /// *during* convolution (keeps the per-element binomial sum small).
    pub inter_isotope_trim: f64,
    /// Isotopologues below this fraction of the final stored vector's
    /// total are dropped from the stored row.
    pub final_trim: f64,
}

impl AveragineParams {
    /// The modern, accurate parameter set. Rows built with this set sum to
    /// 1 (spec.md §3 invariant, §9 open question #2).
    pub fn accurate() -> Self {
        Self {
            c_per_da: 4.9384,
            h_per_da: 7.7583,
            n_per_da: 1.3577,
            o_per_da: 1.4773,
            s_per_da: 0.0417,
            inter_isotope_trim: 1e-6,
            final_trim: 1e-4,
        }
    }

    /// The legacy "by-feature-finder" parameter set, preserved verbatim
    /// for backward compatibility. It applies a much coarser final trim,
    /// so rows for large masses knowingly sum to less than 1 (drops to
    /// ~0.8 by 8000 Da) — this crate does not silently renormalize it
    /// (spec.md §9 open question #2).
    pub fn legacy() -> Self {
        Self {
            c_per_da: 4.9384,
            h_per_da: 7.7583,
            n_per_da: 1.3577,
            o_per_da: 1.4773,
            s_per_da: 0.0417,
            inter_isotope_trim: 1e-4,
            final_trim: 0.02,
        }
    }

    fn atom_counts(self, mass: f64) -> [(Element, usize); 5] {
        [
            (Element::C, (self.c_per_da * mass).round() as usize),
            (Element::H, (self.h_per_da * mass).round() as usize),
            (Element::N, (self.n_per_da * mass).round() as usize),
            (Element::O, (self.o_per_da * mass).round() as usize),
            (Element::S, (self.s_per_da * mass).round() as usize),
        ]
    }
}

/// Convolve the isotope distributions of the given element counts into one
/// isotopologue-intensity vector, index `i` being `i` neutrons heavier than
/// the all-light-isotope species. Ported from `rustyms`'s
/// `MolecularFormula::isotopic_distribution`, generalized to take explicit
/// per-element counts instead of reading them off a `MolecularFormula`.
fn convolve(counts: &[(Element, usize)], inter_isotope_trim: f64) -> Array1<f64> {
    let mut result = arr1(&[1.0]);
    for (element, amount) in counts {
        let amount = *amount;
        if amount == 0 {
            continue;
        }
        let isotopes = element.isotopes();
        if isotopes.len() < 2 {
            continue;
        }
        let base_mass = isotopes[0].0;
        for &(mass, abundance) in &isotopes[1..] {
            if abundance <= 0.0 {
                continue;
            }
            let offset = (mass - base_mass).round() as usize;
            let binomial = Binomial::new(amount, abundance);

            let tail = (0..=amount)
                .rev()
                .map(|t| binomial.mass(t))
                .take_while(|a| *a < inter_isotope_trim)
                .count();

            let mut distribution: Array1<f64> = (0..=amount - tail)
                .map(|t| binomial.mass(t))
                .flat_map(|a| std::iter::once(a).chain(std::iter::repeat(0.0)).take(offset))
                .collect();

            match result.len().cmp(&distribution.len()) {
                Ordering::Less => {
                    result
                        .append(Axis(0), Array1::zeros(distribution.len() - result.len()).view())
                        .unwrap();
                }
                Ordering::Greater => {
                    distribution
                        .append(Axis(0), Array1::zeros(result.len() - distribution.len()).view())
                        .unwrap();
                }
                Ordering::Equal => (),
            }

            let mut new = Array1::zeros(result.len());
            for (i, a) in distribution.into_iter().enumerate() {
                new += &(concatenate(
                    Axis(0),
                    &[Array1::zeros(i).view(), result.slice(s![0..result.len() - i])],
                )
                .unwrap()
                    * a);
            }
            result = new;
        }
    }
    result
}

/// A cached lookup table of averagine isotope envelopes, one row per
/// `step`-Dalton bucket of neutral mass (spec.md §4.A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AveragineTable {
    rows: Vec<Vec<f64>>,
    /// Da per row.
    pub step: f64,
    params: AveragineParams,
}

impl AveragineTable {
    /// Build the table by convolving an averagine composition for every
    /// row mass `step * k`, `k` in `0..row_count`.
    pub fn build(step: f64, row_count: usize, params: AveragineParams) -> Self {
        let rows = (0..row_count)
            .map(|k| {
                let mass = step * k as f64;
                let counts = params.atom_counts(mass.max(step));
                let raw = convolve(&counts, params.inter_isotope_trim);
                let total: f64 = raw.sum();
                let mut row: Vec<f64> = raw.iter().map(|v| v / total.max(f64::EPSILON)).collect();
                let threshold = params.final_trim;
                row.retain(|v| *v >= threshold);
                if row.is_empty() {
                    row.push(1.0);
                }
                row
            })
            .collect();
        Self { rows, step, params }
    }

    /// The parameter set this table was constructed with.
    pub fn params(self) -> AveragineParams {
        self.params
    }

    /// The row index for a given neutral mass, clamped to the table's range.
    fn row_index(&self, mass: f64) -> usize {
        let idx = (mass / self.step).floor() as i64;
        idx.clamp(0, self.rows.len() as i64 - 1) as usize
    }

    /// Return the isotope envelope for the closest tabulated mass
    /// (spec.md §4.A `fractions`). Out-of-range masses clamp to the
    /// first/last row.
    pub fn fractions(&self, mass: f64) -> &[f64] {
        &self.rows[self.row_index(mass)]
    }

    /// Linearly interpolated intensity for a specific isotope index between
    /// the two bracketing rows (spec.md §4.A `interpolated`).
    pub fn interpolated(&self, mass: f64, isotope: usize) -> f64 {
        let lo = self.row_index(mass);
        let hi = (lo + 1).min(self.rows.len() - 1);
        let lo_mass = self.step * lo as f64;
        let hi_mass = self.step * hi as f64;
        let lo_val = self.rows[lo].get(isotope).copied().unwrap_or(0.0);
        let hi_val = self.rows[hi].get(isotope).copied().unwrap_or(0.0);
        if (hi_mass - lo_mass).abs() < f64::EPSILON {
            return lo_val;
        }
        let t = ((mass - lo_mass) / (hi_mass - lo_mass)).clamp(0.0, 1.0);
        lo_val + (hi_val - lo_val) * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accurate_rows_sum_to_one() {
        let table = AveragineTable::build(100.0, 90, AveragineParams::accurate());
        let row = table.fractions(2400.0);
        let sum: f64 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum was {sum}");
    }

    #[test]
    fn mass_2400_envelope_is_a_short_descending_tail() {
        // spec.md §8 scenario 3: a handful of isotopologues, summing to 1.
        let table = AveragineTable::build(100.0, 90, AveragineParams::accurate());
        let row = table.fractions(2400.0);
        assert!((3..=12).contains(&row.len()), "row length was {}", row.len());
        let sum: f64 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn legacy_does_not_renormalize_at_high_mass() {
        let table = AveragineTable::build(100.0, 90, AveragineParams::legacy());
        let row = table.fractions(8000.0);
        let sum: f64 = row.iter().sum();
        assert!(sum < 0.95, "legacy sum should drop below 1, got {sum}");
    }

    #[test]
    fn out_of_range_mass_clamps() {
        let table = AveragineTable::build(100.0, 10, AveragineParams::accurate());
        let low = table.fractions(-50.0);
        let first = table.fractions(0.0);
        assert_eq!(low, first);
        let high = table.fractions(100_000.0);
        let last = table.fractions(950.0);
        assert_eq!(high, last);
    }
}
