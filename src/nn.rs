//! Shared feed-forward network machinery for the charge and monoisotope
//! determinators (spec.md §4.C, §4.D, §6 "Inbound — NN weights store").
//!
//! The comb filters are genuinely sparse (a handful of nonzero buckets in
//! a segment of a few thousand), so they're kept as `(index, coefficient)`
//! lists rather than reaching for a full sparse-matrix crate — the
//! contract in spec.md §9 is "only the mathematical product", and a
//! `Vec<(usize, f64)>` row dotted against a dense segment is the simplest
//! faithful CSR-like representation for this shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{FeatureFinderError, Result};

/// One row of a comb filter: bucket offsets (within the segment) paired
/// with their coefficient (`+1`, `-1`, or occasionally other weights).
pub type CombRow = Vec<(usize, f64)>;

/// Apply one comb-filter row to a segment as a dot product: `r = comb .
/// segment` (spec.md §4.C, §4.D). Used by both the charge determinator
/// (each row's sum, then the whole per-charge vector normalized by its own
/// max) and the monoisotope determinator (each row's sum against a
/// center-normalized segment).
pub fn comb_row_dot(row: &CombRow, segment: &[f64]) -> f64 {
    row.iter()
        .map(|(idx, coeff)| segment.get(*idx).copied().unwrap_or(0.0) * coeff)
        .sum()
}

/// A dense weight matrix, row-major, as fetched from the weights store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// Build a matrix from row-major data.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), rows * cols, "matrix data length mismatch");
        Self { data, rows, cols }
    }

    /// `row_vector * self`, treating `self` as `cols_in x cols_out`.
    pub fn row_vec_mul(&self, input: &[f64]) -> Vec<f64> {
        assert_eq!(input.len(), self.rows, "dimension mismatch in matmul");
        (0..self.cols)
            .map(|c| (0..self.rows).map(|r| input[r] * self.data[r * self.cols + c]).sum())
            .collect()
    }

    /// Add a bias row vector elementwise.
    pub fn add_bias(values: &mut [f64], bias: &Matrix) {
        assert_eq!(values.len(), bias.cols);
        for (v, b) in values.iter_mut().zip(bias.data.iter()) {
            *v += b;
        }
    }
}

fn relu(values: &mut [f64]) {
    for v in values.iter_mut() {
        *v = v.max(0.0);
    }
}

fn sigmoid(values: &mut [f64]) {
    for v in values.iter_mut() {
        *v = 1.0 / (1.0 + (-*v).exp());
    }
}

/// A three-layer feed-forward net: `(W1 x + b1)` ReLU, `(W2 x + b2)` ReLU,
/// `(W3 x + b3)` sigmoid (spec.md §4.C, §4.D). Weight matrices are
/// immutable after construction and shared across all scan iterations
/// (spec.md §5, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedForwardNet {
    w1: Matrix,
    b1: Matrix,
    w2: Matrix,
    b2: Matrix,
    w3: Matrix,
    b3: Matrix,
}

impl FeedForwardNet {
    /// Build a net from the six matrices a `WeightsStore` returns for one
    /// model id: three weight matrices, three bias row-vectors, in that order.
    pub fn from_layers(mut layers: Vec<Matrix>) -> Result<Self> {
        if layers.len() != 6 {
            return Err(FeatureFinderError::Input(format!(
                "expected 6 layer matrices, got {}",
                layers.len()
            )));
        }
        let b3 = layers.pop().unwrap();
        let w3 = layers.pop().unwrap();
        let b2 = layers.pop().unwrap();
        let w2 = layers.pop().unwrap();
        let b1 = layers.pop().unwrap();
        let w1 = layers.pop().unwrap();
        Ok(Self { w1, b1, w2, b2, w3, b3 })
    }

    /// Run the forward pass, returning the sigmoid-activated output layer.
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut h1 = self.w1.row_vec_mul(input);
        Matrix::add_bias(&mut h1, &self.b1);
        relu(&mut h1);

        let mut h2 = self.w2.row_vec_mul(&h1);
        Matrix::add_bias(&mut h2, &self.b2);
        relu(&mut h2);

        let mut out = self.w3.row_vec_mul(&h2);
        Matrix::add_bias(&mut out, &self.b3);
        sigmoid(&mut out);
        out
    }

    /// Index of the largest output activation.
    pub fn argmax(&self, input: &[f64]) -> usize {
        let out = self.forward(input);
        out.iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// A keyed repository of NN weights (spec.md §6 "Inbound — NN weights
/// store"): model 1 is the charge determinator, models 2..=11 are the
/// per-charge monoisotope determinators.
pub trait WeightsStore {
    /// Fetch the six layer matrices for a model id.
    fn get_weights(&self, model_id: u32) -> Result<Vec<Matrix>>;
}

/// An in-memory weights store, useful for tests and for callers that load
/// weights from their own persistence layer ahead of time.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWeightsStore {
    models: HashMap<u32, Vec<Matrix>>,
}

impl InMemoryWeightsStore {
    /// Register the layer matrices for a model id.
    pub fn insert(&mut self, model_id: u32, layers: Vec<Matrix>) {
        self.models.insert(model_id, layers);
    }
}

impl WeightsStore for InMemoryWeightsStore {
    fn get_weights(&self, model_id: u32) -> Result<Vec<Matrix>> {
        self.models
            .get(&model_id)
            .cloned()
            .ok_or_else(|| FeatureFinderError::Input(format!("no weights for model {model_id}")))
    }
}

impl InMemoryWeightsStore {
    /// Serialize the whole store to the compact binary blob format trained
    /// weights are shipped in (spec.md §6 "Inbound — NN weights store"),
    /// rather than the verbose JSON `Matrix` already derives for debugging.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.models).map_err(|e| FeatureFinderError::Input(format!("could not serialize weights: {e}")))
    }

    /// Load a store previously written by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let models = bincode::deserialize(bytes)
            .map_err(|e| FeatureFinderError::Input(format!("could not deserialize weights: {e}")))?;
        Ok(Self { models })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_like_net_passes_through_sign() {
        // W1 = identity(2), b1 = 0, W2 = identity(2), b2 = 0, W3 = identity(2), b3 = 0
        let id2 = Matrix::new(2, 2, vec![1.0, 0.0, 0.0, 1.0]);
        let zero2 = Matrix::new(1, 2, vec![0.0, 0.0]);
        let net = FeedForwardNet::from_layers(vec![
            id2.clone(),
            zero2.clone(),
            id2.clone(),
            zero2.clone(),
            id2,
            zero2,
        ])
        .unwrap();
        let out = net.forward(&[1.0, -1.0]);
        // after two ReLUs the negative lane is killed, sigmoid(0) = 0.5 < sigmoid(1)
        assert_eq!(net.argmax(&[1.0, -1.0]), 0);
        assert!(out[0] > out[1]);
    }

    #[test]
    fn missing_model_is_input_error() {
        let store = InMemoryWeightsStore::default();
        let err = store.get_weights(1).unwrap_err();
        assert!(matches!(err, FeatureFinderError::Input(_)));
    }

    #[test]
    fn store_round_trips_through_bytes() {
        let id2 = Matrix::new(2, 2, vec![1.0, 0.0, 0.0, 1.0]);
        let zero2 = Matrix::new(1, 2, vec![0.0, 0.0]);
        let mut store = InMemoryWeightsStore::default();
        store.insert(1, vec![id2.clone(), zero2.clone(), id2.clone(), zero2.clone(), id2, zero2]);

        let bytes = store.to_bytes().unwrap();
        let restored = InMemoryWeightsStore::from_bytes(&bytes).unwrap();
        let original = store.get_weights(1).unwrap();
        let round_tripped = restored.get_weights(1).unwrap();
        assert_eq!(original.len(), round_tripped.len());
        assert_eq!(original[0].row_vec_mul(&[1.0, -1.0]), round_tripped[0].row_vec_mul(&[1.0, -1.0]));
    }
}
