//! Interfaces at the boundary with the trained network.

use crate::core::errors::PackResult;
use ndarray::{Array3, ArrayView4};

/// An opaque trained network.
///
/// The network consumes a batch of canvases shaped `(batch, height, width, 3)`
/// and produces, per sample, a matrix of class scores shaped
/// `(positions, classes)`. For the per-character and sequence modes each row is
/// one character position; the whole-label mode produces a single row.
pub trait InferenceModel {
    /// Runs a forward pass over a batch of canvases.
    fn forward(&self, batch: ArrayView4<'_, f32>) -> PackResult<Array3<f32>>;
}

impl<M: InferenceModel + ?Sized> InferenceModel for &M {
    fn forward(&self, batch: ArrayView4<'_, f32>) -> PackResult<Array3<f32>> {
        (**self).forward(batch)
    }
}

impl<M: InferenceModel + ?Sized> InferenceModel for Box<M> {
    fn forward(&self, batch: ArrayView4<'_, f32>) -> PackResult<Array3<f32>> {
        (**self).forward(batch)
    }
}
