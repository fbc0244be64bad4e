//! Storage trait implemented by each backend's tensor type.

use crate::shape::{Shape, Strides};

pub trait TensorData: Clone + Send + Sync + 'static {
    fn shape(&self) -> &Shape;

    fn strides(&self) -> &Strides;

    fn numel(&self) -> usize {
        self.shape().numel()
    }

    fn is_scalar(&self) -> bool {
        self.shape().is_scalar()
    }

    /// Contiguous row-major view of the elements.
    fn as_slice(&self) -> &[f32];

    /// Panics if the tensor is not 0-dimensional.
    fn scalar_value(&self) -> f32 {
        assert!(self.is_scalar(), "Expected scalar tensor");
        self.as_slice()[0]
    }
}
