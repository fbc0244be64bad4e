//! Backend trait: the set of forward kernels a compute device provides.

use crate::shape::Shape;
use crate::tensor::TensorData;

/// Forward tensor kernels. Binary ops broadcast their operands.
pub trait Backend: Clone + Send + Sync + 'static {
    type Tensor: TensorData;

    // === Creation ===

    fn zeros(shape: &Shape) -> Self::Tensor;

    fn ones(shape: &Shape) -> Self::Tensor;

    /// Panics if `data.len()` does not match `shape`.
    fn from_vec(data: Vec<f32>, shape: Shape) -> Self::Tensor;

    fn scalar(value: f32) -> Self::Tensor;

    fn full(shape: &Shape, value: f32) -> Self::Tensor;

    // === Element-wise unary ===

    fn neg(x: &Self::Tensor) -> Self::Tensor;

    fn exp(x: &Self::Tensor) -> Self::Tensor;

    fn log(x: &Self::Tensor) -> Self::Tensor;

    /// max(0, x)
    fn relu(x: &Self::Tensor) -> Self::Tensor;

    fn sigmoid(x: &Self::Tensor) -> Self::Tensor;

    fn tanh(x: &Self::Tensor) -> Self::Tensor;

    // === Element-wise binary ===

    fn add(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;

    fn sub(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;

    fn mul(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;

    fn div(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;

    // === Reductions ===
    // `axes == None` reduces every axis to a scalar.

    fn sum(x: &Self::Tensor, axes: Option<&[usize]>, keepdims: bool) -> Self::Tensor;

    fn max(x: &Self::Tensor, axes: Option<&[usize]>, keepdims: bool) -> Self::Tensor;

    // === Linear algebra ===

    /// (M, K) @ (K, N) -> (M, N), plus the vector cases.
    fn matmul(a: &Self::Tensor, b: &Self::Tensor) -> Self::Tensor;

    // === Shape ===

    /// Panics if the element count changes.
    fn reshape(x: &Self::Tensor, shape: &Shape) -> Self::Tensor;
}
