//! # fh_tensor - Tensor graph with pluggable backends
//!
//! The tensor layer the classification head is built on:
//! - [`Shape`], [`Strides`] - concrete layout
//! - [`FeatureShape`] - per-sample dims with a symbolic batch axis
//! - [`TensorData`] - storage trait
//! - [`Backend`] - forward kernels a device provides
//! - [`Tensor`] - reference-counted, immutable graph node
//!
//! ## Example
//!
//! ```ignore
//! use fh_tensor::prelude::*;
//! use fh_backend_cpu::CpuBackend;
//!
//! let x = Tensor::<CpuBackend>::from_vec(vec![1.0, -2.0, 3.0], Shape::new(vec![1, 3]));
//! let y = x.relu();
//! assert!(y.depends_on(&x));
//! ```

pub mod backend;
pub mod node;
pub mod shape;
pub mod tensor;

pub use backend::Backend;
pub use node::{NodeId, Tensor, TensorOp};
pub use shape::{FeatureShape, Shape, Strides};
pub use tensor::TensorData;

pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::node::{NodeId, Tensor, TensorOp};
    pub use crate::shape::{FeatureShape, Shape, Strides};
    pub use crate::tensor::TensorData;
}
