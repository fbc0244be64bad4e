//! Flatten: collapse every non-batch axis into one.
//!
//! `[B, 7, 7, 512]` becomes `[B, 25088]`.

use fh_backend_cpu::CpuBackend;
use fh_tensor::prelude::*;

use crate::error::{HeadError, Result};

#[derive(Debug, Clone)]
pub struct Flatten {
    name: String,
}

impl Flatten {
    pub fn new(name: &str) -> Self {
        Flatten { name: name.to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output shape for a given input shape, without touching data.
    pub fn output_shape(&self, input: &FeatureShape) -> Result<FeatureShape> {
        if input.rank() == 0 {
            return Err(HeadError::shape(
                &self.name,
                "at least one non-batch axis",
                input,
            ));
        }
        Ok(FeatureShape::new(vec![input.width()]))
    }

    pub fn forward(&self, x: &Tensor<CpuBackend>) -> Result<Tensor<CpuBackend>> {
        if x.ndim() < 2 {
            return Err(HeadError::shape(
                &self.name,
                "(batch, ...) with at least one non-batch axis",
                x.shape(),
            ));
        }
        if x.ndim() == 2 {
            return Ok(x.clone());
        }
        Ok(x.reshape(&x.shape().flatten_from(1)))
    }
}
