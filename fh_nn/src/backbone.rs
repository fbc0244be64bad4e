//! The seam between a pre-trained backbone and the head stacked on it.

use fh_backend_cpu::CpuBackend;
use fh_tensor::prelude::*;
use tracing::debug;

use crate::config::HeadConfig;
use crate::error::{HeadError, Result};
use crate::head::FcHead;
use crate::layers::Mode;

/// A pre-trained feature extractor.
///
/// The head only reads `output_shape` to size itself; `forward` is used when
/// running the assembled model.
pub trait Backbone {
    /// Per-sample shape of the backbone output.
    fn output_shape(&self) -> FeatureShape;

    /// Input `[batch, ..]`, output `[batch, ..output_shape]`.
    fn forward(&self, input: &Tensor<CpuBackend>) -> Result<Tensor<CpuBackend>>;

    /// Backbone weights. Frozen while the head warms up.
    fn parameters(&self) -> Vec<&Tensor<CpuBackend>> {
        Vec::new()
    }
}

/// A backbone whose "inference" already happened: it accepts pre-computed
/// feature maps and passes them through after a shape check.
#[derive(Debug, Clone)]
pub struct FixedFeatures {
    shape: FeatureShape,
}

impl FixedFeatures {
    pub fn new(shape: FeatureShape) -> Self {
        FixedFeatures { shape }
    }
}

impl Backbone for FixedFeatures {
    fn output_shape(&self) -> FeatureShape {
        self.shape.clone()
    }

    fn forward(&self, input: &Tensor<CpuBackend>) -> Result<Tensor<CpuBackend>> {
        match FeatureShape::of_batched(input.shape()) {
            Some(dims) if dims == self.shape => Ok(input.clone()),
            _ => Err(HeadError::shape("features", &self.shape, input.shape())),
        }
    }
}

/// Backbone with a classification head on its output.
pub struct HeadedModel<M> {
    backbone: M,
    head: FcHead,
}

impl<M: Backbone> HeadedModel<M> {
    pub fn new(backbone: M, config: &HeadConfig) -> Result<Self> {
        let head = FcHead::from_config(&backbone.output_shape(), config)?;
        Ok(HeadedModel { backbone, head })
    }

    pub fn predict(&self, input: &Tensor<CpuBackend>, mode: Mode) -> Result<Tensor<CpuBackend>> {
        let features = self.backbone.forward(input)?;
        debug!(features = %features.shape(), ?mode, "backbone forward done");
        self.head.forward(&features, mode)
    }

    pub fn backbone(&self) -> &M {
        &self.backbone
    }

    pub fn head(&self) -> &FcHead {
        &self.head
    }

    /// Parameters updated while the backbone is frozen: the head's only.
    pub fn trainable_parameters(&self) -> Vec<&Tensor<CpuBackend>> {
        self.head.parameters()
    }

    pub fn param_count(&self) -> usize {
        let backbone: usize = self.backbone.parameters().iter().map(|p| p.numel()).sum();
        backbone + self.head.param_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::head::random_features;

    #[test]
    fn test_fixed_features_shape_check() {
        let backbone = FixedFeatures::new(FeatureShape::new(vec![2, 3]));
        let good = random_features(&FeatureShape::new(vec![2, 3]), 4, 0);
        let bad = random_features(&FeatureShape::new(vec![3, 2]), 4, 0);

        assert_eq!(backbone.forward(&good).unwrap().id(), good.id());
        assert!(backbone.forward(&bad).is_err());
    }

    #[test]
    fn test_headed_model_sizes_head_from_backbone() {
        let dims = FeatureShape::new(vec![2, 3]);
        let model = HeadedModel::new(
            FixedFeatures::new(dims.clone()),
            &HeadConfig::new(4, 5).with_seed(3),
        )
        .unwrap();

        assert_eq!(model.head().input_shape(), &dims);
        assert_eq!(model.trainable_parameters().len(), 4);
        assert_eq!(model.param_count(), model.head().param_count());

        let y = model.predict(&random_features(&dims, 2, 1), Mode::Infer).unwrap();
        assert_eq!(y.shape().dims(), &[2, 4]);
    }
}
