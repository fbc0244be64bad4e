//! Fully connected classification head.
//!
//! Placed on top of a pre-trained backbone, the head is
//!
//! ```text
//! flatten -> dense(D, relu) -> dropout(0.5) -> dense(classes, softmax)
//! ```
//!
//! and its output is a probability distribution over `classes` per sample.

use std::fmt;

use fh_backend_cpu::CpuBackend;
use fh_tensor::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::activations::Activation;
use crate::config::HeadConfig;
use crate::error::{HeadError, Result};
use crate::layers::{Dense, Dropout, Flatten, Mode};

pub struct FcHead {
    input_shape: FeatureShape,
    flatten: Flatten,
    hidden: Dense,
    dropout: Dropout,
    classifier: Dense,
}

impl FcHead {
    /// Build a head for a backbone whose output has per-sample shape
    /// `backbone_output`, with `hidden_units` hidden units and `classes`
    /// outputs. Dropout rate is 0.5.
    pub fn build(
        backbone_output: &FeatureShape,
        classes: usize,
        hidden_units: usize,
    ) -> Result<Self> {
        Self::from_config(backbone_output, &HeadConfig::new(classes, hidden_units))
    }

    pub fn from_config(backbone_output: &FeatureShape, config: &HeadConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = config.rng();

        let flatten = Flatten::new(&config.flatten_name);
        let flat = flatten.output_shape(backbone_output)?;
        debug!(layer = flatten.name(), output = %flat, "constructed flatten layer");

        let hidden = Dense::new(
            "dense",
            flat.width(),
            config.hidden_units,
            Activation::Relu,
            &mut rng,
        )?;
        let dropout = Dropout::with_seed("dropout", config.dropout_rate, rng.gen())?;
        let classifier = Dense::new(
            "dense_1",
            config.hidden_units,
            config.classes,
            Activation::Softmax,
            &mut rng,
        )?;

        let head = FcHead {
            input_shape: backbone_output.clone(),
            flatten,
            hidden,
            dropout,
            classifier,
        };

        info!(
            input = %head.input_shape,
            classes = config.classes,
            hidden_units = config.hidden_units,
            params = head.param_count(),
            "built classification head"
        );

        Ok(head)
    }

    /// Apply the head to backbone features of shape `[batch, ..input_shape]`.
    ///
    /// Returns `[batch, classes]` probabilities.
    pub fn forward(&self, features: &Tensor<CpuBackend>, mode: Mode) -> Result<Tensor<CpuBackend>> {
        match FeatureShape::of_batched(features.shape()) {
            Some(ref dims) if *dims == self.input_shape => {}
            _ => {
                return Err(HeadError::shape(
                    "head",
                    &self.input_shape,
                    features.shape(),
                ))
            }
        }

        let x = self.flatten.forward(features)?;
        let x = self.hidden.forward(&x)?;
        let x = self.dropout.forward(&x, mode);
        self.classifier.forward(&x)
    }

    /// Per-sample shape the head accepts.
    pub fn input_shape(&self) -> &FeatureShape {
        &self.input_shape
    }

    /// `(None, classes)`.
    pub fn output_shape(&self) -> FeatureShape {
        FeatureShape::new(vec![self.classes()])
    }

    pub fn classes(&self) -> usize {
        self.classifier.out_features()
    }

    pub fn hidden_units(&self) -> usize {
        self.hidden.out_features()
    }

    pub fn dropout_rate(&self) -> f32 {
        self.dropout.rate()
    }

    pub fn parameters(&self) -> Vec<&Tensor<CpuBackend>> {
        let mut params = self.hidden.parameters();
        params.extend(self.classifier.parameters());
        params
    }

    pub fn param_count(&self) -> usize {
        self.hidden.param_count() + self.classifier.param_count()
    }

    pub fn summary(&self) -> Summary {
        let flat = FeatureShape::new(vec![self.hidden.in_features()]);
        let hidden = FeatureShape::new(vec![self.hidden_units()]);

        let layers = vec![
            LayerSummary::new(self.flatten.name(), "Flatten", flat, 0),
            LayerSummary::new(
                self.hidden.name(),
                "Dense",
                hidden.clone(),
                self.hidden.param_count(),
            ),
            LayerSummary::new(self.dropout.name(), "Dropout", hidden, 0),
            LayerSummary::new(
                self.classifier.name(),
                "Dense",
                self.output_shape(),
                self.classifier.param_count(),
            ),
        ];

        Summary {
            input: self.input_shape.clone(),
            layers,
        }
    }
}

impl fmt::Debug for FcHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FcHead")
            .field("input_shape", &self.input_shape)
            .field("hidden", &self.hidden)
            .field("dropout", &self.dropout)
            .field("classifier", &self.classifier)
            .finish()
    }
}

/// One row of a [`Summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    pub name: String,
    pub kind: &'static str,
    pub output: FeatureShape,
    pub params: usize,
}

impl LayerSummary {
    fn new(name: &str, kind: &'static str, output: FeatureShape, params: usize) -> Self {
        LayerSummary {
            name: name.to_string(),
            kind,
            output,
            params,
        }
    }
}

/// Layer-by-layer description of a head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub input: FeatureShape,
    pub layers: Vec<LayerSummary>,
}

impl Summary {
    pub fn total_params(&self) -> usize {
        self.layers.iter().map(|l| l.params).sum()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<24}{:<20}{:>12}", "Layer (type)", "Output Shape", "Param #")?;
        writeln!(f, "{}", "=".repeat(56))?;
        writeln!(f, "{:<24}{:<20}{:>12}", "input", self.input.to_string(), 0)?;
        for layer in &self.layers {
            let label = format!("{} ({})", layer.name, layer.kind);
            writeln!(f, "{:<24}{:<20}{:>12}", label, layer.output.to_string(), layer.params)?;
        }
        writeln!(f, "{}", "=".repeat(56))?;
        write!(f, "Total params: {}", self.total_params())
    }
}

/// Index of the most probable class in each row of a `[batch, classes]`
/// tensor.
pub fn top_class(probs: &Tensor<CpuBackend>) -> Vec<usize> {
    let classes = probs.shape().dims().last().copied().unwrap_or(1).max(1);
    probs
        .as_slice()
        .chunks(classes)
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
                .0
        })
        .collect()
}

/// Seeded head for tests and demos.
pub fn seeded_head(
    backbone_output: &FeatureShape,
    classes: usize,
    hidden_units: usize,
    seed: u64,
) -> Result<FcHead> {
    let config = HeadConfig::new(classes, hidden_units).with_seed(seed);
    FcHead::from_config(backbone_output, &config)
}

/// Random features of shape `[batch, ..dims]`, uniform in `[0, 1)`.
pub fn random_features(dims: &FeatureShape, batch: usize, seed: u64) -> Tensor<CpuBackend> {
    let shape = dims.with_batch(batch);
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..shape.numel()).map(|_| rng.gen::<f32>()).collect();
    Tensor::from_vec(data, shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_head_forward() {
        let dims = FeatureShape::new(vec![2, 2, 3]);
        let head = seeded_head(&dims, 4, 8, 5).unwrap();
        let x = random_features(&dims, 3, 1);

        let y = head.forward(&x, Mode::Infer).unwrap();
        assert_eq!(y.shape().dims(), &[3, 4]);

        for row in y.as_slice().chunks(4) {
            assert!(row.iter().all(|&p| p >= 0.0));
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_summary_rows() {
        let head = seeded_head(&FeatureShape::new(vec![4, 5]), 3, 6, 0).unwrap();
        let summary = head.summary();

        let kinds: Vec<_> = summary.layers.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, ["Flatten", "Dense", "Dropout", "Dense"]);
        assert_eq!(summary.total_params(), 20 * 6 + 6 + 6 * 3 + 3);
        assert_eq!(summary.total_params(), head.param_count());

        let text = summary.to_string();
        assert!(text.contains("flatten (Flatten)"));
        assert!(text.ends_with("Total params: 147"));
    }

    #[test]
    fn test_wrong_feature_shape() {
        let head = seeded_head(&FeatureShape::new(vec![2, 2]), 2, 4, 0).unwrap();
        let x = random_features(&FeatureShape::new(vec![2, 3]), 1, 0);

        let err = head.forward(&x, Mode::Infer).unwrap_err();
        assert!(matches!(err, HeadError::ShapeMismatch { ref layer, .. } if layer == "head"));
    }

    #[test]
    fn test_top_class() {
        let probs = Tensor::<CpuBackend>::from_vec(
            vec![0.1, 0.7, 0.2, 0.5, 0.2, 0.3],
            Shape::new(vec![2, 3]),
        );
        assert_eq!(top_class(&probs), vec![1, 0]);
    }
}
