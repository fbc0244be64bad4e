//! Dense (fully connected) layer.

use fh_backend_cpu::CpuBackend;
use fh_tensor::prelude::*;
use rand::Rng;
use tracing::debug;

use crate::activations::Activation;
use crate::error::{HeadError, Result};

/// A dense layer: y = act(x @ K + b)
pub struct Dense {
    name: String,
    /// Kernel matrix [in_features, units]
    pub kernel: Tensor<CpuBackend>,
    /// Bias vector [units]
    pub bias: Option<Tensor<CpuBackend>>,
    activation: Activation,
}

impl Dense {
    /// Create a dense layer with random initialization.
    ///
    /// Kernel is He-uniform, `U(-sqrt(6 / fan_in), sqrt(6 / fan_in))`, which
    /// has variance `2 / fan_in`. Bias starts at zero. Fails with
    /// [`HeadError::InvalidConfig`] when either size is zero.
    pub fn new<R: Rng>(
        name: &str,
        in_features: usize,
        units: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if units == 0 {
            return Err(HeadError::invalid("units", units, "must be positive"));
        }
        if in_features == 0 {
            return Err(HeadError::invalid("in_features", in_features, "must be positive"));
        }

        let limit = he_uniform_limit(in_features);
        let kernel_data: Vec<f32> = (0..in_features * units)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();

        let kernel = Tensor::var(
            &format!("{name}/kernel"),
            CpuBackend::from_vec(kernel_data, Shape::new(vec![in_features, units])),
        );
        let bias = Tensor::var(
            &format!("{name}/bias"),
            CpuBackend::zeros(&Shape::new(vec![units])),
        );

        debug!(layer = name, in_features, units, %activation, "constructed dense layer");

        Ok(Dense {
            name: name.to_string(),
            kernel,
            bias: Some(bias),
            activation,
        })
    }

    /// Build from existing kernel `[in, units]` and bias `[units]` tensors.
    pub fn from_tensors(
        name: &str,
        kernel: Tensor<CpuBackend>,
        bias: Option<Tensor<CpuBackend>>,
        activation: Activation,
    ) -> Result<Self> {
        if kernel.ndim() != 2 || kernel.numel() == 0 {
            return Err(HeadError::shape(name, "non-empty (in_features, units) kernel", kernel.shape()));
        }
        let units = kernel.shape().dim(1);
        if let Some(b) = &bias {
            if b.shape().dims() != [units] {
                return Err(HeadError::shape(name, Shape::new(vec![units]), b.shape()));
            }
        }
        Ok(Dense {
            name: name.to_string(),
            kernel,
            bias,
            activation,
        })
    }

    /// Input `[batch, in_features]`, output `[batch, units]`.
    pub fn forward(&self, x: &Tensor<CpuBackend>) -> Result<Tensor<CpuBackend>> {
        if x.ndim() != 2 || x.shape().dim(1) != self.in_features() {
            return Err(HeadError::shape(
                &self.name,
                format!("(batch, {})", self.in_features()),
                x.shape(),
            ));
        }

        let y = x.matmul(&self.kernel);
        let y = match &self.bias {
            Some(bias) => &y + bias,
            None => y,
        };

        Ok(self.activation.apply(&y))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn in_features(&self) -> usize {
        self.kernel.shape().dim(0)
    }

    pub fn out_features(&self) -> usize {
        self.kernel.shape().dim(1)
    }

    pub fn parameters(&self) -> Vec<&Tensor<CpuBackend>> {
        let mut params = vec![&self.kernel];
        if let Some(ref b) = self.bias {
            params.push(b);
        }
        params
    }

    pub fn param_count(&self) -> usize {
        self.parameters().iter().map(|p| p.numel()).sum()
    }
}

/// Bound of the He-uniform distribution for `fan_in` inputs.
fn he_uniform_limit(fan_in: usize) -> f32 {
    (6.0 / fan_in as f32).sqrt()
}

impl std::fmt::Debug for Dense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dense")
            .field("name", &self.name)
            .field("in_features", &self.in_features())
            .field("units", &self.out_features())
            .field("activation", &self.activation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_dense_forward_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = Dense::new("dense", 3, 2, Activation::Linear, &mut rng).unwrap();

        let x = Tensor::<CpuBackend>::from_vec(vec![1.0, 2.0, 3.0], Shape::new(vec![1, 3]));
        let y = layer.forward(&x).unwrap();

        assert_eq!(y.shape().dims(), &[1, 2]);
        assert_eq!(layer.param_count(), 3 * 2 + 2);
        assert!(y.depends_on(&layer.kernel));
    }

    #[test]
    fn test_dense_known_weights() {
        let kernel = fh_backend_cpu::var("k", vec![1.0, -1.0, 2.0, 0.5], Shape::new(vec![2, 2]));
        let bias = fh_backend_cpu::var("b", vec![0.0, -10.0], Shape::new(vec![2]));
        let layer = Dense::from_tensors("dense", kernel, Some(bias), Activation::Relu).unwrap();

        let x = Tensor::<CpuBackend>::from_vec(vec![1.0, 1.0], Shape::new(vec![1, 2]));
        let y = layer.forward(&x).unwrap();

        // [1*1 + 1*2, 1*-1 + 1*0.5 - 10] = [3, -10.5] -> relu
        assert_eq!(y.as_slice(), &[3.0, 0.0]);
    }

    #[test]
    fn test_dense_init_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = Dense::new("dense", 8, 4, Activation::Relu, &mut rng).unwrap();
        let limit = (6.0f32 / 8.0).sqrt();

        assert!(layer.kernel.as_slice().iter().all(|w| w.abs() <= limit));
        assert!(layer.bias.as_ref().unwrap().as_slice().iter().all(|&b| b == 0.0));
        assert_eq!(layer.kernel.var_name(), Some("dense/kernel"));
    }

    #[test]
    fn test_dense_init_variance() {
        let mut rng = StdRng::seed_from_u64(3);
        let fan_in = 200;
        let layer = Dense::new("dense", fan_in, 100, Activation::Relu, &mut rng).unwrap();

        let w = layer.kernel.as_slice();
        let n = w.len() as f32;
        let mean = w.iter().sum::<f32>() / n;
        let var = w.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        let expected = 2.0 / fan_in as f32;

        assert!(mean.abs() < 0.01, "mean = {mean}");
        assert!((var - expected).abs() < 0.1 * expected, "var = {var}, expected {expected}");
        assert!(w.iter().any(|v| v.abs() > (2.0f32 / fan_in as f32).sqrt()));
    }

    #[test]
    fn test_dense_zero_units_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = Dense::new("dense", 4, 0, Activation::Relu, &mut rng).unwrap_err();
        assert!(matches!(err, HeadError::InvalidConfig { param: "units", .. }));

        let err = Dense::new("dense", 0, 4, Activation::Relu, &mut rng).unwrap_err();
        assert!(matches!(err, HeadError::InvalidConfig { param: "in_features", .. }));
    }

    #[test]
    fn test_dense_wrong_input_width() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = Dense::new("dense_1", 4, 2, Activation::Softmax, &mut rng).unwrap();
        let x = Tensor::<CpuBackend>::from_vec(vec![0.0; 6], Shape::new(vec![2, 3]));

        let err = layer.forward(&x).unwrap_err();
        assert_eq!(
            err.to_string(),
            "shape mismatch in `dense_1`: expected (batch, 4), got (2, 3)"
        );
    }
}
