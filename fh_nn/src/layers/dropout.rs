//! Dropout regularization.
//!
//! In [`Mode::Train`] every unit is zeroed independently with probability
//! `rate` and the survivors are scaled by `1 / (1 - rate)` (inverted
//! dropout), so the expected activation is unchanged and inference needs no
//! rescaling. In [`Mode::Infer`] the layer is the identity.

use std::sync::{Mutex, PoisonError};

use fh_backend_cpu::CpuBackend;
use fh_tensor::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use super::Mode;
use crate::error::{HeadError, Result};

pub struct Dropout {
    name: String,
    rate: f32,
    // Mutex so forward can take &self.
    rng: Mutex<StdRng>,
}

impl Dropout {
    /// `rate` must lie in `[0, 1)`.
    pub fn new(name: &str, rate: f32) -> Result<Self> {
        Self::with_rng(name, rate, StdRng::from_entropy())
    }

    /// Dropout with a reproducible mask sequence.
    pub fn with_seed(name: &str, rate: f32, seed: u64) -> Result<Self> {
        Self::with_rng(name, rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(name: &str, rate: f32, rng: StdRng) -> Result<Self> {
        if !(0.0..1.0).contains(&rate) {
            return Err(HeadError::invalid("dropout_rate", rate, "must be in [0, 1)"));
        }
        Ok(Dropout {
            name: name.to_string(),
            rate,
            rng: Mutex::new(rng),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn forward(&self, x: &Tensor<CpuBackend>, mode: Mode) -> Tensor<CpuBackend> {
        if !mode.is_training() || self.rate == 0.0 {
            return x.clone();
        }

        let scale = 1.0 / (1.0 - self.rate);
        let mask: Vec<f32> = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            (0..x.numel())
                .map(|_| if rng.gen::<f32>() < self.rate { 0.0 } else { scale })
                .collect()
        };

        trace!(
            layer = %self.name,
            kept = mask.iter().filter(|&&m| m != 0.0).count(),
            total = mask.len(),
            "dropout mask"
        );

        let mask = Tensor::constant(CpuBackend::from_vec(mask, x.shape().clone()));
        x * &mask
    }
}

impl std::fmt::Debug for Dropout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dropout")
            .field("name", &self.name)
            .field("rate", &self.rate)
            .finish_non_exhaustive()
    }
}
