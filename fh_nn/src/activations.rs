//! Activation functions.

use std::fmt;
use std::str::FromStr;

use fh_backend_cpu::CpuBackend;
use fh_tensor::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::HeadError;

/// ReLU activation: max(0, x)
pub fn relu(x: &Tensor<CpuBackend>) -> Tensor<CpuBackend> {
    x.relu()
}

/// Sigmoid activation: 1 / (1 + exp(-x))
pub fn sigmoid(x: &Tensor<CpuBackend>) -> Tensor<CpuBackend> {
    x.sigmoid()
}

/// Tanh activation: tanh(x)
pub fn tanh(x: &Tensor<CpuBackend>) -> Tensor<CpuBackend> {
    x.tanh()
}

fn last_axis(x: &Tensor<CpuBackend>) -> usize {
    x.ndim().saturating_sub(1)
}

/// Softmax along the last axis.
///
/// Computed as exp(x - max(x)) / sum(exp(x - max(x))) so large logits do not
/// overflow.
pub fn softmax(x: &Tensor<CpuBackend>) -> Tensor<CpuBackend> {
    let axis = last_axis(x);

    let x_max = x.max(Some(&[axis]), true);
    let exp_x = (x - &x_max).exp();
    let sum_exp = exp_x.sum(Some(&[axis]), true);

    exp_x / sum_exp
}

/// log(softmax(x)) along the last axis, as x - max - log(sum(exp(x - max))).
pub fn log_softmax(x: &Tensor<CpuBackend>) -> Tensor<CpuBackend> {
    let axis = last_axis(x);

    let x_max = x.max(Some(&[axis]), true);
    let x_shifted = x - &x_max;
    let log_sum_exp = x_shifted.exp().sum(Some(&[axis]), true).log();

    x_shifted - log_sum_exp
}

/// Activation applied at the end of a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    pub fn apply(self, x: &Tensor<CpuBackend>) -> Tensor<CpuBackend> {
        match self {
            Activation::Linear => x.clone(),
            Activation::Relu => relu(x),
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => tanh(x),
            Activation::Softmax => softmax(x),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Softmax => "softmax",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = HeadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" | "none" => Ok(Activation::Linear),
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "softmax" => Ok(Activation::Softmax),
            _ => Err(HeadError::invalid(
                "activation",
                s,
                "expected one of linear, relu, sigmoid, tanh, softmax",
            )),
        }
    }
}
