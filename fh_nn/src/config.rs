//! Head hyperparameters, loadable from JSON.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{HeadError, Result};

/// Configuration of a [`FcHead`](crate::FcHead).
///
/// Every field has a default, so `{"classes": 3}` is a complete config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeadConfig {
    /// Number of output categories.
    pub classes: usize,
    /// Width `D` of the hidden dense layer.
    pub hidden_units: usize,
    pub dropout_rate: f32,
    /// Seeds weight init and the dropout mask. Entropy when absent.
    pub seed: Option<u64>,
    pub flatten_name: String,
}

impl Default for HeadConfig {
    fn default() -> Self {
        HeadConfig {
            classes: 2,
            hidden_units: 256,
            dropout_rate: 0.5,
            seed: None,
            flatten_name: "flatten".to_string(),
        }
    }
}

impl HeadConfig {
    pub fn new(classes: usize, hidden_units: usize) -> Self {
        HeadConfig {
            classes,
            hidden_units,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| HeadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.classes == 0 {
            return Err(HeadError::invalid("classes", self.classes, "must be positive"));
        }
        if self.hidden_units == 0 {
            return Err(HeadError::invalid(
                "hidden_units",
                self.hidden_units,
                "must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(HeadError::invalid(
                "dropout_rate",
                self.dropout_rate,
                "must be in [0, 1)",
            ));
        }
        Ok(())
    }

    pub(crate) fn rng(&self) -> StdRng {
        match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        }
    }
}
