//! Error type shared by every layer constructor and forward pass.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeadError {
    /// A hyperparameter is outside its valid range.
    #[error("invalid configuration: {param} = {value} ({constraint})")]
    InvalidConfig {
        param: &'static str,
        value: String,
        constraint: &'static str,
    },

    /// A layer received a tensor it was not built for.
    #[error("shape mismatch in `{layer}`: expected {expected}, got {actual}")]
    ShapeMismatch {
        layer: String,
        expected: String,
        actual: String,
    },

    #[error("failed to parse head config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HeadError {
    pub(crate) fn invalid(
        param: &'static str,
        value: impl ToString,
        constraint: &'static str,
    ) -> Self {
        HeadError::InvalidConfig {
            param,
            value: value.to_string(),
            constraint,
        }
    }

    pub(crate) fn shape(
        layer: &str,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        HeadError::ShapeMismatch {
            layer: layer.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HeadError>;
