//! # fh_nn - Classification heads for pre-trained backbones
//!
//! Builds the fully connected head that adapts a frozen feature extractor to
//! a new classification task:
//!
//! - **Layers**: [`Flatten`], [`Dense`], [`Dropout`]
//! - **Activations**: ReLU, Sigmoid, Tanh, Softmax, Log-Softmax
//! - **Head**: [`FcHead`] (flatten -> dense(D, relu) -> dropout -> dense(classes, softmax))
//! - **Backbone seam**: [`Backbone`], [`HeadedModel`]
//!
//! ## Example
//!
//! ```ignore
//! use fh_nn::{FcHead, Mode};
//! use fh_tensor::FeatureShape;
//!
//! // VGG16 conv output
//! let backbone_output = FeatureShape::new(vec![7, 7, 512]);
//! let head = FcHead::build(&backbone_output, 3, 256)?;
//!
//! println!("{}", head.summary());
//!
//! let features = fh_nn::head::random_features(&backbone_output, 2, 0);
//! let probs = head.forward(&features, Mode::Infer)?;
//! assert_eq!(probs.shape().dims(), &[2, 3]);
//! ```

pub mod activations;
pub mod backbone;
pub mod config;
pub mod error;
pub mod head;
pub mod layers;

pub use activations::{log_softmax, relu, sigmoid, softmax, tanh, Activation};
pub use backbone::{Backbone, FixedFeatures, HeadedModel};
pub use config::HeadConfig;
pub use error::{HeadError, Result};
pub use head::{top_class, FcHead, LayerSummary, Summary};
pub use layers::{Dense, Dropout, Flatten, Mode};
