//! CLI demo for the classification head builder.
//!
//! Builds a head on top of a backbone output shape, prints its summary, and
//! runs a forward pass over random feature maps.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fh_nn::head::random_features;
use fh_nn::{top_class, FixedFeatures, HeadConfig, HeadedModel, Mode};
use fh_tensor::FeatureShape;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fchead", version, about = "Build a classification head on a backbone output")]
struct Args {
    /// Per-sample backbone output dims, comma separated
    #[arg(long, value_delimiter = ',', default_value = "7,7,512")]
    features: Vec<usize>,

    /// JSON head config; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of output classes
    #[arg(long)]
    classes: Option<usize>,

    /// Hidden dense width (D)
    #[arg(long)]
    hidden: Option<usize>,

    /// Dropout rate applied in training mode
    #[arg(long)]
    dropout: Option<f32>,

    /// Seed for weight init, dropout masks and the random input batch
    #[arg(long)]
    seed: Option<u64>,

    /// Samples in the demo batch
    #[arg(long, default_value_t = 2)]
    batch: usize,

    /// Run the forward pass in training mode (dropout active)
    #[arg(long)]
    train: bool,
}

impl Args {
    fn head_config(&self) -> Result<HeadConfig> {
        let mut config = match &self.config {
            Some(path) => HeadConfig::load(path)
                .with_context(|| format!("loading head config from {}", path.display()))?,
            None => HeadConfig::default(),
        };

        if let Some(classes) = self.classes {
            config.classes = classes;
        }
        if let Some(hidden) = self.hidden {
            config.hidden_units = hidden;
        }
        if let Some(rate) = self.dropout {
            config.dropout_rate = rate;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        Ok(config)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Args::parse()) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    anyhow::ensure!(args.batch > 0, "--batch must be positive");

    let config = args.head_config()?;
    let backbone_output = FeatureShape::new(args.features.clone());

    info!(backbone_output = %backbone_output, ?config, "building head");

    let model = HeadedModel::new(FixedFeatures::new(backbone_output.clone()), &config)
        .context("building classification head")?;

    println!("{}\n", model.head().summary());

    let mode = if args.train { Mode::Train } else { Mode::Infer };
    let features = random_features(&backbone_output, args.batch, config.seed.unwrap_or(0));
    let probs = model
        .predict(&features, mode)
        .context("running forward pass")?;

    println!("Forward pass ({mode:?}), output shape {}:", probs.shape());
    let predicted = top_class(&probs);
    for (i, row) in probs.as_slice().chunks(config.classes).enumerate() {
        let formatted: Vec<String> = row.iter().map(|p| format!("{p:.4}")).collect();
        println!("  sample {i}: [{}] -> class {}", formatted.join(", "), predicted[i]);
    }

    Ok(())
}
