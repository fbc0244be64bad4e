//! Layers the head is assembled from.

mod dense;
mod dropout;
mod flatten;

pub use dense::Dense;
pub use dropout::Dropout;
pub use flatten::Flatten;

/// Whether a forward pass is part of training or inference.
///
/// Only [`Dropout`] behaves differently between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Train,
    #[default]
    Infer,
}

impl Mode {
    pub fn is_training(self) -> bool {
        self == Mode::Train
    }
}
