//! Shapes, strides and symbolic per-sample shapes.

use std::fmt;

/// Concrete tensor dimensions, row-major.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// The 0-dimensional shape.
    pub fn scalar() -> Self {
        Shape(vec![])
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    pub fn dim(&self, idx: usize) -> usize {
        self.0[idx]
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Total number of elements. A scalar holds one element; any zero-sized
    /// axis makes the tensor empty.
    pub fn numel(&self) -> usize {
        self.0.iter().product::<usize>()
    }

    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    /// Row-major (C-contiguous) strides.
    pub fn contiguous_strides(&self) -> Strides {
        let ndim = self.0.len();
        if ndim == 0 {
            return Strides(vec![]);
        }

        let mut strides = vec![1usize; ndim];
        for i in (0..ndim - 1).rev() {
            strides[i] = strides[i + 1] * self.0[i + 1];
        }
        Strides(strides)
    }

    /// Numpy-style broadcast of two shapes, aligned on the trailing axis.
    /// Returns `None` when some axis pair is neither equal nor 1.
    pub fn broadcast_with(&self, other: &Shape) -> Option<Shape> {
        let ndim = self.ndim().max(other.ndim());
        let pad_a = ndim - self.ndim();
        let pad_b = ndim - other.ndim();

        let mut result = Vec::with_capacity(ndim);
        for i in 0..ndim {
            let a = if i < pad_a { 1 } else { self.0[i - pad_a] };
            let b = if i < pad_b { 1 } else { other.0[i - pad_b] };
            match (a, b) {
                _ if a == b => result.push(a),
                (1, _) => result.push(b),
                (_, 1) => result.push(a),
                _ => return None,
            }
        }

        Some(Shape(result))
    }

    /// Keep the dims before `axis` and collapse `axis..` into one.
    ///
    /// `[2, 7, 7, 512].flatten_from(1)` is `[2, 25088]`. When `axis` is the
    /// rank, a trailing unit axis is appended.
    pub fn flatten_from(&self, axis: usize) -> Shape {
        let axis = axis.min(self.ndim());
        let mut dims = self.0[..axis].to_vec();
        dims.push(self.0[axis..].iter().product());
        Shape(dims)
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.0)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}

/// Step size of each axis, in elements.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Strides(pub Vec<usize>);

impl Strides {
    pub fn new(strides: Vec<usize>) -> Self {
        Strides(strides)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Flat offset of a multi-dimensional index.
    pub fn index(&self, indices: &[usize]) -> usize {
        debug_assert_eq!(self.0.len(), indices.len());
        self.0.iter().zip(indices.iter()).map(|(s, i)| s * i).sum()
    }
}

/// Per-sample dimensions of a layer output, with the batch axis left
/// symbolic. Displays as `(None, 7, 7, 512)`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FeatureShape(Vec<usize>);

impl FeatureShape {
    pub fn new(dims: Vec<usize>) -> Self {
        FeatureShape(dims)
    }

    /// Non-batch dims.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of non-batch dims.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Elements per sample.
    pub fn width(&self) -> usize {
        self.0.iter().product()
    }

    /// Concrete shape for a batch of `batch` samples.
    pub fn with_batch(&self, batch: usize) -> Shape {
        let mut dims = Vec::with_capacity(self.0.len() + 1);
        dims.push(batch);
        dims.extend_from_slice(&self.0);
        Shape(dims)
    }

    /// Strip the leading batch axis off a concrete shape.
    pub fn of_batched(shape: &Shape) -> Option<FeatureShape> {
        shape
            .dims()
            .split_first()
            .map(|(_, rest)| FeatureShape(rest.to_vec()))
    }
}

impl fmt::Display for FeatureShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(None")?;
        for d in &self.0 {
            write!(f, ", {}", d)?;
        }
        write!(f, ")")
    }
}

impl From<Vec<usize>> for FeatureShape {
    fn from(v: Vec<usize>) -> Self {
        FeatureShape(v)
    }
}

impl From<&[usize]> for FeatureShape {
    fn from(s: &[usize]) -> Self {
        FeatureShape(s.to_vec())
    }
}
