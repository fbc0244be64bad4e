//! CPU backend for fh_tensor.

use fh_tensor::prelude::*;

/// Row-major CPU tensor storage.
#[derive(Clone, Debug)]
pub struct CpuTensor {
    data: Vec<f32>,
    shape: Shape,
    strides: Strides,
}

impl CpuTensor {
    /// Panics if `data.len()` is not the element count of `shape`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "Data length {} doesn't match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        let strides = shape.contiguous_strides();
        CpuTensor { data, shape, strides }
    }

    pub fn flat_index(&self, indices: &[usize]) -> usize {
        self.strides.index(indices)
    }

    pub fn indices(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        TensorIndices::new(&self.shape)
    }

    fn map(&self, f: impl Fn(f32) -> f32) -> CpuTensor {
        CpuTensor::new(self.data.iter().map(|&v| f(v)).collect(), self.shape.clone())
    }
}

impl TensorData for CpuTensor {
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn strides(&self) -> &Strides {
        &self.strides
    }

    fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Odometer over every multi-dimensional index of a shape.
struct TensorIndices<'a> {
    shape: &'a Shape,
    current: Vec<usize>,
    done: bool,
}

impl<'a> TensorIndices<'a> {
    fn new(shape: &'a Shape) -> Self {
        let ndim = shape.ndim();
        let empty = shape.dims().contains(&0);
        TensorIndices {
            shape,
            current: vec![0; ndim],
            done: empty,
        }
    }
}

impl Iterator for TensorIndices<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current.clone();

        if self.shape.ndim() == 0 {
            self.done = true;
            return Some(result);
        }

        // rightmost axis first
        let mut i = self.shape.ndim() - 1;
        loop {
            self.current[i] += 1;
            if self.current[i] < self.shape.dim(i) {
                break;
            }
            self.current[i] = 0;
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
        }

        Some(result)
    }
}

/// CPU backend marker type.
#[derive(Clone, Copy, Debug)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    type Tensor = CpuTensor;

    // === Creation ===

    fn zeros(shape: &Shape) -> CpuTensor {
        Self::full(shape, 0.0)
    }

    fn ones(shape: &Shape) -> CpuTensor {
        Self::full(shape, 1.0)
    }

    fn from_vec(data: Vec<f32>, shape: Shape) -> CpuTensor {
        CpuTensor::new(data, shape)
    }

    fn scalar(value: f32) -> CpuTensor {
        CpuTensor::new(vec![value], Shape::scalar())
    }

    fn full(shape: &Shape, value: f32) -> CpuTensor {
        CpuTensor::new(vec![value; shape.numel()], shape.clone())
    }

    // === Unary ===

    fn neg(x: &CpuTensor) -> CpuTensor {
        x.map(|v| -v)
    }

    fn exp(x: &CpuTensor) -> CpuTensor {
        x.map(f32::exp)
    }

    fn log(x: &CpuTensor) -> CpuTensor {
        x.map(f32::ln)
    }

    fn relu(x: &CpuTensor) -> CpuTensor {
        x.map(|v| v.max(0.0))
    }

    fn sigmoid(x: &CpuTensor) -> CpuTensor {
        x.map(|v| 1.0 / (1.0 + (-v).exp()))
    }

    fn tanh(x: &CpuTensor) -> CpuTensor {
        x.map(f32::tanh)
    }

    // === Binary ===

    fn add(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
        binary_op_broadcast(a, b, |x, y| x + y)
    }

    fn sub(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
        binary_op_broadcast(a, b, |x, y| x - y)
    }

    fn mul(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
        binary_op_broadcast(a, b, |x, y| x * y)
    }

    fn div(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
        binary_op_broadcast(a, b, |x, y| x / y)
    }

    // === Reductions ===

    fn sum(x: &CpuTensor, axes: Option<&[usize]>, keepdims: bool) -> CpuTensor {
        reduce_op(x, axes, keepdims, 0.0, |acc, v| acc + v)
    }

    fn max(x: &CpuTensor, axes: Option<&[usize]>, keepdims: bool) -> CpuTensor {
        reduce_op(x, axes, keepdims, f32::NEG_INFINITY, f32::max)
    }

    // === Linear algebra ===

    fn matmul(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
        matmul_impl(a, b)
    }

    // === Shape ===

    fn reshape(x: &CpuTensor, shape: &Shape) -> CpuTensor {
        assert_eq!(
            x.shape.numel(),
            shape.numel(),
            "Cannot reshape from {:?} to {:?}",
            x.shape,
            shape
        );
        CpuTensor::new(x.data.clone(), shape.clone())
    }
}

/// Materialize `x` at a larger shape, repeating along its unit axes.
fn broadcast_to(x: &CpuTensor, shape: &Shape) -> CpuTensor {
    if x.shape() == shape {
        return x.clone();
    }

    let x_ndim = x.shape.ndim();
    assert!(
        shape.ndim() >= x_ndim,
        "Cannot broadcast {:?} to {:?}",
        x.shape,
        shape
    );
    let offset = shape.ndim() - x_ndim;
    let out_strides = shape.contiguous_strides();
    let mut data = vec![0.0f32; shape.numel()];

    for out_idx in TensorIndices::new(shape) {
        let in_idx: Vec<usize> = (0..x_ndim)
            .map(|i| if x.shape.dim(i) == 1 { 0 } else { out_idx[offset + i] })
            .collect();
        let in_flat = if in_idx.is_empty() { 0 } else { x.strides.index(&in_idx) };
        data[out_strides.index(&out_idx)] = x.data[in_flat];
    }

    CpuTensor::new(data, shape.clone())
}

fn binary_op_broadcast<F>(a: &CpuTensor, b: &CpuTensor, op: F) -> CpuTensor
where
    F: Fn(f32, f32) -> f32,
{
    if a.shape == b.shape {
        let data = a.data.iter().zip(b.data.iter()).map(|(&x, &y)| op(x, y)).collect();
        return CpuTensor::new(data, a.shape.clone());
    }

    let out_shape = a
        .shape
        .broadcast_with(&b.shape)
        .expect("Shapes are not broadcast compatible");

    let a_broadcast = broadcast_to(a, &out_shape);
    let b_broadcast = broadcast_to(b, &out_shape);

    let data = a_broadcast
        .data
        .iter()
        .zip(b_broadcast.data.iter())
        .map(|(&x, &y)| op(x, y))
        .collect();

    CpuTensor::new(data, out_shape)
}

fn reduce_op<F>(
    x: &CpuTensor,
    axes: Option<&[usize]>,
    keepdims: bool,
    init: f32,
    op: F,
) -> CpuTensor
where
    F: Fn(f32, f32) -> f32,
{
    let ndim = x.shape.ndim();
    if ndim == 0 {
        return x.clone();
    }

    let reduce_axes: Vec<usize> = axes
        .map(|a| a.to_vec())
        .unwrap_or_else(|| (0..ndim).collect());

    // kept axis -> Some(size), reduced axis -> Some(1) with keepdims, else dropped
    let out_dims: Vec<usize> = (0..ndim)
        .filter_map(|i| match (reduce_axes.contains(&i), keepdims) {
            (false, _) => Some(x.shape.dim(i)),
            (true, true) => Some(1),
            (true, false) => None,
        })
        .collect();

    let out_shape = Shape::new(out_dims);
    let out_strides = out_shape.contiguous_strides();
    let mut data = vec![init; out_shape.numel()];

    for in_idx in x.indices() {
        let out_idx: Vec<usize> = (0..ndim)
            .filter_map(|i| match (reduce_axes.contains(&i), keepdims) {
                (false, _) => Some(in_idx[i]),
                (true, true) => Some(0),
                (true, false) => None,
            })
            .collect();

        let out_flat = if out_idx.is_empty() { 0 } else { out_strides.index(&out_idx) };
        data[out_flat] = op(data[out_flat], x.data[x.flat_index(&in_idx)]);
    }

    CpuTensor::new(data, out_shape)
}

fn matmul_impl(a: &CpuTensor, b: &CpuTensor) -> CpuTensor {
    let a_ndim = a.shape.ndim();
    let b_ndim = b.shape.ndim();

    assert!(
        (1..=2).contains(&a_ndim) && (1..=2).contains(&b_ndim),
        "matmul supports 1D and 2D operands, got {:?} @ {:?}",
        a.shape,
        b.shape
    );

    // Promote vectors to matrices, multiply, then drop the promoted axes.
    let (m, k) = if a_ndim == 1 { (1, a.shape.dim(0)) } else { (a.shape.dim(0), a.shape.dim(1)) };
    let (k2, n) = if b_ndim == 1 { (b.shape.dim(0), 1) } else { (b.shape.dim(0), b.shape.dim(1)) };

    assert_eq!(
        k, k2,
        "Matrix dimensions don't match for matmul: {:?} @ {:?}",
        a.shape, b.shape
    );

    // i-l-j order walks both operands contiguously.
    let mut data = vec![0.0f32; m * n];
    for i in 0..m {
        let row = &mut data[i * n..(i + 1) * n];
        for l in 0..k {
            let a_il = a.data[i * k + l];
            let b_row = &b.data[l * n..(l + 1) * n];
            for (out, &b_lj) in row.iter_mut().zip(b_row) {
                *out += a_il * b_lj;
            }
        }
    }

    let out_dims = match (a_ndim, b_ndim) {
        (1, 1) => vec![],
        (1, _) => vec![n],
        (_, 1) => vec![m],
        _ => vec![m, n],
    };

    CpuTensor::new(data, Shape::new(out_dims))
}

/// Named trainable leaf on the CPU backend.
pub fn var(name: &str, data: Vec<f32>, shape: Shape) -> Tensor<CpuBackend> {
    Tensor::var(name, CpuBackend::from_vec(data, shape))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(data: Vec<f32>, dims: Vec<usize>) -> CpuTensor {
        CpuBackend::from_vec(data, Shape::new(dims))
    }

    #[test]
    fn test_tensor_creation() {
        let z = CpuBackend::zeros(&Shape::new(vec![2, 3]));
        assert_eq!(z.shape().dims(), &[2, 3]);
        assert_eq!(z.as_slice(), &[0.0; 6]);

        let s = CpuBackend::scalar(42.0);
        assert!(s.shape().is_scalar());
        assert_eq!(s.scalar_value(), 42.0);
    }

    #[test]
    #[should_panic(expected = "doesn't match shape")]
    fn test_creation_length_mismatch() {
        let _ = t(vec![1.0, 2.0], vec![3]);
    }

    #[test]
    fn test_unary_ops() {
        let x = t(vec![1.0, 2.0, -3.0], vec![3]);
        assert_eq!(CpuBackend::neg(&x).as_slice(), &[-1.0, -2.0, 3.0]);
        assert_eq!(CpuBackend::relu(&x).as_slice(), &[1.0, 2.0, 0.0]);

        let zero = t(vec![0.0], vec![1]);
        assert!((CpuBackend::sigmoid(&zero).as_slice()[0] - 0.5).abs() < 1e-6);
        assert!(CpuBackend::tanh(&zero).as_slice()[0].abs() < 1e-6);
    }

    #[test]
    fn test_broadcasting() {
        let a = t(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        let b = t(vec![10.0, 20.0, 30.0], vec![3]);
        assert_eq!(
            CpuBackend::add(&a, &b).as_slice(),
            &[11.0, 22.0, 33.0, 14.0, 25.0, 36.0]
        );

        let col = t(vec![1.0, 2.0], vec![2, 1]);
        assert_eq!(
            CpuBackend::div(&a, &col).as_slice(),
            &[1.0, 2.0, 3.0, 2.0, 2.5, 3.0]
        );
    }

    #[test]
    fn test_broadcast_scalar_and_row() {
        let a = t(vec![1.0, 5.0, -2.0], vec![3]);
        let two = CpuBackend::scalar(2.0);
        assert_eq!(CpuBackend::mul(&a, &two).as_slice(), &[2.0, 10.0, -4.0]);

        let row = t(vec![1.0, 2.0], vec![1, 2]);
        let col = t(vec![10.0, 20.0, 30.0], vec![3, 1]);
        let grid = CpuBackend::add(&row, &col);
        assert_eq!(grid.shape().dims(), &[3, 2]);
        assert_eq!(grid.as_slice(), &[11.0, 12.0, 21.0, 22.0, 31.0, 32.0]);
    }

    #[test]
    #[should_panic(expected = "not broadcast compatible")]
    fn test_broadcast_incompatible() {
        let a = t(vec![0.0; 6], vec![2, 3]);
        let b = t(vec![0.0; 8], vec![2, 4]);
        let _ = CpuBackend::add(&a, &b);
    }

    #[test]
    fn test_reductions() {
        let x = t(vec![1.0, 5.0, 3.0, 4.0, 2.0, 6.0], vec![2, 3]);

        assert_eq!(CpuBackend::sum(&x, None, false).scalar_value(), 21.0);

        let rows = CpuBackend::sum(&x, Some(&[1]), true);
        assert_eq!(rows.shape().dims(), &[2, 1]);
        assert_eq!(rows.as_slice(), &[9.0, 12.0]);

        let col_max = CpuBackend::max(&x, Some(&[0]), false);
        assert_eq!(col_max.shape().dims(), &[3]);
        assert_eq!(col_max.as_slice(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_matmul() {
        let a = t(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        let b = t(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], vec![3, 2]);
        let c = CpuBackend::matmul(&a, &b);
        assert_eq!(c.shape().dims(), &[2, 2]);
        assert_eq!(c.as_slice(), &[58.0, 64.0, 139.0, 154.0]);

        let v = t(vec![1.0, 1.0, 1.0], vec![3]);
        let av = CpuBackend::matmul(&a, &v);
        assert_eq!(av.shape().dims(), &[2]);
        assert_eq!(av.as_slice(), &[6.0, 15.0]);

        let dot = CpuBackend::matmul(&v, &v);
        assert_eq!(dot.scalar_value(), 3.0);
    }

    #[test]
    #[should_panic(expected = "don't match for matmul")]
    fn test_matmul_inner_mismatch() {
        let a = t(vec![0.0; 6], vec![2, 3]);
        let b = t(vec![0.0; 8], vec![4, 2]);
        let _ = CpuBackend::matmul(&a, &b);
    }

    #[test]
    fn test_matmul_zero_times_nonfinite_is_nan() {
        // 0 * inf is NaN under IEEE 754 and must reach the output
        let a = t(vec![0.0, 1.0], vec![1, 2]);
        let b = t(vec![f32::INFINITY, 1.0], vec![2, 1]);
        let c = CpuBackend::matmul(&a, &b);
        assert_eq!(c.shape().dims(), &[1, 1]);
        assert!(c.as_slice()[0].is_nan());

        let nan = t(vec![f32::NAN, 1.0], vec![2]);
        let zeros = t(vec![0.0, 0.0], vec![2]);
        assert!(CpuBackend::matmul(&zeros, &nan).scalar_value().is_nan());
    }

    #[test]
    fn test_reshape() {
        let x = t((0..24).map(|v| v as f32).collect(), vec![2, 3, 4]);
        let y = CpuBackend::reshape(&x, &x.shape().flatten_from(1));
        assert_eq!(y.shape().dims(), &[2, 12]);
        assert_eq!(y.as_slice(), x.as_slice());
    }

    #[test]
    fn test_graph_nodes_keep_inputs() {
        let x = Tensor::<CpuBackend>::from_vec(vec![-1.0, 2.0], Shape::new(vec![1, 2]));
        let y = x.relu() + &x;

        assert_eq!(x.as_slice(), &[-1.0, 2.0]);
        assert_eq!(y.as_slice(), &[-1.0, 4.0]);
        assert_eq!(y.op(), &TensorOp::Add);
        assert!(y.depends_on(&x));
        assert!(!x.depends_on(&y));
    }

    #[test]
    fn test_var_leaf() {
        let w = var("kernel", vec![1.0], Shape::new(vec![1]));
        assert!(w.is_var());
        assert_eq!(w.var_name(), Some("kernel"));
        assert!(w.children().is_empty());
    }
}
