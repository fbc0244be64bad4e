//! Computation graph nodes.
//!
//! A [`Tensor`] is an immutable, reference-counted node: every operation
//! evaluates eagerly on the backend and records a new node whose children
//! are its inputs. Inputs are never modified.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::Backend;
use crate::shape::Shape;
use crate::tensor::TensorData;

static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_node_id() -> u64 {
    NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Unique identifier for a node in the computation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u64);

/// The operation that produced a node.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorOp {
    // === Leaves ===
    Const,
    /// A named, trainable leaf (weights, biases).
    Var { name: String },

    // === Unary ===
    Neg,
    Exp,
    Log,
    Relu,
    Sigmoid,
    Tanh,

    // === Binary ===
    Add,
    Sub,
    Mul,
    Div,

    // === Reductions ===
    Sum {
        axes: Option<Vec<usize>>,
        keepdims: bool,
    },
    Max {
        axes: Option<Vec<usize>>,
        keepdims: bool,
    },

    MatMul,

    Reshape,
}

pub struct TensorNode<B: Backend> {
    pub id: NodeId,
    pub op: TensorOp,
    pub data: B::Tensor,
    pub children: Vec<Tensor<B>>,
}

impl<B: Backend> std::fmt::Debug for TensorNode<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorNode")
            .field("id", &self.id)
            .field("op", &self.op)
            .field("shape", self.data.shape())
            .field("children", &self.children.len())
            .finish()
    }
}

/// A tensor expression in the computation graph.
#[derive(Clone)]
pub struct Tensor<B: Backend>(pub(crate) Arc<TensorNode<B>>);

impl<B: Backend> std::fmt::Debug for Tensor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.0.id)
            .field("op", &self.0.op)
            .field("shape", self.shape())
            .finish()
    }
}

impl<B: Backend> Tensor<B> {
    fn new_node(op: TensorOp, data: B::Tensor, children: Vec<Tensor<B>>) -> Self {
        Tensor(Arc::new(TensorNode {
            id: NodeId(next_node_id()),
            op,
            data,
            children,
        }))
    }

    fn unary(&self, op: TensorOp, data: B::Tensor) -> Self {
        Self::new_node(op, data, vec![self.clone()])
    }

    fn binary(&self, other: &Self, op: TensorOp, data: B::Tensor) -> Self {
        Self::new_node(op, data, vec![self.clone(), other.clone()])
    }

    // === Constructors ===

    pub fn var(name: &str, data: B::Tensor) -> Self {
        Self::new_node(TensorOp::Var { name: name.to_string() }, data, vec![])
    }

    pub fn constant(data: B::Tensor) -> Self {
        Self::new_node(TensorOp::Const, data, vec![])
    }

    pub fn zeros(shape: &Shape) -> Self {
        Self::constant(B::zeros(shape))
    }

    pub fn ones(shape: &Shape) -> Self {
        Self::constant(B::ones(shape))
    }

    pub fn scalar(value: f32) -> Self {
        Self::constant(B::scalar(value))
    }

    pub fn from_vec(data: Vec<f32>, shape: Shape) -> Self {
        Self::constant(B::from_vec(data, shape))
    }

    // === Accessors ===

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn op(&self) -> &TensorOp {
        &self.0.op
    }

    pub fn data(&self) -> &B::Tensor {
        &self.0.data
    }

    pub fn children(&self) -> &[Tensor<B>] {
        &self.0.children
    }

    pub fn shape(&self) -> &Shape {
        self.0.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.shape().ndim()
    }

    pub fn numel(&self) -> usize {
        self.shape().numel()
    }

    pub fn is_var(&self) -> bool {
        matches!(self.0.op, TensorOp::Var { .. })
    }

    pub fn var_name(&self) -> Option<&str> {
        match &self.0.op {
            TensorOp::Var { name } => Some(name),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        self.0.data.as_slice()
    }

    /// True if `other` is this node or one of its ancestors.
    pub fn depends_on(&self, other: &Tensor<B>) -> bool {
        let target = other.id();
        let mut visited = HashSet::new();
        let mut stack = vec![self.clone()];

        while let Some(node) = stack.pop() {
            if node.id() == target {
                return true;
            }
            if visited.insert(node.id()) {
                stack.extend(node.children().iter().cloned());
            }
        }
        false
    }

    // === Unary ===

    pub fn neg(&self) -> Self {
        self.unary(TensorOp::Neg, B::neg(&self.0.data))
    }

    pub fn exp(&self) -> Self {
        self.unary(TensorOp::Exp, B::exp(&self.0.data))
    }

    pub fn log(&self) -> Self {
        self.unary(TensorOp::Log, B::log(&self.0.data))
    }

    pub fn relu(&self) -> Self {
        self.unary(TensorOp::Relu, B::relu(&self.0.data))
    }

    pub fn sigmoid(&self) -> Self {
        self.unary(TensorOp::Sigmoid, B::sigmoid(&self.0.data))
    }

    pub fn tanh(&self) -> Self {
        self.unary(TensorOp::Tanh, B::tanh(&self.0.data))
    }

    // === Binary ===

    pub fn add(&self, other: &Self) -> Self {
        self.binary(other, TensorOp::Add, B::add(&self.0.data, &other.0.data))
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.binary(other, TensorOp::Sub, B::sub(&self.0.data, &other.0.data))
    }

    pub fn mul(&self, other: &Self) -> Self {
        self.binary(other, TensorOp::Mul, B::mul(&self.0.data, &other.0.data))
    }

    pub fn div(&self, other: &Self) -> Self {
        self.binary(other, TensorOp::Div, B::div(&self.0.data, &other.0.data))
    }

    // === Reductions ===

    pub fn sum(&self, axes: Option<&[usize]>, keepdims: bool) -> Self {
        self.unary(
            TensorOp::Sum {
                axes: axes.map(|a| a.to_vec()),
                keepdims,
            },
            B::sum(&self.0.data, axes, keepdims),
        )
    }

    pub fn max(&self, axes: Option<&[usize]>, keepdims: bool) -> Self {
        self.unary(
            TensorOp::Max {
                axes: axes.map(|a| a.to_vec()),
                keepdims,
            },
            B::max(&self.0.data, axes, keepdims),
        )
    }

    // === Linear algebra ===

    pub fn matmul(&self, other: &Self) -> Self {
        self.binary(other, TensorOp::MatMul, B::matmul(&self.0.data, &other.0.data))
    }

    // === Shape ===

    pub fn reshape(&self, shape: &Shape) -> Self {
        self.unary(TensorOp::Reshape, B::reshape(&self.0.data, shape))
    }
}

// === Operator overloads ===

impl<B: Backend> std::ops::Neg for &Tensor<B> {
    type Output = Tensor<B>;
    fn neg(self) -> Tensor<B> {
        Tensor::neg(self)
    }
}

impl<B: Backend> std::ops::Neg for Tensor<B> {
    type Output = Tensor<B>;
    fn neg(self) -> Tensor<B> {
        Tensor::neg(&self)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident) => {
        impl<B: Backend> std::ops::$trait<&Tensor<B>> for &Tensor<B> {
            type Output = Tensor<B>;
            fn $method(self, rhs: &Tensor<B>) -> Tensor<B> {
                Tensor::$method(self, rhs)
            }
        }

        impl<B: Backend> std::ops::$trait<Tensor<B>> for &Tensor<B> {
            type Output = Tensor<B>;
            fn $method(self, rhs: Tensor<B>) -> Tensor<B> {
                Tensor::$method(self, &rhs)
            }
        }

        impl<B: Backend> std::ops::$trait<&Tensor<B>> for Tensor<B> {
            type Output = Tensor<B>;
            fn $method(self, rhs: &Tensor<B>) -> Tensor<B> {
                Tensor::$method(&self, rhs)
            }
        }

        impl<B: Backend> std::ops::$trait<Tensor<B>> for Tensor<B> {
            type Output = Tensor<B>;
            fn $method(self, rhs: Tensor<B>) -> Tensor<B> {
                Tensor::$method(&self, &rhs)
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);
impl_binary_op!(Div, div);
