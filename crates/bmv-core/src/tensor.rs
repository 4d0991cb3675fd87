use crate::engine::BlockEngine;
use crate::error::{EngineError, Result};
use crate::shape::Shape;
use crate::tiler::large_mv;

/// Contiguous row-major f32 data with an associated shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Shape,
}

impl Tensor {
    /// Create a tensor from f32 data and a shape.
    ///
    /// # Errors
    /// Returns `EngineError::ShapeMismatch` if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Result<Self> {
        if data.len() != shape.numel() {
            return Err(EngineError::ShapeMismatch {
                what: "tensor data",
                expected: shape.dims().to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape })
    }

    pub fn zeros(shape: Shape) -> Self {
        let n = shape.numel();
        Tensor {
            data: vec![0.0; n],
            shape,
        }
    }

    /// Build a tensor by evaluating `f` at every multi-index in row-major order.
    pub fn from_fn<F>(shape: Shape, mut f: F) -> Self
    where
        F: FnMut(&[usize]) -> f32,
    {
        let n = shape.numel();
        let mut index = vec![0usize; shape.ndim()];
        let mut data = Vec::with_capacity(n);
        for _ in 0..n {
            data.push(f(&index));
            for axis in (0..index.len()).rev() {
                index[axis] += 1;
                if index[axis] < shape.dim(axis) {
                    break;
                }
                index[axis] = 0;
            }
        }
        Tensor { data, shape }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Element at a multi-index.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    pub fn at(&self, index: &[usize]) -> f32 {
        self.data[self.shape.offset(index)]
    }

    /// Reshape the tensor, keeping the data. The element count must not change.
    pub fn reshape(&self, new_shape: Shape) -> Result<Tensor> {
        if self.shape.numel() != new_shape.numel() {
            return Err(EngineError::ShapeMismatch {
                what: "reshape",
                expected: self.shape.dims().to_vec(),
                got: new_shape.dims().to_vec(),
            });
        }
        Ok(Tensor {
            data: self.data.clone(),
            shape: new_shape,
        })
    }

    /// Matrix-vector product of a 2D tensor on a block engine.
    ///
    /// self is [rows, cols], `x` has length cols, the result has length rows.
    pub fn matvec<E>(&self, x: &[f32], engine: &mut E) -> Result<Vec<f32>>
    where
        E: BlockEngine + ?Sized,
    {
        self.shape.expect_rank("matvec matrix", 2)?;
        let (rows, cols) = (self.shape.dim(0), self.shape.dim(1));
        let mut y = vec![0.0; rows];
        large_mv(engine, &self.data, x, &mut y, rows, cols)?;
        Ok(y)
    }
}
