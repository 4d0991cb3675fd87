use std::fmt;

use crate::error::{EngineError, Result};

/// A row-major tensor shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    pub fn from_slice(dims: &[usize]) -> Self {
        Shape {
            dims: dims.to_vec(),
        }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns the size of dimension `i`.
    ///
    /// # Panics
    /// Panics if `i >= ndim()`.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Row-major strides: for [d0, d1, d2] this is [d1*d2, d2, 1].
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.dims.len()];
        for i in (0..self.dims.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Linear offset of a multi-index. The index must be in bounds.
    pub fn offset(&self, index: &[usize]) -> usize {
        index
            .iter()
            .zip(self.strides())
            .map(|(i, s)| i * s)
            .sum()
    }

    /// Checks that this shape has rank `ndim` and no zero-sized dimension.
    pub fn expect_rank(&self, what: &'static str, ndim: usize) -> Result<()> {
        if self.ndim() != ndim {
            return Err(EngineError::ShapeMismatch {
                what,
                expected: vec![0; ndim],
                got: self.dims.clone(),
            });
        }
        if self.dims.contains(&0) {
            return Err(EngineError::ZeroDimension { what });
        }
        Ok(())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(usize::to_string).collect();
        write!(f, "{}", dims.join("x"))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::from_slice(dims)
    }
}
