use crate::error::{EngineError, Result};

/// Native operand shape of a block engine.
///
/// `rows` is the number of outputs produced per call (`m`), `cols` the number
/// of input columns consumed per call (`v`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockDims {
    rows: usize,
    cols: usize,
}

impl BlockDims {
    /// Block shape of the canonical accelerator.
    pub const CANONICAL: BlockDims = BlockDims { rows: 16, cols: 16 };

    /// Create block dimensions, rejecting zero-sized blocks and blocks whose
    /// buffer size in bytes does not fit in `usize`.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        let bytes = rows
            .checked_add(1)
            .and_then(|r| r.checked_mul(cols))
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()));
        if rows == 0 || cols == 0 || bytes.is_none() {
            return Err(EngineError::InvalidBlockDims { rows, cols });
        }
        Ok(BlockDims { rows, cols })
    }

    /// Output rows per call (`m`).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Input columns per call (`v`).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Scalars in the engine buffer: one vector slot plus `rows` matrix rows.
    pub fn buffer_len(&self) -> usize {
        (self.rows + 1) * self.cols
    }

    /// Scalars in the matrix slot.
    pub fn matrix_len(&self) -> usize {
        self.rows * self.cols
    }

    /// Number of block calls needed to cover a `rows x cols` product.
    pub fn block_calls(&self, rows: usize, cols: usize) -> usize {
        rows.div_ceil(self.rows) * cols.div_ceil(self.cols)
    }
}

impl Default for BlockDims {
    fn default() -> Self {
        Self::CANONICAL
    }
}
