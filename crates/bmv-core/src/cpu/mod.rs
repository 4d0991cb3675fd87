use tracing::{debug, trace};

use crate::dims::BlockDims;
use crate::engine::BlockEngine;
use crate::error::Result;

/// Pure-Rust simulation of the block engine.
///
/// Performs the multiply-accumulate in the calling thread on ordinary owned
/// memory. Results are written back over the low end of the buffer, matching
/// the aliasing of the mapped accelerator so the two backends are
/// indistinguishable to the tiler.
#[derive(Debug, Clone)]
pub struct CpuEngine {
    dims: BlockDims,
    data: Vec<f32>,
    out: Vec<f32>,
    calls: usize,
}

impl CpuEngine {
    pub fn new(dims: BlockDims) -> Self {
        debug!(rows = dims.rows(), cols = dims.cols(), "cpu block engine created");
        CpuEngine {
            dims,
            data: vec![0.0; dims.buffer_len()],
            out: vec![0.0; dims.rows()],
            calls: 0,
        }
    }

    /// Convenience constructor taking raw block dimensions.
    pub fn with_dims(rows: usize, cols: usize) -> Result<Self> {
        Ok(Self::new(BlockDims::new(rows, cols)?))
    }
}

impl Default for CpuEngine {
    fn default() -> Self {
        Self::new(BlockDims::CANONICAL)
    }
}

impl BlockEngine for CpuEngine {
    fn name(&self) -> &str {
        "cpu"
    }

    fn dims(&self) -> BlockDims {
        self.dims
    }

    fn buffer_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    fn compute(&mut self) -> Result<&[f32]> {
        self.calls += 1;

        let m = self.dims.rows();
        let v = self.dims.cols();
        let (vec, mat) = self.data.split_at(v);

        for (i, out) in self.out.iter_mut().enumerate() {
            let row = &mat[i * v..(i + 1) * v];
            let mut sum = 0.0f32;
            for j in 0..v {
                sum += vec[j] * row[j];
            }
            *out = sum;
        }

        self.data[..m].copy_from_slice(&self.out);
        trace!(call = self.calls, "cpu block computed");
        Ok(&self.data[..m])
    }

    fn reset(&mut self) {
        self.calls = 0;
    }

    fn call_count(&self) -> usize {
        self.calls
    }
}
