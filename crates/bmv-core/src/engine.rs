use std::fmt::Debug;

use crate::dims::BlockDims;
use crate::error::Result;

/// Trait for fixed-shape matrix-vector multiply-accumulate units.
///
/// An engine owns a single buffer of `(m + 1) * v` scalars:
///
/// - `[0, v)`: the vector slot
/// - `[v, (m + 1) * v)`: the matrix slot, `m` rows of `v` scalars, row-major
///
/// `compute` writes its `m` results into the low end of that same buffer, so
/// the returned slice aliases the vector slot. Copy results out before
/// touching `vector()` or `matrix()` again; the borrow checker enforces this
/// for safe callers.
pub trait BlockEngine: Debug {
    /// Returns the name of this backend (e.g., "cpu", "mmio").
    fn name(&self) -> &str;

    /// Native block shape of this engine.
    fn dims(&self) -> BlockDims;

    /// The whole engine buffer, vector slot followed by matrix slot.
    fn buffer_mut(&mut self) -> &mut [f32];

    /// Runs one block multiply-accumulate.
    ///
    /// For each row `i` in `[0, m)`:
    ///   result[i] = sum_j vector[j] * matrix[i * v + j]
    ///
    /// Returns the `m` results. Values pass through unchanged; no NaN or
    /// overflow handling is applied.
    fn compute(&mut self) -> Result<&[f32]>;

    /// Resets the call counter to zero.
    fn reset(&mut self);

    /// Number of `compute` invocations since construction or the last `reset`.
    fn call_count(&self) -> usize;

    /// The vector slot, `v` scalars.
    fn vector(&mut self) -> &mut [f32] {
        let v = self.dims().cols();
        &mut self.buffer_mut()[..v]
    }

    /// The matrix slot, `m` rows with row stride `v`.
    fn matrix(&mut self) -> &mut [f32] {
        let v = self.dims().cols();
        &mut self.buffer_mut()[v..]
    }

    /// Row `r` of the matrix slot.
    ///
    /// # Panics
    /// Panics if `r >= m`.
    fn matrix_row(&mut self, r: usize) -> &mut [f32] {
        let v = self.dims().cols();
        let start = v * (r + 1);
        &mut self.buffer_mut()[start..start + v]
    }
}
