//! Tiling dispatcher: arbitrary-size matrix-vector products on a fixed-shape
//! block engine.

use tracing::{debug, trace};

use crate::engine::BlockEngine;
use crate::error::{EngineError, Result};

/// Computes `output = matrix * input` by tiling onto `engine`.
///
/// - `matrix`: row-major data of shape [rows, cols]
/// - `input`: vector of length `cols`
/// - `output`: vector of length `rows`
///
/// Row blocks of `m` and column blocks of `v` are visited row-block-major;
/// each block call's partial sums are accumulated, so a row is complete only
/// after its last column block. Exactly `ceil(rows/m) * ceil(cols/v)` block
/// calls are issued.
///
/// # Errors
/// Shape errors are reported before any engine call. If a block call fails
/// partway, `output` is left untouched.
pub fn large_mv<E>(
    engine: &mut E,
    matrix: &[f32],
    input: &[f32],
    output: &mut [f32],
    rows: usize,
    cols: usize,
) -> Result<()>
where
    E: BlockEngine + ?Sized,
{
    check_operands(matrix, input, output, rows, cols)?;

    let dims = engine.dims();
    let (m, v) = (dims.rows(), dims.cols());
    let mut acc = vec![0.0f32; rows];

    for i in (0..rows).step_by(m) {
        let block_row = m.min(rows - i);
        for j in (0..cols).step_by(v) {
            let block_col = v.min(cols - j);

            // Stale values from the previous call must not reach the dot
            // product: clear the vector slot and every matrix row in use.
            engine.buffer_mut()[..v * (block_row + 1)].fill(0.0);

            engine.vector()[..block_col].copy_from_slice(&input[j..j + block_col]);
            for r in 0..block_row {
                let src = (i + r) * cols + j;
                engine.matrix_row(r)[..block_col].copy_from_slice(&matrix[src..src + block_col]);
            }

            let partial = engine.compute()?;
            for (row, value) in partial[..block_row].iter().enumerate() {
                acc[i + row] += value;
            }
            trace!(i, j, block_row, block_col, "block accumulated");
        }
    }

    output.copy_from_slice(&acc);
    debug!(
        engine = engine.name(),
        rows,
        cols,
        calls = engine.call_count(),
        "large_mv complete"
    );
    Ok(())
}

fn check_operands(
    matrix: &[f32],
    input: &[f32],
    output: &[f32],
    rows: usize,
    cols: usize,
) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(EngineError::ZeroDimension { what: "large_mv matrix" });
    }
    if rows.checked_mul(cols) != Some(matrix.len()) {
        return Err(EngineError::ShapeMismatch {
            what: "large_mv matrix",
            expected: vec![rows, cols],
            got: vec![matrix.len()],
        });
    }
    if input.len() != cols {
        return Err(EngineError::ShapeMismatch {
            what: "large_mv input",
            expected: vec![cols],
            got: vec![input.len()],
        });
    }
    if output.len() != rows {
        return Err(EngineError::ShapeMismatch {
            what: "large_mv output",
            expected: vec![rows],
            got: vec![output.len()],
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuEngine;
    use crate::dims::BlockDims;

    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const M: usize = 4;
    const V: usize = 6;

    fn engine() -> CpuEngine {
        CpuEngine::with_dims(M, V).unwrap()
    }

    fn random(rng: &mut StdRng, n: usize) -> Vec<f32> {
        (0..n).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
    }

    fn naive(a: &[f32], x: &[f32], rows: usize, cols: usize) -> Vec<f32> {
        (0..rows)
            .map(|i| {
                let mut sum = 0.0f32;
                for j in 0..cols {
                    sum += a[i * cols + j] * x[j];
                }
                sum
            })
            .collect()
    }

    /// Engine that fails on a chosen call.
    #[derive(Debug)]
    struct FailingEngine {
        inner: CpuEngine,
        fail_on: usize,
    }

    impl BlockEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> BlockDims {
            self.inner.dims()
        }
        fn buffer_mut(&mut self) -> &mut [f32] {
            self.inner.buffer_mut()
        }
        fn compute(&mut self) -> Result<&[f32]> {
            if self.inner.call_count() + 1 == self.fail_on {
                return Err(EngineError::HandshakeTimeout {
                    timeout: std::time::Duration::ZERO,
                    calls: self.fail_on,
                });
            }
            self.inner.compute()
        }
        fn reset(&mut self) {
            self.inner.reset()
        }
        fn call_count(&self) -> usize {
            self.inner.call_count()
        }
    }

    #[test]
    fn test_matches_naive_on_boundary_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        let row_sizes = [1, M - 1, M, M + 1, 2 * M + 3];
        let col_sizes = [1, V - 1, V, V + 1, 2 * V + 3];

        for &rows in &row_sizes {
            for &cols in &col_sizes {
                let a = random(&mut rng, rows * cols);
                let x = random(&mut rng, cols);
                let mut y = vec![f32::NAN; rows];

                let mut e = engine();
                large_mv(&mut e, &a, &x, &mut y, rows, cols).unwrap();

                let expected = naive(&a, &x, rows, cols);
                for (got, want) in y.iter().zip(&expected) {
                    assert_relative_eq!(*got, *want, epsilon = 1e-5, max_relative = 1e-5);
                }
                assert_eq!(e.call_count(), rows.div_ceil(M) * cols.div_ceil(V));
            }
        }
    }

    #[test]
    fn test_identity_with_canonical_engine() {
        let n = 37;
        let mut a = vec![0.0f32; n * n];
        for i in 0..n {
            a[i * n + i] = 1.0;
        }
        let x: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let mut y = vec![0.0; n];
        let mut e = CpuEngine::default();
        large_mv(&mut e, &a, &x, &mut y, n, n).unwrap();
        assert_eq!(y, x);
        assert_eq!(e.call_count(), 9);
    }

    #[test]
    fn test_single_block_when_smaller_than_engine() {
        let mut e = engine();
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let x = [1.0, 1.0, 1.0];
        let mut y = [0.0; 2];
        large_mv(&mut e, &a, &x, &mut y, 2, 3).unwrap();
        assert_eq!(y, [6.0, 15.0]);
        assert_eq!(e.call_count(), 1);
    }

    #[test]
    fn test_stale_buffer_never_leaks() {
        let mut e = engine();
        e.buffer_mut().fill(f32::NAN);

        let a = [1.0, -2.0, 0.5, 3.0, 4.0, -1.0, 2.0, 2.0, 0.25];
        let x = [2.0, 1.0, -4.0];
        let mut y = [0.0; 3];
        large_mv(&mut e, &a, &x, &mut y, 3, 3).unwrap();
        assert_eq!(y, [-2.0, 14.0, 5.0]);

        // A full-size product leaves garbage behind for a smaller one.
        let mut rng = StdRng::seed_from_u64(11);
        let big = random(&mut rng, M * V);
        let bx = random(&mut rng, V);
        let mut by = vec![0.0; M];
        large_mv(&mut e, &big, &bx, &mut by, M, V).unwrap();
        large_mv(&mut e, &a, &x, &mut y, 3, 3).unwrap();
        assert_eq!(y, [-2.0, 14.0, 5.0]);
    }

    #[test]
    fn test_reset_and_repeat() {
        let mut rng = StdRng::seed_from_u64(3);
        let (rows, cols) = (2 * M + 3, V + 1);
        let a = random(&mut rng, rows * cols);
        let x = random(&mut rng, cols);
        let mut e = engine();

        let mut first = vec![0.0; rows];
        large_mv(&mut e, &a, &x, &mut first, rows, cols).unwrap();
        let calls = e.call_count();
        assert_eq!(calls, 3 * 2);

        e.reset();
        assert_eq!(e.call_count(), 0);

        let mut second = vec![0.0; rows];
        large_mv(&mut e, &a, &x, &mut second, rows, cols).unwrap();
        assert_eq!(first, second);
        assert_eq!(e.call_count(), calls);
    }

    #[test]
    fn test_output_is_overwritten_not_accumulated() {
        let mut e = engine();
        let mut y = [100.0, 100.0];
        large_mv(&mut e, &[1.0, 0.0, 0.0, 1.0], &[3.0, 4.0], &mut y, 2, 2).unwrap();
        assert_eq!(y, [3.0, 4.0]);
    }

    #[test]
    fn test_shape_errors_leave_output_untouched() {
        let mut e = engine();
        let mut y = [9.0; 2];

        let err = large_mv(&mut e, &[1.0; 5], &[1.0; 3], &mut y, 2, 3).unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch { what: "large_mv matrix", .. }));

        let err = large_mv(&mut e, &[1.0; 6], &[1.0; 2], &mut y, 2, 3).unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch { what: "large_mv input", .. }));

        let err = large_mv(&mut e, &[1.0; 6], &[1.0; 3], &mut [0.0; 3], 2, 3).unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch { what: "large_mv output", .. }));

        let err = large_mv(&mut e, &[], &[], &mut [], 0, 0).unwrap_err();
        assert!(matches!(err, EngineError::ZeroDimension { .. }));

        assert_eq!(y, [9.0; 2]);
        assert_eq!(e.call_count(), 0);
    }

    #[test]
    fn test_overflowing_shape_is_a_shape_error() {
        let mut e = CpuEngine::with_dims(2, 2).unwrap();
        let mut y = [0.0; 2];
        let err = large_mv(&mut e, &[1.0; 4], &[1.0; 2], &mut y, usize::MAX / 2 + 1, 2).unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch { what: "large_mv matrix", .. }));
        assert_eq!(e.call_count(), 0);
    }

    #[test]
    fn test_failed_block_leaves_output_untouched() {
        let mut e = FailingEngine {
            inner: engine(),
            fail_on: 3,
        };
        let (rows, cols) = (M + 1, V + 1);
        let a = vec![1.0; rows * cols];
        let x = vec![1.0; cols];
        let mut y = vec![-1.0; rows];

        let err = large_mv(&mut e, &a, &x, &mut y, rows, cols).unwrap_err();
        assert!(matches!(err, EngineError::HandshakeTimeout { calls: 3, .. }));
        assert_eq!(y, vec![-1.0; rows]);
    }

    #[test]
    fn test_works_through_trait_object() {
        let mut e: Box<dyn BlockEngine> = Box::new(engine());
        let mut y = [0.0];
        large_mv(e.as_mut(), &[2.0, 3.0], &[5.0, 7.0], &mut y, 1, 2).unwrap();
        assert_eq!(y, [31.0]);
    }
}
