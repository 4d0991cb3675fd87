use std::sync::{Mutex, MutexGuard, TryLockError};

use tracing::warn;

use crate::engine::BlockEngine;
use crate::error::{EngineError, Result};
use crate::tiler::large_mv;

/// A block engine that several threads can dispatch to.
///
/// A single engine's results alias storage the next call overwrites, so the
/// whole vector/matrix/compute sequence of a product runs under one lock.
#[derive(Debug)]
pub struct SharedEngine<E> {
    inner: Mutex<E>,
}

impl<E: BlockEngine> SharedEngine<E> {
    pub fn new(engine: E) -> Self {
        SharedEngine {
            inner: Mutex::new(engine),
        }
    }

    /// Run `f` with exclusive access, waiting for other users to finish.
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut E) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        f(&mut guard)
    }

    /// Run `f` with exclusive access, failing instead of waiting.
    ///
    /// # Errors
    /// Returns `EngineError::ConcurrentAccess` if the engine is in use.
    pub fn try_with_engine<T>(&self, f: impl FnOnce(&mut E) -> Result<T>) -> Result<T> {
        let mut guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                warn!("block engine is busy");
                return Err(EngineError::ConcurrentAccess(
                    "engine is held by another caller".to_string(),
                ));
            }
            Err(TryLockError::Poisoned(_)) => return Err(poisoned()),
        };
        f(&mut guard)
    }

    /// Tiled product under the engine lock. See [`large_mv`].
    pub fn large_mv(
        &self,
        matrix: &[f32],
        input: &[f32],
        output: &mut [f32],
        rows: usize,
        cols: usize,
    ) -> Result<()> {
        self.with_engine(|e| large_mv(e, matrix, input, output, rows, cols))
    }

    /// Like [`SharedEngine::large_mv`] but fails with `ConcurrentAccess`
    /// rather than waiting for the lock.
    pub fn try_large_mv(
        &self,
        matrix: &[f32],
        input: &[f32],
        output: &mut [f32],
        rows: usize,
        cols: usize,
    ) -> Result<()> {
        self.try_with_engine(|e| large_mv(e, matrix, input, output, rows, cols))
    }

    pub fn call_count(&self) -> Result<usize> {
        Ok(self.lock()?.call_count())
    }

    pub fn reset(&self) -> Result<()> {
        self.lock()?.reset();
        Ok(())
    }

    pub fn into_inner(self) -> Result<E> {
        self.inner.into_inner().map_err(|_| poisoned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, E>> {
        self.inner.lock().map_err(|_| poisoned())
    }
}

fn poisoned() -> EngineError {
    EngineError::ConcurrentAccess("engine lock poisoned by a panicking caller".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuEngine;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_parallel_callers_get_correct_results() {
        let shared = Arc::new(SharedEngine::new(CpuEngine::with_dims(3, 3).unwrap()));
        let (rows, cols) = (7, 5);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    let a: Vec<f32> = (0..rows * cols).map(|i| (i % 7) as f32 + t as f32).collect();
                    let x = vec![1.0; cols];
                    let mut y = vec![0.0; rows];
                    for _ in 0..10 {
                        shared.large_mv(&a, &x, &mut y, rows, cols).unwrap();
                    }
                    let expected: Vec<f32> = (0..rows)
                        .map(|r| a[r * cols..(r + 1) * cols].iter().sum())
                        .collect();
                    assert_eq!(y, expected);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        // ceil(7/3) * ceil(5/3) = 6 calls per product.
        assert_eq!(shared.call_count().unwrap(), 4 * 10 * 6);
    }

    #[test]
    fn test_try_large_mv_reports_contention() {
        let shared = SharedEngine::new(CpuEngine::with_dims(2, 2).unwrap());
        let mut y = [0.0; 2];
        let err = shared
            .with_engine(|_held| shared.try_large_mv(&[1.0; 4], &[1.0; 2], &mut y, 2, 2))
            .unwrap_err();
        assert!(matches!(err, EngineError::ConcurrentAccess(_)));
        assert_eq!(y, [0.0; 2]);

        shared.try_large_mv(&[1.0; 4], &[1.0; 2], &mut y, 2, 2).unwrap();
        assert_eq!(y, [2.0; 2]);
    }

    #[test]
    fn test_reset_and_into_inner() {
        let shared = SharedEngine::new(CpuEngine::with_dims(2, 2).unwrap());
        let mut y = [0.0; 1];
        shared.large_mv(&[1.0, 2.0], &[3.0, 4.0], &mut y, 1, 2).unwrap();
        assert_eq!(shared.call_count().unwrap(), 1);
        shared.reset().unwrap();
        let engine = shared.into_inner().unwrap();
        assert_eq!(engine.call_count(), 0);
    }
}
