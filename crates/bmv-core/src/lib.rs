//! `bmv-core` - Fixed-shape block engine and tiling dispatcher for blockmv.
//!
//! This crate provides:
//! - A `BlockEngine` trait for fixed-shape matrix-vector multiply-accumulate units
//! - A simulated `CpuEngine` and a physically mapped `MappedEngine`
//! - `large_mv`, which tiles an arbitrary-size product onto an engine
//! - `SharedEngine` for exclusive access from several threads
//! - Row-major `Shape`/`Tensor` containers used by the lowering crate

pub mod config;
pub mod cpu;
pub mod dims;
pub mod engine;
pub mod error;
pub mod mmio;
pub mod shape;
pub mod shared;
pub mod tensor;
pub mod tiler;

// Re-export primary types at the crate root for convenience.
pub use config::MappedConfig;
pub use cpu::CpuEngine;
pub use dims::BlockDims;
pub use engine::BlockEngine;
pub use error::{EngineError, Result};
pub use mmio::MappedEngine;
pub use shape::Shape;
pub use shared::SharedEngine;
pub use tensor::Tensor;
pub use tiler::large_mv;
