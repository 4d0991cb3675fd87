//! `bmv-conv` - Convolution lowering onto the blockmv block engine.
//!
//! Rearranges a 4-D weight tensor and a 3-D input tensor into two matrices
//! (im2col) whose product, computed by tiling onto a `BlockEngine`, equals
//! valid stride-1 convolution.

pub mod conv;
pub mod error;
pub mod geometry;
pub mod lowering;

pub use conv::{conv2d, direct_conv2d};
pub use error::{ConvError, Result};
pub use geometry::ConvGeometry;
pub use lowering::{conv_lowering, lower, Lowered};
