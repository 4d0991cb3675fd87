//! im2col lowering.
//!
//! Flat weights are [conv_channels, patch_len]; column `c * kh * kw + r * kw + s`
//! holds `weights[o][c][r][s]`. Flat inputs are [patch_len, out_h * out_w]; the
//! same patch index selects the row and column `y * out_w + x` holds
//! `inputs[c][r + y][s + x]`. Multiplying the two gives the convolution
//! output with channels as rows and output pixels as columns.

use bmv_core::{Shape, Tensor};

use crate::error::{ConvError, Result};
use crate::geometry::ConvGeometry;

/// Flattened operands produced by [`lower`].
#[derive(Debug, Clone)]
pub struct Lowered {
    pub geometry: ConvGeometry,
    pub weights: Tensor,
    pub inputs: Tensor,
}

/// Lower `weights` and `inputs` into pre-sized `flat_weights` and `flat_inputs`.
///
/// The outputs must already have shapes [conv_channels, patch_len] and
/// [patch_len, out_h * out_w]; nothing is resized. Every element of both
/// outputs is written.
///
/// # Errors
/// All shape checks run before either output is touched.
pub fn conv_lowering(
    weights: &Tensor,
    flat_weights: &mut Tensor,
    inputs: &Tensor,
    flat_inputs: &mut Tensor,
) -> Result<ConvGeometry> {
    let g = ConvGeometry::from_tensors(weights, inputs)?;
    expect_shape("flattened weights", flat_weights.shape(), &g.flat_weight_shape())?;
    expect_shape("flattened inputs", flat_inputs.shape(), &g.flat_input_shape())?;

    let patch_len = g.patch_len();
    let src = weights.data();
    let dst = flat_weights.data_mut();
    // The weight tensor's trailing three axes already run in patch order.
    for o in 0..g.conv_channels {
        dst[o * patch_len..(o + 1) * patch_len]
            .copy_from_slice(&src[o * patch_len..(o + 1) * patch_len]);
    }

    let (out_h, out_w) = (g.out_h(), g.out_w());
    let out_len = g.out_len();
    let plane = g.input_h * g.input_w;
    let src = inputs.data();
    let dst = flat_inputs.data_mut();
    for c in 0..g.input_channels {
        for r in 0..g.kernel_h {
            for s in 0..g.kernel_w {
                let row = g.patch_index(c, r, s) * out_len;
                for y in 0..out_h {
                    let from = c * plane + (r + y) * g.input_w + s;
                    let to = row + y * out_w;
                    dst[to..to + out_w].copy_from_slice(&src[from..from + out_w]);
                }
            }
        }
    }

    Ok(g)
}

/// Allocate correctly shaped outputs and lower into them.
pub fn lower(weights: &Tensor, inputs: &Tensor) -> Result<Lowered> {
    let g = ConvGeometry::from_tensors(weights, inputs)?;
    let mut flat_weights = Tensor::zeros(g.flat_weight_shape());
    let mut flat_inputs = Tensor::zeros(g.flat_input_shape());
    conv_lowering(weights, &mut flat_weights, inputs, &mut flat_inputs)?;
    Ok(Lowered {
        geometry: g,
        weights: flat_weights,
        inputs: flat_inputs,
    })
}

fn expect_shape(what: &'static str, got: &Shape, expected: &Shape) -> Result<()> {
    if got != expected {
        return Err(ConvError::ShapeMismatch {
            what,
            expected: expected.dims().to_vec(),
            got: got.dims().to_vec(),
        });
    }
    Ok(())
}
