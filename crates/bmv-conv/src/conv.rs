use bmv_core::{large_mv, BlockEngine, Tensor};
use tracing::debug;

use crate::error::Result;
use crate::geometry::ConvGeometry;
use crate::lowering::lower;

/// Valid stride-1 convolution computed on a block engine.
///
/// The operands are lowered with im2col, then each output pixel is one tiled
/// matrix-vector product of the flat weights with that pixel's patch column.
/// Returns a tensor of shape [conv_channels, out_h, out_w].
pub fn conv2d<E>(engine: &mut E, weights: &Tensor, inputs: &Tensor) -> Result<Tensor>
where
    E: BlockEngine + ?Sized,
{
    let lowered = lower(weights, inputs)?;
    let g = lowered.geometry;
    let (channels, patch_len, out_len) = (g.conv_channels, g.patch_len(), g.out_len());
    let flat_inputs = lowered.inputs.data();

    let mut out = Tensor::zeros(g.output_shape());
    let mut patch = vec![0.0f32; patch_len];
    let mut column = vec![0.0f32; channels];
    let calls_before = engine.call_count();

    for p in 0..out_len {
        for (k, value) in patch.iter_mut().enumerate() {
            *value = flat_inputs[k * out_len + p];
        }
        large_mv(
            engine,
            lowered.weights.data(),
            &patch,
            &mut column,
            channels,
            patch_len,
        )?;
        let data = out.data_mut();
        for (o, value) in column.iter().enumerate() {
            data[o * out_len + p] = *value;
        }
    }

    debug!(
        engine = engine.name(),
        conv_channels = channels,
        patch_len,
        output = %out.shape(),
        calls = engine.call_count() - calls_before,
        "conv2d complete"
    );
    Ok(out)
}

/// Brute-force valid stride-1 convolution, used as a reference.
pub fn direct_conv2d(weights: &Tensor, inputs: &Tensor) -> Result<Tensor> {
    let g = ConvGeometry::from_tensors(weights, inputs)?;
    Ok(Tensor::from_fn(g.output_shape(), |idx| {
        let (o, y, x) = (idx[0], idx[1], idx[2]);
        let mut sum = 0.0f32;
        for c in 0..g.input_channels {
            for r in 0..g.kernel_h {
                for s in 0..g.kernel_w {
                    sum += weights.at(&[o, c, r, s]) * inputs.at(&[c, y + r, x + s]);
                }
            }
        }
        sum
    }))
}
