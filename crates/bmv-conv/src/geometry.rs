use bmv_core::{Shape, Tensor};

use crate::error::{ConvError, Result};

/// Dimensions of a valid (stride-1, unpadded) convolution.
///
/// Weights are [conv_channels, input_channels, kernel_h, kernel_w] and inputs
/// are [input_channels, input_h, input_w].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    pub conv_channels: usize,
    pub input_channels: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub input_h: usize,
    pub input_w: usize,
}

impl ConvGeometry {
    /// Derive and validate the geometry from a weight and an input tensor.
    ///
    /// # Errors
    /// Fails if either tensor has the wrong rank or a zero-sized dimension,
    /// the channel counts disagree, or the kernel is larger than the input.
    pub fn from_tensors(weights: &Tensor, inputs: &Tensor) -> Result<ConvGeometry> {
        let w = check_rank("conv weights", weights.shape(), 4)?;
        let x = check_rank("conv inputs", inputs.shape(), 3)?;

        if w[1] != x[0] {
            return Err(ConvError::ChannelMismatch {
                weights: w[1],
                inputs: x[0],
            });
        }
        if x[1] < w[2] || x[2] < w[3] {
            return Err(ConvError::KernelLargerThanInput {
                kernel: (w[2], w[3]),
                input: (x[1], x[2]),
            });
        }

        Ok(ConvGeometry {
            conv_channels: w[0],
            input_channels: w[1],
            kernel_h: w[2],
            kernel_w: w[3],
            input_h: x[1],
            input_w: x[2],
        })
    }

    pub fn out_h(&self) -> usize {
        self.input_h - self.kernel_h + 1
    }

    pub fn out_w(&self) -> usize {
        self.input_w - self.kernel_w + 1
    }

    /// Length of one flattened receptive field: input_channels * kernel_h * kernel_w.
    pub fn patch_len(&self) -> usize {
        self.input_channels * self.kernel_h * self.kernel_w
    }

    /// Number of output pixels per channel.
    pub fn out_len(&self) -> usize {
        self.out_h() * self.out_w()
    }

    /// [conv_channels, patch_len]
    pub fn flat_weight_shape(&self) -> Shape {
        Shape::new(vec![self.conv_channels, self.patch_len()])
    }

    /// [patch_len, out_h * out_w]
    pub fn flat_input_shape(&self) -> Shape {
        Shape::new(vec![self.patch_len(), self.out_len()])
    }

    /// [conv_channels, out_h, out_w]
    pub fn output_shape(&self) -> Shape {
        Shape::new(vec![self.conv_channels, self.out_h(), self.out_w()])
    }

    /// Row of a flattened patch element; also the column of the flat weights.
    pub fn patch_index(&self, channel: usize, kr: usize, kc: usize) -> usize {
        channel * self.kernel_h * self.kernel_w + kr * self.kernel_w + kc
    }
}

fn check_rank<'a>(what: &'static str, shape: &'a Shape, ndim: usize) -> Result<&'a [usize]> {
    if shape.ndim() != ndim {
        return Err(ConvError::ShapeMismatch {
            what,
            expected: vec![0; ndim],
            got: shape.dims().to_vec(),
        });
    }
    if shape.dims().contains(&0) {
        return Err(ConvError::ZeroDimension {
            what,
            dims: shape.dims().to_vec(),
        });
    }
    Ok(shape.dims())
}
