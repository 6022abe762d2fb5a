// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference depthwise convolution over NHWC images.

use super::matmul_op::check_len;
use crate::{Activation, Shape, TensorError};

/// Receptive-field geometry of a 2-D convolution without implicit padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Conv2dGeometry {
    pub kernel_rows: usize,
    pub kernel_cols: usize,
    pub stride: usize,
}

impl Conv2dGeometry {
    /// The 3×3, stride-1 geometry.
    pub fn k3s1() -> Self {
        Self {
            kernel_rows: 3,
            kernel_cols: 3,
            stride: 1,
        }
    }

    pub fn taps(&self) -> usize {
        self.kernel_rows * self.kernel_cols
    }

    /// Output extent for an input extent along rows (`kernel = kernel_rows`)
    /// or columns. Returns `None` when the input is smaller than the kernel.
    pub fn output_extent(&self, input: usize, kernel: usize) -> Option<usize> {
        if self.stride == 0 || input < kernel {
            return None;
        }
        Some((input - kernel) / self.stride + 1)
    }

    /// Output `[H, W, C]` shape for an input `[H, W, C]` shape.
    pub fn output_shape(&self, input: &Shape) -> Result<Shape, TensorError> {
        let invalid = |detail: String| TensorError::InvalidParameter {
            op: "depthwise_conv2d",
            detail,
        };
        if input.rank() != 3 {
            return Err(invalid(format!("expected [H, W, C] input, got {input}")));
        }
        let dims = input.dims();
        let rows = self
            .output_extent(dims[0], self.kernel_rows)
            .ok_or_else(|| invalid(format!("input {input} too small for {self:?}")))?;
        let cols = self
            .output_extent(dims[1], self.kernel_cols)
            .ok_or_else(|| invalid(format!("input {input} too small for {self:?}")))?;
        Ok(Shape::hwc(rows, cols, dims[2]))
    }
}

/// Computes a depthwise convolution with one filter per channel.
///
/// `input` is dense `[H, W, C]`; `weights` is dense
/// `[kernel_rows, kernel_cols, C]`; `bias`, when present, has `C` entries.
/// Taps are folded in `(ky, kx)` row-major order.
///
/// Returns the output buffer and its `[H', W', C]` shape.
pub fn depthwise_conv2d(
    input: &[f32],
    input_shape: &Shape,
    weights: &[f32],
    bias: Option<&[f32]>,
    geometry: Conv2dGeometry,
    activation: Activation,
) -> Result<(Vec<f32>, Shape), TensorError> {
    let out_shape = geometry.output_shape(input_shape)?;
    check_len(input, input_shape.num_elements())?;

    let (in_w, channels) = (input_shape.dims()[1], input_shape.dims()[2]);
    check_len(weights, geometry.taps() * channels)?;
    if let Some(bias) = bias {
        check_len(bias, channels)?;
    }

    let (out_h, out_w) = (out_shape.dims()[0], out_shape.dims()[1]);
    let mut out = vec![0.0f32; out_shape.num_elements()];

    for oy in 0..out_h {
        for ox in 0..out_w {
            for c in 0..channels {
                let mut acc = bias.map_or(0.0, |b| b[c]);
                for ky in 0..geometry.kernel_rows {
                    for kx in 0..geometry.kernel_cols {
                        let iy = oy * geometry.stride + ky;
                        let ix = ox * geometry.stride + kx;
                        let x = input[(iy * in_w + ix) * channels + c];
                        let w = weights[(ky * geometry.kernel_cols + kx) * channels + c];
                        acc += x * w;
                    }
                }
                out[(oy * out_w + ox) * channels + c] = activation.apply(acc);
            }
        }
    }

    Ok((out, out_shape))
}
