// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! 3×3 depthwise convolution over NHWC images.
//!
//! The reduction axis is the nine taps in `(ky, kx)` row-major order; each
//! channel has its own filter. Weights are `[3, 3, C]`, bias is `[C]`.

use super::{check_operand, strided_extent};
use crate::{ChannelBlock, InputGeometry, KernelError, LaneLayout, PrefetchHint, Tile, TileKernel};
use std::ops::Range;
use tensor_core::{Conv2dGeometry, Shape, TensorError};

/// Taps of a 3×3 filter.
pub const TAPS: usize = 9;
const KERNEL_SIZE: usize = 3;

/// A depthwise 3×3 convolution without implicit padding.
///
/// # Example
/// ```
/// use kernel_engine::kernels::depthwise::DepthwiseConv3x3;
/// use tensor_core::Shape;
///
/// let input = vec![1.0; 5 * 5 * 2];
/// let weights = vec![1.0; 9 * 2];
/// let conv = DepthwiseConv3x3::new(&input, &Shape::hwc(5, 5, 2), &weights).unwrap();
/// assert_eq!(conv.output_shape(), Shape::hwc(3, 3, 2));
/// ```
#[derive(Debug, Clone)]
pub struct DepthwiseConv3x3<'a> {
    input: &'a [f32],
    weights: &'a [f32],
    bias: Option<&'a [f32]>,
    input_rows: usize,
    input_cols: usize,
    channels: usize,
    geometry: InputGeometry,
    output_rows: usize,
    output_cols: usize,
}

impl<'a> DepthwiseConv3x3<'a> {
    /// Stride-1 convolution over a dense `[H, W, C]` input.
    pub fn new(input: &'a [f32], input_shape: &Shape, weights: &'a [f32]) -> Result<Self, KernelError> {
        if input_shape.rank() != 3 {
            return Err(TensorError::InvalidParameter {
                op: "depthwise_conv3x3",
                detail: format!("expected [H, W, C] input, got {input_shape}"),
            }
            .into());
        }
        let dims = input_shape.dims();
        let (rows, cols, channels) = (dims[0], dims[1], dims[2]);
        let mut conv = Self {
            input,
            weights,
            bias: None,
            input_rows: rows,
            input_cols: cols,
            channels,
            geometry: InputGeometry {
                ld_row: cols * channels,
                ld_col: channels,
                kernel_stride: 1,
            },
            output_rows: 0,
            output_cols: 0,
        };
        conv.resolve()?;
        check_operand("weights", weights, TAPS * channels)?;
        Ok(conv)
    }

    pub fn with_bias(mut self, bias: &'a [f32]) -> Result<Self, KernelError> {
        check_operand("bias", bias, self.channels)?;
        self.bias = Some(bias);
        Ok(self)
    }

    pub fn with_stride(mut self, stride: usize) -> Result<Self, KernelError> {
        self.geometry.kernel_stride = stride;
        self.resolve()?;
        Ok(self)
    }

    /// Reads the input through explicit element strides, e.g. a padded
    /// tensor viewed from its first logical element.
    pub fn with_input_strides(mut self, ld_row: usize, ld_col: usize) -> Result<Self, KernelError> {
        self.geometry.ld_row = ld_row;
        self.geometry.ld_col = ld_col;
        self.resolve()?;
        Ok(self)
    }

    pub fn conv_geometry(&self) -> Conv2dGeometry {
        Conv2dGeometry {
            kernel_rows: KERNEL_SIZE,
            kernel_cols: KERNEL_SIZE,
            stride: self.geometry.kernel_stride,
        }
    }

    pub fn output_shape(&self) -> Shape {
        Shape::hwc(self.output_rows, self.output_cols, self.channels)
    }

    /// Recomputes output extents and checks the input covers them.
    fn resolve(&mut self) -> Result<(), KernelError> {
        let out = self
            .conv_geometry()
            .output_shape(&Shape::hwc(self.input_rows, self.input_cols, self.channels))?;
        self.output_rows = out.dims()[0];
        self.output_cols = out.dims()[1];

        let row_span = strided_extent(self.input_rows, self.geometry.ld_row, 0);
        let required = row_span + strided_extent(self.input_cols, self.geometry.ld_col, self.channels);
        check_operand("input", self.input, required)
    }
}

impl TileKernel for DepthwiseConv3x3<'_> {
    fn name(&self) -> &str {
        "depthwise_conv3x3"
    }

    fn output_rows(&self) -> usize {
        self.output_rows
    }

    fn output_cols(&self) -> usize {
        self.output_cols
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn reduction_len(&self) -> usize {
        TAPS
    }

    fn has_bias(&self) -> bool {
        self.bias.is_some()
    }

    fn bias_at(&self, _row: usize, _col: usize, channel: usize) -> f32 {
        self.bias.map_or(0.0, |b| b[channel])
    }

    fn input_geometry(&self) -> Option<InputGeometry> {
        Some(self.geometry)
    }

    fn reduce_step(
        &self,
        tile: &Tile,
        input_base: usize,
        block: ChannelBlock,
        layout: LaneLayout,
        k: Range<usize>,
        lanes: &mut [f32],
    ) {
        let g = self.geometry;
        let width = block.width;
        for r in 0..tile.valid_rows {
            for c in 0..tile.valid_cols {
                let origin = input_base + g.origin(r, c) + block.start;
                let base = layout.index(r, c, 0);
                let acc = &mut lanes[base..base + width];
                for tap in k.clone() {
                    let (ky, kx) = (tap / KERNEL_SIZE, tap % KERNEL_SIZE);
                    let at = origin + ky * g.ld_row + kx * g.ld_col;
                    let x = &self.input[at..at + width];
                    let w = &self.weights[tap * self.channels + block.start..][..width];
                    for ((a, &x), &w) in acc.iter_mut().zip(x).zip(w) {
                        *a += x * w;
                    }
                }
            }
        }
    }

    fn prefetch(&self, _tile: &Tile, input_base: usize, hint: &dyn PrefetchHint) {
        if let Some(data) = self.input.get(input_base..) {
            hint.prefetch(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AccumulatorPool, ActivationBounds, EngineConfig, KernelArguments, OutputView, TileEngine,
        TileShape,
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tensor_core::{depthwise_conv2d, Activation};

    fn random(rng: &mut StdRng, n: usize) -> Vec<f32> {
        (0..n).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
    }

    fn run(conv: &DepthwiseConv3x3<'_>, engine: &TileEngine, bounds: ActivationBounds) -> Vec<f32> {
        let shape = conv.output_shape();
        let mut out = vec![0.0; shape.num_elements()];
        engine
            .invoke(
                conv,
                KernelArguments::full(
                    OutputView::dense(&mut out, shape.dims()[1], shape.dims()[2]),
                    TAPS,
                    bounds,
                ),
            )
            .unwrap();
        out
    }

    fn engine(tile: TileShape, channel_block: usize, blocking_factor: usize) -> TileEngine {
        TileEngine::new(EngineConfig {
            pool: AccumulatorPool::new(4, 64),
            tile,
            channel_block,
            blocking_factor,
            prefetch: true,
        })
        .unwrap()
    }

    #[test]
    fn test_matches_reference_5x5() {
        let mut rng = StdRng::seed_from_u64(7);
        for channels in [1, 3, 9] {
            let input = random(&mut rng, 5 * 5 * channels);
            let weights = random(&mut rng, TAPS * channels);
            let bias = random(&mut rng, channels);
            let shape = Shape::hwc(5, 5, channels);

            let conv = DepthwiseConv3x3::new(&input, &shape, &weights)
                .unwrap()
                .with_bias(&bias)
                .unwrap();
            let (expected, out_shape) = depthwise_conv2d(
                &input,
                &shape,
                &weights,
                Some(&bias),
                Conv2dGeometry::k3s1(),
                Activation::Identity,
            )
            .unwrap();
            assert_eq!(conv.output_shape(), out_shape);

            let got = run(&conv, &engine(TileShape::new(2, 2), 4, 4), ActivationBounds::identity());
            assert_eq!(got, expected, "channels = {channels}");
        }
    }

    #[test]
    fn test_stride_two_with_relu() {
        let mut rng = StdRng::seed_from_u64(11);
        let shape = Shape::hwc(9, 7, 5);
        let input = random(&mut rng, shape.num_elements());
        let weights = random(&mut rng, TAPS * 5);
        let conv = DepthwiseConv3x3::new(&input, &shape, &weights)
            .unwrap()
            .with_stride(2)
            .unwrap();
        assert_eq!(conv.output_shape(), Shape::hwc(4, 3, 5));

        let geometry = Conv2dGeometry {
            stride: 2,
            ..Conv2dGeometry::k3s1()
        };
        let (expected, _) =
            depthwise_conv2d(&input, &shape, &weights, None, geometry, Activation::Relu).unwrap();
        let got = run(&conv, &engine(TileShape::new(3, 2), 2, 9), Activation::Relu.into());
        assert_eq!(got, expected);
        assert!(got.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_strided_input_view() {
        // A 4×4×2 image stored with one spare column per row.
        let (rows, cols, channels) = (4, 4, 2);
        let ld_row = (cols + 1) * channels;
        let mut padded = vec![f32::NAN; rows * ld_row];
        let mut dense = Vec::new();
        for y in 0..rows {
            for x in 0..cols {
                for ch in 0..channels {
                    let v = (y * 10 + x) as f32 + ch as f32 * 0.5;
                    padded[y * ld_row + x * channels + ch] = v;
                    dense.push(v);
                }
            }
        }
        let weights = vec![1.0; TAPS * channels];
        let shape = Shape::hwc(rows, cols, channels);

        let strided = DepthwiseConv3x3::new(&padded, &shape, &weights)
            .unwrap()
            .with_input_strides(ld_row, channels)
            .unwrap();
        let contiguous = DepthwiseConv3x3::new(&dense, &shape, &weights).unwrap();

        let e = engine(TileShape::new(1, 2), 2, 3);
        assert_eq!(run(&strided, &e, ActivationBounds::identity()), run(&contiguous, &e, ActivationBounds::identity()));
    }

    #[test]
    fn test_rejects_short_operands() {
        let input = vec![0.0; 5 * 5 * 2];
        let shape = Shape::hwc(5, 5, 2);
        assert!(matches!(
            DepthwiseConv3x3::new(&input, &shape, &[0.0; 17]),
            Err(KernelError::OperandTooShort { operand: "weights", .. })
        ));
        assert!(matches!(
            DepthwiseConv3x3::new(&input[1..], &shape, &[0.0; 18]),
            Err(KernelError::OperandTooShort { operand: "input", .. })
        ));
        assert!(DepthwiseConv3x3::new(&input, &Shape::hwc(2, 5, 5), &[0.0; 45]).is_err());
        let conv = DepthwiseConv3x3::new(&input, &shape, &[0.0; 18]).unwrap();
        assert!(conv.clone().with_bias(&[0.0]).is_err());
        assert!(conv.with_stride(0).is_err());
    }
}
