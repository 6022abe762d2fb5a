// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Workload descriptions: which kernel to run and on what shapes.
//!
//! `padding` is a storage margin added around every operand tensor. It
//! changes strides, never the logical result.

use crate::RuntimeError;
use kernel_engine::kernels::depthwise::TAPS;
use std::fmt;
use tensor_core::{Activation, Conv2dGeometry, Padding, Shape};

/// A kernel invocation to plan and run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Workload {
    /// 3×3 depthwise convolution over an `[H, W, C]` input.
    DepthwiseConv {
        height: usize,
        width: usize,
        channels: usize,
        stride: usize,
        padding: usize,
        bias: bool,
        activation: Activation,
    },
    /// `C[M×N] = A[M×K] · B[K×N]`.
    Gemm {
        m: usize,
        n: usize,
        k: usize,
        padding: usize,
        bias: bool,
        activation: Activation,
    },
}

/// One operand tensor the executor has to allocate.
#[derive(Debug, Clone, PartialEq)]
pub struct OperandSpec {
    pub name: &'static str,
    pub shape: Shape,
    pub padding: Padding,
}

impl OperandSpec {
    fn new(name: &'static str, shape: Shape, padding: Padding) -> Self {
        Self { name, shape, padding }
    }
}

/// The operands of one workload. For GEMM `input` is A and `weights` is B.
#[derive(Debug, Clone, PartialEq)]
pub struct OperandSet {
    pub input: OperandSpec,
    pub weights: OperandSpec,
    pub bias: Option<OperandSpec>,
    pub output: OperandSpec,
}

impl OperandSet {
    /// Inputs first, output last.
    pub fn iter(&self) -> impl Iterator<Item = &OperandSpec> {
        [Some(&self.input), Some(&self.weights), self.bias.as_ref(), Some(&self.output)]
            .into_iter()
            .flatten()
    }
}

impl Workload {
    /// Stride-1 convolution without bias, padding or activation.
    pub fn conv(height: usize, width: usize, channels: usize) -> Self {
        Workload::DepthwiseConv {
            height,
            width,
            channels,
            stride: 1,
            padding: 0,
            bias: false,
            activation: Activation::Identity,
        }
    }

    pub fn gemm(m: usize, n: usize, k: usize) -> Self {
        Workload::Gemm {
            m,
            n,
            k,
            padding: 0,
            bias: false,
            activation: Activation::Identity,
        }
    }

    pub fn with_activation(mut self, act: Activation) -> Self {
        match &mut self {
            Workload::DepthwiseConv { activation, .. } | Workload::Gemm { activation, .. } => *activation = act,
        }
        self
    }

    pub fn with_padding(mut self, margin: usize) -> Self {
        match &mut self {
            Workload::DepthwiseConv { padding, .. } | Workload::Gemm { padding, .. } => *padding = margin,
        }
        self
    }

    pub fn with_bias(mut self, enabled: bool) -> Self {
        match &mut self {
            Workload::DepthwiseConv { bias, .. } | Workload::Gemm { bias, .. } => *bias = enabled,
        }
        self
    }

    /// Sets the convolution stride; GEMM workloads are returned unchanged.
    pub fn with_stride(mut self, value: usize) -> Self {
        if let Workload::DepthwiseConv { stride, .. } = &mut self {
            *stride = value;
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self {
            Workload::DepthwiseConv { .. } => "depthwise_conv3x3",
            Workload::Gemm { .. } => "gemm",
        }
    }

    pub fn activation(&self) -> Activation {
        match self {
            Workload::DepthwiseConv { activation, .. } | Workload::Gemm { activation, .. } => *activation,
        }
    }

    pub fn has_bias(&self) -> bool {
        match self {
            Workload::DepthwiseConv { bias, .. } | Workload::Gemm { bias, .. } => *bias,
        }
    }

    /// Storage margin applied to every operand.
    pub fn padding(&self) -> usize {
        match self {
            Workload::DepthwiseConv { padding, .. } | Workload::Gemm { padding, .. } => *padding,
        }
    }

    /// Lanes per output position.
    pub fn channels(&self) -> usize {
        match self {
            Workload::DepthwiseConv { channels, .. } => *channels,
            Workload::Gemm { .. } => 1,
        }
    }

    /// Length of the reduction axis.
    pub fn reduction_len(&self) -> usize {
        match self {
            Workload::DepthwiseConv { .. } => TAPS,
            Workload::Gemm { k, .. } => *k,
        }
    }

    pub fn input_shape(&self) -> Shape {
        match self {
            Workload::DepthwiseConv {
                height, width, channels, ..
            } => Shape::hwc(*height, *width, *channels),
            Workload::Gemm { m, k, .. } => Shape::matrix(*m, *k),
        }
    }

    pub fn conv_geometry(&self) -> Option<Conv2dGeometry> {
        match self {
            Workload::DepthwiseConv { stride, .. } => Some(Conv2dGeometry {
                stride: *stride,
                ..Conv2dGeometry::k3s1()
            }),
            Workload::Gemm { .. } => None,
        }
    }

    pub fn output_shape(&self) -> Result<Shape, RuntimeError> {
        match (self, self.conv_geometry()) {
            (Workload::Gemm { m, n, .. }, _) => Ok(Shape::matrix(*m, *n)),
            (_, Some(geometry)) => Ok(geometry.output_shape(&self.input_shape())?),
            (_, None) => Err(RuntimeError::InvalidWorkload(format!("{self} has no geometry"))),
        }
    }

    /// Rejects empty extents and shapes the kernel cannot cover.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let extents: Vec<usize> = match self {
            Workload::DepthwiseConv {
                height,
                width,
                channels,
                stride,
                ..
            } => vec![*height, *width, *channels, *stride],
            Workload::Gemm { m, n, k, .. } => vec![*m, *n, *k],
        };
        if extents.contains(&0) {
            return Err(RuntimeError::InvalidWorkload(format!("{self} has a zero extent")));
        }
        self.output_shape().map(|_| ())
    }

    /// Tensors the executor allocates for this workload.
    pub fn operands(&self) -> Result<OperandSet, RuntimeError> {
        let p = self.padding();
        let set = match self {
            Workload::DepthwiseConv { channels, bias, .. } => OperandSet {
                input: OperandSpec::new("input", self.input_shape(), Padding::spatial(p, p, p, p)),
                weights: OperandSpec::new("weights", Shape::vector(TAPS * channels), Padding::none()),
                bias: bias.then(|| OperandSpec::new("bias", Shape::vector(*channels), Padding::none())),
                output: OperandSpec::new("output", self.output_shape()?, Padding::spatial(p, p, p, p)),
            },
            Workload::Gemm { n, k, bias, .. } => {
                let margin = Padding::new(vec![(p, p), (p, p)]);
                OperandSet {
                    input: OperandSpec::new("a", self.input_shape(), margin.clone()),
                    weights: OperandSpec::new("b", Shape::matrix(*k, *n), margin.clone()),
                    bias: bias.then(|| OperandSpec::new("bias", Shape::vector(*n), Padding::none())),
                    output: OperandSpec::new("output", self.output_shape()?, margin),
                }
            }
        };
        Ok(set)
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workload::DepthwiseConv {
                height,
                width,
                channels,
                stride,
                ..
            } => write!(f, "depthwise 3x3 over {height}x{width}x{channels} stride {stride}")?,
            Workload::Gemm { m, n, k, .. } => write!(f, "gemm {m}x{k} * {k}x{n}")?,
        }
        write!(f, " ({})", self.activation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv_shapes() {
        let w = Workload::conv(5, 5, 3).with_padding(2).with_bias(true);
        assert_eq!(w.output_shape().unwrap(), Shape::hwc(3, 3, 3));
        assert_eq!(w.reduction_len(), 9);
        assert_eq!(w.channels(), 3);

        let operands = w.operands().unwrap();
        let names: Vec<_> = operands.iter().map(|o| o.name).collect();
        assert_eq!(names, ["input", "weights", "bias", "output"]);
        assert_eq!(operands.input.padding, Padding::spatial(2, 2, 2, 2));
        assert_eq!(operands.weights.shape, Shape::vector(27));
    }

    #[test]
    fn test_gemm_shapes() {
        let w = Workload::gemm(4, 6, 5).with_stride(3);
        assert_eq!(w, Workload::gemm(4, 6, 5));
        assert_eq!(w.output_shape().unwrap(), Shape::matrix(4, 6));
        assert_eq!(w.reduction_len(), 5);
        assert_eq!(w.channels(), 1);
        let operands = w.operands().unwrap();
        assert_eq!(operands.iter().count(), 3);
        assert_eq!(operands.weights.shape, Shape::matrix(5, 6));
    }

    #[test]
    fn test_validate() {
        assert!(Workload::conv(5, 5, 1).validate().is_ok());
        assert!(Workload::conv(2, 5, 1).validate().is_err());
        assert!(Workload::conv(5, 5, 0).validate().is_err());
        assert!(Workload::conv(5, 5, 1).with_stride(0).validate().is_err());
        assert!(Workload::gemm(0, 1, 1).validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip_json() {
        let w = Workload::conv(7, 6, 9)
            .with_stride(2)
            .with_activation(Activation::BoundedRelu { max: 6.0 });
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"kind\":\"depthwise_conv\""));
        let back: Workload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }

    #[test]
    fn test_display() {
        let w = Workload::gemm(2, 3, 4).with_activation(Activation::Relu);
        assert_eq!(w.to_string(), "gemm 2x4 * 4x3 (relu)");
    }
}
