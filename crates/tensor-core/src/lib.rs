// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Tensor metadata shared by the memory manager and the compute kernels.
//!
//! This crate provides:
//! - [`Shape`] — ordered extents, outermost dimension first.
//! - [`DType`] — supported element data types (f32, f16, bf16, i8).
//! - [`Padding`] — per-dimension `(low, high)` element margins.
//! - [`TensorInfo`] — shape + dtype + padding + byte strides + the
//!   `resizable` flag that tracks whether memory is bound.
//! - [`Activation`] — the activation descriptors fused into kernels.
//! - Naive reference operators ([`matmul`], [`depthwise_conv2d`]) that act
//!   as numeric oracles for the blocked kernels.
//!
//! # Layout
//! ```text
//!  dims:    [ d0 (outermost) , d1 , ... , dn-1 (innermost) ]
//!  stride:  stride[n-1] = element size
//!           stride[i]   = stride[i+1] * (extent[i+1] + low[i+1] + high[i+1])
//! ```
//! The first logical element sits at `sum(low[i] * stride[i])` bytes from
//! the start of the buffer.

mod activation;
mod dtype;
mod error;
mod info;
mod ops;
mod padding;
mod shape;

pub use activation::Activation;
pub use dtype::DType;
pub use error::TensorError;
pub use info::TensorInfo;
pub use ops::{depthwise_conv2d, matmul, Conv2dGeometry};
pub use padding::Padding;
pub use shape::Shape;
