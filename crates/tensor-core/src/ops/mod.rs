// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Naive reference operators.
//!
//! These are the numeric oracles the blocked kernels are checked against.
//! Each output lane starts from its bias (or zero) and folds the reduction
//! axis in ascending order with a separate multiply and add, which is the
//! same per-lane order the tiled kernels use. Results therefore match
//! bit for bit.

mod conv_op;
mod matmul_op;

pub use conv_op::{depthwise_conv2d, Conv2dGeometry};
pub use matmul_op::matmul;
