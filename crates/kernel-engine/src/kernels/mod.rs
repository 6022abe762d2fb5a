// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Concrete [`TileKernel`](crate::TileKernel) implementations.

pub mod depthwise;
pub mod gemm;

use crate::KernelError;

/// Elements spanned by `count` strided runs of `inner` elements.
pub(crate) fn strided_extent(count: usize, stride: usize, inner: usize) -> usize {
    match count {
        0 => 0,
        n => (n - 1) * stride + inner,
    }
}

pub(crate) fn check_operand(
    operand: &'static str,
    data: &[f32],
    required: usize,
) -> Result<(), KernelError> {
    if data.len() < required {
        return Err(KernelError::OperandTooShort {
            operand,
            required,
            actual: data.len(),
        });
    }
    Ok(())
}
