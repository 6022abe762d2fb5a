// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor metadata and reference operations.

use crate::Shape;

/// Errors that can occur while describing tensors or running reference ops.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer size does not match the expected size for the given shape.
    #[error("buffer size mismatch: expected {expected} elements, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Two operands have incompatible shapes for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// Metadata was modified after memory had been bound to the tensor.
    #[error("tensor is not resizable: {op} requires unbound memory")]
    NotResizable { op: &'static str },

    /// A padding descriptor names more dimensions than the tensor has.
    #[error("padding rank {padding_rank} exceeds tensor rank {tensor_rank}")]
    PaddingRank {
        padding_rank: usize,
        tensor_rank: usize,
    },

    /// An operator parameter is outside its accepted range.
    #[error("invalid parameter for {op}: {detail}")]
    InvalidParameter { op: &'static str, detail: String },

    /// A string could not be parsed into a tensor descriptor.
    #[error("cannot parse '{input}' as {what}")]
    Parse { what: &'static str, input: String },
}
