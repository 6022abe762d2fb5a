// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for kernel configuration and invocation checks.

/// Errors reported before any tile is processed.
///
/// Once the tile loop starts, the engine trusts its arguments.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// A storing pass was requested without an output view.
    #[error("no output view: a pass that does not suspend must store its results")]
    MissingOutput,

    /// A resuming or suspending pass was requested without spill storage.
    #[error("flags {flags} require an accumulator buffer")]
    MissingAccumulatorBuffer { flags: crate::KernelFlags },

    /// The accumulator buffer cannot hold every slot the tile range touches.
    #[error("accumulator buffer too small: {required_slots} slots required, {actual_slots} available")]
    AccumulatorBufferTooSmall {
        required_slots: usize,
        actual_slots: usize,
    },

    /// The accumulator buffer was laid out for a different tile geometry.
    #[error("accumulator buffer holds {actual_lanes} lanes per slot, engine needs {expected_lanes}")]
    AccumulatorLayoutMismatch {
        expected_lanes: usize,
        actual_lanes: usize,
    },

    /// The reduction range is inverted or exceeds the kernel's axis.
    #[error("reduction range {start}..{end} is invalid for a reduction axis of {len}")]
    InvalidReductionRange { start: usize, end: usize, len: usize },

    /// The tile range reaches past the last tile.
    #[error("tile range {start}..{end} exceeds the {tile_count} scheduled tiles")]
    TileRangeOutOfBounds {
        start: usize,
        end: usize,
        tile_count: usize,
    },

    /// A raw flag word carries bits with no meaning.
    #[error("unknown kernel flag bits {bits:#b}")]
    UnknownFlags { bits: u32 },

    /// The accumulator pool cannot hold even one output position.
    #[error("accumulator pool of {capacity} lanes cannot hold a channel block of {channel_block}")]
    PoolTooSmall { capacity: usize, channel_block: usize },

    /// Engine geometry is inconsistent.
    #[error("invalid engine configuration: {detail}")]
    InvalidConfig { detail: String },

    /// An operand slice does not cover its declared extents.
    #[error("operand '{operand}' too short: needs {required} elements, got {actual}")]
    OperandTooShort {
        operand: &'static str,
        required: usize,
        actual: usize,
    },

    /// Shape or parameter error from tensor metadata.
    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),
}
