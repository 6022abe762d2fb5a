// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Strided, masked output stores.

use crate::{ActivationBounds, ChannelBlock, LaneLayout, Tile};

/// A mutable output tensor seen as `rows × cols × channels`.
///
/// Strides are in elements; channels are contiguous. The view may start
/// at the first logical element of a padded tensor.
#[derive(Debug)]
pub struct OutputView<'a> {
    pub data: &'a mut [f32],
    pub row_stride: usize,
    pub col_stride: usize,
}

impl<'a> OutputView<'a> {
    pub fn new(data: &'a mut [f32], row_stride: usize, col_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            col_stride,
        }
    }

    /// A dense `[rows, cols, channels]` buffer.
    pub fn dense(data: &'a mut [f32], cols: usize, channels: usize) -> Self {
        Self::new(data, cols * channels, channels)
    }
}

/// Writes finished tiles into an [`OutputView`].
#[derive(Debug)]
pub struct OutputWriter<'a> {
    view: OutputView<'a>,
}

impl<'a> OutputWriter<'a> {
    pub fn new(view: OutputView<'a>) -> Self {
        Self { view }
    }

    /// Stores `valid_rows × valid_cols × block.width` clamped lanes.
    ///
    /// Nothing outside the tile's valid region is written. Returns the
    /// number of elements stored.
    pub fn store(
        &mut self,
        tile: &Tile,
        block: ChannelBlock,
        layout: LaneLayout,
        lanes: &[f32],
        bounds: ActivationBounds,
    ) -> usize {
        let view = &mut self.view;
        for r in 0..tile.valid_rows {
            let row_base = (tile.row_start + r) * view.row_stride + block.start;
            for c in 0..tile.valid_cols {
                let dst = row_base + (tile.col_start + c) * view.col_stride;
                let src = layout.index(r, c, 0);
                let out = &mut view.data[dst..dst + block.width];
                for (o, &v) in out.iter_mut().zip(&lanes[src..src + block.width]) {
                    *o = bounds.clamp(v);
                }
            }
        }
        tile.valid_positions() * block.width
    }
}
