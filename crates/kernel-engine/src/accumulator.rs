// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Accumulator state: slot pool, per-tile lifecycle, and spill storage.
//!
//! ```text
//!  Accumulator<Fresh>
//!     │  seed(bias) | zero() | resume(slot)
//!     ▼
//!  Accumulator<Accumulating>  ◄── reduce steps write lanes_mut()
//!     │  finish()
//!     ▼
//!  Accumulator<Finalized>
//!     ├── commit(bounds, writer)  ──► clamped, masked store
//!     └── spill(slot)             ──► raw partial sums to AccumulatorBuffer
//! ```
//!
//! `commit` and `spill` consume the accumulator, so finished lanes can
//! only be observed again by seeding a new one from the spill slot.

use crate::{ActivationBounds, KernelError, OutputWriter, Tile, TileScheduler, TileShape};
use std::marker::PhantomData;

/// A bounded set of accumulator registers.
///
/// A tile's working set, `Tr · Tc · channel_block` lanes, must fit in
/// `slots · lanes_per_slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccumulatorPool {
    pub slots: usize,
    pub lanes_per_slot: usize,
}

impl AccumulatorPool {
    pub fn new(slots: usize, lanes_per_slot: usize) -> Self {
        Self {
            slots,
            lanes_per_slot,
        }
    }

    /// Total lanes across all slots.
    pub fn capacity(&self) -> usize {
        self.slots * self.lanes_per_slot
    }

    pub fn fits(&self, shape: TileShape, channel_block: usize) -> bool {
        shape.positions() * channel_block <= self.capacity()
    }

    /// The largest near-square tile whose lanes fit the pool.
    ///
    /// Rows are the integer square root of the position budget; columns
    /// take the rest, so tiles are never taller than wide.
    pub fn derive_tile(&self, channel_block: usize) -> Result<TileShape, KernelError> {
        let positions = self.capacity().checked_div(channel_block).unwrap_or(0);
        if positions == 0 {
            return Err(KernelError::PoolTooSmall {
                capacity: self.capacity(),
                channel_block,
            });
        }
        let rows = integer_sqrt(positions);
        Ok(TileShape::new(rows, positions / rows))
    }
}

fn integer_sqrt(n: usize) -> usize {
    let mut r = (n as f64).sqrt() as usize;
    while r * r > n {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= n {
        r += 1;
    }
    r
}

/// Lane addressing inside a tile: `(r · tile_cols + c) · block_width + ch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneLayout {
    pub tile_cols: usize,
    pub block_width: usize,
    pub lanes: usize,
}

impl LaneLayout {
    pub fn new(shape: TileShape, block_width: usize) -> Self {
        Self {
            tile_cols: shape.cols,
            block_width,
            lanes: shape.positions() * block_width,
        }
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize, channel: usize) -> usize {
        (row * self.tile_cols + col) * self.block_width + channel
    }
}

/// A run of channels processed together in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBlock {
    pub index: usize,
    /// First channel of the block.
    pub start: usize,
    /// Valid channels, at most the block width; the last block may be short.
    pub width: usize,
}

impl ChannelBlock {
    /// Splits `channels` into blocks of `block_width`.
    pub fn split(channels: usize, block_width: usize) -> impl Iterator<Item = ChannelBlock> {
        let count = channels.div_ceil(block_width.max(1));
        (0..count).map(move |index| {
            let start = index * block_width;
            ChannelBlock {
                index,
                start,
                width: block_width.min(channels - start),
            }
        })
    }
}

/// Phase: lanes not yet initialised.
#[derive(Debug)]
pub struct Fresh;
/// Phase: reduction in progress.
#[derive(Debug)]
pub struct Accumulating;
/// Phase: reduction for this invocation is complete.
#[derive(Debug)]
pub struct Finalized;

/// One tile's accumulators for one channel block.
///
/// The lanes are borrowed scratch owned by the engine for the duration of
/// an invocation.
#[derive(Debug)]
pub struct Accumulator<'s, P> {
    lanes: &'s mut [f32],
    layout: LaneLayout,
    _phase: PhantomData<P>,
}

impl<'s, P> Accumulator<'s, P> {
    fn into_phase<Q>(self) -> Accumulator<'s, Q> {
        Accumulator {
            lanes: self.lanes,
            layout: self.layout,
            _phase: PhantomData,
        }
    }

    pub fn layout(&self) -> LaneLayout {
        self.layout
    }
}

impl<'s> Accumulator<'s, Fresh> {
    /// # Panics
    /// If `scratch` is shorter than the layout.
    pub fn new(scratch: &'s mut [f32], layout: LaneLayout) -> Self {
        Self {
            lanes: &mut scratch[..layout.lanes],
            layout,
            _phase: PhantomData,
        }
    }

    pub fn zero(self) -> Accumulator<'s, Accumulating> {
        self.lanes.fill(0.0);
        self.into_phase()
    }

    /// Seeds valid lanes with `bias(row, col, channel)` in absolute output
    /// coordinates; masked lanes get zero.
    pub fn seed<F>(self, tile: &Tile, block: ChannelBlock, bias: F) -> Accumulator<'s, Accumulating>
    where
        F: Fn(usize, usize, usize) -> f32,
    {
        self.lanes.fill(0.0);
        for r in 0..tile.valid_rows {
            for c in 0..tile.valid_cols {
                let base = self.layout.index(r, c, 0);
                for ch in 0..block.width {
                    self.lanes[base + ch] =
                        bias(tile.row_start + r, tile.col_start + c, block.start + ch);
                }
            }
        }
        self.into_phase()
    }

    /// Reloads lanes spilled by an earlier invocation.
    pub fn resume(self, slot: &[f32]) -> Accumulator<'s, Accumulating> {
        self.lanes.copy_from_slice(slot);
        self.into_phase()
    }
}

impl<'s> Accumulator<'s, Accumulating> {
    pub fn lanes_mut(&mut self) -> &mut [f32] {
        &mut *self.lanes
    }

    pub fn finish(self) -> Accumulator<'s, Finalized> {
        self.into_phase()
    }
}

impl<'s> Accumulator<'s, Finalized> {
    /// Finished pre-activation values.
    pub fn lanes(&self) -> &[f32] {
        &*self.lanes
    }

    /// Clamps and stores the valid lanes. Returns the number stored.
    pub fn commit(
        self,
        bounds: ActivationBounds,
        writer: &mut OutputWriter<'_>,
        tile: &Tile,
        block: ChannelBlock,
    ) -> usize {
        writer.store(tile, block, self.layout, self.lanes, bounds)
    }

    /// Writes raw partial sums to a spill slot; no activation, no store.
    pub fn spill(self, slot: &mut [f32]) {
        slot.copy_from_slice(self.lanes);
    }
}

/// Caller-owned storage for partial sums between invocations.
///
/// Slot `(tile_linear · channel_blocks + block)` holds one tile's lanes
/// for one channel block.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorBuffer {
    data: Vec<f32>,
    lanes_per_slot: usize,
}

impl AccumulatorBuffer {
    pub fn new(slots: usize, lanes_per_slot: usize) -> Self {
        Self {
            data: vec![0.0; slots * lanes_per_slot],
            lanes_per_slot,
        }
    }

    /// Sized for every tile of `scheduler` and every channel block.
    pub fn for_schedule(
        scheduler: &TileScheduler,
        channel_blocks: usize,
        lanes_per_slot: usize,
    ) -> Self {
        Self::new(scheduler.tile_count() * channel_blocks, lanes_per_slot)
    }

    pub fn slot_count(&self) -> usize {
        self.data.len().checked_div(self.lanes_per_slot).unwrap_or(0)
    }

    pub fn lanes_per_slot(&self) -> usize {
        self.lanes_per_slot
    }

    pub fn slot(&self, position: usize) -> &[f32] {
        let start = position * self.lanes_per_slot;
        &self.data[start..start + self.lanes_per_slot]
    }

    pub fn slot_mut(&mut self, position: usize) -> &mut [f32] {
        let start = position * self.lanes_per_slot;
        &mut self.data[start..start + self.lanes_per_slot]
    }

    /// Raw contents, slot after slot.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}
