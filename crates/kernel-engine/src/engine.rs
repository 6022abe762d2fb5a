// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The generic tile engine and the [`TileKernel`] trait it drives.
//!
//! ```text
//! for tile in scheduler.tiles_in(range):
//!     for block in channel blocks:
//!         Init      resume ? slot : bias ? seed : zero
//!         Reduce    k in reduction, blocking_factor at a time (tail shorter)
//!         Finish    suspend ? spill(slot) : commit(clamp, masked store)
//! ```
//!
//! Every lane folds its reduction terms in ascending `k`, one multiply
//! and one add per term. Chunking, tiling and splitting therefore never
//! change a result bit.

use crate::prefetch::prefetcher;
use crate::{
    Accumulator, AccumulatorBuffer, AccumulatorPool, ChannelBlock, KernelArguments, KernelError,
    InputGeometry, LaneLayout, OutputWriter, PrefetchHint, Tile, TileRange, TileScheduler,
    TileShape,
};
use std::ops::Range;

/// A compute kernel expressed as one pluggable reduction step.
///
/// Kernels own their input operands. The engine owns tiling,
/// accumulators, activation and stores.
pub trait TileKernel: Send + Sync {
    fn name(&self) -> &str;

    fn output_rows(&self) -> usize;

    fn output_cols(&self) -> usize;

    /// Independent channels per output position.
    fn channels(&self) -> usize;

    /// Length of the reduction axis.
    fn reduction_len(&self) -> usize;

    fn has_bias(&self) -> bool {
        false
    }

    /// Initial accumulator value for an output lane.
    fn bias_at(&self, _row: usize, _col: usize, _channel: usize) -> f32 {
        0.0
    }

    /// Strides of the input the scheduler offsets tiles into. Kernels
    /// without one get an input base of zero.
    fn input_geometry(&self) -> Option<InputGeometry> {
        None
    }

    /// Folds reduction terms `k` (ascending) into the valid lanes of `tile`.
    ///
    /// `input_base` is [`TileScheduler::input_offset`] of the tile. Lanes
    /// outside `valid_rows × valid_cols × block.width` must not be touched.
    fn reduce_step(
        &self,
        tile: &Tile,
        input_base: usize,
        block: ChannelBlock,
        layout: LaneLayout,
        k: Range<usize>,
        lanes: &mut [f32],
    );

    /// Hints the inputs `tile` will read from `input_base` on.
    fn prefetch(&self, _tile: &Tile, _input_base: usize, _hint: &dyn PrefetchHint) {}
}

/// Blocking parameters of a [`TileEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    pub pool: AccumulatorPool,
    pub tile: TileShape,
    /// Channels per pass; also the lane count per output position.
    pub channel_block: usize,
    /// Reduction terms per step.
    pub blocking_factor: usize,
    pub prefetch: bool,
}

impl EngineConfig {
    /// Config with the tile derived from the pool.
    pub fn derived(
        pool: AccumulatorPool,
        channel_block: usize,
        blocking_factor: usize,
    ) -> Result<Self, KernelError> {
        Ok(Self {
            pool,
            tile: pool.derive_tile(channel_block)?,
            channel_block,
            blocking_factor,
            prefetch: false,
        })
    }
}

/// Counters for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct InvocationStats {
    pub tiles: usize,
    pub ragged_tiles: usize,
    /// Tile × channel-block passes.
    pub channel_passes: usize,
    pub spills: usize,
    pub resumes: usize,
    pub lanes_stored: usize,
    /// Multiply-accumulates on valid lanes.
    pub macs: u64,
}

impl InvocationStats {
    pub fn merge(&mut self, other: &InvocationStats) {
        self.tiles += other.tiles;
        self.ragged_tiles += other.ragged_tiles;
        self.channel_passes += other.channel_passes;
        self.spills += other.spills;
        self.resumes += other.resumes;
        self.lanes_stored += other.lanes_stored;
        self.macs += other.macs;
    }
}

/// Runs [`TileKernel`]s under a fixed blocking configuration.
#[derive(Debug, Clone)]
pub struct TileEngine {
    config: EngineConfig,
    layout: LaneLayout,
}

impl TileEngine {
    pub fn new(config: EngineConfig) -> Result<Self, KernelError> {
        let invalid =
            |detail: String| -> Result<Self, KernelError> { Err(KernelError::InvalidConfig { detail }) };
        if config.channel_block == 0 {
            return invalid("channel block must be at least 1".into());
        }
        if config.blocking_factor == 0 {
            return invalid("blocking factor must be at least 1".into());
        }
        if config.tile.rows == 0 || config.tile.cols == 0 {
            return invalid(format!("tile {} is empty", config.tile));
        }
        if !config.pool.fits(config.tile, config.channel_block) {
            return invalid(format!(
                "tile {} with channel block {} needs {} lanes, pool holds {}",
                config.tile,
                config.channel_block,
                config.tile.positions() * config.channel_block,
                config.pool.capacity(),
            ));
        }
        Ok(Self {
            layout: LaneLayout::new(config.tile, config.channel_block),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lanes per tile pass, also the spill slot size.
    pub fn lanes_per_pass(&self) -> usize {
        self.layout.lanes
    }

    pub fn scheduler<K: TileKernel + ?Sized>(&self, kernel: &K) -> TileScheduler {
        TileScheduler::with_checked_shape(kernel.output_rows(), kernel.output_cols(), self.config.tile)
    }

    pub fn channel_blocks<K: TileKernel + ?Sized>(&self, kernel: &K) -> usize {
        kernel.channels().div_ceil(self.config.channel_block)
    }

    /// A spill buffer covering the kernel's whole schedule.
    pub fn accumulator_buffer<K: TileKernel + ?Sized>(&self, kernel: &K) -> AccumulatorBuffer {
        AccumulatorBuffer::for_schedule(
            &self.scheduler(kernel),
            self.channel_blocks(kernel),
            self.lanes_per_pass(),
        )
    }

    /// Runs one invocation.
    ///
    /// Arguments are checked once up front; on error nothing is written.
    pub fn invoke<K: TileKernel + ?Sized>(
        &self,
        kernel: &K,
        args: KernelArguments<'_>,
    ) -> Result<InvocationStats, KernelError> {
        let KernelArguments {
            output,
            reduction,
            bounds,
            flags,
            mut accumulators,
            tiles,
        } = args;

        let scheduler = self.scheduler(kernel);
        let range = tiles.unwrap_or_else(|| TileRange::all(scheduler.tile_count()));
        let channel_blocks = self.channel_blocks(kernel);
        self.check(
            kernel,
            &scheduler,
            range,
            channel_blocks,
            &reduction,
            flags,
            output.is_some(),
            accumulators.as_deref(),
        )?;

        tracing::debug!(
            kernel = kernel.name(),
            tiles = %range,
            reduction = ?reduction,
            %flags,
            "invoking kernel"
        );

        let mut writer = match output {
            Some(view) if !flags.suspend_to_buffer => Some(OutputWriter::new(view)),
            _ => None,
        };
        let hint = prefetcher(self.config.prefetch);
        let mut scratch = vec![0.0f32; self.layout.lanes];
        let mut stats = InvocationStats::default();
        let steps = reduction.len();
        let geometry = kernel.input_geometry();
        let input_base = |tile: &Tile| geometry.map_or(0, |g| scheduler.input_offset(tile, g));

        let mut tiles = scheduler.tiles_in(range).peekable();
        while let Some(tile) = tiles.next() {
            if let Some(next) = tiles.peek() {
                kernel.prefetch(next, input_base(next), hint);
            }
            let base = input_base(&tile);
            stats.tiles += 1;
            stats.ragged_tiles += usize::from(tile.is_ragged());

            for block in ChannelBlock::split(kernel.channels(), self.config.channel_block) {
                let position = tile.linear * channel_blocks + block.index;
                let fresh = Accumulator::new(&mut scratch, self.layout);

                let mut acc = match accumulators.as_deref() {
                    Some(buffer) if flags.resume_from_buffer => {
                        stats.resumes += 1;
                        fresh.resume(buffer.slot(position))
                    }
                    _ if kernel.has_bias() => {
                        fresh.seed(&tile, block, |r, c, ch| kernel.bias_at(r, c, ch))
                    }
                    _ => fresh.zero(),
                };

                let mut k = reduction.start;
                while k < reduction.end {
                    let step = self.config.blocking_factor.min(reduction.end - k);
                    kernel.reduce_step(&tile, base, block, self.layout, k..k + step, acc.lanes_mut());
                    k += step;
                }
                let done = acc.finish();

                match (&mut writer, accumulators.as_deref_mut()) {
                    (_, Some(buffer)) if flags.suspend_to_buffer => {
                        done.spill(buffer.slot_mut(position));
                        stats.spills += 1;
                    }
                    (Some(writer), _) => {
                        stats.lanes_stored += done.commit(bounds, writer, &tile, block);
                    }
                    // Ruled out by `check`.
                    _ => {}
                }
                stats.channel_passes += 1;
                stats.macs += (tile.valid_positions() * block.width * steps) as u64;
            }
        }

        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn check<K: TileKernel + ?Sized>(
        &self,
        kernel: &K,
        scheduler: &TileScheduler,
        range: TileRange,
        channel_blocks: usize,
        reduction: &Range<usize>,
        flags: crate::KernelFlags,
        has_output: bool,
        accumulators: Option<&AccumulatorBuffer>,
    ) -> Result<(), KernelError> {
        let len = kernel.reduction_len();
        if reduction.start > reduction.end || reduction.end > len {
            return Err(KernelError::InvalidReductionRange {
                start: reduction.start,
                end: reduction.end,
                len,
            });
        }
        if range.start > range.end || range.end > scheduler.tile_count() {
            return Err(KernelError::TileRangeOutOfBounds {
                start: range.start,
                end: range.end,
                tile_count: scheduler.tile_count(),
            });
        }
        if !flags.suspend_to_buffer && !has_output {
            return Err(KernelError::MissingOutput);
        }
        if flags.uses_buffer() {
            let buffer = accumulators.ok_or(KernelError::MissingAccumulatorBuffer { flags })?;
            if buffer.lanes_per_slot() != self.layout.lanes {
                return Err(KernelError::AccumulatorLayoutMismatch {
                    expected_lanes: self.layout.lanes,
                    actual_lanes: buffer.lanes_per_slot(),
                });
            }
            let required_slots = range.end * channel_blocks;
            if buffer.slot_count() < required_slots {
                return Err(KernelError::AccumulatorBufferTooSmall {
                    required_slots,
                    actual_slots: buffer.slot_count(),
                });
            }
        }
        Ok(())
    }
}
