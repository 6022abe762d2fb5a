// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-invocation kernel arguments.

use crate::{AccumulatorBuffer, ActivationBounds, KernelError, OutputView};
use std::fmt;
use std::ops::Range;

/// Controls where accumulators come from and where they go.
///
/// The two flags are independent. With neither set, an invocation is a
/// self-contained pass: seed from bias, reduce, clamp, store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KernelFlags {
    /// Seed accumulators from the spill buffer instead of the bias.
    pub resume_from_buffer: bool,
    /// Write pre-activation partial sums to the spill buffer instead of
    /// storing outputs.
    pub suspend_to_buffer: bool,
}

impl KernelFlags {
    /// Wire bit for [`resume_from_buffer`](Self::resume_from_buffer).
    pub const FILL_ACCUMULATORS_FROM_BUFFER: u32 = 1 << 0;
    /// Wire bit for [`suspend_to_buffer`](Self::suspend_to_buffer).
    pub const STORE_ACCUMULATORS_TO_BUFFER: u32 = 1 << 1;

    pub fn self_contained() -> Self {
        Self::default()
    }

    pub fn suspend() -> Self {
        Self {
            resume_from_buffer: false,
            suspend_to_buffer: true,
        }
    }

    pub fn resume() -> Self {
        Self {
            resume_from_buffer: true,
            suspend_to_buffer: false,
        }
    }

    /// Resume and suspend again: a middle slice of a reduction.
    pub fn resume_and_suspend() -> Self {
        Self {
            resume_from_buffer: true,
            suspend_to_buffer: true,
        }
    }

    /// Whether the invocation touches the spill buffer at all.
    pub fn uses_buffer(self) -> bool {
        self.resume_from_buffer || self.suspend_to_buffer
    }

    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.resume_from_buffer {
            bits |= Self::FILL_ACCUMULATORS_FROM_BUFFER;
        }
        if self.suspend_to_buffer {
            bits |= Self::STORE_ACCUMULATORS_TO_BUFFER;
        }
        bits
    }

    pub fn from_bits(bits: u32) -> Result<Self, KernelError> {
        let known = Self::FILL_ACCUMULATORS_FROM_BUFFER | Self::STORE_ACCUMULATORS_TO_BUFFER;
        if bits & !known != 0 {
            return Err(KernelError::UnknownFlags { bits });
        }
        Ok(Self {
            resume_from_buffer: bits & Self::FILL_ACCUMULATORS_FROM_BUFFER != 0,
            suspend_to_buffer: bits & Self::STORE_ACCUMULATORS_TO_BUFFER != 0,
        })
    }
}

impl fmt::Display for KernelFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.resume_from_buffer, self.suspend_to_buffer) {
            (false, false) => write!(f, "self-contained"),
            (true, false) => write!(f, "resume"),
            (false, true) => write!(f, "suspend"),
            (true, true) => write!(f, "resume+suspend"),
        }
    }
}

/// A contiguous run of tiles in row-major linear order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TileRange {
    pub start: usize,
    pub end: usize,
}

impl TileRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Every tile of a schedule with `tile_count` tiles.
    pub fn all(tile_count: usize) -> Self {
        Self::new(0, tile_count)
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, linear: usize) -> bool {
        (self.start..self.end).contains(&linear)
    }
}

impl fmt::Display for TileRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Everything an invocation needs besides the kernel's operands.
///
/// `output` may be `None` only when suspending. `tiles` of `None` means
/// the whole schedule.
pub struct KernelArguments<'a> {
    pub output: Option<OutputView<'a>>,
    pub reduction: Range<usize>,
    pub bounds: ActivationBounds,
    pub flags: KernelFlags,
    pub accumulators: Option<&'a mut AccumulatorBuffer>,
    pub tiles: Option<TileRange>,
}

impl<'a> KernelArguments<'a> {
    /// A self-contained pass over the full reduction axis of `reduction_len`.
    pub fn full(output: OutputView<'a>, reduction_len: usize, bounds: ActivationBounds) -> Self {
        Self {
            output: Some(output),
            reduction: 0..reduction_len,
            bounds,
            flags: KernelFlags::self_contained(),
            accumulators: None,
            tiles: None,
        }
    }

    /// First half of a split reduction: reduce `reduction`, then spill.
    pub fn suspend(reduction: Range<usize>, accumulators: &'a mut AccumulatorBuffer) -> Self {
        Self {
            output: None,
            reduction,
            bounds: ActivationBounds::identity(),
            flags: KernelFlags::suspend(),
            accumulators: Some(accumulators),
            tiles: None,
        }
    }

    /// Middle slice of a reduction split more than two ways: reload,
    /// reduce `reduction`, spill again.
    pub fn carry(reduction: Range<usize>, accumulators: &'a mut AccumulatorBuffer) -> Self {
        Self {
            output: None,
            reduction,
            bounds: ActivationBounds::identity(),
            flags: KernelFlags::resume_and_suspend(),
            accumulators: Some(accumulators),
            tiles: None,
        }
    }

    /// Last half of a split reduction: reload, reduce `reduction`, store.
    pub fn resume(
        output: OutputView<'a>,
        reduction: Range<usize>,
        bounds: ActivationBounds,
        accumulators: &'a mut AccumulatorBuffer,
    ) -> Self {
        Self {
            output: Some(output),
            reduction,
            bounds,
            flags: KernelFlags::resume(),
            accumulators: Some(accumulators),
            tiles: None,
        }
    }

    /// Restricts the invocation to a sub-range of tiles.
    pub fn with_tiles(mut self, tiles: TileRange) -> Self {
        self.tiles = Some(tiles);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits() {
        assert_eq!(KernelFlags::self_contained().bits(), 0);
        assert_eq!(KernelFlags::resume().bits(), 0b01);
        assert_eq!(KernelFlags::suspend().bits(), 0b10);
        assert_eq!(KernelFlags::resume_and_suspend().bits(), 0b11);
        for bits in 0..4 {
            assert_eq!(KernelFlags::from_bits(bits).unwrap().bits(), bits);
        }
    }

    #[test]
    fn test_unknown_flag_bits_rejected() {
        assert!(matches!(
            KernelFlags::from_bits(0b100),
            Err(KernelError::UnknownFlags { bits: 0b100 })
        ));
    }

    #[test]
    fn test_flags_display() {
        assert_eq!(KernelFlags::suspend().to_string(), "suspend");
        assert_eq!(KernelFlags::resume_and_suspend().to_string(), "resume+suspend");
        assert!(!KernelFlags::self_contained().uses_buffer());
    }

    #[test]
    fn test_tile_range() {
        let r = TileRange::new(2, 5);
        assert_eq!(r.len(), 3);
        assert!(r.contains(2) && r.contains(4) && !r.contains(5));
        assert!(TileRange::new(3, 3).is_empty());
        assert_eq!(r.to_string(), "2..5");
    }
}
