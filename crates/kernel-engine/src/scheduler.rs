// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tile scheduling over a 2-D output grid.
//!
//! ```text
//!   cols ──────────────────────────►
//!   ┌────────┬────────┬────┐
//!   │ (0,0)  │ (0,1)  │(0,2)│  ◄── ragged right column
//!   ├────────┼────────┼────┤
//!   │ (1,0)  │ (1,1)  │(1,2)│
//!   ├────────┼────────┼────┤
//!   │ (2,0)  │ (2,1)  │(2,2)│  ◄── ragged bottom row
//!   └────────┴────────┴────┘
//! ```
//!
//! Tiles are visited row-major. Linear index `i * tile_cols + j` is the
//! position used by [`TileRange`], partitions and the spill buffer.

use crate::{KernelError, TileRange};
use std::fmt;

/// Tile extents in output rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TileShape {
    pub rows: usize,
    pub cols: usize,
}

impl TileShape {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Output positions in a full tile.
    pub fn positions(&self) -> usize {
        self.rows * self.cols
    }
}

impl fmt::Display for TileShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// One scheduled tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Tile {
    pub row_index: usize,
    pub col_index: usize,
    /// Row-major position in the schedule.
    pub linear: usize,
    /// First output row covered.
    pub row_start: usize,
    /// First output column covered.
    pub col_start: usize,
    pub valid_rows: usize,
    pub valid_cols: usize,
    pub shape: TileShape,
}

impl Tile {
    /// Whether the tile is cut short by the bottom or right edge.
    pub fn is_ragged(&self) -> bool {
        self.valid_rows < self.shape.rows || self.valid_cols < self.shape.cols
    }

    pub fn valid_positions(&self) -> usize {
        self.valid_rows * self.valid_cols
    }

    pub fn cursor(&self) -> TileCursor {
        TileCursor::new(self.row_index, self.col_index)
    }
}

/// A restart point in the schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TileCursor {
    pub row_index: usize,
    pub col_index: usize,
}

impl TileCursor {
    pub fn new(row_index: usize, col_index: usize) -> Self {
        Self {
            row_index,
            col_index,
        }
    }
}

/// Element strides of a kernel's input, used to find a tile's receptive
/// field origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputGeometry {
    /// Elements between vertically adjacent input positions.
    pub ld_row: usize,
    /// Elements between horizontally adjacent input positions.
    pub ld_col: usize,
    /// Output-to-input step of the convolution.
    pub kernel_stride: usize,
}

impl InputGeometry {
    /// Flat offset of the input element under output `(row, col)`.
    #[inline]
    pub fn origin(&self, row: usize, col: usize) -> usize {
        (row * self.ld_row + col * self.ld_col) * self.kernel_stride
    }
}

/// Deterministic row-major tiling of a `rows × cols` grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileScheduler {
    rows: usize,
    cols: usize,
    shape: TileShape,
    tile_rows: usize,
    tile_cols: usize,
}

impl TileScheduler {
    /// # Errors
    /// [`KernelError::InvalidConfig`] if either tile extent is zero.
    pub fn new(rows: usize, cols: usize, shape: TileShape) -> Result<Self, KernelError> {
        if shape.rows == 0 || shape.cols == 0 {
            return Err(KernelError::InvalidConfig {
                detail: format!("tile {shape} is empty"),
            });
        }
        Ok(Self::with_checked_shape(rows, cols, shape))
    }

    /// For shapes already validated, e.g. by [`crate::TileEngine::new`].
    pub(crate) fn with_checked_shape(rows: usize, cols: usize, shape: TileShape) -> Self {
        Self {
            rows,
            cols,
            shape,
            tile_rows: rows.div_ceil(shape.rows),
            tile_cols: cols.div_ceil(shape.cols),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> TileShape {
        self.shape
    }

    /// Number of tile rows, `ceil(rows / Tr)`.
    pub fn tile_rows(&self) -> usize {
        self.tile_rows
    }

    /// Number of tile columns, `ceil(cols / Tc)`.
    pub fn tile_cols(&self) -> usize {
        self.tile_cols
    }

    pub fn tile_count(&self) -> usize {
        self.tile_rows * self.tile_cols
    }

    /// The tile at a row-major position, if it exists.
    pub fn tile_at(&self, linear: usize) -> Option<Tile> {
        if linear >= self.tile_count() {
            return None;
        }
        let (i, j) = (linear / self.tile_cols, linear % self.tile_cols);
        let (row_start, col_start) = (i * self.shape.rows, j * self.shape.cols);
        Some(Tile {
            row_index: i,
            col_index: j,
            linear,
            row_start,
            col_start,
            valid_rows: self.shape.rows.min(self.rows - row_start),
            valid_cols: self.shape.cols.min(self.cols - col_start),
            shape: self.shape,
        })
    }

    pub fn tiles(&self) -> TileIter {
        self.tiles_in(TileRange::all(self.tile_count()))
    }

    /// Tiles from `cursor` to the end of the schedule.
    pub fn tiles_from(&self, cursor: TileCursor) -> TileIter {
        self.tiles_in(self.range_from(cursor))
    }

    /// Tiles of a linear sub-range, clipped to the schedule.
    pub fn tiles_in(&self, range: TileRange) -> TileIter {
        let end = range.end.min(self.tile_count());
        TileIter {
            scheduler: *self,
            next: range.start.min(end),
            end,
        }
    }

    /// The linear range from `cursor` to the end of the schedule. A cursor
    /// past the last tile yields an empty range.
    pub fn range_from(&self, cursor: TileCursor) -> TileRange {
        let count = self.tile_count();
        let start = if cursor.row_index >= self.tile_rows || cursor.col_index >= self.tile_cols {
            count
        } else {
            cursor.row_index * self.tile_cols + cursor.col_index
        };
        TileRange::new(start, count)
    }

    /// Splits the schedule into `parts` contiguous, disjoint ranges whose
    /// sizes differ by at most one. Trailing ranges are empty when there
    /// are fewer tiles than parts.
    pub fn partition(&self, parts: usize) -> Vec<TileRange> {
        let parts = parts.max(1);
        let count = self.tile_count();
        let (base, extra) = (count / parts, count % parts);

        let mut start = 0;
        (0..parts)
            .map(|p| {
                let len = base + usize::from(p < extra);
                let range = TileRange::new(start, start + len);
                start += len;
                range
            })
            .collect()
    }

    /// Flat input offset of a tile's receptive field origin. Positions
    /// inside the tile step from it by `geometry.origin(r, c)`.
    pub fn input_offset(&self, tile: &Tile, geometry: InputGeometry) -> usize {
        geometry.origin(tile.row_start, tile.col_start)
    }
}

/// Iterator over a run of tiles, see [`TileScheduler::tiles_in`].
#[derive(Debug, Clone)]
pub struct TileIter {
    scheduler: TileScheduler,
    next: usize,
    end: usize,
}

impl Iterator for TileIter {
    type Item = Tile;

    fn next(&mut self) -> Option<Tile> {
        if self.next >= self.end {
            return None;
        }
        let tile = self.scheduler.tile_at(self.next);
        self.next += 1;
        tile
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end - self.next;
        (n, Some(n))
    }
}

impl ExactSizeIterator for TileIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ragged_rows() {
        let s = TileScheduler::new(5, 4, TileShape::new(4, 4)).unwrap();
        let tiles: Vec<_> = s.tiles().collect();
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].valid_rows, 4);
        assert_eq!(tiles[1].valid_rows, 1);
        assert_eq!(tiles[1].row_start, 4);
        assert!(!tiles[0].is_ragged());
        assert!(tiles[1].is_ragged());
    }

    #[test]
    fn test_row_major_order() {
        let s = TileScheduler::new(4, 6, TileShape::new(2, 4)).unwrap();
        let coords: Vec<_> = s.tiles().map(|t| (t.row_index, t.col_index)).collect();
        assert_eq!(coords, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert_eq!(s.tile_at(1).unwrap().valid_cols, 2);
    }

    #[test]
    fn test_restart_from_cursor() {
        let s = TileScheduler::new(9, 9, TileShape::new(4, 4)).unwrap();
        let resumed: Vec<_> = s.tiles_from(TileCursor::new(1, 2)).collect();
        let expected: Vec<_> = s.tiles().skip(5).collect();
        assert_eq!(resumed, expected);
        assert_eq!(s.tiles_from(TileCursor::new(3, 0)).count(), 0);
        assert_eq!(s.tiles_from(TileCursor::new(0, 7)).count(), 0);
    }

    #[test]
    fn test_empty_grid() {
        let s = TileScheduler::new(0, 7, TileShape::new(2, 2)).unwrap();
        assert_eq!(s.tile_count(), 0);
        assert_eq!(s.tiles().count(), 0);
        assert!(s.partition(3).iter().all(TileRange::is_empty));
    }

    #[test]
    fn test_partition_more_parts_than_tiles() {
        let s = TileScheduler::new(2, 2, TileShape::new(1, 1)).unwrap();
        let parts = s.partition(6);
        assert_eq!(parts.len(), 6);
        assert_eq!(parts.iter().map(TileRange::len).sum::<usize>(), 4);
    }

    #[test]
    fn test_empty_tile_shape_rejected() {
        assert!(matches!(
            TileScheduler::new(4, 4, TileShape::new(0, 2)),
            Err(KernelError::InvalidConfig { .. })
        ));
        assert!(TileScheduler::new(4, 4, TileShape::new(2, 0)).is_err());
    }

    #[test]
    fn test_input_offset_steps_to_every_position() {
        let s = TileScheduler::new(7, 9, TileShape::new(3, 4)).unwrap();
        let geometry = InputGeometry {
            ld_row: 19 * 3,
            ld_col: 3,
            kernel_stride: 2,
        };
        for tile in s.tiles() {
            let base = s.input_offset(&tile, geometry);
            for r in 0..tile.valid_rows {
                for c in 0..tile.valid_cols {
                    assert_eq!(
                        base + geometry.origin(r, c),
                        geometry.origin(tile.row_start + r, tile.col_start + c)
                    );
                }
            }
        }
    }

    #[test]
    fn test_input_offset() {
        let s = TileScheduler::new(8, 8, TileShape::new(2, 3)).unwrap();
        let tile = s.tile_at(s.tile_cols() + 1).unwrap();
        // Tile (1, 1) starts at output (2, 3); with stride 2 that is input (4, 6).
        let geometry = InputGeometry {
            ld_row: 10 * 4,
            ld_col: 4,
            kernel_stride: 2,
        };
        assert_eq!(s.input_offset(&tile, geometry), 4 * 40 + 6 * 4);
    }

    proptest! {
        #[test]
        fn prop_tiles_cover_grid_exactly_once(
            rows in 0usize..40,
            cols in 0usize..40,
            tr in 1usize..9,
            tc in 1usize..9,
        ) {
            let s = TileScheduler::new(rows, cols, TileShape::new(tr, tc)).unwrap();
            let mut hits = vec![0u8; rows * cols];
            for tile in s.tiles() {
                prop_assert!(tile.valid_rows >= 1 && tile.valid_rows <= tr);
                prop_assert!(tile.valid_cols >= 1 && tile.valid_cols <= tc);
                for r in 0..tile.valid_rows {
                    for c in 0..tile.valid_cols {
                        hits[(tile.row_start + r) * cols + tile.col_start + c] += 1;
                    }
                }
            }
            prop_assert!(hits.iter().all(|&h| h == 1));
        }

        #[test]
        fn prop_partitions_are_disjoint_and_complete(
            rows in 1usize..30,
            cols in 1usize..30,
            parts in 1usize..9,
        ) {
            let s = TileScheduler::new(rows, cols, TileShape::new(3, 2)).unwrap();
            let ranges = s.partition(parts);
            let mut next = 0;
            for range in &ranges {
                prop_assert_eq!(range.start, next);
                next = range.end;
            }
            prop_assert_eq!(next, s.tile_count());
            let lens: Vec<_> = ranges.iter().map(TileRange::len).collect();
            let (min, max) = (lens.iter().min().unwrap(), lens.iter().max().unwrap());
            prop_assert!(max - min <= 1);
        }
    }
}
