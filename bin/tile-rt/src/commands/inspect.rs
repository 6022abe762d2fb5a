// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `tile-rt inspect` command: display the tile schedule for an output grid.
//!
//! Prints every tile with its valid extent so ragged bottom and right
//! edges are easy to see, plus optional disjoint partitions.

use kernel_engine::{Tile, TileRange, TileScheduler, TileShape};

#[derive(serde::Serialize)]
struct InspectReport {
    rows: usize,
    cols: usize,
    tile: TileShape,
    tile_rows: usize,
    tile_cols: usize,
    tiles: Vec<Tile>,
    partitions: Vec<TileRange>,
}

pub fn execute(
    rows: usize,
    cols: usize,
    tile_rows: usize,
    tile_cols: usize,
    partitions: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let shape = TileShape::new(tile_rows, tile_cols);
    let scheduler = TileScheduler::new(rows, cols, shape)?;
    let tiles: Vec<Tile> = scheduler.tiles().collect();
    let ranges = partitions.map(|n| scheduler.partition(n)).unwrap_or_default();

    if json {
        return super::print_json(&InspectReport {
            rows,
            cols,
            tile: shape,
            tile_rows: scheduler.tile_rows(),
            tile_cols: scheduler.tile_cols(),
            tiles,
            partitions: ranges,
        });
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              tile-rt · Tile Inspector               ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // ── Summary ────────────────────────────────────────────────
    let ragged = tiles.iter().filter(|t| t.is_ragged()).count();
    println!("  Output: {rows}x{cols}");
    println!(
        "  Tiles:  {} of {shape} ({}x{} grid, {ragged} ragged)",
        scheduler.tile_count(),
        scheduler.tile_rows(),
        scheduler.tile_cols(),
    );
    println!();

    // ── Per-Tile Detail ────────────────────────────────────────
    println!(
        "  {:<6} {:<10} {:<12} {:>10} {:>8}",
        "Idx", "(i, j)", "Origin", "Valid", "Ragged"
    );
    println!("  {}", "-".repeat(50));
    for tile in &tiles {
        println!(
            "  {:<6} {:<10} {:<12} {:>10} {:>8}",
            tile.linear,
            format!("({}, {})", tile.row_index, tile.col_index),
            format!("({}, {})", tile.row_start, tile.col_start),
            format!("{}x{}", tile.valid_rows, tile.valid_cols),
            if tile.is_ragged() { "yes" } else { "" },
        );
    }

    if !ranges.is_empty() {
        println!();
        println!("  Partitions:");
        for (i, range) in ranges.iter().enumerate() {
            println!("   [{i}] tiles {range} ({} tiles)", range.len());
        }
    }
    println!();
    Ok(())
}
