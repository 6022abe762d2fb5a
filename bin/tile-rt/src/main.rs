// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tile-rt
//!
//! Command-line interface for the tiled kernel runtime.
//!
//! ## Usage
//! ```bash
//! # Run a 3x3 depthwise convolution and check it against the reference
//! tile-rt run --workload conv --height 56 --width 56 --channels 32 --activation relu --verify
//!
//! # Suspend a GEMM after 40 reduction steps and resume it
//! tile-rt split --workload gemm --m 64 --n 48 --k 96 --at 40
//!
//! # Show how a 5x7 output is cut into 4x4 tiles
//! tile-rt inspect --rows 5 --cols 7 --tile-rows 4 --tile-cols 4
//!
//! # List kernel variants and the one the profile selects
//! tile-rt variants --vector-width 16 --lanes-per-slot 64
//! ```

mod commands;

use clap::{Parser, Subcommand};
use commands::{RuntimeArgs, WorkloadArgs};

#[derive(Parser)]
#[command(
    name = "tile-rt",
    about = "Blocked compute kernels with tiled, resumable accumulation",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file; CLI flags override its values.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan, prepare and run a workload in one pass.
    Run {
        #[command(flatten)]
        workload: WorkloadArgs,

        #[command(flatten)]
        runtime: RuntimeArgs,

        /// Split the tile grid into this many disjoint invocations.
        #[arg(long)]
        partitions: Option<usize>,

        /// Compare the result bit for bit with the naive reference.
        #[arg(long)]
        verify: bool,
    },

    /// Run a workload as two invocations joined by a spill buffer.
    Split {
        #[command(flatten)]
        workload: WorkloadArgs,

        #[command(flatten)]
        runtime: RuntimeArgs,

        /// Reduction index at which the first invocation suspends.
        #[arg(long)]
        at: usize,
    },

    /// Print the tile grid for an output extent.
    Inspect {
        #[arg(long)]
        rows: usize,

        #[arg(long)]
        cols: usize,

        #[arg(long, default_value_t = 4)]
        tile_rows: usize,

        #[arg(long, default_value_t = 4)]
        tile_cols: usize,

        /// Also print the ranges for this many disjoint partitions.
        #[arg(long)]
        partitions: Option<usize>,
    },

    /// List the kernel variants and the one selected for the profile.
    Variants {
        #[arg(long)]
        vector_width: Option<usize>,

        #[arg(long)]
        accumulator_slots: Option<usize>,

        #[arg(long)]
        lanes_per_slot: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            workload,
            runtime,
            partitions,
            verify,
        } => commands::run::execute(runtime.apply(config)?, workload.build()?, partitions, verify, cli.json),
        Commands::Split { workload, runtime, at } => {
            commands::split::execute(runtime.apply(config)?, workload.build()?, at, cli.json)
        }
        Commands::Inspect {
            rows,
            cols,
            tile_rows,
            tile_cols,
            partitions,
        } => commands::inspect::execute(rows, cols, tile_rows, tile_cols, partitions, cli.json),
        Commands::Variants {
            vector_width,
            accumulator_slots,
            lanes_per_slot,
        } => {
            let mut config = config;
            config.vector_width = vector_width.unwrap_or(config.vector_width);
            config.accumulator_slots = accumulator_slots.unwrap_or(config.accumulator_slots);
            config.lanes_per_slot = lanes_per_slot.unwrap_or(config.lanes_per_slot);
            commands::variants::execute(config, cli.json)
        }
    }
}
