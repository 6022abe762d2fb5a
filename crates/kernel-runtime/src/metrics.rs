// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kernel profiling metrics.
//!
//! [`KernelMetrics`] aggregates the engine's per-invocation counters over a
//! run (one or more invocations) and adds wall-clock time and throughput.

use kernel_engine::InvocationStats;
use std::time::Duration;

/// Aggregate metrics for one run of a workload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct KernelMetrics {
    pub kernel: String,
    pub variant: String,
    /// Engine invocations that made up the run.
    pub invocations: usize,
    pub tiles: usize,
    pub ragged_tiles: usize,
    pub channel_passes: usize,
    pub spills: usize,
    pub resumes: usize,
    pub lanes_stored: usize,
    /// Multiply-accumulates on valid lanes.
    pub macs: u64,
    /// Wall-clock time for the whole run.
    pub duration: Duration,
}

impl KernelMetrics {
    /// Creates an empty metrics container.
    pub fn new(kernel: &str, variant: &str) -> Self {
        Self {
            kernel: kernel.to_string(),
            variant: variant.to_string(),
            invocations: 0,
            tiles: 0,
            ragged_tiles: 0,
            channel_passes: 0,
            spills: 0,
            resumes: 0,
            lanes_stored: 0,
            macs: 0,
            duration: Duration::ZERO,
        }
    }

    /// Adds one invocation's counters.
    pub fn record(&mut self, stats: &InvocationStats) {
        self.invocations += 1;
        self.tiles += stats.tiles;
        self.ragged_tiles += stats.ragged_tiles;
        self.channel_passes += stats.channel_passes;
        self.spills += stats.spills;
        self.resumes += stats.resumes;
        self.lanes_stored += stats.lanes_stored;
        self.macs += stats.macs;
    }

    /// Finalises metrics with the total wall-clock time.
    pub fn finalise(&mut self, total: Duration) {
        self.duration = total;
    }

    /// Returns GFLOP/s, counting a multiply-accumulate as two operations.
    pub fn gflops(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs <= 0.0 || self.macs == 0 {
            return 0.0;
        }
        2.0 * self.macs as f64 / secs / 1e9
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        format!(
            "{} [{}]: {:.3}ms, {} invocation(s), {} tiles ({} ragged), \
             {} channel passes, {} spills, {} resumes, {} lanes stored, \
             {} MACs ({:.2} GFLOP/s)",
            self.kernel,
            self.variant,
            self.duration.as_secs_f64() * 1000.0,
            self.invocations,
            self.tiles,
            self.ragged_tiles,
            self.channel_passes,
            self.spills,
            self.resumes,
            self.lanes_stored,
            self.macs,
            self.gflops(),
        )
    }
}
