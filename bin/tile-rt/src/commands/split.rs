// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `tile-rt split` command: suspend a reduction into the spill buffer,
//! resume it, and compare against an unsplit run.

use kernel_runtime::{Executor, KernelMetrics, RuntimeConfig, Workload};

#[derive(serde::Serialize)]
struct SplitReport<'a> {
    at: usize,
    reduction_len: usize,
    spill_slots: usize,
    lanes_per_slot: usize,
    full: &'a KernelMetrics,
    split: &'a KernelMetrics,
    identical: bool,
}

pub fn execute(config: RuntimeConfig, workload: Workload, at: usize, json: bool) -> anyhow::Result<()> {
    let ready = Executor::new(config).plan(workload)?.prepare()?;
    let plan = ready.plan();
    let reduction_len = plan.workload.reduction_len();

    let full = ready.run()?;
    let split = ready.run_split(at)?;
    let identical = split.verify(&full.output).matches;

    if json {
        return super::print_json(&SplitReport {
            at,
            reduction_len,
            spill_slots: plan.spill_slots(),
            lanes_per_slot: plan.lanes_per_pass,
            full: &full.metrics,
            split: &split.metrics,
            identical,
        });
    }

    println!("  Plan:  {}", plan.summary());
    println!(
        "  Split: 0..{at} suspended into {} slots of {} lanes, {at}..{reduction_len} resumed",
        plan.spill_slots(),
        plan.lanes_per_pass,
    );
    println!("  Full:  {}", full.metrics.summary());
    println!("  Split: {}", split.metrics.summary());
    println!(
        "  Result: {}",
        if identical { "bit-identical to the unsplit run" } else { "DIFFERS from the unsplit run" }
    );
    anyhow::ensure!(identical, "split run differs from the unsplit run");
    Ok(())
}
