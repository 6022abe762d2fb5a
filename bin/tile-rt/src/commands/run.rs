// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `tile-rt run` command: execute a workload in one pass.
//!
//! Demonstrates the full type-state pipeline:
//! ```text
//! Executor<Idle> → plan → <Planned> → prepare → <Ready> → run
//! ```

use kernel_runtime::{ExecutionPlan, Executor, KernelMetrics, RuntimeConfig, Verification, Workload};
use memory_manager::AllocationStats;

#[derive(serde::Serialize)]
struct RunReport<'a> {
    plan: &'a ExecutionPlan,
    metrics: &'a KernelMetrics,
    memory: AllocationStats,
    verification: Option<Verification>,
}

pub fn execute(
    config: RuntimeConfig,
    workload: Workload,
    partitions: Option<usize>,
    verify: bool,
    json: bool,
) -> anyhow::Result<()> {
    if !json {
        println!("╔══════════════════════════════════════════════════════╗");
        println!("║               tile-rt · Kernel Runner               ║");
        println!("╚══════════════════════════════════════════════════════╝");
        println!();
        println!("  Config:");
        println!("   Workload:  {workload}");
        println!("   Variant:   {}", config.variant);
        println!("   Budget:    {}", config.memory_budget);
        println!("   Alignment: {} B", config.alignment);
        println!("   Seed:      {}", config.seed);
        println!();
    }

    // Step 1: Idle → Planned (select variant + derive tiles).
    let planned = Executor::new(config).plan(workload)?;
    if !json {
        println!("  [1/3] Plan: {}", planned.plan().summary());
    }

    // Step 2: Planned → Ready (allocate + fill operands).
    let ready = planned.prepare()?;
    if !json {
        println!("  [2/3] Operands: {}", ready.memory_stats().summary());
    }

    // Step 3: run.
    let output = match partitions {
        Some(parts) => ready.run_partitioned(parts)?,
        None => ready.run()?,
    };
    let verification = if verify {
        Some(output.verify(&ready.reference()?))
    } else {
        None
    };

    if json {
        return super::print_json(&RunReport {
            plan: ready.plan(),
            metrics: &output.metrics,
            memory: ready.memory_stats(),
            verification,
        });
    }

    println!("  [3/3] {}", output.metrics.summary());
    if let Some(check) = verification {
        print_verification(&check);
    }
    println!();
    anyhow::ensure!(
        verification.map_or(true, |v| v.matches),
        "output differs from the reference"
    );
    Ok(())
}

pub(crate) fn print_verification(check: &Verification) {
    if check.matches {
        println!("        Reference: bit-exact");
    } else {
        println!(
            "        Reference: {} mismatches (max |diff| {:e})",
            check.mismatches, check.max_abs_diff
        );
    }
}
