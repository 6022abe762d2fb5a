// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `tile-rt variants` command: list the dispatch table.

use kernel_runtime::{HardwareProfile, KernelCatalog, KernelVariant, RuntimeConfig};

#[derive(serde::Serialize)]
struct VariantsReport<'a> {
    profile: HardwareProfile,
    selected: Option<&'a str>,
    variants: &'a [KernelVariant],
}

pub fn execute(config: RuntimeConfig, json: bool) -> anyhow::Result<()> {
    let catalog = KernelCatalog::builtin();
    let profile = config.hardware_profile();
    let resolved = config.resolve_variant(&catalog);
    let selected = resolved.as_ref().ok();

    if json {
        return super::print_json(&VariantsReport {
            profile,
            selected: selected.map(|v| v.name.as_str()),
            variants: catalog.variants(),
        });
    }

    println!("  Profile: {profile}");
    println!();
    println!(
        "  {:<2} {:<8} {:>6} {:>14} {:>10} {:>6}",
        "", "Name", "Width", "Pool", "Blocking", "Fits"
    );
    println!("  {}", "-".repeat(52));
    for variant in catalog.variants() {
        let chosen = selected.is_some_and(|s| s.name == variant.name);
        println!(
            "  {:<2} {:<8} {:>6} {:>14} {:>10} {:>6}",
            if chosen { "*" } else { "" },
            variant.name,
            variant.vector_width,
            format!("{}x{}", variant.pool.slots, variant.pool.lanes_per_slot),
            variant.blocking_factor,
            if variant.fits(&profile) { "yes" } else { "no" },
        );
    }
    println!();
    match &resolved {
        Ok(v) => println!("  Selected: {} (variant = \"{}\")", v.name, config.variant),
        Err(e) => println!("  Selected: none ({e})"),
    }
    Ok(())
}
