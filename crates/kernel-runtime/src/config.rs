// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! variant = "auto"
//! vector_width = 8
//! accumulator_slots = 4
//! lanes_per_slot = 32
//! alignment = 64
//! memory_budget = "64M"
//! seed = 42
//! enable_profiling = true
//! prefetch = true
//! ```

use crate::variant::{HardwareProfile, KernelCatalog, KernelVariant};
use crate::RuntimeError;
use memory_manager::MemoryBudget;
use std::path::Path;

/// Configuration for the kernel runtime.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// `"auto"` or a catalog variant name.
    pub variant: String,
    /// f32 lanes per vector register of the target.
    pub vector_width: usize,
    /// Accumulator slots the target can keep live.
    pub accumulator_slots: usize,
    /// Lanes per accumulator slot.
    pub lanes_per_slot: usize,
    /// Byte alignment for operand tensors.
    pub alignment: usize,
    /// Memory budget for operand tensors (human-readable, e.g., `"64M"`).
    pub memory_budget: String,
    /// Seed for the generated operands.
    pub seed: u64,
    /// Whether to collect per-run metrics.
    pub enable_profiling: bool,
    /// Whether kernels issue cache prefetch hints.
    pub prefetch: bool,
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Rejects values no variant or allocator could honour.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.vector_width == 0 || self.accumulator_slots == 0 || self.lanes_per_slot == 0 {
            return Err(RuntimeError::ConfigError(
                "vector_width, accumulator_slots and lanes_per_slot must be positive".into(),
            ));
        }
        if !self.alignment.is_power_of_two() {
            return Err(RuntimeError::ConfigError(format!(
                "alignment {} is not a power of two",
                self.alignment
            )));
        }
        Ok(())
    }

    /// The machine description used for `"auto"` variant selection.
    pub fn hardware_profile(&self) -> HardwareProfile {
        HardwareProfile {
            vector_width: self.vector_width,
            accumulator_slots: self.accumulator_slots,
            lanes_per_slot: self.lanes_per_slot,
        }
    }

    /// Parses the memory budget string into a [`MemoryBudget`].
    pub fn parse_budget(&self) -> Result<MemoryBudget, RuntimeError> {
        MemoryBudget::parse(&self.memory_budget)
            .map_err(|e| RuntimeError::ConfigError(format!("invalid budget: {e}")))
    }

    /// Looks up the configured variant, or selects one for the profile.
    pub fn resolve_variant(&self, catalog: &KernelCatalog) -> Result<KernelVariant, RuntimeError> {
        if self.variant.eq_ignore_ascii_case("auto") {
            let profile = self.hardware_profile();
            return catalog.select(&profile).cloned().ok_or_else(|| RuntimeError::NoVariant {
                profile: profile.to_string(),
            });
        }
        catalog
            .by_name(&self.variant)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownVariant {
                name: self.variant.clone(),
                available: catalog.names(),
            })
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            variant: "auto".to_string(),
            vector_width: 8,
            accumulator_slots: 4,
            lanes_per_slot: 32,
            alignment: 64,
            memory_budget: "64M".to_string(),
            seed: 42,
            enable_profiling: true,
            prefetch: true,
        }
    }
}
