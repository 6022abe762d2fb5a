// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kernel variants and the dispatch table that picks one.
//!
//! | Variant | Vector width | Pool (slots × lanes) | Blocking factor |
//! |---|---|---|---|
//! | `scalar` | 1 | 4 × 16 | 1 |
//! | `vec128` | 4 | 4 × 16 | 3 |
//! | `vec256` | 8 | 4 × 32 | 3 |
//! | `vec512` | 16 | 4 × 64 | 9 |
//!
//! Feature detection is not done here: the caller describes the machine
//! with a [`HardwareProfile`].

use kernel_engine::{AccumulatorPool, EngineConfig, KernelError};
use std::fmt;

/// What the target machine can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HardwareProfile {
    /// f32 lanes per vector register.
    pub vector_width: usize,
    pub accumulator_slots: usize,
    pub lanes_per_slot: usize,
}

impl fmt::Display for HardwareProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-wide vectors with {} accumulator slots of {} lanes",
            self.vector_width, self.accumulator_slots, self.lanes_per_slot
        )
    }
}

/// One entry of the dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct KernelVariant {
    pub name: String,
    pub vector_width: usize,
    pub pool: AccumulatorPool,
    pub blocking_factor: usize,
}

impl KernelVariant {
    pub fn new(name: &str, vector_width: usize, pool: AccumulatorPool, blocking_factor: usize) -> Self {
        Self {
            name: name.to_string(),
            vector_width,
            pool,
            blocking_factor,
        }
    }

    pub fn fits(&self, profile: &HardwareProfile) -> bool {
        self.vector_width <= profile.vector_width
            && self.pool.slots <= profile.accumulator_slots
            && self.pool.lanes_per_slot <= profile.lanes_per_slot
    }

    /// Engine blocking for a workload with `channels` channels.
    ///
    /// Channel blocks are one vector wide, narrowed for workloads with
    /// fewer channels; the tile is derived from the pool.
    pub fn engine_config(&self, channels: usize, prefetch: bool) -> Result<EngineConfig, KernelError> {
        let channel_block = self.vector_width.min(channels).max(1);
        Ok(EngineConfig {
            prefetch,
            ..EngineConfig::derived(self.pool, channel_block, self.blocking_factor)?
        })
    }
}

/// The dispatch table.
#[derive(Debug, Clone)]
pub struct KernelCatalog {
    variants: Vec<KernelVariant>,
}

impl KernelCatalog {
    /// The built-in variants, narrowest first.
    pub fn builtin() -> Self {
        Self {
            variants: vec![
                KernelVariant::new("scalar", 1, AccumulatorPool::new(4, 16), 1),
                KernelVariant::new("vec128", 4, AccumulatorPool::new(4, 16), 3),
                KernelVariant::new("vec256", 8, AccumulatorPool::new(4, 32), 3),
                KernelVariant::new("vec512", 16, AccumulatorPool::new(4, 64), 9),
            ],
        }
    }

    pub fn variants(&self) -> &[KernelVariant] {
        &self.variants
    }

    pub fn by_name(&self, name: &str) -> Option<&KernelVariant> {
        self.variants.iter().find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// The widest variant the profile can host.
    pub fn select(&self, profile: &HardwareProfile) -> Option<&KernelVariant> {
        self.variants
            .iter()
            .filter(|v| v.fits(profile))
            .max_by_key(|v| (v.vector_width, v.pool.capacity()))
    }

    /// Comma-separated variant names.
    pub fn names(&self) -> String {
        self.variants
            .iter()
            .map(|v| v.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for KernelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(vector_width: usize, slots: usize, lanes: usize) -> HardwareProfile {
        HardwareProfile {
            vector_width,
            accumulator_slots: slots,
            lanes_per_slot: lanes,
        }
    }

    #[test]
    fn test_select_widest_fitting() {
        let catalog = KernelCatalog::builtin();
        assert_eq!(catalog.select(&profile(8, 4, 32)).unwrap().name, "vec256");
        assert_eq!(catalog.select(&profile(16, 8, 64)).unwrap().name, "vec512");
        assert_eq!(catalog.select(&profile(16, 4, 32)).unwrap().name, "vec256");
        assert_eq!(catalog.select(&profile(1, 4, 16)).unwrap().name, "scalar");
        assert!(catalog.select(&profile(4, 2, 16)).is_none());
    }

    #[test]
    fn test_by_name() {
        let catalog = KernelCatalog::builtin();
        assert_eq!(catalog.by_name("VEC128").unwrap().vector_width, 4);
        assert!(catalog.by_name("neon").is_none());
        assert_eq!(catalog.names(), "scalar, vec128, vec256, vec512");
    }

    #[test]
    fn test_engine_config_narrows_channel_block() {
        let catalog = KernelCatalog::builtin();
        let vec512 = catalog.by_name("vec512").unwrap();

        let conv = vec512.engine_config(32, true).unwrap();
        assert_eq!(conv.channel_block, 16);
        assert!(conv.prefetch);
        assert!(conv.pool.fits(conv.tile, conv.channel_block));

        let gemm = vec512.engine_config(1, false).unwrap();
        assert_eq!(gemm.channel_block, 1);
        assert_eq!(gemm.tile.positions(), 256);
    }

    #[test]
    fn test_every_builtin_variant_yields_engine() {
        for variant in KernelCatalog::builtin().variants() {
            for channels in [1, 3, 9, 64] {
                let config = variant.engine_config(channels, false).unwrap();
                assert!(kernel_engine::TileEngine::new(config).is_ok(), "{}", variant.name);
            }
        }
    }
}
