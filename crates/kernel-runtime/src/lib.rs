// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # kernel-runtime
//!
//! Ties the tensor memory contract and the tiled kernels together:
//! picks a kernel variant for the target, derives its tile geometry,
//! allocates operand tensors from a budgeted memory group and runs the
//! kernel whole, split across a spill buffer, or over disjoint tile
//! ranges.
//!
//! # Key Components
//!
//! - [`Executor`] — type-state pipeline `Idle → Planned → Ready`.
//! - [`KernelCatalog`] — the dispatch table of [`KernelVariant`]s.
//! - [`RuntimeConfig`] — TOML-based configuration.
//! - [`Workload`] — which kernel to run on which shapes.
//! - [`KernelMetrics`] — per-run counters, timing and throughput.
//! - [`activate_in_place`] — activation over an already bound tensor.

mod activate;
mod config;
mod error;
mod executor;
mod metrics;
mod variant;
mod workload;

pub use activate::activate_in_place;
pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use executor::{
    ExecutionPlan, Executor, ExecutorState, Idle, Planned, Ready, RunOutput, Verification,
};
pub use metrics::KernelMetrics;
pub use variant::{HardwareProfile, KernelCatalog, KernelVariant};
pub use workload::{OperandSet, OperandSpec, Workload};
