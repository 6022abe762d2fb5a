// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the kernel runtime.

/// Errors that can occur while planning, preparing or running a workload.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Configuration could not be read, parsed or validated.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The configured variant is not in the catalog.
    #[error("unknown kernel variant '{name}'; available: {available}")]
    UnknownVariant { name: String, available: String },

    /// No catalog variant fits the hardware profile.
    #[error("no kernel variant fits {profile}")]
    NoVariant { profile: String },

    /// The workload description is inconsistent.
    #[error("invalid workload: {0}")]
    InvalidWorkload(String),

    /// Tensor memory could not be bound.
    #[error("memory error: {0}")]
    MemoryError(#[from] memory_manager::MemoryError),

    /// Tensor metadata was rejected.
    #[error("tensor error: {0}")]
    TensorError(#[from] tensor_core::TensorError),

    /// The engine rejected a kernel or its arguments.
    #[error("kernel error: {0}")]
    KernelError(#[from] kernel_engine::KernelError),
}
