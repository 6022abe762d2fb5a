// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for memory management.
//!
//! Every variant is a recoverable configuration error: the operation that
//! returned it left the tensor and the memory group unchanged.

use std::path::PathBuf;
use tensor_core::DType;

/// Errors that can occur while binding memory to tensors.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The requested allocation would exceed the memory group's budget.
    #[error("out of memory: requested {requested_bytes} bytes, but only {available_bytes} available (budget: {budget_bytes})")]
    OutOfMemory {
        requested_bytes: usize,
        available_bytes: usize,
        budget_bytes: usize,
    },

    /// Attempted to allocate a zero-sized buffer.
    #[error("cannot allocate zero-sized buffer")]
    ZeroSizedAllocation,

    /// Owned allocations need a non-zero power-of-two alignment.
    #[error("invalid allocation alignment {alignment}: must be a non-zero power of two")]
    InvalidAlignment { alignment: usize },

    /// The system allocator could not satisfy the request.
    #[error("allocation of {size_bytes} bytes aligned to {alignment} failed")]
    AllocationFailed { size_bytes: usize, alignment: usize },

    /// A null pointer was offered for import.
    #[error("cannot import a null pointer")]
    NullPointer,

    /// An imported pointer does not satisfy the tensor's alignment.
    #[error("pointer {address:#x} is not aligned to {alignment} bytes")]
    Misaligned { address: usize, alignment: usize },

    /// The tensor's memory is managed by a memory group and cannot be imported.
    #[error("tensor is managed by memory group '{group}'; external memory cannot be imported")]
    ManagedByGroup { group: String },

    /// Memory is already bound to the tensor.
    #[error("tensor already has memory bound; free it first")]
    AlreadyBound,

    /// The operation needs bound memory.
    #[error("tensor has no memory bound")]
    NotBound,

    /// Typed access was requested with the wrong element type.
    #[error("element type mismatch: tensor holds {actual}, requested {expected}")]
    DTypeMismatch { expected: DType, actual: DType },

    /// A memory budget string could not be parsed.
    #[error("invalid memory budget '{input}': {reason}")]
    InvalidBudget { input: String, reason: String },

    /// Creating or mapping a file-backed region failed.
    #[error("memory map of '{path}' failed: {source}")]
    Map {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
