// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! Binds memory to tensors: owned aligned allocations, imported caller
//! memory, and memory groups that account for owned allocations against a
//! budget.
//!
//! # Key Components
//!
//! - [`TensorBuffer`]: a tensor's [`TensorInfo`](tensor_core::TensorInfo)
//!   plus its bound memory. Handles `allocate`, `import_memory` and `free`,
//!   and keeps the resizable flag in step with the binding.
//! - [`MemoryRegion`]: an aligned byte range tagged [`Ownership::Owned`] or
//!   [`Ownership::Imported`]. Only owned regions are deallocated.
//! - [`MemoryGroup`]: a budgeted lifecycle manager. Tensors in a group take
//!   a [`GroupLease`] per allocation and refuse imports.
//! - [`MappedFile`]: a memory-mapped file whose pages can be imported.
//! - [`MemoryBudget`] and [`AllocationStats`]: budget parsing and
//!   per-group statistics.
//!
//! # Ownership Model
//!
//! ```text
//! TensorBuffer::allocate()
//!       │
//!       ├──► MemoryGroup::reserve(size) ──► GroupLease ◄── Arc<GroupInner>
//!       │
//!       └──► MemoryRegion::allocate(size, align)   (Owned)
//!
//! TensorBuffer::import_memory(ptr)
//!       └──► MemoryRegion::import(ptr, size, align) (Imported)
//!
//! TensorBuffer::free() / drop
//!       ├──► Owned region deallocated, lease dropped ──► bytes back to group
//!       └──► Imported region forgotten; caller still owns the bytes
//! ```
//!
//! # Example
//! ```
//! use memory_manager::{TensorBuffer, Ownership};
//! use tensor_core::{DType, Shape, TensorInfo};
//!
//! let info = TensorInfo::new(Shape::hwc(4, 4, 3), DType::F32);
//! let mut backing = vec![0f32; 48];
//!
//! let mut tensor = TensorBuffer::with_alignment(info, 4);
//! unsafe { tensor.import_memory(backing.as_mut_ptr() as *mut u8) }.unwrap();
//! assert_eq!(tensor.ownership(), Some(Ownership::Imported));
//! assert!(!tensor.is_resizable());
//!
//! tensor.free();
//! assert!(tensor.is_resizable());
//! assert!(tensor.buffer_ptr().is_null());
//! ```

mod budget;
mod buffer;
mod error;
mod group;
mod lease;
mod mapped;
mod region;
mod stats;

pub use budget::MemoryBudget;
pub use buffer::{TensorBuffer, DEFAULT_ALLOC_ALIGNMENT};
pub use error::MemoryError;
pub use group::MemoryGroup;
pub use lease::GroupLease;
pub use mapped::MappedFile;
pub use region::{is_aligned, MemoryRegion, Ownership};
pub use stats::AllocationStats;
