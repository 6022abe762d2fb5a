// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Aligned memory regions, owned or imported.

use crate::MemoryError;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// Who is responsible for releasing a region's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    /// Allocated by this crate and returned to the system allocator on drop.
    Owned,
    /// Supplied by the caller; never deallocated here.
    Imported,
}

/// A contiguous block of bytes with an alignment contract.
///
/// Owned regions come from the system allocator with the requested
/// alignment and are zero-initialised. Imported regions wrap caller
/// memory and are accepted only if already aligned.
pub struct MemoryRegion {
    ptr: NonNull<u8>,
    len: usize,
    alignment: usize,
    ownership: Ownership,
}

// SAFETY: the region is the unique handle to its bytes (owned) or the
// caller has promised exclusive use for the binding's lifetime (imported).
// Shared references only expose `&[u8]`.
unsafe impl Send for MemoryRegion {}
unsafe impl Sync for MemoryRegion {}

impl MemoryRegion {
    /// Allocates `len` zeroed bytes aligned to `alignment`.
    ///
    /// # Errors
    /// [`MemoryError::ZeroSizedAllocation`], [`MemoryError::InvalidAlignment`]
    /// when `alignment` is not a non-zero power of two, and
    /// [`MemoryError::AllocationFailed`] when the allocator returns null.
    pub fn allocate(len: usize, alignment: usize) -> Result<Self, MemoryError> {
        if len == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }
        let layout = Layout::from_size_align(len, alignment)
            .map_err(|_| MemoryError::InvalidAlignment { alignment })?;

        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(MemoryError::AllocationFailed {
            size_bytes: len,
            alignment,
        })?;

        Ok(Self {
            ptr,
            len,
            alignment,
            ownership: Ownership::Owned,
        })
    }

    /// Wraps caller-owned memory.
    ///
    /// An `alignment` of zero imposes no requirement; any other value
    /// (power of two or not) must divide the address.
    ///
    /// # Errors
    /// [`MemoryError::NullPointer`] and [`MemoryError::Misaligned`].
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` bytes for as long
    /// as the returned region (or any tensor it is bound to) is alive, and
    /// nothing else may access that memory during that time.
    pub unsafe fn import(ptr: *mut u8, len: usize, alignment: usize) -> Result<Self, MemoryError> {
        let ptr = NonNull::new(ptr).ok_or(MemoryError::NullPointer)?;
        if !is_aligned(ptr.as_ptr(), alignment) {
            return Err(MemoryError::Misaligned {
                address: ptr.as_ptr() as usize,
                alignment,
            });
        }
        Ok(Self {
            ptr,
            len,
            alignment,
            ownership: Ownership::Imported,
        })
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `len` bytes (allocated here, or
        // guaranteed by the caller of `import`).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` gives exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MemoryRegion {
    fn drop(&mut self) {
        if self.ownership == Ownership::Owned {
            // SAFETY: owned regions were allocated in `allocate` with exactly
            // this size and alignment, which `Layout` accepted then.
            unsafe {
                dealloc(
                    self.ptr.as_ptr(),
                    Layout::from_size_align_unchecked(self.len, self.alignment),
                );
            }
        }
    }
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("alignment", &self.alignment)
            .field("ownership", &self.ownership)
            .finish()
    }
}

/// Returns `true` if `ptr` is a multiple of `alignment` (zero means any).
pub fn is_aligned(ptr: *const u8, alignment: usize) -> bool {
    alignment == 0 || (ptr as usize) % alignment == 0
}
