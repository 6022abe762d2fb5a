// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor memory binding: allocate, import, free.
//!
//! ```text
//!                 allocate() / import_memory()
//!   resizable ───────────────────────────────────► bound (fixed)
//!   (no region)  ◄───────────────────────────────  Owned | Imported
//!                            free()
//! ```
//!
//! Every failed transition leaves the tensor exactly as it was.

use crate::region::{MemoryRegion, Ownership};
use crate::{GroupLease, MemoryError, MemoryGroup};
use tensor_core::{DType, Padding, TensorError, TensorInfo};

/// Alignment used by [`TensorBuffer::allocate`] when none was configured.
pub const DEFAULT_ALLOC_ALIGNMENT: usize = 64;

/// A tensor's metadata plus the memory currently bound to it.
///
/// `info().is_resizable()` is `true` exactly when no region is bound.
pub struct TensorBuffer {
    info: TensorInfo,
    alignment: Option<usize>,
    region: Option<MemoryRegion>,
    group: Option<MemoryGroup>,
    lease: Option<GroupLease>,
}

impl TensorBuffer {
    /// Creates an unbound tensor with no explicit alignment requirement.
    ///
    /// Imports then only need element alignment, and allocations use
    /// [`DEFAULT_ALLOC_ALIGNMENT`].
    pub fn new(info: TensorInfo) -> Self {
        Self::init(info, None)
    }

    /// Creates an unbound tensor whose memory must be aligned to `alignment`.
    pub fn with_alignment(info: TensorInfo, alignment: usize) -> Self {
        Self::init(info, Some(alignment))
    }

    fn init(mut info: TensorInfo, alignment: Option<usize>) -> Self {
        info.set_resizable(true);
        Self {
            info,
            alignment,
            region: None,
            group: None,
            lease: None,
        }
    }

    pub fn info(&self) -> &TensorInfo {
        &self.info
    }

    pub fn is_resizable(&self) -> bool {
        self.info.is_resizable()
    }

    /// The configured alignment, if any.
    pub fn alignment(&self) -> Option<usize> {
        self.alignment
    }

    /// Ownership of the bound region, or `None` when unbound.
    pub fn ownership(&self) -> Option<Ownership> {
        self.region.as_ref().map(MemoryRegion::ownership)
    }

    /// The associated memory group, if any.
    pub fn memory_group(&self) -> Option<&MemoryGroup> {
        self.group.as_ref()
    }

    /// Base address of the bound buffer; null when nothing is bound.
    pub fn buffer_ptr(&self) -> *const u8 {
        self.region
            .as_ref()
            .map_or(std::ptr::null(), MemoryRegion::as_ptr)
    }

    /// Hands the tensor's memory lifecycle to `group`.
    ///
    /// Subsequent allocations are charged to the group's budget and
    /// imports are refused.
    pub fn set_memory_group(&mut self, group: &MemoryGroup) -> Result<(), MemoryError> {
        if self.region.is_some() {
            return Err(MemoryError::AlreadyBound);
        }
        self.group = Some(group.clone());
        Ok(())
    }

    /// Widens padding; only allowed while no memory is bound.
    pub fn extend_padding(&mut self, padding: &Padding) -> Result<bool, TensorError> {
        self.info.extend_padding(padding)
    }

    /// Allocates an owned, zeroed region sized to the padded footprint.
    ///
    /// # Errors
    /// [`MemoryError::AlreadyBound`], [`MemoryError::OutOfMemory`] from the
    /// memory group budget, and any error of [`MemoryRegion::allocate`].
    pub fn allocate(&mut self) -> Result<(), MemoryError> {
        if self.region.is_some() {
            return Err(MemoryError::AlreadyBound);
        }
        let size = self.info.total_size();
        let alignment = self.alignment.unwrap_or(DEFAULT_ALLOC_ALIGNMENT);

        let lease = match &self.group {
            Some(group) => Some(group.reserve(size)?),
            None => None,
        };
        let region = MemoryRegion::allocate(size, alignment)?;

        tracing::debug!(
            shape = %self.info.shape(),
            size_bytes = size,
            alignment,
            group = self.group.as_ref().map(MemoryGroup::name),
            "tensor memory allocated"
        );
        self.region = Some(region);
        self.lease = lease;
        self.info.set_resizable(false);
        Ok(())
    }

    /// Binds caller-owned memory to the tensor.
    ///
    /// The pointer must be aligned to the configured alignment, or to the
    /// element size when none is configured.
    ///
    /// # Errors
    /// [`MemoryError::NullPointer`], [`MemoryError::Misaligned`],
    /// [`MemoryError::ManagedByGroup`] and [`MemoryError::AlreadyBound`].
    /// The tensor is untouched on error.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `info().total_size()`
    /// bytes until [`free`](Self::free) is called or the tensor is dropped,
    /// and must not be accessed by anything else in the meantime.
    pub unsafe fn import_memory(&mut self, ptr: *mut u8) -> Result<(), MemoryError> {
        let result = self.try_import(ptr);
        if let Err(err) = &result {
            tracing::warn!(address = ptr as usize, %err, "import rejected");
        }
        result
    }

    unsafe fn try_import(&mut self, ptr: *mut u8) -> Result<(), MemoryError> {
        if let Some(group) = &self.group {
            return Err(MemoryError::ManagedByGroup {
                group: group.name().to_string(),
            });
        }
        if self.region.is_some() {
            return Err(MemoryError::AlreadyBound);
        }
        let alignment = self
            .alignment
            .unwrap_or_else(|| self.info.dtype().alignment());
        let region = MemoryRegion::import(ptr, self.info.total_size(), alignment)?;

        tracing::debug!(
            address = ptr as usize,
            size_bytes = region.len(),
            "tensor memory imported"
        );
        self.region = Some(region);
        self.info.set_resizable(false);
        Ok(())
    }

    /// Releases the binding.
    ///
    /// Owned memory goes back to the system allocator and its bytes back to
    /// the memory group; imported memory is only forgotten. Calling `free`
    /// on an unbound tensor is a no-op.
    pub fn free(&mut self) {
        if let Some(region) = self.region.take() {
            tracing::debug!(ownership = ?region.ownership(), size_bytes = region.len(), "tensor memory released");
        }
        self.lease = None;
        self.info.set_resizable(true);
    }

    pub fn as_bytes(&self) -> Result<&[u8], MemoryError> {
        self.region
            .as_ref()
            .map(MemoryRegion::as_slice)
            .ok_or(MemoryError::NotBound)
    }

    pub fn as_bytes_mut(&mut self) -> Result<&mut [u8], MemoryError> {
        self.region
            .as_mut()
            .map(MemoryRegion::as_mut_slice)
            .ok_or(MemoryError::NotBound)
    }

    /// `f32` view starting at the first logical element.
    ///
    /// Index it with [`element_strides`](Self::element_strides); padding
    /// elements are part of the slice.
    pub fn element_view(&self) -> Result<&[f32], MemoryError> {
        self.check_f32()?;
        let offset = self.info.offset_first_element_in_bytes();
        let bytes = &self.as_bytes()?[offset..];
        // SAFETY: alignment was checked in `check_f32`; the offset and the
        // strides are multiples of 4 for f32 tensors.
        Ok(unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const f32, bytes.len() / 4) })
    }

    /// Mutable `f32` view starting at the first logical element.
    pub fn element_view_mut(&mut self) -> Result<&mut [f32], MemoryError> {
        self.check_f32()?;
        let offset = self.info.offset_first_element_in_bytes();
        let bytes = &mut self.as_bytes_mut()?[offset..];
        // SAFETY: see `element_view`.
        Ok(unsafe {
            std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut f32, bytes.len() / 4)
        })
    }

    /// Per-dimension strides in elements, padding included.
    pub fn element_strides(&self) -> Vec<usize> {
        self.info.strides_in_elements()
    }

    /// Visits every logical element in row-major order, skipping padding.
    pub fn for_each_element_mut<F>(&mut self, mut f: F) -> Result<(), MemoryError>
    where
        F: FnMut(&[usize], &mut f32),
    {
        let dims = self.info.shape().dims().to_vec();
        let strides = self.element_strides();
        let data = self.element_view_mut()?;
        if dims.iter().any(|&d| d == 0) {
            return Ok(());
        }

        let mut coords = vec![0usize; dims.len()];
        loop {
            let offset: usize = coords.iter().zip(&strides).map(|(c, s)| c * s).sum();
            f(&coords, &mut data[offset]);

            // Odometer increment, innermost dimension fastest.
            let mut dim = dims.len();
            loop {
                if dim == 0 {
                    return Ok(());
                }
                dim -= 1;
                coords[dim] += 1;
                if coords[dim] < dims[dim] {
                    break;
                }
                coords[dim] = 0;
            }
        }
    }

    /// Copies the logical elements into a dense row-major vector.
    pub fn to_dense_f32(&self) -> Result<Vec<f32>, MemoryError> {
        let dims = self.info.shape().dims();
        let strides = self.element_strides();
        let data = self.element_view()?;
        let dense = self.info.shape().dense_strides();

        let mut out = vec![0.0f32; self.info.shape().num_elements()];
        for (flat, slot) in out.iter_mut().enumerate() {
            let offset: usize = dense
                .iter()
                .zip(&strides)
                .zip(dims)
                .map(|((ds, s), d)| ((flat / ds) % d) * s)
                .sum();
            *slot = data[offset];
        }
        Ok(out)
    }

    fn check_f32(&self) -> Result<(), MemoryError> {
        if self.info.dtype() != DType::F32 {
            return Err(MemoryError::DTypeMismatch {
                expected: DType::F32,
                actual: self.info.dtype(),
            });
        }
        let ptr = self.buffer_ptr();
        if ptr.is_null() {
            return Err(MemoryError::NotBound);
        }
        if !crate::region::is_aligned(ptr, std::mem::align_of::<f32>()) {
            return Err(MemoryError::Misaligned {
                address: ptr as usize,
                alignment: std::mem::align_of::<f32>(),
            });
        }
        Ok(())
    }
}

impl Drop for TensorBuffer {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for TensorBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorBuffer")
            .field("shape", self.info.shape())
            .field("dtype", &self.info.dtype())
            .field("resizable", &self.info.is_resizable())
            .field("ownership", &self.ownership())
            .field("alignment", &self.alignment)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBudget;
    use proptest::prelude::*;
    use tensor_core::Shape;

    fn info() -> TensorInfo {
        TensorInfo::new(Shape::hwc(16, 24, 3), DType::F32)
    }

    /// Heap memory large enough for `info()` with room to slide the base.
    fn backing() -> Vec<u64> {
        vec![0u64; info().total_size() / 8 + 512]
    }

    #[test]
    fn test_import_null_leaves_tensor_untouched() {
        let mut t = TensorBuffer::new(info());
        let result = unsafe { t.import_memory(std::ptr::null_mut()) };
        assert!(matches!(result, Err(MemoryError::NullPointer)));
        assert!(t.is_resizable());
        assert!(t.buffer_ptr().is_null());
    }

    #[test]
    fn test_import_misaligned_leaves_tensor_untouched() {
        let mut data = backing();
        let ptr = data.as_mut_ptr() as *mut u8;
        let mut alignment = 339;
        while crate::region::is_aligned(ptr, alignment) {
            alignment += 1;
        }
        let mut t = TensorBuffer::with_alignment(info(), alignment);
        let result = unsafe { t.import_memory(ptr) };
        assert!(matches!(result, Err(MemoryError::Misaligned { .. })));
        assert!(t.is_resizable());
        assert!(t.buffer_ptr().is_null());
    }

    #[test]
    fn test_import_into_managed_tensor_fails() {
        let mut data = backing();
        let group = MemoryGroup::new("mg", MemoryBudget::from_mb(1));
        let mut t = TensorBuffer::new(info());
        t.set_memory_group(&group).unwrap();
        let result = unsafe { t.import_memory(data.as_mut_ptr() as *mut u8) };
        assert!(matches!(result, Err(MemoryError::ManagedByGroup { .. })));
        assert!(t.is_resizable());
        assert_eq!(group.reserved_bytes(), 0);
    }

    #[test]
    fn test_import_free_roundtrip() {
        let mut data = backing();
        let ptr = data.as_mut_ptr() as *mut u8;
        let mut t = TensorBuffer::new(info());
        unsafe { t.import_memory(ptr) }.unwrap();
        assert!(!t.is_resizable());
        assert_eq!(t.buffer_ptr(), ptr as *const u8);
        assert_eq!(t.ownership(), Some(Ownership::Imported));

        t.free();
        assert!(t.is_resizable());
        assert!(t.buffer_ptr().is_null());
        assert_eq!(t.ownership(), None);
        // The caller's memory is still alive and writable.
        data[0] = 1;
    }

    #[test]
    fn test_double_bind_rejected() {
        let mut data = backing();
        let mut t = TensorBuffer::new(info());
        t.allocate().unwrap();
        let before = t.buffer_ptr();
        assert!(matches!(t.allocate(), Err(MemoryError::AlreadyBound)));
        let result = unsafe { t.import_memory(data.as_mut_ptr() as *mut u8) };
        assert!(matches!(result, Err(MemoryError::AlreadyBound)));
        assert_eq!(t.buffer_ptr(), before);
    }

    #[test]
    fn test_allocate_free_roundtrip() {
        let mut t = TensorBuffer::with_alignment(info(), 1024);
        t.allocate().unwrap();
        assert!(!t.is_resizable());
        assert_eq!(t.ownership(), Some(Ownership::Owned));
        assert_eq!(t.buffer_ptr() as usize % 1024, 0);
        assert_eq!(t.as_bytes().unwrap().len(), info().total_size());

        t.free();
        assert!(t.is_resizable());
        assert!(t.buffer_ptr().is_null());
        assert!(matches!(t.as_bytes(), Err(MemoryError::NotBound)));
    }

    #[test]
    fn test_allocate_invalid_alignment_keeps_state() {
        let mut t = TensorBuffer::with_alignment(info(), 339);
        assert!(matches!(
            t.allocate(),
            Err(MemoryError::InvalidAlignment { alignment: 339 })
        ));
        assert!(t.is_resizable());
    }

    #[test]
    fn test_group_budget_charged_and_returned() {
        let group = MemoryGroup::new("mg", MemoryBudget::from_bytes(info().total_size()));
        let mut a = TensorBuffer::new(info());
        let mut b = TensorBuffer::new(info());
        a.set_memory_group(&group).unwrap();
        b.set_memory_group(&group).unwrap();

        a.allocate().unwrap();
        assert_eq!(group.reserved_bytes(), info().total_size());
        assert!(matches!(b.allocate(), Err(MemoryError::OutOfMemory { .. })));
        assert!(b.is_resizable());

        a.free();
        assert_eq!(group.reserved_bytes(), 0);
        b.allocate().unwrap();
        drop(b);
        assert_eq!(group.reserved_bytes(), 0);
    }

    #[test]
    fn test_padding_locked_while_bound() {
        let mut t = TensorBuffer::new(info());
        assert!(t.extend_padding(&Padding::spatial(1, 1, 1, 1)).unwrap());
        t.allocate().unwrap();
        assert!(matches!(
            t.extend_padding(&Padding::spatial(2, 2, 2, 2)),
            Err(TensorError::NotResizable { .. })
        ));
        t.free();
        assert!(t.extend_padding(&Padding::spatial(2, 2, 2, 2)).unwrap());
    }

    #[test]
    fn test_padded_view_skips_margins() {
        let shape = Shape::hwc(2, 3, 2);
        let mut t = TensorBuffer::new(TensorInfo::new(shape.clone(), DType::F32));
        t.extend_padding(&Padding::spatial(1, 2, 1, 1)).unwrap();
        t.allocate().unwrap();

        let mut next = 0.0;
        t.for_each_element_mut(|_, v| {
            next += 1.0;
            *v = next;
        })
        .unwrap();

        let dense = t.to_dense_f32().unwrap();
        let expected: Vec<f32> = (1..=shape.num_elements()).map(|v| v as f32).collect();
        assert_eq!(dense, expected);

        // Exactly the logical elements were written; every margin is zero.
        let written = t
            .as_bytes()
            .unwrap()
            .chunks_exact(4)
            .filter(|c| c.iter().any(|&b| b != 0))
            .count();
        assert_eq!(written, shape.num_elements());
    }

    #[test]
    fn test_typed_view_requires_f32() {
        let mut t = TensorBuffer::new(TensorInfo::new(Shape::vector(8), DType::I8));
        t.allocate().unwrap();
        assert!(matches!(t.element_view(), Err(MemoryError::DTypeMismatch { .. })));
    }

    proptest! {
        #[test]
        fn prop_failed_import_never_mutates(offset in 1usize..64, alignment in 2usize..512) {
            let mut data = backing();
            let ptr = unsafe { (data.as_mut_ptr() as *mut u8).add(offset) };
            prop_assume!(!crate::region::is_aligned(ptr, alignment));

            let mut t = TensorBuffer::with_alignment(info(), alignment);
            let import_result = unsafe { t.import_memory(ptr) };
            prop_assert!(import_result.is_err());
            prop_assert!(t.is_resizable());
            prop_assert!(t.buffer_ptr().is_null());
        }
    }
}
