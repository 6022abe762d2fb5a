// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor metadata: logical shape, padding and byte strides.

use crate::{DType, Padding, Shape, TensorError};

/// Describes how a tensor's elements are laid out in its buffer.
///
/// `TensorInfo` carries no memory itself. The `resizable` flag mirrors
/// whether a buffer is currently bound: metadata that changes the byte
/// footprint (padding) may only be edited while it is `true`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TensorInfo {
    shape: Shape,
    dtype: DType,
    padding: Padding,
    strides: Vec<usize>,
    resizable: bool,
}

impl TensorInfo {
    /// Creates dense, unpadded metadata.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{DType, Shape, TensorInfo};
    /// let info = TensorInfo::new(Shape::hwc(16, 24, 3), DType::F32);
    /// assert_eq!(info.strides_in_bytes(), &[288, 12, 4]);
    /// assert_eq!(info.total_size(), 16 * 24 * 3 * 4);
    /// assert!(info.is_resizable());
    /// ```
    pub fn new(shape: Shape, dtype: DType) -> Self {
        let padding = Padding::none();
        let strides = compute_strides(&shape, dtype, &padding);
        Self {
            shape,
            dtype,
            padding,
            strides,
            resizable: true,
        }
    }

    /// Creates metadata with initial padding.
    pub fn with_padding(shape: Shape, dtype: DType, padding: Padding) -> Result<Self, TensorError> {
        let mut info = Self::new(shape, dtype);
        info.extend_padding(&padding)?;
        Ok(info)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn padding(&self) -> &Padding {
        &self.padding
    }

    pub fn element_size(&self) -> usize {
        self.dtype.size_bytes()
    }

    /// Per-dimension byte strides, outermost first.
    pub fn strides_in_bytes(&self) -> &[usize] {
        &self.strides
    }

    /// Per-dimension strides in elements.
    pub fn strides_in_elements(&self) -> Vec<usize> {
        let size = self.element_size();
        self.strides.iter().map(|s| s / size).collect()
    }

    /// Extent of `dim` including its low and high margins.
    pub fn padded_extent(&self, dim: usize) -> usize {
        let (lo, hi) = self.padding.margins(dim);
        self.shape.dims()[dim] + lo + hi
    }

    /// Byte offset of the first logical element.
    pub fn offset_first_element_in_bytes(&self) -> usize {
        (0..self.shape.rank())
            .map(|d| self.padding.low(d) * self.strides[d])
            .sum()
    }

    /// Total buffer footprint in bytes, padding included.
    pub fn total_size(&self) -> usize {
        match self.shape.rank() {
            0 => self.element_size(),
            _ => self.strides[0] * self.padded_extent(0),
        }
    }

    pub fn is_resizable(&self) -> bool {
        self.resizable
    }

    /// Marks the metadata as bound (`false`) or unbound (`true`).
    ///
    /// Called by the memory manager when a buffer is bound or released.
    pub fn set_resizable(&mut self, resizable: bool) {
        self.resizable = resizable;
    }

    /// Widens the padding margins and recomputes strides.
    ///
    /// Margins only ever grow: each one becomes the maximum of the current
    /// and requested value. Returns whether any margin changed.
    ///
    /// # Errors
    /// [`TensorError::NotResizable`] when memory is bound, and
    /// [`TensorError::PaddingRank`] when `padding` names more dimensions
    /// than the tensor has. Metadata is unchanged on error.
    pub fn extend_padding(&mut self, padding: &Padding) -> Result<bool, TensorError> {
        if !self.resizable {
            return Err(TensorError::NotResizable {
                op: "extend_padding",
            });
        }
        padding.check_rank(self.shape.rank())?;

        let changed = self.padding.extend(padding);
        if changed {
            self.strides = compute_strides(&self.shape, self.dtype, &self.padding);
        }
        Ok(changed)
    }
}

fn compute_strides(shape: &Shape, dtype: DType, padding: &Padding) -> Vec<usize> {
    let rank = shape.rank();
    let mut strides = vec![dtype.size_bytes(); rank];
    for d in (0..rank.saturating_sub(1)).rev() {
        let (lo, hi) = padding.margins(d + 1);
        strides[d] = strides[d + 1] * (shape.dims()[d + 1] + lo + hi);
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dense_layout() {
        let info = TensorInfo::new(Shape::matrix(4, 6), DType::F32);
        assert_eq!(info.strides_in_bytes(), &[24, 4]);
        assert_eq!(info.strides_in_elements(), vec![6, 1]);
        assert_eq!(info.total_size(), 96);
        assert_eq!(info.offset_first_element_in_bytes(), 0);
    }

    #[test]
    fn test_spatial_padding_layout() {
        // [H=16, W=24, C=3], top 3, right 5, bottom 2, left 4.
        let mut info = TensorInfo::new(Shape::hwc(16, 24, 3), DType::F32);
        assert!(info.extend_padding(&Padding::spatial(3, 5, 2, 4)).unwrap());

        assert_eq!(info.padded_extent(0), 21);
        assert_eq!(info.padded_extent(1), 33);
        assert_eq!(info.strides_in_bytes(), &[33 * 3 * 4, 12, 4]);
        assert_eq!(info.total_size(), 21 * 33 * 3 * 4);
        assert_eq!(info.offset_first_element_in_bytes(), 3 * 396 + 4 * 12);
    }

    #[test]
    fn test_extend_padding_requires_resizable() {
        let mut info = TensorInfo::new(Shape::matrix(2, 2), DType::F32);
        info.set_resizable(false);
        let before = info.clone();
        let result = info.extend_padding(&Padding::new(vec![(1, 1)]));
        assert!(matches!(result, Err(TensorError::NotResizable { .. })));
        assert_eq!(info, before);
    }

    #[test]
    fn test_extend_padding_rank_check() {
        let mut info = TensorInfo::new(Shape::vector(8), DType::F32);
        let result = info.extend_padding(&Padding::new(vec![(1, 1), (1, 1)]));
        assert!(matches!(result, Err(TensorError::PaddingRank { .. })));
        assert!(info.padding().is_empty());
    }

    #[test]
    fn test_unchanged_padding_keeps_strides() {
        let mut info = TensorInfo::with_padding(
            Shape::matrix(4, 4),
            DType::F32,
            Padding::new(vec![(1, 1), (2, 2)]),
        )
        .unwrap();
        let strides = info.strides_in_bytes().to_vec();
        assert!(!info.extend_padding(&Padding::new(vec![(0, 1), (1, 0)])).unwrap());
        assert_eq!(info.strides_in_bytes(), &strides[..]);
    }

    fn arb_padding(rank: usize) -> impl Strategy<Value = Padding> {
        proptest::collection::vec((0usize..6, 0usize..6), 0..=rank).prop_map(Padding::new)
    }

    proptest! {
        #[test]
        fn prop_padding_monotonic_and_strides_cover_extents(
            dims in proptest::collection::vec(1usize..9, 1..4),
            first in arb_padding(3),
            second in arb_padding(3),
        ) {
            let rank = dims.len();
            let clip = |p: &Padding| Padding::new((0..p.rank().min(rank)).map(|d| p.margins(d)).collect());
            let mut info = TensorInfo::new(Shape::new(dims.clone()), DType::F32);
            info.extend_padding(&clip(&first)).unwrap();
            let before = info.padding().clone();
            info.extend_padding(&clip(&second)).unwrap();
            for d in 0..rank {
                prop_assert!(info.padding().low(d) >= before.low(d));
                prop_assert!(info.padding().high(d) >= before.high(d));
            }
            let strides = info.strides_in_bytes();
            for d in 0..rank - 1 {
                prop_assert!(strides[d] >= info.padded_extent(d + 1) * strides[d + 1]);
                prop_assert!(strides[d] >= dims[d + 1] * strides[d + 1]);
            }
            prop_assert!(info.total_size() >= Shape::new(dims).size_bytes(DType::F32));
        }
    }
}
