// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors and dimension utilities.

use std::fmt;

/// Ordered logical extents of a tensor, outermost dimension first.
///
/// Shapes never include padding; padded extents are computed by
/// [`crate::TensorInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![5, 5, 3]);
    /// assert_eq!(s.rank(), 3);
    /// assert_eq!(s.num_elements(), 75);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Creates a 1-D shape.
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    /// Creates a 2-D shape (`rows × cols`).
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    /// Creates an NHWC image shape without the batch dimension.
    pub fn hwc(height: usize, width: usize, channels: usize) -> Self {
        Self {
            dims: vec![height, width, channels],
        }
    }

    /// Returns the number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total number of elements. A rank-0 shape holds one.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns the dimensions as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Computes the dense byte footprint for a given [`crate::DType`].
    pub fn size_bytes(&self, dtype: crate::DType) -> usize {
        self.num_elements() * dtype.size_bytes()
    }

    /// Row-major element strides of the dense (unpadded) layout.
    pub fn dense_strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.rank()];
        for i in (0..self.rank().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Returns `true` if `self` is `[M, K]` and `other` is `[K, N]`.
    pub fn is_matmul_compatible(&self, other: &Shape) -> bool {
        self.rank() == 2 && other.rank() == 2 && self.dims[1] == other.dims[0]
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DType;

    #[test]
    fn test_matrix_shape() {
        let s = Shape::matrix(3, 4);
        assert_eq!(s.rank(), 2);
        assert_eq!(s.num_elements(), 12);
        assert_eq!(s.dense_strides(), vec![4, 1]);
        assert_eq!(s.size_bytes(DType::F32), 48);
    }

    #[test]
    fn test_hwc_strides() {
        let s = Shape::hwc(16, 24, 3);
        assert_eq!(s.dense_strides(), vec![72, 3, 1]);
    }

    #[test]
    fn test_scalar() {
        let s = Shape::new(vec![]);
        assert_eq!(s.num_elements(), 1);
        assert!(s.dense_strides().is_empty());
    }

    #[test]
    fn test_matmul_compatible() {
        assert!(Shape::matrix(3, 4).is_matmul_compatible(&Shape::matrix(4, 5)));
        assert!(!Shape::matrix(3, 4).is_matmul_compatible(&Shape::matrix(5, 5)));
        assert!(!Shape::vector(4).is_matmul_compatible(&Shape::matrix(4, 5)));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Shape::hwc(2, 3, 4)), "[2, 3, 4]");
    }
}
