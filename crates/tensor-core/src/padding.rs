// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-dimension padding margins.

use crate::TensorError;

/// `(low, high)` element margins around each logical extent.
///
/// Dimensions are indexed like [`crate::Shape`] (outermost first). A
/// padding descriptor may cover fewer dimensions than the tensor; missing
/// entries are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Padding {
    margins: Vec<(usize, usize)>,
}

impl Padding {
    /// No padding on any dimension.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(margins: Vec<(usize, usize)>) -> Self {
        Self { margins }
    }

    /// Spatial padding for an NHWC `[H, W, C]` tensor, in the
    /// top/right/bottom/left order used by 2-D padding descriptors.
    /// Channels are never padded.
    pub fn spatial(top: usize, right: usize, bottom: usize, left: usize) -> Self {
        Self {
            margins: vec![(top, bottom), (left, right), (0, 0)],
        }
    }

    /// Margins of dimension `dim`; zero when not described.
    pub fn margins(&self, dim: usize) -> (usize, usize) {
        self.margins.get(dim).copied().unwrap_or((0, 0))
    }

    pub fn low(&self, dim: usize) -> usize {
        self.margins(dim).0
    }

    pub fn high(&self, dim: usize) -> usize {
        self.margins(dim).1
    }

    /// Number of dimensions this descriptor names.
    pub fn rank(&self) -> usize {
        self.margins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.margins.iter().all(|&(lo, hi)| lo == 0 && hi == 0)
    }

    /// Widens every margin to the maximum of `self` and `other`.
    ///
    /// Returns `true` if any margin grew. Margins never shrink.
    pub fn extend(&mut self, other: &Padding) -> bool {
        if other.rank() > self.rank() {
            self.margins.resize(other.rank(), (0, 0));
        }
        let mut changed = false;
        for (dim, slot) in self.margins.iter_mut().enumerate() {
            let (lo, hi) = other.margins(dim);
            if lo > slot.0 {
                slot.0 = lo;
                changed = true;
            }
            if hi > slot.1 {
                slot.1 = hi;
                changed = true;
            }
        }
        changed
    }

    pub(crate) fn check_rank(&self, tensor_rank: usize) -> Result<(), TensorError> {
        if self.rank() > tensor_rank {
            return Err(TensorError::PaddingRank {
                padding_rank: self.rank(),
                tensor_rank,
            });
        }
        Ok(())
    }
}
