// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII reservation that returns bytes to a memory group on drop.

use crate::group::GroupInner;
use std::sync::Arc;

/// A reservation of bytes against a [`crate::MemoryGroup`] budget.
///
/// A `TensorBuffer` holds its lease for as long as its owned region lives;
/// dropping the lease hands the bytes back to the group.
pub struct GroupLease {
    group: Arc<GroupInner>,
    size_bytes: usize,
}

impl GroupLease {
    pub(crate) fn new(group: Arc<GroupInner>, size_bytes: usize) -> Self {
        Self { group, size_bytes }
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

impl Drop for GroupLease {
    fn drop(&mut self) {
        self.group.release(self.size_bytes);
    }
}

impl std::fmt::Debug for GroupLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupLease")
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}
