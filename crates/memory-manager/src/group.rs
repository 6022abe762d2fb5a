// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory groups: an external lifecycle manager for tensor memory.
//!
//! A tensor associated with a [`MemoryGroup`] has its memory accounted by
//! the group. Every owned allocation takes a [`GroupLease`] against the
//! group's [`MemoryBudget`]; freeing the tensor drops the lease and returns
//! the bytes. Because the group manages the tensor's lifecycle, such a
//! tensor refuses externally imported memory.
//!
//! # Thread Safety
//! `MemoryGroup` is a cheap `Clone` handle over shared state and is
//! `Send + Sync`; reservations use an atomic compare-and-swap so concurrent
//! tensors can never overshoot the budget.

use crate::{AllocationStats, GroupLease, MemoryBudget, MemoryError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared group state, held by the group handles and by every lease.
pub(crate) struct GroupInner {
    name: String,
    budget: MemoryBudget,
    reserved_bytes: AtomicUsize,
    stats: Mutex<AllocationStats>,
}

impl GroupInner {
    /// Called by `GroupLease::drop` to hand bytes back.
    pub(crate) fn release(&self, size_bytes: usize) {
        self.reserved_bytes.fetch_sub(size_bytes, Ordering::AcqRel);
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_release();
        }
    }
}

/// A named, budgeted owner of tensor memory.
///
/// # Example
/// ```
/// use memory_manager::{MemoryBudget, MemoryGroup};
///
/// let group = MemoryGroup::new("activations", MemoryBudget::from_kb(64));
/// let lease = group.reserve(16 * 1024).unwrap();
/// assert_eq!(group.reserved_bytes(), 16 * 1024);
/// drop(lease);
/// assert_eq!(group.reserved_bytes(), 0);
/// ```
#[derive(Clone)]
pub struct MemoryGroup {
    inner: Arc<GroupInner>,
}

impl MemoryGroup {
    pub fn new(name: impl Into<String>, budget: MemoryBudget) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                name: name.into(),
                budget,
                reserved_bytes: AtomicUsize::new(0),
                stats: Mutex::new(AllocationStats::default()),
            }),
        }
    }

    /// Reserves `size_bytes` against the budget.
    ///
    /// The returned lease hands the bytes back when dropped.
    pub fn reserve(&self, size_bytes: usize) -> Result<GroupLease, MemoryError> {
        if size_bytes == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }
        let budget = self.inner.budget.as_bytes();

        let reserved = self
            .inner
            .reserved_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current
                    .checked_add(size_bytes)
                    .filter(|&total| total <= budget)
            });

        match reserved {
            Ok(previous) => {
                if let Ok(mut stats) = self.inner.stats.lock() {
                    stats.record_reservation(size_bytes, previous + size_bytes);
                }
                Ok(GroupLease::new(Arc::clone(&self.inner), size_bytes))
            }
            Err(current) => {
                if let Ok(mut stats) = self.inner.stats.lock() {
                    stats.record_oom();
                }
                tracing::warn!(
                    group = %self.inner.name,
                    requested = size_bytes,
                    reserved = current,
                    "memory group budget exhausted"
                );
                Err(MemoryError::OutOfMemory {
                    requested_bytes: size_bytes,
                    available_bytes: budget.saturating_sub(current),
                    budget_bytes: budget,
                })
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn budget(&self) -> MemoryBudget {
        self.inner.budget
    }

    /// Bytes currently reserved by live leases.
    pub fn reserved_bytes(&self) -> usize {
        self.inner.reserved_bytes.load(Ordering::Acquire)
    }

    pub fn available_bytes(&self) -> usize {
        self.inner
            .budget
            .as_bytes()
            .saturating_sub(self.reserved_bytes())
    }

    /// Returns a snapshot of the group's statistics.
    pub fn stats(&self) -> AllocationStats {
        self.inner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for MemoryGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGroup")
            .field("name", &self.inner.name)
            .field("budget", &self.inner.budget)
            .field("reserved_bytes", &self.reserved_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_release() {
        let group = MemoryGroup::new("g", MemoryBudget::from_kb(1));
        let lease = group.reserve(512).unwrap();
        assert_eq!(lease.size_bytes(), 512);
        assert_eq!(group.available_bytes(), 512);
        drop(lease);
        assert_eq!(group.reserved_bytes(), 0);
    }

    #[test]
    fn test_budget_exhausted() {
        let group = MemoryGroup::new("g", MemoryBudget::from_bytes(1024));
        let _a = group.reserve(600).unwrap();
        let result = group.reserve(600);
        assert!(matches!(
            result,
            Err(MemoryError::OutOfMemory {
                requested_bytes: 600,
                available_bytes: 424,
                budget_bytes: 1024
            })
        ));
        assert_eq!(group.reserved_bytes(), 600);
        assert_eq!(group.stats().oom_count, 1);
    }

    #[test]
    fn test_zero_reservation() {
        let group = MemoryGroup::new("g", MemoryBudget::from_kb(1));
        assert!(matches!(group.reserve(0), Err(MemoryError::ZeroSizedAllocation)));
    }

    #[test]
    fn test_stats_peak() {
        let group = MemoryGroup::new("g", MemoryBudget::from_kb(8));
        let a = group.reserve(1000).unwrap();
        let b = group.reserve(2000).unwrap();
        drop(a);
        drop(b);
        let stats = group.stats();
        assert_eq!(stats.peak_reserved_bytes, 3000);
        assert_eq!(stats.releases, 2);
        assert_eq!(stats.live_reservations(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let group = MemoryGroup::new("g", MemoryBudget::from_kb(8));
        let other = group.clone();
        let lease = other.reserve(100).unwrap();
        assert_eq!(group.reserved_bytes(), 100);
        drop(lease);
        assert_eq!(group.reserved_bytes(), 0);
    }

    #[test]
    fn test_concurrent_reservations_respect_budget() {
        let group = MemoryGroup::new("g", MemoryBudget::from_bytes(100 * 64));
        let leases: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let g = group.clone();
                    s.spawn(move || (0..40).filter_map(|_| g.reserve(64).ok()).collect::<Vec<_>>())
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(leases.len(), 100);
        assert_eq!(group.reserved_bytes(), 100 * 64);
    }

    #[test]
    fn test_debug_format() {
        let group = MemoryGroup::new("weights", MemoryBudget::from_mb(64));
        let debug = format!("{group:?}");
        assert!(debug.contains("MemoryGroup"));
        assert!(debug.contains("weights"));
    }
}
