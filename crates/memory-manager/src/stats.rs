// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory group statistics.

/// Cumulative statistics about a [`crate::MemoryGroup`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Reservations granted to tensors.
    pub reservations: u64,
    /// Reservations handed back when tensors freed their memory.
    pub releases: u64,
    /// Reservation requests rejected because the budget was exhausted.
    pub oom_count: u64,
    /// High-water mark of reserved bytes.
    pub peak_reserved_bytes: usize,
    /// Total bytes ever reserved, including released ones.
    pub cumulative_reserved_bytes: u64,
}

impl AllocationStats {
    pub(crate) fn record_reservation(&mut self, size: usize, reserved_now: usize) {
        self.reservations += 1;
        self.cumulative_reserved_bytes += size as u64;
        self.peak_reserved_bytes = self.peak_reserved_bytes.max(reserved_now);
    }

    pub(crate) fn record_release(&mut self) {
        self.releases += 1;
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    /// Number of reservations that are still outstanding.
    pub fn live_reservations(&self) -> u64 {
        self.reservations.saturating_sub(self.releases)
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let peak_mb = self.peak_reserved_bytes as f64 / (1024.0 * 1024.0);
        format!(
            "Reservations: {} granted, {} released, {} live, {} OOMs, peak {:.2} MB",
            self.reservations,
            self.releases,
            self.live_reservations(),
            self.oom_count,
            peak_mb,
        )
    }
}
