// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Best-effort cache prefetch hints.
//!
//! Hints never change results; an implementation may ignore them.

/// Announces data a kernel is about to read.
pub trait PrefetchHint: Send + Sync {
    fn name(&self) -> &str;

    /// Requests that the start of `data` be brought into cache.
    fn prefetch(&self, data: &[f32]);
}

/// Ignores every hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrefetch;

impl PrefetchHint for NoPrefetch {
    fn name(&self) -> &str {
        "none"
    }

    #[inline]
    fn prefetch(&self, _data: &[f32]) {}
}

/// Issues a hardware prefetch where the target has one.
#[derive(Debug, Clone, Copy, Default)]
pub struct CachePrefetch;

impl PrefetchHint for CachePrefetch {
    fn name(&self) -> &str {
        "cache"
    }

    #[inline]
    fn prefetch(&self, data: &[f32]) {
        if data.is_empty() {
            return;
        }
        #[cfg(target_arch = "x86_64")]
        {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            // SAFETY: prefetch never faults, and the pointer comes from a
            // live slice. SSE is part of the x86_64 baseline.
            #[allow(unused_unsafe)]
            unsafe {
                _mm_prefetch::<_MM_HINT_T0>(data.as_ptr() as *const i8);
            }
        }
    }
}

/// Returns the hint implementation for a config switch.
pub fn prefetcher(enabled: bool) -> &'static dyn PrefetchHint {
    if enabled {
        &CachePrefetch
    } else {
        &NoPrefetch
    }
}
