// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation statistics for profiling and leak checks.

/// Cumulative counters of a [`MemoryPool`](crate::MemoryPool).
///
/// `acquisitions - releases` is the number of live buffers; a scope that
/// closed cleanly leaves it where it was when the scope opened.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Successful allocations.
    pub acquisitions: u64,
    /// Allocations served from the free list.
    pub reused: u64,
    /// Allocations that required fresh memory.
    pub fresh: u64,
    /// Requests rejected by the budget.
    pub rejected: u64,
    /// Buffers returned to the pool.
    pub releases: u64,
    /// High-water mark of live bytes.
    pub peak_bytes: usize,
    /// Total bytes ever handed out.
    pub cumulative_bytes: u64,
}

impl AllocationStats {
    /// Fraction of allocations served from the free list, `0.0` when idle.
    pub fn reuse_ratio(&self) -> f64 {
        if self.acquisitions == 0 {
            return 0.0;
        }
        self.reused as f64 / self.acquisitions as f64
    }

    /// Buffers handed out and not yet returned.
    pub fn live_buffers(&self) -> u64 {
        self.acquisitions.saturating_sub(self.releases)
    }

    pub(crate) fn record_acquire(&mut self, bytes: usize, reused: bool) {
        self.acquisitions += 1;
        if reused {
            self.reused += 1;
        } else {
            self.fresh += 1;
        }
        self.cumulative_bytes += bytes as u64;
    }

    pub(crate) fn record_rejection(&mut self) {
        self.rejected += 1;
    }

    pub(crate) fn record_release(&mut self) {
        self.releases += 1;
    }

    pub(crate) fn update_peak(&mut self, live_bytes: usize) {
        self.peak_bytes = self.peak_bytes.max(live_bytes);
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} acquired ({} reused, {:.0}% reuse), {} released, {} rejected, peak {:.2} MB",
            self.acquisitions,
            self.reused,
            self.reuse_ratio() * 100.0,
            self.releases,
            self.rejected,
            self.peak_bytes as f64 / (1024.0 * 1024.0),
        )
    }
}
