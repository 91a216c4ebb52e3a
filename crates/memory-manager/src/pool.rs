// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Budget-enforced pool of `f32` buffers.
//!
//! The [`MemoryPool`]:
//!
//! 1. Enforces a hard ceiling on live bytes; allocations that would exceed
//!    it return `Err(OutOfMemory)`.
//! 2. Keeps returned buffers in a free list binned by size class, so the
//!    per-traversal acquire/release cycle stops hitting the heap after the
//!    first traversal.
//! 3. Tracks [`AllocationStats`].
//!
//! Cloning a pool is cheap and shares the same state, which lets several
//! execution contexts draw from one budget.

use crate::{AllocationStats, BufferGuard, MemoryBudget, MemoryError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Minimum size class in elements. Smaller requests share this bin.
const MIN_SIZE_CLASS: usize = 1024;

/// State shared between the pool and its outstanding guards.
pub(crate) struct PoolInner {
    budget: MemoryBudget,
    live_bytes: AtomicUsize,
    /// size class (elements) → returned buffers.
    free_buffers: Mutex<HashMap<usize, Vec<Vec<f32>>>>,
    stats: Mutex<AllocationStats>,
}

impl PoolInner {
    /// Called by `BufferGuard::drop`.
    pub(crate) fn return_buffer(&self, buffer: Vec<f32>) {
        self.live_bytes
            .fetch_sub(buffer.len() * F32_BYTES, Ordering::AcqRel);
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_release();
        }
        if let Ok(mut free) = self.free_buffers.lock() {
            free.entry(size_class_for(buffer.len()))
                .or_default()
                .push(buffer);
        }
    }
}

/// The allocator behind every backend buffer.
///
/// # Example
/// ```
/// use memory_manager::{MemoryBudget, MemoryPool};
///
/// let pool = MemoryPool::new(MemoryBudget::from_mb(1));
/// let guard = pool.allocate(256).unwrap();
/// assert_eq!(pool.allocated_bytes(), 1024);
/// drop(guard);
/// assert_eq!(pool.allocated_bytes(), 0);
/// ```
#[derive(Clone)]
pub struct MemoryPool {
    inner: Arc<PoolInner>,
}

impl MemoryPool {
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                budget,
                live_bytes: AtomicUsize::new(0),
                free_buffers: Mutex::new(HashMap::new()),
                stats: Mutex::new(AllocationStats::default()),
            }),
        }
    }

    /// A pool with no budget ceiling.
    pub fn unbounded() -> Self {
        Self::new(MemoryBudget::unlimited())
    }

    /// Allocates a zero-filled buffer of `len` elements.
    pub fn allocate(&self, len: usize) -> Result<BufferGuard, MemoryError> {
        if len == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }
        let bytes = len.saturating_mul(F32_BYTES);
        let budget = self.inner.budget.as_bytes();

        // Reserve first so concurrent allocations cannot overshoot together.
        let reserved = self
            .inner
            .live_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                live.checked_add(bytes).filter(|&total| total <= budget)
            });
        let live = match reserved {
            Ok(previous) => previous + bytes,
            Err(current) => {
                if let Ok(mut stats) = self.inner.stats.lock() {
                    stats.record_rejection();
                }
                return Err(MemoryError::OutOfMemory {
                    requested_bytes: bytes,
                    available_bytes: budget.saturating_sub(current),
                    budget_bytes: budget,
                });
            }
        };

        let recycled = self
            .inner
            .free_buffers
            .lock()
            .ok()
            .and_then(|mut free| free.get_mut(&size_class_for(len))?.pop());
        let reused = recycled.is_some();
        let data = match recycled {
            Some(mut buf) => {
                buf.clear();
                buf.resize(len, 0.0);
                buf
            }
            None => vec![0.0f32; len],
        };

        if let Ok(mut stats) = self.inner.stats.lock() {
            stats.record_acquire(bytes, reused);
            stats.update_peak(live);
        }
        Ok(BufferGuard::new(data, Arc::clone(&self.inner)))
    }

    /// Bytes currently handed out.
    pub fn allocated_bytes(&self) -> usize {
        self.inner.live_bytes.load(Ordering::Acquire)
    }

    /// Bytes remaining before hitting the budget.
    pub fn available_bytes(&self) -> usize {
        self.inner
            .budget
            .as_bytes()
            .saturating_sub(self.allocated_bytes())
    }

    pub fn budget(&self) -> MemoryBudget {
        self.inner.budget
    }

    /// Returns a snapshot of allocation statistics.
    pub fn stats(&self) -> AllocationStats {
        self.inner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Bytes held in the free list.
    pub fn free_list_bytes(&self) -> usize {
        self.inner
            .free_buffers
            .lock()
            .map(|free| {
                free.values()
                    .flatten()
                    .map(|b| b.capacity() * F32_BYTES)
                    .sum()
            })
            .unwrap_or(0)
    }
}

/// Smallest power of two that is ≥ `len` and ≥ `MIN_SIZE_CLASS`.
fn size_class_for(len: usize) -> usize {
    len.max(MIN_SIZE_CLASS).next_power_of_two()
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("budget", &self.inner.budget)
            .field("allocated_bytes", &self.allocated_bytes())
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
