// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scope-lifetime resource registry.
//!
//! A [`ResourceScope`] hands out [`ScopedBuffer`]s that borrow the scope, so
//! the borrow checker guarantees none of them outlives it. Combined with
//! [`with_resource_scope`], whose closure result cannot mention the scope
//! lifetime, every buffer acquired inside the closure is back in the pool
//! when it returns: on success, on `Err`, and during unwinding.
//!
//! ```
//! use memory_manager::{with_resource_scope, MemoryPool};
//!
//! let pool = MemoryPool::unbounded();
//! let sum: Result<f32, memory_manager::MemoryError> =
//!     with_resource_scope(&pool, "example", |scope| {
//!         let mut buf = scope.acquire(4)?;
//!         buf.fill(1.5);
//!         Ok(buf.iter().sum())
//!     });
//! assert_eq!(sum.unwrap(), 6.0);
//! assert_eq!(pool.allocated_bytes(), 0);
//! ```

use crate::{BufferGuard, MemoryError, MemoryPool};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters describing a scope's activity so far.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScopeReport {
    pub label: String,
    pub acquired: usize,
    pub released: usize,
    pub live_bytes: usize,
    pub peak_bytes: usize,
}

impl ScopeReport {
    pub fn live_buffers(&self) -> usize {
        self.acquired - self.released
    }
}

/// Registry of the buffers acquired within one scope.
pub struct ResourceScope {
    label: String,
    pool: MemoryPool,
    acquired: AtomicUsize,
    released: AtomicUsize,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
}

impl ResourceScope {
    /// Opens a scope drawing from `pool`.
    pub fn new(pool: &MemoryPool, label: impl Into<String>) -> Self {
        let label = label.into();
        tracing::debug!("opening resource scope '{label}'");
        Self {
            label,
            pool: pool.clone(),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            live_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    /// Acquires a zero-filled buffer of `len` elements, tracked by this scope.
    pub fn acquire(&self, len: usize) -> Result<ScopedBuffer<'_>, MemoryError> {
        let guard = self.pool.allocate(len)?;
        let bytes = guard.size_bytes();
        self.acquired.fetch_add(1, Ordering::Relaxed);
        let live = self.live_bytes.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.peak_bytes.fetch_max(live, Ordering::AcqRel);
        Ok(ScopedBuffer { guard, scope: self })
    }

    pub fn report(&self) -> ScopeReport {
        ScopeReport {
            label: self.label.clone(),
            acquired: self.acquired.load(Ordering::Acquire),
            released: self.released.load(Ordering::Acquire),
            live_bytes: self.live_bytes.load(Ordering::Acquire),
            peak_bytes: self.peak_bytes.load(Ordering::Acquire),
        }
    }

    fn release(&self, bytes: usize) {
        self.released.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(bytes, Ordering::AcqRel);
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        let report = self.report();
        if report.live_buffers() > 0 {
            // Only reachable through `mem::forget` on a scoped buffer.
            tracing::warn!(
                "resource scope '{}' closed with {} live buffer(s)",
                report.label,
                report.live_buffers(),
            );
        }
        tracing::debug!(
            "closed resource scope '{}': {} acquired, {} released, peak {} bytes",
            report.label,
            report.acquired,
            report.released,
            report.peak_bytes,
        );
    }
}

impl std::fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceScope")
            .field("label", &self.label)
            .field("report", &self.report())
            .finish()
    }
}

/// A pool buffer whose lifetime is bounded by its [`ResourceScope`].
pub struct ScopedBuffer<'s> {
    guard: BufferGuard,
    scope: &'s ResourceScope,
}

impl ScopedBuffer<'_> {
    pub fn as_slice(&self) -> &[f32] {
        self.guard.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        self.guard.as_mut_slice()
    }
}

impl Deref for ScopedBuffer<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.guard.as_slice()
    }
}

impl DerefMut for ScopedBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [f32] {
        self.guard.as_mut_slice()
    }
}

impl Drop for ScopedBuffer<'_> {
    fn drop(&mut self) {
        self.scope.release(self.guard.size_bytes());
    }
}

impl std::fmt::Debug for ScopedBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedBuffer")
            .field("scope", &self.scope.label)
            .field("len", &self.guard.len())
            .finish()
    }
}

/// Runs `f` inside a fresh [`ResourceScope`] and closes the scope on every
/// exit path.
///
/// The closure's result types cannot borrow the scope, so every
/// [`ScopedBuffer`] is released by the time this returns. Anything that must
/// survive has to be copied out explicitly.
pub fn with_resource_scope<T, E, F>(pool: &MemoryPool, label: &str, f: F) -> Result<T, E>
where
    F: for<'s> FnOnce(&'s ResourceScope) -> Result<T, E>,
{
    let scope = ResourceScope::new(pool, label);
    f(&scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBudget;

    #[test]
    fn test_release_on_success() {
        let pool = MemoryPool::unbounded();
        let report = with_resource_scope(&pool, "ok", |scope| {
            let _a = scope.acquire(10)?;
            let _b = scope.acquire(2)?;
            assert_eq!(scope.report().live_buffers(), 2);
            Ok::<_, MemoryError>(scope.report())
        })
        .unwrap();
        assert_eq!(report.acquired, 2);
        assert_eq!(report.peak_bytes, 48);
        assert_eq!(pool.allocated_bytes(), 0);
        assert_eq!(pool.stats().live_buffers(), 0);
    }

    #[test]
    fn test_release_on_error() {
        let pool = MemoryPool::new(MemoryBudget::from_bytes(64));
        let result: Result<(), MemoryError> = with_resource_scope(&pool, "failing", |scope| {
            let _held = scope.acquire(8)?;
            // Exceeds what is left of the budget.
            let _too_big = scope.acquire(16)?;
            unreachable!("second acquisition must fail");
        });
        assert!(matches!(result, Err(MemoryError::OutOfMemory { .. })));
        assert_eq!(pool.allocated_bytes(), 0);
        let stats = pool.stats();
        assert_eq!(stats.acquisitions, stats.releases);
    }

    #[test]
    fn test_release_on_panic() {
        let pool = MemoryPool::unbounded();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), MemoryError> = with_resource_scope(&pool, "panicking", |scope| {
                let _held = scope.acquire(32)?;
                panic!("step failed");
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(pool.allocated_bytes(), 0);
    }

    #[test]
    fn test_manual_scope() {
        let pool = MemoryPool::unbounded();
        let scope = ResourceScope::new(&pool, "manual");
        {
            let mut buf = scope.acquire(3).unwrap();
            buf[1] = 2.0;
            assert_eq!(buf.as_slice(), &[0.0, 2.0, 0.0]);
        }
        let report = scope.report();
        assert_eq!((report.acquired, report.released, report.live_bytes), (1, 1, 0));
    }
}
