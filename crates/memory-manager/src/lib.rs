// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! Budget-enforced `f32` buffer pool and the scoped resource discipline the
//! execution engine runs inside.
//!
//! # Key Components
//!
//! - [`MemoryBudget`]: a hard memory ceiling with human-readable parsing
//!   (`"512M"`, `"1G"`, etc.).
//! - [`MemoryPool`]: the allocator: enforces the budget, recycles returned
//!   buffers through a size-classed free list, and tracks statistics.
//! - [`BufferGuard`]: an RAII wrapper that returns its buffer on drop.
//! - [`ResourceScope`] / [`ScopedBuffer`] / [`with_resource_scope`]: the
//!   scope-lifetime registry: buffers borrow their scope, so none can
//!   escape it, and all are released on every exit path.
//! - [`AllocationStats`]: cumulative allocator counters.
//!
//! # Ownership Model
//!
//! ```text
//! with_resource_scope(pool, |scope| ...)
//!       │
//!       ▼
//!   scope.acquire(len) ──► ScopedBuffer<'scope>
//!       │                     owns BufferGuard ──► Arc<PoolInner>
//!       │  closure returns (Ok, Err or unwind)
//!       ▼
//!   every ScopedBuffer dropped ──► PoolInner::return_buffer ──► free list
//! ```

mod budget;
mod error;
mod guard;
mod pool;
mod scope;
mod stats;

pub use budget::MemoryBudget;
pub use error::MemoryError;
pub use guard::BufferGuard;
pub use pool::MemoryPool;
pub use scope::{with_resource_scope, ResourceScope, ScopeReport, ScopedBuffer};
pub use stats::AllocationStats;
