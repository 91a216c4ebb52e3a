// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII buffer guard that returns memory to the pool on drop.

use crate::pool::PoolInner;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// An owned `f32` buffer borrowed from a [`MemoryPool`](crate::MemoryPool).
///
/// Dropping the guard returns the buffer to the pool's free list and
/// releases its bytes from the budget. The guard dereferences to `[f32]`.
pub struct BufferGuard {
    data: Vec<f32>,
    pool: Arc<PoolInner>,
}

impl BufferGuard {
    pub(crate) fn new(data: Vec<f32>, pool: Arc<PoolInner>) -> Self {
        Self { data, pool }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl Deref for BufferGuard {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.data
    }
}

impl DerefMut for BufferGuard {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl Drop for BufferGuard {
    fn drop(&mut self) {
        self.pool.return_buffer(std::mem::take(&mut self.data));
    }
}

impl std::fmt::Debug for BufferGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferGuard")
            .field("len", &self.data.len())
            .finish()
    }
}
