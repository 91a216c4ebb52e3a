// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! One slot per buffer.
//!
//! Highest memory use, but every buffer stays inspectable for the whole
//! traversal. Useful when debugging a backend.

use crate::strategy::BufferStrategy;
use crate::BufferDescriptor;

#[derive(Debug, Clone, Copy, Default)]
pub struct Dedicated;

impl BufferStrategy for Dedicated {
    fn name(&self) -> &str {
        "dedicated"
    }

    fn assign_slots(&self, buffers: &mut [BufferDescriptor]) -> Vec<usize> {
        buffers
            .iter_mut()
            .enumerate()
            .map(|(slot, buffer)| {
                buffer.slot = slot;
                buffer.elements()
            })
            .collect()
    }
}
