// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lifetime-based slot reuse.
//!
//! Greedy interval colouring: buffers are visited in order of production
//! and each takes the first slot whose previous occupant was last read
//! strictly before the buffer is first written. A step's inputs and outputs
//! therefore never share a slot. A slot grows to its largest occupant.
//!
//! # Memory Model
//!
//! ```text
//! step:      0     1     2     3
//! act[a]   [=====]
//! act[b]         [=====]
//! act[c]               [=====]      act[c] reuses act[a]'s slot
//! ```
//!
//! Retained buffers live until the end of the traversal and are never
//! shared.

use crate::strategy::BufferStrategy;
use crate::BufferDescriptor;

#[derive(Debug, Clone, Copy, Default)]
pub struct LifetimeReuse;

impl BufferStrategy for LifetimeReuse {
    fn name(&self) -> &str {
        "lifetime-reuse"
    }

    fn assign_slots(&self, buffers: &mut [BufferDescriptor]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..buffers.len()).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (&buffers[a], &buffers[b]);
            (a.first_use, &a.id).cmp(&(b.first_use, &b.id))
        });

        // (last step reading the current occupant, capacity)
        let mut slots: Vec<(usize, usize)> = Vec::new();
        for i in order {
            let buffer = &mut buffers[i];
            let free = slots
                .iter()
                .position(|&(busy_until, _)| busy_until < buffer.first_use);
            let slot = match free {
                Some(slot) => {
                    let (busy_until, capacity) = &mut slots[slot];
                    *busy_until = buffer.last_use;
                    *capacity = (*capacity).max(buffer.elements());
                    slot
                }
                None => {
                    slots.push((buffer.last_use, buffer.elements()));
                    slots.len() - 1
                }
            };
            buffer.slot = slot;
        }
        slots.into_iter().map(|(_, capacity)| capacity).collect()
    }
}
