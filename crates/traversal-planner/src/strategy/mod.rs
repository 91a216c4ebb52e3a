// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`BufferStrategy`] trait and strategy implementations.

pub mod dedicated;
pub mod lifetime;

use crate::BufferDescriptor;

/// Trait for buffer placement strategies.
///
/// A strategy receives every planned buffer with its lifetime already
/// resolved, writes a slot index into each descriptor, and returns the
/// per-sample element capacity of every slot. Buffers it places in the
/// same slot must have disjoint lifetimes.
///
/// Strategies are purely algorithmic, which keeps them unit-testable in
/// isolation from networks.
pub trait BufferStrategy: Send + Sync {
    /// Human-readable name of this strategy.
    fn name(&self) -> &str;

    /// Assigns slots and returns slot capacities.
    fn assign_slots(&self, buffers: &mut [BufferDescriptor]) -> Vec<usize>;
}

/// Looks up a strategy by its name.
pub fn by_name(name: &str) -> Option<Box<dyn BufferStrategy>> {
    match name {
        "dedicated" => Some(Box::new(dedicated::Dedicated)),
        "lifetime-reuse" => Some(Box::new(lifetime::LifetimeReuse)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("dedicated").unwrap().name(), "dedicated");
        assert_eq!(by_name("lifetime-reuse").unwrap().name(), "lifetime-reuse");
        assert!(by_name("greedy").is_none());
    }
}
