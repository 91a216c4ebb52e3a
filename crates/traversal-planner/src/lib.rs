// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # traversal-planner
//!
//! Turns a verified `Network` into an ordered traversal: forward steps for
//! every node active in the requested pass, and for training the loss,
//! backward and parameter-gradient steps, together with a buffer map.
//!
//! # Buffer strategies
//!
//! | Strategy | Slots | Memory usage |
//! |---|---|---|
//! | [`Dedicated`] | one per buffer | Highest |
//! | [`LifetimeReuse`] | shared between disjoint lifetimes | Lowest |
//!
//! All strategies implement [`BufferStrategy`], so new ones can be added
//! without touching the planner or the runtime:
//!
//! ```ignore
//! struct MyStrategy;
//! impl BufferStrategy for MyStrategy {
//!     fn name(&self) -> &str { "mine" }
//!     fn assign_slots(&self, buffers: &mut [BufferDescriptor]) -> Vec<usize> { /* ... */ }
//! }
//! ```
//!
//! # Example
//! ```
//! use model_ir::{build, registry::*, PassType};
//! use traversal_planner::{plan, PlanOptions};
//!
//! let descs = sequence([input(28, 28, 1), linear_relu(100), linear_softmax(10)]).unwrap();
//! let network = build(&descs).verify().unwrap();
//! let plan = plan(&network, PassType::Inference, &[], &[], &PlanOptions::default()).unwrap();
//! println!("{}", plan.summary());
//! ```

mod binding;
mod error;
mod plan;
mod planner;
pub mod strategy;

pub use binding::{
    default_inputs, default_outputs, InputBinding, LossKind, OutputBinding, DEFAULT_INPUT_SLOT,
    DEFAULT_OUTPUT_SLOT,
};
pub use error::PlannerError;
pub use model_ir::PassType;
pub use plan::{BufferDescriptor, BufferId, Step, StepKind, TraversalPlan};
pub use planner::{plan, plan_with, PlanOptions};
pub use strategy::dedicated::Dedicated;
pub use strategy::lifetime::LifetimeReuse;
pub use strategy::BufferStrategy;
