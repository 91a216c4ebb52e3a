// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! The execution context that runs planned traversals of built networks.
//!
//! The runtime takes:
//! - A verified `Network` from `model-ir`.
//! - A `TraversalPlan` from `traversal-planner`.
//! - A `ResourceScope` from `memory-manager`, bounding every buffer.
//!
//! And executes the plan step by step against a pluggable [`Backend`],
//! keeping parameters, gradients and activations consistent and recording
//! per-step timings.
//!
//! # Type-State Pipeline
//! ```text
//! ExecutionContext::bind → BoundNetwork<'s> → traverse → ExecutedNetwork<'s>
//! ```
//! States borrow the scope they were bound in, so the compiler rejects any
//! attempt to keep a scoped buffer past the scope's end.
//!
//! # Synchronous Execution
//! One traversal runs its steps strictly in plan order on the calling
//! thread. Independent networks can run concurrently on separate threads,
//! each with its own state.

pub mod backend;
mod config;
mod context;
mod error;
mod gradcheck;
mod init;
mod loss;
mod metrics;
mod optimizer;
mod state;

pub use backend::cpu::CpuBackend;
pub use backend::{Backend, LayerCall, NodeBuffers};
pub use config::RuntimeConfig;
pub use context::{ExecutionContext, SaveOptions};
pub use error::RuntimeError;
pub use gradcheck::{gradient_check, GradientCheck};
pub use init::initialize;
pub use loss::{loss_gradient, loss_value};
pub use metrics::{StepMetrics, TraversalMetrics};
pub use optimizer::{Optimizer, Sgd};
pub use state::{
    Bound, BoundNetwork, Executed, ExecutedNetwork, ExecutionPhase, ExecutionState, Feed,
};
