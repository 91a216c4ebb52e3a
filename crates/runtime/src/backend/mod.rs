// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The numerical backend capability surface.
//!
//! The execution context never touches numbers itself: it hands each step's
//! buffers to a [`Backend`], together with the node's [`NodeBuffers`]
//! (parameters, parameter gradients and per-traversal state). Buffers are
//! acquired through the backend from the execution scope, so they are all
//! released when the scope closes.

pub mod cpu;

use crate::RuntimeError;
use memory_manager::{ResourceScope, ScopedBuffer};
use model_ir::{Node, PassType};
use rand::rngs::StdRng;
use tensor_core::{BatchStats, Shape};

/// Scoped state of one node for the lifetime of a bound network.
#[derive(Debug, Default)]
pub struct NodeBuffers<'s> {
    /// Parameter values, in the order of the layer's metadata row.
    pub params: Vec<ScopedBuffer<'s>>,
    /// Parameter gradients, aligned with `params`; `None` for parameters
    /// that are not trainable or when the pass does no backward work.
    pub grads: Vec<Option<ScopedBuffer<'s>>>,
    /// Dropout mask refreshed by the prepare-forward hook.
    pub mask: Option<ScopedBuffer<'s>>,
    /// Batch statistics saved by a training forward step.
    pub batch_stats: Option<BatchStats>,
}

/// The node a backend call is made for.
#[derive(Debug, Clone, Copy)]
pub struct LayerCall<'a> {
    pub node: &'a Node,
    pub pass: PassType,
    pub batch_size: usize,
}

impl LayerCall<'_> {
    pub fn id(&self) -> &str {
        &self.node.id
    }
}

/// A pluggable numerical backend.
///
/// Forward calls overwrite `output`. Backward and parameter-gradient calls
/// accumulate into their gradient buffers.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// Highest tensor rank the backend can hold.
    fn max_rank(&self) -> usize {
        4
    }

    /// Acquires a zeroed buffer for `shape` from `scope`.
    ///
    /// Fails with [`RuntimeError::Binding`] for shapes the backend cannot
    /// represent.
    fn allocate<'s>(
        &self,
        scope: &'s ResourceScope,
        shape: &Shape,
    ) -> Result<ScopedBuffer<'s>, RuntimeError>;

    /// Per-traversal hook, run once before the node's first forward step.
    fn prepare_forward(
        &self,
        call: LayerCall<'_>,
        state: &mut NodeBuffers<'_>,
        rng: &mut StdRng,
    ) -> Result<(), RuntimeError>;

    fn forward(
        &self,
        call: LayerCall<'_>,
        state: &mut NodeBuffers<'_>,
        input: &[f32],
        output: &mut [f32],
    ) -> Result<(), RuntimeError>;

    fn backward(
        &self,
        call: LayerCall<'_>,
        state: &NodeBuffers<'_>,
        input: &[f32],
        output: &[f32],
        output_grad: &[f32],
        input_grad: &mut [f32],
    ) -> Result<(), RuntimeError>;

    fn accumulate_parameter_gradients(
        &self,
        call: LayerCall<'_>,
        state: &mut NodeBuffers<'_>,
        input: &[f32],
        output_grad: &[f32],
    ) -> Result<(), RuntimeError>;
}
