// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scoped execution state with a compile-time checked lifecycle.
//!
//! ```text
//! ExecutionContext::bind ──▶ BoundNetwork<'s>
//!                               │  ExecutionContext::traverse
//!                               ▼
//!                            ExecutedNetwork<'s> ──▶ forward / save_to_network
//!                               │  ExecutionContext::apply_gradients
//!                               ▼
//!                            BoundNetwork<'s>
//! ```
//!
//! Every buffer lives in the [`ResourceScope`] the state was bound in, and the
//! state borrows that scope, so nothing here can outlive it. Results that must
//! survive are copied out with `ExecutionContext::save_to_network`.

use crate::backend::{Backend, LayerCall, NodeBuffers};
use crate::loss::{loss_gradient, loss_value};
use crate::{RuntimeError, TraversalMetrics};
use memory_manager::{ResourceScope, ScopeReport, ScopedBuffer};
use model_ir::{Network, Verified};
use rand::rngs::StdRng;
use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;
use tensor_core::Tensor;
use traversal_planner::{BufferDescriptor, BufferId, LossKind, Step, StepKind, TraversalPlan};

/// External tensors keyed by slot name: inputs, and targets under the output
/// slot names for training traversals.
pub type Feed = BTreeMap<String, Tensor>;

// ── Type-state markers ─────────────────────────────────────────

/// Buffers are bound; no traversal has run yet.
#[derive(Debug)]
pub struct Bound;

/// A traversal has completed; outputs, losses and gradients are readable.
#[derive(Debug)]
pub struct Executed;

/// Sealed trait for execution phases.
pub trait ExecutionPhase: std::fmt::Debug {}
impl ExecutionPhase for Bound {}
impl ExecutionPhase for Executed {}

pub type BoundNetwork<'s> = ExecutionState<'s, Bound>;
pub type ExecutedNetwork<'s> = ExecutionState<'s, Executed>;

// ── State ──────────────────────────────────────────────────────

/// Live numeric state of one network bound to one traversal plan.
pub struct ExecutionState<'s, S: ExecutionPhase = Bound> {
    pub(crate) scope: &'s ResourceScope,
    pub(crate) network: &'s Network<Verified>,
    pub(crate) plan: &'s TraversalPlan,
    pub(crate) batch_size: usize,
    /// One buffer per plan slot, `batch_size × capacity` elements.
    pub(crate) slots: Vec<Option<ScopedBuffer<'s>>>,
    pub(crate) nodes: BTreeMap<String, NodeBuffers<'s>>,
    /// Nodes whose prepare-forward hook already ran in this traversal.
    pub(crate) prepared: HashSet<String>,
    pub(crate) prepare_counts: BTreeMap<String, usize>,
    /// Forward sweeps over the plan since the last traversal started.
    pub(crate) forward_passes: usize,
    pub(crate) rng: StdRng,
    /// Output slot → loss of the last forward sweep.
    pub(crate) losses: BTreeMap<String, f32>,
    pub(crate) metrics: TraversalMetrics,
    pub(crate) _phase: PhantomData<S>,
}

fn descriptor<'p>(plan: &'p TraversalPlan, id: &BufferId) -> Result<&'p BufferDescriptor, RuntimeError> {
    plan.buffer(id)
        .ok_or_else(|| RuntimeError::execution(id.node(), format!("buffer {id} is not planned")))
}

/// Batched view of a planned buffer.
fn view<'a>(
    slots: &'a [Option<ScopedBuffer<'_>>],
    plan: &TraversalPlan,
    batch_size: usize,
    id: &BufferId,
) -> Result<&'a [f32], RuntimeError> {
    let desc = descriptor(plan, id)?;
    let len = desc.elements() * batch_size;
    slots
        .get(desc.slot)
        .and_then(Option::as_ref)
        .filter(|buf| buf.len() >= len)
        .map(|buf| &buf[..len])
        .ok_or_else(|| RuntimeError::execution(id.node(), format!("buffer {id} is not bound")))
}

fn malformed(step: &Step) -> RuntimeError {
    RuntimeError::execution(
        &step.node,
        format!(
            "malformed {:?} step {}: {} inputs, {} outputs",
            step.kind,
            step.index,
            step.inputs.len(),
            step.outputs.len()
        ),
    )
}

impl<'s, S: ExecutionPhase> ExecutionState<'s, S> {
    pub(crate) fn into_phase<T: ExecutionPhase>(self) -> ExecutionState<'s, T> {
        ExecutionState {
            scope: self.scope,
            network: self.network,
            plan: self.plan,
            batch_size: self.batch_size,
            slots: self.slots,
            nodes: self.nodes,
            prepared: self.prepared,
            prepare_counts: self.prepare_counts,
            forward_passes: self.forward_passes,
            rng: self.rng,
            losses: self.losses,
            metrics: self.metrics,
            _phase: PhantomData,
        }
    }

    pub fn network(&self) -> &'s Network<Verified> {
        self.network
    }

    pub fn plan(&self) -> &'s TraversalPlan {
        self.plan
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Current accounting of the scope the state is bound in.
    pub fn scope_report(&self) -> ScopeReport {
        self.scope.report()
    }

    /// Current value of a node's parameter.
    pub fn parameter(&self, node: &str, key: &str) -> Option<&[f32]> {
        let index = self.param_index(node, key)?;
        self.nodes.get(node)?.params.get(index).map(|b| b.as_slice())
    }

    /// Accumulated gradient of a trainable parameter.
    pub fn parameter_gradient(&self, node: &str, key: &str) -> Option<&[f32]> {
        let index = self.param_index(node, key)?;
        self.nodes
            .get(node)?
            .grads
            .get(index)?
            .as_ref()
            .map(|b| b.as_slice())
    }

    /// The dropout mask of a node, if it has one.
    pub fn mask(&self, node: &str) -> Option<&[f32]> {
        self.nodes.get(node)?.mask.as_deref()
    }

    /// How many times the node's prepare-forward hook has run since binding.
    pub fn prepare_count(&self, node: &str) -> usize {
        self.prepare_counts.get(node).copied().unwrap_or(0)
    }

    /// Retained activation buffer carrying `node`'s output.
    pub(crate) fn retained_activation(&self, node: &str) -> Option<&[f32]> {
        let desc = self.plan.activation_of(node).filter(|d| d.retain)?;
        view(&self.slots, self.plan, self.batch_size, &desc.id).ok()
    }

    pub(crate) fn retained_gradient(&self, node: &str) -> Option<&[f32]> {
        let desc = self.plan.gradient_of(node).filter(|d| d.retain)?;
        view(&self.slots, self.plan, self.batch_size, &desc.id).ok()
    }

    pub(crate) fn param_index(&self, node: &str, key: &str) -> Option<usize> {
        self.network
            .node(node)?
            .metadata()
            .params
            .iter()
            .position(|p| p.key == key)
    }

    /// Copies every input binding's tensor into its activation buffer.
    pub(crate) fn load_inputs(&mut self, feed: &Feed) -> Result<(), RuntimeError> {
        for binding in &self.plan.inputs {
            let tensor = feed.get(&binding.slot).ok_or_else(|| {
                RuntimeError::Binding(format!(
                    "no tensor supplied for input slot '{}'",
                    binding.slot
                ))
            })?;
            let desc = self.plan.activation_of(&binding.node).ok_or_else(|| {
                RuntimeError::execution(&binding.node, "input node has no activation buffer")
            })?;
            let len = desc.elements() * self.batch_size;
            if tensor.len() != len {
                return Err(RuntimeError::Binding(format!(
                    "input slot '{}' expects {len} values ({} per sample × batch {}), got {}",
                    binding.slot,
                    desc.elements(),
                    self.batch_size,
                    tensor.len()
                )));
            }
            let buf = self
                .slots
                .get_mut(desc.slot)
                .and_then(Option::as_mut)
                .ok_or_else(|| {
                    RuntimeError::execution(&binding.node, "input buffer is not bound")
                })?;
            buf[..len].copy_from_slice(tensor.as_slice());
        }
        Ok(())
    }

    /// Checks that every output binding has a target of the right size.
    pub(crate) fn check_targets(&self, feed: &Feed) -> Result<(), RuntimeError> {
        for binding in &self.plan.outputs {
            let expected = self
                .plan
                .activation_of(&binding.node)
                .map(|d| d.elements() * self.batch_size)
                .unwrap_or(0);
            match feed.get(&binding.slot) {
                Some(target) if target.len() == expected => {}
                Some(target) => {
                    return Err(RuntimeError::Binding(format!(
                        "target for output slot '{}' has {} values, expected {expected}",
                        binding.slot,
                        target.len()
                    )))
                }
                None => {
                    return Err(RuntimeError::Binding(format!(
                        "training needs a target under output slot '{}'",
                        binding.slot
                    )))
                }
            }
        }
        Ok(())
    }

    /// Executes one plan step against `backend`.
    pub(crate) fn execute_step<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        step: &Step,
        feed: &Feed,
    ) -> Result<(), RuntimeError> {
        let plan = self.plan;
        let batch = self.batch_size;
        let mut output = match step.outputs.as_slice() {
            [] => None,
            [id] => {
                let desc = descriptor(plan, id)?;
                let mut buf = self
                    .slots
                    .get_mut(desc.slot)
                    .and_then(Option::take)
                    .ok_or_else(|| {
                        RuntimeError::execution(&step.node, format!("buffer {id} is not bound"))
                    })?;
                if desc.first_use == step.index {
                    buf.fill(0.0);
                }
                Some((desc.slot, desc.elements() * batch, buf))
            }
            _ => return Err(malformed(step)),
        };

        let result = match output.as_mut() {
            Some((_, len, buf)) if buf.len() >= *len => {
                self.dispatch(backend, step, feed, Some(&mut buf[..*len]))
            }
            Some(_) => Err(RuntimeError::execution(
                &step.node,
                "output buffer is smaller than planned",
            )),
            None => self.dispatch(backend, step, feed, None),
        };
        if let Some((slot, _, buf)) = output {
            self.slots[slot] = Some(buf);
        }
        result
    }

    fn dispatch<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        step: &Step,
        feed: &Feed,
        output: Option<&mut [f32]>,
    ) -> Result<(), RuntimeError> {
        let plan = self.plan;
        let network = self.network;
        let batch = self.batch_size;
        let node = network.require_node(&step.node)?;
        let call = LayerCall {
            node,
            pass: plan.pass,
            batch_size: batch,
        };
        let inputs = step
            .inputs
            .iter()
            .map(|id| view(&self.slots, plan, batch, id))
            .collect::<Result<Vec<_>, _>>()?;
        let state = self.nodes.entry(step.node.clone()).or_default();

        match (step.kind, inputs.as_slice(), output) {
            (StepKind::Forward, [input], Some(output)) => {
                if step.prepare && self.prepared.insert(step.node.clone()) {
                    backend.prepare_forward(call, state, &mut self.rng)?;
                    *self.prepare_counts.entry(step.node.clone()).or_default() += 1;
                }
                tracing::debug!(node = %step.node, "forward");
                backend.forward(call, state, input, output)
            }
            (StepKind::Loss, [prediction], Some(gradient)) => {
                let binding = plan
                    .outputs
                    .iter()
                    .find(|b| b.node == step.node)
                    .ok_or_else(|| malformed(step))?;
                let kind = binding.loss.unwrap_or(LossKind::MeanSquared);
                let target = feed.get(&binding.slot).ok_or_else(|| {
                    RuntimeError::Binding(format!("no target for output slot '{}'", binding.slot))
                })?;
                let value = loss_value(kind, prediction, target.as_slice(), batch)
                    .map_err(RuntimeError::tensor(&step.node))?;
                loss_gradient(kind, prediction, target.as_slice(), gradient, batch)
                    .map_err(RuntimeError::tensor(&step.node))?;
                tracing::debug!(node = %step.node, loss = kind.as_str(), value, "loss");
                self.losses.insert(binding.slot.clone(), value);
                Ok(())
            }
            (StepKind::Backward, [input, activation, output_grad], Some(input_grad)) => {
                tracing::debug!(node = %step.node, "backward");
                backend.backward(call, state, input, activation, output_grad, input_grad)
            }
            (StepKind::ParameterGradients, [input, output_grad], None) => {
                tracing::debug!(node = %step.node, "parameter gradients");
                backend.accumulate_parameter_gradients(call, state, input, output_grad)
            }
            _ => Err(malformed(step)),
        }
    }

    /// Recomputes the loss of every output binding without touching
    /// gradients.
    pub(crate) fn compute_losses(&mut self, feed: &Feed) -> Result<(), RuntimeError> {
        self.losses.clear();
        for binding in &self.plan.outputs {
            let Some(kind) = binding.loss else { continue };
            let Some(target) = feed.get(&binding.slot) else {
                continue;
            };
            let id = BufferId::Activation(
                self.plan
                    .source_of(&binding.node)
                    .unwrap_or(&binding.node)
                    .to_string(),
            );
            let prediction = view(&self.slots, self.plan, self.batch_size, &id)?;
            let value = loss_value(kind, prediction, target.as_slice(), self.batch_size)
                .map_err(RuntimeError::tensor(&binding.node))?;
            self.losses.insert(binding.slot.clone(), value);
        }
        Ok(())
    }

    /// Zeroes all parameter gradients.
    pub(crate) fn clear_parameter_gradients(&mut self) {
        for grad in self.nodes.values_mut().flat_map(|n| n.grads.iter_mut().flatten()) {
            grad.fill(0.0);
        }
    }
}

impl<'s> ExecutionState<'s, Executed> {
    /// Batched output of the node bound to `slot`.
    pub fn output(&self, slot: &str) -> Option<&[f32]> {
        let binding = self.plan.outputs.iter().find(|b| b.slot == slot)?;
        self.activation(&binding.node)
    }

    /// Every output slot with its batched values.
    pub fn outputs(&self) -> BTreeMap<&str, &[f32]> {
        self.plan
            .outputs
            .iter()
            .filter_map(|b| Some((b.slot.as_str(), self.activation(&b.node)?)))
            .collect()
    }

    /// Output activation of any node whose buffer was retained.
    ///
    /// Nodes inactive for the pass report their nearest active ancestor's
    /// buffer.
    pub fn activation(&self, node: &str) -> Option<&[f32]> {
        self.retained_activation(node)
    }

    /// Gradient of the loss with respect to a node's output, if it was
    /// retained.
    pub fn gradient(&self, node: &str) -> Option<&[f32]> {
        self.retained_gradient(node)
    }

    /// Sum of the losses of all output bindings; 0 for inference.
    pub fn loss(&self) -> f32 {
        self.losses.values().sum()
    }

    pub fn losses(&self) -> &BTreeMap<String, f32> {
        &self.losses
    }

    pub fn metrics(&self) -> &TraversalMetrics {
        &self.metrics
    }

    /// Forward sweeps run since the traversal started, the traversal's own
    /// included.
    pub fn forward_passes(&self) -> usize {
        self.forward_passes
    }
}

impl<S: ExecutionPhase> std::fmt::Debug for ExecutionState<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionState")
            .field("pass", &self.plan.pass)
            .field("batch_size", &self.batch_size)
            .field("slots", &self.slots.len())
            .field("nodes", &self.nodes.len())
            .field("forward_passes", &self.forward_passes)
            .finish()
    }
}
