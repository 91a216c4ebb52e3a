// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Traversal plan: the output of the planner and the contract between the
//! planner and the runtime.
//!
//! A plan is an ordered list of [`Step`]s plus a buffer map. Every buffer
//! holds one activation or one gradient per sample; the runtime multiplies
//! by the batch size when it binds the plan. Buffers are grouped into
//! slots by a [`crate::BufferStrategy`]; buffers sharing a slot never have
//! overlapping lifetimes.

use crate::{InputBinding, OutputBinding, PlannerError};
use model_ir::{Dims, PassType};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// What a step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    /// Computes a node's output from its input.
    Forward,
    /// Turns an output binding's activation and target into the gradient
    /// seeding the backward pass.
    Loss,
    /// Propagates a node's output gradient to its input gradient.
    Backward,
    /// Accumulates gradients of a node's trainable parameters.
    ParameterGradients,
}

/// Identifies one planned buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BufferId {
    /// Output activation of a node.
    Activation(String),
    /// Gradient of the loss with respect to a node's output.
    Gradient(String),
}

impl BufferId {
    pub fn node(&self) -> &str {
        match self {
            Self::Activation(node) | Self::Gradient(node) => node,
        }
    }

    pub fn is_gradient(&self) -> bool {
        matches!(self, Self::Gradient(_))
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activation(node) => write!(f, "act[{node}]"),
            Self::Gradient(node) => write!(f, "grad[{node}]"),
        }
    }
}

/// One step of the traversal.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Step {
    pub index: usize,
    pub kind: StepKind,
    pub node: String,
    pub inputs: Vec<BufferId>,
    pub outputs: Vec<BufferId>,
    /// Run the node's prepare-forward hook before this step, once per
    /// traversal.
    pub prepare: bool,
}

/// Shape, lifetime and placement of one buffer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BufferDescriptor {
    pub id: BufferId,
    /// Per-sample dimensions.
    pub dims: Dims,
    /// Index of the first step writing the buffer; 0 for external inputs.
    pub first_use: usize,
    /// Index of the last step reading it, or the step count when the buffer
    /// must survive the whole traversal.
    pub last_use: usize,
    /// Kept until the end of the traversal.
    pub retain: bool,
    /// Filled by the buffer strategy.
    pub slot: usize,
}

impl BufferDescriptor {
    pub fn elements(&self) -> usize {
        self.dims.size()
    }

    pub fn overlaps(&self, other: &BufferDescriptor) -> bool {
        self.first_use <= other.last_use && other.first_use <= self.last_use
    }
}

/// The complete traversal produced by [`crate::plan`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TraversalPlan {
    pub pass: PassType,
    /// Buffer strategy that assigned the slots.
    pub strategy: String,
    pub steps: Vec<Step>,
    pub inputs: Vec<InputBinding>,
    /// Output bindings with their losses resolved.
    pub outputs: Vec<OutputBinding>,
    /// Sorted by id.
    pub buffers: Vec<BufferDescriptor>,
    /// Per-sample element capacity of each slot.
    pub slots: Vec<usize>,
    /// node id → node whose activation buffer holds its output. Inactive
    /// nodes resolve to their nearest active ancestor.
    pub sources: BTreeMap<String, String>,
    pub save_gradients: bool,
}

impl TraversalPlan {
    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn count(&self, kind: StepKind) -> usize {
        self.steps.iter().filter(|s| s.kind == kind).count()
    }

    pub fn steps_of(&self, kind: StepKind) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.kind == kind)
    }

    /// Node ids of the forward steps, in execution order.
    pub fn forward_order(&self) -> Vec<&str> {
        self.steps_of(StepKind::Forward)
            .map(|s| s.node.as_str())
            .collect()
    }

    pub fn buffer(&self, id: &BufferId) -> Option<&BufferDescriptor> {
        self.buffers
            .binary_search_by(|b| b.id.cmp(id))
            .ok()
            .map(|i| &self.buffers[i])
    }

    /// Id of the node whose buffer carries `node`'s output.
    pub fn source_of(&self, node: &str) -> Option<&str> {
        self.sources.get(node).map(String::as_str)
    }

    /// The activation buffer carrying `node`'s output.
    pub fn activation_of(&self, node: &str) -> Option<&BufferDescriptor> {
        let source = self.source_of(node)?;
        self.buffer(&BufferId::Activation(source.to_string()))
    }

    /// The gradient buffer for `node`'s output, if one is planned.
    pub fn gradient_of(&self, node: &str) -> Option<&BufferDescriptor> {
        let source = self.source_of(node)?;
        self.buffer(&BufferId::Gradient(source.to_string()))
    }

    /// Total per-sample elements across all slots.
    pub fn slot_elements(&self) -> usize {
        self.slots.iter().sum()
    }

    /// Total per-sample elements if every buffer had its own slot.
    pub fn buffer_elements(&self) -> usize {
        self.buffers.iter().map(BufferDescriptor::elements).sum()
    }

    /// Validates the plan.
    ///
    /// Checks:
    /// - Step indices are consecutive starting from 0.
    /// - Every buffer a step reads was bound as an input or written by an
    ///   earlier step.
    /// - Every buffer a step touches is described.
    /// - Buffers sharing a slot have disjoint lifetimes and fit the slot.
    pub fn validate(&self) -> Result<(), PlannerError> {
        let fail = |detail: String| PlannerError::InvalidPlan {
            strategy: self.strategy.clone(),
            detail,
        };

        let mut available: HashSet<BufferId> = HashSet::new();
        for binding in &self.inputs {
            available.insert(BufferId::Activation(binding.node.clone()));
        }

        for (expected, step) in self.steps.iter().enumerate() {
            if step.index != expected {
                return Err(fail(format!(
                    "expected step index {expected}, got {}",
                    step.index
                )));
            }
            for id in step.inputs.iter().chain(&step.outputs) {
                if self.buffer(id).is_none() {
                    return Err(fail(format!("step {expected} uses undescribed buffer {id}")));
                }
            }
            for id in &step.inputs {
                if !available.contains(id) {
                    return Err(fail(format!(
                        "step {expected} ({:?} '{}') reads {id} before it is produced",
                        step.kind, step.node,
                    )));
                }
            }
            available.extend(step.outputs.iter().cloned());
        }

        for (i, a) in self.buffers.iter().enumerate() {
            let capacity = self.slots.get(a.slot).copied().ok_or_else(|| {
                fail(format!("{} assigned to missing slot {}", a.id, a.slot))
            })?;
            if a.elements() > capacity {
                return Err(fail(format!(
                    "{} needs {} elements, slot {} holds {capacity}",
                    a.id,
                    a.elements(),
                    a.slot
                )));
            }
            for b in &self.buffers[i + 1..] {
                if a.slot == b.slot && a.overlaps(b) {
                    return Err(fail(format!(
                        "{} and {} share slot {} with overlapping lifetimes",
                        a.id, b.id, a.slot
                    )));
                }
            }
        }

        Ok(())
    }

    /// Returns a human-readable summary of the plan.
    pub fn summary(&self) -> String {
        let reuse = if self.buffer_elements() == 0 {
            0.0
        } else {
            1.0 - self.slot_elements() as f64 / self.buffer_elements() as f64
        };
        format!(
            "Plan '{}' ({}): {} steps ({} forward, {} loss, {} backward, {} param-grad), \
             {} buffers in {} slots, {} elements/sample ({:.0}% saved by reuse)",
            self.pass,
            self.strategy,
            self.num_steps(),
            self.count(StepKind::Forward),
            self.count(StepKind::Loss),
            self.count(StepKind::Backward),
            self.count(StepKind::ParameterGradients),
            self.buffers.len(),
            self.slots.len(),
            self.slot_elements(),
            reuse * 100.0,
        )
    }
}

impl fmt::Display for TraversalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for step in &self.steps {
            let list = |ids: &[BufferId]| {
                ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            };
            writeln!(
                f,
                "  {:>3} {:<20?} {:<20} [{}] -> [{}]{}",
                step.index,
                step.kind,
                step.node,
                list(&step.inputs),
                list(&step.outputs),
                if step.prepare { " (prepare)" } else { "" },
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn act(n: &str) -> BufferId {
        BufferId::Activation(n.into())
    }

    fn desc(id: BufferId, size: usize, first: usize, last: usize, slot: usize) -> BufferDescriptor {
        BufferDescriptor {
            id,
            dims: Dims::flat(size),
            first_use: first,
            last_use: last,
            retain: false,
            slot,
        }
    }

    fn step(index: usize, node: &str, input: &str) -> Step {
        Step {
            index,
            kind: StepKind::Forward,
            node: node.into(),
            inputs: vec![act(input)],
            outputs: vec![act(node)],
            prepare: false,
        }
    }

    fn sample_plan() -> TraversalPlan {
        let mut buffers = vec![
            desc(act("in"), 4, 0, 0, 0),
            desc(act("a"), 3, 0, 1, 1),
            desc(act("b"), 2, 1, 2, 0),
        ];
        buffers.sort_by(|x, y| x.id.cmp(&y.id));
        TraversalPlan {
            pass: PassType::Inference,
            strategy: "test".into(),
            steps: vec![step(0, "a", "in"), step(1, "b", "a")],
            inputs: vec![InputBinding::new("in", "input")],
            outputs: vec![OutputBinding::new("b", "output")],
            buffers,
            slots: vec![4, 3],
            sources: [("in", "in"), ("a", "a"), ("b", "b")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            save_gradients: false,
        }
    }

    #[test]
    fn test_validate_ok() {
        sample_plan().validate().unwrap();
    }

    #[test]
    fn test_validate_read_before_write() {
        let mut plan = sample_plan();
        plan.steps.swap(0, 1);
        plan.steps[0].index = 0;
        plan.steps[1].index = 1;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_bad_step_index() {
        let mut plan = sample_plan();
        plan.steps[1].index = 5;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_overlapping_slot() {
        let mut plan = sample_plan();
        // act[a] lives over steps 0..=1, as does act[b].
        for b in &mut plan.buffers {
            if b.id == act("b") {
                b.slot = 1;
            }
        }
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_slot_too_small() {
        let mut plan = sample_plan();
        plan.slots[1] = 2;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_lookups() {
        let plan = sample_plan();
        assert_eq!(plan.activation_of("a").unwrap().elements(), 3);
        assert!(plan.gradient_of("a").is_none());
        assert_eq!(plan.forward_order(), ["a", "b"]);
        assert_eq!(plan.slot_elements(), 7);
        assert_eq!(plan.buffer_elements(), 9);
    }

    #[test]
    fn test_summary() {
        let s = sample_plan().summary();
        assert!(s.contains("inference"), "{s}");
        assert!(s.contains("2 steps"), "{s}");
        assert!(s.contains("3 buffers in 2 slots"), "{s}");
    }
}
