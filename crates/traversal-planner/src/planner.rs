// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Derives a [`TraversalPlan`] from a verified network.
//!
//! 1. Resolve bindings (defaults when none are given).
//! 2. Walk nodes in topological order. Nodes whose pass-set contains the
//!    pass get a forward step; the rest alias their parent's buffer.
//! 3. For training, add one loss step per output, then walk active nodes in
//!    reverse, emitting backward and parameter-gradient steps for every
//!    node reached by a gradient.
//! 4. Derive buffer lifetimes from the steps and let the strategy place
//!    them into slots.

use crate::binding::{default_inputs, default_outputs};
use crate::strategy::lifetime::LifetimeReuse;
use crate::strategy::BufferStrategy;
use crate::{
    BufferDescriptor, BufferId, InputBinding, LossKind, OutputBinding, PlannerError, Step,
    StepKind, TraversalPlan,
};
use model_ir::{Dims, Network, Node, PassType, Verified};
use std::collections::{BTreeMap, HashSet};

/// Planning switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlanOptions {
    /// Keep every buffer, gradients included, alive for the whole traversal
    /// so callers can inspect intermediate values afterwards.
    pub save_gradients: bool,
}

impl PlanOptions {
    pub fn saving_gradients() -> Self {
        Self {
            save_gradients: true,
        }
    }
}

/// Plans a traversal with the default [`LifetimeReuse`] strategy.
///
/// Empty binding slices select the defaults: the single root bound to the
/// `"input"` slot and the single leaf bound to `"output"` (several roots or
/// leaves are bound to slots named after themselves).
pub fn plan(
    network: &Network<Verified>,
    pass: PassType,
    inputs: &[InputBinding],
    outputs: &[OutputBinding],
    options: &PlanOptions,
) -> Result<TraversalPlan, PlannerError> {
    plan_with(network, pass, inputs, outputs, options, &LifetimeReuse)
}

/// Plans a traversal, placing buffers with `strategy`.
pub fn plan_with(
    network: &Network<Verified>,
    pass: PassType,
    inputs: &[InputBinding],
    outputs: &[OutputBinding],
    options: &PlanOptions,
    strategy: &dyn BufferStrategy,
) -> Result<TraversalPlan, PlannerError> {
    if network.num_nodes() == 0 {
        return Err(PlannerError::EmptyNetwork);
    }

    let inputs = resolve_inputs(network, inputs)?;
    let outputs = resolve_outputs(network, outputs)?;

    let roots: HashSet<&str> = network.roots().into_iter().collect();
    let mut sources: BTreeMap<String, String> = BTreeMap::new();
    let mut active: Vec<&Node> = Vec::new();
    for node in network.iter_nodes() {
        let source = match node.parent() {
            Some(_) if node.metadata().passes.contains(pass) => {
                active.push(node);
                node.id.clone()
            }
            Some(parent) => sources
                .get(parent)
                .cloned()
                .unwrap_or_else(|| parent.to_string()),
            None => node.id.clone(),
        };
        sources.insert(node.id.clone(), source);
    }
    let source_of = |id: &str| -> String {
        sources.get(id).cloned().unwrap_or_else(|| id.to_string())
    };

    let mut steps: Vec<Step> = Vec::new();
    let mut push =
        |kind: StepKind, node: &str, ins: Vec<BufferId>, outs: Vec<BufferId>, prepare: bool| {
            let index = steps.len();
            steps.push(Step {
                index,
                kind,
                node: node.to_string(),
                inputs: ins,
                outputs: outs,
                prepare,
            });
        };

    for node in &active {
        let parent = source_of(node.parent().unwrap_or_default());
        push(
            StepKind::Forward,
            &node.id,
            vec![BufferId::Activation(parent)],
            vec![BufferId::Activation(node.id.clone())],
            node.metadata().prepare_forward,
        );
    }

    if pass == PassType::Training {
        let mut reached: HashSet<String> = HashSet::new();
        for binding in &outputs {
            let source = source_of(&binding.node);
            push(
                StepKind::Loss,
                &binding.node,
                vec![BufferId::Activation(source.clone())],
                vec![BufferId::Gradient(source.clone())],
                false,
            );
            reached.insert(source);
        }

        for node in active.iter().rev() {
            if !reached.contains(&node.id) {
                continue;
            }
            let parent = source_of(node.parent().unwrap_or_default());
            if !roots.contains(parent.as_str()) {
                push(
                    StepKind::Backward,
                    &node.id,
                    vec![
                        BufferId::Activation(parent.clone()),
                        BufferId::Activation(node.id.clone()),
                        BufferId::Gradient(node.id.clone()),
                    ],
                    vec![BufferId::Gradient(parent.clone())],
                    false,
                );
                reached.insert(parent.clone());
            }
            if node.parameter_count() > 0 {
                push(
                    StepKind::ParameterGradients,
                    &node.id,
                    vec![
                        BufferId::Activation(parent),
                        BufferId::Gradient(node.id.clone()),
                    ],
                    Vec::new(),
                    false,
                );
            }
        }
    }

    let retained: HashSet<BufferId> = outputs
        .iter()
        .map(|b| BufferId::Activation(source_of(&b.node)))
        .collect();
    let mut buffers = describe_buffers(network, &inputs, &steps, &retained, options);
    let slots = strategy.assign_slots(&mut buffers);
    buffers.sort_by(|a, b| a.id.cmp(&b.id));

    let plan = TraversalPlan {
        pass,
        strategy: strategy.name().to_string(),
        steps,
        inputs,
        outputs,
        buffers,
        slots,
        sources,
        save_gradients: options.save_gradients,
    };
    plan.validate()?;

    for step in &plan.steps {
        tracing::debug!(
            "step {:>3}: {:?} '{}' reads {:?} writes {:?}",
            step.index,
            step.kind,
            step.node,
            step.inputs,
            step.outputs,
        );
    }
    tracing::info!("{}", plan.summary());
    Ok(plan)
}

fn describe_buffers(
    network: &Network<Verified>,
    inputs: &[InputBinding],
    steps: &[Step],
    retained: &HashSet<BufferId>,
    options: &PlanOptions,
) -> Vec<BufferDescriptor> {
    // id → (first_use, last_use)
    let mut lifetimes: BTreeMap<BufferId, (usize, usize)> = BTreeMap::new();
    for binding in inputs {
        lifetimes.insert(BufferId::Activation(binding.node.clone()), (0, 0));
    }
    for step in steps {
        for id in &step.outputs {
            let entry = lifetimes.entry(id.clone()).or_insert((step.index, step.index));
            entry.1 = entry.1.max(step.index);
        }
        for id in &step.inputs {
            if let Some(entry) = lifetimes.get_mut(id) {
                entry.1 = entry.1.max(step.index);
            }
        }
    }

    let end = steps.len();
    lifetimes
        .into_iter()
        .map(|(id, (first_use, last_use))| {
            let dims = network
                .node(id.node())
                .map(|n| n.output_dims)
                .unwrap_or_else(|| Dims::flat(0));
            let retain = options.save_gradients || retained.contains(&id);
            BufferDescriptor {
                id,
                dims,
                first_use,
                last_use: if retain { end } else { last_use },
                retain,
                slot: 0,
            }
        })
        .collect()
}

fn resolve_inputs(
    network: &Network<Verified>,
    requested: &[InputBinding],
) -> Result<Vec<InputBinding>, PlannerError> {
    if requested.is_empty() {
        return Ok(default_inputs(network));
    }
    let roots = network.roots();
    let mut nodes = HashSet::new();
    let mut slots = HashSet::new();
    for binding in requested {
        if !roots.contains(&binding.node.as_str()) {
            return Err(PlannerError::Binding(format!(
                "input binding '{}' does not name a root; roots are {:?}",
                binding.node, roots
            )));
        }
        if !nodes.insert(binding.node.as_str()) {
            return Err(PlannerError::Binding(format!(
                "root '{}' is bound more than once",
                binding.node
            )));
        }
        if !slots.insert(binding.slot.as_str()) {
            return Err(PlannerError::Binding(format!(
                "input slot '{}' is bound more than once",
                binding.slot
            )));
        }
    }
    if let Some(unbound) = roots.iter().find(|r| !nodes.contains(*r)) {
        return Err(PlannerError::Binding(format!(
            "root '{unbound}' has no input binding"
        )));
    }
    Ok(requested.to_vec())
}

fn resolve_outputs(
    network: &Network<Verified>,
    requested: &[OutputBinding],
) -> Result<Vec<OutputBinding>, PlannerError> {
    let requested = if requested.is_empty() {
        default_outputs(network)
    } else {
        requested.to_vec()
    };
    let leaves = network.leaves();
    let mut slots = HashSet::new();
    let mut resolved = Vec::with_capacity(requested.len());
    for mut binding in requested {
        let node = network
            .node(&binding.node)
            .filter(|n| leaves.contains(&n.id.as_str()))
            .ok_or_else(|| {
                PlannerError::Binding(format!(
                    "output binding '{}' does not name a leaf; leaves are {:?}",
                    binding.node, leaves
                ))
            })?;
        if !slots.insert(binding.slot.clone()) {
            return Err(PlannerError::Binding(format!(
                "output slot '{}' is bound more than once",
                binding.slot
            )));
        }
        binding.loss = Some(
            binding
                .loss
                .unwrap_or_else(|| LossKind::for_layer(node.layer_type())),
        );
        resolved.push(binding);
    }
    Ok(resolved)
}
