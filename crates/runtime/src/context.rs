// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The execution context: binds planned networks to a backend and runs
//! their traversals.
//!
//! Each phase consumes the previous state and returns the next one, so a
//! caller can never observe a half-updated state:
//!
//! ```
//! use model_ir::{build, registry::*, PassType};
//! use runtime::{ExecutionContext, Feed, RuntimeConfig};
//! use tensor_core::{Shape, Tensor};
//! use traversal_planner::PlanOptions;
//!
//! let descs = sequence([input(4, 1, 1), linear_softmax(3)]).unwrap();
//! let network = build(&descs).verify().unwrap();
//! let ctx = ExecutionContext::new(RuntimeConfig::default()).unwrap();
//! let plan = ctx
//!     .plan(&network, PassType::Inference, &[], &[], &PlanOptions::default())
//!     .unwrap();
//!
//! let mut feed = Feed::new();
//! feed.insert("input".into(), Tensor::zeros(Shape::matrix(1, 4)));
//! let sum: f32 = ctx
//!     .with_scope("doc", |scope| {
//!         let bound = ctx.bind(scope, &network, &plan)?;
//!         let executed = ctx.traverse(bound, &feed)?;
//!         Ok(executed.output("output").unwrap_or_default().iter().sum())
//!     })
//!     .unwrap();
//! assert!((sum - 1.0).abs() < 1e-5);
//! ```

use crate::backend::cpu::CpuBackend;
use crate::backend::{Backend, NodeBuffers};
use crate::init::initialize;
use crate::state::{BoundNetwork, ExecutedNetwork, ExecutionPhase, ExecutionState, Feed};
use crate::{Optimizer, RuntimeConfig, RuntimeError, TraversalMetrics};
use memory_manager::{with_resource_scope, MemoryPool, ResourceScope};
use model_ir::{Network, PassType, Verified};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;
use std::time::Instant;
use tensor_core::{Shape, Tensor};
use traversal_planner::{
    plan_with, InputBinding, OutputBinding, PlanOptions, StepKind, TraversalPlan,
};

/// What [`ExecutionContext::save_to_network`] copies besides parameters and
/// retained activations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Also copy retained output gradients and accumulated parameter
    /// gradients.
    pub save_gradients: bool,
}

/// Owns a backend, a memory pool and the runtime configuration.
///
/// The context holds no per-network state, so one context can serve several
/// networks, and `&ExecutionContext` can be shared between threads as long as
/// every thread binds its own state.
pub struct ExecutionContext<B: Backend = CpuBackend> {
    backend: B,
    pool: MemoryPool,
    config: RuntimeConfig,
}

impl ExecutionContext<CpuBackend> {
    /// Creates a context running on the [`CpuBackend`].
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        Self::with_backend(config, CpuBackend)
    }
}

impl<B: Backend> ExecutionContext<B> {
    pub fn with_backend(config: RuntimeConfig, backend: B) -> Result<Self, RuntimeError> {
        config.validate()?;
        let budget = config.parse_budget()?;
        tracing::info!(
            "execution context: backend '{}', budget {budget}, strategy '{}', batch {}",
            backend.name(),
            config.buffer_strategy,
            config.batch_size
        );
        Ok(Self {
            backend,
            pool: MemoryPool::new(budget),
            config,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    /// Plans a traversal with the configured buffer strategy.
    pub fn plan(
        &self,
        network: &Network<Verified>,
        pass: PassType,
        inputs: &[InputBinding],
        outputs: &[OutputBinding],
        options: &PlanOptions,
    ) -> Result<TraversalPlan, RuntimeError> {
        let strategy = self.config.create_strategy()?;
        Ok(plan_with(
            network,
            pass,
            inputs,
            outputs,
            options,
            strategy.as_ref(),
        )?)
    }

    /// Runs `f` in a fresh resource scope on the context's pool.
    ///
    /// All buffers acquired inside are released when this returns, whether
    /// `f` succeeded, failed or panicked.
    pub fn with_scope<T, F>(&self, label: &str, f: F) -> Result<T, RuntimeError>
    where
        F: for<'s> FnOnce(&'s ResourceScope) -> Result<T, RuntimeError>,
    {
        with_resource_scope(&self.pool, label, f)
    }

    /// Acquires every buffer the plan and the network's parameters need.
    ///
    /// Parameters come from `network.values` when present and are initialized
    /// from the configured seed otherwise.
    pub fn bind<'s>(
        &self,
        scope: &'s ResourceScope,
        network: &'s Network<Verified>,
        plan: &'s TraversalPlan,
    ) -> Result<BoundNetwork<'s>, RuntimeError> {
        self.bind_with_batch_size(scope, network, plan, self.config.batch_size)
    }

    /// [`bind`](Self::bind) with an explicit batch size instead of the
    /// configured one.
    pub fn bind_with_batch_size<'s>(
        &self,
        scope: &'s ResourceScope,
        network: &'s Network<Verified>,
        plan: &'s TraversalPlan,
        batch: usize,
    ) -> Result<BoundNetwork<'s>, RuntimeError> {
        if batch == 0 {
            return Err(RuntimeError::Binding("batch size must be at least 1".into()));
        }
        plan.validate()?;

        for desc in &plan.buffers {
            let shape = desc.dims.batched_shape(batch);
            if shape.rank() > self.backend.max_rank() {
                return Err(RuntimeError::Binding(format!(
                    "buffer {} has shape {shape}; backend '{}' holds up to rank {}",
                    desc.id,
                    self.backend.name(),
                    self.backend.max_rank()
                )));
            }
        }

        let slots = plan
            .slots
            .iter()
            .map(|&capacity| {
                self.backend
                    .allocate(scope, &Shape::matrix(batch, capacity))
                    .map(Some)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut nodes = BTreeMap::new();
        for step in plan.steps_of(StepKind::Forward) {
            let node = network.require_node(&step.node)?;
            let mut buffers = NodeBuffers::default();
            for (param, shape) in node.param_shapes() {
                let mut values = self.backend.allocate(scope, &shape)?;
                match network.values.parameter(&node.id, param.key) {
                    Some(stored) if stored.len() == values.len() => {
                        values.copy_from_slice(stored.as_slice())
                    }
                    Some(stored) => {
                        return Err(RuntimeError::Binding(format!(
                            "parameter '{}' of node '{}' holds {} values, shape {shape} needs {}",
                            param.key,
                            node.id,
                            stored.len(),
                            values.len()
                        )))
                    }
                    None => initialize(param, &shape, &mut values, &mut rng),
                }
                let grad = if plan.pass == PassType::Training && param.trainable {
                    Some(self.backend.allocate(scope, &shape)?)
                } else {
                    None
                };
                buffers.params.push(values);
                buffers.grads.push(grad);
            }
            if step.prepare {
                buffers.mask = Some(
                    self.backend
                        .allocate(scope, &node.output_dims.batched_shape(batch))?,
                );
            }
            nodes.insert(node.id.clone(), buffers);
        }

        tracing::info!(
            "bound {} pass: {} slots, {} nodes, {} bytes in scope '{}'",
            plan.pass.as_str(),
            slots.len(),
            nodes.len(),
            scope.report().live_bytes,
            scope.label()
        );

        Ok(ExecutionState {
            scope,
            network,
            plan,
            batch_size: batch,
            slots,
            nodes,
            prepared: HashSet::new(),
            prepare_counts: BTreeMap::new(),
            forward_passes: 0,
            rng,
            losses: BTreeMap::new(),
            metrics: TraversalMetrics::new(batch),
            _phase: PhantomData,
        })
    }

    /// Runs every step of the plan once.
    ///
    /// Inputs are read from `feed` under their slot names; training
    /// traversals also need a target under every output slot name.
    pub fn traverse<'s, S: ExecutionPhase>(
        &self,
        state: ExecutionState<'s, S>,
        feed: &Feed,
    ) -> Result<ExecutedNetwork<'s>, RuntimeError> {
        let mut state = state;
        let plan = state.plan;
        state.prepared.clear();
        state.losses.clear();
        state.forward_passes = 0;
        state.metrics = TraversalMetrics::new(state.batch_size);

        state.load_inputs(feed)?;
        if plan.pass == PassType::Training {
            state.check_targets(feed)?;
        }

        let started = Instant::now();
        for step in &plan.steps {
            let step_started = Instant::now();
            state.execute_step(&self.backend, step, feed)?;
            if self.config.enable_profiling {
                state
                    .metrics
                    .record_step(&step.node, step.kind, step_started.elapsed());
            }
        }
        state.forward_passes += 1;
        state
            .metrics
            .finalise(started.elapsed(), state.scope.report().peak_bytes);
        tracing::debug!("{}", state.metrics.summary());

        Ok(state.into_phase())
    }

    /// Re-runs only the forward steps of the current traversal.
    ///
    /// Prepare-forward hooks are not run again, so random masks stay as the
    /// traversal drew them. Loss values are refreshed; gradients are not.
    pub fn forward<'s>(
        &self,
        state: ExecutedNetwork<'s>,
        feed: &Feed,
    ) -> Result<ExecutedNetwork<'s>, RuntimeError> {
        let mut state = state;
        let plan = state.plan;
        state.load_inputs(feed)?;
        for step in plan.steps_of(StepKind::Forward) {
            state.execute_step(&self.backend, step, feed)?;
        }
        state.forward_passes += 1;
        state.compute_losses(feed)?;
        Ok(state)
    }

    /// Applies the accumulated parameter gradients through `optimizer` and
    /// zeroes them.
    pub fn apply_gradients<'s>(
        &self,
        state: ExecutedNetwork<'s>,
        optimizer: &mut dyn Optimizer,
    ) -> Result<BoundNetwork<'s>, RuntimeError> {
        let mut state = state;
        let network = state.network;
        let mut updated = 0;
        for (id, buffers) in state.nodes.iter_mut() {
            let node = network.require_node(id)?;
            let NodeBuffers { params, grads, .. } = buffers;
            for ((desc, values), grad) in node
                .metadata()
                .params
                .iter()
                .zip(params.iter_mut())
                .zip(grads.iter_mut())
            {
                if let Some(grad) = grad {
                    optimizer.update(id, desc.key, values.as_mut_slice(), grad.as_slice());
                    updated += 1;
                }
            }
        }
        state.clear_parameter_gradients();
        tracing::debug!("{} updated {updated} parameters", optimizer.name());
        Ok(state.into_phase())
    }

    /// Copies parameters and retained buffers out of the scope into a new
    /// network.
    ///
    /// Saved activations and gradients are batched tensors keyed by node id;
    /// nodes inactive for the pass carry their ancestor's values.
    pub fn save_to_network<S: ExecutionPhase>(
        &self,
        state: &ExecutionState<'_, S>,
        options: SaveOptions,
    ) -> Result<Network<Verified>, RuntimeError> {
        let source = state.network;
        let batch = state.batch_size;
        let mut network = source.clone();
        network.values.clear_results();

        for (id, buffers) in &state.nodes {
            let node = source.require_node(id)?;
            for ((desc, shape), values) in node.param_shapes().zip(&buffers.params) {
                let tensor =
                    Tensor::from_f32(shape.clone(), values).map_err(RuntimeError::tensor(id))?;
                network.values.set_parameter(id, desc.key, tensor);
                if !options.save_gradients {
                    continue;
                }
                if let Some(grad) = state.parameter_gradient(id, desc.key) {
                    let tensor = Tensor::from_f32(shape, grad).map_err(RuntimeError::tensor(id))?;
                    network
                        .values
                        .parameter_gradients
                        .entry(id.clone())
                        .or_default()
                        .insert(desc.key.to_string(), tensor);
                }
            }
        }

        for node in source.iter_nodes() {
            let shape = node.output_dims.batched_shape(batch);
            if let Some(values) = state.retained_activation(&node.id) {
                let tensor =
                    Tensor::from_f32(shape.clone(), values).map_err(RuntimeError::tensor(&node.id))?;
                network.values.buffers.insert(node.id.clone(), tensor);
            }
            if options.save_gradients {
                if let Some(values) = state.retained_gradient(&node.id) {
                    let tensor =
                        Tensor::from_f32(shape, values).map_err(RuntimeError::tensor(&node.id))?;
                    network.values.gradients.insert(node.id.clone(), tensor);
                }
            }
        }

        tracing::info!(
            "saved {} parameter sets, {} buffers, {} gradients",
            network.values.parameters.len(),
            network.values.buffers.len(),
            network.values.gradients.len()
        );
        Ok(network)
    }

    /// Plans, binds and runs one inference traversal in its own scope and
    /// returns the outputs by slot.
    pub fn infer(
        &self,
        network: &Network<Verified>,
        feed: &Feed,
    ) -> Result<BTreeMap<String, Tensor>, RuntimeError> {
        let plan = self.plan(network, PassType::Inference, &[], &[], &PlanOptions::default())?;
        self.with_scope("infer", |scope| {
            let bound = self.bind(scope, network, &plan)?;
            let executed = self.traverse(bound, feed)?;
            collect_outputs(&executed)
        })
    }

    /// Runs one training traversal, applies the gradients and returns the
    /// updated network with the loss before the update.
    pub fn train_step(
        &self,
        network: &Network<Verified>,
        feed: &Feed,
        optimizer: &mut dyn Optimizer,
    ) -> Result<(Network<Verified>, f32), RuntimeError> {
        let plan = self.plan(network, PassType::Training, &[], &[], &PlanOptions::default())?;
        self.with_scope("train", |scope| {
            let bound = self.bind(scope, network, &plan)?;
            let executed = self.traverse(bound, feed)?;
            let loss = executed.loss();
            let bound = self.apply_gradients(executed, optimizer)?;
            Ok((self.save_to_network(&bound, SaveOptions::default())?, loss))
        })
    }
}

fn collect_outputs(state: &ExecutedNetwork<'_>) -> Result<BTreeMap<String, Tensor>, RuntimeError> {
    let mut outputs = BTreeMap::new();
    for binding in &state.plan.outputs {
        let node = state.network.require_node(&binding.node)?;
        let values = state.output(&binding.slot).ok_or_else(|| {
            RuntimeError::execution(&binding.node, "output buffer was not retained")
        })?;
        let tensor = Tensor::from_f32(node.output_dims.batched_shape(state.batch_size), values)
            .map_err(RuntimeError::tensor(&binding.node))?;
        outputs.insert(binding.slot.clone(), tensor);
    }
    Ok(outputs)
}
