// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `netforge run`: one inference traversal on seeded random input.

use model_ir::PassType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use runtime::{ExecutionContext, Feed, RuntimeConfig};
use std::path::Path;
use tensor_core::{Shape, Tensor};
use traversal_planner::{default_inputs, PlanOptions};

pub fn execute(
    description: &Path,
    mut config: RuntimeConfig,
    batch_size: Option<usize>,
) -> anyhow::Result<()> {
    if let Some(batch_size) = batch_size {
        config.batch_size = batch_size;
    }
    let network = super::load_network(description)?;
    let batch = config.batch_size;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let ctx = ExecutionContext::new(config)?;

    let mut feed = Feed::new();
    for binding in default_inputs(&network) {
        let node = network.require_node(&binding.node)?;
        let size = node.output_size();
        let values: Vec<f32> = (0..batch * size).map(|_| rng.gen_range(-1.0..1.0)).collect();
        feed.insert(binding.slot, Tensor::from_vec(Shape::matrix(batch, size), values)?);
    }

    let plan = ctx.plan(&network, PassType::Inference, &[], &[], &PlanOptions::default())?;
    println!("  {}", network.summary());
    println!("  {}", plan.summary());
    println!();

    let (outputs, metrics) = ctx.with_scope("run", |scope| {
        let bound = ctx.bind(scope, &network, &plan)?;
        let executed = ctx.traverse(bound, &feed)?;
        let outputs: Vec<(String, Vec<f32>)> = executed
            .outputs()
            .into_iter()
            .map(|(slot, values)| (slot.to_string(), values.to_vec()))
            .collect();
        Ok((outputs, executed.metrics().clone()))
    })?;

    println!("  Outputs:");
    for (slot, values) in &outputs {
        for (i, row) in values.chunks((values.len() / batch.max(1)).max(1)).enumerate() {
            let shown: Vec<String> = row.iter().take(10).map(|v| format!("{v:.4}")).collect();
            let more = if row.len() > 10 { " ..." } else { "" };
            println!("   {slot}[{i}]: [{}]{more}", shown.join(", "));
        }
    }
    println!();
    println!("  Metrics:");
    println!("   {}", metrics.summary());
    println!("   {}", ctx.pool().stats().summary());
    Ok(())
}
