// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `netforge plan`: print the traversal plan of a description.

use model_ir::PassType;
use runtime::RuntimeConfig;
use std::path::Path;
use traversal_planner::{plan_with, PlanOptions};

pub fn execute(
    description: &Path,
    config: &RuntimeConfig,
    pass: PassType,
    save_gradients: bool,
    json: bool,
) -> anyhow::Result<()> {
    let network = super::load_network(description)?;
    let strategy = config.create_strategy()?;
    let options = PlanOptions { save_gradients };
    let plan = plan_with(&network, pass, &[], &[], &options, strategy.as_ref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{plan}");
    let batched = plan.slot_elements() * config.batch_size;
    println!(
        "  Slot memory at batch {}: {:.2} KB ({} elements across {} buffers without reuse)",
        config.batch_size,
        (batched * std::mem::size_of::<f32>()) as f64 / 1024.0,
        plan.slot_elements(),
        plan.buffer_elements(),
    );
    Ok(())
}
