// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runs an imported model and compares every reference layer output.

use crate::compare::{outputs_agree, Mismatch};
use crate::{ImportedModel, LayerOutput, VerifyError};
use model_ir::{build, LayerDesc, PassType};
use runtime::{Backend, ExecutionContext, Feed};
use tensor_core::{Shape, Tensor};
use traversal_planner::{default_inputs, PlanOptions};

/// Builds `description`, runs one inference traversal on `input` and returns
/// one [`Mismatch`] per reference layer whose output is out of tolerance.
///
/// The traversal retains every buffer, so intermediate layers can be
/// compared. Nodes inactive during inference (dropout) are compared against
/// their input. Reference outputs are single-sample, so the network is bound
/// with a batch of one whatever the context's configured batch size. An empty
/// result means full agreement.
pub fn verify<B: Backend>(
    ctx: &ExecutionContext<B>,
    description: &[LayerDesc],
    input: &[f32],
    references: &[LayerOutput],
) -> Result<Vec<Mismatch>, VerifyError> {
    let network = build(description).verify()?;
    if let Some(unknown) = references.iter().find(|r| network.node(&r.id).is_none()) {
        return Err(VerifyError::UnknownLayer(unknown.id.clone()));
    }

    let plan = ctx.plan(
        &network,
        PassType::Inference,
        &[],
        &[],
        &PlanOptions::saving_gradients(),
    )?;
    let slot = default_inputs(&network)
        .into_iter()
        .next()
        .map(|b| b.slot)
        .unwrap_or_default();
    let mut feed = Feed::new();
    feed.insert(slot, Tensor::from_f32(Shape::vector(input.len()), input)?);

    let mismatches = ctx.with_scope("import-verify", |scope| {
        let bound = ctx.bind_with_batch_size(scope, &network, &plan, 1)?;
        let executed = ctx.traverse(bound, &feed)?;

        let mut mismatches = Vec::new();
        for reference in references {
            let actual = executed.activation(&reference.id).unwrap_or_default();
            if outputs_agree(actual, &reference.output) {
                continue;
            }
            let layer_input = network
                .node(&reference.id)
                .and_then(|n| n.parent())
                .and_then(|p| executed.activation(p))
                .unwrap_or(input);
            mismatches.push(Mismatch {
                layer_id: reference.id.clone(),
                input: layer_input.to_vec(),
                expected: reference.output.clone(),
                actual: actual.to_vec(),
            });
        }
        Ok(mismatches)
    })?;

    if mismatches.is_empty() {
        tracing::info!("all {} reference outputs agree", references.len());
    } else {
        for m in &mismatches {
            tracing::warn!("mismatch {m}");
        }
    }
    Ok(mismatches)
}

/// [`verify`] over an [`ImportedModel`].
pub fn verify_import<B: Backend>(
    ctx: &ExecutionContext<B>,
    import: &ImportedModel,
) -> Result<Vec<Mismatch>, VerifyError> {
    verify(ctx, &import.model, &import.input, &import.layer_outputs)
}
