// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Central-difference gradient checking.

use crate::backend::Backend;
use crate::state::{BoundNetwork, ExecutedNetwork, Feed};
use crate::{ExecutionContext, RuntimeError};
use model_ir::PassType;

/// Outcome of [`gradient_check`].
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct GradientCheck {
    /// Number of scalar parameters compared.
    pub checked: usize,
    pub max_abs_error: f32,
    /// Largest `|numeric - analytic| / max(1, |numeric|, |analytic|)`.
    pub max_rel_error: f32,
    /// `(node, parameter, index)` of the largest relative error.
    pub worst: Option<(String, String, usize)>,
    /// Forward sweeps run, the initial traversal included.
    pub forward_passes: usize,
}

impl GradientCheck {
    pub fn passes(&self, tolerance: f32) -> bool {
        self.max_rel_error <= tolerance
    }
}

fn scalar<'a>(
    state: &'a mut ExecutedNetwork<'_>,
    node: &str,
    index: usize,
    element: usize,
) -> Result<&'a mut f32, RuntimeError> {
    state
        .nodes
        .get_mut(node)
        .and_then(|n| n.params.get_mut(index))
        .and_then(|p| p.get_mut(element))
        .ok_or_else(|| RuntimeError::execution(node, "parameter vanished during the check"))
}

/// Compares analytic parameter gradients against central differences of the
/// loss.
///
/// Runs one training traversal, then two forward sweeps per trainable scalar
/// without re-preparing, so random masks stay fixed throughout. Parameters
/// are restored afterwards; activations reflect the last perturbed sweep.
pub fn gradient_check<'s, B: Backend>(
    ctx: &ExecutionContext<B>,
    bound: BoundNetwork<'s>,
    feed: &Feed,
    epsilon: f32,
) -> Result<(ExecutedNetwork<'s>, GradientCheck), RuntimeError> {
    if bound.plan.pass != PassType::Training {
        return Err(RuntimeError::Config(
            "gradient checking needs a training plan".into(),
        ));
    }
    if !(epsilon > 0.0) {
        return Err(RuntimeError::Config(format!(
            "gradient check epsilon must be positive, got {epsilon}"
        )));
    }

    let mut state = ctx.traverse(bound, feed)?;
    let mut analytic = Vec::new();
    for (node, buffers) in &state.nodes {
        let descs = state
            .network
            .require_node(node)?
            .metadata()
            .params;
        for (index, (desc, grad)) in descs.iter().zip(&buffers.grads).enumerate() {
            if let Some(grad) = grad {
                analytic.push((node.clone(), desc.key, index, grad.to_vec()));
            }
        }
    }

    let mut report = GradientCheck::default();
    for (node, key, index, grads) in analytic {
        for (element, &expected) in grads.iter().enumerate() {
            let original = *scalar(&mut state, &node, index, element)?;

            *scalar(&mut state, &node, index, element)? = original + epsilon;
            state = ctx.forward(state, feed)?;
            let plus = state.loss();

            *scalar(&mut state, &node, index, element)? = original - epsilon;
            state = ctx.forward(state, feed)?;
            let minus = state.loss();

            *scalar(&mut state, &node, index, element)? = original;

            let numeric = (plus - minus) / (2.0 * epsilon);
            let abs = (numeric - expected).abs();
            let rel = abs / 1.0f32.max(numeric.abs()).max(expected.abs());
            report.checked += 1;
            report.max_abs_error = report.max_abs_error.max(abs);
            if rel > report.max_rel_error || report.worst.is_none() {
                report.max_rel_error = report.max_rel_error.max(rel);
                report.worst = Some((node.clone(), key.to_string(), element));
            }
        }
    }
    report.forward_passes = state.forward_passes();

    tracing::info!(
        "gradient check: {} parameters, max abs error {:.3e}, max rel error {:.3e}",
        report.checked,
        report.max_abs_error,
        report.max_rel_error
    );
    Ok((state, report))
}
