// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Loss values and the gradients that seed the backward pass.
//!
//! Both losses are averaged over the batch, so parameter gradients are
//! batch means as well.

use tensor_core::TensorError;
use traversal_planner::LossKind;

/// Probabilities are clamped to this before taking logarithms.
const MIN_PROBABILITY: f32 = 1e-12;

fn check(op: &'static str, output: &[f32], target: &[f32]) -> Result<(), TensorError> {
    if output.len() != target.len() {
        return Err(TensorError::LengthMismatch {
            op,
            what: "target",
            expected: output.len(),
            actual: target.len(),
        });
    }
    Ok(())
}

/// Evaluates the loss of `output` against `target`.
pub fn loss_value(
    kind: LossKind,
    output: &[f32],
    target: &[f32],
    batch_size: usize,
) -> Result<f32, TensorError> {
    check("loss_value", output, target)?;
    let batch = batch_size.max(1) as f32;
    let total: f32 = match kind {
        LossKind::MeanSquared => {
            0.5 * output
                .iter()
                .zip(target)
                .map(|(&y, &t)| (y - t) * (y - t))
                .sum::<f32>()
        }
        LossKind::CrossEntropy => -output
            .iter()
            .zip(target)
            .map(|(&y, &t)| t * y.max(MIN_PROBABILITY).ln())
            .sum::<f32>(),
    };
    Ok(total / batch)
}

/// Accumulates `∂loss/∂output` into `gradient`.
pub fn loss_gradient(
    kind: LossKind,
    output: &[f32],
    target: &[f32],
    gradient: &mut [f32],
    batch_size: usize,
) -> Result<(), TensorError> {
    check("loss_gradient", output, target)?;
    check("loss_gradient", output, gradient)?;
    let batch = batch_size.max(1) as f32;
    for ((g, &y), &t) in gradient.iter_mut().zip(output).zip(target) {
        *g += match kind {
            LossKind::MeanSquared => (y - t) / batch,
            LossKind::CrossEntropy => -t / (y.max(MIN_PROBABILITY) * batch),
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_squared() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let t = [1.0, 1.0, 1.0, 1.0];
        // 0.5 * (0 + 1 + 4 + 9) / 2
        assert_relative_eq!(loss_value(LossKind::MeanSquared, &y, &t, 2).unwrap(), 3.5);
        let mut g = [0.0; 4];
        loss_gradient(LossKind::MeanSquared, &y, &t, &mut g, 2).unwrap();
        assert_eq!(g, [0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_cross_entropy() {
        let y = [0.25, 0.75];
        let t = [0.0, 1.0];
        assert_relative_eq!(
            loss_value(LossKind::CrossEntropy, &y, &t, 1).unwrap(),
            -(0.75f32).ln(),
            epsilon = 1e-6
        );
        let mut g = [0.0; 2];
        loss_gradient(LossKind::CrossEntropy, &y, &t, &mut g, 1).unwrap();
        assert_relative_eq!(g[1], -1.0 / 0.75, epsilon = 1e-6);
        assert_eq!(g[0], 0.0);
    }

    #[test]
    fn test_cross_entropy_clamps_zero() {
        let v = loss_value(LossKind::CrossEntropy, &[0.0, 1.0], &[1.0, 0.0], 1).unwrap();
        assert!(v.is_finite());
    }

    #[test]
    fn test_gradient_accumulates() {
        let mut g = [1.0];
        loss_gradient(LossKind::MeanSquared, &[3.0], &[1.0], &mut g, 1).unwrap();
        assert_eq!(g, [3.0]);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(loss_value(LossKind::MeanSquared, &[1.0], &[1.0, 2.0], 1).is_err());
    }
}
