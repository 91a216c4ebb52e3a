// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Batch normalization.
//!
//! Every element of a sample is its own feature: statistics are taken across
//! the batch dimension only, so all per-feature slices have `features`
//! elements and the batch size is derived from the input length.

use crate::error::check_len;
use crate::TensorError;

/// Learned affine parameters of a batch-normalization layer.
#[derive(Debug, Clone, Copy)]
pub struct BatchNormParams<'a> {
    pub scale: &'a [f32],
    pub bias: &'a [f32],
    pub epsilon: f32,
}

/// Running statistics updated during training and read during inference.
///
/// After each training batch:
/// `running = ave_factor · running + (1 − ave_factor) · batch`.
#[derive(Debug)]
pub struct RunningStats<'a> {
    pub means: &'a mut [f32],
    pub variances: &'a mut [f32],
    pub ave_factor: f32,
}

/// Batch statistics saved by the training forward pass for the backward pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchStats {
    pub means: Vec<f32>,
    pub inv_std: Vec<f32>,
}

impl BatchNormParams<'_> {
    fn features(&self) -> usize {
        self.scale.len()
    }

    fn check(&self, op: &'static str, data_len: usize) -> Result<usize, TensorError> {
        let features = self.features();
        check_len(op, "bias", features, self.bias.len())?;
        if features == 0 || data_len % features != 0 {
            return Err(TensorError::LengthMismatch {
                op,
                what: "input",
                expected: features,
                actual: data_len,
            });
        }
        if !(self.epsilon > 0.0) {
            return Err(TensorError::Numeric {
                op,
                detail: format!("epsilon must be positive, got {}", self.epsilon),
            });
        }
        Ok(data_len / features)
    }
}

/// Normalizes with the supplied running statistics.
pub fn batch_norm_inference(
    input: &[f32],
    output: &mut [f32],
    params: &BatchNormParams<'_>,
    means: &[f32],
    variances: &[f32],
) -> Result<(), TensorError> {
    const OP: &str = "batch_norm_inference";
    params.check(OP, input.len())?;
    let features = params.features();
    check_len(OP, "output", input.len(), output.len())?;
    check_len(OP, "means", features, means.len())?;
    check_len(OP, "variances", features, variances.len())?;

    for (x, y) in input.chunks_exact(features).zip(output.chunks_exact_mut(features)) {
        for f in 0..features {
            let inv_std = 1.0 / (variances[f] + params.epsilon).sqrt();
            y[f] = params.scale[f] * (x[f] - means[f]) * inv_std + params.bias[f];
        }
    }
    Ok(())
}

/// Normalizes with the batch's own statistics, folds them into `running`
/// and returns them for the backward pass.
pub fn batch_norm_training(
    input: &[f32],
    output: &mut [f32],
    params: &BatchNormParams<'_>,
    running: &mut RunningStats<'_>,
) -> Result<BatchStats, TensorError> {
    const OP: &str = "batch_norm_training";
    let batch = params.check(OP, input.len())?;
    let features = params.features();
    check_len(OP, "output", input.len(), output.len())?;
    check_len(OP, "running means", features, running.means.len())?;
    check_len(OP, "running variances", features, running.variances.len())?;

    let n = batch as f32;
    let mut means = vec![0.0f32; features];
    let mut variances = vec![0.0f32; features];
    for x in input.chunks_exact(features) {
        for (m, &v) in means.iter_mut().zip(x) {
            *m += v;
        }
    }
    means.iter_mut().for_each(|m| *m /= n);
    for x in input.chunks_exact(features) {
        for f in 0..features {
            let d = x[f] - means[f];
            variances[f] += d * d;
        }
    }
    variances.iter_mut().for_each(|v| *v /= n);

    let inv_std: Vec<f32> = variances
        .iter()
        .map(|v| 1.0 / (v + params.epsilon).sqrt())
        .collect();

    for (x, y) in input.chunks_exact(features).zip(output.chunks_exact_mut(features)) {
        for f in 0..features {
            y[f] = params.scale[f] * (x[f] - means[f]) * inv_std[f] + params.bias[f];
        }
    }

    let keep = running.ave_factor;
    for f in 0..features {
        running.means[f] = keep * running.means[f] + (1.0 - keep) * means[f];
        running.variances[f] = keep * running.variances[f] + (1.0 - keep) * variances[f];
    }

    Ok(BatchStats { means, inv_std })
}

/// Accumulates input, scale and bias gradients of a training-mode
/// batch normalization.
pub fn batch_norm_backward(
    input: &[f32],
    output_grad: &[f32],
    input_grad: &mut [f32],
    params: &BatchNormParams<'_>,
    stats: &BatchStats,
    scale_grad: &mut [f32],
    bias_grad: &mut [f32],
) -> Result<(), TensorError> {
    const OP: &str = "batch_norm_backward";
    let batch = params.check(OP, input.len())?;
    let features = params.features();
    check_len(OP, "output_grad", input.len(), output_grad.len())?;
    check_len(OP, "input_grad", input.len(), input_grad.len())?;
    check_len(OP, "batch means", features, stats.means.len())?;
    check_len(OP, "batch inv_std", features, stats.inv_std.len())?;
    check_len(OP, "scale_grad", features, scale_grad.len())?;
    check_len(OP, "bias_grad", features, bias_grad.len())?;

    let n = batch as f32;
    let normalized = |x: f32, f: usize| (x - stats.means[f]) * stats.inv_std[f];

    // Per-feature sums of dy and dy·x̂.
    let mut sum_dy = vec![0.0f32; features];
    let mut sum_dy_xhat = vec![0.0f32; features];
    for (x, dy) in input.chunks_exact(features).zip(output_grad.chunks_exact(features)) {
        for f in 0..features {
            sum_dy[f] += dy[f];
            sum_dy_xhat[f] += dy[f] * normalized(x[f], f);
        }
    }

    for ((x, dy), dx) in input
        .chunks_exact(features)
        .zip(output_grad.chunks_exact(features))
        .zip(input_grad.chunks_exact_mut(features))
    {
        for f in 0..features {
            let xhat = normalized(x[f], f);
            dx[f] += params.scale[f] * stats.inv_std[f] / n
                * (n * dy[f] - sum_dy[f] - xhat * sum_dy_xhat[f]);
        }
    }

    for f in 0..features {
        scale_grad[f] += sum_dy_xhat[f];
        bias_grad[f] += sum_dy[f];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_inference_identity_stats() {
        let params = BatchNormParams {
            scale: &[2.0, 1.0],
            bias: &[0.5, 0.0],
            epsilon: EPS,
        };
        let mut y = [0.0f32; 2];
        batch_norm_inference(&[1.0, -3.0], &mut y, &params, &[0.0, 0.0], &[1.0, 1.0]).unwrap();
        assert!((y[0] - 2.5).abs() < 1e-3);
        assert!((y[1] + 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_training_normalizes_batch() {
        let params = BatchNormParams {
            scale: &[1.0],
            bias: &[0.0],
            epsilon: EPS,
        };
        let mut means = [0.0f32];
        let mut variances = [1.0f32];
        let mut running = RunningStats {
            means: &mut means,
            variances: &mut variances,
            ave_factor: 0.9,
        };
        let mut y = [0.0f32; 4];
        let stats = batch_norm_training(&[1.0, 2.0, 3.0, 4.0], &mut y, &params, &mut running).unwrap();

        assert!((stats.means[0] - 2.5).abs() < 1e-6);
        let mean: f32 = y.iter().sum::<f32>() / 4.0;
        let var: f32 = y.iter().map(|v| v * v).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-3);

        // 0.9 · 0 + 0.1 · 2.5 and 0.9 · 1 + 0.1 · 1.25
        assert!((means[0] - 0.25).abs() < 1e-6);
        assert!((variances[0] - 1.025).abs() < 1e-6);
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        let scale = [1.5f32];
        let bias = [0.2f32];
        let params = BatchNormParams {
            scale: &scale,
            bias: &bias,
            epsilon: EPS,
        };
        let x = [0.3f32, -1.2, 0.8];
        // Loss: weighted sum of outputs.
        let w = [1.0f32, -2.0, 0.5];
        let loss = |x: &[f32]| {
            let mut m = [0.0f32];
            let mut v = [0.0f32];
            let mut running = RunningStats {
                means: &mut m,
                variances: &mut v,
                ave_factor: 0.5,
            };
            let mut y = [0.0f32; 3];
            batch_norm_training(x, &mut y, &params, &mut running).unwrap();
            y.iter().zip(&w).map(|(a, b)| a * b).sum::<f32>()
        };

        let mut m = [0.0f32];
        let mut v = [0.0f32];
        let mut running = RunningStats {
            means: &mut m,
            variances: &mut v,
            ave_factor: 0.5,
        };
        let mut y = [0.0f32; 3];
        let stats = batch_norm_training(&x, &mut y, &params, &mut running).unwrap();
        let mut dx = [0.0f32; 3];
        let mut dscale = [0.0f32];
        let mut dbias = [0.0f32];
        batch_norm_backward(&x, &w, &mut dx, &params, &stats, &mut dscale, &mut dbias).unwrap();

        let h = 1e-2f32;
        for i in 0..3 {
            let mut plus = x;
            plus[i] += h;
            let mut minus = x;
            minus[i] -= h;
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * h);
            assert!((dx[i] - numeric).abs() < 2e-2, "dx[{i}] {} vs {numeric}", dx[i]);
        }
        assert!((dbias[0] - w.iter().sum::<f32>()).abs() < 1e-5);
    }

    #[test]
    fn test_rejects_ragged_input() {
        let params = BatchNormParams {
            scale: &[1.0, 1.0],
            bias: &[0.0, 0.0],
            epsilon: EPS,
        };
        let mut y = [0.0f32; 3];
        assert!(batch_norm_inference(&[0.0; 3], &mut y, &params, &[0.0; 2], &[1.0; 2]).is_err());
    }
}
