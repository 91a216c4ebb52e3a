// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fully connected (linear) layer kernels.
//!
//! Weights are stored `[out, in]`, so `y = x @ Wᵀ + b`.

use super::{gemm, Transpose};
use crate::error::check_len;
use crate::TensorError;

/// `output[b, o] = Σᵢ input[b, i] · weights[o, i] + bias[o]`.
pub fn linear_forward(
    input: &[f32],
    weights: &[f32],
    bias: &[f32],
    output: &mut [f32],
    batch_size: usize,
    in_size: usize,
    out_size: usize,
) -> Result<(), TensorError> {
    const OP: &str = "linear_forward";
    check_len(OP, "input", batch_size * in_size, input.len())?;
    check_len(OP, "weights", out_size * in_size, weights.len())?;
    check_len(OP, "bias", out_size, bias.len())?;
    check_len(OP, "output", batch_size * out_size, output.len())?;

    for row in output.chunks_exact_mut(out_size) {
        row.copy_from_slice(bias);
    }
    gemm(
        input,
        Transpose::No,
        weights,
        Transpose::Yes,
        output,
        (batch_size, in_size, out_size),
        true,
    );
    Ok(())
}

/// Accumulates `input_grad += output_grad @ weights`.
pub fn linear_backward_input(
    output_grad: &[f32],
    weights: &[f32],
    input_grad: &mut [f32],
    batch_size: usize,
    in_size: usize,
    out_size: usize,
) -> Result<(), TensorError> {
    const OP: &str = "linear_backward_input";
    check_len(OP, "output_grad", batch_size * out_size, output_grad.len())?;
    check_len(OP, "weights", out_size * in_size, weights.len())?;
    check_len(OP, "input_grad", batch_size * in_size, input_grad.len())?;

    gemm(
        output_grad,
        Transpose::No,
        weights,
        Transpose::No,
        input_grad,
        (batch_size, out_size, in_size),
        true,
    );
    Ok(())
}

/// Accumulates `weight_grad += output_gradᵀ @ input` and
/// `bias_grad += Σ_b output_grad[b]`.
pub fn linear_backward_params(
    input: &[f32],
    output_grad: &[f32],
    weight_grad: &mut [f32],
    bias_grad: &mut [f32],
    batch_size: usize,
    in_size: usize,
    out_size: usize,
) -> Result<(), TensorError> {
    const OP: &str = "linear_backward_params";
    check_len(OP, "input", batch_size * in_size, input.len())?;
    check_len(OP, "output_grad", batch_size * out_size, output_grad.len())?;
    check_len(OP, "weight_grad", out_size * in_size, weight_grad.len())?;
    check_len(OP, "bias_grad", out_size, bias_grad.len())?;

    gemm(
        output_grad,
        Transpose::Yes,
        input,
        Transpose::No,
        weight_grad,
        (out_size, batch_size, in_size),
        true,
    );
    for row in output_grad.chunks_exact(out_size) {
        for (g, &d) in bias_grad.iter_mut().zip(row) {
            *g += d;
        }
    }
    Ok(())
}
