// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise activation functions.
//!
//! Backward passes are expressed in terms of the forward *output*, which is
//! what the execution engine keeps alive between passes.

use crate::error::check_len;
use crate::TensorError;

/// Element-wise non-linearities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activation {
    /// `max(0, x)`
    Relu,
    /// `1 / (1 + e^-x)`
    Logistic,
    /// `tanh(x)`
    Tanh,
}

impl Activation {
    #[inline]
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Logistic => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
        }
    }

    /// Derivative expressed through the forward output `y`.
    #[inline]
    fn derivative_from_output(self, y: f32) -> f32 {
        match self {
            Activation::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Logistic => y * (1.0 - y),
            Activation::Tanh => 1.0 - y * y,
        }
    }
}

/// Applies `activation` element-wise, overwriting `output`.
pub fn activation_forward(
    activation: Activation,
    input: &[f32],
    output: &mut [f32],
) -> Result<(), TensorError> {
    check_len("activation_forward", "output", input.len(), output.len())?;
    for (y, &x) in output.iter_mut().zip(input) {
        *y = activation.apply(x);
    }
    Ok(())
}

/// Accumulates `input_grad += f'(x) · output_grad`, with `f'` evaluated
/// from the forward `output`.
pub fn activation_backward(
    activation: Activation,
    output: &[f32],
    output_grad: &[f32],
    input_grad: &mut [f32],
) -> Result<(), TensorError> {
    const OP: &str = "activation_backward";
    check_len(OP, "output_grad", output.len(), output_grad.len())?;
    check_len(OP, "input_grad", output.len(), input_grad.len())?;
    for ((dx, &dy), &y) in input_grad.iter_mut().zip(output_grad).zip(output) {
        *dx += activation.derivative_from_output(y) * dy;
    }
    Ok(())
}
