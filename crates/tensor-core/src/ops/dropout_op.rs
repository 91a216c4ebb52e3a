// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dropout mask application.
//!
//! Mask generation is the caller's business (it owns the RNG); a mask holds
//! `0` for dropped units and `1 / keep_probability` for kept ones.

use crate::error::check_len;
use crate::TensorError;

/// `output = input ⊙ mask`.
pub fn dropout_forward(input: &[f32], mask: &[f32], output: &mut [f32]) -> Result<(), TensorError> {
    const OP: &str = "dropout_forward";
    check_len(OP, "mask", input.len(), mask.len())?;
    check_len(OP, "output", input.len(), output.len())?;
    for ((y, &x), &m) in output.iter_mut().zip(input).zip(mask) {
        *y = x * m;
    }
    Ok(())
}

/// `input_grad += output_grad ⊙ mask`.
pub fn dropout_backward(
    output_grad: &[f32],
    mask: &[f32],
    input_grad: &mut [f32],
) -> Result<(), TensorError> {
    const OP: &str = "dropout_backward";
    check_len(OP, "mask", output_grad.len(), mask.len())?;
    check_len(OP, "input_grad", output_grad.len(), input_grad.len())?;
    for ((dx, &dy), &m) in input_grad.iter_mut().zip(output_grad).zip(mask) {
        *dx += dy * m;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropout_roundtrip() {
        let mask = [0.0, 2.0, 2.0, 0.0];
        let mut y = [0.0f32; 4];
        dropout_forward(&[1.0, 2.0, 3.0, 4.0], &mask, &mut y).unwrap();
        assert_eq!(y, [0.0, 4.0, 6.0, 0.0]);

        let mut dx = [0.0f32; 4];
        dropout_backward(&[1.0; 4], &mask, &mut dx).unwrap();
        assert_eq!(dx, mask);
    }
}
