// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Softmax activation operation.

use crate::error::check_len;
use crate::TensorError;

/// Computes softmax over consecutive rows of `row_len` elements:
/// `output[i] = exp(x[i] - max) / sum(exp(x - max))`.
///
/// Uses the numerically stable variant that subtracts the maximum value
/// before exponentiation to prevent overflow.
///
/// # Errors
/// Returns [`TensorError::LengthMismatch`] if input and output lengths differ
/// or are not a whole number of rows.
pub fn softmax(input: &[f32], output: &mut [f32], row_len: usize) -> Result<(), TensorError> {
    const OP: &str = "softmax";
    check_len(OP, "output", input.len(), output.len())?;
    check_rows(OP, input.len(), row_len)?;

    for (row_src, row_dst) in input.chunks_exact(row_len).zip(output.chunks_exact_mut(row_len)) {
        // Find max for numerical stability.
        let max_val = row_src.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        // Compute exp(x - max) and sum.
        let mut sum = 0.0f32;
        for (d, &s) in row_dst.iter_mut().zip(row_src.iter()) {
            let e = (s - max_val).exp();
            *d = e;
            sum += e;
        }

        if sum > 0.0 {
            let inv_sum = 1.0 / sum;
            for d in row_dst.iter_mut() {
                *d *= inv_sum;
            }
        }
    }

    Ok(())
}

/// Accumulates the softmax input gradient from its output:
/// `dx[i] += y[i] · (dy[i] - Σⱼ dy[j] · y[j])`.
pub fn softmax_backward(
    output: &[f32],
    output_grad: &[f32],
    input_grad: &mut [f32],
    row_len: usize,
) -> Result<(), TensorError> {
    const OP: &str = "softmax_backward";
    check_len(OP, "output_grad", output.len(), output_grad.len())?;
    check_len(OP, "input_grad", output.len(), input_grad.len())?;
    check_rows(OP, output.len(), row_len)?;

    for ((y, dy), dx) in output
        .chunks_exact(row_len)
        .zip(output_grad.chunks_exact(row_len))
        .zip(input_grad.chunks_exact_mut(row_len))
    {
        let dot: f32 = y.iter().zip(dy).map(|(a, b)| a * b).sum();
        for ((dxi, &yi), &dyi) in dx.iter_mut().zip(y).zip(dy) {
            *dxi += yi * (dyi - dot);
        }
    }
    Ok(())
}

fn check_rows(op: &'static str, len: usize, row_len: usize) -> Result<(), TensorError> {
    if row_len == 0 || len % row_len != 0 {
        return Err(TensorError::LengthMismatch {
            op,
            what: "row",
            expected: row_len,
            actual: len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: &[f32], b: &[f32], tol: f32) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
    }

    #[test]
    fn test_softmax_uniform() {
        let mut output = [0.0f32; 4];
        softmax(&[1.0, 1.0, 1.0, 1.0], &mut output, 4).unwrap();
        assert!(approx_eq(&output, &[0.25, 0.25, 0.25, 0.25], 1e-5));
    }

    #[test]
    fn test_softmax_monotonic() {
        let mut r = [0.0f32; 3];
        softmax(&[1.0, 2.0, 3.0], &mut r, 3).unwrap();
        assert!(r[0] < r[1]);
        assert!(r[1] < r[2]);
    }

    #[test]
    fn test_softmax_rows() {
        let mut r = [0.0f32; 6];
        softmax(&[1.0, 2.0, 3.0, 1.0, 1.0, 1.0], &mut r, 3).unwrap();
        let sum0: f32 = r[0..3].iter().sum();
        assert!((sum0 - 1.0).abs() < 1e-5);
        assert!(approx_eq(&r[3..6], &[1.0 / 3.0; 3], 1e-5));
    }

    #[test]
    fn test_softmax_numerical_stability() {
        let mut r = [0.0f32; 3];
        softmax(&[1000.0, 1001.0, 1002.0], &mut r, 3).unwrap();
        let sum: f32 = r.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(r.iter().all(|&x| x.is_finite()));
    }

    #[test]
    fn test_softmax_backward_cross_entropy_shortcut() {
        // With dy = -t / y the softmax gradient collapses to y - t.
        let mut y = [0.0f32; 3];
        softmax(&[0.2, -1.0, 0.7], &mut y, 3).unwrap();
        let t = [0.0, 1.0, 0.0];
        let dy: Vec<f32> = y.iter().zip(&t).map(|(yi, ti)| -ti / yi).collect();
        let mut dx = [0.0f32; 3];
        softmax_backward(&y, &dy, &mut dx, 3).unwrap();
        let expected: Vec<f32> = y.iter().zip(&t).map(|(yi, ti)| yi - ti).collect();
        assert!(approx_eq(&dx, &expected, 1e-5));
    }

    #[test]
    fn test_softmax_rejects_ragged_rows() {
        let mut r = [0.0f32; 5];
        assert!(softmax(&[0.0; 5], &mut r, 2).is_err());
    }
}
