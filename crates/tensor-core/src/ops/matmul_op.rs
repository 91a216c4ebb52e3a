// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Matrix multiplication operation.

use crate::{Shape, Tensor, TensorError};

/// Performs matrix multiplication: `output = lhs @ rhs`.
///
/// Both inputs must be 2-D tensors with compatible inner dimensions:
/// `lhs` is `[M, K]`, `rhs` is `[K, N]`, and `output` must be `[M, N]`.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if dimensions are incompatible.
pub fn matmul(lhs: &Tensor, rhs: &Tensor, output: &mut Tensor) -> Result<(), TensorError> {
    if !lhs.shape().is_matmul_compatible(rhs.shape()) {
        return Err(TensorError::ShapeMismatch {
            op: "matmul",
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }

    let m = lhs.shape().dims()[0];
    let k = lhs.shape().dims()[1];
    let n = rhs.shape().dims()[1];

    let expected_shape = Shape::matrix(m, n);
    if output.shape() != &expected_shape {
        return Err(TensorError::ShapeMismatch {
            op: "matmul (output)",
            lhs: expected_shape,
            rhs: output.shape().clone(),
        });
    }

    gemm(
        lhs.as_slice(),
        Transpose::No,
        rhs.as_slice(),
        Transpose::No,
        output.as_mut_slice(),
        (m, k, n),
        false,
    );
    Ok(())
}

/// Whether a gemm operand is stored transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transpose {
    No,
    Yes,
}

/// General matrix multiply on flat slices: `c (+)= op(a) @ op(b)`.
///
/// `op(a)` is `[m, k]` and `op(b)` is `[k, n]`. A transposed operand is
/// stored in the opposite orientation (`a` as `[k, m]`, `b` as `[n, k]`).
/// When `accumulate` is false, `c` is zeroed first.
///
/// Callers are responsible for slice lengths.
pub(crate) fn gemm(
    a: &[f32],
    ta: Transpose,
    b: &[f32],
    tb: Transpose,
    c: &mut [f32],
    (m, k, n): (usize, usize, usize),
    accumulate: bool,
) {
    if !accumulate {
        c.iter_mut().for_each(|x| *x = 0.0);
    }

    let a_at = |i: usize, p: usize| match ta {
        Transpose::No => a[i * k + p],
        Transpose::Yes => a[p * m + i],
    };

    match tb {
        // ikj loop order: the inner loop is a saxpy over a row of B,
        // which is sequential in memory.
        Transpose::No => {
            for i in 0..m {
                let c_row = &mut c[i * n..(i + 1) * n];
                for p in 0..k {
                    let a_ip = a_at(i, p);
                    if a_ip == 0.0 {
                        continue;
                    }
                    let b_row = &b[p * n..(p + 1) * n];
                    for (cj, &bj) in c_row.iter_mut().zip(b_row) {
                        *cj += a_ip * bj;
                    }
                }
            }
        }
        // Rows of a transposed B are columns of op(B): dot products.
        Transpose::Yes => {
            for i in 0..m {
                for j in 0..n {
                    let b_row = &b[j * k..(j + 1) * k];
                    let mut acc = 0.0f32;
                    for (p, &bp) in b_row.iter().enumerate() {
                        acc += a_at(i, p) * bp;
                    }
                    c[i * n + j] += acc;
                }
            }
        }
    }
}
