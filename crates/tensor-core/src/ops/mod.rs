// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Forward and backward kernels.
//!
//! Each operation works on caller-owned slices so the runtime can run them
//! directly against pooled buffers without intermediate allocation.

mod activation_op;
mod batch_norm_op;
mod conv_op;
mod dropout_op;
mod linear_op;
mod matmul_op;
mod pool_op;
mod softmax_op;

pub use activation_op::{activation_backward, activation_forward, Activation};
pub use batch_norm_op::{
    batch_norm_backward, batch_norm_inference, batch_norm_training, BatchNormParams, BatchStats,
    RunningStats,
};
pub use conv_op::{conv2d_backward_input, conv2d_backward_params, conv2d_forward, ConvGeometry};
pub use dropout_op::{dropout_backward, dropout_forward};
pub use linear_op::{linear_backward_input, linear_backward_params, linear_forward};
pub use matmul_op::matmul;
pub(crate) use matmul_op::{gemm, Transpose};
pub use pool_op::{max_pool_backward, max_pool_forward};
pub use softmax_op::{softmax, softmax_backward};
