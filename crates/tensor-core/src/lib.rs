// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Dense `f32` tensors and the reference numerical kernels the CPU backend
//! dispatches to.
//!
//! This crate provides:
//! - [`Tensor`]: an owned, row-major `f32` tensor.
//! - [`Shape`]: runtime shape descriptors, plus [`Rounding`] and
//!   [`window_output`] for convolution/pooling dimension arithmetic.
//! - Forward and backward kernels: linear, 2-D convolution, max pooling,
//!   batch normalization, element-wise activations, softmax, dropout.
//!
//! # Kernel Conventions
//! - Kernels operate on flat slices; activations are laid out as
//!   `[batch, channels, height, width]`.
//! - Forward kernels **overwrite** their output.
//! - Backward kernels **accumulate** (`+=`) into input gradients and
//!   parameter gradients, so a producer feeding several consumers receives
//!   the sum of their contributions.
//! - Every kernel validates slice lengths and returns [`TensorError`]
//!   instead of panicking.

mod error;
mod ops;
mod shape;
mod tensor;

pub use error::TensorError;
pub use ops::{
    activation_backward, activation_forward, batch_norm_backward, batch_norm_inference,
    batch_norm_training, conv2d_backward_input, conv2d_backward_params, conv2d_forward,
    dropout_backward, dropout_forward, linear_backward_input, linear_backward_params,
    linear_forward, matmul, max_pool_backward, max_pool_forward, softmax, softmax_backward,
    Activation, BatchNormParams, BatchStats, ConvGeometry, RunningStats,
};
pub use shape::{window_output, Rounding, Shape};
pub use tensor::Tensor;
