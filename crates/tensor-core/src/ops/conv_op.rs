// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! 2-D convolution kernels (direct, no im2col).
//!
//! Weights are stored `[num_kernels, in_channels * kernel_height * kernel_width]`
//! with each row laid out `[channel][ky][kx]`.

use crate::error::check_len;
use crate::TensorError;

/// Window geometry shared by convolution and pooling kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConvGeometry {
    pub in_channels: usize,
    pub in_height: usize,
    pub in_width: usize,
    pub out_channels: usize,
    pub out_height: usize,
    pub out_width: usize,
    pub kernel_width: usize,
    pub kernel_height: usize,
    pub pad_x: usize,
    pub pad_y: usize,
    pub stride_x: usize,
    pub stride_y: usize,
}

impl ConvGeometry {
    /// Elements per sample on the input side.
    pub fn input_size(&self) -> usize {
        self.in_channels * self.in_height * self.in_width
    }

    /// Elements per sample on the output side.
    pub fn output_size(&self) -> usize {
        self.out_channels * self.out_height * self.out_width
    }

    /// Length of one weight row (one kernel).
    pub fn kernel_size(&self) -> usize {
        self.in_channels * self.kernel_height * self.kernel_width
    }

    pub(crate) fn check(&self, op: &'static str) -> Result<(), TensorError> {
        if self.stride_x == 0 || self.stride_y == 0 {
            return Err(TensorError::InvalidGeometry {
                op,
                detail: "stride must be at least 1".into(),
            });
        }
        if self.kernel_width == 0 || self.kernel_height == 0 {
            return Err(TensorError::InvalidGeometry {
                op,
                detail: "kernel dimensions must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Input coordinate touched by output position `o` and kernel offset `k`
    /// along one axis, or `None` when it falls in the padding.
    #[inline]
    pub(crate) fn input_coord(o: usize, k: usize, stride: usize, pad: usize, extent: usize) -> Option<usize> {
        let pos = (o * stride + k).checked_sub(pad)?;
        (pos < extent).then_some(pos)
    }
}

/// Convolution forward pass.
pub fn conv2d_forward(
    input: &[f32],
    weights: &[f32],
    bias: &[f32],
    output: &mut [f32],
    batch_size: usize,
    geo: &ConvGeometry,
) -> Result<(), TensorError> {
    const OP: &str = "conv2d_forward";
    geo.check(OP)?;
    check_conv_lengths(OP, input.len(), weights.len(), output.len(), batch_size, geo)?;
    check_len(OP, "bias", geo.out_channels, bias.len())?;

    let in_plane = geo.in_height * geo.in_width;
    let out_plane = geo.out_height * geo.out_width;
    let kernel_size = geo.kernel_size();

    for b in 0..batch_size {
        let x = &input[b * geo.input_size()..(b + 1) * geo.input_size()];
        let y = &mut output[b * geo.output_size()..(b + 1) * geo.output_size()];
        for oc in 0..geo.out_channels {
            let w = &weights[oc * kernel_size..(oc + 1) * kernel_size];
            for oy in 0..geo.out_height {
                for ox in 0..geo.out_width {
                    let mut acc = bias[oc];
                    for ic in 0..geo.in_channels {
                        for ky in 0..geo.kernel_height {
                            let Some(iy) = ConvGeometry::input_coord(oy, ky, geo.stride_y, geo.pad_y, geo.in_height) else {
                                continue;
                            };
                            for kx in 0..geo.kernel_width {
                                let Some(ix) = ConvGeometry::input_coord(ox, kx, geo.stride_x, geo.pad_x, geo.in_width) else {
                                    continue;
                                };
                                let wi = (ic * geo.kernel_height + ky) * geo.kernel_width + kx;
                                acc += w[wi] * x[ic * in_plane + iy * geo.in_width + ix];
                            }
                        }
                    }
                    y[oc * out_plane + oy * geo.out_width + ox] = acc;
                }
            }
        }
    }
    Ok(())
}

/// Accumulates the gradient with respect to the convolution input.
pub fn conv2d_backward_input(
    output_grad: &[f32],
    weights: &[f32],
    input_grad: &mut [f32],
    batch_size: usize,
    geo: &ConvGeometry,
) -> Result<(), TensorError> {
    const OP: &str = "conv2d_backward_input";
    geo.check(OP)?;
    check_conv_lengths(OP, input_grad.len(), weights.len(), output_grad.len(), batch_size, geo)?;

    let in_plane = geo.in_height * geo.in_width;
    let out_plane = geo.out_height * geo.out_width;
    let kernel_size = geo.kernel_size();

    for b in 0..batch_size {
        let dy = &output_grad[b * geo.output_size()..(b + 1) * geo.output_size()];
        let dx = &mut input_grad[b * geo.input_size()..(b + 1) * geo.input_size()];
        for oc in 0..geo.out_channels {
            let w = &weights[oc * kernel_size..(oc + 1) * kernel_size];
            for oy in 0..geo.out_height {
                for ox in 0..geo.out_width {
                    let g = dy[oc * out_plane + oy * geo.out_width + ox];
                    if g == 0.0 {
                        continue;
                    }
                    for ic in 0..geo.in_channels {
                        for ky in 0..geo.kernel_height {
                            let Some(iy) = ConvGeometry::input_coord(oy, ky, geo.stride_y, geo.pad_y, geo.in_height) else {
                                continue;
                            };
                            for kx in 0..geo.kernel_width {
                                let Some(ix) = ConvGeometry::input_coord(ox, kx, geo.stride_x, geo.pad_x, geo.in_width) else {
                                    continue;
                                };
                                let wi = (ic * geo.kernel_height + ky) * geo.kernel_width + kx;
                                dx[ic * in_plane + iy * geo.in_width + ix] += g * w[wi];
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Accumulates weight and bias gradients of a convolution.
pub fn conv2d_backward_params(
    input: &[f32],
    output_grad: &[f32],
    weight_grad: &mut [f32],
    bias_grad: &mut [f32],
    batch_size: usize,
    geo: &ConvGeometry,
) -> Result<(), TensorError> {
    const OP: &str = "conv2d_backward_params";
    geo.check(OP)?;
    check_conv_lengths(OP, input.len(), weight_grad.len(), output_grad.len(), batch_size, geo)?;
    check_len(OP, "bias_grad", geo.out_channels, bias_grad.len())?;

    let in_plane = geo.in_height * geo.in_width;
    let out_plane = geo.out_height * geo.out_width;
    let kernel_size = geo.kernel_size();

    for b in 0..batch_size {
        let x = &input[b * geo.input_size()..(b + 1) * geo.input_size()];
        let dy = &output_grad[b * geo.output_size()..(b + 1) * geo.output_size()];
        for oc in 0..geo.out_channels {
            let dw = &mut weight_grad[oc * kernel_size..(oc + 1) * kernel_size];
            for oy in 0..geo.out_height {
                for ox in 0..geo.out_width {
                    let g = dy[oc * out_plane + oy * geo.out_width + ox];
                    bias_grad[oc] += g;
                    if g == 0.0 {
                        continue;
                    }
                    for ic in 0..geo.in_channels {
                        for ky in 0..geo.kernel_height {
                            let Some(iy) = ConvGeometry::input_coord(oy, ky, geo.stride_y, geo.pad_y, geo.in_height) else {
                                continue;
                            };
                            for kx in 0..geo.kernel_width {
                                let Some(ix) = ConvGeometry::input_coord(ox, kx, geo.stride_x, geo.pad_x, geo.in_width) else {
                                    continue;
                                };
                                let wi = (ic * geo.kernel_height + ky) * geo.kernel_width + kx;
                                dw[wi] += g * x[ic * in_plane + iy * geo.in_width + ix];
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_conv_lengths(
    op: &'static str,
    input_len: usize,
    weights_len: usize,
    output_len: usize,
    batch_size: usize,
    geo: &ConvGeometry,
) -> Result<(), TensorError> {
    check_len(op, "input", batch_size * geo.input_size(), input_len)?;
    check_len(op, "weights", geo.out_channels * geo.kernel_size(), weights_len)?;
    check_len(op, "output", batch_size * geo.output_size(), output_len)
}
