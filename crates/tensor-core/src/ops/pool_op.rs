// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Max-pooling kernels.
//!
//! Pooling output dimensions are computed with ceiling rounding, so the
//! trailing window may hang past the input edge; only in-bounds elements
//! take part in the max. A window with no in-bounds element yields `0`.

use super::ConvGeometry;
use crate::error::check_len;
use crate::TensorError;

/// Max-pooling forward pass. Channels are pooled independently.
pub fn max_pool_forward(
    input: &[f32],
    output: &mut [f32],
    batch_size: usize,
    geo: &ConvGeometry,
) -> Result<(), TensorError> {
    const OP: &str = "max_pool_forward";
    check_pool(OP, input.len(), output.len(), batch_size, geo)?;

    let in_plane = geo.in_height * geo.in_width;
    let out_plane = geo.out_height * geo.out_width;
    for plane in 0..batch_size * geo.in_channels {
        let x = &input[plane * in_plane..(plane + 1) * in_plane];
        let y = &mut output[plane * out_plane..(plane + 1) * out_plane];
        for oy in 0..geo.out_height {
            for ox in 0..geo.out_width {
                y[oy * geo.out_width + ox] = match window_argmax(x, oy, ox, geo) {
                    Some(idx) => x[idx],
                    None => 0.0,
                };
            }
        }
    }
    Ok(())
}

/// Routes each output gradient to the position that won the forward max,
/// accumulating into `input_grad`.
pub fn max_pool_backward(
    input: &[f32],
    output_grad: &[f32],
    input_grad: &mut [f32],
    batch_size: usize,
    geo: &ConvGeometry,
) -> Result<(), TensorError> {
    const OP: &str = "max_pool_backward";
    check_pool(OP, input.len(), output_grad.len(), batch_size, geo)?;
    check_len(OP, "input_grad", input.len(), input_grad.len())?;

    let in_plane = geo.in_height * geo.in_width;
    let out_plane = geo.out_height * geo.out_width;
    for plane in 0..batch_size * geo.in_channels {
        let x = &input[plane * in_plane..(plane + 1) * in_plane];
        let dy = &output_grad[plane * out_plane..(plane + 1) * out_plane];
        let dx = &mut input_grad[plane * in_plane..(plane + 1) * in_plane];
        for oy in 0..geo.out_height {
            for ox in 0..geo.out_width {
                if let Some(idx) = window_argmax(x, oy, ox, geo) {
                    dx[idx] += dy[oy * geo.out_width + ox];
                }
            }
        }
    }
    Ok(())
}

/// Index (within one plane) of the first maximum of a window.
fn window_argmax(x: &[f32], oy: usize, ox: usize, geo: &ConvGeometry) -> Option<usize> {
    let mut best: Option<usize> = None;
    for ky in 0..geo.kernel_height {
        let Some(iy) = ConvGeometry::input_coord(oy, ky, geo.stride_y, geo.pad_y, geo.in_height) else {
            continue;
        };
        for kx in 0..geo.kernel_width {
            let Some(ix) = ConvGeometry::input_coord(ox, kx, geo.stride_x, geo.pad_x, geo.in_width) else {
                continue;
            };
            let idx = iy * geo.in_width + ix;
            if best.map_or(true, |b| x[idx] > x[b]) {
                best = Some(idx);
            }
        }
    }
    best
}

fn check_pool(
    op: &'static str,
    input_len: usize,
    output_len: usize,
    batch_size: usize,
    geo: &ConvGeometry,
) -> Result<(), TensorError> {
    geo.check(op)?;
    if geo.in_channels != geo.out_channels {
        return Err(TensorError::InvalidGeometry {
            op,
            detail: format!(
                "pooling preserves channels, got {} in and {} out",
                geo.in_channels, geo.out_channels
            ),
        });
    }
    check_len(op, "input", batch_size * geo.input_size(), input_len)?;
    check_len(op, "output", batch_size * geo.output_size(), output_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_geo(in_h: usize, in_w: usize, out_h: usize, out_w: usize) -> ConvGeometry {
        ConvGeometry {
            in_channels: 1,
            in_height: in_h,
            in_width: in_w,
            out_channels: 1,
            out_height: out_h,
            out_width: out_w,
            kernel_width: 2,
            kernel_height: 2,
            pad_x: 0,
            pad_y: 0,
            stride_x: 2,
            stride_y: 2,
        }
    }

    #[test]
    fn test_max_pool_forward() {
        let geo = pool_geo(2, 4, 1, 2);
        let x = [1.0, 5.0, 2.0, 0.0, 3.0, 4.0, 8.0, -1.0];
        let mut y = [0.0f32; 2];
        max_pool_forward(&x, &mut y, 1, &geo).unwrap();
        assert_eq!(y, [5.0, 8.0]);
    }

    #[test]
    fn test_max_pool_partial_window() {
        // 3x3 input, ceil-rounded to a 2x2 output; edge windows are partial.
        let geo = pool_geo(3, 3, 2, 2);
        let x: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        let mut y = [0.0f32; 4];
        max_pool_forward(&x, &mut y, 1, &geo).unwrap();
        assert_eq!(y, [5.0, 6.0, 8.0, 9.0]);
    }

    #[test]
    fn test_max_pool_backward_routes_to_argmax() {
        let geo = pool_geo(2, 4, 1, 2);
        let x = [1.0, 5.0, 2.0, 0.0, 3.0, 4.0, 8.0, -1.0];
        let mut dx = [0.0f32; 8];
        max_pool_backward(&x, &[10.0, 20.0], &mut dx, 1, &geo).unwrap();
        assert_eq!(dx, [0.0, 10.0, 0.0, 0.0, 0.0, 0.0, 20.0, 0.0]);
    }

    #[test]
    fn test_max_pool_channel_mismatch() {
        let mut geo = pool_geo(2, 2, 1, 1);
        geo.out_channels = 2;
        let mut y = [0.0f32; 2];
        assert!(max_pool_forward(&[0.0; 4], &mut y, 1, &geo).is_err());
    }
}
