// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use std::fmt;
use tensor_core::Shape;

/// Per-sample activation dimensions, laid out `[channels, height, width]`.
///
/// Fully connected layers produce flat dimensions (`1 × 1 × n`); a flat
/// activation feeding a window layer is treated as a single-row image.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub struct Dims {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Dims {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Flat dimensions of `size` elements.
    pub fn flat(size: usize) -> Self {
        Self::new(1, 1, size)
    }

    /// Number of elements per sample.
    pub fn size(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Batched activation shape: `[batch, channels, height, width]`, or
    /// `[batch, size]` for flat dimensions.
    pub fn batched_shape(&self, batch_size: usize) -> Shape {
        if self.channels == 1 && self.height == 1 {
            Shape::matrix(batch_size, self.width)
        } else {
            Shape::new(vec![batch_size, self.channels, self.height, self.width])
        }
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}
