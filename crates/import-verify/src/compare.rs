// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise comparison of computed and reference outputs.

use std::fmt;

/// Absolute tolerance for magnitudes up to one, relative above.
pub const TOLERANCE: f32 = 1e-3;

/// Whether `actual` and `expected` agree within [`TOLERANCE`].
pub fn within_tolerance(actual: f32, expected: f32) -> bool {
    let scale = 1.0f32.max(actual.abs()).max(expected.abs());
    (actual - expected).abs() <= TOLERANCE * scale
}

/// Whether two flattened outputs agree element-wise. Outputs of different
/// lengths never agree.
pub fn outputs_agree(actual: &[f32], expected: &[f32]) -> bool {
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected)
            .all(|(&a, &e)| within_tolerance(a, e))
}

/// A layer whose computed output disagrees with the reference.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Mismatch {
    pub layer_id: String,
    /// The layer's input as computed by the network.
    pub input: Vec<f32>,
    pub expected: Vec<f32>,
    pub actual: Vec<f32>,
}

impl Mismatch {
    /// Largest element-wise absolute difference; infinite when the lengths
    /// differ.
    pub fn max_abs_error(&self) -> f32 {
        if self.actual.len() != self.expected.len() {
            return f32::INFINITY;
        }
        self.actual
            .iter()
            .zip(&self.expected)
            .map(|(a, e)| (a - e).abs())
            .fold(0.0, f32::max)
    }

    /// Index of the first element outside the tolerance.
    pub fn first_divergence(&self) -> Option<usize> {
        if self.actual.len() != self.expected.len() {
            return Some(self.actual.len().min(self.expected.len()));
        }
        self.actual
            .iter()
            .zip(&self.expected)
            .position(|(&a, &e)| !within_tolerance(a, e))
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.actual.len() != self.expected.len() {
            return write!(
                f,
                "{}: {} values computed, {} expected",
                self.layer_id,
                self.actual.len(),
                self.expected.len()
            );
        }
        write!(f, "{}: max abs error {:.3e}", self.layer_id, self.max_abs_error())?;
        if let Some(i) = self.first_divergence() {
            write!(
                f,
                ", first at [{i}] ({} vs {})",
                self.actual[i], self.expected[i]
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_is_absolute_for_small_values() {
        assert!(within_tolerance(0.0, 0.0009));
        assert!(!within_tolerance(0.0, 0.002));
    }

    #[test]
    fn test_tolerance_is_relative_for_large_values() {
        assert!(within_tolerance(1000.0, 1000.9));
        assert!(!within_tolerance(1000.0, 1002.0));
    }

    #[test]
    fn test_length_difference_disagrees() {
        assert!(!outputs_agree(&[1.0], &[1.0, 2.0]));
        assert!(outputs_agree(&[1.0, 2.0], &[1.0, 2.0005]));
    }

    #[test]
    fn test_mismatch_report() {
        let m = Mismatch {
            layer_id: "fc".into(),
            input: vec![1.0],
            expected: vec![1.0, 2.0],
            actual: vec![1.0, 2.5],
        };
        assert_eq!(m.max_abs_error(), 0.5);
        assert_eq!(m.first_divergence(), Some(1));
        assert!(m.to_string().starts_with("fc: max abs error"));

        let short = Mismatch {
            actual: vec![1.0],
            ..m
        };
        assert_eq!(short.max_abs_error(), f32::INFINITY);
        assert_eq!(short.to_string(), "fc: 1 values computed, 2 expected");
    }
}
