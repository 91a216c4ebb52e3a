// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The parameter update contract.

/// Updates one parameter buffer from its accumulated gradient.
///
/// Called once per trainable parameter by
/// [`crate::ExecutionContext::apply_gradients`]; the gradient is zeroed
/// afterwards. Implementations may keep per-parameter state keyed by
/// `(node, key)`.
pub trait Optimizer {
    fn name(&self) -> &str;

    fn update(&mut self, node: &str, key: &str, values: &mut [f32], gradient: &[f32]);
}

/// Plain stochastic gradient descent: `w ← w − η·g`.
#[derive(Debug, Clone, Copy)]
pub struct Sgd {
    pub learning_rate: f32,
}

impl Sgd {
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn name(&self) -> &str {
        "sgd"
    }

    fn update(&mut self, _node: &str, _key: &str, values: &mut [f32], gradient: &[f32]) {
        for (w, &g) in values.iter_mut().zip(gradient) {
            *w -= self.learning_rate * g;
        }
    }
}
