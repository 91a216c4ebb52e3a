// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Durable numeric state attached to a network.
//!
//! Everything here outlives execution scopes: parameters, plus whatever
//! buffers and gradients a caller chose to copy out of a traversal.

use std::collections::BTreeMap;
use tensor_core::Tensor;

/// Parameters, saved activations and saved gradients, keyed by node id.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NetworkValues {
    /// node id → parameter key → values.
    pub parameters: BTreeMap<String, BTreeMap<String, Tensor>>,
    /// node id → output activation of the last saved traversal.
    #[serde(default)]
    pub buffers: BTreeMap<String, Tensor>,
    /// node id → gradient of the loss with respect to the node's output.
    #[serde(default)]
    pub gradients: BTreeMap<String, Tensor>,
    /// node id → parameter key → accumulated parameter gradient.
    #[serde(default)]
    pub parameter_gradients: BTreeMap<String, BTreeMap<String, Tensor>>,
}

impl NetworkValues {
    pub fn parameter(&self, node: &str, key: &str) -> Option<&Tensor> {
        self.parameters.get(node).and_then(|p| p.get(key))
    }

    pub fn set_parameter(&mut self, node: &str, key: &str, value: Tensor) {
        self.parameters
            .entry(node.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn buffer(&self, node: &str) -> Option<&Tensor> {
        self.buffers.get(node)
    }

    pub fn gradient(&self, node: &str) -> Option<&Tensor> {
        self.gradients.get(node)
    }

    pub fn parameter_gradient(&self, node: &str, key: &str) -> Option<&Tensor> {
        self.parameter_gradients.get(node).and_then(|p| p.get(key))
    }

    /// Drops saved buffers and gradients, keeping parameters.
    pub fn clear_results(&mut self) {
        self.buffers.clear();
        self.gradients.clear();
        self.parameter_gradients.clear();
    }
}
