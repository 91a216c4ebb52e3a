// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Input and output bindings between network nodes and external slots.

use model_ir::graph::NetworkState;
use model_ir::{LayerType, Network};
use std::fmt;

/// Slot name of the single input when no bindings are given.
pub const DEFAULT_INPUT_SLOT: &str = "input";
/// Slot name of the single output when no bindings are given.
pub const DEFAULT_OUTPUT_SLOT: &str = "output";

/// Binds a root node to the external input slot it is fed from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InputBinding {
    pub node: String,
    pub slot: String,
}

impl InputBinding {
    pub fn new(node: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            slot: slot.into(),
        }
    }
}

/// Loss attached to an output during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossKind {
    /// `0.5 · Σ(y − t)² / batch`.
    MeanSquared,
    /// `−Σ t · ln y / batch`, for probability outputs.
    CrossEntropy,
}

impl LossKind {
    /// The loss an output gets when none is requested.
    pub fn for_layer(layer_type: LayerType) -> Self {
        match layer_type {
            LayerType::Softmax => Self::CrossEntropy,
            _ => Self::MeanSquared,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MeanSquared => "mean-squared",
            Self::CrossEntropy => "cross-entropy",
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binds a leaf node to an external output slot. During training the
/// target values are supplied under the same slot name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OutputBinding {
    pub node: String,
    pub slot: String,
    /// `None` means "pick by the leaf's layer type".
    #[serde(default)]
    pub loss: Option<LossKind>,
}

impl OutputBinding {
    pub fn new(node: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            slot: slot.into(),
            loss: None,
        }
    }

    pub fn with_loss(mut self, loss: LossKind) -> Self {
        self.loss = Some(loss);
        self
    }
}

/// Binds the single root to [`DEFAULT_INPUT_SLOT`]; with several roots each
/// is bound to a slot named after itself.
pub fn default_inputs<S: NetworkState>(network: &Network<S>) -> Vec<InputBinding> {
    let roots = network.roots();
    if roots.len() == 1 {
        return vec![InputBinding::new(roots[0], DEFAULT_INPUT_SLOT)];
    }
    roots.into_iter().map(|id| InputBinding::new(id, id)).collect()
}

/// Binds the single leaf to [`DEFAULT_OUTPUT_SLOT`]; with several leaves
/// each is bound to a slot named after itself.
pub fn default_outputs<S: NetworkState>(network: &Network<S>) -> Vec<OutputBinding> {
    let leaves = network.leaves();
    if leaves.len() == 1 {
        return vec![OutputBinding::new(leaves[0], DEFAULT_OUTPUT_SLOT)];
    }
    leaves.into_iter().map(|id| OutputBinding::new(id, id)).collect()
}
