// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the execution runtime.

/// Errors that can occur while binding or executing a traversal.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The backend cannot satisfy a declared buffer, or a required input or
    /// target is missing or mis-sized.
    #[error("binding error: {0}")]
    Binding(String),

    /// A traversal step is malformed or hit an inconsistent state.
    #[error("execution error in node '{node}': {detail}")]
    Execution { node: String, detail: String },

    /// A kernel rejected its arguments while executing a node.
    #[error("tensor error in node '{node}': {source}")]
    Tensor {
        node: String,
        #[source]
        source: tensor_core::TensorError,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Memory allocation failed.
    #[error("memory error: {0}")]
    Memory(#[from] memory_manager::MemoryError),

    /// The traversal planner returned an error.
    #[error("planner error: {0}")]
    Planner(#[from] traversal_planner::PlannerError),

    /// The network could not be built or looked up.
    #[error("model error: {0}")]
    Model(#[from] model_ir::ModelError),
}

impl RuntimeError {
    pub(crate) fn execution(node: &str, detail: impl Into<String>) -> Self {
        Self::Execution {
            node: node.to_string(),
            detail: detail.into(),
        }
    }

    /// Adapter for `map_err` on kernel calls.
    pub(crate) fn tensor(node: &str) -> impl FnOnce(tensor_core::TensorError) -> Self + '_ {
        move |source| Self::Tensor {
            node: node.to_string(),
            source,
        }
    }
}
