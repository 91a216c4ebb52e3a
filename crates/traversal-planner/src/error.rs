// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the traversal planner.

/// Errors that can occur during traversal planning.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// A requested binding does not name a root or leaf of the network, or
    /// the bindings are inconsistent.
    #[error("binding error: {0}")]
    Binding(String),

    /// The network has no nodes to traverse.
    #[error("cannot plan a traversal of an empty network")]
    EmptyNetwork,

    /// A produced plan breaks one of its own invariants.
    #[error("invalid plan from strategy '{strategy}': {detail}")]
    InvalidPlan { strategy: String, detail: String },
}
