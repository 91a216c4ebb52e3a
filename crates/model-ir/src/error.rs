// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for layer construction and network building.

use crate::VerificationFailure;

/// Errors that can occur when describing or building a network.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A layer constructor received invalid arguments.
    #[error("invalid configuration for '{layer}': {detail}")]
    Configuration { layer: String, detail: String },

    /// The built network carries verification failures and cannot be used.
    #[error("network failed verification: {}", format_failures(.0))]
    VerificationFailed(Vec<VerificationFailure>),

    /// A node id was looked up that is not part of the network.
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    /// A description file could not be read or written.
    #[error("failed to access description: {0}")]
    Io(#[from] std::io::Error),

    /// A description is not valid JSON or names an unknown layer type.
    #[error("failed to parse description: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_failures(failures: &[VerificationFailure]) -> String {
    let mut out = format!("{} failure(s)", failures.len());
    for failure in failures {
        out.push_str("; ");
        out.push_str(&failure.to_string());
    }
    out
}
