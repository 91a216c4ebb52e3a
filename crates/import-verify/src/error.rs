// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for import verification.

use model_ir::VerificationFailure;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The imported description does not build into a usable network.
    #[error("imported model failed to build: {} failure(s){}", .0.len(), first_failure(.0))]
    Build(Vec<VerificationFailure>),

    /// A reference output names a layer the network does not contain.
    #[error("reference output for unknown layer '{0}'")]
    UnknownLayer(String),

    /// The import file could not be read.
    #[error("failed to read import: {0}")]
    Io(#[from] std::io::Error),

    /// The import file is not valid JSON for the adapter format.
    #[error("failed to parse import: {0}")]
    Json(#[from] serde_json::Error),

    /// Planning or execution failed.
    #[error("runtime error: {0}")]
    Runtime(#[from] runtime::RuntimeError),

    /// The imported input cannot form a tensor.
    #[error("invalid input tensor: {0}")]
    Tensor(#[from] tensor_core::TensorError),

    #[error("model error: {0}")]
    Model(model_ir::ModelError),
}

fn first_failure(failures: &[VerificationFailure]) -> String {
    failures
        .first()
        .map(|f| format!("; first: {f}"))
        .unwrap_or_default()
}

impl From<model_ir::ModelError> for VerifyError {
    fn from(err: model_ir::ModelError) -> Self {
        match err {
            model_ir::ModelError::VerificationFailed(failures) => Self::Build(failures),
            other => Self::Model(other),
        }
    }
}
