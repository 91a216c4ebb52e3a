// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The import adapter format.
//!
//! An import is plain JSON produced by whatever tool exported the reference
//! model:
//!
//! ```json
//! {
//!   "model": [{"type": "input", "width": 2, "height": 1, "channels": 1}, ...],
//!   "input": [0.5, -1.0],
//!   "layer-outputs": [
//!     {"incoming": ["input-1"], "id": "linear-1", "outgoing": [], "output": [0.25]}
//!   ]
//! }
//! ```

use crate::VerifyError;
use model_ir::LayerDesc;
use std::path::Path;

/// One reference layer output.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LayerOutput {
    /// Ids of the layers feeding this one in the exporting framework.
    #[serde(default)]
    pub incoming: Vec<String>,
    pub id: String,
    #[serde(default)]
    pub outgoing: Vec<String>,
    /// Flattened reference output.
    pub output: Vec<f32>,
}

/// A model exported from another framework, with reference outputs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImportedModel {
    pub model: Vec<LayerDesc>,
    /// Flattened input the reference outputs were computed from.
    pub input: Vec<f32>,
    #[serde(default)]
    pub layer_outputs: Vec<LayerOutput>,
}

impl ImportedModel {
    pub fn from_json(json: &str) -> Result<Self, VerifyError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, VerifyError> {
        let content = std::fs::read_to_string(path)?;
        let model = Self::from_json(&content)?;
        tracing::debug!(
            "loaded import '{}': {} layers, {} reference outputs",
            path.display(),
            model.model.len(),
            model.layer_outputs.len()
        );
        Ok(model)
    }

    pub fn to_json(&self) -> Result<String, VerifyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
