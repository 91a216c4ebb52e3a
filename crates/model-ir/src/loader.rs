// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON description files.
//!
//! A description file holds either a bare array of layer descriptions or an
//! object with a `layers` array:
//!
//! ```json
//! {
//!   "layers": [
//!     { "type": "input", "width": 28, "height": 28, "channels": 1 },
//!     { "type": "linear", "output-size": 10 },
//!     { "type": "softmax" }
//!   ]
//! }
//! ```

use crate::{LayerDesc, ModelError};
use std::path::Path;

#[derive(serde::Deserialize)]
struct WrappedDescriptions {
    layers: Vec<LayerDesc>,
}

/// Parses descriptions from a JSON string.
pub fn descriptions_from_json(json: &str) -> Result<Vec<LayerDesc>, ModelError> {
    if json.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(json)?);
    }
    let file: WrappedDescriptions = serde_json::from_str(json)?;
    Ok(file.layers)
}

/// Loads descriptions from a JSON file.
pub fn load_descriptions(path: &Path) -> Result<Vec<LayerDesc>, ModelError> {
    let content = std::fs::read_to_string(path)?;
    let descs = descriptions_from_json(&content)?;
    tracing::debug!("loaded {} descriptions from '{}'", descs.len(), path.display());
    Ok(descs)
}

/// Serialises descriptions as a pretty-printed JSON array.
pub fn descriptions_to_json(descriptions: &[LayerDesc]) -> Result<String, ModelError> {
    Ok(serde_json::to_string_pretty(descriptions)?)
}

/// Writes descriptions to a JSON file.
pub fn save_descriptions(path: &Path, descriptions: &[LayerDesc]) -> Result<(), ModelError> {
    std::fs::write(path, descriptions_to_json(descriptions)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::*;
    use crate::{build, LayerType};

    #[test]
    fn test_bare_and_wrapped_forms() {
        let bare = r#"[{"type": "input", "width": 2, "height": 1, "channels": 1},
                       {"type": "linear", "output-size": 3}]"#;
        let wrapped = format!(r#"{{"layers": {bare}}}"#);
        let a = descriptions_from_json(bare).unwrap();
        let b = descriptions_from_json(&wrapped).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[1].layer_type(), LayerType::Linear);
    }

    #[test]
    fn test_json_roundtrip_preserves_build() {
        let descs = sequence([
            input(28, 28, 1),
            convolutional(5, 0, 1, 20),
            max_pooling(2, 0, 2),
            dropout(0.5),
            linear_softmax(10),
        ])
        .unwrap();
        let json = descriptions_to_json(&descs).unwrap();
        let back = descriptions_from_json(&json).unwrap();
        assert_eq!(back, descs);
        assert!(build(&back).is_usable());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        let descs = sequence([input(4, 1, 1), linear_tanh(2)]).unwrap();
        save_descriptions(&path, &descs).unwrap();
        assert_eq!(load_descriptions(&path).unwrap(), descs);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            descriptions_from_json(r#"[{"type": "warp"}]"#),
            Err(ModelError::Json(_))
        ));
        assert!(matches!(
            load_descriptions(Path::new("/nonexistent/net.json")),
            Err(ModelError::Io(_))
        ));
    }
}
