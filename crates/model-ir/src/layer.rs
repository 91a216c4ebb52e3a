// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layer descriptions: the declarative, pre-build form of a network.
//!
//! A [`LayerDesc`] is an immutable record made of a tagged [`LayerKind`]
//! (the `type` key plus kind-specific attributes) and a few optional,
//! kind-independent fields: an explicit node id, explicit parents, an
//! expected input size, explicit parameter values and free-form extra
//! attributes. Descriptions serialize to plain JSON mappings:
//!
//! ```json
//! { "type": "linear", "output-size": 10, "id": "fc" }
//! ```

use crate::Dims;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tensor_core::{window_output, Rounding};

/// Smallest batch-normalization epsilon accepted by the backends.
pub const MIN_BATCH_NORM_EPSILON: f32 = 1e-5;

/// The type tag of a layer, without its attributes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum LayerType {
    Input,
    Linear,
    Convolutional,
    MaxPooling,
    BatchNormalization,
    Dropout,
    Relu,
    Logistic,
    Tanh,
    Softmax,
}

impl LayerType {
    /// Returns the serialized tag, also used as the auto-id prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Linear => "linear",
            Self::Convolutional => "convolutional",
            Self::MaxPooling => "max-pooling",
            Self::BatchNormalization => "batch-normalization",
            Self::Dropout => "dropout",
            Self::Relu => "relu",
            Self::Logistic => "logistic",
            Self::Tanh => "tanh",
            Self::Softmax => "softmax",
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A layer kind together with its kind-specific attributes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum LayerKind {
    /// External input of `width × height × channels` elements per sample.
    Input {
        width: usize,
        height: usize,
        channels: usize,
    },
    /// Fully connected layer.
    Linear { output_size: usize },
    /// 2-D convolution. Output dimensions use floor rounding.
    Convolutional {
        kernel_width: usize,
        kernel_height: usize,
        pad_x: usize,
        pad_y: usize,
        stride_x: usize,
        stride_y: usize,
        num_kernels: usize,
    },
    /// 2-D max pooling. Output dimensions use ceiling rounding.
    MaxPooling {
        kernel_width: usize,
        kernel_height: usize,
        pad_x: usize,
        pad_y: usize,
        stride_x: usize,
        stride_y: usize,
    },
    /// Per-element batch normalization with running statistics.
    BatchNormalization { ave_factor: f32, epsilon: f32 },
    /// Inverted dropout; `probability` is the keep probability.
    Dropout { probability: f32 },
    Relu,
    Logistic,
    Tanh,
    Softmax,
}

impl LayerKind {
    pub fn layer_type(&self) -> LayerType {
        match self {
            Self::Input { .. } => LayerType::Input,
            Self::Linear { .. } => LayerType::Linear,
            Self::Convolutional { .. } => LayerType::Convolutional,
            Self::MaxPooling { .. } => LayerType::MaxPooling,
            Self::BatchNormalization { .. } => LayerType::BatchNormalization,
            Self::Dropout { .. } => LayerType::Dropout,
            Self::Relu => LayerType::Relu,
            Self::Logistic => LayerType::Logistic,
            Self::Tanh => LayerType::Tanh,
            Self::Softmax => LayerType::Softmax,
        }
    }

    /// Checks the kind-specific attributes, returning a description of the
    /// first problem found.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Self::Input {
                width,
                height,
                channels,
            } => {
                if width == 0 || height == 0 || channels == 0 {
                    return Err(format!(
                        "input dimensions must be at least 1, got {width}x{height}x{channels}"
                    ));
                }
            }
            Self::Linear { output_size } => {
                if output_size == 0 {
                    return Err("output-size must be at least 1".into());
                }
            }
            Self::Convolutional {
                kernel_width,
                kernel_height,
                stride_x,
                stride_y,
                num_kernels,
                ..
            } => {
                check_window(kernel_width, kernel_height, stride_x, stride_y)?;
                if num_kernels == 0 {
                    return Err("num-kernels must be at least 1".into());
                }
            }
            Self::MaxPooling {
                kernel_width,
                kernel_height,
                stride_x,
                stride_y,
                ..
            } => check_window(kernel_width, kernel_height, stride_x, stride_y)?,
            Self::BatchNormalization {
                ave_factor,
                epsilon,
            } => {
                // Written so that NaN fails too.
                if !(epsilon >= MIN_BATCH_NORM_EPSILON) {
                    return Err(format!(
                        "epsilon must be at least {MIN_BATCH_NORM_EPSILON:e}, got {epsilon:e}"
                    ));
                }
                if !(ave_factor > 0.0 && ave_factor <= 1.0) {
                    return Err(format!("ave-factor must be in (0, 1], got {ave_factor}"));
                }
            }
            Self::Dropout { probability } => {
                if !(probability > 0.0 && probability <= 1.0) {
                    return Err(format!(
                        "keep probability must be in (0, 1], got {probability}"
                    ));
                }
            }
            Self::Relu | Self::Logistic | Self::Tanh | Self::Softmax => {}
        }
        Ok(())
    }

    /// Infers the output dimensions from the input dimensions.
    ///
    /// Input layers ignore `input` and report their declared dimensions.
    pub fn output_dims(&self, input: Dims) -> Result<Dims, String> {
        match *self {
            Self::Input {
                width,
                height,
                channels,
            } => Ok(Dims::new(channels, height, width)),
            Self::Linear { output_size } => Ok(Dims::flat(output_size)),
            Self::Convolutional {
                kernel_width,
                kernel_height,
                pad_x,
                pad_y,
                stride_x,
                stride_y,
                num_kernels,
            } => {
                let (height, width) = window_dims(
                    input,
                    (kernel_width, kernel_height),
                    (pad_x, pad_y),
                    (stride_x, stride_y),
                    Rounding::Floor,
                )?;
                Ok(Dims::new(num_kernels, height, width))
            }
            Self::MaxPooling {
                kernel_width,
                kernel_height,
                pad_x,
                pad_y,
                stride_x,
                stride_y,
            } => {
                let (height, width) = window_dims(
                    input,
                    (kernel_width, kernel_height),
                    (pad_x, pad_y),
                    (stride_x, stride_y),
                    Rounding::Ceil,
                )?;
                Ok(Dims::new(input.channels, height, width))
            }
            Self::BatchNormalization { .. }
            | Self::Dropout { .. }
            | Self::Relu
            | Self::Logistic
            | Self::Tanh
            | Self::Softmax => Ok(input),
        }
    }

    /// Kernel area of window layers; `1` for everything else.
    pub fn kernel_area(&self) -> usize {
        match *self {
            Self::Convolutional {
                kernel_width,
                kernel_height,
                ..
            }
            | Self::MaxPooling {
                kernel_width,
                kernel_height,
                ..
            } => kernel_width * kernel_height,
            _ => 1,
        }
    }
}

fn check_window(
    kernel_width: usize,
    kernel_height: usize,
    stride_x: usize,
    stride_y: usize,
) -> Result<(), String> {
    if kernel_width == 0 || kernel_height == 0 {
        return Err(format!(
            "kernel dimensions must be at least 1, got {kernel_width}x{kernel_height}"
        ));
    }
    if stride_x == 0 || stride_y == 0 {
        return Err(format!("stride must be at least 1, got {stride_x}x{stride_y}"));
    }
    Ok(())
}

fn window_dims(
    input: Dims,
    (kernel_width, kernel_height): (usize, usize),
    (pad_x, pad_y): (usize, usize),
    (stride_x, stride_y): (usize, usize),
    rounding: Rounding,
) -> Result<(usize, usize), String> {
    let width = window_output(input.width, kernel_width, pad_x, stride_x, rounding);
    let height = window_output(input.height, kernel_height, pad_y, stride_y, rounding);
    match (height, width) {
        (Some(h), Some(w)) => Ok((h, w)),
        _ => Err(format!(
            "{kernel_width}x{kernel_height} window (pad {pad_x}x{pad_y}) does not fit input {input}"
        )),
    }
}

/// The declarative description of one layer.
///
/// Serialized as one flat mapping. Keys owned by the kind stay with the
/// kind; `output-size` on kinds that do not own it becomes a declared size
/// checked by the builder, and any other unrecognised key is merged into
/// `extra`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct LayerDesc {
    pub kind: LayerKind,
    /// Explicit node id; auto-assigned as `<type>-<n>` when absent.
    pub id: Option<String>,
    /// Explicit parents; defaults to the preceding description.
    pub parents: Option<Vec<String>>,
    /// Expected input size, checked against the parent's output size.
    pub input_size: Option<usize>,
    /// Declared output size, checked against the inferred one.
    pub output_size: Option<usize>,
    /// Explicit parameter values (e.g. imported weights), keyed like the
    /// layer metadata.
    pub parameters: BTreeMap<String, Vec<f32>>,
    /// Free-form attributes carried through the build untouched.
    pub extra: BTreeMap<String, Value>,
}

const ID: &str = "id";
const PARENTS: &str = "parents";
const INPUT_SIZE: &str = "input-size";
const OUTPUT_SIZE: &str = "output-size";
const PARAMETERS: &str = "parameters";
const EXTRA: &str = "extra";

fn take<T: DeserializeOwned>(
    map: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<T>, serde_json::Error> {
    map.remove(key).map(serde_json::from_value).transpose()
}

fn kind_fields(kind: &LayerKind) -> Map<String, Value> {
    match serde_json::to_value(kind) {
        Ok(Value::Object(fields)) => fields,
        _ => Map::new(),
    }
}

impl TryFrom<Map<String, Value>> for LayerDesc {
    type Error = serde_json::Error;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = take(&mut map, ID)?;
        let parents = take(&mut map, PARENTS)?;
        let input_size = take(&mut map, INPUT_SIZE)?;
        let parameters = take(&mut map, PARAMETERS)?.unwrap_or_default();
        let mut extra: BTreeMap<String, Value> = take(&mut map, EXTRA)?.unwrap_or_default();

        let kind: LayerKind = serde_json::from_value(Value::Object(map.clone()))?;
        let owned = kind_fields(&kind);
        let output_size = if owned.contains_key(OUTPUT_SIZE) {
            None
        } else {
            take(&mut map, OUTPUT_SIZE)?
        };
        for (key, value) in map {
            if !owned.contains_key(&key) {
                extra.insert(key, value);
            }
        }

        Ok(Self {
            kind,
            id,
            parents,
            input_size,
            output_size,
            parameters,
            extra,
        })
    }
}

impl From<LayerDesc> for Map<String, Value> {
    fn from(desc: LayerDesc) -> Self {
        let mut map = kind_fields(&desc.kind);
        if let Some(id) = desc.id {
            map.insert(ID.into(), Value::from(id));
        }
        if let Some(parents) = desc.parents {
            map.insert(PARENTS.into(), Value::from(parents));
        }
        if let Some(size) = desc.input_size {
            map.insert(INPUT_SIZE.into(), Value::from(size));
        }
        if let Some(size) = desc.output_size {
            map.entry(OUTPUT_SIZE).or_insert_with(|| Value::from(size));
        }
        if !desc.parameters.is_empty() {
            let parameters = desc
                .parameters
                .into_iter()
                .map(|(key, values)| (key, Value::from(values)))
                .collect();
            map.insert(PARAMETERS.into(), Value::Object(parameters));
        }
        if !desc.extra.is_empty() {
            map.insert(EXTRA.into(), Value::Object(desc.extra.into_iter().collect()));
        }
        map
    }
}

impl LayerDesc {
    /// Creates a description with no optional fields set.
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            id: None,
            parents: None,
            input_size: None,
            output_size: None,
            parameters: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn layer_type(&self) -> LayerType {
        self.kind.layer_type()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = Some(parents.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_input_size(mut self, size: usize) -> Self {
        self.input_size = Some(size);
        self
    }

    pub fn with_output_size(mut self, size: usize) -> Self {
        self.output_size = Some(size);
        self
    }

    /// Merges one extra attribute, replacing any previous value for `key`.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Attaches explicit values for parameter `key`.
    pub fn with_parameter(mut self, key: impl Into<String>, values: Vec<f32>) -> Self {
        self.parameters.insert(key.into(), values);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let desc = LayerDesc::new(LayerKind::Linear { output_size: 10 }).with_id("fc");
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["type"], "linear");
        assert_eq!(json["output-size"], 10);
        assert_eq!(json["id"], "fc");
        assert!(json.get("parents").is_none());
    }

    #[test]
    fn test_parse_conv() {
        let desc: LayerDesc = serde_json::from_str(
            r#"{"type": "convolutional", "kernel-width": 5, "kernel-height": 5,
                "pad-x": 0, "pad-y": 0, "stride-x": 1, "stride-y": 1,
                "num-kernels": 20, "parents": ["data"]}"#,
        )
        .unwrap();
        assert_eq!(desc.layer_type(), LayerType::Convolutional);
        assert_eq!(desc.parents.as_deref(), Some(&["data".to_string()][..]));
    }

    #[test]
    fn test_parse_unit_kind_with_extras() {
        let desc: LayerDesc =
            serde_json::from_str(r#"{"type": "relu", "id": "r", "extra": {"note": "x"}}"#).unwrap();
        assert_eq!(desc.kind, LayerKind::Relu);
        assert_eq!(desc.extra["note"], "x");
    }

    #[test]
    fn test_declared_output_size_kept() {
        let desc: LayerDesc =
            serde_json::from_str(r#"{"type": "relu", "output-size": 5}"#).unwrap();
        assert_eq!(desc.kind, LayerKind::Relu);
        assert_eq!(desc.output_size, Some(5));

        let linear: LayerDesc =
            serde_json::from_str(r#"{"type": "linear", "output-size": 7}"#).unwrap();
        assert_eq!(linear.kind, LayerKind::Linear { output_size: 7 });
        assert_eq!(linear.output_size, None);
    }

    #[test]
    fn test_unknown_keys_move_to_extra() {
        let desc: LayerDesc = serde_json::from_str(
            r#"{"type": "tanh", "note": "from-exporter", "extra": {"layer": 3}}"#,
        )
        .unwrap();
        assert_eq!(desc.extra["note"], "from-exporter");
        assert_eq!(desc.extra["layer"], 3);

        let back: LayerDesc =
            serde_json::from_value(serde_json::to_value(&desc).unwrap()).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn test_output_size_serialized_once() {
        let desc = LayerDesc::new(LayerKind::Softmax).with_output_size(10);
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["output-size"], 10);
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = serde_json::from_str::<LayerDesc>(r#"{"type": "lstm"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_with_attr_merges() {
        let desc = LayerDesc::new(LayerKind::Relu)
            .with_attr("a", 1)
            .with_attr("b", "two")
            .with_attr("a", 3);
        assert_eq!(desc.extra.len(), 2);
        assert_eq!(desc.extra["a"], 3);
    }

    #[test]
    fn test_conv_floor_vs_pool_ceil() {
        let input = Dims::new(1, 5, 5);
        let conv = LayerKind::Convolutional {
            kernel_width: 2,
            kernel_height: 2,
            pad_x: 0,
            pad_y: 0,
            stride_x: 2,
            stride_y: 2,
            num_kernels: 1,
        };
        let pool = LayerKind::MaxPooling {
            kernel_width: 2,
            kernel_height: 2,
            pad_x: 0,
            pad_y: 0,
            stride_x: 2,
            stride_y: 2,
        };
        assert_eq!(conv.output_dims(input).unwrap(), Dims::new(1, 2, 2));
        assert_eq!(pool.output_dims(input).unwrap(), Dims::new(1, 3, 3));
    }

    #[test]
    fn test_window_too_large() {
        let conv = LayerKind::Convolutional {
            kernel_width: 7,
            kernel_height: 7,
            pad_x: 0,
            pad_y: 0,
            stride_x: 1,
            stride_y: 1,
            num_kernels: 4,
        };
        assert!(conv.output_dims(Dims::new(1, 5, 5)).is_err());
    }

    #[test]
    fn test_validate_rejects_nan_epsilon() {
        let bn = LayerKind::BatchNormalization {
            ave_factor: 0.9,
            epsilon: f32::NAN,
        };
        assert!(bn.validate().is_err());
    }

    #[test]
    fn test_layer_type_display() {
        assert_eq!(LayerType::MaxPooling.to_string(), "max-pooling");
        assert_eq!(LayerType::BatchNormalization.to_string(), "batch-normalization");
    }
}
