// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-type layer metadata.
//!
//! One table row per layer type that owns parameters or deviates from the
//! default pass-set; every other type falls through to [`DEFAULT`]. Adding a
//! layer kind means adding a [`LayerType`] variant and, if needed, a row in
//! [`metadata`].

use crate::{Dims, LayerKind, LayerType};
use std::fmt;
use tensor_core::Shape;

/// Training or inference.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PassType {
    Training,
    Inference,
}

impl PassType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Inference => "inference",
        }
    }
}

impl fmt::Display for PassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PassType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "training" | "train" => Ok(Self::Training),
            "inference" | "infer" => Ok(Self::Inference),
            other => Err(format!(
                "unknown pass type '{other}'; expected 'training' or 'inference'"
            )),
        }
    }
}

/// The passes a layer takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassSet {
    training: bool,
    inference: bool,
}

impl PassSet {
    pub const EMPTY: Self = Self {
        training: false,
        inference: false,
    };
    pub const TRAINING: Self = Self {
        training: true,
        inference: false,
    };
    pub const ALL: Self = Self {
        training: true,
        inference: true,
    };

    pub fn contains(&self, pass: PassType) -> bool {
        match pass {
            PassType::Training => self.training,
            PassType::Inference => self.inference,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.training && !self.inference
    }
}

/// What a parameter buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BufferKind {
    Weight,
    Bias,
    Scale,
    Mean,
    Variance,
}

/// Derives a parameter shape from the resolved layer: kind plus input and
/// output dimensions. Must be pure.
pub type ShapeFn = fn(&LayerKind, Dims, Dims) -> Shape;

/// One parameter of a layer type.
#[derive(Clone, Copy)]
pub struct ParamDesc {
    /// Key under which values are stored and imported.
    pub key: &'static str,
    pub kind: BufferKind,
    /// Running statistics are parameters the optimizer never touches.
    pub trainable: bool,
    pub shape: ShapeFn,
}

impl fmt::Debug for ParamDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamDesc")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("trainable", &self.trainable)
            .finish()
    }
}

/// The metadata row of one layer type.
#[derive(Debug)]
pub struct LayerMetadata {
    pub params: &'static [ParamDesc],
    pub passes: PassSet,
    /// Whether the layer has a prepare-forward hook, run once per traversal.
    pub prepare_forward: bool,
}

impl LayerMetadata {
    pub fn param(&self, key: &str) -> Option<&'static ParamDesc> {
        self.params.iter().find(|p| p.key == key)
    }
}

fn linear_weights(_: &LayerKind, input: Dims, output: Dims) -> Shape {
    Shape::matrix(output.size(), input.size())
}

fn output_vector(_: &LayerKind, _: Dims, output: Dims) -> Shape {
    Shape::vector(output.size())
}

fn conv_weights(kind: &LayerKind, input: Dims, output: Dims) -> Shape {
    Shape::matrix(output.channels, kind.kernel_area() * input.channels)
}

fn conv_bias(_: &LayerKind, _: Dims, output: Dims) -> Shape {
    Shape::vector(output.channels)
}

fn input_vector(_: &LayerKind, input: Dims, _: Dims) -> Shape {
    Shape::vector(input.size())
}

static LINEAR: LayerMetadata = LayerMetadata {
    params: &[
        ParamDesc {
            key: "weights",
            kind: BufferKind::Weight,
            trainable: true,
            shape: linear_weights,
        },
        ParamDesc {
            key: "bias",
            kind: BufferKind::Bias,
            trainable: true,
            shape: output_vector,
        },
    ],
    passes: PassSet::ALL,
    prepare_forward: false,
};

static CONVOLUTIONAL: LayerMetadata = LayerMetadata {
    params: &[
        ParamDesc {
            key: "weights",
            kind: BufferKind::Weight,
            trainable: true,
            shape: conv_weights,
        },
        ParamDesc {
            key: "bias",
            kind: BufferKind::Bias,
            trainable: true,
            shape: conv_bias,
        },
    ],
    passes: PassSet::ALL,
    prepare_forward: false,
};

static BATCH_NORMALIZATION: LayerMetadata = LayerMetadata {
    params: &[
        ParamDesc {
            key: "scale",
            kind: BufferKind::Scale,
            trainable: true,
            shape: input_vector,
        },
        ParamDesc {
            key: "bias",
            kind: BufferKind::Bias,
            trainable: true,
            shape: input_vector,
        },
        ParamDesc {
            key: "means",
            kind: BufferKind::Mean,
            trainable: false,
            shape: input_vector,
        },
        ParamDesc {
            key: "variances",
            kind: BufferKind::Variance,
            trainable: false,
            shape: input_vector,
        },
    ],
    passes: PassSet::ALL,
    prepare_forward: false,
};

static DROPOUT: LayerMetadata = LayerMetadata {
    params: &[],
    passes: PassSet::TRAINING,
    prepare_forward: true,
};

static INPUT: LayerMetadata = LayerMetadata {
    params: &[],
    passes: PassSet::EMPTY,
    prepare_forward: false,
};

/// Fallback row: no parameters, active in both passes.
pub static DEFAULT: LayerMetadata = LayerMetadata {
    params: &[],
    passes: PassSet::ALL,
    prepare_forward: false,
};

/// Looks up the metadata row for a layer type.
pub fn metadata(layer_type: LayerType) -> &'static LayerMetadata {
    match layer_type {
        LayerType::Linear => &LINEAR,
        LayerType::Convolutional => &CONVOLUTIONAL,
        LayerType::BatchNormalization => &BATCH_NORMALIZATION,
        LayerType::Dropout => &DROPOUT,
        LayerType::Input => &INPUT,
        _ => &DEFAULT,
    }
}
