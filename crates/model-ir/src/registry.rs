// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Validating layer constructors.
//!
//! Every constructor checks its arguments up front and fails with
//! [`ModelError::Configuration`]; nothing invalid is deferred to the
//! builder. Constructors return a `Vec` because some of them expand into a
//! fixed sequence of primitive descriptions.
//!
//! ```
//! use model_ir::registry::*;
//!
//! let descs = sequence([
//!     input(28, 28, 1),
//!     convolutional(5, 0, 1, 20),
//!     max_pooling(2, 0, 2),
//!     linear_softmax(10),
//! ])
//! .unwrap();
//! assert_eq!(descs.len(), 5);
//! ```

use crate::{LayerDesc, LayerKind, ModelError};

fn construct(kind: LayerKind) -> Result<Vec<LayerDesc>, ModelError> {
    kind.validate().map_err(|detail| ModelError::Configuration {
        layer: kind.layer_type().to_string(),
        detail,
    })?;
    Ok(vec![LayerDesc::new(kind)])
}

/// Concatenates constructor results, failing on the first error.
pub fn sequence<I>(parts: I) -> Result<Vec<LayerDesc>, ModelError>
where
    I: IntoIterator<Item = Result<Vec<LayerDesc>, ModelError>>,
{
    let mut out = Vec::new();
    for part in parts {
        out.extend(part?);
    }
    Ok(out)
}

pub fn input(width: usize, height: usize, channels: usize) -> Result<Vec<LayerDesc>, ModelError> {
    construct(LayerKind::Input {
        width,
        height,
        channels,
    })
}

pub fn linear(output_size: usize) -> Result<Vec<LayerDesc>, ModelError> {
    construct(LayerKind::Linear { output_size })
}

/// Square-kernel convolution with equal padding and stride on both axes.
pub fn convolutional(
    kernel: usize,
    pad: usize,
    stride: usize,
    num_kernels: usize,
) -> Result<Vec<LayerDesc>, ModelError> {
    convolutional_2d(kernel, kernel, pad, pad, stride, stride, num_kernels)
}

pub fn convolutional_2d(
    kernel_width: usize,
    kernel_height: usize,
    pad_x: usize,
    pad_y: usize,
    stride_x: usize,
    stride_y: usize,
    num_kernels: usize,
) -> Result<Vec<LayerDesc>, ModelError> {
    construct(LayerKind::Convolutional {
        kernel_width,
        kernel_height,
        pad_x,
        pad_y,
        stride_x,
        stride_y,
        num_kernels,
    })
}

pub fn max_pooling(kernel: usize, pad: usize, stride: usize) -> Result<Vec<LayerDesc>, ModelError> {
    max_pooling_2d(kernel, kernel, pad, pad, stride, stride)
}

pub fn max_pooling_2d(
    kernel_width: usize,
    kernel_height: usize,
    pad_x: usize,
    pad_y: usize,
    stride_x: usize,
    stride_y: usize,
) -> Result<Vec<LayerDesc>, ModelError> {
    construct(LayerKind::MaxPooling {
        kernel_width,
        kernel_height,
        pad_x,
        pad_y,
        stride_x,
        stride_y,
    })
}

/// `ave_factor` weights the running statistics against the batch ones.
pub fn batch_normalization(ave_factor: f32, epsilon: f32) -> Result<Vec<LayerDesc>, ModelError> {
    construct(LayerKind::BatchNormalization {
        ave_factor,
        epsilon,
    })
}

/// `probability` is the keep probability.
pub fn dropout(probability: f32) -> Result<Vec<LayerDesc>, ModelError> {
    construct(LayerKind::Dropout { probability })
}

pub fn relu() -> Result<Vec<LayerDesc>, ModelError> {
    construct(LayerKind::Relu)
}

pub fn logistic() -> Result<Vec<LayerDesc>, ModelError> {
    construct(LayerKind::Logistic)
}

pub fn tanh() -> Result<Vec<LayerDesc>, ModelError> {
    construct(LayerKind::Tanh)
}

pub fn softmax() -> Result<Vec<LayerDesc>, ModelError> {
    construct(LayerKind::Softmax)
}

macro_rules! linear_then {
    ($(#[$doc:meta])* $name:ident => $activation:ident) => {
        $(#[$doc])*
        pub fn $name(output_size: usize) -> Result<Vec<LayerDesc>, ModelError> {
            sequence([linear(output_size), $activation()])
        }
    };
}

linear_then!(
    /// `linear(n)` followed by `relu`.
    linear_relu => relu
);
linear_then!(
    /// `linear(n)` followed by `logistic`.
    linear_logistic => logistic
);
linear_then!(
    /// `linear(n)` followed by `tanh`.
    linear_tanh => tanh
);
linear_then!(
    /// `linear(n)` followed by `softmax`.
    linear_softmax => softmax
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LayerType;

    fn is_config_error(r: Result<Vec<LayerDesc>, ModelError>) -> bool {
        matches!(r, Err(ModelError::Configuration { .. }))
    }

    #[test]
    fn test_batch_norm_epsilon_threshold() {
        assert!(is_config_error(batch_normalization(0.9, 1e-6)));
        assert!(is_config_error(batch_normalization(0.9, 0.0)));

        let ok = batch_normalization(0.9, 1e-5).unwrap();
        match ok[0].kind {
            LayerKind::BatchNormalization { epsilon, .. } => assert_eq!(epsilon, 1e-5),
            ref other => panic!("unexpected kind {other:?}"),
        }
        let ok = batch_normalization(0.9, 1e-3).unwrap();
        assert!(matches!(ok[0].kind, LayerKind::BatchNormalization { epsilon, .. } if epsilon == 1e-3));
    }

    #[test]
    fn test_batch_norm_ave_factor_range() {
        assert!(is_config_error(batch_normalization(0.0, 1e-4)));
        assert!(is_config_error(batch_normalization(1.5, 1e-4)));
        assert!(batch_normalization(1.0, 1e-4).is_ok());
    }

    #[test]
    fn test_zero_stride_or_kernel() {
        assert!(is_config_error(convolutional(5, 0, 0, 20)));
        assert!(is_config_error(convolutional(0, 0, 1, 20)));
        assert!(is_config_error(convolutional_2d(3, 0, 0, 0, 1, 1, 4)));
        assert!(is_config_error(max_pooling(2, 0, 0)));
        assert!(is_config_error(max_pooling(0, 0, 2)));
        assert!(is_config_error(max_pooling_2d(2, 2, 0, 0, 2, 0)));
        assert!(convolutional(1, 0, 1, 1).is_ok());
        assert!(max_pooling(1, 0, 1).is_ok());
    }

    #[test]
    fn test_zero_kernels_and_sizes() {
        assert!(is_config_error(convolutional(3, 1, 1, 0)));
        assert!(is_config_error(linear(0)));
        assert!(is_config_error(input(28, 0, 1)));
    }

    #[test]
    fn test_dropout_probability() {
        assert!(is_config_error(dropout(0.0)));
        assert!(is_config_error(dropout(1.2)));
        assert!(dropout(1.0).is_ok());
        assert!(dropout(0.5).is_ok());
    }

    #[test]
    fn test_macro_expansions() {
        let types = |r: Result<Vec<LayerDesc>, ModelError>| -> Vec<LayerType> {
            r.unwrap().iter().map(LayerDesc::layer_type).collect()
        };
        assert_eq!(types(linear_relu(500)), [LayerType::Linear, LayerType::Relu]);
        assert_eq!(types(linear_softmax(10)), [LayerType::Linear, LayerType::Softmax]);
        assert_eq!(types(linear_logistic(3)), [LayerType::Linear, LayerType::Logistic]);
        assert_eq!(types(linear_tanh(3)), [LayerType::Linear, LayerType::Tanh]);
        assert!(is_config_error(linear_relu(0)));
    }

    #[test]
    fn test_error_names_layer() {
        let err = convolutional(5, 0, 0, 20).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("convolutional"), "{msg}");
        assert!(msg.contains("stride"), "{msg}");
    }
}
