// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Initial values for parameters the network does not carry yet.

use model_ir::{BufferKind, ParamDesc};
use rand::rngs::StdRng;
use rand::Rng;
use tensor_core::Shape;

/// Fills `values` for a parameter without stored values.
///
/// Weights are Glorot-uniform over `[out, fan_in]`; biases and means start
/// at zero, scales and variances at one.
pub fn initialize(param: &ParamDesc, shape: &Shape, values: &mut [f32], rng: &mut StdRng) {
    match param.kind {
        BufferKind::Weight => {
            let fan_out = shape.dim(0).unwrap_or(1);
            let fan_in = shape.dim(1).unwrap_or(1);
            let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
            for v in values.iter_mut() {
                *v = rng.gen_range(-limit..limit);
            }
        }
        BufferKind::Bias | BufferKind::Mean => values.fill(0.0),
        BufferKind::Scale | BufferKind::Variance => values.fill(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::{metadata, LayerType};
    use rand::SeedableRng;

    #[test]
    fn test_weights_within_limit_and_seeded() {
        let param = &metadata(LayerType::Linear).params[0];
        let shape = Shape::matrix(4, 8);
        let limit = (6.0f32 / 12.0).sqrt();

        let mut a = vec![0.0; 32];
        let mut b = vec![0.0; 32];
        initialize(param, &shape, &mut a, &mut StdRng::seed_from_u64(3));
        initialize(param, &shape, &mut b, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.abs() <= limit));
        assert!(a.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_batch_norm_defaults() {
        let row = metadata(LayerType::BatchNormalization);
        let shape = Shape::vector(3);
        let mut rng = StdRng::seed_from_u64(0);
        let mut filled = Vec::new();
        for p in row.params {
            let mut v = vec![7.0; 3];
            initialize(p, &shape, &mut v, &mut rng);
            filled.push((p.key, v[0]));
        }
        assert_eq!(
            filled,
            [("scale", 1.0), ("bias", 0.0), ("means", 0.0), ("variances", 1.0)]
        );
    }
}
