// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference CPU backend built on the `tensor-core` kernels.

use super::{Backend, LayerCall, NodeBuffers};
use crate::RuntimeError;
use memory_manager::{ResourceScope, ScopedBuffer};
use model_ir::{LayerKind, PassType};
use rand::rngs::StdRng;
use rand::Rng;
use tensor_core::{
    activation_backward, activation_forward, batch_norm_backward, batch_norm_inference,
    batch_norm_training, conv2d_backward_input, conv2d_backward_params, conv2d_forward,
    dropout_backward, dropout_forward, linear_backward_input, linear_backward_params,
    linear_forward, max_pool_backward, max_pool_forward, softmax, softmax_backward, Activation,
    BatchNormParams, ConvGeometry, RunningStats, Shape,
};

/// Single-threaded CPU backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

fn activation(kind: &LayerKind) -> Option<Activation> {
    match kind {
        LayerKind::Relu => Some(Activation::Relu),
        LayerKind::Logistic => Some(Activation::Logistic),
        LayerKind::Tanh => Some(Activation::Tanh),
        _ => None,
    }
}

fn geometry(call: LayerCall<'_>) -> Result<ConvGeometry, RuntimeError> {
    call.node
        .conv_geometry()
        .ok_or_else(|| RuntimeError::execution(call.id(), "node has no window geometry"))
}

fn weights_and_bias<'a>(
    call: LayerCall<'_>,
    params: &'a [ScopedBuffer<'_>],
) -> Result<(&'a [f32], &'a [f32]), RuntimeError> {
    match params {
        [weights, bias, ..] => Ok((weights.as_slice(), bias.as_slice())),
        _ => Err(RuntimeError::execution(call.id(), "weights and bias are not bound")),
    }
}

fn missing_gradients(call: LayerCall<'_>) -> RuntimeError {
    RuntimeError::execution(call.id(), "parameter gradients are not bound")
}

fn missing_stats(call: LayerCall<'_>) -> RuntimeError {
    RuntimeError::execution(
        call.id(),
        "no batch statistics; run a training forward step first",
    )
}

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn allocate<'s>(
        &self,
        scope: &'s ResourceScope,
        shape: &Shape,
    ) -> Result<ScopedBuffer<'s>, RuntimeError> {
        if shape.rank() > self.max_rank() {
            return Err(RuntimeError::Binding(format!(
                "cpu backend holds tensors up to rank {}, got {shape}",
                self.max_rank()
            )));
        }
        Ok(scope.acquire(shape.num_elements())?)
    }

    fn prepare_forward(
        &self,
        call: LayerCall<'_>,
        state: &mut NodeBuffers<'_>,
        rng: &mut StdRng,
    ) -> Result<(), RuntimeError> {
        if let LayerKind::Dropout { probability } = *call.node.kind() {
            let mask = state
                .mask
                .as_mut()
                .ok_or_else(|| RuntimeError::execution(call.id(), "dropout mask is not bound"))?;
            for m in mask.iter_mut() {
                *m = if rng.gen::<f32>() < probability {
                    1.0 / probability
                } else {
                    0.0
                };
            }
        }
        Ok(())
    }

    fn forward(
        &self,
        call: LayerCall<'_>,
        state: &mut NodeBuffers<'_>,
        input: &[f32],
        output: &mut [f32],
    ) -> Result<(), RuntimeError> {
        let node = call.node;
        let batch = call.batch_size;
        let err = RuntimeError::tensor(call.id());
        match *node.kind() {
            LayerKind::Input { .. } => Err(RuntimeError::execution(
                call.id(),
                "input nodes have no forward computation",
            )),
            LayerKind::Linear { .. } => {
                let (weights, bias) = weights_and_bias(call, &state.params)?;
                linear_forward(
                    input,
                    weights,
                    bias,
                    output,
                    batch,
                    node.input_size(),
                    node.output_size(),
                )
                .map_err(err)
            }
            LayerKind::Convolutional { .. } => {
                let geo = geometry(call)?;
                let (weights, bias) = weights_and_bias(call, &state.params)?;
                conv2d_forward(input, weights, bias, output, batch, &geo).map_err(err)
            }
            LayerKind::MaxPooling { .. } => {
                let geo = geometry(call)?;
                max_pool_forward(input, output, batch, &geo).map_err(err)
            }
            LayerKind::BatchNormalization {
                ave_factor,
                epsilon,
            } => {
                let [scale, bias, means, variances] = state.params.as_mut_slice() else {
                    return Err(RuntimeError::execution(
                        call.id(),
                        "batch-normalization parameters are not bound",
                    ));
                };
                let params = BatchNormParams {
                    scale: scale.as_slice(),
                    bias: bias.as_slice(),
                    epsilon,
                };
                match call.pass {
                    PassType::Training => {
                        let mut running = RunningStats {
                            means: means.as_mut_slice(),
                            variances: variances.as_mut_slice(),
                            ave_factor,
                        };
                        let stats =
                            batch_norm_training(input, output, &params, &mut running).map_err(err)?;
                        state.batch_stats = Some(stats);
                        Ok(())
                    }
                    PassType::Inference => {
                        batch_norm_inference(input, output, &params, means, variances)
                            .map_err(err)
                    }
                }
            }
            LayerKind::Dropout { .. } => match call.pass {
                PassType::Training => {
                    let mask = state.mask.as_deref().ok_or_else(|| {
                        RuntimeError::execution(call.id(), "dropout mask is not bound")
                    })?;
                    dropout_forward(input, mask, output).map_err(err)
                }
                PassType::Inference => {
                    if input.len() != output.len() {
                        return Err(RuntimeError::execution(
                            call.id(),
                            format!("identity over {} into {} elements", input.len(), output.len()),
                        ));
                    }
                    output.copy_from_slice(input);
                    Ok(())
                }
            },
            LayerKind::Relu | LayerKind::Logistic | LayerKind::Tanh => {
                let act = activation(node.kind())
                    .ok_or_else(|| RuntimeError::execution(call.id(), "not an activation"))?;
                activation_forward(act, input, output).map_err(err)
            }
            LayerKind::Softmax => softmax(input, output, node.output_size()).map_err(err),
        }
    }

    fn backward(
        &self,
        call: LayerCall<'_>,
        state: &NodeBuffers<'_>,
        input: &[f32],
        output: &[f32],
        output_grad: &[f32],
        input_grad: &mut [f32],
    ) -> Result<(), RuntimeError> {
        let node = call.node;
        let batch = call.batch_size;
        let err = RuntimeError::tensor(call.id());
        match *node.kind() {
            LayerKind::Input { .. } => Err(RuntimeError::execution(
                call.id(),
                "input nodes have no backward computation",
            )),
            LayerKind::Linear { .. } => {
                let (weights, _) = weights_and_bias(call, &state.params)?;
                linear_backward_input(
                    output_grad,
                    weights,
                    input_grad,
                    batch,
                    node.input_size(),
                    node.output_size(),
                )
                .map_err(err)
            }
            LayerKind::Convolutional { .. } => {
                let geo = geometry(call)?;
                let (weights, _) = weights_and_bias(call, &state.params)?;
                conv2d_backward_input(output_grad, weights, input_grad, batch, &geo).map_err(err)
            }
            LayerKind::MaxPooling { .. } => {
                let geo = geometry(call)?;
                max_pool_backward(input, output_grad, input_grad, batch, &geo).map_err(err)
            }
            LayerKind::BatchNormalization { epsilon, .. } => {
                let stats = state.batch_stats.as_ref().ok_or_else(|| missing_stats(call))?;
                let (scale, bias) = weights_and_bias(call, &state.params)?;
                let params = BatchNormParams {
                    scale,
                    bias,
                    epsilon,
                };
                let mut scale_grad = vec![0.0; scale.len()];
                let mut bias_grad = vec![0.0; bias.len()];
                batch_norm_backward(
                    input,
                    output_grad,
                    input_grad,
                    &params,
                    stats,
                    &mut scale_grad,
                    &mut bias_grad,
                )
                .map_err(err)
            }
            LayerKind::Dropout { .. } => {
                let mask = state.mask.as_deref().ok_or_else(|| {
                    RuntimeError::execution(call.id(), "dropout mask is not bound")
                })?;
                dropout_backward(output_grad, mask, input_grad).map_err(err)
            }
            LayerKind::Relu | LayerKind::Logistic | LayerKind::Tanh => {
                let act = activation(node.kind())
                    .ok_or_else(|| RuntimeError::execution(call.id(), "not an activation"))?;
                activation_backward(act, output, output_grad, input_grad).map_err(err)
            }
            LayerKind::Softmax => {
                softmax_backward(output, output_grad, input_grad, node.output_size()).map_err(err)
            }
        }
    }

    fn accumulate_parameter_gradients(
        &self,
        call: LayerCall<'_>,
        state: &mut NodeBuffers<'_>,
        input: &[f32],
        output_grad: &[f32],
    ) -> Result<(), RuntimeError> {
        let node = call.node;
        let batch = call.batch_size;
        let err = RuntimeError::tensor(call.id());
        let NodeBuffers {
            params,
            grads,
            batch_stats,
            ..
        } = state;
        match *node.kind() {
            LayerKind::Linear { .. } => {
                let [Some(weight_grad), Some(bias_grad)] = grads.as_mut_slice() else {
                    return Err(missing_gradients(call));
                };
                linear_backward_params(
                    input,
                    output_grad,
                    weight_grad.as_mut_slice(),
                    bias_grad.as_mut_slice(),
                    batch,
                    node.input_size(),
                    node.output_size(),
                )
                .map_err(err)
            }
            LayerKind::Convolutional { .. } => {
                let geo = geometry(call)?;
                let [Some(weight_grad), Some(bias_grad)] = grads.as_mut_slice() else {
                    return Err(missing_gradients(call));
                };
                conv2d_backward_params(
                    input,
                    output_grad,
                    weight_grad.as_mut_slice(),
                    bias_grad.as_mut_slice(),
                    batch,
                    &geo,
                )
                .map_err(err)
            }
            LayerKind::BatchNormalization { epsilon, .. } => {
                let stats = batch_stats.as_ref().ok_or_else(|| missing_stats(call))?;
                let (scale, bias) = weights_and_bias(call, params)?;
                let [Some(scale_grad), Some(bias_grad), ..] = grads.as_mut_slice() else {
                    return Err(missing_gradients(call));
                };
                let params = BatchNormParams {
                    scale,
                    bias,
                    epsilon,
                };
                let mut input_grad = vec![0.0; input.len()];
                batch_norm_backward(
                    input,
                    output_grad,
                    &mut input_grad,
                    &params,
                    stats,
                    scale_grad.as_mut_slice(),
                    bias_grad.as_mut_slice(),
                )
                .map_err(err)
            }
            _ => Ok(()),
        }
    }
}
