// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end traversal pipeline.
//!
//! These tests exercise the complete flow from layer descriptions →
//! build → plan → bind → traverse → save, proving that the crates compose
//! and that scoped buffers are released on every exit path.

use approx::assert_relative_eq;
use memory_manager::{ResourceScope, ScopedBuffer};
use model_ir::{
    build, descriptions_from_json, descriptions_to_json, registry::*, LayerDesc, Network,
    PassType, Verified,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use runtime::{
    gradient_check, Backend, CpuBackend, ExecutionContext, Feed, LayerCall, NodeBuffers,
    RuntimeConfig, RuntimeError, SaveOptions, Sgd,
};
use tensor_core::{Shape, Tensor};
use traversal_planner::{PlanOptions, StepKind};

// ── Helpers ────────────────────────────────────────────────────

fn network(descs: Result<Vec<LayerDesc>, model_ir::ModelError>) -> Network<Verified> {
    build(&descs.unwrap()).verify().unwrap()
}

fn mnist() -> Network<Verified> {
    network(sequence([
        input(28, 28, 1),
        convolutional(5, 0, 1, 20),
        max_pooling(2, 0, 2),
        convolutional(5, 0, 1, 50),
        max_pooling(2, 0, 2),
        linear_relu(500),
        linear_softmax(10),
    ]))
}

fn config(batch_size: usize) -> RuntimeConfig {
    RuntimeConfig {
        batch_size,
        ..Default::default()
    }
}

fn random(shape: Shape, seed: u64) -> Tensor {
    let mut rng = StdRng::seed_from_u64(seed);
    let values: Vec<f32> = (0..shape.num_elements())
        .map(|_| rng.gen_range(-1.0..1.0))
        .collect();
    Tensor::from_vec(shape, values).unwrap()
}

fn feed(entries: Vec<(&str, Tensor)>) -> Feed {
    entries
        .into_iter()
        .map(|(slot, t)| (slot.to_string(), t))
        .collect()
}

// ── Inference ──────────────────────────────────────────────────

#[test]
fn test_mnist_inference_end_to_end() {
    let net = mnist();
    let ctx = ExecutionContext::new(config(2)).unwrap();
    let plan = ctx
        .plan(&net, PassType::Inference, &[], &[], &PlanOptions::default())
        .unwrap();
    // Eight, not seven: linear_relu and linear_softmax each expand to two
    // nodes, and the input node has an empty pass-set so it emits no step.
    assert_eq!(plan.count(StepKind::Forward), 8);
    assert_eq!(plan.count(StepKind::Backward), 0);

    let inputs = feed(vec![("input", random(Shape::matrix(2, 784), 1))]);
    let outputs = ctx.infer(&net, &inputs).unwrap();
    let out = &outputs["output"];
    assert_eq!(out.shape(), &Shape::matrix(2, 10));
    for row in out.as_slice().chunks(10) {
        assert_relative_eq!(row.iter().sum::<f32>(), 1.0, epsilon = 1e-4);
        assert!(row.iter().all(|&p| p >= 0.0));
    }
    assert_eq!(ctx.pool().allocated_bytes(), 0);
}

#[test]
fn test_inference_is_deterministic() {
    let net = network(sequence([input(6, 1, 1), linear_tanh(5), linear_softmax(3)]));
    let ctx = ExecutionContext::new(config(1)).unwrap();
    let inputs = feed(vec![("input", random(Shape::matrix(1, 6), 2))]);

    let first = ctx.infer(&net, &inputs).unwrap();
    let second = ctx.infer(&net, &inputs).unwrap();
    assert_eq!(first, second);

    let p1 = ctx
        .plan(&net, PassType::Inference, &[], &[], &PlanOptions::default())
        .unwrap();
    let p2 = ctx
        .plan(&net, PassType::Inference, &[], &[], &PlanOptions::default())
        .unwrap();
    assert_eq!(p1, p2);
}

#[test]
fn test_dropout_is_identity_for_inference() {
    let net = network(sequence([input(4, 1, 1), linear(3), dropout(0.5), linear(2)]));
    let ctx = ExecutionContext::new(config(1)).unwrap();
    let plan = ctx
        .plan(&net, PassType::Inference, &[], &[], &PlanOptions::saving_gradients())
        .unwrap();
    assert_eq!(plan.forward_order(), ["linear-1", "linear-2"]);

    let inputs = feed(vec![("input", random(Shape::matrix(1, 4), 3))]);
    ctx.with_scope("dropout", |scope| {
        let bound = ctx.bind(scope, &net, &plan)?;
        let executed = ctx.traverse(bound, &inputs)?;
        assert_eq!(executed.activation("dropout-1"), executed.activation("linear-1"));
        assert!(executed.mask("dropout-1").is_none());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_repeated_traversals_reuse_bound_state() {
    let net = network(sequence([input(3, 1, 1), linear(2)]));
    let ctx = ExecutionContext::new(config(1)).unwrap();
    let plan = ctx
        .plan(&net, PassType::Inference, &[], &[], &PlanOptions::default())
        .unwrap();
    let a = feed(vec![("input", Tensor::from_f32(Shape::matrix(1, 3), &[1.0, 0.0, 0.0]).unwrap())]);
    let b = feed(vec![("input", Tensor::from_f32(Shape::matrix(1, 3), &[0.0, 0.0, 0.0]).unwrap())]);

    ctx.with_scope("repeat", |scope| {
        let bound = ctx.bind(scope, &net, &plan)?;
        let executed = ctx.traverse(bound, &a)?;
        let first = executed.output("output").map(<[f32]>::to_vec);
        let executed = ctx.traverse(executed, &b)?;
        // Zero input: output equals the bias, which starts at zero.
        assert_eq!(executed.output("output"), Some(&[0.0, 0.0][..]));
        let executed = ctx.traverse(executed, &a)?;
        assert_eq!(executed.output("output").map(<[f32]>::to_vec), first);
        Ok(())
    })
    .unwrap();
}

// ── Binding and resource errors ────────────────────────────────

#[test]
fn test_missing_input_releases_scope() {
    let net = mnist();
    let ctx = ExecutionContext::new(config(1)).unwrap();
    let plan = ctx
        .plan(&net, PassType::Inference, &[], &[], &PlanOptions::default())
        .unwrap();

    let result: Result<(), RuntimeError> = ctx.with_scope("failing", |scope| {
        let bound = ctx.bind(scope, &net, &plan)?;
        assert!(ctx.pool().allocated_bytes() > 0);
        ctx.traverse(bound, &Feed::new())?;
        Ok(())
    });
    assert!(matches!(result, Err(RuntimeError::Binding(_))));
    assert_eq!(ctx.pool().allocated_bytes(), 0);
}

#[test]
fn test_wrong_input_size_is_binding_error() {
    let net = network(sequence([input(3, 1, 1), linear(2)]));
    let ctx = ExecutionContext::new(config(2)).unwrap();
    let inputs = feed(vec![("input", Tensor::zeros(Shape::matrix(1, 3)))]);
    let err = ctx.infer(&net, &inputs).unwrap_err();
    assert!(matches!(err, RuntimeError::Binding(_)), "{err}");
}

#[test]
fn test_budget_exhaustion_during_bind() {
    let net = mnist();
    let ctx = ExecutionContext::new(RuntimeConfig {
        memory_budget: "64K".into(),
        ..Default::default()
    })
    .unwrap();
    let inputs = feed(vec![("input", Tensor::zeros(Shape::matrix(1, 784)))]);
    let err = ctx.infer(&net, &inputs).unwrap_err();
    assert!(matches!(err, RuntimeError::Memory(_)), "{err}");
    assert_eq!(ctx.pool().allocated_bytes(), 0);
    assert!(ctx.pool().stats().rejected >= 1);
}

#[test]
fn test_stored_parameter_size_mismatch() {
    let mut net = network(sequence([input(3, 1, 1), linear(2)]));
    net.values
        .set_parameter("linear-1", "bias", Tensor::zeros(Shape::vector(5)));
    let ctx = ExecutionContext::new(config(1)).unwrap();
    let inputs = feed(vec![("input", Tensor::zeros(Shape::matrix(1, 3)))]);
    let err = ctx.infer(&net, &inputs).unwrap_err();
    assert!(matches!(err, RuntimeError::Binding(_)), "{err}");
}

/// Delegates to the CPU backend with a narrower rank limit, optionally
/// failing the forward computation of one node.
struct Restricted {
    max_rank: usize,
    fail_forward: Option<&'static str>,
}

impl Restricted {
    fn vectors_only() -> Self {
        Self {
            max_rank: 1,
            fail_forward: None,
        }
    }

    fn failing(node: &'static str) -> Self {
        Self {
            max_rank: CpuBackend.max_rank(),
            fail_forward: Some(node),
        }
    }
}

impl Backend for Restricted {
    fn name(&self) -> &str {
        "restricted"
    }

    fn max_rank(&self) -> usize {
        self.max_rank
    }

    fn allocate<'s>(
        &self,
        scope: &'s ResourceScope,
        shape: &Shape,
    ) -> Result<ScopedBuffer<'s>, RuntimeError> {
        CpuBackend.allocate(scope, shape)
    }

    fn prepare_forward(
        &self,
        call: LayerCall<'_>,
        state: &mut NodeBuffers<'_>,
        rng: &mut StdRng,
    ) -> Result<(), RuntimeError> {
        CpuBackend.prepare_forward(call, state, rng)
    }

    fn forward(
        &self,
        call: LayerCall<'_>,
        state: &mut NodeBuffers<'_>,
        input: &[f32],
        output: &mut [f32],
    ) -> Result<(), RuntimeError> {
        if self.fail_forward == Some(call.id()) {
            return Err(RuntimeError::Execution {
                node: call.id().to_string(),
                detail: "device fault".into(),
            });
        }
        CpuBackend.forward(call, state, input, output)
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
        CpuBackend.backward(call, state, input, output, output_grad, input_grad)
    }

    fn accumulate_parameter_gradients(
        &self,
        call: LayerCall<'_>,
        state: &mut NodeBuffers<'_>,
        input: &[f32],
        output_grad: &[f32],
    ) -> Result<(), RuntimeError> {
        CpuBackend.accumulate_parameter_gradients(call, state, input, output_grad)
    }
}

#[test]
fn test_backend_rank_limit_is_binding_error() {
    let net = network(sequence([input(3, 1, 1), linear(2)]));
    let ctx = ExecutionContext::with_backend(config(1), Restricted::vectors_only()).unwrap();
    let plan = ctx
        .plan(&net, PassType::Inference, &[], &[], &PlanOptions::default())
        .unwrap();
    let result = ctx.with_scope("narrow", |scope| ctx.bind(scope, &net, &plan).map(|_| ()));
    assert!(matches!(result, Err(RuntimeError::Binding(_))));
    assert_eq!(ctx.pool().allocated_bytes(), 0);
}

#[test]
fn test_failing_step_is_fatal_and_releases_scope() {
    let net = network(sequence([input(3, 1, 1), linear(4), relu(), linear(2)]));
    let ctx = ExecutionContext::with_backend(config(2), Restricted::failing("relu-1")).unwrap();
    let plan = ctx
        .plan(&net, PassType::Inference, &[], &[], &PlanOptions::default())
        .unwrap();
    let inputs = feed(vec![("input", random(Shape::matrix(2, 3), 60))]);

    let result = ctx.with_scope("failing-step", |scope| {
        let bound = ctx.bind(scope, &net, &plan)?;
        assert!(ctx.pool().allocated_bytes() > 0);
        ctx.traverse(bound, &inputs).map(|_| ())
    });
    match result {
        Err(RuntimeError::Execution { node, .. }) => assert_eq!(node, "relu-1"),
        other => panic!("expected an execution error, got {other:?}"),
    }
    assert_eq!(ctx.pool().allocated_bytes(), 0);
}

// ── Training ───────────────────────────────────────────────────

#[test]
fn test_training_requires_targets() {
    let net = network(sequence([input(3, 1, 1), linear(2)]));
    let ctx = ExecutionContext::new(config(1)).unwrap();
    let inputs = feed(vec![("input", Tensor::zeros(Shape::matrix(1, 3)))]);
    let err = ctx
        .train_step(&net, &inputs, &mut Sgd::new(0.1))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Binding(_)), "{err}");
}

#[test]
fn test_training_reduces_loss() {
    let mut net = network(sequence([input(4, 1, 1), linear_tanh(8), linear(2)]));
    let ctx = ExecutionContext::new(config(4)).unwrap();
    let data = feed(vec![
        ("input", random(Shape::matrix(4, 4), 10)),
        ("output", random(Shape::matrix(4, 2), 11)),
    ]);

    let mut sgd = Sgd::new(0.05);
    let mut losses = Vec::new();
    for _ in 0..30 {
        let (updated, loss) = ctx.train_step(&net, &data, &mut sgd).unwrap();
        net = updated;
        losses.push(loss);
    }
    assert!(losses.iter().all(|l| l.is_finite()));
    assert!(losses[29] < losses[0], "{losses:?}");
    assert!(net.values.parameter("linear-1", "weights").is_some());
    assert_eq!(ctx.pool().allocated_bytes(), 0);
}

#[test]
fn test_batch_norm_updates_running_statistics() {
    let net = network(sequence([
        input(3, 1, 1),
        batch_normalization(0.5, 1e-5),
        linear(2),
    ]));
    let ctx = ExecutionContext::new(config(2)).unwrap();
    let data = feed(vec![
        (
            "input",
            Tensor::from_f32(Shape::matrix(2, 3), &[1.0, 2.0, 3.0, 3.0, 4.0, 5.0]).unwrap(),
        ),
        ("output", Tensor::zeros(Shape::matrix(2, 2))),
    ]);
    let (trained, loss) = ctx.train_step(&net, &data, &mut Sgd::new(0.01)).unwrap();
    assert!(loss.is_finite());

    let means = trained
        .values
        .parameter("batch-normalization-1", "means")
        .unwrap();
    // 0.5 · 0 + 0.5 · batch mean
    assert_relative_eq!(means.as_slice()[0], 1.0, epsilon = 1e-5);
    assert_relative_eq!(means.as_slice()[2], 2.0, epsilon = 1e-5);

    let inputs = feed(vec![("input", Tensor::zeros(Shape::matrix(2, 3)))]);
    let outputs = ctx.infer(&trained, &inputs).unwrap();
    assert!(outputs["output"].as_slice().iter().all(|v| v.is_finite()));
}

#[test]
fn test_dropout_prepared_once_per_traversal() {
    let net = network(sequence([input(4, 1, 1), linear(3), dropout(0.5), linear(2)]));
    let ctx = ExecutionContext::new(config(2)).unwrap();
    let plan = ctx
        .plan(&net, PassType::Training, &[], &[], &PlanOptions::default())
        .unwrap();
    let data = feed(vec![
        ("input", random(Shape::matrix(2, 4), 20)),
        ("output", random(Shape::matrix(2, 2), 21)),
    ]);

    ctx.with_scope("prepare", |scope| {
        let bound = ctx.bind(scope, &net, &plan)?;
        let mut executed = ctx.traverse(bound, &data)?;
        let mask = executed.mask("dropout-1").map(<[f32]>::to_vec);
        assert!(mask.is_some());
        for _ in 0..5 {
            executed = ctx.forward(executed, &data)?;
        }
        assert_eq!(executed.mask("dropout-1").map(<[f32]>::to_vec), mask);
        assert_eq!(executed.prepare_count("dropout-1"), 1);
        assert_eq!(executed.forward_passes(), 6);

        // A new traversal draws a new mask.
        let executed = ctx.traverse(executed, &data)?;
        assert_eq!(executed.prepare_count("dropout-1"), 2);
        assert_eq!(executed.forward_passes(), 1);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_gradient_check_with_dropout() {
    let net = network(sequence([input(4, 1, 1), linear(3), dropout(0.5), linear(2)]));
    let ctx = ExecutionContext::new(config(2)).unwrap();
    let plan = ctx
        .plan(&net, PassType::Training, &[], &[], &PlanOptions::default())
        .unwrap();
    let data = feed(vec![
        ("input", random(Shape::matrix(2, 4), 30)),
        ("output", random(Shape::matrix(2, 2), 31)),
    ]);
    let trainable = net.parameter_count();
    assert_eq!(trainable, 4 * 3 + 3 + 3 * 2 + 2);

    ctx.with_scope("gradcheck", |scope| {
        let bound = ctx.bind(scope, &net, &plan)?;
        let (executed, report) = gradient_check(&ctx, bound, &data, 1e-2)?;
        assert_eq!(report.checked, trainable);
        assert_eq!(report.forward_passes, 1 + 2 * trainable);
        assert_eq!(executed.prepare_count("dropout-1"), 1);
        assert!(report.passes(1e-2), "{report:?}");
        Ok(())
    })
    .unwrap();
}

fn check_gradients(net: &Network<Verified>, data: &Feed, batch: usize, epsilon: f32) {
    let ctx = ExecutionContext::new(config(batch)).unwrap();
    let plan = ctx
        .plan(net, PassType::Training, &[], &[], &PlanOptions::default())
        .unwrap();
    let trainable = net.parameter_count();
    ctx.with_scope("gradcheck", |scope| {
        let bound = ctx.bind(scope, net, &plan)?;
        let (_, report) = gradient_check(&ctx, bound, data, epsilon)?;
        assert_eq!(report.checked, trainable);
        assert_eq!(report.forward_passes, 1 + 2 * trainable);
        assert!(report.passes(1e-2), "{report:?}");
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_gradient_check_through_conv_pool_and_batch_norm() {
    // Small epsilon keeps every pooling argmax in place.
    let pooled = network(sequence([
        input(4, 4, 1),
        convolutional(3, 1, 1, 2),
        max_pooling(2, 0, 2),
        linear(3),
    ]));
    let data = feed(vec![
        ("input", random(Shape::matrix(2, 16), 70)),
        ("output", random(Shape::matrix(2, 3), 71)),
    ]);
    check_gradients(&pooled, &data, 2, 5e-4);

    let normalized = network(sequence([
        input(3, 3, 1),
        convolutional(2, 0, 1, 2),
        batch_normalization(0.9, 1e-5),
        linear(2),
    ]));
    let data = feed(vec![
        ("input", random(Shape::matrix(4, 9), 72)),
        ("output", random(Shape::matrix(4, 2), 73)),
    ]);
    check_gradients(&normalized, &data, 4, 1e-3);
}

#[test]
fn test_gradient_check_with_fan_out() {
    let descs = vec![
        input(3, 1, 1).unwrap().remove(0).with_id("in"),
        linear(4).unwrap().remove(0).with_id("hidden"),
        tanh().unwrap().remove(0).with_id("t"),
        linear(2).unwrap().remove(0).with_id("a"),
        linear(3).unwrap().remove(0).with_id("b").with_parents(["t"]),
    ];
    let net = build(&descs).verify().unwrap();
    assert_eq!(net.children("t"), ["a", "b"]);
    let data = feed(vec![
        ("input", random(Shape::matrix(2, 3), 80)),
        ("a", random(Shape::matrix(2, 2), 81)),
        ("b", random(Shape::matrix(2, 3), 82)),
    ]);
    check_gradients(&net, &data, 2, 1e-3);
}

#[test]
fn test_gradient_check_rejects_inference_plan() {
    let net = network(sequence([input(2, 1, 1), linear(1)]));
    let ctx = ExecutionContext::new(config(1)).unwrap();
    let plan = ctx
        .plan(&net, PassType::Inference, &[], &[], &PlanOptions::default())
        .unwrap();
    let result = ctx.with_scope("gradcheck", |scope| {
        let bound = ctx.bind(scope, &net, &plan)?;
        gradient_check(&ctx, bound, &Feed::new(), 1e-3).map(|(_, r)| r)
    });
    assert!(matches!(result, Err(RuntimeError::Config(_))));
}

// ── Saving results ─────────────────────────────────────────────

#[test]
fn test_save_to_network_copies_buffers_and_gradients() {
    let net = network(sequence([
        input(4, 4, 1),
        convolutional(3, 1, 1, 2),
        relu(),
        linear(3),
    ]));
    let ctx = ExecutionContext::new(config(1)).unwrap();
    let plan = ctx
        .plan(&net, PassType::Training, &[], &[], &PlanOptions::saving_gradients())
        .unwrap();
    let data = feed(vec![
        ("input", random(Shape::matrix(1, 16), 40)),
        ("output", random(Shape::matrix(1, 3), 41)),
    ]);

    let saved = ctx
        .with_scope("save", |scope| {
            let bound = ctx.bind(scope, &net, &plan)?;
            let executed = ctx.traverse(bound, &data)?;
            assert!(executed.loss() > 0.0);
            assert!(executed.gradient("relu-1").is_some());
            ctx.save_to_network(
                &executed,
                SaveOptions {
                    save_gradients: true,
                },
            )
        })
        .unwrap();
    assert_eq!(ctx.pool().allocated_bytes(), 0);

    let values = &saved.values;
    assert_eq!(values.buffer("convolutional-1").unwrap().len(), 2 * 4 * 4);
    assert_eq!(values.buffer("linear-1").unwrap().len(), 3);
    assert_eq!(values.gradient("relu-1").unwrap().len(), 2 * 4 * 4);
    assert_eq!(
        values
            .parameter_gradient("convolutional-1", "weights")
            .unwrap()
            .shape(),
        &Shape::matrix(2, 9)
    );
    assert_eq!(values.parameter("linear-1", "weights").unwrap().shape(), &Shape::matrix(3, 32));

    // Saved parameters reproduce the traversal's output.
    let inputs = feed(vec![("input", data["input"].clone())]);
    let outputs = ctx.infer(&saved, &inputs).unwrap();
    let expected = values.buffer("linear-1").unwrap();
    for (a, e) in outputs["output"].as_slice().iter().zip(expected.as_slice()) {
        assert_relative_eq!(a, e, epsilon = 1e-6);
    }
}

#[test]
fn test_trained_network_survives_description_round_trip() {
    let mut net = network(sequence([
        input(3, 1, 1),
        linear(4),
        batch_normalization(0.5, 1e-5),
        linear_softmax(2),
    ]));
    let ctx = ExecutionContext::new(config(2)).unwrap();
    let data = feed(vec![
        ("input", random(Shape::matrix(2, 3), 90)),
        ("output", Tensor::from_vec(Shape::matrix(2, 2), vec![1.0, 0.0, 0.0, 1.0]).unwrap()),
    ]);
    let mut sgd = Sgd::new(0.1);
    for _ in 0..3 {
        net = ctx.train_step(&net, &data, &mut sgd).unwrap().0;
    }

    let json = descriptions_to_json(&net.to_descriptions()).unwrap();
    let rebuilt = build(&descriptions_from_json(&json).unwrap())
        .verify()
        .unwrap();
    assert_eq!(rebuilt.num_nodes(), net.num_nodes());

    let inputs = feed(vec![("input", data["input"].clone())]);
    let expected = ctx.infer(&net, &inputs).unwrap();
    let actual = ctx.infer(&rebuilt, &inputs).unwrap();
    for (a, e) in actual["output"]
        .as_slice()
        .iter()
        .zip(expected["output"].as_slice())
    {
        assert_relative_eq!(a, e, epsilon = 1e-6);
    }
}

// ── Concurrency ────────────────────────────────────────────────

#[test]
fn test_independent_networks_on_threads() {
    let ctx = ExecutionContext::new(config(1)).unwrap();
    let small = network(sequence([input(5, 1, 1), linear_softmax(4)]));
    let conv = network(sequence([
        input(6, 6, 1),
        convolutional(3, 0, 1, 2),
        max_pooling(2, 0, 2),
        linear_logistic(3),
    ]));
    let small_feed = feed(vec![("input", random(Shape::matrix(1, 5), 50))]);
    let conv_feed = feed(vec![("input", random(Shape::matrix(1, 36), 51))]);

    let expected_small = ctx.infer(&small, &small_feed).unwrap();
    let expected_conv = ctx.infer(&conv, &conv_feed).unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let ctx = &ctx;
                let (net, input) = if i % 2 == 0 {
                    (&small, &small_feed)
                } else {
                    (&conv, &conv_feed)
                };
                s.spawn(move || ctx.infer(net, input).unwrap())
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let outputs = handle.join().unwrap();
            let expected = if i % 2 == 0 {
                &expected_small
            } else {
                &expected_conv
            };
            assert_eq!(&outputs, expected);
        }
    });
    assert_eq!(ctx.pool().allocated_bytes(), 0);
}
