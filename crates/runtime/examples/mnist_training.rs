// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: train a small convolutional network on synthetic digits.
//!
//! Builds the classic LeNet-style description, runs a few SGD steps on a
//! fixed random batch, reports the loss curve and the final traversal
//! metrics, and writes the trained network back out as descriptions.
//!
//! ```bash
//! cargo run -p runtime --example mnist_training
//! ```

use model_ir::{build, registry::*, save_descriptions, PassType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use runtime::{ExecutionContext, Feed, RuntimeConfig, Sgd};
use tensor_core::{Shape, Tensor};
use traversal_planner::PlanOptions;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let descs = sequence([
        input(28, 28, 1),
        convolutional(5, 0, 1, 20),
        max_pooling(2, 0, 2),
        convolutional(5, 0, 1, 50),
        max_pooling(2, 0, 2),
        linear_relu(500),
        linear_softmax(10),
    ])?;
    let mut network = build(&descs).verify()?;
    println!("{}\n", network.summary());

    let batch = 8;
    let ctx = ExecutionContext::new(RuntimeConfig {
        batch_size: batch,
        ..Default::default()
    })?;

    let mut rng = StdRng::seed_from_u64(7);
    let pixels: Vec<f32> = (0..batch * 784).map(|_| rng.gen_range(0.0..1.0)).collect();
    let mut labels = vec![0.0; batch * 10];
    for row in labels.chunks_mut(10) {
        row[rng.gen_range(0..10)] = 1.0;
    }
    let mut feed = Feed::new();
    feed.insert("input".into(), Tensor::from_vec(Shape::matrix(batch, 784), pixels)?);
    feed.insert("output".into(), Tensor::from_vec(Shape::matrix(batch, 10), labels)?);

    let mut sgd = Sgd::new(0.05);
    for epoch in 0..5 {
        let (updated, loss) = ctx.train_step(&network, &feed, &mut sgd)?;
        network = updated;
        println!("step {epoch}: loss {loss:.4}");
    }

    let plan = ctx.plan(&network, PassType::Training, &[], &[], &PlanOptions::default())?;
    let summary = ctx.with_scope("metrics", |scope| {
        let bound = ctx.bind(scope, &network, &plan)?;
        let executed = ctx.traverse(bound, &feed)?;
        Ok(executed.metrics().summary())
    })?;
    println!("\n{summary}");
    println!("{}", ctx.pool().stats().summary());

    let path = std::env::temp_dir().join("mnist_trained.json");
    save_descriptions(&path, &network.to_descriptions())?;
    println!("saved trained network to {}", path.display());
    Ok(())
}
