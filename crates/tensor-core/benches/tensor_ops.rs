// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for tensor operations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tensor_core::{
    conv2d_forward, linear_backward_params, linear_forward, matmul, softmax, ConvGeometry, Shape,
    Tensor,
};

fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|i| ((i % 17) as f32 - 8.0) * 0.05).collect()
}

fn bench_matmul(c: &mut Criterion) {
    let mut group = c.benchmark_group("matmul");
    for n in [32usize, 64, 128] {
        let a = Tensor::from_vec(Shape::matrix(n, n), ramp(n * n)).expect("valid shape");
        let b = Tensor::from_vec(Shape::matrix(n, n), ramp(n * n)).expect("valid shape");
        let mut out = Tensor::zeros(Shape::matrix(n, n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, _| {
            bench.iter(|| matmul(black_box(&a), black_box(&b), &mut out).expect("matmul"))
        });
    }
    group.finish();
}

fn bench_linear(c: &mut Criterion) {
    let (batch, inputs, outputs) = (32usize, 256usize, 128usize);
    let x = ramp(batch * inputs);
    let w = ramp(outputs * inputs);
    let bias = vec![0.1f32; outputs];
    let mut y = vec![0.0f32; batch * outputs];
    let mut dw = vec![0.0f32; outputs * inputs];
    let mut db = vec![0.0f32; outputs];

    c.bench_function("linear_forward_32x256x128", |bench| {
        bench.iter(|| {
            linear_forward(black_box(&x), &w, &bias, &mut y, batch, inputs, outputs)
                .expect("linear forward")
        })
    });
    c.bench_function("linear_backward_params_32x256x128", |bench| {
        bench.iter(|| {
            linear_backward_params(black_box(&x), &y, &mut dw, &mut db, batch, inputs, outputs)
                .expect("linear backward")
        })
    });
}

fn bench_conv(c: &mut Criterion) {
    let geo = ConvGeometry {
        in_channels: 3,
        in_height: 32,
        in_width: 32,
        out_channels: 16,
        out_height: 32,
        out_width: 32,
        kernel_width: 3,
        kernel_height: 3,
        pad_x: 1,
        pad_y: 1,
        stride_x: 1,
        stride_y: 1,
    };
    let batch = 4;
    let x = ramp(batch * geo.input_size());
    let w = ramp(geo.out_channels * geo.kernel_size());
    let bias = vec![0.0f32; geo.out_channels];
    let mut y = vec![0.0f32; batch * geo.output_size()];
    c.bench_function("conv2d_forward_3x32x32_k3", |bench| {
        bench.iter(|| conv2d_forward(black_box(&x), &w, &bias, &mut y, batch, &geo).expect("conv"))
    });
}

fn bench_softmax(c: &mut Criterion) {
    let mut group = c.benchmark_group("softmax");
    for row_len in [10usize, 1000] {
        let x = ramp(64 * row_len);
        let mut y = vec![0.0f32; x.len()];
        group.bench_with_input(BenchmarkId::from_parameter(row_len), &row_len, |bench, &len| {
            bench.iter(|| softmax(black_box(&x), &mut y, len).expect("softmax"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_matmul, bench_linear, bench_conv, bench_softmax);
criterion_main!(benches);
