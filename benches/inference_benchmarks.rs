//! Inference Benchmarks
//!
//! Per-block cost of the engine at typical callback sizes.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ampnet::model::{Activation, LayerSpec, ModelDescriptor, WeightLayoutResolver};
use ampnet::InferenceEngine;

/// Small WaveNet-style stack: 1 -> 8 channels, ten gated layers with doubling dilations
fn bench_model() -> ModelDescriptor {
    let mut layers = vec![LayerSpec::new(1, 8, 1, vec![1], Activation::Tanh)];
    for dilation in [1, 2, 4, 8, 16, 32, 64, 128, 256, 512] {
        layers.push(LayerSpec::new(8, 8, 3, vec![dilation], Activation::FastTanh).with_gate());
    }
    layers.push(LayerSpec::new(8, 1, 1, vec![1], Activation::Identity));

    let count = WeightLayoutResolver::total_weight_count(&layers);
    let weights = (0..count).map(|i| ((i * 37 % 101) as f32 / 101.0 - 0.5) * 0.2).collect();
    ModelDescriptor::new(layers, weights)
}

fn benchmark_process_block(c: &mut Criterion) {
    let mut engine = InferenceEngine::load(bench_model()).unwrap();
    let input: Vec<f32> = (0..512).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
    let mut output = vec![0.0f32; 512];

    c.bench_function("wavenet_10_gated_block_512", |b| {
        b.iter(|| {
            engine.process_block(black_box(&input), black_box(&mut output));
        })
    });
}

fn benchmark_single_layer(c: &mut Criterion) {
    let descriptor = ModelDescriptor::new(
        vec![LayerSpec::new(1, 1, 3, vec![1, 2, 4], Activation::Tanh)],
        vec![0.1; 9],
    );
    let mut engine = InferenceEngine::load(descriptor).unwrap();

    c.bench_function("single_layer_sample", |b| {
        b.iter(|| engine.process_sample(black_box(0.25)))
    });
}

criterion_group!(benches, benchmark_process_block, benchmark_single_layer);
criterion_main!(benches);
