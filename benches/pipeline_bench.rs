// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for the compile and propagate paths
//!
//! Run with: cargo bench --bench pipeline_bench

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use qubit_pulsegen::compiler::{ChannelId, CompilerSettings, SequenceCompiler};
use qubit_pulsegen::crosstalk::CrosstalkMatrix;
use qubit_pulsegen::predistortion::{FilterChain, Kernel};
use qubit_pulsegen::propagator::{
    propagate_two_level, DriveSimulator, HamiltonianTrace, SimulatorConfig, StateVector,
};
use qubit_pulsegen::pulse::PulseLibrary;
use qubit_pulsegen::sequence::{GateKind, GateSequence, PulseTrain};

fn compiler(n_qubits: usize) -> SequenceCompiler {
    let settings = CompilerSettings {
        n_qubits,
        sample_rate_ghz: 2.0,
        ..CompilerSettings::default()
    };
    let rows: Vec<Vec<f64>> = (0..n_qubits)
        .map(|i| (0..n_qubits).map(|j| if i == j { 1.0 } else { 0.01 }).collect())
        .collect();
    let mut filters = BTreeMap::new();
    for q in 0..n_qubits {
        let chain = FilterChain::new().then(Kernel::Fir {
            taps: vec![1.05, -0.05],
        });
        filters.insert(ChannelId::Z(q), chain);
    }
    SequenceCompiler::new(settings, PulseLibrary::default())
        .with_crosstalk(CrosstalkMatrix::from_rows(&rows).unwrap())
        .with_filters(filters)
}

/// Benchmark compiling pulse trains over growing registers
fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    for n_qubits in &[1, 4, 8] {
        let compiler = compiler(*n_qubits);
        let seq = PulseTrain::new(GateKind::xp(), 20)
            .generate(&compiler.settings().sequence_params(), compiler.library())
            .unwrap();
        group.bench_with_input(BenchmarkId::new("pulse_train_20", n_qubits), &seq, |b, seq| {
            b.iter(|| compiler.compile(black_box(seq)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark raw propagation
fn bench_propagate(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate");

    for n in &[1_000, 10_000, 100_000] {
        let times: Vec<f64> = (0..*n).map(|i| i as f64 * 0.001).collect();
        let delta: Vec<f64> = (0..*n).map(|i| (i as f64 * 0.01).sin()).collect();
        let trace = HamiltonianTrace::new(delta, vec![0.3; *n], None).unwrap();
        group.bench_with_input(BenchmarkId::new("steps", n), &times, |b, times| {
            b.iter(|| propagate_two_level(StateVector::ground(), black_box(times), &trace, 10).unwrap());
        });
    }

    group.finish();
}

/// Benchmark the full drive simulation of a compiled pi pulse
fn bench_simulate(c: &mut Criterion) {
    let compiler = compiler(1);
    let seq = PulseTrain::new(GateKind::xp(), 1)
        .generate(&compiler.settings().sequence_params(), compiler.library())
        .unwrap();
    let waveforms = compiler.compile(&seq).unwrap();
    let drive = waveforms[&ChannelId::Xy(0)].clone();

    let mut group = c.benchmark_group("simulate");
    for rwa in [true, false] {
        let sim = DriveSimulator::new(SimulatorConfig {
            rwa,
            time_step_ns: 0.001,
            ..SimulatorConfig::default()
        })
        .unwrap();
        let label = if rwa { "rwa" } else { "lab" };
        group.bench_function(label, |b| {
            b.iter(|| sim.simulate(black_box(&drive)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_propagate, bench_simulate);
criterion_main!(benches);
