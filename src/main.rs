// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Smoke-test harness for the LAS engine: generates a handful of fields at
//! different grid sizes and kernels and prints timing diagnostics.

#![allow(unused_macros)]

use las3d::{FnKernel, LasConfig, LasEngine, StderrSink};

macro_rules! time_it {
    ($tip:literal, $func:stmt) => {
        let start = std::time::Instant::now();
        $func
        println!("{}: {:?}", $tip, start.elapsed());
    };
}

fn exponential_kernel(theta: f64) -> FnKernel<impl Fn(f64, f64, f64) -> f64, impl Fn(f64, f64, f64) -> f64> {
    FnKernel::new(
        move |x: f64, y: f64, z: f64| (-2.0 * (x * x + y * y + z * z).sqrt() / theta).exp(),
        move |v1: f64, v2: f64, v3: f64| 1.0 / (1.0 + (v1 + v2 + v3) / theta),
    )
}

fn run_case(label: &str, n1: usize, n2: usize, n3: usize, theta: f64, seed: i64) {
    println!("\n{label}: grid ({n1}, {n2}, {n3}), scale of fluctuation {theta}");
    let config = LasConfig::new(n1, n2, n3, 1.0, 1.0, 1.0, exponential_kernel(theta), StderrSink);

    let start = std::time::Instant::now();
    let engine = LasEngine::init(config, seed);
    println!("init: {:?}", start.elapsed());
    let mut engine = match engine {
        Ok(e) => e,
        Err(err) => {
            println!("init failed: {err}");
            return;
        }
    };

    let mut field = vec![0.0; n1 * n2 * n3];
    let start = std::time::Instant::now();
    engine.sample(&mut field).unwrap();
    println!("sample: {:?}", start.elapsed());

    let mean: f64 = field.iter().sum::<f64>() / field.len() as f64;
    let variance: f64 = field.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / field.len() as f64;
    println!("mean = {mean:.4}, variance = {variance:.4}");

    let stats = engine.stats();
    println!(
        "cumulative: {} sample(s), {:?} total sampling time",
        stats.sample_count, stats.total_sample_duration
    );
}

fn main() {
    run_case("small cube", 8, 8, 8, 3.0, 12345);
    run_case("larger cube with one subdivision", 16, 16, 16, 4.0, 1);
    run_case("degenerate planar grid (k3 = 1 after subdivision)", 64, 64, 4, 2.0, 99);

    let bad_config = LasConfig::new(144, 256, 256, 1.0, 1.0, 1.0, exponential_kernel(2.0), StderrSink);
    match LasEngine::init(bad_config, 1) {
        Ok(_) => println!("\nunexpectedly succeeded on an incompatible grid"),
        Err(err) => println!("\nincompatible grid rejected as expected: {err}"),
    }
}
