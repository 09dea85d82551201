//! Optimizer Benchmarks with 95% Confidence Intervals
//!
//! Covers the hot paths whose cost grows with problem size:
//! - Gauss-Jordan inversion (GP refits are O(n³))
//! - GP prediction after a refit
//! - One Bayesian suggestion (grid acquisition search)
//! - Population optimizers on a fixed evaluation budget
//!
//! Run with: cargo criterion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use paramtune::domains::colony::{AntColony, ColonyConfig, CostMatrix};
use paramtune::domains::evolution::{DifferentialEvolution, EvolutionConfig};
use paramtune::domains::gaussian_process::{GaussianProcess, GpConfig};
use paramtune::domains::optimization::{BayesianOptimizer, OptimizerConfig};
use paramtune::domains::swarm::{ParticleSwarm, SwarmConfig};
use paramtune::engine::rng::TuneRng;
use paramtune::linalg;

fn spd_matrix(n: usize) -> Vec<Vec<f64>> {
    let mut gp = GaussianProcess::new(GpConfig::default());
    let mut rng = TuneRng::new(1);
    let x: Vec<Vec<f64>> = (0..n).map(|_| vec![rng.gen_range_f64(0.0, 10.0)]).collect();
    let y = vec![0.0; n];
    let _ = gp.fit(&x, &y);
    gp.covariance_matrix()
}

/// Matrix inversion scaling with observation count
fn bench_inversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("gauss_jordan");
    group.sample_size(50);
    group.confidence_level(0.95);

    for n in [10, 50, 100].iter() {
        let k = spd_matrix(*n);
        group.bench_with_input(BenchmarkId::new("invert", n), &k, |b, k| {
            b.iter(|| black_box(linalg::invert(k)));
        });
    }

    group.finish();
}

/// Refit plus one prediction, the cost paid after every new observation
fn bench_gp_refit_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_process");
    group.sample_size(50);

    for n in [10, 50].iter() {
        group.bench_with_input(BenchmarkId::new("refit_predict", n), n, |b, &n| {
            let mut rng = TuneRng::new(2);
            let x: Vec<Vec<f64>> = (0..n)
                .map(|_| vec![rng.gen_range_f64(0.0, 5.0), rng.gen_range_f64(0.0, 5.0)])
                .collect();
            let y: Vec<f64> = x.iter().map(|p| p[0].sin() + p[1].cos()).collect();
            b.iter(|| {
                let mut gp = GaussianProcess::new(GpConfig::default());
                let _ = gp.fit(&x, &y);
                black_box(gp.predict_point(&[2.5, 2.5]))
            });
        });
    }

    group.finish();
}

/// One grid-search suggestion over three dimensions (20³ candidates)
fn bench_bayesian_suggest(c: &mut Criterion) {
    let mut group = c.benchmark_group("bayesian");
    group.sample_size(20);

    group.bench_function("suggest_3d", |b| {
        let config = OptimizerConfig {
            bounds: vec![(0.0, 1.0); 3],
            ..Default::default()
        };
        let Ok(mut base) = BayesianOptimizer::new(config) else {
            return;
        };
        for _ in 0..10 {
            let x = base.suggest();
            let y = -x.iter().map(|v| (v - 0.3).powi(2)).sum::<f64>();
            let _ = base.observe(x, y);
        }
        b.iter(|| black_box(base.suggest()));
    });

    group.finish();
}

/// Population optimizers on a 5-dimensional sphere
fn bench_population(c: &mut Criterion) {
    let mut group = c.benchmark_group("population");
    group.sample_size(20);
    let sphere = |x: &[f64]| x.iter().map(|v| v * v).sum::<f64>();
    let bounds = vec![(-5.0, 5.0); 5];

    group.bench_function("differential_evolution", |b| {
        b.iter(|| {
            let config = EvolutionConfig {
                generations: 50,
                ..Default::default()
            };
            let result = DifferentialEvolution::new(config)
                .and_then(|mut de| de.optimize(&sphere, &bounds));
            black_box(result.map(|r| r.best_fitness).ok())
        });
    });

    group.bench_function("particle_swarm", |b| {
        b.iter(|| {
            let config = SwarmConfig {
                iterations: 50,
                ..Default::default()
            };
            let result =
                ParticleSwarm::new(config).and_then(|mut pso| pso.optimize(&sphere, &bounds));
            black_box(result.map(|r| r.best_fitness).ok())
        });
    });

    group.bench_function("ant_colony_12", |b| {
        let groups: Vec<usize> = (0..12).map(|i| i % 4).collect();
        let Ok(costs) = CostMatrix::from_groups(&groups, 1.0) else {
            return;
        };
        b.iter(|| {
            let config = ColonyConfig {
                iterations: 20,
                ..Default::default()
            };
            let result = AntColony::new(config).map(|mut aco| aco.optimize(&costs));
            black_box(result.map(|r| r.best_cost).ok())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_inversion,
    bench_gp_refit_predict,
    bench_bayesian_suggest,
    bench_population
);
criterion_main!(benches);
