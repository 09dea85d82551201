//! Spindle Tuning Example
//!
//! Walks a simulated milling cell through the full toolkit:
//! - Bayesian optimization of cutting speed and feed on an expensive test cut
//! - Thompson sampling across candidate coolant strategies
//! - Differential evolution and particle swarm on a cheap surrogate model
//! - Ant colony sequencing of operations to minimize tool changes
//! - Kalman tracking of tool wear from noisy probe readings
//!
//! # Running
//! ```bash
//! cargo run --example tune_spindle
//! ```

use paramtune::domains::swarm::{ObjectiveMode, SubObjectives};
use paramtune::prelude::*;

/// Simulated test cut: surface quality score for (speed m/min, feed mm/tooth).
fn test_cut(x: &[f64], noise: &mut TuneRng) -> f64 {
    let speed = (x[0] - 240.0) / 120.0;
    let feed = (x[1] - 0.12) / 0.1;
    1.0 - speed * speed - 0.5 * feed * feed + noise.gen_normal(0.0, 0.01)
}

fn main() -> TuneResult<()> {
    println!("=== paramtune: spindle tuning ===\n");

    let config = TuneConfig::builder()
        .seed(42)
        .bounds(vec![(120.0, 360.0), (0.04, 0.25)])
        .gaussian_process(paramtune::domains::GpConfig {
            length_scale: 30.0,
            signal_variance: 1.0,
            noise_variance: 1e-3,
        })
        .build();

    // 1. Bayesian optimization on expensive test cuts
    println!("1. Bayesian Optimization (Expected Improvement, 15 test cuts):");
    println!("   Cut | Speed   | Feed   | Score");
    println!("   ----|---------|--------|-------");

    let mut shop_floor = TuneRng::new(7);
    let mut optimizer = config.bayesian_optimizer()?;
    for i in 0..15 {
        let x = optimizer.suggest();
        let y = test_cut(&x, &mut shop_floor);
        println!("   {:>3} | {:>7.1} | {:>6.3} | {:.4}", i + 1, x[0], x[1], y);
        optimizer.observe(x, y)?;
    }
    if let Some((best_x, best_y)) = optimizer.best() {
        println!(
            "\n   Best cut: speed {:.1} m/min, feed {:.3} mm/tooth (score {:.4})",
            best_x[0], best_x[1], best_y
        );
    }

    // 2. Thompson sampling over coolant strategies
    println!("\n2. Thompson Sampling (3 coolant strategies, 500 parts):");
    let success_rates = [0.55, 0.7, 0.62];
    let mut sampler = ThompsonSampler::new(success_rates.len(), 42)?;
    for _ in 0..500 {
        let arm = sampler.select();
        let reward = if shop_floor.gen_f64() < success_rates[arm] { 1.0 } else { 0.0 };
        sampler.update(arm, reward)?;
    }
    for (i, stats) in sampler.statistics().iter().enumerate() {
        println!(
            "   Strategy {i}: pulls {:>3}, expected success {:.3}",
            stats.pulls, stats.expected
        );
    }

    // 3. Metaheuristics on a cheap surrogate
    println!("\n3. Metaheuristics on the surrogate model (minimizing -score):");
    let surrogate = |x: &[f64]| {
        let speed = (x[0] - 240.0) / 120.0;
        let feed = (x[1] - 0.12) / 0.1;
        speed * speed + 0.5 * feed * feed - 1.0
    };
    let bounds = config.bayesian.bounds.clone();

    let de = config.differential_evolution()?.optimize(&surrogate, &bounds)?;
    let cma = config.cma()?.optimize(&surrogate, &bounds)?;
    let pso = config.particle_swarm()?.optimize(&surrogate, &bounds)?;
    let runs = [
        ("Differential evolution", &de),
        ("CMA-lite", &cma),
        ("Particle swarm", &pso),
    ];
    for (name, result) in runs {
        println!(
            "   {name:<22} speed {:>6.1}, feed {:.3}, f = {:.6} ({} evaluations)",
            result.best_x[0], result.best_x[1], result.best_fitness, result.n_evaluations
        );
    }

    // 4. Multi-objective swarm
    println!("\n4. Weighted swarm search:");
    let scores = |x: &[f64]| {
        let speed = (x[0] - 120.0) / 240.0;
        SubObjectives {
            throughput: speed + x[1] * 2.0,
            tool_life: 1.0 - speed * speed,
            surface_quality: 1.0 - (x[1] - 0.08).abs() * 4.0,
        }
    };
    for mode in [ObjectiveMode::Throughput, ObjectiveMode::ToolLife, ObjectiveMode::Balanced] {
        let result = config.particle_swarm()?.optimize_weighted(scores, mode, &bounds)?;
        let label = format!("{mode:?}");
        println!(
            "   {label:<12} speed {:>6.1}, feed {:.3}",
            result.best_x[0], result.best_x[1]
        );
    }

    // 5. Operation sequencing
    println!("\n5. Ant Colony Sequencing (tool groups per operation):");
    let groups = [0, 2, 1, 0, 2, 1, 3, 0];
    let costs = CostMatrix::from_groups(&groups, 1.0)?;
    let identity: Vec<usize> = (0..groups.len()).collect();
    let sequence = config.ant_colony()?.optimize(&costs);
    println!("   As listed:  {identity:?} -> {} tool changes", costs.path_cost(&identity));
    println!(
        "   Optimized:  {:?} -> {} tool changes",
        sequence.best_order, sequence.best_cost
    );

    // 6. Tool wear tracking
    println!("\n6. Kalman Tool-Wear Tracking (flank wear, mm):");
    let mut tracker = config.drift_tracker()?;
    for part in 1..=60 {
        let wear = 0.004 * f64::from(part);
        let probe = wear + shop_floor.gen_normal(0.0, 0.02);
        tracker.step(&[probe])?;
        if part % 15 == 0 {
            println!(
                "   Part {part:>2}: probe {probe:.3}, estimate {:.3}, rate {:.5}/part",
                tracker.state()[0],
                tracker.state()[1]
            );
        }
    }

    println!("\n=== Done ===");
    Ok(())
}
