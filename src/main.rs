use std::ops::ControlFlow;
use std::path::Path;

use anyhow::Result;
use ductflow::io::read_config;
use ductflow::{Simulation, SimulationConfig};

fn main() -> Result<()> {
    env_logger::init();

    // Optional JSON configuration; the reference battery duct otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => read_config(Path::new(&path))?,
        None => SimulationConfig::new(),
    };
    let every = (config.num_steps / 10).max(1);

    let sim = Simulation::new(config)?;
    let result = sim.run_with_progress(every, |p| {
        log::info!(
            "step {}/{} (t={:.4} s), mean battery temperature {:?}",
            p.steps_done,
            p.num_steps,
            p.sim_time_s,
            p.mean_solid_temperature
        );
        ControlFlow::Continue(())
    })?;

    println!("{:>6} {:>10} {:>14} {:>14} {:>14}", "step", "time [s]", "T_solid mean", "T_solid max", "T_outlet");
    for s in &result.snapshots {
        println!(
            "{:>6} {:>10.4} {:>14} {:>14} {:>14}",
            s.step,
            s.time,
            fmt_temperature(s.mean_solid_temperature),
            fmt_temperature(s.max_solid_temperature),
            fmt_temperature(s.mean_outlet_temperature),
        );
    }
    if let Some(report) = result.final_report {
        println!(
            "final pressure solve: {} iterations, error {:.3e}, converged: {}",
            report.poisson.iterations, report.poisson.error, report.poisson.converged
        );
    }
    if !result.all_converged() {
        println!(
            "pressure solve hit the iteration cap in {} steps",
            result.non_converged_steps.len()
        );
    }

    Ok(())
}

fn fmt_temperature(t: Option<f64>) -> String {
    t.map_or_else(|| "-".to_string(), |t| format!("{t:.6}"))
}
