use std::ops::ControlFlow;

use anyhow::{Context, Result};

use crate::sim::boundary::BoundarySet;
use crate::sim::config::SimulationConfig;
use crate::sim::energy::advance_temperature;
use crate::sim::error::SimulationError;
use crate::sim::fields::FlowFields;
use crate::sim::mesh::StaggeredMesh;
use crate::sim::momentum::MomentumFluxes;
use crate::sim::pressure::{
    PoissonReport, correct_velocity, divergence_norm, poisson_source, solve_poisson,
};

use super::recorder::{SimulationRecorder, SimulationResult, Snapshot, mean_solid_temperature};

/// Diagnostics of one completed time step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// 1-based step index.
    pub step: usize,
    /// Simulated time at the end of the step [s].
    pub time: f64,
    pub poisson: PoissonReport,
    /// L2 divergence over fluid cells of the intermediate velocity.
    pub divergence_before: f64,
    /// L2 divergence over fluid cells after the pressure correction.
    pub divergence_after: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SimulationProgress {
    /// Number of completed steps (0..=num_steps).
    pub steps_done: usize,
    /// Target number of steps from the configuration (may stop early).
    pub num_steps: usize,
    /// Simulation time step (seconds).
    pub dt_s: f64,
    /// Simulated time elapsed (seconds).
    pub sim_time_s: f64,
    /// Diagnostics of the last step, `None` before the first one.
    pub last_step: Option<StepReport>,
    pub mean_solid_temperature: Option<f64>,
}

trait ProgressReporter {
    fn every_steps(&self) -> usize;
    fn report(&mut self, progress: &SimulationProgress) -> ControlFlow<()>;
}

struct NoProgress;
impl ProgressReporter for NoProgress {
    fn every_steps(&self) -> usize {
        0
    }
    fn report(&mut self, _progress: &SimulationProgress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

struct FnProgress<F> {
    every_steps: usize,
    f: F,
}

impl<F> ProgressReporter for FnProgress<F>
where
    F: FnMut(&SimulationProgress) -> ControlFlow<()>,
{
    fn every_steps(&self) -> usize {
        self.every_steps
    }
    fn report(&mut self, progress: &SimulationProgress) -> ControlFlow<()> {
        (self.f)(progress)
    }
}

/// Coupled flow and heat transfer simulation of a cooled duct.
///
/// Owns the field state for the whole run. Each call to [`Simulation::step`]
/// advances all fields by one time step:
/// momentum prediction, pressure projection, velocity correction and the
/// temperature update, with boundary conditions enforced between stages.
pub struct Simulation {
    config: SimulationConfig,
    mesh: StaggeredMesh,
    boundary: BoundarySet,
    fields: FlowFields,
    steps_done: usize,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config
            .validate()
            .context("invalid simulation configuration")?;
        let mesh = StaggeredMesh::from_config(&config);
        let boundary = BoundarySet::from_config(&config)?;
        let fields = FlowFields::at_rest(
            &mesh,
            config.ambient_temperature,
            config.battery_initial_temperature,
        );

        let stability = config.stability();
        if stability.max() > 1.0 {
            log::warn!(
                "time step dt={} is likely unstable: courant={:.3}, viscous={:.3}, thermal={:.3}",
                config.dt,
                stability.courant,
                stability.viscous,
                stability.thermal
            );
        }
        log::info!(
            "duct {}x{} m on {}x{} cells, {} solid cells, {} inlets, {} outlets, {:?} pressure solve",
            config.lx,
            config.ly,
            config.nx,
            config.ny,
            mesh.num_solid_cells(),
            boundary.inlets.len(),
            boundary.outlets.len(),
            config.poisson.scheme
        );

        Ok(Self {
            config,
            mesh,
            boundary,
            fields,
            steps_done: 0,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn mesh(&self) -> &StaggeredMesh {
        &self.mesh
    }

    pub fn boundary(&self) -> &BoundarySet {
        &self.boundary
    }

    pub fn fields(&self) -> &FlowFields {
        &self.fields
    }

    pub fn steps_done(&self) -> usize {
        self.steps_done
    }

    pub fn time(&self) -> f64 {
        self.steps_done as f64 * self.config.dt
    }

    /// Advances the simulation by one time step.
    ///
    /// Fails with [`SimulationError::Diverged`] if `check_finite` is enabled
    /// and any field holds a non-finite value afterwards.
    pub fn step(&mut self) -> Result<StepReport> {
        let cfg = &self.config;
        let mesh = &self.mesh;
        let bc = &self.boundary;
        let f = &mut self.fields;
        let step = self.steps_done + 1;

        // Momentum prediction
        bc.apply_velocity(&mut f.u, &mut f.v, mesh);
        let fluxes = MomentumFluxes::compute(&f.u, &f.v, mesh, cfg.kinematic_viscosity);
        let (mut u, mut v) = fluxes.predict(&f.u, &f.v, cfg.dt);
        bc.apply_velocity(&mut u, &mut v, mesh);
        let divergence_before = divergence_norm(&u, &v, mesh);

        // Projection
        let b = poisson_source(&u, &v, mesh, cfg.fluid_density, cfg.dt);
        let poisson = solve_poisson(&mut f.p, &b, mesh, bc, &cfg.poisson);
        correct_velocity(&mut u, &mut v, &f.p, mesh, bc, cfg.fluid_density, cfg.dt);
        bc.apply_corrected_velocity(&mut u, &mut v, mesh);
        let divergence_after = divergence_norm(&u, &v, mesh);
        f.u = u;
        f.v = v;

        // Energy
        bc.apply_temperature(&mut f.t);
        f.t = advance_temperature(&f.t, &f.u, &f.v, mesh, &cfg.coolant, &cfg.battery, cfg.dt);
        bc.apply_temperature(&mut f.t);

        self.steps_done = step;

        if !poisson.converged {
            log::warn!(
                "step {step}: pressure solve did not converge after {} iterations (error {:.3e})",
                poisson.iterations,
                poisson.error
            );
        }
        log::debug!(
            "step {step}: poisson iterations={} error={:.3e}, divergence {:.3e} -> {:.3e}",
            poisson.iterations,
            poisson.error,
            divergence_before,
            divergence_after
        );

        if cfg.check_finite {
            if let Some(field) = f.first_non_finite() {
                return Err(SimulationError::Diverged { step, field }.into());
            }
        }

        Ok(StepReport {
            step,
            time: step as f64 * cfg.dt,
            poisson,
            divergence_before,
            divergence_after,
        })
    }

    /// Copies the current interior fields and diagnostics.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(
            self.steps_done,
            self.time(),
            &self.fields,
            &self.mesh,
            &self.boundary,
        )
    }

    /// Runs all configured steps, capturing a snapshot every
    /// `snapshot_interval` steps and after the last step.
    pub fn run(self) -> Result<SimulationResult> {
        self.run_with_reporter(NoProgress)
    }

    /// Runs the simulation while periodically reporting progress.
    ///
    /// - `every_steps=0` disables progress reporting.
    /// - The reporter is called once at start (`steps_done=0`) and then every `every_steps`,
    ///   plus once at the end.
    /// - Returning `ControlFlow::Break(())` stops the run after the current step;
    ///   the state at that point is captured as the last snapshot.
    pub fn run_with_progress<F>(self, every_steps: usize, report: F) -> Result<SimulationResult>
    where
        F: FnMut(&SimulationProgress) -> ControlFlow<()>,
    {
        self.run_with_reporter(FnProgress {
            every_steps,
            f: report,
        })
    }

    fn run_with_reporter<R: ProgressReporter>(mut self, mut reporter: R) -> Result<SimulationResult> {
        let num_steps = self.config.num_steps;
        let interval = self.config.snapshot_interval;
        let every = reporter.every_steps();
        let mut recorder = SimulationRecorder::default();

        if every > 0 && reporter.report(&self.progress(None)).is_break() {
            log::info!("run stopped before the first step");
            return Ok(recorder.finalize());
        }

        for _ in 0..num_steps {
            let report = self.step()?;
            recorder.push_step(report);
            let step = report.step;
            let last = step == num_steps;

            if last || (interval > 0 && step % interval == 0) {
                let snapshot = self.snapshot();
                log::info!(
                    "snapshot at step {step} (t={:.4} s): mean solid temperature {:?}",
                    snapshot.time,
                    snapshot.mean_solid_temperature
                );
                recorder.push_snapshot(snapshot);
            }

            if every > 0
                && (last || step % every == 0)
                && reporter.report(&self.progress(Some(report))).is_break()
            {
                log::info!("run stopped at step {step} of {num_steps}");
                if recorder.last_snapshot_step() != Some(step) {
                    recorder.push_snapshot(self.snapshot());
                }
                break;
            }
        }

        Ok(recorder.finalize())
    }

    fn progress(&self, last_step: Option<StepReport>) -> SimulationProgress {
        SimulationProgress {
            steps_done: self.steps_done,
            num_steps: self.config.num_steps,
            dt_s: self.config.dt,
            sim_time_s: self.time(),
            last_step,
            mean_solid_temperature: mean_solid_temperature(&self.fields.t, &self.mesh),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::config::{BoundarySegment, Side};

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::new();
        config.num_steps = 12;
        config.snapshot_interval = 5;
        config
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = SimulationConfig::new();
        config.outlets = vec![BoundarySegment::new(Side::Right, 0.2, 0.3)];
        let err = Simulation::new(config).err().unwrap();
        assert!(format!("{err:#}").contains("invalid simulation configuration"));
        assert!(format!("{err:#}").contains("outlet 0"));
    }

    #[test]
    fn test_initial_state() {
        let mut config = SimulationConfig::new();
        config.ambient_temperature = 20.0;
        config.battery_initial_temperature = 30.0;
        let sim = Simulation::new(config).unwrap();
        assert_eq!(sim.steps_done(), 0);
        assert_eq!(sim.fields().t[[1, 1]], 20.0);
        assert_eq!(sim.fields().t[[5, 5]], 30.0);
        assert!(sim.fields().p.iter().all(|&x| x == 0.0));
        assert_eq!(sim.snapshot().mean_solid_temperature, Some(30.0));
    }

    #[test]
    fn test_step_keeps_solid_faces_at_rest() {
        let mut sim = Simulation::new(SimulationConfig::new()).unwrap();
        for step in 1..=5 {
            let report = sim.step().unwrap();
            assert_eq!(report.step, step);
            assert!(report.poisson.iterations > 0);
            assert!(report.divergence_after.is_finite());
        }
        assert!((sim.time() - 5.0 * 1e-4).abs() < 1e-15);
        let mesh = sim.mesh();
        let fields = sim.fields();
        for (idx, &fluid) in mesh.u_mask.indexed_iter() {
            if !fluid {
                assert_eq!(fields.u[idx], 0.0);
            }
        }
        for (idx, &fluid) in mesh.v_mask.indexed_iter() {
            if !fluid {
                assert_eq!(fields.v[idx], 0.0);
            }
        }
        // Inflow on the lower half of the left wall
        assert_eq!(fields.u[[1, 0]], 0.05);
        assert_eq!(fields.u[[8, 0]], 0.0);
    }

    #[test]
    fn test_snapshot_schedule() {
        let result = Simulation::new(small_config()).unwrap().run().unwrap();
        let steps: Vec<usize> = result.snapshots.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![5, 10, 12]);
        assert_eq!(result.final_report.map(|r| r.step), Some(12));
    }

    #[test]
    fn test_zero_interval_keeps_final_snapshot_only() {
        let mut config = small_config();
        config.snapshot_interval = 0;
        let result = Simulation::new(config).unwrap().run().unwrap();
        assert_eq!(result.snapshots.len(), 1);
        assert_eq!(result.snapshots[0].step, 12);
    }

    #[test]
    fn test_progress_can_stop_the_run() {
        let mut calls = Vec::new();
        let result = Simulation::new(small_config())
            .unwrap()
            .run_with_progress(3, |p| {
                calls.push(p.steps_done);
                if p.steps_done >= 6 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(calls, vec![0, 3, 6]);
        assert_eq!(result.final_report.map(|r| r.step), Some(6));
        let steps: Vec<usize> = result.snapshots.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![5, 6]);
    }

    #[test]
    fn test_projection_reduces_divergence_every_step() {
        let mut sim = Simulation::new(small_config()).unwrap();
        for _ in 0..12 {
            let report = sim.step().unwrap();
            assert!(
                report.divergence_after < report.divergence_before,
                "{report:?}"
            );
        }
    }

    #[test]
    fn test_non_converged_pressure_solves_are_listed() {
        let mut config = small_config();
        config.poisson.max_iterations = 1;
        config.poisson.tolerance = 1e-12;
        let result = Simulation::new(config).unwrap().run().unwrap();
        assert!(!result.all_converged());
        assert_eq!(result.non_converged_steps, (1..=12).collect::<Vec<_>>());
        let report = result.final_report.unwrap();
        assert_eq!(report.poisson.iterations, 1);
        assert!(!report.poisson.converged);
        assert_eq!(result.snapshots.len(), 3);
    }

    #[test]
    fn test_divergence_is_reported_as_error() {
        let mut config = small_config();
        config.inlet_velocity = f64::MAX;
        let mut sim = Simulation::new(config).unwrap();
        let err = (0..10).find_map(|_| sim.step().err()).unwrap();
        match err.downcast_ref::<SimulationError>() {
            Some(SimulationError::Diverged { step, .. }) => assert!(*step >= 1),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("solution diverged at step"));
    }
}
