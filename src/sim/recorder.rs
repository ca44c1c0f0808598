use ndarray::Array2;

use crate::sim::boundary::BoundarySet;
use crate::sim::config::Side;
use crate::sim::fields::{FlowFields, interior};
use crate::sim::mesh::StaggeredMesh;

use super::simulation::StepReport;

/// Read-only copy of the interior fields at one instant.
///
/// All arrays have shape `(ny, nx)` and exclude the ghost layer.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Number of completed steps when captured.
    pub step: usize,
    /// Simulated time [s].
    pub time: f64,
    pub temperature: Array2<f64>,
    /// Cell-centered speed; NaN on solid cells.
    pub velocity_magnitude: Array2<f64>,
    pub pressure: Array2<f64>,
    /// Mean temperature over solid cells, `None` without obstacles.
    pub mean_solid_temperature: Option<f64>,
    pub max_solid_temperature: Option<f64>,
    /// Mean temperature of the interior cells behind all outlets, `None` without outlets.
    pub mean_outlet_temperature: Option<f64>,
}

impl Snapshot {
    pub fn capture(
        step: usize,
        time: f64,
        fields: &FlowFields,
        mesh: &StaggeredMesh,
        boundary: &BoundarySet,
    ) -> Self {
        Self {
            step,
            time,
            temperature: interior(&fields.t),
            velocity_magnitude: velocity_magnitude(&fields.u, &fields.v, mesh),
            pressure: interior(&fields.p),
            mean_solid_temperature: mean_solid_temperature(&fields.t, mesh),
            max_solid_temperature: mesh
                .solid_cells()
                .map(|c| fields.t[c])
                .reduce(f64::max),
            mean_outlet_temperature: mean_outlet_temperature(&fields.t, mesh, boundary),
        }
    }
}

/// Speed at cell centers from face velocities averaged onto the cell, shape `(ny, nx)`.
///
/// Solid cells are NaN.
pub fn velocity_magnitude(u: &Array2<f64>, v: &Array2<f64>, mesh: &StaggeredMesh) -> Array2<f64> {
    Array2::from_shape_fn((mesh.ny, mesh.nx), |(r, c)| {
        let (i, j) = (r + 1, c + 1);
        if !mesh.is_fluid_cell(i, j) {
            return f64::NAN;
        }
        let uc = 0.5 * (u[[i, j - 1]] + u[[i, j]]);
        let vc = 0.5 * (v[[i - 1, j]] + v[[i, j]]);
        uc.hypot(vc)
    })
}

/// Mean temperature over solid interior cells.
pub fn mean_solid_temperature(t: &Array2<f64>, mesh: &StaggeredMesh) -> Option<f64> {
    mean(mesh.solid_cells().map(|c| t[c]))
}

fn mean_outlet_temperature(
    t: &Array2<f64>,
    mesh: &StaggeredMesh,
    boundary: &BoundarySet,
) -> Option<f64> {
    let (nx, ny) = (mesh.nx, mesh.ny);
    let cells = boundary.outlets.iter().flat_map(|outlet| {
        outlet.cells.clone().map(move |k| match outlet.side {
            Side::Left => (k, 1),
            Side::Right => (k, nx),
            Side::Bottom => (1, k),
            Side::Top => (ny, k),
        })
    });
    mean(cells.map(|c| t[c]))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Collected output of a simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimulationResult {
    pub snapshots: Vec<Snapshot>,
    /// Steps whose pressure solve hit the iteration cap.
    pub non_converged_steps: Vec<usize>,
    /// Diagnostics of the last completed step.
    pub final_report: Option<StepReport>,
}

impl SimulationResult {
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn all_converged(&self) -> bool {
        self.non_converged_steps.is_empty()
    }
}

/// Accumulates step reports and snapshots during a run.
#[derive(Debug, Default)]
pub(crate) struct SimulationRecorder {
    snapshots: Vec<Snapshot>,
    non_converged_steps: Vec<usize>,
    last_report: Option<StepReport>,
}

impl SimulationRecorder {
    pub(crate) fn push_step(&mut self, report: StepReport) {
        if !report.poisson.converged {
            self.non_converged_steps.push(report.step);
        }
        self.last_report = Some(report);
    }

    pub(crate) fn push_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    /// Step of the most recent snapshot, if any.
    pub(crate) fn last_snapshot_step(&self) -> Option<usize> {
        self.snapshots.last().map(|s| s.step)
    }

    pub(crate) fn finalize(self) -> SimulationResult {
        SimulationResult {
            snapshots: self.snapshots,
            non_converged_steps: self.non_converged_steps,
            final_report: self.last_report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::config::SimulationConfig;
    use crate::sim::pressure::PoissonReport;

    fn reference() -> (SimulationConfig, StaggeredMesh, BoundarySet) {
        let config = SimulationConfig::new();
        let mesh = StaggeredMesh::from_config(&config);
        let boundary = BoundarySet::from_config(&config).unwrap();
        (config, mesh, boundary)
    }

    #[test]
    fn test_velocity_magnitude_averages_faces() {
        let (_, mesh, _) = reference();
        let mut u = Array2::zeros(mesh.u_shape());
        let v = Array2::zeros(mesh.v_shape());
        u[[2, 2]] = 2.0;
        u[[2, 3]] = 4.0;
        let mag = velocity_magnitude(&u, &v, &mesh);
        assert_eq!(mag.dim(), (10, 10));
        // Cell (2, 3) sits between faces 2 and 3
        assert!((mag[[1, 2]] - 3.0).abs() < 1e-12);
        // Solid cell (5, 5)
        assert!(mag[[4, 4]].is_nan());
        assert_eq!(mag[[0, 0]], 0.0);
    }

    #[test]
    fn test_capture_diagnostics() {
        let (config, mesh, boundary) = reference();
        let mut fields = FlowFields::at_rest(&mesh, 20.0, 40.0);
        fields.t[[5, 5]] = 48.0;
        fields.t[[1, 10]] = 30.0;
        fields.t[[2, 10]] = 32.0;
        let snap = Snapshot::capture(7, 7.0 * config.dt, &fields, &mesh, &boundary);
        assert_eq!(snap.step, 7);
        assert_eq!(snap.temperature.dim(), (10, 10));
        assert_eq!(snap.pressure.dim(), (10, 10));
        assert_eq!(snap.mean_solid_temperature, Some(42.0));
        assert_eq!(snap.max_solid_temperature, Some(48.0));
        // Outlet covers rows 1..=2 of the right wall
        assert_eq!(snap.mean_outlet_temperature, Some(31.0));
    }

    #[test]
    fn test_capture_without_obstacles_or_outlets() {
        let mut config = SimulationConfig::new();
        config.obstacles.clear();
        config.outlets.clear();
        let mesh = StaggeredMesh::from_config(&config);
        let boundary = BoundarySet::from_config(&config).unwrap();
        let fields = FlowFields::at_rest(&mesh, 20.0, 40.0);
        let snap = Snapshot::capture(0, 0.0, &fields, &mesh, &boundary);
        assert_eq!(snap.mean_solid_temperature, None);
        assert_eq!(snap.max_solid_temperature, None);
        assert_eq!(snap.mean_outlet_temperature, None);
        assert!(snap.velocity_magnitude.iter().all(|m| *m == 0.0));
    }

    #[test]
    fn test_recorder_tracks_non_converged_steps() {
        let mut recorder = SimulationRecorder::default();
        for step in 1..=3 {
            recorder.push_step(StepReport {
                step,
                time: step as f64,
                poisson: PoissonReport {
                    iterations: 10,
                    error: 0.1,
                    converged: step != 2,
                },
                divergence_before: 1.0,
                divergence_after: 0.1,
            });
        }
        let result = recorder.finalize();
        assert_eq!(result.non_converged_steps, vec![2]);
        assert!(!result.all_converged());
        assert_eq!(result.final_report.map(|r| r.step), Some(3));
        assert!(result.last_snapshot().is_none());
    }
}
