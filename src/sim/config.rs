use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::geom::rect::Rect;
use crate::sim::materials::ThermalMaterial;
use crate::sim::mesh::segment_cells;

/// Duct wall a boundary segment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    /// Returns true for walls normal to the x-axis.
    pub fn is_vertical(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }
}

/// Inlet or outlet opening along one wall.
///
/// `start` and `end` are physical coordinates measured along the wall
/// (y for left/right walls, x for top/bottom walls).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundarySegment {
    pub side: Side,
    pub start: f64,
    pub end: f64,
    /// Reference pressure [Pa]. Only meaningful for outlets; `None` means 0.
    #[serde(default)]
    pub pressure: Option<f64>,
}

impl BoundarySegment {
    pub fn new(side: Side, start: f64, end: f64) -> Self {
        Self {
            side,
            start,
            end,
            pressure: None,
        }
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = Some(pressure);
        self
    }
}

/// Relaxation scheme used for the pressure Poisson equation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureScheme {
    /// Plain serial Jacobi sweeps (reference behavior).
    Jacobi,
    /// Jacobi sweeps with rows updated in parallel (rayon).
    ///
    /// Reads only the previous full sweep, so results are bit-identical to `Jacobi`.
    ParallelJacobi,
    /// In-place successive over-relaxation with relaxation factor `omega` in (0, 2).
    Sor { omega: f64 },
}

/// Settings of the iterative pressure solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoissonConfig {
    /// Relative L2 change between successive sweeps that counts as converged.
    pub tolerance: f64,
    /// Maximum number of sweeps per time step.
    pub max_iterations: usize,
    pub scheme: PressureScheme,
}

impl Default for PoissonConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 5000,
            scheme: PressureScheme::Jacobi,
        }
    }
}

/// Dimensionless numbers used to judge explicit time-step stability.
///
/// Values above 1 indicate that `dt` is likely too large. They are advisory only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityNumbers {
    /// `u_in * dt / dx + u_in * dt / dy`.
    pub courant: f64,
    /// `2 * nu * dt * (1/dx^2 + 1/dy^2)`.
    pub viscous: f64,
    /// `2 * alpha_max * dt * (1/dx^2 + 1/dy^2)`.
    pub thermal: f64,
}

impl StabilityNumbers {
    pub fn max(&self) -> f64 {
        self.courant.max(self.viscous).max(self.thermal)
    }
}

/// Configuration of a coolant duct simulation.
///
/// Supplied once at initialization and immutable during the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    // Domain
    /// Duct length in x [m].
    pub lx: f64,
    /// Duct height in y [m].
    pub ly: f64,
    /// Number of interior cells in x.
    pub nx: usize,
    /// Number of interior cells in y.
    pub ny: usize,

    // Time
    /// Fixed time step [s].
    pub dt: f64,
    pub num_steps: usize,
    /// Capture a snapshot every N steps. `0` keeps only the final snapshot.
    pub snapshot_interval: usize,

    // Flow
    /// Coolant density used by the momentum and pressure equations [kg/m^3].
    pub fluid_density: f64,
    /// Coolant kinematic viscosity [m^2/s].
    pub kinematic_viscosity: f64,
    /// Inlet velocity magnitude, directed into the domain [m/s].
    pub inlet_velocity: f64,

    // Heat
    pub coolant: ThermalMaterial,
    pub battery: ThermalMaterial,
    /// Initial coolant temperature [C].
    pub ambient_temperature: f64,
    /// Coolant temperature entering through inlets [C].
    pub inlet_temperature: f64,
    /// Initial temperature of solid (battery) cells [C].
    pub battery_initial_temperature: f64,

    // Geometry
    pub obstacles: Vec<Rect>,
    pub inlets: Vec<BoundarySegment>,
    pub outlets: Vec<BoundarySegment>,

    // Numerics
    #[serde(default)]
    pub poisson: PoissonConfig,
    /// Fail fast with an error when a field becomes non-finite.
    #[serde(default = "default_check_finite")]
    pub check_finite: bool,
}

fn default_check_finite() -> bool {
    true
}

impl SimulationConfig {
    /// Reference scenario: 10 cm square duct, one centered battery cell,
    /// inlet on the lower half of the left wall, outlet on the lower quarter
    /// of the right wall.
    pub fn new() -> Self {
        Self {
            lx: 0.1,
            ly: 0.1,
            nx: 10,
            ny: 10,
            dt: 1e-4,
            num_steps: 100,
            snapshot_interval: 10,
            fluid_density: 997.0,
            kinematic_viscosity: 1.0e-6,
            inlet_velocity: 0.05,
            coolant: ThermalMaterial::water(),
            battery: ThermalMaterial::lithium_ion_cell(500.0),
            ambient_temperature: 25.0,
            inlet_temperature: 25.0,
            battery_initial_temperature: 25.0,
            obstacles: vec![Rect::centered(0.05, 0.05, 0.02, 0.02)],
            inlets: vec![BoundarySegment::new(Side::Left, 0.0, 0.05)],
            outlets: vec![BoundarySegment::new(Side::Right, 0.0, 0.025).with_pressure(0.0)],
            poisson: PoissonConfig::default(),
            check_finite: true,
        }
    }

    pub fn dx(&self) -> f64 {
        self.lx / self.nx as f64
    }

    pub fn dy(&self) -> f64 {
        self.ly / self.ny as f64
    }

    /// Physical length and cell count along the given wall.
    pub fn wall_extent(&self, side: Side) -> (f64, usize) {
        if side.is_vertical() {
            (self.ly, self.ny)
        } else {
            (self.lx, self.nx)
        }
    }

    /// Checks the configuration and returns a descriptive error for the first problem found.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.lx.is_finite() && self.lx > 0.0 && self.ly.is_finite() && self.ly > 0.0,
            "domain size must be positive (lx={}, ly={})",
            self.lx,
            self.ly
        );
        ensure!(
            self.nx >= 2 && self.ny >= 2,
            "resolution must be at least 2x2 interior cells (nx={}, ny={})",
            self.nx,
            self.ny
        );
        ensure!(
            self.dt.is_finite() && self.dt > 0.0,
            "time step must be > 0 (dt={})",
            self.dt
        );
        ensure!(
            self.fluid_density.is_finite() && self.fluid_density > 0.0,
            "fluid density must be > 0 (got {})",
            self.fluid_density
        );
        ensure!(
            self.kinematic_viscosity.is_finite() && self.kinematic_viscosity >= 0.0,
            "kinematic viscosity must be >= 0 (got {})",
            self.kinematic_viscosity
        );
        ensure!(
            self.inlet_velocity.is_finite(),
            "inlet velocity must be finite (got {})",
            self.inlet_velocity
        );
        for t in [
            self.ambient_temperature,
            self.inlet_temperature,
            self.battery_initial_temperature,
        ] {
            ensure!(t.is_finite(), "temperatures must be finite (got {t})");
        }
        validate_material(&self.coolant)?;
        validate_material(&self.battery)?;

        for (i, rect) in self.obstacles.iter().enumerate() {
            ensure!(
                rect.is_valid(),
                "obstacle {i} has inverted or non-finite extents: {rect:?}"
            );
        }

        for (i, seg) in self.inlets.iter().enumerate() {
            if seg.pressure.is_some() {
                bail!("inlet {i} on {:?} wall carries a pressure; only outlets may", seg.side);
            }
            let (length, n) = self.wall_extent(seg.side);
            segment_cells(seg, length, n).with_context(|| format!("inlet {i}"))?;
        }
        for (i, seg) in self.outlets.iter().enumerate() {
            if let Some(p) = seg.pressure {
                ensure!(p.is_finite(), "outlet {i} pressure must be finite (got {p})");
            }
            let (length, n) = self.wall_extent(seg.side);
            segment_cells(seg, length, n).with_context(|| format!("outlet {i}"))?;
        }

        ensure!(
            self.poisson.tolerance.is_finite() && self.poisson.tolerance > 0.0,
            "Poisson tolerance must be > 0 (got {})",
            self.poisson.tolerance
        );
        ensure!(
            self.poisson.max_iterations > 0,
            "Poisson iteration cap must be > 0"
        );
        if let PressureScheme::Sor { omega } = self.poisson.scheme {
            ensure!(
                omega > 0.0 && omega < 2.0,
                "SOR relaxation factor must be in (0, 2) (got {omega})"
            );
        }
        Ok(())
    }

    /// Advisory stability numbers for the configured time step.
    pub fn stability(&self) -> StabilityNumbers {
        let (dx, dy) = (self.dx(), self.dy());
        let inv_h2 = 1.0 / (dx * dx) + 1.0 / (dy * dy);
        let u = self.inlet_velocity.abs();
        let alpha_max = self.coolant.diffusivity().max(self.battery.diffusivity());
        StabilityNumbers {
            courant: u * self.dt / dx + u * self.dt / dy,
            viscous: 2.0 * self.kinematic_viscosity * self.dt * inv_h2,
            thermal: 2.0 * alpha_max * self.dt * inv_h2,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_material(m: &ThermalMaterial) -> Result<()> {
    ensure!(
        m.density.is_finite() && m.density > 0.0,
        "material '{}': density must be > 0 (got {})",
        m.name,
        m.density
    );
    ensure!(
        m.specific_heat.is_finite() && m.specific_heat > 0.0,
        "material '{}': specific heat must be > 0 (got {})",
        m.name,
        m.specific_heat
    );
    ensure!(
        m.conductivity.is_finite() && m.conductivity >= 0.0,
        "material '{}': conductivity must be >= 0 (got {})",
        m.name,
        m.conductivity
    );
    ensure!(
        m.heat_generation.is_finite(),
        "material '{}': heat generation must be finite",
        m.name
    );
    Ok(())
}
