use std::ops::RangeInclusive;

use anyhow::{Context, Result};
use ndarray::Array2;

use crate::sim::config::{BoundarySegment, Side, SimulationConfig};
use crate::sim::mesh::{StaggeredMesh, segment_cells};

/// Boundary segment translated to array indices along its wall.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSegment {
    pub side: Side,
    /// Array indices along the wall (rows for left/right, columns for top/bottom).
    pub cells: RangeInclusive<usize>,
    /// Outlet reference pressure [Pa]; 0 when not configured.
    pub pressure: f64,
}

impl ResolvedSegment {
    pub fn resolve(segment: &BoundarySegment, config: &SimulationConfig) -> Result<Self> {
        let (length, n) = config.wall_extent(segment.side);
        Ok(Self {
            side: segment.side,
            cells: segment_cells(segment, length, n)?,
            pressure: segment.pressure.unwrap_or(0.0),
        })
    }
}

/// Inlet/outlet openings and the values imposed on them.
///
/// Walls without an opening are no-slip for velocity, zero-gradient for
/// pressure and adiabatic for temperature.
#[derive(Debug, Clone)]
pub struct BoundarySet {
    pub inlets: Vec<ResolvedSegment>,
    pub outlets: Vec<ResolvedSegment>,
    /// Inflow speed normal to the inlet wall [m/s].
    pub inlet_velocity: f64,
    pub inlet_temperature: f64,
}

impl BoundarySet {
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        let inlets = config
            .inlets
            .iter()
            .enumerate()
            .map(|(i, s)| ResolvedSegment::resolve(s, config).with_context(|| format!("inlet {i}")))
            .collect::<Result<Vec<_>>>()?;
        let outlets = config
            .outlets
            .iter()
            .enumerate()
            .map(|(i, s)| {
                ResolvedSegment::resolve(s, config).with_context(|| format!("outlet {i}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            inlets,
            outlets,
            inlet_velocity: config.inlet_velocity,
            inlet_temperature: config.inlet_temperature,
        })
    }

    /// Applies velocity boundary conditions in place.
    ///
    /// Order (later rules win): no-slip on top/bottom walls, inlet velocity,
    /// zero-gradient outlets, zero velocity on solid faces. Idempotent.
    pub fn apply_velocity(&self, u: &mut Array2<f64>, v: &mut Array2<f64>, mesh: &StaggeredMesh) {
        self.enforce_velocity(u, v, mesh, true);
    }

    /// Velocity rules for a pressure-corrected field.
    ///
    /// Same as [`apply_velocity`](Self::apply_velocity), except that outlet
    /// faces keep the flux set by [`correct_velocity`](crate::sim::pressure::correct_velocity)
    /// from the fixed outlet pressure instead of being copied from the interior.
    pub fn apply_corrected_velocity(
        &self,
        u: &mut Array2<f64>,
        v: &mut Array2<f64>,
        mesh: &StaggeredMesh,
    ) {
        self.enforce_velocity(u, v, mesh, false);
    }

    fn enforce_velocity(
        &self,
        u: &mut Array2<f64>,
        v: &mut Array2<f64>,
        mesh: &StaggeredMesh,
        copy_outlets: bool,
    ) {
        assert_eq!(u.dim(), mesh.u_shape(), "U shape does not match mesh");
        assert_eq!(v.dim(), mesh.v_shape(), "V shape does not match mesh");
        let (nx, ny) = (mesh.nx, mesh.ny);

        // No-slip walls
        u.row_mut(0).fill(0.0);
        u.row_mut(ny + 1).fill(0.0);
        v.row_mut(0).fill(0.0);
        v.row_mut(ny).fill(0.0);

        for inlet in &self.inlets {
            let speed = self.inlet_velocity;
            for k in inlet.cells.clone() {
                match inlet.side {
                    Side::Left => u[[k, 0]] = speed,
                    Side::Right => u[[k, nx]] = -speed,
                    Side::Bottom => v[[0, k]] = speed,
                    Side::Top => v[[ny, k]] = -speed,
                }
            }
        }

        if copy_outlets {
            for outlet in &self.outlets {
                for k in outlet.cells.clone() {
                    match outlet.side {
                        Side::Left => u[[k, 0]] = u[[k, 1]],
                        Side::Right => u[[k, nx]] = u[[k, nx - 1]],
                        Side::Bottom => v[[0, k]] = v[[1, k]],
                        Side::Top => v[[ny, k]] = v[[ny - 1, k]],
                    }
                }
            }
        }

        zero_solid(u, &mesh.u_mask);
        zero_solid(v, &mesh.v_mask);
    }

    /// Applies pressure boundary conditions in place: zero-gradient on every
    /// wall, then the outlet reference pressure on outlet ghost cells.
    pub fn apply_pressure(&self, p: &mut Array2<f64>) {
        copy_neighbors(p);
        let (rows, cols) = p.dim();
        for outlet in &self.outlets {
            for k in outlet.cells.clone() {
                let idx = ghost_index(outlet.side, k, rows, cols);
                p[idx] = outlet.pressure;
            }
        }
    }

    /// Applies temperature boundary conditions in place: adiabatic walls,
    /// then the inlet temperature on inlet ghost cells.
    pub fn apply_temperature(&self, t: &mut Array2<f64>) {
        copy_neighbors(t);
        let (rows, cols) = t.dim();
        for inlet in &self.inlets {
            for k in inlet.cells.clone() {
                let idx = ghost_index(inlet.side, k, rows, cols);
                t[idx] = self.inlet_temperature;
            }
        }
    }
}

/// Ghost cell of a cell-centered field behind wall position `k`.
fn ghost_index(side: Side, k: usize, rows: usize, cols: usize) -> [usize; 2] {
    match side {
        Side::Left => [k, 0],
        Side::Right => [k, cols - 1],
        Side::Bottom => [0, k],
        Side::Top => [rows - 1, k],
    }
}

/// Zero-gradient ghost layer for a cell-centered field: left, right, bottom, top.
fn copy_neighbors(field: &mut Array2<f64>) {
    let (rows, cols) = field.dim();
    for i in 0..rows {
        field[[i, 0]] = field[[i, 1]];
        field[[i, cols - 1]] = field[[i, cols - 2]];
    }
    for j in 0..cols {
        field[[0, j]] = field[[1, j]];
        field[[rows - 1, j]] = field[[rows - 2, j]];
    }
}

fn zero_solid(field: &mut Array2<f64>, fluid_mask: &Array2<bool>) {
    field.zip_mut_with(fluid_mask, |x, &fluid| {
        if !fluid {
            *x = 0.0;
        }
    });
}
