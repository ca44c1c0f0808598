//! Explicit advection-diffusion update of the temperature field.
//!
//! Fluid and solid cells share one stencil; they differ only in the material
//! record selected per cell from the pressure mask.

use ndarray::Array2;

use crate::sim::materials::{Region, ThermalMaterial};
use crate::sim::mesh::StaggeredMesh;

/// Per-cell coefficients of one material.
#[derive(Debug, Clone, Copy)]
struct CellCoefficients {
    diffusivity: f64,
    generation_rate: f64,
}

impl From<&ThermalMaterial> for CellCoefficients {
    fn from(m: &ThermalMaterial) -> Self {
        Self {
            diffusivity: m.diffusivity(),
            generation_rate: m.generation_rate(),
        }
    }
}

/// Advances temperature by one explicit step and returns the new field.
///
/// `t` must already have its boundary conditions applied. Interior cells are
/// updated with
/// `T' = T + dt * (alpha (Txx + Tyy) + q/(rho cp) - u dT/dx - v dT/dy)`,
/// where advection is upwinded on the sign of `u = U[i, j]` and
/// `v = V[i, j]` (backward difference only for strictly positive velocity).
/// Ghost entries are copied from `t` unchanged.
pub fn advance_temperature(
    t: &Array2<f64>,
    u: &Array2<f64>,
    v: &Array2<f64>,
    mesh: &StaggeredMesh,
    coolant: &ThermalMaterial,
    battery: &ThermalMaterial,
    dt: f64,
) -> Array2<f64> {
    assert_eq!(t.dim(), mesh.p_shape(), "T shape does not match mesh");
    assert_eq!(u.dim(), mesh.u_shape(), "U shape does not match mesh");
    assert_eq!(v.dim(), mesh.v_shape(), "V shape does not match mesh");
    let (dx, dy) = (mesh.dx, mesh.dy);
    let (dx2, dy2) = (dx * dx, dy * dy);
    let fluid = CellCoefficients::from(coolant);
    let solid = CellCoefficients::from(battery);

    let mut t_new = t.clone();
    for (i, j) in mesh.interior_cells() {
        let coef = match Region::from_fluid_flag(mesh.p_mask[[i, j]]) {
            Region::Fluid => fluid,
            Region::Solid => solid,
        };
        let tc = t[[i, j]];
        let uc = u[[i, j]];
        let vc = v[[i, j]];

        let dtdx = if uc > 0.0 {
            (tc - t[[i, j - 1]]) / dx
        } else {
            (t[[i, j + 1]] - tc) / dx
        };
        let dtdy = if vc > 0.0 {
            (tc - t[[i - 1, j]]) / dy
        } else {
            (t[[i + 1, j]] - tc) / dy
        };

        let txx = (t[[i, j + 1]] - 2.0 * tc + t[[i, j - 1]]) / dx2;
        let tyy = (t[[i + 1, j]] - 2.0 * tc + t[[i - 1, j]]) / dy2;

        t_new[[i, j]] = tc
            + dt * (coef.diffusivity * (txx + tyy) + coef.generation_rate
                - uc * dtdx
                - vc * dtdy);
    }
    t_new
}
