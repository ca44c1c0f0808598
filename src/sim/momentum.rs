//! Explicit momentum operator: upwind advection and central diffusion on
//! the staggered grid.
//!
//! Only strictly interior faces are computed. For U these are rows `1..=ny`
//! and columns `1..=nx-1`; for V rows `1..=ny-1` and columns `1..=nx`. All
//! other entries of the returned arrays are zero.

use ndarray::Array2;

use crate::sim::mesh::StaggeredMesh;

/// Flux contributions to the U and V tendencies.
#[derive(Debug, Clone)]
pub struct MomentumFluxes {
    /// Negative divergence of the advective flux of U, shaped like U.
    pub advection_u: Array2<f64>,
    /// Negative divergence of the advective flux of V, shaped like V.
    pub advection_v: Array2<f64>,
    /// `nu * laplacian(U)`, shaped like U.
    pub diffusion_u: Array2<f64>,
    /// `nu * laplacian(V)`, shaped like V.
    pub diffusion_v: Array2<f64>,
}

impl MomentumFluxes {
    /// Computes advective and diffusive fluxes for both velocity components.
    ///
    /// The cross terms (`d(uv)/dy` for U, `d(uv)/dx` for V) are upwinded on the
    /// sign of the other velocity component taken at the same array index,
    /// not interpolated onto the face.
    pub fn compute(u: &Array2<f64>, v: &Array2<f64>, mesh: &StaggeredMesh, nu: f64) -> Self {
        assert_eq!(u.dim(), mesh.u_shape(), "U shape does not match mesh");
        assert_eq!(v.dim(), mesh.v_shape(), "V shape does not match mesh");
        let (nx, ny, dx, dy) = (mesh.nx, mesh.ny, mesh.dx, mesh.dy);
        let (dx2, dy2) = (dx * dx, dy * dy);

        let mut advection_u = Array2::zeros(mesh.u_shape());
        let mut diffusion_u = Array2::zeros(mesh.u_shape());
        // V above the top wall row does not exist; it reads as zero.
        let v_at = |i: usize, j: usize| if i <= ny { v[[i, j]] } else { 0.0 };

        for i in 1..=ny {
            for j in 1..nx {
                let uc = u[[i, j]];
                let duu_dx = if uc >= 0.0 {
                    (uc * uc - u[[i, j - 1]] * u[[i, j - 1]]) / dx
                } else {
                    (u[[i, j + 1]] * u[[i, j + 1]] - uc * uc) / dx
                };

                let vc = v_at(i, j);
                let duv_dy = if vc >= 0.0 {
                    (uc * vc - u[[i - 1, j]] * v_at(i - 1, j)) / dy
                } else {
                    (u[[i + 1, j]] * v_at(i + 1, j) - uc * vc) / dy
                };
                advection_u[[i, j]] = -(duu_dx + duv_dy);

                let lap = (u[[i, j + 1]] - 2.0 * uc + u[[i, j - 1]]) / dx2
                    + (u[[i + 1, j]] - 2.0 * uc + u[[i - 1, j]]) / dy2;
                diffusion_u[[i, j]] = nu * lap;
            }
        }

        let mut advection_v = Array2::zeros(mesh.v_shape());
        let mut diffusion_v = Array2::zeros(mesh.v_shape());

        for i in 1..ny {
            for j in 1..=nx {
                let vc = v[[i, j]];
                let dvv_dy = if vc >= 0.0 {
                    (vc * vc - v[[i - 1, j]] * v[[i - 1, j]]) / dy
                } else {
                    (v[[i + 1, j]] * v[[i + 1, j]] - vc * vc) / dy
                };

                let uc = u[[i, j]];
                let duv_dx = if uc >= 0.0 {
                    (uc * vc - u[[i, j - 1]] * v[[i, j - 1]]) / dx
                } else if j + 1 < nx + 1 {
                    (u[[i, j + 1]] * v[[i, j + 1]] - uc * vc) / dx
                } else {
                    0.0
                };
                advection_v[[i, j]] = -(duv_dx + dvv_dy);

                let lap = (v[[i, j + 1]] - 2.0 * vc + v[[i, j - 1]]) / dx2
                    + (v[[i + 1, j]] - 2.0 * vc + v[[i - 1, j]]) / dy2;
                diffusion_v[[i, j]] = nu * lap;
            }
        }

        Self {
            advection_u,
            advection_v,
            diffusion_u,
            diffusion_v,
        }
    }

    /// Intermediate velocities `U* = U + dt (A_u + D_u)`, `V* = V + dt (A_v + D_v)`.
    ///
    /// Entries outside the interior range are carried over unchanged.
    pub fn predict(
        &self,
        u: &Array2<f64>,
        v: &Array2<f64>,
        dt: f64,
    ) -> (Array2<f64>, Array2<f64>) {
        let u_star = u + &((&self.advection_u + &self.diffusion_u) * dt);
        let v_star = v + &((&self.advection_v + &self.diffusion_v) * dt);
        (u_star, v_star)
    }
}
