//! Pressure projection: Poisson source term, iterative pressure solve and
//! velocity correction.

use ndarray::{Array2, ArrayViewMut1, Axis, s};
use rayon::prelude::*;

use crate::sim::boundary::BoundarySet;
use crate::sim::config::{PoissonConfig, PressureScheme, Side};
use crate::sim::mesh::StaggeredMesh;

/// Guards the denominator of the relative change between sweeps.
const NORM_EPS: f64 = 1e-12;

/// Outcome of one pressure solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoissonReport {
    /// Sweeps performed.
    pub iterations: usize,
    /// Relative L2 change of the last sweep.
    pub error: f64,
    /// True if `error` dropped below the tolerance before the iteration cap.
    pub converged: bool,
}

/// Source term `b = rho/dt * div(U*, V*)` on interior cells, shaped like P.
///
/// Ghost entries are zero.
pub fn poisson_source(
    u_star: &Array2<f64>,
    v_star: &Array2<f64>,
    mesh: &StaggeredMesh,
    rho: f64,
    dt: f64,
) -> Array2<f64> {
    let mut b = Array2::zeros(mesh.p_shape());
    let div = divergence(u_star, v_star, mesh);
    b.slice_mut(s![1..=mesh.ny, 1..=mesh.nx])
        .assign(&(div * (rho / dt)));
    b
}

/// Discrete divergence of the face velocities on interior cells, shape `(ny, nx)`.
pub fn divergence(u: &Array2<f64>, v: &Array2<f64>, mesh: &StaggeredMesh) -> Array2<f64> {
    assert_eq!(u.dim(), mesh.u_shape(), "U shape does not match mesh");
    assert_eq!(v.dim(), mesh.v_shape(), "V shape does not match mesh");
    let (dx, dy) = (mesh.dx, mesh.dy);
    Array2::from_shape_fn((mesh.ny, mesh.nx), |(r, c)| {
        let (i, j) = (r + 1, c + 1);
        (u[[i, j]] - u[[i, j - 1]]) / dx + (v[[i, j]] - v[[i - 1, j]]) / dy
    })
}

/// L2 norm of the divergence over interior fluid cells.
pub fn divergence_norm(u: &Array2<f64>, v: &Array2<f64>, mesh: &StaggeredMesh) -> f64 {
    let div = divergence(u, v, mesh);
    mesh.fluid_cells()
        .map(|(i, j)| div[[i - 1, j - 1]].powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Solves the pressure Poisson equation in place, starting from the current `p`.
///
/// Pressure boundary conditions are applied after every sweep. Stops when
/// the relative L2 change between sweeps drops below `config.tolerance` or
/// after `config.max_iterations` sweeps, whichever comes first.
pub fn solve_poisson(
    p: &mut Array2<f64>,
    b: &Array2<f64>,
    mesh: &StaggeredMesh,
    boundary: &BoundarySet,
    config: &PoissonConfig,
) -> PoissonReport {
    assert_eq!(p.dim(), mesh.p_shape(), "P shape does not match mesh");
    assert_eq!(b.dim(), mesh.p_shape(), "source shape does not match mesh");
    match config.scheme {
        PressureScheme::Jacobi => jacobi(p, b, mesh, boundary, config, false),
        PressureScheme::ParallelJacobi => jacobi(p, b, mesh, boundary, config, true),
        PressureScheme::Sor { omega } => sor(p, b, mesh, boundary, config, omega),
    }
}

/// Subtracts the pressure gradient from the intermediate velocities in place.
///
/// Interior faces are corrected, and so are outlet faces, using the fixed
/// outlet pressure held in the ghost cell behind them. Other wall faces are
/// left alone. Reapply the boundary conditions afterwards with
/// [`BoundarySet::apply_corrected_velocity`].
pub fn correct_velocity(
    u: &mut Array2<f64>,
    v: &mut Array2<f64>,
    p: &Array2<f64>,
    mesh: &StaggeredMesh,
    boundary: &BoundarySet,
    rho: f64,
    dt: f64,
) {
    let (nx, ny) = (mesh.nx, mesh.ny);
    let cu = dt / (rho * mesh.dx);
    let cv = dt / (rho * mesh.dy);
    for i in 1..=ny {
        for j in 1..nx {
            u[[i, j]] -= cu * (p[[i, j + 1]] - p[[i, j]]);
        }
    }
    for i in 1..ny {
        for j in 1..=nx {
            v[[i, j]] -= cv * (p[[i + 1, j]] - p[[i, j]]);
        }
    }

    for outlet in &boundary.outlets {
        for k in outlet.cells.clone() {
            match outlet.side {
                Side::Left => u[[k, 0]] -= cu * (p[[k, 1]] - p[[k, 0]]),
                Side::Right => u[[k, nx]] -= cu * (p[[k, nx + 1]] - p[[k, nx]]),
                Side::Bottom => v[[0, k]] -= cv * (p[[1, k]] - p[[0, k]]),
                Side::Top => v[[ny, k]] -= cv * (p[[ny + 1, k]] - p[[ny, k]]),
            }
        }
    }
}

/// Five-point Poisson stencil weights.
#[derive(Debug, Clone, Copy)]
struct Stencil {
    dx2: f64,
    dy2: f64,
    denom: f64,
}

impl Stencil {
    fn new(mesh: &StaggeredMesh) -> Self {
        let dx2 = mesh.dx * mesh.dx;
        let dy2 = mesh.dy * mesh.dy;
        Self {
            dx2,
            dy2,
            denom: 2.0 * (dx2 + dy2),
        }
    }

    /// Value of `p[i, j]` that satisfies the discrete equation given its neighbors.
    fn relax(&self, p: &Array2<f64>, i: usize, j: usize, b: f64) -> f64 {
        ((p[[i, j + 1]] + p[[i, j - 1]]) * self.dy2 + (p[[i + 1, j]] + p[[i - 1, j]]) * self.dx2
            - b * self.dx2 * self.dy2)
            / self.denom
    }
}

fn jacobi(
    p: &mut Array2<f64>,
    b: &Array2<f64>,
    mesh: &StaggeredMesh,
    boundary: &BoundarySet,
    config: &PoissonConfig,
    parallel: bool,
) -> PoissonReport {
    let (nx, ny) = (mesh.nx, mesh.ny);
    let stencil = Stencil::new(mesh);
    let mut next = p.clone();
    let mut report = PoissonReport {
        iterations: 0,
        error: f64::INFINITY,
        converged: false,
    };

    for iteration in 1..=config.max_iterations {
        {
            let prev = &*p;
            let sweep_row = |(i, mut row): (usize, ArrayViewMut1<f64>)| {
                for j in 1..=nx {
                    row[j] = stencil.relax(prev, i, j, b[[i, j]]);
                }
            };
            let rows = next.axis_iter_mut(Axis(0));
            if parallel {
                rows.into_par_iter()
                    .enumerate()
                    .skip(1)
                    .take(ny)
                    .for_each(sweep_row);
            } else {
                rows.enumerate().skip(1).take(ny).for_each(sweep_row);
            }
        }
        boundary.apply_pressure(&mut next);

        let error = relative_change(&next, p);
        std::mem::swap(p, &mut next);
        report = PoissonReport {
            iterations: iteration,
            error,
            converged: error < config.tolerance,
        };
        if report.converged {
            break;
        }
    }
    report
}

fn sor(
    p: &mut Array2<f64>,
    b: &Array2<f64>,
    mesh: &StaggeredMesh,
    boundary: &BoundarySet,
    config: &PoissonConfig,
    omega: f64,
) -> PoissonReport {
    let (nx, ny) = (mesh.nx, mesh.ny);
    let stencil = Stencil::new(mesh);
    let mut prev = p.clone();
    let mut report = PoissonReport {
        iterations: 0,
        error: f64::INFINITY,
        converged: false,
    };

    for iteration in 1..=config.max_iterations {
        prev.assign(&*p);
        for i in 1..=ny {
            for j in 1..=nx {
                let gs = stencil.relax(p, i, j, b[[i, j]]);
                p[[i, j]] = (1.0 - omega) * p[[i, j]] + omega * gs;
            }
        }
        boundary.apply_pressure(p);

        let error = relative_change(p, &prev);
        report = PoissonReport {
            iterations: iteration,
            error,
            converged: error < config.tolerance,
        };
        if report.converged {
            break;
        }
    }
    report
}

/// `||new - old|| / (||new|| + eps)` over the whole array.
fn relative_change(new: &Array2<f64>, old: &Array2<f64>) -> f64 {
    let diff = new
        .iter()
        .zip(old.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt();
    let norm = new.iter().map(|a| a * a).sum::<f64>().sqrt();
    diff / (norm + NORM_EPS)
}
