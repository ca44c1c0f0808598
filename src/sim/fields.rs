use ndarray::Array2;

use crate::sim::mesh::StaggeredMesh;

/// Primary field state of the simulation (pressure, velocities, temperature).
///
/// Shapes follow the ghost-layer convention documented in [`crate::sim::mesh`].
#[derive(Debug, Clone)]
pub struct FlowFields {
    /// Pressure at cell centers [Pa].
    pub p: Array2<f64>,
    /// x-velocity at x-faces [m/s].
    pub u: Array2<f64>,
    /// y-velocity at y-faces [m/s].
    pub v: Array2<f64>,
    /// Temperature at cell centers [C].
    pub t: Array2<f64>,
}

impl FlowFields {
    /// All-zero fields shaped for `mesh`.
    pub fn zeros(mesh: &StaggeredMesh) -> Self {
        Self {
            p: Array2::zeros(mesh.p_shape()),
            u: Array2::zeros(mesh.u_shape()),
            v: Array2::zeros(mesh.v_shape()),
            t: Array2::zeros(mesh.p_shape()),
        }
    }

    /// Fluid at rest with temperature `ambient`, solid cells at `battery`.
    pub fn at_rest(mesh: &StaggeredMesh, ambient: f64, battery: f64) -> Self {
        let mut fields = Self::zeros(mesh);
        fields.t.fill(ambient);
        for (idx, t) in fields.t.indexed_iter_mut() {
            if !mesh.p_mask[idx] {
                *t = battery;
            }
        }
        fields
    }

    /// Name of the first field holding a NaN or infinite value, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        [("p", &self.p), ("u", &self.u), ("v", &self.v), ("t", &self.t)]
            .into_iter()
            .find(|(_, field)| field.iter().any(|x| !x.is_finite()))
            .map(|(name, _)| name)
    }
}

/// Copies the interior block `[1..=ny, 1..=nx]` of a cell-centered field.
pub fn interior(field: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = field.dim();
    field.slice(ndarray::s![1..rows - 1, 1..cols - 1]).to_owned()
}
