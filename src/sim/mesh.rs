//! Staggered (MAC) grid and fluid/solid masks.
//!
//! # Index convention
//!
//! Every field is an `Array2<f64>` indexed `[row, col] = [i (y), j (x)]` and
//! carries one ghost layer. Along an axis with `n` interior cells, indices
//! `1..=n` are interior and `0`, `n + 1` are ghost/boundary:
//!
//! ```text
//! layout  shape            x(j)          y(i)
//! P, T    (ny+2, nx+2)     (j - 1/2) dx  (i - 1/2) dy
//! U       (ny+2, nx+1)     j dx          (i - 1/2) dy
//! V       (ny+1, nx+2)     (j - 1/2) dx  i dy
//! ```
//!
//! U and V live on the cell faces normal to their direction, so their face
//! index `0` and `n` sit on the walls. Stencils only ever *write* interior
//! entries; ghost and wall entries are owned by [`crate::sim::boundary`].

use std::ops::RangeInclusive;

use anyhow::{Result, ensure};
use ndarray::Array2;

use crate::geom::rect::Rect;
use crate::sim::config::{BoundarySegment, SimulationConfig};

/// Physical coordinates of every entry of one staggered layout.
#[derive(Debug, Clone)]
pub struct CoordGrid {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
}

impl CoordGrid {
    fn build(
        shape: (usize, usize),
        x_of: impl Fn(usize) -> f64,
        y_of: impl Fn(usize) -> f64,
    ) -> Self {
        Self {
            x: Array2::from_shape_fn(shape, |(_, j)| x_of(j)),
            y: Array2::from_shape_fn(shape, |(i, _)| y_of(i)),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.x.dim()
    }

    /// Builds a mask that is `true` (fluid) wherever no obstacle contains the coordinate.
    fn fluid_mask(&self, obstacles: &[Rect]) -> Array2<bool> {
        Array2::from_shape_fn(self.shape(), |idx| {
            let (x, y) = (self.x[idx], self.y[idx]);
            !obstacles.iter().any(|r| r.contains(x, y))
        })
    }
}

/// Uniform staggered mesh with its three fluid/solid masks.
///
/// Built once at initialization and immutable afterwards.
#[derive(Debug, Clone)]
pub struct StaggeredMesh {
    pub nx: usize,
    pub ny: usize,
    pub lx: f64,
    pub ly: f64,
    pub dx: f64,
    pub dy: f64,
    /// Cell centers (pressure and temperature).
    pub p_coords: CoordGrid,
    /// x-faces (U velocity).
    pub u_coords: CoordGrid,
    /// y-faces (V velocity).
    pub v_coords: CoordGrid,
    pub p_mask: Array2<bool>,
    pub u_mask: Array2<bool>,
    pub v_mask: Array2<bool>,
}

impl StaggeredMesh {
    pub fn new(lx: f64, ly: f64, nx: usize, ny: usize, obstacles: &[Rect]) -> Self {
        assert!(nx >= 2 && ny >= 2, "mesh needs at least 2x2 interior cells");
        let dx = lx / nx as f64;
        let dy = ly / ny as f64;
        let center_x = move |j: usize| (j as f64 - 0.5) * dx;
        let center_y = move |i: usize| (i as f64 - 0.5) * dy;
        let face_x = move |j: usize| j as f64 * dx;
        let face_y = move |i: usize| i as f64 * dy;

        let p_coords = CoordGrid::build((ny + 2, nx + 2), center_x, center_y);
        let u_coords = CoordGrid::build((ny + 2, nx + 1), face_x, center_y);
        let v_coords = CoordGrid::build((ny + 1, nx + 2), center_x, face_y);

        let p_mask = p_coords.fluid_mask(obstacles);
        let u_mask = u_coords.fluid_mask(obstacles);
        let v_mask = v_coords.fluid_mask(obstacles);

        Self {
            nx,
            ny,
            lx,
            ly,
            dx,
            dy,
            p_coords,
            u_coords,
            v_coords,
            p_mask,
            u_mask,
            v_mask,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.lx, config.ly, config.nx, config.ny, &config.obstacles)
    }

    /// Shape of cell-centered fields (P, T).
    pub fn p_shape(&self) -> (usize, usize) {
        (self.ny + 2, self.nx + 2)
    }

    /// Shape of the x-face velocity field.
    pub fn u_shape(&self) -> (usize, usize) {
        (self.ny + 2, self.nx + 1)
    }

    /// Shape of the y-face velocity field.
    pub fn v_shape(&self) -> (usize, usize) {
        (self.ny + 1, self.nx + 2)
    }

    pub fn is_fluid_cell(&self, i: usize, j: usize) -> bool {
        self.p_mask[[i, j]]
    }

    /// Interior cell indices `(i, j)` that are solid.
    pub fn solid_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.interior_cells().filter(|&(i, j)| !self.p_mask[[i, j]])
    }

    /// Interior cell indices `(i, j)` that are fluid.
    pub fn fluid_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.interior_cells().filter(|&(i, j)| self.p_mask[[i, j]])
    }

    /// All interior cell indices, row by row.
    pub fn interior_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let nx = self.nx;
        (1..=self.ny).flat_map(move |i| (1..=nx).map(move |j| (i, j)))
    }

    pub fn num_solid_cells(&self) -> usize {
        self.solid_cells().count()
    }
}

/// Slack added before flooring a scaled wall position, so that positions on a
/// cell edge land on that edge despite rounding.
const INDEX_EPS: f64 = 1e-9;

/// Maps a physical position along a wall of length `length` with `n` cells to
/// the 0-based interior cell index `floor(pos / length * n)`.
///
/// Positions outside `[0, length]` are rejected rather than clamped.
pub fn grid_index(pos: f64, length: f64, n: usize) -> Result<usize> {
    ensure!(
        pos.is_finite() && (0.0..=length).contains(&pos),
        "position {pos} is outside the wall [0, {length}]"
    );
    let k = (pos / length * n as f64 + INDEX_EPS).floor() as usize;
    Ok(k.min(n))
}

/// Array indices along the wall covered by a boundary segment.
///
/// The segment `[start, end)` covers interior cells `k0..k1` (0-based), which
/// are array indices `k0 + 1 ..= k1` once the ghost layer is accounted for.
pub fn segment_cells(
    segment: &BoundarySegment,
    length: f64,
    n: usize,
) -> Result<RangeInclusive<usize>> {
    ensure!(
        segment.start < segment.end,
        "segment on {:?} wall is inverted or empty (start={}, end={})",
        segment.side,
        segment.start,
        segment.end
    );
    let k0 = grid_index(segment.start, length, n)?;
    let k1 = grid_index(segment.end, length, n)?;
    ensure!(
        k1 > k0,
        "segment on {:?} wall [{}, {}] maps to an empty cell range",
        segment.side,
        segment.start,
        segment.end
    );
    Ok(k0 + 1..=k1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::config::Side;

    fn block_mesh() -> (StaggeredMesh, Rect) {
        let rect = Rect::centered(0.05, 0.05, 0.02, 0.02);
        (StaggeredMesh::new(0.1, 0.1, 10, 10, &[rect]), rect)
    }

    #[test]
    fn test_shapes() {
        let mesh = StaggeredMesh::new(0.2, 0.1, 20, 10, &[]);
        assert_eq!(mesh.p_shape(), (12, 22));
        assert_eq!(mesh.u_shape(), (12, 21));
        assert_eq!(mesh.v_shape(), (11, 22));
        assert_eq!(mesh.p_coords.shape(), mesh.p_shape());
        assert_eq!(mesh.u_mask.dim(), mesh.u_shape());
        assert_eq!(mesh.v_mask.dim(), mesh.v_shape());
        assert!((mesh.dx - 0.01).abs() < 1e-15);
        assert!((mesh.dy - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_coordinates() {
        let mesh = StaggeredMesh::new(1.0, 2.0, 4, 4, &[]);
        // Cell centers, including ghosts
        assert!((mesh.p_coords.x[[0, 0]] + 0.125).abs() < 1e-15);
        assert!((mesh.p_coords.x[[0, 1]] - 0.125).abs() < 1e-15);
        assert!((mesh.p_coords.y[[1, 0]] - 0.25).abs() < 1e-15);
        // U faces sit on x = j dx
        assert!((mesh.u_coords.x[[2, 4]] - 1.0).abs() < 1e-15);
        assert!((mesh.u_coords.y[[2, 4]] - 0.75).abs() < 1e-15);
        // V faces sit on y = i dy
        assert!((mesh.v_coords.y[[4, 1]] - 2.0).abs() < 1e-15);
        assert!((mesh.v_coords.x[[4, 1]] - 0.125).abs() < 1e-15);
    }

    #[test]
    fn test_empty_domain_is_all_fluid() {
        let mesh = StaggeredMesh::new(1.0, 1.0, 5, 5, &[]);
        assert!(mesh.p_mask.iter().all(|&f| f));
        assert!(mesh.u_mask.iter().all(|&f| f));
        assert!(mesh.v_mask.iter().all(|&f| f));
        assert_eq!(mesh.num_solid_cells(), 0);
        assert_eq!(mesh.fluid_cells().count(), 25);
    }

    #[test]
    fn test_mask_consistency_for_cells_inside_obstacle() {
        let (mesh, rect) = block_mesh();
        let mut inside = 0;
        for (i, j) in mesh.interior_cells() {
            let (x, y) = (mesh.p_coords.x[[i, j]], mesh.p_coords.y[[i, j]]);
            let strictly_inside =
                x > rect.x_start && x < rect.x_end && y > rect.y_start && y < rect.y_end;
            if !strictly_inside {
                continue;
            }
            inside += 1;
            assert!(!mesh.p_mask[[i, j]], "cell ({i}, {j}) should be solid");
            // Faces bounding the cell
            assert!(!mesh.u_mask[[i, j - 1]], "west face of ({i}, {j})");
            assert!(!mesh.u_mask[[i, j]], "east face of ({i}, {j})");
            assert!(!mesh.v_mask[[i - 1, j]], "south face of ({i}, {j})");
            assert!(!mesh.v_mask[[i, j]], "north face of ({i}, {j})");
        }
        // 0.02 x 0.02 block on a 0.01 grid covers 2 x 2 cells
        assert_eq!(inside, 4);
        assert_eq!(mesh.num_solid_cells(), 4);
        assert!(mesh.solid_cells().all(|(i, j)| (5..=6).contains(&i) && (5..=6).contains(&j)));
    }

    #[test]
    fn test_masks_follow_obstacle_predicate() {
        let (mesh, rect) = block_mesh();
        let layouts = [
            (&mesh.p_coords, &mesh.p_mask),
            (&mesh.u_coords, &mesh.u_mask),
            (&mesh.v_coords, &mesh.v_mask),
        ];
        for (coords, mask) in layouts {
            for (idx, &fluid) in mask.indexed_iter() {
                let solid = rect.contains(coords.x[idx], coords.y[idx]);
                assert_eq!(fluid, !solid, "mismatch at {idx:?}");
            }
        }
        // Faces on the obstacle edge x = 0.04 are solid in U
        assert!(!mesh.u_mask[[5, 4]]);
        assert!(mesh.u_mask[[5, 3]]);
    }

    #[test]
    fn test_grid_index() {
        assert_eq!(grid_index(0.0, 0.1, 10).unwrap(), 0);
        assert_eq!(grid_index(0.05, 0.1, 10).unwrap(), 5);
        assert_eq!(grid_index(0.1, 0.1, 10).unwrap(), 10);
        assert!(grid_index(-0.01, 0.1, 10).is_err());
        assert!(grid_index(0.11, 0.1, 10).is_err());
        assert!(grid_index(f64::NAN, 0.1, 10).is_err());
    }

    #[test]
    fn test_segment_cells() {
        let seg = BoundarySegment::new(Side::Left, 0.0, 0.05);
        assert_eq!(segment_cells(&seg, 0.1, 10).unwrap(), 1..=5);

        let seg = BoundarySegment::new(Side::Right, 0.0, 0.025);
        assert_eq!(segment_cells(&seg, 0.1, 10).unwrap(), 1..=2);

        let seg = BoundarySegment::new(Side::Top, 0.05, 0.1);
        assert_eq!(segment_cells(&seg, 0.1, 10).unwrap(), 6..=10);
    }

    #[test]
    fn test_cell_aligned_segments() {
        // Edges such as 0.01 are inexact in binary and still map onto their cell edge
        assert_eq!(grid_index(0.01, 0.1, 10).unwrap(), 1);
        assert_eq!(grid_index(0.07, 0.1, 10).unwrap(), 7);

        let first_cell = BoundarySegment::new(Side::Left, 0.0, 0.01);
        assert_eq!(segment_cells(&first_cell, 0.1, 10).unwrap(), 1..=1);

        let seg = BoundarySegment::new(Side::Left, 0.02, 0.04);
        assert_eq!(segment_cells(&seg, 0.1, 10).unwrap(), 3..=4);

        let seg = BoundarySegment::new(Side::Bottom, 0.04, 0.08);
        assert_eq!(segment_cells(&seg, 0.1, 10).unwrap(), 5..=8);
    }

    #[test]
    fn test_segment_along_obstacle_edges_covers_solid_rows() {
        let (mesh, rect) = block_mesh();
        let seg = BoundarySegment::new(Side::Left, rect.y_start, rect.y_end);
        let rows = segment_cells(&seg, mesh.ly, mesh.ny).unwrap();
        let solid_rows: Vec<usize> = (1..=mesh.ny).filter(|&i| !mesh.p_mask[[i, 5]]).collect();
        assert_eq!(rows.collect::<Vec<_>>(), solid_rows);
    }

    #[test]
    fn test_segment_cells_rejects_bad_ranges() {
        let inverted = BoundarySegment::new(Side::Left, 0.05, 0.0);
        assert!(segment_cells(&inverted, 0.1, 10).is_err());

        let outside = BoundarySegment::new(Side::Left, 0.05, 0.15);
        assert!(segment_cells(&outside, 0.1, 10).is_err());

        let sub_cell = BoundarySegment::new(Side::Left, 0.011, 0.019);
        let err = segment_cells(&sub_cell, 0.1, 10).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
