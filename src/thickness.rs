//! Local structural thickness
//!
//! Two independent estimators:
//! - principal-axis thickness: march outward from each voxel along its three
//!   tensor eigenvectors (both directions) until the walk leaves the valid
//!   margin or falls to background density, accumulating physical distance;
//! - ridge-ball thickness: the diameter of the largest distance-ridge ball
//!   covering the query voxel, found by scanning a bounded window.

use log::debug;

use crate::grid::VoxelGrid;
use crate::tensor::{StructureTensorField, TENSOR_MARGIN};

/// Search window half-width (voxels) for the ridge-ball lookup.
const RIDGE_WINDOW: i64 = 20;

/// Thickness along the three eigen-axes of one voxel.
///
/// The axes carry no guaranteed order (see the eigen solver); t1/t2/t3 are
/// simply the three marches in solver order.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Thickness {
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
}

/// March along each eigenvector (and its negation) for every voxel with a
/// valid tensor, summing the physical distance covered before the walk exits
/// the margin or reaches density at or below `threshold`.
///
/// Returns one [`Thickness`] per voxel in flat grid order; voxels without a
/// valid tensor stay at zero.
pub fn principal_thickness(
    grid: &VoxelGrid,
    tensors: &StructureTensorField,
    threshold: f64,
) -> Vec<Thickness> {
    let (nx, ny, nz) = grid.dims();
    debug!("principal-axis thickness on {}x{}x{} grid", nx, ny, nz);

    let mut out = vec![Thickness::default(); nx * ny * nz];
    if nx <= 2 * TENSOR_MARGIN || ny <= 2 * TENSOR_MARGIN || nz <= 2 * TENSOR_MARGIN {
        return out;
    }

    for k in TENSOR_MARGIN..nz - TENSOR_MARGIN {
        for j in TENSOR_MARGIN..ny - TENSOR_MARGIN {
            for i in TENSOR_MARGIN..nx - TENSOR_MARGIN {
                if grid.get(i, j, k) <= 0.0 || !tensors.is_valid(i, j, k) {
                    continue;
                }
                let vectors = tensors.eigenvectors(i, j, k);
                let mut t = [0.0f64; 3];
                for (axis, v) in vectors.iter().enumerate() {
                    t[axis] += march(grid, i, j, k, *v, threshold);
                    t[axis] += march(grid, i, j, k, [-v[0], -v[1], -v[2]], threshold);
                }
                out[grid.idx(i, j, k)] = Thickness {
                    t1: t[0],
                    t2: t[1],
                    t3: t[2],
                };
            }
        }
    }

    out
}

/// Walk from (i, j, k) in unit steps of `dir`, each step rounded to the
/// nearest integer voxel, and return the physical distance covered when the
/// walk exits the margin or hits density <= `threshold`.
fn march(grid: &VoxelGrid, i: usize, j: usize, k: usize, dir: [f64; 3], threshold: f64) -> f64 {
    let (nx, ny, nz) = grid.dims();
    let apix = grid.apix();
    let lo = TENSOR_MARGIN as i64;
    let hi = [
        (nx - TENSOR_MARGIN) as i64,
        (ny - TENSOR_MARGIN) as i64,
        (nz - TENSOR_MARGIN) as i64,
    ];

    let mut n = 0i64;
    loop {
        let step = n as f64;
        let x = i as i64 + (step * dir[0]).round() as i64;
        let y = j as i64 + (step * dir[1]).round() as i64;
        let z = k as i64 + (step * dir[2]).round() as i64;

        let outside = x > hi[0] || y > hi[1] || z > hi[2] || x < lo || y < lo || z < lo;
        if outside || grid.get(x as usize, y as usize, z as usize) <= threshold {
            let dx = step * dir[0] * apix[0];
            let dy = step * dir[1] * apix[1];
            let dz = step * dir[2] * apix[2];
            return (dx * dx + dy * dy + dz * dz).sqrt();
        }
        n += 1;
    }
}

/// Local thickness of the voxel (x, y, z) from the distance ridge: twice the
/// largest ridge radius whose ball covers the query point, in physical units.
///
/// Scans a +-[`RIDGE_WINDOW`] neighborhood clamped to the grid. Returns 0.0
/// when no ridge ball covers the point.
pub fn local_thickness(grid: &VoxelGrid, ridge: &[f64], x: usize, y: usize, z: usize) -> f64 {
    let (nx, ny, nz) = grid.dims();
    let mut best = 0.0f64;

    for k in z as i64 - RIDGE_WINDOW..=z as i64 + RIDGE_WINDOW {
        if k < 0 || k >= nz as i64 {
            continue;
        }
        for j in y as i64 - RIDGE_WINDOW..=y as i64 + RIDGE_WINDOW {
            if j < 0 || j >= ny as i64 {
                continue;
            }
            for i in x as i64 - RIDGE_WINDOW..=x as i64 + RIDGE_WINDOW {
                if i < 0 || i >= nx as i64 {
                    continue;
                }
                let r = ridge[grid.idx(i as usize, j as usize, k as usize)];
                if r <= best {
                    continue;
                }
                let dx = (x as i64 - i) as f64;
                let dy = (y as i64 - j) as f64;
                let dz = (z as i64 - k) as f64;
                if dx * dx + dy * dy + dz * dz < r * r {
                    best = r;
                }
            }
        }
    }

    2.0 * best * grid.apix()[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{distance_ridge, distance_transform};
    use crate::gradient::{build_gradient, GradientMode};
    use crate::tensor::build_tensor;
    use approx::assert_relative_eq;

    /// Grid with a solid slab of density 1 spanning x in [5, 10].
    fn slab_grid(n: usize) -> VoxelGrid {
        let mut grid = VoxelGrid::new(n, n, n, [1.0; 3], [0.0; 3]).unwrap();
        for k in 0..n {
            for j in 0..n {
                for i in 5..=10 {
                    grid.set(i, j, k, 1.0);
                }
            }
        }
        grid
    }

    #[test]
    fn slab_thickness_is_bounded_by_slab_extent() {
        let grid = slab_grid(16);
        let gradient = build_gradient(&grid, GradientMode::Sobel);
        let tensors = build_tensor(&grid, &gradient);
        let thickness = principal_thickness(&grid, &tensors, 0.0);

        let t = thickness[grid.idx(7, 8, 8)];
        let total = t.t1 + t.t2 + t.t3;
        assert!(total > 0.0, "expected a nonzero march somewhere");
        // No single axis can march further than the margin box allows.
        let max_walk = 2.0 * (16.0 - 2.0 * TENSOR_MARGIN as f64) * 3.0f64.sqrt();
        assert!(t.t1 <= max_walk && t.t2 <= max_walk && t.t3 <= max_walk);
    }

    #[test]
    fn thickness_zero_without_valid_tensor() {
        let grid = VoxelGrid::new(12, 12, 12, [1.0; 3], [0.0; 3]).unwrap();
        let gradient = build_gradient(&grid, GradientMode::CentralDifference);
        let tensors = build_tensor(&grid, &gradient);
        let thickness = principal_thickness(&grid, &tensors, 0.0);
        assert!(thickness.iter().all(|t| *t == Thickness::default()));
    }

    #[test]
    fn ridge_ball_thickness_of_solid_ball() {
        // Ball of radius 4 at the center of a 13-cube: the center voxel's
        // covering ball has the center's own distance value.
        let n = 13;
        let c = 6.0;
        let mut grid = VoxelGrid::new(n, n, n, [1.0; 3], [0.0; 3]).unwrap();
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    let d2 =
                        (i as f64 - c).powi(2) + (j as f64 - c).powi(2) + (k as f64 - c).powi(2);
                    if d2 <= 16.0 {
                        grid.set(i, j, k, 1.0);
                    }
                }
            }
        }
        let dt = distance_transform(&grid);
        let dr = distance_ridge(&dt, &grid);

        let expected = 2.0 * dt[grid.idx(6, 6, 6)];
        assert_relative_eq!(local_thickness(&grid, &dr, 6, 6, 6), expected);
    }

    #[test]
    fn ridge_ball_thickness_defaults_to_zero() {
        // Empty ridge: no covering ball anywhere.
        let grid = VoxelGrid::new(8, 8, 8, [1.0; 3], [0.0; 3]).unwrap();
        let ridge = vec![0.0; 8 * 8 * 8];
        assert_eq!(local_thickness(&grid, &ridge, 4, 4, 4), 0.0);
    }

    #[test]
    fn ridge_ball_thickness_scales_with_apix() {
        let mut grid = VoxelGrid::new(9, 9, 9, [2.0; 3], [0.0; 3]).unwrap();
        grid.set(4, 4, 4, 1.0);
        let mut ridge = vec![0.0; 9 * 9 * 9];
        ridge[grid.idx(4, 4, 4)] = 1.5;
        assert_relative_eq!(local_thickness(&grid, &ridge, 4, 4, 4), 6.0);
    }
}
