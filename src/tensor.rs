//! Per-voxel structure tensor and its eigen-decomposition
//!
//! The tensor is the outer product of the normalized gradient, smoothed with
//! a separable 7-tap window per component (X, then Y, then Z), then eigen
//! decomposed with the Jacobi solver. Tensors are only decomposed where the
//! voxel carries density and sits at least [`TENSOR_MARGIN`] cells from every
//! boundary: the smoothing window needs a 3-cell halo on top of the
//! gradient's own 1-cell halo.

use log::debug;

use crate::eigen::jacobi_eigen;
use crate::gradient::GradientField;
use crate::grid::{VoxelGrid, SMOOTH_KERNEL};

/// Boundary margin inside which tensors are defined.
pub const TENSOR_MARGIN: usize = 4;

/// Jacobi convergence tolerance.
const EIGEN_TOL: f64 = 1e-8;
/// Jacobi sweep budget.
const EIGEN_MAX_SWEEPS: usize = 50;

/// Smoothed structure tensors with eigenvalues and eigenvectors.
///
/// Six symmetric components are stored struct-of-arrays in the grid's flat
/// index order. Eigen data exists only where `valid` is set; the ordering of
/// the three (eigenvalue, eigenvector) pairs is solver-defined and carries no
/// structural meaning, so downstream code treats the axes symmetrically.
pub struct StructureTensorField {
    nx: usize,
    ny: usize,
    txx: Vec<f64>,
    txy: Vec<f64>,
    txz: Vec<f64>,
    tyy: Vec<f64>,
    tyz: Vec<f64>,
    tzz: Vec<f64>,
    eigenvalues: Vec<[f64; 3]>,
    eigenvectors: Vec<[[f64; 3]; 3]>,
    valid: Vec<bool>,
}

impl StructureTensorField {
    #[inline(always)]
    fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        i + j * self.nx + k * self.nx * self.ny
    }

    /// Whether voxel (i, j, k) has a decomposed tensor.
    #[inline]
    pub fn is_valid(&self, i: usize, j: usize, k: usize) -> bool {
        self.valid[self.idx(i, j, k)]
    }

    /// Smoothed tensor matrix at (i, j, k).
    pub fn matrix(&self, i: usize, j: usize, k: usize) -> [[f64; 3]; 3] {
        let idx = self.idx(i, j, k);
        [
            [self.txx[idx], self.txy[idx], self.txz[idx]],
            [self.txy[idx], self.tyy[idx], self.tyz[idx]],
            [self.txz[idx], self.tyz[idx], self.tzz[idx]],
        ]
    }

    /// Eigenvalues at (i, j, k); zero where the voxel is not valid.
    #[inline]
    pub fn eigenvalues(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        self.eigenvalues[self.idx(i, j, k)]
    }

    /// Unit eigenvectors at (i, j, k); rows pair with `eigenvalues`.
    #[inline]
    pub fn eigenvectors(&self, i: usize, j: usize, k: usize) -> [[f64; 3]; 3] {
        self.eigenvectors[self.idx(i, j, k)]
    }
}

/// Build and decompose structure tensors for the whole grid.
pub fn build_tensor(grid: &VoxelGrid, gradient: &GradientField) -> StructureTensorField {
    let (nx, ny, nz) = grid.dims();
    let n_total = nx * ny * nz;
    debug!("building structure tensors on {}x{}x{} grid", nx, ny, nz);

    let mut field = StructureTensorField {
        nx,
        ny,
        txx: vec![0.0; n_total],
        txy: vec![0.0; n_total],
        txz: vec![0.0; n_total],
        tyy: vec![0.0; n_total],
        tyz: vec![0.0; n_total],
        tzz: vec![0.0; n_total],
        eigenvalues: vec![[0.0; 3]; n_total],
        eigenvectors: vec![[[0.0; 3]; 3]; n_total],
        valid: vec![false; n_total],
    };

    if nx <= 2 * TENSOR_MARGIN || ny <= 2 * TENSOR_MARGIN || nz <= 2 * TENSOR_MARGIN {
        return field;
    }

    // Outer product of the normalized gradient at every interior voxel.
    for k in 1..nz - 1 {
        for j in 1..ny - 1 {
            for i in 1..nx - 1 {
                let [dx, dy, dz] = gradient.direction(i, j, k);
                let idx = field.idx(i, j, k);
                field.txx[idx] = dx * dx;
                field.txy[idx] = dx * dy;
                field.txz[idx] = dx * dz;
                field.tyy[idx] = dy * dy;
                field.tyz[idx] = dy * dz;
                field.tzz[idx] = dz * dz;
            }
        }
    }

    // Separable smoothing of each component, strict X -> Y -> Z ordering.
    for axis in 0..3 {
        smooth_axis(&mut field.txx, nx, ny, nz, axis);
        smooth_axis(&mut field.txy, nx, ny, nz, axis);
        smooth_axis(&mut field.txz, nx, ny, nz, axis);
        smooth_axis(&mut field.tyy, nx, ny, nz, axis);
        smooth_axis(&mut field.tyz, nx, ny, nz, axis);
        smooth_axis(&mut field.tzz, nx, ny, nz, axis);
    }

    // Eigen-decompose where there is density and a full margin.
    let mut decomposed = 0usize;
    for k in TENSOR_MARGIN..nz - TENSOR_MARGIN {
        for j in TENSOR_MARGIN..ny - TENSOR_MARGIN {
            for i in TENSOR_MARGIN..nx - TENSOR_MARGIN {
                if grid.get(i, j, k) <= 0.0 {
                    continue;
                }
                let eig = jacobi_eigen(field.matrix(i, j, k), EIGEN_TOL, EIGEN_MAX_SWEEPS);
                let idx = field.idx(i, j, k);
                field.eigenvalues[idx] = eig.values;
                field.eigenvectors[idx] = eig.vectors;
                field.valid[idx] = true;
                decomposed += 1;
            }
        }
    }

    debug!("structure tensors decomposed at {} voxels", decomposed);
    field
}

/// 7-tap convolution of one component along one axis, written only at
/// voxels with a full [`TENSOR_MARGIN`] so the window never leaves the grid.
/// Reads come from a snapshot so a voxel never sees half-updated neighbors.
fn smooth_axis(data: &mut [f64], nx: usize, ny: usize, nz: usize, axis: usize) {
    let idx = |i: usize, j: usize, k: usize| i + j * nx + k * nx * ny;
    let prev = data.to_vec();

    for k in TENSOR_MARGIN..nz - TENSOR_MARGIN {
        for j in TENSOR_MARGIN..ny - TENSOR_MARGIN {
            for i in TENSOR_MARGIN..nx - TENSOR_MARGIN {
                let mut acc = 0.0;
                for (t, w) in SMOOTH_KERNEL.iter().enumerate() {
                    let src = match axis {
                        0 => idx(i + t - 3, j, k),
                        1 => idx(i, j + t - 3, k),
                        _ => idx(i, j, k + t - 3),
                    };
                    acc += prev[src] * w;
                }
                data[idx(i, j, k)] = acc;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::{build_gradient, GradientMode};
    use approx::assert_relative_eq;

    fn ramp_grid(n: usize) -> VoxelGrid {
        let mut grid = VoxelGrid::new(n, n, n, [1.0; 3], [0.0; 3]).unwrap();
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    grid.set(i, j, k, 1.0 + i as f64);
                }
            }
        }
        grid
    }

    #[test]
    fn ramp_tensor_is_rank_one_along_x() {
        let grid = ramp_grid(12);
        let gradient = build_gradient(&grid, GradientMode::CentralDifference);
        let tensors = build_tensor(&grid, &gradient);

        assert!(tensors.is_valid(6, 6, 6));
        let m = tensors.matrix(6, 6, 6);
        // Every contributing gradient is the unit x vector, so smoothing
        // leaves the xx component near the kernel mass and the rest near 0.
        assert!(m[0][0] > 0.9);
        assert_relative_eq!(m[1][1], 0.0, epsilon = 1e-9);
        assert_relative_eq!(m[2][2], 0.0, epsilon = 1e-9);

        let values = tensors.eigenvalues(6, 6, 6);
        // One dominant eigenvalue, two near zero (solver sorts ascending).
        assert!(values[2] > 0.9);
        assert!(values[0].abs() < 1e-8 && values[1].abs() < 1e-8);
        // Its eigenvector is +-x.
        let v = tensors.eigenvectors(6, 6, 6)[2];
        assert_relative_eq!(v[0].abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn no_density_means_no_decomposition() {
        let grid = VoxelGrid::new(12, 12, 12, [1.0; 3], [0.0; 3]).unwrap();
        let gradient = build_gradient(&grid, GradientMode::CentralDifference);
        let tensors = build_tensor(&grid, &gradient);
        assert!(!tensors.is_valid(6, 6, 6));
        assert_eq!(tensors.eigenvalues(6, 6, 6), [0.0; 3]);
    }

    #[test]
    fn margin_voxels_are_invalid() {
        let grid = ramp_grid(12);
        let gradient = build_gradient(&grid, GradientMode::CentralDifference);
        let tensors = build_tensor(&grid, &gradient);
        assert!(!tensors.is_valid(3, 6, 6));
        assert!(!tensors.is_valid(6, 6, 9));
    }
}
