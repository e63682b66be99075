//! Per-voxel density gradient
//!
//! Two kernels are available: a fast two-neighbor central difference and a
//! full 3x3x3 Sobel-like mask (transverse weights 1/2/4, antisymmetric
//! across the derivative axis). Both compute `previous - next` along the
//! axis, negate the result, and normalize the vector by its own magnitude.
//! Voxels on the grid boundary are left at zero.

use log::debug;

use crate::grid::VoxelGrid;

/// Finite-difference kernel selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GradientMode {
    /// Two-neighbor central difference per axis.
    CentralDifference,
    /// 3x3x3 weighted Sobel-like mask.
    Sobel,
}

/// Normalized gradient vectors and raw magnitudes, one per voxel.
///
/// Stored struct-of-arrays in the grid's flat index order. Entries on the
/// 1-voxel border are zero (not computed).
pub struct GradientField {
    nx: usize,
    ny: usize,
    gx: Vec<f64>,
    gy: Vec<f64>,
    gz: Vec<f64>,
    mag: Vec<f64>,
}

impl GradientField {
    #[inline(always)]
    fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        i + j * self.nx + k * self.nx * self.ny
    }

    /// Unit gradient direction at (i, j, k); zero where magnitude was zero.
    #[inline]
    pub fn direction(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        let idx = self.idx(i, j, k);
        [self.gx[idx], self.gy[idx], self.gz[idx]]
    }

    /// Gradient magnitude before normalization.
    #[inline]
    pub fn magnitude(&self, i: usize, j: usize, k: usize) -> f64 {
        self.mag[self.idx(i, j, k)]
    }
}

/// Compute the gradient field for the whole grid.
///
/// Purely per-voxel; every interior voxel is independent of the others.
pub fn build_gradient(grid: &VoxelGrid, mode: GradientMode) -> GradientField {
    let (nx, ny, nz) = grid.dims();
    let n_total = nx * ny * nz;

    let mut field = GradientField {
        nx,
        ny,
        gx: vec![0.0; n_total],
        gy: vec![0.0; n_total],
        gz: vec![0.0; n_total],
        mag: vec![0.0; n_total],
    };

    if nx < 3 || ny < 3 || nz < 3 {
        return field;
    }

    // Transverse Sobel weights: center 4, edge 2, corner 1.
    let weight = |a: i64, b: i64| -> f64 {
        if a == 0 && b == 0 {
            4.0
        } else if a != 0 && b != 0 {
            1.0
        } else {
            2.0
        }
    };

    let mut max_mag = f64::NEG_INFINITY;
    let mut min_mag = f64::INFINITY;

    for k in 1..nz - 1 {
        for j in 1..ny - 1 {
            for i in 1..nx - 1 {
                let (mut dx, mut dy, mut dz) = (0.0, 0.0, 0.0);

                match mode {
                    GradientMode::CentralDifference => {
                        dx = grid.get(i - 1, j, k) - grid.get(i + 1, j, k);
                        dy = grid.get(i, j - 1, k) - grid.get(i, j + 1, k);
                        dz = grid.get(i, j, k - 1) - grid.get(i, j, k + 1);
                    }
                    GradientMode::Sobel => {
                        for a in -1i64..=1 {
                            for b in -1i64..=1 {
                                let w = weight(a, b);
                                let (ja, ka) = ((j as i64 + a) as usize, (k as i64 + b) as usize);
                                dx += w * (grid.get(i - 1, ja, ka) - grid.get(i + 1, ja, ka));
                                let (ia, kb) = ((i as i64 + a) as usize, (k as i64 + b) as usize);
                                dy += w * (grid.get(ia, j - 1, kb) - grid.get(ia, j + 1, kb));
                                let (ib, jb) = ((i as i64 + a) as usize, (j as i64 + b) as usize);
                                dz += w * (grid.get(ib, jb, k - 1) - grid.get(ib, jb, k + 1));
                            }
                        }
                    }
                }

                // Flip so the vector points down the density slope.
                dx = -dx;
                dy = -dy;
                dz = -dz;

                let mag = (dx * dx + dy * dy + dz * dz).sqrt();
                let idx = field.idx(i, j, k);
                if mag != 0.0 {
                    field.gx[idx] = dx / mag;
                    field.gy[idx] = dy / mag;
                    field.gz[idx] = dz / mag;
                }
                field.mag[idx] = mag;

                if mag > max_mag {
                    max_mag = mag;
                }
                if mag < min_mag && grid.get(i, j, k) != 0.0 {
                    min_mag = mag;
                }
            }
        }
    }

    debug!(
        "gradient built ({:?}): magnitude range [{:.4}, {:.4}]",
        mode, min_mag, max_mag
    );
    field
}
