//! Dense voxel grid with physical-unit scaling
//!
//! The grid stores one f64 density per voxel in a flat buffer, Fortran order:
//! index `[i, j, k]` maps to `i + j*nx + k*nx*ny`, with `i` fastest-varying.
//! This matches the voxel ordering delivered by map-file readers (first axis
//! fastest, third slowest), so the I/O layer can hand its buffer over without
//! reshuffling.
//!
//! All derived fields (gradient, tensor, distance transform, ridge) share
//! this index domain and are recomputed wholesale after the grid mutates;
//! they are never patched incrementally.

use log::debug;

use crate::error::{GridError, Result};

/// Largest supported extent along any axis.
pub const MAX_DIM: usize = 2000;

/// 7-tap smoothing window shared by density and tensor smoothing.
pub(crate) const SMOOTH_KERNEL: [f64; 7] = [0.006, 0.061, 0.242, 0.383, 0.242, 0.061, 0.006];

/// Min / max / mean density over the whole grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DensityStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Dense 3D scalar density field on a regular axis-aligned grid.
#[derive(Clone, Debug)]
pub struct VoxelGrid {
    nx: usize,
    ny: usize,
    nz: usize,
    /// Physical distance per voxel along each axis.
    apix: [f64; 3],
    /// Physical-space position of voxel (0, 0, 0).
    origin: [f64; 3],
    data: Vec<f64>,
}

impl VoxelGrid {
    /// Allocate a zero-filled grid.
    ///
    /// Fails if any dimension is 0 or reaches [`MAX_DIM`].
    pub fn new(nx: usize, ny: usize, nz: usize, apix: [f64; 3], origin: [f64; 3]) -> Result<Self> {
        check_dims(nx, ny, nz)?;
        Ok(Self {
            nx,
            ny,
            nz,
            apix,
            origin,
            data: vec![0.0; nx * ny * nz],
        })
    }

    /// Build a grid around an existing flat buffer (i-fastest order).
    pub fn from_data(
        nx: usize,
        ny: usize,
        nz: usize,
        apix: [f64; 3],
        origin: [f64; 3],
        data: Vec<f64>,
    ) -> Result<Self> {
        check_dims(nx, ny, nz)?;
        if data.len() != nx * ny * nz {
            return Err(GridError::DataSizeMismatch {
                got: data.len(),
                nx,
                ny,
                nz,
            });
        }
        Ok(Self {
            nx,
            ny,
            nz,
            apix,
            origin,
            data,
        })
    }

    /// Build a grid deriving per-axis scale from physical cell lengths and
    /// interval counts, the way map headers describe it.
    ///
    /// Fails fast on non-positive interval counts rather than producing an
    /// undefined scale.
    pub fn from_cell(
        nx: usize,
        ny: usize,
        nz: usize,
        lengths: [f64; 3],
        intervals: [i64; 3],
        origin: [f64; 3],
        data: Vec<f64>,
    ) -> Result<Self> {
        for (axis, &m) in ['x', 'y', 'z'].iter().zip(intervals.iter()) {
            if m <= 0 {
                return Err(GridError::BadIntervalCount {
                    axis: *axis,
                    value: m,
                });
            }
        }
        let apix = [
            lengths[0] / intervals[0] as f64,
            lengths[1] / intervals[1] as f64,
            lengths[2] / intervals[2] as f64,
        ];
        Self::from_data(nx, ny, nz, apix, origin, data)
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    pub fn apix(&self) -> [f64; 3] {
        self.apix
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Flat index of voxel (i, j, k).
    #[inline(always)]
    pub fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        i + j * self.nx + k * self.nx * self.ny
    }

    #[inline(always)]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[self.idx(i, j, k)]
    }

    #[inline(always)]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: f64) {
        let idx = self.idx(i, j, k);
        self.data[idx] = value;
    }

    /// Physical-space position of voxel (i, j, k).
    #[inline]
    pub fn position(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        [
            i as f64 * self.apix[0] + self.origin[0],
            j as f64 * self.apix[1] + self.origin[1],
            k as f64 * self.apix[2] + self.origin[2],
        ]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Zero every voxel with density below `cutoff`.
    pub fn threshold(&mut self, cutoff: f64) {
        debug!("thresholding grid at {}", cutoff);
        for v in self.data.iter_mut() {
            if *v < cutoff {
                *v = 0.0;
            }
        }
    }

    /// Scale the grid so the maximum density becomes 1. No-op when the
    /// current maximum is not positive.
    pub fn normalize(&mut self) {
        let max = self.stats().max;
        if max <= 0.0 {
            return;
        }
        let inv = 1.0 / max;
        for v in self.data.iter_mut() {
            *v *= inv;
        }
    }

    /// Min / max / mean over all voxels.
    pub fn stats(&self) -> DensityStats {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in &self.data {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
            sum += v;
        }
        DensityStats {
            min,
            max,
            mean: sum / self.data.len() as f64,
        }
    }

    /// Separable 7-tap Gaussian smoothing of the density, applied along X,
    /// then Y, then Z. Voxels closer than 3 cells to any boundary keep their
    /// value for the pass that would read past the edge.
    ///
    /// Each axis pass reads from a snapshot of the previous pass so voxels
    /// never see half-updated neighbors.
    pub fn gauss_smooth(&mut self) {
        let (nx, ny, nz) = (self.nx, self.ny, self.nz);
        if nx < 7 || ny < 7 || nz < 7 {
            return;
        }
        debug!("gauss smoothing {}x{}x{} grid", nx, ny, nz);

        let mut prev = self.data.clone();
        // X pass
        for k in 3..nz - 3 {
            for j in 3..ny - 3 {
                for i in 3..nx - 3 {
                    let mut acc = 0.0;
                    for (t, w) in SMOOTH_KERNEL.iter().enumerate() {
                        acc += prev[self.idx(i + t - 3, j, k)] * w;
                    }
                    let idx = self.idx(i, j, k);
                    self.data[idx] = acc;
                }
            }
        }
        // Y pass
        prev.copy_from_slice(&self.data);
        for k in 3..nz - 3 {
            for j in 3..ny - 3 {
                for i in 3..nx - 3 {
                    let mut acc = 0.0;
                    for (t, w) in SMOOTH_KERNEL.iter().enumerate() {
                        acc += prev[self.idx(i, j + t - 3, k)] * w;
                    }
                    let idx = self.idx(i, j, k);
                    self.data[idx] = acc;
                }
            }
        }
        // Z pass
        prev.copy_from_slice(&self.data);
        for k in 3..nz - 3 {
            for j in 3..ny - 3 {
                for i in 3..nx - 3 {
                    let mut acc = 0.0;
                    for (t, w) in SMOOTH_KERNEL.iter().enumerate() {
                        acc += prev[self.idx(i, j, k + t - 3)] * w;
                    }
                    let idx = self.idx(i, j, k);
                    self.data[idx] = acc;
                }
            }
        }
    }
}

fn check_dims(nx: usize, ny: usize, nz: usize) -> Result<()> {
    for (axis, n) in [('x', nx), ('y', ny), ('z', nz)] {
        if n == 0 || n >= MAX_DIM {
            return Err(GridError::DimensionOutOfRange { axis, value: n });
        }
    }
    Ok(())
}
