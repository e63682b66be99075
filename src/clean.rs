//! Density cleanup around traced sticks
//!
//! Once a stick-like feature has been traced, the density that produced it
//! is erased so later passes do not re-detect the same feature. Each stick
//! is trimmed at its ends, subsampled into a short polyline, and every
//! nonzero voxel within the cleaning radius of that polyline is zeroed,
//! except voxels that also sit within the radius of a different stick.

use log::debug;

use crate::grid::VoxelGrid;

/// Erase density around each stick.
///
/// `sticks` are ordered point chains in physical coordinates, head to tail.
/// `radius` is the physical cleaning radius.
pub fn clean_around_sticks(grid: &mut VoxelGrid, sticks: &[Vec<[f64; 3]>], radius: f64) {
    let apix = grid.apix();
    let origin = grid.origin();
    let radius_vox = radius / apix[0] + 0.5;

    // Every stick's points in voxel coordinates, for the protection check.
    let voxel_sticks: Vec<Vec<[f64; 3]>> = sticks
        .iter()
        .map(|stick| {
            stick
                .iter()
                .map(|p| {
                    [
                        (p[0] - origin[0]) / apix[0],
                        (p[1] - origin[1]) / apix[1],
                        (p[2] - origin[2]) / apix[2],
                    ]
                })
                .collect()
        })
        .collect();

    for (s, stick) in sticks.iter().enumerate() {
        if stick.is_empty() {
            continue;
        }
        let samples = sample_polyline(&voxel_sticks[s], stick, radius, apix[0]);
        let removed = erase_near_polyline(grid, &samples, radius_vox, &voxel_sticks, s);
        debug!("stick {}: erased {} voxels", s, removed);
    }
}

/// Trim the chain ends and reduce it to at most five waypoints.
///
/// Ends are cut back to the first point further than one voxel inside the
/// cleaning radius from the tip, so density beyond the stick's resolved
/// extent is left alone. Short sticks (end-to-end span under three radii)
/// keep their full span.
fn sample_polyline(
    voxel_points: &[[f64; 3]],
    physical_points: &[[f64; 3]],
    radius: f64,
    apix: f64,
) -> Vec<[f64; 3]> {
    let last = physical_points.len() - 1;
    let span = dist3(&physical_points[0], &physical_points[last]);
    let trim = radius - apix;

    let (mut lo, mut hi) = (0, last);
    if span >= 3.0 * radius {
        while lo < last && dist3(&physical_points[0], &physical_points[lo]) <= trim {
            lo += 1;
        }
        while hi > lo && dist3(&physical_points[last], &physical_points[hi]) <= trim {
            hi -= 1;
        }
    }

    let mut samples = Vec::with_capacity(5);
    let len = hi - lo;
    for quarter in 0..=4 {
        let m = lo + quarter * len / 4;
        let p = voxel_points[m];
        if samples.last() != Some(&p) {
            samples.push(p);
        }
    }
    samples
}

/// Zero nonzero voxels within `radius_vox` of the sampled polyline, skipping
/// voxels protected by a different stick. Returns the number erased.
fn erase_near_polyline(
    grid: &mut VoxelGrid,
    samples: &[[f64; 3]],
    radius_vox: f64,
    voxel_sticks: &[Vec<[f64; 3]>],
    own: usize,
) -> usize {
    let (nx, ny, nz) = grid.dims();

    // Bounding box of the samples, padded by the radius.
    let pad = radius_vox.ceil() as i64 + 1;
    let mut lo = [i64::MAX; 3];
    let mut hi = [i64::MIN; 3];
    for p in samples {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(p[axis].floor() as i64 - pad);
            hi[axis] = hi[axis].max(p[axis].ceil() as i64 + pad);
        }
    }
    let clamp = |v: i64, n: usize| v.clamp(0, n as i64 - 1) as usize;
    let (x0, x1) = (clamp(lo[0], nx), clamp(hi[0], nx));
    let (y0, y1) = (clamp(lo[1], ny), clamp(hi[1], ny));
    let (z0, z1) = (clamp(lo[2], nz), clamp(hi[2], nz));

    let mut removed = 0usize;
    for k in z0..=z1 {
        for j in y0..=y1 {
            for i in x0..=x1 {
                if grid.get(i, j, k) == 0.0 {
                    continue;
                }
                let p = [i as f64, j as f64, k as f64];
                if polyline_dist(&p, samples) > radius_vox {
                    continue;
                }
                if protected_by_other_stick(&p, voxel_sticks, own, radius_vox) {
                    continue;
                }
                grid.set(i, j, k, 0.0);
                removed += 1;
            }
        }
    }
    removed
}

fn protected_by_other_stick(
    p: &[f64; 3],
    voxel_sticks: &[Vec<[f64; 3]>],
    own: usize,
    radius_vox: f64,
) -> bool {
    for (s, stick) in voxel_sticks.iter().enumerate() {
        if s == own {
            continue;
        }
        for q in stick {
            if dist3(p, q) <= radius_vox {
                return true;
            }
        }
    }
    false
}

/// Distance from `p` to the nearest segment of the waypoint chain.
fn polyline_dist(p: &[f64; 3], samples: &[[f64; 3]]) -> f64 {
    if samples.len() == 1 {
        return dist3(p, &samples[0]);
    }
    let mut best = f64::INFINITY;
    for pair in samples.windows(2) {
        let d = segment_dist(p, &pair[0], &pair[1]);
        if d < best {
            best = d;
        }
    }
    best
}

/// Distance from `p` to the segment [a, b].
fn segment_dist(p: &[f64; 3], a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let ap = [p[0] - a[0], p[1] - a[1], p[2] - a[2]];
    let len_sq = ab[0] * ab[0] + ab[1] * ab[1] + ab[2] * ab[2];
    if len_sq == 0.0 {
        return dist3(p, a);
    }
    let t = ((ap[0] * ab[0] + ap[1] * ab[1] + ap[2] * ab[2]) / len_sq).clamp(0.0, 1.0);
    let q = [a[0] + t * ab[0], a[1] + t * ab[1], a[2] + t * ab[2]];
    dist3(p, &q)
}

fn dist3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line_grid() -> VoxelGrid {
        let mut grid = VoxelGrid::new(24, 24, 24, [1.0; 3], [0.0; 3]).unwrap();
        for i in 4..20 {
            grid.set(i, 12, 12, 1.0);
        }
        grid
    }

    #[test]
    fn erases_density_along_the_stick() {
        let mut grid = line_grid();
        let stick: Vec<[f64; 3]> = (4..20).map(|i| [i as f64, 12.0, 12.0]).collect();
        clean_around_sticks(&mut grid, &[stick], 2.0);
        // The middle of the line is gone.
        assert_eq!(grid.get(12, 12, 12), 0.0);
        assert_eq!(grid.get(10, 12, 12), 0.0);
    }

    #[test]
    fn leaves_distant_density_alone() {
        let mut grid = line_grid();
        grid.set(2, 2, 2, 1.0);
        let stick: Vec<[f64; 3]> = (4..20).map(|i| [i as f64, 12.0, 12.0]).collect();
        clean_around_sticks(&mut grid, &[stick], 2.0);
        assert_eq!(grid.get(2, 2, 2), 1.0);
    }

    #[test]
    fn crossing_stick_protects_shared_density() {
        let mut grid = line_grid();
        // A second stick crossing the first at (12, 12, 12).
        for j in 4..20 {
            grid.set(12, j, 12, 1.0);
        }
        let a: Vec<[f64; 3]> = (4..20).map(|i| [i as f64, 12.0, 12.0]).collect();
        let b: Vec<[f64; 3]> = (4..20).map(|j| [12.0, j as f64, 12.0]).collect();
        clean_around_sticks(&mut grid, &[a, b], 2.0);
        // After cleaning stick a, the crossing voxel was protected by b;
        // cleaning b then removes it along with the rest of b.
        assert_eq!(grid.get(12, 12, 12), 0.0);
        // But a voxel near b's midline, far from a, was protected while a
        // was cleaned and only erased during b's own pass.
        assert_eq!(grid.get(12, 18, 12), 0.0);
    }

    #[test]
    fn short_stick_keeps_full_span() {
        let mut grid = VoxelGrid::new(16, 16, 16, [1.0; 3], [0.0; 3]).unwrap();
        for i in 6..=9 {
            grid.set(i, 8, 8, 1.0);
        }
        // Span 3 < 3 * radius: no end trimming, whole stick cleaned.
        let stick: Vec<[f64; 3]> = (6..=9).map(|i| [i as f64, 8.0, 8.0]).collect();
        clean_around_sticks(&mut grid, &[stick], 2.0);
        assert!(grid.data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn segment_distance_math() {
        let a = [0.0, 0.0, 0.0];
        let b = [10.0, 0.0, 0.0];
        assert_relative_eq!(segment_dist(&[5.0, 3.0, 0.0], &a, &b), 3.0);
        assert_relative_eq!(segment_dist(&[-4.0, 0.0, 3.0], &a, &b), 5.0);
        assert_relative_eq!(segment_dist(&[12.0, 0.0, 0.0], &a, &b), 2.0);
    }
}
