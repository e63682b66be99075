//! Local density peak scoring and filtering
//!
//! Every nonzero voxel votes for its neighbors: within a small physical
//! sphere around each voxel, members denser than the sphere's mean density
//! each receive one vote. Voxels that collect few votes relative to the
//! global maximum are background and get zeroed; the best-scoring voxels
//! double as candidate peak positions.

use log::{debug, info};

use crate::grid::VoxelGrid;

/// Physical sphere radius for the voting pass.
const PEAK_RADIUS: f64 = 3.0;
/// Voxel window half-width bounding the sphere scan.
const PEAK_WINDOW: i64 = 10;

/// One vote count per voxel, plus the maximum over the grid.
///
/// For each nonzero voxel the mean density over the sphere's nonzero members
/// is taken, and every member above that mean gains a vote. Votes accumulate
/// across overlapping spheres.
pub fn peak_counts(grid: &VoxelGrid) -> (Vec<u32>, u32) {
    let (nx, ny, nz) = grid.dims();
    let apix = grid.apix();
    let r_sq = PEAK_RADIUS * PEAK_RADIUS;

    let mut counts = vec![0u32; nx * ny * nz];
    let mut members = Vec::new();

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                if grid.get(i, j, k) == 0.0 {
                    continue;
                }

                members.clear();
                let mut sum = 0.0;
                for q in -PEAK_WINDOW..=PEAK_WINDOW {
                    let z = k as i64 + q;
                    if z < 0 || z >= nz as i64 {
                        continue;
                    }
                    for p in -PEAK_WINDOW..=PEAK_WINDOW {
                        let y = j as i64 + p;
                        if y < 0 || y >= ny as i64 {
                            continue;
                        }
                        for n in -PEAK_WINDOW..=PEAK_WINDOW {
                            let x = i as i64 + n;
                            if x < 0 || x >= nx as i64 {
                                continue;
                            }
                            let d_sq = (n as f64 * apix[0]).powi(2)
                                + (p as f64 * apix[1]).powi(2)
                                + (q as f64 * apix[2]).powi(2);
                            if d_sq > r_sq {
                                continue;
                            }
                            let density = grid.get(x as usize, y as usize, z as usize);
                            if density > 0.0 {
                                sum += density;
                                members.push((x as usize, y as usize, z as usize, density));
                            }
                        }
                    }
                }

                if members.is_empty() {
                    continue;
                }
                let mean = sum / members.len() as f64;
                for (x, y, z, density) in &members {
                    if *density > mean {
                        counts[grid.idx(*x, *y, *z)] += 1;
                    }
                }
            }
        }
    }

    let max_count = counts.iter().copied().max().unwrap_or(0);
    debug!("peak voting complete, max count {}", max_count);
    (counts, max_count)
}

/// Zero every voxel whose vote count falls below `max_count / divider`
/// (integer division). Returns the number of voxels removed.
pub fn local_peak_filter(grid: &mut VoxelGrid, divider: u32) -> usize {
    let (counts, max_count) = peak_counts(grid);
    let cutoff = if divider == 0 { 0 } else { max_count / divider };

    let mut removed = 0usize;
    for (idx, value) in grid.data_mut().iter_mut().enumerate() {
        if *value != 0.0 && counts[idx] < cutoff {
            *value = 0.0;
            removed += 1;
        }
    }

    info!(
        "peak filter removed {} voxels (cutoff {} of max {})",
        removed, cutoff, max_count
    );
    removed
}

/// Physical positions of the best-scoring fraction of voted-for voxels,
/// ordered by descending vote count.
///
/// Only voxels that collected at least one vote enter the pool; the
/// fraction is taken over that pool, not over all nonzero voxels.
pub fn local_peaks(grid: &VoxelGrid, fraction: f64) -> Vec<[f64; 3]> {
    let (nx, ny, nz) = grid.dims();
    let (counts, _) = peak_counts(grid);

    let mut scored = Vec::new();
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let count = counts[grid.idx(i, j, k)];
                if count > 0 && grid.get(i, j, k) != 0.0 {
                    scored.push((count, i, j, k));
                }
            }
        }
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let take = (scored.len() as f64 * fraction) as usize;
    scored
        .iter()
        .take(take)
        .map(|&(_, i, j, k)| grid.position(i, j, k))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_grid() -> VoxelGrid {
        // A bright center voxel ringed by dimmer density.
        let mut grid = VoxelGrid::new(16, 16, 16, [1.0; 3], [0.0; 3]).unwrap();
        for k in 6..=10 {
            for j in 6..=10 {
                for i in 6..=10 {
                    grid.set(i, j, k, 0.5);
                }
            }
        }
        grid.set(8, 8, 8, 5.0);
        grid
    }

    #[test]
    fn bright_voxel_collects_the_most_votes() {
        let grid = blob_grid();
        let (counts, max_count) = peak_counts(&grid);
        assert!(max_count > 0);
        assert_eq!(counts[grid.idx(8, 8, 8)], max_count);
    }

    #[test]
    fn filter_never_adds_density() {
        let mut grid = blob_grid();
        let before = grid.data().iter().filter(|v| **v != 0.0).count();
        local_peak_filter(&mut grid, 1);
        let after = grid.data().iter().filter(|v| **v != 0.0).count();
        assert!(after <= before);
        // The peak itself survives the strictest cutoff.
        assert_eq!(grid.get(8, 8, 8), 5.0);
    }

    #[test]
    fn zero_divider_removes_nothing() {
        let mut grid = blob_grid();
        let before = grid.data().to_vec();
        local_peak_filter(&mut grid, 0);
        assert_eq!(grid.data(), &before[..]);
    }

    #[test]
    fn peaks_are_sorted_and_bounded_by_fraction() {
        let grid = blob_grid();
        let (counts, _) = peak_counts(&grid);
        let voted = counts.iter().filter(|c| **c > 0).count();
        // The fraction is taken over the voted-for pool.
        let peaks = local_peaks(&grid, 1.0);
        assert_eq!(peaks.len(), voted);
        // The brightest voxel's physical position leads the list.
        assert_eq!(peaks[0], grid.position(8, 8, 8));
        assert_eq!(local_peaks(&grid, 0.0).len(), 0);
    }

    #[test]
    fn unvoted_voxels_are_never_peaks() {
        // An isolated voxel has no sphere neighbors above its own mean, so
        // it collects zero votes and must not appear even at fraction 1.
        let mut grid = blob_grid();
        grid.set(2, 2, 2, 0.5);
        let (counts, _) = peak_counts(&grid);
        assert_eq!(counts[grid.idx(2, 2, 2)], 0);

        let lone = grid.position(2, 2, 2);
        let peaks = local_peaks(&grid, 1.0);
        assert!(peaks.iter().all(|p| *p != lone));
    }

    #[test]
    fn empty_grid_yields_no_peaks() {
        let grid = VoxelGrid::new(8, 8, 8, [1.0; 3], [0.0; 3]).unwrap();
        assert!(local_peaks(&grid, 0.5).is_empty());
        let (_, max_count) = peak_counts(&grid);
        assert_eq!(max_count, 0);
    }
}
