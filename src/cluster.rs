//! Connected-component grouping of density voxels
//!
//! Face-connected (6-neighbor) flood fill over every nonzero voxel, plus the
//! per-component geometry the pruning and stick-tracing stages need: diameter,
//! endpoint pair, and a greedy path ordering from one endpoint.

use log::{debug, info};

use crate::grid::VoxelGrid;

/// One voxel of a connected component, with its density at grouping time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterVoxel {
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub density: f64,
}

/// A face-connected group of nonzero voxels.
#[derive(Clone, Debug, Default)]
pub struct Cluster {
    pub voxels: Vec<ClusterVoxel>,
}

impl Cluster {
    /// Number of member voxels.
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Largest pairwise member distance, in voxel units.
    ///
    /// Components stay small after pruning, so the quadratic scan is fine.
    pub fn diameter(&self) -> f64 {
        let (_, _, d2) = self.farthest_pair();
        d2.sqrt()
    }

    /// The two members realizing the diameter. For a single-voxel cluster
    /// both endpoints are that voxel.
    pub fn endpoints(&self) -> Option<(ClusterVoxel, ClusterVoxel)> {
        if self.voxels.is_empty() {
            return None;
        }
        let (a, b, _) = self.farthest_pair();
        Some((self.voxels[a], self.voxels[b]))
    }

    /// Members reordered as a greedy nearest-neighbor chain starting from
    /// the first endpoint. Gives stick-like components a head-to-tail walk.
    pub fn order_from_endpoint(&self) -> Vec<ClusterVoxel> {
        let mut remaining = self.voxels.clone();
        let mut ordered = Vec::with_capacity(remaining.len());
        let Some((start, _)) = self.endpoints() else {
            return ordered;
        };

        let mut cursor = start;
        while !remaining.is_empty() {
            let mut best = 0;
            let mut best_d2 = f64::INFINITY;
            for (m, v) in remaining.iter().enumerate() {
                let d2 = dist_sq(&cursor, v);
                if d2 < best_d2 {
                    best_d2 = d2;
                    best = m;
                }
            }
            cursor = remaining.swap_remove(best);
            ordered.push(cursor);
        }
        ordered
    }

    fn farthest_pair(&self) -> (usize, usize, f64) {
        let (mut a, mut b, mut best) = (0, 0, 0.0f64);
        for m in 0..self.voxels.len() {
            for r in (m + 1)..self.voxels.len() {
                let d2 = dist_sq(&self.voxels[m], &self.voxels[r]);
                if d2 > best {
                    best = d2;
                    a = m;
                    b = r;
                }
            }
        }
        (a, b, best)
    }
}

fn dist_sq(a: &ClusterVoxel, b: &ClusterVoxel) -> f64 {
    let dx = a.x as f64 - b.x as f64;
    let dy = a.y as f64 - b.y as f64;
    let dz = a.z as f64 - b.z as f64;
    dx * dx + dy * dy + dz * dz
}

/// Group every nonzero voxel into face-connected components.
///
/// Uses an explicit work stack, so component size is bounded by memory and
/// never by call depth. Seeds are taken from the 1-voxel interior; growth is
/// bounds-checked, so components may still include boundary voxels.
pub fn group_components(grid: &VoxelGrid) -> Vec<Cluster> {
    let (nx, ny, nz) = grid.dims();
    let mut visited = vec![false; nx * ny * nz];
    let mut clusters = Vec::new();

    if nx < 3 || ny < 3 || nz < 3 {
        return clusters;
    }

    const NEIGHBORS: [(i64, i64, i64); 6] = [
        (1, 0, 0),
        (-1, 0, 0),
        (0, 1, 0),
        (0, -1, 0),
        (0, 0, 1),
        (0, 0, -1),
    ];

    for k in 1..nz - 1 {
        for j in 1..ny - 1 {
            for i in 1..nx - 1 {
                let seed = grid.idx(i, j, k);
                if visited[seed] || grid.get(i, j, k) == 0.0 {
                    continue;
                }

                let mut cluster = Cluster::default();
                let mut stack = vec![(i, j, k)];
                visited[seed] = true;
                while let Some((x, y, z)) = stack.pop() {
                    cluster.voxels.push(ClusterVoxel {
                        x,
                        y,
                        z,
                        density: grid.get(x, y, z),
                    });
                    for (dx, dy, dz) in NEIGHBORS {
                        let (px, py, pz) = (x as i64 + dx, y as i64 + dy, z as i64 + dz);
                        if px < 0
                            || py < 0
                            || pz < 0
                            || px >= nx as i64
                            || py >= ny as i64
                            || pz >= nz as i64
                        {
                            continue;
                        }
                        let (px, py, pz) = (px as usize, py as usize, pz as usize);
                        let idx = grid.idx(px, py, pz);
                        if !visited[idx] && grid.get(px, py, pz) != 0.0 {
                            visited[idx] = true;
                            stack.push((px, py, pz));
                        }
                    }
                }
                clusters.push(cluster);
            }
        }
    }

    debug!("grouped {} connected components", clusters.len());
    clusters
}

/// Zero out components that are too short or too small.
///
/// A component is removed when its physical diameter falls below
/// `min_length` or its physical volume falls below `min_size`; single-voxel
/// components are always removed. Returns the number of removed components.
pub fn prune_clusters(
    grid: &mut VoxelGrid,
    clusters: &[Cluster],
    min_length: f64,
    min_size: f64,
) -> usize {
    let apix = grid.apix()[0];
    let voxel_volume = apix * apix * apix;
    let mut removed = 0usize;

    for cluster in clusters {
        let keep = cluster.len() > 1
            && cluster.diameter() * apix >= min_length
            && cluster.len() as f64 * voxel_volume >= min_size;
        if keep {
            continue;
        }
        for v in &cluster.voxels {
            grid.set(v.x, v.y, v.z, 0.0);
        }
        removed += 1;
    }

    info!(
        "pruned {} of {} components (min_length {}, min_size {})",
        removed,
        clusters.len(),
        min_length,
        min_size
    );
    removed
}
