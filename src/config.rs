//! Caller-supplied tunables for the feature-extraction passes
//!
//! Every pass takes its parameters as plain scalars; this struct only bundles
//! them so a driver can deserialize one block of settings and hand the fields
//! to the individual passes. Nothing in the core reads configuration from the
//! environment.

use serde::{Deserialize, Serialize};

/// Tunable parameters for a full extraction run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionParams {
    /// Density cutoff: voxels below this are treated as background.
    pub density_threshold: f64,
    /// Radius (physical units) for cleaning density around known sticks.
    pub clean_radius: f64,
    /// Top fraction of counted voxels returned by local-peak selection.
    pub peak_fraction: f64,
    /// Minimum cluster diameter (physical units) to survive pruning.
    pub min_cluster_length: f64,
    /// Minimum cluster volume (physical units cubed) to survive pruning.
    pub min_cluster_size: f64,
    /// Peak-count cutoff divisor: voxels with fewer than max_count / divider
    /// local-peak counts are discarded.
    pub peak_divider: u32,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            density_threshold: 0.0,
            clean_radius: 3.0,
            peak_fraction: 0.5,
            min_cluster_length: 4.0,
            min_cluster_size: 8.0,
            peak_divider: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let params = ExtractionParams::default();
        assert!(params.clean_radius > 0.0);
        assert!(params.peak_fraction > 0.0 && params.peak_fraction <= 1.0);
        assert!(params.peak_divider > 0);
    }
}
