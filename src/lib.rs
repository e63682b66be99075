//! cryofeat: volumetric feature extraction for cryo-EM density maps
//!
//! Operates on regular 3D voxel grids of scalar density and derives the
//! per-voxel fields used to find and clean up stick-like structural
//! features.
//!
//! # Modules
//! - `grid`: the voxel grid, thresholding, normalization, smoothing
//! - `gradient`: central-difference and Sobel gradient fields
//! - `tensor`: smoothed structure tensors with eigen-decomposition
//! - `eigen`: Jacobi solver for small symmetric matrices
//! - `distance`: exact Euclidean distance transform and distance ridge
//! - `thickness`: principal-axis and ridge-ball thickness estimators
//! - `cluster`: connected-component grouping and pruning
//! - `peaks`: local density peak voting and filtering
//! - `clean`: density erasure around traced sticks

pub mod clean;
pub mod cluster;
pub mod config;
pub mod distance;
pub mod eigen;
pub mod error;
pub mod gradient;
pub mod grid;
pub mod peaks;
pub mod tensor;
pub mod thickness;

pub use clean::clean_around_sticks;
pub use cluster::{group_components, prune_clusters, Cluster, ClusterVoxel};
pub use config::ExtractionParams;
pub use distance::{distance_ridge, distance_transform};
pub use eigen::{jacobi_eigen, SymmetricEigen};
pub use error::{GridError, Result};
pub use gradient::{build_gradient, GradientField, GradientMode};
pub use grid::{DensityStats, VoxelGrid, MAX_DIM};
pub use peaks::{local_peak_filter, local_peaks, peak_counts};
pub use tensor::{build_tensor, StructureTensorField, TENSOR_MARGIN};
pub use thickness::{local_thickness, principal_thickness, Thickness};
