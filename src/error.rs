//! Error types for cryofeat

use thiserror::Error;

use crate::grid::MAX_DIM;

/// Errors raised while constructing or validating a voxel grid.
///
/// All per-voxel math in this crate is total; the only failure surface is
/// malformed input shape, detected up front.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("grid dimension {axis} out of range: {value} (must be in 1..{MAX_DIM})")]
    DimensionOutOfRange { axis: char, value: usize },

    #[error("interval count along {axis} must be positive, got {value}")]
    BadIntervalCount { axis: char, value: i64 },

    #[error("data length {got} does not match grid dimensions {nx}x{ny}x{nz}")]
    DataSizeMismatch {
        got: usize,
        nx: usize,
        ny: usize,
        nz: usize,
    },
}

pub type Result<T> = std::result::Result<T, GridError>;
