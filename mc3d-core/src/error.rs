/// Error types for surface construction and lattice access
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Cell edge length must be positive and finite
    #[error("invalid grid size {0}: must be positive and finite")]
    InvalidGridSize(f32),

    /// Sweep bounds are not finite or enclose no cell
    #[error("invalid extent [{min}, {max})")]
    InvalidExtent { min: f32, max: f32 },

    /// Lattice with no points or a non-positive spacing
    #[error("invalid lattice: {dim} points per axis at spacing {spacing}")]
    InvalidLattice { dim: usize, spacing: f32 },

    /// A coordinate does not land on a lattice point
    #[error("point ({x}, {y}, {z}) is not aligned to lattice spacing {spacing}")]
    MisalignedPoint { x: f32, y: f32, z: f32, spacing: f32 },

    /// A lattice coordinate falls outside the stored volume
    #[error("lattice coordinate ({i}, {j}, {k}) outside 0..{dim}")]
    OutOfLattice { i: i64, j: i64, k: i64, dim: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
