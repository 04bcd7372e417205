//! Error types for model fitting and derived-data updates.

use thiserror::Error;

/// Errors that can occur while updating derived energy data.
#[derive(Debug, Error)]
pub enum FitError {
    /// Source mesh has no vertices.
    #[error("source mesh has no vertices")]
    EmptySourceMesh,

    /// Source vertex index out of bounds.
    #[error("source vertex index {index} out of bounds for mesh with {vertex_count} vertices")]
    SourceIndexOutOfBounds {
        /// The invalid vertex index.
        index: usize,
        /// The number of vertices in the source mesh.
        vertex_count: usize,
    },

    /// Target vertex index out of bounds.
    #[error("target vertex index {index} out of bounds for mesh with {vertex_count} vertices")]
    TargetIndexOutOfBounds {
        /// The invalid vertex index.
        index: usize,
        /// The number of vertices in the target mesh.
        vertex_count: usize,
    },

    /// Correspondence index sequences have different lengths.
    #[error("correspondence sequences differ in length ({source_len} source, {target_len} target)")]
    CorrespondenceLengthMismatch {
        /// Length of the source index sequence.
        source_len: usize,
        /// Length of the target index sequence.
        target_len: usize,
    },

    /// A model weight vector has the wrong dimension.
    #[error("{mode} weight vector has length {actual}, expected {expected}")]
    WeightDimensionMismatch {
        /// Which mode the weight vector belongs to ("speaker" or "phoneme").
        mode: &'static str,
        /// Expected number of weights.
        expected: usize,
        /// Provided number of weights.
        actual: usize,
    },

    /// Model reconstruction produced a different vertex count than the
    /// derived buffers were sized for.
    #[error("model reconstruction produced {actual} vertices, expected {expected}")]
    ModelDimensionMismatch {
        /// Vertex count the derived buffers were sized for.
        expected: usize,
        /// Vertex count the model produced.
        actual: usize,
    },

    /// Model construction parameters are inconsistent.
    #[error("invalid model parameter: {0}")]
    InvalidModel(String),

    /// Mesh has no faces, so vertex normals cannot be estimated.
    #[error("mesh has no faces; cannot estimate vertex normals")]
    MissingFaces,
}

/// Result type for fitting operations.
pub type FitResult<T> = Result<T, FitError>;
