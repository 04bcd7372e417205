//! Multilinear shape model collaborator.
//!
//! The fitting core only needs the [`ShapeModel`] contract: a deterministic
//! map from (speaker, phoneme) weight vectors to mesh vertex positions.
//! [`MultilinearModel`] is the standard implementation, a rank-complete
//! core tensor plus a mean shape.

use nalgebra::{DMatrix, DVector, Point3};

use crate::error::{FitError, FitResult};

/// A parametric shape model producing mesh vertex positions from a small
/// set of weight vectors.
///
/// Implementations must be deterministic: identical weight vectors yield
/// identical vertex positions.
pub trait ShapeModel {
    /// Number of vertices in every reconstructed mesh.
    fn vertex_count(&self) -> usize;

    /// Reconstructs vertex positions for the given weight vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight vector has the wrong dimension.
    fn reconstruct(&self, speaker: &[f64], phoneme: &[f64]) -> FitResult<Vec<Point3<f64>>>;
}

/// A multilinear shape model.
///
/// Vertex positions are a bilinear function of the speaker and phoneme
/// weights:
///
/// ```text
/// v = mean + sum_{i,j} speaker[i] * phoneme[j] * core[:, i * phoneme_modes + j]
/// ```
///
/// where `mean` and each core column stack the x/y/z coordinates of all
/// vertices (`3 * vertex_count` entries).
///
/// # Example
///
/// ```
/// use mesh_modelfit::{MultilinearModel, ShapeModel};
/// use nalgebra::{DMatrix, DVector};
///
/// // A toy model over 2 vertices with one mode per axis.
/// let mean = DVector::zeros(6);
/// let core = DMatrix::from_element(6, 1, 1.0);
/// let model = MultilinearModel::new(mean, core, 1, 1).unwrap();
///
/// let vertices = model.reconstruct(&[2.0], &[3.0]).unwrap();
/// assert_eq!(vertices.len(), 2);
/// assert_eq!(vertices[0].x, 6.0);
/// ```
#[derive(Debug, Clone)]
pub struct MultilinearModel {
    mean: DVector<f64>,
    core: DMatrix<f64>,
    speaker_modes: usize,
    phoneme_modes: usize,
}

impl MultilinearModel {
    /// Creates a model from a mean shape and a core tensor.
    ///
    /// The core tensor is stored as a matrix with one column per
    /// (speaker mode, phoneme mode) pair, column index
    /// `i * phoneme_modes + j`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are inconsistent: the mean length
    /// must be a positive multiple of 3, the core must have `mean.len()`
    /// rows and `speaker_modes * phoneme_modes` columns, and both mode
    /// counts must be non-zero.
    pub fn new(
        mean: DVector<f64>,
        core: DMatrix<f64>,
        speaker_modes: usize,
        phoneme_modes: usize,
    ) -> FitResult<Self> {
        if mean.is_empty() || mean.len() % 3 != 0 {
            return Err(FitError::InvalidModel(format!(
                "mean length {} is not a positive multiple of 3",
                mean.len()
            )));
        }
        if speaker_modes == 0 || phoneme_modes == 0 {
            return Err(FitError::InvalidModel(format!(
                "mode counts must be non-zero (speaker {speaker_modes}, phoneme {phoneme_modes})"
            )));
        }
        if core.nrows() != mean.len() || core.ncols() != speaker_modes * phoneme_modes {
            return Err(FitError::InvalidModel(format!(
                "core is {}x{}, expected {}x{}",
                core.nrows(),
                core.ncols(),
                mean.len(),
                speaker_modes * phoneme_modes
            )));
        }

        Ok(Self {
            mean,
            core,
            speaker_modes,
            phoneme_modes,
        })
    }

    /// Number of speaker modes.
    #[inline]
    #[must_use]
    pub const fn speaker_modes(&self) -> usize {
        self.speaker_modes
    }

    /// Number of phoneme modes.
    #[inline]
    #[must_use]
    pub const fn phoneme_modes(&self) -> usize {
        self.phoneme_modes
    }
}

impl ShapeModel for MultilinearModel {
    fn vertex_count(&self) -> usize {
        self.mean.len() / 3
    }

    fn reconstruct(&self, speaker: &[f64], phoneme: &[f64]) -> FitResult<Vec<Point3<f64>>> {
        if speaker.len() != self.speaker_modes {
            return Err(FitError::WeightDimensionMismatch {
                mode: "speaker",
                expected: self.speaker_modes,
                actual: speaker.len(),
            });
        }
        if phoneme.len() != self.phoneme_modes {
            return Err(FitError::WeightDimensionMismatch {
                mode: "phoneme",
                expected: self.phoneme_modes,
                actual: phoneme.len(),
            });
        }

        let mut coords = self.mean.clone();
        for (i, &s) in speaker.iter().enumerate() {
            for (j, &p) in phoneme.iter().enumerate() {
                let coefficient = s * p;
                if coefficient == 0.0 {
                    continue;
                }
                coords.axpy(coefficient, &self.core.column(i * self.phoneme_modes + j), 1.0);
            }
        }

        Ok(coords
            .as_slice()
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect())
    }
}
