//! Mutable input data owned by the optimizer.
//!
//! The optimizer creates these structures before the first update call and
//! mutates them between iterations; the fitting core only ever reads them.

use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{FitError, FitResult};
use crate::mesh::Mesh;

/// Paired source/target vertex index sequences.
///
/// `source_indices()[i]` corresponds to `target_indices()[i]`; the two
/// sequences are kept equal-length by construction. Duplicate source
/// indices are permitted, with last-write-wins semantics when linearized.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Correspondences {
    source_indices: Vec<usize>,
    target_indices: Vec<usize>,
}

impl Correspondences {
    /// Creates a correspondence set from paired index sequences.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequences differ in length.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_modelfit::Correspondences;
    ///
    /// let correspondences = Correspondences::new(vec![1, 3], vec![0, 2]).unwrap();
    /// assert_eq!(correspondences.len(), 2);
    /// ```
    pub fn new(source_indices: Vec<usize>, target_indices: Vec<usize>) -> FitResult<Self> {
        if source_indices.len() != target_indices.len() {
            return Err(FitError::CorrespondenceLengthMismatch {
                source_len: source_indices.len(),
                target_len: target_indices.len(),
            });
        }
        Ok(Self {
            source_indices,
            target_indices,
        })
    }

    /// Creates an empty correspondence set.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            source_indices: Vec::new(),
            target_indices: Vec::new(),
        }
    }

    /// Replaces both index sequences.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequences differ in length; the previous
    /// correspondences are left unchanged in that case.
    pub fn set(&mut self, source_indices: Vec<usize>, target_indices: Vec<usize>) -> FitResult<()> {
        *self = Self::new(source_indices, target_indices)?;
        Ok(())
    }

    /// Number of active correspondences.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.source_indices.len()
    }

    /// Returns `true` if no correspondences are active.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_indices.is_empty()
    }

    /// Source vertex indices, paired by position with the target indices.
    #[inline]
    #[must_use]
    pub fn source_indices(&self) -> &[usize] {
        &self.source_indices
    }

    /// Target vertex indices, paired by position with the source indices.
    #[inline]
    #[must_use]
    pub fn target_indices(&self) -> &[usize] {
        &self.target_indices
    }

    /// Iterates over `(source_index, target_index)` pairs in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.source_indices
            .iter()
            .copied()
            .zip(self.target_indices.iter().copied())
    }
}

/// A fixed point constraint: a source vertex pinned to a 3D position.
///
/// Unlike a correspondence, the target position is not a lookup into the
/// target mesh but an explicit constraint (e.g. an anatomical landmark).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Landmark {
    /// Index of the constrained vertex in the source mesh.
    pub source_index: usize,
    /// The fixed position the vertex should move toward.
    pub target_position: Point3<f64>,
}

impl Landmark {
    /// Creates a landmark constraint.
    #[inline]
    #[must_use]
    pub const fn new(source_index: usize, target_position: Point3<f64>) -> Self {
        Self {
            source_index,
            target_position,
        }
    }
}

/// The input aggregate for one fitting session.
///
/// Holds everything the optimizer mutates between iterations: the current
/// model parameters, the registration target, and the active
/// correspondence and landmark sets.
#[derive(Debug, Clone)]
pub struct EnergyData {
    /// Speaker weight vector selecting a point in the model's first mode.
    pub speaker_weights: Vec<f64>,
    /// Phoneme weight vector selecting a point in the model's second mode.
    pub phoneme_weights: Vec<f64>,
    /// The immutable registration target.
    pub target: Mesh,
    /// Active correspondence pairs from the external search step.
    pub correspondences: Correspondences,
    /// Active landmark constraints.
    pub landmarks: Vec<Landmark>,
}

impl EnergyData {
    /// Creates input data for a fitting session with empty correspondence
    /// and landmark sets.
    #[must_use]
    pub const fn new(target: Mesh, speaker_weights: Vec<f64>, phoneme_weights: Vec<f64>) -> Self {
        Self {
            speaker_weights,
            phoneme_weights,
            target,
            correspondences: Correspondences::empty(),
            landmarks: Vec::new(),
        }
    }
}
