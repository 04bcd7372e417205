//! Derived data: cached intermediate quantities feeding the energy.
//!
//! Everything here is exclusively owned and overwritten by
//! [`DerivedDataUpdate`](crate::DerivedDataUpdate); consumers (the energy
//! assembly) only read it.

use nalgebra::DVector;

use crate::mesh::Mesh;
use crate::settings::{EnergySettings, TermWeights};

/// Cached derived quantities for one fitting session.
///
/// The dense linearized buffers have length `3 * vertex_count` and are
/// zero except at the coordinate triplets of active vertices. They are
/// allocated once and refreshed in place for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct DerivedData {
    /// The current reconstructed source mesh.
    pub(crate) source: Mesh,
    pub(crate) linearized_source: DVector<f64>,
    pub(crate) linearized_target: DVector<f64>,
    pub(crate) linearized_landmark_source: DVector<f64>,
    pub(crate) linearized_landmark_target: DVector<f64>,
    pub(crate) is_landmark: Vec<bool>,
    pub(crate) weights: TermWeights,
}

impl DerivedData {
    /// Creates derived data sized for the given source mesh.
    ///
    /// The linearized buffers start zeroed, no vertex is marked as a
    /// landmark, and the normalized weights are seeded from the settings'
    /// base weights (an empty active set normalizes by 1).
    #[must_use]
    pub fn new(source: Mesh, settings: &EnergySettings) -> Self {
        let vertex_count = source.vertex_count();
        Self {
            source,
            linearized_source: DVector::zeros(3 * vertex_count),
            linearized_target: DVector::zeros(3 * vertex_count),
            linearized_landmark_source: DVector::zeros(3 * vertex_count),
            linearized_landmark_target: DVector::zeros(3 * vertex_count),
            is_landmark: vec![false; vertex_count],
            weights: settings.weights,
        }
    }

    /// The current reconstructed source mesh.
    #[inline]
    #[must_use]
    pub const fn source(&self) -> &Mesh {
        &self.source
    }

    /// Number of source vertices the buffers are sized for.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.is_landmark.len()
    }

    /// Dense source positions of the active correspondences.
    #[inline]
    #[must_use]
    pub const fn linearized_source(&self) -> &DVector<f64> {
        &self.linearized_source
    }

    /// Dense target positions of the active correspondences, projected
    /// onto the target normal plane when enabled.
    #[inline]
    #[must_use]
    pub const fn linearized_target(&self) -> &DVector<f64> {
        &self.linearized_target
    }

    /// Dense source positions of the active landmarks.
    #[inline]
    #[must_use]
    pub const fn linearized_landmark_source(&self) -> &DVector<f64> {
        &self.linearized_landmark_source
    }

    /// Dense fixed target positions of the active landmarks.
    #[inline]
    #[must_use]
    pub const fn linearized_landmark_target(&self) -> &DVector<f64> {
        &self.linearized_landmark_target
    }

    /// Per-vertex landmark indicator.
    #[inline]
    #[must_use]
    pub fn is_landmark(&self) -> &[bool] {
        &self.is_landmark
    }

    /// Cardinality-normalized term weights.
    #[inline]
    #[must_use]
    pub const fn weights(&self) -> &TermWeights {
        &self.weights
    }
}
