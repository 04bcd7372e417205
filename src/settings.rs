//! Energy settings: base term weights and the projection flag.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-term energy weights.
///
/// The terms are a fixed, enumerated set rather than a string-keyed map,
/// so a misspelled term name is a compile error instead of a missing-key
/// failure deep inside an update call.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TermWeights {
    /// Weight of the correspondence (data) term.
    pub data_term: f64,
    /// Weight of the landmark term.
    pub landmark_term: f64,
    /// Weight of the smoothness term. Never cardinality-normalized.
    pub smoothness_term: f64,
}

impl Default for TermWeights {
    fn default() -> Self {
        Self {
            data_term: 1.0,
            landmark_term: 1.0,
            smoothness_term: 1.0,
        }
    }
}

/// Settings read by every update operation.
///
/// Use the builder methods to configure a fitting session.
///
/// # Example
///
/// ```
/// use mesh_modelfit::EnergySettings;
///
/// let settings = EnergySettings::new()
///     .with_projection(true)
///     .with_data_term_weight(2.0);
///
/// assert!(settings.use_projection);
/// assert_eq!(settings.weights.data_term, 2.0);
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnergySettings {
    /// Base weights before cardinality normalization.
    pub weights: TermWeights,
    /// Whether correspondence targets are projected onto the target's
    /// normal plane (point-to-plane metric). Requires target normals;
    /// silently falls back to point-to-point when they are missing.
    pub use_projection: bool,
}

impl EnergySettings {
    /// Creates settings with default weights and projection disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables point-to-plane projection.
    #[must_use]
    pub const fn with_projection(mut self, use_projection: bool) -> Self {
        self.use_projection = use_projection;
        self
    }

    /// Sets the base data term weight.
    #[must_use]
    pub const fn with_data_term_weight(mut self, weight: f64) -> Self {
        self.weights.data_term = weight;
        self
    }

    /// Sets the base landmark term weight.
    #[must_use]
    pub const fn with_landmark_term_weight(mut self, weight: f64) -> Self {
        self.weights.landmark_term = weight;
        self
    }

    /// Sets the base smoothness term weight.
    #[must_use]
    pub const fn with_smoothness_term_weight(mut self, weight: f64) -> Self {
        self.weights.smoothness_term = weight;
        self
    }
}
