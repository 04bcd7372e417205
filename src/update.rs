//! Selective recomputation of derived energy data.
//!
//! The optimizer mutates one of the inputs (model parameters, neighbor
//! correspondences, or the landmark set) and invokes the matching refresh
//! operation. Each operation reads the inputs, writes only the derived
//! fields documented for it, and leaves everything else untouched, so the
//! recomputation cost per iteration kind stays explicit and auditable.
//!
//! Every operation validates indices and dimensions before touching any
//! derived buffer; a precondition failure leaves the derived data exactly
//! as it was before the call.

use nalgebra::{DVector, Point3};
use tracing::debug;

use crate::data::EnergyData;
use crate::derived::DerivedData;
use crate::error::{FitError, FitResult};
use crate::model::ShapeModel;
use crate::normals::estimate_normals;
use crate::settings::EnergySettings;

/// Which input the optimizer changed since the last refresh.
///
/// Used with [`DerivedDataUpdate::refresh`] to dispatch to the matching
/// recompute path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputChange {
    /// The speaker/phoneme weight vectors changed.
    Parameters,
    /// The correspondence index pairs changed.
    Correspondences,
    /// The landmark set changed.
    Landmarks,
}

/// Recomputes cached derived data after an input change.
///
/// Borrows the input aggregate, the settings and the model read-only, and
/// the derived aggregate mutably; all four are owned by the optimizer
/// session. The operations are not reentrant-safe against each other and
/// must be invoked sequentially.
///
/// # Example
///
/// ```
/// use mesh_modelfit::{
///     Correspondences, DerivedData, DerivedDataUpdate, EnergyData, EnergySettings, Mesh,
///     MultilinearModel, ShapeModel,
/// };
/// use nalgebra::{DMatrix, DVector, Point3};
///
/// // A toy model over 2 vertices; zero weights reconstruct the mean.
/// let mean = DVector::from_vec(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
/// let core = DMatrix::from_element(6, 1, 1.0);
/// let model = MultilinearModel::new(mean, core, 1, 1).unwrap();
///
/// let source = Mesh::from_vertices(model.reconstruct(&[0.0], &[0.0]).unwrap());
/// let target = Mesh::from_vertices(vec![Point3::new(2.0, 0.0, 0.0)]);
///
/// let mut data = EnergyData::new(target, vec![0.0], vec![0.0]);
/// data.correspondences = Correspondences::new(vec![1], vec![0]).unwrap();
///
/// let settings = EnergySettings::new();
/// let mut derived = DerivedData::new(source, &settings);
///
/// let mut update = DerivedDataUpdate::new(&data, &settings, &mut derived, &model);
/// update.refresh_for_correspondences().unwrap();
///
/// assert_eq!(derived.linearized_target()[3], 2.0);
/// assert_eq!(derived.weights().data_term, 1.0);
/// ```
pub struct DerivedDataUpdate<'a> {
    data: &'a EnergyData,
    settings: &'a EnergySettings,
    derived: &'a mut DerivedData,
    model: &'a dyn ShapeModel,
}

impl<'a> DerivedDataUpdate<'a> {
    /// Creates an updater over a fitting session's aggregates.
    pub fn new(
        data: &'a EnergyData,
        settings: &'a EnergySettings,
        derived: &'a mut DerivedData,
        model: &'a dyn ShapeModel,
    ) -> Self {
        Self {
            data,
            settings,
            derived,
            model,
        }
    }

    /// Dispatches to the refresh operation matching the changed input.
    ///
    /// # Errors
    ///
    /// Propagates the errors of the dispatched operation.
    pub fn refresh(&mut self, change: InputChange) -> FitResult<()> {
        match change {
            InputChange::Parameters => self.refresh_for_parameters(),
            InputChange::Correspondences => self.refresh_for_correspondences(),
            InputChange::Landmarks => self.refresh_for_landmarks(),
        }
    }

    /// Recomputes the source mesh's per-vertex normals from its current
    /// vertex positions.
    ///
    /// Writes only the source mesh's normal field.
    ///
    /// # Errors
    ///
    /// Returns an error if the source mesh is empty or has no faces.
    pub fn refresh_source_normals(&mut self) -> FitResult<()> {
        let normals = estimate_normals(&self.derived.source)?;
        self.derived.source.set_vertex_normals(normals);

        debug!(
            vertices = self.derived.source.vertex_count(),
            "Refreshed source normals"
        );
        Ok(())
    }

    /// Recomputes derived data that depends on the model parameters.
    ///
    /// Reconstructs the source mesh from the current speaker/phoneme
    /// weights, then re-evaluates `linearized_source` and
    /// `linearized_landmark_source` against the new vertex positions. The
    /// active correspondence and landmark index sets are reused, not
    /// recomputed. Writes only the source mesh and those two buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight vector has the wrong dimension, if the
    /// model produces a vertex count the buffers were not sized for, or if
    /// an active source index is out of range.
    pub fn refresh_for_parameters(&mut self) -> FitResult<()> {
        let vertices = self
            .model
            .reconstruct(&self.data.speaker_weights, &self.data.phoneme_weights)?;

        let expected = self.derived.vertex_count();
        if vertices.len() != expected {
            return Err(FitError::ModelDimensionMismatch {
                expected,
                actual: vertices.len(),
            });
        }

        validate_source_indices(
            self.data.correspondences.source_indices().iter().copied(),
            expected,
        )?;
        validate_source_indices(
            self.data.landmarks.iter().map(|l| l.source_index),
            expected,
        )?;

        // Normals of the old positions are discarded here; call
        // refresh_source_normals afterwards if they are needed.
        self.derived.source.replace_vertices(vertices);
        self.linearize_source();
        self.linearize_landmark_source();

        debug!(
            vertices = expected,
            correspondences = self.data.correspondences.len(),
            landmarks = self.data.landmarks.len(),
            "Refreshed derived data for parameter change"
        );
        Ok(())
    }

    /// Recomputes derived data that depends on the correspondences.
    ///
    /// Re-linearizes `linearized_source` and `linearized_target` from the
    /// current index pairs, applying point-to-plane projection when enabled
    /// and target normals are available, then renormalizes the data term
    /// weight by the correspondence count. Writes only those two buffers
    /// and `weights.data_term`.
    ///
    /// # Errors
    ///
    /// Returns an error if a source or target index is out of range.
    pub fn refresh_for_correspondences(&mut self) -> FitResult<()> {
        validate_source_indices(
            self.data.correspondences.source_indices().iter().copied(),
            self.derived.source.vertex_count(),
        )?;
        validate_target_indices(
            self.data.correspondences.target_indices().iter().copied(),
            self.data.target.vertex_count(),
        )?;

        let projected = self.linearize_source_and_target();

        self.derived.weights.data_term = normalize_weight(
            self.settings.weights.data_term,
            self.data.correspondences.len(),
        );

        debug!(
            correspondences = self.data.correspondences.len(),
            projected,
            data_term = self.derived.weights.data_term,
            "Refreshed derived data for correspondence change"
        );
        Ok(())
    }

    /// Recomputes derived data that depends on the landmarks.
    ///
    /// Rebuilds the per-vertex landmark indicator, re-linearizes
    /// `linearized_landmark_source` and `linearized_landmark_target` from
    /// the current landmark set, then renormalizes the landmark term
    /// weight by the landmark count. Writes only the indicator, those two
    /// buffers and `weights.landmark_term`.
    ///
    /// # Errors
    ///
    /// Returns an error if a landmark's source index is out of range.
    pub fn refresh_for_landmarks(&mut self) -> FitResult<()> {
        validate_source_indices(
            self.data.landmarks.iter().map(|l| l.source_index),
            self.derived.source.vertex_count(),
        )?;

        self.rebuild_landmark_indicators();
        self.linearize_landmark_source();
        self.linearize_landmark_target();

        self.derived.weights.landmark_term = normalize_weight(
            self.settings.weights.landmark_term,
            self.data.landmarks.len(),
        );

        debug!(
            landmarks = self.data.landmarks.len(),
            landmark_term = self.derived.weights.landmark_term,
            "Refreshed derived data for landmark change"
        );
        Ok(())
    }

    /// Scatters the source positions of the active correspondences into
    /// the dense source buffer. Callers have validated the indices.
    fn linearize_source(&mut self) {
        let derived = &mut *self.derived;
        derived.linearized_source.fill(0.0);

        for &index in self.data.correspondences.source_indices() {
            scatter(
                &mut derived.linearized_source,
                index,
                &derived.source.vertices[index],
            );
        }
    }

    /// Scatters both sides of the active correspondences, projecting the
    /// target point onto its normal plane when requested and possible.
    /// Returns whether projection was applied. Callers have validated the
    /// indices.
    fn linearize_source_and_target(&mut self) -> bool {
        // Decided per call: the flag and normal availability may change
        // between calls.
        let projection_normals = if self.settings.use_projection {
            self.data.target.vertex_normals()
        } else {
            None
        };

        let derived = &mut *self.derived;
        derived.linearized_source.fill(0.0);
        derived.linearized_target.fill(0.0);

        for (source_index, target_index) in self.data.correspondences.iter() {
            let source_point = derived.source.vertices[source_index];
            let mut target_point = self.data.target.vertices[target_index];

            if let Some(normals) = projection_normals {
                let normal = normals[target_index];
                target_point =
                    source_point + (target_point - source_point).dot(&normal) * normal;
            }

            scatter(&mut derived.linearized_source, source_index, &source_point);
            scatter(&mut derived.linearized_target, source_index, &target_point);
        }

        projection_normals.is_some()
    }

    /// Rebuilds the landmark indicator from scratch. Callers have
    /// validated the indices.
    fn rebuild_landmark_indicators(&mut self) {
        let derived = &mut *self.derived;
        derived.is_landmark.clear();
        derived
            .is_landmark
            .resize(derived.source.vertex_count(), false);

        for landmark in &self.data.landmarks {
            derived.is_landmark[landmark.source_index] = true;
        }
    }

    /// Scatters the current source positions of the active landmarks.
    /// Callers have validated the indices.
    fn linearize_landmark_source(&mut self) {
        let derived = &mut *self.derived;
        derived.linearized_landmark_source.fill(0.0);

        for landmark in &self.data.landmarks {
            scatter(
                &mut derived.linearized_landmark_source,
                landmark.source_index,
                &derived.source.vertices[landmark.source_index],
            );
        }
    }

    /// Scatters the fixed target positions of the active landmarks.
    /// Callers have validated the indices.
    fn linearize_landmark_target(&mut self) {
        let derived = &mut *self.derived;
        derived.linearized_landmark_target.fill(0.0);

        for landmark in &self.data.landmarks {
            scatter(
                &mut derived.linearized_landmark_target,
                landmark.source_index,
                &landmark.target_position,
            );
        }
    }
}

/// Writes a point's coordinates at its dense offset. Later writes to the
/// same index overwrite earlier ones (last-write-wins for duplicates).
fn scatter(buffer: &mut DVector<f64>, index: usize, point: &Point3<f64>) {
    let offset = 3 * index;
    buffer[offset] = point.x;
    buffer[offset + 1] = point.y;
    buffer[offset + 2] = point.z;
}

/// Divides a base weight by the active-set cardinality, treating an empty
/// set as count 1 so the result is always finite.
fn normalize_weight(base: f64, active_count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        base / active_count.max(1) as f64
    }
}

fn validate_source_indices(
    indices: impl IntoIterator<Item = usize>,
    vertex_count: usize,
) -> FitResult<()> {
    for index in indices {
        if index >= vertex_count {
            return Err(FitError::SourceIndexOutOfBounds {
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}

fn validate_target_indices(
    indices: impl IntoIterator<Item = usize>,
    vertex_count: usize,
) -> FitResult<()> {
    for index in indices {
        if index >= vertex_count {
            return Err(FitError::TargetIndexOutOfBounds {
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Correspondences, Landmark};
    use crate::mesh::Mesh;
    use crate::model::MultilinearModel;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, Vector3};

    const SOURCE_POINTS: [(f64, f64, f64); 4] = [
        (0.0, 0.0, 0.0),
        (1.0, 1.0, 0.0),
        (2.0, 0.0, 1.0),
        (3.0, 2.0, 2.0),
    ];

    const TARGET_POINTS: [(f64, f64, f64); 4] = [
        (1.0, 0.0, 0.0),
        (0.0, 1.0, 0.0),
        (0.0, 0.0, 1.0),
        (1.0, 1.0, 1.0),
    ];

    /// Model whose zero-weight reconstruction is exactly `points`, and
    /// whose single mode adds 1 to every coordinate per unit weight.
    fn make_model(points: &[(f64, f64, f64)]) -> MultilinearModel {
        let mut coords = Vec::with_capacity(3 * points.len());
        for (x, y, z) in points {
            coords.extend_from_slice(&[*x, *y, *z]);
        }
        let rows = coords.len();
        let mean = DVector::from_vec(coords);
        let core = DMatrix::from_element(rows, 1, 1.0);
        MultilinearModel::new(mean, core, 1, 1).unwrap()
    }

    fn make_mesh(points: &[(f64, f64, f64)]) -> Mesh {
        Mesh::from_vertices(points.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect())
    }

    fn make_session(
        model: &MultilinearModel,
        target: Mesh,
        settings: &EnergySettings,
    ) -> (EnergyData, DerivedData) {
        let source = Mesh::from_vertices(model.reconstruct(&[0.0], &[0.0]).unwrap());
        let data = EnergyData::new(target, vec![0.0], vec![0.0]);
        let derived = DerivedData::new(source, settings);
        (data, derived)
    }

    fn triplet(buffer: &DVector<f64>, index: usize) -> (f64, f64, f64) {
        (buffer[3 * index], buffer[3 * index + 1], buffer[3 * index + 2])
    }

    #[test]
    fn test_correspondence_scenario() {
        let model = make_model(&SOURCE_POINTS);
        let settings = EnergySettings::new().with_data_term_weight(3.0);
        let (mut data, mut derived) = make_session(&model, make_mesh(&TARGET_POINTS), &settings);
        data.correspondences = Correspondences::new(vec![1, 3], vec![0, 2]).unwrap();

        let mut update = DerivedDataUpdate::new(&data, &settings, &mut derived, &model);
        update.refresh_for_correspondences().unwrap();

        assert_eq!(triplet(derived.linearized_source(), 1), SOURCE_POINTS[1]);
        assert_eq!(triplet(derived.linearized_source(), 3), SOURCE_POINTS[3]);
        assert_eq!(triplet(derived.linearized_target(), 1), (1.0, 0.0, 0.0));
        assert_eq!(triplet(derived.linearized_target(), 3), (0.0, 0.0, 1.0));

        // Inactive indices stay exactly zero.
        assert_eq!(triplet(derived.linearized_source(), 0), (0.0, 0.0, 0.0));
        assert_eq!(triplet(derived.linearized_source(), 2), (0.0, 0.0, 0.0));
        assert_eq!(triplet(derived.linearized_target(), 0), (0.0, 0.0, 0.0));
        assert_eq!(triplet(derived.linearized_target(), 2), (0.0, 0.0, 0.0));

        assert_relative_eq!(derived.weights().data_term, 1.5);
    }

    #[test]
    fn test_zero_fill_clears_stale_entries() {
        let model = make_model(&SOURCE_POINTS);
        let settings = EnergySettings::new();
        let (mut data, mut derived) = make_session(&model, make_mesh(&TARGET_POINTS), &settings);

        data.correspondences = Correspondences::new(vec![0], vec![0]).unwrap();
        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_correspondences()
            .unwrap();
        assert_eq!(triplet(derived.linearized_target(), 0), (1.0, 0.0, 0.0));

        data.correspondences = Correspondences::new(vec![2], vec![2]).unwrap();
        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_correspondences()
            .unwrap();

        // The previously active entry must not survive.
        assert_eq!(triplet(derived.linearized_target(), 0), (0.0, 0.0, 0.0));
        assert_eq!(triplet(derived.linearized_target(), 2), (0.0, 0.0, 1.0));
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let model = make_model(&SOURCE_POINTS);
        let settings = EnergySettings::new().with_projection(true);
        let (mut data, mut derived) = make_session(&model, make_mesh(&TARGET_POINTS), &settings);
        data.correspondences = Correspondences::new(vec![1, 3, 1], vec![0, 2, 3]).unwrap();
        data.landmarks = vec![Landmark::new(2, Point3::new(5.0, 5.0, 5.0))];

        let mut update = DerivedDataUpdate::new(&data, &settings, &mut derived, &model);
        update.refresh_for_correspondences().unwrap();
        update.refresh_for_landmarks().unwrap();

        let source_first = derived.linearized_source().clone();
        let target_first = derived.linearized_target().clone();
        let landmark_source_first = derived.linearized_landmark_source().clone();
        let landmark_target_first = derived.linearized_landmark_target().clone();
        let indicator_first = derived.is_landmark().to_vec();
        let weights_first = *derived.weights();

        let mut update = DerivedDataUpdate::new(&data, &settings, &mut derived, &model);
        update.refresh_for_correspondences().unwrap();
        update.refresh_for_landmarks().unwrap();

        assert_eq!(derived.linearized_source(), &source_first);
        assert_eq!(derived.linearized_target(), &target_first);
        assert_eq!(derived.linearized_landmark_source(), &landmark_source_first);
        assert_eq!(derived.linearized_landmark_target(), &landmark_target_first);
        assert_eq!(derived.is_landmark(), indicator_first.as_slice());
        assert_eq!(derived.weights(), &weights_first);
    }

    #[test]
    fn test_duplicate_source_index_last_write_wins() {
        let model = make_model(&SOURCE_POINTS);
        let settings = EnergySettings::new();
        let (mut data, mut derived) = make_session(&model, make_mesh(&TARGET_POINTS), &settings);
        // Source index 0 matched twice: first to target 0, then target 1.
        data.correspondences = Correspondences::new(vec![0, 0], vec![0, 1]).unwrap();

        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_correspondences()
            .unwrap();

        assert_eq!(triplet(derived.linearized_target(), 0), (0.0, 1.0, 0.0));
    }

    #[test]
    fn test_projection_onto_target_normal_plane() {
        let model = make_model(&[(0.0, 0.0, 0.0)]);
        let mut target = make_mesh(&[(1.0, 2.0, 0.0)]);
        target.set_vertex_normals(vec![Vector3::x()]);

        let settings = EnergySettings::new().with_projection(true);
        let (mut data, mut derived) = make_session(&model, target, &settings);
        data.correspondences = Correspondences::new(vec![0], vec![0]).unwrap();

        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_correspondences()
            .unwrap();

        // projected = s + dot(t - s, n) * n with s = origin, n = x
        assert_eq!(triplet(derived.linearized_target(), 0), (1.0, 0.0, 0.0));
    }

    #[test]
    fn test_projection_disabled_uses_raw_target() {
        let model = make_model(&[(0.0, 0.0, 0.0)]);
        let mut target = make_mesh(&[(1.0, 2.0, 0.0)]);
        target.set_vertex_normals(vec![Vector3::x()]);

        let settings = EnergySettings::new().with_projection(false);
        let (mut data, mut derived) = make_session(&model, target, &settings);
        data.correspondences = Correspondences::new(vec![0], vec![0]).unwrap();

        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_correspondences()
            .unwrap();

        assert_eq!(triplet(derived.linearized_target(), 0), (1.0, 2.0, 0.0));
    }

    #[test]
    fn test_projection_without_normals_falls_back() {
        let model = make_model(&[(0.0, 0.0, 0.0)]);
        let target = make_mesh(&[(1.0, 2.0, 0.0)]);

        let settings = EnergySettings::new().with_projection(true);
        let (mut data, mut derived) = make_session(&model, target, &settings);
        data.correspondences = Correspondences::new(vec![0], vec![0]).unwrap();

        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_correspondences()
            .unwrap();

        assert_eq!(triplet(derived.linearized_target(), 0), (1.0, 2.0, 0.0));
    }

    #[test]
    fn test_weight_normalization_cardinalities() {
        let model = make_model(&SOURCE_POINTS);
        for (count, expected) in [(0_usize, 2.0), (1, 2.0), (5, 0.4)] {
            let settings = EnergySettings::new().with_data_term_weight(2.0);
            let (mut data, mut derived) =
                make_session(&model, make_mesh(&TARGET_POINTS), &settings);
            data.correspondences =
                Correspondences::new(vec![0; count], vec![0; count]).unwrap();

            DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
                .refresh_for_correspondences()
                .unwrap();

            assert_relative_eq!(derived.weights().data_term, expected);
        }
    }

    #[test]
    fn test_landmark_refresh_rebuilds_indicator() {
        let points: Vec<(f64, f64, f64)> =
            (0..8).map(|i| (f64::from(i), 0.0, 0.0)).collect();
        let model = make_model(&points);
        let settings = EnergySettings::new();
        let (mut data, mut derived) = make_session(&model, Mesh::new(), &settings);

        // Prior landmark set at different indices.
        data.landmarks = vec![Landmark::new(0, Point3::origin())];
        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_landmarks()
            .unwrap();
        assert!(derived.is_landmark()[0]);

        data.landmarks = vec![
            Landmark::new(2, Point3::new(1.0, 2.0, 3.0)),
            Landmark::new(7, Point3::new(4.0, 5.0, 6.0)),
        ];
        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_landmarks()
            .unwrap();

        for (index, &flag) in derived.is_landmark().iter().enumerate() {
            assert_eq!(flag, index == 2 || index == 7, "indicator at {index}");
        }
        assert_eq!(triplet(derived.linearized_landmark_source(), 2), (2.0, 0.0, 0.0));
        assert_eq!(triplet(derived.linearized_landmark_target(), 2), (1.0, 2.0, 3.0));
        assert_eq!(triplet(derived.linearized_landmark_target(), 7), (4.0, 5.0, 6.0));
        assert_relative_eq!(derived.weights().landmark_term, 0.5);
    }

    #[test]
    fn test_parameter_refresh_rebuilds_source_and_relinearizes() {
        let model = make_model(&SOURCE_POINTS);
        let settings = EnergySettings::new();
        let (mut data, mut derived) = make_session(&model, make_mesh(&TARGET_POINTS), &settings);
        data.correspondences = Correspondences::new(vec![1], vec![0]).unwrap();
        data.landmarks = vec![Landmark::new(3, Point3::new(9.0, 9.0, 9.0))];

        let mut update = DerivedDataUpdate::new(&data, &settings, &mut derived, &model);
        update.refresh_for_correspondences().unwrap();
        update.refresh_for_landmarks().unwrap();
        let target_before = derived.linearized_target().clone();
        let data_term_before = derived.weights().data_term;

        // The single mode adds 1 to every coordinate per unit weight.
        data.speaker_weights = vec![1.0];
        data.phoneme_weights = vec![1.0];
        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_parameters()
            .unwrap();

        assert_eq!(derived.source().vertices[1], Point3::new(2.0, 2.0, 1.0));
        assert_eq!(triplet(derived.linearized_source(), 1), (2.0, 2.0, 1.0));
        assert_eq!(triplet(derived.linearized_landmark_source(), 3), (4.0, 3.0, 3.0));

        // Locality: correspondence targets and the data term are untouched.
        assert_eq!(derived.linearized_target(), &target_before);
        assert_eq!(derived.weights().data_term, data_term_before);
        // Landmark targets are fixed constraints, unaffected by parameters.
        assert_eq!(triplet(derived.linearized_landmark_target(), 3), (9.0, 9.0, 9.0));
    }

    #[test]
    fn test_out_of_range_index_leaves_derived_untouched() {
        let model = make_model(&SOURCE_POINTS);
        let settings = EnergySettings::new();
        let (mut data, mut derived) = make_session(&model, make_mesh(&TARGET_POINTS), &settings);

        data.correspondences = Correspondences::new(vec![1], vec![0]).unwrap();
        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_correspondences()
            .unwrap();
        let source_before = derived.linearized_source().clone();
        let target_before = derived.linearized_target().clone();
        let weights_before = *derived.weights();

        data.correspondences = Correspondences::new(vec![1, 99], vec![0, 0]).unwrap();
        let result = DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_correspondences();

        assert!(matches!(
            result,
            Err(FitError::SourceIndexOutOfBounds { index: 99, .. })
        ));
        assert_eq!(derived.linearized_source(), &source_before);
        assert_eq!(derived.linearized_target(), &target_before);
        assert_eq!(derived.weights(), &weights_before);
    }

    #[test]
    fn test_out_of_range_target_index_is_rejected() {
        let model = make_model(&SOURCE_POINTS);
        let settings = EnergySettings::new();
        let (mut data, mut derived) = make_session(&model, make_mesh(&TARGET_POINTS), &settings);
        data.correspondences = Correspondences::new(vec![0], vec![4]).unwrap();

        let result = DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_for_correspondences();

        assert!(matches!(
            result,
            Err(FitError::TargetIndexOutOfBounds {
                index: 4,
                vertex_count: 4,
            })
        ));
    }

    #[test]
    fn test_refresh_dispatch() {
        let model = make_model(&SOURCE_POINTS);
        let settings = EnergySettings::new().with_landmark_term_weight(4.0);
        let (mut data, mut derived) = make_session(&model, make_mesh(&TARGET_POINTS), &settings);
        data.landmarks = vec![
            Landmark::new(0, Point3::origin()),
            Landmark::new(1, Point3::origin()),
        ];

        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh(InputChange::Landmarks)
            .unwrap();

        assert!(derived.is_landmark()[0] && derived.is_landmark()[1]);
        assert_relative_eq!(derived.weights().landmark_term, 2.0);
    }

    #[test]
    fn test_refresh_source_normals_writes_only_normals() {
        let model = make_model(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, 0.0),
        ]);
        let settings = EnergySettings::new();
        let (data, mut derived) = make_session(&model, Mesh::new(), &settings);
        derived.source.faces = vec![[0, 1, 2], [0, 2, 3]];
        let vertices_before = derived.source().vertices.clone();
        let source_buffer_before = derived.linearized_source().clone();

        DerivedDataUpdate::new(&data, &settings, &mut derived, &model)
            .refresh_source_normals()
            .unwrap();

        assert!(derived.source().has_normals());
        let normals = derived.source().vertex_normals().unwrap();
        assert_relative_eq!(normals[0].z, 1.0, epsilon = 1e-10);
        assert_eq!(derived.source().vertices, vertices_before);
        assert_eq!(derived.linearized_source(), &source_buffer_before);
    }

    #[test]
    fn test_normalize_weight_floor() {
        assert_relative_eq!(normalize_weight(2.0, 0), 2.0);
        assert_relative_eq!(normalize_weight(2.0, 1), 2.0);
        assert_relative_eq!(normalize_weight(2.0, 4), 0.5);
    }
}
