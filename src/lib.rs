//! Selective recomputation of derived energy data for multilinear shape
//! model fitting.
//!
//! This crate is the bookkeeping core of an ICP-style inner loop that fits
//! a multilinear shape model to a target surface under correspondence and
//! landmark constraints. The energy function consumed by the optimizer is
//! assembled from cached *derived* quantities (dense linearized point
//! buffers, a landmark indicator, normalized term weights), and each
//! optimization iteration changes only a subset of the inputs. Rather than
//! recomputing everything every iteration, [`DerivedDataUpdate`] exposes
//! one refresh operation per input kind, each recomputing exactly the
//! derived state that depends on it:
//!
//! - [`refresh_for_parameters`](DerivedDataUpdate::refresh_for_parameters) -
//!   model parameters changed; rebuilds the source mesh and the source-side
//!   buffers.
//! - [`refresh_for_correspondences`](DerivedDataUpdate::refresh_for_correspondences) -
//!   the correspondence search produced new index pairs; rebuilds both
//!   correspondence buffers (optionally with point-to-plane projection) and
//!   the data term weight.
//! - [`refresh_for_landmarks`](DerivedDataUpdate::refresh_for_landmarks) -
//!   the landmark set was edited; rebuilds the indicator, the landmark
//!   buffers and the landmark term weight.
//! - [`refresh_source_normals`](DerivedDataUpdate::refresh_source_normals) -
//!   recomputes source normals from the current vertex positions.
//!
//! Deciding *when* to call each operation is the optimizer's iteration
//! policy, not this crate's concern.
//!
//! # Quick Start
//!
//! ```
//! use mesh_modelfit::{
//!     Correspondences, DerivedData, DerivedDataUpdate, EnergyData, EnergySettings, Landmark,
//!     Mesh, MultilinearModel, ShapeModel,
//! };
//! use nalgebra::{DMatrix, DVector, Point3};
//!
//! // A toy two-vertex model; zero weights reconstruct the mean shape.
//! let mean = DVector::from_vec(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
//! let core = DMatrix::from_element(6, 1, 1.0);
//! let model = MultilinearModel::new(mean, core, 1, 1).unwrap();
//!
//! // Session state: inputs owned by the optimizer, derived data sized once.
//! let target = Mesh::from_vertices(vec![Point3::new(2.0, 0.0, 0.0)]);
//! let mut data = EnergyData::new(target, vec![0.0], vec![0.0]);
//! let settings = EnergySettings::new();
//! let source = Mesh::from_vertices(model.reconstruct(&[0.0], &[0.0]).unwrap());
//! let mut derived = DerivedData::new(source, &settings);
//!
//! // The correspondence search matched source vertex 1 to target vertex 0.
//! data.correspondences = Correspondences::new(vec![1], vec![0]).unwrap();
//! data.landmarks = vec![Landmark::new(0, Point3::new(-1.0, 0.0, 0.0))];
//!
//! let mut update = DerivedDataUpdate::new(&data, &settings, &mut derived, &model);
//! update.refresh_for_correspondences().unwrap();
//! update.refresh_for_landmarks().unwrap();
//!
//! assert_eq!(derived.linearized_target()[3], 2.0);
//! assert!(derived.is_landmark()[0]);
//! assert_eq!(derived.weights().landmark_term, 1.0);
//! ```
//!
//! # Collaborators
//!
//! The nearest-neighbor search producing correspondences and the numerical
//! optimizer consuming the assembled energy live outside this crate. The
//! shape model is abstracted behind [`ShapeModel`]; [`MultilinearModel`]
//! is the standard implementation.

// Safety: Deny unwrap/expect in library code. Tests may use them.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod data;
mod derived;
mod error;
mod mesh;
mod model;
mod normals;
mod settings;
mod update;

pub use data::{Correspondences, EnergyData, Landmark};
pub use derived::DerivedData;
pub use error::{FitError, FitResult};
pub use mesh::Mesh;
pub use model::{MultilinearModel, ShapeModel};
pub use normals::estimate_normals;
pub use settings::{EnergySettings, TermWeights};
pub use update::{DerivedDataUpdate, InputChange};
