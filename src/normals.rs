//! Surface normal estimation for triangle meshes.
//!
//! Computes area-weighted per-vertex normals: each face normal, weighted
//! by twice the triangle area, is accumulated at its three vertices and
//! the result is normalized.

use nalgebra::Vector3;

use crate::error::{FitError, FitResult};
use crate::mesh::Mesh;

/// Estimates per-vertex normals from the mesh's face topology.
///
/// Degenerate faces contribute a zero cross product and are effectively
/// ignored. Vertices not referenced by any face keep a zero normal.
///
/// # Errors
///
/// Returns an error if the mesh has no vertices or no faces.
///
/// # Example
///
/// ```
/// use mesh_modelfit::{Mesh, estimate_normals};
/// use nalgebra::Point3;
///
/// let mesh = Mesh::from_parts(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///     ],
///     vec![[0, 1, 2]],
/// );
///
/// let normals = estimate_normals(&mesh).unwrap();
/// assert!((normals[0].z - 1.0).abs() < 1e-10);
/// ```
pub fn estimate_normals(mesh: &Mesh) -> FitResult<Vec<Vector3<f64>>> {
    if mesh.is_empty() {
        return Err(FitError::EmptySourceMesh);
    }
    if mesh.faces.is_empty() {
        return Err(FitError::MissingFaces);
    }

    let mut normals = vec![Vector3::zeros(); mesh.vertex_count()];

    for face in &mesh.faces {
        let a = mesh.vertices[face[0] as usize];
        let b = mesh.vertices[face[1] as usize];
        let c = mesh.vertices[face[2] as usize];

        // Magnitude is twice the triangle area, which gives the
        // area weighting for free.
        let face_normal = (b - a).cross(&(c - a));

        for &index in face {
            normals[index as usize] += face_normal;
        }
    }

    for normal in &mut normals {
        let length = normal.norm();
        if length > 1e-12 {
            *normal /= length;
        }
    }

    Ok(normals)
}
