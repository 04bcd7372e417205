//! Minimal indexed triangle mesh used by the fitting core.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An indexed triangle mesh with optional per-vertex normals.
///
/// Vertex positions and faces are plain public fields. Normals are kept
/// behind accessors so that, when present, they are guaranteed to be
/// parallel to the vertex array.
///
/// # Example
///
/// ```
/// use mesh_modelfit::Mesh;
/// use nalgebra::Point3;
///
/// let mesh = Mesh::from_vertices(vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
/// ]);
///
/// assert_eq!(mesh.vertex_count(), 2);
/// assert!(!mesh.has_normals());
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<Point3<f64>>,

    /// Triangle faces as indices into the vertex array,
    /// counter-clockwise winding.
    pub faces: Vec<[u32; 3]>,

    normals: Option<Vec<Vector3<f64>>>,
}

impl Mesh {
    /// Creates a new empty mesh.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: None,
        }
    }

    /// Creates a mesh from vertex positions only.
    #[inline]
    #[must_use]
    pub const fn from_vertices(vertices: Vec<Point3<f64>>) -> Self {
        Self {
            vertices,
            faces: Vec::new(),
            normals: None,
        }
    }

    /// Creates a mesh from vertex positions and faces.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
        }
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns `true` if the mesh has no vertices.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns `true` if per-vertex normals are available.
    #[inline]
    #[must_use]
    pub const fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Per-vertex normals, if available.
    #[inline]
    #[must_use]
    pub fn vertex_normals(&self) -> Option<&[Vector3<f64>]> {
        self.normals.as_deref()
    }

    /// Sets per-vertex normals.
    ///
    /// # Panics
    ///
    /// Panics if `normals` is not parallel to the vertex array.
    pub fn set_vertex_normals(&mut self, normals: Vec<Vector3<f64>>) {
        assert_eq!(
            normals.len(),
            self.vertices.len(),
            "normals must be parallel to the vertex array"
        );
        self.normals = Some(normals);
    }

    /// Replaces all vertex positions, keeping the face topology.
    ///
    /// Any cached normals refer to the old positions and are discarded;
    /// recompute them afterwards if they are needed downstream.
    pub fn replace_vertices(&mut self, vertices: Vec<Point3<f64>>) {
        self.vertices = vertices;
        self.normals = None;
    }
}
