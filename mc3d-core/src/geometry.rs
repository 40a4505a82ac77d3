/// Vertex layout and the mesh buffer handed to the renderer
use nalgebra::{Matrix4, Point2, Point3, Vector3};

use crate::polygonizer::TriangleSoup;
use crate::primitives::{BoundingBox, Ray};

/// A vertex with position, normal and an optional texture coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub tex_coord: Option<Point2<f32>>,
}

impl Vertex {
    pub fn from_parts(position: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self {
            position,
            normal,
            tex_coord: None,
        }
    }
}

/// Non-indexed triangle mesh: every three consecutive vertices form a face.
///
/// Owns its vertices once built; the surface that produced it keeps no
/// reference into it.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    transform: Matrix4<f32>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_vertices(name, Vec::new())
    }

    pub fn from_vertices(name: impl Into<String>, vertices: Vec<Vertex>) -> Self {
        Self {
            name: name.into(),
            vertices,
            transform: Matrix4::identity(),
        }
    }

    /// Package a polygonizer result verbatim, in emission order
    pub fn from_soup(name: impl Into<String>, soup: &TriangleSoup) -> Self {
        Self::from_vertices(name, soup.vertices().collect())
    }

    pub fn faces(&self) -> impl Iterator<Item = &[Vertex]> + '_ {
        self.vertices.chunks_exact(3)
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn transform(&self) -> &Matrix4<f32> {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Matrix4<f32>) {
        self.transform = transform;
    }

    /// World-space bounds of the transformed vertices.
    ///
    /// Recomputed on every call since the transform may have changed.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(
            self.vertices
                .iter()
                .map(|v| self.transform.transform_point(&v.position)),
        )
    }

    /// Coarse pick test against the current bounding box
    pub fn intersect_ray(&self, ray: &Ray) -> bool {
        match self.bounding_box() {
            Some(bbox) => bbox.intersect_ray(ray),
            None => false,
        }
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new("mesh")
    }
}
