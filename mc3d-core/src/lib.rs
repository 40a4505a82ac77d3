/// MC3D Core Library - Marching Cubes isosurfaces over scalar fields
///
/// This library provides the field sampling, polygonization and spatial
/// queries behind the metaball and editable terrain surfaces, plus the mesh,
/// transform and camera types the renderers consume.
pub mod error;
pub mod field;
pub mod geometry;
pub mod polygonizer;
pub mod primitives;
pub mod projection;
pub mod surface;
pub mod tables;
pub mod terrain;
pub mod transform;

// Re-export commonly used types
pub use error::{Error, Result};
pub use field::{Lattice, MutableField, NoiseField, NoiseSettings, ScalarField, SphereField};
pub use geometry::{Mesh, Vertex};
pub use polygonizer::{march, polygonize, Cell, Sweep, SweepDomain, TriangleSoup};
pub use primitives::{BoundingBox, Ray, RayHit, Triangle};
pub use projection::{Camera, ProjectionMode};
pub use surface::{Metaball, Regeneration, Surface, SurfaceConfig, SurfaceField};
pub use terrain::{EditOutcome, Terrain, TerrainConfig};
pub use transform::{RotationState, Transform};
