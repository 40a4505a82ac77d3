/// Editable noise terrain and its brush controller
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::field::{Lattice, MutableField, NoiseField, NoiseSettings};
use crate::primitives::Ray;
use crate::surface::{Surface, SurfaceConfig};

/// Terrain construction and editing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Stored extent along each axis
    pub size: f32,
    /// Lattice spacing, also the cell edge length
    pub grid_size: f32,
    pub threshold: f32,
    pub noise: NoiseSettings,
    /// Brush radius in world units
    pub brush_size: f32,
    /// Added to every weight under the brush; negative digs
    pub strength: f32,
    pub is_edit: bool,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            size: 10.0,
            grid_size: 1.0,
            threshold: 0.5,
            noise: NoiseSettings::default(),
            brush_size: 2.0,
            strength: 1.0,
            is_edit: false,
        }
    }
}

impl TerrainConfig {
    fn surface_config(&self) -> SurfaceConfig {
        SurfaceConfig {
            size: self.size,
            grid_size: self.grid_size,
            threshold: self.threshold,
        }
    }
}

/// What a brush edit did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditOutcome {
    /// Where the picking ray met the surface
    pub hit_point: Point3<f32>,
    /// Number of lattice weights changed
    pub changed: usize,
    /// Triangle count after the rebuild
    pub triangles: usize,
}

/// Noise-seeded heightfield surface that can be sculpted with a brush
#[derive(Debug, Clone)]
pub struct Terrain {
    surface: Surface<NoiseField>,
    noise: NoiseSettings,
    brush_size: f32,
    strength: f32,
    is_edit: bool,
}

impl Terrain {
    /// Sample the noise volume and build the first surface
    pub fn new(config: TerrainConfig) -> Result<Self> {
        log::info!(
            "building terrain: size {} grid {} threshold {}",
            config.size,
            config.grid_size,
            config.threshold
        );
        let field = NoiseField::new(
            Lattice::from_extent(config.size, config.grid_size)?,
            config.noise,
        );
        Ok(Self {
            surface: Surface::new("Terrain", field, config.surface_config())?,
            noise: config.noise,
            brush_size: config.brush_size,
            strength: config.strength,
            is_edit: config.is_edit,
        })
    }

    pub fn surface(&self) -> &Surface<NoiseField> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface<NoiseField> {
        &mut self.surface
    }

    pub fn field(&self) -> &NoiseField {
        self.surface.field()
    }

    /// Current parameters, including any not yet applied by `rebuild_field`
    pub fn config(&self) -> TerrainConfig {
        let surface = self.surface.config();
        TerrainConfig {
            size: surface.size,
            grid_size: surface.grid_size,
            threshold: surface.threshold,
            noise: self.noise,
            brush_size: self.brush_size,
            strength: self.strength,
            is_edit: self.is_edit,
        }
    }

    /// Discard all edits and resample the noise volume from the current
    /// size, grid size and noise parameters, then regenerate
    pub fn rebuild_field(&mut self) -> Result<usize> {
        let config = self.surface.config();
        let lattice = Lattice::from_extent(config.size, config.grid_size)?;
        self.surface.replace_field(NoiseField::new(lattice, self.noise));
        self.surface.regenerate()
    }

    /// Sculpt where `ray` meets the surface.
    ///
    /// Finds the nearest triangle hit, adds `strength` to every weight within
    /// `brush_size` of the hit point and rebuilds the whole surface once.
    /// A ray that misses the surface leaves everything untouched.
    pub fn update_weights(&mut self, ray: &Ray) -> Result<Option<EditOutcome>> {
        let Some(hit) = self.surface.nearest_hit(ray) else {
            log::debug!("edit ray missed the terrain");
            return Ok(None);
        };

        let changed = self
            .surface
            .field_mut()
            .mutate(&hit.point, self.brush_size, self.strength);
        let triangles = self.surface.regenerate()?;

        log::debug!(
            "brush at {:?}: {} weights changed by {}, {} triangles",
            hit.point,
            changed,
            self.strength,
            triangles
        );

        Ok(Some(EditOutcome {
            hit_point: hit.point,
            changed,
            triangles,
        }))
    }

    /// `update_weights` gated on the edit-mode flag
    pub fn edit(&mut self, ray: &Ray) -> Result<Option<EditOutcome>> {
        if !self.is_edit {
            return Ok(None);
        }
        self.update_weights(ray)
    }

    /// Nearest point on the current surface to `query`
    pub fn closest_surface_point(&self, query: &Point3<f32>) -> Option<Point3<f32>> {
        self.surface.closest_point(query)
    }

    pub fn noise_scale(&self) -> i32 {
        self.noise.scale
    }

    pub fn octave(&self) -> i32 {
        self.noise.octaves
    }

    pub fn frequency(&self) -> f32 {
        self.noise.frequency
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn brush_size(&self) -> f32 {
        self.brush_size
    }

    pub fn is_edit(&self) -> bool {
        self.is_edit
    }

    /// Takes effect at the next regeneration, which resamples the lattice
    pub fn set_size(&mut self, size: f32) {
        self.surface.set_size(size);
    }

    /// Takes effect at the next regeneration, which resamples the lattice
    pub fn set_grid_size(&mut self, grid_size: f32) {
        self.surface.set_grid_size(grid_size);
    }

    pub fn set_noise_scale(&mut self, noise_scale: i32) {
        self.noise.scale = noise_scale;
    }

    pub fn set_octave(&mut self, octaves: i32) {
        self.noise.octaves = octaves;
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.noise.frequency = frequency;
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength;
    }

    pub fn set_brush_size(&mut self, brush_size: f32) {
        self.brush_size = brush_size;
    }

    pub fn set_is_edit(&mut self, edit: bool) {
        self.is_edit = edit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn flat_config() -> TerrainConfig {
        TerrainConfig {
            noise: NoiseSettings {
                amplitude: 0.0,
                ..NoiseSettings::default()
            },
            ..TerrainConfig::default()
        }
    }

    fn down_ray(x: f32, z: f32) -> Ray {
        Ray::new(Point3::new(x, 20.0, z), Vector3::new(0.0, -1.0, 0.0))
    }

    #[test]
    fn test_flat_terrain_surface_height() {
        // Weights are 5 - y, so the 0.5 iso level sits at y = 4.5
        let terrain = Terrain::new(flat_config()).unwrap();
        let soup = terrain.surface().soup();
        assert!(soup.triangle_count() > 0);
        for position in &soup.positions {
            assert!((position.y - 4.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_default_terrain_builds() {
        let terrain = Terrain::new(TerrainConfig::default()).unwrap();
        assert_eq!(terrain.field().lattice().dim(), 10);
        assert_eq!(terrain.field().values().len(), 1000);
        assert!(terrain.surface().soup().triangle_count() > 0);
        assert_eq!(terrain.octave(), 8);
        assert_eq!(terrain.noise_scale(), 1);
    }

    #[test]
    fn test_edit_raises_surface_locally() {
        let mut terrain = Terrain::new(flat_config()).unwrap();
        terrain.set_strength(2.0);
        terrain.set_brush_size(1.5);

        let outcome = terrain
            .update_weights(&down_ray(4.3, 4.6))
            .unwrap()
            .unwrap();
        assert!((outcome.hit_point.y - 4.5).abs() < 1e-4);
        assert!(outcome.changed > 0);

        // Raised weights push the 0.5 crossing above 4.5 near the brush
        let max_y = terrain
            .surface()
            .soup()
            .positions
            .iter()
            .map(|p| p.y)
            .fold(f32::MIN, f32::max);
        assert!(max_y > 4.5 + 1e-3);

        // Far corner untouched
        let far = terrain
            .surface()
            .soup()
            .positions
            .iter()
            .filter(|p| p.x < 1.0 && p.z < 1.0)
            .all(|p| (p.y - 4.5).abs() < 1e-5);
        assert!(far);
    }

    #[test]
    fn test_missed_ray_changes_nothing() {
        let mut terrain = Terrain::new(TerrainConfig::default()).unwrap();
        let before = terrain.field().values().to_vec();
        let soup = terrain.surface().soup().clone();

        let away = Ray::new(Point3::new(4.0, 20.0, 4.0), Vector3::new(0.0, 1.0, 0.0));
        assert!(terrain.update_weights(&away).unwrap().is_none());
        assert_eq!(terrain.field().values(), &before[..]);
        assert_eq!(terrain.surface().soup(), &soup);
    }

    #[test]
    fn test_edit_mode_gates_editing() {
        let mut terrain = Terrain::new(flat_config()).unwrap();
        let before = terrain.field().values().to_vec();
        assert!(terrain.edit(&down_ray(4.3, 4.6)).unwrap().is_none());
        assert_eq!(terrain.field().values(), &before[..]);

        terrain.set_is_edit(true);
        assert!(terrain.edit(&down_ray(4.3, 4.6)).unwrap().is_some());
        assert_ne!(terrain.field().values(), &before[..]);
    }

    #[test]
    fn test_rebuild_field_discards_edits() {
        let mut terrain = Terrain::new(flat_config()).unwrap();
        let pristine = terrain.field().values().to_vec();
        terrain.update_weights(&down_ray(4.3, 4.6)).unwrap();
        assert_ne!(terrain.field().values(), &pristine[..]);

        terrain.rebuild_field().unwrap();
        assert_eq!(terrain.field().values(), &pristine[..]);
    }

    #[test]
    fn test_noise_setters_apply_on_rebuild() {
        let mut terrain = Terrain::new(TerrainConfig::default()).unwrap();
        let before = terrain.field().values().to_vec();
        terrain.set_frequency(0.1);
        terrain.set_octave(3);
        assert_eq!(terrain.field().values(), &before[..]);
        assert_eq!(terrain.config().noise.frequency, 0.1);

        terrain.rebuild_field().unwrap();
        assert_ne!(terrain.field().values(), &before[..]);
        assert_eq!(terrain.field().settings().octaves, 3);
    }

    #[test]
    fn test_fractional_grid_size() {
        let terrain = Terrain::new(TerrainConfig {
            size: 4.0,
            grid_size: 0.5,
            ..flat_config()
        })
        .unwrap();
        assert_eq!(terrain.field().lattice().dim(), 8);
        // Weights are 2 - y; the 0.5 crossing is at y = 1.5
        for position in &terrain.surface().soup().positions {
            assert!((position.y - 1.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_surface_grid_change_resamples_lattice() {
        let mut terrain = Terrain::new(flat_config()).unwrap();
        terrain.surface_mut().set_grid_size(0.5);
        terrain.surface_mut().set_size(6.0);
        terrain.surface_mut().regenerate().unwrap();

        let lattice = terrain.field().lattice();
        assert_eq!(lattice.dim(), 12);
        assert_eq!(lattice.spacing(), 0.5);
        assert_eq!(terrain.config().grid_size, 0.5);
        assert_eq!(terrain.config().size, 6.0);

        // Weights are 3 - y; the 0.5 crossing moves to y = 2.5
        let soup = terrain.surface().soup();
        assert!(soup.triangle_count() > 0);
        for position in &soup.positions {
            assert!((position.y - 2.5).abs() < 1e-5);
            assert!(position.x <= 5.5 + 1e-5 && position.z <= 5.5 + 1e-5);
        }
        assert_eq!(terrain.surface().mesh().triangle_count(), soup.triangle_count());
    }

    #[test]
    fn test_size_setters_apply_on_rebuild() {
        let mut terrain = Terrain::new(flat_config()).unwrap();
        terrain.set_size(4.0);
        terrain.set_grid_size(0.5);
        assert_eq!(terrain.field().lattice().dim(), 10);

        terrain.rebuild_field().unwrap();
        assert_eq!(terrain.field().lattice().dim(), 8);
        for position in &terrain.surface().soup().positions {
            assert!((position.y - 1.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_unchanged_grid_keeps_edits() {
        let mut terrain = Terrain::new(flat_config()).unwrap();
        terrain.update_weights(&down_ray(4.3, 4.6)).unwrap();
        let edited = terrain.field().values().to_vec();
        terrain.surface_mut().regenerate().unwrap();
        assert_eq!(terrain.field().values(), &edited[..]);
    }

    #[test]
    fn test_closest_surface_point_snaps_to_plane() {
        let terrain = Terrain::new(flat_config()).unwrap();
        let snapped = terrain
            .closest_surface_point(&Point3::new(3.3, 9.0, 5.2))
            .unwrap();
        assert!((snapped.y - 4.5).abs() < 1e-5);
        assert!((snapped.x - 3.3).abs() < 1e-4);
        assert!((snapped.z - 5.2).abs() < 1e-4);
    }
}
