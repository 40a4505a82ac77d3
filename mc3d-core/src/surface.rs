/// Surface container: owns a field, its triangle soup and the built mesh
use std::time::Instant;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::field::{Lattice, NoiseField, ScalarField, SphereField};
use crate::geometry::Mesh;
use crate::polygonizer::{Sweep, SweepDomain, TriangleSoup};
use crate::primitives::{nearest_hit, Ray, RayHit, Triangle};

/// Extent, cell size and iso level of a surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub size: f32,
    pub grid_size: f32,
    pub threshold: f32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            size: 1.0,
            grid_size: 0.1,
            threshold: 1.0,
        }
    }
}

/// A field that knows which region a surface built from it should sweep
pub trait SurfaceField: ScalarField {
    fn sweep_domain(&self, config: &SurfaceConfig) -> Result<SweepDomain>;

    /// Bring stored samples in line with `config` before a sweep. Returns
    /// `true` if the field was rebuilt.
    fn fit_config(&mut self, _config: &SurfaceConfig) -> Result<bool> {
        Ok(false)
    }
}

impl SurfaceField for SphereField {
    /// Symmetric about the center: `[c - size, c + size)` per axis
    fn sweep_domain(&self, config: &SurfaceConfig) -> Result<SweepDomain> {
        // The cube is the same on every axis, so centers off the diagonal are
        // covered by the widest axis range.
        let c = self.center();
        let lo = c.x.min(c.y).min(c.z) - config.size;
        let hi = c.x.max(c.y).max(c.z) + config.size;
        SweepDomain::new(lo, hi, config.grid_size)
    }
}

impl SurfaceField for NoiseField {
    /// One cell short of the stored extent, since every cell reads the
    /// lattice point after it
    fn sweep_domain(&self, _config: &SurfaceConfig) -> Result<SweepDomain> {
        let lattice = self.lattice();
        SweepDomain::new(0.0, lattice.max_coord(), lattice.spacing())
    }

    /// Resample with the same noise when size or grid size changed. Edits
    /// made on the old lattice are lost.
    fn fit_config(&mut self, config: &SurfaceConfig) -> Result<bool> {
        let lattice = Lattice::from_extent(config.size, config.grid_size)?;
        if lattice == *self.lattice() {
            return Ok(false);
        }
        log::info!(
            "lattice changed to {}³ at spacing {}, resampling",
            lattice.dim(),
            lattice.spacing()
        );
        *self = NoiseField::new(lattice, *self.settings());
        Ok(true)
    }
}

/// An isosurface and everything derived from it
#[derive(Debug, Clone)]
pub struct Surface<F> {
    name: String,
    field: F,
    config: SurfaceConfig,
    soup: TriangleSoup,
    trimeshes: Vec<Triangle>,
    mesh: Mesh,
}

impl<F: SurfaceField> Surface<F> {
    /// Build the surface and run the first full regeneration
    pub fn new(name: impl Into<String>, field: F, config: SurfaceConfig) -> Result<Self> {
        let name = name.into();
        let mut surface = Self {
            mesh: Mesh::new(name.clone()),
            name,
            field,
            config,
            soup: TriangleSoup::new(),
            trimeshes: Vec::new(),
        };
        surface.regenerate()?;
        Ok(surface)
    }

    /// Discard every derived array and rebuild from the field. Blocks until
    /// the whole domain is swept. Returns the triangle count.
    pub fn regenerate(&mut self) -> Result<usize> {
        Ok(self.begin_regeneration()?.finish())
    }

    /// Start a resumable regeneration.
    ///
    /// Slabs accumulate in the task, not the surface. Dropping the task
    /// before `finish` leaves the soup, mesh and picking triangles of the
    /// last completed regeneration in place.
    pub fn begin_regeneration(&mut self) -> Result<Regeneration<'_, F>> {
        self.field.fit_config(&self.config)?;
        let domain = self.field.sweep_domain(&self.config)?;
        Ok(Regeneration {
            sweep: Sweep::new(domain, self.config.threshold),
            soup: TriangleSoup::new(),
            surface: self,
            started: Instant::now(),
        })
    }

    /// Closest hit of `ray` against the current triangles
    pub fn nearest_hit(&self, ray: &Ray) -> Option<RayHit> {
        nearest_hit(&self.trimeshes, ray)
    }

    /// Nearest point on the current triangles to `query`
    pub fn closest_point(&self, query: &Point3<f32>) -> Option<Point3<f32>> {
        self.trimeshes
            .iter()
            .map(|tri| tri.closest_point(query))
            .min_by(|a, b| {
                nalgebra::distance_squared(a, query).total_cmp(&nalgebra::distance_squared(b, query))
            })
    }
}

impl<F> Surface<F> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    pub(crate) fn field_mut(&mut self) -> &mut F {
        &mut self.field
    }

    pub(crate) fn replace_field(&mut self, field: F) {
        self.field = field;
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn soup(&self) -> &TriangleSoup {
        &self.soup
    }

    /// Picking triangles derived from the last completed regeneration
    pub fn triangles(&self) -> &[Triangle] {
        &self.trimeshes
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    pub fn size(&self) -> f32 {
        self.config.size
    }

    pub fn grid_size(&self) -> f32 {
        self.config.grid_size
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    pub fn set_size(&mut self, size: f32) {
        self.config.size = size;
    }

    pub fn set_grid_size(&mut self, grid_size: f32) {
        self.config.grid_size = grid_size;
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.config.threshold = threshold;
    }
}

/// An in-progress regeneration, advanced one z slab per `step`
pub struct Regeneration<'a, F> {
    surface: &'a mut Surface<F>,
    sweep: Sweep,
    soup: TriangleSoup,
    started: Instant,
}

impl<'a, F: SurfaceField> Regeneration<'a, F> {
    /// Sweep one slab. Returns `true` while slabs remain.
    pub fn step(&mut self) -> bool {
        self.sweep.step_slab(&self.surface.field, &mut self.soup)
    }

    /// Triangles from the slabs swept so far
    pub fn partial(&self) -> &TriangleSoup {
        &self.soup
    }

    /// `(completed, total)` slabs
    pub fn progress(&self) -> (usize, usize) {
        (self.sweep.completed_slabs(), self.sweep.slabs())
    }

    /// Sweep what remains and rebuild the picking triangles and the mesh.
    /// Returns the triangle count.
    pub fn finish(mut self) -> usize {
        while self.step() {}

        let Regeneration {
            surface,
            sweep,
            soup,
            started,
        } = self;
        surface.trimeshes = soup.triangles().collect();

        let mut mesh = Mesh::from_soup(surface.name.clone(), &soup);
        mesh.set_transform(*surface.mesh.transform());
        surface.mesh = mesh;
        surface.soup = soup;

        let triangles = surface.soup.triangle_count();
        log::debug!(
            "regenerated {}: {} triangles over {}³ cells in {:?}",
            surface.name,
            triangles,
            sweep.slabs(),
            started.elapsed()
        );
        triangles
    }
}

/// Analytic blob: the distance field around a center, cut at `threshold`
#[derive(Debug, Clone)]
pub struct Metaball {
    surface: Surface<SphereField>,
}

impl Metaball {
    /// Metaball at the origin sweeping `[-size, size)` with the default
    /// cell size and threshold
    pub fn new(size: f32) -> Result<Self> {
        Self::with_config(
            SphereField::default(),
            SurfaceConfig {
                size,
                ..SurfaceConfig::default()
            },
        )
    }

    pub fn with_config(field: SphereField, config: SurfaceConfig) -> Result<Self> {
        log::info!(
            "building metaball: radius {} center {:?}",
            config.size,
            field.center()
        );
        Ok(Self {
            surface: Surface::new("Metaball", field, config)?,
        })
    }

    pub fn center(&self) -> Point3<f32> {
        self.surface.field().center()
    }

    pub fn surface(&self) -> &Surface<SphereField> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface<SphereField> {
        &mut self.surface
    }

    /// Whether `ray` hits the metaball's current bounding box
    pub fn is_picked(&self, ray: &Ray) -> bool {
        self.surface.mesh().intersect_ray(ray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn small_metaball() -> Metaball {
        Metaball::with_config(
            SphereField::default(),
            SurfaceConfig {
                size: 1.5,
                grid_size: 0.25,
                threshold: 1.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_metaball_vertices_lie_on_sphere() {
        let metaball = small_metaball();
        let soup = metaball.surface().soup();
        assert!(soup.triangle_count() > 0);
        for position in &soup.positions {
            let r = nalgebra::distance(position, &Point3::origin());
            assert!((r - 1.0).abs() <= 0.25, "vertex at radius {}", r);
        }
    }

    #[test]
    fn test_mesh_mirrors_soup() {
        let metaball = small_metaball();
        let surface = metaball.surface();
        assert_eq!(surface.mesh().vertices.len(), surface.soup().len());
        assert_eq!(surface.triangles().len(), surface.soup().triangle_count());
        assert_eq!(surface.mesh().name, "Metaball");
    }

    #[test]
    fn test_regeneration_is_idempotent() {
        let mut metaball = small_metaball();
        let first = metaball.surface().soup().clone();
        metaball.surface_mut().regenerate().unwrap();
        assert_eq!(metaball.surface().soup(), &first);
    }

    #[test]
    fn test_stepwise_regeneration_matches_blocking() {
        let mut metaball = small_metaball();
        let expected = metaball.surface().soup().clone();

        let mut task = metaball.surface_mut().begin_regeneration().unwrap();
        let (_, total) = task.progress();
        assert_eq!(total, 12);
        assert!(task.step());
        assert_eq!(task.progress(), (1, 12));
        let triangles = task.finish();

        assert_eq!(triangles, expected.triangle_count());
        assert_eq!(metaball.surface().soup(), &expected);
    }

    #[test]
    fn test_dropped_regeneration_keeps_previous_views() {
        let mut metaball = small_metaball();
        let previous = metaball.surface().soup().clone();
        metaball.surface_mut().set_threshold(0.5);

        {
            let mut task = metaball.surface_mut().begin_regeneration().unwrap();
            for _ in 0..6 {
                assert!(task.step());
            }
            assert_eq!(task.progress(), (6, 12));
            assert!(task.partial().triangle_count() > 0);
            assert!(task.partial().triangle_count() < previous.triangle_count());
        }

        let surface = metaball.surface();
        assert_eq!(surface.soup(), &previous);
        assert_eq!(surface.mesh().triangle_count(), previous.triangle_count());
        assert_eq!(surface.triangles().len(), previous.triangle_count());
    }

    #[test]
    fn test_threshold_change_resizes_sphere() {
        let mut metaball = small_metaball();
        metaball.surface_mut().set_threshold(0.5);
        metaball.surface_mut().regenerate().unwrap();
        for position in &metaball.surface().soup().positions {
            let r = nalgebra::distance(position, &Point3::origin());
            assert!((r - 0.5).abs() <= 0.25);
        }
    }

    #[test]
    fn test_invalid_grid_size_is_rejected() {
        let mut metaball = small_metaball();
        metaball.surface_mut().set_grid_size(0.0);
        assert!(matches!(
            metaball.surface_mut().regenerate(),
            Err(Error::InvalidGridSize(_))
        ));
    }

    #[test]
    fn test_metaball_pick_and_surface_queries() {
        let metaball = small_metaball();
        let ray = Ray::new(Point3::new(0.07, 0.13, 5.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(metaball.is_picked(&ray));

        let hit = metaball.surface().nearest_hit(&ray).unwrap();
        assert!(hit.point.z > 0.0);
        assert_relative_eq!(hit.point.z, 1.0, epsilon = 0.25);

        let snapped = metaball
            .surface()
            .closest_point(&Point3::new(3.0, 0.0, 0.0))
            .unwrap();
        assert_relative_eq!(snapped.x, 1.0, epsilon = 0.25);
    }
}
