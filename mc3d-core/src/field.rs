/// Scalar fields sampled by the polygonizer
use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest distance, in lattice units, a coordinate may sit from a lattice
/// point and still address it
pub const LATTICE_EPSILON: f32 = 1e-3;

/// A source of scalar values over 3D space
pub trait ScalarField {
    fn sample(&self, point: &Point3<f32>) -> f32;
}

/// A field whose stored values can be edited in place
pub trait MutableField: ScalarField {
    /// Add `delta` to every stored value within `radius` of `center`.
    /// Returns how many values changed.
    fn mutate(&mut self, center: &Point3<f32>, radius: f32, delta: f32) -> usize;
}

/// Euclidean distance to a fixed center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereField {
    center: Point3<f32>,
}

impl SphereField {
    pub fn new(center: Point3<f32>) -> Self {
        Self { center }
    }

    pub fn center(&self) -> Point3<f32> {
        self.center
    }
}

impl Default for SphereField {
    fn default() -> Self {
        Self::new(Point3::origin())
    }
}

impl ScalarField for SphereField {
    fn sample(&self, point: &Point3<f32>) -> f32 {
        nalgebra::distance(point, &self.center)
    }
}

/// Cubic lattice of `dim` points per axis, `spacing` apart, starting at the
/// origin. Maps lattice points to flat indices `i + dim * (j + dim * k)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    dim: usize,
    spacing: f32,
}

impl Lattice {
    pub fn new(dim: usize, spacing: f32) -> Result<Self> {
        if dim == 0 || !(spacing.is_finite() && spacing > 0.0) {
            return Err(Error::InvalidLattice { dim, spacing });
        }
        Ok(Self { dim, spacing })
    }

    /// Lattice covering `[0, extent)` at the given spacing
    pub fn from_extent(extent: f32, spacing: f32) -> Result<Self> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(Error::InvalidGridSize(spacing));
        }
        if !(extent.is_finite() && extent > 0.0) {
            return Err(Error::InvalidExtent {
                min: 0.0,
                max: extent,
            });
        }
        Self::new((extent / spacing).round() as usize, spacing)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    /// Number of lattice points
    pub(crate) fn len(&self) -> usize {
        self.dim * self.dim * self.dim
    }

    /// Distance from the origin to the last lattice point along one axis
    pub fn max_coord(&self) -> f32 {
        (self.dim - 1) as f32 * self.spacing
    }

    pub fn flatten(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dim * (j + self.dim * k)
    }

    pub fn point(&self, i: usize, j: usize, k: usize) -> Point3<f32> {
        Point3::new(i as f32, j as f32, k as f32) * self.spacing
    }

    /// Lattice coordinates of `point`, rejecting points between lattice
    /// points or outside the lattice
    pub fn coords(&self, point: &Point3<f32>) -> Result<[usize; 3]> {
        let scaled = point.coords / self.spacing;
        let rounded = scaled.map(f32::round);
        if (scaled - rounded).amax() > LATTICE_EPSILON || !scaled.iter().all(|c| c.is_finite()) {
            return Err(Error::MisalignedPoint {
                x: point.x,
                y: point.y,
                z: point.z,
                spacing: self.spacing,
            });
        }

        let (i, j, k) = (rounded.x as i64, rounded.y as i64, rounded.z as i64);
        let dim = self.dim as i64;
        if [i, j, k].iter().any(|&c| c < 0 || c >= dim) {
            return Err(Error::OutOfLattice {
                i,
                j,
                k,
                dim: self.dim,
            });
        }

        Ok([i as usize, j as usize, k as usize])
    }

    pub fn index(&self, point: &Point3<f32>) -> Result<usize> {
        let [i, j, k] = self.coords(point)?;
        Ok(self.flatten(i, j, k))
    }

    /// Inclusive range of lattice coordinates along one axis that may lie
    /// within `radius` of `center`
    fn axis_span(&self, center: f32, radius: f32) -> Option<(usize, usize)> {
        let lo = ((center - radius) / self.spacing).ceil().max(0.0);
        let hi = ((center + radius) / self.spacing)
            .floor()
            .min((self.dim - 1) as f32);
        if !(lo.is_finite() && hi.is_finite()) || lo > hi {
            return None;
        }
        Some((lo as usize, hi as usize))
    }
}

/// Parameters of the layered noise seeding a `NoiseField`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    /// Integer multiplier applied to lattice positions before sampling
    pub scale: i32,
    pub octaves: i32,
    pub frequency: f32,
    /// Weight of the noise term relative to the ground ramp
    pub amplitude: f32,
    pub seed: i32,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            scale: 1,
            octaves: 8,
            frequency: 0.02,
            amplitude: 10.0,
            seed: 1337,
        }
    }
}

impl NoiseSettings {
    fn generator(&self) -> FastNoiseLite {
        let mut noise = FastNoiseLite::with_seed(self.seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_fractal_type(Some(FractalType::Ridged));
        noise.set_frequency(Some(self.frequency));
        noise.set_fractal_octaves(Some(self.octaves));
        noise
    }
}

/// Dense weight volume seeded by ridged noise over a vertical ground ramp.
///
/// Values run from strongly negative high up to strongly positive deep
/// down, perturbed by the noise term.
#[derive(Debug, Clone)]
pub struct NoiseField {
    lattice: Lattice,
    settings: NoiseSettings,
    weights: Vec<f32>,
}

impl NoiseField {
    /// Sample the noise at every lattice point. Cost is O(dim³).
    pub fn new(lattice: Lattice, settings: NoiseSettings) -> Self {
        let noise = settings.generator();
        let extent = lattice.dim() as f32 * lattice.spacing();
        let scale = settings.scale as f32;

        let mut weights = vec![0.0; lattice.len()];
        for k in 0..lattice.dim() {
            for j in 0..lattice.dim() {
                for i in 0..lattice.dim() {
                    let pos = lattice.point(i, j, k) * scale;
                    let ground = -pos.y + 0.5 * extent;
                    let n = noise.get_noise_3d(pos.x, pos.y, pos.z);
                    weights[lattice.flatten(i, j, k)] = ground + n * settings.amplitude;
                }
            }
        }

        log::info!(
            "seeded noise field: {} weights ({}³ at spacing {})",
            weights.len(),
            lattice.dim(),
            lattice.spacing()
        );

        Self {
            lattice,
            settings,
            weights,
        }
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn settings(&self) -> &NoiseSettings {
        &self.settings
    }

    pub fn values(&self) -> &[f32] {
        &self.weights
    }

    pub fn value_at(&self, i: usize, j: usize, k: usize) -> Option<f32> {
        if i >= self.lattice.dim() || j >= self.lattice.dim() || k >= self.lattice.dim() {
            return None;
        }
        self.weights.get(self.lattice.flatten(i, j, k)).copied()
    }

    /// Checked lookup of the stored value at a lattice point
    pub fn try_sample(&self, point: &Point3<f32>) -> Result<f32> {
        let index = self.lattice.index(point)?;
        Ok(self.weights[index])
    }
}

impl ScalarField for NoiseField {
    fn sample(&self, point: &Point3<f32>) -> f32 {
        match self.try_sample(point) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("{}; treating as outside", err);
                f32::INFINITY
            }
        }
    }
}

impl MutableField for NoiseField {
    fn mutate(&mut self, center: &Point3<f32>, radius: f32, delta: f32) -> usize {
        if !(radius >= 0.0) {
            return 0;
        }

        let lattice = self.lattice;
        let spans = (
            lattice.axis_span(center.x, radius),
            lattice.axis_span(center.y, radius),
            lattice.axis_span(center.z, radius),
        );
        let (Some((i0, i1)), Some((j0, j1)), Some((k0, k1))) = spans else {
            return 0;
        };

        let mut changed = 0;
        for k in k0..=k1 {
            for j in j0..=j1 {
                for i in i0..=i1 {
                    if nalgebra::distance(&lattice.point(i, j, k), center) <= radius {
                        self.weights[lattice.flatten(i, j, k)] += delta;
                        changed += 1;
                    }
                }
            }
        }
        changed
    }
}
