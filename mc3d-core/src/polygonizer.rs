/// Marching Cubes cell classification, edge interpolation and sweeping
use nalgebra::{Point3, Vector3};

use crate::error::{Error, Result};
use crate::field::ScalarField;
use crate::geometry::Vertex;
use crate::primitives::Triangle;
use crate::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_END, TRI_TABLE};

/// Tolerance when counting cells, so `(max - min) / step` landing a hair
/// above an integer does not add a cell past `max`
const SWEEP_EPSILON: f32 = 1e-4;

/// Ordered triangle list: positions and flat normals, one triangle per three
/// consecutive entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleSoup {
    pub positions: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
}

impl TriangleSoup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Append one triangle with its unnormalized face normal on every vertex
    pub fn push_triangle(&mut self, v1: Point3<f32>, v2: Point3<f32>, v3: Point3<f32>) {
        let normal = (v2 - v1).cross(&(v3 - v1));
        self.positions.extend_from_slice(&[v1, v2, v3]);
        self.normals.extend_from_slice(&[normal, normal, normal]);
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.positions
            .chunks_exact(3)
            .map(|tri| Triangle::new(tri[0], tri[1], tri[2]))
    }

    /// Vertex-layout records for the mesh builder
    pub fn vertices(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.positions
            .iter()
            .zip(&self.normals)
            .map(|(position, normal)| Vertex::from_parts(*position, *normal))
    }
}

/// Corner positions and field values of one cube, in canonical corner order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub corners: [Point3<f32>; 8],
    pub values: [f32; 8],
}

impl Cell {
    /// Sample the cell at integer position `index` of a domain. Corners are
    /// computed from lattice indices, so cells sharing a corner agree on it
    /// exactly.
    pub fn sample_in<F: ScalarField + ?Sized>(field: &F, domain: &SweepDomain, index: [usize; 3]) -> Self {
        let corners = CORNER_OFFSETS.map(|offset| {
            let axis = |a: usize| domain.coord(index[a] + offset[a] as usize);
            Point3::new(axis(0), axis(1), axis(2))
        });
        let values = corners.map(|corner| field.sample(&corner));
        Self { corners, values }
    }
}

/// 8-bit classification: bit `i` is set iff corner `i` is at or below the
/// threshold
pub fn cell_code(values: &[f32; 8], threshold: f32) -> u8 {
    let mut code = 0u8;
    for (corner, &value) in values.iter().enumerate() {
        if value <= threshold {
            code |= 1 << corner;
        }
    }
    code
}

/// Point on the edge `p1 -> p2` where the field crosses `threshold`.
///
/// Equal end values have no crossing to solve for; the midpoint is used so
/// no NaN reaches the vertex arrays.
pub fn interpolate(
    p1: &Point3<f32>,
    p2: &Point3<f32>,
    v1: f32,
    v2: f32,
    threshold: f32,
) -> Point3<f32> {
    if v1 == v2 {
        return nalgebra::center(p1, p2);
    }

    // Solve from the lexicographically lower corner so neighbouring cells
    // produce bit-identical points on a shared edge
    let (p1, p2, v1, v2) = if (p2.x, p2.y, p2.z) < (p1.x, p1.y, p1.z) {
        (p2, p1, v2, v1)
    } else {
        (p1, p2, v1, v2)
    };

    // lerp keeps t == 0 and t == 1 exact at the corners
    let t = (threshold - v1) / (v2 - v1);
    Point3::from(p1.coords.lerp(&p2.coords, t))
}

/// Triangulate one cell into `out`. Returns the number of triangles emitted.
pub fn polygonize(cell: &Cell, threshold: f32, out: &mut TriangleSoup) -> usize {
    let code = cell_code(&cell.values, threshold) as usize;
    let edges = EDGE_TABLE[code];
    if edges == 0 {
        return 0;
    }

    let mut edge_points = [Point3::origin(); 12];
    for (edge, [c1, c2]) in EDGE_CORNERS.iter().enumerate() {
        if edges & (1 << edge) != 0 {
            edge_points[edge] = interpolate(
                &cell.corners[*c1],
                &cell.corners[*c2],
                cell.values[*c1],
                cell.values[*c2],
                threshold,
            );
        }
    }

    let mut emitted = 0;
    for tri in TRI_TABLE[code].chunks_exact(3) {
        if tri[0] == TRI_END {
            break;
        }
        out.push_triangle(
            edge_points[tri[0] as usize],
            edge_points[tri[1] as usize],
            edge_points[tri[2] as usize],
        );
        emitted += 1;
    }
    emitted
}

/// Cubic region `[min, max)` on every axis, walked in cells of edge `step`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepDomain {
    min: f32,
    max: f32,
    step: f32,
}

impl SweepDomain {
    pub fn new(min: f32, max: f32, step: f32) -> Result<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(Error::InvalidGridSize(step));
        }
        if !(min.is_finite() && max.is_finite()) || max <= min {
            return Err(Error::InvalidExtent { min, max });
        }
        Ok(Self { min, max, step })
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Number of cell origins `min + n * step` below `max`
    pub fn cells_per_axis(&self) -> usize {
        ((self.max - self.min) / self.step - SWEEP_EPSILON)
            .ceil()
            .max(0.0) as usize
    }

    pub fn coord(&self, n: usize) -> f32 {
        self.min + n as f32 * self.step
    }
}

/// Resumable pass over a domain, one z slab at a time.
///
/// Cells are visited z outer, y middle, x inner. The sweep only tracks its
/// position; the field and output are passed to each step, so a pass can be
/// interleaved with other work or dropped part way.
#[derive(Debug, Clone)]
pub struct Sweep {
    domain: SweepDomain,
    threshold: f32,
    next_slab: usize,
    triangles: usize,
}

impl Sweep {
    pub fn new(domain: SweepDomain, threshold: f32) -> Self {
        Self {
            domain,
            threshold,
            next_slab: 0,
            triangles: 0,
        }
    }

    pub fn domain(&self) -> &SweepDomain {
        &self.domain
    }

    pub fn slabs(&self) -> usize {
        self.domain.cells_per_axis()
    }

    pub fn completed_slabs(&self) -> usize {
        self.next_slab
    }

    pub fn is_done(&self) -> bool {
        self.next_slab >= self.slabs()
    }

    /// Triangles emitted so far
    pub fn triangles(&self) -> usize {
        self.triangles
    }

    /// Polygonize the next z slab. Returns `true` while slabs remain.
    pub fn step_slab<F: ScalarField + ?Sized>(&mut self, field: &F, out: &mut TriangleSoup) -> bool {
        let cells = self.slabs();
        if self.next_slab >= cells {
            return false;
        }

        let zi = self.next_slab;
        for yi in 0..cells {
            for xi in 0..cells {
                let cell = Cell::sample_in(field, &self.domain, [xi, yi, zi]);
                self.triangles += polygonize(&cell, self.threshold, out);
            }
        }

        self.next_slab += 1;
        self.next_slab < cells
    }

    /// Finish the pass. Returns the total triangles emitted by this sweep.
    pub fn run<F: ScalarField + ?Sized>(&mut self, field: &F, out: &mut TriangleSoup) -> usize {
        while self.step_slab(field, out) {}
        self.triangles
    }
}

/// Polygonize every cell of `domain` into `out`
pub fn march<F: ScalarField + ?Sized>(
    field: &F,
    domain: SweepDomain,
    threshold: f32,
    out: &mut TriangleSoup,
) -> usize {
    Sweep::new(domain, threshold).run(field, out)
}
