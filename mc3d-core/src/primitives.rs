/// Spatial query primitives: rays, triangles and axis-aligned boxes
use nalgebra::{Matrix4, Point3, Vector3};

/// Direction components at or below this magnitude leave a slab unconstrained
pub const SLAB_EPSILON: f32 = 5e-3;

/// Initial slab interval, wide enough to cover any scene
const SLAB_LIMIT: f32 = 1.0e10;

/// Cosine below which a ray counts as parallel to a triangle plane
const PARALLEL_EPSILON: f32 = 1e-6;

/// Relative slack for the inside test so shared edges are not missed
const EDGE_EPSILON: f32 = 1e-6;

/// A picking ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self { origin, direction }
    }

    /// Point reached after travelling `t` direction lengths
    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// The same ray expressed in another space, e.g. a model's local space
    /// through the inverse model matrix
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Self {
        Self {
            origin: matrix.transform_point(&self.origin),
            direction: matrix.transform_vector(&self.direction),
        }
    }
}

/// A triangle of three immutable points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    a: Point3<f32>,
    b: Point3<f32>,
    c: Point3<f32>,
}

impl Triangle {
    pub fn new(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        Self { a, b, c }
    }

    pub fn points(&self) -> [Point3<f32>; 3] {
        [self.a, self.b, self.c]
    }

    /// Unnormalized face normal, `(b - a) x (c - a)`
    pub fn normal(&self) -> Vector3<f32> {
        (self.b - self.a).cross(&(self.c - self.a))
    }

    /// Nearest point on the triangle to `query`.
    ///
    /// Classifies the query against the vertex, edge and face regions of the
    /// triangle so the result is always clamped onto the triangle itself.
    pub fn closest_point(&self, query: &Point3<f32>) -> Point3<f32> {
        let (a, b, c) = (self.a, self.b, self.c);
        let ab = b - a;
        let ac = c - a;

        let ap = query - a;
        let d1 = ab.dot(&ap);
        let d2 = ac.dot(&ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = query - b;
        let d3 = ab.dot(&bp);
        let d4 = ac.dot(&bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return a + ab * v;
        }

        let cp = query - c;
        let d5 = ab.dot(&cp);
        let d6 = ac.dot(&cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return a + ac * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return b + (c - b) * w;
        }

        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        a + ab * v + ac * w
    }

    /// Ray parameter of the hit, if any.
    ///
    /// Solves the ray against the triangle's plane and keeps the hit only if
    /// it lies inside all three edges. Parallel rays, hits behind the origin
    /// and hits outside the triangle return `None`.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let normal = self.normal();
        let denom = normal.dot(&ray.direction);
        let scale = normal.norm() * ray.direction.norm();
        if scale == 0.0 || denom.abs() <= PARALLEL_EPSILON * scale {
            return None;
        }

        let t = normal.dot(&(self.a - ray.origin)) / denom;
        if t < 0.0 {
            return None;
        }

        let hit = ray.at(t);
        let slack = -EDGE_EPSILON * normal.norm_squared();
        let edges = [(self.a, self.b), (self.b, self.c), (self.c, self.a)];
        for (start, end) in edges {
            let side = (end - start).cross(&(hit - start)).dot(&normal);
            if side < slack {
                return None;
            }
        }

        Some(t)
    }
}

/// Result of casting a ray against a set of triangles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub triangle: usize,
    pub t: f32,
    pub point: Point3<f32>,
}

/// Closest hit of `ray` over `triangles`
pub fn nearest_hit<'a, I>(triangles: I, ray: &Ray) -> Option<RayHit>
where
    I: IntoIterator<Item = &'a Triangle>,
{
    triangles
        .into_iter()
        .enumerate()
        .filter_map(|(index, triangle)| {
            triangle.intersect_ray(ray).map(|t| RayHit {
                triangle: index,
                t,
                point: ray.at(t),
            })
        })
        .min_by(|lhs, rhs| lhs.t.total_cmp(&rhs.t))
}

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl BoundingBox {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Tightest box around `points`, `None` when there are none
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3<f32>>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| {
            (min.inf(&p), max.sup(&p))
        });
        Some(Self { min, max })
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn extent(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn contains(&self, point: &Point3<f32>) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    /// Slab test.
    ///
    /// Axes where the direction is nearly zero do not constrain the
    /// interval. The box is missed when the clipped interval is empty or lies
    /// entirely behind the origin.
    pub fn intersect_ray(&self, ray: &Ray) -> bool {
        let mut t_min = -SLAB_LIMIT;
        let mut t_max = SLAB_LIMIT;

        for axis in 0..3 {
            let rd = ray.direction[axis];
            if rd.abs() <= SLAB_EPSILON {
                continue;
            }

            let mut t1 = (self.min[axis] - ray.origin[axis]) / rd;
            let mut t2 = (self.max[axis] - ray.origin[axis]) / rd;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }

            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
        }

        if t_min > t_max {
            return false;
        }

        if t_max < 0.0 {
            log::trace!("bounding box is behind the ray origin");
            return false;
        }

        true
    }
}
