use nalgebra::{Point2, Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// 3D point type
pub type Point3D = Point3<f64>;

/// 3D vector type
pub type Vector3D = Vector3<f64>;

/// 2D point type (world XY, millimeters)
pub type Point2D = Point2<f64>;

/// 2D vector type
pub type Vector2D = Vector2<f64>;

/// Triangle defined by three vertices
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Triangle {
    pub v0: Point3D,
    pub v1: Point3D,
    pub v2: Point3D,
}

impl Triangle {
    pub fn new(v0: Point3D, v1: Point3D, v2: Point3D) -> Self {
        Self { v0, v1, v2 }
    }

    pub fn vertices(&self) -> [Point3D; 3] {
        [self.v0, self.v1, self.v2]
    }

    /// Calculate the normal vector of the triangle.
    /// Returns a unit normal, or (0, 0, 1) for degenerate triangles.
    pub fn normal(&self) -> Vector3D {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let cross = edge1.cross(&edge2);
        let norm = cross.norm();

        if norm < 1e-10 || !norm.is_finite() {
            return Vector3D::new(0.0, 0.0, 1.0);
        }

        cross / norm
    }

    /// Calculate the area of the triangle
    pub fn area(&self) -> f64 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        edge1.cross(&edge2).norm() / 2.0
    }

    /// Area of the triangle's projection onto the XY plane (unsigned)
    pub fn xy_area(&self) -> f64 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        (edge1.x * edge2.y - edge1.y * edge2.x).abs() / 2.0
    }

    /// Length of the longest edge
    pub fn longest_edge(&self) -> f64 {
        let a = (self.v1 - self.v0).norm();
        let b = (self.v2 - self.v1).norm();
        let c = (self.v0 - self.v2).norm();
        a.max(b).max(c)
    }

    pub fn centroid(&self) -> Point3D {
        Point3D::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// True when every coordinate is finite
    pub fn is_finite(&self) -> bool {
        self.vertices()
            .iter()
            .all(|v| v.x.is_finite() && v.y.is_finite() && v.z.is_finite())
    }

    /// Same triangle with opposite winding
    pub fn reversed(&self) -> Self {
        Self::new(self.v0, self.v2, self.v1)
    }

    /// Mid-edge subdivision into four congruent sub-triangles.
    /// The winding of each sub-triangle matches the parent.
    pub fn subdivide(&self) -> [Triangle; 4] {
        let m01 = lerp(&self.v0, &self.v1, 0.5);
        let m12 = lerp(&self.v1, &self.v2, 0.5);
        let m20 = lerp(&self.v2, &self.v0, 0.5);

        [
            Triangle::new(self.v0, m01, m20),
            Triangle::new(m01, self.v1, m12),
            Triangle::new(m20, m12, self.v2),
            Triangle::new(m01, m12, m20),
        ]
    }
}

/// Linear interpolation between two 3D points, component-wise
pub fn lerp(a: &Point3D, b: &Point3D, t: f64) -> Point3D {
    a + (b - a) * t
}

/// Signed side of point `p` with respect to the oriented segment `a -> b`.
/// Positive on the left, negative on the right, zero when collinear.
pub fn side_of_segment(a: &Point2D, b: &Point2D, p: &Point2D) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Compute intersection of two 2D line segments `a1->a2` and `b1->b2`.
/// Returns the intersection point and both segment parameters, or None when
/// the segments are parallel or the intersection falls outside either one.
pub fn segment_intersection(
    a1: &Point2D,
    a2: &Point2D,
    b1: &Point2D,
    b2: &Point2D,
) -> Option<(Point2D, f64, f64)> {
    let da = a2 - a1;
    let db = b2 - b1;

    let denom = da.x * db.y - da.y * db.x;
    if denom.abs() < 1e-12 {
        return None; // Parallel or coincident
    }

    let t = ((b1.x - a1.x) * db.y - (b1.y - a1.y) * db.x) / denom;
    let u = ((b1.x - a1.x) * da.y - (b1.y - a1.y) * da.x) / denom;

    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }

    Some((a1 + da * t, t, u))
}

/// Compute the signed area of a 2D polygon.
/// Positive = counter-clockwise, negative = clockwise.
pub fn signed_area(points: &[Point2D]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }
    area / 2.0
}
