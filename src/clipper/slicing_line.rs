//! Local straight-line approximation of a cut path.
//!
//! The splitter divides one triangle against an infinite oriented line. A
//! cut path is curved, so for each triangle the path is restricted to the
//! triangle's span along the walk axis and a least-squares line is fitted
//! through the surviving points.

use crate::geometry::{Point2D, Triangle, Vector2D};
use crate::seam::{Axis, CutPath};

/// Oriented 2D line. `dir` is unit length with a positive walk-axis
/// component, so the positive side of [`side_value`](SlicingLine::side_value)
/// is always the low-index tile side (left of a vertical cut, above a
/// horizontal one).
#[derive(Debug, Clone, Copy)]
pub struct SlicingLine {
    pub anchor: Point2D,
    pub dir: Vector2D,
}

impl SlicingLine {
    /// Fit a line to the stretch of `path` overlapping the triangle's walk
    /// range, widened by `margin` millimeters. Falls back to the path
    /// segment straddling the triangle's centroid when fewer than two path
    /// points survive the restriction.
    pub fn fit(path: &CutPath, tri: &Triangle, margin: f64) -> Self {
        let axis = path.axis;
        let walks = tri.vertices().map(|v| axis.walk_coord(&v));
        let w_min = walks.iter().cloned().fold(f64::INFINITY, f64::min) - margin;
        let w_max = walks.iter().cloned().fold(f64::NEG_INFINITY, f64::max) + margin;

        let local: Vec<&Point2D> = path
            .points
            .iter()
            .filter(|p| {
                let w = axis.walk_coord_2d(p);
                w >= w_min && w <= w_max
            })
            .collect();

        if local.len() >= 2 {
            if let Some(line) = regress(axis, &local) {
                return line;
            }
        }

        Self::centroid_segment(path, tri)
    }

    /// Line through the path segment whose walk range contains the
    /// triangle's centroid, clamped to the nearest end segment otherwise.
    fn centroid_segment(path: &CutPath, tri: &Triangle) -> Self {
        let axis = path.axis;
        let pts = &path.points;

        if pts.len() < 2 {
            // Degenerate path: axis-aligned line through its only point
            let anchor = pts.first().copied().unwrap_or_else(Point2D::origin);
            let dir = match axis {
                Axis::Vertical => Vector2D::new(0.0, 1.0),
                Axis::Horizontal => Vector2D::new(1.0, 0.0),
            };
            return Self { anchor, dir };
        }

        let c = axis.walk_coord(&tri.centroid());
        let mut chosen = 0;
        for i in 0..pts.len() - 1 {
            let wa = axis.walk_coord_2d(&pts[i]);
            let wb = axis.walk_coord_2d(&pts[i + 1]);
            if (wa - c) * (wb - c) <= 0.0 {
                chosen = i;
                break;
            }
            // Remember the segment nearest the centroid as the fallback
            if (wb - c).abs() < (axis.walk_coord_2d(&pts[chosen]) - c).abs() {
                chosen = i;
            }
        }

        let a = pts[chosen];
        let b = pts[chosen + 1];
        let mut dir = b - a;
        if dir.norm() < 1e-12 {
            dir = match axis {
                Axis::Vertical => Vector2D::new(0.0, 1.0),
                Axis::Horizontal => Vector2D::new(1.0, 0.0),
            };
        } else {
            dir /= dir.norm();
            // Keep the walk component positive so sides stay consistent
            let flip = match axis {
                Axis::Vertical => dir.y < 0.0,
                Axis::Horizontal => dir.x < 0.0,
            };
            if flip {
                dir = -dir;
            }
        }
        Self { anchor: a, dir }
    }

    /// Signed side of a 2D point: positive left of / above the line.
    #[inline]
    pub fn side_value(&self, x: f64, y: f64) -> f64 {
        self.dir.x * (y - self.anchor.y) - self.dir.y * (x - self.anchor.x)
    }
}

/// Least-squares fit of the slice coordinate as a function of the walk
/// coordinate. Returns None when the points do not spread along the walk
/// axis.
fn regress(axis: Axis, points: &[&Point2D]) -> Option<SlicingLine> {
    let n = points.len() as f64;
    let mut mean_w = 0.0;
    let mut mean_s = 0.0;
    for p in points {
        mean_w += axis.walk_coord_2d(p);
        mean_s += axis.slice_coord_2d(p);
    }
    mean_w /= n;
    mean_s /= n;

    let mut var = 0.0;
    let mut cov = 0.0;
    for p in points {
        let dw = axis.walk_coord_2d(p) - mean_w;
        let ds = axis.slice_coord_2d(p) - mean_s;
        var += dw * dw;
        cov += dw * ds;
    }
    if var < 1e-12 {
        return None;
    }

    let m = cov / var;
    let (anchor, dir) = match axis {
        Axis::Vertical => (Point2D::new(mean_s, mean_w), Vector2D::new(m, 1.0)),
        Axis::Horizontal => (Point2D::new(mean_w, mean_s), Vector2D::new(1.0, m)),
    };
    Some(SlicingLine {
        anchor,
        dir: dir / dir.norm(),
    })
}
