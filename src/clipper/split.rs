//! Triangle subdivision against an oriented slicing line.

use super::slicing_line::SlicingLine;
use crate::geometry::{lerp, Point3D, Triangle};

/// Side of the slicing line a vertex falls on. `Left` is the positive side
/// (left of a vertical cut, above a horizontal one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    On,
}

fn classify(d: f64, epsilon: f64) -> Side {
    if d > epsilon {
        Side::Left
    } else if d < -epsilon {
        Side::Right
    } else {
        Side::On
    }
}

/// Result of one binary split. `boundary` holds the shared edge on the
/// slicing line when both sides received geometry.
#[derive(Debug, Default)]
pub struct SplitOutcome {
    pub left: Vec<Triangle>,
    pub right: Vec<Triangle>,
    pub boundary: Option<(Point3D, Point3D)>,
}

/// Split a triangle against the line. Vertices classified `On` are shared
/// by both output polygons; crossing edges are cut at
/// `t = d1 / (d1 - d2)` with Z interpolated linearly. Each side is then
/// fan-triangulated (at most four vertices per side).
pub fn split_triangle(tri: &Triangle, line: &SlicingLine, epsilon: f64) -> SplitOutcome {
    let verts = tri.vertices();
    let d = verts.map(|v| line.side_value(v.x, v.y));
    let sides = [
        classify(d[0], epsilon),
        classify(d[1], epsilon),
        classify(d[2], epsilon),
    ];

    // Trivial cases: nothing strictly on one of the sides
    if !sides.contains(&Side::Right) {
        return SplitOutcome {
            left: vec![*tri],
            ..Default::default()
        };
    }
    if !sides.contains(&Side::Left) {
        return SplitOutcome {
            right: vec![*tri],
            ..Default::default()
        };
    }

    let mut left_poly: Vec<Point3D> = Vec::with_capacity(4);
    let mut right_poly: Vec<Point3D> = Vec::with_capacity(4);
    let mut on_line: Vec<Point3D> = Vec::with_capacity(2);

    for i in 0..3 {
        let j = (i + 1) % 3;
        match sides[i] {
            Side::Left => left_poly.push(verts[i]),
            Side::Right => right_poly.push(verts[i]),
            Side::On => {
                left_poly.push(verts[i]);
                right_poly.push(verts[i]);
                on_line.push(verts[i]);
            }
        }

        let crossing = matches!(
            (sides[i], sides[j]),
            (Side::Left, Side::Right) | (Side::Right, Side::Left)
        );
        if crossing {
            let t = d[i] / (d[i] - d[j]);
            let p = lerp(&verts[i], &verts[j], t);
            left_poly.push(p);
            right_poly.push(p);
            on_line.push(p);
        }
    }

    let boundary = match on_line.len() {
        2.. => Some((on_line[0], on_line[1])),
        _ => None,
    };

    SplitOutcome {
        left: fan(&left_poly),
        right: fan(&right_poly),
        boundary,
    }
}

fn fan(poly: &[Point3D]) -> Vec<Triangle> {
    if poly.len() < 3 {
        return Vec::new();
    }
    (1..poly.len() - 1)
        .map(|i| Triangle::new(poly[0], poly[i], poly[i + 1]))
        .collect()
}

/// Adaptive tessellation: triangles whose longest edge exceeds `max_edge`
/// are recursively mid-edge subdivided, at most `max_depth` levels deep.
pub fn tessellate(tri: &Triangle, max_edge: f64, max_depth: u32, out: &mut Vec<Triangle>) {
    if max_depth == 0 || tri.longest_edge() <= max_edge {
        out.push(*tri);
        return;
    }
    for sub in tri.subdivide() {
        tessellate(&sub, max_edge, max_depth - 1, out);
    }
}
