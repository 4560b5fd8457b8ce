//! Cap synthesis for cut surfaces.
//!
//! Splitting leaves each cut with an unordered bag of 3D segments lying on
//! the cut surface. Snapped endpoints turn the bag into an undirected
//! multigraph whose closed walks are the boundary loops of the surface.
//! Each loop is unrolled by cumulative XY arc length into a `(u, v)` polygon
//! (`v` = z), triangulated by ear clipping, and lifted back onto the
//! original 3D vertices.

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::geometry::{Point2D, Point3D, Triangle};
use crate::seam::CutId;
use std::collections::HashMap;

/// One edge of a cut surface, recorded at split time
#[derive(Debug, Clone, Copy)]
pub struct CutSegment {
    pub a: Point3D,
    pub b: Point3D,
}

type VertexKey = [i64; 3];

fn snap(p: &Point3D, quantum: f64) -> VertexKey {
    [
        (p.x / quantum).round() as i64,
        (p.y / quantum).round() as i64,
        (p.z / quantum).round() as i64,
    ]
}

/// Build cap triangles for one cut's segment bag.
///
/// Chains that cannot close are dropped and reported once per cut as an
/// `OpenLoop` diagnostic; loops shorter than three vertices are discarded
/// silently.
pub fn build_caps(
    segments: &[CutSegment],
    quantum: f64,
    cut: CutId,
    diags: &mut Diagnostics,
) -> Vec<Triangle> {
    // Snap endpoints so float noise from independent splits meets up
    let mut position: HashMap<VertexKey, Point3D> = HashMap::new();
    let mut edges: Vec<(VertexKey, VertexKey)> = Vec::new();
    for seg in segments {
        let ka = snap(&seg.a, quantum);
        let kb = snap(&seg.b, quantum);
        if ka == kb {
            continue; // Shorter than the snapping quantum
        }
        position.entry(ka).or_insert(seg.a);
        position.entry(kb).or_insert(seg.b);
        edges.push((ka, kb));
    }

    let mut incident: HashMap<VertexKey, Vec<usize>> = HashMap::new();
    for (i, (a, b)) in edges.iter().enumerate() {
        incident.entry(*a).or_default().push(i);
        incident.entry(*b).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut loops: Vec<Vec<VertexKey>> = Vec::new();
    let mut open_chains = 0usize;
    let mut open_segments = 0usize;

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut chain: Vec<VertexKey> = vec![edges[start].0, edges[start].1];

        // Grow at the tail, then at the head, until closed or stuck
        loop {
            if chain.first() == chain.last() && chain.len() > 2 {
                chain.pop();
                loops.push(chain);
                break;
            }

            let grew_tail = grow(&mut chain, false, &edges, &incident, &mut used);
            if grew_tail {
                continue;
            }
            let grew_head = grow(&mut chain, true, &edges, &incident, &mut used);
            if grew_head {
                continue;
            }

            open_chains += 1;
            open_segments += chain.len() - 1;
            break;
        }
    }

    if open_chains > 0 {
        diags.push(Diagnostic::for_cut(
            DiagnosticKind::OpenLoop,
            cut,
            format!("{open_chains} chain(s) with {open_segments} segment(s) failed to close"),
        ));
    }

    let mut caps = Vec::new();
    for keys in loops {
        if keys.len() < 3 {
            continue;
        }
        let points: Vec<Point3D> = keys.iter().map(|k| position[k]).collect();
        triangulate_loop(&points, &mut caps);
    }
    caps
}

/// Extend one end of the chain along any unused incident edge.
fn grow(
    chain: &mut Vec<VertexKey>,
    at_head: bool,
    edges: &[(VertexKey, VertexKey)],
    incident: &HashMap<VertexKey, Vec<usize>>,
    used: &mut [bool],
) -> bool {
    let end = match if at_head { chain.first() } else { chain.last() } {
        Some(k) => *k,
        None => return false,
    };

    let Some(candidates) = incident.get(&end) else {
        return false;
    };
    for &ei in candidates {
        if used[ei] {
            continue;
        }
        let (a, b) = edges[ei];
        let next = if a == end { b } else { a };
        used[ei] = true;
        if at_head {
            chain.insert(0, next);
        } else {
            chain.push(next);
        }
        return true;
    }
    false
}

/// Unroll a closed loop by XY arc length and ear-clip the result.
fn triangulate_loop(points: &[Point3D], out: &mut Vec<Triangle>) {
    let mut uv = Vec::with_capacity(points.len());
    let mut u = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            let q = points[i - 1];
            u += ((p.x - q.x).powi(2) + (p.y - q.y).powi(2)).sqrt();
        }
        uv.push(Point2D::new(u, p.z));
    }

    for (a, b, c) in ear_clip(&uv) {
        out.push(Triangle::new(points[a], points[b], points[c]));
    }
}

/// Ear-clipping triangulation for a simple polygon (may be concave).
/// Returns triangle index triples into the input slice.
fn ear_clip(polygon: &[Point2D]) -> Vec<(usize, usize, usize)> {
    let n = polygon.len();
    if n < 3 {
        return Vec::new();
    }
    if n == 3 {
        return vec![(0, 1, 2)];
    }

    let ccw = crate::geometry::signed_area(polygon) >= 0.0;
    let mut indices: Vec<usize> = (0..n).collect();
    let mut result = Vec::new();

    let mut rounds = 0;
    let max_rounds = n * n;

    while indices.len() > 3 && rounds < max_rounds {
        rounds += 1;
        let len = indices.len();
        let mut clipped = false;

        for i in 0..len {
            let prev = indices[(i + len - 1) % len];
            let curr = indices[i];
            let next = indices[(i + 1) % len];

            if !is_ear(polygon, &indices, prev, curr, next, ccw) {
                continue;
            }

            result.push((prev, curr, next));
            indices.remove(i);
            clipped = true;
            break;
        }

        if !clipped {
            // Degenerate remainder: close it with a fan
            for i in 1..indices.len() - 1 {
                result.push((indices[0], indices[i], indices[i + 1]));
            }
            return result;
        }
    }

    if indices.len() == 3 {
        result.push((indices[0], indices[1], indices[2]));
    }
    result
}

fn is_ear(
    polygon: &[Point2D],
    indices: &[usize],
    prev: usize,
    curr: usize,
    next: usize,
    ccw: bool,
) -> bool {
    let a = polygon[prev];
    let b = polygon[curr];
    let c = polygon[next];

    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    if ccw && cross <= 0.0 {
        return false; // Reflex corner
    }
    if !ccw && cross >= 0.0 {
        return false;
    }

    for &idx in indices {
        if idx == prev || idx == curr || idx == next {
            continue;
        }
        if point_in_triangle(&polygon[idx], &a, &b, &c) {
            return false;
        }
    }
    true
}

fn point_in_triangle(p: &Point2D, a: &Point2D, b: &Point2D, c: &Point2D) -> bool {
    let d1 = crate::geometry::side_of_segment(a, b, p);
    let d2 = crate::geometry::side_of_segment(b, c, p);
    let d3 = crate::geometry::side_of_segment(c, a, p);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}
