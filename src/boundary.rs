//! Boundary extraction for a labeled grid.
//!
//! Works on the dual lattice of pixel corners: every pair of 4-adjacent
//! cells with different labels contributes one inter-pixel edge. Chains of
//! degree-2 corners between topological nodes become macro edges, each
//! simplified once and shared verbatim by the two regions it separates, so
//! neighboring polygons never disagree about their common border.

use crate::geometry::{signed_area, Point2D};
use crate::watershed::LabelGrid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Boundary tracing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Ramer-Douglas-Peucker tolerance, in grid units
    pub simplify_epsilon: f64,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            simplify_epsilon: 2.0,
        }
    }
}

/// Closed outline of one region, in corner-lattice coordinates
#[derive(Debug, Clone)]
pub struct RegionOutline {
    pub label: u32,
    pub points: Vec<Point2D>,
}

/// One maximal chain of inter-pixel edges between two nodes.
/// `left`/`right` name the labels flanking the chain walked in point order.
#[derive(Debug, Clone)]
struct MacroEdge {
    points: Vec<Point2D>,
    left: u32,
    right: u32,
}

#[derive(Debug, Clone, Copy)]
struct AtomicEdge {
    a: (usize, usize),
    b: (usize, usize),
    /// Label on the left when walking a -> b
    left: u32,
    /// Label on the right when walking a -> b
    right: u32,
}

pub struct BoundaryTracer {
    config: BoundaryConfig,
}

impl BoundaryTracer {
    pub fn new(config: BoundaryConfig) -> Self {
        Self { config }
    }

    /// Extract one closed polygon per positive label. Labels whose region
    /// is not simply connected contribute their largest loop.
    pub fn trace(&self, labels: &LabelGrid) -> Vec<RegionOutline> {
        let (w, h) = (labels.width(), labels.height());
        let edges = collect_edges(labels);
        if edges.is_empty() {
            return Vec::new();
        }

        // Corner adjacency and node classification
        let corner_id = |c: (usize, usize)| c.1 * (w + 1) + c.0;
        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); (w + 1) * (h + 1)];
        for (i, e) in edges.iter().enumerate() {
            incident[corner_id(e.a)].push(i);
            incident[corner_id(e.b)].push(i);
        }

        let mut is_node = vec![false; incident.len()];
        for (c, inc) in incident.iter().enumerate() {
            if !inc.is_empty() && inc.len() != 2 {
                is_node[c] = true;
            }
        }
        for corner in [(0, 0), (w, 0), (0, h), (w, h)] {
            is_node[corner_id(corner)] = true;
        }

        let mut visited = vec![false; edges.len()];
        let mut macros: Vec<MacroEdge> = Vec::new();

        // Chains anchored at nodes
        for start in 0..incident.len() {
            if !is_node[start] {
                continue;
            }
            let corner = (start % (w + 1), start / (w + 1));
            for &first in &incident[start] {
                if visited[first] {
                    continue;
                }
                macros.push(walk_chain(
                    corner, first, &edges, &incident, &is_node, &mut visited, corner_id,
                ));
            }
        }

        // Leftover closed loops that touch no node at all
        for first in 0..edges.len() {
            if visited[first] {
                continue;
            }
            macros.push(walk_chain(
                edges[first].a,
                first,
                &edges,
                &incident,
                &is_node,
                &mut visited,
                corner_id,
            ));
        }

        for m in &mut macros {
            m.points = simplify(&m.points, self.config.simplify_epsilon);
        }

        // Reassemble per label, with the label kept on the left everywhere
        let mut label_set: Vec<u32> = macros
            .iter()
            .flat_map(|m| [m.left, m.right])
            .filter(|&l| l > 0)
            .collect();
        label_set.sort_unstable();
        label_set.dedup();

        let mut outlines = Vec::new();
        for label in label_set {
            let mut pieces: Vec<Vec<Point2D>> = Vec::new();
            for m in &macros {
                if m.left == label {
                    pieces.push(m.points.clone());
                } else if m.right == label {
                    pieces.push(m.points.iter().rev().copied().collect());
                }
            }

            if let Some(points) = stitch_largest_loop(pieces) {
                outlines.push(RegionOutline { label, points });
            }
        }
        outlines
    }
}

fn label_at(labels: &LabelGrid, x: isize, y: isize) -> u32 {
    if x < 0 || y < 0 || x as usize >= labels.width() || y as usize >= labels.height() {
        return 0;
    }
    labels.get(y as usize, x as usize)
}

/// Every inter-pixel edge between differing labels, with flanking labels
/// recorded for the canonical walking direction (left-to-right, or
/// top-to-bottom for vertical edges).
fn collect_edges(labels: &LabelGrid) -> Vec<AtomicEdge> {
    let (w, h) = (labels.width(), labels.height());
    let mut edges = Vec::new();

    // Vertical edges separate horizontally adjacent cells. Walking
    // downward, the east cell lies on the left.
    for y in 0..h {
        for x in 0..=w {
            let west = label_at(labels, x as isize - 1, y as isize);
            let east = label_at(labels, x as isize, y as isize);
            if west != east {
                edges.push(AtomicEdge {
                    a: (x, y),
                    b: (x, y + 1),
                    left: east,
                    right: west,
                });
            }
        }
    }

    // Horizontal edges separate vertically adjacent cells. Walking east,
    // the north cell lies on the left.
    for y in 0..=h {
        for x in 0..w {
            let north = label_at(labels, x as isize, y as isize - 1);
            let south = label_at(labels, x as isize, y as isize);
            if north != south {
                edges.push(AtomicEdge {
                    a: (x, y),
                    b: (x + 1, y),
                    left: north,
                    right: south,
                });
            }
        }
    }

    edges
}

/// Follow a chain of degree-2 corners starting with edge `first` away from
/// `from`, until a node (or the start corner) is reached.
fn walk_chain(
    from: (usize, usize),
    first: usize,
    edges: &[AtomicEdge],
    incident: &[Vec<usize>],
    is_node: &[bool],
    visited: &mut [bool],
    corner_id: impl Fn((usize, usize)) -> usize,
) -> MacroEdge {
    let e = &edges[first];
    let (left, right) = if e.a == from {
        (e.left, e.right)
    } else {
        (e.right, e.left)
    };

    let mut points = vec![Point2D::new(from.0 as f64, from.1 as f64)];
    let mut corner = from;
    let mut edge = first;

    loop {
        visited[edge] = true;
        let e = &edges[edge];
        corner = if e.a == corner { e.b } else { e.a };
        points.push(Point2D::new(corner.0 as f64, corner.1 as f64));

        if is_node[corner_id(corner)] || corner == from {
            break;
        }

        // Degree-2 corner: continue along the only other edge
        let Some(&next) = incident[corner_id(corner)]
            .iter()
            .find(|&&i| i != edge && !visited[i])
        else {
            break;
        };
        edge = next;
    }

    MacroEdge {
        points,
        left,
        right,
    }
}

/// Ramer-Douglas-Peucker simplification; both endpoints always survive.
fn simplify(points: &[Point2D], epsilon: f64) -> Vec<Point2D> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    mark_kept(points, 0, points.len() - 1, epsilon, &mut keep);

    points
        .iter()
        .zip(&keep)
        .filter_map(|(p, &k)| k.then_some(*p))
        .collect()
}

fn mark_kept(points: &[Point2D], start: usize, end: usize, epsilon: f64, keep: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let a = points[start];
    let b = points[end];
    let ab = b - a;
    let len = ab.norm();

    let mut max_dist = 0.0;
    let mut max_idx = start;
    for i in start + 1..end {
        let d = if len < 1e-12 {
            (points[i] - a).norm()
        } else {
            (ab.x * (points[i].y - a.y) - ab.y * (points[i].x - a.x)).abs() / len
        };
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > epsilon {
        keep[max_idx] = true;
        mark_kept(points, start, max_idx, epsilon, keep);
        mark_kept(points, max_idx, end, epsilon, keep);
    }
}

/// Chain directed pieces end-to-end into closed loops and return the one
/// with the largest enclosed area.
fn stitch_largest_loop(pieces: Vec<Vec<Point2D>>) -> Option<Vec<Point2D>> {
    let key = |p: &Point2D| (p.x.round() as i64, p.y.round() as i64);

    let mut by_start: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, piece) in pieces.iter().enumerate() {
        if let Some(first) = piece.first() {
            by_start.entry(key(first)).or_default().push(i);
        }
    }

    let mut used = vec![false; pieces.len()];
    let mut best: Option<(f64, Vec<Point2D>)> = None;

    for start in 0..pieces.len() {
        if used[start] || pieces[start].len() < 2 {
            continue;
        }
        used[start] = true;
        let mut loop_points = pieces[start].clone();

        while key(&loop_points[0]) != key(loop_points.last().unwrap_or(&loop_points[0])) {
            let tail = match loop_points.last() {
                Some(p) => key(p),
                None => break,
            };
            let next = by_start
                .get(&tail)
                .and_then(|c| c.iter().find(|&&i| !used[i]).copied());
            let Some(next) = next else {
                break; // Dangling chain; topology should prevent this
            };
            used[next] = true;
            loop_points.extend(pieces[next].iter().skip(1));
        }

        if loop_points.len() > 3 && key(&loop_points[0]) == key(&loop_points[loop_points.len() - 1])
        {
            loop_points.pop();
            let area = signed_area(&loop_points).abs();
            if best.as_ref().map_or(true, |(a, _)| area > *a) {
                best = Some((area, loop_points));
            }
        }
    }

    best.map(|(_, points)| points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_from_fn(w: usize, h: usize, f: impl Fn(usize, usize) -> u32) -> LabelGrid {
        let mut g = LabelGrid::new(w, h);
        for y in 0..h {
            for x in 0..w {
                g.set(y, x, f(x, y));
            }
        }
        g
    }

    fn has_point(outline: &RegionOutline, x: f64, y: f64) -> bool {
        outline
            .points
            .iter()
            .any(|p| (p.x - x).abs() < 1e-9 && (p.y - y).abs() < 1e-9)
    }

    /// Cyclic search for `run` (or its reverse) inside `points`
    fn contains_run(points: &[Point2D], run: &[Point2D]) -> bool {
        let n = points.len();
        let matches = |dir: &[Point2D]| {
            (0..n).any(|s| {
                dir.iter().enumerate().all(|(k, q)| {
                    let p = points[(s + k) % n];
                    (p - q).norm() < 1e-9
                })
            })
        };
        let reversed: Vec<Point2D> = run.iter().rev().copied().collect();
        matches(run) || matches(&reversed)
    }

    #[test]
    fn test_single_label_gives_image_rectangle() {
        let grid = grid_from_fn(8, 6, |_, _| 1);
        let outlines = BoundaryTracer::new(BoundaryConfig::default()).trace(&grid);

        assert_eq!(outlines.len(), 1);
        let o = &outlines[0];
        assert_eq!(o.label, 1);
        assert_eq!(o.points.len(), 4);
        for (x, y) in [(0.0, 0.0), (8.0, 0.0), (8.0, 6.0), (0.0, 6.0)] {
            assert!(has_point(o, x, y));
        }
        assert!((signed_area(&o.points).abs() - 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_bands_share_their_border() {
        let grid = grid_from_fn(100, 100, |_, y| if y < 50 { 1 } else { 2 });
        let outlines = BoundaryTracer::new(BoundaryConfig::default()).trace(&grid);

        assert_eq!(outlines.len(), 2);
        let top = &outlines[0];
        let bottom = &outlines[1];
        assert_eq!(top.label, 1);
        assert_eq!(bottom.label, 2);
        assert_eq!(top.points.len(), 4);
        assert_eq!(bottom.points.len(), 4);

        // The interior border belongs to both, identically
        for o in [top, bottom] {
            assert!(has_point(o, 0.0, 50.0));
            assert!(has_point(o, 100.0, 50.0));
        }
        assert!(top.points.iter().all(|p| p.y <= 50.0));
        assert!(bottom.points.iter().all(|p| p.y >= 50.0));

        // Shared points are exactly the two junction nodes
        let shared: Vec<_> = top
            .points
            .iter()
            .filter(|p| bottom.points.iter().any(|q| (*p - q).norm() < 1e-9))
            .collect();
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn test_staircase_border_is_coincident() {
        // Step boundary: label 1 reaches deeper on the right half
        let grid = grid_from_fn(20, 20, |x, y| {
            let depth = if x < 10 { 10 } else { 12 };
            if y < depth {
                1
            } else {
                2
            }
        });

        let config = BoundaryConfig {
            simplify_epsilon: 0.5,
        };
        let outlines = BoundaryTracer::new(config).trace(&grid);
        assert_eq!(outlines.len(), 2);

        let expected = vec![
            Point2D::new(0.0, 10.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(10.0, 12.0),
            Point2D::new(20.0, 12.0),
        ];
        for o in &outlines {
            assert!(
                contains_run(&o.points, &expected),
                "label {} misses the shared staircase: {:?}",
                o.label,
                o.points
            );
        }
    }

    #[test]
    fn test_enclosed_region_traced_as_loop() {
        // 3x3 island of label 2 inside label 1
        let grid = grid_from_fn(10, 10, |x, y| {
            if (3..6).contains(&x) && (3..6).contains(&y) {
                2
            } else {
                1
            }
        });

        let outlines = BoundaryTracer::new(BoundaryConfig {
            simplify_epsilon: 0.5,
        })
        .trace(&grid);
        assert_eq!(outlines.len(), 2);

        let island = &outlines[1];
        assert_eq!(island.label, 2);
        assert_eq!(island.points.len(), 4);
        for (x, y) in [(3.0, 3.0), (6.0, 3.0), (6.0, 6.0), (3.0, 6.0)] {
            assert!(has_point(island, x, y));
        }

        // The host region keeps its outer boundary (the larger loop)
        let host = &outlines[0];
        assert!((signed_area(&host.points).abs() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_four_label_cross_junction() {
        let grid = grid_from_fn(10, 10, |x, y| match (x < 5, y < 5) {
            (true, true) => 1,
            (false, true) => 2,
            (true, false) => 3,
            (false, false) => 4,
        });

        let outlines = BoundaryTracer::new(BoundaryConfig::default()).trace(&grid);
        assert_eq!(outlines.len(), 4);

        // Every quadrant polygon carries the central junction corner
        for o in &outlines {
            assert!(has_point(o, 5.0, 5.0), "label {}", o.label);
            assert_eq!(o.points.len(), 4);
            assert!((signed_area(&o.points).abs() - 25.0).abs() < 1e-9);
        }
    }
}
