//! Streaming triangle clipper.
//!
//! Routes every input triangle to exactly one `(row, col)` tile, splitting
//! triangles that straddle a cut. Resident memory is independent of the
//! triangle count: tiles are open output streams plus a counter, and the
//! only growing state is the per-cut segment bags consumed by cap synthesis.

pub mod caps;
pub mod slicing_line;
pub mod split;

pub use caps::CutSegment;
pub use slicing_line::SlicingLine;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::geometry::Triangle;
use crate::seam::{Axis, CutId, CutPath};
use crate::stl::{StlReader, TileStream};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use split::{split_triangle, tessellate};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek, Write};

/// Triangles below this area are dropped as degenerate
const DEGENERATE_AREA: f64 = 1e-12;

const TILE_HEADER: &str = "hueslicer tile";

/// Tile coordinates: row 0 is the top of the model (maximum Y), column 0
/// the left edge (minimum X).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId {
    pub row: usize,
    pub col: usize,
}

/// Configuration for the streaming clipper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipperConfig {
    /// Triangles with a longer edge are tessellated before routing (mm)
    pub split_edge_threshold: f64,

    /// Maximum mid-edge subdivision depth
    pub max_split_depth: u32,

    /// Half-width of the "on the line" band for vertex classification (mm)
    pub side_epsilon: f64,

    /// Walk-axis margin when restricting a cut path to one triangle (mm)
    pub fit_margin: f64,

    /// Vertex snapping quantum for cap loop reconstruction (mm)
    pub snap_quantum: f64,
}

impl Default for ClipperConfig {
    fn default() -> Self {
        Self {
            split_edge_threshold: 5.0,
            max_split_depth: 3,
            side_epsilon: 1e-6,
            fit_margin: 1.0,
            snap_quantum: 0.01,
        }
    }
}

/// Counters accumulated over one clipping run
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ClipperStats {
    pub triangles_in: u64,
    pub triangles_out: u64,
    pub cap_triangles: u64,
    pub dropped: u64,
}

/// A finished tile: the underlying stream and its final triangle count
#[derive(Debug)]
pub struct TileOutput<W> {
    pub id: TileId,
    pub stream: W,
    pub triangles: u32,
}

/// Single-pass mesh splitter.
///
/// `open_tile` supplies the output stream for a tile the first time a
/// triangle lands in it; naming and placement stay with the caller.
pub struct StreamingClipper<W, F>
where
    W: Write + Seek,
    F: FnMut(TileId) -> Result<W>,
{
    config: ClipperConfig,
    vertical: Vec<CutPath>,
    horizontal: Vec<CutPath>,
    open_tile: F,
    tiles: BTreeMap<TileId, TileStream<W>>,
    segments: HashMap<CutId, Vec<CutSegment>>,
    stats: ClipperStats,
}

impl<W, F> StreamingClipper<W, F>
where
    W: Write + Seek,
    F: FnMut(TileId) -> Result<W>,
{
    /// Both families must be sorted by mean scan coordinate, strictly
    /// increasing, and carry the axis they claim.
    pub fn new(
        config: ClipperConfig,
        vertical: Vec<CutPath>,
        horizontal: Vec<CutPath>,
        open_tile: F,
    ) -> Result<Self> {
        validate_family(&vertical, Axis::Vertical)?;
        validate_family(&horizontal, Axis::Horizontal)?;
        Ok(Self {
            config,
            vertical,
            horizontal,
            open_tile,
            tiles: BTreeMap::new(),
            segments: HashMap::new(),
            stats: ClipperStats::default(),
        })
    }

    pub fn stats(&self) -> ClipperStats {
        self.stats
    }

    /// Segments collected so far, per cut (mainly for inspection)
    pub fn segment_counts(&self) -> Vec<(CutId, usize)> {
        let mut counts: Vec<_> = self
            .segments
            .iter()
            .map(|(id, bag)| (*id, bag.len()))
            .collect();
        counts.sort();
        counts
    }

    /// Drain the input stream, routing every record. Degenerate records are
    /// dropped with a diagnostic; read and write failures are fatal.
    pub fn clip<R: Read>(&mut self, reader: StlReader<R>, diags: &mut Diagnostics) -> Result<()> {
        log::info!(
            "Clipping {} triangles against {} vertical / {} horizontal cut(s)",
            reader.triangle_count(),
            self.vertical.len(),
            self.horizontal.len()
        );

        let mut pieces = Vec::new();
        for tri in reader {
            let tri = tri?;
            self.stats.triangles_in += 1;

            if !tri.is_finite() {
                self.stats.dropped += 1;
                diags.push(Diagnostic::new(
                    DiagnosticKind::MalformedRecord,
                    format!(
                        "record {} has non-finite coordinates",
                        self.stats.triangles_in
                    ),
                ));
                continue;
            }
            if tri.area() < DEGENERATE_AREA {
                self.stats.dropped += 1;
                diags.push(Diagnostic::new(
                    DiagnosticKind::DroppedDegenerate,
                    format!("record {} has zero area", self.stats.triangles_in),
                ));
                continue;
            }

            pieces.clear();
            tessellate(
                &tri,
                self.config.split_edge_threshold,
                self.config.max_split_depth,
                &mut pieces,
            );
            for i in 0..pieces.len() {
                self.route(pieces[i])?;
            }
        }
        Ok(())
    }

    /// Vertical slicing picks the column, horizontal slicing the row.
    fn route(&mut self, tri: Triangle) -> Result<()> {
        let mut columns = Vec::new();
        slice_family(
            &self.vertical,
            Axis::Vertical,
            &self.config,
            tri,
            Some(&mut self.segments),
            &mut columns,
        );

        let mut rows = Vec::new();
        for (col, piece) in columns {
            rows.clear();
            slice_family(
                &self.horizontal,
                Axis::Horizontal,
                &self.config,
                piece,
                Some(&mut self.segments),
                &mut rows,
            );
            for &(row, frag) in rows.iter() {
                self.emit(TileId { row, col }, &frag)?;
            }
        }
        Ok(())
    }

    fn emit(&mut self, id: TileId, tri: &Triangle) -> Result<()> {
        self.stats.triangles_out += 1;
        if let Some(stream) = self.tiles.get_mut(&id) {
            stream.push(tri)?;
            return Ok(());
        }
        let mut stream = TileStream::create((self.open_tile)(id)?, TILE_HEADER)?;
        stream.push(tri)?;
        self.tiles.insert(id, stream);
        Ok(())
    }

    /// Reconstruct cap surfaces from the collected segment bags and write
    /// them to both neighbors of each cut. Call after the input is drained.
    pub fn seal(&mut self, diags: &mut Diagnostics) -> Result<()> {
        let segments = std::mem::take(&mut self.segments);
        let mut ids: Vec<CutId> = segments.keys().copied().collect();
        ids.sort();

        for id in ids {
            let bag = &segments[&id];
            log::info!("Sealing cut {:?} from {} segment(s)", id, bag.len());
            let cap_triangles = caps::build_caps(bag, self.config.snap_quantum, id, diags);
            for cap in cap_triangles {
                self.emit_cap(id, cap)?;
            }
        }
        Ok(())
    }

    /// Write one cap triangle to both sides of its cut, re-clipped through
    /// the orthogonal family so pieces land in the correct tiles. The
    /// low-coordinate copy is oriented with its normal toward the high side
    /// (outward for that tile); the high-side copy is the reverse.
    fn emit_cap(&mut self, cut: CutId, tri: Triangle) -> Result<()> {
        if tri.area() < DEGENERATE_AREA {
            return Ok(());
        }

        let n = tri.normal();
        let component = match cut.axis {
            Axis::Vertical => n.x,
            Axis::Horizontal => n.y,
        };
        let low_copy = if component >= 0.0 { tri } else { tri.reversed() };

        let mut fragments = Vec::new();
        let (family, family_axis) = match cut.axis {
            Axis::Vertical => (&self.horizontal, Axis::Horizontal),
            Axis::Horizontal => (&self.vertical, Axis::Vertical),
        };
        slice_family(
            family,
            family_axis,
            &self.config,
            low_copy,
            None,
            &mut fragments,
        );

        for (k, frag) in fragments {
            let (low_tile, high_tile) = match cut.axis {
                Axis::Vertical => (
                    TileId {
                        row: k,
                        col: cut.index,
                    },
                    TileId {
                        row: k,
                        col: cut.index + 1,
                    },
                ),
                // Tile rows count downward, so the low-Y side is row + 1
                Axis::Horizontal => (
                    TileId {
                        row: cut.index + 1,
                        col: k,
                    },
                    TileId {
                        row: cut.index,
                        col: k,
                    },
                ),
            };
            self.emit(low_tile, &frag)?;
            self.emit(high_tile, &frag.reversed())?;
            self.stats.cap_triangles += 2;
        }
        Ok(())
    }

    /// Finalize every tile stream (flush and rewrite the count field) and
    /// hand the streams back.
    pub fn finish(self) -> Result<(Vec<TileOutput<W>>, ClipperStats)> {
        let mut outputs = Vec::new();
        for (id, stream) in self.tiles {
            let (inner, triangles) = stream.finish()?;
            log::info!("Tile ({}, {}): {} triangles", id.row, id.col, triangles);
            outputs.push(TileOutput {
                id,
                stream: inner,
                triangles,
            });
        }
        Ok((outputs, self.stats))
    }
}

fn validate_family(cuts: &[CutPath], axis: Axis) -> Result<()> {
    for (i, path) in cuts.iter().enumerate() {
        if path.axis != axis {
            return Err(Error::InvalidArgument(format!(
                "cut {i} of the {axis:?} family has axis {:?}",
                path.axis
            )));
        }
        if path.points.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "cut {i} of the {axis:?} family is empty"
            )));
        }
        // Monotone walk order is what makes the lo/hi rejection sound
        let monotone = path.points.windows(2).all(|w| match axis {
            Axis::Vertical => w[1].y < w[0].y,
            Axis::Horizontal => w[1].x > w[0].x,
        });
        if !monotone {
            return Err(Error::InvalidArgument(format!(
                "cut {i} of the {axis:?} family is not monotone along its walk axis"
            )));
        }
        if i > 0 && cuts[i - 1].mean_scan() >= path.mean_scan() {
            return Err(Error::InvalidArgument(format!(
                "{axis:?} cuts are not sorted: cut {i} does not advance past cut {}",
                i - 1
            )));
        }
    }
    Ok(())
}

/// Route one triangle through a sorted cut family. Pieces that stay on the
/// low-index side of cut `i` are finished at index `i`; pieces beyond it
/// continue with `i + 1`. The per-path `lo`/`hi` bounds give O(1) rejection
/// for the common non-straddling case.
fn slice_family(
    cuts: &[CutPath],
    axis: Axis,
    config: &ClipperConfig,
    tri: Triangle,
    mut segments: Option<&mut HashMap<CutId, Vec<CutSegment>>>,
    out: &mut Vec<(usize, Triangle)>,
) {
    let mut stack = vec![(tri, 0usize)];
    while let Some((t, start)) = stack.pop() {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for v in t.vertices() {
            let s = axis.scan_coord(&v);
            lo = lo.min(s);
            hi = hi.max(s);
        }

        let mut i = start;
        while i < cuts.len() && lo >= cuts[i].hi {
            i += 1;
        }
        if i == cuts.len() || hi <= cuts[i].lo {
            out.push((i, t));
            continue;
        }

        let line = SlicingLine::fit(&cuts[i], &t, config.fit_margin);
        let outcome = split_triangle(&t, &line, config.side_epsilon);

        if let (Some(map), Some((a, b))) = (segments.as_deref_mut(), outcome.boundary) {
            map.entry(CutId { axis, index: i })
                .or_default()
                .push(CutSegment { a, b });
        }

        for piece in outcome.left {
            out.push((i, piece));
        }
        for piece in outcome.right {
            stack.push((piece, i + 1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point2D, Point3D};
    use crate::stl::StlReader;
    use std::io::Cursor;

    type MemClipper = StreamingClipper<Cursor<Vec<u8>>, fn(TileId) -> Result<Cursor<Vec<u8>>>>;

    fn mem_clipper(
        config: ClipperConfig,
        vertical: Vec<CutPath>,
        horizontal: Vec<CutPath>,
    ) -> MemClipper {
        let opener: fn(TileId) -> Result<Cursor<Vec<u8>>> = |_| Ok(Cursor::new(Vec::new()));
        StreamingClipper::new(config, vertical, horizontal, opener).unwrap()
    }

    fn encode(triangles: &[Triangle]) -> StlReader<Cursor<Vec<u8>>> {
        let mut stream = TileStream::create(Cursor::new(Vec::new()), "clip test").unwrap();
        for t in triangles {
            stream.push(t).unwrap();
        }
        let (cursor, _) = stream.finish().unwrap();
        StlReader::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    fn decode(output: &TileOutput<Cursor<Vec<u8>>>) -> Vec<Triangle> {
        let bytes = output.stream.clone().into_inner();
        StlReader::new(Cursor::new(bytes))
            .unwrap()
            .map(|t| t.unwrap())
            .collect()
    }

    fn straight_vertical_cut(x: f64, y_top: f64, y_bottom: f64) -> CutPath {
        CutPath::new(
            Axis::Vertical,
            vec![Point2D::new(x, y_top), Point2D::new(x, y_bottom)],
        )
    }

    fn straight_horizontal_cut(y: f64, x_left: f64, x_right: f64) -> CutPath {
        CutPath::new(
            Axis::Horizontal,
            vec![Point2D::new(x_left, y), Point2D::new(x_right, y)],
        )
    }

    /// Axis-aligned cube as 12 outward-wound triangles
    fn cube(center: [f64; 3], size: f64) -> Vec<Triangle> {
        let h = size / 2.0;
        let p = |sx: f64, sy: f64, sz: f64| {
            Point3D::new(center[0] + sx * h, center[1] + sy * h, center[2] + sz * h)
        };
        let quad = |a: Point3D, b: Point3D, c: Point3D, d: Point3D| {
            [Triangle::new(a, b, c), Triangle::new(a, c, d)]
        };

        let mut tris = Vec::new();
        // -X, +X, -Y, +Y, -Z, +Z
        tris.extend(quad(
            p(-1.0, -1.0, -1.0),
            p(-1.0, -1.0, 1.0),
            p(-1.0, 1.0, 1.0),
            p(-1.0, 1.0, -1.0),
        ));
        tris.extend(quad(
            p(1.0, -1.0, -1.0),
            p(1.0, 1.0, -1.0),
            p(1.0, 1.0, 1.0),
            p(1.0, -1.0, 1.0),
        ));
        tris.extend(quad(
            p(-1.0, -1.0, -1.0),
            p(1.0, -1.0, -1.0),
            p(1.0, -1.0, 1.0),
            p(-1.0, -1.0, 1.0),
        ));
        tris.extend(quad(
            p(-1.0, 1.0, -1.0),
            p(-1.0, 1.0, 1.0),
            p(1.0, 1.0, 1.0),
            p(1.0, 1.0, -1.0),
        ));
        tris.extend(quad(
            p(-1.0, -1.0, -1.0),
            p(-1.0, 1.0, -1.0),
            p(1.0, 1.0, -1.0),
            p(1.0, -1.0, -1.0),
        ));
        tris.extend(quad(
            p(-1.0, -1.0, 1.0),
            p(1.0, -1.0, 1.0),
            p(1.0, 1.0, 1.0),
            p(-1.0, 1.0, 1.0),
        ));
        tris
    }

    fn signed_volume(tris: &[Triangle]) -> f64 {
        tris.iter()
            .map(|t| t.v0.coords.dot(&t.v1.coords.cross(&t.v2.coords)) / 6.0)
            .sum()
    }

    /// UV sphere with outward winding
    fn uv_sphere(center: [f64; 3], radius: f64, stacks: usize, slices: usize) -> Vec<Triangle> {
        use std::f64::consts::PI;
        let p = |i: usize, j: usize| {
            let th = PI * i as f64 / stacks as f64;
            let ph = 2.0 * PI * j as f64 / slices as f64;
            Point3D::new(
                center[0] + radius * th.sin() * ph.cos(),
                center[1] + radius * th.sin() * ph.sin(),
                center[2] + radius * th.cos(),
            )
        };

        let mut tris = Vec::new();
        for i in 0..stacks {
            for j in 0..slices {
                let a = p(i, j);
                let b = p(i + 1, j);
                let c = p(i + 1, j + 1);
                let d = p(i, j + 1);
                if i + 1 < stacks {
                    tris.push(Triangle::new(a, b, c));
                }
                if i > 0 {
                    tris.push(Triangle::new(a, c, d));
                }
            }
        }
        tris
    }

    #[test]
    fn test_single_cut_splits_cube() {
        let input = cube([5.0, 5.0, 5.0], 10.0);
        let mut clipper = mem_clipper(
            ClipperConfig::default(),
            vec![straight_vertical_cut(5.0, 10.0, 0.0)],
            vec![],
        );

        let mut diags = Diagnostics::new();
        clipper.clip(encode(&input), &mut diags).unwrap();
        clipper.seal(&mut diags).unwrap();
        let (outputs, _) = clipper.finish().unwrap();

        assert_eq!(outputs.len(), 2);
        let left = &outputs[0];
        let right = &outputs[1];
        assert_eq!(left.id, TileId { row: 0, col: 0 });
        assert_eq!(right.id, TileId { row: 0, col: 1 });

        assert!(left.triangles > 0);
        assert!(right.triangles > 0);
        assert!(left.triangles + right.triangles >= 12);

        for tri in decode(left) {
            for v in tri.vertices() {
                assert!(v.x <= 5.0 + 1e-5);
            }
        }
        for tri in decode(right) {
            for v in tri.vertices() {
                assert!(v.x >= 5.0 - 1e-5);
            }
        }
    }

    #[test]
    fn test_projected_area_conserved_before_caps() {
        let input = cube([5.0, 5.0, 5.0], 10.0);
        let area_in: f64 = input.iter().map(|t| t.xy_area()).sum();

        let mut clipper = mem_clipper(
            ClipperConfig::default(),
            vec![straight_vertical_cut(3.0, 10.0, 0.0)],
            vec![straight_horizontal_cut(6.5, 0.0, 10.0)],
        );

        let mut diags = Diagnostics::new();
        clipper.clip(encode(&input), &mut diags).unwrap();
        // No seal: caps would add area
        let (outputs, stats) = clipper.finish().unwrap();

        let area_out: f64 = outputs
            .iter()
            .flat_map(|o| decode(o))
            .map(|t| t.xy_area())
            .sum();
        assert!((area_out - area_in).abs() <= 1e-4 * area_in);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_no_cuts_routes_everything_to_one_tile() {
        let input = cube([0.0, 0.0, 0.0], 4.0);
        let config = ClipperConfig {
            split_edge_threshold: 1000.0, // no tessellation
            ..ClipperConfig::default()
        };
        let mut clipper = mem_clipper(config, vec![], vec![]);

        let mut diags = Diagnostics::new();
        clipper.clip(encode(&input), &mut diags).unwrap();
        let (outputs, stats) = clipper.finish().unwrap();

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].id, TileId { row: 0, col: 0 });
        assert_eq!(outputs[0].triangles, 12);
        assert_eq!(stats.triangles_in, 12);
        assert_eq!(stats.triangles_out, 12);
    }

    #[test]
    fn test_degenerate_records_dropped_with_diagnostics() {
        let mut input = cube([0.0, 0.0, 0.0], 4.0);
        let p = Point3D::new(1.0, 1.0, 1.0);
        input.push(Triangle::new(p, p, p)); // zero area
        input.push(Triangle::new(
            Point3D::new(f64::NAN, 0.0, 0.0),
            Point3D::new(1.0, 0.0, 0.0),
            Point3D::new(0.0, 1.0, 0.0),
        ));

        let mut clipper = mem_clipper(ClipperConfig::default(), vec![], vec![]);
        let mut diags = Diagnostics::new();
        clipper.clip(encode(&input), &mut diags).unwrap();

        assert_eq!(clipper.stats().dropped, 2);
        assert_eq!(diags.count_of(DiagnosticKind::DroppedDegenerate), 1);
        assert_eq!(diags.count_of(DiagnosticKind::MalformedRecord), 1);
    }

    #[test]
    fn test_cut_segments_collected_per_cut() {
        let input = cube([5.0, 5.0, 5.0], 10.0);
        // 4.8 is not a tessellation lattice point, so triangles straddle it
        let mut clipper = mem_clipper(
            ClipperConfig::default(),
            vec![straight_vertical_cut(4.8, 10.0, 0.0)],
            vec![],
        );

        let mut diags = Diagnostics::new();
        clipper.clip(encode(&input), &mut diags).unwrap();

        let counts = clipper.segment_counts();
        assert_eq!(counts.len(), 1);
        assert_eq!(
            counts[0].0,
            CutId {
                axis: Axis::Vertical,
                index: 0
            }
        );
        assert!(counts[0].1 > 0);
    }

    #[test]
    fn test_non_monotone_cut_rejected() {
        let zigzag = CutPath::new(
            Axis::Vertical,
            vec![
                Point2D::new(5.0, 10.0),
                Point2D::new(5.5, 4.0),
                Point2D::new(5.0, 7.0),
            ],
        );
        let err = StreamingClipper::new(
            ClipperConfig::default(),
            vec![zigzag],
            vec![],
            |_: TileId| Ok(Cursor::new(Vec::new())),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_unsorted_cuts_rejected() {
        let err = StreamingClipper::new(
            ClipperConfig::default(),
            vec![
                straight_vertical_cut(7.0, 10.0, 0.0),
                straight_vertical_cut(3.0, 10.0, 0.0),
            ],
            vec![],
            |_: TileId| Ok(Cursor::new(Vec::new())),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_sphere_volume_preserved_through_caps() {
        let input = uv_sphere([15.0, 15.0, 15.0], 10.0, 12, 26);
        let volume_in = signed_volume(&input);
        assert!(volume_in > 0.0);

        let mut clipper = mem_clipper(
            ClipperConfig::default(),
            vec![straight_vertical_cut(15.0, 30.0, 0.0)],
            vec![],
        );

        let mut diags = Diagnostics::new();
        clipper.clip(encode(&input), &mut diags).unwrap();
        clipper.seal(&mut diags).unwrap();
        assert_eq!(diags.count_of(DiagnosticKind::OpenLoop), 0);

        let (outputs, stats) = clipper.finish().unwrap();
        assert_eq!(outputs.len(), 2);
        assert!(stats.cap_triangles > 0);

        let volume_out: f64 = outputs.iter().map(|o| signed_volume(&decode(o))).sum();
        assert!(
            (volume_out - volume_in).abs() <= 0.005 * volume_in,
            "volume in {volume_in}, out {volume_out}"
        );
    }

    #[test]
    fn test_cap_copies_paired_with_opposite_orientation() {
        let input = uv_sphere([15.0, 15.0, 15.0], 10.0, 12, 26);
        let mut clipper = mem_clipper(
            ClipperConfig::default(),
            vec![straight_vertical_cut(15.0, 30.0, 0.0)],
            vec![],
        );

        let mut diags = Diagnostics::new();
        clipper.clip(encode(&input), &mut diags).unwrap();
        clipper.seal(&mut diags).unwrap();
        let (outputs, _) = clipper.finish().unwrap();

        // Caps are the triangles lying in the cut plane
        let caps_of = |o: &TileOutput<Cursor<Vec<u8>>>| -> Vec<Triangle> {
            decode(o)
                .into_iter()
                .filter(|t| t.vertices().iter().all(|v| (v.x - 15.0).abs() < 1e-4))
                .collect()
        };

        let left_caps = caps_of(&outputs[0]);
        let right_caps = caps_of(&outputs[1]);
        assert!(!left_caps.is_empty());
        assert_eq!(left_caps.len(), right_caps.len());

        // Outward orientation: low tile faces +X, high tile -X
        for t in &left_caps {
            assert!(t.normal().x > 0.0);
        }
        for t in &right_caps {
            assert!(t.normal().x < 0.0);
        }
    }
}
