//! End-to-end orchestration of the two pipeline branches.
//!
//! `split_mesh` runs heightmap -> seams -> streaming clipper -> caps and
//! writes one STL per tile. `layout_mesh` runs heightmap -> watershed ->
//! boundary tracing and returns 2D tile polygons in world millimeters.
//! Stages own their data exclusively and hand it forward by move.

use crate::boundary::{BoundaryConfig, BoundaryTracer};
use crate::clipper::{ClipperConfig, ClipperStats, StreamingClipper, TileId};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::geometry::{signed_area, Point2D};
use crate::heightmap::{GridMask, HeightmapBuilder, HeightmapConfig};
use crate::seam::{Axis, CutId, CutPath, SeamConfig, SeamFinder};
use crate::stl::{MeshBounds, StlReader};
use crate::watershed::{seed_lattice, WatershedConfig, WatershedSegmenter};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Aggregated configuration for both pipeline branches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Printable bed width (mm); tiles never exceed it along X
    pub bed_width: f64,

    /// Printable bed depth (mm); tiles never exceed it along Y
    pub bed_height: f64,

    pub heightmap: HeightmapConfig,
    pub seam: SeamConfig,
    pub clipper: ClipperConfig,
    pub watershed: WatershedConfig,
    pub boundary: BoundaryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bed_width: 200.0,
            bed_height: 200.0,
            heightmap: HeightmapConfig::default(),
            seam: SeamConfig::default(),
            clipper: ClipperConfig::default(),
            watershed: WatershedConfig::default(),
            boundary: BoundaryConfig::default(),
        }
    }
}

/// One written tile
#[derive(Debug, Clone)]
pub struct TileSummary {
    pub id: TileId,
    pub path: PathBuf,
    pub triangles: u32,
}

/// Outcome of the mesh-splitting branch
#[derive(Debug)]
pub struct SplitReport {
    pub tiles: Vec<TileSummary>,
    pub rows: usize,
    pub cols: usize,
    pub grid_width: usize,
    pub grid_height: usize,
    pub bounds: MeshBounds,
    pub stats: ClipperStats,
    pub diagnostics: Vec<Diagnostic>,
}

/// One tile polygon of the 2D layout branch, counter-clockwise in mm
#[derive(Debug, Clone)]
pub struct TileOutline {
    pub label: u32,
    pub points: Vec<Point2D>,
}

/// Outcome of the 2D layout branch
#[derive(Debug)]
pub struct LayoutReport {
    pub outlines: Vec<TileOutline>,
    pub rows: usize,
    pub cols: usize,
    pub grid_width: usize,
    pub grid_height: usize,
    pub bounds: MeshBounds,
    pub diagnostics: Vec<Diagnostic>,
}

/// Split a mesh into per-tile STL files under `out_dir`.
///
/// Guide masks restrict where each seam may run; the two lists are indexed
/// by cut (vertical cut `k` separates tile columns `k` and `k+1`). Partial
/// tile files are removed before a fatal error propagates.
pub fn split_mesh<R: Read + Seek>(
    input: R,
    out_dir: &Path,
    config: &PipelineConfig,
    vertical_masks: &[Option<GridMask>],
    horizontal_masks: &[Option<GridMask>],
) -> Result<SplitReport> {
    let created: Rc<RefCell<Vec<PathBuf>>> = Rc::new(RefCell::new(Vec::new()));
    let result = split_mesh_inner(
        input,
        out_dir,
        config,
        vertical_masks,
        horizontal_masks,
        created.clone(),
    );
    if result.is_err() {
        for path in created.borrow().iter() {
            let _ = fs::remove_file(path);
        }
    }
    result
}

fn tile_path(out_dir: &Path, id: TileId) -> PathBuf {
    out_dir.join(format!("tile_r{}_c{}.stl", id.row, id.col))
}

fn split_mesh_inner<R: Read + Seek>(
    mut input: R,
    out_dir: &Path,
    config: &PipelineConfig,
    vertical_masks: &[Option<GridMask>],
    horizontal_masks: &[Option<GridMask>],
    created: Rc<RefCell<Vec<PathBuf>>>,
) -> Result<SplitReport> {
    let mut diags = Diagnostics::new();
    let r = config.heightmap.resolution;

    log::info!("Step 1/4: Extracting heightmap...");
    let builder = HeightmapBuilder::new(config.heightmap.clone());
    let (grid, bounds) = builder.build(&mut input)?;

    let cols = ((bounds.width() / config.bed_width).ceil() as usize).max(1);
    let rows = ((bounds.height() / config.bed_height).ceil() as usize).max(1);
    log::info!(
        "Step 2/4: Finding seams for a {}x{} tile layout...",
        rows,
        cols
    );

    let mut vertical_cuts = Vec::with_capacity(cols.saturating_sub(1));
    {
        let finder = SeamFinder::vertical(&grid);
        let tile_span = grid.width() as f64 / cols as f64;
        let band = (tile_span * config.seam.band_fraction / 2.0) as usize;
        for k in 1..cols {
            let nominal = (k as f64 * tile_span) as usize;
            let start = nominal.saturating_sub(band);
            let end = (nominal + band).min(grid.width() - 1);
            let cut = CutId {
                axis: Axis::Vertical,
                index: k - 1,
            };
            let mask = vertical_masks.get(k - 1).and_then(|m| m.as_ref());
            let seam = finder.find(start, end, mask, Some(cut), &mut diags)?;
            vertical_cuts.push(CutPath::from_seam(&seam, Axis::Vertical, &bounds, r));
        }
    }

    let mut horizontal_cuts = Vec::with_capacity(rows.saturating_sub(1));
    {
        let finder = SeamFinder::horizontal(&grid);
        let tile_span = grid.height() as f64 / rows as f64;
        let band = (tile_span * config.seam.band_fraction / 2.0) as usize;
        for k in 1..rows {
            let nominal = (k as f64 * tile_span) as usize;
            let start = nominal.saturating_sub(band);
            let end = (nominal + band).min(grid.height() - 1);
            let cut = CutId {
                axis: Axis::Horizontal,
                index: k - 1,
            };
            let mask = horizontal_masks.get(k - 1).and_then(|m| m.as_ref());
            let seam = finder.find(start, end, mask, Some(cut), &mut diags)?;
            horizontal_cuts.push(CutPath::from_seam(&seam, Axis::Horizontal, &bounds, r));
        }
    }

    log::info!("Step 3/4: Clipping the mesh into tiles...");
    let out_dir_owned = out_dir.to_path_buf();
    let created_by_clipper = created.clone();
    let open_tile = move |id: TileId| -> Result<File> {
        let path = tile_path(&out_dir_owned, id);
        let file = File::create(&path)?;
        created_by_clipper.borrow_mut().push(path);
        Ok(file)
    };

    let mut clipper = StreamingClipper::new(
        config.clipper.clone(),
        vertical_cuts,
        horizontal_cuts,
        open_tile,
    )?;

    input.seek(SeekFrom::Start(0))?;
    clipper.clip(StlReader::new(&mut input)?, &mut diags)?;

    log::info!("Step 4/4: Sealing cut surfaces...");
    clipper.seal(&mut diags)?;
    let (outputs, stats) = clipper.finish()?;

    let tiles = outputs
        .iter()
        .map(|o| TileSummary {
            id: o.id,
            path: tile_path(out_dir, o.id),
            triangles: o.triangles,
        })
        .collect();

    log::info!(
        "Split complete: {} tile(s), {} triangles out, {} dropped",
        outputs.len(),
        stats.triangles_out,
        stats.dropped
    );

    Ok(SplitReport {
        tiles,
        rows,
        cols,
        grid_width: grid.width(),
        grid_height: grid.height(),
        bounds,
        stats,
        diagnostics: diags.into_records(),
    })
}

/// Compute the 2D tile layout without touching the mesh geometry: watershed
/// regions on the heightmap, traced into closed polygons.
pub fn layout_mesh<R: Read + Seek>(
    input: R,
    config: &PipelineConfig,
    barriers: Option<&GridMask>,
) -> Result<LayoutReport> {
    let diags = Diagnostics::new();
    let r = config.heightmap.resolution;

    log::info!("Step 1/3: Extracting heightmap...");
    let builder = HeightmapBuilder::new(config.heightmap.clone());
    let (grid, bounds) = builder.build(input)?;

    let cols = ((bounds.width() / config.bed_width).ceil() as usize).max(1);
    let rows = ((bounds.height() / config.bed_height).ceil() as usize).max(1);

    log::info!("Step 2/3: Watershed segmentation into {}x{} regions...", rows, cols);
    let seeds = seed_lattice(grid.width(), grid.height(), cols, rows);
    let labels = WatershedSegmenter::new(config.watershed.clone()).segment(
        &grid,
        barriers,
        &seeds,
    )?;

    log::info!("Step 3/3: Tracing region boundaries...");
    let traced = BoundaryTracer::new(config.boundary.clone()).trace(&labels);

    let outlines = traced
        .into_iter()
        .map(|o| {
            let mut points: Vec<Point2D> = o
                .points
                .iter()
                .map(|p| Point2D::new(bounds.min.x + p.x * r, bounds.max.y - p.y * r))
                .collect();
            // Corner coordinates flip handedness going to world Y-up
            if signed_area(&points) < 0.0 {
                points.reverse();
            }
            TileOutline {
                label: o.label,
                points,
            }
        })
        .collect();

    log::info!("Layout complete");
    Ok(LayoutReport {
        outlines,
        rows,
        cols,
        grid_width: grid.width(),
        grid_height: grid.height(),
        bounds,
        diagnostics: diags.into_records(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point3D, Triangle};
    use crate::stl::TileStream;
    use std::io::Cursor;

    fn encode(triangles: &[Triangle]) -> Cursor<Vec<u8>> {
        let mut stream = TileStream::create(Cursor::new(Vec::new()), "pipeline test").unwrap();
        for t in triangles {
            stream.push(t).unwrap();
        }
        let (cursor, _) = stream.finish().unwrap();
        Cursor::new(cursor.into_inner())
    }

    /// Relief slab: a 20x20 mm base plate with a raised ridge along x=10
    fn relief_slab() -> Vec<Triangle> {
        let mut tris = Vec::new();
        let mut quad = |a: Point3D, b: Point3D, c: Point3D, d: Point3D| {
            tris.push(Triangle::new(a, b, c));
            tris.push(Triangle::new(a, c, d));
        };

        let p = Point3D::new;
        // Base at z=1, with a strip lifted to z=6 between x=9 and x=11
        quad(p(0.0, 0.0, 1.0), p(9.0, 0.0, 1.0), p(9.0, 20.0, 1.0), p(0.0, 20.0, 1.0));
        quad(p(9.0, 0.0, 6.0), p(11.0, 0.0, 6.0), p(11.0, 20.0, 6.0), p(9.0, 20.0, 6.0));
        quad(p(11.0, 0.0, 1.0), p(20.0, 0.0, 1.0), p(20.0, 20.0, 1.0), p(11.0, 20.0, 1.0));
        tris
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hueslicer_{}_{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_split_writes_one_file_per_tile() {
        let dir = temp_dir("split");
        let config = PipelineConfig {
            bed_width: 12.0,
            bed_height: 30.0,
            heightmap: HeightmapConfig { resolution: 1.0 },
            ..PipelineConfig::default()
        };

        let report = split_mesh(encode(&relief_slab()), &dir, &config, &[], &[]).unwrap();

        assert_eq!(report.cols, 2);
        assert_eq!(report.rows, 1);
        assert_eq!(report.grid_width, 20);
        assert_eq!(report.grid_height, 20);
        assert!(!report.tiles.is_empty());

        let mut total = 0u64;
        for tile in &report.tiles {
            assert!(tile.path.exists(), "missing {:?}", tile.path);
            let reader = StlReader::new(File::open(&tile.path).unwrap()).unwrap();
            assert_eq!(reader.triangle_count(), tile.triangles);
            total += tile.triangles as u64;
        }
        assert_eq!(total, report.stats.triangles_out);
        assert!(report.stats.triangles_in >= 6);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_split_seam_avoids_masked_cut_region() {
        let dir = temp_dir("masked");
        let config = PipelineConfig {
            bed_width: 12.0,
            bed_height: 30.0,
            heightmap: HeightmapConfig { resolution: 1.0 },
            ..PipelineConfig::default()
        };

        // Allow the seam only in the leftmost column of its search band
        // (the band around the nominal cut spans columns 8..=12 here)
        let mut mask = GridMask::filled(20, 20, false);
        for y in 0..20 {
            mask.set(y, 8, true);
        }

        let report = split_mesh(
            encode(&relief_slab()),
            &dir,
            &config,
            &[Some(mask)],
            &[],
        )
        .unwrap();

        // The seam is pinned to column 8, so the cut runs at x = 8.5 and no
        // vertex of the left tile may land beyond it
        let left = report
            .tiles
            .iter()
            .find(|t| t.id == TileId { row: 0, col: 0 })
            .unwrap();
        let tris: Vec<Triangle> = StlReader::new(File::open(&left.path).unwrap())
            .unwrap()
            .map(|t| t.unwrap())
            .collect();
        assert!(!tris.is_empty());
        for t in &tris {
            for v in t.vertices() {
                assert!(v.x <= 8.5 + 1e-5);
            }
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_split_truncated_container_fails_clean() {
        let dir = temp_dir("truncated");
        let mut bytes = encode(&relief_slab()).into_inner();
        bytes.truncate(bytes.len() - 30);

        let err = split_mesh(
            Cursor::new(bytes),
            &dir,
            &PipelineConfig::default(),
            &[],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::Format(_)));

        // Nothing half-written left behind
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_layout_produces_ccw_world_polygons() {
        let config = PipelineConfig {
            bed_width: 12.0,
            bed_height: 30.0,
            heightmap: HeightmapConfig { resolution: 1.0 },
            ..PipelineConfig::default()
        };

        let report = layout_mesh(encode(&relief_slab()), &config, None).unwrap();

        assert_eq!(report.cols, 2);
        assert_eq!(report.rows, 1);
        assert_eq!(report.outlines.len(), 2);

        let mut covered = 0.0;
        for outline in &report.outlines {
            let area = signed_area(&outline.points);
            assert!(area > 0.0, "label {} not counter-clockwise", outline.label);
            covered += area;
            for p in &outline.points {
                assert!(p.x >= -1e-9 && p.x <= 20.0 + 1e-9);
                assert!(p.y >= -1e-9 && p.y <= 20.0 + 1e-9);
            }
        }
        // The two tiles together cover the whole footprint
        assert!((covered - 400.0).abs() < 1e-6);
    }

    #[test]
    fn test_layout_with_barrier_guide() {
        let config = PipelineConfig {
            bed_width: 30.0,
            bed_height: 12.0,
            heightmap: HeightmapConfig { resolution: 1.0 },
            ..PipelineConfig::default()
        };

        // Horizontal guide across the middle
        let mut barrier = GridMask::filled(20, 20, false);
        for x in 0..20 {
            barrier.set(10, x, true);
        }

        let report = layout_mesh(encode(&relief_slab()), &config, Some(&barrier)).unwrap();
        assert_eq!(report.outlines.len(), 2);

        // The regions split along the guide: one polygon sits above
        // y = 10 mm (grid row 10 from the top of a 20 mm model), the other below
        let boundary_y = 20.0 - 10.0;
        let above = &report.outlines[0];
        let below = &report.outlines[1];
        assert!(above.points.iter().all(|p| p.y >= boundary_y - 1.0 - 1e-9));
        assert!(below.points.iter().all(|p| p.y <= boundary_y + 1.0 + 1e-9));
    }
}
