//! Least-cost seam search over the heightmap.
//!
//! A seam is a top-to-bottom polyline, one column per row, moving at most
//! one column per step. Cells with a strong height step to their neighbor
//! are cheap, so the seam threads along visible relief features where the
//! physical cut will be least noticeable.

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::geometry::{Point2D, Point3D};
use crate::heightmap::{GridMask, Heightmap};
use crate::stl::MeshBounds;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Cut orientation. Vertical cuts run top-to-bottom and separate tile
/// columns; horizontal cuts run left-to-right and separate tile rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    Vertical,
    Horizontal,
}

impl Axis {
    pub fn orthogonal(&self) -> Axis {
        match self {
            Axis::Vertical => Axis::Horizontal,
            Axis::Horizontal => Axis::Vertical,
        }
    }

    /// Coordinate a cut of this axis divides space along
    pub fn slice_coord(&self, p: &Point3D) -> f64 {
        match self {
            Axis::Vertical => p.x,
            Axis::Horizontal => p.y,
        }
    }

    /// Coordinate along which a cut of this axis travels
    pub fn walk_coord(&self, p: &Point3D) -> f64 {
        match self {
            Axis::Vertical => p.y,
            Axis::Horizontal => p.x,
        }
    }

    pub fn slice_coord_2d(&self, p: &Point2D) -> f64 {
        match self {
            Axis::Vertical => p.x,
            Axis::Horizontal => p.y,
        }
    }

    pub fn walk_coord_2d(&self, p: &Point2D) -> f64 {
        match self {
            Axis::Vertical => p.y,
            Axis::Horizontal => p.x,
        }
    }

    /// Slice coordinate remapped so that it increases with the tile index:
    /// x for vertical cuts, -y for horizontal (tile rows count downward).
    pub fn scan_coord(&self, p: &Point3D) -> f64 {
        match self {
            Axis::Vertical => p.x,
            Axis::Horizontal => -p.y,
        }
    }
}

/// Identifier of one cut: its orientation and position in the sorted family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CutId {
    pub axis: Axis,
    pub index: usize,
}

/// Seam search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeamConfig {
    /// Fraction of the tile span searched around each nominal cut position
    pub band_fraction: f64,
}

impl Default for SeamConfig {
    fn default() -> Self {
        Self { band_fraction: 0.5 }
    }
}

/// A found seam: one column index per row (grid coordinates)
#[derive(Debug, Clone)]
pub struct Seam {
    pub columns: Vec<usize>,
}

/// A seam lifted to world millimeters, ready for the clipper.
///
/// Points are ordered along the walk axis: decreasing Y for vertical cuts
/// (row 0 of the grid is the maximum world Y), increasing X for horizontal.
/// `lo`/`hi` cache the extremes of the scan coordinate for O(1) rejection.
#[derive(Debug, Clone)]
pub struct CutPath {
    pub axis: Axis,
    pub points: Vec<Point2D>,
    pub lo: f64,
    pub hi: f64,
}

impl CutPath {
    pub fn new(axis: Axis, points: Vec<Point2D>) -> Self {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for p in &points {
            let s = match axis {
                Axis::Vertical => p.x,
                Axis::Horizontal => -p.y,
            };
            lo = lo.min(s);
            hi = hi.max(s);
        }
        Self {
            axis,
            points,
            lo,
            hi,
        }
    }

    /// Mean scan coordinate; the clipper keeps families sorted by this
    pub fn mean_scan(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        (self.lo + self.hi) / 2.0
    }

    /// Convert a seam found on the grid into a world-space cut path.
    /// Grid cells are sampled at their centers.
    pub fn from_seam(
        seam: &Seam,
        axis: Axis,
        bounds: &MeshBounds,
        resolution: f64,
    ) -> Self {
        let r = resolution;
        let points = seam
            .columns
            .iter()
            .enumerate()
            .map(|(i, &col)| match axis {
                Axis::Vertical => Point2D::new(
                    bounds.min.x + (col as f64 + 0.5) * r,
                    bounds.max.y - (i as f64 + 0.5) * r,
                ),
                Axis::Horizontal => Point2D::new(
                    bounds.min.x + (i as f64 + 0.5) * r,
                    bounds.max.y - (col as f64 + 0.5) * r,
                ),
            })
            .collect();
        Self::new(axis, points)
    }
}

/// Dynamic-programming seam search over a heightmap.
///
/// The horizontal variant runs the same algorithm over the transposed grid;
/// transposition is a matter of indexing, the data is never copied.
pub struct SeamFinder<'a> {
    grid: &'a Heightmap,
    axis: Axis,
}

impl<'a> SeamFinder<'a> {
    pub fn vertical(grid: &'a Heightmap) -> Self {
        Self {
            grid,
            axis: Axis::Vertical,
        }
    }

    pub fn horizontal(grid: &'a Heightmap) -> Self {
        Self {
            grid,
            axis: Axis::Horizontal,
        }
    }

    fn rows(&self) -> usize {
        match self.axis {
            Axis::Vertical => self.grid.height(),
            Axis::Horizontal => self.grid.width(),
        }
    }

    fn cols(&self) -> usize {
        match self.axis {
            Axis::Vertical => self.grid.width(),
            Axis::Horizontal => self.grid.height(),
        }
    }

    #[inline]
    fn value(&self, row: usize, col: usize) -> f32 {
        match self.axis {
            Axis::Vertical => self.grid.get(row, col),
            Axis::Horizontal => self.grid.get(col, row),
        }
    }

    #[inline]
    fn allowed(&self, mask: Option<&GridMask>, row: usize, col: usize) -> bool {
        match mask {
            None => true,
            Some(m) => match self.axis {
                Axis::Vertical => m.get(row, col),
                Axis::Horizontal => m.get(col, row),
            },
        }
    }

    /// Energy of a cell: cheap where the height steps sharply to the
    /// neighboring column (clamped at column 0), infinite where masked off.
    fn energy(&self, mask: Option<&GridMask>, row: usize, col: usize) -> f64 {
        if !self.allowed(mask, row, col) {
            return f64::INFINITY;
        }
        let here = self.value(row, col) as f64;
        let left = self.value(row, col.saturating_sub(1)) as f64;
        100.0 / (1.0 + (here - left).abs())
    }

    /// Find the least-cost seam whose columns stay inside
    /// `[col_start, col_end]` (inclusive). Ties prefer the smaller column,
    /// both at the final row and when choosing a parent, so the result is
    /// deterministic.
    ///
    /// When the whole last row is unreachable (over-constrained mask), the
    /// vertical mid-line of the range is returned and one
    /// `EmptySeamFallback` diagnostic is emitted.
    pub fn find(
        &self,
        col_start: usize,
        col_end: usize,
        mask: Option<&GridMask>,
        cut: Option<CutId>,
        diags: &mut Diagnostics,
    ) -> Result<Seam> {
        let rows = self.rows();
        let cols = self.cols();
        if col_start > col_end || col_end >= cols {
            return Err(Error::InvalidArgument(format!(
                "seam range [{col_start}, {col_end}] outside grid of {cols} columns"
            )));
        }
        if let Some(m) = mask {
            if m.width() != self.grid.width() || m.height() != self.grid.height() {
                return Err(Error::InvalidArgument(format!(
                    "mask is {}x{}, grid is {}x{}",
                    m.width(),
                    m.height(),
                    self.grid.width(),
                    self.grid.height()
                )));
            }
        }

        let n = col_end - col_start + 1;
        let mut dist: Vec<f64> = (0..n)
            .map(|j| self.energy(mask, 0, col_start + j))
            .collect();
        let mut parent = vec![0u32; rows * n];

        let mut next = vec![0f64; n];
        for row in 1..rows {
            for j in 0..n {
                let mut best = f64::INFINITY;
                let mut best_j = j;
                let lo = j.saturating_sub(1);
                let hi = (j + 1).min(n - 1);
                for k in lo..=hi {
                    if dist[k] < best {
                        best = dist[k];
                        best_j = k;
                    }
                }
                next[j] = self.energy(mask, row, col_start + j) + best;
                parent[row * n + j] = best_j as u32;
            }
            std::mem::swap(&mut dist, &mut next);
        }

        let mut end = 0usize;
        let mut best = f64::INFINITY;
        for (j, &d) in dist.iter().enumerate() {
            if d < best {
                best = d;
                end = j;
            }
        }

        if best.is_infinite() {
            let mid = (col_start + col_end) / 2;
            diags.push(Diagnostic {
                kind: DiagnosticKind::EmptySeamFallback,
                cut,
                tile: None,
                detail: format!(
                    "no finite-cost seam in range [{col_start}, {col_end}]; using mid-column {mid}"
                ),
            });
            return Ok(Seam {
                columns: vec![mid; rows],
            });
        }

        let mut columns = vec![0usize; rows];
        let mut j = end;
        for row in (0..rows).rev() {
            columns[row] = col_start + j;
            if row > 0 {
                j = parent[row * n + j] as usize;
            }
        }

        Ok(Seam { columns })
    }
}
