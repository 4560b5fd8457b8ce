//! Z-buffer heightmap extraction.
//!
//! Projects the mesh onto a dense `W x H` grid of f32 heights. Row 0 is the
//! maximum world Y (image-top convention), column 0 the minimum world X.
//! Cells record the highest Z sampled in their footprint, 0 where nothing
//! landed.

use crate::stl::{scan_bounds, MeshBounds, StlReader};
use crate::{Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom};

/// Configuration for heightmap extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightmapConfig {
    /// Grid resolution in millimeters per cell
    pub resolution: f64,
}

impl Default for HeightmapConfig {
    fn default() -> Self {
        Self { resolution: 0.5 }
    }
}

/// Dense row-major grid of sampled heights
#[derive(Debug, Clone)]
pub struct Heightmap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Heightmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Wrap existing row-major data. Panics if the length does not match.
    pub fn from_data(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, y: usize, x: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Boolean grid aligned with a heightmap.
///
/// Used both as a seam allow-mask (`true` = the seam may pass here) and as a
/// watershed barrier mask (`true` = barrier cell).
#[derive(Debug, Clone)]
pub struct GridMask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl GridMask {
    pub fn filled(width: usize, height: usize, value: bool) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize) -> bool {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, y: usize, x: usize, value: bool) {
        self.data[y * self.width + x] = value;
    }
}

/// Builds a heightmap from a raw container in two streaming passes.
pub struct HeightmapBuilder {
    config: HeightmapConfig,
}

impl HeightmapBuilder {
    pub fn new(config: HeightmapConfig) -> Self {
        Self { config }
    }

    /// Scan the container twice: once for world bounds, once to splat
    /// vertices into the grid. A final pass fills isolated empty cells from
    /// their positive 4-neighbors.
    pub fn build<R: Read + Seek>(&self, mut input: R) -> Result<(Heightmap, MeshBounds)> {
        let r = self.config.resolution;
        if r <= 0.0 || !r.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "resolution must be positive, got {r}"
            )));
        }

        let bounds = scan_bounds(StlReader::new(&mut input)?)?;
        input.seek(SeekFrom::Start(0))?;

        let width = ((bounds.width() / r).ceil() as usize).max(1);
        let height = ((bounds.height() / r).ceil() as usize).max(1);
        log::info!(
            "Heightmap: {}x{} cells at {} mm/cell ({:.1} x {:.1} mm)",
            width,
            height,
            r,
            bounds.width(),
            bounds.height()
        );

        let mut grid = Heightmap::new(width, height);
        for tri in StlReader::new(&mut input)? {
            for v in tri?.vertices() {
                let gx = (((v.x - bounds.min.x) / r) as usize).min(width - 1);
                let gy = (((bounds.max.y - v.y) / r) as usize).min(height - 1);
                if v.z as f32 > grid.get(gy, gx) {
                    grid.set(gy, gx, v.z as f32);
                }
            }
        }

        let grid = fill_empty_cells(&grid);
        Ok((grid, bounds))
    }
}

/// One smoothing pass: each zero cell becomes the mean of its positive
/// 4-neighbors, read from the original grid only. Cells with no positive
/// neighbor stay zero.
fn fill_empty_cells(grid: &Heightmap) -> Heightmap {
    let (w, h) = (grid.width(), grid.height());
    let mut filled = vec![0f32; w * h];

    filled
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let v = grid.get(y, x);
                if v > 0.0 {
                    *out = v;
                    continue;
                }

                let mut sum = 0f32;
                let mut n = 0u32;
                if x > 0 && grid.get(y, x - 1) > 0.0 {
                    sum += grid.get(y, x - 1);
                    n += 1;
                }
                if x + 1 < w && grid.get(y, x + 1) > 0.0 {
                    sum += grid.get(y, x + 1);
                    n += 1;
                }
                if y > 0 && grid.get(y - 1, x) > 0.0 {
                    sum += grid.get(y - 1, x);
                    n += 1;
                }
                if y + 1 < h && grid.get(y + 1, x) > 0.0 {
                    sum += grid.get(y + 1, x);
                    n += 1;
                }
                *out = if n > 0 { sum / n as f32 } else { 0.0 };
            }
        });

    Heightmap::from_data(w, h, filled)
}
