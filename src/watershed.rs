//! Watershed segmentation of the heightmap.
//!
//! Partitions the grid into one region per intended tile by Meyer's
//! priority flooding over the local gradient. Region boundaries settle
//! along high-gradient relief features; an optional user guide acts as a
//! soft barrier that boundaries snap to.

use crate::heightmap::{GridMask, Heightmap};
use crate::{Error, Result};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Watershed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatershedConfig {
    /// Gradient penalty added on barrier cells. Kept finite so flooding
    /// still crosses a discontinuous guide instead of stalling.
    pub barrier_penalty: f32,
}

impl Default for WatershedConfig {
    fn default() -> Self {
        Self {
            barrier_penalty: 1000.0,
        }
    }
}

/// Dense region labeling; 0 means unlabeled
#[derive(Debug, Clone)]
pub struct LabelGrid {
    width: usize,
    height: usize,
    data: Vec<u32>,
}

impl LabelGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize) -> u32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, y: usize, x: usize, label: u32) {
        self.data[y * self.width + x] = label;
    }
}

/// Flood seed: a cell and the positive label it spreads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed {
    pub x: usize,
    pub y: usize,
    pub label: u32,
}

/// Local gradient magnitude: the largest absolute height step to any of the
/// four neighbors.
pub fn gradient_map(grid: &Heightmap) -> Vec<f32> {
    let (w, h) = (grid.width(), grid.height());
    let mut out = vec![0f32; w * h];

    out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, cell) in row.iter_mut().enumerate() {
            let here = grid.get(y, x);
            let mut g = 0f32;
            if x > 0 {
                g = g.max((here - grid.get(y, x - 1)).abs());
            }
            if x + 1 < w {
                g = g.max((here - grid.get(y, x + 1)).abs());
            }
            if y > 0 {
                g = g.max((here - grid.get(y - 1, x)).abs());
            }
            if y + 1 < h {
                g = g.max((here - grid.get(y + 1, x)).abs());
            }
            *cell = g;
        }
    });

    out
}

/// One seed per intended tile, at the center of a regular `cols x rows`
/// lattice clamped to the grid. Labels are assigned row-major starting at 1.
pub fn seed_lattice(width: usize, height: usize, cols: usize, rows: usize) -> Vec<Seed> {
    let mut seeds = Vec::with_capacity(cols * rows);
    for ty in 0..rows {
        for tx in 0..cols {
            let x = ((tx as f64 + 0.5) * width as f64 / cols as f64) as usize;
            let y = ((ty as f64 + 0.5) * height as f64 / rows as f64) as usize;
            seeds.push(Seed {
                x: x.min(width.saturating_sub(1)),
                y: y.min(height.saturating_sub(1)),
                label: (ty * cols + tx + 1) as u32,
            });
        }
    }
    seeds
}

/// Priority-flooded region growing.
pub struct WatershedSegmenter {
    config: WatershedConfig,
}

impl WatershedSegmenter {
    pub fn new(config: WatershedConfig) -> Self {
        Self { config }
    }

    /// Flood the grid from `seeds`. Each cell is labeled the first time a
    /// labeled neighbor reaches it; the queue is keyed by the cell's own
    /// gradient (plus the barrier penalty where masked), ties popping FIFO.
    /// Cells never reached stay 0.
    pub fn segment(
        &self,
        grid: &Heightmap,
        barriers: Option<&GridMask>,
        seeds: &[Seed],
    ) -> Result<LabelGrid> {
        let (w, h) = (grid.width(), grid.height());
        if let Some(m) = barriers {
            if m.width() != w || m.height() != h {
                return Err(Error::InvalidArgument(format!(
                    "barrier mask is {}x{}, grid is {}x{}",
                    m.width(),
                    m.height(),
                    w,
                    h
                )));
            }
        }
        for seed in seeds {
            if seed.x >= w || seed.y >= h {
                return Err(Error::InvalidArgument(format!(
                    "seed ({}, {}) outside {}x{} grid",
                    seed.x, seed.y, w, h
                )));
            }
            if seed.label == 0 {
                return Err(Error::InvalidArgument("seed label 0 is reserved".into()));
            }
        }

        let mut cost = gradient_map(grid);
        if let Some(m) = barriers {
            for y in 0..h {
                for x in 0..w {
                    if m.get(y, x) {
                        cost[y * w + x] += self.config.barrier_penalty;
                    }
                }
            }
        }

        log::info!("Watershed: flooding {}x{} grid from {} seed(s)", w, h, seeds.len());

        let mut labels = LabelGrid::new(w, h);
        let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, u64, usize, usize)>> =
            BinaryHeap::new();
        let mut sequence = 0u64;

        for seed in seeds {
            if labels.get(seed.y, seed.x) != 0 {
                continue; // Two seeds in one cell: first one wins
            }
            labels.set(seed.y, seed.x, seed.label);
            heap.push(Reverse((OrderedFloat(0.0), sequence, seed.x, seed.y)));
            sequence += 1;
        }

        while let Some(Reverse((_, _, x, y))) = heap.pop() {
            let label = labels.get(y, x);
            let mut visit = |nx: usize, ny: usize| {
                if labels.get(ny, nx) != 0 {
                    return;
                }
                labels.set(ny, nx, label);
                heap.push(Reverse((
                    OrderedFloat(cost[ny * w + nx]),
                    sequence,
                    nx,
                    ny,
                )));
                sequence += 1;
            };

            if x > 0 {
                visit(x - 1, y);
            }
            if x + 1 < w {
                visit(x + 1, y);
            }
            if y > 0 {
                visit(x, y - 1);
            }
            if y + 1 < h {
                visit(x, y + 1);
            }
        }

        Ok(labels)
    }
}
