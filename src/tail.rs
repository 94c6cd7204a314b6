//! Analysis of the unfilled remainder ("tail") of the container length.
//!
//! After the wall has been repeated and compacted, the region behind the densest
//! packed stretch is usually only partly used. This module locates where that
//! stretch ends, records per (height, width) cell how far existing boxes reach
//! into the tail, and lists the voids underneath overhanging boxes.

use std::ops::Range;

use log::debug;

use crate::geometry::rests_on;
use crate::index::OccupancyIndex;
use crate::model::{ContainerSpec, Orientation, Placement};
use crate::types::{Aabb, EPSILON, EPSILON_HEIGHT, Vec3};

/// Grid resolution for a box whose smallest edge is `min_edge`:
/// a tenth of that edge, rounded down and clamped to `[lower, upper]` mm.
pub fn grid_resolution(min_edge: f64, lower: f64, upper: f64) -> f64 {
    let (lo, hi) = (lower.min(upper), lower.max(upper));
    (min_edge / 10.0).floor().max(lo).min(hi)
}

/// Indices of the grid cells whose centers fall into `[lo, hi)`.
fn covered_cells(lo: f64, hi: f64, resolution: f64, count: usize) -> Range<usize> {
    let first = (lo / resolution - 0.5).ceil().max(0.0) as usize;
    let last = (hi / resolution - 0.5).ceil().max(0.0) as usize;
    first.min(count)..last.min(count)
}

/// Like [`covered_cells`], but never empty for a non-empty grid: a span too
/// thin to contain a cell center maps to the cell holding `lo`.
fn touched_cells(lo: f64, hi: f64, resolution: f64, count: usize) -> Range<usize> {
    let range = covered_cells(lo, hi, resolution, count);
    if !range.is_empty() || count == 0 {
        return range;
    }
    let cell = ((lo / resolution).floor().max(0.0) as usize).min(count - 1);
    cell..cell + 1
}

/// Per (height, width) cell, the length offset from which the cell is free.
#[derive(Clone, Debug, PartialEq)]
pub struct ClearanceMap {
    resolution: f64,
    rows: usize,
    cols: usize,
    cells: Vec<f64>,
}

impl ClearanceMap {
    fn new(container: &ContainerSpec, resolution: f64, tail_start: f64) -> Self {
        let rows = (container.height / resolution).ceil() as usize;
        let cols = (container.width / resolution).ceil() as usize;
        Self {
            resolution,
            rows,
            cols,
            cells: vec![tail_start; rows * cols],
        }
    }

    /// Records that `p` blocks its cells up to its far length edge.
    fn raise(&mut self, p: &Placement) {
        let end = p.end();
        let reach = end.x;
        for row in covered_cells(p.position.y, end.y, self.resolution, self.rows) {
            for col in covered_cells(p.position.z, end.z, self.resolution, self.cols) {
                let cell = &mut self.cells[row * self.cols + col];
                *cell = cell.max(reach);
            }
        }
    }

    /// Clearance of one cell, `None` outside the grid.
    pub fn at(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col).copied()
    }

    /// Smallest length offset at which a box with the given height/width
    /// footprint at `(y, z)` is clear of every overhanging placement.
    pub fn required_offset(&self, y: f64, z: f64, height: f64, width: f64) -> f64 {
        let mut required = f64::NEG_INFINITY;
        for row in touched_cells(y, y + height, self.resolution, self.rows) {
            for col in touched_cells(z, z + width, self.resolution, self.cols) {
                required = required.max(self.cells[row * self.cols + col]);
            }
        }
        required
    }
}

/// A rectangular void under a tail-overhanging placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gap {
    pub position: Vec3,
    pub size: Vec3,
}

impl Gap {
    pub fn fits(&self, orientation: &Orientation) -> bool {
        orientation.extent().fits_within(&self.size, EPSILON)
    }
}

/// Outcome of [`analyze_tail`].
#[derive(Clone, Debug, PartialEq)]
pub struct TailAnalysis {
    pub resolution: f64,
    /// Length offset where the densest packed region ends.
    pub tail_start: f64,
    pub clearance: ClearanceMap,
    pub gaps: Vec<Gap>,
}

/// Length-axis coverage histogram: per bucket, the summed height × width of
/// the placements spanning the bucket center.
fn coverage_histogram(placements: &[Placement], buckets: usize, resolution: f64) -> Vec<f64> {
    let mut diff = vec![0.0; buckets + 1];
    for p in placements {
        let range = covered_cells(p.position.x, p.end().x, resolution, buckets);
        if range.is_empty() {
            continue;
        }
        let weight = p.rotation.cross_section();
        diff[range.start] += weight;
        diff[range.end] -= weight;
    }

    let mut coverage = Vec::with_capacity(buckets);
    let mut running = 0.0;
    for delta in &diff[..buckets] {
        running += delta;
        coverage.push(running);
    }
    coverage
}

/// End of the solid region: the far edge of the last bucket with maximal coverage.
fn solid_region_end(coverage: &[f64], resolution: f64, length: f64) -> f64 {
    let max = coverage.iter().copied().fold(0.0, f64::max);
    if max <= EPSILON {
        return 0.0;
    }
    let threshold = max * (1.0 - 1e-9);
    coverage
        .iter()
        .rposition(|&c| c >= threshold)
        .map(|k| ((k + 1) as f64 * resolution).min(length))
        .unwrap_or(0.0)
}

fn find_gap(p: &Placement, index: &OccupancyIndex, tail_start: f64) -> Option<Gap> {
    let bottom = p.position.y;
    let end = p.end();

    let contact = Aabb::new(
        Vec3::new(p.position.x, (bottom - 1.0).max(0.0), p.position.z),
        Vec3::new(end.x, bottom, end.z),
    );
    let supported_until = index
        .query(&contact)
        .into_iter()
        .filter_map(|i| index.get(i))
        .filter(|q| rests_on(p, q, EPSILON_HEIGHT))
        .map(|q| q.end().x)
        .fold(f64::NEG_INFINITY, f64::max);

    let x0 = tail_start.max(p.position.x).max(supported_until);
    let x1 = end.x;
    if x1 - x0 <= EPSILON {
        return None;
    }

    let beneath = Aabb::new(Vec3::new(x0, 0.0, p.position.z), Vec3::new(x1, bottom, end.z));
    let floor = index
        .query(&beneath)
        .into_iter()
        .filter_map(|i| index.get(i))
        .map(|q| q.top().min(bottom))
        .fold(0.0, f64::max);

    let size = Vec3::new(x1 - x0, bottom - floor, p.rotation.width);
    if size.x <= EPSILON || size.y <= EPSILON || size.z <= EPSILON {
        return None;
    }
    Some(Gap {
        position: Vec3::new(x0, floor, p.position.z),
        size,
    })
}

/// Locates the tail behind the densest region of `placements`.
///
/// # Parameters
/// * `placements` - The compacted layout
/// * `container` - The container the layout lives in
/// * `resolution` - Grid resolution in mm, see [`grid_resolution`]
pub fn analyze_tail(placements: &[Placement], container: &ContainerSpec, resolution: f64) -> TailAnalysis {
    let resolution = resolution.max(1.0);
    let buckets = (container.length / resolution).ceil() as usize;
    let coverage = coverage_histogram(placements, buckets, resolution);
    let tail_start = solid_region_end(&coverage, resolution, container.length);

    let mut clearance = ClearanceMap::new(container, resolution, tail_start);
    let overhanging: Vec<&Placement> = placements
        .iter()
        .filter(|p| p.end().x > tail_start + EPSILON)
        .collect();
    for p in &overhanging {
        clearance.raise(p);
    }

    let index = OccupancyIndex::from_placements(
        OccupancyIndex::cell_size_for(placements),
        placements.iter().copied(),
    );
    let gaps: Vec<Gap> = overhanging
        .iter()
        .filter(|p| p.position.y > EPSILON)
        .filter_map(|p| find_gap(p, &index, tail_start))
        .collect();

    debug!(
        "🔍 Tail: starts at {:.1} mm (grid {} mm), {} overhanging, {} gaps",
        tail_start,
        resolution,
        overhanging.len(),
        gaps.len()
    );

    TailAnalysis {
        resolution,
        tail_start,
        clearance,
        gaps,
    }
}
