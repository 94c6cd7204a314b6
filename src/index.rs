//! Spatial index for placement collision queries.
//!
//! A uniform grid of integer cells. Every placement is registered in each cell its
//! bounding box touches, so a query only inspects placements in nearby cells
//! instead of the whole layout.

use std::collections::HashMap;

use crate::geometry::overlaps;
use crate::model::Placement;
use crate::types::{Aabb, EPSILON};

type Cell = (i64, i64, i64);

/// Placement store with a uniform-grid broad phase.
#[derive(Clone, Debug)]
pub struct OccupancyIndex {
    cell_size: f64,
    placements: Vec<Placement>,
    cells: HashMap<Cell, Vec<usize>>,
}

impl OccupancyIndex {
    /// Creates an empty index. `cell_size` should be close to the largest box
    /// edge; values below 1 mm are raised to 1 mm.
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() { cell_size.max(1.0) } else { 1.0 };
        Self {
            cell_size,
            placements: Vec::new(),
            cells: HashMap::new(),
        }
    }

    /// Builds an index over `placements`, keeping their order.
    pub fn from_placements(cell_size: f64, placements: impl IntoIterator<Item = Placement>) -> Self {
        let mut index = Self::new(cell_size);
        for p in placements {
            index.insert(p);
        }
        index
    }

    /// Suggested cell size for a set of placements: their largest extent.
    ///
    /// Every placement then touches at most two cells per axis, however thin it is.
    pub fn cell_size_for(placements: &[Placement]) -> f64 {
        placements
            .iter()
            .map(|p| p.rotation.length.max(p.rotation.height).max(p.rotation.width))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn cell_range(&self, min: f64, max: f64) -> std::ops::RangeInclusive<i64> {
        let first = (min / self.cell_size).floor() as i64;
        let last = ((max - EPSILON) / self.cell_size).floor() as i64;
        first..=last.max(first)
    }

    fn cells_of(&self, aabb: &Aabb) -> Vec<Cell> {
        let mut cells = Vec::new();
        for i in self.cell_range(aabb.min.x, aabb.max.x) {
            for j in self.cell_range(aabb.min.y, aabb.max.y) {
                for k in self.cell_range(aabb.min.z, aabb.max.z) {
                    cells.push((i, j, k));
                }
            }
        }
        cells
    }

    /// Adds a placement and returns its index.
    pub fn insert(&mut self, placement: Placement) -> usize {
        let idx = self.placements.len();
        for cell in self.cells_of(&placement.aabb()) {
            self.cells.entry(cell).or_default().push(idx);
        }
        self.placements.push(placement);
        idx
    }

    /// Indices of all placements whose bounding box intersects `region`, ascending.
    pub fn query(&self, region: &Aabb) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .cells_of(region)
            .iter()
            .filter_map(|cell| self.cells.get(cell))
            .flatten()
            .copied()
            .filter(|&idx| self.placements[idx].aabb().intersects(region))
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Indices of all placements overlapping `candidate`.
    pub fn overlapping(&self, candidate: &Placement) -> Vec<usize> {
        self.query(&candidate.aabb())
            .into_iter()
            .filter(|&idx| overlaps(&self.placements[idx], candidate))
            .collect()
    }

    /// Checks whether `candidate` would collide with any stored placement.
    pub fn collides(&self, candidate: &Placement) -> bool {
        let aabb = candidate.aabb();
        self.cells_of(&aabb)
            .iter()
            .filter_map(|cell| self.cells.get(cell))
            .flatten()
            .any(|&idx| overlaps(&self.placements[idx], candidate))
    }

    pub fn get(&self, idx: usize) -> Option<&Placement> {
        self.placements.get(idx)
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn into_placements(self) -> Vec<Placement> {
        self.placements
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}
