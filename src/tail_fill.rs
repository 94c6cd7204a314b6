//! Filling of the tail region.

use std::collections::{BTreeSet, HashSet};

use log::debug;

use crate::geometry::{footprint_overlap_area, within_container};
use crate::index::OccupancyIndex;
use crate::model::{ContainerSpec, Orientation, Placement};
use crate::tail::{Gap, TailAnalysis};
use crate::types::{Aabb, Dimensional, EPSILON, EPSILON_HEIGHT, QUANTUM_PER_MM, Vec3, quantize};

/// Working state of one fill: existing plus newly committed placements.
struct TailFiller<'a> {
    container: &'a ContainerSpec,
    support_ratio: f64,
    occupied: OccupancyIndex,
    added: Vec<Placement>,
}

impl<'a> TailFiller<'a> {
    fn new(placements: &[Placement], container: &'a ContainerSpec, support_ratio: f64) -> Self {
        Self {
            container,
            support_ratio,
            occupied: OccupancyIndex::from_placements(
                OccupancyIndex::cell_size_for(placements),
                placements.iter().copied(),
            ),
            added: Vec::new(),
        }
    }

    /// Share of the candidate's footprint resting on top faces at its height.
    fn support_fraction(&self, candidate: &Placement) -> f64 {
        let y = candidate.position.y;
        if y <= EPSILON {
            return 1.0;
        }
        let end = candidate.end();
        let contact = Aabb::new(
            Vec3::new(candidate.position.x, (y - 1.0).max(0.0), candidate.position.z),
            Vec3::new(end.x, y, end.z),
        );
        let supported: f64 = self
            .occupied
            .query(&contact)
            .into_iter()
            .filter_map(|i| self.occupied.get(i))
            .filter(|q| (q.top() - y).abs() <= EPSILON_HEIGHT)
            .map(|q| footprint_overlap_area(q, candidate))
            .sum();
        let footprint = candidate.rotation.length * candidate.rotation.width;
        supported / footprint
    }

    fn admissible(&self, candidate: &Placement) -> bool {
        within_container(candidate, self.container)
            && !self.occupied.collides(candidate)
            && self.support_fraction(candidate) >= self.support_ratio - EPSILON
    }

    fn commit(&mut self, placement: Placement) {
        self.occupied.insert(placement);
        self.added.push(placement);
    }

    /// Number of consecutive copies of `orientation` that fit along the length
    /// axis starting at `origin`.
    fn simulate_run(&self, origin: Vec3, orientation: &Orientation) -> usize {
        let mut count = 0usize;
        loop {
            let x = origin.x + orientation.length * count as f64;
            let candidate = Placement::new(Vec3::new(x, origin.y, origin.z), *orientation);
            if !self.admissible(&candidate) {
                return count;
            }
            count += 1;
        }
    }

    /// Places at most one box per gap, largest orientation first.
    fn fill_gaps(&mut self, gaps: &[Gap], by_volume: &[Orientation]) {
        for gap in gaps {
            let chosen = by_volume
                .iter()
                .filter(|o| gap.fits(o))
                .map(|o| Placement::new(gap.position, *o))
                .find(|candidate| self.admissible(candidate));
            if let Some(placement) = chosen {
                self.commit(placement);
            }
        }
    }

    /// Grid multiples across the width plus every existing width edge.
    fn width_positions(&self, resolution: f64) -> Vec<f64> {
        let mut keys: BTreeSet<i64> = BTreeSet::new();
        let mut z = 0.0;
        while z < self.container.width - EPSILON {
            keys.insert(quantize(z));
            z += resolution;
        }
        for p in self.occupied.placements() {
            for edge in [p.position.z, p.end().z] {
                if edge < self.container.width - EPSILON {
                    keys.insert(quantize(edge));
                }
            }
        }
        keys.into_iter().map(|k| k as f64 / QUANTUM_PER_MM).collect()
    }

    /// Grid steps from the tail start plus every far length edge inside the tail.
    fn length_positions(&self, tail_start: f64, resolution: f64) -> Vec<f64> {
        let mut keys: BTreeSet<i64> = BTreeSet::new();
        let mut x = tail_start;
        while x < self.container.length - EPSILON {
            keys.insert(quantize(x));
            x += resolution;
        }
        for p in self.occupied.placements() {
            let edge = p.end().x;
            if edge >= tail_start - EPSILON && edge < self.container.length - EPSILON {
                keys.insert(quantize(edge));
            }
        }
        keys.into_iter().map(|k| k as f64 / QUANTUM_PER_MM).collect()
    }

    /// Sweeps candidate heights, width positions and length positions and
    /// commits at each position the orientation with the longest run of copies.
    fn sweep(&mut self, analysis: &TailAnalysis, orientations: &[Orientation]) {
        let mut pending: BTreeSet<i64> = BTreeSet::from([0]);
        pending.extend(self.added.iter().map(|p| quantize(p.top())));
        let mut visited: HashSet<i64> = HashSet::new();

        while let Some(level) = pending.pop_first() {
            if !visited.insert(level) {
                continue;
            }
            let y = level as f64 / QUANTUM_PER_MM;
            let widths = self.width_positions(analysis.resolution);
            let lengths = self.length_positions(analysis.tail_start, analysis.resolution);

            for &z in &widths {
                let required: Vec<Option<f64>> = orientations
                    .iter()
                    .map(|o| {
                        let fits = y + o.height <= self.container.height + EPSILON
                            && z + o.width <= self.container.width + EPSILON;
                        fits.then(|| analysis.clearance.required_offset(y, z, o.height, o.width))
                    })
                    .collect();
                let Some(earliest) = required.iter().flatten().copied().reduce(f64::min) else {
                    continue;
                };

                for &x in &lengths {
                    if x < earliest - EPSILON {
                        continue;
                    }
                    let mut best: Option<(usize, Orientation)> = None;
                    for (orientation, req) in orientations.iter().zip(&required) {
                        let Some(req) = req else {
                            continue;
                        };
                        if x < req - EPSILON {
                            continue;
                        }
                        let run = self.simulate_run(Vec3::new(x, y, z), orientation);
                        if run == 0 {
                            continue;
                        }
                        let better = match &best {
                            None => true,
                            Some((best_run, best_o)) => {
                                run > *best_run
                                    || (run == *best_run && orientation.volume() > best_o.volume() + EPSILON)
                            }
                        };
                        if better {
                            best = Some((run, *orientation));
                        }
                    }

                    if let Some((run, orientation)) = best {
                        for k in 0..run {
                            let position = Vec3::new(x + orientation.length * k as f64, y, z);
                            self.commit(Placement::new(position, orientation));
                        }
                        let top = quantize(y + orientation.height);
                        if !visited.contains(&top) {
                            pending.insert(top);
                        }
                    }
                }
            }
        }
    }
}

/// Populates the tail described by `analysis` and returns only the new placements.
///
/// The first pass puts one box into each gap. The second pass sweeps the tail
/// and, at every free position, simulates runs of each orientation along the
/// length axis and commits the longest run. A position is skipped for an
/// orientation when it lies before the clearance of any covered cell, when it
/// collides, or when less than `support_ratio` of its footprint is supported.
///
/// # Parameters
/// * `placements` - The layout in front of and around the tail
/// * `orientations` - Candidate orientations, each fitting the container
/// * `container` - Target container
/// * `analysis` - Result of [`crate::tail::analyze_tail`] on `placements`
/// * `support_ratio` - Minimum supported share of the footprint above the floor
pub fn fill_tail(
    placements: &[Placement],
    orientations: &[Orientation],
    container: &ContainerSpec,
    analysis: &TailAnalysis,
    support_ratio: f64,
) -> Vec<Placement> {
    let mut by_volume = orientations.to_vec();
    by_volume.sort_by(|a, b| b.volume().total_cmp(&a.volume()));

    let mut filler = TailFiller::new(placements, container, support_ratio);
    filler.fill_gaps(&analysis.gaps, &by_volume);
    let from_gaps = filler.added.len();
    filler.sweep(analysis, orientations);

    debug!(
        "🧩 Tail fill: {} placements ({} in gaps)",
        filler.added.len(),
        from_gaps
    );
    filler.added
}
