//! Final overlap resolution and validation.
//!
//! Upstream stages work on approximate grids and may leave residual overlaps.
//! This pass removes them and everything that would be left floating, then
//! drops whatever lies outside the container. It runs on every packing.

use std::collections::VecDeque;

use log::debug;

use crate::geometry::{rests_on, within_container};
use crate::index::OccupancyIndex;
use crate::model::{ContainerSpec, Placement};
use crate::types::{Aabb, EPSILON_HEIGHT, Vec3};

/// For every placement, the indices of the placements resting directly on it.
fn dependents(placements: &[Placement], index: &OccupancyIndex) -> Vec<Vec<usize>> {
    let mut dependents = vec![Vec::new(); placements.len()];
    for (upper, p) in placements.iter().enumerate() {
        let bottom = p.position.y;
        if bottom <= EPSILON_HEIGHT {
            continue;
        }
        let end = p.end();
        let contact = Aabb::new(
            Vec3::new(p.position.x, (bottom - 1.0).max(0.0), p.position.z),
            Vec3::new(end.x, bottom + EPSILON_HEIGHT, end.z),
        );
        for lower in index.query(&contact) {
            if lower != upper && rests_on(p, &placements[lower], EPSILON_HEIGHT) {
                dependents[lower].push(upper);
            }
        }
    }
    dependents
}

/// Removes `root` and everything transitively resting on it.
fn remove_with_dependents(root: usize, dependents: &[Vec<usize>], alive: &mut [bool]) -> usize {
    let mut removed = 0;
    let mut queue = VecDeque::from([root]);
    while let Some(idx) = queue.pop_front() {
        if !alive[idx] {
            continue;
        }
        alive[idx] = false;
        removed += 1;
        queue.extend(dependents[idx].iter().copied().filter(|&d| alive[d]));
    }
    removed
}

/// Resolves overlaps and drops out-of-bounds placements.
///
/// While overlaps remain (and at most once per placement), the placement
/// involved in the most overlaps is removed together with every placement
/// transitively resting on it; ties go to the later placement. Survivors keep
/// their order, so an already valid layout is returned unchanged.
pub fn resolve_overlaps(placements: Vec<Placement>, container: &ContainerSpec) -> Vec<Placement> {
    let n = placements.len();
    let index = OccupancyIndex::from_placements(
        OccupancyIndex::cell_size_for(&placements),
        placements.iter().copied(),
    );

    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (i, p) in placements.iter().enumerate() {
        for j in index.overlapping(p) {
            if j > i {
                pairs.push((i, j));
            }
        }
    }

    let mut alive = vec![true; n];
    let mut removed = 0usize;
    if !pairs.is_empty() {
        let dependents = dependents(&placements, &index);
        let mut counts = vec![0usize; n];
        for _ in 0..n {
            counts.iter_mut().for_each(|c| *c = 0);
            for &(i, j) in &pairs {
                if alive[i] && alive[j] {
                    counts[i] += 1;
                    counts[j] += 1;
                }
            }
            let worst = counts
                .iter()
                .enumerate()
                .filter(|(_, c)| **c > 0)
                .max_by(|(ia, ca), (ib, cb)| ca.cmp(cb).then_with(|| ia.cmp(ib)))
                .map(|(i, _)| i);
            match worst {
                Some(idx) => removed += remove_with_dependents(idx, &dependents, &mut alive),
                None => break,
            }
        }
    }

    let before_bounds = alive.iter().filter(|a| **a).count();
    let result: Vec<Placement> = placements
        .into_iter()
        .zip(alive)
        .filter(|(p, keep)| *keep && within_container(p, container))
        .map(|(p, _)| p)
        .collect();

    debug!(
        "✅ Resolve: {} overlapping pairs, {} removed with dependents, {} out of bounds, {} kept",
        pairs.len(),
        removed,
        before_bounds - result.len(),
        result.len()
    );
    result
}

/// Checks that no two placements overlap and all lie inside the container.
pub fn is_valid_layout(placements: &[Placement], container: &ContainerSpec) -> bool {
    let index = OccupancyIndex::from_placements(
        OccupancyIndex::cell_size_for(placements),
        placements.iter().copied(),
    );
    placements.iter().enumerate().all(|(i, p)| {
        within_container(p, container) && index.overlapping(p).into_iter().all(|j| j == i)
    })
}
