//! Gravity-style compaction toward the container origin.

use log::debug;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::index::OccupancyIndex;
use crate::model::Placement;
use crate::types::{Aabb, Axis, EPSILON};

/// Direction of a compaction pass. Every pull moves boxes toward the origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Pull {
    /// Toward the floor (height axis).
    Down,
    /// Toward the back wall (length axis).
    Left,
    /// Toward the side wall at width 0.
    Back,
}

impl Pull {
    pub const fn axis(self) -> Axis {
        match self {
            Pull::Down => Axis::Height,
            Pull::Left => Axis::Length,
            Pull::Back => Axis::Width,
        }
    }
}

/// Region between the origin plane and `p` along `axis`, sharing `p`'s
/// extent on the two other axes.
fn shadow(p: &Placement, axis: Axis) -> Aabb {
    let aabb = p.aabb();
    Aabb::new(aabb.min.with(axis, 0.0), aabb.max.with(axis, p.position.get(axis)))
}

/// One relaxation pass. Returns the new positions and whether anything moved.
fn relax(placements: &[Placement], axis: Axis, cell_size: f64) -> (Vec<Placement>, bool) {
    let mut order: Vec<usize> = (0..placements.len()).collect();
    order.sort_by(|&a, &b| {
        placements[a]
            .position
            .get(axis)
            .total_cmp(&placements[b].position.get(axis))
            .then_with(|| a.cmp(&b))
    });

    let mut settled = OccupancyIndex::new(cell_size);
    let mut result = placements.to_vec();
    let mut moved = false;

    for idx in order {
        let current = placements[idx];
        let pos = current.position.get(axis);

        let mut target = 0.0;
        let mut blocked = false;
        if pos > EPSILON {
            for hit in settled.query(&shadow(&current, axis)) {
                let Some(obstacle) = settled.get(hit) else {
                    continue;
                };
                let edge = obstacle.end().get(axis);
                if edge > pos + EPSILON {
                    // Already intersecting this obstacle.
                    blocked = true;
                    break;
                }
                target = f64::max(target, edge);
            }
        }

        let next = if !blocked && target < pos - EPSILON {
            moved = true;
            current.moved_to(axis, target)
        } else {
            current
        };
        settled.insert(next);
        result[idx] = next;
    }

    (result, moved)
}

/// Pulls every placement toward the origin along `pull`'s axis.
///
/// A pass handles boxes in ascending position along the axis and snaps each to
/// the farthest edge of an already settled box that shares its footprint on the
/// two other axes and lies behind it, or to 0. A box that already intersects
/// a settled box stays where it is. Passes repeat until nothing moves or
/// `max_iterations` passes have run. The output keeps the input order.
pub fn compact(placements: &[Placement], pull: Pull, max_iterations: usize) -> Vec<Placement> {
    let axis = pull.axis();
    let cell_size = OccupancyIndex::cell_size_for(placements);
    let mut current = placements.to_vec();
    let mut passes = 0;

    while passes < max_iterations.max(1) {
        let (next, moved) = relax(&current, axis, cell_size);
        current = next;
        passes += 1;
        if !moved {
            break;
        }
    }

    debug!("🧲 Compact {:?}: {} placements in {} passes", pull, current.len(), passes);
    current
}
