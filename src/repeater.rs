//! Longitudinal repetition of the wall.

use log::debug;

use crate::index::OccupancyIndex;
use crate::model::{ContainerSpec, Placement};
use crate::types::{Axis, EPSILON};

/// Tiles the wall along the container length.
///
/// Every wall placement is copied at offsets `0, l, 2l, …` (with `l` its own
/// length extent) as long as the copy ends inside the container. Copies that
/// would overlap an already accepted placement, including copies of other wall
/// elements, are skipped and the sweep goes on with the next offset.
/// Placements are processed in wall order.
pub fn repeat_pattern(wall: &[Placement], container: &ContainerSpec) -> Vec<Placement> {
    let mut index = OccupancyIndex::new(OccupancyIndex::cell_size_for(wall));
    let mut rejected = 0usize;

    for placement in wall {
        let step = placement.rotation.length;
        let mut k = 0usize;
        loop {
            let x = placement.position.x + step * k as f64;
            if x + step > container.length + EPSILON {
                break;
            }
            let copy = placement.moved_to(Axis::Length, x);
            if index.collides(&copy) {
                rejected += 1;
            } else {
                index.insert(copy);
            }
            k += 1;
        }
    }

    debug!(
        "🔁 Repeat: {} wall boxes → {} placements ({} copies rejected)",
        wall.len(),
        index.len(),
        rejected
    );
    index.into_placements()
}
