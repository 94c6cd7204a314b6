//! Layer re-leveling.
//!
//! Mixed-height wall columns can leave vertical gaps once repeated. The leveler
//! regroups placements into horizontal lines and restacks the lines from the
//! floor up, longest line first.

use std::collections::BTreeMap;

use log::debug;

use crate::model::Placement;
use crate::types::{Axis, quantize};

/// Placements sharing a width and a height coordinate.
#[derive(Clone, Debug, Default)]
struct Line {
    members: Vec<Placement>,
}

impl Line {
    /// Covered extent along the length axis.
    fn span(&self) -> f64 {
        let start = self
            .members
            .iter()
            .map(|p| p.position.x)
            .fold(f64::INFINITY, f64::min);
        let end = self
            .members
            .iter()
            .map(|p| p.end().x)
            .fold(f64::NEG_INFINITY, f64::max);
        (end - start).max(0.0)
    }

    fn thickness(&self) -> f64 {
        self.members
            .iter()
            .map(|p| p.rotation.height)
            .fold(0.0, f64::max)
    }
}

/// Restacks the lines of every width group from height 0 upward.
///
/// Placements are grouped by their width coordinate, then by height coordinate.
/// Within a group the lines are emitted by descending span (ties keep their
/// bottom-up order) and each line consumes the height of its tallest member.
pub fn level_layers(placements: &[Placement]) -> Vec<Placement> {
    let mut groups: BTreeMap<i64, BTreeMap<i64, Line>> = BTreeMap::new();
    for p in placements {
        groups
            .entry(quantize(p.position.z))
            .or_default()
            .entry(quantize(p.position.y))
            .or_default()
            .members
            .push(*p);
    }

    let mut leveled = Vec::with_capacity(placements.len());
    let mut moved = 0usize;
    for lines in groups.into_values() {
        let mut lines: Vec<Line> = lines.into_values().collect();
        lines.sort_by(|a, b| b.span().total_cmp(&a.span()));

        let mut y = 0.0;
        for line in lines {
            let thickness = line.thickness();
            for p in line.members {
                if quantize(p.position.y) != quantize(y) {
                    moved += 1;
                }
                leveled.push(p.moved_to(Axis::Height, y));
            }
            y += thickness;
        }
    }

    debug!("📏 Level: {} placements, {} moved", leveled.len(), moved);
    leveled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Orientation;
    use crate::types::Vec3;

    fn place(x: f64, y: f64, z: f64, o: Orientation) -> Placement {
        Placement::new(Vec3::new(x, y, z), o)
    }

    #[test]
    fn longest_line_moves_to_the_floor() {
        let o = Orientation::new(100.0, 50.0, 100.0);
        let placements = vec![
            place(0.0, 0.0, 0.0, o),
            place(0.0, 50.0, 0.0, o),
            place(100.0, 50.0, 0.0, o),
            place(200.0, 50.0, 0.0, o),
        ];
        let leveled = level_layers(&placements);

        let floor: Vec<&Placement> = leveled.iter().filter(|p| p.position.y == 0.0).collect();
        assert_eq!(floor.len(), 3);
        let upper: Vec<&Placement> = leveled.iter().filter(|p| p.position.y == 50.0).collect();
        assert_eq!(upper.len(), 1);
    }

    #[test]
    fn vertical_gaps_are_closed() {
        let o = Orientation::new(100.0, 50.0, 100.0);
        let placements = vec![place(0.0, 0.0, 0.0, o), place(0.0, 80.0, 0.0, o)];
        let leveled = level_layers(&placements);
        let mut ys: Vec<f64> = leveled.iter().map(|p| p.position.y).collect();
        ys.sort_by(f64::total_cmp);
        assert_eq!(ys, vec![0.0, 50.0]);
    }

    #[test]
    fn line_height_is_its_tallest_member() {
        let low = Orientation::new(100.0, 40.0, 100.0);
        let high = Orientation::new(100.0, 70.0, 100.0);
        let placements = vec![
            place(0.0, 0.0, 0.0, low),
            place(100.0, 0.0, 0.0, high),
            place(0.0, 90.0, 0.0, low),
        ];
        let leveled = level_layers(&placements);
        let top_line = leveled.iter().find(|p| p.position.y > 0.0).unwrap();
        assert_eq!(top_line.position.y, 70.0);
    }

    #[test]
    fn width_groups_are_leveled_independently() {
        let o = Orientation::new(100.0, 50.0, 100.0);
        let placements = vec![place(0.0, 50.0, 0.0, o), place(0.0, 0.0, 100.0, o)];
        let leveled = level_layers(&placements);
        assert!(leveled.iter().all(|p| p.position.y == 0.0));
        assert_eq!(leveled.len(), 2);
    }
}
