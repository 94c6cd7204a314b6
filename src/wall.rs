//! Wall construction: the cross-section pattern at length offset 0.
//!
//! The wall is chosen in two steps. A bounded depth-first search lays
//! orientations side by side across the container width and keeps the row with
//! the largest height × width area. Each entry of that row is then grown into a
//! vertical column by a second bounded search over orientations of the same
//! width. Both searches stop at a deadline, a depth cap or a node budget and
//! then keep the best layout found so far.

use std::collections::HashSet;
use std::time::Instant;

use log::debug;

use crate::geometry::{overlaps, within_container};
use crate::model::{ContainerSpec, Orientation, Placement};
use crate::optimizer::PackingConfig;
use crate::types::{EPSILON, Vec3, quantize};

/// Limits of one search invocation.
#[derive(Clone, Copy, Debug)]
pub struct SearchBudget {
    deadline: Option<Instant>,
    max_depth: usize,
    max_nodes: usize,
    memo_capacity: usize,
}

impl SearchBudget {
    /// Starts a budget now, using the wall limits of `config`.
    pub fn start(config: &PackingConfig) -> Self {
        Self {
            deadline: config.wall_time_budget.map(|budget| Instant::now() + budget),
            max_depth: config.wall_max_depth,
            max_nodes: config.wall_max_nodes,
            memo_capacity: config.wall_memo_capacity,
        }
    }

    fn exhausted(&self, nodes: usize) -> bool {
        if nodes >= self.max_nodes {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

/// Outcome counters of one search, for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: usize,
    pub truncated: bool,
    pub evictions: usize,
}

/// Visited partial layouts of one search, keyed by the sorted multiset of
/// (height, width) signatures. Cleared when it reaches its capacity.
struct VisitedStates {
    seen: HashSet<Vec<(i64, i64)>>,
    capacity: usize,
    evictions: usize,
}

impl VisitedStates {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            capacity: capacity.max(1),
            evictions: 0,
        }
    }

    /// Returns `true` if the state was not seen before.
    fn insert(&mut self, key: Vec<(i64, i64)>) -> bool {
        if self.seen.len() >= self.capacity {
            self.seen.clear();
            self.evictions += 1;
        }
        self.seen.insert(key)
    }
}

fn signature(seq: &[usize], items: &[Orientation]) -> Vec<(i64, i64)> {
    let mut key: Vec<(i64, i64)> = seq
        .iter()
        .map(|&i| (quantize(items[i].height), quantize(items[i].width)))
        .collect();
    key.sort_unstable();
    key
}

#[derive(Clone)]
struct Frame {
    seq: Vec<usize>,
    used: f64,
    area: f64,
}

/// Bounded search for the sequence of `items` with the largest cross-section
/// area whose summed `cost` stays within `capacity`.
///
/// Items are tried in slice order, so callers put the preferred ones first.
fn bounded_search(
    items: &[Orientation],
    capacity: f64,
    cost: impl Fn(&Orientation) -> f64,
    budget: &SearchBudget,
) -> (Vec<usize>, SearchStats) {
    let mut stats = SearchStats::default();
    if items.is_empty() {
        return (Vec::new(), stats);
    }

    let max_density = items
        .iter()
        .map(|o| o.cross_section() / cost(o))
        .fold(0.0, f64::max);

    let mut visited = VisitedStates::new(budget.memo_capacity);
    let mut best = Frame {
        seq: Vec::new(),
        used: 0.0,
        area: 0.0,
    };
    let mut work = vec![best.clone()];

    while let Some(frame) = work.pop() {
        if budget.exhausted(stats.nodes) {
            stats.truncated = true;
            break;
        }
        stats.nodes += 1;

        if frame.area > best.area + EPSILON {
            best = frame.clone();
        }
        if frame.seq.len() >= budget.max_depth {
            continue;
        }

        let remaining = capacity - frame.used;
        if frame.area + remaining * max_density <= best.area + EPSILON {
            continue;
        }

        // Reverse push: the first item is expanded first.
        for (idx, item) in items.iter().enumerate().rev() {
            let step = cost(item);
            if step > remaining + EPSILON {
                continue;
            }
            let mut seq = frame.seq.clone();
            seq.push(idx);
            if !visited.insert(signature(&seq, items)) {
                continue;
            }
            work.push(Frame {
                seq,
                used: frame.used + step,
                area: frame.area + item.cross_section(),
            });
        }
    }

    stats.evictions = visited.evictions;
    let mut seq = best.seq;
    complete_greedily(&mut seq, items, capacity, &cost);
    (seq, stats)
}

/// Fills capacity left over by a depth-capped search with the densest item
/// that still fits, repeatedly.
fn complete_greedily(
    seq: &mut Vec<usize>,
    items: &[Orientation],
    capacity: f64,
    cost: &impl Fn(&Orientation) -> f64,
) {
    let mut used: f64 = seq.iter().map(|&i| cost(&items[i])).sum();
    loop {
        let remaining = capacity - used;
        let next = items
            .iter()
            .enumerate()
            .filter(|(_, o)| cost(o) <= remaining + EPSILON)
            .max_by(|(ia, a), (ib, b)| {
                a.cross_section()
                    .total_cmp(&b.cross_section())
                    .then_with(|| ib.cmp(ia))
            })
            .map(|(i, _)| i);
        match next {
            Some(i) => {
                used += cost(&items[i]);
                seq.push(i);
            }
            None => break,
        }
    }
}

/// The chosen cross-section row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WallLayout {
    /// Entries in order across the container width.
    pub entries: Vec<Orientation>,
    /// Sum of the entries' height × width.
    pub area: f64,
}

/// A wall at length offset 0: the row layout and its realized column placements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Wall {
    pub layout: WallLayout,
    pub placements: Vec<Placement>,
    pub stats: SearchStats,
}

impl Wall {
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Builds the search candidates: the 6-permutation closure of `orientations`,
/// de-duplicated, limited to what fits `container` on every axis and sorted by
/// descending width, then descending height.
pub fn candidate_closure(
    orientations: &[Orientation],
    container: &ContainerSpec,
    close_over_rotations: bool,
) -> Vec<Orientation> {
    let mut candidates: Vec<Orientation> = Vec::new();
    for o in orientations {
        let family: Vec<Orientation> = if close_over_rotations {
            o.permutations().to_vec()
        } else {
            vec![*o]
        };
        for candidate in family {
            if candidate.fits(container) && !candidates.iter().any(|c| c.same_as(&candidate)) {
                candidates.push(candidate);
            }
        }
    }
    candidates.sort_by(|a, b| {
        b.width
            .total_cmp(&a.width)
            .then_with(|| b.height.total_cmp(&a.height))
    });
    candidates
}

/// Searches the cross-section row across the container width.
pub fn search_row(
    candidates: &[Orientation],
    container: &ContainerSpec,
    budget: &SearchBudget,
) -> (WallLayout, SearchStats) {
    let (seq, stats) = bounded_search(candidates, container.width, |o| o.width, budget);
    let entries: Vec<Orientation> = seq.iter().map(|&i| candidates[i]).collect();
    let area = entries.iter().map(Orientation::cross_section).sum();
    (WallLayout { entries, area }, stats)
}

/// Searches the tallest-density stack of orientations sharing `entry`'s width.
/// Returned bottom-up.
pub fn search_stack(
    entry: &Orientation,
    candidates: &[Orientation],
    container: &ContainerSpec,
    budget: &SearchBudget,
) -> Vec<Orientation> {
    let same_width: Vec<Orientation> = candidates
        .iter()
        .filter(|c| (c.width - entry.width).abs() <= EPSILON)
        .copied()
        .collect();
    let (seq, _) = bounded_search(&same_width, container.height, |o| o.height, budget);
    if seq.is_empty() {
        return vec![*entry];
    }
    seq.iter().map(|&i| same_width[i]).collect()
}

/// Builds the wall for `orientations` inside `container`.
///
/// Returns an empty wall when nothing fits.
pub fn build_wall(
    orientations: &[Orientation],
    container: &ContainerSpec,
    config: &PackingConfig,
) -> Wall {
    let candidates = candidate_closure(orientations, container, config.allow_rotation);
    if candidates.is_empty() {
        debug!("🧱 Wall: no orientation fits the container");
        return Wall::default();
    }

    let (layout, stats) = search_row(&candidates, container, &SearchBudget::start(config));

    let mut placements: Vec<Placement> = Vec::new();
    let mut z = 0.0;
    for entry in &layout.entries {
        let stack = search_stack(entry, &candidates, container, &SearchBudget::start(config));
        let mut y = 0.0;
        for rotation in stack {
            let candidate = Placement::new(Vec3::new(0.0, y, z), rotation);
            y += rotation.height;
            if !within_container(&candidate, container) {
                continue;
            }
            if placements.iter().any(|p| overlaps(p, &candidate)) {
                continue;
            }
            placements.push(candidate);
        }
        z += entry.width;
    }

    debug!(
        "🧱 Wall: {} columns, {} boxes, area {:.0} mm², {} nodes{}",
        layout.entries.len(),
        placements.len(),
        layout.area,
        stats.nodes,
        if stats.truncated { " (budget reached)" } else { "" }
    );

    Wall {
        layout,
        placements,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::generate_orientations;
    use crate::model::BoxSpec;

    fn high_cube() -> ContainerSpec {
        ContainerSpec::new(12030.0, 2340.0, 2700.0, 26500.0).unwrap()
    }

    fn wall_for(item: &BoxSpec, container: &ContainerSpec) -> Wall {
        let config = PackingConfig::default();
        let orientations = generate_orientations(item, container, true);
        build_wall(&orientations, container, &config)
    }

    #[test]
    fn closure_is_sorted_by_descending_width() {
        let container = high_cube();
        let candidates = candidate_closure(&[Orientation::new(794.0, 870.0, 491.0)], &container, true);
        assert_eq!(candidates.len(), 6);
        for pair in candidates.windows(2) {
            assert!(pair[0].width >= pair[1].width);
        }
        assert_eq!(candidates[0].width, 870.0);
    }

    #[test]
    fn row_search_finds_best_cross_section() {
        let item = BoxSpec::new(794.0, 491.0, 870.0).unwrap();
        let wall = wall_for(&item, &high_cube());

        // Three 491 wide columns plus one 794 wide column, all 870 tall.
        assert!((wall.layout.area - 870.0 * 2267.0).abs() < 1e-6);
        let mut widths: Vec<f64> = wall.layout.entries.iter().map(|e| e.width).collect();
        widths.sort_by(f64::total_cmp);
        assert_eq!(widths, vec![491.0, 491.0, 491.0, 794.0]);
        assert!(!wall.stats.truncated);
    }

    #[test]
    fn columns_are_stacked_bottom_up_without_overlap() {
        let item = BoxSpec::new(794.0, 491.0, 870.0).unwrap();
        let container = high_cube();
        let wall = wall_for(&item, &container);

        assert_eq!(wall.placements.len(), 12);
        for (i, a) in wall.placements.iter().enumerate() {
            assert_eq!(a.position.x, 0.0);
            assert!(within_container(a, &container));
            for b in &wall.placements[i + 1..] {
                assert!(!overlaps(a, b));
            }
        }
        assert!(wall.placements.iter().all(|p| p.rotation.height == 870.0));
    }

    #[test]
    fn stack_search_maximizes_used_height() {
        let container = ContainerSpec::new(5900.0, 2340.0, 2390.0, 28000.0).unwrap();
        let candidates = candidate_closure(&[Orientation::new(1000.0, 500.0, 800.0)], &container, true);
        let entry = Orientation::new(500.0, 800.0, 1000.0);
        let stack = search_stack(
            &entry,
            &candidates,
            &container,
            &SearchBudget::start(&PackingConfig::default()),
        );
        let used: f64 = stack.iter().map(|o| o.height).sum();
        assert_eq!(used, 2300.0);
        assert!(stack.iter().all(|o| o.width == 1000.0));
    }

    #[test]
    fn empty_wall_when_nothing_fits() {
        let container = ContainerSpec::new(100.0, 100.0, 100.0, 10.0).unwrap();
        let wall = build_wall(&[Orientation::new(200.0, 200.0, 200.0)], &container, &PackingConfig::default());
        assert!(wall.is_empty());
        assert!(wall.layout.entries.is_empty());
    }

    #[test]
    fn exhausted_budget_still_returns_a_filled_row() {
        let config = PackingConfig::builder().wall_max_nodes(1).build();
        let container = high_cube();
        let item = BoxSpec::new(794.0, 491.0, 870.0).unwrap();
        let orientations = generate_orientations(&item, &container, true);
        let wall = build_wall(&orientations, &container, &config);

        assert!(wall.stats.truncated);
        assert!(!wall.is_empty());
        let used: f64 = wall.layout.entries.iter().map(|e| e.width).sum();
        assert!(used <= container.width + EPSILON);
    }

    #[test]
    fn depth_cap_is_completed_greedily() {
        let config = PackingConfig::builder().wall_max_depth(3).build();
        let container = ContainerSpec::new(1000.0, 1000.0, 100.0, 10.0).unwrap();
        let wall = build_wall(&[Orientation::new(100.0, 100.0, 100.0)], &container, &config);
        assert_eq!(wall.layout.entries.len(), 10);
    }
}
