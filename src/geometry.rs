//! Geometric primitives for orientation enumeration and collision detection.
//!
//! `overlaps` is the single collision predicate of the engine; every later
//! stage (repetition, compaction, tail filling, validation) goes through it.

use crate::model::{BoxSpec, ContainerSpec, Orientation, Placement};
use crate::types::EPSILON;

/// Enumerates the distinct orientations of `item` that can stand in `container`.
///
/// An orientation is kept when its height fits the container height and its
/// horizontal footprint fits the floor either as is or turned by 90°.
/// Coinciding permutations (cubes, square faces) are reported once, in
/// first-seen order, so at most six entries are returned.
///
/// # Parameters
/// * `item` - The box to orient
/// * `container` - The container to fit into
/// * `allow_rotation` - When `false`, only the as-given orientation is considered
pub fn generate_orientations(
    item: &BoxSpec,
    container: &ContainerSpec,
    allow_rotation: bool,
) -> Vec<Orientation> {
    let upright = item.upright();
    let candidates: Vec<Orientation> = if allow_rotation {
        upright.permutations().to_vec()
    } else {
        vec![upright]
    };

    let mut orientations: Vec<Orientation> = Vec::with_capacity(6);
    for candidate in candidates {
        if !stands_in(&candidate, container) {
            continue;
        }
        if orientations.iter().any(|o| o.same_as(&candidate)) {
            continue;
        }
        orientations.push(candidate);
    }
    orientations
}

fn stands_in(o: &Orientation, container: &ContainerSpec) -> bool {
    if o.height > container.height + EPSILON {
        return false;
    }
    let straight = o.length <= container.length + EPSILON && o.width <= container.width + EPSILON;
    let turned = o.length <= container.width + EPSILON && o.width <= container.length + EPSILON;
    straight || turned
}

/// Checks whether two placements intersect with positive volume.
///
/// Uses half-open intervals on each axis: boxes that only share a face or an
/// edge do not overlap.
pub fn overlaps(a: &Placement, b: &Placement) -> bool {
    a.aabb().intersects(&b.aabb())
}

/// Length of the overlap of `[a1, a2)` and `[b1, b2)`, at least 0.0.
///
/// # Examples
/// ```
/// use load_it_now::geometry::overlap_1d;
///
/// assert_eq!(overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
/// assert_eq!(overlap_1d(0.0, 5.0, 5.0, 8.0), 0.0);
/// ```
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}

/// Overlap area of two placements in the floor (length × width) plane.
pub fn footprint_overlap_area(a: &Placement, b: &Placement) -> f64 {
    let (a_min, a_max) = (a.position, a.end());
    let (b_min, b_max) = (b.position, b.end());
    overlap_1d(a_min.x, a_max.x, b_min.x, b_max.x) * overlap_1d(a_min.z, a_max.z, b_min.z, b_max.z)
}

/// Checks whether `b` rests directly on top of `a` (bottom face meets top face
/// within `tolerance` and the footprints intersect).
pub fn rests_on(b: &Placement, a: &Placement, tolerance: f64) -> bool {
    (b.position.y - a.top()).abs() <= tolerance && footprint_overlap_area(a, b) > EPSILON
}

/// Checks whether the placement lies completely inside the container.
pub fn within_container(p: &Placement, container: &ContainerSpec) -> bool {
    p.aabb().is_within(&container.bounds())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EPSILON_HEIGHT, Vec3};

    fn container(l: f64, w: f64, h: f64) -> ContainerSpec {
        ContainerSpec::new(l, w, h, 1000.0).unwrap()
    }

    #[test]
    fn distinct_box_yields_six_orientations() {
        let item = BoxSpec::new(100.0, 200.0, 300.0).unwrap();
        let orientations = generate_orientations(&item, &container(1000.0, 1000.0, 1000.0), true);
        assert_eq!(orientations.len(), 6);
        assert_eq!(orientations[0], item.upright());
    }

    #[test]
    fn cube_collapses_to_one_orientation() {
        let item = BoxSpec::new(100.0, 100.0, 100.0).unwrap();
        let orientations = generate_orientations(&item, &container(1000.0, 1000.0, 1000.0), true);
        assert_eq!(orientations.len(), 1);
    }

    #[test]
    fn square_face_collapses_to_three_orientations() {
        let item = BoxSpec::new(100.0, 100.0, 300.0).unwrap();
        let orientations = generate_orientations(&item, &container(1000.0, 1000.0, 1000.0), true);
        assert_eq!(orientations.len(), 3);
    }

    #[test]
    fn orientations_taller_than_container_are_dropped() {
        let item = BoxSpec::new(100.0, 200.0, 300.0).unwrap();
        let low = container(1000.0, 1000.0, 250.0);
        let orientations = generate_orientations(&item, &low, true);
        assert!(!orientations.is_empty());
        assert!(orientations.iter().all(|o| o.height <= 250.0));
        assert_eq!(orientations.len(), 4);
    }

    #[test]
    fn footprint_may_fit_turned() {
        // 900 long only fits across the 1000 wide floor of a 500 long container.
        let item = BoxSpec::new(900.0, 100.0, 100.0).unwrap();
        let short = container(500.0, 1000.0, 1000.0);
        let orientations = generate_orientations(&item, &short, true);
        assert!(orientations.iter().any(|o| o.length == 900.0 && o.height == 100.0));
        for o in &orientations {
            let straight = o.length <= 500.0 && o.width <= 1000.0;
            let turned = o.length <= 1000.0 && o.width <= 500.0;
            assert!(straight || turned);
        }
    }

    #[test]
    fn oversized_box_has_no_orientation() {
        let item = BoxSpec::new(2000.0, 2000.0, 2000.0).unwrap();
        assert!(generate_orientations(&item, &container(1000.0, 1000.0, 1000.0), true).is_empty());
    }

    #[test]
    fn disabled_rotation_keeps_upright_only() {
        let item = BoxSpec::new(100.0, 200.0, 300.0).unwrap();
        let orientations = generate_orientations(&item, &container(1000.0, 1000.0, 1000.0), false);
        assert_eq!(orientations, vec![item.upright()]);
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        let o = Orientation::new(10.0, 10.0, 10.0);
        let a = Placement::new(Vec3::zero(), o);
        let b = Placement::new(Vec3::new(10.0, 0.0, 0.0), o);
        let c = Placement::new(Vec3::new(9.0, 9.0, 9.0), o);
        assert!(!overlaps(&a, &b));
        assert!(overlaps(&a, &c));
        assert!(overlaps(&c, &a));
    }

    #[test]
    fn rests_on_requires_contact_and_footprint() {
        let o = Orientation::new(10.0, 10.0, 10.0);
        let base = Placement::new(Vec3::zero(), o);
        let on_top = Placement::new(Vec3::new(5.0, 10.0, 0.0), o);
        let beside = Placement::new(Vec3::new(10.0, 10.0, 0.0), o);
        assert!(rests_on(&on_top, &base, EPSILON_HEIGHT));
        assert!(!rests_on(&beside, &base, EPSILON_HEIGHT));
        assert!((footprint_overlap_area(&base, &on_top) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn containment_detects_out_of_bounds() {
        let c = container(100.0, 100.0, 100.0);
        let o = Orientation::new(50.0, 50.0, 50.0);
        assert!(within_container(&Placement::new(Vec3::new(50.0, 50.0, 50.0), o), &c));
        assert!(!within_container(&Placement::new(Vec3::new(60.0, 0.0, 0.0), o), &c));
        assert!(!within_container(&Placement::new(Vec3::new(-1.0, 0.0, 0.0), o), &c));
    }
}
