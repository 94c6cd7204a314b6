//! The loading pipeline for one box type in one container.
//!
//! `pack` runs the stages in a fixed order:
//! 1. Orientation enumeration
//! 2. Wall construction (bounded search over the cross-section)
//! 3. Repetition of the wall along the container length
//! 4. Layer re-leveling
//! 5. Compaction down, then left, then back
//! 6. Tail analysis and filling
//! 7. Overlap resolution and bounds validation
//!
//! Every stage takes the previous placement sequence and returns a new one.
//! The last stage always runs, so every result is free of overlaps and inside
//! the container.

use std::time::{Duration, Instant};

use log::debug;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::compactor::{Pull, compact};
use crate::geometry::generate_orientations;
use crate::leveler::level_layers;
use crate::model::{BoxSpec, ContainerSpec, PackResult, ValidationError};
use crate::repeater::repeat_pattern;
use crate::resolver::resolve_overlaps;
use crate::tail::{analyze_tail, grid_resolution};
use crate::tail_fill::fill_tail;
use crate::wall::{build_wall, candidate_closure};

/// Configuration of the packing pipeline.
///
/// Holds the search limits of the wall builder and the tolerances of the later stages.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Wall-clock budget of one wall search (`None` = unlimited)
    pub wall_time_budget: Option<Duration>,
    /// Maximum number of entries in one searched row or stack
    pub wall_max_depth: usize,
    /// Maximum number of expanded search nodes
    pub wall_max_nodes: usize,
    /// Size at which the visited-state table of a search is cleared
    pub wall_memo_capacity: usize,
    /// Maximum relaxation passes per compaction direction
    pub gravity_max_iterations: usize,
    /// Lower bound of the tail grid resolution in mm
    pub tail_grid_min: f64,
    /// Upper bound of the tail grid resolution in mm
    pub tail_grid_max: f64,
    /// Minimum supported share of a tail box footprint above the floor (0.0 to 1.0)
    pub support_ratio: f64,
    /// Whether boxes may be turned and tipped
    pub allow_rotation: bool,
    /// Whether the tail is analyzed and filled
    pub tail_fill: bool,
}

impl PackingConfig {
    pub const DEFAULT_WALL_TIME_BUDGET_MS: u64 = 1_000;
    pub const DEFAULT_WALL_MAX_DEPTH: usize = 30;
    pub const DEFAULT_WALL_MAX_NODES: usize = 250_000;
    pub const DEFAULT_WALL_MEMO_CAPACITY: usize = 200_000;
    pub const DEFAULT_GRAVITY_MAX_ITERATIONS: usize = 10;
    pub const DEFAULT_TAIL_GRID_MIN: f64 = 5.0;
    pub const DEFAULT_TAIL_GRID_MAX: f64 = 50.0;
    pub const DEFAULT_SUPPORT_RATIO: f64 = 0.5;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            wall_time_budget: Some(Duration::from_millis(Self::DEFAULT_WALL_TIME_BUDGET_MS)),
            wall_max_depth: Self::DEFAULT_WALL_MAX_DEPTH,
            wall_max_nodes: Self::DEFAULT_WALL_MAX_NODES,
            wall_memo_capacity: Self::DEFAULT_WALL_MEMO_CAPACITY,
            gravity_max_iterations: Self::DEFAULT_GRAVITY_MAX_ITERATIONS,
            tail_grid_min: Self::DEFAULT_TAIL_GRID_MIN,
            tail_grid_max: Self::DEFAULT_TAIL_GRID_MAX,
            support_ratio: Self::DEFAULT_SUPPORT_RATIO,
            allow_rotation: true,
            tail_fill: true,
        }
    }
}

/// Builder for [`PackingConfig`].
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    /// Sets the wall-clock budget of the wall search. `None` disables the deadline.
    pub fn wall_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.config.wall_time_budget = budget;
        self
    }

    pub fn wall_max_depth(mut self, depth: usize) -> Self {
        self.config.wall_max_depth = depth.max(1);
        self
    }

    /// Sets the node budget, the deterministic search limit.
    pub fn wall_max_nodes(mut self, nodes: usize) -> Self {
        self.config.wall_max_nodes = nodes;
        self
    }

    pub fn wall_memo_capacity(mut self, capacity: usize) -> Self {
        self.config.wall_memo_capacity = capacity;
        self
    }

    pub fn gravity_max_iterations(mut self, iterations: usize) -> Self {
        self.config.gravity_max_iterations = iterations;
        self
    }

    /// Sets the bounds of the tail grid resolution in mm.
    pub fn tail_grid(mut self, min: f64, max: f64) -> Self {
        self.config.tail_grid_min = min;
        self.config.tail_grid_max = max;
        self
    }

    /// Sets the minimum support ratio, clamped to `[0, 1]`.
    pub fn support_ratio(mut self, ratio: f64) -> Self {
        self.config.support_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn allow_rotation(mut self, allow: bool) -> Self {
        self.config.allow_rotation = allow;
        self
    }

    pub fn tail_fill(mut self, enabled: bool) -> Self {
        self.config.tail_fill = enabled;
        self
    }

    /// Creates the final configuration.
    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Error returned for inputs that must not be packed at all.
///
/// A box that is simply too large is not an error; it yields an empty result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PackError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
}

/// Pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Orientations,
    Wall,
    Repeat,
    Level,
    Compact,
    TailFill,
    Resolve,
}

/// Progress events of one packing run (suitable for SSE).
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum PackEvent {
    /// A stage finished; `boxes` is the size of its output.
    StageCompleted {
        stage: Stage,
        boxes: usize,
        elapsed_ms: u64,
    },
    /// Packing finished.
    Finished { total_boxes: usize },
}

/// Measures the time spent in each stage.
struct StageClock(Instant);

impl StageClock {
    fn start() -> Self {
        Self(Instant::now())
    }

    fn completed(&mut self, stage: Stage, boxes: usize) -> PackEvent {
        let elapsed_ms = self.0.elapsed().as_millis() as u64;
        self.0 = Instant::now();
        PackEvent::StageCompleted {
            stage,
            boxes,
            elapsed_ms,
        }
    }
}

/// Packs as many copies of `item` as possible into `container` with the default configuration.
///
/// # Parameters
/// * `item` - The box type, in mm
/// * `container` - The container, in mm
///
/// # Returns
/// The validated layout, empty if the box fits in no orientation, or
/// `PackError::InvalidInput` for non-positive or non-finite dimensions.
///
/// # Examples
/// ```
/// use load_it_now::model::{BoxSpec, ContainerSpec};
/// use load_it_now::optimizer::pack;
///
/// let item = BoxSpec::new(500.0, 500.0, 500.0).unwrap();
/// let container = ContainerSpec::new(1000.0, 1000.0, 1000.0, 100.0).unwrap();
/// assert_eq!(pack(&item, &container).unwrap().total_boxes, 8);
/// ```
pub fn pack(item: &BoxSpec, container: &ContainerSpec) -> Result<PackResult, PackError> {
    pack_with_config(item, container, &PackingConfig::default())
}

/// Like [`pack`], with a custom configuration.
pub fn pack_with_config(
    item: &BoxSpec,
    container: &ContainerSpec,
    config: &PackingConfig,
) -> Result<PackResult, PackError> {
    pack_with_progress(item, container, config, |_| {})
}

/// Like [`pack_with_config`], calling `on_event` after every stage.
pub fn pack_with_progress(
    item: &BoxSpec,
    container: &ContainerSpec,
    config: &PackingConfig,
    mut on_event: impl FnMut(&PackEvent),
) -> Result<PackResult, PackError> {
    item.validate()?;
    container.validate()?;

    let started = Instant::now();
    let mut clock = StageClock::start();

    let orientations = generate_orientations(item, container, config.allow_rotation);
    debug!("📐 {} orientation(s) fit the container", orientations.len());
    if orientations.is_empty() {
        on_event(&PackEvent::Finished { total_boxes: 0 });
        return Ok(PackResult::empty(item));
    }
    on_event(&clock.completed(Stage::Orientations, 0));

    let wall = build_wall(&orientations, container, config);
    on_event(&clock.completed(Stage::Wall, wall.placements.len()));

    let repeated = repeat_pattern(&wall.placements, container);
    on_event(&clock.completed(Stage::Repeat, repeated.len()));

    let leveled = level_layers(&repeated);
    on_event(&clock.completed(Stage::Level, leveled.len()));

    let mut compacted = leveled;
    for pull in [Pull::Down, Pull::Left, Pull::Back] {
        compacted = compact(&compacted, pull, config.gravity_max_iterations);
    }
    on_event(&clock.completed(Stage::Compact, compacted.len()));

    let mut combined = compacted;
    if config.tail_fill {
        let candidates = candidate_closure(&orientations, container, config.allow_rotation);
        let resolution = grid_resolution(item.min_edge(), config.tail_grid_min, config.tail_grid_max);
        let analysis = analyze_tail(&combined, container, resolution);
        let tail = fill_tail(&combined, &candidates, container, &analysis, config.support_ratio);
        on_event(&clock.completed(Stage::TailFill, tail.len()));
        combined.extend(tail);
    }

    let placements = resolve_overlaps(combined, container);
    on_event(&clock.completed(Stage::Resolve, placements.len()));

    let result = PackResult::new(placements, item);
    debug!(
        "📦 Packed {} boxes in {} ms",
        result.total_boxes,
        started.elapsed().as_millis()
    );
    on_event(&PackEvent::Finished {
        total_boxes: result.total_boxes,
    });
    Ok(result)
}
