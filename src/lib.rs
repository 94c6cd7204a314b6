//! Container loading for a single box type.
//!
//! [`optimizer::pack`] runs the full pipeline: orientation generation, a
//! budgeted wall search, pattern repetition, layer leveling, gravity
//! compaction, tail filling and a final overlap resolution pass. The HTTP
//! service in [`api`] wraps it together with the container catalog and the
//! batch driver.

pub mod api;
pub mod batch;
pub mod catalog;
pub mod compactor;
pub mod config;
pub mod geometry;
pub mod index;
pub mod leveler;
pub mod model;
pub mod optimizer;
pub mod repeater;
pub mod resolver;
pub mod tail;
pub mod tail_fill;
pub mod types;
pub mod units;
pub mod wall;
