//! The source → city → percentage cascade and read-side reporting over its log.

pub mod engine;
pub mod selection;
pub mod stats;

pub use engine::{RoutingEngine, RoutingOutcome, RoutingSettings, DEFAULT_LOOKUP_TIMEOUT};
pub use selection::{
    select_weighted, total_weight, DrawSource, FixedDraw, SeededDraw, ThreadRngDraw,
};
pub use stats::{MethodCount, RepCount, RoutingStats, StatsWindow};
