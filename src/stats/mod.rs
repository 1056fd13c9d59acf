//! Statistics branch for aggregation queries

pub mod engine;

pub use engine::{plan, QueryShape, StatsEngine, StatsReport, TOP_N};
