//! The grid model: price ladder, per-level state machine, pairing, and sizing.

mod geometry;
mod level;
mod model;

pub use geometry::build_ladder;
pub use level::{GridLevel, LevelState};
pub use model::Grid;
