//! Pipeline stages for intakes and matters.
//!
//! Stages are plain strings in storage. [`StageTracker::change_stage`] is the
//! only code path that writes them, and it validates against the union of
//! both flows.

pub mod stages;
pub mod tracker;

pub use stages::{MX_STAGES, PipelineFlow, PipelineStage, US_STAGES};
pub use tracker::{Board, BoardColumn, BoardItem, EntityKind, StageTracker};
