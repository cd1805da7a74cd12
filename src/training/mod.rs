//! Training-loop helpers that run alongside the data path.
//!
//! * `checkpoint` - Metric-bearing checkpoint names and best-checkpoint selection
//! * `scheduler` - Warm-restart cosine learning-rate schedule

pub mod checkpoint;
pub mod scheduler;

pub use checkpoint::{Checkpoint, CheckpointMetrics, list_checkpoints, select_best};
pub use scheduler::{Segment, WarmRestartParams, WarmRestartScheduler};
