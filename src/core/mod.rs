//! The core module of the packaging pipeline.
//!
//! This module contains the pieces every other module builds on:
//! - Configuration management and validation
//! - Constants used throughout the pipeline
//! - Error handling
//! - The boundary trait for the trained network
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod config;
pub mod constants;
pub mod errors;
pub mod traits;

pub use config::{
    CanvasConfig, ConfigError, ConfigValidator, LabelConfig, PackConfig, ParallelPolicy,
    PipelineConfig, SchedulerConfig,
};
pub use constants::*;
pub use errors::{PackError, PackResult};
pub use traits::InferenceModel;

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
