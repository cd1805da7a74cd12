//! Utility functions shared across the pipeline.

pub mod image;

pub use self::image::{DimensionSurvey, load_image, survey_dimensions};
