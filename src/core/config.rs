//! Pipeline configuration and validation.
//!
//! [`PipelineConfig`] gathers every knob of the packaging and decoding path.
//! All fields carry serde defaults so a partial JSON file is enough:
//!
//! ```rust
//! use captcha_pack::core::config::{ConfigValidator, PipelineConfig};
//! use captcha_pack::domain::LabelingMode;
//!
//! let config: PipelineConfig =
//!     serde_json::from_str(r#"{ "label": { "mode": "CTC" } }"#).unwrap();
//! assert_eq!(config.label.mode, LabelingMode::Sequence);
//! assert_eq!(config.canvas.height, 80);
//! config.validate().unwrap();
//! ```

use crate::core::constants::*;
use crate::core::errors::PackResult;
use crate::domain::LabelingMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error indicating that a configuration value is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Error indicating that a scheduler invariant is violated.
    #[error("invalid schedule: {message}")]
    InvalidSchedule { message: String },
}

impl ConfigError {
    /// Creates an invalid configuration error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid schedule error.
    pub fn schedule(message: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            message: message.into(),
        }
    }
}

/// A trait for validating configuration parameters.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Validates image dimensions.
    ///
    /// This method checks that image dimensions are positive.
    fn validate_image_dimensions(&self, width: u32, height: u32) -> Result<(), ConfigError> {
        if width == 0 || height == 0 {
            Err(ConfigError::invalid(format!(
                "canvas dimensions must be positive, got {width}x{height}"
            )))
        } else {
            Ok(())
        }
    }

    /// Validates that a count is non-zero.
    fn validate_positive_count(&self, name: &str, value: usize) -> Result<(), ConfigError> {
        if value == 0 {
            Err(ConfigError::invalid(format!("{name} must be greater than 0")))
        } else {
            Ok(())
        }
    }

    /// Validates that a rate is finite and strictly positive.
    fn validate_positive_rate(&self, name: &str, value: f64) -> Result<(), ConfigError> {
        if !value.is_finite() || value <= 0.0 {
            Err(ConfigError::invalid(format!(
                "{name} must be a positive finite number, got {value}"
            )))
        } else {
            Ok(())
        }
    }

    /// Validates that a fraction lies in `[0, 1]`.
    fn validate_fraction(&self, name: &str, value: f64) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&value) {
            Err(ConfigError::invalid(format!(
                "{name} must be between 0.0 and 1.0, got {value}"
            )))
        } else {
            Ok(())
        }
    }
}

/// Canvas geometry and storage codec settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Canvas height in pixels.
    #[serde(default = "CanvasConfig::default_height")]
    pub height: u32,
    /// Canvas width in pixels.
    #[serde(default = "CanvasConfig::default_width")]
    pub width: u32,
    /// JPEG quality used when a canvas is stored in a shard.
    #[serde(default = "CanvasConfig::default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl CanvasConfig {
    fn default_height() -> u32 {
        DEFAULT_CANVAS_HEIGHT
    }

    fn default_width() -> u32 {
        DEFAULT_CANVAS_WIDTH
    }

    fn default_jpeg_quality() -> u8 {
        DEFAULT_JPEG_QUALITY
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            height: Self::default_height(),
            width: Self::default_width(),
            jpeg_quality: Self::default_jpeg_quality(),
        }
    }
}

impl ConfigValidator for CanvasConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_image_dimensions(self.width, self.height)?;
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Label extraction and vectorization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Labeling mode.
    #[serde(default)]
    pub mode: LabelingMode,
    /// Fixed label capacity for the per-character mode.
    #[serde(default = "LabelConfig::default_max_length")]
    pub max_length: usize,
    /// Character at which filename stems are truncated, if any.
    #[serde(default = "LabelConfig::default_separator")]
    pub separator: Option<char>,
    /// Location of the persisted vocabulary.
    #[serde(default = "LabelConfig::default_vocabulary_path")]
    pub vocabulary_path: PathBuf,
}

impl LabelConfig {
    fn default_max_length() -> usize {
        DEFAULT_MAX_LABEL_LENGTH
    }

    fn default_separator() -> Option<char> {
        Some(DEFAULT_LABEL_SEPARATOR)
    }

    fn default_vocabulary_path() -> PathBuf {
        PathBuf::from(DEFAULT_VOCABULARY_FILE)
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            mode: LabelingMode::default(),
            max_length: Self::default_max_length(),
            separator: Self::default_separator(),
            vocabulary_path: Self::default_vocabulary_path(),
        }
    }
}

impl ConfigValidator for LabelConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == LabelingMode::PerCharacter {
            self.validate_positive_count("max_length", self.max_length)?;
        }
        Ok(())
    }
}

/// Shard packaging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackConfig {
    /// Maximum number of records per shard.
    #[serde(default = "PackConfig::default_shard_size")]
    pub shard_size: usize,
    /// Shard file extension, without the dot.
    #[serde(default = "PackConfig::default_shard_extension")]
    pub shard_extension: String,
    /// Seed for a deterministic shuffle of the sample list. `None` keeps input order.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
    /// Skip shards that are already complete on disk.
    #[serde(default = "PackConfig::default_resume")]
    pub resume: bool,
}

impl PackConfig {
    fn default_shard_size() -> usize {
        DEFAULT_SHARD_SIZE
    }

    fn default_shard_extension() -> String {
        DEFAULT_SHARD_EXTENSION.to_string()
    }

    fn default_resume() -> bool {
        true
    }
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            shard_size: Self::default_shard_size(),
            shard_extension: Self::default_shard_extension(),
            shuffle_seed: None,
            resume: Self::default_resume(),
        }
    }
}

impl ConfigValidator for PackConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_positive_count("shard_size", self.shard_size)?;
        if self.shard_extension.is_empty() || self.shard_extension.contains('.') {
            return Err(ConfigError::invalid(format!(
                "shard_extension must be a non-empty name without dots, got '{}'",
                self.shard_extension
            )));
        }
        Ok(())
    }
}

/// Worker pool sizing for image normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelPolicy {
    /// Maximum number of threads to use for parallel processing.
    /// If None, rayon will use the default thread pool size (typically number of CPU cores).
    #[serde(default)]
    pub max_threads: Option<usize>,
}

impl ParallelPolicy {
    /// Create a new ParallelPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of threads.
    pub fn with_max_threads(mut self, max_threads: Option<usize>) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Builds a dedicated rayon pool honoring `max_threads`.
    pub fn build_pool(&self) -> Result<rayon::ThreadPool, ConfigError> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("pack-{i}"));
        if let Some(threads) = self.max_threads {
            builder = builder.num_threads(threads);
        }
        builder
            .build()
            .map_err(|e| ConfigError::invalid(format!("unable to build worker pool: {e}")))
    }
}

impl ConfigValidator for ParallelPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threads) = self.max_threads {
            self.validate_positive_count("max_threads", threads)?;
        }
        Ok(())
    }
}

/// Training parameters the learning-rate schedule is derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Peak learning rate.
    #[serde(default = "SchedulerConfig::default_learning_rate")]
    pub learning_rate: f64,
    /// Number of training epochs.
    #[serde(default = "SchedulerConfig::default_epochs")]
    pub epochs: usize,
    /// Samples per optimization step.
    #[serde(default = "SchedulerConfig::default_batch_size")]
    pub batch_size: usize,
    /// Share of epochs spent warming up.
    #[serde(default = "SchedulerConfig::default_warmup_fraction")]
    pub warmup_fraction: f64,
    /// Warm-up starting rate as a multiple of the peak rate.
    #[serde(default = "SchedulerConfig::default_warmup_factor")]
    pub warmup_factor: f64,
    /// Learning-rate floor as a multiple of the peak rate.
    #[serde(default = "SchedulerConfig::default_min_factor")]
    pub min_factor: f64,
}

impl SchedulerConfig {
    fn default_learning_rate() -> f64 {
        1e-4
    }

    fn default_epochs() -> usize {
        200
    }

    fn default_batch_size() -> usize {
        16
    }

    fn default_warmup_fraction() -> f64 {
        0.2
    }

    fn default_warmup_factor() -> f64 {
        0.1
    }

    fn default_min_factor() -> f64 {
        0.2
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            learning_rate: Self::default_learning_rate(),
            epochs: Self::default_epochs(),
            batch_size: Self::default_batch_size(),
            warmup_fraction: Self::default_warmup_fraction(),
            warmup_factor: Self::default_warmup_factor(),
            min_factor: Self::default_min_factor(),
        }
    }
}

impl ConfigValidator for SchedulerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_positive_rate("learning_rate", self.learning_rate)?;
        self.validate_positive_count("epochs", self.epochs)?;
        self.validate_positive_count("batch_size", self.batch_size)?;
        self.validate_fraction("warmup_fraction", self.warmup_fraction)?;
        self.validate_fraction("warmup_factor", self.warmup_factor)?;
        self.validate_fraction("min_factor", self.min_factor)?;
        Ok(())
    }
}

/// Complete configuration of the packaging and decoding pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Canvas settings.
    #[serde(default)]
    pub canvas: CanvasConfig,
    /// Label settings.
    #[serde(default)]
    pub label: LabelConfig,
    /// Shard settings.
    #[serde(default)]
    pub pack: PackConfig,
    /// Worker pool settings.
    #[serde(default)]
    pub parallel: ParallelPolicy,
    /// Learning-rate schedule settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl PipelineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and validates a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> PackResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the labeling mode.
    pub fn with_mode(mut self, mode: LabelingMode) -> Self {
        self.label.mode = mode;
        self
    }

    /// Sets the canvas dimensions.
    pub fn with_canvas_size(mut self, height: u32, width: u32) -> Self {
        self.canvas.height = height;
        self.canvas.width = width;
        self
    }

    /// Sets the per-character label capacity.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.label.max_length = max_length;
        self
    }

    /// Sets the vocabulary file location.
    pub fn with_vocabulary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.label.vocabulary_path = path.into();
        self
    }

    /// Sets the maximum number of records per shard.
    pub fn with_shard_size(mut self, shard_size: usize) -> Self {
        self.pack.shard_size = shard_size;
        self
    }
}

impl ConfigValidator for PipelineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.canvas.validate()?;
        self.label.validate()?;
        self.pack.validate()?;
        self.parallel.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.canvas.width, 240);
        assert_eq!(config.label.max_length, 8);
        assert_eq!(config.label.separator, Some('_'));
        assert_eq!(config.pack.shard_size, 10_000);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "canvas": { "height": 64 }, "label": { "mode": "WholeLabel", "separator": null } }"#,
        )
        .unwrap();
        assert_eq!(config.canvas.height, 64);
        assert_eq!(config.canvas.width, 240);
        assert_eq!(config.label.mode, LabelingMode::WholeLabel);
        assert_eq!(config.label.separator, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_canvas = PipelineConfig::new().with_canvas_size(0, 10);
        assert!(zero_canvas.validate().is_err());

        let mut bad_quality = PipelineConfig::new();
        bad_quality.canvas.jpeg_quality = 0;
        assert!(bad_quality.validate().is_err());

        let zero_shards = PipelineConfig::new().with_shard_size(0);
        assert!(zero_shards.validate().is_err());

        let zero_length = PipelineConfig::new().with_max_length(0);
        assert!(zero_length.validate().is_err());

        // Capacity is irrelevant outside the per-character mode.
        let sequence = PipelineConfig::new()
            .with_mode(LabelingMode::Sequence)
            .with_max_length(0);
        assert!(sequence.validate().is_ok());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        let json = r#"{ "pack": { "shard_size": 50, "shuffle_seed": 7 } }"#;
        file.write_all(json.as_bytes()).unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.pack.shard_size, 50);
        assert_eq!(config.pack.shuffle_seed, Some(7));
    }

    #[test]
    fn test_from_json_file_validates() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "scheduler": {{ "batch_size": 0 }} }}"#).unwrap();
        assert!(PipelineConfig::from_json_file(file.path()).is_err());
    }

    #[test]
    fn test_pool_respects_thread_limit() {
        let pool = ParallelPolicy::new()
            .with_max_threads(Some(2))
            .build_pool()
            .unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }
}
