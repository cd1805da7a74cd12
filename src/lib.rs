//! # Captcha Pack
//!
//! Dataset encoding, sharded packaging and prediction decoding for captcha
//! classifiers. The crate sits between labeled images on disk and a training
//! loop, and turns model output back into text afterwards.
//!
//! ## Features
//!
//! - Fixed-size RGB canvases with proportional shrink and zero padding
//! - Three labeling modes: per-character one-hot, whole-label classes and
//!   variable-length index sequences
//! - A persisted vocabulary that is built once and checked on every run
//! - Sharded, length-prefixed record files with resumable packaging
//! - Margin-adjusted confidence when decoding predictions
//! - Best-checkpoint selection and a warm-restart learning-rate schedule
//!
//! ## Modules
//!
//! * [`core`] - Configuration, constants, errors and the model boundary trait
//! * [`domain`] - Labeling modes, samples and the vocabulary
//! * [`processors`] - Canvas and label codecs, prediction decoding
//! * [`dataset`] - Shard files and directory packaging
//! * [`training`] - Checkpoint selection and learning-rate scheduling
//! * [`pipeline`] - End-to-end recognition with an opaque model
//! * [`utils`] - Image loading and dataset inspection
//!
//! ## Quick Start
//!
//! ### Packaging a dataset
//!
//! ```rust,no_run
//! use captcha_pack::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::new()
//!     .with_mode(LabelingMode::PerCharacter)
//!     .with_canvas_size(80, 240)
//!     .with_max_length(6);
//!
//! let packer = DatasetPacker::new(config)?;
//! let report = packer.pack_dir(Path::new("captchas/train"), Path::new("packed"), "train")?;
//! println!("{} records in {} shards", report.records_written, report.shards_written.len());
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading shards back
//!
//! ```rust,no_run
//! use captcha_pack::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::new().with_max_length(6);
//! let vocabulary = Arc::new(Vocabulary::load(Path::new("packed/num_classes.json"))?);
//! let labels = LabelCodec::from_config(&config.label, vocabulary);
//!
//! let shards = list_shards(Path::new("packed"), "train", "shard")?;
//! let codec = CanvasCodec::from_config(&config.canvas);
//! let reader = ShardReader::with_label_codec(shards, codec, &labels);
//! for sample in reader.iter() {
//!     let (canvas, label) = sample?;
//!     assert_eq!(canvas.shape(), (80, 240, 3));
//!     let _ = label;
//! }
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod core;
pub mod domain;

pub mod dataset;
pub mod pipeline;
pub mod processors;
pub mod training;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use captcha_pack::prelude::*;
/// ```
///
/// Included items cover packaging, reading, decoding and training helpers.
/// For lower-level pieces (shard records, schedule segments, config
/// validation), import from the respective modules.
pub mod prelude {
    // Configuration and errors
    pub use crate::core::{InferenceModel, PackError, PackResult, PipelineConfig, init_tracing};

    // Domain
    pub use crate::domain::{LabelingMode, Sample, Vocabulary};

    // Codecs and decoding
    pub use crate::processors::{
        Canvas, CanvasCodec, LabelCodec, LabelVector, Prediction, PredictionDecoder,
        PredictionTally,
    };

    // Shards
    pub use crate::dataset::{DatasetPacker, PackReport, ShardReader, ShardWriter, list_shards};

    // Training
    pub use crate::training::{CheckpointMetrics, WarmRestartScheduler, select_best};

    // Recognition
    pub use crate::pipeline::Recognizer;

    // Image utilities
    pub use crate::utils::{load_image, survey_dimensions};
}
