//! Constants used throughout the packaging pipeline.
//!
//! Defaults mirror the values the training scripts were tuned with: an 80x240
//! RGB canvas, eight-character captchas and ten thousand records per shard.

/// The default canvas height in pixels.
pub const DEFAULT_CANVAS_HEIGHT: u32 = 80;

/// The default canvas width in pixels.
pub const DEFAULT_CANVAS_WIDTH: u32 = 240;

/// Number of channels in every canvas.
pub const CANVAS_CHANNELS: usize = 3;

/// The default quality used when re-encoding canvases as JPEG.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// The default per-character label capacity.
pub const DEFAULT_MAX_LABEL_LENGTH: usize = 8;

/// The default character at which filename stems are truncated.
pub const DEFAULT_LABEL_SEPARATOR: char = '_';

/// The default vocabulary file name.
pub const DEFAULT_VOCABULARY_FILE: &str = "num_classes.json";

/// The default maximum number of records per shard.
pub const DEFAULT_SHARD_SIZE: usize = 10_000;

/// The default shard file extension.
pub const DEFAULT_SHARD_EXTENSION: &str = "shard";

/// Suffix of shard files that are still being written.
pub const PARTIAL_SHARD_SUFFIX: &str = "partial";

/// Fractions of total training steps at which the scheduler restarts.
pub const RESTART_POINTS: [f64; 4] = [0.05, 0.15, 0.30, 0.50];

/// One-sided z-score for the ~99% lower confidence bound.
pub const CONFIDENCE_Z_SCORE: f32 = 2.58;

/// Upper bound on proportional shrink passes when fitting an image to the canvas.
///
/// Two passes always suffice; the third check only confirms the fit.
pub const MAX_FIT_ITERATIONS: usize = 4;

/// Number of images above which batch inspection runs on the rayon pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10;
