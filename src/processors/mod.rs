//! Codecs and decoders between raw samples and numeric tensors.
//!
//! # Modules
//!
//! * `canvas` - Fixed-size canvas normalization and lossy image compression
//! * `label` - Label vectorization for the three labeling modes
//! * `decode` - Model output decoding with margin-adjusted confidence

pub mod canvas;
pub mod decode;
pub mod label;

pub use canvas::{Canvas, CanvasCodec, fit_dimensions};
pub use decode::{Prediction, PredictionDecoder, PredictionTally, margin_confidence, score_row};
pub use label::{LabelCodec, LabelVector};
