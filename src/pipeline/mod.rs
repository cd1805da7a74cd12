//! The recognition pipeline module.
//!
//! This module connects the canvas codec, an opaque trained model and the
//! prediction decoder into a single recognizer.

pub mod recognizer;

pub use recognizer::{Evaluation, Recognizer};
