//! Domain types for the packaging pipeline.
//!
//! This module contains the data model shared by the codecs, the shard I/O
//! and the decoder: labeling modes, samples on disk and the vocabulary.

pub mod mode;
pub mod sample;
pub mod vocabulary;

pub use mode::{LabelShape, LabelingMode};
pub use sample::{Sample, discover_images, label_from_path, samples_from_paths};
pub use vocabulary::Vocabulary;
