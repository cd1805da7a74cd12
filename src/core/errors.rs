//! Error types for the packaging and decoding pipeline.
//!
//! Errors fall into two groups. Sample-level errors (an unreadable image, a
//! label that does not fit the configured capacity) only invalidate one sample
//! and are skipped during batch packaging. Everything else signals a
//! structural mismatch, such as a stale vocabulary or an invalid configuration,
//! and aborts the run.
//!
//! # Usage
//!
//! ```rust
//! use captcha_pack::core::errors::PackError;
//!
//! let error = PackError::label_length("abcdefghij", 8);
//! assert!(error.is_sample_level());
//! assert!(error.to_string().contains("suggested capacity 12"));
//! ```

use crate::core::config::ConfigError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Convenient result alias for pipeline operations.
pub type PackResult<T> = Result<T, PackError>;

/// Errors that can occur while encoding, packaging, reading or decoding samples.
#[derive(Error, Debug)]
pub enum PackError {
    /// An image could not be read or decoded.
    #[error("image decode failed for {}", describe_source(.path))]
    ImageDecode {
        /// Source path, when the bytes came from a file.
        path: Option<PathBuf>,
        /// The underlying codec error.
        #[source]
        source: image::ImageError,
    },

    /// A canvas could not be re-encoded into compressed bytes.
    #[error("image encode")]
    ImageEncode(#[source] image::ImageError),

    /// A label is longer than the fixed per-character capacity.
    #[error(
        "label '{label}' has {length} characters but capacity is {capacity}; suggested capacity {suggested}"
    )]
    LabelLength {
        /// The offending label.
        label: String,
        /// Number of characters in the label.
        length: usize,
        /// Configured capacity.
        capacity: usize,
        /// Capacity that would accommodate the label.
        suggested: usize,
    },

    /// A symbol is missing from the vocabulary.
    #[error("symbol '{symbol}' in label '{label}' is not in the vocabulary")]
    UnknownSymbol {
        /// The missing symbol.
        symbol: String,
        /// The label that contained it.
        label: String,
    },

    /// A persisted vocabulary does not cover the symbols observed in the corpus.
    #[error("vocabulary file {} is stale: missing symbols {missing:?}", .path.display())]
    StaleVocabulary {
        /// Vocabulary file path.
        path: PathBuf,
        /// Symbols seen in the corpus but absent from the file.
        missing: Vec<String>,
    },

    /// A vocabulary file is malformed.
    #[error("invalid vocabulary: {message}")]
    InvalidVocabulary {
        /// Description of the problem.
        message: String,
    },

    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A shard file is truncated or malformed.
    #[error("corrupt shard {}: {message}", .path.display())]
    CorruptShard {
        /// Shard path.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// A record payload does not match the expected label shape.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        actual: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Record serialization error.
    #[error("record serialization")]
    Serialization(#[from] bincode::Error),

    /// JSON error.
    #[error("json")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

fn describe_source(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "<memory>".to_string(),
    }
}

impl PackError {
    /// Creates an image decode error for a file path.
    pub fn image_decode(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::ImageDecode {
            path: Some(path.into()),
            source,
        }
    }

    /// Creates an image decode error for in-memory bytes.
    pub fn image_decode_bytes(source: image::ImageError) -> Self {
        Self::ImageDecode { path: None, source }
    }

    /// Creates a label length error with a suggested capacity of `len + 2`.
    pub fn label_length(label: &str, capacity: usize) -> Self {
        let length = label.chars().count();
        Self::LabelLength {
            label: label.to_string(),
            length,
            capacity,
            suggested: length + 2,
        }
    }

    /// Creates an unknown symbol error.
    pub fn unknown_symbol(symbol: impl Into<String>, label: &str) -> Self {
        Self::UnknownSymbol {
            symbol: symbol.into(),
            label: label.to_string(),
        }
    }

    /// Creates a corrupt shard error.
    pub fn corrupt_shard(path: &Path, message: impl Into<String>) -> Self {
        Self::CorruptShard {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Returns true when the error only invalidates a single sample.
    ///
    /// Packaging logs and skips these; any other error aborts the run.
    pub fn is_sample_level(&self) -> bool {
        matches!(self, Self::ImageDecode { .. } | Self::LabelLength { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_length_suggests_capacity() {
        let err = PackError::label_length("abcdefghij", 8);
        match &err {
            PackError::LabelLength {
                length,
                capacity,
                suggested,
                ..
            } => {
                assert_eq!(*length, 10);
                assert_eq!(*capacity, 8);
                assert_eq!(*suggested, 12);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("abcdefghij"));
    }

    #[test]
    fn test_sample_level_classification() {
        assert!(PackError::label_length("abc", 1).is_sample_level());
        assert!(!PackError::unknown_symbol("x", "x1").is_sample_level());
        assert!(!PackError::invalid_input("bad").is_sample_level());

        let decode = PackError::image_decode(
            "a.jpg",
            image::ImageError::IoError(std::io::Error::other("broken")),
        );
        assert!(decode.is_sample_level());
        assert!(decode.to_string().contains("a.jpg"));
    }

    #[test]
    fn test_in_memory_decode_message() {
        let err = PackError::image_decode_bytes(image::ImageError::IoError(std::io::Error::other(
            "broken",
        )));
        assert!(err.to_string().contains("<memory>"));
    }
}
