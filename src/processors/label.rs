//! Label vectorization.
//!
//! [`LabelCodec`] turns a text label into the numeric target stored next to
//! each image. The [`LabelingMode`] decides the canonicalization and shape:
//!
//! | mode           | payload                                            |
//! |----------------|----------------------------------------------------|
//! | `PerCharacter` | `max_length x (|V| + 1)` one-hot floats, flattened |
//! | `WholeLabel`   | `|V|` one-hot floats                               |
//! | `Sequence`     | variable-length class indices                      |
//!
//! In the per-character mode unused trailing positions select class `|V|`,
//! the placeholder reserved for "no symbol".

use crate::core::config::LabelConfig;
use crate::core::errors::{PackError, PackResult};
use crate::domain::{LabelShape, LabelingMode, Vocabulary};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The numeric target of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabelVector {
    /// Fixed-length float values (classification modes).
    Dense(Vec<f32>),
    /// Variable-length class indices (sequence mode).
    Indices(Vec<i64>),
}

impl LabelVector {
    /// Number of stored values.
    pub fn len(&self) -> usize {
        match self {
            Self::Dense(values) => values.len(),
            Self::Indices(indices) => indices.len(),
        }
    }

    /// Returns true when no values are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The float payload, if this is a dense vector.
    pub fn as_dense(&self) -> Option<&[f32]> {
        match self {
            Self::Dense(values) => Some(values),
            Self::Indices(_) => None,
        }
    }

    /// The index payload, if this is a sequence vector.
    pub fn as_indices(&self) -> Option<&[i64]> {
        match self {
            Self::Indices(indices) => Some(indices),
            Self::Dense(_) => None,
        }
    }

    /// Checks the payload against an expected shape.
    pub fn check_shape(&self, shape: LabelShape) -> PackResult<()> {
        let matches = match (self, shape) {
            (Self::Dense(values), LabelShape::Fixed { .. }) => Some(values.len()) == shape.len(),
            (Self::Indices(_), LabelShape::Variable) => true,
            _ => false,
        };
        if matches {
            Ok(())
        } else {
            Err(PackError::ShapeMismatch {
                expected: shape.to_string(),
                actual: self.describe(),
            })
        }
    }

    /// Reshapes a dense payload into its `positions x classes` matrix.
    pub fn to_matrix(&self, shape: LabelShape) -> PackResult<Array2<f32>> {
        self.check_shape(shape)?;
        match (self, shape) {
            (Self::Dense(values), LabelShape::Fixed { positions, classes }) => {
                Array2::from_shape_vec((positions, classes), values.clone()).map_err(|e| {
                    PackError::ShapeMismatch {
                        expected: shape.to_string(),
                        actual: e.to_string(),
                    }
                })
            }
            _ => Err(PackError::ShapeMismatch {
                expected: "fixed float payload".to_string(),
                actual: self.describe(),
            }),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Dense(values) => format!("{} floats", values.len()),
            Self::Indices(indices) => format!("{} indices", indices.len()),
        }
    }
}

/// Encodes text labels under one labeling mode and a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct LabelCodec {
    mode: LabelingMode,
    max_length: usize,
    vocabulary: Arc<Vocabulary>,
}

impl LabelCodec {
    /// Creates a codec. `max_length` only matters for the per-character mode.
    pub fn new(mode: LabelingMode, vocabulary: Arc<Vocabulary>, max_length: usize) -> Self {
        Self {
            mode,
            max_length,
            vocabulary,
        }
    }

    /// Creates a codec from configuration.
    pub fn from_config(config: &LabelConfig, vocabulary: Arc<Vocabulary>) -> Self {
        Self::new(config.mode, vocabulary, config.max_length)
    }

    /// The labeling mode.
    pub fn mode(&self) -> LabelingMode {
        self.mode
    }

    /// The vocabulary labels are encoded against.
    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocabulary
    }

    /// Shape of every payload this codec produces.
    pub fn shape(&self) -> LabelShape {
        self.mode.label_shape(self.vocabulary.len(), self.max_length)
    }

    /// Encodes a label.
    ///
    /// # Errors
    ///
    /// * [`PackError::LabelLength`] if a per-character label exceeds the capacity.
    /// * [`PackError::UnknownSymbol`] if a symbol is not in the vocabulary.
    pub fn encode(&self, label: &str) -> PackResult<LabelVector> {
        match self.mode {
            LabelingMode::PerCharacter => self.encode_per_character(label),
            LabelingMode::WholeLabel => self.encode_whole_label(label),
            LabelingMode::Sequence => self.encode_sequence(label),
        }
    }

    fn encode_per_character(&self, label: &str) -> PackResult<LabelVector> {
        if label.chars().count() > self.max_length {
            return Err(PackError::label_length(label, self.max_length));
        }

        let placeholder = self.vocabulary.len();
        let classes = placeholder + 1;
        let mut classes_at = vec![placeholder; self.max_length];
        for (slot, c) in classes_at.iter_mut().zip(label.chars()) {
            *slot = self.lookup(&c.to_string(), label)?;
        }

        let mut values = vec![0.0f32; self.max_length * classes];
        for (position, class) in classes_at.into_iter().enumerate() {
            values[position * classes + class] = 1.0;
        }
        Ok(LabelVector::Dense(values))
    }

    fn encode_whole_label(&self, label: &str) -> PackResult<LabelVector> {
        let class = self.lookup(label, label)?;
        let mut values = vec![0.0f32; self.vocabulary.len()];
        values[class] = 1.0;
        Ok(LabelVector::Dense(values))
    }

    fn encode_sequence(&self, label: &str) -> PackResult<LabelVector> {
        let indices = label
            .chars()
            .map(|c| self.lookup(&c.to_string(), label).map(|i| i as i64))
            .collect::<PackResult<Vec<_>>>()?;
        Ok(LabelVector::Indices(indices))
    }

    fn lookup(&self, symbol: &str, label: &str) -> PackResult<usize> {
        self.vocabulary
            .index_of(symbol)
            .ok_or_else(|| PackError::unknown_symbol(symbol, label))
    }

    /// Recovers the text of an encoded target.
    ///
    /// Placeholder positions of per-character targets are dropped.
    pub fn decode_target(&self, vector: &LabelVector) -> PackResult<String> {
        vector.check_shape(self.shape())?;
        match vector {
            LabelVector::Dense(values) => {
                let classes = self.mode.output_classes(self.vocabulary.len());
                if classes == 0 {
                    return Ok(String::new());
                }
                Ok(values
                    .chunks(classes)
                    .filter_map(|row| {
                        let (class, _) = row
                            .iter()
                            .enumerate()
                            .max_by(|(_, a), (_, b)| a.total_cmp(b))?;
                        self.vocabulary.symbol(class)
                    })
                    .collect())
            }
            LabelVector::Indices(indices) => indices
                .iter()
                .map(|&i| {
                    usize::try_from(i)
                        .ok()
                        .and_then(|i| self.vocabulary.symbol(i))
                        .ok_or_else(|| {
                            PackError::invalid_input(format!("class index {i} is out of range"))
                        })
                })
                .collect(),
        }
    }
}
