//! Labeling modes and the label shapes they imply.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a text label is turned into a training target.
///
/// The legacy configuration names `ORDINARY`, `NUM_CLASSES` and `CTC` are
/// accepted when deserializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelingMode {
    /// Fixed-length sequence of one-hot characters, padded with a "no symbol" class.
    #[default]
    #[serde(alias = "ORDINARY")]
    PerCharacter,
    /// One class per distinct label.
    #[serde(alias = "NUM_CLASSES")]
    WholeLabel,
    /// Variable-length sequence of character indices for alignment-free losses.
    #[serde(alias = "CTC")]
    Sequence,
}

impl LabelingMode {
    /// Splits a label into the symbols this mode builds its vocabulary over.
    pub fn symbols_of(&self, label: &str) -> Vec<String> {
        match self {
            Self::PerCharacter | Self::Sequence => {
                label.chars().map(String::from).collect()
            }
            Self::WholeLabel => vec![label.to_string()],
        }
    }

    /// Number of classes in each output row of a model trained in this mode.
    ///
    /// Character modes reserve one extra class after the vocabulary: the
    /// padding placeholder for the per-character mode and the blank for the
    /// sequence mode.
    pub fn output_classes(&self, vocabulary_len: usize) -> usize {
        match self {
            Self::PerCharacter | Self::Sequence => vocabulary_len + 1,
            Self::WholeLabel => vocabulary_len,
        }
    }

    /// Shape of the label payload stored for every record.
    pub fn label_shape(&self, vocabulary_len: usize, max_length: usize) -> LabelShape {
        match self {
            Self::PerCharacter => LabelShape::Fixed {
                positions: max_length,
                classes: self.output_classes(vocabulary_len),
            },
            Self::WholeLabel => LabelShape::Fixed {
                positions: 1,
                classes: self.output_classes(vocabulary_len),
            },
            Self::Sequence => LabelShape::Variable,
        }
    }
}

impl fmt::Display for LabelingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerCharacter => write!(f, "per-character"),
            Self::WholeLabel => write!(f, "whole-label"),
            Self::Sequence => write!(f, "sequence"),
        }
    }
}

/// Shape of a label payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelShape {
    /// A dense float matrix of `positions x classes`, stored flattened.
    Fixed { positions: usize, classes: usize },
    /// A variable-length list of class indices.
    Variable,
}

impl LabelShape {
    /// Number of stored values for fixed shapes.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Fixed { positions, classes } => Some(positions * classes),
            Self::Variable => None,
        }
    }
}

impl fmt::Display for LabelShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed { positions, classes } => write!(f, "[{positions}, {classes}] floats"),
            Self::Variable => write!(f, "variable-length indices"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_names_deserialize() {
        let modes: Vec<LabelingMode> =
            serde_json::from_str(r#"["ORDINARY", "NUM_CLASSES", "CTC", "Sequence"]"#).unwrap();
        assert_eq!(
            modes,
            vec![
                LabelingMode::PerCharacter,
                LabelingMode::WholeLabel,
                LabelingMode::Sequence,
                LabelingMode::Sequence
            ]
        );
    }

    #[test]
    fn test_symbols_of() {
        assert_eq!(LabelingMode::PerCharacter.symbols_of("ab"), vec!["a", "b"]);
        assert_eq!(LabelingMode::Sequence.symbols_of("验证"), vec!["验", "证"]);
        assert_eq!(LabelingMode::WholeLabel.symbols_of("cat"), vec!["cat"]);
    }

    #[test]
    fn test_label_shapes() {
        assert_eq!(
            LabelingMode::PerCharacter.label_shape(10, 4),
            LabelShape::Fixed {
                positions: 4,
                classes: 11
            }
        );
        assert_eq!(LabelingMode::WholeLabel.label_shape(10, 4).len(), Some(10));
        let shape = LabelingMode::Sequence.label_shape(10, 4);
        assert_eq!(shape, LabelShape::Variable);
        assert_eq!(LabelingMode::Sequence.output_classes(10), 11);
    }
}
