//! Decoding of raw model output into text and a calibrated confidence.
//!
//! The model emits one row of class scores per output position. The decoder
//! takes the arg-max of every row, maps it back through the vocabulary and
//! scores each row as `max(row) / sum(|row|)`.
//!
//! For the character modes the reported confidence is not the plain mean of
//! the row scores but a one-sided lower bound on it:
//!
//! ```text
//! mean(c) - 2.58 * stdev(c) / sqrt(n)
//! ```
//!
//! so a prediction with one shaky character scores lower than a uniformly
//! confident one with the same mean.

use crate::core::constants::CONFIDENCE_Z_SCORE;
use crate::core::errors::{PackError, PackResult};
use crate::domain::{LabelingMode, Vocabulary};
use ndarray::{ArrayView1, ArrayView2, ArrayView3, Axis};
use std::sync::Arc;

/// A decoded prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Recognized text.
    pub text: String,
    /// Overall confidence in `[0, 1]` for well-formed probability rows.
    pub confidence: f32,
    /// Confidence of every output position, in order.
    pub position_confidences: Vec<f32>,
}

/// Converts model output rows into [`Prediction`]s.
#[derive(Debug, Clone)]
pub struct PredictionDecoder {
    mode: LabelingMode,
    vocabulary: Arc<Vocabulary>,
    merge_repeats: bool,
}

impl PredictionDecoder {
    /// Creates a decoder for `mode` over `vocabulary`.
    pub fn new(mode: LabelingMode, vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            mode,
            vocabulary,
            merge_repeats: false,
        }
    }

    /// Collapses consecutive repeated classes in sequence mode before mapping
    /// them to symbols. Position confidences are unaffected.
    pub fn with_merge_repeats(mut self, merge_repeats: bool) -> Self {
        self.merge_repeats = merge_repeats;
        self
    }

    /// The labeling mode this decoder expects.
    pub fn mode(&self) -> LabelingMode {
        self.mode
    }

    /// Number of classes expected in each output row.
    pub fn classes(&self) -> usize {
        self.mode.output_classes(self.vocabulary.len())
    }

    /// Decodes a `positions x classes` output matrix.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::ShapeMismatch`] when the number of columns does
    /// not match the vocabulary size for the active mode, or when a
    /// whole-label output has no rows.
    pub fn decode(&self, raw: ArrayView2<'_, f32>) -> PackResult<Prediction> {
        let classes = self.classes();
        if raw.ncols() != classes {
            return Err(PackError::ShapeMismatch {
                expected: format!("{classes} classes per row"),
                actual: format!("{} classes per row", raw.ncols()),
            });
        }

        match self.mode {
            LabelingMode::WholeLabel if raw.nrows() == 0 => Err(PackError::ShapeMismatch {
                expected: "at least one row".to_string(),
                actual: "0 rows".to_string(),
            }),
            LabelingMode::WholeLabel => Ok(self.decode_whole_label(raw)),
            LabelingMode::PerCharacter | LabelingMode::Sequence => {
                Ok(self.decode_positions(raw))
            }
        }
    }

    /// Decodes a `batch x positions x classes` output tensor.
    pub fn decode_batch(&self, raw: ArrayView3<'_, f32>) -> PackResult<Vec<Prediction>> {
        raw.axis_iter(Axis(0))
            .map(|item| self.decode(item))
            .collect()
    }

    fn decode_positions(&self, raw: ArrayView2<'_, f32>) -> Prediction {
        let mut text = String::new();
        let mut position_confidences = Vec::with_capacity(raw.nrows());
        let mut previous = None;

        for row in raw.rows() {
            let (class, confidence) = score_row(row);
            position_confidences.push(confidence);

            let repeated = self.merge_repeats
                && self.mode == LabelingMode::Sequence
                && previous == Some(class);
            previous = Some(class);
            if repeated {
                continue;
            }
            // Placeholder and blank classes have no symbol.
            if let Some(symbol) = self.vocabulary.symbol(class) {
                text.push_str(symbol);
            }
        }

        Prediction {
            text,
            confidence: margin_confidence(&position_confidences),
            position_confidences,
        }
    }

    fn decode_whole_label(&self, raw: ArrayView2<'_, f32>) -> Prediction {
        let flat: Vec<f32> = raw.iter().copied().collect();
        let (class, confidence) = score_row(ArrayView1::from(&flat[..]));
        // Multi-row output is treated as one long row, so wrap the index.
        let class = if self.vocabulary.is_empty() {
            0
        } else {
            class % self.vocabulary.len()
        };

        Prediction {
            text: self.vocabulary.symbol(class).unwrap_or_default().to_string(),
            confidence,
            position_confidences: vec![confidence],
        }
    }
}

/// Arg-max class of a row and its score `max / sum(|row|)`.
///
/// An empty or all-zero row scores 0.
pub fn score_row(row: ArrayView1<'_, f32>) -> (usize, f32) {
    let Some((class, &max)) = row
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
    else {
        return (0, 0.0);
    };

    let total: f32 = row.iter().map(|v| v.abs()).sum();
    let confidence = if total > 0.0 { max / total } else { 0.0 };
    (class, confidence)
}

/// Margin-adjusted lower bound of the mean of `confidences`.
///
/// Uses the population standard deviation. An empty slice yields 0.
pub fn margin_confidence(confidences: &[f32]) -> f32 {
    if confidences.is_empty() {
        return 0.0;
    }
    let n = confidences.len() as f32;
    let mean = confidences.iter().sum::<f32>() / n;
    let variance = confidences
        .iter()
        .map(|c| (c - mean).powi(2))
        .sum::<f32>()
        / n;
    mean - CONFIDENCE_Z_SCORE * variance.sqrt() / n.sqrt()
}

/// Running count of evaluated and correctly recognized samples.
///
/// Owned by the caller and passed to each evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredictionTally {
    /// Number of evaluated samples.
    pub total: usize,
    /// Number of exact matches.
    pub correct: usize,
}

impl PredictionTally {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one prediction and returns whether it matched.
    pub fn record(&mut self, predicted: &str, expected: &str) -> bool {
        let hit = predicted == expected;
        self.total += 1;
        if hit {
            self.correct += 1;
        }
        hit
    }

    /// Fraction of exact matches, 0 when nothing has been recorded.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3, array};

    fn vocabulary(symbols: &[&str]) -> Arc<Vocabulary> {
        Arc::new(Vocabulary::from_symbols(symbols.iter().copied()))
    }

    #[test]
    fn test_uniform_confidence_has_no_margin() {
        let c = margin_confidence(&[0.9, 0.9, 0.9]);
        assert!((c - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_inconsistent_confidence_is_penalized() {
        let values = [0.6, 0.9, 0.99];
        let mean = values.iter().sum::<f32>() / 3.0;
        let c = margin_confidence(&values);
        assert!(c < mean);

        // Population stdev of the values is ~0.16673.
        let expected = mean - 2.58 * 0.166_733 / 3f32.sqrt();
        assert!((c - expected).abs() < 1e-4);
    }

    #[test]
    fn test_empty_confidences() {
        assert_eq!(margin_confidence(&[]), 0.0);
    }

    #[test]
    fn test_score_row() {
        let row = array![0.1f32, -0.3, 0.6];
        let (class, conf) = score_row(row.view());
        assert_eq!(class, 2);
        assert!((conf - 0.6).abs() < 1e-6);

        let zeros = array![0.0f32, 0.0];
        assert_eq!(score_row(zeros.view()).1, 0.0);
    }

    #[test]
    fn test_per_character_decode_skips_placeholder() {
        let decoder = PredictionDecoder::new(LabelingMode::PerCharacter, vocabulary(&["a", "b"]));
        let raw = array![
            [0.1f32, 0.8, 0.1],
            [0.7, 0.2, 0.1],
            [0.0, 0.1, 0.9],
            [0.05, 0.05, 0.9],
        ];
        let prediction = decoder.decode(raw.view()).unwrap();
        assert_eq!(prediction.text, "ba");
        assert_eq!(prediction.position_confidences.len(), 4);

        let mean = prediction.position_confidences.iter().sum::<f32>() / 4.0;
        assert!(prediction.confidence < mean);
    }

    #[test]
    fn test_confident_rows_report_row_score() {
        let decoder = PredictionDecoder::new(LabelingMode::PerCharacter, vocabulary(&["x", "y"]));
        let raw = array![[0.9f32, 0.1, 0.0], [0.1, 0.9, 0.0], [0.9, 0.0, 0.1]];
        let prediction = decoder.decode(raw.view()).unwrap();
        assert_eq!(prediction.text, "xyx");
        assert!((prediction.confidence - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_sequence_decode_with_and_without_merge() {
        let vocab = vocabulary(&["a", "b"]);
        let raw = array![
            [0.9f32, 0.05, 0.05],
            [0.9, 0.05, 0.05],
            [0.05, 0.05, 0.9],
            [0.05, 0.9, 0.05],
        ];

        let plain = PredictionDecoder::new(LabelingMode::Sequence, vocab.clone());
        assert_eq!(plain.decode(raw.view()).unwrap().text, "aab");

        let merged = plain.with_merge_repeats(true);
        let prediction = merged.decode(raw.view()).unwrap();
        assert_eq!(prediction.text, "ab");
        assert_eq!(prediction.position_confidences.len(), 4);
    }

    #[test]
    fn test_whole_label_has_no_margin() {
        let decoder =
            PredictionDecoder::new(LabelingMode::WholeLabel, vocabulary(&["cat", "dog", "eel"]));
        let raw = array![[0.2f32, 0.5, 0.3]];
        let prediction = decoder.decode(raw.view()).unwrap();
        assert_eq!(prediction.text, "dog");
        assert!((prediction.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_whole_label_without_rows_is_rejected() {
        let decoder =
            PredictionDecoder::new(LabelingMode::WholeLabel, vocabulary(&["cat", "dog", "eel"]));
        let raw = Array2::<f32>::zeros((0, 3));
        assert!(matches!(
            decoder.decode(raw.view()),
            Err(PackError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_class_count_is_rejected() {
        let decoder = PredictionDecoder::new(LabelingMode::PerCharacter, vocabulary(&["a", "b"]));
        let raw = Array2::<f32>::zeros((4, 2));
        assert!(matches!(
            decoder.decode(raw.view()),
            Err(PackError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_batch() {
        let decoder = PredictionDecoder::new(LabelingMode::PerCharacter, vocabulary(&["a", "b"]));
        let mut raw = Array3::<f32>::zeros((2, 2, 3));
        raw[[0, 0, 0]] = 1.0;
        raw[[0, 1, 1]] = 1.0;
        raw[[1, 0, 1]] = 1.0;
        raw[[1, 1, 2]] = 1.0;

        let predictions = decoder.decode_batch(raw.view()).unwrap();
        assert_eq!(predictions[0].text, "ab");
        assert_eq!(predictions[1].text, "b");
    }

    #[test]
    fn test_tally() {
        let mut tally = PredictionTally::new();
        assert_eq!(tally.accuracy(), 0.0);
        assert!(tally.record("ab", "ab"));
        assert!(!tally.record("ab", "ba"));
        assert_eq!(tally.total, 2);
        assert_eq!(tally.correct, 1);
        assert!((tally.accuracy() - 0.5).abs() < f64::EPSILON);
    }
}
