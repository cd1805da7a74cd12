//! End-to-end recognition: image in, text and confidence out.
//!
//! [`Recognizer`] wires the canvas codec, an [`InferenceModel`] and the
//! [`PredictionDecoder`]. The model itself is opaque; anything that maps a
//! `(batch, height, width, 3)` tensor to per-position class scores fits.

use crate::core::config::PipelineConfig;
use crate::core::errors::{PackError, PackResult};
use crate::core::traits::InferenceModel;
use crate::domain::{Vocabulary, label_from_path};
use crate::processors::{Canvas, CanvasCodec, Prediction, PredictionDecoder, PredictionTally};
use ndarray::{Axis, stack};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Outcome of recognizing one labeled image.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Label taken from the file name.
    pub expected: String,
    /// What the model recognized.
    pub prediction: Prediction,
    /// Whether the prediction matched the label exactly.
    pub correct: bool,
}

/// Recognizes captcha images with a trained model.
#[derive(Debug)]
pub struct Recognizer<M> {
    canvas: CanvasCodec,
    decoder: PredictionDecoder,
    model: M,
    separator: Option<char>,
}

impl<M: InferenceModel> Recognizer<M> {
    /// Creates a recognizer from its parts.
    pub fn new(canvas: CanvasCodec, decoder: PredictionDecoder, model: M) -> Self {
        Self {
            canvas,
            decoder,
            model,
            separator: None,
        }
    }

    /// Creates a recognizer matching the geometry and labeling of `config`.
    pub fn from_config(config: &PipelineConfig, vocabulary: Arc<Vocabulary>, model: M) -> Self {
        Self::new(
            CanvasCodec::from_config(&config.canvas),
            PredictionDecoder::new(config.label.mode, vocabulary),
            model,
        )
        .with_label_separator(config.label.separator)
    }

    /// Sets the separator used to read expected labels from file names.
    pub fn with_label_separator(mut self, separator: Option<char>) -> Self {
        self.separator = separator;
        self
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Recognizes a batch of canvases with one forward pass.
    pub fn recognize_batch(&self, canvases: &[Canvas]) -> PackResult<Vec<Prediction>> {
        if canvases.is_empty() {
            return Ok(Vec::new());
        }

        let views: Vec<_> = canvases.iter().map(Canvas::view).collect();
        let batch = stack(Axis(0), &views).map_err(|e| PackError::ShapeMismatch {
            expected: "canvases of equal shape".to_string(),
            actual: e.to_string(),
        })?;

        let output = self.model.forward(batch.view())?;
        if output.len_of(Axis(0)) != canvases.len() {
            return Err(PackError::ShapeMismatch {
                expected: format!("{} outputs", canvases.len()),
                actual: format!("{} outputs", output.len_of(Axis(0))),
            });
        }
        self.decoder.decode_batch(output.view())
    }

    /// Recognizes one canvas.
    pub fn recognize(&self, canvas: &Canvas) -> PackResult<Prediction> {
        self.recognize_batch(std::slice::from_ref(canvas))?
            .pop()
            .ok_or_else(|| PackError::invalid_input("model returned no prediction"))
    }

    /// Recognizes an image file.
    pub fn recognize_path(&self, path: &Path) -> PackResult<Prediction> {
        self.recognize(&self.canvas.normalize_path(path)?)
    }

    /// Recognizes an encoded image held in memory.
    pub fn recognize_bytes(&self, bytes: &[u8]) -> PackResult<Prediction> {
        self.recognize(&self.canvas.normalize_bytes(bytes)?)
    }

    /// Recognizes a labeled image file and records the result in `tally`.
    pub fn evaluate_path(
        &self,
        path: &Path,
        tally: &mut PredictionTally,
    ) -> PackResult<Evaluation> {
        let start = Instant::now();
        let expected = label_from_path(path, self.separator)?;
        let prediction = self.recognize_path(path)?;
        let correct = tally.record(&prediction.text, &expected);

        info!(
            "Predicted '{}' for '{}': recognition rate {:.2}%, accuracy {:.2}% ({}/{}), {:.2?}",
            prediction.text,
            expected,
            prediction.confidence * 100.0,
            tally.accuracy() * 100.0,
            tally.correct,
            tally.total,
            start.elapsed()
        );
        Ok(Evaluation {
            expected,
            prediction,
            correct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LabelingMode;
    use image::{Rgb, RgbImage};
    use ndarray::{Array2, Array3, ArrayView4};
    use tempfile::TempDir;

    /// Predicts "ab" for bright images and "ba" for dark ones.
    struct BrightnessModel;

    impl InferenceModel for BrightnessModel {
        fn forward(&self, batch: ArrayView4<'_, f32>) -> PackResult<Array3<f32>> {
            let mut out = Array3::zeros((batch.len_of(Axis(0)), 3, 3));
            for (i, item) in batch.axis_iter(Axis(0)).enumerate() {
                let bright = item[[0, 0, 0]] > 0.5;
                let (first, second) = if bright { (0, 1) } else { (1, 0) };
                out[[i, 0, first]] = 0.9;
                out[[i, 0, 2]] = 0.1;
                out[[i, 1, second]] = 0.8;
                out[[i, 1, 2]] = 0.2;
                out[[i, 2, 2]] = 1.0;
            }
            Ok(out)
        }
    }

    fn recognizer() -> Recognizer<BrightnessModel> {
        let vocabulary = Arc::new(Vocabulary::from_symbols(["a", "b"]));
        Recognizer::new(
            CanvasCodec::new(8, 16),
            PredictionDecoder::new(LabelingMode::PerCharacter, vocabulary),
            BrightnessModel,
        )
        .with_label_separator(Some('_'))
    }

    fn canvas(value: u8) -> Canvas {
        Canvas::from_rgb(&RgbImage::from_pixel(16, 8, Rgb([value; 3]))).unwrap()
    }

    #[test]
    fn test_recognize_batch_keeps_order() {
        let r = recognizer();
        let predictions = r
            .recognize_batch(&[canvas(255), canvas(0), canvas(200)])
            .unwrap();
        let texts: Vec<_> = predictions.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["ab", "ba", "ab"]);
        assert!(predictions[0].confidence < 0.9);
    }

    #[test]
    fn test_empty_batch() {
        assert!(recognizer().recognize_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_recognize_bytes() {
        let mut bytes = Vec::new();
        RgbImage::from_pixel(40, 20, Rgb([250, 250, 250]))
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        assert_eq!(recognizer().recognize_bytes(&bytes).unwrap().text, "ab");
        assert!(recognizer().recognize_bytes(b"garbage").is_err());
    }

    #[test]
    fn test_evaluate_updates_tally() {
        let dir = TempDir::new().unwrap();
        let hit = dir.path().join("ab_1.png");
        let miss = dir.path().join("ab_2.png");
        RgbImage::from_pixel(16, 8, Rgb([255; 3])).save(&hit).unwrap();
        RgbImage::from_pixel(16, 8, Rgb([0; 3])).save(&miss).unwrap();

        let r = recognizer();
        let mut tally = PredictionTally::new();
        assert!(r.evaluate_path(&hit, &mut tally).unwrap().correct);
        let evaluation = r.evaluate_path(&miss, &mut tally).unwrap();
        assert!(!evaluation.correct);
        assert_eq!(evaluation.expected, "ab");
        assert_eq!(evaluation.prediction.text, "ba");
        assert_eq!(tally, PredictionTally { total: 2, correct: 1 });
    }

    #[test]
    fn test_model_batch_mismatch_is_reported() {
        struct Short;
        impl InferenceModel for Short {
            fn forward(&self, _batch: ArrayView4<'_, f32>) -> PackResult<Array3<f32>> {
                Ok(Array2::<f32>::zeros((3, 3)).insert_axis(Axis(0)))
            }
        }
        let vocabulary = Arc::new(Vocabulary::from_symbols(["a", "b"]));
        let r = Recognizer::new(
            CanvasCodec::new(8, 16),
            PredictionDecoder::new(LabelingMode::PerCharacter, vocabulary),
            Short,
        );
        assert!(matches!(
            r.recognize_batch(&[canvas(0), canvas(0)]),
            Err(PackError::ShapeMismatch { .. })
        ));
    }
}
