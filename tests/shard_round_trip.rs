//! Packaging a directory and reading the shards back.

use captcha_pack::core::config::PipelineConfig;
use captcha_pack::dataset::{DatasetPacker, ShardReader, list_shards};
use captcha_pack::domain::{LabelingMode, Vocabulary, discover_images, samples_from_paths};
use captcha_pack::processors::{CanvasCodec, LabelCodec, LabelVector};
use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const LABELS: [&str; 5] = ["ab", "ca", "b", "abc", "cc"];

fn write_dataset(dir: &Path) {
    for (i, label) in LABELS.iter().enumerate() {
        let shade = 40 + 40 * i as u8;
        // Twice the canvas size: shrunk to fill the canvas exactly.
        RgbImage::from_pixel(64, 32, Rgb([shade, 255 - shade, shade / 2]))
            .save(dir.join(format!("{label}_{i:03}.png")))
            .unwrap();
    }
}

fn config(mode: LabelingMode) -> PipelineConfig {
    let mut config = PipelineConfig::new()
        .with_mode(mode)
        .with_canvas_size(16, 32)
        .with_max_length(4)
        .with_shard_size(2);
    config.canvas.jpeg_quality = 95;
    config
}

fn round_trip(mode: LabelingMode) {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_dataset(src.path());
    let config = config(mode);

    let report = DatasetPacker::new(config.clone())
        .unwrap()
        .pack_dir(src.path(), out.path(), "train")
        .unwrap();
    assert_eq!(report.records_written, LABELS.len());
    assert_eq!(report.shards_written.len(), 3);
    assert!(report.skipped.is_empty());

    let vocabulary = Arc::new(Vocabulary::load(&report.vocabulary_path).unwrap());
    let labels = LabelCodec::from_config(&config.label, vocabulary);
    let canvas = CanvasCodec::from_config(&config.canvas);
    let shards = list_shards(out.path(), "train", "shard").unwrap();
    assert_eq!(shards, report.shards_written);

    let paths = discover_images(src.path()).unwrap();
    let samples = samples_from_paths(&paths, Some('_')).unwrap();
    let expected: Vec<(LabelVector, _)> = samples
        .iter()
        .map(|s| {
            (
                labels.encode(&s.label).unwrap(),
                canvas.normalize_path(&s.path).unwrap(),
            )
        })
        .collect();

    let reader = ShardReader::with_label_codec(shards, canvas.clone(), &labels);
    // Two passes over the same reader see the same data.
    for _ in 0..2 {
        let read: Vec<_> = reader.iter().map(Result::unwrap).collect();
        assert_eq!(read.len(), expected.len());

        for ((canvas, label), (want_label, want_canvas)) in read.iter().zip(&expected) {
            assert_eq!(label, want_label);
            assert_eq!(canvas.shape(), (16, 32, 3));
            let max_diff = canvas
                .view()
                .iter()
                .zip(want_canvas.view().iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max);
            assert!(max_diff < 0.2, "max diff {max_diff}");
        }
    }

    let decoded: Vec<String> = reader
        .iter()
        .map(|r| labels.decode_target(&r.unwrap().1).unwrap())
        .collect();
    let originals: Vec<&str> = samples.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(decoded, originals);
}

#[test]
fn test_per_character_round_trip() {
    round_trip(LabelingMode::PerCharacter);
}

#[test]
fn test_sequence_round_trip() {
    round_trip(LabelingMode::Sequence);
}

#[test]
fn test_whole_label_round_trip() {
    round_trip(LabelingMode::WholeLabel);
}

#[test]
fn test_reader_rejects_wrong_label_shape() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_dataset(src.path());
    let config = config(LabelingMode::PerCharacter);
    let report = DatasetPacker::new(config.clone())
        .unwrap()
        .pack_dir(src.path(), out.path(), "train")
        .unwrap();

    // A reader expecting a longer capacity must not accept the records.
    let vocabulary = Arc::new(Vocabulary::load(&report.vocabulary_path).unwrap());
    let labels = LabelCodec::new(LabelingMode::PerCharacter, vocabulary, 6);
    let reader = ShardReader::with_label_codec(
        report.shards_written,
        CanvasCodec::from_config(&config.canvas),
        &labels,
    );
    let first = reader.iter().next().unwrap();
    assert!(first.is_err());
}

#[test]
fn test_vocabulary_file_is_written_once() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_dataset(src.path());
    let mut config = config(LabelingMode::PerCharacter);
    config.pack.resume = false;
    let packer = DatasetPacker::new(config).unwrap();

    let first = packer.pack_dir(src.path(), out.path(), "train").unwrap();
    let before = std::fs::read(&first.vocabulary_path).unwrap();
    let shard = std::fs::read(&first.shards_written[0]).unwrap();

    let second = packer.pack_dir(src.path(), out.path(), "train").unwrap();
    assert_eq!(std::fs::read(&second.vocabulary_path).unwrap(), before);
    // Repeated runs produce identical shards.
    assert_eq!(std::fs::read(&second.shards_written[0]).unwrap(), shard);
    let json = String::from_utf8(before).unwrap();
    assert_eq!(json, r#"{"0":"a","1":"b","2":"c"}"#);
}
