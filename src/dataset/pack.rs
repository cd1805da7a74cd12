//! Packaging a directory of labeled images into shards.
//!
//! The packer resolves the vocabulary once, then walks the sample list in
//! shard-sized chunks. Within a chunk every image is normalized and compressed
//! on the worker pool; the finished records are then written sequentially.
//! Shard boundaries depend only on input position, which keeps resumed and
//! repeated runs byte-for-byte identical.

use crate::core::config::{ConfigValidator, PipelineConfig};
use crate::core::errors::PackResult;
use crate::dataset::shard::{ShardRecord, ShardWriter, check_shard_name};
use crate::domain::{Sample, Vocabulary, discover_images, samples_from_paths};
use crate::processors::{CanvasCodec, LabelCodec};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A sample that was left out of the packaged dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSample {
    /// Source image path.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// Summary of one packaging run.
#[derive(Debug, Clone, Default)]
pub struct PackReport {
    /// Number of samples considered.
    pub samples: usize,
    /// Records written in this run.
    pub records_written: usize,
    /// Shards written in this run, in index order.
    pub shards_written: Vec<PathBuf>,
    /// Shards found complete on disk and left untouched.
    pub shards_reused: Vec<PathBuf>,
    /// Samples skipped because of sample-level errors.
    pub skipped: Vec<SkippedSample>,
    /// Vocabulary file used for the run.
    pub vocabulary_path: PathBuf,
    /// Number of vocabulary symbols.
    pub vocabulary_size: usize,
}

/// Packs labeled images into shard files.
#[derive(Debug, Clone)]
pub struct DatasetPacker {
    config: PipelineConfig,
}

impl DatasetPacker {
    /// Creates a packer after validating `config`.
    pub fn new(config: PipelineConfig) -> PackResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Vocabulary location. Relative paths are resolved against `output_dir`.
    pub fn vocabulary_path(&self, output_dir: &Path) -> PathBuf {
        let path = &self.config.label.vocabulary_path;
        if path.is_absolute() {
            path.clone()
        } else {
            output_dir.join(path)
        }
    }

    /// Packs every image found in `source_dir`.
    pub fn pack_dir(
        &self,
        source_dir: &Path,
        output_dir: &Path,
        shard_name: &str,
    ) -> PackResult<PackReport> {
        let paths = discover_images(source_dir)?;
        self.pack_paths(&paths, output_dir, shard_name)
    }

    /// Packs the given images, in order, into `{shard_name}{n}` shards.
    ///
    /// Images that fail to decode and labels that exceed the per-character
    /// capacity are logged and skipped. Any other error aborts the run.
    pub fn pack_paths(
        &self,
        paths: &[PathBuf],
        output_dir: &Path,
        shard_name: &str,
    ) -> PackResult<PackReport> {
        let start = Instant::now();
        check_shard_name(shard_name)?;
        let mut samples = samples_from_paths(paths, self.config.label.separator)?;
        if let Some(seed) = self.config.pack.shuffle_seed {
            samples.shuffle(&mut StdRng::seed_from_u64(seed));
        }

        let vocabulary_path = self.vocabulary_path(output_dir);
        let labels: Vec<&str> = samples.iter().map(|s| s.label.as_str()).collect();
        let vocabulary = Arc::new(Vocabulary::load_or_build(
            &vocabulary_path,
            &labels,
            self.config.label.mode,
        )?);
        info!(
            "Packing {} samples with {} {} symbols",
            samples.len(),
            vocabulary.len(),
            self.config.label.mode
        );

        let canvas = CanvasCodec::from_config(&self.config.canvas);
        let labels = LabelCodec::from_config(&self.config.label, vocabulary.clone());
        let writer = ShardWriter::new(output_dir, shard_name, self.config.pack.shard_size)?
            .with_extension(self.config.pack.shard_extension.clone());
        let pool = self.config.parallel.build_pool()?;

        let removed = writer.remove_partial_shards()?;
        if removed > 0 {
            warn!("Discarded {} incomplete shards from a previous run", removed);
        }

        let mut report = PackReport {
            samples: samples.len(),
            vocabulary_path,
            vocabulary_size: vocabulary.len(),
            ..PackReport::default()
        };

        let mut remaining = samples.len();
        for (offset, chunk) in samples.chunks(writer.max_per_shard()).enumerate() {
            let index = offset + 1;
            let shard_path = writer.shard_path(index);
            remaining -= chunk.len();

            if self.config.pack.resume && shard_path.exists() {
                info!("Shard {} already complete, skipping", shard_path.display());
                report.shards_reused.push(shard_path);
                continue;
            }

            let encoded: Vec<PackResult<ShardRecord>> = pool.install(|| {
                chunk
                    .par_iter()
                    .map(|sample| encode_sample(sample, &canvas, &labels))
                    .collect()
            });

            let mut records = Vec::with_capacity(chunk.len());
            for (sample, result) in chunk.iter().zip(encoded) {
                match result {
                    Ok(record) => records.push(record),
                    Err(e) if e.is_sample_level() => {
                        warn!("Skipping {}: {}", sample.path.display(), e);
                        report.skipped.push(SkippedSample {
                            path: sample.path.clone(),
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }

            report.records_written += records.len();
            report.shards_written.push(writer.write_shard(index, &records)?);
            debug!("{} samples left to pack", remaining);
        }

        info!(
            "Packed {} records into {} shards ({} reused, {} skipped samples) in {:.2?}",
            report.records_written,
            report.shards_written.len(),
            report.shards_reused.len(),
            report.skipped.len(),
            start.elapsed()
        );
        Ok(report)
    }
}

fn encode_sample(
    sample: &Sample,
    canvas: &CanvasCodec,
    labels: &LabelCodec,
) -> PackResult<ShardRecord> {
    let label = labels.encode(&sample.label)?;
    let image = canvas.encode_path(&sample.path)?;
    Ok(ShardRecord::new(image, label))
}
