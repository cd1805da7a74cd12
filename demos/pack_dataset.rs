//! Dataset Packaging Example
//!
//! This example packs a directory of labeled captcha images into shard files.
//! Labels are read from file names (`{label}_{anything}.{ext}`), a vocabulary
//! file is created on the first run and reused afterwards, and images are
//! normalized onto a fixed canvas before being compressed into records.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example pack_dataset -- [OPTIONS] <SOURCE_DIR> <OUTPUT_DIR>
//! ```
//!
//! # Arguments
//!
//! * `-c, --config` - JSON pipeline configuration (optional)
//! * `-n, --name` - Shard file name prefix
//! * `--mode` - Labeling mode: ORDINARY, NUM_CLASSES or CTC
//! * `--survey` - Report image dimensions before packing
//!
//! # Example
//!
//! ```bash
//! RUST_LOG=info cargo run --example pack_dataset -- \
//!     --mode CTC --max-length 6 --shard-size 5000 \
//!     captchas/train packed/train
//! ```

use captcha_pack::core::config::{ConfigValidator, PipelineConfig};
use captcha_pack::core::init_tracing;
use captcha_pack::dataset::DatasetPacker;
use captcha_pack::domain::{LabelingMode, discover_images};
use captcha_pack::utils::survey_dimensions;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

/// Command-line arguments for the packaging example
#[derive(Parser)]
#[command(name = "pack_dataset")]
#[command(about = "Packs labeled captcha images into shard files")]
struct Args {
    /// Directory holding the labeled images
    source_dir: PathBuf,

    /// Directory receiving the shards and the vocabulary file
    output_dir: PathBuf,

    /// JSON pipeline configuration; command-line options override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shard file name prefix
    #[arg(short, long, default_value = "train")]
    name: String,

    /// Labeling mode (PerCharacter/ORDINARY, WholeLabel/NUM_CLASSES, Sequence/CTC)
    #[arg(long)]
    mode: Option<String>,

    /// Canvas height
    #[arg(long)]
    height: Option<u32>,

    /// Canvas width
    #[arg(long)]
    width: Option<u32>,

    /// Per-character label capacity
    #[arg(long)]
    max_length: Option<usize>,

    /// Records per shard
    #[arg(long)]
    shard_size: Option<usize>,

    /// Seed for a reproducible shuffle
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads for image normalization
    #[arg(long)]
    threads: Option<usize>,

    /// Report the largest image dimensions and non-RGB files first
    #[arg(long)]
    survey: bool,
}

fn parse_mode(mode: &str) -> Result<LabelingMode, Box<dyn std::error::Error>> {
    Ok(serde_json::from_value(serde_json::Value::String(
        mode.to_string(),
    ))?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    init_tracing();

    let args = Args::parse();

    if !args.source_dir.is_dir() {
        error!("Source directory not found: {}", args.source_dir.display());
        return Err("Source directory not found".into());
    }

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::new(),
    };
    if let Some(mode) = &args.mode {
        config = config.with_mode(parse_mode(mode)?);
    }
    if let Some(height) = args.height {
        config.canvas.height = height;
    }
    if let Some(width) = args.width {
        config.canvas.width = width;
    }
    if let Some(max_length) = args.max_length {
        config = config.with_max_length(max_length);
    }
    if let Some(shard_size) = args.shard_size {
        config = config.with_shard_size(shard_size);
    }
    if args.seed.is_some() {
        config.pack.shuffle_seed = args.seed;
    }
    if args.threads.is_some() {
        config.parallel.max_threads = args.threads;
    }
    config.validate()?;

    if args.survey {
        let paths = discover_images(&args.source_dir)?;
        let survey = survey_dimensions(&paths)?;
        info!(
            "{} images, largest height {} px, largest width {} px",
            survey.images, survey.max_height, survey.max_width
        );
        for path in &survey.non_rgb {
            warn!("Not an RGB image: {}", path.display());
        }
    }

    let start = Instant::now();
    let packer = DatasetPacker::new(config)?;
    let report = packer.pack_dir(&args.source_dir, &args.output_dir, &args.name)?;

    info!(
        "Vocabulary: {} ({} symbols)",
        report.vocabulary_path.display(),
        report.vocabulary_size
    );
    for shard in &report.shards_written {
        info!("  wrote {}", shard.display());
    }
    for shard in &report.shards_reused {
        info!("  kept  {}", shard.display());
    }
    for skipped in &report.skipped {
        warn!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    info!(
        "Done: {} of {} samples packed in {:.2?}",
        report.records_written,
        report.samples,
        start.elapsed()
    );

    Ok(())
}
