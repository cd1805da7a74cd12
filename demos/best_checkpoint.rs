//! Checkpoint Selection Example
//!
//! This example finds the checkpoint a training run should resume from and
//! previews the warm-restart learning-rate schedule for that run.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example best_checkpoint -- [OPTIONS] <CHECKPOINT_DIR>
//! ```
//!
//! # Example
//!
//! ```bash
//! RUST_LOG=info cargo run --example best_checkpoint -- \
//!     --samples 20000 --epochs 100 --batch-size 32 checkpoints/
//! ```

use captcha_pack::core::config::SchedulerConfig;
use captcha_pack::core::init_tracing;
use captcha_pack::training::{WarmRestartScheduler, list_checkpoints, select_best};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments for the checkpoint example
#[derive(Parser)]
#[command(name = "best_checkpoint")]
#[command(about = "Selects the best checkpoint and previews the learning-rate schedule")]
struct Args {
    /// Directory holding checkpoint files
    checkpoint_dir: PathBuf,

    /// Number of training samples
    #[arg(long, default_value = "10000")]
    samples: usize,

    /// Number of training epochs
    #[arg(long, default_value = "200")]
    epochs: usize,

    /// Batch size
    #[arg(long, default_value = "16")]
    batch_size: usize,

    /// Peak learning rate
    #[arg(long, default_value = "0.0001")]
    learning_rate: f64,

    /// Print one rate every N steps
    #[arg(long, default_value = "500")]
    every: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    init_tracing();

    let args = Args::parse();

    let checkpoints = list_checkpoints(&args.checkpoint_dir)?;
    info!("Found {} checkpoints", checkpoints.len());
    match select_best(&args.checkpoint_dir)? {
        Some(path) => info!("Resume from {}", path.display()),
        None => info!("No checkpoint available, training starts from scratch"),
    }

    let config = SchedulerConfig {
        learning_rate: args.learning_rate,
        epochs: args.epochs,
        batch_size: args.batch_size,
        ..SchedulerConfig::default()
    };
    let mut scheduler = WarmRestartScheduler::from_training(&config, args.samples)?;
    let total = scheduler.params().total_steps;
    info!(
        "{} steps, restarts at {:?}",
        total,
        scheduler.restart_steps()
    );

    let every = args.every.max(1);
    for step in 0..total {
        let rate = scheduler.next_step();
        if step % every == 0 || scheduler.restart_steps().contains(&step) {
            info!("step {:>7}: {:.3e}", step, rate);
        }
    }

    Ok(())
}
