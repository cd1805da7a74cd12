//! Checkpoint naming and best-checkpoint selection.
//!
//! Checkpoints carry their validation metrics in the file name:
//!
//! ```text
//! {prefix}.-{epoch:02}-{loss:.4}[-{metric:.4}].{ext}
//! ```
//!
//! [`CheckpointMetrics::parse`] is the only place that knows this layout.

use crate::core::errors::PackResult;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::debug;

static CHECKPOINT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<prefix>.*)\.-(?P<epoch>\d+)-(?P<loss>-?\d+(?:\.\d+)?)(?:-(?P<metric>-?\d+(?:\.\d+)?))?\.(?P<ext>[A-Za-z][A-Za-z0-9]*)$",
    )
    .unwrap_or_else(|e| panic!("Failed to compile regex pattern: {e}"))
});

/// Validation metrics recorded in a checkpoint file name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointMetrics {
    /// Epoch the checkpoint was saved at.
    pub epoch: u32,
    /// Validation loss.
    pub loss: f64,
    /// Accuracy-like validation metric, higher is better.
    pub metric: Option<f64>,
}

impl CheckpointMetrics {
    /// Creates metrics with an accuracy-like value.
    pub fn new(epoch: u32, loss: f64, metric: f64) -> Self {
        Self {
            epoch,
            loss,
            metric: Some(metric),
        }
    }

    /// Parses a checkpoint file name such as `Model_weights.-05-0.3000-0.9000.hdf5`.
    pub fn parse(file_name: &str) -> Option<Self> {
        let captures = CHECKPOINT_NAME.captures(file_name)?;
        let epoch = captures.name("epoch")?.as_str().parse().ok()?;
        let loss = captures.name("loss")?.as_str().parse().ok()?;
        let metric = match captures.name("metric") {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };
        Some(Self {
            epoch,
            loss,
            metric,
        })
    }

    /// Formats the file name these metrics are stored under.
    pub fn file_name(&self, prefix: &str, extension: &str) -> String {
        match self.metric {
            Some(metric) => format!(
                "{prefix}.-{:02}-{:.4}-{:.4}.{extension}",
                self.epoch, self.loss, metric
            ),
            None => format!("{prefix}.-{:02}-{:.4}.{extension}", self.epoch, self.loss),
        }
    }

    /// Orders by quality: higher metric first, then lower loss, then later epoch.
    ///
    /// A missing metric ranks below any present one.
    pub fn quality_cmp(&self, other: &Self) -> Ordering {
        let metric = match (self.metric, other.metric) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        metric
            .then_with(|| other.loss.total_cmp(&self.loss))
            .then_with(|| self.epoch.cmp(&other.epoch))
    }
}

/// A checkpoint file and the metrics parsed from its name.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// File path.
    pub path: PathBuf,
    /// Parsed metrics.
    pub metrics: CheckpointMetrics,
}

/// Lists the checkpoints in `dir` whose names carry metrics.
///
/// A missing directory yields an empty list.
pub fn list_checkpoints(dir: &Path) -> PackResult<Vec<Checkpoint>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut checkpoints = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let metrics = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(CheckpointMetrics::parse);
        match metrics {
            Some(metrics) => checkpoints.push(Checkpoint { path, metrics }),
            None => debug!("Ignoring {}: no metrics in file name", path.display()),
        }
    }
    Ok(checkpoints)
}

/// Picks the best checkpoint in `dir`.
///
/// Returns `Ok(None)` when the directory is missing or holds no checkpoint,
/// which is the normal state before the first training run.
pub fn select_best(dir: &Path) -> PackResult<Option<PathBuf>> {
    let best = list_checkpoints(dir)?.into_iter().max_by(|a, b| {
        a.metrics
            .quality_cmp(&b.metrics)
            .then_with(|| b.path.cmp(&a.path))
    });

    match best {
        Some(checkpoint) => {
            debug!("Best checkpoint is {}", checkpoint.path.display());
            Ok(Some(checkpoint.path))
        }
        None => {
            debug!("No checkpoint available in {}", dir.display());
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"weights").unwrap();
        path
    }

    #[test]
    fn test_parse_full_name() {
        let m = CheckpointMetrics::parse("Model_weights.-05-0.3000-0.9000.hdf5").unwrap();
        assert_eq!(m.epoch, 5);
        assert!((m.loss - 0.3).abs() < 1e-12);
        assert_eq!(m.metric, Some(0.9));
    }

    #[test]
    fn test_parse_without_metric() {
        let m = CheckpointMetrics::parse("net.-12-1.2500.ckpt").unwrap();
        assert_eq!(m.epoch, 12);
        assert_eq!(m.metric, None);
    }

    #[test]
    fn test_parse_rejects_other_names() {
        assert!(CheckpointMetrics::parse("notes.txt").is_none());
        assert!(CheckpointMetrics::parse("model-05-0.3.hdf5").is_none());
        let no_extension = "model.-05-0.3000-0.9000";
        assert!(CheckpointMetrics::parse(no_extension).is_none());
    }

    #[test]
    fn test_file_name_round_trip() {
        let metrics = CheckpointMetrics::new(7, 0.123456, 0.98);
        let name = metrics.file_name("Model_weights", "hdf5");
        assert_eq!(name, "Model_weights.-07-0.1235-0.9800.hdf5");

        let parsed = CheckpointMetrics::parse(&name).unwrap();
        assert_eq!(parsed.epoch, 7);
        assert_eq!(parsed.metric, Some(0.98));
    }

    #[test]
    fn test_higher_metric_wins() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "m.-01-0.5000-0.8000.hdf5");
        let best = touch(dir.path(), "m.-05-0.3000-0.9000.hdf5");
        assert_eq!(select_best(dir.path()).unwrap(), Some(best));
    }

    #[test]
    fn test_metric_dominates_loss() {
        let dir = TempDir::new().unwrap();
        let best = touch(dir.path(), "m.-01-0.9000-0.9500.hdf5");
        touch(dir.path(), "m.-02-0.1000-0.9000.hdf5");
        assert_eq!(select_best(dir.path()).unwrap(), Some(best));
    }

    #[test]
    fn test_tie_on_metric_prefers_lower_loss() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "m.-03-0.4000-0.9000.hdf5");
        let best = touch(dir.path(), "m.-04-0.2000-0.9000.hdf5");
        touch(dir.path(), "m.-05-0.6000-0.9000.hdf5");
        assert_eq!(select_best(dir.path()).unwrap(), Some(best));
    }

    #[test]
    fn test_empty_or_missing_directory_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(select_best(dir.path()).unwrap(), None);
        assert_eq!(select_best(&dir.path().join("absent")).unwrap(), None);

        touch(dir.path(), "readme.md");
        assert_eq!(select_best(dir.path()).unwrap(), None);
    }
}
