//! Samples on disk and the labels encoded in their file names.

use crate::core::errors::{PackError, PackResult};
use std::path::{Path, PathBuf};

/// A raw image on disk together with its text label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Path of the source image.
    pub path: PathBuf,
    /// Label derived from the file name.
    pub label: String,
}

impl Sample {
    /// Creates a sample whose label is taken from the file name.
    pub fn from_path(path: impl Into<PathBuf>, separator: Option<char>) -> PackResult<Self> {
        let path = path.into();
        let label = label_from_path(&path, separator)?;
        Ok(Self { path, label })
    }
}

/// Derives a label from a file name.
///
/// The label is the file stem, truncated at the first `separator` when one is
/// given, so `"a1b2_0007.jpg"` yields `"a1b2"`.
pub fn label_from_path(path: &Path, separator: Option<char>) -> PackResult<String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            PackError::invalid_input(format!(
                "cannot derive a label from '{}'",
                path.display()
            ))
        })?;

    let label = match separator {
        Some(sep) => stem.split(sep).next().unwrap_or(stem),
        None => stem,
    };
    Ok(label.to_string())
}

/// Lists sample files in a dataset directory.
///
/// Files directly inside `dir` are returned, and sub-directories are flattened
/// one level deep. The result is sorted so repeated runs see the same order.
pub fn discover_images(dir: &Path) -> PackResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            for inner in std::fs::read_dir(&path)? {
                let inner = inner?.path();
                if inner.is_file() {
                    files.push(inner);
                }
            }
        } else if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Builds samples for every path, deriving labels from file names.
pub fn samples_from_paths(paths: &[PathBuf], separator: Option<char>) -> PackResult<Vec<Sample>> {
    paths
        .iter()
        .map(|p| Sample::from_path(p.clone(), separator))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_label_from_path_with_separator() {
        let label = label_from_path(Path::new("data/a1b2_0007.jpg"), Some('_')).unwrap();
        assert_eq!(label, "a1b2");
    }

    #[test]
    fn test_label_from_path_without_separator() {
        let label = label_from_path(Path::new("data/a1b2_0007.jpg"), None).unwrap();
        assert_eq!(label, "a1b2_0007");
    }

    #[test]
    fn test_label_without_separator_present() {
        let label = label_from_path(Path::new("xyz.png"), Some('_')).unwrap();
        assert_eq!(label, "xyz");
    }

    #[test]
    fn test_discover_flattens_one_level() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b_1.jpg"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("a_1.jpg"), b"x").unwrap();
        std::fs::create_dir_all(dir.path().join("nested").join("deeper")).unwrap();
        std::fs::write(
            dir.path().join("nested").join("deeper").join("c_1.jpg"),
            b"x",
        )
        .unwrap();

        let files = discover_images(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["b_1.jpg", "a_1.jpg"]);
    }

    #[test]
    fn test_samples_from_paths() {
        let paths = vec![PathBuf::from("x/ab_1.png"), PathBuf::from("x/cd_2.png")];
        let samples = samples_from_paths(&paths, Some('_')).unwrap();
        assert_eq!(samples[0].label, "ab");
        assert_eq!(samples[1].label, "cd");
        assert_eq!(samples[1].path, PathBuf::from("x/cd_2.png"));
    }
}
