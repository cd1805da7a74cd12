//! The class-index vocabulary and its JSON side file.
//!
//! A vocabulary maps contiguous indices `0..N-1` to symbols, where the symbols
//! are the sorted unique set observed in a corpus. It is persisted as a JSON
//! object of string index to string symbol:
//!
//! ```json
//! {"0":"2","1":"a","2":"b"}
//! ```
//!
//! The file is written once. Later runs reuse it and refuse to continue when
//! the corpus contains symbols the file does not know about.

use crate::core::errors::{PackError, PackResult};
use crate::domain::LabelingMode;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Bidirectional symbol/index mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    symbols: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Creates a vocabulary from symbols, sorting and de-duplicating them.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = symbols.into_iter().map(Into::into).collect();
        Self::from_ordered(unique.into_iter().collect())
    }

    fn from_ordered(symbols: Vec<String>) -> Self {
        let index = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self { symbols, index }
    }

    /// Builds a vocabulary over the symbols `mode` extracts from `labels`.
    pub fn build<'a, I>(labels: I, mode: LabelingMode) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::from_symbols(labels.into_iter().flat_map(|l| mode.symbols_of(l)))
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true when the vocabulary has no symbols.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbol at `index`, if any.
    pub fn symbol(&self, index: usize) -> Option<&str> {
        self.symbols.get(index).map(String::as_str)
    }

    /// Index of `symbol`, if present.
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    /// All symbols in index order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Symbols `mode` extracts from `labels` that this vocabulary lacks, sorted.
    pub fn missing_symbols<'a, I>(&self, labels: I, mode: LabelingMode) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        labels
            .into_iter()
            .flat_map(|l| mode.symbols_of(l))
            .filter(|s| !self.index.contains_key(s))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Reads a vocabulary file.
    pub fn load(path: &Path) -> PackResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PackError::InvalidVocabulary {
            message: format!("failed to read '{}': {}", path.display(), e),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes the vocabulary file, creating parent directories.
    ///
    /// The content is written to a sibling temporary file and renamed into
    /// place so readers never observe a half-written vocabulary.
    pub fn save(&self, path: &Path) -> PackResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Returns the persisted vocabulary, building and saving it first if absent.
    ///
    /// An existing file is never rewritten. If it does not cover every symbol
    /// in `labels`, a [`PackError::StaleVocabulary`] is returned instead of
    /// silently continuing with a mismatched label space.
    pub fn load_or_build(path: &Path, labels: &[&str], mode: LabelingMode) -> PackResult<Self> {
        if path.exists() {
            let vocabulary = Self::load(path)?;
            let missing = vocabulary.missing_symbols(labels.iter().copied(), mode);
            if !missing.is_empty() {
                return Err(PackError::StaleVocabulary {
                    path: path.to_path_buf(),
                    missing,
                });
            }
            debug!(
                "Reusing vocabulary {} with {} symbols",
                path.display(),
                vocabulary.len()
            );
            return Ok(vocabulary);
        }

        let vocabulary = Self::build(labels.iter().copied(), mode);
        vocabulary.save(path)?;
        info!(
            "Built {} vocabulary with {} symbols at {}",
            mode,
            vocabulary.len(),
            path.display()
        );
        Ok(vocabulary)
    }
}

impl Serialize for Vocabulary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.symbols.len()))?;
        for (i, symbol) in self.symbols.iter().enumerate() {
            map.serialize_entry(&i.to_string(), symbol)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Vocabulary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = HashMap::<String, String>::deserialize(deserializer)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<HashMap<String, String>> for Vocabulary {
    type Error = PackError;

    fn try_from(raw: HashMap<String, String>) -> Result<Self, Self::Error> {
        let mut slots: Vec<Option<String>> = vec![None; raw.len()];
        for (key, symbol) in raw {
            let index: usize = key.parse().map_err(|_| PackError::InvalidVocabulary {
                message: format!("index '{key}' is not a non-negative integer"),
            })?;
            let slot = slots.get_mut(index).ok_or_else(|| PackError::InvalidVocabulary {
                message: format!("index {index} breaks the contiguous 0..N-1 range"),
            })?;
            *slot = Some(symbol);
        }

        let expected = slots.len();
        let symbols: Vec<String> = slots.into_iter().flatten().collect();
        if symbols.len() != expected {
            return Err(PackError::InvalidVocabulary {
                message: "indices do not cover 0..N-1".to_string(),
            });
        }
        let unique: BTreeSet<&String> = symbols.iter().collect();
        if unique.len() != symbols.len() {
            return Err(PackError::InvalidVocabulary {
                message: "duplicate symbols".to_string(),
            });
        }
        Ok(Self::from_ordered(symbols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_per_character_is_sorted_unique() {
        let vocab = Vocabulary::build(["ba", "ca", "a2"], LabelingMode::PerCharacter);
        assert_eq!(vocab.symbols(), &["2", "a", "b", "c"]);
        assert_eq!(vocab.index_of("a"), Some(1));
        assert_eq!(vocab.symbol(3), Some("c"));
        assert_eq!(vocab.symbol(4), None);
    }

    #[test]
    fn test_build_whole_label() {
        let vocab = Vocabulary::build(["dog", "cat", "dog"], LabelingMode::WholeLabel);
        assert_eq!(vocab.symbols(), &["cat", "dog"]);
    }

    #[test]
    fn test_json_round_trip() {
        let vocab = Vocabulary::from_symbols(["x", "y", "z"]);
        let json = serde_json::to_string(&vocab).unwrap();
        assert_eq!(json, r#"{"0":"x","1":"y","2":"z"}"#);
        let parsed: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vocab);
    }

    #[test]
    fn test_unordered_keys_are_accepted() {
        let parsed: Vocabulary = serde_json::from_str(
            r#"{"10":"k","2":"c","0":"a","1":"b","3":"d","4":"e","5":"f","6":"g","7":"h","8":"i","9":"j"}"#,
        )
        .unwrap();
        assert_eq!(parsed.len(), 11);
        assert_eq!(parsed.symbol(10), Some("k"));
    }

    #[test]
    fn test_non_contiguous_indices_rejected() {
        let gap = r#"{"0":"a","2":"b"}"#;
        assert!(serde_json::from_str::<Vocabulary>(gap).is_err());
        assert!(serde_json::from_str::<Vocabulary>(r#"{"x":"a"}"#).is_err());
        assert!(serde_json::from_str::<Vocabulary>(r#"{"0":"a","1":"a"}"#).is_err());
    }

    #[test]
    fn test_load_or_build_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vocab").join("num_classes.json");
        let labels = ["ab", "bc"];

        let first = Vocabulary::load_or_build(&path, &labels, LabelingMode::PerCharacter).unwrap();
        let before = std::fs::read(&path).unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        let second =
            Vocabulary::load_or_build(&path, &labels, LabelingMode::PerCharacter).unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read(&path).unwrap(), before);
        let metadata = std::fs::metadata(&path).unwrap();
        assert_eq!(metadata.modified().unwrap(), modified);
    }

    #[test]
    fn test_existing_file_is_not_rebuilt_for_subset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("num_classes.json");
        Vocabulary::load_or_build(&path, &["abc"], LabelingMode::PerCharacter).unwrap();

        let reused = Vocabulary::load_or_build(&path, &["a"], LabelingMode::PerCharacter).unwrap();
        assert_eq!(reused.len(), 3);
    }

    #[test]
    fn test_stale_vocabulary_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("num_classes.json");
        Vocabulary::load_or_build(&path, &["ab"], LabelingMode::PerCharacter).unwrap();

        let err = Vocabulary::load_or_build(&path, &["abz", "y"], LabelingMode::PerCharacter)
            .unwrap_err();
        match err {
            PackError::StaleVocabulary { missing, .. } => assert_eq!(missing, vec!["y", "z"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
