//! Shard files: bounded slices of the packaged dataset.
//!
//! A shard is a small header followed by length-prefixed records and a
//! terminator carrying the record count:
//!
//! ```text
//! magic "CPSH" | version u16
//! ( len u32 | bincode(ShardRecord) ) * n
//! 0u32 | n u64
//! ```
//!
//! All integers are little-endian. The label shape is not stored; readers
//! derive it from the persisted vocabulary and the labeling mode.
//!
//! Shards are written under a `.partial` name and renamed once complete, so a
//! file carrying the final name always holds a full shard.

use crate::core::constants::{DEFAULT_SHARD_EXTENSION, PARTIAL_SHARD_SUFFIX};
use crate::core::errors::{PackError, PackResult};
use crate::domain::LabelShape;
use crate::processors::{Canvas, CanvasCodec, LabelCodec, LabelVector};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MAGIC: &[u8; 4] = b"CPSH";
const FORMAT_VERSION: u16 = 1;
const MAX_RECORD_BYTES: u32 = 256 * 1024 * 1024;

/// One serialized sample: compressed image bytes and the label payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardRecord {
    /// Lossy-compressed canvas.
    pub image: Vec<u8>,
    /// Numeric label target.
    pub label: LabelVector,
}

impl ShardRecord {
    /// Creates a record.
    pub fn new(image: Vec<u8>, label: LabelVector) -> Self {
        Self { image, label }
    }
}

/// Checks that `name` can prefix numbered shard files.
///
/// A name ending in a digit would make `{name}{index}` ambiguous: shard 12 of
/// `s` and shard 2 of `s1` share the file name `s12`.
pub fn check_shard_name(name: &str) -> PackResult<()> {
    if name.ends_with(|c: char| c.is_ascii_digit()) {
        return Err(PackError::invalid_input(format!(
            "shard name '{name}' must not end with a digit"
        )));
    }
    if name.contains(['/', '\\']) {
        return Err(PackError::invalid_input(format!(
            "shard name '{name}' must not contain a path separator"
        )));
    }
    Ok(())
}

/// Writes records into numbered shard files `{name}{index}.{ext}`.
///
/// Indices are 1-based.
#[derive(Debug, Clone)]
pub struct ShardWriter {
    dir: PathBuf,
    name: String,
    extension: String,
    max_per_shard: usize,
}

impl ShardWriter {
    /// Creates a writer for `dir`, creating the directory if needed.
    pub fn new(
        dir: impl Into<PathBuf>,
        name: impl Into<String>,
        max_per_shard: usize,
    ) -> PackResult<Self> {
        if max_per_shard == 0 {
            return Err(PackError::invalid_input(
                "max_per_shard must be greater than 0",
            ));
        }
        let name = name.into();
        check_shard_name(&name)?;
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            name,
            extension: DEFAULT_SHARD_EXTENSION.to_string(),
            max_per_shard,
        })
    }

    /// Sets the shard file extension (without the dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Maximum records per shard.
    pub fn max_per_shard(&self) -> usize {
        self.max_per_shard
    }

    /// Path of the complete shard with the given index.
    pub fn shard_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}{}.{}", self.name, index, self.extension))
    }

    fn partial_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!(
            "{}{}.{}.{}",
            self.name, index, self.extension, PARTIAL_SHARD_SUFFIX
        ))
    }

    /// Writes one shard and returns its final path.
    pub fn write_shard(&self, index: usize, records: &[ShardRecord]) -> PackResult<PathBuf> {
        let partial = self.partial_path(index);
        let path = self.shard_path(index);
        debug!("Opening shard {}", partial.display());

        let mut out = BufWriter::new(File::create(&partial)?);
        out.write_all(MAGIC)?;
        out.write_all(&FORMAT_VERSION.to_le_bytes())?;
        for record in records {
            let payload = bincode::serialize(record)?;
            let len = u32::try_from(payload.len())
                .ok()
                .filter(|&len| len > 0 && len <= MAX_RECORD_BYTES)
                .ok_or_else(|| {
                    PackError::invalid_input(format!(
                        "record of {} bytes cannot be framed",
                        payload.len()
                    ))
                })?;
            out.write_all(&len.to_le_bytes())?;
            out.write_all(&payload)?;
        }
        out.write_all(&0u32.to_le_bytes())?;
        out.write_all(&(records.len() as u64).to_le_bytes())?;
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        std::fs::rename(&partial, &path)?;
        info!("Wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }

    /// Writes every record, `max_per_shard` at a time, starting at shard 1.
    ///
    /// Only one shard's worth of records is buffered at any time.
    pub fn write<I>(&self, records: I) -> PackResult<Vec<PathBuf>>
    where
        I: IntoIterator<Item = ShardRecord>,
    {
        let chunks = records.into_iter().chunks(self.max_per_shard);
        let mut paths = Vec::new();
        for (offset, chunk) in (&chunks).into_iter().enumerate() {
            let batch: Vec<ShardRecord> = chunk.collect();
            paths.push(self.write_shard(offset + 1, &batch)?);
        }
        Ok(paths)
    }

    /// Deletes leftover `.partial` files of this writer's shards.
    pub fn remove_partial_shards(&self) -> PackResult<usize> {
        let suffix = format!(".{}.{}", self.extension, PARTIAL_SHARD_SUFFIX);
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_partial = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(self.name.as_str()))
                .and_then(|rest| rest.strip_suffix(suffix.as_str()))
                .is_some_and(|index| index.parse::<usize>().is_ok());
            if is_partial {
                debug!("Removing incomplete shard {}", path.display());
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Lists the complete shards `{name}{index}.{ext}` in `dir`, ordered by index.
pub fn list_shards(dir: &Path, name: &str, extension: &str) -> PackResult<Vec<PathBuf>> {
    check_shard_name(name)?;
    let suffix = format!(".{extension}");
    let mut shards = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let index = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(name))
            .and_then(|rest| rest.strip_suffix(suffix.as_str()))
            .and_then(|index| index.parse::<usize>().ok());
        if let Some(index) = index {
            shards.push((index, path));
        }
    }
    Ok(shards
        .into_iter()
        .sorted_by_key(|(index, _)| *index)
        .map(|(_, path)| path)
        .collect())
}

/// Reads every record of one shard.
pub fn read_shard(path: &Path) -> PackResult<Vec<ShardRecord>> {
    ShardRecords::new(vec![path.to_path_buf()]).collect()
}

struct OpenShard {
    path: PathBuf,
    reader: BufReader<File>,
    seen: u64,
}

impl OpenShard {
    fn open(path: &Path) -> PackResult<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut magic = [0u8; 4];
        let mut version = [0u8; 2];
        read_exact(&mut reader, &mut magic, path)?;
        read_exact(&mut reader, &mut version, path)?;
        if &magic != MAGIC {
            return Err(PackError::corrupt_shard(path, "not a shard file"));
        }
        let version = u16::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(PackError::corrupt_shard(
                path,
                format!("unsupported format version {version}"),
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            seen: 0,
        })
    }

    /// Next record, or `None` at a valid terminator.
    fn next_record(&mut self) -> PackResult<Option<ShardRecord>> {
        let mut len = [0u8; 4];
        read_exact(&mut self.reader, &mut len, &self.path)?;
        let len = u32::from_le_bytes(len);

        if len == 0 {
            let mut count = [0u8; 8];
            read_exact(&mut self.reader, &mut count, &self.path)?;
            let count = u64::from_le_bytes(count);
            if count != self.seen {
                return Err(PackError::corrupt_shard(
                    &self.path,
                    format!("terminator declares {count} records but {} were read", self.seen),
                ));
            }
            return Ok(None);
        }
        if len > MAX_RECORD_BYTES {
            return Err(PackError::corrupt_shard(
                &self.path,
                format!("record length {len} exceeds limit"),
            ));
        }

        let mut payload = vec![0u8; len as usize];
        read_exact(&mut self.reader, &mut payload, &self.path)?;
        let record = bincode::deserialize(&payload)
            .map_err(|e| PackError::corrupt_shard(&self.path, format!("bad record: {e}")))?;
        self.seen += 1;
        Ok(Some(record))
    }
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8], path: &Path) -> PackResult<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => PackError::corrupt_shard(path, "truncated"),
        _ => PackError::Io(e),
    })
}

/// Lazy iterator over the raw records of a list of shards, in order.
///
/// Stops after the first error.
pub struct ShardRecords {
    paths: std::vec::IntoIter<PathBuf>,
    current: Option<OpenShard>,
    failed: bool,
}

impl ShardRecords {
    /// Creates an iterator over `paths`. No file is opened until iteration starts.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into_iter(),
            current: None,
            failed: false,
        }
    }

    fn advance(&mut self) -> PackResult<Option<ShardRecord>> {
        loop {
            if self.current.is_none() {
                match self.paths.next() {
                    Some(path) => self.current = Some(OpenShard::open(&path)?),
                    None => return Ok(None),
                }
            }
            if let Some(shard) = self.current.as_mut() {
                match shard.next_record()? {
                    Some(record) => return Ok(Some(record)),
                    None => self.current = None,
                }
            }
        }
    }
}

impl Iterator for ShardRecords {
    type Item = PackResult<ShardRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.advance() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Reads packaged shards back into canvases and label vectors.
///
/// Every call to [`ShardReader::iter`] starts a fresh pass over the shards.
#[derive(Debug, Clone)]
pub struct ShardReader {
    paths: Vec<PathBuf>,
    canvas: CanvasCodec,
    shape: LabelShape,
}

impl ShardReader {
    /// Creates a reader over `paths`, decoding images with `canvas` and
    /// validating labels against `shape`.
    pub fn new(paths: Vec<PathBuf>, canvas: CanvasCodec, shape: LabelShape) -> Self {
        Self {
            paths,
            canvas,
            shape,
        }
    }

    /// Creates a reader whose label shape comes from a label codec.
    pub fn with_label_codec(
        paths: Vec<PathBuf>,
        canvas: CanvasCodec,
        labels: &LabelCodec,
    ) -> Self {
        Self::new(paths, canvas, labels.shape())
    }

    /// Shard paths in read order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Expected label shape.
    pub fn shape(&self) -> LabelShape {
        self.shape
    }

    /// Raw records without decoding the images.
    pub fn records(&self) -> ShardRecords {
        ShardRecords::new(self.paths.clone())
    }

    /// Lazily decoded `(canvas, label)` pairs in write order.
    pub fn iter(&self) -> impl Iterator<Item = PackResult<(Canvas, LabelVector)>> + '_ {
        self.records().map(move |record| {
            let record = record?;
            record.label.check_shape(self.shape)?;
            let canvas = self.canvas.decode_jpeg(&record.image)?;
            Ok((canvas, record.label))
        })
    }
}
