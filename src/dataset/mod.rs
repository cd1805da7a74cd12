//! Sharded dataset storage.
//!
//! * `shard` - The shard file format, writer and lazy reader
//! * `pack` - Directory-to-shards packaging with resume support

pub mod pack;
pub mod shard;

pub use pack::{DatasetPacker, PackReport, SkippedSample};
pub use shard::{
    ShardReader, ShardRecord, ShardRecords, ShardWriter, check_shard_name, list_shards, read_shard,
};
