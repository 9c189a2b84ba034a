//! # tfrecord-stream
//!
//! `tfrecord_stream` reads and writes TFRecord-framed record files and turns
//! one or many of them into a randomized stream of raw records for training
//! loops.
//!
//! ## Key Features
//!
//! * **Byte-exact framing**: `u64` length, payload, and masked CRC-32C checksums.
//! * **Index-based sharding**: split an indexed file between workers by record count.
//! * **Weighted merging**: sample several sources by weight, finite or replayed forever.
//! * **Bounded shuffling**: randomize order with a fixed-size buffer.
//! * **Gzip**: transparent decompression of whole-file gzip record streams.
//!
//! Records are opaque byte vectors; everything is pull-based and single-threaded.
//!
//! ## Example
//!
//! ```no_run
//! use tfrecord_stream::{ReaderOptions, RecordReader, RecordWriter, ShardSpec, ShuffleExt, WriterOptions};
//!
//! # fn main() -> tfrecord_stream::Result<()> {
//! let mut writer = RecordWriter::create("train.tfrecord", &WriterOptions::default())?;
//! writer.write(b"example")?;
//! writer.close()?;
//!
//! // Worker 1 of 4, using a pre-built index.
//! let shard = ShardSpec::new(1, 4)?;
//! let index = tfrecord_stream::RecordIndex::load("train.tfindex")?;
//! let reader = RecordReader::open("train.tfrecord", Some(&index), Some(shard), &ReaderOptions::default())?;
//!
//! for record in reader.shuffled(256)? {
//!   let bytes: Vec<u8> = record?;
//!   # let _ = bytes;
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod frame;
mod index;
mod reader;
mod sampler;
mod shard;
mod shuffle;
mod source;
mod writer;

// Re-exports for the flat public API
pub use config::{ChecksumPolicy, CompressionType, ReadStrategy, ReaderOptions, SyncMode, WriterOptions};
pub use error::{Error, FrameField, Result};
pub use frame::{FRAME_OVERHEAD, FrameDecoder, frame_len, masked_crc, write_frame};
pub use index::{IndexEntry, RecordIndex};
pub use reader::RecordReader;
pub use sampler::{RecordIter, Source, WeightedSampler, split_sources};
pub use shard::{ShardRange, ShardSpec, plan, plan_random_start};
pub use shuffle::{ShuffleBuffer, ShuffleExt};
pub use source::ByteSource;
#[cfg(feature = "gzip")]
pub use source::GzipSource;
pub use writer::RecordWriter;
