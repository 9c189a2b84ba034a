use std::fmt;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The four fixed-size pieces of a frame, in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameField {
  Length,
  LengthCrc,
  Payload,
  PayloadCrc,
}

impl fmt::Display for FrameField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      FrameField::Length => "length",
      FrameField::LengthCrc => "length checksum",
      FrameField::Payload => "payload",
      FrameField::PayloadCrc => "payload checksum",
    };
    f.write_str(name)
  }
}

#[derive(Error, Debug)]
pub enum Error {
  #[error("I/O Error: {0}")]
  Io(#[from] io::Error),

  #[error("Truncated record: {field} needs {expected} bytes, only {actual} available")]
  TruncatedRecord {
    field: FrameField,
    expected: usize,
    actual: usize,
  },

  #[error("CRC32C Checksum Mismatch on {field}: expected {expected:#x}, got {actual:#x}")]
  ChecksumMismatch { field: FrameField, expected: u32, actual: u32 },

  #[error("Invalid shard {shard_id} of {shard_count}")]
  InvalidShard { shard_id: usize, shard_count: usize },

  #[error("Unsupported compression type: {0} (expected \"gzip\" or none)")]
  UnsupportedCompression(String),

  #[error("Invalid index file: {0}")]
  InvalidIndex(String),

  #[error("Configuration Error: {0}")]
  Config(String),
}
