use std::str::FromStr;

use crate::error::{Error, Result};

/// Compression filter applied to the whole record file, underneath the framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
  /// Raw bytes.
  #[default]
  None,

  /// The file is a single gzip stream. Index offsets refer to the
  /// decompressed bytes.
  #[cfg(feature = "gzip")]
  Gzip,
}

impl CompressionType {
  /// Parses the optional compression name used by record-file configs.
  ///
  /// `None` and `"none"` select raw reading, `"gzip"` selects gzip.
  pub fn parse(name: Option<&str>) -> Result<Self> {
    match name {
      None => Ok(CompressionType::None),
      Some(name) => name.parse(),
    }
  }
}

impl FromStr for CompressionType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "none" | "" => Ok(CompressionType::None),
      #[cfg(feature = "gzip")]
      "gzip" => Ok(CompressionType::Gzip),
      other => Err(Error::UnsupportedCompression(other.to_string())),
    }
  }
}

/// Defines the strategy used for reading uncompressed record files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadStrategy {
  /// Uses a buffered `File` with `seek` and `read`.
  #[default]
  StandardIo,

  /// Memory-maps the record file.
  /// Ignored for compressed files, which always stream through the decoder.
  /// WARNING: the file must not be truncated while mapped (SIGBUS).
  Mmap,
}

/// What to do with the two checksums stored in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
  /// Read the checksum fields to stay aligned, but do not compare them.
  /// Corrupted-but-correctly-sized records are accepted.
  #[default]
  Skip,

  /// Recompute both checksums and fail with `ChecksumMismatch` on difference.
  Verify,
}

/// Defines how often the writer flushes data to the physical disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
  /// Flush and `fsync` after every single `write`.
  Strict,

  /// `fsync` once, when the writer is closed.
  OnClose,

  /// Never call `fsync`. Closing only hands the buffer to the OS.
  Async,
}

#[derive(Debug, Clone)]
pub struct ReaderOptions {
  pub compression: CompressionType,
  pub read_strategy: ReadStrategy,
  pub checksum_policy: ChecksumPolicy,

  /// Size of the `BufReader` wrapped around the file.
  /// Default: 128 KB.
  pub read_buffer_size: usize,

  /// Initial capacity of the per-reader payload scratch buffer.
  /// Grows on demand, never shrinks.
  /// Default: 1 MB.
  pub scratch_capacity: usize,
}

impl Default for ReaderOptions {
  fn default() -> Self {
    Self {
      compression: CompressionType::None,
      read_strategy: ReadStrategy::StandardIo,
      checksum_policy: ChecksumPolicy::Skip,
      read_buffer_size: 128 * 1024, // 128 KB
      scratch_capacity: 1024 * 1024, // 1 MB
    }
  }
}

impl ReaderOptions {
  pub fn new(compression: CompressionType) -> Self {
    Self {
      compression,
      ..Default::default()
    }
  }

  pub fn verify_checksums(mut self) -> Self {
    self.checksum_policy = ChecksumPolicy::Verify;
    self
  }

  pub fn with_read_strategy(mut self, strategy: ReadStrategy) -> Self {
    self.read_strategy = strategy;
    self
  }
}

#[derive(Debug, Clone)]
pub struct WriterOptions {
  pub compression: CompressionType,
  pub sync_mode: SyncMode,

  /// Size of the in-memory write buffer before handing bytes to the OS.
  /// Default: 64 KB.
  pub write_buffer_size: usize,
}

impl Default for WriterOptions {
  fn default() -> Self {
    Self {
      compression: CompressionType::None,
      sync_mode: SyncMode::OnClose,
      write_buffer_size: 64 * 1024, // 64 KB
    }
  }
}

impl WriterOptions {
  pub fn new(compression: CompressionType) -> Self {
    Self {
      compression,
      ..Default::default()
    }
  }
}
