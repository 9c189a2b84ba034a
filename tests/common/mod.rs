#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use tfrecord_stream::{RecordWriter, WriterOptions, frame_len};

pub struct TestEnv {
  // The TempDir guard must be kept alive to prevent premature deletion of the directory.
  pub _dir: TempDir,
  pub root: PathBuf,
}

impl TestEnv {
  pub fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    Self { _dir: dir, root }
  }

  /// Writes `records` to `name` and returns its path.
  pub fn write_records(&self, name: &str, records: &[Vec<u8>], options: &WriterOptions) -> PathBuf {
    let path = self.root.join(name);
    let mut writer = RecordWriter::create(&path, options).unwrap();
    for record in records {
      writer.write(record).unwrap();
    }
    writer.close().unwrap();
    path
  }

  /// Writes a text index (`offset length` per line) matching `records` as
  /// they were framed into a file.
  pub fn write_index(&self, name: &str, records: &[Vec<u8>]) -> PathBuf {
    let path = self.root.join(name);
    let mut offset = 0u64;
    let mut text = String::new();
    for record in records {
      let frame = frame_len(record.len() as u64);
      text.push_str(&format!("{} {}\n", offset, frame));
      offset += frame;
    }
    fs::write(&path, text).unwrap();
    path
  }
}

/// Records of the given sizes, each filled with its own position so they are
/// distinguishable.
pub fn records_of_sizes(sizes: &[usize]) -> Vec<Vec<u8>> {
  sizes.iter().enumerate().map(|(i, &len)| vec![i as u8; len]).collect()
}

/// `n` records tagged with `tag` followed by their big-endian sequence number.
pub fn tagged_records(tag: u8, n: u32) -> Vec<Vec<u8>> {
  (0..n)
    .map(|i| {
      let mut record = vec![tag];
      record.extend_from_slice(&i.to_be_bytes());
      record
    })
    .collect()
}
