use std::collections::VecDeque;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::config::ReaderOptions;
use crate::error::{Error, FrameField, Result};
use crate::frame::{FrameDecoder, LENGTH_SIZE, frame_len};
use crate::index::RecordIndex;
use crate::shard::{self, ShardRange, ShardSpec};
use crate::source::ByteSource;

/// A lazy, single-pass stream of raw records from one record file.
///
/// Depending on what it is opened with, the reader covers:
/// * no index: the whole file, start to end (any shard is ignored);
/// * an index but no shard: the whole file, starting at a random record and
///   wrapping around to the beginning;
/// * an index and a shard: exactly the shard's contiguous byte range.
///
/// The file handle is released as soon as the stream ends, fails, is closed,
/// or the reader is dropped. A failed reader yields nothing further.
pub struct RecordReader {
  path: PathBuf,
  source: Option<ByteSource>,
  decoder: FrameDecoder,
  /// Byte ranges still to be read, in order.
  passes: VecDeque<ShardRange>,
  current: Option<ShardRange>,
  /// Decompressed offset of the next frame.
  position: u64,
  records_read: u64,
}

impl RecordReader {
  pub fn open(
    path: impl AsRef<Path>,
    index: Option<&RecordIndex>,
    shard: Option<ShardSpec>,
    options: &ReaderOptions,
  ) -> Result<Self> {
    Self::open_with_rng(path, index, shard, options, &mut rand::rng())
  }

  /// Like `open`, with the rotation point of an unsharded indexed read drawn from `rng`.
  pub fn open_with_rng<R: Rng + ?Sized>(
    path: impl AsRef<Path>,
    index: Option<&RecordIndex>,
    shard: Option<ShardSpec>,
    options: &ReaderOptions,
    rng: &mut R,
  ) -> Result<Self> {
    let path = path.as_ref();
    let passes = Self::plan_passes(path, index, shard, rng)?;
    let source = ByteSource::open(path, options)?;

    Ok(Self {
      path: path.to_path_buf(),
      source: Some(source),
      decoder: FrameDecoder::new(options.scratch_capacity, options.checksum_policy),
      passes,
      current: None,
      position: 0,
      records_read: 0,
    })
  }

  /// Opens a reader, loading the text index at `index_path` when given.
  pub fn open_with_index_file(
    path: impl AsRef<Path>,
    index_path: Option<&Path>,
    shard: Option<ShardSpec>,
    options: &ReaderOptions,
  ) -> Result<Self> {
    let index = index_path.map(RecordIndex::load).transpose()?;
    Self::open(path, index.as_ref(), shard, options)
  }

  fn plan_passes<R: Rng + ?Sized>(
    path: &Path,
    index: Option<&RecordIndex>,
    shard: Option<ShardSpec>,
    rng: &mut R,
  ) -> Result<VecDeque<ShardRange>> {
    let passes = match (index, shard) {
      (None, shard) => {
        if let Some(shard) = shard {
          tracing::debug!(target: "tfrecord_stream", "No index for {}, ignoring shard {:?}", path.display(), shard);
        }
        vec![ShardRange::WHOLE]
      }
      (Some(index), None) => match shard::plan_random_start(index, rng) {
        Some(start) => vec![
          ShardRange { start, end: None },
          ShardRange {
            start: 0,
            end: Some(start),
          },
        ],
        None => vec![ShardRange::WHOLE],
      },
      (Some(index), Some(shard)) => vec![shard::plan(index, shard)?],
    };
    Ok(passes.into_iter().filter(|range| !range.is_empty()).collect())
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Offset of the next frame in the decompressed stream.
  pub fn position(&self) -> u64 {
    self.position
  }

  pub fn records_read(&self) -> u64 {
    self.records_read
  }

  /// Whether the underlying file handle is still held.
  pub fn is_open(&self) -> bool {
    self.source.is_some()
  }

  /// Releases the file handle. Dropping the reader has the same effect.
  pub fn close(mut self) {
    self.release();
  }

  fn release(&mut self) {
    if self.source.take().is_some() {
      tracing::debug!(
        target: "tfrecord_stream",
        "Closed {} after {} records",
        self.path.display(),
        self.records_read
      );
    }
    self.passes.clear();
    self.current = None;
  }

  fn fail(&mut self, err: Error) -> Error {
    tracing::warn!(
      target: "tfrecord_stream",
      "Reading {} failed at offset {}: {}",
      self.path.display(),
      self.position,
      err
    );
    self.release();
    err
  }

  fn begin_pass(&mut self, range: ShardRange) -> Result<()> {
    if let Some(source) = self.source.as_mut() {
      source.seek(SeekFrom::Start(range.start))?;
    }
    self.position = range.start;
    self.current = Some(range);
    Ok(())
  }
}

impl Iterator for RecordReader {
  type Item = Result<Vec<u8>>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if self.source.is_none() {
        return None;
      }

      let range = match self.current {
        Some(range) => range,
        None => match self.passes.pop_front() {
          Some(range) => {
            if let Err(e) = self.begin_pass(range) {
              return Some(Err(self.fail(e)));
            }
            range
          }
          None => {
            self.release();
            return None;
          }
        },
      };

      if !range.contains(self.position) {
        self.current = None;
        continue;
      }

      let source = self.source.as_mut()?;
      match self.decoder.read_frame(source) {
        Ok(Some(payload)) => {
          let record = payload.to_vec();
          self.position += frame_len(record.len() as u64);
          self.records_read += 1;
          return Some(Ok(record));
        }
        Ok(None) => {
          if range.end.is_some() {
            // The range promised more frames than the stream holds.
            let err = Error::TruncatedRecord {
              field: FrameField::Length,
              expected: LENGTH_SIZE,
              actual: 0,
            };
            return Some(Err(self.fail(err)));
          }
          self.current = None;
        }
        Err(e) => return Some(Err(self.fail(e))),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::write_frame;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use std::fs;

  fn write_file(dir: &Path, records: &[Vec<u8>]) -> (PathBuf, RecordIndex) {
    let path = dir.join("data.tfrecord");
    let mut buf = Vec::new();
    let mut offsets = Vec::new();
    for record in records {
      offsets.push(buf.len() as u64);
      write_frame(&mut buf, record).unwrap();
    }
    fs::write(&path, buf).unwrap();
    (path, RecordIndex::from_offsets(offsets).unwrap())
  }

  fn records(n: u8) -> Vec<Vec<u8>> {
    (0..n).map(|i| vec![i; i as usize]).collect()
  }

  #[test]
  fn test_rotation_covers_every_record_once() {
    let dir = tempfile::tempdir().unwrap();
    let data = records(10);
    let (path, index) = write_file(dir.path(), &data);

    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..5 {
      let reader = RecordReader::open_with_rng(&path, Some(&index), None, &ReaderOptions::default(), &mut rng).unwrap();
      let out: Vec<Vec<u8>> = reader.map(|r| r.unwrap()).collect();
      assert_eq!(out.len(), data.len());

      // Output is the file sequence rotated by some k.
      let k = data.iter().position(|r| *r == out[0]).unwrap();
      let mut rotated = data.clone();
      rotated.rotate_left(k);
      assert_eq!(out, rotated);
    }
  }

  #[test]
  fn test_shard_without_index_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let data = records(4);
    let (path, _) = write_file(dir.path(), &data);

    let shard = ShardSpec::new(1, 2).unwrap();
    let reader = RecordReader::open(&path, None, Some(shard), &ReaderOptions::default()).unwrap();
    assert_eq!(reader.count(), 4);
  }

  #[test]
  fn test_handle_released_on_exhaustion() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = write_file(dir.path(), &records(2));

    let mut reader = RecordReader::open(&path, None, None, &ReaderOptions::default()).unwrap();
    assert!(reader.is_open());
    assert!(reader.next().is_some());
    assert!(reader.next().is_some());
    assert!(reader.next().is_none());
    assert!(!reader.is_open());
    assert_eq!(reader.records_read(), 2);
  }

  #[test]
  fn test_index_past_end_of_file_is_truncation() {
    let dir = tempfile::tempdir().unwrap();
    let data = records(3);
    let (path, index) = write_file(dir.path(), &data);

    // A stale index claiming three more records beyond the file end, so the
    // first of two shards ends at an offset the file never reaches.
    let mut offsets: Vec<u64> = index.offsets().collect();
    let file_len = fs::metadata(&path).unwrap().len();
    offsets.extend([file_len + 100, file_len + 200, file_len + 300]);
    let stale = RecordIndex::from_offsets(offsets).unwrap();

    let shard = ShardSpec::new(0, 2).unwrap();
    let mut reader = RecordReader::open(&path, Some(&stale), Some(shard), &ReaderOptions::default()).unwrap();
    let items: Vec<Result<Vec<u8>>> = reader.by_ref().collect();
    assert_eq!(items.len(), 4);
    assert!(items[..3].iter().all(|r| r.is_ok()));
    assert!(matches!(items[3], Err(Error::TruncatedRecord { .. })));
    assert!(reader.next().is_none());
  }
}
