use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// One row of a record index: where a frame starts and how long its payload is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
  pub offset: u64,
  pub length: u64,
}

/// A pre-built, read-only record-offset table for one record file.
///
/// Offsets are strictly increasing and each one is the first byte of a frame
/// in the (decompressed) record stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordIndex {
  entries: Vec<IndexEntry>,
}

impl RecordIndex {
  /// Loads a text index: one `offset length` row per record, whitespace separated.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    Self::parse(&text).map_err(|e| match e {
      Error::InvalidIndex(msg) => Error::InvalidIndex(format!("{}: {}", path.display(), msg)),
      other => other,
    })
  }

  /// Parses the text form of an index.
  pub fn parse(text: &str) -> Result<Self> {
    let mut entries = Vec::new();

    for (line_idx, line) in text.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }

      let mut cols = line.split_whitespace();
      let (Some(offset), Some(length), None) = (cols.next(), cols.next(), cols.next()) else {
        return Err(Error::InvalidIndex(format!(
          "line {}: expected 2 columns, got {:?}",
          line_idx + 1,
          line
        )));
      };

      let parse_col = |s: &str| {
        s.parse::<u64>()
          .map_err(|e| Error::InvalidIndex(format!("line {}: {:?} is not an offset: {}", line_idx + 1, s, e)))
      };

      entries.push(IndexEntry {
        offset: parse_col(offset)?,
        length: parse_col(length)?,
      });
    }

    Self::from_entries(entries)
  }

  pub fn from_entries(entries: Vec<IndexEntry>) -> Result<Self> {
    if let Some(pos) = entries.windows(2).position(|w| w[1].offset <= w[0].offset) {
      return Err(Error::InvalidIndex(format!(
        "offsets must be strictly increasing (row {}: {} after {})",
        pos + 2,
        entries[pos + 1].offset,
        entries[pos].offset
      )));
    }
    Ok(Self { entries })
  }

  /// Builds an index from offsets only. Lengths are recorded as 0.
  pub fn from_offsets(offsets: impl IntoIterator<Item = u64>) -> Result<Self> {
    Self::from_entries(offsets.into_iter().map(|offset| IndexEntry { offset, length: 0 }).collect())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Byte offset of the `i`-th record.
  pub fn offset(&self, i: usize) -> Option<u64> {
    self.entries.get(i).map(|e| e.offset)
  }

  pub fn entries(&self) -> &[IndexEntry] {
    &self.entries
  }

  pub fn offsets(&self) -> impl Iterator<Item = u64> + '_ {
    self.entries.iter().map(|e| e.offset)
  }
}
