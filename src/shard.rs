use std::ops::Range;

use rand::Rng;

use crate::error::{Error, Result};
use crate::index::RecordIndex;

/// An externally assigned `(shard_id, shard_count)` pair, e.g. worker id and
/// number of workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
  pub shard_id: usize,
  pub shard_count: usize,
}

impl ShardSpec {
  pub fn new(shard_id: usize, shard_count: usize) -> Result<Self> {
    if shard_count == 0 || shard_id >= shard_count {
      return Err(Error::InvalidShard { shard_id, shard_count });
    }
    Ok(Self { shard_id, shard_count })
  }

  /// The half-open range of index positions owned by this shard among `n` records.
  ///
  /// Consecutive shards are contiguous and their sizes differ by at most one.
  pub fn record_range(&self, n: usize) -> Range<usize> {
    let split = |k: usize| (n as u128 * k as u128 / self.shard_count as u128) as usize;
    split(self.shard_id)..split(self.shard_id + 1)
  }
}

/// Byte range `[start, end)` of a record stream. `end == None` reads to end of stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRange {
  pub start: u64,
  pub end: Option<u64>,
}

impl ShardRange {
  pub const WHOLE: ShardRange = ShardRange { start: 0, end: None };
  pub const EMPTY: ShardRange = ShardRange { start: 0, end: Some(0) };

  pub fn is_empty(&self) -> bool {
    matches!(self.end, Some(end) if end <= self.start)
  }

  /// Whether a frame starting at `position` belongs to this range.
  pub fn contains(&self, position: u64) -> bool {
    position >= self.start && self.end.is_none_or(|end| position < end)
  }
}

/// Computes the byte range a shard must read, from the index offsets.
pub fn plan(index: &RecordIndex, shard: ShardSpec) -> Result<ShardRange> {
  // Re-validate: the fields are public and may have been built by hand.
  let shard = ShardSpec::new(shard.shard_id, shard.shard_count)?;

  let n = index.len();
  let records = shard.record_range(n);
  let Some(start) = index.offset(records.start) else {
    return Ok(ShardRange::EMPTY);
  };
  let end = index.offset(records.end);

  Ok(ShardRange { start, end })
}

/// Picks one indexed record uniformly at random as a rotation point.
/// Returns `None` for an empty index.
pub fn plan_random_start<R: Rng + ?Sized>(index: &RecordIndex, rng: &mut R) -> Option<u64> {
  if index.is_empty() {
    return None;
  }
  index.offset(rng.random_range(0..index.len()))
}
