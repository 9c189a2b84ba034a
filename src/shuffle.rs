use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

/// Re-emits the records of `inner` in a locally randomized order using at most
/// `capacity` buffered records.
///
/// The buffer is filled on the first pull. Each later pull picks a uniformly
/// random buffered record, puts the next record from `inner` in its slot, or
/// swap-removes the slot once `inner` is exhausted. This is an approximate
/// shuffle: a record can only be emitted once it has entered the buffer.
///
/// Errors from `inner` are passed through as soon as they are pulled; the
/// buffered records are kept and still emitted afterwards.
pub struct ShuffleBuffer<I, T> {
  inner: I,
  buffer: Vec<T>,
  capacity: usize,
  primed: bool,
  inner_done: bool,
  rng: StdRng,
}

impl<I, T> ShuffleBuffer<I, T>
where
  I: Iterator<Item = Result<T>>,
{
  pub fn new(inner: I, capacity: usize) -> Result<Self> {
    Self::with_rng(inner, capacity, StdRng::from_os_rng())
  }

  pub fn with_seed(inner: I, capacity: usize, seed: u64) -> Result<Self> {
    Self::with_rng(inner, capacity, StdRng::seed_from_u64(seed))
  }

  pub fn with_rng(inner: I, capacity: usize, rng: StdRng) -> Result<Self> {
    if capacity == 0 {
      return Err(Error::Config("shuffle buffer capacity must be positive".into()));
    }
    Ok(Self {
      inner,
      buffer: Vec::with_capacity(capacity),
      capacity,
      primed: false,
      inner_done: false,
      rng,
    })
  }

  /// Number of records currently held. Never exceeds `capacity`.
  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  fn pull(&mut self) -> Option<Result<T>> {
    if self.inner_done {
      return None;
    }
    let item = self.inner.next();
    if item.is_none() {
      self.inner_done = true;
    }
    item
  }

  fn fill(&mut self) -> Result<()> {
    while self.buffer.len() < self.capacity {
      match self.pull() {
        Some(Ok(record)) => self.buffer.push(record),
        Some(Err(e)) => return Err(e),
        None => break,
      }
    }
    Ok(())
  }
}

impl<I, T> Iterator for ShuffleBuffer<I, T>
where
  I: Iterator<Item = Result<T>>,
{
  type Item = Result<T>;

  fn next(&mut self) -> Option<Self::Item> {
    if !self.primed {
      if let Err(e) = self.fill() {
        return Some(Err(e));
      }
      self.primed = true;
    }

    if self.buffer.is_empty() {
      return None;
    }

    let idx = self.rng.random_range(0..self.buffer.len());
    match self.pull() {
      Some(Ok(record)) => Some(Ok(std::mem::replace(&mut self.buffer[idx], record))),
      Some(Err(e)) => Some(Err(e)),
      None => Some(Ok(self.buffer.swap_remove(idx))),
    }
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    if self.inner_done {
      return (self.buffer.len(), Some(self.buffer.len()));
    }
    let (lower, upper) = self.inner.size_hint();
    (
      lower.saturating_add(self.buffer.len()),
      upper.and_then(|u| u.checked_add(self.buffer.len())),
    )
  }
}

/// Adds `.shuffled(capacity)` to any fallible record iterator.
pub trait ShuffleExt<T>: Iterator<Item = Result<T>> + Sized {
  fn shuffled(self, capacity: usize) -> Result<ShuffleBuffer<Self, T>> {
    ShuffleBuffer::new(self, capacity)
  }
}

impl<I, T> ShuffleExt<T> for I where I: Iterator<Item = Result<T>> {}
