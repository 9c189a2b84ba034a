use std::fmt;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ReaderOptions;
use crate::error::{Error, Result};
use crate::index::RecordIndex;
use crate::reader::RecordReader;

/// A boxed record stream, as produced by a source constructor.
pub type RecordIter = Box<dyn Iterator<Item = Result<Vec<u8>>> + Send>;

type Constructor = Box<dyn FnMut() -> Result<RecordIter> + Send>;

/// One input of a `WeightedSampler`: a weight plus a constructor that builds a
/// fresh stream over the source, from its beginning, every time it is called.
pub struct Source {
  name: String,
  weight: f64,
  constructor: Constructor,
}

impl Source {
  pub fn new<F, I>(name: impl Into<String>, weight: f64, mut constructor: F) -> Self
  where
    F: FnMut() -> Result<I> + Send + 'static,
    I: Iterator<Item = Result<Vec<u8>>> + Send + 'static,
  {
    Self {
      name: name.into(),
      weight,
      constructor: Box::new(move || constructor().map(|stream| Box::new(stream) as RecordIter)),
    }
  }

  /// A source reading a whole record file. The index, if any, is loaded on the
  /// first open and reused for every replay; it only moves the starting record.
  pub fn file(path: impl Into<PathBuf>, index_path: Option<PathBuf>, weight: f64, options: ReaderOptions) -> Self {
    let path = path.into();
    let name = path.display().to_string();
    let mut index: Option<RecordIndex> = None;

    Self::new(name, weight, move || {
      if index.is_none() {
        if let Some(index_path) = &index_path {
          index = Some(RecordIndex::load(index_path)?);
        }
      }
      RecordReader::open(&path, index.as_ref(), None, &options)
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn weight(&self) -> f64 {
    self.weight
  }
}

impl fmt::Debug for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Source")
      .field("name", &self.name)
      .field("weight", &self.weight)
      .finish_non_exhaustive()
  }
}

/// Builds one file source per split, substituting the split name for `{}` in
/// the data and index patterns. Sharding is not available for merged sources.
pub fn split_sources(
  data_pattern: &str,
  index_pattern: Option<&str>,
  splits: &[(&str, f64)],
  options: &ReaderOptions,
) -> Vec<Source> {
  splits
    .iter()
    .map(|&(split, weight)| {
      let data_path = data_pattern.replace("{}", split);
      let index_path = index_pattern.map(|p| PathBuf::from(p.replace("{}", split)));
      Source::file(data_path, index_path, weight, options.clone())
    })
    .collect()
}

enum Step {
  Record(Vec<u8>),
  Exhausted,
  Failed(Error),
  OpenFailed(Error),
}

struct ActiveSource {
  source: Source,
  stream: Option<RecordIter>,
  /// Records yielded by the current stream since it was (re)built.
  yielded: u64,
}

impl ActiveSource {
  fn step(&mut self) -> Step {
    if self.stream.is_none() {
      match (self.source.constructor)() {
        Ok(stream) => {
          self.stream = Some(stream);
          self.yielded = 0;
        }
        Err(e) => return Step::OpenFailed(e),
      }
    }
    let Some(stream) = self.stream.as_mut() else {
      return Step::Exhausted;
    };

    match stream.next() {
      Some(Ok(record)) => {
        self.yielded += 1;
        Step::Record(record)
      }
      Some(Err(e)) => {
        self.stream = None;
        Step::Failed(e)
      }
      None => {
        self.stream = None;
        Step::Exhausted
      }
    }
  }
}

/// Merges several record sources into one stream, picking the source of each
/// record at random with probability proportional to its static weight.
///
/// In finite mode an exhausted source is dropped and the merge ends when every
/// source has been read through once. In infinite mode an exhausted source is
/// rebuilt from its constructor and the merge never ends on its own.
///
/// Errors:
/// * a source whose constructor fails is dropped and the error is returned;
/// * in finite mode, a stream error drops the source and is returned;
/// * in infinite mode, a stream error restarts the source and is only logged,
///   unless the stream failed before producing anything, in which case the
///   source is dropped and the error returned.
///
/// A source that ends without producing a record is dropped in infinite mode
/// rather than being rebuilt forever.
pub struct WeightedSampler {
  active: Vec<ActiveSource>,
  /// Running totals of the active weights, for binary-search selection.
  cumulative: Vec<f64>,
  infinite: bool,
  rng: StdRng,
}

impl WeightedSampler {
  pub fn new(sources: Vec<Source>, infinite: bool) -> Result<Self> {
    Self::with_rng(sources, infinite, StdRng::from_os_rng())
  }

  pub fn with_seed(sources: Vec<Source>, infinite: bool, seed: u64) -> Result<Self> {
    Self::with_rng(sources, infinite, StdRng::seed_from_u64(seed))
  }

  pub fn with_rng(sources: Vec<Source>, infinite: bool, rng: StdRng) -> Result<Self> {
    let mut active = Vec::with_capacity(sources.len());
    for source in sources {
      if !source.weight.is_finite() || source.weight < 0.0 {
        return Err(Error::Config(format!(
          "source {} has invalid weight {}",
          source.name, source.weight
        )));
      }
      if source.weight == 0.0 {
        tracing::debug!(target: "tfrecord_stream", "Skipping zero-weight source {}", source.name);
        continue;
      }
      active.push(ActiveSource {
        source,
        stream: None,
        yielded: 0,
      });
    }

    let mut sampler = Self {
      active,
      cumulative: Vec::new(),
      infinite,
      rng,
    };
    sampler.rebuild_cumulative();
    Ok(sampler)
  }

  /// Number of sources still taking part in the merge.
  pub fn active_sources(&self) -> usize {
    self.active.len()
  }

  pub fn is_infinite(&self) -> bool {
    self.infinite
  }

  /// Weights are scaled by the largest one so the running total cannot
  /// overflow, whatever the individual (finite) weights are.
  fn rebuild_cumulative(&mut self) {
    let max = self.active.iter().map(|a| a.source.weight).fold(0.0, f64::max);
    let mut total = 0.0;
    self.cumulative = self
      .active
      .iter()
      .map(|a| {
        total += a.source.weight / max;
        total
      })
      .collect();
  }

  fn draw(&mut self) -> usize {
    let total = self.cumulative.last().copied().unwrap_or(0.0);
    let x = self.rng.random::<f64>() * total;
    let idx = self.cumulative.partition_point(|&c| c <= x);
    idx.min(self.active.len() - 1)
  }

  fn remove(&mut self, idx: usize) {
    let removed = self.active.swap_remove(idx);
    tracing::debug!(
      target: "tfrecord_stream",
      "Source {} left the merge, {} remaining",
      removed.source.name,
      self.active.len()
    );
    self.rebuild_cumulative();
  }
}

impl Iterator for WeightedSampler {
  type Item = Result<Vec<u8>>;

  fn next(&mut self) -> Option<Self::Item> {
    while !self.active.is_empty() {
      let idx = self.draw();
      let step = self.active[idx].step();
      let yielded = self.active[idx].yielded;

      match step {
        Step::Record(record) => return Some(Ok(record)),
        Step::Exhausted => {
          if !self.infinite {
            self.remove(idx);
          } else if yielded == 0 {
            tracing::warn!(
              target: "tfrecord_stream",
              "Source {} produced no records, dropping it",
              self.active[idx].source.name
            );
            self.remove(idx);
          }
        }
        Step::Failed(e) => {
          if self.infinite && yielded > 0 {
            tracing::warn!(
              target: "tfrecord_stream",
              "Source {} failed, restarting from the beginning: {}",
              self.active[idx].source.name,
              e
            );
            continue;
          }
          self.remove(idx);
          return Some(Err(e));
        }
        Step::OpenFailed(e) => {
          self.remove(idx);
          return Some(Err(e));
        }
      }
    }
    None
  }
}
