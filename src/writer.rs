use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::{CompressionType, SyncMode, WriterOptions};
use crate::error::Result;
use crate::frame::write_frame;

#[cfg(feature = "gzip")]
use flate2::{Compression, write::GzEncoder};

enum Sink {
  Raw(BufWriter<File>),
  #[cfg(feature = "gzip")]
  Gzip(GzEncoder<BufWriter<File>>),
}

impl Sink {
  fn writer(&mut self) -> &mut dyn Write {
    match self {
      Sink::Raw(w) => w,
      #[cfg(feature = "gzip")]
      Sink::Gzip(w) => w,
    }
  }

  /// Pushes everything buffered so far down to the file and `fsync`s it.
  fn sync(&mut self) -> Result<()> {
    match self {
      Sink::Raw(w) => {
        w.flush()?;
        w.get_ref().sync_data()?;
      }
      #[cfg(feature = "gzip")]
      Sink::Gzip(enc) => {
        enc.flush()?;
        enc.get_mut().flush()?;
        enc.get_ref().get_ref().sync_data()?;
      }
    }
    Ok(())
  }

  /// Finishes any compression stream and returns the flushed file.
  fn finish(self) -> Result<File> {
    let mut buffered = match self {
      Sink::Raw(w) => w,
      #[cfg(feature = "gzip")]
      Sink::Gzip(enc) => enc.finish()?,
    };
    buffered.flush()?;
    Ok(buffered.into_inner().map_err(|e| e.into_error())?)
  }
}

/// Appends framed records to a new record file.
///
/// `close` flushes and releases the file and can only be called once, since it
/// consumes the writer. A writer dropped without `close` flushes on a best-effort
/// basis and logs any failure.
pub struct RecordWriter {
  path: PathBuf,
  sink: Option<Sink>,
  sync_mode: SyncMode,
  bytes_written: u64,
  records_written: u64,
}

impl RecordWriter {
  /// Creates (or truncates) the file at `path`.
  pub fn create(path: impl AsRef<Path>, options: &WriterOptions) -> Result<Self> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let buffered = BufWriter::with_capacity(options.write_buffer_size, file);

    let sink = match options.compression {
      CompressionType::None => Sink::Raw(buffered),
      #[cfg(feature = "gzip")]
      CompressionType::Gzip => Sink::Gzip(GzEncoder::new(buffered, Compression::default())),
    };

    Ok(Self {
      path: path.to_path_buf(),
      sink: Some(sink),
      sync_mode: options.sync_mode,
      bytes_written: 0,
      records_written: 0,
    })
  }

  /// Appends one frame. Returns the number of (uncompressed) bytes it occupies.
  pub fn write(&mut self, record: &[u8]) -> Result<u64> {
    let Some(sink) = self.sink.as_mut() else {
      return Err(crate::error::Error::Config(format!(
        "writer for {} is already closed",
        self.path.display()
      )));
    };

    let written = write_frame(sink.writer(), record)?;
    if self.sync_mode == SyncMode::Strict {
      sink.sync()?;
    }

    self.bytes_written += written;
    self.records_written += 1;
    Ok(written)
  }

  /// Total frame bytes written, measured before compression.
  pub fn bytes_written(&self) -> u64 {
    self.bytes_written
  }

  pub fn records_written(&self) -> u64 {
    self.records_written
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Flushes all buffered frames and releases the file handle.
  pub fn close(mut self) -> Result<()> {
    self.finish()
  }

  fn finish(&mut self) -> Result<()> {
    let Some(sink) = self.sink.take() else {
      return Ok(());
    };
    let file = sink.finish()?;
    if self.sync_mode != SyncMode::Async {
      file.sync_all()?;
    }
    Ok(())
  }
}

impl Drop for RecordWriter {
  fn drop(&mut self) {
    if let Err(e) = self.finish() {
      tracing::error!(target: "tfrecord_stream", "Failed to flush record file on drop. Data loss possible. Path: {:?}, Error: {}", self.path, e);
    }
  }
}
