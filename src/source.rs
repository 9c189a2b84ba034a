use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use memmap2::Mmap;

use crate::config::{CompressionType, ReadStrategy, ReaderOptions};
use crate::error::Result;

#[cfg(feature = "gzip")]
use flate2::read::MultiGzDecoder;
#[cfg(feature = "gzip")]
use std::path::PathBuf;

/// The byte stream underneath the framing: a plain file, a memory map, or a
/// decompressing filter. All offsets are in decompressed bytes.
pub enum ByteSource {
  Io(BufReader<File>),
  Mmap(Cursor<Mmap>),
  #[cfg(feature = "gzip")]
  Gzip(GzipSource),
}

impl ByteSource {
  pub fn open(path: &Path, options: &ReaderOptions) -> Result<Self> {
    match options.compression {
      CompressionType::None => {
        let file = File::open(path)?;
        if options.read_strategy == ReadStrategy::Mmap {
          // Safety: Caller must ensure the file is not truncated while mapped.
          let mmap = unsafe { Mmap::map(&file)? };
          return Ok(ByteSource::Mmap(Cursor::new(mmap)));
        }
        Ok(ByteSource::Io(BufReader::with_capacity(options.read_buffer_size, file)))
      }
      #[cfg(feature = "gzip")]
      CompressionType::Gzip => {
        if options.read_strategy == ReadStrategy::Mmap {
          tracing::debug!(target: "tfrecord_stream", "Mmap ignored for gzip file {}", path.display());
        }
        Ok(ByteSource::Gzip(GzipSource::open(path, options.read_buffer_size)?))
      }
    }
  }
}

impl Read for ByteSource {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    match self {
      Self::Io(reader) => reader.read(buf),
      Self::Mmap(cursor) => cursor.read(buf),
      #[cfg(feature = "gzip")]
      Self::Gzip(gz) => gz.read(buf),
    }
  }
}

impl Seek for ByteSource {
  fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
    match self {
      Self::Io(reader) => reader.seek(pos),
      Self::Mmap(cursor) => cursor.seek(pos),
      #[cfg(feature = "gzip")]
      Self::Gzip(gz) => gz.seek(pos),
    }
  }
}

/// A gzip file opened for sequential reading with emulated seeking.
///
/// Forward seeks decompress and discard. Backward seeks reopen the file and
/// decompress from the beginning. Seeking past the end stops at the end.
#[cfg(feature = "gzip")]
pub struct GzipSource {
  path: PathBuf,
  buffer_size: usize,
  decoder: MultiGzDecoder<BufReader<File>>,
  position: u64,
}

#[cfg(feature = "gzip")]
impl GzipSource {
  pub fn open(path: &Path, buffer_size: usize) -> Result<Self> {
    let decoder = Self::decoder(path, buffer_size)?;
    Ok(Self {
      path: path.to_path_buf(),
      buffer_size,
      decoder,
      position: 0,
    })
  }

  fn decoder(path: &Path, buffer_size: usize) -> io::Result<MultiGzDecoder<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(MultiGzDecoder::new(BufReader::with_capacity(buffer_size, file)))
  }

  fn rewind_to_start(&mut self) -> io::Result<()> {
    self.decoder = Self::decoder(&self.path, self.buffer_size)?;
    self.position = 0;
    Ok(())
  }

  fn seek_to(&mut self, target: u64) -> io::Result<u64> {
    if target < self.position {
      self.rewind_to_start()?;
    }
    let skip = target - self.position;
    if skip > 0 {
      let skipped = io::copy(&mut (&mut self.decoder).take(skip), &mut io::sink())?;
      self.position += skipped;
    }
    Ok(self.position)
  }
}

#[cfg(feature = "gzip")]
impl Read for GzipSource {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    let n = self.decoder.read(buf)?;
    self.position += n as u64;
    Ok(n)
  }
}

#[cfg(feature = "gzip")]
impl Seek for GzipSource {
  fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
    let target = match pos {
      SeekFrom::Start(offset) => offset,
      SeekFrom::Current(delta) => self.position.checked_add_signed(delta).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "invalid seek to a negative position")
      })?,
      SeekFrom::End(_) => {
        return Err(io::Error::new(
          io::ErrorKind::Unsupported,
          "seeking relative to the end of a gzip stream",
        ));
      }
    };
    self.seek_to(target)
  }
}
