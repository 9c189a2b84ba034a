use crate::config::ChecksumPolicy;
use crate::error::{Error, FrameField, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Read, Write};

/// Added to the rotated CRC so that checksums of length fields do not look
/// like checksums of typical payload bytes. Fixed by the TFRecord format.
pub const CRC_MASK_DELTA: u32 = 0xA282_EAD8;

/// The exact binary layout of one frame on disk.
///
/// [Length: 8]
/// [Masked CRC32C of Length: 4]
/// [Payload: Length]
/// [Masked CRC32C of Payload: 4]
pub const LENGTH_SIZE: usize = 8;
pub const CRC_SIZE: usize = 4;
pub const FRAME_OVERHEAD: u64 = (LENGTH_SIZE + CRC_SIZE + CRC_SIZE) as u64; // 16 bytes

/// Largest single extension of the scratch buffer while a payload is read.
const MAX_GROWTH_STEP: usize = 64 * 1024 * 1024;

/// Returns the on-disk size of a frame holding `payload_len` bytes.
pub fn frame_len(payload_len: u64) -> u64 {
  payload_len + FRAME_OVERHEAD
}

/// CRC-32C of `data`, rotated right by 15 bits and offset by `CRC_MASK_DELTA`.
pub fn masked_crc(data: &[u8]) -> u32 {
  let crc = crc32c::crc32c(data);
  crc.rotate_right(15).wrapping_add(CRC_MASK_DELTA)
}

/// Writes a single frame for `payload`. Returns the number of bytes written.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> io::Result<u64> {
  let length = payload.len() as u64;
  let length_bytes = length.to_le_bytes();

  writer.write_all(&length_bytes)?;
  writer.write_u32::<LittleEndian>(masked_crc(&length_bytes))?;
  writer.write_all(payload)?;
  writer.write_u32::<LittleEndian>(masked_crc(payload))?;

  Ok(frame_len(length))
}

/// Reads until `buf` is full or the reader reports end of stream.
/// Returns the number of bytes actually read.
fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
  let mut filled = 0;
  while filled < buf.len() {
    match reader.read(&mut buf[filled..]) {
      Ok(0) => break,
      Ok(n) => filled += n,
      Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
      Err(e) => return Err(e),
    }
  }
  Ok(filled)
}

fn expect_full(field: FrameField, expected: usize, actual: usize) -> Result<()> {
  if actual != expected {
    return Err(Error::TruncatedRecord {
      field,
      expected,
      actual,
    });
  }
  Ok(())
}

/// Decodes frames from a byte stream into a reusable scratch buffer.
///
/// The scratch buffer belongs to one reader and is never shared. When a record
/// does not fit it grows to at least 1.5x, in steps of at most 64 MiB taken as
/// payload bytes arrive, and never shrinks.
#[derive(Debug)]
pub struct FrameDecoder {
  scratch: Vec<u8>,
  policy: ChecksumPolicy,
}

impl FrameDecoder {
  pub fn new(initial_capacity: usize, policy: ChecksumPolicy) -> Self {
    Self {
      scratch: vec![0u8; initial_capacity],
      policy,
    }
  }

  /// Current size of the scratch buffer.
  pub fn capacity(&self) -> usize {
    self.scratch.len()
  }

  /// Reads the next frame and returns a view of its payload.
  ///
  /// `Ok(None)` means the stream ended cleanly on a frame boundary. Running
  /// out of bytes anywhere inside a frame is a `TruncatedRecord` error.
  pub fn read_frame<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<Option<&[u8]>> {
    let mut length_bytes = [0u8; LENGTH_SIZE];
    let n = read_fully(reader, &mut length_bytes)?;
    if n == 0 {
      return Ok(None);
    }
    expect_full(FrameField::Length, LENGTH_SIZE, n)?;

    let length_crc = self.read_crc(reader, FrameField::LengthCrc)?;
    self.check(FrameField::Length, length_crc, &length_bytes)?;

    let length = u64::from_le_bytes(length_bytes);
    let length = usize::try_from(length).map_err(|_| Error::TruncatedRecord {
      field: FrameField::Payload,
      expected: usize::MAX,
      actual: 0,
    })?;
    let n = self.read_payload(reader, length)?;
    expect_full(FrameField::Payload, length, n)?;

    let payload_crc = self.read_crc(reader, FrameField::PayloadCrc)?;
    self.check(FrameField::Payload, payload_crc, &self.scratch[..length])?;

    Ok(Some(&self.scratch[..length]))
  }

  fn read_crc<R: Read + ?Sized>(&self, reader: &mut R, field: FrameField) -> Result<u32> {
    let mut crc_bytes = [0u8; CRC_SIZE];
    let n = read_fully(reader, &mut crc_bytes)?;
    expect_full(field, CRC_SIZE, n)?;
    Ok(u32::from_le_bytes(crc_bytes))
  }

  fn check(&self, field: FrameField, stored: u32, data: &[u8]) -> Result<()> {
    if self.policy == ChecksumPolicy::Skip {
      return Ok(());
    }
    let computed = masked_crc(data);
    if computed != stored {
      return Err(Error::ChecksumMismatch {
        field,
        expected: stored,
        actual: computed,
      });
    }
    Ok(())
  }

  /// Reads up to `length` payload bytes into the scratch buffer and returns how
  /// many arrived. The buffer only grows once the bytes already read fill it,
  /// so a corrupt length cannot allocate more than one step past the data.
  fn read_payload<R: Read + ?Sized>(&mut self, reader: &mut R, length: usize) -> Result<usize> {
    let mut filled = 0;
    while filled < length {
      if filled == self.scratch.len() {
        self.grow_towards(length)?;
      }
      let end = length.min(self.scratch.len());
      let n = read_fully(reader, &mut self.scratch[filled..end])?;
      filled += n;
      if filled < end {
        break;
      }
    }
    Ok(filled)
  }

  fn grow_towards(&mut self, length: usize) -> Result<()> {
    let current = self.scratch.len();
    let target = current.saturating_add(current / 2).max(length);
    let grown = target.min(current.saturating_add(MAX_GROWTH_STEP));
    self
      .scratch
      .try_reserve_exact(grown - current)
      .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::OutOfMemory, e)))?;
    self.scratch.resize(grown, 0);
    Ok(())
  }
}
