mod common;
use common::{TestEnv, records_of_sizes};
use std::fs::{self, OpenOptions};
use tfrecord_stream::{Error, FrameField, ReaderOptions, RecordReader, WriterOptions};

#[test]
fn test_cut_in_last_payload() {
  let env = TestEnv::new();
  let records = records_of_sizes(&[10, 20, 30]);
  let path = env.write_records("cut.tfrecord", &records, &WriterOptions::default());

  // Chop 10 bytes: the final 4-byte checksum and 6 payload bytes of record 2.
  let file = OpenOptions::new().write(true).open(&path).unwrap();
  let len = file.metadata().unwrap().len();
  file.set_len(len - 10).unwrap();
  drop(file);

  let mut reader = RecordReader::open(&path, None, None, &ReaderOptions::default()).unwrap();
  assert_eq!(reader.next().unwrap().unwrap(), records[0]);
  assert_eq!(reader.next().unwrap().unwrap(), records[1]);

  match reader.next() {
    Some(Err(Error::TruncatedRecord {
      field,
      expected,
      actual,
    })) => {
      assert_eq!(field, FrameField::Payload);
      assert_eq!(expected, 30);
      assert_eq!(actual, 24);
    }
    other => panic!("Expected TruncatedRecord, got {:?}", other),
  }

  // The stream is dead after the first error and released its handle.
  assert!(reader.next().is_none());
  assert!(!reader.is_open());
}

#[test]
fn test_trailing_garbage_shorter_than_length_field() {
  let env = TestEnv::new();
  let records = records_of_sizes(&[4, 4]);
  let path = env.write_records("tail.tfrecord", &records, &WriterOptions::default());

  let mut bytes = fs::read(&path).unwrap();
  bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
  fs::write(&path, bytes).unwrap();

  let items: Vec<_> = RecordReader::open(&path, None, None, &ReaderOptions::default())
    .unwrap()
    .collect();
  assert_eq!(items.len(), 3);
  assert!(matches!(
    items[2],
    Err(Error::TruncatedRecord {
      field: FrameField::Length,
      expected: 8,
      actual: 3
    })
  ));
}

#[test]
fn test_corrupted_payload_accepted_by_default() {
  let env = TestEnv::new();
  let records = vec![b"alpha".to_vec(), b"bravo".to_vec()];
  let path = env.write_records("flip.tfrecord", &records, &WriterOptions::default());

  let mut bytes = fs::read(&path).unwrap();
  bytes[12] ^= 0x20; // 'a' -> 'A' in the first payload.
  fs::write(&path, bytes).unwrap();

  let read: Vec<Vec<u8>> = RecordReader::open(&path, None, None, &ReaderOptions::default())
    .unwrap()
    .map(|r| r.unwrap())
    .collect();
  assert_eq!(read, vec![b"Alpha".to_vec(), b"bravo".to_vec()]);
}

#[test]
fn test_corrupted_payload_rejected_when_verifying() {
  let env = TestEnv::new();
  let records = vec![b"alpha".to_vec(), b"bravo".to_vec()];
  let path = env.write_records("flip.tfrecord", &records, &WriterOptions::default());

  let mut bytes = fs::read(&path).unwrap();
  bytes[12] ^= 0x20;
  fs::write(&path, bytes).unwrap();

  let opts = ReaderOptions::default().verify_checksums();
  let mut reader = RecordReader::open(&path, None, None, &opts).unwrap();
  assert!(matches!(
    reader.next(),
    Some(Err(Error::ChecksumMismatch {
      field: FrameField::Payload,
      ..
    }))
  ));
  assert!(reader.next().is_none());
}

#[test]
fn test_corrupted_length_checksum_rejected_when_verifying() {
  let env = TestEnv::new();
  let path = env.write_records("lencrc.tfrecord", &[b"x".to_vec()], &WriterOptions::default());

  let mut bytes = fs::read(&path).unwrap();
  bytes[9] ^= 0x01;
  fs::write(&path, bytes).unwrap();

  let opts = ReaderOptions::default().verify_checksums();
  let mut reader = RecordReader::open(&path, None, None, &opts).unwrap();
  assert!(matches!(
    reader.next(),
    Some(Err(Error::ChecksumMismatch {
      field: FrameField::Length,
      ..
    }))
  ));
}

#[test]
fn test_clean_files_pass_verification() {
  let env = TestEnv::new();
  let records = records_of_sizes(&[3, 0, 10, 1, 3, 3, 1, 1]);
  let path = env.write_records("clean.tfrecord", &records, &WriterOptions::default());

  let opts = ReaderOptions::default().verify_checksums();
  let read: Vec<Vec<u8>> = RecordReader::open(&path, None, None, &opts)
    .unwrap()
    .map(|r| r.unwrap())
    .collect();
  assert_eq!(read, records);
}
