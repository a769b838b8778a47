//! Fixed-width line codec shared by data files, hint files, and keydir
//! snapshot files.
//!
//! Every numeric field is a 19-character zero-padded ASCII decimal, so a
//! record header is always `3 * 19 = 57` bytes and can be sliced without
//! scanning. Lines are terminated by a single `\n` on disk; the encoders
//! here produce the line body only.

/// Width of one zero-padded numeric field.
pub const NUMBER_FIELD_SIZE: usize = 19;

/// Numeric fields in a record header (tstamp, key size, value size).
pub const STATIC_FIELDS: usize = 3;

/// Byte length of a record-line header.
pub const RECORD_HEADER_SIZE: usize = STATIC_FIELDS * NUMBER_FIELD_SIZE;

/// Byte length of a hint-line header (record header plus value position).
pub const HINT_HEADER_SIZE: usize = 4 * NUMBER_FIELD_SIZE;

/// Byte length of a keydir-snapshot-line header.
pub const KEYDIR_HEADER_SIZE: usize = 5 * NUMBER_FIELD_SIZE;

/// Locator of the most recent value of one key.
///
/// While `pending` is set the value still lives in the pending-write buffer
/// and `file_id`/`value_pos` are meaningless (kept at 0); otherwise the byte
/// range `[value_pos, value_pos + value_size)` of data file `file_id` holds
/// the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPos {
  pub file_id: u64,
  pub value_size: u64,
  pub value_pos: u64,
  pub tstamp: u64,
  pub pending: bool,
}

/// A decoded data-file line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
  pub key: Vec<u8>,
  pub value: Vec<u8>,
  pub tstamp: u64,
}

fn pad19(buf: &mut Vec<u8>, value: u64) {
  buf.extend_from_slice(format!("{:019}", value).as_bytes());
}

/// Parses one 19-digit field at `at`. Returns `None` on a short slice or any
/// non-digit byte; 19 digits always fit in a u64.
fn parse_field(line: &[u8], at: usize) -> Option<u64> {
  let field = line.get(at..at + NUMBER_FIELD_SIZE)?;
  if !field.iter().all(u8::is_ascii_digit) {
    return None;
  }
  field
    .iter()
    .try_fold(0u64, |acc, b| Some(acc * 10 + u64::from(b - b'0')))
}

/// `pad19(tstamp) ‖ pad19(key len) ‖ pad19(value len) ‖ key ‖ value`
pub fn encode_record(key: &[u8], value: &[u8], tstamp: u64) -> Vec<u8> {
  let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + key.len() + value.len());
  pad19(&mut buf, tstamp);
  pad19(&mut buf, key.len() as u64);
  pad19(&mut buf, value.len() as u64);
  buf.extend_from_slice(key);
  buf.extend_from_slice(value);
  buf
}

/// Header of a record line: `(tstamp, key size, value size)`.
pub fn decode_record_header(header: &[u8]) -> Option<(u64, u64, u64)> {
  let tstamp = parse_field(header, 0)?;
  let key_size = parse_field(header, NUMBER_FIELD_SIZE)?;
  let value_size = parse_field(header, 2 * NUMBER_FIELD_SIZE)?;
  Some((tstamp, key_size, value_size))
}

/// Decodes a full record line. `None` when the header is malformed or the
/// body is shorter than the header claims.
pub fn decode_record(line: &[u8]) -> Option<Record> {
  let (tstamp, key_size, value_size) = decode_record_header(line.get(..RECORD_HEADER_SIZE)?)?;
  let key_end = RECORD_HEADER_SIZE + key_size as usize;
  let value_end = key_end + value_size as usize;
  let key = line.get(RECORD_HEADER_SIZE..key_end)?.to_vec();
  let value = line.get(key_end..value_end)?.to_vec();
  Some(Record { key, value, tstamp })
}

/// `pad19(tstamp) ‖ pad19(key len) ‖ pad19(value size) ‖ pad19(value pos) ‖ key`
pub fn encode_hint(key: &[u8], pos: &RecordPos) -> Vec<u8> {
  let mut buf = Vec::with_capacity(HINT_HEADER_SIZE + key.len());
  pad19(&mut buf, pos.tstamp);
  pad19(&mut buf, key.len() as u64);
  pad19(&mut buf, pos.value_size);
  pad19(&mut buf, pos.value_pos);
  buf.extend_from_slice(key);
  buf
}

/// Header of a hint line: `(tstamp, key size, value size, value pos)`.
pub fn decode_hint_header(header: &[u8]) -> Option<(u64, u64, u64, u64)> {
  let tstamp = parse_field(header, 0)?;
  let key_size = parse_field(header, NUMBER_FIELD_SIZE)?;
  let value_size = parse_field(header, 2 * NUMBER_FIELD_SIZE)?;
  let value_pos = parse_field(header, 3 * NUMBER_FIELD_SIZE)?;
  Some((tstamp, key_size, value_size, value_pos))
}

/// Decodes a hint line, attributing the entry to data file `file_id`.
/// Returns the key, its locator, and the bytes consumed (header + key).
pub fn decode_hint(line: &[u8], file_id: u64) -> Option<(Vec<u8>, RecordPos, usize)> {
  let (tstamp, key_size, value_size, value_pos) = decode_hint_header(line)?;
  let key_end = HINT_HEADER_SIZE + key_size as usize;
  let key = line.get(HINT_HEADER_SIZE..key_end)?.to_vec();
  let pos = RecordPos {
    file_id,
    value_size,
    value_pos,
    tstamp,
    pending: false,
  };
  Some((key, pos, key_end))
}

/// `pad19(file id) ‖ pad19(value size) ‖ pad19(value pos) ‖ pad19(tstamp) ‖ pad19(key len) ‖ key`
pub fn encode_keydir_line(key: &[u8], pos: &RecordPos) -> Vec<u8> {
  let mut buf = Vec::with_capacity(KEYDIR_HEADER_SIZE + key.len());
  pad19(&mut buf, pos.file_id);
  pad19(&mut buf, pos.value_size);
  pad19(&mut buf, pos.value_pos);
  pad19(&mut buf, pos.tstamp);
  pad19(&mut buf, key.len() as u64);
  buf.extend_from_slice(key);
  buf
}

/// Decodes a keydir snapshot line. Returns the key, its locator, and the
/// bytes consumed (header + key).
pub fn decode_keydir_line(line: &[u8]) -> Option<(Vec<u8>, RecordPos, usize)> {
  let file_id = parse_field(line, 0)?;
  let value_size = parse_field(line, NUMBER_FIELD_SIZE)?;
  let value_pos = parse_field(line, 2 * NUMBER_FIELD_SIZE)?;
  let tstamp = parse_field(line, 3 * NUMBER_FIELD_SIZE)?;
  let key_size = parse_field(line, 4 * NUMBER_FIELD_SIZE)?;
  let key_end = KEYDIR_HEADER_SIZE + key_size as usize;
  let key = line.get(KEYDIR_HEADER_SIZE..key_end)?.to_vec();
  let pos = RecordPos {
    file_id,
    value_size,
    value_pos,
    tstamp,
    pending: false,
  };
  Some((key, pos, key_end))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_encode_record_layout() {
    let line = encode_record(b"key12", b"value12345", 1);
    assert_eq!(line.len(), RECORD_HEADER_SIZE + 5 + 10);
    assert_eq!(&line[..19], b"0000000000000000001");
    assert_eq!(&line[19..38], b"0000000000000000005");
    assert_eq!(&line[38..57], b"0000000000000000010");
    assert_eq!(&line[57..62], b"key12");
    assert_eq!(&line[62..], b"value12345");
  }

  #[test]
  fn test_record_round_trip() {
    let key = b"some key".to_vec();
    let value = b"some longer value bytes".to_vec();
    let tstamp = 1_700_000_000_000_123;

    let line = encode_record(&key, &value, tstamp);
    let record = decode_record(&line).unwrap();

    assert_eq!(record.key, key);
    assert_eq!(record.value, value);
    assert_eq!(record.tstamp, tstamp);
    assert_eq!(record.key.len(), key.len());
    assert_eq!(record.value.len(), value.len());
  }

  #[test]
  fn test_record_round_trip_binary() {
    // Keys and values may carry newlines; lengths come from the header.
    let key = vec![0u8, b'\n', 255, 7];
    let value = vec![b'\n'; 32];

    let record = decode_record(&encode_record(&key, &value, 42)).unwrap();
    assert_eq!(record.key, key);
    assert_eq!(record.value, value);
  }

  #[test]
  fn test_record_round_trip_empty() {
    let record = decode_record(&encode_record(b"k", b"", 0)).unwrap();
    assert_eq!(record.key, b"k");
    assert!(record.value.is_empty());
  }

  #[test]
  fn test_decode_record_malformed() {
    // too short for a header
    assert!(decode_record(b"0000000001").is_none());

    // non-decimal header field
    let mut line = encode_record(b"key", b"value", 9);
    line[5] = b'x';
    assert!(decode_record(&line).is_none());

    // a '+' is not a digit even though str::parse would take it
    let mut line = encode_record(b"key", b"value", 9);
    line[0] = b'+';
    assert!(decode_record(&line).is_none());

    // body shorter than the declared lengths
    let line = encode_record(b"key", b"value", 9);
    assert!(decode_record(&line[..line.len() - 1]).is_none());
  }

  #[test]
  fn test_hint_round_trip() {
    let pos = RecordPos {
      file_id: 1_700_000_000_000_000,
      value_size: 10,
      value_pos: 62,
      tstamp: 1_700_000_000_000_999,
      pending: false,
    };

    let line = encode_hint(b"key12", &pos);
    assert_eq!(line.len(), HINT_HEADER_SIZE + 5);

    let (key, decoded, consumed) = decode_hint(&line, pos.file_id).unwrap();
    assert_eq!(key, b"key12");
    assert_eq!(decoded, pos);
    assert_eq!(consumed, line.len());
  }

  #[test]
  fn test_keydir_line_round_trip() {
    let pos = RecordPos {
      file_id: 863_956_270,
      value_size: 12,
      value_pos: 55,
      tstamp: 10,
      pending: false,
    };

    let line = encode_keydir_line(b"key12", &pos);
    assert_eq!(line.len(), KEYDIR_HEADER_SIZE + 5);

    let (key, decoded, consumed) = decode_keydir_line(&line).unwrap();
    assert_eq!(key, b"key12");
    assert_eq!(decoded, pos);
    assert_eq!(consumed, line.len());
  }

  #[test]
  fn test_max_field_value() {
    // largest value the 19-digit field can carry
    let tstamp = 9_999_999_999_999_999_999;
    let record = decode_record(&encode_record(b"k", b"v", tstamp)).unwrap();
    assert_eq!(record.tstamp, tstamp);
  }
}
