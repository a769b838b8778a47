use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use parking_lot::RwLock;

use crate::{
  errors::{Errors, Result},
  fio::{file_io::FileIO, new_io_manager, IOManager},
  option::IOManagerType,
};

use super::record::{
  self, Record, RecordPos, HINT_HEADER_SIZE, RECORD_HEADER_SIZE,
};

/// Hint files carry this prefix followed by the name of the data file they
/// describe.
pub const HINT_FILE_PREFIX: &str = "hintfile";

/// Data files are named by their decimal file id.
pub fn data_file_path<P>(dir: P, file_id: u64) -> PathBuf
where
  P: AsRef<Path>,
{
  dir.as_ref().join(file_id.to_string())
}

pub fn hint_file_path<P>(dir: P, file_id: u64) -> PathBuf
where
  P: AsRef<Path>,
{
  dir.as_ref().join(format!("{HINT_FILE_PREFIX}{file_id}"))
}

/// One record read from disk together with the bytes it occupies on disk,
/// trailing newline included.
pub struct ReadRecord {
  pub record: Record,
  pub size: u64,
}

/// Handle on one data (or hint) file. The writer owns at most one mutable
/// instance at a time, the active file; every other file is immutable and
/// only ever read.
pub struct DataFile {
  file_id: u64,
  path: PathBuf,
  write_off: Arc<RwLock<u64>>,
  io: Box<dyn IOManager>,
}

impl DataFile {
  /// Opens (creating if absent) the data file `file_id` under `dir`.
  pub fn new<P>(dir: P, file_id: u64, io_type: IOManagerType) -> Result<DataFile>
  where
    P: AsRef<Path>,
  {
    let path = data_file_path(dir, file_id);
    let io = new_io_manager(&path, io_type)?;
    let write_off = io.size();
    Ok(DataFile {
      file_id,
      path,
      write_off: Arc::new(RwLock::new(write_off)),
      io,
    })
  }

  /// Opens (creating if absent) the hint file companion of data file
  /// `file_id`.
  pub fn hint<P>(dir: P, file_id: u64, io_type: IOManagerType) -> Result<DataFile>
  where
    P: AsRef<Path>,
  {
    let path = hint_file_path(dir, file_id);
    let io = new_io_manager(&path, io_type)?;
    let write_off = io.size();
    Ok(DataFile {
      file_id,
      path,
      write_off: Arc::new(RwLock::new(write_off)),
      io,
    })
  }

  pub fn file_id(&self) -> u64 {
    self.file_id
  }

  /// Bytes appended so far; the position the next line will start at.
  pub fn write_off(&self) -> u64 {
    *self.write_off.read()
  }

  pub fn write(&self, buf: &[u8]) -> Result<usize> {
    let n = self.io.write(buf)?;
    *self.write_off.write() += n as u64;
    Ok(n)
  }

  pub fn sync(&self) -> Result<()> {
    self.io.sync()
  }

  /// Reads the record whose line starts at `offset`.
  ///
  /// Returns [`Errors::ReadDataFileEof`] once `offset` is past the last
  /// line, which is how scan loops terminate. A line that is present but
  /// shorter than its header claims is a corrupt record.
  pub fn read_record(&self, offset: u64) -> Result<ReadRecord> {
    let mut header = [0u8; RECORD_HEADER_SIZE];
    let n = self.io.read(&mut header, offset)?;
    if n == 0 {
      return Err(Errors::ReadDataFileEof);
    }
    if n < RECORD_HEADER_SIZE {
      return Err(self.corrupt(offset));
    }

    let (tstamp, key_size, value_size) =
      record::decode_record_header(&header).ok_or_else(|| self.corrupt(offset))?;

    let body_len = (key_size + value_size + 1) as usize;
    let mut body = vec![0u8; body_len];
    let n = match self.io.read(&mut body, offset + RECORD_HEADER_SIZE as u64) {
      Ok(n) => n,
      Err(Errors::ReadDataFileEof) => return Err(self.corrupt(offset)),
      Err(e) => return Err(e),
    };
    if n < body_len || body[body_len - 1] != b'\n' {
      return Err(self.corrupt(offset));
    }

    body.truncate(body_len - 1);
    let value = body.split_off(key_size as usize);
    Ok(ReadRecord {
      record: Record {
        key: body,
        value,
        tstamp,
      },
      size: (RECORD_HEADER_SIZE + body_len) as u64,
    })
  }

  /// Reads the hint line starting at `offset`, attributing the entry to
  /// data file `data_file_id`. Returns the key, its locator, and the bytes
  /// the line occupies, trailing newline included.
  pub fn read_hint(&self, offset: u64, data_file_id: u64) -> Result<(Vec<u8>, RecordPos, u64)> {
    let mut header = [0u8; HINT_HEADER_SIZE];
    let n = self.io.read(&mut header, offset)?;
    if n == 0 {
      return Err(Errors::ReadDataFileEof);
    }
    if n < HINT_HEADER_SIZE {
      return Err(self.corrupt(offset));
    }

    let (tstamp, key_size, value_size, value_pos) =
      record::decode_hint_header(&header).ok_or_else(|| self.corrupt(offset))?;

    let mut key = vec![0u8; key_size as usize + 1];
    let n = match self.io.read(&mut key, offset + HINT_HEADER_SIZE as u64) {
      Ok(n) => n,
      Err(Errors::ReadDataFileEof) => return Err(self.corrupt(offset)),
      Err(e) => return Err(e),
    };
    if n < key.len() || key[key_size as usize] != b'\n' {
      return Err(self.corrupt(offset));
    }
    key.truncate(key_size as usize);

    let pos = RecordPos {
      file_id: data_file_id,
      value_size,
      value_pos,
      tstamp,
      pending: false,
    };
    Ok((key, pos, (HINT_HEADER_SIZE as u64) + key_size + 1))
  }

  fn corrupt(&self, offset: u64) -> Errors {
    Errors::CorruptRecord {
      file: self.path.display().to_string(),
      offset,
    }
  }
}

/// Positional value read: open the named data file read-only, read `len`
/// bytes at `offset`, close.
pub fn read_value_at<P>(dir: P, file_id: u64, offset: u64, len: usize) -> Result<Vec<u8>>
where
  P: AsRef<Path>,
{
  let path = data_file_path(dir, file_id);
  let fio = FileIO::open(&path)?;
  let mut buf = vec![0u8; len];
  let n = fio.read(&mut buf, offset)?;
  if n < len {
    return Err(Errors::CorruptRecord {
      file: path.display().to_string(),
      offset,
    });
  }
  Ok(buf)
}
