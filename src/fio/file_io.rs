use std::{
  fs::{File, OpenOptions},
  io::Write,
  os::unix::fs::{FileExt, OpenOptionsExt},
  path::Path,
  sync::Arc,
};

use log::error;
use parking_lot::RwLock;

use crate::errors::{Errors, Result};

use super::IOManager;

/// Standard file I/O backed by positional reads and appending writes.
pub struct FileIO {
  fd: Arc<RwLock<File>>,
  path: String,
}

impl FileIO {
  /// Opens `file_name` for appending, creating it with mode 0666 if absent.
  pub fn new<P>(file_name: P) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let path = file_name.as_ref().display().to_string();
    match OpenOptions::new()
      .create(true)
      .read(true)
      .append(true)
      .mode(0o666)
      .open(file_name)
    {
      Ok(file) => Ok(FileIO {
        fd: Arc::new(RwLock::new(file)),
        path,
      }),
      Err(e) => {
        error!("failed to open data file {path}: {e}");
        Err(Errors::io(path, e))
      }
    }
  }

  /// Opens an existing `file_name` read-only.
  pub fn open<P>(file_name: P) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let path = file_name.as_ref().display().to_string();
    match OpenOptions::new().read(true).open(file_name) {
      Ok(file) => Ok(FileIO {
        fd: Arc::new(RwLock::new(file)),
        path,
      }),
      Err(e) => Err(Errors::io(path, e)),
    }
  }
}

impl IOManager for FileIO {
  fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
    let fd = self.fd.read();
    let mut total = 0;
    while total < buf.len() {
      let n = fd
        .read_at(&mut buf[total..], offset + total as u64)
        .map_err(|e| Errors::io(self.path.clone(), e))?;
      if n == 0 {
        break;
      }
      total += n;
    }
    Ok(total)
  }

  fn write(&self, buf: &[u8]) -> Result<usize> {
    let mut fd = self.fd.write();
    fd.write_all(buf)
      .map_err(|e| Errors::io(self.path.clone(), e))?;
    Ok(buf.len())
  }

  fn sync(&self) -> Result<()> {
    let fd = self.fd.read();
    fd.sync_all()
      .map_err(|e| Errors::io(self.path.clone(), e))
  }

  fn size(&self) -> u64 {
    let fd = self.fd.read();
    fd.metadata().map(|m| m.len()).unwrap_or(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use tempfile::tempdir;

  #[test]
  fn test_file_io_write_and_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("io-test.data");

    let fio = FileIO::new(&path).unwrap();
    assert_eq!(fio.size(), 0);

    assert_eq!(fio.write(b"hello world").unwrap(), 11);
    assert_eq!(fio.write(b"good morning").unwrap(), 12);
    assert_eq!(fio.size(), 23);
  }

  #[test]
  fn test_file_io_read_at() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("io-test.data");

    let fio = FileIO::new(&path).unwrap();
    fio.write(b"hello world").unwrap();

    let mut buf = [0u8; 5];
    assert_eq!(fio.read(&mut buf, 6).unwrap(), 5);
    assert_eq!(&buf, b"world");

    // reads past the end return what is available
    let mut buf = [0u8; 16];
    assert_eq!(fio.read(&mut buf, 6).unwrap(), 5);
    assert_eq!(fio.read(&mut buf, 100).unwrap(), 0);
  }

  #[test]
  fn test_file_io_sync() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("io-test.data");

    let fio = FileIO::new(&path).unwrap();
    fio.write(b"hello world").unwrap();
    assert!(fio.sync().is_ok());
  }

  #[test]
  fn test_file_io_open_missing() {
    let dir = tempdir().unwrap();
    let res = FileIO::open(dir.path().join("nope.data"));
    assert!(res.is_err());
  }
}
