use std::{fs::OpenOptions, path::Path, sync::Arc};

use log::error;
use memmap2::Mmap;
use parking_lot::Mutex;

use crate::errors::{Errors, Result};

use super::IOManager;

/// Read-only memory-mapped I/O, used to scan immutable data files during
/// bootstrap. Writes always go through [`super::file_io::FileIO`].
pub struct MMapIO {
  map: Arc<Mutex<Mmap>>,
}

impl MMapIO {
  pub fn new<P>(file_name: P) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let path = file_name.as_ref().display().to_string();
    match OpenOptions::new()
      .create(true)
      .read(true)
      .append(true)
      .open(file_name)
    {
      Ok(file) => {
        let map = unsafe { Mmap::map(&file) }.map_err(|e| Errors::io(path, e))?;
        Ok(MMapIO {
          map: Arc::new(Mutex::new(map)),
        })
      }
      Err(e) => {
        error!("failed to open data file {path}: {e}");
        Err(Errors::io(path, e))
      }
    }
  }
}

impl IOManager for MMapIO {
  fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
    let map_arr = self.map.lock();
    let end = offset + buf.len() as u64;
    if end > map_arr.len() as u64 {
      return Err(Errors::ReadDataFileEof);
    }

    let val = &map_arr[offset as usize..end as usize];
    buf.copy_from_slice(val);
    Ok(val.len())
  }

  fn write(&self, _buf: &[u8]) -> Result<usize> {
    unimplemented!("mmap files are read-only")
  }

  fn sync(&self) -> Result<()> {
    unimplemented!("mmap files are read-only")
  }

  fn size(&self) -> u64 {
    let map_arr = self.map.lock();
    map_arr.len() as u64
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use tempfile::tempdir;

  use crate::fio::file_io::FileIO;

  #[test]
  fn test_mmap_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mmap-test.data");

    let fio = FileIO::new(&path).unwrap();
    fio.write(b"hello world").unwrap();
    fio.write(b"good morning").unwrap();
    fio.sync().unwrap();

    let mmap_io = MMapIO::new(&path).unwrap();
    let mut buf = [0u8; 11];
    assert_eq!(mmap_io.read(&mut buf, 0).unwrap(), 11);
    assert_eq!(&buf, b"hello world");

    // reads past the mapped range signal end-of-file
    let mut buf = [0u8; 32];
    assert!(matches!(
      mmap_io.read(&mut buf, 0),
      Err(Errors::ReadDataFileEof)
    ));
  }

  #[test]
  fn test_mmap_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mmap-test.data");

    let mmap_empty = MMapIO::new(&path).unwrap();
    assert_eq!(mmap_empty.size(), 0);

    let fio = FileIO::new(&path).unwrap();
    fio.write(b"hello world").unwrap();

    let mmap_io = MMapIO::new(&path).unwrap();
    assert_eq!(mmap_io.size(), 11);
  }
}
