use std::io;

use thiserror::Error;

/// Errors that can occur while a process is running on a datastore.
///
/// The display strings of the user-facing variants are part of the public
/// surface: clients match on them across process and language boundaries.
#[derive(Error, Debug)]
pub enum Errors {
  #[error("{0}: key does not exist")]
  KeyNotFound(String),

  #[error("write permission denied")]
  WriteDenied,

  #[error("read only cannot create new bitcask datastore")]
  ReadOnlyDatastore,

  #[error("another writer exists in this bitcask")]
  WriterExist,

  #[error("{0}: cannot open this directory")]
  CannotOpenDir(String),

  #[error("{context}: {source}")]
  Io {
    context: String,
    #[source]
    source: io::Error,
  },

  #[error("{file}: corrupt record at offset {offset}")]
  CorruptRecord { file: String, offset: u64 },

  /// Scan cursor ran past the last record of a file. Internal terminator,
  /// never surfaced to callers.
  #[error("read past end of data file")]
  ReadDataFileEof,
}

impl Errors {
  pub(crate) fn io<C>(context: C, source: io::Error) -> Self
  where
    C: Into<String>,
  {
    Errors::Io {
      context: context.into(),
      source,
    }
  }

  pub(crate) fn key_not_found(key: &[u8]) -> Self {
    Errors::KeyNotFound(String::from_utf8_lossy(key).into_owned())
  }
}

pub type Result<T> = std::result::Result<T, Errors>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_public_error_messages() {
    assert_eq!(
      Errors::key_not_found(b"key12").to_string(),
      "key12: key does not exist"
    );
    assert_eq!(Errors::WriteDenied.to_string(), "write permission denied");
    assert_eq!(
      Errors::ReadOnlyDatastore.to_string(),
      "read only cannot create new bitcask datastore"
    );
    assert_eq!(
      Errors::WriterExist.to_string(),
      "another writer exists in this bitcask"
    );
    assert_eq!(
      Errors::CannotOpenDir("no open dir".to_string()).to_string(),
      "no open dir: cannot open this directory"
    );
  }

  #[test]
  fn test_io_error_keeps_context() {
    let err = Errors::io(
      "/tmp/spark-kv/0001",
      io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
    );
    assert_eq!(err.to_string(), "/tmp/spark-kv/0001: denied");
  }
}
