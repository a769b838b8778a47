use lazy_static::lazy_static;
use std::path::PathBuf;

lazy_static! {
  pub static ref DEFAULT_DIR_PATH: PathBuf = std::env::temp_dir().join("spark-kv");
}

/// Soft maximum size of a data file in bytes. A write that would cross the
/// threshold rotates to a fresh active file first; the line itself is never
/// split, so a file may exceed this by at most one line.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024;

/// Number of buffered puts that forces a sync before the next one is staged.
pub const DEFAULT_MAX_PENDING_WRITES: usize = 100;

#[derive(Debug, Clone)]
pub struct Options {
  pub dir_path: PathBuf,

  pub access_mode: AccessMode,

  pub sync_option: SyncOption,

  pub max_file_size: u64,

  pub max_pending_writes: usize,

  pub index_type: IndexType,

  pub mmap_at_startup: bool,
}

/// Write permission of the opening process. Only one `ReadWrite` process may
/// hold a datastore at a time; any number of `ReadOnly` processes may.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
  ReadOnly,

  ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOption {
  /// Writes become durable when the user calls sync.
  OnDemand,

  /// Every put is flushed and fsynced before it returns.
  OnPut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexType {
  BTree,

  SkipList,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      dir_path: DEFAULT_DIR_PATH.clone(),
      access_mode: AccessMode::ReadOnly,
      sync_option: SyncOption::OnDemand,
      max_file_size: DEFAULT_MAX_FILE_SIZE,
      max_pending_writes: DEFAULT_MAX_PENDING_WRITES,
      index_type: IndexType::BTree,
      mmap_at_startup: true,
    }
  }
}

impl Options {
  /// Read-write options rooted at `dir_path`, everything else default.
  pub fn read_write<P>(dir_path: P) -> Self
  where
    P: Into<PathBuf>,
  {
    Self {
      dir_path: dir_path.into(),
      access_mode: AccessMode::ReadWrite,
      ..Default::default()
    }
  }

  /// Read-only options rooted at `dir_path`, everything else default.
  pub fn read_only<P>(dir_path: P) -> Self
  where
    P: Into<PathBuf>,
  {
    Self {
      dir_path: dir_path.into(),
      ..Default::default()
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IOManagerType {
  StandardFileIO,

  MemoryMap,
}
