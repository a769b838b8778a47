//! Inter-process coordination through the filesystem.
//!
//! Presence of a `.writelock*` or `.readlock*` marker file signals intent;
//! nothing is enforced by the OS. A reader additionally publishes its keydir
//! as a `keydir<micros>` snapshot file so that later readers can skip the
//! full directory scan.

use std::{
  fs::{self, File, OpenOptions},
  io::{BufWriter, Write},
  os::unix::fs::OpenOptionsExt,
  path::{Path, PathBuf},
};

use log::warn;

use crate::{
  data::record,
  errors::{Errors, Result},
  index::Indexer,
  option::AccessMode,
};

pub const READ_LOCK_PREFIX: &str = ".readlock";
pub const WRITE_LOCK_PREFIX: &str = ".writelock";
pub const KEYDIR_FILE_PREFIX: &str = "keydir";

/// What kind of process, if any, already holds the datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
  NoProcess,
  Reader,
  Writer,
}

/// Scans the directory for lock markers. A writer marker wins over any
/// number of reader markers.
pub fn lock_state<P>(dir: P) -> Result<ProcessKind>
where
  P: AsRef<Path>,
{
  let entries = fs::read_dir(&dir)
    .map_err(|e| Errors::io(dir.as_ref().display().to_string(), e))?;

  let mut state = ProcessKind::NoProcess;
  for entry in entries.flatten() {
    let name = entry.file_name();
    let Some(name) = name.to_str() else { continue };
    if name.starts_with(WRITE_LOCK_PREFIX) {
      return Ok(ProcessKind::Writer);
    }
    if name.starts_with(READ_LOCK_PREFIX) {
      state = ProcessKind::Reader;
    }
  }
  Ok(state)
}

/// An acquired lock marker. The microsecond suffix keeps concurrent
/// readers from colliding on a name.
pub struct LockMarker {
  path: PathBuf,
}

impl LockMarker {
  pub fn acquire<P>(dir: P, mode: AccessMode, stamp: u64) -> Result<LockMarker>
  where
    P: AsRef<Path>,
  {
    let prefix = match mode {
      AccessMode::ReadOnly => READ_LOCK_PREFIX,
      AccessMode::ReadWrite => WRITE_LOCK_PREFIX,
    };
    let path = dir.as_ref().join(format!("{prefix}{stamp}"));
    OpenOptions::new()
      .create(true)
      .write(true)
      .mode(0o666)
      .open(&path)
      .map_err(|e| Errors::io(path.display().to_string(), e))?;
    Ok(LockMarker { path })
  }

  pub fn release(&self) -> Result<()> {
    fs::remove_file(&self.path)
      .map_err(|e| Errors::io(self.path.display().to_string(), e))
  }
}

/// First `keydir*` file in the directory, if any.
pub fn find_keydir_file<P>(dir: P) -> Result<Option<String>>
where
  P: AsRef<Path>,
{
  let entries = fs::read_dir(&dir)
    .map_err(|e| Errors::io(dir.as_ref().display().to_string(), e))?;

  for entry in entries.flatten() {
    let name = entry.file_name();
    let Some(name) = name.to_str() else { continue };
    if name.starts_with(KEYDIR_FILE_PREFIX) {
      return Ok(Some(name.to_string()));
    }
  }
  Ok(None)
}

/// Writes the keydir as `keydir<stamp>` for the benefit of later readers.
/// Returns the file name so close can delete it again.
pub fn publish_keydir_snapshot<P>(dir: P, index: &dyn Indexer, stamp: u64) -> Result<String>
where
  P: AsRef<Path>,
{
  let name = format!("{KEYDIR_FILE_PREFIX}{stamp}");
  let path = dir.as_ref().join(&name);
  let file = File::create(&path).map_err(|e| Errors::io(path.display().to_string(), e))?;

  let mut out = BufWriter::new(file);
  for (key, pos) in index.entries() {
    if pos.pending {
      continue;
    }
    let mut line = record::encode_keydir_line(&key, &pos);
    line.push(b'\n');
    out
      .write_all(&line)
      .map_err(|e| Errors::io(path.display().to_string(), e))?;
  }
  out
    .flush()
    .map_err(|e| Errors::io(path.display().to_string(), e))?;
  Ok(name)
}

/// Loads a keydir snapshot file into `index`. Malformed lines end the load;
/// the snapshot is advisory and the entries read so far are kept.
pub fn load_keydir_snapshot<P>(dir: P, name: &str, index: &dyn Indexer) -> Result<()>
where
  P: AsRef<Path>,
{
  let path = dir.as_ref().join(name);
  let data = fs::read(&path).map_err(|e| Errors::io(path.display().to_string(), e))?;

  let mut offset = 0usize;
  while offset < data.len() {
    let Some((key, pos, consumed)) = record::decode_keydir_line(&data[offset..]) else {
      warn!(
        "{}: corrupt keydir line at offset {offset}, stopping snapshot load",
        path.display()
      );
      break;
    };
    if data.get(offset + consumed) != Some(&b'\n') {
      warn!(
        "{}: corrupt keydir line at offset {offset}, stopping snapshot load",
        path.display()
      );
      break;
    }
    index.put(key, pos);
    offset += consumed + 1;
  }
  Ok(())
}
