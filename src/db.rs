use std::{
  collections::HashSet,
  fs,
  io,
  os::unix::fs::DirBuilderExt,
  sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use bytes::Bytes;
use log::{error, warn};
use parking_lot::{Mutex, RwLock};

use crate::{
  data::{
    data_file::{self, DataFile, HINT_FILE_PREFIX},
    record::{self, RecordPos, RECORD_HEADER_SIZE},
  },
  errors::{Errors, Result},
  index::{new_indexer, Indexer},
  lock::{self, LockMarker, ProcessKind},
  option::{AccessMode, IOManagerType, Options, SyncOption},
  pending::PendingWrites,
  util,
};

/// A handle on one Bitcask-model datastore directory.
///
/// A `ReadWrite` handle owns the single active data file and is the only
/// process allowed to mutate the directory; any number of `ReadOnly` handles
/// may coexist with it, each working from the keydir snapshot it built at
/// open. [`Engine::close`] consumes the handle; dropping it without closing
/// runs the same shutdown.
pub struct Engine {
  pub(crate) options: Options,
  pub(crate) index: Box<dyn Indexer>,
  pub(crate) active_file: RwLock<Option<DataFile>>,
  pub(crate) pending: PendingWrites,
  lock_marker: Mutex<Option<LockMarker>>,
  keydir_file: Mutex<Option<String>>,
  last_file_id: AtomicU64,
  closed: AtomicBool,
}

impl std::fmt::Debug for Engine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Engine").finish_non_exhaustive()
  }
}

impl Engine {
  /// Opens the datastore at `options.dir_path`.
  ///
  /// An existing directory is rejected while another writer holds it. A
  /// missing directory is created only for `ReadWrite` handles; a read-only
  /// open of a missing directory is a configuration error.
  pub fn open(options: Options) -> Result<Engine> {
    match fs::read_dir(&options.dir_path) {
      Ok(_) => Self::open_existing(options),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Self::create_datastore(options),
      Err(_) => Err(Errors::CannotOpenDir(
        options.dir_path.display().to_string(),
      )),
    }
  }

  fn open_existing(options: Options) -> Result<Engine> {
    let state = lock::lock_state(&options.dir_path)?;
    if state == ProcessKind::Writer {
      return Err(Errors::WriterExist);
    }

    let engine = Self::base(options);
    let dir = engine.options.dir_path.clone();

    let snapshot_mode =
      engine.options.access_mode == AccessMode::ReadOnly && state == ProcessKind::Reader;
    if !snapshot_mode || !engine.load_index_from_keydir_file()? {
      let max_id = engine.load_index_from_data_files()?;
      engine.last_file_id.store(max_id, Ordering::SeqCst);
    }

    if engine.options.access_mode == AccessMode::ReadOnly {
      let name =
        lock::publish_keydir_snapshot(&dir, engine.index.as_ref(), util::time::now_micros())?;
      *engine.keydir_file.lock() = Some(name);
    }

    let marker = LockMarker::acquire(&dir, engine.options.access_mode, util::time::now_micros())?;
    *engine.lock_marker.lock() = Some(marker);

    if engine.options.access_mode == AccessMode::ReadWrite {
      engine.create_active_file()?;
    }
    Ok(engine)
  }

  fn create_datastore(options: Options) -> Result<Engine> {
    if options.access_mode == AccessMode::ReadOnly {
      return Err(Errors::ReadOnlyDatastore);
    }

    fs::DirBuilder::new()
      .recursive(true)
      .mode(0o777)
      .create(&options.dir_path)
      .map_err(|e| Errors::io(options.dir_path.display().to_string(), e))?;

    let engine = Self::base(options);
    let dir = engine.options.dir_path.clone();

    let marker = LockMarker::acquire(&dir, AccessMode::ReadWrite, util::time::now_micros())?;
    *engine.lock_marker.lock() = Some(marker);

    engine.create_active_file()?;
    Ok(engine)
  }

  fn base(options: Options) -> Engine {
    let index = new_indexer(&options.index_type);
    Engine {
      options,
      index,
      active_file: RwLock::new(None),
      pending: PendingWrites::new(),
      lock_marker: Mutex::new(None),
      keydir_file: Mutex::new(None),
      last_file_id: AtomicU64::new(0),
      closed: AtomicBool::new(false),
    }
  }

  /// Retrieves the value stored under `key`.
  pub fn get(&self, key: Bytes) -> Result<Bytes> {
    let pos = self
      .index
      .get(&key)
      .ok_or_else(|| Errors::key_not_found(&key))?;
    self.read_value(&key, &pos)
  }

  /// Stores `value` under `key` in the pending-write buffer. The write
  /// becomes durable at the next sync, or immediately under
  /// [`SyncOption::OnPut`].
  pub fn put(&self, key: Bytes, value: Bytes) -> Result<()> {
    self.check_writable()?;

    if self.pending.len() >= self.options.max_pending_writes {
      self.sync()?;
    }

    let tstamp = util::time::now_micros();
    let line = record::encode_record(&key, &value, tstamp);
    self.index.put(
      key.to_vec(),
      RecordPos {
        file_id: 0,
        value_size: value.len() as u64,
        value_pos: 0,
        tstamp,
        pending: true,
      },
    );
    self.pending.insert(key.to_vec(), line);

    if self.options.sync_option == SyncOption::OnPut {
      self.sync()?;
    }
    Ok(())
  }

  /// Removes `key` from the datastore.
  ///
  /// No tombstone is written: the key disappears from the keydir and the
  /// pending buffer, and its on-disk records are reclaimed by the next
  /// merge. A crash before that merge resurrects the key at bootstrap.
  pub fn delete(&self, key: Bytes) -> Result<()> {
    self.check_writable()?;

    if self.index.get(&key).is_none() {
      return Err(Errors::key_not_found(&key));
    }

    self.index.delete(&key);
    self.pending.remove(&key);
    Ok(())
  }

  /// All live keys, in unspecified order.
  pub fn list_keys(&self) -> Result<Vec<Bytes>> {
    self.index.list_keys()
  }

  /// Folds `f` over every live key/value pair. Iteration order is
  /// unspecified; the store must not be mutated during the fold.
  pub fn fold<Acc, F>(&self, f: F, acc: Acc) -> Result<Acc>
  where
    F: Fn(&Bytes, Bytes, Acc) -> Acc,
  {
    let mut acc = acc;
    for key in self.index.list_keys()? {
      let value = self.get(key.clone())?;
      acc = f(&key, value, acc);
    }
    Ok(acc)
  }

  /// Flushes the pending-write buffer to the active file and fsyncs it.
  /// A no-op when nothing is buffered.
  pub fn sync(&self) -> Result<()> {
    self.check_writable()?;

    if self.pending.is_empty() {
      return Ok(());
    }
    self.flush_pending()?;

    let active = self.active_file.read();
    match active.as_ref() {
      Some(file) => file.sync(),
      None => Ok(()),
    }
  }

  /// Flushes all pending writes and releases the directory: a writer syncs
  /// and removes its write lock, a reader removes its keydir snapshot and
  /// read lock. Consumes the handle, so no further calls can race the
  /// teardown.
  pub fn close(self) -> Result<()> {
    self.shutdown()
  }

  fn shutdown(&self) -> Result<()> {
    if self.closed.swap(true, Ordering::SeqCst) {
      return Ok(());
    }

    let mut first_err = None;

    if self.options.access_mode == AccessMode::ReadWrite {
      if !self.pending.is_empty() {
        if let Err(e) = self.flush_pending() {
          first_err.get_or_insert(e);
        }
      }
      let mut active = self.active_file.write();
      if let Some(file) = active.take() {
        if let Err(e) = file.sync() {
          first_err.get_or_insert(e);
        }
      }
    } else if let Some(name) = self.keydir_file.lock().take() {
      let path = self.options.dir_path.join(&name);
      if let Err(e) = fs::remove_file(&path) {
        warn!("failed to remove keydir snapshot {}: {e}", path.display());
      }
    }

    if let Some(marker) = self.lock_marker.lock().take() {
      if let Err(e) = marker.release() {
        first_err.get_or_insert(e);
      }
    }

    match first_err {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  // ---- write path ------------------------------------------------------

  fn check_writable(&self) -> Result<()> {
    if self.options.access_mode == AccessMode::ReadOnly {
      return Err(Errors::WriteDenied);
    }
    Ok(())
  }

  fn create_active_file(&self) -> Result<()> {
    let file = DataFile::new(
      &self.options.dir_path,
      self.next_file_id(),
      IOManagerType::StandardFileIO,
    )?;
    *self.active_file.write() = Some(file);
    Ok(())
  }

  /// Appends one encoded record line (newline added here) to the active
  /// file, rotating beforehand when the line would cross the size
  /// threshold. Returns the file id written to and the line's start offset.
  pub(crate) fn append_line(&self, line: &[u8]) -> Result<(u64, u64)> {
    let mut guard = self.active_file.write();
    let active = guard.as_mut().ok_or(Errors::WriteDenied)?;

    if line.len() as u64 + 1 + active.write_off() > self.options.max_file_size {
      active.sync()?;
      *active = DataFile::new(
        &self.options.dir_path,
        self.next_file_id(),
        IOManagerType::StandardFileIO,
      )?;
    }

    let line_start = active.write_off();
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line);
    buf.push(b'\n');
    active.write(&buf)?;
    Ok((active.file_id(), line_start))
  }

  /// Drains the pending-write buffer into the active file. On an I/O error
  /// the failed entry stays buffered and pending so the caller may retry.
  pub(crate) fn flush_pending(&self) -> Result<()> {
    for key in self.pending.keys() {
      let Some(pos) = self.index.get(&key) else {
        self.pending.remove(&key);
        continue;
      };
      if !pos.pending {
        self.pending.remove(&key);
        continue;
      }
      let Some(line) = self.pending.get(&key) else {
        continue;
      };

      let (file_id, line_start) = self.append_line(&line)?;
      self.index.put(
        key.clone(),
        RecordPos {
          file_id,
          value_size: pos.value_size,
          value_pos: line_start + RECORD_HEADER_SIZE as u64 + key.len() as u64,
          tstamp: pos.tstamp,
          pending: false,
        },
      );
      self.pending.remove(&key);
    }
    Ok(())
  }

  /// File ids originate as microsecond timestamps but are forced strictly
  /// monotonic, so files created within the same microsecond get
  /// consecutive ids instead of colliding on a name.
  pub(crate) fn next_file_id(&self) -> u64 {
    let now = util::time::now_micros();
    let prev = self
      .last_file_id
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
      })
      .unwrap_or_else(|last| last);
    now.max(prev + 1)
  }

  // ---- read path -------------------------------------------------------

  pub(crate) fn read_value(&self, key: &[u8], pos: &RecordPos) -> Result<Bytes> {
    if pos.pending {
      let line = self
        .pending
        .get(key)
        .ok_or_else(|| Errors::key_not_found(key))?;
      let record = record::decode_record(&line).ok_or(Errors::CorruptRecord {
        file: "pending-write buffer".to_string(),
        offset: 0,
      })?;
      return Ok(Bytes::from(record.value));
    }

    let buf = data_file::read_value_at(
      &self.options.dir_path,
      pos.file_id,
      pos.value_pos,
      pos.value_size as usize,
    )?;
    Ok(Bytes::from(buf))
  }

  // ---- bootstrap -------------------------------------------------------

  /// Snapshot-mode bootstrap: load the keydir another reader published.
  /// Returns false when no snapshot file exists, in which case the caller
  /// falls back to the full directory scan.
  fn load_index_from_keydir_file(&self) -> Result<bool> {
    match lock::find_keydir_file(&self.options.dir_path)? {
      Some(name) => {
        lock::load_keydir_snapshot(&self.options.dir_path, &name, self.index.as_ref())?;
        Ok(true)
      }
      None => {
        warn!(
          "{}: reader lock present but no keydir snapshot, scanning data files",
          self.options.dir_path.display()
        );
        Ok(false)
      }
    }
  }

  /// Scan-mode bootstrap: rebuild the keydir from data files, preferring a
  /// hint file where one exists. Files are processed in ascending file-id
  /// order so records in newer files override older ones. Returns the
  /// highest file id seen.
  fn load_index_from_data_files(&self) -> Result<u64> {
    let dir = &self.options.dir_path;
    let entries =
      fs::read_dir(dir).map_err(|e| Errors::io(dir.display().to_string(), e))?;

    let mut hint_ids = HashSet::new();
    let mut data_ids = Vec::new();
    for entry in entries.flatten() {
      let name = entry.file_name();
      let Some(name) = name.to_str() else { continue };
      if let Some(suffix) = name.strip_prefix(HINT_FILE_PREFIX) {
        if let Some(id) = parse_file_id(suffix) {
          hint_ids.insert(id);
        }
      } else if let Some(id) = parse_file_id(name) {
        data_ids.push(id);
      }
    }

    data_ids.sort_unstable();
    let max_id = data_ids.last().copied().unwrap_or(0);
    for id in data_ids {
      if hint_ids.contains(&id) {
        self.load_index_from_hint_file(id)?;
      } else {
        self.load_index_from_data_file(id)?;
      }
    }
    Ok(max_id)
  }

  fn load_index_from_data_file(&self, file_id: u64) -> Result<()> {
    let data_file = DataFile::new(&self.options.dir_path, file_id, self.startup_io_type())?;

    let mut offset = 0u64;
    loop {
      match data_file.read_record(offset) {
        Ok(read) => {
          let pos = RecordPos {
            file_id,
            value_size: read.record.value.len() as u64,
            value_pos: offset + RECORD_HEADER_SIZE as u64 + read.record.key.len() as u64,
            tstamp: read.record.tstamp,
            pending: false,
          };
          self.index.put(read.record.key, pos);
          offset += read.size;
        }
        Err(Errors::ReadDataFileEof) => break,
        Err(e @ Errors::CorruptRecord { .. }) => {
          error!("{e}, skipping the rest of the file");
          break;
        }
        Err(e) => return Err(e),
      }
    }
    Ok(())
  }

  pub(crate) fn startup_io_type(&self) -> IOManagerType {
    if self.options.mmap_at_startup {
      IOManagerType::MemoryMap
    } else {
      IOManagerType::StandardFileIO
    }
  }

  pub(crate) fn active_file_id(&self) -> Result<u64> {
    let active = self.active_file.read();
    active
      .as_ref()
      .map(|f| f.file_id())
      .ok_or(Errors::WriteDenied)
  }
}

impl Drop for Engine {
  fn drop(&mut self) {
    if !self.closed.load(Ordering::SeqCst) {
      if let Err(e) = self.shutdown() {
        error!(
          "failed to close datastore {}: {e}",
          self.options.dir_path.display()
        );
      }
    }
  }
}

/// A data-file name is a decimal file id of at most 19 digits; anything
/// else in the directory (locks, hint files, keydir snapshots) is not a
/// data file.
fn parse_file_id(name: &str) -> Option<u64> {
  if name.is_empty() || name.len() > 19 || !name.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  name.parse().ok()
}
