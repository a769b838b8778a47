use std::fs;

use log::{error, warn};

use crate::{
  data::{
    data_file::DataFile,
    record::{self, RecordPos, RECORD_HEADER_SIZE},
  },
  db::Engine,
  errors::{Errors, Result},
  option::IOManagerType,
  util,
};

impl Engine {
  /// Rewrites every live record that is not in the active file into fresh
  /// merge files, emitting a hint file beside each, then deletes the
  /// superseded files.
  ///
  /// Merge is not atomic against crashes: a crash after the rewrite but
  /// before the deletions leaves both copies in the directory, and the next
  /// bootstrap resolves the duplication by its ascending file-id scan
  /// order (the merge output, having higher ids, wins). Readers that open
  /// while a merge is deleting may observe missing files; coordinate
  /// merges outside reader windows.
  pub fn merge(&self) -> Result<()> {
    self.sync()?;

    let dir = self.options.dir_path.clone();
    let snapshot = directory_names(&dir)?;
    let active_id = self.active_file_id()?;

    let merge_id = self.next_file_id();
    let mut merge_file = DataFile::new(&dir, merge_id, IOManagerType::StandardFileIO)?;
    let mut hint_file = DataFile::hint(&dir, merge_id, IOManagerType::StandardFileIO)?;

    for (key, pos) in self.index.entries() {
      if pos.file_id == active_id {
        // records in the active file are carried over unchanged
        continue;
      }

      let value = self.read_value(&key, &pos)?;
      let tstamp = util::time::now_micros();
      let mut line = record::encode_record(&key, &value, tstamp);

      if line.len() as u64 + 1 + merge_file.write_off() > self.options.max_file_size {
        merge_file.sync()?;
        hint_file.sync()?;
        let rotated_id = self.next_file_id();
        merge_file = DataFile::new(&dir, rotated_id, IOManagerType::StandardFileIO)?;
        hint_file = DataFile::hint(&dir, rotated_id, IOManagerType::StandardFileIO)?;
      }

      let line_start = merge_file.write_off();
      line.push(b'\n');
      merge_file.write(&line)?;

      let new_pos = RecordPos {
        file_id: merge_file.file_id(),
        value_size: value.len() as u64,
        value_pos: line_start + RECORD_HEADER_SIZE as u64 + key.len() as u64,
        tstamp,
        pending: false,
      };
      let mut hint_line = record::encode_hint(&key, &new_pos);
      hint_line.push(b'\n');
      hint_file.write(&hint_line)?;

      self.index.put(key.to_vec(), new_pos);
    }

    merge_file.sync()?;
    hint_file.sync()?;

    // Reclaim everything that existed before the merge except the active
    // file and hidden files. The just-written merge files are not in the
    // snapshot and survive.
    let active_name = active_id.to_string();
    for name in snapshot {
      if name.starts_with('.') || name == active_name {
        continue;
      }
      let path = dir.join(&name);
      if let Err(e) = fs::remove_file(&path) {
        warn!("failed to remove superseded file {}: {e}", path.display());
      }
    }
    Ok(())
  }

  /// Rebuilds keydir entries for one data file from its hint file, without
  /// touching the data payloads.
  pub(crate) fn load_index_from_hint_file(&self, file_id: u64) -> Result<()> {
    let hint_file = DataFile::hint(&self.options.dir_path, file_id, self.startup_io_type())?;

    let mut offset = 0u64;
    loop {
      match hint_file.read_hint(offset, file_id) {
        Ok((key, pos, size)) => {
          self.index.put(key, pos);
          offset += size;
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
}

fn directory_names(dir: &std::path::Path) -> Result<Vec<String>> {
  let entries = fs::read_dir(dir).map_err(|e| Errors::io(dir.display().to_string(), e))?;
  Ok(
    entries
      .flatten()
      .filter_map(|e| e.file_name().to_str().map(str::to_string))
      .collect(),
  )
}
