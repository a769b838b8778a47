use bytes::Bytes;
use crossbeam_skiplist::SkipMap;

use crate::{data::record::RecordPos, errors::Result};

use super::Indexer;

/// Keydir implementation on top of a lock-free skip list.
pub struct SkipList {
  skl: SkipMap<Vec<u8>, RecordPos>,
}

impl SkipList {
  pub fn new() -> Self {
    Self { skl: SkipMap::new() }
  }
}

impl Default for SkipList {
  fn default() -> Self {
    Self::new()
  }
}

impl Indexer for SkipList {
  fn put(&self, key: Vec<u8>, pos: RecordPos) -> Option<RecordPos> {
    let old = self.skl.get(&key).map(|e| *e.value());
    self.skl.insert(key, pos);
    old
  }

  fn get(&self, key: &[u8]) -> Option<RecordPos> {
    self.skl.get(key).map(|e| *e.value())
  }

  fn delete(&self, key: &[u8]) -> Option<RecordPos> {
    self.skl.remove(key).map(|e| *e.value())
  }

  fn list_keys(&self) -> Result<Vec<Bytes>> {
    Ok(
      self
        .skl
        .iter()
        .map(|e| Bytes::from(e.key().clone()))
        .collect(),
    )
  }

  fn entries(&self) -> Vec<(Bytes, RecordPos)> {
    self
      .skl
      .iter()
      .map(|e| (Bytes::from(e.key().clone()), *e.value()))
      .collect()
  }

  fn len(&self) -> usize {
    self.skl.len()
  }
}
