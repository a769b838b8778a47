use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::{data::record::RecordPos, errors::Result};

use super::Indexer;

/// Default keydir implementation on top of a `BTreeMap`.
pub struct BTree {
  tree: Arc<RwLock<BTreeMap<Vec<u8>, RecordPos>>>,
}

impl BTree {
  pub fn new() -> Self {
    Self {
      tree: Arc::new(RwLock::new(BTreeMap::new())),
    }
  }
}

impl Default for BTree {
  fn default() -> Self {
    Self::new()
  }
}

impl Indexer for BTree {
  fn put(&self, key: Vec<u8>, pos: RecordPos) -> Option<RecordPos> {
    let mut tree = self.tree.write();
    tree.insert(key, pos)
  }

  fn get(&self, key: &[u8]) -> Option<RecordPos> {
    let tree = self.tree.read();
    tree.get(key).copied()
  }

  fn delete(&self, key: &[u8]) -> Option<RecordPos> {
    let mut tree = self.tree.write();
    tree.remove(key)
  }

  fn list_keys(&self) -> Result<Vec<Bytes>> {
    let tree = self.tree.read();
    Ok(tree.keys().map(|k| Bytes::from(k.clone())).collect())
  }

  fn entries(&self) -> Vec<(Bytes, RecordPos)> {
    let tree = self.tree.read();
    tree
      .iter()
      .map(|(k, pos)| (Bytes::from(k.clone()), *pos))
      .collect()
  }

  fn len(&self) -> usize {
    let tree = self.tree.read();
    tree.len()
  }
}
