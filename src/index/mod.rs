pub mod btree;
pub mod skiplist;

use bytes::Bytes;

use crate::{data::record::RecordPos, errors::Result, option::IndexType};

/// The keydir: an in-memory map from key to the locator of its most recent
/// value. Mutated only by the writer process; reader processes build it once
/// at open and treat it as read-only.
pub trait Indexer: Sync + Send {
  /// Inserts or replaces a key's locator, returning the previous one.
  fn put(&self, key: Vec<u8>, pos: RecordPos) -> Option<RecordPos>;

  /// Retrieves a key's locator.
  fn get(&self, key: &[u8]) -> Option<RecordPos>;

  /// Removes a key, returning the locator it had.
  fn delete(&self, key: &[u8]) -> Option<RecordPos>;

  fn list_keys(&self) -> Result<Vec<Bytes>>;

  /// Snapshot of every entry, in unspecified order.
  fn entries(&self) -> Vec<(Bytes, RecordPos)>;

  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Creates a new indexer based on the specified index type.
pub fn new_indexer(index_type: &IndexType) -> Box<dyn Indexer> {
  match *index_type {
    IndexType::BTree => Box::new(btree::BTree::new()),
    IndexType::SkipList => Box::new(skiplist::SkipList::new()),
  }
}
