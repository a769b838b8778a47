use std::collections::HashMap;

use parking_lot::Mutex;

/// Writer-side buffer of staged puts: key to the encoded record line that
/// sync will append to the active file. Reader handles keep it empty.
pub struct PendingWrites {
  writes: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl PendingWrites {
  pub fn new() -> Self {
    Self {
      writes: Mutex::new(HashMap::new()),
    }
  }

  pub fn insert(&self, key: Vec<u8>, line: Vec<u8>) {
    let mut writes = self.writes.lock();
    writes.insert(key, line);
  }

  pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
    let writes = self.writes.lock();
    writes.get(key).cloned()
  }

  pub fn remove(&self, key: &[u8]) -> Option<Vec<u8>> {
    let mut writes = self.writes.lock();
    writes.remove(key)
  }

  /// Snapshot of the buffered keys so sync can drain entry by entry while
  /// the map stays consistent between steps.
  pub fn keys(&self) -> Vec<Vec<u8>> {
    let writes = self.writes.lock();
    writes.keys().cloned().collect()
  }

  pub fn len(&self) -> usize {
    let writes = self.writes.lock();
    writes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for PendingWrites {
  fn default() -> Self {
    Self::new()
  }
}
