use bytes::Bytes;

/// Deterministic test key, zero-padded so keys sort in insertion order.
pub fn get_test_key(i: usize) -> Bytes {
  Bytes::from(format!("spark-kv-key-{:09}", i))
}

/// Deterministic test value, padded out so a handful of puts fill a file.
pub fn get_test_value(i: usize) -> Bytes {
  Bytes::from(format!("spark-kv-value-{:09}", i))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_get_test_key_value() {
    assert_eq!(get_test_key(7), Bytes::from("spark-kv-key-000000007"));
    assert_eq!(get_test_value(7), Bytes::from("spark-kv-value-000000007"));
  }
}
