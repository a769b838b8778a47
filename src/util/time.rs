use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch. Timestamps double as data-file names,
/// so they are capped to the 19 decimal digits the line format carries.
pub fn now_micros() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_micros() as u64)
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_now_micros_advances() {
    let a = now_micros();
    let b = now_micros();
    assert!(b >= a);
    assert!(a > 0);
  }
}
