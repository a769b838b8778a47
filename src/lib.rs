//! Spark-KV: an embedded key-value store following the Bitcask model.
//!
//! All writes append to immutable data files in a single directory; an
//! in-memory keydir maps each live key to the position of its most recent
//! value, so a read costs one seek and one read. One writer process holds a
//! datastore at a time, with concurrent readers admitted through a shared
//! keydir snapshot file.
//!
//! # Features
//!
//! * One-seek reads through the in-memory keydir
//! * Buffered writes with on-demand or per-put durability
//! * Space reclamation through merge compaction, with hint files for fast
//!   restarts
//! * Single-writer / multi-reader coordination over plain files
//! * Pluggable keydir representations
//!
//! # Basic Usage
//!
//! ```
//! use bytes::Bytes;
//! use spark_kv::{db::Engine, option::Options};
//!
//! let dir = tempfile::tempdir().expect("failed to create temp dir");
//! let engine = Engine::open(Options::read_write(dir.path())).expect("failed to open datastore");
//!
//! // Store a key-value pair
//! let key = Bytes::from(b"hello".to_vec());
//! let value = Bytes::from(b"world".to_vec());
//! engine.put(key.clone(), value.clone()).expect("failed to put");
//!
//! // Retrieve the value
//! let retrieved = engine.get(key.clone()).expect("failed to get");
//! assert_eq!(retrieved, value);
//!
//! // Delete the key
//! engine.delete(key).expect("failed to delete");
//! engine.close().expect("failed to close");
//! ```

mod data;

mod fio;
mod index;
mod lock;
mod pending;

pub mod db;
pub mod errors;
pub mod merge;
pub mod option;
pub mod util;
