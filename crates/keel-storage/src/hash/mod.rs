//! Extendible hashing containers.
//!
//! The buffer pool routes page lookups through an extendible hash table
//! rather than a flat map: the directory doubles and individual buckets
//! split as entries accumulate, so growth cost is paid one bucket at a time.

mod extendible;

pub use extendible::{DirectoryError, ExtendibleHashTable, MAX_GLOBAL_DEPTH};
