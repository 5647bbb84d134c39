//! heapdb: a page-oriented heap-file storage manager.
//!
//! Maps a logical table onto a flat on-disk file of fixed-size pages and
//! exposes tuple-level insert, delete, and full-scan operations on top of
//! that layout. Pages are fetched through a shared cache under per-
//! transaction read-only or read/write permissions; file growth is guarded
//! by a file-scoped append critical section.

pub mod access;
pub mod concurrency;
pub mod storage;
pub mod transaction;
