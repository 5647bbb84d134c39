//! Storage layer: pages on disk and in cache.
//!
//! This module maps logical pages onto a flat backing file and mediates
//! shared access to them. Key components:
//!
//! - **PageFile**: raw single-page reads and writes at fixed offsets
//! - **BufferPool**: shared page cache handing out frames under a
//!   transaction's read-only or read/write permission
//! - **HeapPage views**: the fixed-slot bitmap layout within one page
//!
//! The tuple-level API built on top of this lives in [`crate::access`].

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::{BufferPool, CachedPage, Permission};
pub use disk::{PageFile, PAGE_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{HeapPageBuf, HeapPageMut, HeapPageRef, PageId, TableId};
