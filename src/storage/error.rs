//! Storage layer error types.

use crate::storage::page::{PageId, TableId};
use crate::transaction::TransactionId;
use thiserror::Error;

/// Errors that can occur in the storage and access layers.
///
/// Validation failures, I/O failures, iterator misuse, and lock aborts are
/// distinct variants so callers can tell "does not exist" apart from
/// "could not read".
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("schema mismatch: tuple schema does not match the table schema")]
    SchemaMismatch,

    #[error("table mismatch: expected table {expected}, got {found}")]
    TableMismatch { expected: TableId, found: TableId },

    #[error("page {page_no} out of range: table has {page_count} pages")]
    PageOutOfRange { page_no: u32, page_count: u32 },

    #[error("tuple size {0} bytes does not fit in a page")]
    TupleTooLarge(usize),

    #[error("page {0} is full")]
    PageFull(PageId),

    #[error("invalid slot {slot} (page holds {slot_count} slots)")]
    InvalidSlot { slot: u16, slot_count: u16 },

    #[error("slot {slot} of page {page_id} is empty")]
    SlotEmpty { page_id: PageId, slot: u16 },

    #[error("tuple has no record id: it was never stored in a table")]
    MissingRecordId,

    #[error("scan is not open")]
    ScanNotOpen,

    #[error("no file registered for table {0}")]
    UnknownTable(TableId),

    #[error("transaction {0} aborted: lock wait timed out")]
    TransactionAborted(TransactionId),

    #[error("corrupt tuple data: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
