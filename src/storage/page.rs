pub mod heap_page;

use std::fmt;

/// Identifies one heap file within the process.
///
/// Assigned by the caller at construction time. Two `HeapFile` instances
/// over the same backing file must be given the same id so that cache keys
/// and record ids agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table{}", self.0)
    }
}

/// Identifies one fixed-size page: a table plus a zero-based page number.
///
/// Ordered by table, then page number; within a table this is the physical
/// order of pages in the backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/page{}", self.table_id, self.page_no)
    }
}

pub use heap_page::{HeapPageBuf, HeapPageMut, HeapPageRef};
