//! Full-table scan cursor.

use crate::access::heap::HeapFile;
use crate::access::tuple::Tuple;
use crate::access::value::TupleDesc;
use crate::storage::error::{StorageError, StorageResult};
use crate::transaction::TransactionId;
use std::sync::Arc;

/// Cursor position: the in-page iterator currently being drained plus the
/// first page number not yet fetched.
struct Position {
    next_page_no: u32,
    tuples: std::vec::IntoIter<Tuple>,
}

/// Stateful cursor yielding a heap file's tuples in page order, then slot
/// order within each page.
///
/// Starts closed; `open` positions it before page 0. Each page is fetched
/// fresh (with read permission) at the moment the cursor reaches it, so
/// tuples inserted into a page before the cursor gets there are seen and
/// tuples inserted behind it are not.
pub struct HeapScan<'a> {
    file: &'a HeapFile,
    tid: TransactionId,
    /// `None` while closed.
    position: Option<Position>,
}

impl<'a> HeapScan<'a> {
    pub(crate) fn new(file: &'a HeapFile, tid: TransactionId) -> Self {
        Self {
            file,
            tid,
            position: None,
        }
    }

    /// Opens the cursor and advances it to the first page that holds a
    /// live tuple. A file with no tuples leaves the cursor open but
    /// immediately exhausted.
    pub fn open(&mut self) -> StorageResult<()> {
        self.position = Some(self.seek(0)?);
        Ok(())
    }

    /// Walks forward from `page_no` to the first page with live tuples.
    fn seek(&self, mut page_no: u32) -> StorageResult<Position> {
        while page_no < self.file.page_count()? {
            let tuples = self.file.live_tuples(self.tid, page_no)?;
            page_no += 1;
            if !tuples.is_empty() {
                return Ok(Position {
                    next_page_no: page_no,
                    tuples: tuples.into_iter(),
                });
            }
        }
        Ok(Position {
            next_page_no: page_no,
            tuples: Vec::new().into_iter(),
        })
    }

    /// Whether another tuple is available. `false` while closed.
    pub fn has_next(&self) -> bool {
        self.position
            .as_ref()
            .is_some_and(|pos| pos.tuples.len() > 0)
    }

    /// Yields the next tuple, or `None` once exhausted.
    ///
    /// Fails with `ScanNotOpen` while closed. Draining the current page
    /// advances the cursor to the next page with live tuples, re-reading
    /// the file's page count as it goes.
    pub fn next(&mut self) -> StorageResult<Option<Tuple>> {
        let (tuple, reseek_from) = match self.position.as_mut() {
            None => return Err(StorageError::ScanNotOpen),
            Some(pos) => {
                let tuple = pos.tuples.next();
                let reseek_from = (pos.tuples.len() == 0).then_some(pos.next_page_no);
                (tuple, reseek_from)
            }
        };
        if let Some(page_no) = reseek_from {
            self.position = Some(self.seek(page_no)?);
        }
        Ok(tuple)
    }

    /// Restarts the scan from page 0, re-observing the file's current
    /// page count. Fails with `ScanNotOpen` while closed.
    pub fn rewind(&mut self) -> StorageResult<()> {
        if self.position.is_none() {
            return Err(StorageError::ScanNotOpen);
        }
        self.close();
        self.open()
    }

    /// Closes the cursor, dropping the in-page iterator. Idempotent.
    pub fn close(&mut self) {
        self.position = None;
    }

    /// The owning file's schema; valid in any state.
    pub fn desc(&self) -> &Arc<TupleDesc> {
        self.file.desc()
    }
}
