use crate::access::scan::HeapScan;
use crate::access::tuple::{RecordId, Tuple};
use crate::access::value::{deserialize_tuple, serialize_tuple, TupleDesc};
use crate::concurrency::LockMode;
use crate::storage::buffer::{BufferPool, Permission};
use crate::storage::disk::PageFile;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::heap_page::{self, HeapPageMut, HeapPageRef};
use crate::storage::page::{HeapPageBuf, PageId, TableId};
use crate::transaction::TransactionId;
use log::debug;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// One logical table stored as an unordered sequence of fixed-size pages
/// in a flat backing file.
///
/// All operations take `&self`; transactional isolation comes from the
/// page locks the cache acquires on each fetch, and file growth is
/// serialized by a file-scoped append guard.
pub struct HeapFile {
    table_id: TableId,
    desc: Arc<TupleDesc>,
    file: Arc<PageFile>,
    pool: BufferPool,
    // Append critical section. Independent of the transaction-level page
    // locks: extending the file is a physical structural change and is not
    // rolled back. Injectable so it could be swapped for a cross-process
    // file lock if the file were ever shared between processes.
    extend_lock: Arc<Mutex<()>>,
}

impl HeapFile {
    /// Creates a new, empty heap file and registers it with the cache.
    pub fn create(
        pool: BufferPool,
        table_id: TableId,
        path: &Path,
        desc: TupleDesc,
    ) -> StorageResult<Self> {
        Self::build(pool, table_id, PageFile::create(path)?, desc)
    }

    /// Opens an existing heap file and registers it with the cache.
    pub fn open(
        pool: BufferPool,
        table_id: TableId,
        path: &Path,
        desc: TupleDesc,
    ) -> StorageResult<Self> {
        Self::build(pool, table_id, PageFile::open(path)?, desc)
    }

    fn build(
        pool: BufferPool,
        table_id: TableId,
        file: PageFile,
        desc: TupleDesc,
    ) -> StorageResult<Self> {
        if heap_page::slots_per_page(desc.byte_size()) == 0 {
            return Err(StorageError::TupleTooLarge(desc.byte_size()));
        }
        let file = Arc::new(file);
        pool.register_file(table_id, Arc::clone(&file));
        Ok(Self {
            table_id,
            desc: Arc::new(desc),
            file,
            pool,
            extend_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Replaces the append guard, e.g. with one shared by another handle
    /// to the same backing file.
    pub fn with_extend_lock(mut self, extend_lock: Arc<Mutex<()>>) -> Self {
        self.extend_lock = extend_lock;
        self
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Current page count, recomputed from the live file length so it
    /// always reflects concurrent appends.
    pub fn page_count(&self) -> StorageResult<u32> {
        self.file.page_count()
    }

    /// Reads one page directly from disk, bypassing the cache.
    ///
    /// `Ok(None)` when the id names another table or a page outside
    /// `[0, page_count)`. An I/O failure is an error, never `None`, so
    /// callers can tell "does not exist" from "could not read".
    pub fn read_page(&self, pid: PageId) -> StorageResult<Option<HeapPageBuf>> {
        if pid.table_id != self.table_id {
            return Ok(None);
        }
        if pid.page_no >= self.page_count()? {
            return Ok(None);
        }
        let mut buf = Box::new([0u8; crate::storage::PAGE_SIZE]);
        self.file.read_page(pid.page_no, &mut buf)?;
        Ok(Some(HeapPageBuf::new(pid, buf)))
    }

    /// Writes one page directly to disk, bypassing the cache.
    ///
    /// The page must belong to this table; handing over another table's
    /// page is a programming error.
    pub fn write_page(&self, page: &HeapPageBuf) -> StorageResult<()> {
        assert_eq!(
            page.id().table_id,
            self.table_id,
            "page {} written to {}",
            page.id(),
            self.table_id
        );
        self.file.write_page(page.id().page_no, page.data())
    }

    /// Inserts a tuple, setting its record id, and returns the pages the
    /// transaction dirtied.
    ///
    /// Existing pages are scanned in order for a free slot (an O(pages)
    /// walk; a free-page index is a deliberate non-feature). Only when
    /// every page is full is the file extended by one empty page, under
    /// the append guard so concurrent inserts cannot claim the same page
    /// number.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<Vec<PageId>> {
        if **tuple.desc() != *self.desc {
            return Err(StorageError::SchemaMismatch);
        }
        let bytes = serialize_tuple(tuple.values(), &self.desc)?;
        let tuple_size = self.desc.byte_size();

        loop {
            // The page count is re-read every iteration so a page another
            // insert appended mid-scan is considered before extending.
            let mut target = None;
            let mut page_no = 0;
            while page_no < self.page_count()? {
                let pid = PageId::new(self.table_id, page_no);
                let page = self.pool.get_page(tid, pid, Permission::ReadOnly)?;
                let has_room = {
                    let data = page.read();
                    HeapPageRef::new(pid, &data, tuple_size).free_slot_count() > 0
                };
                if has_room {
                    target = Some(page_no);
                    break;
                }
                page_no += 1;
            }

            let page_no = match target {
                Some(page_no) => page_no,
                None => self.extend()?,
            };

            // The free-slot scan held only a read permission. Two inserts
            // eyeing the same page would each wait forever for the other's
            // shared lock to clear, so drop ours and contend for the
            // exclusive lock from scratch.
            let pid = PageId::new(self.table_id, page_no);
            let locks = self.pool.lock_manager();
            if locks.held_mode(tid, pid) == Some(LockMode::Shared) {
                locks.release(tid, pid);
            }
            let page = self.pool.get_page(tid, pid, Permission::ReadWrite)?;
            let inserted = {
                let mut data = page.write();
                HeapPageMut::new(pid, &mut data, tuple_size).insert(&bytes)
            };
            match inserted {
                Ok(slot) => {
                    tuple.set_record_id(Some(RecordId::new(pid, slot)));
                    return Ok(vec![pid]);
                }
                // A concurrent insert claimed the last free slot between
                // the free-slot scan and the write fetch; go around again.
                Err(StorageError::PageFull(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Appends one canonical empty page and returns its page number.
    fn extend(&self) -> StorageResult<u32> {
        let _guard = self.extend_lock.lock();
        // Recomputed inside the critical section: another insert may have
        // appended since we observed every page full.
        let page_no = self.page_count()?;
        debug!("extending {} to {} pages", self.table_id, page_no + 1);
        self.file.write_page(page_no, &heap_page::empty_page_data())?;
        Ok(page_no)
    }

    /// Deletes a stored tuple and returns the pages the transaction
    /// dirtied.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> StorageResult<Vec<PageId>> {
        let rid = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        if rid.page_id.table_id != self.table_id {
            return Err(StorageError::TableMismatch {
                expected: self.table_id,
                found: rid.page_id.table_id,
            });
        }
        let page_count = self.page_count()?;
        if rid.page_id.page_no >= page_count {
            return Err(StorageError::PageOutOfRange {
                page_no: rid.page_id.page_no,
                page_count,
            });
        }

        let page = self.pool.get_page(tid, rid.page_id, Permission::ReadWrite)?;
        {
            let mut data = page.write();
            HeapPageMut::new(rid.page_id, &mut data, self.desc.byte_size()).delete(rid.slot)?;
        }
        Ok(vec![rid.page_id])
    }

    /// A fresh, initially closed scan cursor bound to this file.
    pub fn scan(&self, tid: TransactionId) -> HeapScan<'_> {
        HeapScan::new(self, tid)
    }

    /// Materializes the live tuples of one page, fetched through the
    /// cache with read permission.
    pub(crate) fn live_tuples(
        &self,
        tid: TransactionId,
        page_no: u32,
    ) -> StorageResult<Vec<Tuple>> {
        let pid = PageId::new(self.table_id, page_no);
        let page = self.pool.get_page(tid, pid, Permission::ReadOnly)?;
        let data = page.read();
        let view = HeapPageRef::new(pid, &data, self.desc.byte_size());

        let mut tuples = Vec::new();
        for slot in view.used_slots() {
            let values = deserialize_tuple(view.slot_bytes(slot)?, &self.desc)?;
            let mut tuple = Tuple::new(Arc::clone(&self.desc), values)?;
            tuple.set_record_id(Some(RecordId::new(pid, slot)));
            tuples.push(tuple);
        }
        Ok(tuples)
    }
}
