//! Shared page cache with permission-mediated access.
//!
//! Transactions fetch pages through [`BufferPool::get_page`], naming the
//! permission level they need. The pool acquires the matching page lock
//! (shared for read-only, exclusive for read/write), then serves the page
//! from its cache or materializes it by calling back into the owning
//! file's raw read primitive. Frames are never evicted; dirty frames are
//! written back by `flush_page`/`flush_all`, and a completing transaction
//! flushes just the pages it fetched for writing.

use crate::concurrency::lock::{LockManager, LockMode};
use crate::storage::disk::{PageFile, PAGE_SIZE};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{PageId, TableId};
use crate::transaction::TransactionId;
use dashmap::DashMap;
use log::debug;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Access mode requested when fetching a cached page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    fn lock_mode(self) -> LockMode {
        match self {
            Permission::ReadOnly => LockMode::Shared,
            Permission::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// One cached page frame.
///
/// Logical isolation between transactions is the lock manager's job; the
/// inner `RwLock` only guards the bytes against torn reads and writes.
pub struct CachedPage {
    id: PageId,
    data: RwLock<Box<[u8; PAGE_SIZE]>>,
    dirty: AtomicBool,
}

impl CachedPage {
    fn new(id: PageId, data: Box<[u8; PAGE_SIZE]>) -> Self {
        Self {
            id,
            data: RwLock::new(data),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Mutable access to the page bytes; marks the frame dirty.
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.dirty.store(true, Ordering::SeqCst);
        self.data.write()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }
}

/// Process-wide page cache, cheap to clone.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

struct BufferPoolInner {
    pages: DashMap<PageId, Arc<CachedPage>>,
    files: DashMap<TableId, Arc<PageFile>>,
    // Pages each live transaction fetched with read/write permission.
    write_sets: DashMap<TransactionId, HashSet<PageId>>,
    locks: LockManager,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// A pool whose page-lock waits abort after `timeout`.
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(BufferPoolInner {
                pages: DashMap::new(),
                files: DashMap::new(),
                write_sets: DashMap::new(),
                locks: LockManager::new(timeout),
            }),
        }
    }

    /// Registers the backing file a table's cache misses read from.
    pub fn register_file(&self, table_id: TableId, file: Arc<PageFile>) {
        self.inner.files.insert(table_id, file);
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.inner.locks
    }

    /// Fetches a page on behalf of `tid` at the given permission level.
    ///
    /// Blocks until the page lock is granted; a lock timeout surfaces as
    /// `TransactionAborted`. A cache miss reads the page from the table's
    /// registered file, so the page must already exist on disk.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permission,
    ) -> StorageResult<Arc<CachedPage>> {
        self.inner.locks.acquire(tid, pid, perm.lock_mode())?;
        if perm == Permission::ReadWrite {
            self.inner.write_sets.entry(tid).or_default().insert(pid);
        }

        if let Some(page) = self.inner.pages.get(&pid) {
            return Ok(Arc::clone(&page));
        }

        let file = self
            .inner
            .files
            .get(&pid.table_id)
            .map(|entry| Arc::clone(&entry))
            .ok_or(StorageError::UnknownTable(pid.table_id))?;

        debug!("cache miss, reading {} from disk", pid);
        match self.inner.pages.entry(pid) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let mut buf = Box::new([0u8; PAGE_SIZE]);
                file.read_page(pid.page_no, &mut buf)?;
                let page = Arc::new(CachedPage::new(pid, buf));
                entry.insert(Arc::clone(&page));
                Ok(page)
            }
        }
    }

    /// Writes one dirty frame back to its file. A no-op for clean or
    /// uncached pages.
    pub fn flush_page(&self, pid: PageId) -> StorageResult<()> {
        let page = match self.inner.pages.get(&pid) {
            Some(entry) => Arc::clone(&entry),
            None => return Ok(()),
        };
        if !page.is_dirty() {
            return Ok(());
        }
        let file = self
            .inner
            .files
            .get(&pid.table_id)
            .map(|entry| Arc::clone(&entry))
            .ok_or(StorageError::UnknownTable(pid.table_id))?;
        let data = page.read();
        file.write_page(pid.page_no, &data)?;
        page.clear_dirty();
        Ok(())
    }

    /// Writes every dirty frame back.
    pub fn flush_all(&self) -> StorageResult<()> {
        let pids: Vec<PageId> = self.inner.pages.iter().map(|entry| *entry.key()).collect();
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Flushes the pages `tid` fetched for writing, then releases every
    /// lock it holds. Frames dirtied by other live transactions stay in
    /// memory until their own transaction completes.
    pub fn complete_transaction(&self, tid: TransactionId) -> StorageResult<()> {
        if let Some((_, pids)) = self.inner.write_sets.remove(&tid) {
            for pid in pids {
                self.flush_page(pid)?;
            }
        }
        self.inner.locks.release_all(tid);
        Ok(())
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
