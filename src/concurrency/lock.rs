//! Blocking page lock manager.
//!
//! Grants shared/exclusive page locks to transactions, blocking the caller
//! until the request is compatible with the current holders. There is no
//! deadlock detector; a wait that exceeds the manager's timeout aborts the
//! requesting transaction instead.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use log::trace;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lock modes supported by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock for read access.
    Shared,
    /// Exclusive lock for write access.
    Exclusive,
}

impl LockMode {
    /// Checks if this lock mode is compatible with another.
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}

#[derive(Debug, Default)]
struct LockState {
    holders: HashMap<TransactionId, LockMode>,
}

impl LockState {
    fn can_grant(&self, tid: TransactionId, mode: LockMode) -> bool {
        self.holders
            .iter()
            .filter(|(holder, _)| **holder != tid)
            .all(|(_, held)| held.is_compatible_with(&mode))
    }
}

/// Per-page lock table with blocking acquisition.
pub struct LockManager {
    table: Mutex<HashMap<PageId, LockState>>,
    cv: Condvar,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            cv: Condvar::new(),
            timeout,
        }
    }

    /// Acquires a lock on `pid` for `tid`, blocking until compatible.
    ///
    /// Re-entrant: holding an equal or stronger mode returns immediately.
    /// A Shared holder requesting Exclusive is upgraded once it is the
    /// sole holder. Waiting longer than the manager's timeout fails with
    /// `TransactionAborted`.
    pub fn acquire(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> StorageResult<()> {
        let deadline = Instant::now() + self.timeout;
        let mut table = self.table.lock();

        loop {
            let state = table.entry(pid).or_default();
            match state.holders.get(&tid) {
                Some(LockMode::Exclusive) => return Ok(()),
                Some(LockMode::Shared) if mode == LockMode::Shared => return Ok(()),
                // Upgrade or fresh grant, same compatibility rule: every
                // other holder must be compatible with the requested mode.
                _ => {
                    if state.can_grant(tid, mode) {
                        state.holders.insert(tid, mode);
                        return Ok(());
                    }
                }
            }

            trace!("{} waiting for {:?} lock on {}", tid, mode, pid);
            if self.cv.wait_until(&mut table, deadline).timed_out() {
                return Err(StorageError::TransactionAborted(tid));
            }
        }
    }

    /// Releases `tid`'s lock on one page, if held, and wakes waiters.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut table = self.table.lock();
        if let Some(state) = table.get_mut(&pid) {
            if state.holders.remove(&tid).is_some() {
                if state.holders.is_empty() {
                    table.remove(&pid);
                }
                self.cv.notify_all();
            }
        }
    }

    /// Releases every lock held by `tid` and wakes waiters.
    pub fn release_all(&self, tid: TransactionId) {
        let mut table = self.table.lock();
        table.retain(|_, state| {
            state.holders.remove(&tid);
            !state.holders.is_empty()
        });
        self.cv.notify_all();
    }

    /// The mode `tid` currently holds on `pid`, if any.
    pub fn held_mode(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        let table = self.table.lock();
        table.get(&pid).and_then(|state| state.holders.get(&tid)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::TableId;
    use std::sync::Arc;
    use std::thread;

    fn pid(page_no: u32) -> PageId {
        PageId::new(TableId(1), page_no)
    }

    fn manager(millis: u64) -> LockManager {
        LockManager::new(Duration::from_millis(millis))
    }

    #[test]
    fn test_shared_locks_coexist() -> StorageResult<()> {
        let lm = manager(100);
        lm.acquire(TransactionId(1), pid(0), LockMode::Shared)?;
        lm.acquire(TransactionId(2), pid(0), LockMode::Shared)?;
        assert_eq!(lm.held_mode(TransactionId(1), pid(0)), Some(LockMode::Shared));
        assert_eq!(lm.held_mode(TransactionId(2), pid(0)), Some(LockMode::Shared));
        Ok(())
    }

    #[test]
    fn test_exclusive_conflict_times_out() -> StorageResult<()> {
        let lm = manager(50);
        lm.acquire(TransactionId(1), pid(0), LockMode::Exclusive)?;
        let result = lm.acquire(TransactionId(2), pid(0), LockMode::Exclusive);
        assert!(matches!(
            result,
            Err(StorageError::TransactionAborted(TransactionId(2)))
        ));
        Ok(())
    }

    #[test]
    fn test_reentrant_acquire() -> StorageResult<()> {
        let lm = manager(50);
        let tid = TransactionId(1);
        lm.acquire(tid, pid(0), LockMode::Exclusive)?;
        // Weaker and equal re-requests succeed without waiting
        lm.acquire(tid, pid(0), LockMode::Shared)?;
        lm.acquire(tid, pid(0), LockMode::Exclusive)?;
        assert_eq!(lm.held_mode(tid, pid(0)), Some(LockMode::Exclusive));
        Ok(())
    }

    #[test]
    fn test_upgrade_when_sole_holder() -> StorageResult<()> {
        let lm = manager(50);
        let tid = TransactionId(1);
        lm.acquire(tid, pid(0), LockMode::Shared)?;
        lm.acquire(tid, pid(0), LockMode::Exclusive)?;
        assert_eq!(lm.held_mode(tid, pid(0)), Some(LockMode::Exclusive));
        Ok(())
    }

    #[test]
    fn test_upgrade_blocked_by_other_reader() -> StorageResult<()> {
        let lm = manager(50);
        lm.acquire(TransactionId(1), pid(0), LockMode::Shared)?;
        lm.acquire(TransactionId(2), pid(0), LockMode::Shared)?;
        let result = lm.acquire(TransactionId(1), pid(0), LockMode::Exclusive);
        assert!(matches!(result, Err(StorageError::TransactionAborted(_))));
        Ok(())
    }

    #[test]
    fn test_release_wakes_waiter() -> StorageResult<()> {
        let lm = Arc::new(manager(2_000));
        lm.acquire(TransactionId(1), pid(0), LockMode::Exclusive)?;

        let lm2 = Arc::clone(&lm);
        let waiter = thread::spawn(move || {
            lm2.acquire(TransactionId(2), pid(0), LockMode::Exclusive)
        });

        thread::sleep(Duration::from_millis(20));
        lm.release_all(TransactionId(1));
        waiter.join().unwrap()?;
        assert_eq!(
            lm.held_mode(TransactionId(2), pid(0)),
            Some(LockMode::Exclusive)
        );
        Ok(())
    }

    #[test]
    fn test_release_one_page_keeps_other_holdings() -> StorageResult<()> {
        let lm = manager(50);
        let tid = TransactionId(1);
        lm.acquire(tid, pid(0), LockMode::Shared)?;
        lm.acquire(tid, pid(1), LockMode::Exclusive)?;

        lm.release(tid, pid(0));
        assert_eq!(lm.held_mode(tid, pid(0)), None);
        assert_eq!(lm.held_mode(tid, pid(1)), Some(LockMode::Exclusive));

        // An unrelated exclusive request on the freed page now succeeds
        lm.acquire(TransactionId(2), pid(0), LockMode::Exclusive)?;
        Ok(())
    }

    #[test]
    fn test_locks_on_distinct_pages_do_not_conflict() -> StorageResult<()> {
        let lm = manager(50);
        lm.acquire(TransactionId(1), pid(0), LockMode::Exclusive)?;
        lm.acquire(TransactionId(2), pid(1), LockMode::Exclusive)?;
        Ok(())
    }

    #[test]
    fn test_release_all_clears_every_page() -> StorageResult<()> {
        let lm = manager(50);
        let tid = TransactionId(1);
        lm.acquire(tid, pid(0), LockMode::Shared)?;
        lm.acquire(tid, pid(1), LockMode::Exclusive)?;
        lm.release_all(tid);
        assert_eq!(lm.held_mode(tid, pid(0)), None);
        assert_eq!(lm.held_mode(tid, pid(1)), None);
        Ok(())
    }
}
