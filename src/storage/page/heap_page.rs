//! Fixed-slot bitmap page layout.
//!
//! A page stores at most `slots_per_page` fixed-size tuples behind a
//! one-bit-per-slot liveness bitmap:
//!
//! ```text
//! +--------------+--------------------------------------------+
//! | slot bitmap  | slot 0 | slot 1 | ... | slot n-1 | padding |
//! +--------------+--------------------------------------------+
//! ```
//!
//! Slot `i` is live iff bit `i % 8` of header byte `i / 8` is set; its
//! bytes start at `header_size + i * tuple_size`. An all-zero page is the
//! canonical "every slot free" encoding, so a freshly appended page needs
//! no further initialization.

use crate::storage::disk::PAGE_SIZE;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;

/// Number of slots a page can hold for tuples of `tuple_size` bytes.
///
/// Each slot costs `tuple_size` bytes plus one bitmap bit.
pub fn slots_per_page(tuple_size: usize) -> u16 {
    ((PAGE_SIZE * 8) / (tuple_size * 8 + 1)) as u16
}

/// Bitmap header size in bytes for `slot_count` slots.
pub fn header_size(slot_count: u16) -> usize {
    (slot_count as usize).div_ceil(8)
}

/// The canonical bytes of an empty page: all slots free.
pub fn empty_page_data() -> Box<[u8; PAGE_SIZE]> {
    Box::new([0u8; PAGE_SIZE])
}

/// Shared (read-only) view of one page's slot layout.
pub struct HeapPageRef<'a> {
    id: PageId,
    data: &'a [u8; PAGE_SIZE],
    tuple_size: usize,
}

impl<'a> HeapPageRef<'a> {
    pub fn new(id: PageId, data: &'a [u8; PAGE_SIZE], tuple_size: usize) -> Self {
        Self {
            id,
            data,
            tuple_size,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn slot_count(&self) -> u16 {
        slots_per_page(self.tuple_size)
    }

    pub fn is_slot_used(&self, slot: u16) -> StorageResult<bool> {
        if slot >= self.slot_count() {
            return Err(StorageError::InvalidSlot {
                slot,
                slot_count: self.slot_count(),
            });
        }
        Ok(self.slot_used_unchecked(slot))
    }

    // Callers iterate `0..slot_count()`, so the bitmap index is in range.
    fn slot_used_unchecked(&self, slot: u16) -> bool {
        let byte = self.data[slot as usize / 8];
        byte & (1 << (slot % 8)) != 0
    }

    pub fn free_slot_count(&self) -> u16 {
        (0..self.slot_count())
            .filter(|&slot| !self.slot_used_unchecked(slot))
            .count() as u16
    }

    /// Raw bytes of a live slot.
    pub fn slot_bytes(&self, slot: u16) -> StorageResult<&'a [u8]> {
        if slot >= self.slot_count() {
            return Err(StorageError::InvalidSlot {
                slot,
                slot_count: self.slot_count(),
            });
        }
        if !self.slot_used_unchecked(slot) {
            return Err(StorageError::SlotEmpty {
                page_id: self.id,
                slot,
            });
        }
        let start = header_size(self.slot_count()) + slot as usize * self.tuple_size;
        Ok(&self.data[start..start + self.tuple_size])
    }

    /// Live slot numbers in ascending order.
    pub fn used_slots(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.slot_count()).filter(|&slot| self.slot_used_unchecked(slot))
    }
}

/// Exclusive (mutable) view of one page's slot layout.
pub struct HeapPageMut<'a> {
    id: PageId,
    data: &'a mut [u8; PAGE_SIZE],
    tuple_size: usize,
}

impl<'a> HeapPageMut<'a> {
    pub fn new(id: PageId, data: &'a mut [u8; PAGE_SIZE], tuple_size: usize) -> Self {
        Self {
            id,
            data,
            tuple_size,
        }
    }

    pub fn as_ref(&self) -> HeapPageRef<'_> {
        HeapPageRef::new(self.id, self.data, self.tuple_size)
    }

    /// Stores `bytes` in the lowest free slot and marks it live.
    pub fn insert(&mut self, bytes: &[u8]) -> StorageResult<u16> {
        assert_eq!(bytes.len(), self.tuple_size, "tuple bytes of wrong size");

        let slot_count = self.as_ref().slot_count();
        let slot = (0..slot_count)
            .find(|&slot| !self.as_ref().slot_used_unchecked(slot))
            .ok_or(StorageError::PageFull(self.id))?;

        let start = header_size(slot_count) + slot as usize * self.tuple_size;
        self.data[start..start + self.tuple_size].copy_from_slice(bytes);
        self.data[slot as usize / 8] |= 1 << (slot % 8);
        Ok(slot)
    }

    /// Marks a live slot free. The slot bytes are left in place.
    pub fn delete(&mut self, slot: u16) -> StorageResult<()> {
        let slot_count = self.as_ref().slot_count();
        if slot >= slot_count {
            return Err(StorageError::InvalidSlot { slot, slot_count });
        }
        if !self.as_ref().slot_used_unchecked(slot) {
            return Err(StorageError::SlotEmpty {
                page_id: self.id,
                slot,
            });
        }
        self.data[slot as usize / 8] &= !(1 << (slot % 8));
        Ok(())
    }
}

/// One page's bytes, owned, together with its identity.
///
/// Returned by `HeapFile::read_page` and accepted by `HeapFile::write_page`;
/// the cache deals in its own frames and never sees this type.
pub struct HeapPageBuf {
    id: PageId,
    data: Box<[u8; PAGE_SIZE]>,
}

impl HeapPageBuf {
    pub fn new(id: PageId, data: Box<[u8; PAGE_SIZE]>) -> Self {
        Self { id, data }
    }

    /// An empty page: every slot free.
    pub fn new_empty(id: PageId) -> Self {
        Self {
            id,
            data: empty_page_data(),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::TableId;

    const TUPLE_SIZE: usize = 12;

    fn pid() -> PageId {
        PageId::new(TableId(1), 0)
    }

    #[test]
    fn test_slots_per_page() {
        // 12-byte tuples: 32768 bits / 97 bits per slot = 337 slots
        assert_eq!(slots_per_page(12), 337);
        // 1024-byte tuples: 32768 / 8193 = 3 slots
        assert_eq!(slots_per_page(1024), 3);
        // Tuple larger than the page: no slots
        assert_eq!(slots_per_page(PAGE_SIZE + 1), 0);
    }

    #[test]
    fn test_layout_fits_in_page() {
        for tuple_size in [1, 7, 12, 100, 1024, 4000] {
            let slots = slots_per_page(tuple_size);
            let total = header_size(slots) + slots as usize * tuple_size;
            assert!(total <= PAGE_SIZE, "tuple_size {} overflows", tuple_size);
        }
    }

    #[test]
    fn test_empty_page_all_slots_free() {
        let data = empty_page_data();
        let page = HeapPageRef::new(pid(), &data, TUPLE_SIZE);
        assert_eq!(page.free_slot_count(), page.slot_count());
        assert_eq!(page.used_slots().count(), 0);
    }

    #[test]
    fn test_insert_fills_lowest_slot() -> StorageResult<()> {
        let mut data = empty_page_data();
        let mut page = HeapPageMut::new(pid(), &mut data, TUPLE_SIZE);

        assert_eq!(page.insert(&[1u8; TUPLE_SIZE])?, 0);
        assert_eq!(page.insert(&[2u8; TUPLE_SIZE])?, 1);
        page.delete(0)?;
        // Freed slot 0 is reused before any later slot
        assert_eq!(page.insert(&[3u8; TUPLE_SIZE])?, 0);

        Ok(())
    }

    #[test]
    fn test_is_slot_used_rejects_out_of_range_slot() -> StorageResult<()> {
        let mut data = empty_page_data();
        let mut page = HeapPageMut::new(pid(), &mut data, TUPLE_SIZE);
        let slot = page.insert(&[9u8; TUPLE_SIZE])?;

        let view = page.as_ref();
        assert!(view.is_slot_used(slot)?);
        assert!(!view.is_slot_used(slot + 1)?);
        assert!(matches!(
            view.is_slot_used(10_000),
            Err(StorageError::InvalidSlot {
                slot: 10_000,
                slot_count: 337,
            })
        ));
        Ok(())
    }

    #[test]
    fn test_slot_bytes_round_trip() -> StorageResult<()> {
        let mut data = empty_page_data();
        let mut page = HeapPageMut::new(pid(), &mut data, TUPLE_SIZE);

        let bytes = [7u8; TUPLE_SIZE];
        let slot = page.insert(&bytes)?;
        assert_eq!(page.as_ref().slot_bytes(slot)?, &bytes);

        Ok(())
    }

    #[test]
    fn test_free_slot_count_tracks_mutations() -> StorageResult<()> {
        let mut data = empty_page_data();
        let mut page = HeapPageMut::new(pid(), &mut data, TUPLE_SIZE);
        let total = page.as_ref().slot_count();

        page.insert(&[1u8; TUPLE_SIZE])?;
        page.insert(&[2u8; TUPLE_SIZE])?;
        assert_eq!(page.as_ref().free_slot_count(), total - 2);

        page.delete(0)?;
        assert_eq!(page.as_ref().free_slot_count(), total - 1);

        Ok(())
    }

    #[test]
    fn test_page_full() -> StorageResult<()> {
        let tuple_size = 1024; // 3 slots per page
        let mut data = empty_page_data();
        let mut page = HeapPageMut::new(pid(), &mut data, tuple_size);

        for _ in 0..3 {
            page.insert(&[0xAAu8; 1024])?;
        }
        assert!(matches!(
            page.insert(&[0xAAu8; 1024]),
            Err(StorageError::PageFull(_))
        ));

        Ok(())
    }

    #[test]
    fn test_delete_errors() -> StorageResult<()> {
        let mut data = empty_page_data();
        let mut page = HeapPageMut::new(pid(), &mut data, TUPLE_SIZE);

        assert!(matches!(
            page.delete(0),
            Err(StorageError::SlotEmpty { .. })
        ));
        assert!(matches!(
            page.delete(10_000),
            Err(StorageError::InvalidSlot { .. })
        ));

        let slot = page.insert(&[1u8; TUPLE_SIZE])?;
        page.delete(slot)?;
        // Double delete
        assert!(matches!(
            page.delete(slot),
            Err(StorageError::SlotEmpty { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_slot_bytes_of_free_slot() {
        let data = empty_page_data();
        let page = HeapPageRef::new(pid(), &data, TUPLE_SIZE);
        assert!(matches!(
            page.slot_bytes(0),
            Err(StorageError::SlotEmpty { .. })
        ));
        assert!(matches!(
            page.slot_bytes(10_000),
            Err(StorageError::InvalidSlot { .. })
        ));
    }

    #[test]
    fn test_used_slots_ascending() -> StorageResult<()> {
        let mut data = empty_page_data();
        let mut page = HeapPageMut::new(pid(), &mut data, TUPLE_SIZE);

        for i in 0..5 {
            page.insert(&[i as u8; TUPLE_SIZE])?;
        }
        page.delete(1)?;
        page.delete(3)?;

        let used: Vec<u16> = page.as_ref().used_slots().collect();
        assert_eq!(used, vec![0, 2, 4]);

        Ok(())
    }
}
