use crate::storage::error::StorageResult;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Fixed page size shared by the disk layer, the page cache, and the
/// in-page slot layout.
pub const PAGE_SIZE: usize = 4096;

/// Byte offset of page `page_no` in the backing file.
pub fn page_offset(page_no: u32) -> u64 {
    page_no as u64 * PAGE_SIZE as u64
}

/// Number of pages in a file of `file_len` bytes.
///
/// Ceiling division: a successful append always leaves the length a
/// multiple of `PAGE_SIZE`, so the ceiling only matters when reading a
/// partially written file.
pub fn page_count_for_len(file_len: u64) -> u32 {
    file_len.div_ceil(PAGE_SIZE as u64) as u32
}

/// Raw page I/O over one backing file.
///
/// Reads and writes exactly one page at a time at the page's physical
/// offset. Callers are responsible for bounds-checking page numbers; a
/// read past end-of-file surfaces as an I/O error, never as an empty page.
pub struct PageFile {
    file: Mutex<File>,
}

impl PageFile {
    /// Creates a new, empty backing file. Truncates an existing one.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Opens an existing backing file.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Reads page `page_no` into `buf`.
    ///
    /// A short read (including one past end-of-file) is an I/O error.
    pub fn read_page(&self, page_no: u32, buf: &mut [u8; PAGE_SIZE]) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_offset(page_no)))?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Writes `data` as page `page_no`, growing the file if needed.
    ///
    /// No partial-write recovery is attempted; a failed write leaves the
    /// page's on-disk state undefined.
    pub fn write_page(&self, page_no: u32, data: &[u8; PAGE_SIZE]) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_offset(page_no)))?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    /// Current page count, recomputed from the live file length.
    pub fn page_count(&self) -> StorageResult<u32> {
        let file = self.file.lock();
        Ok(page_count_for_len(file.metadata()?.len()))
    }
}
