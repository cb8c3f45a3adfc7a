//! In-memory disk manager.
//!
//! Backs the page store with a hash map instead of a file. Besides serving
//! ephemeral databases, it counts reads and writes per page so tests can
//! assert on the exact I/O the buffer pool issued.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use keel_common::PageId;

use super::DiskManager;

/// Disk manager that stores pages in memory.
pub struct MemoryDiskManager {
    page_size: usize,
    pages: Mutex<HashMap<PageId, Vec<u8>>>,
    write_counts: Mutex<HashMap<PageId, u64>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryDiskManager {
    /// Creates an empty in-memory disk with the given page size.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            pages: Mutex::new(HashMap::new()),
            write_counts: Mutex::new(HashMap::new()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of pages that have been written at least once.
    pub fn num_pages(&self) -> usize {
        self.pages.lock().len()
    }

    /// Total reads issued against this disk.
    pub fn total_reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total writes issued against this disk.
    pub fn total_writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of writes issued for one specific page.
    pub fn write_count(&self, page_id: PageId) -> u64 {
        self.write_counts.lock().get(&page_id).copied().unwrap_or(0)
    }

    /// Returns a copy of the stored contents of `page_id`, if any write
    /// reached it.
    pub fn page(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.pages.lock().get(&page_id).cloned()
    }

    fn check_buffer(&self, len: usize) -> io::Result<()> {
        if len != self.page_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "buffer is {len} bytes, expected page size {}",
                    self.page_size
                ),
            ));
        }
        Ok(())
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> io::Result<()> {
        self.check_buffer(buf.len())?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        match self.pages.lock().get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> io::Result<()> {
        self.check_buffer(buf.len())?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        *self.write_counts.lock().entry(page_id).or_insert(0) += 1;

        self.pages.lock().insert(page_id, buf.to_vec());
        Ok(())
    }
}

impl std::fmt::Debug for MemoryDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDiskManager")
            .field("page_size", &self.page_size)
            .field("num_pages", &self.num_pages())
            .field("reads", &self.total_reads())
            .field("writes", &self.total_writes())
            .finish()
    }
}
