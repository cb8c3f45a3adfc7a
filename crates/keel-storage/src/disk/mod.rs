//! Disk collaborator for the buffer pool.
//!
//! The buffer pool never touches storage directly; it issues page-granular
//! reads and writes through the [`DiskManager`] trait. Two implementations
//! are provided:
//!
//! - [`FileDiskManager`] - positioned I/O over a single database file
//! - [`MemoryDiskManager`] - an instrumented in-memory store for tests and
//!   ephemeral databases
//!
//! Page contents are opaque to the pool; a page is read and written as one
//! fixed-size byte buffer. Allocation of page identifiers is not a disk
//! concern - the pool owns the monotonic allocation counter.

mod file;
mod memory;

pub use file::FileDiskManager;
pub use memory::MemoryDiskManager;

use std::io;

use keel_common::PageId;

/// Synchronous page-granular storage interface consumed by the buffer pool.
///
/// Implementations must be thread-safe; the buffer pool issues all calls
/// from under its own latch, but other engine components may share the same
/// disk manager.
pub trait DiskManager: Send + Sync {
    /// Reads the page `page_id` into `buf`.
    ///
    /// `buf` must be exactly one page long. A page that has never been
    /// written reads as zeroes.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> io::Result<()>;

    /// Writes `buf` as the new contents of page `page_id`.
    ///
    /// `buf` must be exactly one page long. The write must be visible to a
    /// subsequent `read_page` of the same identifier.
    fn write_page(&self, page_id: PageId, buf: &[u8]) -> io::Result<()>;
}
