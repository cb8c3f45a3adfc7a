//! Page guards (RAII pin handles) for safe page access.
//!
//! The pool's handle contract says every returned frame must be unpinned
//! exactly once. These guards discharge that obligation automatically: the
//! pin is released when the guard goes out of scope, and a write guard
//! reports whether the page was modified so the dirty flag is set as part
//! of the unpin.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use keel_common::PageId;

use super::frame::{BufferFrame, FrameId};
use super::pool::BufferPoolManager;

/// Read guard for a page in the buffer pool.
///
/// This guard:
/// - Provides read-only access to page data
/// - Keeps the frame pinned while held
/// - Automatically unpins when dropped
pub struct PageReadGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Arc<BufferFrame>,
    page_id: PageId,
}

impl<'a> PageReadGuard<'a> {
    /// Creates a new read guard over an already-pinned frame.
    pub(crate) fn new(pool: &'a BufferPoolManager, frame: Arc<BufferFrame>, page_id: PageId) -> Self {
        Self {
            pool,
            frame,
            page_id,
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Returns a reference to the page data.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, false);
    }
}

impl std::fmt::Debug for PageReadGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReadGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame.frame_id())
            .finish()
    }
}

/// Helper struct to provide Deref for page data.
struct PageDataRef<'a> {
    guard: parking_lot::RwLockReadGuard<'a, Vec<u8>>,
}

impl Deref for PageDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Write guard for a page in the buffer pool.
///
/// This guard:
/// - Provides read-write access to page data
/// - Keeps the frame pinned while held
/// - Tracks modification and reports it through the unpin on drop
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Arc<BufferFrame>,
    page_id: PageId,
    /// Whether the page data was touched through this guard.
    modified: bool,
}

impl<'a> PageWriteGuard<'a> {
    /// Creates a new write guard over an already-pinned frame.
    pub(crate) fn new(pool: &'a BufferPoolManager, frame: Arc<BufferFrame>, page_id: PageId) -> Self {
        Self {
            pool,
            frame,
            page_id,
            modified: false,
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Returns a reference to the page data.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }

    /// Returns a mutable reference to the page data and marks the page as
    /// modified.
    #[inline]
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        self.modified = true;
        PageDataMut {
            guard: self.frame.write_data(),
        }
    }

    /// Marks the page as modified without taking a data reference.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.modified = true;
    }

    /// Returns true if the page was modified through this guard.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, self.modified);
    }
}

impl std::fmt::Debug for PageWriteGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageWriteGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame.frame_id())
            .field("modified", &self.modified)
            .finish()
    }
}

/// Helper struct to provide DerefMut for page data.
struct PageDataMut<'a> {
    guard: parking_lot::RwLockWriteGuard<'a, Vec<u8>>,
}

impl Deref for PageDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageDataMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
