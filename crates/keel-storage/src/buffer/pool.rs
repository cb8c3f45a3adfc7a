//! Buffer pool manager.
//!
//! Owns the frame array, the page directory, the free list, and the LRU-K
//! replacer, and coordinates them with the disk collaborator. One mutex
//! serializes every public operation; the directory and the replacer carry
//! their own leaf latches, taken only from under the pool latch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use keel_common::PageId;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::frame::{BufferFrame, FrameId};
use super::latch::{PageReadGuard, PageWriteGuard};
use super::replacer::LruKReplacer;
use super::BufferPoolStats;
use crate::disk::DiskManager;
use crate::hash::ExtendibleHashTable;

/// State mutated only while the pool latch is held.
struct PoolState {
    /// Frames holding no page, handed out before any eviction happens.
    free_list: VecDeque<FrameId>,
    /// Monotonic page-id allocation counter; retired ids are never reused.
    next_page_id: i32,
}

/// The buffer pool manager.
///
/// Every operation that hands out a frame returns it **pinned**; the caller
/// owes exactly one [`unpin_page`](Self::unpin_page) per handle (or uses the
/// RAII guards from [`create_page`](Self::create_page) /
/// [`fetch_page_read`](Self::fetch_page_read) /
/// [`fetch_page_write`](Self::fetch_page_write), which unpin on drop).
/// A frame is reusable for a different page only once its pin count is zero.
pub struct BufferPoolManager {
    config: BufferPoolConfig,
    /// Array of buffer frames, allocated once.
    frames: Vec<Arc<BufferFrame>>,
    /// Page directory: maps PageId -> FrameId.
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// LRU-K replacer for eviction.
    replacer: LruKReplacer,
    /// Disk collaborator.
    disk: Arc<dyn DiskManager>,
    /// Free list and allocation counter, under the pool latch.
    state: Mutex<PoolState>,
    fetch_count: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    eviction_count: AtomicU64,
    flush_count: AtomicU64,
}

impl BufferPoolManager {
    /// Creates a new buffer pool with the given configuration and disk
    /// collaborator.
    pub fn new(config: BufferPoolConfig, disk: Arc<dyn DiskManager>) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;

        let frames: Vec<Arc<BufferFrame>> = (0..config.pool_size)
            .map(|i| Arc::new(BufferFrame::new(FrameId::new(i), config.page_size)))
            .collect();

        Ok(Self {
            page_table: ExtendibleHashTable::new(config.bucket_capacity),
            replacer: LruKReplacer::new(config.pool_size, config.replacer_k),
            state: Mutex::new(PoolState {
                free_list: (0..config.pool_size).map(FrameId::new).collect(),
                next_page_id: PageId::FIRST.as_i32(),
            }),
            frames,
            disk,
            config,
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Allocates a brand-new page and returns its id together with the
    /// pinned frame now holding it. The page buffer starts zeroed.
    ///
    /// Fails with [`BufferError::PoolExhausted`] when every frame is pinned.
    pub fn new_page(&self) -> BufferResult<(PageId, Arc<BufferFrame>)> {
        let mut state = self.state.lock();

        let frame_id = self.take_victim(&mut state)?;
        let frame = &self.frames[frame_id.index()];
        self.evict_resident(frame)?;

        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;

        frame.write_data().fill(0);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        self.page_table.insert(page_id, frame_id)?;
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        debug!(page = %page_id, frame = frame_id.index(), "allocated new page");
        Ok((page_id, Arc::clone(frame)))
    }

    /// Fetches the page `page_id`, reading it from disk if it is not
    /// resident, and returns the pinned frame holding it.
    ///
    /// Fails with [`BufferError::PoolExhausted`] when the page is not
    /// resident and every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<Arc<BufferFrame>> {
        if !page_id.is_valid() {
            return Err(BufferError::InvalidPageId { page_id });
        }

        let mut state = self.state.lock();
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        if let Some(frame_id) = self.page_table.find(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            let frame = &self.frames[frame_id.index()];
            frame.pin();
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);
            return Ok(Arc::clone(frame));
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.take_victim(&mut state)?;
        let frame = &self.frames[frame_id.index()];
        self.evict_resident(frame)?;

        self.disk.read_page(page_id, &mut frame.write_data())?;
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        self.page_table.insert(page_id, frame_id)?;
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        trace!(page = %page_id, frame = frame_id.index(), "fetched page from disk");
        Ok(Arc::clone(frame))
    }

    /// Releases one pin on `page_id`, folding `is_dirty` into the frame's
    /// dirty flag (a dirty frame never becomes clean through unpin).
    ///
    /// Returns `false` when the page is not resident or its pin count is
    /// already zero; the count never goes below zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let _state = self.state.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() == 0 {
            return false;
        }

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes the resident page `page_id` to disk and clears its dirty
    /// flag. Does not unpin.
    ///
    /// Fails with [`BufferError::PageNotFound`] when the page is not
    /// resident.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<()> {
        let _state = self.state.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return Err(BufferError::page_not_found(page_id));
        };
        self.write_back(&self.frames[frame_id.index()])
    }

    /// Writes every resident page to disk and clears all dirty flags.
    pub fn flush_all_pages(&self) -> BufferResult<()> {
        let _state = self.state.lock();

        for frame in &self.frames {
            if frame.page_id().is_valid() {
                self.write_back(frame)?;
            }
        }
        debug!("flushed all resident pages");
        Ok(())
    }

    /// Deletes the page `page_id` from the pool, returning its frame to the
    /// free list. A page that is not resident is trivially deleted.
    ///
    /// Fails with [`BufferError::PagePinned`] when the page is pinned.
    pub fn delete_page(&self, page_id: PageId) -> BufferResult<()> {
        let mut state = self.state.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return Ok(());
        };
        let frame = &self.frames[frame_id.index()];
        if frame.is_pinned() {
            return Err(BufferError::PagePinned { page_id });
        }

        if frame.is_dirty() {
            self.write_back(frame)?;
        }
        self.page_table.remove(&page_id);
        self.replacer.set_evictable(frame_id, true);
        self.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);

        debug!(page = %page_id, frame = frame_id.index(), "deleted page");
        Ok(())
    }

    /// Allocates a new page and wraps it in a write guard that unpins on
    /// drop.
    pub fn create_page(&self) -> BufferResult<PageWriteGuard<'_>> {
        let (page_id, frame) = self.new_page()?;
        Ok(PageWriteGuard::new(self, frame, page_id))
    }

    /// Fetches a page for reading behind a guard that unpins on drop.
    pub fn fetch_page_read(&self, page_id: PageId) -> BufferResult<PageReadGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageReadGuard::new(self, frame, page_id))
    }

    /// Fetches a page for writing behind a guard that unpins on drop,
    /// reporting dirtiness if the data was touched.
    pub fn fetch_page_write(&self, page_id: PageId) -> BufferResult<PageWriteGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageWriteGuard::new(self, frame, page_id))
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Returns true if `page_id` is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.page_table.find(&page_id).is_some()
    }

    /// Returns the pin count of `page_id`, if resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.page_table
            .find(&page_id)
            .map(|frame_id| self.frames[frame_id.index()].pin_count())
    }

    /// Returns the number of frames on the free list.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Returns the number of resident, unpinned frames the replacer could
    /// evict.
    pub fn evictable_count(&self) -> usize {
        self.replacer.size()
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned = 0;
        let mut dirty = 0;
        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Picks a frame to (re)use: free list first, then the replacer.
    fn take_victim(&self, state: &mut PoolState) -> BufferResult<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }
        let frame_id = self.replacer.evict().ok_or(BufferError::PoolExhausted)?;
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        Ok(frame_id)
    }

    /// Detaches the page currently held by `frame`, writing it back first
    /// if dirty. A no-op for empty frames.
    fn evict_resident(&self, frame: &BufferFrame) -> BufferResult<()> {
        let old_page_id = frame.page_id();
        if !old_page_id.is_valid() {
            return Ok(());
        }
        if frame.is_dirty() {
            self.write_back(frame)?;
            trace!(page = %old_page_id, "wrote back dirty victim");
        }
        self.page_table.remove(&old_page_id);
        Ok(())
    }

    /// Writes `frame`'s buffer to disk and clears its dirty flag.
    fn write_back(&self, frame: &BufferFrame) -> BufferResult<()> {
        self.disk.write_page(frame.page_id(), &frame.read_data())?;
        frame.set_dirty(false);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for BufferPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPoolManager")
            .field("pool_size", &self.config.pool_size)
            .field("page_size", &self.config.page_size)
            .field("free_frames", &self.free_frame_count())
            .field("stats", &self.stats())
            .finish()
    }
}
