//! Buffer pool manager for KeelDB.
//!
//! The buffer pool manages a fixed-size pool of in-memory page frames,
//! mediating between callers and the disk:
//!
//! - **Page caching**: keep recently useful pages resident
//! - **Pin/unpin**: reference counting keeps in-use frames from being reused
//! - **Dirty tracking**: modified pages are written back before their frame
//!   is recycled
//! - **Eviction policy**: LRU-K replacement over unpinned frames
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     BufferPoolManager                        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                  Page Directory                        │  │
//! │  │      ExtendibleHashTable<PageId, FrameId>              │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                            │                                 │
//! │                            ▼                                 │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                   Frame Array                          │  │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐     ┌─────────┐   │  │
//! │  │  │ Frame 0 │ │ Frame 1 │ │ Frame 2 │ ... │ Frame N │   │  │
//! │  │  │ ─────── │ │ ─────── │ │ ─────── │     │ ─────── │   │  │
//! │  │  │ page_id │ │ page_id │ │ page_id │     │ page_id │   │  │
//! │  │  │ data[]  │ │ data[]  │ │ data[]  │     │ data[]  │   │  │
//! │  │  │ dirty   │ │ dirty   │ │ dirty   │     │ dirty   │   │  │
//! │  │  │ pin_cnt │ │ pin_cnt │ │ pin_cnt │     │ pin_cnt │   │  │
//! │  │  └─────────┘ └─────────┘ └─────────┘     └─────────┘   │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                            │                                 │
//! │                            ▼                                 │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                  LRU-K Replacer                        │  │
//! │  │          (ranks unpinned frames for eviction)          │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use keel_storage::buffer::{BufferPoolConfig, BufferPoolManager};
//! use keel_storage::disk::MemoryDiskManager;
//!
//! # fn example() -> keel_storage::buffer::BufferResult<()> {
//! let config = BufferPoolConfig::new(64);
//! let disk = Arc::new(MemoryDiskManager::new(config.page_size));
//! let pool = BufferPoolManager::new(config, disk)?;
//!
//! // Allocate a page and write into it through an RAII guard.
//! let page_id = {
//!     let mut guard = pool.create_page()?;
//!     guard.data_mut()[0..4].copy_from_slice(b"keel");
//!     guard.page_id()
//! }; // guard drop unpins the page
//!
//! // Fetch it back.
//! let guard = pool.fetch_page_read(page_id)?;
//! assert_eq!(&guard.data()[0..4], b"keel");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod config;
mod error;
mod frame;
mod latch;
mod pool;
mod replacer;

pub use config::BufferPoolConfig;
pub use error::{BufferError, BufferResult};
pub use frame::{BufferFrame, FrameId};
pub use latch::{PageReadGuard, PageWriteGuard};
pub use pool::BufferPoolManager;
pub use replacer::LruKReplacer;

/// Statistics for buffer pool monitoring.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolStats {
    /// Total number of page fetches.
    pub fetches: u64,
    /// Number of fetches served from resident frames.
    pub hits: u64,
    /// Number of fetches that required a disk read.
    pub misses: u64,
    /// Number of pages evicted from their frame.
    pub evictions: u64,
    /// Number of page write-backs issued.
    pub flushes: u64,
    /// Current number of pinned frames.
    pub pinned_frames: usize,
    /// Current number of dirty frames.
    pub dirty_frames: usize,
}

impl BufferPoolStats {
    /// Returns the cache hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        if self.fetches == 0 {
            0.0
        } else {
            self.hits as f64 / self.fetches as f64
        }
    }
}
