//! End-to-end tests for the buffer pool manager against an instrumented
//! in-memory disk.

use std::sync::Arc;
use std::thread;

use keel_common::PageId;
use keel_storage::buffer::{BufferError, BufferPoolConfig, BufferPoolManager};
use keel_storage::disk::{DiskManager, MemoryDiskManager};

const PAGE_SIZE: usize = 4096;

fn create_pool(pool_size: usize) -> (Arc<MemoryDiskManager>, BufferPoolManager) {
    let config = BufferPoolConfig::new(pool_size)
        .with_page_size(PAGE_SIZE)
        .with_replacer_k(2)
        .with_bucket_capacity(2);
    let disk = Arc::new(MemoryDiskManager::new(PAGE_SIZE));
    let pool = BufferPoolManager::new(config, Arc::clone(&disk) as Arc<dyn DiskManager>).unwrap();
    (disk, pool)
}

#[test]
fn fill_pool_then_evict_after_unpin() {
    let (_, pool) = create_pool(3);

    // Three allocations fill frames 0, 1, 2 with pages 0, 1, 2.
    let mut frames = Vec::new();
    for expected in 0..3 {
        let (page_id, frame) = pool.new_page().unwrap();
        assert_eq!(page_id, PageId::new(expected));
        assert_eq!(frame.frame_id().index(), expected as usize);
        frames.push(frame);
    }

    // Everything is pinned: no fourth page.
    assert!(matches!(pool.new_page(), Err(BufferError::PoolExhausted)));

    // Releasing page 0 frees exactly one frame for reuse.
    assert!(pool.unpin_page(PageId::new(0), false));
    let (page_id, frame) = pool.new_page().unwrap();
    assert_eq!(page_id, PageId::new(3));
    assert_eq!(frame.frame_id().index(), 0);

    assert!(!pool.contains(PageId::new(0)));
    for id in [1, 2, 3] {
        assert!(pool.contains(PageId::new(id)));
    }
}

#[test]
fn pinned_pool_rejects_fetch_of_cold_page() {
    let (_, pool) = create_pool(2);
    let (_p0, _f0) = pool.new_page().unwrap();
    let (_p1, _f1) = pool.new_page().unwrap();

    assert!(matches!(
        pool.fetch_page(PageId::new(99)),
        Err(BufferError::PoolExhausted)
    ));
}

#[test]
fn dirty_victim_is_written_back_exactly_once() {
    let (disk, pool) = create_pool(3);

    let (p0, frame) = pool.new_page().unwrap();
    frame.copy_from(&[0xAB; PAGE_SIZE]);
    assert!(pool.unpin_page(p0, true));

    // Fill the rest of the pool, then force one eviction.
    let (_p1, _f1) = pool.new_page().unwrap();
    let (_p2, _f2) = pool.new_page().unwrap();
    assert_eq!(disk.write_count(p0), 0);
    let (_p3, _f3) = pool.new_page().unwrap();

    assert!(!pool.contains(p0));
    assert_eq!(disk.write_count(p0), 1);
    assert!(disk.page(p0).unwrap().iter().all(|&b| b == 0xAB));
}

#[test]
fn clean_victim_is_not_written_back() {
    let (disk, pool) = create_pool(1);

    let (p0, _frame) = pool.new_page().unwrap();
    assert!(pool.unpin_page(p0, false));
    let (_p1, _f1) = pool.new_page().unwrap();

    assert!(!pool.contains(p0));
    assert_eq!(disk.write_count(p0), 0);
}

#[test]
fn deleted_page_must_be_reread_from_disk() {
    let (disk, pool) = create_pool(3);

    let (p0, frame) = pool.new_page().unwrap();
    frame.copy_from(b"sticky");
    assert!(pool.unpin_page(p0, true));
    pool.delete_page(p0).unwrap();
    assert!(!pool.contains(p0));

    // Deletion wrote the dirty page back; fetching it again is a miss that
    // goes to disk.
    let reads_before = disk.total_reads();
    let fetched = pool.fetch_page(p0).unwrap();
    assert_eq!(disk.total_reads(), reads_before + 1);
    assert_eq!(&fetched.read_data()[0..6], b"sticky");
}

#[test]
fn round_trip_through_eviction() {
    let (_, pool) = create_pool(1);

    let (p0, frame) = pool.new_page().unwrap();
    frame.copy_from(&[0xC4; PAGE_SIZE]);
    assert!(pool.unpin_page(p0, true));

    // Evict page 0 by cycling another page through the only frame.
    let (p1, _f1) = pool.new_page().unwrap();
    assert!(pool.unpin_page(p1, false));
    assert!(!pool.contains(p0));

    let fetched = pool.fetch_page(p0).unwrap();
    assert!(fetched.read_data().iter().all(|&b| b == 0xC4));
}

#[test]
fn flush_is_idempotent_on_dirty_state() {
    let (disk, pool) = create_pool(2);

    let (p0, frame) = pool.new_page().unwrap();
    frame.copy_from(b"once");
    assert!(pool.unpin_page(p0, true));

    pool.flush_page(p0).unwrap();
    assert_eq!(pool.stats().dirty_frames, 0);

    pool.flush_page(p0).unwrap();
    assert_eq!(pool.stats().dirty_frames, 0);
    assert_eq!(&disk.page(p0).unwrap()[0..4], b"once");
}

#[test]
fn flush_all_cleans_every_resident_page() {
    let (disk, pool) = create_pool(4);

    let mut ids = Vec::new();
    for tag in 0u8..4 {
        let (page_id, frame) = pool.new_page().unwrap();
        frame.copy_from(&[tag; 8]);
        assert!(pool.unpin_page(page_id, true));
        ids.push(page_id);
    }
    assert_eq!(pool.stats().dirty_frames, 4);

    pool.flush_all_pages().unwrap();
    assert_eq!(pool.stats().dirty_frames, 0);
    for (tag, page_id) in ids.iter().enumerate() {
        assert_eq!(disk.write_count(*page_id), 1);
        assert_eq!(disk.page(*page_id).unwrap()[0], tag as u8);
    }
}

#[test]
fn unpin_of_unpinned_page_fails_and_changes_nothing() {
    let (_, pool) = create_pool(3);

    let (p0, _frame) = pool.new_page().unwrap();
    assert!(pool.unpin_page(p0, true));
    assert_eq!(pool.pin_count(p0), Some(0));
    let evictable = pool.evictable_count();

    assert!(!pool.unpin_page(p0, false));
    assert_eq!(pool.pin_count(p0), Some(0));
    assert_eq!(pool.evictable_count(), evictable);
    assert!(pool.contains(p0));
}

#[test]
fn lru_k_prefers_single_access_pages() {
    let (_, pool) = create_pool(3);

    // Page 0 gets a second access; pages 1 and 2 are touched once.
    let (p0, _f0) = pool.new_page().unwrap();
    let (p1, _f1) = pool.new_page().unwrap();
    let (p2, _f2) = pool.new_page().unwrap();
    let _again = pool.fetch_page(p0).unwrap();

    assert!(pool.unpin_page(p0, false));
    assert!(pool.unpin_page(p0, false));
    assert!(pool.unpin_page(p1, false));
    assert!(pool.unpin_page(p2, false));

    // Victims: first the once-accessed pages in first-seen order, then the
    // twice-accessed one.
    let (_p3, _) = pool.new_page().unwrap();
    assert!(!pool.contains(p1));
    assert!(pool.contains(p0) && pool.contains(p2));

    let (_p4, _) = pool.new_page().unwrap();
    assert!(!pool.contains(p2));
    assert!(pool.contains(p0));

    let (_p5, _) = pool.new_page().unwrap();
    assert!(!pool.contains(p0));
}

#[test]
fn frame_bookkeeping_stays_consistent() {
    let (_, pool) = create_pool(4);

    let (p0, _f0) = pool.new_page().unwrap();
    let (p1, _f1) = pool.new_page().unwrap();
    let (p2, _f2) = pool.new_page().unwrap();
    assert!(pool.unpin_page(p1, false));

    // 4 frames: one free, one evictable, two pinned.
    assert_eq!(pool.free_frame_count(), 1);
    assert_eq!(pool.evictable_count(), 1);
    assert_eq!(pool.stats().pinned_frames, 2);

    pool.delete_page(p1).unwrap();
    assert_eq!(pool.free_frame_count(), 2);
    assert_eq!(pool.evictable_count(), 0);

    assert!(pool.unpin_page(p0, false));
    assert!(pool.unpin_page(p2, false));
    assert_eq!(pool.evictable_count(), 2);
    assert_eq!(pool.stats().pinned_frames, 0);
}

#[test]
fn concurrent_writers_do_not_corrupt_pages() {
    let (_, pool) = create_pool(8);
    let pool = Arc::new(pool);

    let num_threads = 4;
    let pages_per_thread = 8; // 32 pages through 8 frames forces churn

    let mut handles = Vec::new();
    for _ in 0..num_threads {
        let pool = Arc::clone(&pool);
        handles.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut written = Vec::new();
            for _ in 0..pages_per_thread {
                let tag: u8 = rand::Rng::gen(&mut rng);
                let (page_id, frame) = pool.new_page().unwrap();
                frame.copy_from(&[tag; 32]);
                assert!(pool.unpin_page(page_id, true));
                written.push((page_id, tag));
            }
            written
        }));
    }

    let mut expected = Vec::new();
    for handle in handles {
        expected.extend(handle.join().unwrap());
    }
    assert_eq!(expected.len(), num_threads * pages_per_thread);

    for (page_id, tag) in expected {
        let frame = pool.fetch_page(page_id).unwrap();
        assert!(
            frame.read_data()[0..32].iter().all(|&b| b == tag),
            "page {page_id} lost its contents"
        );
        assert!(pool.unpin_page(page_id, false));
    }
}
