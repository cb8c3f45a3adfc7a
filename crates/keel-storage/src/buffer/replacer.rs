//! LRU-K replacement policy.
//!
//! The replacer ranks unpinned frames by **backward k-distance**: the time
//! elapsed since a frame's k-th most recent access. A frame with fewer than
//! k recorded accesses has infinite distance and is evicted first; among
//! those, the one first seen longest ago wins (classic LRU tiebreak). Among
//! frames with full histories, the one whose k-th most recent access is
//! oldest wins.
//!
//! Compared to plain LRU this keeps a sequential scan from flushing the hot
//! set: a page touched once by the scan loses to any page accessed k times.
//!
//! The replacer knows nothing about pages or the disk; it tracks frame
//! indices only. Time is a process-local counter that advances by one per
//! recorded access and is never reset.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::trace;

use super::frame::FrameId;

struct LruKNode {
    /// Up to k most recent access timestamps, oldest first. Never empty: a
    /// node is created by the access that first observes the frame.
    history: VecDeque<u64>,
    evictable: bool,
}

impl LruKNode {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            evictable: false,
        }
    }

    /// Timestamp the eviction ranking keys on: the k-th most recent access
    /// for a full history, the first access otherwise.
    fn oldest(&self) -> u64 {
        self.history.front().copied().unwrap_or(0)
    }
}

struct ReplacerInner {
    nodes: HashMap<FrameId, LruKNode>,
    current_timestamp: u64,
    evictable: usize,
}

/// LRU-K replacer over the buffer pool's frames.
///
/// All operations are short critical sections under one internal mutex.
pub struct LruKReplacer {
    k: usize,
    capacity: usize,
    inner: Mutex<ReplacerInner>,
}

impl LruKReplacer {
    /// Creates a replacer tracking up to `capacity` frames with history
    /// depth `k`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` or `k` is zero.
    pub fn new(capacity: usize, k: usize) -> Self {
        assert!(capacity > 0, "replacer capacity must be positive");
        assert!(k > 0, "k must be positive");
        Self {
            k,
            capacity,
            inner: Mutex::new(ReplacerInner {
                nodes: HashMap::with_capacity(capacity),
                current_timestamp: 0,
                evictable: 0,
            }),
        }
    }

    /// Records an access to `frame_id` at the current timestamp, creating
    /// the frame's node (non-evictable) if this is its first access.
    ///
    /// # Panics
    ///
    /// Panics if `frame_id` is outside the pool.
    pub fn record_access(&self, frame_id: FrameId) {
        assert!(
            frame_id.index() < self.capacity,
            "frame {} out of range for replacer of {} frames",
            frame_id.index(),
            self.capacity
        );

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let timestamp = inner.current_timestamp;
        inner.current_timestamp += 1;

        let node = inner.nodes.entry(frame_id).or_insert_with(LruKNode::new);
        node.history.push_back(timestamp);
        if node.history.len() > self.k {
            node.history.pop_front();
        }
    }

    /// Marks `frame_id` as evictable or not, adjusting [`size`](Self::size).
    ///
    /// # Panics
    ///
    /// Panics if the frame has never been recorded.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let node = inner
            .nodes
            .get_mut(&frame_id)
            .unwrap_or_else(|| panic!("set_evictable on untracked frame {}", frame_id.index()));

        if node.evictable != evictable {
            node.evictable = evictable;
            if evictable {
                inner.evictable += 1;
            } else {
                inner.evictable -= 1;
            }
        }
    }

    /// Drops all history for `frame_id`. A no-op for untracked frames.
    ///
    /// # Panics
    ///
    /// Panics if the frame is tracked but not evictable; callers must mark
    /// it evictable first.
    pub fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.nodes.get(&frame_id) {
            None => return,
            Some(node) => {
                assert!(
                    node.evictable,
                    "remove on non-evictable frame {}",
                    frame_id.index()
                );
            }
        }
        inner.nodes.remove(&frame_id);
        inner.evictable -= 1;
    }

    /// Evicts the frame with the largest backward k-distance among the
    /// evictable ones, dropping its history.
    ///
    /// Returns `None` when no frame is evictable. Any frame index, including
    /// `0`, is a valid victim.
    pub fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let victim = inner
            .nodes
            .iter()
            .filter(|(_, node)| node.evictable)
            .min_by_key(|(_, node)| (node.history.len() >= self.k, node.oldest()))
            .map(|(&frame_id, _)| frame_id)?;

        inner.nodes.remove(&victim);
        inner.evictable -= 1;
        trace!(frame = victim.index(), "chose eviction victim");
        Some(victim)
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().evictable
    }

    /// Returns the history depth k.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the maximum number of tracked frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for LruKReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LruKReplacer")
            .field("k", &self.k)
            .field("capacity", &self.capacity)
            .field("tracked", &inner.nodes.len())
            .field("evictable", &inner.evictable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark_evictable(replacer: &LruKReplacer, frames: &[usize]) {
        for &frame in frames {
            replacer.set_evictable(FrameId::new(frame), true);
        }
    }

    #[test]
    fn test_evicts_infinite_distance_first() {
        // Access order: A B C A B. A and B reach k = 2 accesses, C stays at
        // one, so C has infinite backward k-distance and goes first.
        let replacer = LruKReplacer::new(8, 2);
        assert_eq!(replacer.k(), 2);
        assert_eq!(replacer.capacity(), 8);
        for frame in [0, 1, 2, 0, 1] {
            replacer.record_access(FrameId::new(frame));
        }
        mark_evictable(&replacer, &[0, 1, 2]);
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        // Among full histories, the oldest k-th-most-recent access loses.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_infinite_group_breaks_ties_by_first_access() {
        let replacer = LruKReplacer::new(8, 3);
        replacer.record_access(FrameId::new(5));
        replacer.record_access(FrameId::new(3));
        replacer.record_access(FrameId::new(5));
        mark_evictable(&replacer, &[3, 5]);

        // Both are below k = 3 accesses; frame 5 was seen first.
        assert_eq!(replacer.evict(), Some(FrameId::new(5)));
        assert_eq!(replacer.evict(), Some(FrameId::new(3)));
    }

    #[test]
    fn test_single_access_frames_lose_regardless_of_recency() {
        // With k = 2, a frame accessed once is evicted before any frame
        // accessed twice, even if the once-accessed frame is the most
        // recently touched.
        let replacer = LruKReplacer::new(8, 2);
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        mark_evictable(&replacer, &[0, 1]);

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_k_equals_one_degenerates_to_lru() {
        let replacer = LruKReplacer::new(8, 1);
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(2));
        replacer.record_access(FrameId::new(0)); // refresh frame 0
        mark_evictable(&replacer, &[0, 1, 2]);

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_evict_skips_non_evictable() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 0 is older but pinned (non-evictable).
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_evict_considers_frame_zero() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);

        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_set_evictable_adjusts_size() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        assert_eq!(replacer.size(), 0);

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);
        assert_eq!(replacer.size(), 2);

        // Toggling to the same state is a no-op.
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 2);

        replacer.set_evictable(FrameId::new(0), false);
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_remove_evictable_frame() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.record_access(FrameId::new(2));
        replacer.set_evictable(FrameId::new(2), true);
        assert_eq!(replacer.size(), 1);

        replacer.remove(FrameId::new(2));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_remove_untracked_frame_is_noop() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.remove(FrameId::new(3));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    #[should_panic(expected = "remove on non-evictable frame")]
    fn test_remove_non_evictable_panics() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.record_access(FrameId::new(0));
        replacer.remove(FrameId::new(0));
    }

    #[test]
    #[should_panic(expected = "set_evictable on untracked frame")]
    fn test_set_evictable_untracked_panics() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.set_evictable(FrameId::new(0), true);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_record_access_out_of_range_panics() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.record_access(FrameId::new(4));
    }

    #[test]
    fn test_history_refresh_changes_victim_order() {
        let replacer = LruKReplacer::new(8, 2);
        // Fill both histories.
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        // Refresh frame 0: its k-th most recent access is now newer than
        // frame 1's.
        replacer.record_access(FrameId::new(0));
        mark_evictable(&replacer, &[0, 1]);

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_reaccess_after_eviction_starts_fresh() {
        let replacer = LruKReplacer::new(4, 2);
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));

        // The frame was reused for a different page; its history restarts.
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(1));
        mark_evictable(&replacer, &[0, 1]);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }
}
