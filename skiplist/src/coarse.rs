//! Coarse-grained variant: one global mutex serializes every operation
//! (spec §4.C).
//!
//! Because the mutex is held for the whole critical section, the CAS used
//! by the other two variants is unnecessary here — plain stores suffice,
//! and `contains` must also take the lock (an unsynchronized reader could
//! otherwise observe a node this variant is about to free).

use crate::api::SkipListHandle;
use crate::level::random_level;
use crate::node::{HEAD_KEY, TAIL_KEY};
use crossbeam::epoch::{self, Atomic, Owned, Shared};
use parking_lot::Mutex;
use skiplist_core::ListConfig;
use std::sync::atomic::{AtomicUsize, Ordering};

#[repr(align(64))]
struct Node {
    key: i32,
    value: i32,
    top_level: u8,
    next: Box<[Atomic<Node>]>,
}

impl Node {
    fn new(key: i32, value: i32, top_level: u8) -> Self {
        let next = (0..=top_level as usize).map(|_| Atomic::null()).collect();
        Self {
            key,
            value,
            top_level,
            next,
        }
    }
}

/// A skip list guarded end-to-end by a single [`parking_lot::Mutex`].
pub struct CoarseList {
    head: Atomic<Node>,
    tail: Atomic<Node>,
    max_level: usize,
    size: AtomicUsize,
    lock: Mutex<()>,
}

impl Default for CoarseList {
    fn default() -> Self {
        Self::new()
    }
}

impl CoarseList {
    /// Creates an empty list with the reference configuration (`max_level
    /// = 16`).
    pub fn new() -> Self {
        Self::with_config(ListConfig::default())
    }

    /// Creates an empty list with a custom [`ListConfig`].
    ///
    /// # Panics
    ///
    /// Panics if `config` fails validation (e.g. `max_level == 0`).
    pub fn with_config(config: ListConfig) -> Self {
        config.validate().expect("invalid ListConfig");
        let guard = &epoch::pin();

        let tail_owned = Owned::new(Node::new(TAIL_KEY, 0, config.max_level as u8));
        let tail_shared = tail_owned.into_shared(guard);

        let head_owned = Owned::new(Node::new(HEAD_KEY, 0, config.max_level as u8));
        for slot in head_owned.next.iter() {
            slot.store(tail_shared, Ordering::Relaxed);
        }
        let head_shared = head_owned.into_shared(guard);

        let head = Atomic::null();
        head.store(head_shared, Ordering::Relaxed);
        let tail = Atomic::null();
        tail.store(tail_shared, Ordering::Relaxed);

        Self {
            head,
            tail,
            max_level: config.max_level,
            size: AtomicUsize::new(0),
            lock: Mutex::new(()),
        }
    }

    /// Descends from `max_level` to 0, recording `preds[]`/`succs[]` at
    /// every level. Caller must hold `self.lock`.
    fn find<'g>(
        &self,
        key: i32,
        guard: &'g epoch::Guard,
    ) -> (Vec<Shared<'g, Node>>, Vec<Shared<'g, Node>>) {
        let tail = self.tail.load(Ordering::Relaxed, guard);
        let mut preds = vec![Shared::null(); self.max_level + 1];
        let mut succs = vec![Shared::null(); self.max_level + 1];

        let mut pred = self.head.load(Ordering::Relaxed, guard);
        for level in (0..=self.max_level).rev() {
            let mut curr = unsafe { pred.deref() }.next[level].load(Ordering::Relaxed, guard);
            while curr != tail && unsafe { curr.deref() }.key < key {
                pred = curr;
                curr = unsafe { pred.deref() }.next[level].load(Ordering::Relaxed, guard);
            }
            preds[level] = pred;
            succs[level] = curr;
        }

        (preds, succs)
    }
}

impl SkipListHandle for CoarseList {
    fn insert(&self, key: i32, value: i32) -> bool {
        let guard = &epoch::pin();
        let _held = self.lock.lock();
        let tail = self.tail.load(Ordering::Relaxed, guard);

        let (preds, succs) = self.find(key, guard);
        if succs[0] != tail && unsafe { succs[0].deref() }.key == key {
            return false;
        }

        let top_level = random_level(self.max_level);
        let new_node = Owned::new(Node::new(key, value, top_level as u8));
        for level in 0..=top_level {
            new_node.next[level].store(succs[level], Ordering::Relaxed);
        }
        let new_shared = new_node.into_shared(guard);

        for level in 0..=top_level {
            unsafe { preds[level].deref() }.next[level].store(new_shared, Ordering::Relaxed);
        }

        self.size.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn delete(&self, key: i32) -> bool {
        let guard = &epoch::pin();
        let _held = self.lock.lock();
        let tail = self.tail.load(Ordering::Relaxed, guard);

        let (preds, succs) = self.find(key, guard);
        let victim = succs[0];
        if victim == tail || unsafe { victim.deref() }.key != key {
            return false;
        }

        let victim_ref = unsafe { victim.deref() };
        for level in 0..=victim_ref.top_level as usize {
            let succ = victim_ref.next[level].load(Ordering::Relaxed, guard);
            unsafe { preds[level].deref() }.next[level].store(succ, Ordering::Relaxed);
        }

        self.size.fetch_sub(1, Ordering::Relaxed);

        // No concurrent optimistic reader can see `victim` post-unlink:
        // `contains` takes the same mutex, so it is safe to free now.
        unsafe { drop(victim.into_owned()) };
        true
    }

    fn contains(&self, key: i32) -> bool {
        let guard = &epoch::pin();
        let _held = self.lock.lock();
        let tail = self.tail.load(Ordering::Relaxed, guard);

        let (_, succs) = self.find(key, guard);
        succs[0] != tail && unsafe { succs[0].deref() }.key == key
    }

    fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }
}

impl Drop for CoarseList {
    fn drop(&mut self) {
        let guard = &epoch::pin();
        let mut curr = self.head.load(Ordering::Relaxed, guard);
        while !curr.is_null() {
            let next = unsafe { curr.deref() }.next[0].load(Ordering::Relaxed, guard);
            unsafe { drop(curr.into_owned()) };
            curr = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_scenario_1_basic_lifecycle() {
        let list = CoarseList::new();
        assert!(list.insert(10, 100));
        assert!(list.insert(20, 200));
        assert!(!list.insert(10, 999));
        assert!(list.contains(10));
        assert!(!list.contains(15));
        assert!(list.delete(10));
        assert!(!list.delete(10));
        assert!(!list.contains(10));
    }

    #[test]
    fn seed_scenario_2_even_delete() {
        let list = CoarseList::new();
        for i in 0..500 {
            assert!(list.insert(i, i));
        }
        for i in 0..500 {
            assert!(list.contains(i));
        }
        for i in (0..500).step_by(2) {
            assert!(list.delete(i));
        }
        for i in 0..500 {
            assert_eq!(list.contains(i), i % 2 == 1);
        }
    }

    #[test]
    fn seed_scenario_4_reinsert_after_delete() {
        let list = CoarseList::new();
        assert!(list.insert(5, 1));
        assert!(list.delete(5));
        assert!(list.insert(5, 2));
        assert!(list.delete(5));
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn seed_scenario_6_disjoint_concurrent_inserts() {
        use std::sync::Arc;
        let list = Arc::new(CoarseList::new());
        std::thread::scope(|scope| {
            for tid in 0..4 {
                let list = Arc::clone(&list);
                scope.spawn(move || {
                    for k in (tid * 500)..((tid + 1) * 500) {
                        assert!(list.insert(k, k));
                    }
                });
            }
        });
        for k in 0..2000 {
            assert!(list.contains(k));
        }
        assert_eq!(list.len(), 2000);
    }
}
