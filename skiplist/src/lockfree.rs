//! Lock-free variant: CAS-only progress using marked next-pointers
//! (Harris/Michael style, spec §4.E).
//!
//! The deletion mark lives on the low bit of a next-pointer, modeled here
//! with `crossbeam_epoch`'s pointer tag rather than hand-rolled bit
//! twiddling on a raw pointer — the same semantics as
//! `original_source/src/skiplist_lockfree.c`'s `IS_MARKED`/`GET_UNMARKED`
//! macros, expressed through the tagged-pointer support the teacher's
//! `crossbeam` dependency already provides.
//!
//! "Node N is logically deleted" means `N.next[0]`'s tag is set — the mark
//! applies to the departing edge, not to pointers *into* N.

use crate::api::SkipListHandle;
use crate::backoff::Backoff;
use crate::level::random_level;
use crate::node::{HEAD_KEY, TAIL_KEY};
use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use log::warn;
use skiplist_core::{BackoffConfig, ListConfig};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Safety-net ceiling for the retry loops (spec §7). Tuned to be
/// effectively unreachable in practice; hitting it returns a neutral
/// `false` rather than hanging.
const RETRY_CEILING: u32 = 1_000_000;

#[repr(align(64))]
struct Node {
    key: i32,
    value: i32,
    top_level: u8,
    next: Box<[Atomic<Node>]>,
}

impl Node {
    fn new(key: i32, value: i32, top_level: u8) -> Self {
        Self {
            key,
            value,
            top_level,
            next: (0..=top_level as usize).map(|_| Atomic::null()).collect(),
        }
    }
}

/// Strips the mark tag from a pointer, returning `(pointer, was_marked)`.
fn decompose(ptr: Shared<'_, Node>) -> (Shared<'_, Node>, bool) {
    (ptr.with_tag(0), ptr.tag() != 0)
}

/// A CAS-only skip list. Insert/delete are lock-free; `contains` is
/// wait-free.
pub struct LockFreeList {
    head: Atomic<Node>,
    tail: Atomic<Node>,
    max_level: usize,
    size: AtomicUsize,
    backoff_config: BackoffConfig,
}

impl Default for LockFreeList {
    fn default() -> Self {
        Self::new()
    }
}

impl LockFreeList {
    /// Creates an empty list with the reference configuration.
    pub fn new() -> Self {
        Self::with_config(ListConfig::default(), BackoffConfig::default())
    }

    /// Creates an empty list with custom tuning.
    ///
    /// # Panics
    ///
    /// Panics if either configuration fails validation.
    pub fn with_config(list_config: ListConfig, backoff_config: BackoffConfig) -> Self {
        list_config.validate().expect("invalid ListConfig");
        backoff_config.validate().expect("invalid BackoffConfig");
        let guard = &epoch::pin();

        let tail_owned = Owned::new(Node::new(TAIL_KEY, 0, list_config.max_level as u8));
        let tail_shared = tail_owned.into_shared(guard);

        let head_owned = Owned::new(Node::new(HEAD_KEY, 0, list_config.max_level as u8));
        for slot in head_owned.next.iter() {
            slot.store(tail_shared, Ordering::Release);
        }
        let head_shared = head_owned.into_shared(guard);

        let head = Atomic::null();
        head.store(head_shared, Ordering::Release);
        let tail = Atomic::null();
        tail.store(tail_shared, Ordering::Release);

        Self {
            head,
            tail,
            max_level: list_config.max_level,
            size: AtomicUsize::new(0),
            backoff_config,
        }
    }

    /// Top-down search with helping: a traverser that finds a marked node
    /// physically unlinks it before continuing (spec §4.E). The caller's
    /// `Backoff` is spun before every retry triggered by a failed helping
    /// CAS, since that CAS is the hottest path under contention — many
    /// threads can race to unlink the same marked node.
    fn find<'g>(
        &self,
        key: i32,
        guard: &'g Guard,
        backoff: &mut Backoff,
    ) -> (bool, Vec<Shared<'g, Node>>, Vec<Shared<'g, Node>>) {
        let tail = self.tail.load(Ordering::Acquire, guard).with_tag(0);

        'retry: loop {
            let mut preds = vec![Shared::null(); self.max_level + 1];
            let mut succs = vec![Shared::null(); self.max_level + 1];
            let mut pred = self.head.load(Ordering::Acquire, guard).with_tag(0);

            for level in (0..=self.max_level).rev() {
                let mut curr = unsafe { pred.deref() }.next[level]
                    .load(Ordering::Acquire, guard)
                    .with_tag(0);

                loop {
                    if curr == tail {
                        break;
                    }
                    let (mut succ, mut marked) =
                        decompose(unsafe { curr.deref() }.next[level].load(Ordering::Acquire, guard));

                    while marked {
                        match unsafe { pred.deref() }.next[level].compare_exchange(
                            curr,
                            succ,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                            guard,
                        ) {
                            Ok(_) => {}
                            Err(_) => {
                                backoff.spin();
                                continue 'retry;
                            }
                        }
                        curr = succ;
                        if curr == tail {
                            break;
                        }
                        let (s2, m2) = decompose(
                            unsafe { curr.deref() }.next[level].load(Ordering::Acquire, guard),
                        );
                        succ = s2;
                        marked = m2;
                    }

                    if curr != tail && unsafe { curr.deref() }.key < key {
                        pred = curr;
                        curr = succ;
                    } else {
                        break;
                    }
                }

                preds[level] = pred;
                succs[level] = curr;
            }

            let found = succs[0] != tail && unsafe { succs[0].deref() }.key == key;
            return (found, preds, succs);
        }
    }

    /// Best-effort tower build for levels `1..=top_level`. Stops early if
    /// the node is logically deleted mid-build; gives up after
    /// `tower_build_retries` attempts on a single level, leaving the node
    /// correctly reachable through its lower levels (spec §4.E).
    fn build_upper_levels<'g>(
        &self,
        key: i32,
        new_shared: Shared<'g, Node>,
        mut preds: Vec<Shared<'g, Node>>,
        mut succs: Vec<Shared<'g, Node>>,
        top_level: usize,
        guard: &'g Guard,
        backoff: &mut Backoff,
    ) {
        for level in 1..=top_level {
            let mut attempts = 0;
            loop {
                if unsafe { new_shared.deref() }.next[0]
                    .load(Ordering::Acquire, guard)
                    .tag()
                    != 0
                {
                    return;
                }

                unsafe { new_shared.deref() }.next[level].store(succs[level], Ordering::Relaxed);
                match unsafe { preds[level].deref() }.next[level].compare_exchange(
                    succs[level],
                    new_shared,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                ) {
                    Ok(_) => break,
                    Err(_) => {
                        attempts += 1;
                        if attempts >= self.backoff_config.tower_build_retries {
                            warn!(
                                "lockfree: giving up on level {level} for key {key} after {attempts} attempts; \
                                 node remains reachable through its lower levels"
                            );
                            return;
                        }
                        let (_, new_preds, new_succs) = self.find(key, guard, backoff);
                        preds = new_preds;
                        succs = new_succs;
                    }
                }
            }
        }
    }
}

impl SkipListHandle for LockFreeList {
    fn insert(&self, key: i32, value: i32) -> bool {
        let guard = &epoch::pin();
        let mut backoff = Backoff::new(self.backoff_config);

        for attempt in 0..RETRY_CEILING {
            let (found, preds, succs) = self.find(key, guard, &mut backoff);

            if found {
                let succ_ref = unsafe { succs[0].deref() };
                if succ_ref.next[0].load(Ordering::Acquire, guard).tag() == 0 {
                    return false;
                }
                // Zombie at this key: fall through and insert in front of it.
            }

            let top_level = random_level(self.max_level);
            let new_node = Owned::new(Node::new(key, value, top_level as u8));
            for level in 0..=top_level {
                new_node.next[level].store(succs[level], Ordering::Relaxed);
            }
            let new_shared = new_node.into_shared(guard);

            // Linearization point of insert.
            match unsafe { preds[0].deref() }.next[0].compare_exchange(
                succs[0],
                new_shared,
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    self.build_upper_levels(key, new_shared, preds, succs, top_level, guard, &mut backoff);
                    self.size.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(_) => {
                    unsafe { drop(new_shared.into_owned()) };
                    backoff.spin();
                    if attempt == RETRY_CEILING - 1 {
                        warn!("lockfree: insert({key}) hit the retry ceiling; returning false");
                    }
                }
            }
        }

        false
    }

    fn delete(&self, key: i32) -> bool {
        let guard = &epoch::pin();
        let mut backoff = Backoff::new(self.backoff_config);

        for attempt in 0..RETRY_CEILING {
            let (found, _preds, succs) = self.find(key, guard, &mut backoff);
            if !found {
                return false;
            }

            let victim = succs[0];
            let victim_ref = unsafe { victim.deref() };
            let top_level = victim_ref.top_level as usize;

            // Upper levels: single best-effort attempt each; failures are
            // ignored, `find`'s helping will still clean them up over time.
            for level in (1..=top_level).rev() {
                let succ = victim_ref.next[level].load(Ordering::Acquire, guard);
                if succ.tag() == 0 {
                    let marked = succ.with_tag(1);
                    let _ = victim_ref.next[level].compare_exchange(
                        succ,
                        marked,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    );
                }
            }

            // Level 0: retry until the mark is set or we observe it already
            // set by someone else. This is the linearization point.
            let succ0 = victim_ref.next[0].load(Ordering::Acquire, guard);
            if succ0.tag() != 0 {
                return false;
            }
            let marked0 = succ0.with_tag(1);
            match victim_ref.next[0].compare_exchange(
                succ0,
                marked0,
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    self.size.fetch_sub(1, Ordering::Relaxed);
                    // Best-effort physical unlink via the helping protocol.
                    let _ = self.find(key, guard, &mut backoff);
                    unsafe { guard.defer_destroy(victim) };
                    return true;
                }
                Err(_) => {
                    backoff.spin();
                    if attempt == RETRY_CEILING - 1 {
                        warn!("lockfree: delete({key}) hit the retry ceiling; returning false");
                        return false;
                    }
                }
            }
        }

        false
    }

    fn contains(&self, key: i32) -> bool {
        let guard = &epoch::pin();
        let tail = self.tail.load(Ordering::Acquire, guard).with_tag(0);
        let mut pred = self.head.load(Ordering::Acquire, guard).with_tag(0);

        for level in (0..=self.max_level).rev() {
            let mut curr = unsafe { pred.deref() }.next[level]
                .load(Ordering::Acquire, guard)
                .with_tag(0);

            while curr != tail && unsafe { curr.deref() }.key < key {
                pred = curr;
                curr = unsafe { curr.deref() }.next[level]
                    .load(Ordering::Acquire, guard)
                    .with_tag(0);
            }

            if level == 0 {
                return curr != tail
                    && unsafe { curr.deref() }.key == key
                    && unsafe { curr.deref() }.next[0].load(Ordering::Acquire, guard).tag() == 0;
            }
        }

        false
    }

    fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }
}

impl Drop for LockFreeList {
    fn drop(&mut self) {
        let guard = &epoch::pin();
        let mut curr = self.head.load(Ordering::Relaxed, guard).with_tag(0);
        while !curr.is_null() {
            let next = unsafe { curr.deref() }.next[0]
                .load(Ordering::Relaxed, guard)
                .with_tag(0);
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
        let list = LockFreeList::new();
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
        let list = LockFreeList::new();
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
    fn seed_scenario_3_reverse_insert_ascending_traversal() {
        let list = LockFreeList::new();
        for i in (0..1000).rev() {
            assert!(list.insert(i, i));
        }
        for i in 0..1000 {
            assert!(list.contains(i));
        }
    }

    #[test]
    fn seed_scenario_5_insert_delete_reverse_empties() {
        let list = LockFreeList::new();
        for i in 0..100 {
            assert!(list.insert(i, i));
        }
        for i in (0..100).rev() {
            assert!(list.delete(i));
        }
        assert_eq!(list.len(), 0);
        for i in 0..100 {
            assert!(!list.contains(i));
        }
    }

    #[test]
    fn seed_scenario_6_disjoint_concurrent_inserts() {
        use std::sync::Arc;
        let list = Arc::new(LockFreeList::new());
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

    #[test]
    fn concurrent_insert_delete_of_same_keys_never_crashes() {
        use std::sync::Arc;
        let list = Arc::new(LockFreeList::new());
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let list = Arc::clone(&list);
                scope.spawn(move || {
                    for _ in 0..5_000 {
                        for key in 0..16 {
                            list.insert(key, key);
                            list.contains(key);
                            list.delete(key);
                        }
                    }
                });
            }
        });
    }
}
