//! Cross-variant integration tests for the concurrent seed scenarios
//! (spec §8, scenarios 6 and 7) and the quiescent ordering invariants they
//! imply. Exercised against all three synchronization strategies through
//! the shared `SkipListHandle` trait, rather than duplicated per module,
//! since the scenarios describe behavior the trait contract promises
//! uniformly across variants.

use skiplist::{CoarseList, FineList, LockFreeList, SkipListHandle};
use std::sync::Arc;

fn disjoint_concurrent_inserts(list: Arc<dyn SkipListHandle>) {
    std::thread::scope(|scope| {
        for tid in 0..4i32 {
            let list = Arc::clone(&list);
            scope.spawn(move || {
                for k in (tid * 500)..((tid + 1) * 500) {
                    assert!(list.insert(k, k));
                }
            });
        }
    });

    for k in 0..2000 {
        assert!(list.contains(k), "missing key {k} after disjoint concurrent inserts");
    }
    assert_eq!(list.len(), 2000);
}

#[test]
fn seed_scenario_6_coarse() {
    disjoint_concurrent_inserts(Arc::new(CoarseList::new()));
}

#[test]
fn seed_scenario_6_fine() {
    disjoint_concurrent_inserts(Arc::new(FineList::new()));
}

#[test]
fn seed_scenario_6_lockfree() {
    disjoint_concurrent_inserts(Arc::new(LockFreeList::new()));
}

/// 8 threads, key-range 1000, roughly 30/20/50 insert/delete/contains split,
/// for a reduced op count relative to spec §8's 100,000/thread reference
/// (kept the shape, not the magnitude, so the suite runs quickly).
fn mixed_workload_no_crash(list: Arc<dyn SkipListHandle>, ops_per_thread: u64) {
    std::thread::scope(|scope| {
        for tid in 0..8u64 {
            let list = Arc::clone(&list);
            scope.spawn(move || {
                let mut state = tid + 1;
                let mut next_rand = move || {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    state
                };
                for _ in 0..ops_per_thread {
                    let key = (next_rand() % 1000) as i32;
                    match next_rand() % 10 {
                        0..=2 => {
                            list.insert(key, key);
                        }
                        3..=4 => {
                            list.delete(key);
                        }
                        _ => {
                            list.contains(key);
                        }
                    }
                }
            });
        }
    });

    assert!(list.len() <= 1000);
}

#[test]
fn seed_scenario_7_coarse() {
    mixed_workload_no_crash(Arc::new(CoarseList::new()), 20_000);
}

#[test]
fn seed_scenario_7_fine() {
    mixed_workload_no_crash(Arc::new(FineList::new()), 20_000);
}

#[test]
fn seed_scenario_7_lockfree() {
    mixed_workload_no_crash(Arc::new(LockFreeList::new()), 20_000);
}

/// Quiescent order invariant (property 5): once all threads have joined,
/// traversing level 0 via repeated `contains` probes on a known key set
/// sees strictly increasing membership with no gaps once inserted and not
/// deleted. This probes the invariant through the public API rather than
/// the private node chain, since level 0 isn't exposed outside the crate.
fn quiescent_membership_matches_expected(list: Arc<dyn SkipListHandle>) {
    std::thread::scope(|scope| {
        for tid in 0..4i32 {
            let list = Arc::clone(&list);
            scope.spawn(move || {
                for k in (tid * 100)..((tid + 1) * 100) {
                    list.insert(k, k);
                    if k % 3 == 0 {
                        list.delete(k);
                    }
                }
            });
        }
    });

    for k in 0..400 {
        let expected = k % 3 != 0;
        assert_eq!(list.contains(k), expected, "key {k} membership mismatch at quiescence");
    }
}

#[test]
fn quiescent_membership_coarse() {
    quiescent_membership_matches_expected(Arc::new(CoarseList::new()));
}

#[test]
fn quiescent_membership_fine() {
    quiescent_membership_matches_expected(Arc::new(FineList::new()));
}

#[test]
fn quiescent_membership_lockfree() {
    quiescent_membership_matches_expected(Arc::new(LockFreeList::new()));
}
