//! The five-operation contract every variant exposes (spec §6).
//!
//! `create_X`/`destroy_X` map onto Rust construction/`Drop` rather than
//! explicit entry points — lifecycle ties to ownership, and `destroy`'s
//! single-threaded precondition becomes the borrow checker's requirement
//! that the last handle be dropped with no outstanding borrows.

/// Common handle over the three synchronization strategies, so the
/// benchmark driver and cross-variant tests can be generic over which one
/// they're exercising.
pub trait SkipListHandle: Send + Sync {
    /// Inserts `key -> value`. Returns `true` iff the key was not already
    /// present (duplicate keys are rejected, not updated — spec §1).
    fn insert(&self, key: i32, value: i32) -> bool;

    /// Removes `key`. Returns `true` iff a live entry was removed.
    fn delete(&self, key: i32) -> bool;

    /// Returns `true` iff `key` is currently live in the list.
    fn contains(&self, key: i32) -> bool;

    /// Approximate number of live entries (spec §3/§5: not linearizable
    /// with concurrent mutators).
    fn len(&self) -> usize;

    /// `true` iff `len() == 0`.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
