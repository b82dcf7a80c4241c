//! Constants shared by all three node layouts.
//!
//! Each variant (coarse/fine/lockfree) defines its own `Node` type because
//! the mark/lock fields differ structurally between them (spec §3: "Both
//! encodings are behaviorally equivalent"), but all three agree on where
//! the key space begins and ends.

/// Key of the head sentinel. Compares less than every real key.
pub(crate) const HEAD_KEY: i32 = i32::MIN;

/// Key of the tail sentinel. Compares greater than every real key.
pub(crate) const TAIL_KEY: i32 = i32::MAX;
