//! Tuning knobs shared by the skip list variants.

use crate::{Error, Result};

/// Static shape of the list: how many levels it may grow to.
///
/// Separate from [`BackoffConfig`] because `max_level` affects node layout
/// (every sentinel and every tower allocation) while the backoff knobs only
/// affect the lock-free variant's retry loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListConfig {
    /// Highest level index a node may participate at. Levels run
    /// `0..=max_level`, so the sentinels carry `max_level + 1` forward
    /// pointers. Reference value 16.
    pub max_level: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self { max_level: 16 }
    }
}

impl ListConfig {
    /// Validates the configuration, returning an error if `max_level` is 0
    /// (a skip list needs at least one level to be a list at all).
    pub fn validate(&self) -> Result<()> {
        if self.max_level == 0 {
            return Err(Error::InvalidConfig(
                "max_level must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Contention-management knobs for the lock-free variant's CAS retry loops
/// and the lock-free/fine tower-build best-effort retries.
///
/// Reference values per spec §9: base 1, cap 2048, yield threshold ~12,
/// tower-build retries ~50. These were tuned for x86 with up to 16 threads;
/// expose them so a caller can retune for their own hardware/thread count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Initial number of spin iterations before the first retry.
    pub base_spins: u32,
    /// Ceiling on the exponential spin count.
    pub max_spins: u32,
    /// Attempt count past which the retry loop yields to the scheduler
    /// instead of spinning, to avoid convoys at high thread counts.
    pub yield_threshold: u32,
    /// Bounded number of attempts to link an upper tower level before
    /// giving up and leaving the node linked only through lower levels.
    pub tower_build_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_spins: 1,
            max_spins: 2048,
            yield_threshold: 12,
            tower_build_retries: 50,
        }
    }
}

impl BackoffConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_spins < self.base_spins {
            return Err(Error::InvalidConfig(
                "max_spins must be >= base_spins".to_string(),
            ));
        }
        Ok(())
    }
}
