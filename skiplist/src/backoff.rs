//! Contention management for the lock-free variant (spec §4.E/§9).
//!
//! `crossbeam::utils::Backoff` already implements the spin-then-yield
//! discipline spec §9 describes, but with fixed thresholds. This wraps the
//! same technique around the tunable [`BackoffConfig`] so the retry/backoff
//! behavior can be retuned for a different thread count or architecture
//! without recompiling crossbeam.

use skiplist_core::BackoffConfig;
use std::hint;

pub(crate) struct Backoff {
    attempt: u32,
    config: BackoffConfig,
}

impl Backoff {
    pub(crate) fn new(config: BackoffConfig) -> Self {
        Self { attempt: 0, config }
    }

    /// Spins or yields once, escalating with each call. Safe to call in a
    /// tight retry loop indefinitely.
    pub(crate) fn spin(&mut self) {
        if self.attempt > self.config.yield_threshold {
            std::thread::yield_now();
        } else {
            let spins = (self.config.base_spins << self.attempt.min(31)).min(self.config.max_spins);
            for _ in 0..spins {
                hint::spin_loop();
            }
        }
        self.attempt = self.attempt.saturating_add(1);
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }
}
