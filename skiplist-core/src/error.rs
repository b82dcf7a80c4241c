//! Error types shared by the skip list variants and the benchmark driver.

use thiserror::Error;

/// The error type for the skip list workspace.
///
/// The core `insert`/`delete`/`contains` operations (spec §6/§7) have no
/// fallible paths beyond their boolean outcomes; this type exists for the
/// ambient configuration and benchmark-driver surfaces around them.
#[derive(Error, Debug)]
pub enum Error {
    /// A `ListConfig` or `BackoffConfig` field was outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Allocation failed. Rust aborts the process on allocator failure
    /// before this variant could ever be constructed; it is kept for
    /// documentation purposes only (see spec §7).
    #[error("allocation failed")]
    AllocationFailed,

    /// The requested workload could not be satisfied with the given
    /// `--key-range` / `--initial-size` combination.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// An unrecognized `--impl` or `--workload` value was supplied on the
    /// command line.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// A specialized `Result` for this workspace.
pub type Result<T> = std::result::Result<T, Error>;
