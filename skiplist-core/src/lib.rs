//! Shared error and configuration types for the concurrent skip list
//! workspace.
//!
//! This crate carries no algorithmic logic of its own — it exists so that
//! `skiplist` and `skiplist-bench` can agree on a [`Result`]/[`Error`] type
//! and on the tuning structs ([`ListConfig`], [`BackoffConfig`]) without
//! either crate depending on the other.
//!
//! # Example
//!
//! ```
//! use skiplist_core::{BackoffConfig, ListConfig};
//!
//! let list_cfg = ListConfig::default();
//! let backoff_cfg = BackoffConfig::default();
//! assert_eq!(list_cfg.max_level, 16);
//! assert_eq!(backoff_cfg.yield_threshold, 12);
//! ```

pub mod config;
pub mod error;

pub use config::{BackoffConfig, ListConfig};
pub use error::{Error, Result};
