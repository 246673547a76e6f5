//! `pulse-scheduler`: background maintenance for the presence tracker.
//!
//! [`Sweeper`] evicts members whose activity lapsed; [`Rollup`] copies live
//! counts and peaks into SQLite. Both stop on a `watch` shutdown signal.

pub mod periodic;
pub mod rollup;
pub mod sweeper;

pub use periodic::run_periodic;
pub use rollup::{DailyStat, Rollup, RollupStore};
pub use sweeper::Sweeper;
