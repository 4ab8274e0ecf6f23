//! Analysis modules.
//!
//! `aggregator` turns a loaded table into the metric summary; `stats`
//! holds the column-level statistics it is built from.

pub mod aggregator;
pub mod stats;

pub use aggregator::*;
