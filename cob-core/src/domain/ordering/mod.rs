//! Deterministic ordering of heterogeneous loan activity.

pub mod chronological;

pub use chronological::{compare, compare_canonical, sort_chronologically};
