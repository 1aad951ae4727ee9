//! File input and output.

/// CSV sink for published annotations.
pub mod export;
pub mod station;
